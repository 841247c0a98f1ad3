//! To-do list application wired through typed message ports.
//!
//! The application core keeps the list and never generates identifiers
//! itself. It sends each new to-do on the `addTodo` port; the message bridge
//! assigns a UUID v4 and answers on the `addedTodo` port; the core then
//! appends the identified to-do.
//!
//! ```text
//! App ──SubmitTodo──▶ Store ──addTodo──▶ Bridge
//!                       ▲                  │
//!                       └────addedTodo─────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use todo_app::{App, AppConfig, Submission};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = App::builder(AppConfig::default()).start().await?;
//!
//! app.submit(Submission::with_text("Buy milk")).await?;
//! app.settle(Duration::from_secs(1)).await?;
//!
//! for todo in app.todos().await {
//!     println!("{} {:?}", todo.id, todo.text);
//! }
//!
//! app.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod reducer;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use app::{App, AppBuilder, AppError, TodoStore};
pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeMode, MissingText};
pub use cli::{CliError, Summary};
pub use config::{AppConfig, ConfigError};
pub use reducer::{TodoEnvironment, TodoReducer};
pub use types::{
    CreatedTodo, Creation, EnrichedTodo, Submission, TodoAction, TodoId, TodoItem, TodoState,
    WorkerStatus,
};
pub use worker::{LocalRegistrar, Registration, RegistrationError, WorkerRegistrar};
