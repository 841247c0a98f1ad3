//! Application bootstrap.
//!
//! [`App`] is the explicit context object that owns the store, the two ports
//! and the tasks serving them. There is no global instance: every caller
//! builds its own through [`App::builder`].

use crate::bridge::{Bridge, BridgeError};
use crate::config::AppConfig;
use crate::reducer::{TodoEnvironment, TodoReducer};
use crate::types::{Creation, Submission, TodoAction, TodoItem, TodoState};
use crate::worker::{LocalRegistrar, WorkerRegistrar};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use todo_ports_core::environment::{Clock, IdGenerator, RandomIdGenerator, SystemClock};
use todo_ports_core::port::{self, PortReceiver, PortSender};
use todo_ports_runtime::{EffectHandle, Store, StoreError};

/// Name of the port carrying submissions to the bridge
pub const SUBMISSION_PORT: &str = "addTodo";
/// Name of the port carrying creations back to the core
pub const CREATION_PORT: &str = "addedTodo";
/// Name of the port handing every creation to the application's consumer
pub const OUTPUT_PORT: &str = "created";

/// Store type of the application core
pub type TodoStore = Store<TodoState, TodoAction, TodoEnvironment, TodoReducer>;

/// Application errors
#[derive(Error, Debug)]
pub enum AppError {
    /// The store refused an action
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Submissions were still waiting for an identifier when the timeout expired
    #[error("{pending} submission(s) still pending after {timeout:?}")]
    Unsettled {
        /// How long we waited
        timeout: Duration,
        /// Submissions still waiting
        pending: usize,
    },
}

/// Builder for [`App`]
///
/// Defaults to the system clock, random identifiers and the local worker
/// registrar.
pub struct AppBuilder {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    registrar: Arc<dyn WorkerRegistrar>,
}

impl AppBuilder {
    /// Replace the clock stamping arriving todos
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the identifier source of the bridge
    #[must_use]
    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Replace the caching worker registrar
    #[must_use]
    pub fn with_registrar(mut self, registrar: impl WorkerRegistrar + 'static) -> Self {
        self.registrar = Arc::new(registrar);
        self
    }

    /// Wire the ports, spawn the bridge and boot the core
    ///
    /// Waits for the caching worker registration to finish, up to the
    /// shutdown timeout. A slow registration is logged and left running.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the store refuses `Boot`.
    #[tracing::instrument(skip_all, name = "app_start")]
    pub async fn start(self) -> Result<App, AppError> {
        let Self {
            config,
            clock,
            ids,
            registrar,
        } = self;

        let (submissions_tx, submissions_rx) = port::channel::<Submission>(SUBMISSION_PORT);
        let (creations_tx, creations_rx) = port::channel::<Creation>(CREATION_PORT);
        let (output_tx, output_rx) = port::channel::<Creation>(OUTPUT_PORT);

        let env = TodoEnvironment::new(clock, registrar, submissions_tx)
            .with_worker_registration(config.register_worker)
            .with_worker_script(config.worker_script.clone())
            .with_missing_text(config.bridge.missing_text);

        let store = Store::with_config(
            TodoState::new(),
            TodoReducer::new(),
            env,
            config.store_config(),
        );

        let bridge = tokio::spawn(Bridge::new(config.bridge, ids).run(submissions_rx, creations_tx));
        let inbound = tokio::spawn(forward_creations(store.clone(), creations_rx, output_tx));

        let mut boot = store.send(TodoAction::Boot).await?;
        if let Err(error) = boot.wait_with_timeout(config.shutdown_timeout()).await {
            tracing::warn!(%error, "Caching worker registration still running");
        }

        tracing::info!(
            mode = %config.bridge.mode,
            missing_text = %config.bridge.missing_text,
            "Application started"
        );

        Ok(App {
            store,
            config,
            bridge,
            inbound,
            output: Some(output_rx),
        })
    }
}

/// A running application
pub struct App {
    store: TodoStore,
    config: AppConfig,
    bridge: JoinHandle<Result<u64, BridgeError>>,
    inbound: JoinHandle<()>,
    output: Option<PortReceiver<Creation>>,
}

impl App {
    /// Start building an application
    #[must_use]
    pub fn builder(config: AppConfig) -> AppBuilder {
        AppBuilder {
            config,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
            registrar: Arc::new(LocalRegistrar::new()),
        }
    }

    /// The configuration the application was started with
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The store of the application core
    #[must_use]
    pub const fn store(&self) -> &TodoStore {
        &self.store
    }

    /// Submit a new todo
    ///
    /// The submission has left for the bridge when this returns. Its creation
    /// arrives later as [`TodoAction::TodoAdded`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`] if the application is shutting down.
    pub async fn submit(&self, submission: Submission) -> Result<EffectHandle, AppError> {
        Ok(self.store.send(TodoAction::SubmitTodo { submission }).await?)
    }

    /// Take the port receiving every creation, in arrival order
    ///
    /// Unlike [`subscribe`](Self::subscribe) this port never drops a
    /// message. Creations are buffered from the start, so none is missed
    /// however late the port is taken. Returns `None` once taken.
    pub fn take_creations(&mut self) -> Option<PortReceiver<Creation>> {
        self.output.take()
    }

    /// Subscribe to every action reduced by the core
    ///
    /// Observers that fall behind skip actions; use
    /// [`take_creations`](Self::take_creations) when every creation matters.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TodoAction> {
        self.store.subscribe_actions()
    }

    /// Todos in arrival order
    pub async fn todos(&self) -> Vec<TodoItem> {
        self.store.state(|s| s.todos.clone()).await
    }

    /// Read the core state via a closure
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&TodoState) -> T,
    {
        self.store.state(f).await
    }

    /// Wait until no submission is waiting for an identifier
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unsettled`] if submissions are still pending when
    /// `timeout` expires.
    pub async fn settle(&self, timeout: Duration) -> Result<(), AppError> {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(5);

        loop {
            let pending = self.store.state(|s| s.pending).await;
            if pending == 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(AppError::Unsettled { timeout, pending });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Settle, stop the store and stop the port tasks
    ///
    /// The tasks are stopped even if settling or stopping the store fails.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unsettled`] if submissions were still pending, or
    /// [`AppError::Store`] if effects were still running when the timeout
    /// expired.
    #[tracing::instrument(skip_all, name = "app_shutdown")]
    pub async fn shutdown(self) -> Result<(), AppError> {
        let timeout = self.config.shutdown_timeout();

        let settled = self.settle(timeout).await;
        if let Err(error) = &settled {
            tracing::warn!(%error, "Shutting down with pending submissions");
        }
        let stopped = self.store.shutdown(timeout).await;

        let Self {
            store,
            mut bridge,
            inbound,
            ..
        } = self;

        inbound.abort();
        // Cancellation is the expected outcome
        let _ = inbound.await;

        // Dropping the last store closes the submission port, which ends the bridge
        drop(store);
        match tokio::time::timeout(timeout, &mut bridge).await {
            Ok(Ok(Ok(sent))) => tracing::info!(sent, "Bridge stopped"),
            Ok(Ok(Err(error))) => tracing::warn!(%error, "Bridge stopped with error"),
            Ok(Err(error)) => tracing::error!(%error, "Bridge task failed"),
            Err(_) => {
                tracing::warn!("Bridge did not stop in time, aborting");
                bridge.abort();
            },
        }

        settled?;
        stopped?;
        tracing::info!("Application stopped");
        Ok(())
    }
}

/// Feed creations into the core one at a time
///
/// Each creation is handed to the output port before it is reduced, so it is
/// already there once `settle` sees it.
async fn forward_creations(
    store: TodoStore,
    mut creations: PortReceiver<Creation>,
    output: PortSender<Creation>,
) {
    while let Some(todo) = creations.recv().await {
        tracing::debug!(id = %todo.id(), "Creation received");
        if output.send(todo.clone()).is_err() {
            tracing::trace!("Creation output dropped by its consumer");
        }
        if let Err(error) = store.send(TodoAction::TodoAdded { todo }).await {
            tracing::warn!(%error, "Creation dropped");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MissingText;
    use crate::types::WorkerStatus;
    use todo_ports_testing::{SequentialIdGenerator, test_clock};

    async fn start(config: AppConfig) -> App {
        App::builder(config)
            .with_clock(test_clock())
            .with_ids(SequentialIdGenerator::new())
            .start()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn submissions_come_back_with_ids() {
        let app = start(AppConfig::default()).await;

        app.submit(Submission::with_text("Buy milk")).await.unwrap();
        app.settle(Duration::from_secs(1)).await.unwrap();

        let todos = app.todos().await;
        assert_eq!(todos.len(), 1);
        assert_eq!(
            todos[0].id.to_string(),
            "00000000-0000-4000-8000-000000000001"
        );
        assert_eq!(todos[0].text.as_deref(), Some("Buy milk"));
        assert_eq!(todos[0].created_at, test_clock().now());

        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn start_registers_worker() {
        let app = start(AppConfig::default()).await;
        assert_eq!(
            app.state(|s| s.worker.clone()).await,
            WorkerStatus::Registered {
                scope: "/".to_string()
            }
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_submission_does_not_block_settle() {
        let mut config = AppConfig::default();
        config.bridge.missing_text = MissingText::Reject;
        let app = start(config).await;

        app.submit(Submission::new()).await.unwrap();
        app.settle(Duration::from_millis(200)).await.unwrap();

        assert!(app.todos().await.is_empty());
        assert_eq!(
            app.state(|s| s.last_error.clone()).await.as_deref(),
            Some("Submission has no text")
        );
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn creation_port_keeps_everything_the_broadcast_drops() {
        let mut config = AppConfig::default();
        config.broadcast_capacity = 2;
        let mut app = start(config).await;
        let mut output = app.take_creations().unwrap();
        assert!(app.take_creations().is_none());

        for i in 0..100 {
            app.submit(Submission::with_text(format!("todo {i}")))
                .await
                .unwrap();
        }
        app.shutdown().await.unwrap();

        let mut texts = Vec::new();
        while let Some(creation) = output.recv().await {
            texts.push(creation.text().map(str::to_owned));
        }
        let expected: Vec<_> = (0..100).map(|i| Some(format!("todo {i}"))).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn stopped_store_rejects_submissions() {
        let app = start(AppConfig::default()).await;
        app.store().shutdown(Duration::from_millis(100)).await.unwrap();

        let result = app.submit(Submission::with_text("late")).await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::ShutdownInProgress))
        ));
        app.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_closes_action_stream() {
        let app = start(AppConfig::default()).await;
        let mut actions = app.subscribe();
        app.submit(Submission::with_text("a")).await.unwrap();
        app.shutdown().await.unwrap();

        let mut names = Vec::new();
        while let Ok(action) = actions.recv().await {
            names.push(action.name());
        }
        assert_eq!(names, ["SubmitTodo", "TodoAdded"]);
    }
}
