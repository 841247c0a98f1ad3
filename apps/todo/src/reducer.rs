//! Application core reducer.
//!
//! The core never talks to the bridge directly: a submission leaves through
//! the submission port as a `Dispatch` effect, and the creation comes back
//! as a [`TodoAction::TodoAdded`] event.

use crate::bridge::MissingText;
use crate::types::{Submission, TodoAction, TodoItem, TodoState, WorkerStatus};
use crate::worker::WorkerRegistrar;
use std::sync::Arc;
use todo_ports_core::effect::Effect;
use todo_ports_core::environment::Clock;
use todo_ports_core::port::PortSender;
use todo_ports_core::reducer::Reducer;
use todo_ports_core::{SmallVec, smallvec};

/// Default path of the caching worker script
pub const DEFAULT_WORKER_SCRIPT: &str = "/service-worker.js";

/// Environment for the application core
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Clock stamping arriving todos
    pub clock: Arc<dyn Clock>,
    /// Caching worker registrar
    pub registrar: Arc<dyn WorkerRegistrar>,
    /// Submission port towards the bridge
    pub submissions: PortSender<Submission>,
    /// Whether `Boot` registers the caching worker
    pub register_worker: bool,
    /// Path of the caching worker script
    pub worker_script: String,
    /// Submissions refused before they reach the bridge
    pub missing_text: MissingText,
}

impl TodoEnvironment {
    /// Creates an environment that registers the default worker script
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        registrar: Arc<dyn WorkerRegistrar>,
        submissions: PortSender<Submission>,
    ) -> Self {
        Self {
            clock,
            registrar,
            submissions,
            register_worker: true,
            worker_script: DEFAULT_WORKER_SCRIPT.to_string(),
            missing_text: MissingText::default(),
        }
    }

    /// Switch worker registration on or off
    #[must_use]
    pub const fn with_worker_registration(mut self, enabled: bool) -> Self {
        self.register_worker = enabled;
        self
    }

    /// Set the worker script path
    #[must_use]
    pub fn with_worker_script(mut self, script: impl Into<String>) -> Self {
        self.worker_script = script.into();
        self
    }

    /// Set the missing-text policy
    #[must_use]
    pub const fn with_missing_text(mut self, missing_text: MissingText) -> Self {
        self.missing_text = missing_text;
        self
    }
}

/// Reducer for the application core
#[derive(Clone, Debug, Default)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new todo reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Applies an event to state
    pub fn apply_event(state: &mut TodoState, action: &TodoAction, env: &TodoEnvironment) {
        match action {
            TodoAction::TodoAdded { todo } => {
                state.todos.push(TodoItem::from_creation(todo, env.clock.now()));
                state.pending = state.pending.saturating_sub(1);
            },
            TodoAction::WorkerRegistered { scope } => {
                state.worker = WorkerStatus::Registered {
                    scope: scope.clone(),
                };
            },
            TodoAction::WorkerRegistrationFailed { error } => {
                state.worker = WorkerStatus::Failed {
                    error: error.clone(),
                };
                state.last_error = Some(error.clone());
            },
            TodoAction::SubmissionFailed { error } => {
                state.pending = state.pending.saturating_sub(1);
                state.last_error = Some(error.clone());
            },
            TodoAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            // Commands don't modify state directly
            TodoAction::Boot | TodoAction::SubmitTodo { .. } => {},
        }
    }

    fn validate_boot(state: &TodoState) -> Result<(), String> {
        if state.worker == WorkerStatus::NotStarted {
            Ok(())
        } else {
            Err("Application already booted".to_string())
        }
    }

    fn validate_submission(submission: &Submission, env: &TodoEnvironment) -> Result<(), String> {
        if env.missing_text.admits(submission) {
            Ok(())
        } else {
            Err("Submission has no text".to_string())
        }
    }

    fn reject(state: &mut TodoState, command: &str, error: String, env: &TodoEnvironment) {
        tracing::warn!("{command} validation failed: {error}");
        Self::apply_event(state, &TodoAction::ValidationFailed { error }, env);
    }

    fn register_effect(env: &TodoEnvironment) -> Effect<TodoAction> {
        let registrar = Arc::clone(&env.registrar);
        let script = env.worker_script.clone();

        Effect::Future(Box::pin(async move {
            match registrar.register(&script).await {
                Ok(registration) => Some(TodoAction::WorkerRegistered {
                    scope: registration.scope,
                }),
                Err(error) => {
                    tracing::warn!(%error, "Caching worker registration failed");
                    Some(TodoAction::WorkerRegistrationFailed {
                        error: error.to_string(),
                    })
                },
            }
        }))
    }

    fn submit_effect(submission: Submission, env: &TodoEnvironment) -> Effect<TodoAction> {
        let port = env.submissions.clone();

        Effect::Dispatch(Box::new(move || {
            port.send(submission).err().map(|error| {
                tracing::error!(%error, "Submission could not be sent");
                TodoAction::SubmissionFailed {
                    error: error.to_string(),
                }
            })
        }))
    }
}

impl Reducer for TodoReducer {
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            TodoAction::Boot => {
                if let Err(error) = Self::validate_boot(state) {
                    Self::reject(state, "Boot", error, env);
                    return smallvec![Effect::None];
                }

                if !env.register_worker {
                    tracing::info!("Caching worker registration disabled");
                    state.worker = WorkerStatus::Disabled;
                    return smallvec![Effect::None];
                }

                state.worker = WorkerStatus::Registering;
                smallvec![Self::register_effect(env)]
            },

            TodoAction::SubmitTodo { submission } => {
                if let Err(error) = Self::validate_submission(&submission, env) {
                    Self::reject(state, "SubmitTodo", error, env);
                    return smallvec![Effect::None];
                }

                state.pending += 1;
                smallvec![Self::submit_effect(submission, env)]
            },

            // ========== Events ==========
            TodoAction::TodoAdded { .. }
            | TodoAction::WorkerRegistered { .. }
            | TodoAction::WorkerRegistrationFailed { .. }
            | TodoAction::SubmissionFailed { .. }
            | TodoAction::ValidationFailed { .. } => {
                Self::apply_event(state, &action, env);
                smallvec![Effect::None]
            },
        }
    }
}
