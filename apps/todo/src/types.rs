//! Domain types for the to-do application.
//!
//! Two payloads cross the ports between the application core and the
//! bridge: a [`Submission`] going out ("a new to-do was entered") and a
//! [`Creation`] coming back ("the to-do now has an identifier"). The rest of
//! this module is the core's own model of the list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use todo_ports_macros::Action;
use uuid::Uuid;

/// Unique identifier for a todo item
///
/// Serialized as the hyphenated lowercase UUID text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(Uuid);

impl TodoId {
    /// Creates a `TodoId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TodoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Payload of the submission port: an arbitrary JSON object
///
/// Only `text` is ever read, and only when it is a string. Everything else
/// is carried untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission(Map<String, Value>);

impl Submission {
    /// Empty submission (no fields at all)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Submission carrying only `text`
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new().with_field("text", text.into())
    }

    /// Wrap an existing JSON object
    #[must_use]
    pub const fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Add or replace a field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a field in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// The `text` field, if present and a string
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.0.get("text").and_then(Value::as_str)
    }

    /// All fields
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the submission, returning its fields
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Interpret one line of user input
    ///
    /// A line holding a JSON object is taken verbatim; any other non-blank
    /// line becomes `{ "text": <line> }` with its whitespace kept. Blank
    /// lines yield `None`.
    #[must_use]
    pub fn from_input_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('{') {
            if let Ok(submission) = serde_json::from_str::<Self>(trimmed) {
                return Some(submission);
            }
        }
        Some(Self::with_text(line))
    }
}

/// Freshly built record: exactly `id`, `text` and `done`
///
/// A missing `text` is omitted from the JSON rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatedTodo {
    /// Identifier assigned by the bridge
    pub id: TodoId,
    /// Text copied from the submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Completion flag, `false` for every new record
    pub done: bool,
}

impl CreatedTodo {
    /// Creates a record that is not done
    #[must_use]
    pub const fn new(id: TodoId, text: Option<String>) -> Self {
        Self {
            id,
            text,
            done: false,
        }
    }
}

/// The caller's own object with `id` attached
///
/// An `id` already present on the submission is replaced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedTodo {
    /// Identifier assigned by the bridge
    pub id: TodoId,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl EnrichedTodo {
    /// Attach `id` to the submission's fields
    #[must_use]
    pub fn new(id: TodoId, submission: Submission) -> Self {
        let mut fields = submission.into_fields();
        fields.remove("id");
        Self { id, fields }
    }

    /// Every field except `id`, as submitted
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Payload of the creation port
///
/// Decoding is by shape. An enriched payload whose fields are exactly `id`,
/// `text` and `done` decodes as [`Creation::Created`]. Both variants render
/// the same JSON and give the same [`id`](Self::id), [`text`](Self::text) and
/// [`done`](Self::done), so only the variant name differs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Creation {
    /// Reconstructed `{ id, text, done }` record
    Created(CreatedTodo),
    /// Submitted object with `id` added
    Enriched(EnrichedTodo),
}

impl Creation {
    /// Identifier assigned by the bridge
    #[must_use]
    pub const fn id(&self) -> TodoId {
        match self {
            Self::Created(todo) => todo.id,
            Self::Enriched(todo) => todo.id,
        }
    }

    /// The `text` field, if present and a string
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Created(todo) => todo.text.as_deref(),
            Self::Enriched(todo) => todo.fields.get("text").and_then(Value::as_str),
        }
    }

    /// The `done` flag; absent or non-boolean counts as `false`
    #[must_use]
    pub fn done(&self) -> bool {
        match self {
            Self::Created(todo) => todo.done,
            Self::Enriched(todo) => todo
                .fields
                .get("done")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

/// A single todo item as held by the application core
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Unique identifier
    pub id: TodoId,
    /// Text of the todo, absent if the submission had none
    pub text: Option<String>,
    /// Whether the todo is done
    pub done: bool,
    /// When the core received the todo
    pub created_at: DateTime<Utc>,
}

impl TodoItem {
    /// Build an item from a creation message
    #[must_use]
    pub fn from_creation(creation: &Creation, created_at: DateTime<Utc>) -> Self {
        Self {
            id: creation.id(),
            text: creation.text().map(str::to_owned),
            done: creation.done(),
            created_at,
        }
    }
}

/// Lifecycle of the background caching worker
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerStatus {
    /// The application has not booted yet
    #[default]
    NotStarted,
    /// Registration is switched off by configuration
    Disabled,
    /// Registration is in flight
    Registering,
    /// The worker controls the given scope
    Registered {
        /// Scope URL controlled by the worker
        scope: String,
    },
    /// Registration failed; the application keeps running without it
    Failed {
        /// Reason reported by the registrar
        error: String,
    },
}

/// State of the application core
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TodoState {
    /// Todos in arrival order
    pub todos: Vec<TodoItem>,
    /// Submissions sent to the bridge that have not come back yet
    pub pending: usize,
    /// Caching worker status
    pub worker: WorkerStatus,
    /// Last error (if any)
    pub last_error: Option<String>,
}

impl TodoState {
    /// Creates a new empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of todos
    #[must_use]
    pub fn count(&self) -> usize {
        self.todos.len()
    }

    /// Returns a todo by ID
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&TodoItem> {
        self.todos.iter().find(|todo| &todo.id == id)
    }

    /// Checks if a todo exists
    #[must_use]
    pub fn exists(&self, id: &TodoId) -> bool {
        self.get(id).is_some()
    }
}

/// Actions of the application core
///
/// Commands come from the user or the bootstrap; events come back from the
/// bridge and from effects.
#[derive(Action, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoAction {
    // ========== Commands ==========
    /// Command: start the application (registers the caching worker)
    #[command]
    Boot,

    /// Command: a new todo was entered; send it to the bridge
    #[command]
    SubmitTodo {
        /// The entered payload
        submission: Submission,
    },

    // ========== Events ==========
    /// Event: the bridge returned the todo with its identifier
    #[event]
    TodoAdded {
        /// Creation message from the bridge
        todo: Creation,
    },

    /// Event: the caching worker was registered
    #[event]
    WorkerRegistered {
        /// Scope controlled by the worker
        scope: String,
    },

    /// Event: the caching worker could not be registered
    #[event]
    WorkerRegistrationFailed {
        /// Error message
        error: String,
    },

    /// Event: the submission port refused a submission
    #[event]
    SubmissionFailed {
        /// Error message
        error: String,
    },

    /// Event: Command validation failed
    #[event]
    ValidationFailed {
        /// Error message
        error: String,
    },
}
