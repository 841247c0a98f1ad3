//! Message bridge between the submission and creation ports.
//!
//! For every submission the bridge draws a fresh UUID v4 from its
//! [`IdGenerator`] and answers with exactly one [`Creation`]. It holds no
//! state between messages.

use crate::types::{CreatedTodo, Creation, EnrichedTodo, Submission, TodoId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use todo_ports_core::environment::IdGenerator;
use todo_ports_core::port::{PortError, PortReceiver, PortSender};

/// Shape of the creation message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BridgeMode {
    /// Emit exactly `{ id, text, done: false }`
    #[default]
    Reconstruct,
    /// Emit the submitted object with `id` added
    InPlace,
}

impl BridgeMode {
    /// Configuration spelling of the mode
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reconstruct => "reconstruct",
            Self::InPlace => "in-place",
        }
    }
}

impl std::fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BridgeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reconstruct" => Ok(Self::Reconstruct),
            "in-place" | "inplace" => Ok(Self::InPlace),
            other => Err(format!(
                "unknown bridge mode '{other}' (expected 'reconstruct' or 'in-place')"
            )),
        }
    }
}

/// What to do with a submission whose `text` is absent or not a string
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingText {
    /// Leave `text` absent on the creation
    #[default]
    PassThrough,
    /// Use `""` as the text
    Empty,
    /// Produce no creation
    Reject,
}

impl MissingText {
    /// Configuration spelling of the policy
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::Empty => "empty",
            Self::Reject => "reject",
        }
    }

    /// Returns false if this policy refuses the submission
    #[must_use]
    pub fn admits(self, submission: &Submission) -> bool {
        self != Self::Reject || submission.text().is_some()
    }
}

impl std::fmt::Display for MissingText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MissingText {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass-through" | "passthrough" => Ok(Self::PassThrough),
            "empty" => Ok(Self::Empty),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown missing-text policy '{other}' (expected 'pass-through', 'empty' or 'reject')"
            )),
        }
    }
}

/// Bridge behavior
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Shape of the creation message
    pub mode: BridgeMode,
    /// Handling of submissions without text
    pub missing_text: MissingText,
}

impl BridgeConfig {
    /// Creates a config with the given mode and the default text policy
    #[must_use]
    pub const fn new(mode: BridgeMode) -> Self {
        Self {
            mode,
            missing_text: MissingText::PassThrough,
        }
    }

    /// Set the missing-text policy
    #[must_use]
    pub const fn with_missing_text(mut self, missing_text: MissingText) -> Self {
        self.missing_text = missing_text;
        self
    }
}

/// Bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The submission has no string `text` and the policy is `Reject`
    #[error("submission has no text")]
    MissingText,

    /// The creation port is closed
    #[error(transparent)]
    Port(#[from] PortError),
}

/// Assigns identifiers to submissions
#[derive(Clone)]
pub struct Bridge {
    config: BridgeConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Bridge {
    /// Creates a bridge drawing identifiers from `ids`
    #[must_use]
    pub fn new(config: BridgeConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self { config, ids }
    }

    /// The bridge configuration
    #[must_use]
    pub const fn config(&self) -> BridgeConfig {
        self.config
    }

    /// Turn one submission into one creation
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MissingText`] if the submission has no string
    /// `text` and the policy is [`MissingText::Reject`]. No identifier is
    /// drawn in that case.
    pub fn bridge(&self, submission: Submission) -> Result<Creation, BridgeError> {
        let text = match (submission.text(), self.config.missing_text) {
            (Some(text), _) => Some(text.to_owned()),
            (None, MissingText::PassThrough) => None,
            (None, MissingText::Empty) => Some(String::new()),
            (None, MissingText::Reject) => return Err(BridgeError::MissingText),
        };

        let id = TodoId::from_uuid(self.ids.next_id());

        let creation = match self.config.mode {
            BridgeMode::Reconstruct => Creation::Created(CreatedTodo::new(id, text)),
            BridgeMode::InPlace => {
                let mut submission = submission;
                if submission.text().is_none() {
                    if let Some(text) = text {
                        submission.insert("text", text);
                    }
                }
                Creation::Enriched(EnrichedTodo::new(id, submission))
            },
        };

        Ok(creation)
    }

    /// Bridge every submission until the submission port closes
    ///
    /// Submissions are handled one at a time, so creations leave in the
    /// order their submissions arrived. Rejected submissions are logged and
    /// skipped.
    ///
    /// Returns the number of creations sent.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Port`] if the creation port closes.
    #[tracing::instrument(skip_all, name = "bridge", fields(mode = %self.config.mode))]
    pub async fn run(
        self,
        mut submissions: PortReceiver<Submission>,
        creations: PortSender<Creation>,
    ) -> Result<u64, BridgeError> {
        tracing::info!(
            from = submissions.name(),
            to = creations.name(),
            "Bridge started"
        );

        let mut sent = 0_u64;
        while let Some(submission) = submissions.recv().await {
            match self.bridge(submission) {
                Ok(creation) => {
                    tracing::debug!(id = %creation.id(), "Assigned identifier");
                    creations.send(creation)?;
                    metrics::counter!("bridge.todos.created").increment(1);
                    sent += 1;
                },
                Err(BridgeError::MissingText) => {
                    tracing::warn!("Rejected submission without text");
                    metrics::counter!("bridge.todos.rejected").increment(1);
                },
                Err(error) => return Err(error),
            }
        }

        tracing::info!(sent, "Submission port closed, bridge stopped");
        Ok(sent)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use todo_ports_core::environment::RandomIdGenerator;
    use todo_ports_core::port;
    use todo_ports_testing::properties::is_uuid_v4_text;
    use todo_ports_testing::{SequentialIdGenerator, drain};

    fn bridge(config: BridgeConfig) -> Bridge {
        Bridge::new(config, Arc::new(SequentialIdGenerator::new()))
    }

    #[test]
    fn reconstruct_keeps_only_id_text_done() {
        let creation = bridge(BridgeConfig::default())
            .bridge(Submission::with_text("Buy milk").with_field("priority", 3))
            .unwrap();

        assert_eq!(
            serde_json::to_value(&creation).unwrap(),
            json!({
                "id": "00000000-0000-4000-8000-000000000001",
                "text": "Buy milk",
                "done": false
            })
        );
    }

    #[test]
    fn reconstruct_resets_done() {
        let creation = bridge(BridgeConfig::default())
            .bridge(Submission::with_text("x").with_field("done", true))
            .unwrap();
        assert!(!creation.done());
    }

    #[test]
    fn in_place_adds_id_and_keeps_fields() {
        let creation = bridge(BridgeConfig::new(BridgeMode::InPlace))
            .bridge(Submission::with_text("Buy milk").with_field("done", true))
            .unwrap();

        assert_eq!(
            serde_json::to_value(&creation).unwrap(),
            json!({
                "id": "00000000-0000-4000-8000-000000000001",
                "text": "Buy milk",
                "done": true
            })
        );
    }

    #[test]
    fn missing_text_pass_through() {
        let creation = bridge(BridgeConfig::default())
            .bridge(Submission::new())
            .unwrap();
        assert_eq!(
            serde_json::to_value(&creation).unwrap(),
            json!({ "id": "00000000-0000-4000-8000-000000000001", "done": false })
        );
    }

    #[test]
    fn missing_text_empty() {
        let config = BridgeConfig::default().with_missing_text(MissingText::Empty);
        let creation = bridge(config).bridge(Submission::new()).unwrap();
        assert_eq!(creation.text(), Some(""));

        let config = BridgeConfig::new(BridgeMode::InPlace).with_missing_text(MissingText::Empty);
        let creation = bridge(config)
            .bridge(Submission::new().with_field("text", 7).with_field("tag", "a"))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&creation).unwrap(),
            json!({ "id": "00000000-0000-4000-8000-000000000001", "text": "", "tag": "a" })
        );
    }

    #[test]
    fn missing_text_reject_draws_no_id() {
        let ids = Arc::new(SequentialIdGenerator::new());
        let config = BridgeConfig::default().with_missing_text(MissingText::Reject);
        let bridge = Bridge::new(config, ids.clone());

        assert!(matches!(
            bridge.bridge(Submission::new()),
            Err(BridgeError::MissingText)
        ));
        assert_eq!(ids.issued(), 0);
        assert!(bridge.bridge(Submission::with_text("ok")).is_ok());
    }

    #[test]
    fn identical_submissions_get_different_ids() {
        let bridge = Bridge::new(BridgeConfig::default(), Arc::new(RandomIdGenerator));
        let a = bridge.bridge(Submission::with_text("same")).unwrap();
        let b = bridge.bridge(Submission::with_text("same")).unwrap();

        assert_ne!(a.id(), b.id());
        assert!(is_uuid_v4_text(&a.id().to_string()));
        assert!(is_uuid_v4_text(&b.id().to_string()));
    }

    #[test]
    fn parse_mode_and_policy() {
        assert_eq!("in-place".parse::<BridgeMode>(), Ok(BridgeMode::InPlace));
        assert_eq!(" Reconstruct ".parse::<BridgeMode>(), Ok(BridgeMode::Reconstruct));
        assert!("sideways".parse::<BridgeMode>().is_err());

        assert_eq!("pass-through".parse::<MissingText>(), Ok(MissingText::PassThrough));
        assert_eq!("REJECT".parse::<MissingText>(), Ok(MissingText::Reject));
        assert!("ignore".parse::<MissingText>().is_err());

        assert_eq!(BridgeMode::InPlace.to_string(), "in-place");
        assert_eq!(MissingText::PassThrough.to_string(), "pass-through");
    }

    #[test]
    fn admits() {
        assert!(MissingText::Reject.admits(&Submission::with_text("")));
        assert!(!MissingText::Reject.admits(&Submission::new()));
        assert!(MissingText::PassThrough.admits(&Submission::new()));
    }

    #[tokio::test]
    async fn run_preserves_order_and_skips_rejects() {
        let (submit, submissions) = port::channel("addTodo");
        let (creations, mut created) = port::channel("addedTodo");
        let config = BridgeConfig::default().with_missing_text(MissingText::Reject);

        submit.send(Submission::with_text("A")).unwrap();
        submit.send(Submission::new()).unwrap();
        submit.send(Submission::with_text("B")).unwrap();
        drop(submit);

        let sent = bridge(config).run(submissions, creations).await.unwrap();

        assert_eq!(sent, 2);
        let texts: Vec<_> = drain(&mut created)
            .iter()
            .map(|c| c.text().map(str::to_owned))
            .collect();
        assert_eq!(texts, [Some("A".to_string()), Some("B".to_string())]);
    }

    #[tokio::test]
    async fn run_fails_when_creation_port_closes() {
        let (submit, submissions) = port::channel("addTodo");
        let (creations, created) = port::channel::<Creation>("addedTodo");
        drop(created);

        submit.send(Submission::with_text("A")).unwrap();

        let error = bridge(BridgeConfig::default())
            .run(submissions, creations)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "port 'addedTodo' is closed");
    }
}
