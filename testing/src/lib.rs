//! # Todo Ports Testing
//!
//! Testing utilities and helpers for the Todo Ports architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - Port helpers
//! - Property-based testing strategies
//! - A Given-When-Then builder and assertion helpers for reducers
//!
//! ## Example
//!
//! ```ignore
//! use todo_ports_testing::{test_clock, SequentialIdGenerator};
//!
//! #[tokio::test]
//! async fn submissions_get_identifiers() {
//!     let app = App::builder(AppConfig::default())
//!         .with_clock(test_clock())
//!         .with_ids(SequentialIdGenerator::new())
//!         .start()
//!         .await?;
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use todo_ports_core::environment::{Clock, IdGenerator};


/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::{Builder, Uuid};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use todo_ports_testing::mocks::FixedClock;
    /// use todo_ports_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable identifiers for deterministic tests
    ///
    /// The n-th identifier carries `n` in its low bytes and still has the
    /// version 4 and RFC 4122 variant bits set, so it passes the same shape
    /// checks as a random one.
    ///
    /// ```
    /// use todo_ports_testing::SequentialIdGenerator;
    /// use todo_ports_core::environment::IdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new();
    /// assert_eq!(ids.next_id().to_string(), "00000000-0000-4000-8000-000000000001");
    /// assert_eq!(ids.next_id().to_string(), "00000000-0000-4000-8000-000000000002");
    /// ```
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Start the sequence at 1
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        /// Number of identifiers handed out so far
        #[must_use]
        pub fn issued(&self) -> u64 {
            self.next.load(Ordering::SeqCst)
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> Uuid {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            let mut bytes = [0u8; 16];
            bytes[8..].copy_from_slice(&n.to_be_bytes());
            Builder::from_random_bytes(bytes).into_uuid()
        }
    }
}

/// Port helpers.
pub mod helpers {
    use todo_ports_core::port::PortReceiver;

    /// Take every message currently buffered on a port
    pub fn drain<T>(receiver: &mut PortReceiver<T>) -> Vec<T> {
        std::iter::from_fn(|| receiver.try_recv()).collect()
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Printable to-do text, including empty and whitespace-only strings
    pub fn todo_text() -> impl Strategy<Value = String> {
        "[ -~]{0,64}"
    }

    /// Returns true if `text` is a canonical UUID version 4 rendering:
    /// 8-4-4-4-12 lowercase hex digits, version nibble `4`, variant nibble
    /// one of `8`, `9`, `a`, `b`.
    #[must_use]
    pub fn is_uuid_v4_text(text: &str) -> bool {
        let groups: Vec<&str> = text.split('-').collect();
        let lengths_ok = groups.len() == 5
            && groups
                .iter()
                .zip([8, 4, 4, 4, 12])
                .all(|(group, len)| group.len() == len);
        let digits_ok = text
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c));

        lengths_ok
            && digits_ok
            && groups[2].starts_with('4')
            && groups[3].starts_with(['8', '9', 'a', 'b'])
    }
}

// Re-export commonly used items
pub use helpers::drain;
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;
    use todo_ports_core::environment::RandomIdGenerator;
    use todo_ports_core::port;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn sequential_ids_are_v4_shaped() {
        let ids = SequentialIdGenerator::new();
        for _ in 0..3 {
            let id = ids.next_id();
            assert_eq!(id.get_version_num(), 4);
            assert!(properties::is_uuid_v4_text(&id.to_string()));
        }
        assert_eq!(ids.issued(), 3);
    }

    #[test]
    fn uuid_shape_check() {
        assert!(properties::is_uuid_v4_text(
            &RandomIdGenerator.next_id().to_string()
        ));
        assert!(!properties::is_uuid_v4_text(""));
        assert!(!properties::is_uuid_v4_text(
            "00000000-0000-1000-8000-000000000001"
        ));
        assert!(!properties::is_uuid_v4_text(
            "00000000-0000-4000-c000-000000000001"
        ));
        assert!(!properties::is_uuid_v4_text(
            "00000000-0000-4000-8000-00000000000A"
        ));
        assert!(!properties::is_uuid_v4_text("0000000000004000800000000000001"));
    }

    #[test]
    fn drain_takes_buffered_messages() {
        let (tx, mut rx) = port::channel("numbers");
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(drain(&mut rx), vec![1, 2]);
        assert!(drain(&mut rx).is_empty());
    }
}
