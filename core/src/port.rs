//! Typed ports between the application core and its collaborators.
//!
//! A port is a named, unbounded, first-in first-out channel with typed
//! payloads. Each direction of a conversation gets its own port:
//!
//! ```text
//! ┌──────────────────┐   addTodo (Submission)   ┌──────────────┐
//! │ Application core │ ───────────────────────► │    Bridge    │
//! │     (Store)      │ ◄─────────────────────── │              │
//! └──────────────────┘   addedTodo (Creation)   └──────────────┘
//! ```
//!
//! Senders are cheap to clone; the receiving side has exactly one owner.
//! Messages are delivered in the order they were sent.
//!
//! # Example
//!
//! ```
//! use todo_ports_core::port;
//!
//! let (tx, mut rx) = port::channel::<String>("addTodo");
//! tx.send("Buy milk".to_string()).ok();
//! assert_eq!(rx.try_recv(), Some("Buy milk".to_string()));
//! ```

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while talking through a port
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The receiving side of the port has been dropped or closed
    #[error("port '{port}' is closed")]
    Closed {
        /// Name of the port
        port: &'static str,
    },
}

/// Create a named port, returning its sending and receiving halves
#[must_use]
pub fn channel<T>(name: &'static str) -> (PortSender<T>, PortReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PortSender { name, tx }, PortReceiver { name, rx })
}

/// Sending half of a port
#[derive(Debug)]
pub struct PortSender<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> PortSender<T> {
    /// Send a message without waiting
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Closed`] if the receiving half is gone.
    pub fn send(&self, message: T) -> Result<(), PortError> {
        self.tx
            .send(message)
            .map_err(|_| PortError::Closed { port: self.name })
    }

    /// Name of the port
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true once the receiving half has been dropped or closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for PortSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

/// Receiving half of a port
#[derive(Debug)]
pub struct PortReceiver<T> {
    name: &'static str,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> PortReceiver<T> {
    /// Wait for the next message
    ///
    /// Returns `None` once every sender has been dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next buffered message, if any
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting messages; already buffered messages can still be received
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Name of the port
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}
