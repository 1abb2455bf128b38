//! Threading primitives for probing
//!
//! Collaborators report progress from their own threads (a recorder's info
//! listener, a capture callback). `CompletionSignal` lets the probing thread
//! wait on such a report for a bounded time.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

/// One-shot completion signal with a bounded wait
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

/// Cloneable handle that fires a [`CompletionSignal`]
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Sender<()>,
}

impl Notifier {
    /// Signal completion. Repeated or late notifications are harmless.
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::trace!("Completion signal already dropped");
            }
        }
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Handle for the notifying side
    pub fn notifier(&self) -> Notifier {
        Notifier {
            tx: self.tx.clone(),
        }
    }

    /// Wait up to `timeout`. Returns `true` if signaled, `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                log::trace!("Signaled after {:?}", started.elapsed());
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            // Unreachable while self holds a sender
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Whether a notification is pending, without waiting
    pub fn is_signaled(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}
