//! Ctrl-C routing for the terminal.
//!
//! One handler lives for the whole process. While a reply is streaming,
//! Ctrl-C cancels that turn; at the prompt it exits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// Exit status after an interrupt at the prompt (128 + SIGINT).
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// A turn was in flight and has been cancelled.
    CancelledTurn,
    /// Nothing to cancel.
    Idle,
}

#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    /// Spawn the process-wide Ctrl-C handler. Call once, inside the runtime.
    #[must_use]
    pub fn install() -> Self {
        let interrupts = Self::default();
        let handler = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if handler.interrupt() == Interrupt::Idle {
                    eprintln!();
                    std::process::exit(INTERRUPTED_EXIT);
                }
            }
        });
        interrupts
    }

    /// Token for the turn about to start; Ctrl-C cancels it until [`Self::end_turn`].
    pub fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    pub fn end_turn(&self) {
        self.slot().take();
    }

    /// Cancel the turn in flight, if any. A second Ctrl-C in the same turn
    /// finds nothing left to cancel.
    pub fn interrupt(&self) -> Interrupt {
        match self.slot().take() {
            Some(token) => {
                token.cancel();
                Interrupt::CancelledTurn
            }
            None => Interrupt::Idle,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "interrupt_test.rs"]
mod tests;
