//! Transfer session state machine
//!
//! One `TransferSession` tracks one upload or download: byte counters, the
//! active-transfer clock and the pause/cancel state.

use crate::progress::{Progress, ProgressSnapshot};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Which way the bytes flow, seen from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    /// Terminal sessions accept no further bytes or commands
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Illegal operation on a session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {operation} a {state} session")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("chunk of {chunk} bytes would exceed the expected {total} bytes ({transferred} received)")]
    Overflow {
        chunk: u64,
        transferred: u64,
        total: u64,
    },
    #[error("transfer ended after {transferred} of {total} bytes")]
    Incomplete { transferred: u64, total: u64 },
    #[error("cannot {operation}: no transfer has been started")]
    NoSession { operation: &'static str },
}

/// What the caller has to do after a successful `resume()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumption {
    /// Keep reading the retained stream from where it stopped
    Continue,
    /// The session was discarded; start a new transfer from byte 0
    Restart,
}

/// Live state of one upload or download
#[derive(Debug, Clone)]
pub struct TransferSession {
    direction: Direction,
    identifier: String,
    total_bytes: Option<u64>,
    transferred_bytes: u64,
    started_at: Instant,
    state: SessionState,
    failure: Option<String>,
}

impl TransferSession {
    /// Create a session in `Active` with zeroed counters
    pub fn start(direction: Direction, identifier: impl Into<String>, total_bytes: Option<u64>) -> Self {
        Self {
            direction,
            identifier: identifier.into(),
            total_bytes,
            transferred_bytes: 0,
            started_at: Instant::now(),
            state: SessionState::Active,
            failure: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reason recorded by `fail()`, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Account for `n` bytes moved by the transport
    pub fn on_chunk(&mut self, n: u64) -> Result<(), SessionError> {
        self.require("accept bytes on", &[SessionState::Active])?;

        let next = self.transferred_bytes.saturating_add(n);
        if let Some(total) = self.total_bytes {
            if next > total {
                return Err(SessionError::Overflow {
                    chunk: n,
                    transferred: self.transferred_bytes,
                    total,
                });
            }
        }

        self.transferred_bytes = next;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.require("pause", &[SessionState::Active])?;
        self.state = SessionState::Paused;
        Ok(())
    }

    /// Leave `Paused`.
    ///
    /// Downloads go back to `Active` with a fresh clock so speed and ETA only
    /// cover the time since the resume. Uploads cannot continue a request that
    /// was aborted, so the session is discarded and the caller must start over.
    pub fn resume(&mut self) -> Result<Resumption, SessionError> {
        self.require("resume", &[SessionState::Paused])?;
        match self.direction {
            Direction::Download => {
                self.state = SessionState::Active;
                self.started_at = Instant::now();
                Ok(Resumption::Continue)
            }
            Direction::Upload => {
                self.state = SessionState::Cancelled;
                Ok(Resumption::Restart)
            }
        }
    }

    /// Move to `Cancelled`. Returns `false` (and changes nothing) when the
    /// session is already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = SessionState::Cancelled;
        true
    }

    /// Mark the transfer finished. With a known total every byte must have
    /// been accounted for.
    pub fn complete(&mut self) -> Result<(), SessionError> {
        self.require("complete", &[SessionState::Active])?;
        if let Some(total) = self.total_bytes {
            if self.transferred_bytes != total {
                return Err(SessionError::Incomplete {
                    transferred: self.transferred_bytes,
                    total,
                });
            }
        }
        self.state = SessionState::Completed;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.require("fail", &[SessionState::Active, SessionState::Paused])?;
        self.state = SessionState::Failed;
        self.failure = Some(reason.into());
        Ok(())
    }

    /// Raw counters for the progress reporter
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            transferred_bytes: self.transferred_bytes,
            total_bytes: self.total_bytes,
            elapsed: self.started_at.elapsed(),
        }
    }

    pub fn progress(&self) -> Progress {
        self.snapshot().progress()
    }
}
