//! Session controller
//!
//! Holds at most one live session together with the transport handle that
//! feeds it (a response stream, an in-flight request, an open file...).

use super::state::{Direction, Resumption, SessionError, SessionState, TransferSession};

/// Owner of the current session and its swappable transport handle
pub struct SessionController<H> {
    session: Option<TransferSession>,
    handle: Option<H>,
}

impl<H> Default for SessionController<H> {
    fn default() -> Self {
        Self {
            session: None,
            handle: None,
        }
    }
}

impl<H> SessionController<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new session, replacing a terminal one.
    ///
    /// Fails while the current session is still active or paused.
    pub fn start(
        &mut self,
        direction: Direction,
        identifier: impl Into<String>,
        total_bytes: Option<u64>,
        handle: H,
    ) -> Result<&TransferSession, SessionError> {
        if let Some(current) = &self.session {
            if !current.state().is_terminal() {
                return Err(SessionError::InvalidState {
                    operation: "start over",
                    state: current.state(),
                });
            }
        }

        self.handle = Some(handle);
        Ok(self
            .session
            .insert(TransferSession::start(direction, identifier, total_bytes)))
    }

    pub fn session(&self) -> Option<&TransferSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(TransferSession::state)
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    fn session_mut(&mut self, operation: &'static str) -> Result<&mut TransferSession, SessionError> {
        self.session
            .as_mut()
            .ok_or(SessionError::NoSession { operation })
    }

    pub fn on_chunk(&mut self, n: u64) -> Result<(), SessionError> {
        self.session_mut("accept bytes")?.on_chunk(n)
    }

    /// Pause the session. An upload request cannot be suspended mid-body, so
    /// its handle is dropped (aborting the request); a download keeps its
    /// stream open at the current position.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        let session = self.session_mut("pause")?;
        session.pause()?;
        if session.direction() == Direction::Upload {
            self.handle = None;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<Resumption, SessionError> {
        let resumption = self.session_mut("resume")?.resume()?;
        if resumption == Resumption::Restart {
            self.handle = None;
        }
        Ok(resumption)
    }

    /// Cancel and release the handle before returning. Calling it again, or
    /// on a finished session, does nothing.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.session.as_mut().is_some_and(TransferSession::cancel);
        if cancelled {
            self.handle = None;
        }
        cancelled
    }

    pub fn complete(&mut self) -> Result<(), SessionError> {
        self.session_mut("complete")?.complete()?;
        self.handle = None;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.session_mut("fail")?.fail(reason)?;
        self.handle = None;
        Ok(())
    }
}
