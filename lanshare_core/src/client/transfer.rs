//! Control and reporting types shared by the upload and download drivers

use crate::progress::ProgressSnapshot;
use crate::session::{Direction, SessionController, SessionState, TransferSession};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Minimum spacing between two progress updates
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Command sent by the user to a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Cancel,
}

/// What a running transfer reports back to its caller
#[derive(Debug, Clone, PartialEq)]
pub enum TransferUpdate {
    Started {
        direction: Direction,
        identifier: String,
        total_bytes: Option<u64>,
    },
    Progress(ProgressSnapshot),
    StateChanged(SessionState),
    /// An upload was resumed by sending it again from the first byte
    Restarted,
    Failed {
        reason: String,
    },
}

/// Final state of a transfer that was not aborted by an error
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub direction: Direction,
    pub identifier: String,
    pub state: SessionState,
    pub transferred_bytes: u64,
    /// Server summary for uploads, destination path for downloads
    pub detail: Option<String>,
}

impl TransferOutcome {
    pub(crate) fn from_session(session: &TransferSession, detail: Option<String>) -> Self {
        Self {
            direction: session.direction(),
            identifier: session.identifier().to_string(),
            state: session.state(),
            transferred_bytes: session.transferred_bytes(),
            detail,
        }
    }
}

/// Sender side for updates. A caller that stopped listening is ignored.
pub(crate) struct Reporter {
    updates: mpsc::UnboundedSender<TransferUpdate>,
    last_progress: Option<Instant>,
}

impl Reporter {
    pub(crate) fn new(updates: mpsc::UnboundedSender<TransferUpdate>) -> Self {
        Self {
            updates,
            last_progress: None,
        }
    }

    pub(crate) fn send(&self, update: TransferUpdate) {
        let _ = self.updates.send(update);
    }

    pub(crate) fn state<H>(&self, controller: &SessionController<H>) {
        if let Some(state) = controller.state() {
            self.send(TransferUpdate::StateChanged(state));
        }
    }

    /// Report progress at most every `PROGRESS_INTERVAL`, unless `force` is set
    pub(crate) fn progress<H>(&mut self, controller: &SessionController<H>, force: bool) {
        let now = Instant::now();
        let due = self
            .last_progress
            .is_none_or(|last| now.duration_since(last) >= PROGRESS_INTERVAL);
        if !(force || due) {
            return;
        }
        if let Some(session) = controller.session() {
            self.last_progress = Some(now);
            self.send(TransferUpdate::Progress(session.snapshot()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_throttled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reporter = Reporter::new(tx);
        let mut controller = SessionController::new();
        controller
            .start(Direction::Download, "a.txt", Some(10), ())
            .unwrap();

        reporter.progress(&controller, false);
        reporter.progress(&controller, false);
        reporter.progress(&controller, true);

        let mut count = 0;
        while let Ok(update) = rx.try_recv() {
            assert!(matches!(update, TransferUpdate::Progress(_)));
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_reporter_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let reporter = Reporter::new(tx);
        reporter.send(TransferUpdate::Restarted);
    }
}
