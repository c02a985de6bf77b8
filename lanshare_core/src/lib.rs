//! Local-network file sharing: a password-guarded HTTP server plus a client
//! with pausable, progress-tracked transfers.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http_share;
pub mod progress;
pub mod session;
pub mod share_info;
pub mod storage;

pub use auth::{AUTH_HEADER, AuthGate};
pub use client::{ControlCommand, ShareClient, TransferOutcome, TransferUpdate};
pub use error::ShareError;
pub use http_share::ShareState;
pub use session::{Direction, SessionController, SessionState, TransferSession};

/// Report from the server to whoever runs it
#[derive(Debug, Clone)]
pub enum ShareEvent {
    /// A file part was stored completely
    UploadReceived {
        upload_id: String,
        file_name: String,
        bytes: u64,
    },
    /// A file part could not be stored; the partial file was removed
    UploadFailed {
        upload_id: String,
        file_name: String,
        reason: String,
    },
    /// A download response started streaming
    DownloadServed { file_name: String, bytes: u64 },
}
