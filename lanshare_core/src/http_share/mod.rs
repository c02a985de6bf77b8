//! HTTP file sharing module
//!
//! Password-protected upload, listing and download endpoints.

pub mod handlers;
pub mod server;

pub use handlers::{CHUNK_SIZE, UPLOAD_FIELD};
pub use server::{HTTP_PORT, create_router, start_default_http_server, start_http_server};

use crate::ShareEvent;
use crate::auth::AuthGate;
use crate::storage::FileStore;
use tokio::sync::mpsc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ShareState {
    pub auth: AuthGate,
    pub store: FileStore,
    pub event_tx: mpsc::Sender<ShareEvent>,
}
