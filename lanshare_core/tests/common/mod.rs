#![allow(dead_code)]

use lanshare_core::config::DEFAULT_MAX_UPLOAD_BYTES;
use lanshare_core::http_share::create_router;
use lanshare_core::storage::FileStore;
use lanshare_core::{AuthGate, ShareClient, ShareEvent, ShareState, TransferUpdate};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "correct-horse-42";

pub struct TestServer {
    pub url: String,
    pub dir: PathBuf,
    pub events: mpsc::Receiver<ShareEvent>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Real server on an ephemeral loopback port, storing into a fresh temp dir
    pub async fn start() -> Self {
        tracing_subscriber::fmt()
            .with_env_filter("info")
            .try_init()
            .ok();

        let dir = temp_dir("lanshare_server");
        let (event_tx, events) = mpsc::channel(100);
        let state = ShareState {
            auth: AuthGate::new(PASSWORD),
            store: FileStore::new(dir.clone()),
            event_tx,
        };
        let router = create_router(state, None, DEFAULT_MAX_UPLOAD_BYTES);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            dir,
            events,
            handle,
        }
    }

    pub fn client(&self) -> ShareClient {
        ShareClient::new(&self.url, PASSWORD).unwrap()
    }

    /// Wait until the server reports a failed upload part
    pub async fn upload_failed(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = self.events.recv().await {
                if matches!(event, ShareEvent::UploadFailed { .. }) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}_{}", prefix, uuid::Uuid::new_v4()))
}

/// Deterministic, non-repeating-per-chunk content
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub async fn wait_for(
    updates: &mut mpsc::UnboundedReceiver<TransferUpdate>,
    wanted: impl Fn(&TransferUpdate) -> bool,
) -> TransferUpdate {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match updates.recv().await {
                Some(update) if wanted(&update) => return update,
                Some(_) => continue,
                None => panic!("transfer stopped reporting before the expected update"),
            }
        }
    })
    .await
    .expect("timed out waiting for transfer update")
}
