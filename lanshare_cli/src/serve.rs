//! `lanshare serve`

use anyhow::Context;
use clap::Args;
use lanshare_core::config::AppConfig;
use lanshare_core::http_share::{create_router, start_default_http_server};
use lanshare_core::share_info::{ShareInfo, local_lan_ip};
use lanshare_core::storage::FileStore;
use lanshare_core::{AuthGate, ShareEvent, ShareState};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory uploads are stored in and downloads are served from
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Directory with the web client, served without a password
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Do not copy the connection details to the clipboard
    #[arg(long)]
    pub no_clipboard: bool,

    /// Remember these settings as the defaults for later runs
    #[arg(long)]
    pub save_config: bool,
}

impl ServeArgs {
    /// Overlay the command line on a loaded config
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.dir {
            config.upload_dir = dir.clone();
        }
        if self.static_dir.is_some() {
            config.static_dir = self.static_dir.clone();
        }
    }
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load();
    args.apply(&mut config);
    if args.save_config {
        config.save().context("Saving config")?;
        tracing::info!("Saved settings to {:?}", AppConfig::config_path());
    }

    let store = FileStore::new(config.upload_dir.clone());
    store
        .ensure_dir()
        .await
        .with_context(|| format!("Preparing {}", config.upload_dir.display()))?;

    // A fresh secret for every run
    let auth = AuthGate::generate(config.password_length);
    let (event_tx, event_rx) = mpsc::channel(64);
    let state = ShareState {
        auth: auth.clone(),
        store,
        event_tx,
    };
    let router = create_router(state, config.static_dir.as_deref(), config.max_upload_bytes);

    let info = ShareInfo::new(local_lan_ip(), config.port, auth.secret());
    let host = hostname::get()
        .ok()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "Unknown-PC".to_string());

    println!("Sharing {} from {}", config.upload_dir.display(), host);
    println!();
    println!("{}", info.connection_text());
    match info.qr_code() {
        Ok(qr) => println!("\n{}", qr),
        Err(e) => tracing::warn!("Could not render QR code: {}", e),
    }
    println!();

    // Kept alive while serving; some platforms drop the contents with the handle
    let _clipboard = if args.no_clipboard {
        None
    } else {
        copy_to_clipboard(&info.connection_text())
    };

    tokio::spawn(print_events(event_rx));

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    start_default_http_server(config.port, router, Some(cancel_token)).await
}

/// Best effort: a headless machine has no clipboard, which is not worth failing over
fn copy_to_clipboard(text: &str) -> Option<arboard::Clipboard> {
    let mut clipboard = match arboard::Clipboard::new() {
        Ok(clipboard) => clipboard,
        Err(e) => {
            tracing::warn!("Clipboard unavailable: {}", e);
            return None;
        }
    };
    match clipboard.set_text(text) {
        Ok(()) => {
            println!("Connection details copied to the clipboard");
            Some(clipboard)
        }
        Err(e) => {
            tracing::warn!("Could not copy connection details to the clipboard: {}", e);
            None
        }
    }
}

async fn print_events(mut event_rx: mpsc::Receiver<ShareEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            ShareEvent::UploadReceived {
                upload_id,
                file_name,
                bytes,
            } => println!("[{}] received {} ({} bytes)", upload_id, file_name, bytes),
            ShareEvent::UploadFailed {
                upload_id,
                file_name,
                reason,
            } => println!("[{}] upload of {} failed: {}", upload_id, file_name, reason),
            ShareEvent::DownloadServed { file_name, bytes } => {
                println!("sent {} ({} bytes)", file_name, bytes)
            }
        }
    }
}
