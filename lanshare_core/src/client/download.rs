//! Pausable download driver

use super::transfer::{ControlCommand, Reporter, TransferOutcome, TransferUpdate};
use super::ShareClient;
use crate::error::ShareError;
use crate::session::{Direction, SessionController, SessionState};
use crate::storage::{open_secure_file, validate_file_name};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// The response body being read and the local file it is written to.
/// While paused the body is simply not polled, so the connection stays open.
struct DownloadHandle {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    file: File,
}

/// Download `file_name` into `dest_dir`, obeying `commands` between chunks.
///
/// Returns the outcome for completed and cancelled downloads; a cancelled or
/// failed download leaves no partial file behind.
pub async fn download_file(
    client: &ShareClient,
    file_name: &str,
    dest_dir: &Path,
    mut commands: mpsc::Receiver<ControlCommand>,
    updates: mpsc::UnboundedSender<TransferUpdate>,
) -> Result<TransferOutcome, ShareError> {
    validate_file_name(file_name)?;
    let remote = client.open_download(file_name).await?;

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| ShareError::Storage(format!("Cannot create {}: {}", dest_dir.display(), e)))?;
    let dest = dest_dir.join(file_name);
    let file = open_secure_file(&dest)
        .await
        .map_err(|e| ShareError::Storage(format!("Cannot create {}: {}", dest.display(), e)))?;

    let mut reporter = Reporter::new(updates);
    let mut controller = SessionController::new();
    controller.start(
        Direction::Download,
        file_name,
        remote.total_bytes,
        DownloadHandle {
            body: remote.body,
            file,
        },
    )?;
    reporter.send(TransferUpdate::Started {
        direction: Direction::Download,
        identifier: file_name.to_string(),
        total_bytes: remote.total_bytes,
    });
    tracing::info!("Downloading {} ({:?} bytes)", file_name, remote.total_bytes);

    let mut commands_open = true;
    let result: Result<(), ShareError> = loop {
        if controller.state() == Some(SessionState::Paused) {
            // Nobody left to resume us once the channel is closed
            match commands.recv().await {
                Some(ControlCommand::Resume) => {
                    if let Err(e) = controller.resume() {
                        break Err(e.into());
                    }
                    reporter.state(&controller);
                }
                Some(ControlCommand::Cancel) | None => {
                    controller.cancel();
                    reporter.state(&controller);
                    break Ok(());
                }
                Some(ControlCommand::Pause) => {}
            }
            continue;
        }

        let Some(handle) = controller.handle_mut() else {
            break Err(ShareError::transport("download stream was released"));
        };

        tokio::select! {
            biased;

            command = commands.recv(), if commands_open => match command {
                Some(ControlCommand::Pause) => {
                    if let Err(e) = controller.pause() {
                        break Err(e.into());
                    }
                    reporter.state(&controller);
                }
                Some(ControlCommand::Cancel) => {
                    controller.cancel();
                    reporter.state(&controller);
                    break Ok(());
                }
                Some(ControlCommand::Resume) => {}
                None => commands_open = false,
            },

            chunk = handle.body.next() => match chunk {
                Some(Ok(bytes)) => {
                    if let Err(e) = controller.on_chunk(bytes.len() as u64) {
                        break Err(e.into());
                    }
                    if let Some(handle) = controller.handle_mut() {
                        if let Err(e) = handle.file.write_all(&bytes).await {
                            break Err(ShareError::Storage(format!("Write error: {}", e)));
                        }
                    }
                    reporter.progress(&controller, false);
                }
                Some(Err(e)) => break Err(ShareError::transport(e)),
                None => {
                    if let Some(handle) = controller.handle_mut() {
                        if let Err(e) = handle.file.flush().await {
                            break Err(ShareError::Storage(format!("Flush error: {}", e)));
                        }
                    }
                    if let Err(e) = controller.complete() {
                        break Err(e.into());
                    }
                    reporter.progress(&controller, true);
                    reporter.state(&controller);
                    break Ok(());
                }
            },
        }
    };

    match result {
        Ok(()) => {
            let Some(session) = controller.session() else {
                return Err(ShareError::transport("download session vanished"));
            };
            if session.state() == SessionState::Cancelled {
                tracing::info!("Download of {} cancelled", file_name);
                remove_partial(&dest).await;
                return Ok(TransferOutcome::from_session(session, None));
            }

            tracing::info!(
                "Downloaded {} ({} bytes) to {}",
                file_name,
                session.transferred_bytes(),
                dest.display()
            );
            Ok(TransferOutcome::from_session(
                session,
                Some(dest.display().to_string()),
            ))
        }
        Err(err) => {
            let reason = err.to_string();
            let _ = controller.fail(reason.clone());
            reporter.send(TransferUpdate::Failed {
                reason: reason.clone(),
            });
            remove_partial(&dest).await;
            tracing::error!("Download of {} failed: {}", file_name, reason);
            Err(err)
        }
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove partial download {:?}: {}", path, e);
        }
    }
}
