//! Pausable upload driver
//!
//! A multipart request body cannot be suspended halfway, so pausing aborts
//! the request and resuming sends every file again from the first byte.

use super::transfer::{ControlCommand, Reporter, TransferOutcome, TransferUpdate};
use super::{ShareClient, UploadItem, prepare_uploads};
use crate::error::ShareError;
use crate::session::{Direction, Resumption, SessionController, SessionState};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

type UploadRequest = Pin<Box<dyn Future<Output = Result<String, ShareError>> + Send>>;

/// One attempt at the request, plus the byte counts its body reports.
/// Dropping it aborts the request.
struct UploadHandle {
    request: UploadRequest,
    chunks: mpsc::UnboundedReceiver<u64>,
}

fn begin_attempt(client: &ShareClient, items: &Arc<[UploadItem]>) -> UploadHandle {
    let (chunk_tx, chunks) = mpsc::unbounded_channel();
    let client = client.clone();
    let items = Arc::clone(items);
    UploadHandle {
        request: Box::pin(async move { client.upload(&items, chunk_tx).await }),
        chunks,
    }
}

/// Upload `paths` in a single request, obeying `commands` between chunks.
///
/// Returns the outcome for completed and cancelled uploads. For a completed
/// upload `detail` holds the server's summary.
pub async fn upload_files(
    client: &ShareClient,
    paths: &[PathBuf],
    mut commands: mpsc::Receiver<ControlCommand>,
    updates: mpsc::UnboundedSender<TransferUpdate>,
) -> Result<TransferOutcome, ShareError> {
    let items: Arc<[UploadItem]> = prepare_uploads(paths).await?.into();
    let identifier = items
        .iter()
        .map(|item| item.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let total: u64 = items.iter().map(|item| item.size).sum();

    let mut reporter = Reporter::new(updates);
    let mut controller = SessionController::new();
    controller.start(
        Direction::Upload,
        identifier.clone(),
        Some(total),
        begin_attempt(client, &items),
    )?;
    reporter.send(TransferUpdate::Started {
        direction: Direction::Upload,
        identifier: identifier.clone(),
        total_bytes: Some(total),
    });
    tracing::info!("Uploading {} ({} bytes)", identifier, total);

    let mut summary: Option<String> = None;
    let mut commands_open = true;
    let result: Result<(), ShareError> = loop {
        if controller.state() == Some(SessionState::Paused) {
            match commands.recv().await {
                Some(ControlCommand::Resume) => match controller.resume() {
                    Ok(Resumption::Restart) => {
                        let restarted = controller.start(
                            Direction::Upload,
                            identifier.clone(),
                            Some(total),
                            begin_attempt(client, &items),
                        );
                        if let Err(e) = restarted {
                            break Err(e.into());
                        }
                        tracing::info!("Restarting upload of {}", identifier);
                        reporter.send(TransferUpdate::Restarted);
                        reporter.state(&controller);
                    }
                    Ok(Resumption::Continue) => reporter.state(&controller),
                    Err(e) => break Err(e.into()),
                },
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
            break Err(ShareError::transport("upload request was released"));
        };

        tokio::select! {
            biased;

            command = commands.recv(), if commands_open => match command {
                Some(ControlCommand::Pause) => {
                    if let Err(e) = controller.pause() {
                        break Err(e.into());
                    }
                    tracing::info!("Upload of {} paused, request aborted", identifier);
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

            Some(n) = handle.chunks.recv() => {
                if let Err(e) = controller.on_chunk(n) {
                    break Err(e.into());
                }
                reporter.progress(&controller, false);
            },

            response = &mut handle.request => {
                // Counts sent just before the response arrived
                let mut pending = 0;
                if let Some(handle) = controller.handle_mut() {
                    while let Ok(n) = handle.chunks.try_recv() {
                        pending += n;
                    }
                }
                if pending > 0 {
                    if let Err(e) = controller.on_chunk(pending) {
                        break Err(e.into());
                    }
                }

                match response {
                    Ok(text) => {
                        if let Err(e) = controller.complete() {
                            break Err(e.into());
                        }
                        summary = Some(text);
                        reporter.progress(&controller, true);
                        reporter.state(&controller);
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                }
            },
        }
    };

    match result {
        Ok(()) => {
            let Some(session) = controller.session() else {
                return Err(ShareError::transport("upload session vanished"));
            };
            match session.state() {
                SessionState::Cancelled => tracing::info!("Upload of {} cancelled", identifier),
                _ => tracing::info!(
                    "Uploaded {} ({} bytes)",
                    identifier,
                    session.transferred_bytes()
                ),
            }
            Ok(TransferOutcome::from_session(session, summary))
        }
        Err(err) => {
            let reason = err.to_string();
            let _ = controller.fail(reason.clone());
            reporter.send(TransferUpdate::Failed {
                reason: reason.clone(),
            });
            tracing::error!("Upload of {} failed: {}", identifier, reason);
            Err(err)
        }
    }
}
