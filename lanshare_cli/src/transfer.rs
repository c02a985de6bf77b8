//! `lanshare list`, `upload` and `download`

use console::{Term, style};
use lanshare_core::client::{download_file, upload_files};
use lanshare_core::progress::{Viewport, render_line};
use lanshare_core::{
    ControlCommand, Direction, SessionState, ShareClient, ShareError, TransferOutcome,
    TransferUpdate,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub async fn list(url: &str, password: &str) -> anyhow::Result<()> {
    let client = ShareClient::new(url, password)?;
    let files = client.list_files().await?;
    if files.is_empty() {
        println!("No files shared yet");
    }
    for name in files {
        println!("{}", name);
    }
    Ok(())
}

pub async fn upload(url: &str, password: &str, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let client = ShareClient::new(url, password)?;
    let (commands, updates, display) = attach_terminal();
    let outcome = upload_files(&client, &files, commands, updates).await;
    report(display, outcome).await
}

pub async fn download(url: &str, password: &str, name: &str, out: &Path) -> anyhow::Result<()> {
    let client = ShareClient::new(url, password)?;
    let (commands, updates, display) = attach_terminal();
    let outcome = download_file(&client, name, out, commands, updates).await;
    report(display, outcome).await
}

/// Wire stdin and Ctrl-C to transfer commands and the terminal to updates
fn attach_terminal() -> (
    mpsc::Receiver<ControlCommand>,
    mpsc::UnboundedSender<TransferUpdate>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let (update_tx, update_rx) = mpsc::unbounded_channel();

    // A plain thread: a blocking stdin read cannot be cancelled and would
    // hold up runtime shutdown
    let stdin_tx = cmd_tx.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = parse_command(&line) {
                if stdin_tx.blocking_send(command).is_err() {
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_tx.send(ControlCommand::Cancel).await;
        }
    });

    let display = tokio::spawn(render_updates(update_rx));
    (cmd_rx, update_tx, display)
}

fn parse_command(line: &str) -> Option<ControlCommand> {
    match line.trim() {
        "p" | "pause" => Some(ControlCommand::Pause),
        "r" | "resume" => Some(ControlCommand::Resume),
        "c" | "cancel" => Some(ControlCommand::Cancel),
        _ => None,
    }
}

async fn render_updates(mut updates: mpsc::UnboundedReceiver<TransferUpdate>) {
    let term = Term::stderr();
    while let Some(update) = updates.recv().await {
        let _ = draw(&term, update);
    }
}

fn draw(term: &Term, update: TransferUpdate) -> std::io::Result<()> {
    match update {
        TransferUpdate::Started {
            direction,
            identifier,
            total_bytes,
        } => {
            let verb = match direction {
                Direction::Upload => "Uploading",
                Direction::Download => "Downloading",
            };
            let size = total_bytes
                .map(|b| format!("{} bytes", b))
                .unwrap_or_else(|| "unknown size".to_string());
            term.write_line(&format!("{} {} ({})", style(verb).bold(), identifier, size))?;
            term.write_line(&format!(
                "{}",
                style("Type p, r or c and Enter to pause, resume or cancel").dim()
            ))?;
        }
        TransferUpdate::Progress(snapshot) => {
            let (_, columns) = term.size();
            term.clear_line()?;
            term.write_str(&render_line(&snapshot.progress(), Viewport::Columns(columns)))?;
        }
        TransferUpdate::StateChanged(state) => {
            let label = match state {
                SessionState::Active => style("resumed").green(),
                SessionState::Paused => style("paused").yellow(),
                SessionState::Completed => style("completed").green().bold(),
                SessionState::Cancelled => style("cancelled").yellow(),
                SessionState::Failed => style("failed").red(),
            };
            term.clear_line()?;
            term.write_line(&format!("{}", label))?;
        }
        TransferUpdate::Restarted => {
            term.clear_line()?;
            term.write_line("Sending again from the beginning")?;
        }
        TransferUpdate::Failed { reason } => {
            term.clear_line()?;
            term.write_line(&format!("{} {}", style("failed:").red().bold(), reason))?;
        }
    }
    Ok(())
}

async fn report(
    display: JoinHandle<()>,
    outcome: Result<TransferOutcome, ShareError>,
) -> anyhow::Result<()> {
    // The driver dropped its sender, so the display drains and stops
    let _ = display.await;

    let outcome = outcome?;
    match outcome.state {
        SessionState::Completed => {
            if let Some(detail) = outcome.detail {
                println!("{}", detail);
            }
        }
        state => println!(
            "{} {} after {} bytes",
            outcome.identifier, state, outcome.transferred_bytes
        ),
    }
    Ok(())
}
