//! lanshare: share files over the local network
//!
//! `serve` publishes a directory behind a generated password; `list`,
//! `upload` and `download` talk to a running server.

mod serve;
mod transfer;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Password-protected file sharing on the local network
#[derive(Parser)]
#[command(name = "lanshare")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share a directory and print the URL, password and QR code
    Serve(serve::ServeArgs),

    /// List the files on a server
    List {
        #[command(flatten)]
        remote: Remote,
    },

    /// Upload files to a server
    Upload {
        #[command(flatten)]
        remote: Remote,

        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Download a file from a server
    Download {
        #[command(flatten)]
        remote: Remote,

        /// Name of the file on the server
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

/// Connection details printed by `lanshare serve`
#[derive(Args)]
struct Remote {
    /// Server URL, e.g. http://192.168.1.42:6969
    #[arg(short, long)]
    url: String,

    /// Server password
    #[arg(long, env = "LANSHARE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing, so a .env file can supply LANSHARE_PASSWORD
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve(args) => serve::run(args).await,
        Commands::List { remote } => transfer::list(&remote.url, &remote.password).await,
        Commands::Upload { remote, files } => {
            transfer::upload(&remote.url, &remote.password, files).await
        }
        Commands::Download { remote, name, out } => {
            transfer::download(&remote.url, &remote.password, &name, &out).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from(["lanshare", "serve", "--port", "7000", "--no-clipboard"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(7000));
                assert!(args.no_clipboard);
                assert!(!args.save_config);
            }
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from(["lanshare", "serve", "--save-config"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert!(args.save_config);
                assert!(!args.no_clipboard);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_download_defaults_to_current_dir() {
        let cli = Cli::try_parse_from([
            "lanshare", "download", "--url", "http://10.0.0.2:6969", "--password", "pw", "a.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Download { remote, name, out } => {
                assert_eq!(remote.url, "http://10.0.0.2:6969");
                assert_eq!(name, "a.txt");
                assert_eq!(out, PathBuf::from("."));
            }
            _ => panic!("expected download"),
        }
    }
}
