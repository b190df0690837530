//! `artifs`: browse and transfer build artifacts in a remote repository as
//! if it were a local filesystem.
//!
//! Keys are relative to the configured path prefix.

mod commands;
mod error;

use crate::error::{ErrorKind, Result};
use artifs_config::EnvCredentials;
use artifs_transfer::TransferClient;
use artifs_vfs::VirtualTree;
use clap::{Parser, Subcommand};
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "artifs", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv). Without it, RUST_LOG applies.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML, YAML or JSON). Defaults to the per-user
    /// configuration directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory.
    Ls {
        #[arg(default_value = "")]
        key: String,
    },
    /// Show what is known about a file or directory.
    Stat { key: String },
    /// Write a file to standard output.
    Cat { key: String },
    /// Download a file.
    Get { key: String, destination: PathBuf },
    /// Upload a file, retrying transient failures.
    Put { file: PathBuf, key: String },
    /// Delete a file or directory.
    Rm { key: String },
    /// Move a file or directory.
    Mv { source: String, target: String },
    /// Copy a file or directory.
    Cp { source: String, target: String },
    /// Print the browser-facing URL of a key.
    Url { key: String },
}

fn filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = artifs_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    tracing::debug!(server = %config.server_url(), repository = config.repository(), "Loaded configuration");
    let client = TransferClient::http(&config, Arc::new(EnvCredentials)).or_raise(|| ErrorKind::Transfer)?;
    let tree = VirtualTree::new(Arc::new(client)).with_root(config.path_prefix());
    match cli.command {
        Command::Ls { key } => commands::ls(&tree, &key).await,
        Command::Stat { key } => commands::stat(&tree, &key).await,
        Command::Cat { key } => commands::cat(&tree, &key).await,
        Command::Get { key, destination } => commands::get(&tree, &key, &destination).await,
        Command::Put { file, key } => commands::put(&tree, &file, &key).await,
        Command::Rm { key } => commands::rm(&tree, &key).await,
        Command::Mv { source, target } => commands::mv(&tree, &source, &target).await,
        Command::Cp { source, target } => commands::cp(&tree, &source, &target).await,
        Command::Url { key } => commands::url(&tree, &key),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(filter(cli.verbose)).with_writer(std::io::stderr).init();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}
