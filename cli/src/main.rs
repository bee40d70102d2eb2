//! # ctxsync CLI
//!
//! Command-line interface for ctxsync - incremental code indexing for remote retrieval.
//!
//! ## Usage
//!
//! - `ctxsync index` - Index the project, uploading only new blobs
//! - `ctxsync index-file <path>` - Reindex a single file
//! - `ctxsync search "<query>"` - Retrieve relevant code context
//! - `ctxsync enhance "<prompt>"` - Rewrite a prompt with codebase context
//! - `ctxsync status` - Show what the local index holds
//! - `ctxsync watch` - Keep the index current as files change

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod commands;
mod config;
mod output;

use commands::{
    enhance_command, index_command, index_file_command, search_command, status_command,
    watch_command,
};
use config::{loader::expand_path, CliConfigLoader};

/// ctxsync - incremental code indexing for remote retrieval
#[derive(Parser)]
#[command(name = "ctxsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a remote code-retrieval index in sync with a local project")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Retrieval service base URL override
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API token override
    #[arg(long, global = true)]
    token: Option<String>,

    /// Project directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the whole project
    Index,

    /// Reindex one file
    IndexFile {
        /// File path, absolute or relative to the project
        path: PathBuf,
    },

    /// Search the codebase for context relevant to a query
    Search {
        /// Natural-language query
        query: String,
    },

    /// Rewrite a prompt using codebase context
    Enhance {
        /// Prompt to enhance
        prompt: String,
    },

    /// Show local index status
    Status,

    /// Index, then keep reindexing changed files until interrupted
    Watch,
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli, project: &Path) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new(project);

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(expand_path(config_path));
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(token) = &cli.token {
        loader = loader.with_token_override(token.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    ctxsync_core::init_tracing_with_debug(cli.verbose);

    let project = match &cli.project {
        Some(project) => expand_path(project),
        None => std::env::current_dir()?,
    };
    let config_loader = build_config_loader(&cli, &project);

    match cli.command {
        Commands::Index => index_command(config_loader, project).await,
        Commands::IndexFile { path } => {
            index_file_command(config_loader, project, &expand_path(&path)).await
        }
        Commands::Search { query } => search_command(config_loader, project, &query).await,
        Commands::Enhance { prompt } => enhance_command(config_loader, project, &prompt).await,
        Commands::Status => status_command(project).await,
        Commands::Watch => watch_command(config_loader, project).await,
    }
}
