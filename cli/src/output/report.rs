//! Outcome and status printing

use colored::Colorize;
use ctxsync_core::{IndexOutcome, IndexStatus, IndexStore};
use std::path::Path;

pub fn print_outcome(outcome: &IndexOutcome) {
    let label = match outcome.status {
        IndexStatus::Success => "success".green().bold(),
        IndexStatus::PartialSuccess => "partial".yellow().bold(),
        IndexStatus::Error => "error".red().bold(),
        IndexStatus::Skipped => "skipped".dimmed(),
    };
    println!("{} {}", label, outcome.message);

    let stats = &outcome.stats;
    if stats.total > 0 {
        println!(
            "  {} blobs: {} existing, {} new, {} uploaded",
            stats.total, stats.existing, stats.new, stats.uploaded
        );
    }
    if stats.failed_batches > 0 {
        println!(
            "  {}",
            format!("{} upload batches failed", stats.failed_batches).yellow()
        );
    }
}

pub fn print_status(project: &Path, index_path: &Path, store: &IndexStore) {
    println!("{} {}", console::style("Project:").bold(), project.display());
    println!("{} {}", console::style("Index:").bold(), index_path.display());

    if store.is_empty() {
        println!("{}", "Not indexed yet. Run `ctxsync index`.".yellow());
        return;
    }

    println!("Files: {}", store.file_count());
    println!("Blobs: {}", store.blob_count());
    if !store.is_consistent() {
        println!(
            "{}",
            "Index is inconsistent; run `ctxsync index` to rebuild it.".red()
        );
    }
}
