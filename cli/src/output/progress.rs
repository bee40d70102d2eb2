//! Progress bar driven by indexing events

use ctxsync_core::index::{IndexProgress, ProgressSink};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Spinner while collecting, then a bar over upload batches
pub struct IndexProgressBar {
    bar: ProgressBar,
}

impl IndexProgressBar {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if !console::Term::stderr().is_term() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn switch_to_bar(&self, total_batches: usize) {
        if self.bar.length() == Some(total_batches as u64) {
            return;
        }
        self.bar.set_length(total_batches as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} batches | {msg}")
        {
            self.bar.set_style(style.progress_chars("##."));
        }
    }
}

impl Default for IndexProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for IndexProgressBar {
    fn progress(&mut self, event: IndexProgress) {
        match event {
            IndexProgress::Collecting => self.bar.set_message("Collecting files"),
            IndexProgress::Collected { files, blobs } => self
                .bar
                .set_message(format!("Hashing {} files into {} blobs", files, blobs)),
            IndexProgress::Diffed { existing, new } => self
                .bar
                .set_message(format!("{} existing, {} new blobs", existing, new)),
            IndexProgress::Uploading {
                batch,
                total_batches,
            } => {
                self.switch_to_bar(total_batches);
                self.bar.set_position(batch.saturating_sub(1) as u64);
                self.bar.set_message("Uploading");
            }
            IndexProgress::Committed { files, blobs } => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
                self.bar
                    .set_message(format!("Committed {} files, {} blobs", files, blobs));
            }
        }
    }
}
