//! Progress events emitted while indexing

/// A step of an indexing run, reported to the host as it happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexProgress {
    Collecting,
    Collected { files: usize, blobs: usize },
    Diffed { existing: usize, new: usize },
    Uploading { batch: usize, total_batches: usize },
    Committed { files: usize, blobs: usize },
}

/// Receiver for progress events
pub trait ProgressSink: Send {
    fn progress(&mut self, event: IndexProgress);
}

impl<F: FnMut(IndexProgress) + Send> ProgressSink for F {
    fn progress(&mut self, event: IndexProgress) {
        self(event);
    }
}

impl ProgressSink for () {
    fn progress(&mut self, _event: IndexProgress) {}
}
