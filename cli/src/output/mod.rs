//! Terminal rendering of engine progress and outcomes

pub mod progress;
pub mod report;

pub use progress::IndexProgressBar;
pub use report::{print_outcome, print_status};
