pub mod runner;
pub mod scanner;

pub use runner::{BatchItem, BatchReport, BatchRunner};
pub use scanner::{Scanner, SkipReason, SkippedFile};
