use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ingest::dispatcher::AttemptFailure;
use crate::models::format::FormatKind;

#[derive(Error, Debug)]
pub enum DocweaveError {
    #[error("unsupported format: best candidate {kind} scored {confidence:.2} (threshold {threshold:.2}) and input is not decodable text")]
    UnsupportedFormat {
        kind: FormatKind,
        confidence: f64,
        threshold: f64,
    },

    #[error("cannot read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("parsing failed for {kind} input: {}", describe_attempts(.attempts))]
    Parsing {
        kind: FormatKind,
        attempts: Vec<AttemptFailure>,
    },

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("{stage} timed out after {:.3}s", .after.as_secs_f64())]
    Timeout { stage: String, after: Duration },

    #[error("cancelled before {stage}")]
    Cancelled { stage: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl DocweaveError {
    /// Errors raised by the validating, classifying and extracting stages.
    /// `on_error = warn` may turn these into an empty document.
    #[must_use]
    pub fn is_fatal_class(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. }
                | Self::FileRead { .. }
                | Self::Validation(_)
                | Self::Parsing { .. }
                | Self::Timeout { .. }
        )
    }

    /// Number of extraction attempts aggregated in a parsing error.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        match self {
            Self::Parsing { attempts, .. } => attempts.len(),
            _ => 0,
        }
    }
}

fn describe_attempts(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "no extractor registered".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, DocweaveError>;
