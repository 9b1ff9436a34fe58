use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DocweaveError, Result};

/// Cooperative cancellation flag shared between a caller and a pipeline run.
///
/// Checked at stage boundaries only; an extraction already in progress
/// runs to completion (or to its timeout).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if cancellation was requested.
    pub fn check(&self, stage: impl std::fmt::Display) -> Result<()> {
        if self.is_cancelled() {
            tracing::debug!(%stage, "cancellation observed");
            return Err(DocweaveError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check("classifying").is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        let err = token.check("classifying").unwrap_err();
        assert!(err.to_string().contains("classifying"));
    }
}
