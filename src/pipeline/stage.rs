use std::fmt;

use serde::{Deserialize, Serialize};

/// States of the linear document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validating,
    Classifying,
    Extracting,
    Transforming,
    StructureDetecting,
    MetadataMerging,
    MediaProcessing,
    Cleaning,
    QualityValidating,
    Assembling,
    Done,
    Failed,
}

impl PipelineStage {
    /// Stages that run after a successful extraction, in order.
    pub const POST_EXTRACTION: [PipelineStage; 7] = [
        Self::Transforming,
        Self::StructureDetecting,
        Self::MetadataMerging,
        Self::MediaProcessing,
        Self::Cleaning,
        Self::QualityValidating,
        Self::Assembling,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Classifying => "classifying",
            Self::Extracting => "extracting",
            Self::Transforming => "transforming",
            Self::StructureDetecting => "structure_detecting",
            Self::MetadataMerging => "metadata_merging",
            Self::MediaProcessing => "media_processing",
            Self::Cleaning => "cleaning",
            Self::QualityValidating => "quality_validating",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Failures in these stages abort the run; later stages only warn.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validating | Self::Classifying | Self::Extracting)
    }

    /// The state that follows this one on success.
    #[must_use]
    pub fn next(&self) -> Self {
        match self {
            Self::Validating => Self::Classifying,
            Self::Classifying => Self::Extracting,
            Self::Extracting => Self::Transforming,
            Self::Transforming => Self::StructureDetecting,
            Self::StructureDetecting => Self::MetadataMerging,
            Self::MetadataMerging => Self::MediaProcessing,
            Self::MediaProcessing => Self::Cleaning,
            Self::Cleaning => Self::QualityValidating,
            Self::QualityValidating => Self::Assembling,
            Self::Assembling | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_linear_order() {
        let mut stage = PipelineStage::Validating;
        let mut seen = vec![stage];
        while stage != PipelineStage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 11);
        assert_eq!(&seen[3..10], &PipelineStage::POST_EXTRACTION);
    }

    #[test]
    fn only_early_stages_are_fatal() {
        assert!(PipelineStage::Extracting.is_fatal());
        assert!(PipelineStage::POST_EXTRACTION.iter().all(|s| !s.is_fatal()));
    }
}
