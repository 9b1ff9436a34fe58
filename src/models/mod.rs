pub mod document;
pub mod estimate;
pub mod extraction;
pub mod format;
pub mod metadata;

pub use document::{Chapter, Document, ImageReference, ProcessingInfo, StructureMethod};
pub use extraction::{ContentForm, RawExtraction, RawImage, StructureHint};
pub use format::{DetectionMethod, DetectionResult, Evidence, EvidenceSource, FormatKind};
pub use metadata::{Metadata, MetadataFragment, MetadataSource};
