pub mod normalizer;

pub use normalizer::{MergedMetadata, MetadataNormalizer};
