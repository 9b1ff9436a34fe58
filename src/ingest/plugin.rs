use crate::config::ParseConfig;
use crate::error::Result;
use crate::models::extraction::RawExtraction;
use crate::models::format::FormatKind;

/// Capability interface implemented by format extractors.
///
/// Extractors are independent types registered in a [`ParserRegistry`]
/// keyed by [`FormatKind`]; there is no base type to inherit from.
///
/// [`ParserRegistry`]: crate::ingest::registry::ParserRegistry
pub trait ExtractorPlugin: Send + Sync {
    /// Stable extractor name, recorded as `parser_used`.
    fn name(&self) -> &str;

    /// Whether this extractor can handle the given kind.
    fn supports(&self, kind: FormatKind) -> bool;

    /// Extract raw content from the full input. Irrecoverable input fails
    /// with an error; the dispatcher then moves on to the next candidate.
    fn extract(&self, bytes: &[u8], config: &ParseConfig) -> Result<RawExtraction>;
}
