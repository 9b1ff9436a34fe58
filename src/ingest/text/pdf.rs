use crate::config::ParseConfig;
use crate::error::{DocweaveError, Result};
use crate::ingest::plugin::ExtractorPlugin;
use crate::models::extraction::RawExtraction;
use crate::models::format::FormatKind;
use crate::models::metadata::{Metadata, MetadataFragment};

/// Page break emitted by the text extractor.
const PAGE_BREAK: char = '\x0C';

/// PDF text extractor backed by `pdf-extract`.
pub struct PdfExtractor;

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorPlugin for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn supports(&self, kind: FormatKind) -> bool {
        kind == FormatKind::Pdf
    }

    fn extract(&self, bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| DocweaveError::Extraction(format!("PDF extraction error: {e}")))?;
        Ok(from_page_text(&text))
    }
}

/// Build the extraction from page-separated text: page breaks become
/// blank lines and the page count is recorded as a native custom field.
fn from_page_text(text: &str) -> RawExtraction {
    let pages: Vec<&str> = text
        .split(PAGE_BREAK)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut extraction = RawExtraction::text(pages.join("\n\n"));
    if pages.is_empty() {
        extraction
            .warnings
            .push("PDF contains no extractable text (scanned or image-only?)".into());
    }
    let mut metadata = Metadata::default();
    metadata
        .custom_fields
        .insert("page_count".into(), pages.len().to_string());
    extraction.metadata.push(MetadataFragment::native(metadata));
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_join_with_blank_lines() {
        let raw = from_page_text("Page one content\x0CPage two content\x0C\x0C  \x0CPage three");
        assert_eq!(
            raw.content,
            "Page one content\n\nPage two content\n\nPage three"
        );
        assert_eq!(
            raw.metadata[0]
                .metadata
                .custom_fields
                .get("page_count")
                .map(String::as_str),
            Some("3")
        );
        assert!(raw.warnings.is_empty());
    }

    #[test]
    fn empty_pdf_text_warns() {
        let raw = from_page_text("\x0C \x0C");
        assert!(raw.content.is_empty());
        assert_eq!(raw.warnings.len(), 1);
    }

    #[test]
    fn garbage_bytes_fail() {
        let result = std::panic::catch_unwind(|| {
            PdfExtractor::new().extract(b"%PDF-1.4 not really", &ParseConfig::default())
        });
        // either a clean error or a panic the dispatcher isolates
        if let Ok(outcome) = result {
            assert!(outcome.is_err());
        }
    }
}
