use crate::config::ParseConfig;
use crate::error::{DocweaveError, Result};
use crate::ingest::plugin::ExtractorPlugin;
use crate::models::extraction::RawExtraction;
use crate::models::format::FormatKind;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16_LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16_BE_BOM: &[u8] = b"\xFE\xFF";

/// Decode text strictly: UTF-8 (BOM stripped) or BOM-marked UTF-16.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return utf8(rest);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return utf16(rest, u16::from_be_bytes);
    }
    utf8(bytes)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| DocweaveError::Extraction(format!("input is not valid UTF-8: {e}")))
}

fn utf16(bytes: &[u8], decode: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(DocweaveError::Extraction(
            "UTF-16 input has an odd number of bytes".into(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| decode([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|e| DocweaveError::Extraction(format!("input is not valid UTF-16: {e}")))
}

/// Strict Unicode text extractor. Also serves as the generic fallback for
/// markup formats whose dedicated extractor failed.
pub struct PlaintextExtractor;

impl Default for PlaintextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaintextExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorPlugin for PlaintextExtractor {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn supports(&self, kind: FormatKind) -> bool {
        kind.is_text_based()
    }

    fn extract(&self, bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
        Ok(RawExtraction::text(decode_text(bytes)?))
    }
}

/// Last-resort decoder: maps every byte to the Latin-1 code point.
/// Never fails, so it always records a warning.
pub struct Latin1Extractor;

impl Default for Latin1Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Latin1Extractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorPlugin for Latin1Extractor {
    fn name(&self) -> &str {
        "latin1"
    }

    fn supports(&self, kind: FormatKind) -> bool {
        matches!(kind, FormatKind::Text | FormatKind::Markdown)
    }

    fn extract(&self, bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
        let content: String = bytes.iter().map(|&b| char::from(b)).collect();
        let mut extraction = RawExtraction::text(content);
        extraction
            .warnings
            .push("input decoded as Latin-1; characters may be misinterpreted".into());
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(bytes: &[u8]) -> Result<RawExtraction> {
        PlaintextExtractor::new().extract(bytes, &ParseConfig::default())
    }

    #[test]
    fn extracts_utf8_text() {
        let raw = extract("key = value\nünïcode\n".as_bytes()).unwrap();
        assert_eq!(raw.content, "key = value\nünïcode\n");
        assert!(raw.hints.is_empty());
        assert!(raw.warnings.is_empty());
    }

    #[test]
    fn strips_utf8_bom() {
        let raw = extract(b"\xEF\xBB\xBFhello").unwrap();
        assert_eq!(raw.content, "hello");
    }

    #[test]
    fn decodes_utf16_with_bom() {
        let mut le = vec![0xFF, 0xFE];
        for unit in "Hi é".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(extract(&le).unwrap().content, "Hi é");

        let mut be = vec![0xFE, 0xFF];
        for unit in "Hi".encode_utf16() {
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(extract(&be).unwrap().content, "Hi");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = extract(b"caf\xE9").unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn empty_input_is_empty_text() {
        assert_eq!(extract(b"").unwrap().content, "");
    }

    #[test]
    fn latin1_never_fails_and_warns() {
        let raw = Latin1Extractor::new()
            .extract(b"caf\xE9", &ParseConfig::default())
            .unwrap();
        assert_eq!(raw.content, "café");
        assert_eq!(raw.warnings.len(), 1);
    }

    #[test]
    fn supported_kinds() {
        let p = PlaintextExtractor::new();
        assert!(p.supports(FormatKind::Html));
        assert!(p.supports(FormatKind::Json));
        assert!(!p.supports(FormatKind::Pdf));
        assert!(!Latin1Extractor::new().supports(FormatKind::Html));
    }
}
