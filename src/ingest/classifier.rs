//! Format classification from byte evidence, extension and content sniffing.
//!
//! Each evidence source votes for a candidate kind with a fixed weight
//! (signature > extension > declared content type > sniffing). Votes are
//! summed per kind, capped at 100 points, and turned into a confidence in
//! `[0, 1]`. Below the threshold the classifier falls back to a UTF-8
//! decode before giving up.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DocweaveError, Result};
use crate::models::format::{
    DetectionMethod, DetectionResult, Evidence, EvidenceSource, FormatKind,
};

/// Bytes inspected for container signatures.
const SIGNATURE_WINDOW: usize = 8 * 1024;
/// Bytes inspected for content tokens.
const SNIFF_WINDOW: usize = 1024;
/// Confidence reported when only the text-decode fallback succeeded.
const FALLBACK_TEXT_CONFIDENCE: f64 = 0.5;
const MAX_POINTS: u32 = 100;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Deterministic, side-effect free format classifier.
#[derive(Debug, Clone)]
pub struct FormatClassifier {
    threshold: f64,
}

impl Default for FormatClassifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl FormatClassifier {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify an input from its leading bytes and optional hints.
    pub fn classify(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<DetectionResult> {
        let mut evidence = gather_evidence(bytes, filename, content_type);
        let (kind, confidence) = select_candidate(&evidence);

        if confidence >= self.threshold {
            tracing::debug!(%kind, confidence, "format accepted on evidence");
            return Ok(DetectionResult::new(
                kind,
                confidence,
                evidence,
                DetectionMethod::Evidence,
            ));
        }

        if !decodes_as_text(bytes) {
            return Err(DocweaveError::UnsupportedFormat {
                kind,
                confidence,
                threshold: self.threshold,
            });
        }

        let (kind, confidence) = if kind.is_text_based() {
            (kind, confidence)
        } else {
            (FormatKind::Text, FALLBACK_TEXT_CONFIDENCE)
        };
        evidence.push(Evidence {
            source: EvidenceSource::Fallback,
            kind,
            detail: "input decodes as UTF-8 text".into(),
        });
        tracing::debug!(%kind, confidence, "format accepted through text fallback");
        Ok(DetectionResult::new(
            kind,
            confidence,
            evidence,
            DetectionMethod::Fallback,
        ))
    }
}

/// Collect every independent vote for the input.
#[must_use]
pub fn gather_evidence(
    bytes: &[u8],
    filename: Option<&str>,
    content_type: Option<&str>,
) -> Vec<Evidence> {
    let mut evidence = Vec::new();

    if let Some(e) = signature_evidence(bytes) {
        evidence.push(e);
    }

    if let Some(ext) = filename.and_then(|f| Path::new(f).extension()?.to_str()) {
        if let Some(kind) = FormatKind::from_extension(ext) {
            evidence.push(Evidence {
                source: EvidenceSource::Extension,
                kind,
                detail: format!(".{}", ext.to_ascii_lowercase()),
            });
        }
    }

    if let Some(mime) = content_type {
        if let Some(kind) = FormatKind::from_mime(mime) {
            evidence.push(Evidence {
                source: EvidenceSource::ContentType,
                kind,
                detail: mime.trim().to_string(),
            });
        }
    }

    evidence.extend(sniff_evidence(bytes));
    evidence
}

fn signature_evidence(bytes: &[u8]) -> Option<Evidence> {
    let signature = |kind: FormatKind, detail: &str| Evidence {
        source: EvidenceSource::Signature,
        kind,
        detail: detail.to_string(),
    };

    if bytes.starts_with(b"%PDF") {
        return Some(signature(FormatKind::Pdf, "leading %PDF marker"));
    }
    if bytes.starts_with(ZIP_MAGIC) {
        let window = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
        if contains(window, b"application/epub+zip") {
            return Some(signature(FormatKind::Epub, "zip with epub mimetype entry"));
        }
        if contains(window, b"word/") {
            return Some(signature(FormatKind::Docx, "zip with word/ entries"));
        }
        return Some(signature(FormatKind::Zip, "zip local file header"));
    }
    None
}

fn sniff_evidence(bytes: &[u8]) -> Vec<Evidence> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let window = &body[start..body.len().min(start + SNIFF_WINDOW)];
    if window.contains(&0) {
        return Vec::new();
    }
    let lower = String::from_utf8_lossy(window).to_ascii_lowercase();

    let sniff = |kind: FormatKind, detail: &str| Evidence {
        source: EvidenceSource::Sniff,
        kind,
        detail: detail.to_string(),
    };

    let mut votes = Vec::new();
    if lower.starts_with("<?xml") {
        if lower.contains("<html") || lower.contains("http://www.w3.org/1999/xhtml") {
            votes.push(sniff(FormatKind::Html, "xhtml document"));
        } else {
            votes.push(sniff(FormatKind::Xml, "<?xml declaration"));
        }
    } else if lower.starts_with("<!doctype html") || lower.contains("<html") {
        votes.push(sniff(FormatKind::Html, "<html"));
    } else if lower.starts_with('{') || lower.starts_with('[') {
        votes.push(sniff(FormatKind::Json, "leading bracket"));
    }

    if lower.starts_with("---\n") || lower.starts_with("---\r\n") {
        votes.push(sniff(FormatKind::Markdown, "frontmatter fence"));
    } else if lower.lines().any(is_atx_heading) {
        votes.push(sniff(FormatKind::Markdown, "atx heading"));
    }
    votes
}

fn is_atx_heading(line: &str) -> bool {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return false;
    }
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ')
}

/// Pick the best candidate. Ties go to the kind backed by extension
/// evidence, then to the earlier `FormatKind` variant.
fn select_candidate(evidence: &[Evidence]) -> (FormatKind, f64) {
    let mut points: BTreeMap<FormatKind, (u32, bool)> = BTreeMap::new();
    for e in evidence {
        let entry = points.entry(e.kind).or_insert((0, false));
        entry.0 += e.source.weight();
        entry.1 |= e.source == EvidenceSource::Extension;
    }

    let mut best: Option<(FormatKind, u32, bool)> = None;
    for (kind, (score, by_extension)) in points {
        let score = score.min(MAX_POINTS);
        let better = match best {
            None => true,
            Some((_, best_score, best_ext)) => {
                score > best_score || (score == best_score && by_extension && !best_ext)
            }
        };
        if better {
            best = Some((kind, score, by_extension));
        }
    }

    match best {
        Some((kind, score, _)) => (kind, f64::from(score) / f64::from(MAX_POINTS)),
        None => (FormatKind::Unknown, 0.0),
    }
}

fn decodes_as_text(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)).is_ok()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(bytes: &[u8], name: Option<&str>) -> DetectionResult {
        FormatClassifier::default().classify(bytes, name, None).unwrap()
    }

    #[test]
    fn pdf_signature_wins() {
        let r = classify(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n", None);
        assert_eq!(r.kind(), FormatKind::Pdf);
        assert!((r.confidence() - 0.9).abs() < 1e-9);
        assert_eq!(r.method(), DetectionMethod::Evidence);
    }

    #[test]
    fn epub_is_distinguished_from_plain_zip() {
        let mut epub = ZIP_MAGIC.to_vec();
        epub.extend_from_slice(&[0; 26]);
        epub.extend_from_slice(b"mimetypeapplication/epub+zip");
        assert_eq!(classify(&epub, None).kind(), FormatKind::Epub);

        let mut docx = ZIP_MAGIC.to_vec();
        docx.extend_from_slice(&[0; 26]);
        docx.extend_from_slice(b"word/document.xml");
        assert_eq!(classify(&docx, None).kind(), FormatKind::Docx);

        let mut zip = ZIP_MAGIC.to_vec();
        zip.extend_from_slice(&[0; 26]);
        zip.extend_from_slice(b"notes.txt");
        assert_eq!(classify(&zip, Some("bundle.zip")).kind(), FormatKind::Zip);
    }

    #[test]
    fn extension_and_sniff_combine() {
        let r = classify(b"<!DOCTYPE html><html><body>x</body></html>", Some("page.html"));
        assert_eq!(r.kind(), FormatKind::Html);
        assert!((r.confidence() - 0.9).abs() < 1e-9);
        assert_eq!(r.evidence().len(), 2);
    }

    #[test]
    fn xhtml_is_html() {
        let src = br#"<?xml version="1.0"?><html xmlns="http://www.w3.org/1999/xhtml"></html>"#;
        assert_eq!(classify(src, Some("ch1.xhtml")).kind(), FormatKind::Html);
        let xml = br#"<?xml version="1.0"?><feed></feed>"#;
        assert_eq!(classify(xml, Some("feed.xml")).kind(), FormatKind::Xml);
    }

    #[test]
    fn markdown_heading_sniff() {
        let r = classify(b"Intro\n\n# Chapter One\n\nText\n", Some("book.md"));
        assert_eq!(r.kind(), FormatKind::Markdown);
        assert_eq!(r.method(), DetectionMethod::Evidence);
    }

    #[test]
    fn declared_content_type_counts() {
        let r = FormatClassifier::default()
            .classify(b"{\"a\": 1}", None, Some("application/json; charset=utf-8"))
            .unwrap();
        assert_eq!(r.kind(), FormatKind::Json);
        assert!((r.confidence() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn classification_is_idempotent() {
        let input = b"---\ntitle: x\n---\n# A\n";
        let c = FormatClassifier::default();
        let a = c.classify(input, Some("a.md"), Some("text/markdown")).unwrap();
        let b = c.classify(input, Some("a.md"), Some("text/markdown")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn threshold_is_inclusive() {
        let binary = b"\xFF\xFE\x00garbage\x81";
        let at = FormatClassifier::new(0.6).classify(binary, Some("x.pdf"), None).unwrap();
        assert_eq!(at.kind(), FormatKind::Pdf);
        assert_eq!(at.method(), DetectionMethod::Evidence);

        let above = FormatClassifier::new(0.61).classify(binary, Some("x.pdf"), None);
        assert!(matches!(
            above,
            Err(DocweaveError::UnsupportedFormat {
                kind: FormatKind::Pdf,
                ..
            })
        ));
    }

    #[test]
    fn low_confidence_text_falls_back() {
        let r = classify(b"just some words", Some("notes.txt"));
        assert_eq!(r.kind(), FormatKind::Text);
        assert!((r.confidence() - 0.6).abs() < 1e-9);
        assert_eq!(r.method(), DetectionMethod::Fallback);

        let r = classify(b"plain words in a mislabeled file", Some("scan.pdf"));
        assert_eq!(r.kind(), FormatKind::Text);
        assert!((r.confidence() - FALLBACK_TEXT_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_text() {
        let r = classify(b"", None);
        assert_eq!(r.kind(), FormatKind::Text);
        assert_eq!(r.method(), DetectionMethod::Fallback);
    }

    #[test]
    fn undecodable_without_evidence_is_unsupported() {
        let err = FormatClassifier::default()
            .classify(&[0x00, 0xFF, 0xFE, 0x80], None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            DocweaveError::UnsupportedFormat {
                kind: FormatKind::Unknown,
                ..
            }
        ));
    }

    #[test]
    fn ties_prefer_extension_evidence() {
        // Pdf: signature 90. Markdown: extension 60 + heading sniff 30.
        let r = classify(b"%PDF-1.4\n# Heading\n", Some("odd.md"));
        assert_eq!(r.kind(), FormatKind::Markdown);
        assert!((r.confidence() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn atx_heading_rules() {
        assert!(is_atx_heading("# Title"));
        assert!(is_atx_heading("   ### Deep"));
        assert!(!is_atx_heading("#hashtag"));
        assert!(!is_atx_heading("####### seven"));
        assert!(!is_atx_heading("    # indented code"));
    }
}
