use serde::Serialize;

use crate::models::format::{DetectionMethod, DetectionResult, Evidence, FormatKind};

/// Format a result as minified JSON.
pub fn format_json<T: Serialize>(result: &T) -> String {
    serde_json::to_string(result).unwrap_or_else(|e| format_error(&e))
}

/// Format a result as indented JSON.
pub fn format_json_pretty<T: Serialize>(result: &T) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| format_error(&e))
}

/// Format an error as JSON.
pub fn format_error(err: &dyn std::fmt::Display) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}

/// Output of `docweave detect`.
#[derive(Debug, Serialize)]
pub struct DetectOutput<'a> {
    pub path: String,
    pub kind: FormatKind,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub evidence: &'a [Evidence],
    /// Whether a built-in extractor handles this kind.
    pub extractable: bool,
}

impl<'a> DetectOutput<'a> {
    #[must_use]
    pub fn new(path: String, detection: &'a DetectionResult, extractable: bool) -> Self {
        Self {
            path,
            kind: detection.kind(),
            confidence: detection.confidence(),
            method: detection.method(),
            evidence: detection.evidence(),
            extractable,
        }
    }
}
