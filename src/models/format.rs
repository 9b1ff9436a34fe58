use std::fmt;

use serde::{Deserialize, Serialize};

/// Classified document format.
///
/// Declaration order doubles as the final tie-break when two candidates
/// score the same confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Epub,
    Pdf,
    Docx,
    Html,
    Xml,
    Markdown,
    Json,
    Text,
    Zip,
    Unknown,
}

impl FormatKind {
    pub const ALL: [FormatKind; 10] = [
        Self::Epub,
        Self::Pdf,
        Self::Docx,
        Self::Html,
        Self::Xml,
        Self::Markdown,
        Self::Json,
        Self::Text,
        Self::Zip,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Text => "text",
            Self::Zip => "zip",
            Self::Unknown => "unknown",
        }
    }

    /// Map a file extension (with or without the leading dot) to a kind.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "xml" => Some(Self::Xml),
            "md" | "markdown" | "mdown" | "mkd" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            "txt" | "text" => Some(Self::Text),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Map a declared content type to a kind. Parameters such as
    /// `; charset=utf-8` are ignored.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/epub+zip" => Some(Self::Epub),
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/xml" | "text/xml" => Some(Self::Xml),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "application/json" | "text/json" => Some(Self::Json),
            "text/plain" => Some(Self::Text),
            "application/zip" | "application/x-zip-compressed" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Extensions recognised for this kind.
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Epub => &["epub"],
            Self::Pdf => &["pdf"],
            Self::Docx => &["docx"],
            Self::Html => &["html", "htm", "xhtml"],
            Self::Xml => &["xml"],
            Self::Markdown => &["md", "markdown", "mdown", "mkd"],
            Self::Json => &["json"],
            Self::Text => &["txt", "text"],
            Self::Zip => &["zip"],
            Self::Unknown => &[],
        }
    }

    /// Whether documents of this kind are plain decodable text.
    #[must_use]
    pub fn is_text_based(&self) -> bool {
        matches!(
            self,
            Self::Html | Self::Xml | Self::Markdown | Self::Json | Self::Text
        )
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a piece of classification evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Signature,
    Extension,
    ContentType,
    Sniff,
    Fallback,
}

impl EvidenceSource {
    /// Vote weight in points out of 100.
    #[must_use]
    pub fn weight(&self) -> u32 {
        match self {
            Self::Signature => 90,
            Self::Extension => 60,
            Self::ContentType => 50,
            Self::Sniff => 30,
            Self::Fallback => 0,
        }
    }
}

/// One vote cast for a candidate kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    pub kind: FormatKind,
    pub detail: String,
}

/// How the final kind was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Weighted evidence reached the confidence threshold.
    Evidence,
    /// Threshold missed; accepted because the input decodes as text.
    Fallback,
}

/// Outcome of format classification. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    kind: FormatKind,
    confidence: f64,
    evidence: Vec<Evidence>,
    method: DetectionMethod,
}

impl DetectionResult {
    #[must_use]
    pub fn new(
        kind: FormatKind,
        confidence: f64,
        evidence: Vec<Evidence>,
        method: DetectionMethod,
    ) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            evidence,
            method,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    #[must_use]
    pub fn method(&self) -> DetectionMethod {
        self.method
    }
}
