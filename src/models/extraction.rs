use serde::{Deserialize, Serialize};

use super::metadata::MetadataFragment;

/// Representation of the raw content handed back by an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentForm {
    /// Plain or lightly marked-up text (Markdown headings are honoured).
    #[default]
    Text,
    /// HTML or XHTML markup that still has to be converted.
    Html,
}

/// Explicit structural hint, typically a table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureHint {
    pub title: String,
    /// Character offset into the raw content.
    pub offset: usize,
    /// Nesting level, 1 = top.
    pub level: u8,
}

impl StructureHint {
    pub fn new(title: impl Into<String>, offset: usize) -> Self {
        Self {
            title: title.into(),
            offset,
            level: 1,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level.max(1);
        self
    }
}

/// Media reference as seen by the extractor, before positions are
/// translated into the canonical content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    /// Character offset into the raw content.
    pub position: usize,
    pub path: Option<String>,
    pub alt_text: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// Transient result of one successful plugin extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtraction {
    pub content: String,
    pub form: ContentForm,
    pub hints: Vec<StructureHint>,
    pub metadata: Vec<MetadataFragment>,
    pub images: Vec<RawImage>,
    /// Non-fatal issues noticed by the extractor.
    pub warnings: Vec<String>,
}

impl RawExtraction {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            form: ContentForm::Text,
            ..Self::default()
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            form: ContentForm::Html,
            ..Self::default()
        }
    }
}
