use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::estimate::{count_words, estimate_tokens_str, reading_time_minutes};
use super::format::FormatKind;
use super::metadata::Metadata;
use crate::config::ParseConfig;
use crate::pipeline::stage::PipelineStage;

/// Strategy that produced the chapter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureMethod {
    /// Explicit table-of-contents hints from the extractor.
    Toc,
    /// Markdown-style heading markers.
    Heading,
    /// "Chapter N" / "Part N" style lines.
    Pattern,
    /// Paragraph-gap and short-line heuristics.
    Heuristic,
    /// Nothing found; one chapter spans the whole content.
    SingleChapter,
}

impl StructureMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toc => "toc",
            Self::Heading => "heading",
            Self::Pattern => "pattern",
            Self::Heuristic => "heuristic",
            Self::SingleChapter => "single_chapter",
        }
    }
}

/// One entry of the flat, ordered, leveled chapter sequence.
///
/// Positions are character offsets into the document content.
/// `start_position..end_position` spans the chapter including any deeper
/// chapters nested under it; `content` holds only the chapter's own body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub chapter_id: String,
    pub title: String,
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
    pub word_count: usize,
    /// 1 = top level, deeper is nested. 0 marks the implicit preamble.
    pub level: u8,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Chapter {
    /// Index of the parent chapter: the nearest preceding chapter with a
    /// strictly shallower level. The level-0 preamble never parents.
    #[must_use]
    pub fn parent_index(chapters: &[Chapter], index: usize) -> Option<usize> {
        let level = chapters.get(index)?.level;
        chapters[..index]
            .iter()
            .rposition(|c| c.level > 0 && c.level < level)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end_position.saturating_sub(self.start_position)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }
}

/// Image embedded in the document, anchored at a character position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub id: String,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Audit record of how a document was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    /// Name of the extractor that produced the content.
    pub parser_used: Option<String>,
    pub detected_format: Option<FormatKind>,
    pub detection_confidence: f64,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
    pub config: ParseConfig,
    pub structure_method: Option<StructureMethod>,
    /// SHA-256 of the input bytes.
    pub source_sha256: String,
    pub stages_completed: Vec<PipelineStage>,
}

/// Canonical document. Immutable once assembled; changes produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    content: String,
    chapters: Vec<Chapter>,
    images: Vec<ImageReference>,
    metadata: Metadata,
    processing_info: ProcessingInfo,
    word_count: usize,
    reading_time_minutes: u32,
    estimated_tokens: u64,
}

impl Document {
    pub(crate) fn new(
        content: String,
        chapters: Vec<Chapter>,
        images: Vec<ImageReference>,
        metadata: Metadata,
        processing_info: ProcessingInfo,
    ) -> Self {
        let word_count = count_words(&content);
        Self {
            reading_time_minutes: reading_time_minutes(word_count),
            estimated_tokens: estimate_tokens_str(&content),
            word_count,
            content,
            chapters,
            images,
            metadata,
            processing_info,
        }
    }

    /// Empty document standing in for a failed run under `on_error = warn`.
    pub(crate) fn empty(processing_info: ProcessingInfo) -> Self {
        Self::new(
            String::new(),
            Vec::new(),
            Vec::new(),
            Metadata::default(),
            processing_info,
        )
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    #[must_use]
    pub fn images(&self) -> &[ImageReference] {
        &self.images
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn processing_info(&self) -> &ProcessingInfo {
        &self.processing_info
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    #[must_use]
    pub fn reading_time_minutes(&self) -> u32 {
        self.reading_time_minutes
    }

    #[must_use]
    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.processing_info.warnings
    }

    /// Parent of the chapter at `index`, if any.
    #[must_use]
    pub fn parent_of(&self, index: usize) -> Option<&Chapter> {
        Chapter::parent_index(&self.chapters, index).map(|i| &self.chapters[i])
    }

    /// A copy of this document with replaced metadata.
    #[must_use]
    pub fn with_metadata(self, metadata: Metadata) -> Self {
        Self { metadata, ..self }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, level: u8) -> Chapter {
        Chapter {
            chapter_id: id.into(),
            title: id.into(),
            content: String::new(),
            start_position: 0,
            end_position: 0,
            word_count: 0,
            level,
            metadata: BTreeMap::new(),
        }
    }

    fn info() -> ProcessingInfo {
        ProcessingInfo {
            parser_used: Some("plaintext".into()),
            detected_format: Some(FormatKind::Text),
            detection_confidence: 0.9,
            duration_ms: 3,
            warnings: vec!["w".into()],
            config: ParseConfig::default(),
            structure_method: Some(StructureMethod::SingleChapter),
            source_sha256: "00".into(),
            stages_completed: vec![PipelineStage::Validating],
        }
    }

    #[test]
    fn parent_is_nearest_shallower_chapter() {
        let chapters = vec![
            chapter("pre", 0),
            chapter("a", 1),
            chapter("a1", 2),
            chapter("a1x", 3),
            chapter("a2", 2),
            chapter("b", 1),
        ];
        assert_eq!(Chapter::parent_index(&chapters, 0), None);
        assert_eq!(Chapter::parent_index(&chapters, 1), None);
        assert_eq!(Chapter::parent_index(&chapters, 2), Some(1));
        assert_eq!(Chapter::parent_index(&chapters, 3), Some(2));
        assert_eq!(Chapter::parent_index(&chapters, 4), Some(1));
        assert_eq!(Chapter::parent_index(&chapters, 5), None);
        assert_eq!(Chapter::parent_index(&chapters, 99), None);
    }

    #[test]
    fn derived_counts_follow_content() {
        let doc = Document::new(
            "one two three four".into(),
            vec![],
            vec![],
            Metadata::default(),
            info(),
        );
        assert_eq!(doc.word_count(), 4);
        assert_eq!(doc.reading_time_minutes(), 1);
        assert_eq!(doc.estimated_tokens(), 5);
    }

    #[test]
    fn with_metadata_returns_new_document() {
        let doc = Document::new("x".into(), vec![], vec![], Metadata::default(), info());
        let updated = doc.clone().with_metadata(Metadata::default().with_title("New"));
        assert!(doc.metadata().title.is_none());
        assert_eq!(updated.metadata().title.as_deref(), Some("New"));
        assert_eq!(updated.content(), doc.content());
    }

    #[test]
    fn json_uses_named_top_level_fields() {
        let doc = Document::new("x".into(), vec![], vec![], Metadata::default(), info());
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        for field in ["content", "chapters", "images", "metadata", "processing_info"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }
}
