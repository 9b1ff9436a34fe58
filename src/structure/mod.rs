//! Chapter structure detection.
//!
//! Each strategy turns the content into a list of [`Boundary`] values;
//! [`finalize`] turns boundaries into the flat, leveled chapter sequence.
//! Detection never fails: when nothing is found the whole content becomes
//! a single chapter.

mod finalize;
mod headings;
mod heuristic;
mod hints;
mod pattern;

use crate::config::{ChapterDetectionMethod, ParseConfig};
use crate::models::document::{Chapter, StructureMethod};
use crate::models::extraction::StructureHint;

pub use finalize::finalize;

/// Start of a detected chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub title: String,
    /// Char offset where the chapter starts (its heading line).
    pub start: usize,
    /// Char offset where the chapter's own body starts.
    pub body_start: usize,
    pub level: u8,
}

/// One line of the content with char offsets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub text: &'a str,
    pub start: usize,
    /// Offset just past the line terminator (start of the next line).
    pub next: usize,
}

impl Line<'_> {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Split into lines, tracking char offsets.
pub(crate) fn lines(content: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let mut offset = 0;
    for raw in content.split_inclusive('\n') {
        let len = raw.chars().count();
        let text = raw.strip_suffix('\n').unwrap_or(raw);
        let text = text.strip_suffix('\r').unwrap_or(text);
        out.push(Line {
            text,
            start: offset,
            next: offset + len,
        });
        offset += len;
    }
    out
}

/// Result of structure detection.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedStructure {
    pub chapters: Vec<Chapter>,
    pub method: StructureMethod,
    pub warnings: Vec<String>,
}

/// Splits content into chapters using the configured strategy.
#[derive(Debug, Clone)]
pub struct StructureDetector {
    method: ChapterDetectionMethod,
    min_chapter_length: usize,
}

impl Default for StructureDetector {
    fn default() -> Self {
        Self::from_config(&ParseConfig::default())
    }
}

impl StructureDetector {
    #[must_use]
    pub fn new(method: ChapterDetectionMethod, min_chapter_length: usize) -> Self {
        Self {
            method,
            min_chapter_length,
        }
    }

    #[must_use]
    pub fn from_config(config: &ParseConfig) -> Self {
        Self::new(config.chapter_detection_method, config.min_chapter_length)
    }

    /// Detect chapters in `content`.
    ///
    /// `hints` are explicit boundaries supplied by the extractor, with
    /// offsets already in `content` chars. `doc_name` titles the implicit
    /// preamble and the single-chapter fallback.
    #[must_use]
    pub fn detect(
        &self,
        content: &str,
        hints: &[StructureHint],
        doc_name: Option<&str>,
    ) -> DetectedStructure {
        let mut warnings = Vec::new();
        let found = match self.method {
            ChapterDetectionMethod::Auto => self.auto(content, hints, &mut warnings),
            ChapterDetectionMethod::Toc => {
                hints::from_hints(content, hints).map(|b| (b, StructureMethod::Toc))
            }
            ChapterDetectionMethod::Heading => {
                headings::detect(content).map(|b| (b, StructureMethod::Heading))
            }
            ChapterDetectionMethod::Pattern => {
                pattern::detect(content).map(|b| (b, StructureMethod::Pattern))
            }
            ChapterDetectionMethod::Heuristic => {
                heuristic::detect(content).map(|b| (b, StructureMethod::Heuristic))
            }
        };

        let (boundaries, method) = match found {
            Some(found) => found,
            None => {
                if self.method != ChapterDetectionMethod::Auto {
                    warnings.push(format!(
                        "no chapters found with method '{}'; using a single chapter",
                        method_name(self.method)
                    ));
                }
                (Vec::new(), StructureMethod::SingleChapter)
            }
        };
        tracing::debug!(method = method.as_str(), boundaries = boundaries.len(), "structure detected");

        let chapters = finalize(content, boundaries, doc_name);
        for chapter in &chapters {
            if chapter.level > 0 && chapter.word_count < self.min_chapter_length {
                warnings.push(format!(
                    "chapter {} '{}' has {} words (minimum {})",
                    chapter.chapter_id, chapter.title, chapter.word_count, self.min_chapter_length
                ));
            }
        }

        DetectedStructure {
            chapters,
            method,
            warnings,
        }
    }

    fn auto(
        &self,
        content: &str,
        hints: &[StructureHint],
        warnings: &mut Vec<String>,
    ) -> Option<(Vec<Boundary>, StructureMethod)> {
        if !hints.is_empty() {
            match hints::from_hints(content, hints) {
                Some(b) => return Some((b, StructureMethod::Toc)),
                None => warnings.push(format!(
                    "ignoring {} structure hint(s) with out-of-range or unordered offsets",
                    hints.len()
                )),
            }
        }
        headings::detect(content)
            .map(|b| (b, StructureMethod::Heading))
            .or_else(|| pattern::detect(content).map(|b| (b, StructureMethod::Pattern)))
            .or_else(|| heuristic::detect(content).map(|b| (b, StructureMethod::Heuristic)))
    }
}

fn method_name(method: ChapterDetectionMethod) -> &'static str {
    match method {
        ChapterDetectionMethod::Auto => "auto",
        ChapterDetectionMethod::Toc => "toc",
        ChapterDetectionMethod::Heading => "heading",
        ChapterDetectionMethod::Pattern => "pattern",
        ChapterDetectionMethod::Heuristic => "heuristic",
    }
}
