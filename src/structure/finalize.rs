use std::collections::BTreeMap;

use super::Boundary;
use crate::models::document::Chapter;
use crate::models::estimate::count_words;

const UNTITLED: &str = "Untitled";

/// Build the flat chapter sequence from boundaries.
///
/// Boundaries are sorted and de-duplicated by start. Text before the first
/// boundary becomes a level-0 chapter (or, when it is only whitespace, the
/// first chapter is extended back to offset 0). A chapter's range runs to
/// the next chapter at the same or a shallower level; its `content` is its
/// own body up to the next chapter of any level.
#[must_use]
pub fn finalize(content: &str, mut boundaries: Vec<Boundary>, doc_name: Option<&str>) -> Vec<Chapter> {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let fallback_title = doc_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNTITLED);

    boundaries.retain(|b| b.start <= len);
    boundaries.sort_by_key(|b| b.start);
    boundaries.dedup_by_key(|b| b.start);

    if boundaries.is_empty() {
        let body = slice(&chars, 0, len);
        return vec![Chapter {
            chapter_id: chapter_id(1),
            title: fallback_title.to_string(),
            word_count: count_words(&body),
            content: body,
            start_position: 0,
            end_position: len,
            level: 1,
            metadata: BTreeMap::new(),
        }];
    }

    let mut chapters = Vec::with_capacity(boundaries.len() + 1);
    let first_start = boundaries[0].start;
    if first_start > 0 {
        let preamble = slice(&chars, 0, first_start);
        if preamble.is_empty() {
            boundaries[0].start = 0;
        } else {
            let mut metadata = BTreeMap::new();
            metadata.insert("role".to_string(), "preamble".to_string());
            chapters.push(Chapter {
                chapter_id: String::new(),
                title: fallback_title.to_string(),
                word_count: count_words(&preamble),
                content: preamble,
                start_position: 0,
                end_position: first_start,
                level: 0,
                metadata,
            });
        }
    }

    for (i, boundary) in boundaries.iter().enumerate() {
        let level = boundary.level.max(1);
        let next_any = boundaries.get(i + 1).map_or(len, |b| b.start);
        let end = boundaries[i + 1..]
            .iter()
            .find(|b| b.level.max(1) <= level)
            .map_or(len, |b| b.start);
        let body_start = boundary.body_start.clamp(boundary.start, next_any);
        let body = slice(&chars, body_start, next_any);
        let title = if boundary.title.trim().is_empty() {
            format!("Section {}", chapters.len() + 1)
        } else {
            boundary.title.trim().to_string()
        };
        chapters.push(Chapter {
            chapter_id: String::new(),
            title,
            word_count: count_words(&body),
            content: body,
            start_position: boundary.start,
            end_position: end,
            level,
            metadata: BTreeMap::new(),
        });
    }

    for (n, chapter) in chapters.iter_mut().enumerate() {
        chapter.chapter_id = chapter_id(n + 1);
    }
    chapters
}

fn chapter_id(n: usize) -> String {
    format!("ch-{n:04}")
}

/// Trimmed text between two char offsets.
fn slice(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    let start = start.min(end);
    chars[start..end].iter().collect::<String>().trim().to_string()
}
