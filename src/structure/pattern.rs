use std::sync::LazyLock;

use regex::Regex;

use super::{lines, Boundary};

/// Longest line considered a chapter label.
const MAX_LABEL_CHARS: usize = 80;

static PART_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:part|book|volume)\s+",
        r"(?:[0-9]+|[ivxlcdm]+|one|two|three|four|five|six|seven|eight|nine|ten|first|second|third|fourth|fifth)",
        r"\b\.?(?:\s*[:.\-\x{2013}\x{2014}]\s*\S.*)?$"
    ))
    .expect("valid part regex")
});

static CHAPTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:(?:chapter|chap\.|section)\s+",
        r"(?:[0-9]+|[ivxlcdm]+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)",
        r"\b\.?|prologue|epilogue|preface|foreword|afterword|introduction|appendix(?:\s+[a-z0-9]{1,4})?)",
        r"(?:\s*[:.\-\x{2013}\x{2014}]\s*\S.*)?$"
    ))
    .expect("valid chapter regex")
});

/// Lines like `Chapter 12`, `CHAPTER IV: The Storm`, `Part One`,
/// `Prologue` or `Appendix A`. Parts are level 1; chapter-like lines are
/// level 2 once a part has been seen.
pub(super) fn detect(content: &str) -> Option<Vec<Boundary>> {
    let mut boundaries = Vec::new();
    let mut seen_part = false;

    for line in lines(content) {
        let text = line.text.trim();
        if text.is_empty() || text.chars().count() > MAX_LABEL_CHARS {
            continue;
        }
        let level = if PART_PATTERN.is_match(text) {
            seen_part = true;
            1
        } else if CHAPTER_PATTERN.is_match(text) {
            if seen_part {
                2
            } else {
                1
            }
        } else {
            continue;
        };
        boundaries.push(Boundary {
            title: text.to_string(),
            start: line.start,
            body_start: line.next,
            level,
        });
    }

    (!boundaries.is_empty()).then_some(boundaries)
}
