//! Text normalisation with offset tracking.
//!
//! [`TextCleaner::normalize`] runs a chain of passes over the extracted
//! text. Every pass records, for each input char, the index its output
//! starts at; composing those maps gives an [`OffsetMap`] from raw char
//! offsets to offsets in the normalised text, which is how structure hints
//! and image positions survive normalisation.

use std::collections::BTreeMap;

use crate::models::metadata::Metadata;

/// Common UTF-8-read-as-Windows-1252 sequences and their intended char.
const MOJIBAKE: &[(&str, char)] = &[
    ("â€™", '\u{2019}'),
    ("â€˜", '\u{2018}'),
    ("â€œ", '\u{201c}'),
    ("â€\u{9d}", '\u{201d}'),
    ("â€“", '\u{2013}'),
    ("â€”", '\u{2014}'),
    ("â€¦", '\u{2026}'),
    ("Ã©", '\u{e9}'),
    ("Ã¨", '\u{e8}'),
    ("Ã¡", '\u{e1}'),
    ("Ã¼", '\u{fc}'),
    ("Ã¶", '\u{f6}'),
    ("Ã¤", '\u{e4}'),
    ("Ã§", '\u{e7}'),
    ("ÃŸ", '\u{df}'),
];

/// Maximum run of consecutive newlines kept (two blank lines).
const MAX_NEWLINES: usize = 3;

/// Maps char offsets in the raw text to char offsets in the normalised
/// text. Offsets of removed chars map to where the next kept char landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetMap {
    /// `len = raw_len + 1`; the last entry is the output length.
    map: Vec<usize>,
}

impl OffsetMap {
    /// Map for text that was not changed.
    #[must_use]
    pub fn identity(len: usize) -> Self {
        Self {
            map: (0..=len).collect(),
        }
    }

    /// Translate a raw offset. Offsets past the end clamp to the output length.
    #[must_use]
    pub fn translate(&self, raw: usize) -> usize {
        self.map
            .get(raw)
            .or_else(|| self.map.last())
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.map.len().saturating_sub(1)
    }

    /// Apply `next` after `self`.
    fn then(self, next: &OffsetMap) -> OffsetMap {
        OffsetMap {
            map: self.map.into_iter().map(|i| next.translate(i)).collect(),
        }
    }
}

/// Normalised text plus the map back to raw offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub offsets: OffsetMap,
}

/// Output accumulator for one pass.
struct Pass {
    out: String,
    out_len: usize,
    map: Vec<usize>,
}

impl Pass {
    fn with_capacity(n: usize) -> Self {
        Self {
            out: String::with_capacity(n),
            out_len: 0,
            map: Vec::with_capacity(n + 1),
        }
    }

    fn keep(&mut self, c: char) {
        self.map.push(self.out_len);
        self.out.push(c);
        self.out_len += 1;
    }

    fn drop_char(&mut self) {
        self.map.push(self.out_len);
    }

    /// Consume `consumed` raw chars, emit `replacement`.
    fn replace(&mut self, consumed: usize, replacement: &str) {
        for _ in 0..consumed {
            self.map.push(self.out_len);
        }
        self.out.push_str(replacement);
        self.out_len += replacement.chars().count();
    }

    fn finish(mut self) -> (String, OffsetMap) {
        self.map.push(self.out_len);
        (self.out, OffsetMap { map: self.map })
    }
}

/// Cleaning helpers shared by the transforming and cleaning stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCleaner;

impl TextCleaner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Normalise line endings, whitespace and invisible characters, repair
    /// common mojibake and trim the result.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> Normalized {
        let chars: Vec<char> = raw.chars().collect();
        let (text, map) = repair_mojibake(&chars);
        let (text, next) = normalize_chars(&text.chars().collect::<Vec<_>>());
        let map = map.then(&next);
        let (text, next) = strip_trailing_whitespace(&text.chars().collect::<Vec<_>>());
        let map = map.then(&next);
        let (text, next) = collapse_blank_lines(&text.chars().collect::<Vec<_>>());
        let map = map.then(&next);
        let (text, next) = trim(&text.chars().collect::<Vec<_>>());
        Normalized {
            text,
            offsets: map.then(&next),
        }
    }

    /// Collapse whitespace in a chapter title, drop heading marker runs
    /// that stand apart from the text and a single trailing `:`.
    ///
    /// A `#` run touching a word is part of the title (`C#`).
    #[must_use]
    pub fn tidy_title(&self, title: &str) -> String {
        let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
        let is_marker = |run: &str| run.bytes().all(|b| b == b'#');

        let mut tidied = collapsed.as_str();
        if let Some((run, rest)) = tidied.split_once(' ') {
            if is_marker(run) {
                tidied = rest;
            }
        }
        if let Some((rest, run)) = tidied.rsplit_once(' ') {
            if is_marker(run) {
                tidied = rest;
            }
        }
        let tidied = tidied.strip_suffix(':').unwrap_or(tidied).trim_end();
        if tidied.is_empty() {
            collapsed
        } else {
            tidied.to_string()
        }
    }

    /// Trim and collapse metadata strings, drop empty values and
    /// duplicate tags.
    #[must_use]
    pub fn sanitize_metadata(&self, metadata: Metadata) -> Metadata {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| clean_str(&v))
                .filter(|v| !v.is_empty())
        }
        fn clean_str(value: &str) -> String {
            value
                .chars()
                .filter(|c| !c.is_control() || c.is_whitespace())
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        }

        let mut tags: Vec<String> = Vec::new();
        for tag in metadata.tags {
            let tag = clean_str(&tag);
            if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                tags.push(tag);
            }
        }
        fn clean_map(map: BTreeMap<String, String>) -> BTreeMap<String, String> {
            map.into_iter()
                .map(|(k, v)| (clean_str(&k), clean_str(&v)))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .collect()
        }

        Metadata {
            title: clean(metadata.title),
            author: clean(metadata.author),
            publisher: clean(metadata.publisher),
            date: clean(metadata.date),
            language: clean(metadata.language),
            identifiers: clean_map(metadata.identifiers),
            description: clean(metadata.description),
            tags,
            custom_fields: clean_map(metadata.custom_fields),
        }
    }
}

fn repair_mojibake(chars: &[char]) -> (String, OffsetMap) {
    let mut pass = Pass::with_capacity(chars.len());
    let mut i = 0;
    'outer: while i < chars.len() {
        if matches!(chars[i], 'â' | 'Ã') {
            for (pattern, fixed) in MOJIBAKE {
                let len = pattern.chars().count();
                if i + len <= chars.len() && chars[i..i + len].iter().copied().eq(pattern.chars()) {
                    let mut buf = [0u8; 4];
                    pass.replace(len, fixed.encode_utf8(&mut buf));
                    i += len;
                    continue 'outer;
                }
            }
        }
        pass.keep(chars[i]);
        i += 1;
    }
    pass.finish()
}

fn normalize_chars(chars: &[char]) -> (String, OffsetMap) {
    let mut pass = Pass::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\r' => {
                if chars.get(i + 1) == Some(&'\n') {
                    pass.drop_char();
                } else {
                    pass.replace(1, "\n");
                }
            }
            '\x0C' => pass.replace(1, "\n\n"),
            '\n' | '\t' => pass.keep(c),
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{AD}' => {
                pass.drop_char();
            }
            '\u{A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => {
                pass.keep(' ');
            }
            '\u{2028}' | '\u{2029}' => pass.keep('\n'),
            _ if c.is_control() => pass.drop_char(),
            _ => pass.keep(c),
        }
        i += 1;
    }
    pass.finish()
}

fn strip_trailing_whitespace(chars: &[char]) -> (String, OffsetMap) {
    let mut pass = Pass::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ' ' || chars[i] == '\t' {
            let run_end = chars[i..]
                .iter()
                .position(|c| *c != ' ' && *c != '\t')
                .map_or(chars.len(), |p| i + p);
            let trailing = run_end == chars.len() || chars[run_end] == '\n';
            for &c in &chars[i..run_end] {
                if trailing {
                    pass.drop_char();
                } else {
                    pass.keep(c);
                }
            }
            i = run_end;
        } else {
            pass.keep(chars[i]);
            i += 1;
        }
    }
    pass.finish()
}

fn collapse_blank_lines(chars: &[char]) -> (String, OffsetMap) {
    let mut pass = Pass::with_capacity(chars.len());
    let mut run = 0;
    for &c in chars {
        if c == '\n' {
            run += 1;
            if run > MAX_NEWLINES {
                pass.drop_char();
                continue;
            }
        } else {
            run = 0;
        }
        pass.keep(c);
    }
    pass.finish()
}

fn trim(chars: &[char]) -> (String, OffsetMap) {
    let start = chars
        .iter()
        .position(|c| !c.is_whitespace())
        .unwrap_or(chars.len());
    let end = chars
        .iter()
        .rposition(|c| !c.is_whitespace())
        .map_or(start, |p| p + 1);
    let mut pass = Pass::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if i >= start && i < end {
            pass.keep(c);
        } else {
            pass.drop_char();
        }
    }
    pass.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> Normalized {
        TextCleaner::new().normalize(raw)
    }

    #[test]
    fn line_endings_and_trailing_space() {
        let n = normalize("a  \r\nb\rc\t\n");
        assert_eq!(n.text, "a\nb\nc");
    }

    #[test]
    fn invisible_and_control_chars() {
        let n = normalize("\u{FEFF}co\u{AD}op\u{200B}e\u{7}rate\u{A0}now");
        assert_eq!(n.text, "cooperate now");
    }

    #[test]
    fn blank_lines_capped_at_two() {
        let n = normalize("a\n\n\n\n\n\nb\x0C\x0Cc");
        assert_eq!(n.text, "a\n\n\nb\n\n\nc");
    }

    #[test]
    fn mojibake_is_repaired() {
        let n = normalize("It\u{e2}\u{20ac}\u{2122}s caf\u{c3}\u{a9}");
        assert_eq!(n.text, "It\u{2019}s caf\u{e9}");
    }

    #[test]
    fn offsets_follow_removed_chars() {
        let raw = "  \u{FEFF}Hello\r\n\r\n\r\n\r\n\r\nWorld  ";
        let n = normalize(raw);
        assert_eq!(n.text, "Hello\n\n\nWorld");
        let raw_world = raw.chars().collect::<Vec<_>>();
        let w = raw_world.iter().position(|c| *c == 'W').unwrap();
        assert_eq!(n.offsets.translate(w), n.text.chars().position(|c| c == 'W').unwrap());
        assert_eq!(n.offsets.translate(0), 0);
        assert_eq!(n.offsets.translate(raw.chars().count()), n.text.chars().count());
        assert_eq!(n.offsets.translate(9999), n.text.chars().count());
    }

    #[test]
    fn offsets_are_monotonic() {
        let raw = "x\u{AD}\u{AD}y\r\n\tz \n\n\n\n\n \u{c3}\u{a9}";
        let n = normalize(raw);
        let len = raw.chars().count();
        let mut prev = 0;
        for i in 0..=len {
            let t = n.offsets.translate(i);
            assert!(t >= prev);
            assert!(t <= n.text.chars().count());
            prev = t;
        }
        assert_eq!(n.offsets.raw_len(), len);
    }

    #[test]
    fn clean_text_is_unchanged() {
        let n = normalize("Already\n\nclean.");
        assert_eq!(n.text, "Already\n\nclean.");
        assert_eq!(n.offsets, OffsetMap::identity(15));
    }

    #[test]
    fn tidy_title_collapses_and_strips() {
        let c = TextCleaner::new();
        assert_eq!(c.tidy_title("  Chapter   One:  "), "Chapter One");
        assert_eq!(c.tidy_title("## Intro ##"), "Intro");
        assert_eq!(c.tidy_title("..."), "...");
    }

    #[test]
    fn tidy_title_keeps_meaningful_punctuation() {
        let c = TextCleaner::new();
        assert_eq!(c.tidy_title("Programming in C#"), "Programming in C#");
        assert_eq!(c.tidy_title("C# ##"), "C#");
        assert_eq!(c.tidy_title("Wait..."), "Wait...");
        assert_eq!(c.tidy_title("Made in the U.S.A."), "Made in the U.S.A.");
        assert_eq!(c.tidy_title("Part One -"), "Part One -");
    }

    #[test]
    fn sanitize_metadata_trims_and_dedupes() {
        let mut m = Metadata::default().with_title("  The \n Title ");
        m.author = Some("   ".into());
        m.tags = vec!["Rust".into(), "rust".into(), " docs ".into(), String::new()];
        m.custom_fields.insert("k".into(), " v\u{7} ".into());
        let clean = TextCleaner::new().sanitize_metadata(m);
        assert_eq!(clean.title.as_deref(), Some("The Title"));
        assert!(clean.author.is_none());
        assert_eq!(clean.tags, vec!["Rust", "docs"]);
        assert_eq!(clean.custom_fields.get("k").map(String::as_str), Some("v"));
    }
}
