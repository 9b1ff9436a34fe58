//! HTML to plain text conversion.
//!
//! The primary path walks a tree-sitter HTML syntax tree and emits
//! paragraphs separated by blank lines, headings as `#` lines (so the
//! heading strategy of structure detection sees them), list items as
//! `- ` lines and `<pre>` blocks verbatim. Image elements are collected
//! with their character position in the produced text.
//!
//! [`strip_tags`] is the regex fallback used when the tree cannot be built.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{DocweaveError, Result};
use crate::models::extraction::RawImage;

static ENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("valid entity regex")
});

static HIDDEN_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>|<!--.*?-->")
        .expect("valid hidden block regex")
});

static HEADING_OPEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h([1-6])\b[^>]*>").expect("valid heading regex"));

static BLOCK_TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|h[1-6]|li|ul|ol|br|hr|tr|table|section|article|blockquote|header|footer|pre)\b[^>]*>")
        .expect("valid block tag regex")
});

static ANY_TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "details", "div", "dl",
    "dt", "figcaption", "figure", "footer", "form", "header", "html", "main", "nav", "ol", "p",
    "section", "summary", "table", "tbody", "tfoot", "thead", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &["head", "template", "noscript", "svg", "math"];

/// Text produced from HTML plus the images found along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedHtml {
    pub text: String,
    pub images: Vec<RawImage>,
}

/// Parse HTML with tree-sitter.
pub fn parse_html(source: &str) -> Result<Tree> {
    let language: Language = tree_sitter_html::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| DocweaveError::Extraction(format!("failed to set HTML language: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| DocweaveError::Extraction("HTML parser produced no tree".into()))
}

/// Convert HTML markup to text.
pub fn html_to_text(source: &str) -> Result<ConvertedHtml> {
    let tree = parse_html(source)?;
    let mut writer = TextWriter::new(source);
    writer.walk(tree.root_node());
    Ok(writer.finish())
}

/// Regex-based tag stripping. Loses images and inline spacing subtleties.
#[must_use]
pub fn strip_tags(source: &str) -> String {
    let without_hidden = HIDDEN_BLOCK_PATTERN.replace_all(source, " ");
    let with_headings = HEADING_OPEN_PATTERN.replace_all(&without_hidden, |caps: &Captures| {
        let level = caps[1].parse::<usize>().unwrap_or(1);
        format!("\n\n{} ", "#".repeat(level))
    });
    let with_breaks = BLOCK_TAG_PATTERN.replace_all(&with_headings, "\n\n");
    let bare = ANY_TAG_PATTERN.replace_all(&with_breaks, "");
    decode_entities(&bare)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode named and numeric character references. Unknown names are kept.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_PATTERN
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "shy" => '\u{ad}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "deg" => '\u{b0}',
        "middot" => '\u{b7}',
        "bull" => '\u{2022}',
        "eacute" => '\u{e9}',
        "egrave" => '\u{e8}',
        "aacute" => '\u{e1}',
        "agrave" => '\u{e0}',
        "uuml" => '\u{fc}',
        "ouml" => '\u{f6}',
        "auml" => '\u{e4}',
        "szlig" => '\u{df}',
        "ccedil" => '\u{e7}',
        _ => return None,
    };
    Some(c)
}

/// Lowercase tag name of an element node.
#[must_use]
pub fn element_tag(node: Node<'_>, source: &str) -> Option<String> {
    let tag = open_tag(node)?;
    let mut cursor = tag.walk();
    let name = tag
        .children(&mut cursor)
        .find(|c| c.kind() == "tag_name")?;
    Some(node_text(name, source).to_ascii_lowercase())
}

/// Attributes of an element's opening tag, names lowercased, values
/// unquoted and entity-decoded.
#[must_use]
pub fn element_attributes(node: Node<'_>, source: &str) -> Vec<(String, String)> {
    let Some(tag) = open_tag(node) else {
        return Vec::new();
    };
    let mut cursor = tag.walk();
    let attributes: Vec<Node<'_>> = tag
        .children(&mut cursor)
        .filter(|c| c.kind() == "attribute")
        .collect();

    attributes
        .into_iter()
        .filter_map(|attr| {
            let mut cursor = attr.walk();
            let parts: Vec<Node<'_>> = attr.children(&mut cursor).collect();
            let name = parts.iter().find(|p| p.kind() == "attribute_name")?;
            let value = parts
                .iter()
                .find(|p| matches!(p.kind(), "attribute_value" | "quoted_attribute_value"))
                .map(|v| {
                    let raw = node_text(*v, source);
                    decode_entities(raw.trim_matches(|c| c == '"' || c == '\''))
                })
                .unwrap_or_default();
            Some((node_text(*name, source).to_ascii_lowercase(), value))
        })
        .collect()
}

/// Value of a single attribute.
#[must_use]
pub fn attribute(node: Node<'_>, source: &str, name: &str) -> Option<String> {
    element_attributes(node, source)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}

/// Visible text of a subtree with whitespace collapsed.
#[must_use]
pub fn inner_text(node: Node<'_>, source: &str) -> String {
    let mut pieces = Vec::new();
    collect_text(node, source, &mut pieces);
    decode_entities(&pieces.join(" "))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text<'s>(node: Node<'_>, source: &'s str, pieces: &mut Vec<&'s str>) {
    match node.kind() {
        "text" | "entity" => pieces.push(node_text(node, source)),
        "script_element" | "style_element" | "comment" => {}
        _ => {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            for child in children {
                collect_text(child, source, pieces);
            }
        }
    }
}

fn open_tag(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"));
    found
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Accumulates converted text and tracks the char length as it grows.
struct TextWriter<'s> {
    source: &'s str,
    out: String,
    chars: usize,
    /// Newlines owed before the next piece of text.
    pending_breaks: usize,
    /// Source byte where the last inline text ended.
    last_end: usize,
    images: Vec<RawImage>,
}

impl<'s> TextWriter<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            out: String::with_capacity(source.len() / 2),
            chars: 0,
            pending_breaks: 0,
            last_end: 0,
            images: Vec::new(),
        }
    }

    fn finish(self) -> ConvertedHtml {
        let text = self.out.trim_end().to_string();
        let len = text.chars().count();
        let images = self
            .images
            .into_iter()
            .map(|mut img| {
                img.position = img.position.min(len);
                img
            })
            .collect();
        ConvertedHtml { text, images }
    }

    fn push(&mut self, s: &str) {
        self.chars += s.chars().count();
        self.out.push_str(s);
    }

    fn request_break(&mut self, newlines: usize) {
        self.pending_breaks = self.pending_breaks.max(newlines);
    }

    fn flush_breaks(&mut self) {
        if self.pending_breaks == 0 {
            return;
        }
        if !self.out.is_empty() {
            let present = self.out.chars().rev().take_while(|c| *c == '\n').count();
            for _ in present..self.pending_breaks {
                self.push("\n");
            }
        }
        self.pending_breaks = 0;
    }

    fn push_inline(&mut self, node: Node<'_>) {
        let raw = node_text(node, self.source);
        let text = decode_entities(raw)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return;
        }
        if self.pending_breaks > 0 {
            self.flush_breaks();
        } else if self.needs_space_before(node.start_byte()) {
            self.push(" ");
        }
        self.push(&text);
        self.last_end = node.end_byte();
    }

    fn needs_space_before(&self, start: usize) -> bool {
        if self.out.is_empty() || self.out.ends_with(char::is_whitespace) {
            return false;
        }
        let gap = self
            .source
            .get(self.last_end.min(start)..start)
            .unwrap_or("");
        gap.chars().any(char::is_whitespace)
    }

    fn walk(&mut self, node: Node<'_>) {
        match node.kind() {
            "text" | "entity" => self.push_inline(node),
            "script_element" | "style_element" | "comment" | "doctype" => {}
            "element" => self.element(node),
            _ => self.children(node),
        }
    }

    fn children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn element(&mut self, node: Node<'_>) {
        let Some(tag) = element_tag(node, self.source) else {
            self.children(node);
            return;
        };
        let tag = tag.as_str();
        if SKIPPED_TAGS.contains(&tag) {
            return;
        }
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let title = inner_text(node, self.source);
                if title.is_empty() {
                    return;
                }
                let level = usize::from(tag.as_bytes()[1] - b'0');
                self.request_break(2);
                self.flush_breaks();
                self.push(&format!("{} {title}", "#".repeat(level)));
                self.request_break(2);
                self.last_end = node.end_byte();
            }
            "pre" => {
                let body = self.preformatted(node);
                if body.trim().is_empty() {
                    return;
                }
                self.request_break(2);
                self.flush_breaks();
                self.push(body.trim_end());
                self.request_break(2);
                self.last_end = node.end_byte();
            }
            "li" => {
                self.request_break(1);
                self.flush_breaks();
                self.push("- ");
                self.children(node);
                self.request_break(1);
            }
            "br" => {
                self.request_break(1);
                self.flush_breaks_if_text();
            }
            "hr" => self.request_break(2),
            "img" => self.image(node),
            "td" | "th" => {
                if !self.out.is_empty() && !self.out.ends_with(char::is_whitespace) {
                    self.push(" ");
                }
                self.children(node);
            }
            _ if BLOCK_TAGS.contains(&tag) => {
                self.request_break(2);
                self.children(node);
                self.request_break(2);
            }
            _ => self.children(node),
        }
    }

    /// A `<br>` always yields a line break, even between two inline runs.
    fn flush_breaks_if_text(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.flush_breaks();
        }
    }

    fn preformatted(&self, node: Node<'_>) -> String {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        let start = children
            .iter()
            .find(|c| c.kind() == "start_tag")
            .map_or(node.start_byte(), |c| c.end_byte());
        let end = children
            .iter()
            .find(|c| c.kind() == "end_tag")
            .map_or(node.end_byte(), |c| c.start_byte());
        let raw = self.source.get(start..end.max(start)).unwrap_or("");
        let raw = raw.strip_prefix('\n').unwrap_or(raw);
        decode_entities(&ANY_TAG_PATTERN.replace_all(raw, ""))
    }

    fn image(&mut self, node: Node<'_>) {
        let attrs = element_attributes(node, self.source);
        let get = |name: &str| {
            attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let dimension = |name: &str| {
            get(name).and_then(|v| v.trim_end_matches("px").parse::<u32>().ok())
        };
        self.images.push(RawImage {
            position: self.chars,
            path: get("src"),
            alt_text: get("alt"),
            width: dimension("width"),
            height: dimension("height"),
            format: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_headings() {
        let html = "<html><head><title>T</title></head><body>\
                    <h1>First  Part</h1><p>Hello <b>bold</b> world.</p>\
                    <p>Second\n   paragraph.</p><h2>Sub</h2><p>More</p></body></html>";
        let out = html_to_text(html).unwrap();
        assert_eq!(
            out.text,
            "# First Part\n\nHello bold world.\n\nSecond paragraph.\n\n## Sub\n\nMore"
        );
    }

    #[test]
    fn inline_markup_without_spaces_stays_joined() {
        let out = html_to_text("<p>foo<i>bar</i> baz</p>").unwrap();
        assert_eq!(out.text, "foobar baz");
    }

    #[test]
    fn entities_are_decoded() {
        let out = html_to_text("<p>Tom &amp; Jerry &#8212; &#x41;&copy; &bogus;</p>").unwrap();
        assert_eq!(out.text, "Tom & Jerry \u{2014} A\u{a9} &bogus;");
    }

    #[test]
    fn lists_and_breaks() {
        let out = html_to_text("<ul><li>one</li><li>two</li></ul><p>a<br>b</p>").unwrap();
        assert_eq!(out.text, "- one\n- two\n\na\nb");
    }

    #[test]
    fn scripts_and_styles_are_dropped() {
        let out =
            html_to_text("<p>keep</p><script>var x = 1;</script><style>p{}</style>").unwrap();
        assert_eq!(out.text, "keep");
    }

    #[test]
    fn preformatted_keeps_whitespace() {
        let out = html_to_text("<p>x</p><pre>\nfn main() {\n    go();\n}\n</pre>").unwrap();
        assert_eq!(out.text, "x\n\nfn main() {\n    go();\n}");
    }

    #[test]
    fn images_are_positioned_in_output() {
        let out = html_to_text(
            "<p>Before</p><img src=\"pics/a.png\" alt=\"An A\" width=\"120\"><p>After</p>",
        )
        .unwrap();
        assert_eq!(out.images.len(), 1);
        let img = &out.images[0];
        assert_eq!(img.path.as_deref(), Some("pics/a.png"));
        assert_eq!(img.alt_text.as_deref(), Some("An A"));
        assert_eq!(img.width, Some(120));
        assert_eq!(img.position, "Before".chars().count());
    }

    #[test]
    fn strip_tags_fallback() {
        let text = strip_tags(
            "<head><title>x</title></head><h2 class=\"c\">Sub</h2><p>a &lt; b</p><!-- gone -->",
        );
        assert!(text.contains("## Sub"));
        assert!(text.contains("a < b"));
        assert!(!text.contains("gone"));
        assert!(!text.contains("<p>"));
        assert!(!text.contains("title"));
    }

    #[test]
    fn attributes_are_read() {
        let src = "<html lang=\"en\"><body></body></html>";
        let tree = parse_html(src).unwrap();
        let root = tree.root_node();
        let mut cursor = root.walk();
        let html = root
            .children(&mut cursor)
            .find(|n| n.kind() == "element")
            .unwrap();
        assert_eq!(element_tag(html, src).as_deref(), Some("html"));
        assert_eq!(attribute(html, src, "lang").as_deref(), Some("en"));
    }
}
