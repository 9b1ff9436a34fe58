use tree_sitter::Node;

use crate::config::ParseConfig;
use crate::error::Result;
use crate::ingest::plugin::ExtractorPlugin;
use crate::ingest::text::plaintext::decode_text;
use crate::models::extraction::RawExtraction;
use crate::models::format::FormatKind;
use crate::models::metadata::{Metadata, MetadataFragment};
use crate::text::converter::{attribute, element_attributes, element_tag, inner_text, parse_html};

/// HTML / XHTML extractor.
///
/// Reads `<title>`, `<meta name|property=… content=…>` and the root `lang`
/// attribute as native metadata and hands the markup on untouched
/// (`ContentForm::Html`); conversion to text happens in the transforming
/// stage.
pub struct HtmlExtractor;

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorPlugin for HtmlExtractor {
    fn name(&self) -> &str {
        "html"
    }

    fn supports(&self, kind: FormatKind) -> bool {
        matches!(kind, FormatKind::Html | FormatKind::Xml)
    }

    fn extract(&self, bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
        let source = decode_text(bytes)?;
        let tree = parse_html(&source)?;
        let root = tree.root_node();

        let mut metadata = Metadata::default();
        collect_metadata(root, &source, &mut metadata);

        let mut extraction = RawExtraction::html(source.as_str());
        if root.has_error() {
            extraction
                .warnings
                .push("HTML contains syntax errors; output may be incomplete".into());
        }
        if !metadata.is_empty() {
            extraction.metadata.push(MetadataFragment::native(metadata));
        }
        Ok(extraction)
    }
}

fn collect_metadata(node: Node<'_>, source: &str, metadata: &mut Metadata) {
    if node.kind() == "element" {
        match element_tag(node, source).as_deref() {
            Some("html") => {
                if let Some(lang) = attribute(node, source, "lang")
                    .or_else(|| attribute(node, source, "xml:lang"))
                {
                    metadata.set_field("language", &lang);
                }
            }
            Some("title") if metadata.title.is_none() => {
                metadata.set_field("title", &inner_text(node, source));
            }
            Some("meta") => apply_meta(node, source, metadata),
            Some("body") => return,
            _ => {}
        }
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    for child in children {
        collect_metadata(child, source, metadata);
    }
}

fn apply_meta(node: Node<'_>, source: &str, metadata: &mut Metadata) {
    let attrs = element_attributes(node, source);
    let find = |name: &str| {
        attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };
    let Some(content) = find("content") else {
        return;
    };
    let Some(key) = find("name").or_else(|| find("property")) else {
        return;
    };
    // viewport, generator and friends are presentation, not document metadata
    if matches!(
        key.to_ascii_lowercase().as_str(),
        "viewport" | "generator" | "robots" | "theme-color" | "og:type" | "og:image"
    ) {
        return;
    }
    if key.eq_ignore_ascii_case("og:title") && metadata.title.is_some() {
        return;
    }
    metadata.set_field(key, content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extraction::ContentForm;

    fn extract(source: &str) -> RawExtraction {
        HtmlExtractor::new()
            .extract(source.as_bytes(), &ParseConfig::default())
            .unwrap()
    }

    #[test]
    fn reads_head_metadata() {
        let raw = extract(
            r#"<!DOCTYPE html>
<html lang="de">
<head>
  <title>Der  Titel</title>
  <meta name="author" content="Anna">
  <meta name="description" content="Kurz">
  <meta name="keywords" content="a, b">
  <meta name="viewport" content="width=device-width">
  <meta property="og:title" content="Other">
</head>
<body><p>Text</p></body>
</html>"#,
        );
        assert_eq!(raw.form, ContentForm::Html);
        let m = &raw.metadata[0].metadata;
        assert_eq!(m.title.as_deref(), Some("Der Titel"));
        assert_eq!(m.author.as_deref(), Some("Anna"));
        assert_eq!(m.description.as_deref(), Some("Kurz"));
        assert_eq!(m.language.as_deref(), Some("de"));
        assert_eq!(m.tags, vec!["a", "b"]);
        assert!(m.custom_fields.is_empty());
    }

    #[test]
    fn markup_is_passed_through() {
        let src = "<p>Hello</p>";
        let raw = extract(src);
        assert_eq!(raw.content, src);
        assert!(raw.metadata.is_empty());
    }

    #[test]
    fn invalid_utf8_fails() {
        let err = HtmlExtractor::new()
            .extract(b"<p>caf\xE9</p>", &ParseConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn supports_html_and_xml() {
        let e = HtmlExtractor::new();
        assert!(e.supports(FormatKind::Html));
        assert!(e.supports(FormatKind::Xml));
        assert!(!e.supports(FormatKind::Markdown));
    }
}
