use std::sync::LazyLock;

use regex::Regex;
use serde_yaml_ng::Value;

use crate::config::ParseConfig;
use crate::error::Result;
use crate::ingest::plugin::ExtractorPlugin;
use crate::ingest::text::plaintext::decode_text;
use crate::models::extraction::{RawExtraction, RawImage};
use crate::models::format::FormatKind;
use crate::models::metadata::{Metadata, MetadataFragment};

static IMAGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"([^"]*)")?\s*\)"#)
        .expect("valid markdown image regex")
});

/// Markdown extractor: YAML frontmatter becomes native metadata and
/// `![alt](path)` references become images. Headings are left in the text
/// for structure detection.
pub struct MarkdownExtractor;

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorPlugin for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown"
    }

    fn supports(&self, kind: FormatKind) -> bool {
        kind == FormatKind::Markdown
    }

    fn extract(&self, bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
        let source = decode_text(bytes)?;
        let mut warnings = Vec::new();

        let (frontmatter, body) = split_frontmatter(&source);
        let mut fragments = Vec::new();
        if let Some(yaml) = frontmatter {
            match serde_yaml_ng::from_str::<Value>(yaml) {
                Ok(value) => {
                    let metadata = frontmatter_metadata(&value);
                    if !metadata.is_empty() {
                        fragments.push(MetadataFragment::native(metadata));
                    }
                }
                Err(e) => warnings.push(format!("ignoring malformed frontmatter: {e}")),
            }
        }

        let mut extraction = RawExtraction::text(body);
        extraction.images = find_images(body);
        extraction.metadata = fragments;
        extraction.warnings = warnings;
        Ok(extraction)
    }
}

/// Split a leading `---` fenced YAML block from the body.
fn split_frontmatter(source: &str) -> (Option<&str>, &str) {
    let Some(rest) = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, source)
}

fn frontmatter_metadata(value: &Value) -> Metadata {
    let mut metadata = Metadata::default();
    let Value::Mapping(map) = value else {
        return metadata;
    };
    for (key, val) in map {
        let Some(key) = key.as_str() else { continue };
        match val {
            Value::Sequence(items) => {
                let joined = items
                    .iter()
                    .filter_map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(", ");
                metadata.set_field(key, &joined);
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    metadata.set_field(key, &text);
                }
            }
        }
    }
    metadata
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn find_images(body: &str) -> Vec<RawImage> {
    IMAGE_PATTERN
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let path = caps.get(2)?.as_str().to_string();
            let alt = caps.get(1).map(|m| m.as_str().trim().to_string());
            Some(RawImage {
                position: body[..whole.start()].chars().count(),
                path: Some(path),
                alt_text: alt.filter(|a| !a.is_empty()),
                ..RawImage::default()
            })
        })
        .collect()
}
