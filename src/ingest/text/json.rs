use serde_json::Value;

use crate::config::ParseConfig;
use crate::error::{DocweaveError, Result};
use crate::ingest::plugin::ExtractorPlugin;
use crate::ingest::text::plaintext::decode_text;
use crate::models::extraction::RawExtraction;
use crate::models::format::FormatKind;
use crate::models::metadata::{Metadata, MetadataFragment};

/// Top-level keys read as native metadata when they hold scalars.
const METADATA_KEYS: &[&str] = &[
    "title",
    "author",
    "authors",
    "publisher",
    "date",
    "language",
    "lang",
    "description",
    "summary",
    "tags",
    "keywords",
    "isbn",
    "doi",
];

/// Nesting depth rendered before values are written as compact JSON.
const MAX_RENDER_DEPTH: usize = 4;

/// JSON extractor: each top-level key becomes a `#` heading followed by
/// a readable rendering of its value.
pub struct JsonExtractor;

impl Default for JsonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorPlugin for JsonExtractor {
    fn name(&self) -> &str {
        "json"
    }

    fn supports(&self, kind: FormatKind) -> bool {
        kind == FormatKind::Json
    }

    fn extract(&self, bytes: &[u8], _config: &ParseConfig) -> Result<RawExtraction> {
        let source = decode_text(bytes)?;
        let value: Value = serde_json::from_str(&source)
            .map_err(|e| DocweaveError::Extraction(format!("invalid JSON: {e}")))?;

        let mut content = String::new();
        let mut metadata = Metadata::default();
        match &value {
            Value::Object(map) => {
                for (key, val) in map {
                    if METADATA_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                        if let Some(text) = flat_text(val) {
                            metadata.set_field(key, &text);
                        }
                    }
                    content.push_str("# ");
                    content.push_str(key);
                    content.push_str("\n\n");
                    render(val, 0, &mut content);
                    content.push_str("\n\n");
                }
            }
            other => render(other, 0, &mut content),
        }

        let mut extraction = RawExtraction::text(content.trim_end());
        if !metadata.is_empty() {
            extraction.metadata.push(MetadataFragment::native(metadata));
        }
        Ok(extraction)
    }
}

/// Scalars and arrays of scalars as one line of text.
fn flat_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| match v {
                    Value::Array(_) | Value::Object(_) => None,
                    other => flat_text(other),
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

fn render(value: &Value, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Null => {}
        Value::String(s) => {
            out.push_str(&indent);
            out.push_str(s);
        }
        Value::Number(_) | Value::Bool(_) => {
            out.push_str(&indent);
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            let lines: Vec<String> = items
                .iter()
                .map(|item| {
                    let mut line = String::new();
                    if depth >= MAX_RENDER_DEPTH {
                        line.push_str(&item.to_string());
                    } else {
                        render(item, 0, &mut line);
                    }
                    format!("{indent}- {}", line.trim_start())
                })
                .collect();
            out.push_str(&lines.join("\n"));
        }
        Value::Object(map) => {
            let lines: Vec<String> = map
                .iter()
                .map(|(k, v)| match v {
                    Value::Object(_) | Value::Array(_) if depth < MAX_RENDER_DEPTH => {
                        let mut nested = String::new();
                        render(v, depth + 1, &mut nested);
                        format!("{indent}{k}:\n{nested}")
                    }
                    Value::String(s) => format!("{indent}{k}: {s}"),
                    Value::Null => format!("{indent}{k}:"),
                    other => format!("{indent}{k}: {other}"),
                })
                .collect();
            out.push_str(&lines.join("\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Result<RawExtraction> {
        JsonExtractor::new().extract(source.as_bytes(), &ParseConfig::default())
    }

    #[test]
    fn top_level_keys_become_headings_in_order() {
        let raw = extract(r#"{"zeta": "last key first", "alpha": [1, 2], "nested": {"a": "b", "n": null}}"#)
            .unwrap();
        assert_eq!(
            raw.content,
            "# zeta\n\nlast key first\n\n# alpha\n\n- 1\n- 2\n\n# nested\n\na: b\nn:"
        );
    }

    #[test]
    fn scalar_metadata_keys_are_native() {
        let raw = extract(r#"{"title": "Report", "keywords": ["x", "y"], "body": "text"}"#).unwrap();
        let m = &raw.metadata[0].metadata;
        assert_eq!(m.title.as_deref(), Some("Report"));
        assert_eq!(m.tags, vec!["x", "y"]);
        assert!(m.custom_fields.is_empty());
    }

    #[test]
    fn top_level_array_renders_items() {
        let raw = extract(r#"["one", {"k": 1}]"#).unwrap();
        assert_eq!(raw.content, "- one\n- k: 1");
        assert!(raw.metadata.is_empty());
    }

    #[test]
    fn invalid_json_fails() {
        let err = extract("{not json").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}
