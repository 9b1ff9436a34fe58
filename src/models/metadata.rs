use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical document metadata. Every field is optional and an entirely
/// empty record is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Identifier scheme (isbn, doi, uuid, ...) to value.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, String>,
}

impl Metadata {
    /// True when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.publisher.is_none()
            && self.date.is_none()
            && self.language.is_none()
            && self.identifiers.is_empty()
            && self.description.is_none()
            && self.tags.is_empty()
            && self.custom_fields.is_empty()
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Assign a loosely named field (frontmatter key, `<meta name>`, PDF
    /// info entry). Dublin Core and Open Graph prefixes are ignored and
    /// unknown keys land in `custom_fields`. Blank values are dropped.
    pub fn set_field(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let lowered = key.trim().to_ascii_lowercase();
        let name = ["dc.", "dc:", "dcterms.", "og:", "article:", "book:"]
            .iter()
            .find_map(|prefix| lowered.strip_prefix(prefix))
            .unwrap_or(&lowered);
        match name {
            "title" => self.title = Some(value.to_string()),
            "author" | "authors" | "creator" => self.author = Some(value.to_string()),
            "publisher" => self.publisher = Some(value.to_string()),
            "date" | "published" | "published_time" | "pubdate" | "created" | "creationdate" => {
                self.date = Some(value.to_string());
            }
            "language" | "lang" | "locale" => self.language = Some(value.to_string()),
            "description" | "summary" | "abstract" => self.description = Some(value.to_string()),
            "tags" | "keywords" | "subject" | "subjects" | "tag" => {
                self.tags.extend(
                    value
                        .split([',', ';'])
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                );
            }
            "isbn" | "doi" | "issn" | "uuid" | "asin" => {
                self.identifiers.insert(name.to_string(), value.to_string());
            }
            "identifier" | "id" => {
                self.identifiers.insert("id".into(), value.to_string());
            }
            _ => {
                self.custom_fields
                    .insert(key.trim().to_string(), value.to_string());
            }
        }
    }
}

/// Origin class of a metadata fragment, in merge priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    /// Read from the format's own metadata (HTML meta, frontmatter, PDF info).
    Native,
    /// Supplied by the caller.
    Custom,
    /// Inferred (first heading, file name).
    Heuristic,
}

impl MetadataSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Custom => "custom",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Partial metadata tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFragment {
    pub source: MetadataSource,
    pub metadata: Metadata,
}

impl MetadataFragment {
    #[must_use]
    pub fn new(source: MetadataSource, metadata: Metadata) -> Self {
        Self { source, metadata }
    }

    #[must_use]
    pub fn native(metadata: Metadata) -> Self {
        Self::new(MetadataSource::Native, metadata)
    }

    #[must_use]
    pub fn custom(metadata: Metadata) -> Self {
        Self::new(MetadataSource::Custom, metadata)
    }

    #[must_use]
    pub fn heuristic(metadata: Metadata) -> Self {
        Self::new(MetadataSource::Heuristic, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metadata_is_empty() {
        assert!(Metadata::default().is_empty());
        assert!(!Metadata::default().with_title("T").is_empty());
    }

    #[test]
    fn empty_fields_are_omitted_from_json() {
        let json = serde_json::to_string(&Metadata::default().with_author("Ann")).unwrap();
        assert_eq!(json, r#"{"author":"Ann"}"#);
    }

    #[test]
    fn set_field_maps_aliases() {
        let mut m = Metadata::default();
        m.set_field("DC.Creator", "Ann Author");
        m.set_field("og:title", "A Title");
        m.set_field("keywords", "rust, parsing;  ,docs");
        m.set_field("isbn", "978-0");
        m.set_field("Rating", "5");
        m.set_field("publisher", "   ");
        assert_eq!(m.author.as_deref(), Some("Ann Author"));
        assert_eq!(m.title.as_deref(), Some("A Title"));
        assert_eq!(m.tags, vec!["rust", "parsing", "docs"]);
        assert_eq!(m.identifiers.get("isbn").map(String::as_str), Some("978-0"));
        assert_eq!(m.custom_fields.get("Rating").map(String::as_str), Some("5"));
        assert!(m.publisher.is_none());
    }

    #[test]
    fn sources_order_by_priority() {
        assert!(MetadataSource::Native < MetadataSource::Custom);
        assert!(MetadataSource::Custom < MetadataSource::Heuristic);
    }
}
