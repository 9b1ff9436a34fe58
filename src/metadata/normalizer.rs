use std::collections::BTreeMap;

use crate::models::metadata::{Metadata, MetadataFragment, MetadataSource};

/// Merged metadata plus one warning per dropped conflicting value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedMetadata {
    pub metadata: Metadata,
    pub conflicts: Vec<String>,
}

/// Merges metadata fragments by source priority: native, then custom,
/// then heuristic. Fragments of equal priority keep their input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataNormalizer;

impl MetadataNormalizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve every field independently: the first non-blank value in
    /// priority order wins. Identifiers and custom fields resolve per key;
    /// the first non-empty tag list wins.
    #[must_use]
    pub fn merge(&self, fragments: &[MetadataFragment]) -> MergedMetadata {
        let mut ordered: Vec<&MetadataFragment> = fragments.iter().collect();
        ordered.sort_by_key(|f| f.source);

        let mut conflicts = Vec::new();
        let mut scalar = |name: &str, get: fn(&Metadata) -> &Option<String>| {
            resolve(
                name,
                ordered
                    .iter()
                    .filter_map(|f| get(&f.metadata).as_deref().map(|v| (f.source, v))),
                &mut conflicts,
            )
        };

        let title = scalar("title", |m| &m.title);
        let author = scalar("author", |m| &m.author);
        let publisher = scalar("publisher", |m| &m.publisher);
        let date = scalar("date", |m| &m.date);
        let language = scalar("language", |m| &m.language);
        let description = scalar("description", |m| &m.description);

        let identifiers = resolve_map("identifiers", &ordered, |m| &m.identifiers, &mut conflicts);
        let custom_fields =
            resolve_map("custom_fields", &ordered, |m| &m.custom_fields, &mut conflicts);
        let tags = resolve_tags(&ordered, &mut conflicts);

        MergedMetadata {
            metadata: Metadata {
                title,
                author,
                publisher,
                date,
                language,
                identifiers,
                description,
                tags,
                custom_fields,
            },
            conflicts,
        }
    }
}

fn resolve<'a>(
    field: &str,
    values: impl Iterator<Item = (MetadataSource, &'a str)>,
    conflicts: &mut Vec<String>,
) -> Option<String> {
    let mut winner: Option<(MetadataSource, &str)> = None;
    for (source, value) in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match winner {
            None => winner = Some((source, value)),
            Some((kept_source, kept)) if kept != value => {
                conflicts.push(conflict(field, kept, kept_source, value, source));
            }
            Some(_) => {}
        }
    }
    winner.map(|(_, v)| v.to_string())
}

fn resolve_map(
    field: &str,
    ordered: &[&MetadataFragment],
    get: fn(&Metadata) -> &BTreeMap<String, String>,
    conflicts: &mut Vec<String>,
) -> BTreeMap<String, String> {
    let mut keys: Vec<&String> = ordered.iter().flat_map(|f| get(&f.metadata).keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let name = format!("{field}.{key}");
            let values = ordered
                .iter()
                .filter_map(|f| get(&f.metadata).get(key).map(|v| (f.source, v.as_str())));
            resolve(&name, values, conflicts).map(|v| (key.clone(), v))
        })
        .collect()
}

fn resolve_tags(ordered: &[&MetadataFragment], conflicts: &mut Vec<String>) -> Vec<String> {
    let mut winner: Option<(MetadataSource, Vec<String>)> = None;
    for fragment in ordered {
        let tags: Vec<String> = fragment
            .metadata
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            continue;
        }
        match &winner {
            None => winner = Some((fragment.source, tags)),
            Some((kept_source, kept)) if *kept != tags => {
                conflicts.push(conflict(
                    "tags",
                    &kept.join(", "),
                    *kept_source,
                    &tags.join(", "),
                    fragment.source,
                ));
            }
            Some(_) => {}
        }
    }
    winner.map(|(_, t)| t).unwrap_or_default()
}

fn conflict(
    field: &str,
    kept: &str,
    kept_source: MetadataSource,
    dropped: &str,
    dropped_source: MetadataSource,
) -> String {
    format!(
        "metadata conflict on '{field}': kept \"{kept}\" ({}), dropped \"{dropped}\" ({})",
        kept_source.as_str(),
        dropped_source.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(fragments: &[MetadataFragment]) -> MergedMetadata {
        MetadataNormalizer::new().merge(fragments)
    }

    #[test]
    fn native_beats_heuristic_with_conflict_warning() {
        let merged = merge(&[
            MetadataFragment::heuristic(Metadata::default().with_title("B")),
            MetadataFragment::native(Metadata::default().with_title("A")),
        ]);
        assert_eq!(merged.metadata.title.as_deref(), Some("A"));
        assert_eq!(
            merged.conflicts,
            vec![r#"metadata conflict on 'title': kept "A" (native), dropped "B" (heuristic)"#]
        );
    }

    #[test]
    fn fields_resolve_independently() {
        let merged = merge(&[
            MetadataFragment::native(Metadata::default().with_title("Native Title")),
            MetadataFragment::custom(Metadata::default().with_author("Custom Author")),
            MetadataFragment::heuristic(
                Metadata::default()
                    .with_title("Native Title")
                    .with_author("Guess"),
            ),
        ]);
        assert_eq!(merged.metadata.title.as_deref(), Some("Native Title"));
        assert_eq!(merged.metadata.author.as_deref(), Some("Custom Author"));
        assert_eq!(merged.conflicts.len(), 1);
        assert!(merged.conflicts[0].contains("'author'"));
    }

    #[test]
    fn blank_values_do_not_win() {
        let merged = merge(&[
            MetadataFragment::native(Metadata::default().with_title("   ")),
            MetadataFragment::heuristic(Metadata::default().with_title("Fallback")),
        ]);
        assert_eq!(merged.metadata.title.as_deref(), Some("Fallback"));
        assert!(merged.conflicts.is_empty());
    }

    #[test]
    fn equal_priority_keeps_input_order() {
        let merged = merge(&[
            MetadataFragment::native(Metadata::default().with_title("first")),
            MetadataFragment::native(Metadata::default().with_title("second")),
        ]);
        assert_eq!(merged.metadata.title.as_deref(), Some("first"));
    }

    #[test]
    fn maps_merge_per_key() {
        let mut native = Metadata::default();
        native.identifiers.insert("isbn".into(), "111".into());
        let mut custom = Metadata::default();
        custom.identifiers.insert("isbn".into(), "222".into());
        custom.identifiers.insert("doi".into(), "10.1/x".into());
        custom.custom_fields.insert("series".into(), "S".into());

        let merged = merge(&[MetadataFragment::custom(custom), MetadataFragment::native(native)]);
        assert_eq!(merged.metadata.identifiers.get("isbn").map(String::as_str), Some("111"));
        assert_eq!(merged.metadata.identifiers.get("doi").map(String::as_str), Some("10.1/x"));
        assert_eq!(merged.metadata.custom_fields.len(), 1);
        assert_eq!(merged.conflicts.len(), 1);
        assert!(merged.conflicts[0].contains("identifiers.isbn"));
    }

    #[test]
    fn first_non_empty_tag_list_wins() {
        let mut custom = Metadata::default();
        custom.tags = vec!["x".into()];
        let mut heuristic = Metadata::default();
        heuristic.tags = vec!["y".into(), "z".into()];
        let merged = merge(&[
            MetadataFragment::native(Metadata::default()),
            MetadataFragment::heuristic(heuristic),
            MetadataFragment::custom(custom),
        ]);
        assert_eq!(merged.metadata.tags, vec!["x"]);
        assert_eq!(merged.conflicts.len(), 1);
    }

    #[test]
    fn no_fragments_is_empty_metadata() {
        let merged = merge(&[]);
        assert!(merged.metadata.is_empty());
        assert!(merged.conflicts.is_empty());
    }
}
