use crate::models::document::Chapter;
use crate::models::metadata::Metadata;

/// Sanity checks on an assembled document. Each problem found is returned
/// as a warning; none of them stops the run.
#[must_use]
pub fn check(content: &str, chapters: &[Chapter], metadata: &Metadata) -> Vec<String> {
    let mut issues = Vec::new();

    if content.trim().is_empty() {
        issues.push("document content is empty".to_string());
    }
    if chapters.is_empty() {
        issues.push("no chapters were produced".to_string());
    }
    if metadata.is_empty() {
        issues.push("no metadata was found".to_string());
    }

    let replacement = content.chars().filter(|c| *c == '\u{FFFD}').count();
    if replacement > 0 {
        issues.push(format!(
            "content contains {replacement} replacement character(s); the source may be mis-decoded"
        ));
    }
    let control = content
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\t'))
        .count();
    if control > 0 {
        issues.push(format!("content contains {control} control character(s)"));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn chapter() -> Chapter {
        Chapter {
            chapter_id: "ch-0001".into(),
            title: "One".into(),
            content: "text".into(),
            start_position: 0,
            end_position: 4,
            word_count: 1,
            level: 1,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn clean_document_has_no_issues() {
        let issues = check("text", &[chapter()], &Metadata::default().with_title("T"));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn reports_each_problem() {
        let issues = check("  ", &[], &Metadata::default());
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn flags_replacement_and_control_chars() {
        let issues = check(
            "bad \u{FFFD}\u{FFFD} and \u{0007}\n\tok",
            &[chapter()],
            &Metadata::default().with_title("T"),
        );
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("2 replacement"));
        assert!(issues[1].contains("1 control"));
    }
}
