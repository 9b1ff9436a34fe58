use super::{lines, Boundary};
use crate::models::extraction::StructureHint;

/// Accept extractor hints when every offset lies inside the content (or is
/// zero for empty content) and offsets strictly increase.
pub(super) fn from_hints(content: &str, hints: &[StructureHint]) -> Option<Vec<Boundary>> {
    if hints.is_empty() {
        return None;
    }
    let len = content.chars().count();
    let in_range = |offset: usize| offset < len || (len == 0 && offset == 0);
    let increasing = hints.windows(2).all(|w| w[0].offset < w[1].offset);
    if !increasing || !hints.iter().all(|h| in_range(h.offset)) {
        return None;
    }

    let all_lines = lines(content);
    Some(
        hints
            .iter()
            .map(|hint| Boundary {
                title: hint.title.trim().to_string(),
                start: hint.offset,
                body_start: skip_title_line(&all_lines, hint),
                level: hint.level.max(1),
            })
            .collect(),
    )
}

/// When the hinted line repeats the title, the body starts on the next line.
fn skip_title_line(all_lines: &[super::Line<'_>], hint: &StructureHint) -> usize {
    all_lines
        .iter()
        .find(|l| l.start == hint.offset)
        .filter(|l| {
            let text = l.text.trim().trim_start_matches('#').trim();
            !text.is_empty() && text.eq_ignore_ascii_case(hint.title.trim())
        })
        .map_or(hint.offset, |l| l.next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_increasing_in_range_offsets() {
        let content = "Intro\nOne\nbody one\nTwo\nbody two";
        let hints = vec![
            StructureHint::new("One", 6),
            StructureHint::new("Two", 19).with_level(2),
        ];
        let b = from_hints(content, &hints).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].body_start, 10);
        assert_eq!(b[1].level, 2);
    }

    #[test]
    fn rejects_out_of_range_or_unordered() {
        let content = "short";
        assert!(from_hints(content, &[StructureHint::new("x", 5)]).is_none());
        assert!(from_hints(
            content,
            &[StructureHint::new("a", 3), StructureHint::new("b", 3)]
        )
        .is_none());
        assert!(from_hints(content, &[]).is_none());
    }

    #[test]
    fn zero_offset_allowed_for_empty_content() {
        let b = from_hints("", &[StructureHint::new("Only", 0)]).unwrap();
        assert_eq!(b[0].start, 0);
    }

    #[test]
    fn body_starts_at_offset_when_title_differs() {
        let content = "Some text here";
        let b = from_hints(content, &[StructureHint::new("Elsewhere", 5)]).unwrap();
        assert_eq!(b[0].body_start, 5);
    }
}
