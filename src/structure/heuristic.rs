use super::{lines, Boundary, Line};

const MAX_TITLE_CHARS: usize = 60;
const MAX_TITLE_WORDS: usize = 8;
const BASE_SCORE: f64 = 0.4;
const BONUS: f64 = 0.2;
const ACCEPT_SCORE: f64 = 0.6;
/// Words the following section needs for the body bonus.
const MIN_SECTION_WORDS: usize = 20;
/// Fewer accepted candidates than this means no structure.
const MIN_CANDIDATES: usize = 2;

/// Short uppercase-led lines standing alone between blank lines, scored on
/// spacing, capitalisation and the size of the section they introduce.
pub(super) fn detect(content: &str) -> Option<Vec<Boundary>> {
    let all = lines(content);
    let candidates: Vec<usize> = (0..all.len())
        .filter(|&i| is_candidate(&all, i))
        .collect();

    let mut kept = Vec::new();
    for (n, &i) in candidates.iter().enumerate() {
        let section_end = candidates.get(n + 1).copied().unwrap_or(all.len());
        let section_words: usize = all[i + 1..section_end]
            .iter()
            .map(|l| l.text.split_whitespace().count())
            .sum();
        let score = score(&all, i, section_words);
        tracing::trace!(line = all[i].text, score, "heading candidate");
        if score >= ACCEPT_SCORE - f64::EPSILON {
            kept.push(Boundary {
                title: all[i].text.trim().to_string(),
                start: all[i].start,
                body_start: all[i].next,
                level: 1,
            });
        }
    }

    (kept.len() >= MIN_CANDIDATES).then_some(kept)
}

fn is_candidate(all: &[Line<'_>], i: usize) -> bool {
    let text = all[i].text.trim();
    if text.is_empty()
        || text.chars().count() > MAX_TITLE_CHARS
        || text.split_whitespace().count() > MAX_TITLE_WORDS
    {
        return false;
    }
    if !text.chars().next().is_some_and(char::is_uppercase) {
        return false;
    }
    if text.ends_with(['.', ',', ';', '!', '?']) {
        return false;
    }
    let blank_before = i == 0 || all[i - 1].is_blank();
    let blank_after = all.get(i + 1).is_some_and(Line::is_blank);
    blank_before && blank_after
}

fn score(all: &[Line<'_>], i: usize, section_words: usize) -> f64 {
    let mut score = BASE_SCORE;
    let blanks_before = all[..i].iter().rev().take_while(|l| l.is_blank()).count();
    if blanks_before >= 2 {
        score += BONUS;
    }
    let text = all[i].text.trim();
    if is_title_case(text) || is_all_caps(text) {
        score += BONUS;
    }
    if section_words >= MIN_SECTION_WORDS {
        score += BONUS;
    }
    score
}

const MINOR_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

fn is_title_case(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.len() > 1
        && words.iter().enumerate().all(|(n, w)| {
            let first = w.chars().find(|c| c.is_alphanumeric());
            match first {
                Some(c) if c.is_alphabetic() => {
                    c.is_uppercase() || (n > 0 && MINOR_WORDS.contains(&w.to_lowercase().as_str()))
                }
                _ => true,
            }
        })
}

fn is_all_caps(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    #[test]
    fn title_case_and_caps() {
        assert!(is_title_case("The Road to Nowhere"));
        assert!(!is_title_case("The road goes on"));
        assert!(!is_title_case("Single"));
        assert!(is_all_caps("THE END"));
        assert!(!is_all_caps("The END"));
    }

    #[test]
    fn finds_spaced_title_case_sections() {
        let content = format!(
            "The First Part\n\n{}\n\n\nThe Second Part\n\n{}\n",
            body(25),
            body(30)
        );
        let b = detect(&content).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].title, "The First Part");
        assert_eq!(b[0].start, 0);
        assert_eq!(b[1].title, "The Second Part");
    }

    #[test]
    fn a_single_candidate_is_not_structure() {
        let content = format!("Only Heading Here\n\n{}\n", body(40));
        assert!(detect(&content).is_none());
    }

    #[test]
    fn sentences_are_not_candidates() {
        let content = format!(
            "It was late.\n\n{}\n\nShe left early!\n\n{}\n",
            body(30),
            body(30)
        );
        assert!(detect(&content).is_none());
    }

    #[test]
    fn weak_candidates_are_dropped() {
        // lowercase-heavy, single blank line, tiny sections: score 0.4
        let content = "Alpha beta\n\nshort\n\nGamma delta\n\ntiny\n";
        assert!(detect(content).is_none());
    }
}
