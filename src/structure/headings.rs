use super::{lines, Boundary};

/// Parse an ATX heading line: up to three leading spaces, one to six `#`,
/// then whitespace or end of line. Closing `#`s are stripped.
pub(crate) fn atx_heading(line: &str) -> Option<(u8, String)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let depth = rest.bytes().take_while(|b| *b == b'#').count();
    if depth == 0 || depth > 6 {
        return None;
    }
    let after = &rest[depth..];
    if !(after.is_empty() || after.starts_with([' ', '\t'])) {
        return None;
    }
    let mut title = after.trim();
    let stripped = title.trim_end_matches('#');
    if stripped.is_empty() || stripped.ends_with([' ', '\t']) {
        title = stripped.trim_end();
    }
    // depth is at most 6
    Some((depth as u8, title.to_string()))
}

/// Opening or closing code fence marker, if the line is one.
fn fence(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let marker = trimmed.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    (run >= 3).then_some((marker, run))
}

/// Single scan over the lines; headings inside fenced code are ignored.
pub(super) fn detect(content: &str) -> Option<Vec<Boundary>> {
    let mut boundaries = Vec::new();
    let mut open_fence: Option<(char, usize)> = None;

    for line in lines(content) {
        if let Some((marker, run)) = fence(line.text) {
            match open_fence {
                None => open_fence = Some((marker, run)),
                Some((open_marker, open_run)) if marker == open_marker && run >= open_run => {
                    open_fence = None;
                }
                Some(_) => {}
            }
            continue;
        }
        if open_fence.is_some() {
            continue;
        }
        if let Some((level, title)) = atx_heading(line.text) {
            boundaries.push(Boundary {
                title,
                start: line.start,
                body_start: line.next,
                level,
            });
        }
    }

    (!boundaries.is_empty()).then_some(boundaries)
}
