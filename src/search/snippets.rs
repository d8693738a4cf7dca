//! Snippet extraction: short windows of stored content around match
//! positions, with the matched ranges marked for highlighting.

use regex::RegexBuilder;

/// Characters kept on each side of a match.
const WINDOW_RADIUS: usize = 60;

/// One extracted snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    /// Byte ranges *within `text`* that matched, ascending.
    pub ranges: Vec<(usize, usize)>,
    /// 1-based line the snippet starts on.
    pub start_line: u32,
}

/// Extracts up to `max_snippets` windows around occurrences of the literal
/// terms, case-insensitively. Overlapping windows are merged.
#[must_use]
pub fn extract(
    content: &str,
    line_starts: &[u32],
    terms: &[String],
    max_snippets: usize,
) -> Vec<Snippet> {
    if terms.is_empty() || max_snippets == 0 {
        return Vec::new();
    }

    let pattern = terms
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    if pattern.is_empty() {
        return Vec::new();
    }
    let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(e) => {
            tracing::debug!(error = %e, "snippet pattern rejected");
            return Vec::new();
        }
    };

    // Collect match ranges, then merge those whose windows overlap.
    let matches: Vec<(usize, usize)> = re
        .find_iter(content)
        .take(max_snippets * 4)
        .map(|m| (m.start(), m.end()))
        .collect();
    if matches.is_empty() {
        return Vec::new();
    }

    let mut windows: Vec<(usize, usize, Vec<(usize, usize)>)> = Vec::new();
    for (start, end) in matches {
        let w_start = floor_char_boundary(content, start.saturating_sub(WINDOW_RADIUS));
        let w_end = ceil_char_boundary(content, (end + WINDOW_RADIUS).min(content.len()));
        match windows.last_mut() {
            Some((_, last_end, ranges)) if w_start <= *last_end => {
                *last_end = w_end;
                ranges.push((start, end));
            }
            _ => windows.push((w_start, w_end, vec![(start, end)])),
        }
    }
    windows.truncate(max_snippets);

    windows
        .into_iter()
        .map(|(w_start, w_end, ranges)| Snippet {
            text: content[w_start..w_end].to_string(),
            ranges: ranges
                .into_iter()
                .map(|(s, e)| (s - w_start, e - w_start))
                .collect(),
            start_line: crate::schema::line_for_offset(line_starts, w_start as u32),
        })
        .collect()
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compute_line_starts;

    #[test]
    fn test_basic_extraction() {
        let content = "fn authenticate() {\n    login();\n}\n";
        let starts = compute_line_starts(content);
        let snippets = extract(content, &starts, &["login".to_string()], 3);

        assert_eq!(snippets.len(), 1);
        let s = &snippets[0];
        assert!(s.text.contains("login"));
        let (a, b) = s.ranges[0];
        assert_eq!(&s.text[a..b], "login");
    }

    #[test]
    fn test_case_insensitive() {
        let content = "CONFIG loading\n";
        let starts = compute_line_starts(content);
        let snippets = extract(content, &starts, &["config".to_string()], 1);
        assert_eq!(snippets.len(), 1);
        let (a, b) = snippets[0].ranges[0];
        assert_eq!(&snippets[0].text[a..b], "CONFIG");
    }

    #[test]
    fn test_nearby_matches_merge_into_one_window() {
        let content = "auth auth auth\n";
        let starts = compute_line_starts(content);
        let snippets = extract(content, &starts, &["auth".to_string()], 5);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].ranges.len(), 3);
    }

    #[test]
    fn test_snippet_count_bounded() {
        let line = "needle ".to_string() + &"x".repeat(300) + "\n";
        let content = line.repeat(6);
        let starts = compute_line_starts(&content);
        let snippets = extract(&content, &starts, &["needle".to_string()], 2);
        assert_eq!(snippets.len(), 2);
    }

    #[test]
    fn test_no_match_no_snippets() {
        let content = "nothing here\n";
        let starts = compute_line_starts(content);
        assert!(extract(content, &starts, &["absent".to_string()], 3).is_empty());
    }

    #[test]
    fn test_multibyte_windows_are_valid_utf8() {
        let content = "ééééééééééééééééééééééééééééééééééééééé needle ééééé\n";
        let starts = compute_line_starts(content);
        let snippets = extract(content, &starts, &["needle".to_string()], 1);
        assert_eq!(snippets.len(), 1);
        // Slicing would have panicked on a non-boundary; also verify the range
        let (a, b) = snippets[0].ranges[0];
        assert_eq!(&snippets[0].text[a..b], "needle");
    }
}
