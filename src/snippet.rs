use crate::model::Snippet;

/// Extracts the bare terms a user typed, stripping quotes and boolean
/// keywords, for use as the match targets when building snippets. This is
/// deliberately cruder than the query parser: snippets highlight whatever a
/// human would recognize as "their words", not the parsed query tree.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || matches!(c, '"' | '*' | '?' | ':' | '+' | '-'))
        .filter(|w| !w.is_empty())
        .filter(|w| !matches!(w.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT"))
        .map(|w| w.to_lowercase())
        .collect()
}

/// Derives up to `max_count` snippets for `content` given the query's terms:
/// a window of `radius` characters on each side of each match, the matched
/// term left unaltered. At most `per_term_cap` matches are considered per
/// term, to bound work on pathological documents. Ordering: exact-term
/// equality first, then ascending position.
pub fn make_snippets(
    content: &str,
    terms: &[String],
    radius: usize,
    max_count: usize,
    per_term_cap: usize,
) -> Vec<Snippet> {
    if terms.is_empty() || content.is_empty() {
        return Vec::new();
    }

    let lower = content.to_lowercase();
    let mut candidates: Vec<(bool, usize, String)> = Vec::new();

    for term in terms {
        if term.is_empty() {
            continue;
        }
        let mut start = 0;
        let mut found = 0;
        while found < per_term_cap {
            let Some(rel) = lower[start..].find(term.as_str()) else { break };
            let pos = start + rel;
            let exact = is_exact_word_match(&lower, pos, term.len());
            candidates.push((exact, pos, term.clone()));
            start = pos + term.len();
            found += 1;
        }
    }

    // Exact-term equality first, then ascending position.
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    candidates.dedup_by_key(|c| c.1);

    candidates
        .into_iter()
        .take(max_count)
        .map(|(_, pos, term)| {
            let window_start = pos.saturating_sub(radius);
            let window_end = (pos + term.len() + radius).min(content.len());
            let window_start = floor_char_boundary(content, window_start);
            let window_end = ceil_char_boundary(content, window_end);

            let mut text = content[window_start..window_end].replace(['\n', '\r'], " ");
            if window_start > 0 {
                text = format!("...{text}");
            }
            if window_end < content.len() {
                text.push_str("...");
            }

            Snippet { text, term, position: pos }
        })
        .collect()
}

fn is_exact_word_match(lower: &str, pos: usize, len: usize) -> bool {
    let before_ok = pos == 0 || !lower.as_bytes()[pos - 1].is_ascii_alphanumeric();
    let end = pos + len;
    let after_ok = end >= lower.len() || !lower.as_bytes()[end].is_ascii_alphanumeric();
    before_ok && after_ok
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_window_around_match() {
        let content = "the quick brown fox jumps over the lazy dog";
        let snippets = make_snippets(content, &["fox".to_string()], 5, 5, 5);
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].text.contains("fox"));
    }

    #[test]
    fn exact_matches_sort_before_substring_matches() {
        let content = "catalog cat category";
        let snippets = make_snippets(content, &["cat".to_string()], 3, 5, 5);
        // "cat" at position 8 is an exact word match; "catalog"/"category"
        // contain "cat" only as a substring.
        assert_eq!(snippets[0].position, 8);
    }

    #[test]
    fn per_term_cap_bounds_match_count() {
        let content = "a ".repeat(200);
        let snippets = make_snippets(&content, &["a".to_string()], 2, 100, 3);
        assert!(snippets.len() <= 3);
    }
}
