//! Search ranker and highlighter (component G).
//!
//! Runs after the inverted index has narrowed a query down to a docId
//! list and the façade has fetched the corresponding rows: scores each
//! row by term coverage and produces highlighted fragments, without
//! mutating the row itself.

use serde_json::Value;

/// A highlighted fragment: the substring, and whether it should be
/// presented as a match (vs. surrounding context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// Field the fragment was extracted from.
    pub field: String,
    /// Fragment text, with matches wrapped in the configured tags.
    pub fragment: String,
}

/// A scored, optionally highlighted search result.
#[derive(Debug, Clone)]
pub struct RankedResult {
    /// The original row, untouched.
    pub row: Value,
    /// Coverage-metric relevance score (word-boundary bonuses can push it
    /// above 1.0; never negative).
    pub score: f64,
    /// Highlighted fragments, one set per requested field.
    pub highlights: Vec<Highlight>,
}

/// Ranking/highlighting options.
#[derive(Debug, Clone)]
pub struct RankOptions {
    /// Fields to compute highlight fragments for.
    pub highlight_fields: Vec<String>,
    /// Drop results scoring below this.
    pub min_score: f64,
    /// Text inserted before a matched term.
    pub pre_tag: String,
    /// Text inserted after a matched term.
    pub post_tag: String,
    /// Max fragments per field.
    pub fragment_count: usize,
    /// Max characters per fragment.
    pub fragment_size: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            highlight_fields: Vec::new(),
            min_score: 0.0,
            pre_tag: "<mark>".to_string(),
            post_tag: "</mark>".to_string(),
            fragment_count: 1,
            fragment_size: 150,
        }
    }
}

fn is_word_boundary_match(haystack: &str, byte_pos: usize, term_len: usize) -> bool {
    let before_ok = haystack[..byte_pos].chars().next_back().is_none_or(|c| !c.is_alphanumeric());
    let after_ok = haystack[byte_pos + term_len..].chars().next().is_none_or(|c| !c.is_alphanumeric());
    before_ok && after_ok
}

/// Score `row` against `terms` across `fields`: +1 per matched field
/// substring, +0.5 bonus for a word-boundary match, normalized by
/// `terms.len() * fields.len()`.
#[must_use]
pub fn score_row(row: &Value, terms: &[String], fields: &[String]) -> f64 {
    if terms.is_empty() || fields.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for term in terms {
        let term_lower = term.to_lowercase();
        for field in fields {
            let Some(text) = row.get(field).and_then(Value::as_str) else { continue };
            let text_lower = text.to_lowercase();

            if let Some(byte_pos) = text_lower.find(&term_lower) {
                total += 1.0;
                if is_word_boundary_match(&text_lower, byte_pos, term_lower.len()) {
                    total += 0.5;
                }
            }
        }
    }

    total / (terms.len() as f64 * fields.len() as f64)
}

/// Score and highlight `rows`, dropping results below `options.min_score`.
#[must_use]
pub fn rank_and_highlight(rows: Vec<Value>, terms: &[String], fields: &[String], options: &RankOptions) -> Vec<RankedResult> {
    rows.into_iter()
        .filter_map(|row| {
            let score = score_row(&row, terms, fields);
            if score < options.min_score {
                return None;
            }
            let highlights = highlight_row(&row, terms, options);
            Some(RankedResult { row, score, highlights })
        })
        .collect()
}

fn highlight_row(row: &Value, terms: &[String], options: &RankOptions) -> Vec<Highlight> {
    options
        .highlight_fields
        .iter()
        .filter_map(|field| {
            let text = row.get(field).and_then(Value::as_str)?;
            let fragments = highlight_field(text, terms, options);
            if fragments.is_empty() {
                None
            } else {
                Some(Highlight { field: field.clone(), fragment: fragments.join(" … ") })
            }
        })
        .collect()
}

fn highlight_field(text: &str, terms: &[String], options: &RankOptions) -> Vec<String> {
    let text_lower = text.to_lowercase();
    let mut match_positions: Vec<(usize, usize)> = Vec::new();

    for term in terms {
        let term_lower = term.to_lowercase();
        if term_lower.is_empty() {
            continue;
        }
        let mut start = 0;
        while let Some(rel) = text_lower[start..].find(&term_lower) {
            let pos = start + rel;
            if is_word_boundary_match(&text_lower, pos, term_lower.len()) {
                match_positions.push((pos, pos + term_lower.len()));
            }
            start = pos + term_lower.len();
        }
    }

    match_positions.sort_by_key(|(start, _)| *start);
    match_positions.dedup();

    match_positions
        .into_iter()
        .take(options.fragment_count)
        .map(|(start, end)| build_fragment(text, start, end, options))
        .collect()
}

fn build_fragment(text: &str, match_start: usize, match_end: usize, options: &RankOptions) -> String {
    let half_window = options.fragment_size / 2;
    let window_start = match_start.saturating_sub(half_window);
    let window_end = (match_end + half_window).min(text.len());

    let window_start = floor_char_boundary(text, window_start);
    let window_end = ceil_char_boundary(text, window_end);

    let mut fragment = String::new();
    fragment.push_str(&text[window_start..match_start]);
    fragment.push_str(&options.pre_tag);
    fragment.push_str(&text[match_start..match_end]);
    fragment.push_str(&options.post_tag);
    fragment.push_str(&text[match_end..window_end]);
    fragment
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_score_row_full_coverage_word_boundary() {
        let row = json!({"title": "emergency repair"});
        let score = score_row(&row, &["emergency".to_string()], &["title".to_string()]);
        assert_eq!(score, 1.5);
    }

    #[test]
    fn test_score_row_substring_without_word_boundary() {
        let row = json!({"title": "xemergencyx"});
        let score = score_row(&row, &["emergency".to_string()], &["title".to_string()]);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_score_row_normalizes_by_terms_times_fields() {
        let row = json!({"title": "emergency", "description": "unrelated"});
        let score =
            score_row(&row, &["emergency".to_string(), "plumbing".to_string()], &["title".to_string(), "description".to_string()]);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_rank_and_highlight_drops_below_min_score() {
        let rows = vec![json!({"title": "no match here"})];
        let options = RankOptions { min_score: 0.5, ..RankOptions::default() };
        let results = rank_and_highlight(rows, &["emergency".to_string()], &["title".to_string()], &options);
        assert!(results.is_empty());
    }

    #[test]
    fn test_highlight_wraps_matched_term() {
        let row = json!({"title": "an emergency repair today"});
        let options =
            RankOptions { highlight_fields: vec!["title".to_string()], fragment_size: 150, ..RankOptions::default() };
        let results = rank_and_highlight(vec![row], &["emergency".to_string()], &["title".to_string()], &options);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].highlights[0].fragment, "an <mark>emergency</mark> repair today");
    }

    #[test]
    fn test_highlight_does_not_mutate_source_row() {
        let row = json!({"title": "an emergency repair"});
        let original = row.clone();
        let options = RankOptions { highlight_fields: vec!["title".to_string()], ..RankOptions::default() };
        rank_and_highlight(vec![row.clone()], &["emergency".to_string()], &["title".to_string()], &options);
        assert_eq!(row, original);
    }

    #[test]
    fn test_highlight_respects_fragment_count() {
        let row = json!({"title": "emergency here, emergency there, emergency everywhere"});
        let options =
            RankOptions { highlight_fields: vec!["title".to_string()], fragment_count: 1, ..RankOptions::default() };
        let results = rank_and_highlight(vec![row], &["emergency".to_string()], &["title".to_string()], &options);
        assert_eq!(results[0].highlights.len(), 1);
    }
}
