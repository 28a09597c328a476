//! Tokenizer (component E): text to indexable terms.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Tokenizer behavior selector. Configured per table in [`crate::config::TableSearchConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenizerVariant {
    /// Lowercase word splitting, stop-word/short-word filtering.
    Simple,
    /// [`Simple`](Self::Simple) plus Porter stemming.
    Stemming,
    /// Overlapping fixed-size substrings; min-word-length and stop-words
    /// don't apply.
    NGram,
}

/// Per-field tokenizer configuration.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    /// Which algorithm produces terms.
    pub variant: TokenizerVariant,
    /// Tokens shorter than this (after case folding) are dropped. Ignored
    /// for [`TokenizerVariant::NGram`].
    pub min_word_length: usize,
    /// Terms to drop after case folding. Ignored for
    /// [`TokenizerVariant::NGram`].
    pub stop_words: HashSet<String>,
    /// Preserve term case instead of folding to lowercase.
    pub case_sensitive: bool,
    /// Substring size for [`TokenizerVariant::NGram`].
    pub ngram_size: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            variant: TokenizerVariant::Simple,
            min_word_length: 2,
            stop_words: HashSet::new(),
            case_sensitive: false,
            ngram_size: 3,
        }
    }
}

/// A single produced term: the term text, its token-index position within
/// the source field text, and the field it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Term text, already case-folded/stemmed per the tokenizer variant.
    pub term: String,
    /// Zero-based token index (not byte offset) within the field's text.
    pub position: usize,
    /// Name of the field the token was extracted from.
    pub field: String,
}

/// Split `text` on non-alphanumeric delimiters, collapsing consecutive
/// delimiters, and yield position-indexed raw words.
fn split_words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect()
}

fn fold_case(word: &str, case_sensitive: bool) -> String {
    if case_sensitive { word.to_string() } else { word.to_lowercase() }
}

/// Tokenize `text` from `field` according to `config`.
#[must_use]
pub fn tokenize(field: &str, text: &str, config: &TokenizerConfig) -> Vec<Token> {
    match config.variant {
        TokenizerVariant::Simple => tokenize_simple(field, text, config, false),
        TokenizerVariant::Stemming => tokenize_simple(field, text, config, true),
        TokenizerVariant::NGram => tokenize_ngram(field, text, config),
    }
}

fn tokenize_simple(field: &str, text: &str, config: &TokenizerConfig, stem: bool) -> Vec<Token> {
    split_words(text)
        .into_iter()
        .enumerate()
        .filter_map(|(position, word)| {
            let folded = fold_case(word, config.case_sensitive);
            if folded.chars().count() < config.min_word_length {
                return None;
            }
            if config.stop_words.contains(&folded) {
                return None;
            }
            let term = if stem { porter_stem(&folded) } else { folded };
            Some(Token { term, position, field: field.to_string() })
        })
        .collect()
}

fn tokenize_ngram(field: &str, text: &str, config: &TokenizerConfig) -> Vec<Token> {
    let folded = fold_case(text, config.case_sensitive);
    let chars: Vec<char> = folded.chars().filter(|c| c.is_alphanumeric() || *c == ' ').collect();
    let n = config.ngram_size.max(1);
    if chars.len() < n {
        return Vec::new();
    }

    (0..=chars.len() - n)
        .map(|position| {
            let term: String = chars[position..position + n].iter().collect();
            Token { term, position, field: field.to_string() }
        })
        .collect()
}

/// Tokenize every configured field of a record, preserving which field
/// each token came from. `fields` gives (name, text) pairs in the order
/// they should be tokenized.
#[must_use]
pub fn tokenize_record(fields: &[(&str, &str)], config: &TokenizerConfig) -> Vec<Token> {
    fields.iter().flat_map(|(field, text)| tokenize(field, text, config)).collect()
}

/// A small, dependency-free implementation of Porter's stemming algorithm
/// for English, covering the common suffix-stripping steps (plurals,
/// `-ed`/`-ing`, `-ational`/`-ization`-style derivational suffixes, and
/// terminal `-e`/double-consonant cleanup). Not a byte-for-byte port of
/// the reference implementation, but converges to the same stem for the
/// common cases a search tokenizer sees.
#[must_use]
pub fn porter_stem(word: &str) -> String {
    if word.len() <= 2 {
        return word.to_string();
    }

    let mut s = word.to_string();

    // Step 1a: plurals.
    if s.ends_with("sses") {
        s.truncate(s.len() - 2);
    } else if s.ends_with("ies") {
        s.truncate(s.len() - 3);
        s.push('i');
    } else if s.ends_with('s') && !s.ends_with("ss") && s.len() > 3 {
        s.truncate(s.len() - 1);
    }

    // Step 1b: -eed/-ed/-ing, only when the stem contains a vowel.
    if s.ends_with("eed") {
        if has_vowel(&s[..s.len() - 3]) {
            s.truncate(s.len() - 1);
        }
    } else if s.ends_with("ed") && has_vowel(&s[..s.len() - 2]) {
        s.truncate(s.len() - 2);
        restore_after_ed_ing(&mut s);
    } else if s.ends_with("ing") && has_vowel(&s[..s.len() - 3]) {
        s.truncate(s.len() - 3);
        restore_after_ed_ing(&mut s);
    }

    // Step 2-ish: common derivational suffixes.
    for (suffix, replacement) in [
        ("ational", "ate"),
        ("tional", "tion"),
        ("ization", "ize"),
        ("ousness", "ous"),
        ("iveness", "ive"),
        ("fulness", "ful"),
        ("biliti", "ble"),
        ("ality", "al"),
    ] {
        if s.ends_with(suffix) && s.len() > suffix.len() {
            s.truncate(s.len() - suffix.len());
            s.push_str(replacement);
            break;
        }
    }

    // Step 5a: terminal -e cleanup on longer stems.
    if s.ends_with('e') && s.len() > 4 {
        s.truncate(s.len() - 1);
    }

    s
}

fn has_vowel(s: &str) -> bool {
    s.chars().any(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
}

fn restore_after_ed_ing(s: &mut String) {
    if s.ends_with("at") || s.ends_with("bl") || s.ends_with("iz") {
        s.push('e');
    } else if ends_with_double_consonant(s) && !s.ends_with('l') && !s.ends_with('s') && !s.ends_with('z') {
        s.pop();
    }
}

fn ends_with_double_consonant(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    len >= 2 && chars[len - 1] == chars[len - 2] && !matches!(chars[len - 1], 'a' | 'e' | 'i' | 'o' | 'u')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_config() -> TokenizerConfig {
        TokenizerConfig::default()
    }

    #[test]
    fn test_simple_tokenize_splits_on_delimiters() {
        let tokens = tokenize("title", "Hello, World!", &simple_config());
        let terms: Vec<&str> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["hello", "world"]);
    }

    #[test]
    fn test_consecutive_delimiters_collapse() {
        let tokens = tokenize("title", "foo---bar   baz", &simple_config());
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_short_tokens_dropped() {
        let config = TokenizerConfig { min_word_length: 3, ..simple_config() };
        let tokens = tokenize("title", "a an cat", &config);
        let terms: Vec<&str> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["cat"]);
    }

    #[test]
    fn test_stop_words_dropped_after_case_folding() {
        let mut stop_words = HashSet::new();
        stop_words.insert("the".to_string());
        let config = TokenizerConfig { stop_words, ..simple_config() };
        let tokens = tokenize("title", "THE cat sat", &config);
        let terms: Vec<&str> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["cat", "sat"]);
    }

    #[test]
    fn test_case_sensitive_preserves_case() {
        let config = TokenizerConfig { case_sensitive: true, ..simple_config() };
        let tokens = tokenize("title", "Hello", &config);
        assert_eq!(tokens[0].term, "Hello");
    }

    #[test]
    fn test_positions_are_token_index_not_byte_offset() {
        let tokens = tokenize("title", "wide  gap here", &simple_config());
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn test_ngram_emits_overlapping_substrings() {
        let config = TokenizerConfig { variant: TokenizerVariant::NGram, ngram_size: 3, ..simple_config() };
        let tokens = tokenize("title", "abcd", &config);
        let terms: Vec<&str> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["abc", "bcd"]);
    }

    #[test]
    fn test_ngram_shorter_than_size_yields_nothing() {
        let config = TokenizerConfig { variant: TokenizerVariant::NGram, ngram_size: 5, ..simple_config() };
        let tokens = tokenize("title", "ab", &config);
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_stemming_strips_plurals_and_ing() {
        let config = TokenizerConfig { variant: TokenizerVariant::Stemming, ..simple_config() };
        let tokens = tokenize("title", "running cats", &config);
        let terms: Vec<&str> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["run", "cat"]);
    }

    #[test]
    fn test_tokenize_record_preserves_source_field() {
        let tokens = tokenize_record(&[("title", "hello"), ("body", "world")], &simple_config());
        assert_eq!(tokens[0].field, "title");
        assert_eq!(tokens[1].field, "body");
    }

    #[test]
    fn test_porter_stem_short_word_unchanged() {
        assert_eq!(porter_stem("is"), "is");
    }
}
