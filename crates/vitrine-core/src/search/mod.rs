//! Full-text search: tokenizer (E), inverted index (F), ranker/highlighter (G).

pub mod inverted_index;
pub mod ranker;
pub mod tokenizer;

pub use inverted_index::{BuildStats, FieldBoosts, IndexMetadata, InvertedIndexEngine};
pub use ranker::{rank_and_highlight, score_row, Highlight, RankOptions, RankedResult};
pub use tokenizer::{tokenize, tokenize_record, Token, TokenizerConfig, TokenizerVariant};
