//! Inverted index engine (component F).
//!
//! Each (table, term) is a Redis sorted set mapping docId -> score; each
//! (table, docId) is a set of the terms indexed for it, so deletion never
//! has to scan every term; build statistics live in a hash. All three live
//! in the cache store under the keys documented in [`crate::cache`]'s
//! key-space layout, built on [`StructuredStore`]'s native ZADD/SADD/HSET
//! commands rather than JSON blobs under plain string keys.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::StructuredStore;
use crate::error::{FacadeError, Result};
use crate::search::tokenizer::{tokenize_record, TokenizerConfig};

/// Per-field score multiplier, applied to term frequency when indexing.
pub type FieldBoosts = HashMap<String, f64>;

/// Per-table inverted-index build/update statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Documents successfully indexed.
    pub total_documents: usize,
    /// Distinct terms in the index.
    pub total_terms: usize,
    /// Total tokens processed (across all documents/fields).
    pub total_tokens: usize,
    /// Unix-epoch milliseconds of the last successful build, if any.
    pub last_build_time: Option<u64>,
    /// Duration of the last build, in milliseconds.
    pub build_duration_ms: u64,
    /// Fields that were indexed.
    pub fields: Vec<String>,
}

impl IndexMetadata {
    fn to_hash_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_documents", self.total_documents.to_string()),
            ("total_terms", self.total_terms.to_string()),
            ("total_tokens", self.total_tokens.to_string()),
            ("last_build_time", self.last_build_time.map(|t| t.to_string()).unwrap_or_default()),
            ("build_duration_ms", self.build_duration_ms.to_string()),
            ("fields", serde_json::to_string(&self.fields).unwrap_or_default()),
        ]
    }

    fn from_hash(map: &HashMap<String, String>) -> Self {
        let parse = |field: &str| map.get(field).and_then(|v| v.parse().ok());
        Self {
            total_documents: parse("total_documents").unwrap_or(0),
            total_terms: parse("total_terms").unwrap_or(0),
            total_tokens: parse("total_tokens").unwrap_or(0),
            last_build_time: parse("last_build_time"),
            build_duration_ms: parse("build_duration_ms").unwrap_or(0),
            fields: map.get("fields").and_then(|v| serde_json::from_str(v).ok()).unwrap_or_default(),
        }
    }
}

/// Result of a [`InvertedIndexEngine::build_index`] call.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Documents successfully indexed.
    pub indexed: usize,
    /// Documents skipped for lacking a resolvable docId.
    pub skipped: usize,
    /// Distinct terms written.
    pub total_terms: usize,
}

/// Binds a [`StructuredStore`] to one table's inverted index.
pub struct InvertedIndexEngine {
    store: Arc<dyn StructuredStore>,
    key_prefix: String,
    table: String,
}

impl InvertedIndexEngine {
    /// Build an engine for `table`, keying everything under `key_prefix`.
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>, key_prefix: impl Into<String>, table: impl Into<String>) -> Self {
        Self { store, key_prefix: key_prefix.into(), table: table.into() }
    }

    fn word_key(&self, term: &str) -> String {
        format!("{}:index:{}:word:{}", self.key_prefix, self.table, term)
    }

    fn doc_key(&self, doc_id: &str) -> String {
        format!("{}:index:{}:doc:{}", self.key_prefix, self.table, doc_id)
    }

    fn meta_key(&self) -> String {
        format!("{}:index:{}:meta", self.key_prefix, self.table)
    }

    /// Uniquely-named scratch key for one multi-term search's
    /// `ZINTERSTORE` destination, deleted unconditionally once the search
    /// returns (success or failure).
    fn temp_intersection_key(&self, terms: &[String]) -> String {
        format!("{}:index:{}:tmp:{}", self.key_prefix, self.table, terms.join("+"))
    }

    /// Detect a document's id: the first key present among `id`,
    /// `<singular table>_id`, `<table>_id`, else the first key ending in
    /// `_id`. Returns `None` if no such key resolves.
    #[must_use]
    pub fn extract_doc_id(&self, doc: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
        let singular = singularize(&self.table);
        for candidate in ["id".to_string(), format!("{singular}_id"), format!("{}_id", self.table)] {
            if let Some(value) = doc.get(&candidate) {
                return Some(scalar_to_string(value));
            }
        }
        doc.iter().find(|(k, _)| k.ends_with("_id")).map(|(_, v)| scalar_to_string(v))
    }

    /// Current build statistics, if the index has ever been built.
    pub async fn metadata(&self) -> Result<Option<IndexMetadata>> {
        let map = self.store.hgetall(&self.meta_key()).await?;
        Ok(if map.is_empty() { None } else { Some(IndexMetadata::from_hash(&map)) })
    }

    /// Clear the prior index and rebuild it from `documents`.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::Build`] if the store is unreachable for the
    /// global clear/metadata write (per-document docId failures are
    /// skipped with a warning, not surfaced).
    pub async fn build_index(
        &self,
        documents: &[serde_json::Value],
        fields: &[&str],
        boosts: &FieldBoosts,
        tokenizer: &TokenizerConfig,
    ) -> Result<BuildStats> {
        self.clear_index().await?;

        let mut terms_seen: HashSet<String> = HashSet::new();
        let mut stats = BuildStats::default();
        let mut total_tokens = 0usize;

        for doc in documents {
            let Some(obj) = doc.as_object() else {
                stats.skipped += 1;
                continue;
            };
            let Some(doc_id) = self.extract_doc_id(obj) else {
                tracing::warn!(table = %self.table, "skipping document with no resolvable docId");
                stats.skipped += 1;
                continue;
            };

            let field_texts: Vec<(&str, &str)> = fields
                .iter()
                .filter_map(|f| obj.get(*f).and_then(|v| v.as_str()).map(|text| (*f, text)))
                .collect();

            let tokens = tokenize_record(&field_texts, tokenizer);
            total_tokens += tokens.len();

            let mut term_scores: HashMap<String, f64> = HashMap::new();
            for token in &tokens {
                let boost = boosts.get(&token.field).copied().unwrap_or(1.0);
                *term_scores.entry(token.term.clone()).or_insert(0.0) += boost;
            }

            for (term, score) in &term_scores {
                if let Err(e) = self.store.zadd(&self.word_key(term), &doc_id, *score).await {
                    tracing::warn!(table = %self.table, term, error = %e, "failed writing posting");
                    continue;
                }
                if let Err(e) = self.store.sadd(&self.doc_key(&doc_id), term).await {
                    tracing::warn!(table = %self.table, doc_id, term, error = %e, "failed writing doc term membership");
                }
                terms_seen.insert(term.clone());
            }
            stats.indexed += 1;
        }

        stats.total_terms = terms_seen.len();

        let metadata = IndexMetadata {
            total_documents: stats.indexed,
            total_terms: terms_seen.len(),
            total_tokens,
            last_build_time: None,
            build_duration_ms: 0,
            fields: fields.iter().map(|s| (*s).to_string()).collect(),
        };
        for (field, value) in metadata.to_hash_fields() {
            self.store
                .hset(&self.meta_key(), field, &value)
                .await
                .map_err(|e| FacadeError::build(format!("failed persisting index metadata: {e}")))?;
        }

        Ok(stats)
    }

    /// Delete every key this index owns for `self.table`.
    async fn clear_index(&self) -> Result<()> {
        for pattern in
            [format!("{}:index:{}:word:*", self.key_prefix, self.table), format!("{}:index:{}:doc:*", self.key_prefix, self.table)]
        {
            loop {
                let keys = self.store.scan(&pattern).await?;
                if keys.is_empty() {
                    break;
                }
                let exhausted = keys.len() < crate::cache::MAX_SCAN_BATCH;
                self.store.multi_del(&keys).await?;
                if exhausted {
                    break;
                }
            }
        }
        self.store.del(&self.meta_key()).await
    }

    /// Delete-then-insert a single document.
    pub async fn update_document(
        &self,
        doc: &serde_json::Value,
        fields: &[&str],
        boosts: &FieldBoosts,
        tokenizer: &TokenizerConfig,
    ) -> Result<()> {
        let Some(obj) = doc.as_object() else {
            return Err(FacadeError::build("document is not an object"));
        };
        let Some(doc_id) = self.extract_doc_id(obj) else {
            return Err(FacadeError::build("document has no resolvable docId"));
        };

        self.delete_document(&doc_id).await?;

        let field_texts: Vec<(&str, &str)> =
            fields.iter().filter_map(|f| obj.get(*f).and_then(|v| v.as_str()).map(|text| (*f, text))).collect();
        let tokens = tokenize_record(&field_texts, tokenizer);

        let mut term_scores: HashMap<String, f64> = HashMap::new();
        for token in &tokens {
            let boost = boosts.get(&token.field).copied().unwrap_or(1.0);
            *term_scores.entry(token.term.clone()).or_insert(0.0) += boost;
        }

        for (term, score) in &term_scores {
            self.store.zadd(&self.word_key(term), &doc_id, *score).await?;
            self.store.sadd(&self.doc_key(&doc_id), term).await?;
        }

        Ok(())
    }

    /// Remove `doc_id` from every term it appears under, then drop its
    /// reverse-mapping entry.
    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        let terms = self.store.smembers(&self.doc_key(doc_id)).await?;
        if terms.is_empty() {
            return Ok(());
        }

        for term in &terms {
            let key = self.word_key(term);
            self.store.zrem(&key, doc_id).await?;
            if self.store.zcard(&key).await? == 0 {
                self.store.del(&key).await?;
            }
        }

        self.store.del(&self.doc_key(doc_id)).await
    }

    /// Tokenize `query`, collect unique terms, and return up to `limit`
    /// docIds: the top scorers for a single term, or the score-summed
    /// intersection across all terms (via `ZINTERSTORE ... AGGREGATE
    /// SUM` into a uniquely-named scratch key, always cleaned up) for
    /// multiple terms. Ties break by docId ascending.
    pub async fn search(&self, query: &str, limit: usize, tokenizer: &TokenizerConfig) -> Result<Vec<String>> {
        let tokens = tokenize_record(&[("query", query)], tokenizer);
        let mut terms: Vec<String> = tokens.into_iter().map(|t| t.term).collect();
        terms.sort();
        terms.dedup();

        if terms.is_empty() {
            return Ok(Vec::new());
        }

        if terms.len() == 1 {
            let ranked = self.store.zrevrange_withscores(&self.word_key(&terms[0]), 0, -1).await?;
            return Ok(break_score_ties(ranked).into_iter().take(limit).collect());
        }

        let word_keys: Vec<String> = terms.iter().map(|t| self.word_key(t)).collect();
        let temp_key = self.temp_intersection_key(&terms);

        let result = self.store.zinterstore_sum(&temp_key, &word_keys).await;
        let ranked = match result {
            Ok(()) => self.store.zrevrange_withscores(&temp_key, 0, -1).await,
            Err(e) => Err(e),
        };
        // Guaranteed cleanup of the scratch key regardless of outcome.
        self.store.del(&temp_key).await.ok();

        Ok(break_score_ties(ranked?).into_iter().take(limit).collect())
    }
}

/// `ZREVRANGE ... WITHSCORES` already sorts by score descending; re-sort
/// ties by docId ascending, matching the documented tie-break rule.
fn break_score_ties(mut ranked: Vec<(String, f64)>) -> Vec<String> {
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().map(|(id, _)| id).collect()
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Naive English singularization: strip a trailing `s` (but not `ss`).
/// Good enough for the docId-detection heuristic, not a linguistic
/// singularizer.
fn singularize(word: &str) -> String {
    if word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::InMemoryCacheStore;

    fn engine(table: &str) -> InvertedIndexEngine {
        InvertedIndexEngine::new(Arc::new(InMemoryCacheStore::new()), "vitrine", table)
    }

    fn boosts(pairs: &[(&str, f64)]) -> FieldBoosts {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_extract_doc_id_prefers_plain_id() {
        let engine = engine("orders");
        let doc = json!({"id": 7, "user_id": 3});
        assert_eq!(engine.extract_doc_id(doc.as_object().unwrap()), Some("7".to_string()));
    }

    #[test]
    fn test_extract_doc_id_falls_back_to_table_singular() {
        let engine = engine("orders");
        let doc = json!({"order_id": "abc-123"});
        assert_eq!(engine.extract_doc_id(doc.as_object().unwrap()), Some("abc-123".to_string()));
    }

    #[test]
    fn test_extract_doc_id_falls_back_to_any_id_suffix() {
        let engine = engine("orders");
        let doc = json!({"external_id": "xyz"});
        assert_eq!(engine.extract_doc_id(doc.as_object().unwrap()), Some("xyz".to_string()));
    }

    #[test]
    fn test_extract_doc_id_none_when_unresolvable() {
        let engine = engine("orders");
        let doc = json!({"name": "no id here"});
        assert_eq!(engine.extract_doc_id(doc.as_object().unwrap()), None);
    }

    #[tokio::test]
    async fn test_build_index_then_single_term_search() {
        let engine = engine("articles");
        let docs = vec![
            json!({"id": "d1", "title": "Emergency Plumbing Repair", "description": "fix leaks"}),
            json!({"id": "d2", "title": "Electrical Wiring", "description": "emergency repairs"}),
        ];
        let tokenizer = TokenizerConfig { variant: crate::search::tokenizer::TokenizerVariant::Stemming, ..Default::default() };
        let boosts = boosts(&[("title", 3.0), ("description", 1.0)]);

        let stats = engine.build_index(&docs, &["title", "description"], &boosts, &tokenizer).await.unwrap();
        assert_eq!(stats.indexed, 2);

        let results = engine.search("emergency", 10, &tokenizer).await.unwrap();
        assert_eq!(results, vec!["d1".to_string(), "d2".to_string()]);
    }

    #[tokio::test]
    async fn test_build_index_persists_metadata() {
        let engine = engine("articles");
        let docs = vec![json!({"id": "d1", "title": "hello world"})];
        let tokenizer = TokenizerConfig::default();
        let boosts = boosts(&[("title", 1.0)]);
        engine.build_index(&docs, &["title"], &boosts, &tokenizer).await.unwrap();

        let meta = engine.metadata().await.unwrap().unwrap();
        assert_eq!(meta.total_documents, 1);
        assert_eq!(meta.fields, vec!["title".to_string()]);
    }

    #[tokio::test]
    async fn test_multi_term_search_returns_intersection_only() {
        let engine = engine("articles");
        let docs = vec![
            json!({"id": "d1", "title": "Emergency Plumbing Repair", "description": "fix leaks"}),
            json!({"id": "d2", "title": "Electrical Wiring", "description": "emergency repairs"}),
        ];
        let tokenizer = TokenizerConfig { variant: crate::search::tokenizer::TokenizerVariant::Stemming, ..Default::default() };
        let boosts = boosts(&[("title", 3.0), ("description", 1.0)]);
        engine.build_index(&docs, &["title", "description"], &boosts, &tokenizer).await.unwrap();

        let results = engine.search("emergency plumbing", 10, &tokenizer).await.unwrap();
        assert_eq!(results, vec!["d1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_document_removes_from_all_terms() {
        let engine = engine("articles");
        let docs = vec![json!({"id": "d1", "title": "hello world"})];
        let tokenizer = TokenizerConfig::default();
        let boosts = boosts(&[("title", 1.0)]);
        engine.build_index(&docs, &["title"], &boosts, &tokenizer).await.unwrap();

        engine.delete_document("d1").await.unwrap();

        let results = engine.search("hello", 10, &tokenizer).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_update_document_reindexes_content() {
        let engine = engine("articles");
        let docs = vec![json!({"id": "d1", "title": "hello world"})];
        let tokenizer = TokenizerConfig::default();
        let boosts = boosts(&[("title", 1.0)]);
        engine.build_index(&docs, &["title"], &boosts, &tokenizer).await.unwrap();

        engine
            .update_document(&json!({"id": "d1", "title": "goodbye moon"}), &["title"], &boosts, &tokenizer)
            .await
            .unwrap();

        assert!(engine.search("hello", 10, &tokenizer).await.unwrap().is_empty());
        assert_eq!(engine.search("goodbye", 10, &tokenizer).await.unwrap(), vec!["d1".to_string()]);
    }
}
