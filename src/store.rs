//! In-memory document store with exhaustive cosine similarity search

use std::sync::RwLock;

use tracing::debug;

use crate::errors::RaglineError;
use crate::errors::Result;
use crate::models::Document;

/// A document paired with its similarity score for one query
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Similarity search over embedded documents.
///
/// The linear-scan store below is exact and sufficient for small corpora;
/// an approximate index can implement this trait without touching callers.
pub trait VectorSearch: Send + Sync {
    /// Append embedded documents to the store. All-or-nothing per call.
    fn write(&self, documents: Vec<Document>) -> Result<usize>;

    /// Return the `k` most similar documents, descending by cosine score.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Number of stored documents
    fn count(&self) -> usize;
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Documents in insertion order; order is the similarity tie-break
    documents: Vec<Document>,
    /// Established embedding dimension, fixed by the first write
    dimension: Option<usize>,
}

/// Append-only in-memory store. Single writer, concurrent readers.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store's established embedding dimension, if any document has
    /// been written yet
    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().expect("store lock poisoned").dimension
    }

    /// Snapshot of all stored documents in insertion order
    pub fn documents(&self) -> Vec<Document> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .documents
            .clone()
    }
}

impl VectorSearch for InMemoryDocumentStore {
    fn write(&self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.write().expect("store lock poisoned");

        // Validate the whole batch before appending anything, so a rejected
        // call leaves the store unchanged.
        let expected = inner
            .dimension
            .or_else(|| documents.first().map(Document::embedding_dim));
        let expected = expected.unwrap_or(0);
        if expected == 0 {
            return Err(RaglineError::invalid_argument(
                "documents must be embedded before they are written",
            ));
        }
        for doc in &documents {
            let actual = doc.embedding_dim();
            if actual == 0 {
                return Err(RaglineError::invalid_argument(format!(
                    "document '{}' has no embedding",
                    doc.id
                )));
            }
            if actual != expected {
                return Err(RaglineError::DimensionMismatch { expected, actual });
            }
        }

        inner.dimension = Some(expected);
        let written = documents.len();
        inner.documents.extend(documents);
        debug!("Wrote {} documents (store now holds {})", written, inner.documents.len());
        Ok(written)
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Err(RaglineError::invalid_argument("k must be at least 1"));
        }

        let inner = self.inner.read().expect("store lock poisoned");
        if let Some(expected) = inner.dimension {
            if vector.len() != expected {
                return Err(RaglineError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let mut scored: Vec<ScoredDocument> = inner
            .documents
            .iter()
            .map(|doc| {
                let embedding = doc.embedding.as_deref().unwrap_or(&[]);
                // Zero-norm vectors have undefined cosine similarity and
                // rank strictly below every defined score.
                let score =
                    cosine_similarity(vector, embedding).unwrap_or(f32::NEG_INFINITY);
                ScoredDocument {
                    document: doc.clone(),
                    score,
                }
            })
            .collect();

        // Stable sort over the insertion-ordered list: equal scores keep
        // insertion order, earlier-inserted documents winning.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").documents.len()
    }
}

/// Explicit cosine similarity: dot product over the product of norms.
///
/// Embeddings are not assumed unit-normalized. Returns `None` when either
/// vector has zero norm (undefined similarity).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn embedded(content: &str, embedding: Vec<f32>) -> Document {
        let mut doc = Document::new(content);
        doc.embedding = Some(embedding);
        doc
    }

    #[test]
    fn test_cosine_similarity_basics() {
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);

        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-6);

        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_not_normalization_dependent() {
        // Scaling a vector must not change its cosine similarity
        let a = cosine_similarity(&[1.0, 2.0], &[3.0, 4.0]).unwrap();
        let b = cosine_similarity(&[10.0, 20.0], &[3.0, 4.0]).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm_is_undefined() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).is_none());
        assert!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_query_returns_k_results_in_descending_order() {
        let store = InMemoryDocumentStore::new();
        store
            .write(vec![
                embedded("a", vec![1.0, 0.0]),
                embedded("b", vec![0.8, 0.2]),
                embedded("c", vec![0.0, 1.0]),
            ])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.content, "a");
        assert_eq!(results[1].document.content, "b");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_query_with_k_larger_than_store_returns_all() {
        let store = InMemoryDocumentStore::new();
        store
            .write(vec![
                embedded("a", vec![1.0, 0.0]),
                embedded("b", vec![0.0, 1.0]),
            ])
            .unwrap();

        let results = store.query(&[1.0, 1.0], 10).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_query_rejects_zero_k() {
        let store = InMemoryDocumentStore::new();
        let err = store.query(&[1.0], 0).unwrap_err();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
    }

    #[test]
    fn test_tie_break_prefers_earlier_insertion() {
        let store = InMemoryDocumentStore::new();
        // Same direction, same cosine score against the query
        store
            .write(vec![
                embedded("first", vec![2.0, 0.0]),
                embedded("second", vec![1.0, 0.0]),
            ])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].document.content, "first");
        assert_eq!(results[1].document.content, "second");
    }

    #[test]
    fn test_zero_norm_document_ranks_last() {
        let store = InMemoryDocumentStore::new();
        store
            .write(vec![
                embedded("null", vec![0.0, 0.0]),
                embedded("real", vec![1.0, 1.0]),
            ])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].document.content, "real");
        assert_eq!(results[1].document.content, "null");
        assert_eq!(results[1].score, f32::NEG_INFINITY);
    }

    #[test]
    fn test_dimension_mismatch_is_all_or_nothing() {
        let store = InMemoryDocumentStore::new();
        store.write(vec![embedded("a", vec![1.0, 0.0])]).unwrap();

        let err = store
            .write(vec![
                embedded("b", vec![0.0, 1.0]),
                embedded("c", vec![0.0, 1.0, 2.0]),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            RaglineError::DimensionMismatch { expected: 2, actual: 3 }
        ));
        // The valid document in the failed batch must not have been written
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_write_rejects_unembedded_documents() {
        let store = InMemoryDocumentStore::new();
        let err = store.write(vec![Document::new("bare")]).unwrap_err();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_query_dimension_must_match_store() {
        let store = InMemoryDocumentStore::new();
        store.write(vec![embedded("a", vec![1.0, 0.0])]).unwrap();
        let err = store.query(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RaglineError::DimensionMismatch { .. }));
    }
}
