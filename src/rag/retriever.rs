//! Retrieval over the document store

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::models::Document;
use crate::store::ScoredDocument;
use crate::store::VectorSearch;

/// Retriever answering query embeddings with a ranked top-k of documents
pub struct Retriever {
    store: Arc<dyn VectorSearch>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorSearch>) -> Self {
        Self { store }
    }

    /// Top-k documents for a query embedding, scores stripped, rank order
    /// preserved. Store failures propagate unchanged.
    pub fn retrieve(&self, query_embedding: &[f32], k: usize) -> Result<Vec<Document>> {
        let scored = self.retrieve_scored(query_embedding, k)?;
        Ok(scored.into_iter().map(|s| s.document).collect())
    }

    /// Top-k documents with their similarity scores
    pub fn retrieve_scored(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let results = self.store.query(query_embedding, k)?;
        debug!("Retrieved {} documents (k={})", results.len(), k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RaglineError;
    use crate::models::Document;
    use crate::store::InMemoryDocumentStore;

    fn store_with_axes() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut a = Document::new("x axis");
        a.embedding = Some(vec![1.0, 0.0]);
        let mut b = Document::new("y axis");
        b.embedding = Some(vec![0.0, 1.0]);
        store.write(vec![a, b]).unwrap();
        store
    }

    #[test]
    fn test_retrieve_strips_scores_preserves_order() {
        let retriever = Retriever::new(store_with_axes());
        let docs = retriever.retrieve(&[1.0, 0.1], 2).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "x axis");
        assert_eq!(docs[1].content, "y axis");
    }

    #[test]
    fn test_retrieve_propagates_store_errors() {
        let retriever = Retriever::new(store_with_axes());
        let err = retriever.retrieve(&[1.0, 0.0], 0).unwrap_err();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
    }
}
