//! Core data types shared across the pipeline

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// Scalar metadata value attached to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A unit of retrievable text with metadata and, once embedded, a vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable id: caller-supplied, or the SHA-256 of the content
    pub id: String,
    /// The text the retriever matches against
    pub content: String,
    /// Provenance and caller-supplied metadata
    #[serde(default)]
    pub meta: BTreeMap<String, MetaValue>,
    /// Embedding vector; populated during ingestion, immutable afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a document with an id derived from its content hash
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: content_hash(&content),
            content,
            meta: BTreeMap::new(),
            embedding: None,
        }
    }

    /// Create a document with an explicit id
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            meta: BTreeMap::new(),
            embedding: None,
        }
    }

    /// Attach a metadata entry, consuming and returning the document
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Length of the embedding, or 0 when not yet embedded
    pub fn embedding_dim(&self) -> usize {
        self.embedding.as_ref().map_or(0, Vec::len)
    }
}

/// Stable content-derived id (lowercase hex SHA-256)
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// One row of structured or semi-structured source data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRecord {
    pub fields: BTreeMap<String, String>,
}

impl SourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("world"));
    }

    #[test]
    fn test_document_id_from_content() {
        let doc = Document::new("cats are mammals");
        assert_eq!(doc.id, content_hash("cats are mammals"));
        assert!(doc.embedding.is_none());
        assert_eq!(doc.embedding_dim(), 0);
    }

    #[test]
    fn test_document_meta_builder() {
        let doc = Document::new("text")
            .with_meta("date_added", "2024-01-01T00:00:00Z")
            .with_meta("row", 3i64);
        assert_eq!(
            doc.meta.get("date_added"),
            Some(&MetaValue::String("2024-01-01T00:00:00Z".to_string()))
        );
        assert_eq!(doc.meta.get("row"), Some(&MetaValue::Integer(3)));
    }

    #[test]
    fn test_source_record_lookup() {
        let record = SourceRecord::new()
            .with_field("title", "Rhodes")
            .with_field("body", "The statue stood at the harbour");
        assert_eq!(record.get("title"), Some("Rhodes"));
        assert_eq!(record.get("missing"), None);
    }
}
