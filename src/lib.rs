//! ragline: an in-memory Retrieval-Augmented Generation query pipeline
//!
//! Documents are converted from source records, embedded, and held in an
//! in-memory store; questions are embedded, matched by cosine similarity,
//! rendered into a grounded prompt, and answered by a text-generation
//! backend. The stages are wired as a validated directed acyclic graph of
//! named components (see [`pipeline`]), with [`rag::RagService`] providing
//! the standard ingestion and query wiring.

pub mod config;
pub mod converter;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod rag;
pub mod store;

pub use config::AppConfig;
pub use errors::*;
pub use models::Document;
pub use models::SourceRecord;
