//! Embedding generation module
//!
//! Computes fixed-dimension vectors for document batches and single query
//! texts. Supported providers:
//! - OpenAI (text-embedding-3-small, etc.)
//! - Ollama (local models)
//! - Local (built-in deterministic hashed bag-of-words, no network; useful
//!   for offline development and tests)
//!
//! # Examples
//!
//! ```rust,no_run
//! use ragline::config::AppConfig;
//! use ragline::embeddings::EmbeddingClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = EmbeddingClient::from_config(&config.embeddings)?;
//!
//!     let embedding = client.embed_one("Hello, world!").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;

pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;

/// Model id of the built-in deterministic embedder
pub const LOCAL_EMBEDDING_MODEL: &str = "hashed-bow-v1";

/// Maximum number of texts sent to a provider in one request; larger
/// batches are split into chunks of this size
pub const MAX_BATCH_SIZE: usize = 100;
