//! RAG (Retrieval-Augmented Generation) module
//!
//! End-to-end query flow over an in-memory corpus:
//! - Semantic retrieval using vector embeddings
//! - Grounded prompt rendering from retrieved documents
//! - LLM-based answer generation
//!
//! # Examples
//!
//! ```rust,no_run
//! use ragline::config::AppConfig;
//! use ragline::rag::RagService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::new(&config)?;
//!
//!     let records = ragline::converter::read_csv_records("sample.csv")?;
//!     service.ingest(&records).await?;
//!
//!     let response = service.query("What does the Rhodes Statue look like?").await?;
//!     println!("Answer: {}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use pipeline::IngestReport;
pub use pipeline::RagResponse;
pub use pipeline::RagService;
pub use prompts::PromptBuilder;
pub use prompts::DEFAULT_PROMPT_TEMPLATE;
pub use retriever::Retriever;
