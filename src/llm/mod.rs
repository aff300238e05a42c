//! Text generation module
//!
//! The generator is the one stage whose latency and availability are outside
//! this crate's control. Calls carry an explicit deadline and failures are
//! surfaced without local retry; blind retries against a generation backend
//! risk duplicate billable calls.

pub mod client;

pub use client::GenerationProvider;
pub use client::LlmClient;

use async_trait::async_trait;

use crate::errors::Result;

/// A text-generation backend invoked with a fully rendered prompt.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate the primary response for `prompt` as plain text.
    ///
    /// # Errors
    /// `BackendUnavailable` when the backend cannot be reached,
    /// `BackendTimeout` when the configured deadline elapses.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
