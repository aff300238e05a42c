//! Embedding clients for the supported providers

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::EmbeddingsConfig;
use crate::embeddings::LOCAL_EMBEDDING_MODEL;
use crate::embeddings::MAX_BATCH_SIZE;
use crate::errors::RaglineError;
use crate::errors::Result;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// `OpenAI` embeddings API
    OpenAI,
    /// Ollama local embeddings
    Ollama,
    /// Built-in deterministic hashed bag-of-words embedder
    Local,
}

impl EmbeddingProvider {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "local" => Ok(Self::Local),
            other => Err(RaglineError::Config(format!(
                "unknown embedding provider '{other}' (expected openai, ollama or local)"
            ))),
        }
    }
}

/// Client computing fixed-dimension embeddings for texts.
///
/// All vectors produced by one client have the configured dimension, and
/// `embed_batch` preserves input order, so `embed_one(t)` always equals
/// `embed_batch([t])[0]`.
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
    model: String,
    dimension: usize,
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl EmbeddingClient {
    /// Create a client from the embeddings section of the app config
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let provider = EmbeddingProvider::parse(&config.provider)?;
        Self::new(
            provider,
            config.model.clone(),
            config.dimension,
            config.endpoint.clone(),
            config.api_key.clone(),
        )
    }

    /// Create a new embedding client
    pub fn new(
        provider: EmbeddingProvider,
        model: String,
        dimension: usize,
        endpoint: String,
        api_key: Option<String>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(RaglineError::invalid_argument(
                "embedding dimension must be at least 1",
            ));
        }
        if provider == EmbeddingProvider::Local && model != LOCAL_EMBEDDING_MODEL {
            return Err(RaglineError::ModelUnavailable(format!(
                "local provider only ships model '{LOCAL_EMBEDDING_MODEL}', got '{model}'"
            )));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| RaglineError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            provider,
            model,
            dimension,
            endpoint,
            api_key,
            client,
        })
    }

    /// The fixed dimension of every vector this client produces
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model identifier, e.g. for store provenance metadata
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a single query text.
    ///
    /// # Errors
    /// `ModelUnavailable` when the backing model cannot be reached; fatal
    /// for the pipeline, there is no degraded mode.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vector = match self.provider {
            EmbeddingProvider::OpenAI => {
                let mut vectors = self.embed_openai(&[text]).await?;
                vectors.pop().ok_or_else(|| {
                    RaglineError::ModelUnavailable("no embedding in response".to_string())
                })?
            }
            EmbeddingProvider::Ollama => self.embed_ollama(text).await?,
            EmbeddingProvider::Local => self.embed_local(text),
        };
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    /// Embed a batch of document texts, preserving input order.
    ///
    /// Batches larger than [`MAX_BATCH_SIZE`] are split into provider-sized
    /// chunks, so a whole corpus can be embedded in one call.
    ///
    /// # Errors
    /// `ModelUnavailable` on provider failures.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = match self.provider {
            EmbeddingProvider::OpenAI => {
                let mut vectors = Vec::with_capacity(texts.len());
                for chunk in texts.chunks(MAX_BATCH_SIZE) {
                    let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
                    vectors.extend(self.embed_openai(&refs).await?);
                }
                vectors
            }
            EmbeddingProvider::Ollama => {
                // Ollama has no batch endpoint; embed with bounded concurrency
                use futures::stream::StreamExt;

                let concurrency = std::cmp::min(texts.len().max(1), 16);
                let calls: Vec<_> = texts.iter().map(|text| self.embed_ollama(text)).collect();
                let results: Vec<Result<Vec<f32>>> = futures::stream::iter(calls)
                    .buffered(concurrency)
                    .collect()
                    .await;

                let mut vectors = Vec::with_capacity(results.len());
                for result in results {
                    vectors.push(result?);
                }
                vectors
            }
            EmbeddingProvider::Local => texts.iter().map(|t| self.embed_local(t)).collect(),
        };

        if vectors.len() != texts.len() {
            return Err(RaglineError::ModelUnavailable(format!(
                "provider returned {} embeddings for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RaglineError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Embed texts using the `OpenAI` API
    async fn embed_openai(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            RaglineError::Config("OpenAI API key not provided".to_string())
        })?;

        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            input: &'a [&'a str],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI embeddings API: {} items", texts.len());

        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RaglineError::ModelUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RaglineError::ModelUnavailable(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| {
            RaglineError::ModelUnavailable(format!("Failed to parse response: {e}"))
        })?;

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Embed a single text using the Ollama API
    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RaglineError::ModelUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RaglineError::ModelUnavailable(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            RaglineError::ModelUnavailable(format!("Failed to parse response: {e}"))
        })?;

        Ok(result.embedding)
    }

    /// Deterministic hashed bag-of-words embedding.
    ///
    /// Each lowercase token is hashed into one of `dimension` buckets with a
    /// sign bit, so texts sharing words get correlated vectors. Not a
    /// semantic model, but deterministic and dependency-free.
    fn embed_local(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_client(dimension: usize) -> EmbeddingClient {
        EmbeddingClient::new(
            EmbeddingProvider::Local,
            LOCAL_EMBEDDING_MODEL.to_string(),
            dimension,
            String::new(),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_local_embedding_has_configured_dimension() {
        let client = local_client(64);
        let vector = client.embed_one("cats are mammals").await.unwrap();
        assert_eq!(vector.len(), 64);
        assert!(vector.iter().any(|v| *v != 0.0));
    }

    #[tokio::test]
    async fn test_local_embedding_is_deterministic() {
        let client = local_client(64);
        let a = client.embed_one("the stock market rose today").await.unwrap();
        let b = client.embed_one("the stock market rose today").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_batch_matches_single_elementwise() {
        let client = local_client(64);
        let texts = vec!["cats are mammals".to_string(), "dogs bark".to_string()];
        let batch = client.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], client.embed_one(&texts[0]).await.unwrap());
        assert_eq!(batch[1], client.embed_one(&texts[1]).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_length() {
        let client = local_client(32);
        let texts: Vec<String> = (0..10).map(|i| format!("text number {i}")).collect();
        let batch = client.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(*vector, client.embed_one(text).await.unwrap());
        }
    }

    #[test]
    fn test_unknown_local_model_is_unavailable() {
        let err = EmbeddingClient::new(
            EmbeddingProvider::Local,
            "no-such-model".to_string(),
            64,
            String::new(),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(err, RaglineError::ModelUnavailable(_)));
    }

    #[test]
    fn test_unknown_provider_name_is_rejected() {
        let config = EmbeddingsConfig {
            provider: "mystery".to_string(),
            model: "m".to_string(),
            dimension: 8,
            endpoint: String::new(),
            api_key: None,
        };
        let err = EmbeddingClient::from_config(&config).err().unwrap();
        assert!(matches!(err, RaglineError::Config(_)));
    }

    #[tokio::test]
    async fn test_batch_beyond_chunk_size_is_embedded_whole() {
        let client = local_client(8);
        let texts: Vec<String> = (0..MAX_BATCH_SIZE + 50)
            .map(|i| format!("text number {i}"))
            .collect();
        let batch = client.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        assert_eq!(batch[0], client.embed_one(&texts[0]).await.unwrap());
        let last = texts.len() - 1;
        assert_eq!(batch[last], client.embed_one(&texts[last]).await.unwrap());
    }
}
