//! HTTP generation clients (OpenAI-compatible and Ollama)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::errors::RaglineError;
use crate::errors::Result;
use crate::llm::GenerationBackend;

/// Supported generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationProvider {
    /// `OpenAI`-compatible chat completions API
    OpenAI,
    /// Ollama generate API
    Ollama,
}

impl GenerationProvider {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(RaglineError::Config(format!(
                "unknown generation provider '{other}' (expected openai or ollama)"
            ))),
        }
    }
}

/// HTTP client for a text-generation backend
pub struct LlmClient {
    provider: GenerationProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl LlmClient {
    /// Create a client from the generator section of the app config
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let provider = GenerationProvider::parse(&config.provider)?;
        let client = Client::new();

        Ok(Self {
            provider,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            client,
        })
    }

    /// Generation model identifier
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_openai(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling chat completions API: {}", url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RaglineError::BackendUnavailable(format!(
                "chat completions API error ({status}): {error_text}"
            )));
        }

        let result: ChatResponse = response.json().await.map_err(|e| {
            RaglineError::BackendUnavailable(format!("Failed to parse response: {e}"))
        })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                RaglineError::BackendUnavailable("no choices in response".to_string())
            })
    }

    async fn generate_ollama(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Calling Ollama generate API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RaglineError::BackendUnavailable(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            RaglineError::BackendUnavailable(format!("Failed to parse response: {e}"))
        })?;

        Ok(result.response)
    }
}

fn map_request_error(err: reqwest::Error) -> RaglineError {
    RaglineError::BackendUnavailable(err.to_string())
}

#[async_trait]
impl GenerationBackend for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let call = async {
            match self.provider {
                GenerationProvider::OpenAI => self.generate_openai(prompt).await,
                GenerationProvider::Ollama => self.generate_ollama(prompt).await,
            }
        };

        // Hard deadline so a hung backend cannot block a run indefinitely
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RaglineError::BackendTimeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn config(provider: &str) -> GeneratorConfig {
        GeneratorConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            endpoint: "http://localhost:1".to_string(),
            api_key: None,
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = LlmClient::from_config(&config("mystery")).err().unwrap();
        assert!(matches!(err, RaglineError::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 1 refuses connections immediately on any sane host
        let client = LlmClient::from_config(&config("ollama")).unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, RaglineError::BackendUnavailable(_)));
    }
}
