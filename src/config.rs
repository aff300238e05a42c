use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Provider name: "openai", "ollama" or "local"
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Provider name: "openai" or "ollama"
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Hard deadline on a single generation call
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of documents handed to the prompt builder
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_template() -> String {
    crate::rag::DEFAULT_PROMPT_TEMPLATE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub embeddings: EmbeddingsConfig,
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::RaglineError::Config(
                "No config file found. Please create config.toml or config.example.toml"
                    .to_string(),
            ))
        }
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    /// Get embedding dimension
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension
    }

    /// Get generation model name
    pub fn generator_model(&self) -> &str {
        &self.generator.model
    }

    /// Get generation call deadline in seconds
    pub fn generator_timeout_secs(&self) -> u64 {
        self.generator.timeout_secs
    }

    /// Get number of documents to retrieve per query
    pub fn top_k(&self) -> usize {
        self.retrieval.top_k
    }

    /// Get the prompt template text
    pub fn prompt_template(&self) -> &str {
        &self.prompt.template
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                backtrace: true,
            },
            embeddings: EmbeddingsConfig {
                provider: "local".to_string(),
                model: "hashed-bow-v1".to_string(),
                dimension: 384,
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
            },
            generator: GeneratorConfig {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: None,
                timeout_secs: default_generation_timeout(),
            },
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
        }
    }
}
