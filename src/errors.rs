use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaglineError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Embedding dimension mismatch: store expects {expected}, document has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Generation backend timed out after {seconds}s")]
    BackendTimeout { seconds: u64 },

    #[error("Pipeline graph contains a cycle involving: {0}")]
    CycleDetected(String),

    #[error("Unbound input port: {node}.{port} has no producer and no external input")]
    UnboundInput { node: String, port: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<RaglineError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RaglineError {
    /// Wrap an error with the id of the pipeline node that produced it.
    pub fn in_node(self, node: impl Into<String>) -> Self {
        Self::NodeFailed {
            node: node.into(),
            source: Box::new(self),
        }
    }

    pub fn malformed_record(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }
}

pub type Result<T> = std::result::Result<T, RaglineError>;
