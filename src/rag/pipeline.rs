//! Complete RAG pipelines: ingestion and query
//!
//! The service owns the two standard graphs. The indexing pipeline is
//! converter -> document embedder -> store writer; the query pipeline is
//! text embedder -> retriever -> prompt builder -> generator. Both are
//! validated once at construction and independently invocable.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use tracing::info;

use crate::config::AppConfig;
use crate::converter::RecordConverter;
use crate::embeddings::EmbeddingClient;
use crate::errors::RaglineError;
use crate::errors::Result;
use crate::llm::GenerationBackend;
use crate::llm::LlmClient;
use crate::models::SourceRecord;
use crate::pipeline::ConverterComponent;
use crate::pipeline::DocumentEmbedderComponent;
use crate::pipeline::GeneratorComponent;
use crate::pipeline::Pipeline;
use crate::pipeline::PipelineGraph;
use crate::pipeline::PortMap;
use crate::pipeline::PromptBuilderComponent;
use crate::pipeline::RetrieverComponent;
use crate::pipeline::StoreWriterComponent;
use crate::pipeline::TextEmbedderComponent;
use crate::pipeline::Value;
use crate::rag::PromptBuilder;
use crate::rag::Retriever;
use crate::store::InMemoryDocumentStore;
use crate::store::ScoredDocument;
use crate::store::VectorSearch;

/// Default name of the text-bearing field in source records
pub const DEFAULT_TEXT_FIELD: &str = "text";

/// Complete RAG service over an in-memory corpus
pub struct RagService {
    store: Arc<InMemoryDocumentStore>,
    embedder: Arc<EmbeddingClient>,
    indexing: Pipeline,
    query: Pipeline,
}

impl RagService {
    /// Create a service from the app config, using the HTTP generation
    /// backend named there.
    ///
    /// # Errors
    /// - Embedding or generator configuration errors (unknown provider,
    ///   invalid dimension)
    /// - Template errors (unknown variables in the configured template)
    pub fn new(config: &AppConfig) -> Result<Self> {
        let backend: Arc<dyn GenerationBackend> =
            Arc::new(LlmClient::from_config(&config.generator)?);
        Self::with_backend(config, backend)
    }

    /// Create a service with an explicit generation backend.
    ///
    /// Useful for tests and callers that bring their own backend.
    pub fn with_backend(
        config: &AppConfig,
        backend: Arc<dyn GenerationBackend>,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryDocumentStore::new());
        let embedder = Arc::new(EmbeddingClient::from_config(&config.embeddings)?);
        let prompt_builder = PromptBuilder::new(config.prompt_template())?;
        let converter = RecordConverter::new(DEFAULT_TEXT_FIELD);

        if config.top_k() == 0 {
            return Err(RaglineError::invalid_argument(
                "retrieval.top_k must be at least 1",
            ));
        }

        let indexing = Self::build_indexing_pipeline(&converter, &embedder, &store)?;
        let query = Self::build_query_pipeline(
            &embedder,
            &store,
            prompt_builder,
            backend,
            config.top_k(),
        )?;

        Ok(Self {
            store,
            embedder,
            indexing,
            query,
        })
    }

    fn build_indexing_pipeline(
        converter: &RecordConverter,
        embedder: &Arc<EmbeddingClient>,
        store: &Arc<InMemoryDocumentStore>,
    ) -> Result<Pipeline> {
        let mut graph = PipelineGraph::new();
        graph.add_component(
            "converter",
            Arc::new(ConverterComponent::new(converter.clone(), BTreeMap::new())),
        )?;
        graph.add_component(
            "doc_embedder",
            Arc::new(DocumentEmbedderComponent::new(embedder.clone())),
        )?;
        graph.add_component(
            "writer",
            Arc::new(StoreWriterComponent::new(
                store.clone() as Arc<dyn VectorSearch>
            )),
        )?;
        graph.connect("converter.documents", "doc_embedder.documents")?;
        graph.connect("doc_embedder.documents", "writer.documents")?;
        graph.build()
    }

    fn build_query_pipeline(
        embedder: &Arc<EmbeddingClient>,
        store: &Arc<InMemoryDocumentStore>,
        prompt_builder: PromptBuilder,
        backend: Arc<dyn GenerationBackend>,
        top_k: usize,
    ) -> Result<Pipeline> {
        let retriever = Retriever::new(store.clone() as Arc<dyn VectorSearch>);

        let mut graph = PipelineGraph::new();
        graph.add_component(
            "text_embedder",
            Arc::new(TextEmbedderComponent::new(embedder.clone())),
        )?;
        graph.add_component(
            "retriever",
            Arc::new(RetrieverComponent::new(retriever, top_k)),
        )?;
        graph.add_component(
            "prompt_builder",
            Arc::new(PromptBuilderComponent::new(prompt_builder)),
        )?;
        graph.add_component("llm", Arc::new(GeneratorComponent::new(backend)))?;

        graph.connect("text_embedder.embedding", "retriever.query_embedding")?;
        graph.connect("retriever.documents", "prompt_builder.documents")?;
        graph.connect("prompt_builder.prompt", "llm.prompt")?;
        graph.build()
    }

    /// Run the indexing pipeline over a batch of source records.
    ///
    /// Malformed records are skipped and counted; the rest of the batch is
    /// embedded and written to the store.
    pub async fn ingest(&self, records: &[SourceRecord]) -> Result<IngestReport> {
        info!("Ingesting {} records", records.len());

        let mut inputs = PortMap::new();
        inputs.insert(
            "converter.records".to_string(),
            Value::Records(records.to_vec()),
        );
        let mut outputs = self.indexing.run(inputs).await?;

        let written = outputs
            .remove("writer.written")
            .map_or(Ok(0), Value::into_count)?;
        let skipped = outputs
            .remove("converter.skipped")
            .map_or(Ok(0), Value::into_count)?;

        info!("Ingestion complete: {} written, {} skipped", written, skipped);
        Ok(IngestReport { written, skipped })
    }

    /// Run the query pipeline for a single question.
    ///
    /// # Errors
    /// Any stage failure aborts the run; the error names the failing node.
    /// No partial answer is returned.
    pub async fn query(&self, question: &str) -> Result<RagResponse> {
        info!("Processing RAG query: {}", question);

        let mut inputs = PortMap::new();
        inputs.insert(
            "text_embedder.text".to_string(),
            Value::Text(question.to_string()),
        );
        inputs.insert(
            "prompt_builder.question".to_string(),
            Value::Text(question.to_string()),
        );
        let mut outputs = self.query.run(inputs).await?;

        let answer = outputs
            .remove("llm.replies")
            .ok_or_else(|| {
                RaglineError::invalid_argument("query pipeline produced no reply")
            })?
            .into_text()?;

        debug!("RAG query completed");
        Ok(RagResponse {
            question: question.to_string(),
            answer,
        })
    }

    /// Retrieve scored documents for a question without generation
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let embedding = self.embedder.embed_one(question).await?;
        self.store.query(&embedding, k)
    }

    /// The shared document store
    pub fn store(&self) -> &Arc<InMemoryDocumentStore> {
        &self.store
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents written to the store
    pub written: usize,
    /// Malformed records skipped
    pub skipped: usize,
}

/// Answer to one RAG query
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub question: String,
    pub answer: String,
}

impl RagResponse {
    /// Formatted string representation for CLI display
    pub fn format(&self) -> String {
        format!("Question: {}\n\nAnswer:\n{}\n", self.question, self.answer)
    }
}
