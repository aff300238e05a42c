//! Concrete pipeline components wrapping each processing stage

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::converter::RecordConverter;
use crate::embeddings::EmbeddingClient;
use crate::errors::Result;
use crate::llm::GenerationBackend;
use crate::models::MetaValue;
use crate::pipeline::take_port;
use crate::pipeline::Component;
use crate::pipeline::PortMap;
use crate::pipeline::Value;
use crate::rag::PromptBuilder;
use crate::rag::Retriever;
use crate::store::VectorSearch;

/// `records` -> `documents` (+ `skipped` count).
///
/// Malformed records are skipped with a warning; the batch continues.
pub struct ConverterComponent {
    converter: RecordConverter,
    extra_meta: BTreeMap<String, MetaValue>,
}

impl ConverterComponent {
    pub fn new(converter: RecordConverter, extra_meta: BTreeMap<String, MetaValue>) -> Self {
        Self {
            converter,
            extra_meta,
        }
    }
}

#[async_trait]
impl Component for ConverterComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["records"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["documents", "skipped"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let records = take_port(&mut inputs, "records")?.into_records()?;
        let (documents, failures) = self.converter.convert_all(&records, &self.extra_meta);

        let mut outputs = PortMap::new();
        outputs.insert("documents".to_string(), Value::Documents(documents));
        outputs.insert("skipped".to_string(), Value::Count(failures.len()));
        Ok(outputs)
    }
}

/// `documents` -> `documents` with embeddings populated (batched)
pub struct DocumentEmbedderComponent {
    client: Arc<EmbeddingClient>,
}

impl DocumentEmbedderComponent {
    pub fn new(client: Arc<EmbeddingClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Component for DocumentEmbedderComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["documents"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["documents"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let mut documents = take_port(&mut inputs, "documents")?.into_documents()?;
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.client.embed_batch(&texts).await?;
        for (doc, vector) in documents.iter_mut().zip(vectors) {
            doc.embedding = Some(vector);
        }
        debug!("Embedded {} documents", documents.len());

        let mut outputs = PortMap::new();
        outputs.insert("documents".to_string(), Value::Documents(documents));
        Ok(outputs)
    }
}

/// `documents` -> `written` count, appended to the shared store
pub struct StoreWriterComponent {
    store: Arc<dyn VectorSearch>,
}

impl StoreWriterComponent {
    pub fn new(store: Arc<dyn VectorSearch>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Component for StoreWriterComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["documents"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["written"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let documents = take_port(&mut inputs, "documents")?.into_documents()?;
        let written = self.store.write(documents)?;

        let mut outputs = PortMap::new();
        outputs.insert("written".to_string(), Value::Count(written));
        Ok(outputs)
    }
}

/// `text` -> `embedding` for a single query string
pub struct TextEmbedderComponent {
    client: Arc<EmbeddingClient>,
}

impl TextEmbedderComponent {
    pub fn new(client: Arc<EmbeddingClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Component for TextEmbedderComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["text"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["embedding"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let text = take_port(&mut inputs, "text")?.into_text()?;
        let embedding = self.client.embed_one(&text).await?;

        let mut outputs = PortMap::new();
        outputs.insert("embedding".to_string(), Value::Vector(embedding));
        Ok(outputs)
    }
}

/// `query_embedding` -> ranked `documents`
pub struct RetrieverComponent {
    retriever: Retriever,
    top_k: usize,
}

impl RetrieverComponent {
    pub fn new(retriever: Retriever, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl Component for RetrieverComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["query_embedding"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["documents"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let embedding = take_port(&mut inputs, "query_embedding")?.into_vector()?;
        let documents = self.retriever.retrieve(&embedding, self.top_k)?;

        let mut outputs = PortMap::new();
        outputs.insert("documents".to_string(), Value::Documents(documents));
        Ok(outputs)
    }
}

/// `documents` + `question` -> rendered `prompt`
pub struct PromptBuilderComponent {
    builder: PromptBuilder,
}

impl PromptBuilderComponent {
    pub fn new(builder: PromptBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Component for PromptBuilderComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["documents", "question"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["prompt"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let documents = take_port(&mut inputs, "documents")?.into_documents()?;
        let question = take_port(&mut inputs, "question")?.into_text()?;
        let prompt = self.builder.build(&documents, &question);

        let mut outputs = PortMap::new();
        outputs.insert("prompt".to_string(), Value::Text(prompt));
        Ok(outputs)
    }
}

/// `prompt` -> `replies` from the generation backend
pub struct GeneratorComponent {
    backend: Arc<dyn GenerationBackend>,
}

impl GeneratorComponent {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Component for GeneratorComponent {
    fn input_ports(&self) -> &'static [&'static str] {
        &["prompt"]
    }

    fn output_ports(&self) -> &'static [&'static str] {
        &["replies"]
    }

    async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
        let prompt = take_port(&mut inputs, "prompt")?.into_text()?;
        let reply = self.backend.generate(&prompt).await?;

        let mut outputs = PortMap::new();
        outputs.insert("replies".to_string(), Value::Text(reply));
        Ok(outputs)
    }
}
