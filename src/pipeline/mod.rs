//! Pipeline orchestration
//!
//! A pipeline is a directed acyclic graph of named components connected by
//! named ports. Graph-definition faults (cycles, duplicate producers) are
//! rejected when the graph is built; missing inputs are rejected by a
//! fail-fast validation pass before any node executes. One `run` executes
//! every node exactly once.

pub mod components;
pub mod graph;

pub use components::ConverterComponent;
pub use components::DocumentEmbedderComponent;
pub use components::GeneratorComponent;
pub use components::PromptBuilderComponent;
pub use components::RetrieverComponent;
pub use components::StoreWriterComponent;
pub use components::TextEmbedderComponent;
pub use graph::Pipeline;
pub use graph::PipelineGraph;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::RaglineError;
use crate::errors::Result;
use crate::models::Document;
use crate::models::SourceRecord;

/// A value flowing through a pipeline port
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Vector(Vec<f32>),
    Documents(Vec<Document>),
    Records(Vec<SourceRecord>),
    Count(usize),
}

impl Value {
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(type_mismatch("text", &other)),
        }
    }

    pub fn into_vector(self) -> Result<Vec<f32>> {
        match self {
            Self::Vector(vector) => Ok(vector),
            other => Err(type_mismatch("vector", &other)),
        }
    }

    pub fn into_documents(self) -> Result<Vec<Document>> {
        match self {
            Self::Documents(documents) => Ok(documents),
            other => Err(type_mismatch("documents", &other)),
        }
    }

    pub fn into_records(self) -> Result<Vec<SourceRecord>> {
        match self {
            Self::Records(records) => Ok(records),
            other => Err(type_mismatch("records", &other)),
        }
    }

    pub fn into_count(self) -> Result<usize> {
        match self {
            Self::Count(count) => Ok(count),
            other => Err(type_mismatch("count", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Vector(_) => "vector",
            Self::Documents(_) => "documents",
            Self::Records(_) => "records",
            Self::Count(_) => "count",
        }
    }
}

fn type_mismatch(expected: &str, got: &Value) -> RaglineError {
    RaglineError::invalid_argument(format!(
        "port value type mismatch: expected {expected}, got {}",
        got.kind()
    ))
}

/// Port payloads exchanged during one run, keyed by port name
pub type PortMap = BTreeMap<String, Value>;

/// A named processing stage in a pipeline graph.
///
/// Components declare their ports up front so the graph can be validated
/// before execution; `run` is invoked exactly once per pipeline run with
/// every declared input present.
#[async_trait]
pub trait Component: Send + Sync {
    /// Input port names this component consumes
    fn input_ports(&self) -> &'static [&'static str];

    /// Output port names this component produces
    fn output_ports(&self) -> &'static [&'static str];

    /// Execute the component over its gathered inputs
    async fn run(&self, inputs: PortMap) -> Result<PortMap>;
}

/// Take a required input port out of the gathered map.
///
/// The orchestrator's validation pass guarantees presence, so a miss here
/// means a component lied about its declared ports.
pub(crate) fn take_port(inputs: &mut PortMap, port: &str) -> Result<Value> {
    inputs.remove(port).ok_or_else(|| {
        RaglineError::invalid_argument(format!("input port '{port}' was not supplied"))
    })
}
