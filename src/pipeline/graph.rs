//! Graph definition, validation and topological execution

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use tracing::info;

use crate::errors::RaglineError;
use crate::errors::Result;
use crate::pipeline::Component;
use crate::pipeline::PortMap;
use crate::pipeline::Value;

/// One (source node, output port) -> (destination node, input port) binding
#[derive(Debug, Clone, PartialEq, Eq)]
struct Connection {
    from_node: String,
    from_port: String,
    to_node: String,
    to_port: String,
}

/// Builder for a pipeline graph: named components plus port bindings.
///
/// `build` validates the graph shape once; the resulting [`Pipeline`] can
/// then be run any number of times.
#[derive(Default)]
pub struct PipelineGraph {
    nodes: BTreeMap<String, Arc<dyn Component>>,
    connections: Vec<Connection>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named component instance.
    ///
    /// # Errors
    /// `InvalidArgument` when the name is already taken.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.is_empty() || name.contains('.') {
            return Err(RaglineError::invalid_argument(format!(
                "invalid component name '{name}'"
            )));
        }
        if self.nodes.contains_key(&name) {
            return Err(RaglineError::invalid_argument(format!(
                "component '{name}' is already registered"
            )));
        }
        self.nodes.insert(name, component);
        Ok(self)
    }

    /// Bind a producer output to a consumer input, both written as
    /// `"node.port"`.
    ///
    /// # Errors
    /// `InvalidArgument` when an endpoint is unknown or the input port
    /// already has a producer (each input takes exactly one).
    pub fn connect(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        let (from_node, from_port) = self.split_endpoint(from)?;
        let (to_node, to_port) = self.split_endpoint(to)?;

        self.check_port(&from_node, &from_port, PortKind::Output)?;
        self.check_port(&to_node, &to_port, PortKind::Input)?;

        if self
            .connections
            .iter()
            .any(|c| c.to_node == to_node && c.to_port == to_port)
        {
            return Err(RaglineError::invalid_argument(format!(
                "input port {to_node}.{to_port} already has a producer"
            )));
        }

        self.connections.push(Connection {
            from_node,
            from_port,
            to_node,
            to_port,
        });
        Ok(self)
    }

    /// Validate the graph and produce an executable pipeline.
    ///
    /// # Errors
    /// `CycleDetected` when no topological order exists. Detection happens
    /// here, never at run time.
    pub fn build(self) -> Result<Pipeline> {
        let order = self.topological_order()?;
        debug!("Pipeline built with execution order: {:?}", order);
        Ok(Pipeline {
            nodes: self.nodes,
            connections: self.connections,
            order,
        })
    }

    fn split_endpoint(&self, endpoint: &str) -> Result<(String, String)> {
        let (node, port) = endpoint.split_once('.').ok_or_else(|| {
            RaglineError::invalid_argument(format!(
                "endpoint '{endpoint}' must be written as 'node.port'"
            ))
        })?;
        if !self.nodes.contains_key(node) {
            return Err(RaglineError::invalid_argument(format!(
                "unknown component '{node}' in endpoint '{endpoint}'"
            )));
        }
        Ok((node.to_string(), port.to_string()))
    }

    fn check_port(&self, node: &str, port: &str, kind: PortKind) -> Result<()> {
        let component = &self.nodes[node];
        let declared = match kind {
            PortKind::Input => component.input_ports(),
            PortKind::Output => component.output_ports(),
        };
        if !declared.contains(&port) {
            return Err(RaglineError::invalid_argument(format!(
                "component '{node}' has no {} port '{port}' (declared: {declared:?})",
                kind.label()
            )));
        }
        Ok(())
    }

    /// Kahn's algorithm over node names; leftover nodes mean a cycle
    fn topological_order(&self) -> Result<Vec<String>> {
        let mut indegree: BTreeMap<&str, usize> =
            self.nodes.keys().map(|n| (n.as_str(), 0)).collect();
        let mut edges: BTreeSet<(&str, &str)> = BTreeSet::new();
        for conn in &self.connections {
            // Parallel port bindings between two nodes count once
            if edges.insert((conn.from_node.as_str(), conn.to_node.as_str())) {
                *indegree.get_mut(conn.to_node.as_str()).expect("known node") += 1;
            }
        }

        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop() {
            order.push(node.to_string());
            for (from, to) in &edges {
                if *from == node {
                    let degree = indegree.get_mut(to).expect("known node");
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(to);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(n, _)| *n)
                .collect();
            return Err(RaglineError::CycleDetected(stuck.join(", ")));
        }
        Ok(order)
    }
}

enum PortKind {
    Input,
    Output,
}

impl PortKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// A validated, executable pipeline. Each `run` is independent; per-run
/// state lives only on the call stack.
pub struct Pipeline {
    nodes: BTreeMap<String, Arc<dyn Component>>,
    connections: Vec<Connection>,
    order: Vec<String>,
}

impl Pipeline {
    /// Execute the whole graph once.
    ///
    /// `external_inputs` are keyed `"node.port"` and feed input ports that
    /// have no bound producer. A validation pass over the whole graph runs
    /// first: every consumed input must be bound or supplied, and no
    /// external input may shadow a bound producer or name an unknown port.
    /// Any node failure aborts the run with the node id attached; no
    /// partial outputs are returned.
    ///
    /// The returned map holds the unconsumed outputs, keyed `"node.port"`.
    pub async fn run(&self, external_inputs: PortMap) -> Result<PortMap> {
        self.validate_inputs(&external_inputs)?;

        // Query context: all port payloads produced during this run
        let mut produced: BTreeMap<(String, String), Value> = BTreeMap::new();
        let mut external = external_inputs;

        for name in &self.order {
            let component = &self.nodes[name];
            let mut inputs = PortMap::new();
            for port in component.input_ports() {
                let value = if let Some(conn) = self.producer_of(name, port) {
                    produced
                        .get(&(conn.from_node.clone(), conn.from_port.clone()))
                        .cloned()
                        .ok_or_else(|| {
                            RaglineError::invalid_argument(format!(
                                "producer {}.{} yielded no value",
                                conn.from_node, conn.from_port
                            ))
                            .in_node(name.clone())
                        })?
                } else {
                    external
                        .remove(&format!("{name}.{port}"))
                        .expect("validated external input")
                };
                inputs.insert((*port).to_string(), value);
            }

            debug!("Running component '{}'", name);
            let outputs = component
                .run(inputs)
                .await
                .map_err(|e| e.in_node(name.clone()))?;

            for port in component.output_ports() {
                if let Some(value) = outputs.get(*port) {
                    produced.insert((name.clone(), (*port).to_string()), value.clone());
                }
            }
        }

        // Unconsumed outputs are the pipeline's results
        let mut results = PortMap::new();
        for ((node, port), value) in produced {
            let consumed = self
                .connections
                .iter()
                .any(|c| c.from_node == node && c.from_port == port);
            if !consumed {
                results.insert(format!("{node}.{port}"), value);
            }
        }
        info!("Pipeline run completed ({} nodes)", self.order.len());
        Ok(results)
    }

    /// Fail-fast validation of the whole graph against the supplied inputs
    fn validate_inputs(&self, external: &PortMap) -> Result<()> {
        for key in external.keys() {
            let (node, port) = key.split_once('.').ok_or_else(|| {
                RaglineError::invalid_argument(format!(
                    "external input '{key}' must be keyed as 'node.port'"
                ))
            })?;
            let component = self.nodes.get(node).ok_or_else(|| {
                RaglineError::invalid_argument(format!(
                    "external input '{key}' names unknown component '{node}'"
                ))
            })?;
            if !component.input_ports().contains(&port) {
                return Err(RaglineError::invalid_argument(format!(
                    "external input '{key}' names unknown input port '{port}'"
                )));
            }
            if self.producer_of(node, port).is_some() {
                return Err(RaglineError::invalid_argument(format!(
                    "external input '{key}' shadows a bound producer"
                )));
            }
        }

        for (name, component) in &self.nodes {
            for port in component.input_ports() {
                let bound = self.producer_of(name, port).is_some();
                let supplied = external.contains_key(&format!("{name}.{port}"));
                if !bound && !supplied {
                    return Err(RaglineError::UnboundInput {
                        node: name.clone(),
                        port: (*port).to_string(),
                    });
                }
            }
        }

        // Every node must be reachable from the external inputs; an isolated
        // node would otherwise execute as a silent source.
        let mut reachable: BTreeSet<&str> = self
            .nodes
            .iter()
            .filter(|(name, component)| {
                component
                    .input_ports()
                    .iter()
                    .any(|port| external.contains_key(&format!("{name}.{port}")))
            })
            .map(|(name, _)| name.as_str())
            .collect();
        let mut grew = true;
        while grew {
            grew = false;
            for conn in &self.connections {
                if reachable.contains(conn.from_node.as_str())
                    && reachable.insert(conn.to_node.as_str())
                {
                    grew = true;
                }
            }
        }
        for name in self.nodes.keys() {
            if !reachable.contains(name.as_str()) {
                return Err(RaglineError::invalid_argument(format!(
                    "component '{name}' is not reachable from any external input"
                )));
            }
        }
        Ok(())
    }

    fn producer_of(&self, node: &str, port: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.to_node == node && c.to_port == port)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;

    use super::*;
    use crate::pipeline::take_port;

    /// Appends its tag to the incoming text and counts invocations
    struct TagComponent {
        tag: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl TagComponent {
        fn new(tag: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    tag,
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Component for TagComponent {
        fn input_ports(&self) -> &'static [&'static str] {
            &["text"]
        }

        fn output_ports(&self) -> &'static [&'static str] {
            &["text"]
        }

        async fn run(&self, mut inputs: PortMap) -> Result<PortMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = take_port(&mut inputs, "text")?.into_text()?;
            let mut outputs = PortMap::new();
            outputs.insert("text".to_string(), Value::Text(format!("{text}>{}", self.tag)));
            Ok(outputs)
        }
    }

    fn chain_graph() -> (PipelineGraph, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let (a, a_calls) = TagComponent::new("a");
        let (b, b_calls) = TagComponent::new("b");
        let mut graph = PipelineGraph::new();
        graph.add_component("a", a).unwrap();
        graph.add_component("b", b).unwrap();
        graph.connect("a.text", "b.text").unwrap();
        (graph, a_calls, b_calls)
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_and_returns_leaf_output() {
        let (graph, a_calls, b_calls) = chain_graph();
        let pipeline = graph.build().unwrap();

        let mut inputs = PortMap::new();
        inputs.insert("a.text".to_string(), Value::Text("in".to_string()));
        let mut outputs = pipeline.run(inputs).await.unwrap();

        assert_eq!(outputs.len(), 1);
        let answer = outputs.remove("b.text").unwrap().into_text().unwrap();
        assert_eq!(answer, "in>a>b");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cycle_detected_at_build_before_any_execution() {
        let (a, a_calls) = TagComponent::new("a");
        let (b, b_calls) = TagComponent::new("b");
        let mut graph = PipelineGraph::new();
        graph.add_component("a", a).unwrap();
        graph.add_component("b", b).unwrap();
        graph.connect("a.text", "b.text").unwrap();
        graph.connect("b.text", "a.text").unwrap();

        let err = graph.build().err().unwrap();
        assert!(matches!(err, RaglineError::CycleDetected(_)));
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unbound_input_fails_before_any_node_runs() {
        let (graph, a_calls, b_calls) = chain_graph();
        let pipeline = graph.build().unwrap();

        // a.text neither bound nor supplied
        let err = pipeline.run(PortMap::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RaglineError::UnboundInput { ref node, ref port } if node == "a" && port == "text"
        ));
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_producer_rejected() {
        let (a, _) = TagComponent::new("a");
        let (b, _) = TagComponent::new("b");
        let (c, _) = TagComponent::new("c");
        let mut graph = PipelineGraph::new();
        graph.add_component("a", a).unwrap();
        graph.add_component("b", b).unwrap();
        graph.add_component("c", c).unwrap();
        graph.connect("a.text", "c.text").unwrap();
        let err = graph.connect("b.text", "c.text").err().unwrap();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_external_input_cannot_shadow_producer() {
        let (graph, ..) = chain_graph();
        let pipeline = graph.build().unwrap();

        let mut inputs = PortMap::new();
        inputs.insert("a.text".to_string(), Value::Text("in".to_string()));
        inputs.insert("b.text".to_string(), Value::Text("shadow".to_string()));
        let err = pipeline.run(inputs).await.unwrap_err();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_duplicate_component_name_rejected() {
        let (a, _) = TagComponent::new("a");
        let (b, _) = TagComponent::new("b");
        let mut graph = PipelineGraph::new();
        graph.add_component("node", a).unwrap();
        let err = graph.add_component("node", b).err().unwrap();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unknown_port_in_connect_rejected() {
        let (a, _) = TagComponent::new("a");
        let (b, _) = TagComponent::new("b");
        let mut graph = PipelineGraph::new();
        graph.add_component("a", a).unwrap();
        graph.add_component("b", b).unwrap();
        let err = graph.connect("a.nope", "b.text").err().unwrap();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
    }

    /// Produces a constant without consuming any input
    struct SourceComponent {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Component for SourceComponent {
        fn input_ports(&self) -> &'static [&'static str] {
            &[]
        }

        fn output_ports(&self) -> &'static [&'static str] {
            &["text"]
        }

        async fn run(&self, _inputs: PortMap) -> Result<PortMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outputs = PortMap::new();
            outputs.insert("text".to_string(), Value::Text("const".to_string()));
            Ok(outputs)
        }
    }

    #[tokio::test]
    async fn test_isolated_node_is_rejected_before_execution() {
        let (graph_nodes, a_calls, b_calls) = chain_graph();
        let mut graph = graph_nodes;
        let idle_calls = Arc::new(AtomicUsize::new(0));
        graph
            .add_component(
                "idle",
                Arc::new(SourceComponent {
                    calls: idle_calls.clone(),
                }),
            )
            .unwrap();
        let pipeline = graph.build().unwrap();

        let mut inputs = PortMap::new();
        inputs.insert("a.text".to_string(), Value::Text("in".to_string()));
        let err = pipeline.run(inputs).await.err().unwrap();
        assert!(matches!(err, RaglineError::InvalidArgument(_)));
        assert!(err.to_string().contains("idle"));
        assert_eq!(idle_calls.load(Ordering::SeqCst), 0);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    /// Always fails; used to verify abort semantics
    struct FailingComponent;

    #[async_trait]
    impl Component for FailingComponent {
        fn input_ports(&self) -> &'static [&'static str] {
            &["text"]
        }

        fn output_ports(&self) -> &'static [&'static str] {
            &["text"]
        }

        async fn run(&self, _inputs: PortMap) -> Result<PortMap> {
            Err(RaglineError::BackendTimeout { seconds: 1 })
        }
    }

    #[tokio::test]
    async fn test_node_failure_names_the_node_and_drops_partials() {
        let (a, _) = TagComponent::new("a");
        let mut graph = PipelineGraph::new();
        graph.add_component("a", a).unwrap();
        graph.add_component("llm", Arc::new(FailingComponent)).unwrap();
        graph.connect("a.text", "llm.text").unwrap();
        let pipeline = graph.build().unwrap();

        let mut inputs = PortMap::new();
        inputs.insert("a.text".to_string(), Value::Text("in".to_string()));
        let err = pipeline.run(inputs).await.unwrap_err();
        match err {
            RaglineError::NodeFailed { node, source } => {
                assert_eq!(node, "llm");
                assert!(matches!(*source, RaglineError::BackendTimeout { .. }));
            }
            other => panic!("expected NodeFailed, got {other:?}"),
        }
    }
}
