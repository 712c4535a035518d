//! SingleElementProcessorGraph and WindowProcessorGraph (§4.5, §4.6):
//! rooted DAGs of processors traversed depth-first. A builder names each
//! node so the ASCII visualization is a debug aid over the typed graph
//! rather than a string-concatenation side effect of construction.

use super::{Processor, WindowProcessor};
use crate::element::StreamElement;
use crate::state::StateBackend;

/// One node of a [`SingleElementProcessorGraph`]: a processor plus its
/// children, visited in order after every output the processor produces.
pub struct GraphNode {
    processor: Box<dyn Processor>,
    children: Vec<GraphNode>,
}

impl GraphNode {
    pub fn new(processor: impl Processor + 'static) -> Self {
        Self { processor: Box::new(processor), children: Vec::new() }
    }

    pub fn with_child(mut self, child: GraphNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<GraphNode>) -> Self {
        self.children.extend(children);
        self
    }
}

fn process_node(node: &GraphNode, backend: &mut StateBackend, element: &StreamElement) {
    match node.processor.process(backend, element) {
        Ok(outputs) => {
            for output in &outputs {
                for child in &node.children {
                    process_node(child, backend, output);
                }
            }
        }
        Err(error) => {
            tracing::warn!(
                processor = node.processor.name(),
                stream = %element.stream_name,
                key = %element.key,
                %error,
                "processor failed; dropping element"
            );
        }
    }
}

fn describe_node(node: &GraphNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(node.processor.name());
    out.push('\n');
    for child in &node.children {
        describe_node(child, depth + 1, out);
    }
}

/// A rooted DAG of processors, one root per input-stream filter. `process`
/// recurses depth-first: every output of a node is handed to every child
/// in order before the next output is considered.
pub struct SingleElementProcessorGraph {
    roots: Vec<GraphNode>,
}

impl SingleElementProcessorGraph {
    pub fn new(roots: Vec<GraphNode>) -> Self {
        Self { roots }
    }

    pub fn process(&self, backend: &mut StateBackend, element: &StreamElement) {
        for root in &self.roots {
            process_node(root, backend, element);
        }
    }

    /// ASCII rendering of the graph shape, for operator debugging.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            describe_node(root, 0, &mut out);
        }
        out
    }
}

/// A window-graph root: a processor with no input element, invoked by the
/// worker's periodic tick, whose outputs traverse an ordinary
/// single-element subgraph.
pub struct WindowGraphRoot {
    processor: Box<dyn WindowProcessor>,
    children: Vec<GraphNode>,
}

impl WindowGraphRoot {
    pub fn new(processor: impl WindowProcessor + 'static) -> Self {
        Self { processor: Box::new(processor), children: Vec::new() }
    }

    pub fn with_child(mut self, child: GraphNode) -> Self {
        self.children.push(child);
        self
    }
}

pub struct WindowProcessorGraph {
    roots: Vec<WindowGraphRoot>,
}

impl WindowProcessorGraph {
    pub fn new(roots: Vec<WindowGraphRoot>) -> Self {
        Self { roots }
    }

    pub fn tick(&self, backend: &mut StateBackend, match_id: &str, timestamp: i64) {
        for root in &self.roots {
            match root.processor.window(backend, match_id, timestamp) {
                Ok(outputs) => {
                    for output in &outputs {
                        for child in &root.children {
                            process_node(child, backend, output);
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(processor = root.processor.name(), match_id, %error, "window processor failed");
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            out.push_str(root.processor.name());
            out.push('\n');
            for child in &root.children {
                describe_node(child, 1, &mut out);
            }
        }
        out
    }
}
