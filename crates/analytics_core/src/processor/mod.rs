//! Processor-graph model (§4.3–§4.6). Processors are a trait with a single
//! `process` method rather than an interface hierarchy, per the design
//! note against modeling this as inheritance; filters, stores, and
//! detectors all implement it.

pub mod filter;
pub mod graph;
pub mod store;

pub use filter::{Combinator, FilterModule, Predicate};
pub use graph::{GraphNode, SingleElementProcessorGraph, WindowProcessorGraph};
pub use store::{HistoryWrite, SingleValueWrite, StoreModule};

use crate::element::StreamElement;
use crate::error::AnalyticsError;
use crate::state::StateBackend;

/// A node invoked with an input element, producing zero or more output
/// elements. Errors are element-level: the graph logs and drops, it never
/// propagates a processor error past its own boundary.
pub trait Processor: std::fmt::Debug {
    fn name(&self) -> &str;
    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError>;
}

/// A graph root with no input element, invoked by the worker's periodic
/// tick (§4.6).
pub trait WindowProcessor: std::fmt::Debug {
    fn name(&self) -> &str;
    fn window(&self, backend: &mut StateBackend, match_id: &str, timestamp: i64) -> Result<Vec<StreamElement>, AnalyticsError>;
}
