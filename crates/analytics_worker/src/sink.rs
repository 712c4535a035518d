//! Output sink (A.7): a leaf `Processor` attached wherever a detector's
//! output is meant to reach the worker's stdout stream, following the same
//! `RecordingSink`/handle-wrapper shape
//! `analytics_core::processor::graph`'s own tests use to observe a graph's
//! output, since `SingleElementProcessorGraph::process` itself returns
//! nothing — only a leaf processor captures what flows through it.

use analytics_core::element::StreamElement;
use analytics_core::error::AnalyticsError;
use analytics_core::processor::Processor;
use analytics_core::state::StateBackend;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Buffer {
    elements: Mutex<Vec<StreamElement>>,
}

/// Cheaply cloneable handle shared across every leaf position in the
/// graph where a detector's output should be captured; all clones append
/// to the same underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    buffer: Arc<Buffer>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains every element captured since the last drain, oldest first.
    pub fn drain(&self) -> Vec<StreamElement> {
        std::mem::take(&mut *self.buffer.elements.lock().expect("output sink mutex poisoned"))
    }
}

impl Processor for OutputSink {
    fn name(&self) -> &str {
        "outputSink"
    }

    fn process(&self, _backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        self.buffer.elements.lock().expect("output sink mutex poisoned").push(element.clone());
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::element::StreamCategory;

    #[test]
    fn captures_elements_across_clones_and_drains_once() {
        let sink = OutputSink::new();
        let other_handle = sink.clone();
        let mut backend = StateBackend::new();

        sink.process(&mut backend, &StreamElement::new("a", StreamCategory::Event, "m1", 0)).unwrap();
        other_handle.process(&mut backend, &StreamElement::new("b", StreamCategory::Event, "m1", 1)).unwrap();

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].stream_name, "a");
        assert_eq!(drained[1].stream_name, "b");
        assert!(sink.drain().is_empty());
    }
}
