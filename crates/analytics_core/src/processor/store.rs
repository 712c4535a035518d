//! StoreModule (§4.4): writes a configured set of single-value and history
//! entries derived from the current element, then either re-emits it
//! (`forward=true`, the default) or swallows it. All schema applications
//! are evaluated before any write lands, so a schema-apply error drops the
//! element with no partial write — consistent with §7's "never partially
//! commits a derivation" policy.

use super::Processor;
use crate::element::{NonAtomicPhase, Schema, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::state::{HistoryStore, SingleValueStore, StateBackend};

pub struct SingleValueWrite {
    pub inner_key_schema: Schema,
    pub value_schema: Schema,
    pub store: SingleValueStore,
}

pub struct HistoryWrite {
    pub inner_key_schema: Schema,
    pub value_schema: Schema,
    pub store: HistoryStore,
}

pub struct StoreModule {
    name: String,
    single_value_writes: Vec<SingleValueWrite>,
    history_writes: Vec<HistoryWrite>,
    forward: bool,
}

impl std::fmt::Debug for StoreModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreModule")
            .field("name", &self.name)
            .field("single_value_writes", &self.single_value_writes.len())
            .field("history_writes", &self.history_writes.len())
            .field("forward", &self.forward)
            .finish()
    }
}

impl StoreModule {
    pub fn new(name: impl Into<String>, single_value_writes: Vec<SingleValueWrite>, history_writes: Vec<HistoryWrite>) -> Self {
        Self { name: name.into(), single_value_writes, history_writes, forward: true }
    }

    pub fn with_forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }
}

fn schema_value_to_value(value: crate::element::SchemaValue) -> Value {
    use crate::element::SchemaValue;
    match value {
        SchemaValue::Str(s) => Value::Str(s),
        SchemaValue::Scalar(v) => v,
        SchemaValue::Long(l) => Value::Long(l),
        SchemaValue::Vector(v) => Value::Vector(v),
        SchemaValue::Phase(phase) => Value::Str(
            match phase {
                NonAtomicPhase::Start => "START",
                NonAtomicPhase::Active => "ACTIVE",
                NonAtomicPhase::End => "END",
            }
            .to_string(),
        ),
    }
}

impl Processor for StoreModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();

        let mut pending_single = Vec::with_capacity(self.single_value_writes.len());
        for write in &self.single_value_writes {
            let inner_key = write.inner_key_schema.apply(element)?.render();
            let value = schema_value_to_value(write.value_schema.apply(element)?);
            pending_single.push((write, inner_key, value));
        }

        let mut pending_history = Vec::with_capacity(self.history_writes.len());
        for write in &self.history_writes {
            let inner_key = write.inner_key_schema.apply(element)?.render();
            let value = schema_value_to_value(write.value_schema.apply(element)?);
            pending_history.push((write, inner_key, value));
        }

        for (write, inner_key, value) in pending_single {
            write.store.put(backend, &match_id, &inner_key, value);
        }
        for (write, inner_key, value) in pending_history {
            write.store.add(backend, &match_id, &inner_key, value);
        }

        if self.forward {
            Ok(vec![element.clone()])
        } else {
            Ok(Vec::new())
        }
    }
}
