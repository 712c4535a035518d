//! The stream-element model: an immutable, serializable record that is the
//! sole unit of data flowing through the engine. An element's `stream_name`
//! fully determines its payload schema; accessors for payload/header fields
//! go through [`schema::Schema`] rather than ad-hoc field access so that
//! "field not present" is always a typed, recoverable error.

pub mod schema;
pub mod value;

use crate::geometry::Vec3;
use std::collections::HashMap;

pub use schema::{Schema, SchemaValue};
pub use value::Value;

/// Broad partition of a stream's purpose; mirrors §3 of the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamCategory {
    Raw,
    State,
    Event,
    Statistics,
    Internal,
}

/// Phase of a non-atomic (START/ACTIVE/END) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NonAtomicPhase {
    Start,
    Active,
    End,
}

/// Immutable stream element (§3). Construct via [`StreamElement::new`] or
/// [`StreamElement::builder`]; there is no public mutation API — detectors
/// build fresh elements rather than editing one in place.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamElement {
    pub stream_name: String,
    pub stream_category: StreamCategory,
    pub key: String,
    pub generation_timestamp: i64,
    #[serde(default)]
    pub object_ids: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub positions: Vec<Vec3>,
    #[serde(default)]
    pub atomic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<NonAtomicPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<i64>,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
}

impl StreamElement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream_name: impl Into<String>,
        stream_category: StreamCategory,
        key: impl Into<String>,
        generation_timestamp: i64,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            stream_category,
            key: key.into(),
            generation_timestamp,
            object_ids: Vec::new(),
            group_ids: Vec::new(),
            positions: Vec::new(),
            atomic: true,
            phase: None,
            event_id: None,
            counter: None,
            payload: HashMap::new(),
        }
    }

    pub fn with_object_ids(mut self, ids: Vec<String>) -> Self {
        self.object_ids = ids;
        self
    }

    pub fn with_group_ids(mut self, ids: Vec<String>) -> Self {
        self.group_ids = ids;
        self
    }

    pub fn with_positions(mut self, positions: Vec<Vec3>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_payload(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Marks the element as part of a non-atomic episode.
    pub fn with_phase(mut self, phase: NonAtomicPhase, event_id: impl Into<String>, counter: i64) -> Self {
        self.atomic = false;
        self.phase = Some(phase);
        self.event_id = Some(event_id.into());
        self.counter = Some(counter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trips_through_json() {
        let el = StreamElement::new("fieldObjectState", StreamCategory::State, "match-1", 1000)
            .with_object_ids(vec!["p1".into()])
            .with_positions(vec![Vec3::new(1.0, 2.0, 0.0)])
            .with_payload("vAbs", 5.3_f64);

        let json = serde_json::to_string(&el).unwrap();
        let back: StreamElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, el);
    }

    #[test]
    fn non_atomic_builder_sets_phase_fields() {
        let el = StreamElement::new("duelEvent", StreamCategory::Event, "match-1", 10)
            .with_phase(NonAtomicPhase::Start, "evt-7", 1);
        assert!(!el.atomic);
        assert_eq!(el.phase, Some(NonAtomicPhase::Start));
        assert_eq!(el.event_id.as_deref(), Some("evt-7"));
        assert_eq!(el.counter, Some(1));
    }
}
