//! Third-of-field zone classifier (§3): stamps every player's current
//! left/center/right/outside zone onto [`stores::THIRD_OF_FIELD`] so the
//! kick detector (§4.8) can annotate its `kickEvent` with the zone the
//! possessor kicked from without recomputing field geometry itself. Uses
//! the same x-position thresholds the pass-and-shot classifier applies to
//! kick/receive positions, here applied per tick to every tracked player.

use crate::detectors::stores;
use crate::element::StreamElement;
use crate::error::AnalyticsError;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneClassifierConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
enum Zone {
    Left,
    Center,
    Right,
    Outside,
}

fn classify(x: f64, field_length: f64) -> Zone {
    if x.abs() > field_length / 2.0 {
        Zone::Outside
    } else if x < -field_length / 6.0 {
        Zone::Left
    } else if x > field_length / 6.0 {
        Zone::Right
    } else {
        Zone::Center
    }
}

#[derive(Debug)]
pub struct ZoneClassifier {
    field_length: SingleValueStore,
    third_of_field: SingleValueStore,
}

impl ZoneClassifier {
    pub fn new(_config: ZoneClassifierConfig) -> Self {
        Self {
            field_length: SingleValueStore::new(stores::FIELD_LENGTH),
            third_of_field: SingleValueStore::new(stores::THIRD_OF_FIELD),
        }
    }
}

impl Processor for ZoneClassifier {
    fn name(&self) -> &str {
        "zoneClassifier"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let Some(player) = element.object_ids.first() else {
            return Ok(Vec::new());
        };
        let Some(pos) = element.positions.first() else {
            return Ok(Vec::new());
        };

        let field_length = self.field_length.get_double(backend, &match_id, "all")?;
        let zone = classify(pos.x, field_length).to_string();
        self.third_of_field.put(backend, &match_id, player, zone);
        Ok(Vec::new())
    }
}
