//! Field-object-state generation (§4.15): turns a raw positional sensor
//! sample into the enriched `fieldObjectState` stream element every other
//! detector consumes. Velocity is derived from the last two recorded
//! samples of the *same* object — kept as a small, private history
//! separate from the duel/kick-specific histories downstream detectors
//! maintain on the emitted stream, since those have their own capacities
//! and are populated by store processors wired after this one in the
//! graph, not by this detector directly.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::rename_map::RenameMapCache;
use crate::state::{HistoryStore, SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy)]
pub struct FieldObjectStateConfig {
    /// Multiplies every raw position component to reach SI meters.
    pub position_scale: f64,
}

impl Default for FieldObjectStateConfig {
    fn default() -> Self {
        Self { position_scale: 1.0 }
    }
}

#[derive(Debug)]
pub struct FieldObjectStateGenerator {
    config: FieldObjectStateConfig,
    rename_maps: RenameMapCache,
    object_rename_raw: SingleValueStore,
    team_rename_raw: SingleValueStore,
    mirrored_x: SingleValueStore,
    mirrored_y: SingleValueStore,
    position_history: HistoryStore,
    timestamp_history: HistoryStore,
}

impl FieldObjectStateGenerator {
    pub fn new(config: FieldObjectStateConfig) -> Self {
        Self {
            config,
            rename_maps: RenameMapCache::new(),
            object_rename_raw: SingleValueStore::new(stores::OBJECT_RENAME_MAP_RAW),
            team_rename_raw: SingleValueStore::new(stores::TEAM_RENAME_MAP_RAW),
            mirrored_x: SingleValueStore::new(stores::MIRRORED_X),
            mirrored_y: SingleValueStore::new(stores::MIRRORED_Y),
            position_history: HistoryStore::new(stores::PLAYER_POSITION_HISTORY, 2),
            timestamp_history: HistoryStore::new(stores::PLAYER_TIMESTAMP_HISTORY, 2),
        }
    }

    fn mirror(backend: &StateBackend, match_id: &str, mirrored_x: &SingleValueStore, mirrored_y: &SingleValueStore, v: Vec3) -> Result<Vec3, AnalyticsError> {
        let mx = mirrored_x.get_boolean(backend, match_id, "all")?;
        let my = mirrored_y.get_boolean(backend, match_id, "all")?;
        Ok(Vec3::new(if mx { -v.x } else { v.x }, if my { -v.y } else { v.y }, v.z))
    }
}

impl Processor for FieldObjectStateGenerator {
    fn name(&self) -> &str {
        "fieldObjectStateGenerator"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let raw_object_id = element.object_ids.first().cloned().ok_or_else(|| AnalyticsError::FieldMissing {
            name: "objectIds[0]".to_string(),
            stream: element.stream_name.clone(),
        })?;
        let raw_group_id = element.group_ids.first().cloned().unwrap_or_default();
        let raw_pos = element.positions.first().copied().ok_or_else(|| AnalyticsError::PositionIndexOutOfBounds { index: 0, len: 0 })?;

        let object_rename = self.rename_maps.get_or_parse(&format!("{match_id}#object"), &self.object_rename_raw.get_string(backend, &match_id, "all").unwrap_or_default())?;
        let team_rename = self.rename_maps.get_or_parse(&format!("{match_id}#team"), &self.team_rename_raw.get_string(backend, &match_id, "all").unwrap_or_default())?;
        let object_id = object_rename.apply(&raw_object_id);
        let group_id = team_rename.apply(&raw_group_id);

        let scaled = raw_pos.scale(self.config.position_scale);
        let position = Self::mirror(backend, &match_id, &self.mirrored_x, &self.mirrored_y, scaled)?;

        let prev_ts = self.timestamp_history.get_latest(backend, &match_id, &object_id).and_then(|v| v.as_i64());
        let prev_pos = self.position_history.get_latest(backend, &match_id, &object_id).and_then(|v| v.as_vector());

        let velocity = match (prev_ts, prev_pos) {
            (Some(prev_ts), Some(prev_pos)) if ts > prev_ts => {
                let dt_s = (ts - prev_ts) as f64 / 1000.0;
                position.sub(prev_pos).scale(1.0 / dt_s)
            }
            // A timestamp regression (replayed test run) resets the "last"
            // marker per §3's tolerance clause rather than producing a
            // nonsensical or negative-duration velocity.
            _ => Vec3::ZERO,
        };
        let v_abs = velocity.norm();

        self.timestamp_history.add(backend, &match_id, &object_id, ts);
        self.position_history.add(backend, &match_id, &object_id, position);

        Ok(vec![StreamElement::new("fieldObjectState", StreamCategory::State, &match_id, ts)
            .with_object_ids(vec![object_id])
            .with_group_ids(vec![group_id])
            .with_positions(vec![position])
            .with_payload("velocity", Value::Vector(velocity))
            .with_payload("vAbs", v_abs)])
    }
}
