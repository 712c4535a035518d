//! Area detector (§4.13): axis-aligned rectangle in/out tracking per
//! (object, area). Rectangles are parsed once from a configuration string
//! using the same `{...}%{...}` bracket-and-percent convention as
//! [`crate::rename_map::RenameMap`], since both are flat lists of small
//! records carried in the same property bag.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Area {
    pub fn contains(&self, pos: Vec3) -> bool {
        pos.x >= self.x_min && pos.x <= self.x_max && pos.y >= self.y_min && pos.y <= self.y_max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaSpec {
    pub areas: Vec<(String, Area)>,
}

impl AreaSpec {
    /// Parses `{areaId:xMin:xMax:yMin:yMax}%{...}`; empty string yields no
    /// areas.
    pub fn parse(spec: &str) -> Result<Self, AnalyticsError> {
        let mut areas = Vec::new();
        for entry in spec.split('%') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let malformed = || AnalyticsError::MalformedAreaSpec { entry: entry.to_string() };
            let inner = entry.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')).ok_or_else(malformed)?;
            let parts: Vec<&str> = inner.split(':').collect();
            let [area_id, x_min, x_max, y_min, y_max] = parts.as_slice() else {
                return Err(malformed());
            };
            if area_id.is_empty() {
                return Err(malformed());
            }
            let area = Area {
                x_min: x_min.parse().map_err(|_| malformed())?,
                x_max: x_max.parse().map_err(|_| malformed())?,
                y_min: y_min.parse().map_err(|_| malformed())?,
                y_max: y_max.parse().map_err(|_| malformed())?,
            };
            areas.push((area_id.to_string(), area));
        }
        Ok(Self { areas })
    }
}

#[derive(Debug)]
pub struct AreaDetector {
    spec: AreaSpec,
}

impl AreaDetector {
    pub fn new(spec: AreaSpec) -> Self {
        Self { spec }
    }

    fn flag_store(area_id: &str) -> SingleValueStore {
        SingleValueStore::new(format!("{}{}", stores::AREA_FLAG_PREFIX, area_id))
    }
}

impl Processor for AreaDetector {
    fn name(&self) -> &str {
        "areaDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let Some(object_id) = element.object_ids.first().cloned() else {
            return Ok(Vec::new());
        };
        let Some(pos) = element.positions.first().copied() else {
            return Ok(Vec::new());
        };
        let group_ids = element.group_ids.clone();

        let mut events = Vec::new();
        for (area_id, area) in &self.spec.areas {
            let now_in = area.contains(pos);
            let store = Self::flag_store(area_id);
            let was_in = store.get_boolean(backend, &match_id, &object_id)?;
            if now_in != was_in {
                store.put(backend, &match_id, &object_id, now_in);
                events.push(
                    StreamElement::new("areaEvent", StreamCategory::Event, &match_id, ts)
                        .with_object_ids(vec![object_id.clone()])
                        .with_group_ids(group_ids.clone())
                        .with_positions(vec![pos])
                        .with_payload("areaId", area_id.clone())
                        .with_payload("entered", now_in),
                );
            }
        }
        Ok(events)
    }
}
