//! Team-area + pressing index (§4.16).
//!
//! Both read the same player-position roster the other detectors share;
//! neither emits on every tick — the team-area detector only when its
//! area measurably changed, and the pressing-index detector never (it is
//! a pure state accumulator consumed by statistics emitters elsewhere).

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::{convex_hull_area, Vec3};
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

const AREA_CHANGE_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default)]
pub struct TeamAreaConfig;

#[derive(Debug)]
pub struct TeamAreaDetector {
    player_position: SingleValueStore,
    player_team: SingleValueStore,
    bounding_box: SingleValueStore,
    convex_hull: SingleValueStore,
}

fn bounding_box_area(positions: &[Vec3]) -> f64 {
    if positions.is_empty() {
        return 0.0;
    }
    let (mut x_min, mut x_max, mut y_min, mut y_max) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for p in positions {
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_min = y_min.min(p.y);
        y_max = y_max.max(p.y);
    }
    (x_max - x_min) * (y_max - y_min)
}

impl TeamAreaDetector {
    pub fn new(_config: TeamAreaConfig) -> Self {
        Self {
            player_position: SingleValueStore::new(stores::PLAYER_POSITION),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            bounding_box: SingleValueStore::new(stores::TEAM_AREA_BOUNDING_BOX),
            convex_hull: SingleValueStore::new(stores::TEAM_AREA_CONVEX_HULL),
        }
    }

    fn teammates(&self, backend: &StateBackend, match_id: &str, team: &str) -> Vec<Vec3> {
        self.player_position
            .known_inner_keys(backend, match_id)
            .into_iter()
            .filter_map(|id| {
                if self.player_team.get_string(backend, match_id, &id)?.as_str() != team {
                    return None;
                }
                self.player_position.get(backend, match_id, &id)?.as_vector()
            })
            .collect()
    }
}

impl Processor for TeamAreaDetector {
    fn name(&self) -> &str {
        "teamAreaDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let Some(player) = element.object_ids.first().cloned() else {
            return Ok(Vec::new());
        };
        let Some(team) = self.player_team.get_string(backend, &match_id, &player) else {
            return Ok(Vec::new());
        };

        let positions = self.teammates(backend, &match_id, &team);
        let bbox_area = bounding_box_area(&positions);
        let hull_points: Vec<(f64, f64)> = positions.iter().map(|p| (p.x, p.y)).collect();
        let hull_area = convex_hull_area(&hull_points);

        let prev_bbox = self.bounding_box.get_double(backend, &match_id, &team)?;
        let prev_hull = self.convex_hull.get_double(backend, &match_id, &team)?;

        if (bbox_area - prev_bbox).abs() <= AREA_CHANGE_EPSILON && (hull_area - prev_hull).abs() <= AREA_CHANGE_EPSILON {
            return Ok(Vec::new());
        }

        self.bounding_box.put(backend, &match_id, &team, bbox_area);
        self.convex_hull.put(backend, &match_id, &team, hull_area);

        Ok(vec![StreamElement::new("teamAreaState", StreamCategory::State, &match_id, ts)
            .with_group_ids(vec![team])
            .with_payload("boundingBoxArea", bbox_area)
            .with_payload("convexHullArea", hull_area)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PressingIndexConfig;

#[derive(Debug)]
pub struct PressingIndexDetector {
    player_position: SingleValueStore,
    player_velocity: SingleValueStore,
    player_team: SingleValueStore,
    team_in_possession: SingleValueStore,
    pressing_index: SingleValueStore,
}

impl PressingIndexDetector {
    pub fn new(_config: PressingIndexConfig) -> Self {
        Self {
            player_position: SingleValueStore::new(stores::PLAYER_POSITION),
            player_velocity: SingleValueStore::new(stores::PLAYER_VELOCITY),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            team_in_possession: SingleValueStore::new(stores::TEAM_IN_POSSESSION),
            pressing_index: SingleValueStore::new(stores::PRESSING_INDEX),
        }
    }
}

impl Processor for PressingIndexDetector {
    fn name(&self) -> &str {
        "pressingIndexDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let Some(ball_pos) = element.positions.first().copied() else {
            return Ok(Vec::new());
        };
        let ball_velocity = element.payload.get("velocity").and_then(Value::as_vector).unwrap_or(Vec3::ZERO);

        let possession_team = self.team_in_possession.get_string(backend, &match_id, "all").unwrap_or_default();
        if possession_team.is_empty() {
            return Ok(Vec::new());
        }

        let mut total = 0.0;
        for player_id in self.player_position.known_inner_keys(backend, &match_id) {
            let Some(team) = self.player_team.get_string(backend, &match_id, &player_id) else {
                continue;
            };
            if team == possession_team {
                continue;
            }
            let Some(player_pos) = self.player_position.get(backend, &match_id, &player_id).and_then(|v| v.as_vector()) else {
                continue;
            };
            let player_velocity = self.player_velocity.get(backend, &match_id, &player_id).and_then(|v| v.as_vector()).unwrap_or(Vec3::ZERO);

            let distance = ball_pos.distance_xy(player_pos);
            let player_pressing = if distance > 0.0 {
                let ball_to_player = player_pos.sub(ball_pos);
                let player_to_ball = ball_pos.sub(player_pos);
                let vb = ball_velocity.project_onto(ball_to_player);
                let vp = player_velocity.project_onto(player_to_ball);
                ((vp + vb) / distance).max(0.0)
            } else {
                0.0
            };
            total += player_pressing;
        }

        self.pressing_index.put(backend, &match_id, &possession_team, total);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_player(backend: &mut StateBackend, match_id: &str, id: &str, team: &str, pos: Vec3) {
        SingleValueStore::new(stores::PLAYER_POSITION).put(backend, match_id, id, pos);
        SingleValueStore::new(stores::PLAYER_TEAM).put(backend, match_id, id, team.to_string());
    }

    fn player_sample(match_id: &str, ts: i64, player: &str) -> StreamElement {
        StreamElement::new("fieldObjectState", StreamCategory::State, match_id, ts).with_object_ids(vec![player.to_string()])
    }

    #[test]
    fn bounding_box_area_of_a_rectangle() {
        let positions = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 5.0, 0.0), Vec3::new(0.0, 5.0, 0.0)];
        assert_eq!(bounding_box_area(&positions), 50.0);
    }

    #[test]
    fn emits_team_area_state_only_on_meaningful_change() {
        let mut backend = StateBackend::new();
        let detector = TeamAreaDetector::new(TeamAreaConfig);
        seed_player(&mut backend, "m1", "A1", "A", Vec3::new(0.0, 0.0, 0.0));
        seed_player(&mut backend, "m1", "A2", "A", Vec3::new(10.0, 10.0, 0.0));

        let first = detector.process(&mut backend, &player_sample("m1", 0, "A1")).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].payload.get("boundingBoxArea").and_then(Value::as_f64), Some(100.0));

        let unchanged = detector.process(&mut backend, &player_sample("m1", 100, "A1")).unwrap();
        assert!(unchanged.is_empty());

        SingleValueStore::new(stores::PLAYER_POSITION).put(&mut backend, "m1", "A2", Vec3::new(20.0, 20.0, 0.0));
        let changed = detector.process(&mut backend, &player_sample("m1", 200, "A1")).unwrap();
        assert_eq!(changed.len(), 1);
    }

    #[test]
    fn pressing_index_accumulates_over_defenders_and_is_never_negative() {
        let mut backend = StateBackend::new();
        let detector = PressingIndexDetector::new(PressingIndexConfig);

        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "A".to_string());
        seed_player(&mut backend, "m1", "B1", "B", Vec3::new(5.0, 0.0, 0.0));
        SingleValueStore::new(stores::PLAYER_VELOCITY).put(&mut backend, "m1", "B1", Vec3::new(-3.0, 0.0, 0.0));
        seed_player(&mut backend, "m1", "A1", "A", Vec3::new(0.0, 0.0, 0.0));

        let ball = StreamElement::new("fieldObjectState", StreamCategory::State, "m1", 0)
            .with_positions(vec![Vec3::new(0.0, 0.0, 0.0)])
            .with_payload("velocity", Value::Vector(Vec3::ZERO));
        detector.process(&mut backend, &ball).unwrap();

        let index = SingleValueStore::new(stores::PRESSING_INDEX).get_double(&backend, "m1", "A").unwrap();
        assert!(index >= 0.0);
        assert!(index > 0.0);
    }
}
