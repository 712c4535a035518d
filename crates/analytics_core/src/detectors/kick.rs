//! Kick detector (§4.8): flags an active kick once the ball has separated
//! far enough from the player in possession, and records a `kickEvent`
//! that the pass-and-shot classifier (§4.9) later consumes exactly once.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::packing;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy)]
pub struct KickConfig {
    pub min_kick_dist: f64,
    pub max_ballback_dist: f64,
}

impl Default for KickConfig {
    fn default() -> Self {
        Self { min_kick_dist: 2.0, max_ballback_dist: 1.0 }
    }
}

#[derive(Debug)]
pub struct KickDetector {
    config: KickConfig,
    field_length: SingleValueStore,
    left_team_id: SingleValueStore,
    player_in_possession: SingleValueStore,
    team_in_possession: SingleValueStore,
    player_position: SingleValueStore,
    player_team: SingleValueStore,
    third_of_field: SingleValueStore,
    duel_phase: SingleValueStore,
    under_pressure_phase: SingleValueStore,
    active_kick: SingleValueStore,
    last_kick_event_ts: SingleValueStore,
    last_kick_event_player: SingleValueStore,
    last_kick_event_team: SingleValueStore,
    last_kick_event_pos: SingleValueStore,
    last_kick_event_packing: SingleValueStore,
    last_kick_event_attacked: SingleValueStore,
}

fn phase_active(store: &SingleValueStore, backend: &StateBackend, match_id: &str, key: &str) -> bool {
    match store.get_string(backend, match_id, key) {
        None => false,
        Some(phase) => phase != "END",
    }
}

impl KickDetector {
    pub fn new(config: KickConfig) -> Self {
        Self {
            config,
            field_length: SingleValueStore::new(stores::FIELD_LENGTH),
            left_team_id: SingleValueStore::new(stores::LEFT_TEAM_ID),
            player_in_possession: SingleValueStore::new(stores::PLAYER_IN_POSSESSION),
            team_in_possession: SingleValueStore::new(stores::TEAM_IN_POSSESSION),
            player_position: SingleValueStore::new(stores::PLAYER_POSITION),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            third_of_field: SingleValueStore::new(stores::THIRD_OF_FIELD),
            duel_phase: SingleValueStore::new(stores::DUEL_PHASE),
            under_pressure_phase: SingleValueStore::new(stores::UNDER_PRESSURE_PHASE),
            active_kick: SingleValueStore::new(stores::ACTIVE_KICK),
            last_kick_event_ts: SingleValueStore::new(stores::LAST_KICK_EVENT_TS),
            last_kick_event_player: SingleValueStore::new(stores::LAST_KICK_EVENT_PLAYER),
            last_kick_event_team: SingleValueStore::new(stores::LAST_KICK_EVENT_TEAM),
            last_kick_event_pos: SingleValueStore::new(stores::LAST_KICK_EVENT_POS),
            last_kick_event_packing: SingleValueStore::new(stores::LAST_KICK_EVENT_PACKING),
            last_kick_event_attacked: SingleValueStore::new(stores::LAST_KICK_EVENT_ATTACKED),
        }
    }
}

impl Processor for KickDetector {
    fn name(&self) -> &str {
        "kickDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let ball_pos = element.positions.first().copied().unwrap_or(Vec3::ZERO);

        let Some(possessor) = self.player_in_possession.get_string(backend, &match_id, "all") else {
            return Ok(Vec::new());
        };
        let Some(possessor_pos) = self.player_position.get(backend, &match_id, &possessor).and_then(|v| v.as_vector()) else {
            return Ok(Vec::new());
        };

        let dist = possessor_pos.distance_xy(ball_pos);
        let active = self.active_kick.get_boolean(backend, &match_id, "all")?;

        let mut events = Vec::new();
        if dist > self.config.min_kick_dist && !active {
            let team = self.team_in_possession.get_string(backend, &match_id, "all").unwrap_or_default();
            let field_length = self.field_length.get_double(backend, &match_id, "all")?;
            let left_team = self.left_team_id.get_string(backend, &match_id, "all");
            let attacking_right = left_team.as_deref() == Some(team.as_str());
            let goal = packing::goal_position(field_length, attacking_right);
            let opponents: Vec<Vec3> = self
                .player_position
                .known_inner_keys(backend, &match_id)
                .into_iter()
                .filter(|id| *id != possessor)
                .filter_map(|id| {
                    let opp_team = self.player_team.get_string(backend, &match_id, &id)?;
                    if opp_team == team {
                        return None;
                    }
                    self.player_position.get(backend, &match_id, &id).and_then(|v| v.as_vector())
                })
                .collect();
            let num_nearer = packing::count_closer_to_goal(goal, possessor_pos, &opponents) as i64;

            let zone = self.third_of_field.get_string(backend, &match_id, &possessor).unwrap_or_else(|| "outside".to_string());
            let attacked = phase_active(&self.duel_phase, backend, &match_id, &possessor) || phase_active(&self.under_pressure_phase, backend, &match_id, &possessor);

            self.active_kick.put(backend, &match_id, "all", true);
            self.last_kick_event_ts.put(backend, &match_id, "all", ts);
            self.last_kick_event_player.put(backend, &match_id, "all", possessor.clone());
            self.last_kick_event_team.put(backend, &match_id, "all", team.clone());
            self.last_kick_event_pos.put(backend, &match_id, "all", possessor_pos);
            self.last_kick_event_packing.put(backend, &match_id, "all", num_nearer);
            self.last_kick_event_attacked.put(backend, &match_id, "all", attacked);

            events.push(
                StreamElement::new("kickEvent", StreamCategory::Event, &match_id, ts)
                    .with_object_ids(vec![possessor.clone()])
                    .with_group_ids(vec![team])
                    .with_positions(vec![possessor_pos])
                    .with_payload("player", possessor)
                    .with_payload("numPlayersNearerToGoal", Value::Long(num_nearer))
                    .with_payload("attacked", attacked)
                    .with_payload("zone", zone),
            );
        } else if dist < self.config.max_ballback_dist {
            self.active_kick.put(backend, &match_id, "all", false);
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_element(match_id: &str, ts: i64, pos: Vec3) -> StreamElement {
        StreamElement::new("fieldObjectState", StreamCategory::State, match_id, ts).with_positions(vec![pos])
    }

    #[test]
    fn emits_kick_event_once_ball_separates_from_possessor() {
        let mut backend = StateBackend::new();
        let detector = KickDetector::new(KickConfig::default());

        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "A1".to_string());
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "A".to_string());
        SingleValueStore::new(stores::PLAYER_POSITION).put(&mut backend, "m1", "A1", Vec3::new(0.0, 0.0, 0.0));
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "A1", "A".to_string());
        SingleValueStore::new(stores::FIELD_LENGTH).put(&mut backend, "m1", "all", 100.0_f64);
        SingleValueStore::new(stores::LEFT_TEAM_ID).put(&mut backend, "m1", "all", "A".to_string());

        let element = ball_element("m1", 800, Vec3::new(5.0, 0.0, 0.0));
        let events = detector.process(&mut backend, &element).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stream_name, "kickEvent");
        assert_eq!(events[0].payload.get("player").and_then(Value::as_str), Some("A1"));
        assert!(SingleValueStore::new(stores::ACTIVE_KICK).get_boolean(&backend, "m1", "all").unwrap());
    }

    #[test]
    fn does_not_re_emit_while_kick_remains_active() {
        let mut backend = StateBackend::new();
        let detector = KickDetector::new(KickConfig::default());

        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "A1".to_string());
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "A".to_string());
        SingleValueStore::new(stores::PLAYER_POSITION).put(&mut backend, "m1", "A1", Vec3::new(0.0, 0.0, 0.0));
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "A1", "A".to_string());
        SingleValueStore::new(stores::ACTIVE_KICK).put(&mut backend, "m1", "all", true);

        let element = ball_element("m1", 800, Vec3::new(5.0, 0.0, 0.0));
        let events = detector.process(&mut backend, &element).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn clears_active_flag_once_ball_returns_close() {
        let mut backend = StateBackend::new();
        let detector = KickDetector::new(KickConfig::default());

        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "A1".to_string());
        SingleValueStore::new(stores::PLAYER_POSITION).put(&mut backend, "m1", "A1", Vec3::new(0.0, 0.0, 0.0));
        SingleValueStore::new(stores::ACTIVE_KICK).put(&mut backend, "m1", "all", true);

        let element = ball_element("m1", 900, Vec3::new(0.2, 0.0, 0.0));
        detector.process(&mut backend, &element).unwrap();
        assert!(!SingleValueStore::new(stores::ACTIVE_KICK).get_boolean(&backend, "m1", "all").unwrap());
    }
}
