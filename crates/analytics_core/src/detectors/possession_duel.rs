//! Ball-possession / duel detector (§4.7).
//!
//! Reads ball velocity/position history and the player roster (positions
//! and teams, kept current by upstream store processors attached to the
//! player field-object-state stream) to decide whether the ball was just
//! hit, who now has possession, and whether a duel is under way.
//!
//! ## Direction-change convention
//! The "angle between the two most recent position-delta vectors" is
//! computed as the angle between the latest movement vector
//! (`positions[0] - positions[1]`) and the movement vector before it
//! (`positions[1] - positions[2]`): a straight-moving ball yields a small
//! angle, a ball that reverses direction yields an angle near π. This is
//! the only reading of the phrase under which the detector fires on an
//! actual reversal rather than on ordinary straight-line motion.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::packing;
use crate::processor::Processor;
use crate::state::{HistoryStore, SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy)]
pub struct PossessionDuelConfig {
    pub max_vabs_for_vabs_diff: f64,
    pub min_vabs_diff: f64,
    pub min_moving_dir_angle_diff: f64,
    pub max_ball_possession_change_dist: f64,
    pub max_duel_dist: f64,
}

impl Default for PossessionDuelConfig {
    fn default() -> Self {
        Self {
            max_vabs_for_vabs_diff: 15.0,
            min_vabs_diff: 10.0,
            min_moving_dir_angle_diff: 1.0,
            max_ball_possession_change_dist: 1.0,
            max_duel_dist: 1.0,
        }
    }
}

#[derive(Debug)]
pub struct PossessionDuelDetector {
    config: PossessionDuelConfig,
    ball_vabs_history: HistoryStore,
    ball_position_history: HistoryStore,
    field_length: SingleValueStore,
    left_team_id: SingleValueStore,
    ball_in_field: SingleValueStore,
    player_position: SingleValueStore,
    player_team: SingleValueStore,
    player_in_possession: SingleValueStore,
    team_in_possession: SingleValueStore,
    duel_active: SingleValueStore,
    duel_defender: SingleValueStore,
    duel_attacker: SingleValueStore,
    duel_event_counter: SingleValueStore,
    duel_phase: SingleValueStore,
    under_pressure_phase: SingleValueStore,
}

impl PossessionDuelDetector {
    pub fn new(config: PossessionDuelConfig) -> Self {
        Self {
            config,
            ball_vabs_history: HistoryStore::new(stores::BALL_VABS_HISTORY, 2),
            ball_position_history: HistoryStore::new(stores::BALL_POSITION_HISTORY, 3),
            field_length: SingleValueStore::new(stores::FIELD_LENGTH),
            left_team_id: SingleValueStore::new(stores::LEFT_TEAM_ID),
            ball_in_field: SingleValueStore::new(stores::BALL_IN_FIELD),
            player_position: SingleValueStore::new(stores::PLAYER_POSITION),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            player_in_possession: SingleValueStore::new(stores::PLAYER_IN_POSSESSION),
            team_in_possession: SingleValueStore::new(stores::TEAM_IN_POSSESSION),
            duel_active: SingleValueStore::new(stores::DUEL_ACTIVE),
            duel_defender: SingleValueStore::new(stores::DUEL_DEFENDER),
            duel_attacker: SingleValueStore::new(stores::DUEL_ATTACKER),
            duel_event_counter: SingleValueStore::new(stores::DUEL_EVENT_COUNTER),
            duel_phase: SingleValueStore::new(stores::DUEL_PHASE),
            under_pressure_phase: SingleValueStore::new(stores::UNDER_PRESSURE_PHASE),
        }
    }

    fn detect_hit(&self, backend: &StateBackend, match_id: &str) -> Result<bool, AnalyticsError> {
        let vabs = self.ball_vabs_history.get_list(backend, match_id, "ball");
        if vabs.len() < 2 {
            return Err(AnalyticsError::InsufficientHistory {
                store: stores::BALL_VABS_HISTORY.to_string(),
                key: "ball".to_string(),
                need: 2,
                have: vabs.len(),
            });
        }
        let v_new = vabs[0].as_f64().unwrap_or(0.0);
        let v_old = vabs[1].as_f64().unwrap_or(0.0);
        if v_new < self.config.max_vabs_for_vabs_diff && (v_old - v_new).abs() > self.config.min_vabs_diff {
            return Ok(true);
        }

        let positions = self.ball_position_history.get_list(backend, match_id, "ball");
        if positions.len() < 3 {
            return Err(AnalyticsError::InsufficientHistory {
                store: stores::BALL_POSITION_HISTORY.to_string(),
                key: "ball".to_string(),
                need: 3,
                have: positions.len(),
            });
        }
        let p0 = positions[0].as_vector().unwrap_or(Vec3::ZERO);
        let p1 = positions[1].as_vector().unwrap_or(Vec3::ZERO);
        let p2 = positions[2].as_vector().unwrap_or(Vec3::ZERO);
        let latest_move = p0.sub(p1);
        let previous_move = p1.sub(p2);
        Ok(latest_move.angle_to(previous_move) > self.config.min_moving_dir_angle_diff)
    }

    fn known_players(&self, backend: &StateBackend, match_id: &str) -> Vec<String> {
        self.player_position.known_inner_keys(backend, match_id)
    }

    fn nearest_player(&self, backend: &StateBackend, match_id: &str, from: Vec3, max_dist: f64, exclude: Option<&str>) -> Option<(String, Vec3, f64)> {
        let mut best: Option<(String, Vec3, f64)> = None;
        for player_id in self.known_players(backend, match_id) {
            if exclude.is_some_and(|ex| ex == player_id) {
                continue;
            }
            let Some(pos) = self.player_position.get(backend, match_id, &player_id).and_then(|v| v.as_vector()) else {
                continue;
            };
            let dist = pos.distance_xy(from);
            if dist > max_dist {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((_, _, best_dist)) => dist < *best_dist,
            };
            if replace {
                best = Some((player_id, pos, dist));
            }
        }
        best
    }

    fn nearest_two_players(&self, backend: &StateBackend, match_id: &str, from: Vec3, max_dist: f64) -> Vec<(String, f64)> {
        let mut candidates: Vec<(String, f64)> = self
            .known_players(backend, match_id)
            .into_iter()
            .filter_map(|id| {
                let pos = self.player_position.get(backend, match_id, &id)?.as_vector()?;
                let dist = pos.distance_xy(from);
                (dist <= max_dist).then_some((id, dist))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(2);
        candidates
    }

    fn packing_for(&self, backend: &StateBackend, match_id: &str, possessor_id: &str, possessor_team: &str, possessor_pos: Vec3) -> i64 {
        let field_length = self.field_length.get_double(backend, match_id, "all").unwrap_or(0.0);
        let left_team = self.left_team_id.get_string(backend, match_id, "all");
        let attacking_right = left_team.as_deref() == Some(possessor_team);
        let goal = packing::goal_position(field_length, attacking_right);
        let opponents: Vec<Vec3> = self
            .known_players(backend, match_id)
            .into_iter()
            .filter(|id| id != possessor_id)
            .filter_map(|id| {
                let team = self.player_team.get_string(backend, match_id, &id)?;
                if team == possessor_team {
                    return None;
                }
                self.player_position.get(backend, match_id, &id).and_then(|v| v.as_vector())
            })
            .collect();
        packing::count_closer_to_goal(goal, possessor_pos, &opponents) as i64
    }

    fn end_duel(&self, backend: &mut StateBackend, match_id: &str, ts: i64, events: &mut Vec<StreamElement>) {
        if self.duel_active.get_boolean(backend, match_id, "all").unwrap_or(false) {
            let counter = self.duel_event_counter.get_long(backend, match_id, "all").unwrap_or(0);
            let defender = self.duel_defender.get_string(backend, match_id, "all").unwrap_or_default();
            let attacker = self.duel_attacker.get_string(backend, match_id, "all").unwrap_or_default();
            self.duel_phase.put(backend, match_id, &defender, "END".to_string());
            events.push(
                StreamElement::new("duelEvent", StreamCategory::Event, match_id, ts)
                    .with_phase(crate::element::NonAtomicPhase::End, format!("duel-{match_id}-{counter}"), counter)
                    .with_payload("defender", defender)
                    .with_payload("attacker", attacker),
            );
            self.duel_active.put(backend, match_id, "all", false);
        }
    }

    /// Whether any opponent of `possessor` stands within `max_duel_dist`
    /// of the possessor's own position — a broader, possessor-centric
    /// reading of "crowded" than [`Self::nearest_two_players`]'s
    /// ball-centric, exactly-two-opponents duel test.
    fn any_opponent_close(&self, backend: &StateBackend, match_id: &str, possessor: &str, possessor_pos: Vec3, possessor_team: &str) -> bool {
        self.known_players(backend, match_id).into_iter().any(|id| {
            if id == possessor {
                return false;
            }
            let Some(pos) = self.player_position.get(backend, match_id, &id).and_then(|v| v.as_vector()) else {
                return false;
            };
            if pos.distance_xy(possessor_pos) > self.config.max_duel_dist {
                return false;
            }
            self.player_team.get_string(backend, match_id, &id).is_some_and(|t| t != possessor_team)
        })
    }

    fn update_pressure(&self, backend: &mut StateBackend, match_id: &str, possessor: &str) {
        let Some(possessor_pos) = self.player_position.get(backend, match_id, possessor).and_then(|v| v.as_vector()) else {
            return;
        };
        let Some(possessor_team) = self.player_team.get_string(backend, match_id, possessor) else {
            return;
        };
        let under_pressure = self.any_opponent_close(backend, match_id, possessor, possessor_pos, &possessor_team);
        let phase = if under_pressure { "ACTIVE" } else { "END" };
        self.under_pressure_phase.put(backend, match_id, possessor, phase.to_string());
    }
}

impl Processor for PossessionDuelDetector {
    fn name(&self) -> &str {
        "possessionDuelDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let mut events = Vec::new();

        if !self.ball_in_field.get_boolean(backend, &match_id, "all")? {
            self.player_in_possession.clear(backend, &match_id, "all");
            self.team_in_possession.clear(backend, &match_id, "all");
            self.end_duel(backend, &match_id, ts, &mut events);
            return Ok(events);
        }

        let ball_pos = element.positions.first().copied().unwrap_or(Vec3::ZERO);
        let hit = self.detect_hit(backend, &match_id)?;

        if hit {
            if let Some((player_id, player_pos, _)) =
                self.nearest_player(backend, &match_id, ball_pos, self.config.max_ball_possession_change_dist, None)
            {
                let currently = self.player_in_possession.get_string(backend, &match_id, "all");
                if currently.as_deref() != Some(player_id.as_str()) {
                    let team = self.player_team.get_string(backend, &match_id, &player_id).unwrap_or_default();
                    let packing_count = self.packing_for(backend, &match_id, &player_id, &team, player_pos);
                    self.player_in_possession.put(backend, &match_id, "all", player_id.clone());
                    self.team_in_possession.put(backend, &match_id, "all", team.clone());
                    events.push(
                        StreamElement::new("ballPossessionChangeEvent", StreamCategory::Event, &match_id, ts)
                            .with_object_ids(vec![player_id.clone()])
                            .with_group_ids(vec![team.clone()])
                            .with_positions(vec![player_pos])
                            .with_payload("player", player_id)
                            .with_payload("team", team)
                            .with_payload("numPlayersNearerToGoal", Value::Long(packing_count)),
                    );
                }
            }
        }

        if let Some(possessor) = self.player_in_possession.get_string(backend, &match_id, "all") {
            self.update_pressure(backend, &match_id, &possessor);
            let active = self.duel_active.get_boolean(backend, &match_id, "all")?;
            let defender_now = self.duel_defender.get_string(backend, &match_id, "all");
            if active && defender_now.as_deref() != Some(possessor.as_str()) {
                self.end_duel(backend, &match_id, ts, &mut events);
            } else {
                let nearest_two = self.nearest_two_players(backend, &match_id, ball_pos, self.config.max_duel_dist);
                let forms_duel = nearest_two.len() == 2
                    && nearest_two.iter().any(|(id, _)| *id == possessor)
                    && {
                        let possessor_team = self.player_team.get_string(backend, &match_id, &possessor);
                        let other = nearest_two.iter().find(|(id, _)| *id != possessor);
                        match (possessor_team, other) {
                            (Some(pt), Some((other_id, _))) => self.player_team.get_string(backend, &match_id, other_id).is_some_and(|ot| ot != pt),
                            _ => false,
                        }
                    };

                if forms_duel {
                    let attacker = nearest_two.iter().find(|(id, _)| *id != possessor).map(|(id, _)| id.clone()).unwrap_or_default();
                    let active_attacker = self.duel_attacker.get_string(backend, &match_id, "all");
                    if !active {
                        let counter = self.duel_event_counter.increase_long(backend, &match_id, "all", 1)?;
                        self.duel_active.put(backend, &match_id, "all", true);
                        self.duel_defender.put(backend, &match_id, "all", possessor.clone());
                        self.duel_attacker.put(backend, &match_id, "all", attacker.clone());
                        self.duel_phase.put(backend, &match_id, &possessor, "START".to_string());
                        events.push(
                            StreamElement::new("duelEvent", StreamCategory::Event, &match_id, ts)
                                .with_phase(crate::element::NonAtomicPhase::Start, format!("duel-{match_id}-{counter}"), counter)
                                .with_payload("defender", possessor)
                                .with_payload("attacker", attacker),
                        );
                    } else if active_attacker.as_deref() == Some(attacker.as_str()) {
                        let counter = self.duel_event_counter.get_long(backend, &match_id, "all")?;
                        self.duel_phase.put(backend, &match_id, &possessor, "ACTIVE".to_string());
                        events.push(
                            StreamElement::new("duelEvent", StreamCategory::Event, &match_id, ts)
                                .with_phase(crate::element::NonAtomicPhase::Active, format!("duel-{match_id}-{counter}"), counter)
                                .with_payload("defender", possessor)
                                .with_payload("attacker", attacker),
                        );
                    } else {
                        self.end_duel(backend, &match_id, ts, &mut events);
                    }
                } else if active {
                    self.end_duel(backend, &match_id, ts, &mut events);
                }
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_player(backend: &mut StateBackend, match_id: &str, id: &str, team: &str, pos: Vec3) {
        SingleValueStore::new(stores::PLAYER_POSITION).put(backend, match_id, id, pos);
        SingleValueStore::new(stores::PLAYER_TEAM).put(backend, match_id, id, team.to_string());
    }

    fn ball_element(match_id: &str, ts: i64, pos: Vec3) -> StreamElement {
        StreamElement::new("fieldObjectState", StreamCategory::State, match_id, ts).with_positions(vec![pos])
    }

    #[test]
    fn s1_ball_hit_by_velocity_change_emits_single_possession_change() {
        let mut backend = StateBackend::new();
        let detector = PossessionDuelDetector::new(PossessionDuelConfig::default());

        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        SingleValueStore::new(stores::FIELD_LENGTH).put(&mut backend, "m1", "all", 100.0_f64);
        SingleValueStore::new(stores::LEFT_TEAM_ID).put(&mut backend, "m1", "all", "A".to_string());

        let vabs_history = HistoryStore::new(stores::BALL_VABS_HISTORY, 2);
        vabs_history.add(&mut backend, "m1", "ball", 25.0);
        vabs_history.add(&mut backend, "m1", "ball", 5.0);

        seed_player(&mut backend, "m1", "P1", "A", Vec3::new(0.8, 0.0, 0.0));

        let element = ball_element("m1", 1000, Vec3::new(0.0, 0.0, 0.0));
        let events = detector.process(&mut backend, &element).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stream_name, "ballPossessionChangeEvent");
        assert_eq!(events[0].generation_timestamp, 1000);
        assert_eq!(events[0].payload.get("player").and_then(Value::as_str), Some("P1"));
    }

    #[test]
    fn s2_ball_hit_by_direction_change_starts_duel() {
        let mut backend = StateBackend::new();
        let detector = PossessionDuelDetector::new(PossessionDuelConfig::default());

        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);

        // Slow enough that the velocity-change branch does not fire.
        let vabs_history = HistoryStore::new(stores::BALL_VABS_HISTORY, 2);
        vabs_history.add(&mut backend, "m1", "ball", 3.0);
        vabs_history.add(&mut backend, "m1", "ball", 3.0);

        // A genuine reversal: moved +x, then bounced straight back.
        let pos_history = HistoryStore::new(stores::BALL_POSITION_HISTORY, 3);
        pos_history.add(&mut backend, "m1", "ball", Vec3::new(-1.0, 0.0, 0.0));
        pos_history.add(&mut backend, "m1", "ball", Vec3::new(0.0, 0.0, 0.0));
        pos_history.add(&mut backend, "m1", "ball", Vec3::new(-1.0, 0.0, 0.0));

        seed_player(&mut backend, "m1", "P1", "A", Vec3::new(0.5, 0.0, 0.0));
        seed_player(&mut backend, "m1", "P2", "B", Vec3::new(0.7, 0.0, 0.0));
        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "P1".to_string());

        let element = ball_element("m1", 500, Vec3::new(0.0, 0.0, 0.0));
        let events = detector.process(&mut backend, &element).unwrap();

        let duel_events: Vec<_> = events.iter().filter(|e| e.stream_name == "duelEvent").collect();
        assert_eq!(duel_events.len(), 1);
        assert_eq!(duel_events[0].phase, Some(crate::element::NonAtomicPhase::Start));
        assert_eq!(duel_events[0].payload.get("defender").and_then(Value::as_str), Some("P1"));

        assert_eq!(SingleValueStore::new(stores::DUEL_PHASE).get_string(&backend, "m1", "P1"), Some("START".to_string()));
        assert_eq!(SingleValueStore::new(stores::UNDER_PRESSURE_PHASE).get_string(&backend, "m1", "P1"), Some("ACTIVE".to_string()));
    }

    #[test]
    fn duel_phase_ends_once_the_duel_ends() {
        let mut backend = StateBackend::new();
        let detector = PossessionDuelDetector::new(PossessionDuelConfig::default());

        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", false);
        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "P1".to_string());
        SingleValueStore::new(stores::DUEL_ACTIVE).put(&mut backend, "m1", "all", true);
        SingleValueStore::new(stores::DUEL_DEFENDER).put(&mut backend, "m1", "all", "P1".to_string());
        SingleValueStore::new(stores::DUEL_ATTACKER).put(&mut backend, "m1", "all", "P2".to_string());
        SingleValueStore::new(stores::DUEL_EVENT_COUNTER).put(&mut backend, "m1", "all", 1_i64);
        SingleValueStore::new(stores::DUEL_PHASE).put(&mut backend, "m1", "P1", "ACTIVE".to_string());

        detector.process(&mut backend, &ball_element("m1", 2000, Vec3::new(60.0, 0.0, 0.0))).unwrap();

        assert_eq!(SingleValueStore::new(stores::DUEL_PHASE).get_string(&backend, "m1", "P1"), Some("END".to_string()));
    }

    #[test]
    fn under_pressure_phase_ends_once_no_opponent_is_close() {
        let mut backend = StateBackend::new();
        let detector = PossessionDuelDetector::new(PossessionDuelConfig::default());

        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        let vabs_history = HistoryStore::new(stores::BALL_VABS_HISTORY, 2);
        vabs_history.add(&mut backend, "m1", "ball", 3.0);
        vabs_history.add(&mut backend, "m1", "ball", 3.0);
        let pos_history = HistoryStore::new(stores::BALL_POSITION_HISTORY, 3);
        pos_history.add(&mut backend, "m1", "ball", Vec3::new(40.0, 0.0, 0.0));
        pos_history.add(&mut backend, "m1", "ball", Vec3::new(40.0, 0.0, 0.0));
        pos_history.add(&mut backend, "m1", "ball", Vec3::new(40.0, 0.0, 0.0));

        seed_player(&mut backend, "m1", "P1", "A", Vec3::new(40.0, 0.0, 0.0));
        seed_player(&mut backend, "m1", "P2", "B", Vec3::new(-40.0, 0.0, 0.0));
        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "P1".to_string());
        SingleValueStore::new(stores::UNDER_PRESSURE_PHASE).put(&mut backend, "m1", "P1", "ACTIVE".to_string());

        detector.process(&mut backend, &ball_element("m1", 500, Vec3::new(40.0, 0.0, 0.0))).unwrap();

        assert_eq!(SingleValueStore::new(stores::UNDER_PRESSURE_PHASE).get_string(&backend, "m1", "P1"), Some("END".to_string()));
    }

    #[test]
    fn ball_off_field_resets_possession_and_ends_active_duel() {
        let mut backend = StateBackend::new();
        let detector = PossessionDuelDetector::new(PossessionDuelConfig::default());

        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", false);
        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "P1".to_string());
        SingleValueStore::new(stores::DUEL_ACTIVE).put(&mut backend, "m1", "all", true);
        SingleValueStore::new(stores::DUEL_DEFENDER).put(&mut backend, "m1", "all", "P1".to_string());
        SingleValueStore::new(stores::DUEL_ATTACKER).put(&mut backend, "m1", "all", "P2".to_string());
        SingleValueStore::new(stores::DUEL_EVENT_COUNTER).put(&mut backend, "m1", "all", 3_i64);

        let element = ball_element("m1", 2000, Vec3::new(60.0, 0.0, 0.0));
        let events = detector.process(&mut backend, &element).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stream_name, "duelEvent");
        assert_eq!(events[0].phase, Some(crate::element::NonAtomicPhase::End));
        assert_eq!(
            SingleValueStore::new(stores::PLAYER_IN_POSSESSION).get(&backend, "m1", "all"),
            None
        );
    }

    #[test]
    fn insufficient_history_is_a_structured_error() {
        let mut backend = StateBackend::new();
        let detector = PossessionDuelDetector::new(PossessionDuelConfig::default());
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        let element = ball_element("m1", 10, Vec3::ZERO);
        assert!(matches!(detector.process(&mut backend, &element), Err(AnalyticsError::InsufficientHistory { .. })));
    }
}
