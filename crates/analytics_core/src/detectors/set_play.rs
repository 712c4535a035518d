//! Set-play detector (§2, glossary): corner kick / goal kick / throw-in /
//! free kick / penalty, "detected from ball-area transitions plus ball
//! quiescence" as the glossary puts it without pinning down an exact
//! algorithm. Two independent sources feed one classifier, mirroring
//! [`crate::detectors::pass_shot::PassShotClassifier`]'s "self-filter on
//! `stream_name`, instantiate twice in the graph" shape:
//!
//!   * `areaEvent` entries into a configured out-of-bounds line
//!     (`...Byline`/`...Sideline` area ids) classify a corner kick, goal
//!     kick, or throw-in immediately from which team last touched the
//!     ball (`teamInPossession`) and which line was crossed. The same
//!     entries double as the only place that maintains `ballInField` and
//!     breaks both teams' pass chains the moment the ball leaves play.
//!   * the ball's own `fieldObjectState` ticks feed a quiescence tracker:
//!     a dwell of `minQuiescenceDurationMs` below
//!     `quiescenceVabsThreshold`, followed by the ball speeding back up,
//!     is read as a dead-ball restart; the restart position decides
//!     penalty vs. free kick. A restart within `kickoffSuppressMs` of the
//!     last kickoff is assumed to be that kickoff's own initial touch, not
//!     a stoppage, and is suppressed.

use crate::detectors::stores;
use crate::detectors::area::AreaSpec;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

#[derive(Debug, Clone)]
pub struct SetPlayConfig {
    pub quiescence_vabs_threshold: f64,
    pub min_quiescence_duration_ms: i64,
    pub kickoff_suppress_ms: i64,
    pub penalty_areas: AreaSpec,
}

impl Default for SetPlayConfig {
    fn default() -> Self {
        Self {
            quiescence_vabs_threshold: 0.3,
            min_quiescence_duration_ms: 1_500,
            kickoff_suppress_ms: 2_000,
            penalty_areas: AreaSpec { areas: Vec::new() },
        }
    }
}

#[derive(Debug)]
pub struct SetPlayDetector {
    config: SetPlayConfig,
    left_team_id: SingleValueStore,
    player_team: SingleValueStore,
    team_in_possession: SingleValueStore,
    last_kickoff_ts: SingleValueStore,
    ball_in_field: SingleValueStore,
    quiescent_since: SingleValueStore,
    last_set_play_ts: SingleValueStore,
    pass_chain_break_ts: SingleValueStore,
}

impl SetPlayDetector {
    pub fn new(config: SetPlayConfig) -> Self {
        Self {
            config,
            left_team_id: SingleValueStore::new(stores::LEFT_TEAM_ID),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            team_in_possession: SingleValueStore::new(stores::TEAM_IN_POSSESSION),
            last_kickoff_ts: SingleValueStore::new(stores::LAST_KICKOFF_TS),
            ball_in_field: SingleValueStore::new(stores::BALL_IN_FIELD),
            quiescent_since: SingleValueStore::new(stores::SET_PLAY_QUIESCENT_SINCE),
            last_set_play_ts: SingleValueStore::new(stores::SET_PLAY_LAST_TS),
            pass_chain_break_ts: SingleValueStore::new(stores::PASS_CHAIN_BREAK_TS),
        }
    }

    fn other_team(&self, backend: &StateBackend, match_id: &str, team: &str) -> Option<String> {
        self.player_team
            .known_inner_keys(backend, match_id)
            .into_iter()
            .filter_map(|id| self.player_team.get_string(backend, match_id, &id))
            .find(|t| t != team)
    }

    fn emit(&self, backend: &mut StateBackend, match_id: &str, ts: i64, kind: &str, team: Option<String>, pos: Vec3) -> StreamElement {
        self.last_set_play_ts.put(backend, match_id, "all", ts);
        let mut element = StreamElement::new("setPlayEvent", StreamCategory::Event, match_id, ts)
            .with_positions(vec![pos])
            .with_payload("type", kind);
        if let Some(team) = team {
            element = element.with_group_ids(vec![team.clone()]).with_payload("team", team);
        }
        element
    }

    fn classify_boundary(&self, backend: &mut StateBackend, match_id: &str, ts: i64, area_id: &str, pos: Vec3) -> Option<StreamElement> {
        let left_team = self.left_team_id.get_string(backend, match_id, "all")?;
        let last_touch_team = self.team_in_possession.get_string(backend, match_id, "all")?;
        let other_team = self.other_team(backend, match_id, &left_team)?;

        if area_id.ends_with("Byline") {
            let defending_team = if area_id.starts_with("left") { left_team.clone() } else { other_team.clone() };
            let attacking_team = if defending_team == left_team { other_team } else { left_team };
            if last_touch_team == defending_team {
                Some(self.emit(backend, match_id, ts, "cornerKick", Some(attacking_team), pos))
            } else {
                Some(self.emit(backend, match_id, ts, "goalKick", Some(defending_team), pos))
            }
        } else if area_id.ends_with("Sideline") {
            let awarded = if last_touch_team == left_team { other_team } else { left_team };
            Some(self.emit(backend, match_id, ts, "throwIn", Some(awarded), pos))
        } else {
            None
        }
    }

    /// Out-of-bounds byline/sideline areas double as the field boundary:
    /// entering one means the ball has left the field, leaving one means
    /// it is back in play. Keeps `ballInField` live for
    /// [`crate::detectors::possession_duel::PossessionDuelDetector`]'s
    /// and this detector's own quiescence-tracking reset branches, and
    /// breaks both teams' pass chains on the moment the ball goes out.
    fn track_boundary(&self, backend: &mut StateBackend, match_id: &str, ts: i64, area_id: &str, entered: bool) {
        if !(area_id.ends_with("Byline") || area_id.ends_with("Sideline")) {
            return;
        }
        self.ball_in_field.put(backend, match_id, "all", !entered);
        if !entered {
            return;
        }
        if let Some(left_team) = self.left_team_id.get_string(backend, match_id, "all") {
            self.pass_chain_break_ts.put(backend, match_id, &left_team, ts);
            if let Some(other_team) = self.other_team(backend, match_id, &left_team) {
                self.pass_chain_break_ts.put(backend, match_id, &other_team, ts);
            }
        }
    }

    fn track_quiescence(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Option<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;

        if !self.ball_in_field.get_boolean(backend, &match_id, "all")? {
            self.quiescent_since.put(backend, &match_id, "all", 0_i64);
            return Ok(None);
        }

        let v_abs = element.payload.get("vAbs").and_then(Value::as_f64).unwrap_or(0.0);
        let quiescent_since = self.quiescent_since.get_long(backend, &match_id, "all")?;

        if v_abs < self.config.quiescence_vabs_threshold {
            if quiescent_since == 0 {
                self.quiescent_since.put(backend, &match_id, "all", ts);
            }
            return Ok(None);
        }

        if quiescent_since == 0 {
            return Ok(None);
        }
        self.quiescent_since.put(backend, &match_id, "all", 0_i64);

        let dwell = ts - quiescent_since;
        if dwell < self.config.min_quiescence_duration_ms {
            return Ok(None);
        }

        let last_kickoff_ts = self.last_kickoff_ts.get_long(backend, &match_id, "all")?;
        if ts >= last_kickoff_ts && ts - last_kickoff_ts < self.config.kickoff_suppress_ms {
            return Ok(None);
        }
        let last_set_play_ts = self.last_set_play_ts.get_long(backend, &match_id, "all")?;
        if ts >= last_set_play_ts && ts - last_set_play_ts < self.config.kickoff_suppress_ms {
            return Ok(None);
        }

        let pos = element.positions.first().copied().unwrap_or(Vec3::ZERO);
        let team = self.team_in_possession.get_string(backend, &match_id, "all");
        let in_penalty_area = self.config.penalty_areas.areas.iter().any(|(_, area)| area.contains(pos));
        let kind = if in_penalty_area { "penalty" } else { "freeKick" };
        Ok(Some(self.emit(backend, &match_id, ts, kind, team, pos)))
    }
}

impl Processor for SetPlayDetector {
    fn name(&self) -> &str {
        "setPlayDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        match element.stream_name.as_str() {
            "areaEvent" => {
                let Some(area_id) = element.payload.get("areaId").and_then(Value::as_str) else {
                    return Ok(Vec::new());
                };
                let entered = element.payload.get("entered").and_then(Value::as_bool).unwrap_or(false);
                let match_id = element.key.clone();
                let ts = element.generation_timestamp;
                let area_id = area_id.to_string();

                self.track_boundary(backend, &match_id, ts, &area_id, entered);
                if !entered {
                    return Ok(Vec::new());
                }
                let pos = element.positions.first().copied().unwrap_or(Vec3::ZERO);
                Ok(self.classify_boundary(backend, &match_id, ts, &area_id, pos).into_iter().collect())
            }
            "fieldObjectState" => Ok(self.track_quiescence(backend, element)?.into_iter().collect()),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::StreamCategory;

    fn seed_roster(backend: &mut StateBackend, match_id: &str) {
        SingleValueStore::new(stores::PLAYER_TEAM).put(backend, match_id, "A1", "teamA".to_string());
        SingleValueStore::new(stores::PLAYER_TEAM).put(backend, match_id, "B1", "teamB".to_string());
        SingleValueStore::new(stores::LEFT_TEAM_ID).put(backend, match_id, "all", "teamA".to_string());
    }

    fn area_event(match_id: &str, ts: i64, area_id: &str, pos: Vec3) -> StreamElement {
        StreamElement::new("areaEvent", StreamCategory::Event, match_id, ts)
            .with_positions(vec![pos])
            .with_payload("areaId", area_id)
            .with_payload("entered", true)
    }

    fn ball_tick(match_id: &str, ts: i64, v_abs: f64, pos: Vec3) -> StreamElement {
        StreamElement::new("fieldObjectState", StreamCategory::State, match_id, ts)
            .with_object_ids(vec!["ball".to_string()])
            .with_positions(vec![pos])
            .with_payload("vAbs", v_abs)
    }

    #[test]
    fn left_byline_exit_by_defending_team_is_a_corner() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamA".to_string());
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        let events = detector.process(&mut backend, &area_event("m1", 100, "leftByline", Vec3::new(-52.5, 20.0, 0.0))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.get("type").and_then(Value::as_str), Some("cornerKick"));
        assert_eq!(events[0].payload.get("team").and_then(Value::as_str), Some("teamB"));
    }

    #[test]
    fn left_byline_exit_by_attacking_team_is_a_goal_kick() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamB".to_string());
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        let events = detector.process(&mut backend, &area_event("m1", 100, "leftByline", Vec3::new(-52.5, 20.0, 0.0))).unwrap();
        assert_eq!(events[0].payload.get("type").and_then(Value::as_str), Some("goalKick"));
        assert_eq!(events[0].payload.get("team").and_then(Value::as_str), Some("teamA"));
    }

    #[test]
    fn sideline_exit_awards_throw_in_to_the_other_team() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamA".to_string());
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        let events = detector.process(&mut backend, &area_event("m1", 100, "rightSideline", Vec3::new(0.0, 34.0, 0.0))).unwrap();
        assert_eq!(events[0].payload.get("type").and_then(Value::as_str), Some("throwIn"));
        assert_eq!(events[0].payload.get("team").and_then(Value::as_str), Some("teamB"));
    }

    #[test]
    fn sustained_quiescence_then_restart_emits_free_kick() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamA".to_string());
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        assert!(detector.process(&mut backend, &ball_tick("m1", 100, 0.05, Vec3::ZERO)).unwrap().is_empty());
        let events = detector.process(&mut backend, &ball_tick("m1", 2_000, 5.0, Vec3::new(10.0, 0.0, 0.0))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.get("type").and_then(Value::as_str), Some("freeKick"));
    }

    #[test]
    fn brief_dip_below_threshold_does_not_trigger_a_restart() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        detector.process(&mut backend, &ball_tick("m1", 100, 0.05, Vec3::ZERO)).unwrap();
        let events = detector.process(&mut backend, &ball_tick("m1", 200, 5.0, Vec3::ZERO)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn restart_inside_penalty_area_is_a_penalty() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamA".to_string());
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        let penalty_areas = AreaSpec::parse("{leftPenalty:-52.5:-36:-20.16:20.16}").unwrap();
        let detector = SetPlayDetector::new(SetPlayConfig { penalty_areas, ..SetPlayConfig::default() });

        detector.process(&mut backend, &ball_tick("m1", 100, 0.05, Vec3::new(-40.0, 0.0, 0.0))).unwrap();
        let events = detector.process(&mut backend, &ball_tick("m1", 2_000, 5.0, Vec3::new(-40.0, 0.0, 0.0))).unwrap();
        assert_eq!(events[0].payload.get("type").and_then(Value::as_str), Some("penalty"));
    }

    #[test]
    fn restart_right_after_kickoff_is_suppressed() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        SingleValueStore::new(stores::LAST_KICKOFF_TS).put(&mut backend, "m1", "all", 500_i64);
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        detector.process(&mut backend, &ball_tick("m1", 100, 0.05, Vec3::ZERO)).unwrap();
        let events = detector.process(&mut backend, &ball_tick("m1", 2_000, 5.0, Vec3::ZERO)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn crossing_a_boundary_line_flips_ball_in_field_and_breaks_both_pass_chains() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamA".to_string());
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", true);
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        detector.process(&mut backend, &area_event("m1", 100, "rightSideline", Vec3::new(0.0, 34.0, 0.0))).unwrap();

        assert!(!SingleValueStore::new(stores::BALL_IN_FIELD).get_boolean(&backend, "m1", "all").unwrap());
        assert_eq!(SingleValueStore::new(stores::PASS_CHAIN_BREAK_TS).get_long(&backend, "m1", "teamA").unwrap(), 100);
        assert_eq!(SingleValueStore::new(stores::PASS_CHAIN_BREAK_TS).get_long(&backend, "m1", "teamB").unwrap(), 100);
    }

    #[test]
    fn leaving_a_boundary_line_sets_ball_back_in_field() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", false);
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        let exit = StreamElement::new("areaEvent", StreamCategory::Event, "m1", 200)
            .with_positions(vec![Vec3::new(0.0, 30.0, 0.0)])
            .with_payload("areaId", "rightSideline")
            .with_payload("entered", false);
        detector.process(&mut backend, &exit).unwrap();

        assert!(SingleValueStore::new(stores::BALL_IN_FIELD).get_boolean(&backend, "m1", "all").unwrap());
    }

    #[test]
    fn ball_out_of_field_resets_quiescence_tracking() {
        let mut backend = StateBackend::new();
        seed_roster(&mut backend, "m1");
        SingleValueStore::new(stores::BALL_IN_FIELD).put(&mut backend, "m1", "all", false);
        let detector = SetPlayDetector::new(SetPlayConfig::default());

        assert!(detector.process(&mut backend, &ball_tick("m1", 100, 0.0, Vec3::ZERO)).unwrap().is_empty());
        assert_eq!(SingleValueStore::new(stores::SET_PLAY_QUIESCENT_SINCE).get_long(&backend, "m1", "all").unwrap(), 0);
    }
}
