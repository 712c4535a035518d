//! Dribbling + speed-level detector (§4.11).
//!
//! Two independent state machines share one input (player field-object
//! states): a speed-level bucketer that fires on threshold crossings, and
//! a dribbling episode tracker gated by who currently holds the ball.

use crate::detectors::stores;
use crate::element::{NonAtomicPhase, StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

#[derive(Debug, Clone)]
pub struct DribblingSpeedConfig {
    pub speed_thresholds: Vec<f64>,
    pub dribbling_speed_threshold: f64,
    pub dribbling_time_threshold: i64,
}

impl Default for DribblingSpeedConfig {
    fn default() -> Self {
        Self { speed_thresholds: vec![2.0, 4.0, 6.0, 8.0], dribbling_speed_threshold: 3.0, dribbling_time_threshold: 500 }
    }
}

fn speed_level(v_abs: f64, thresholds: &[f64]) -> i64 {
    for (i, threshold) in thresholds.iter().enumerate() {
        if v_abs < *threshold {
            return i as i64;
        }
    }
    thresholds.len() as i64
}

#[derive(Debug)]
pub struct DribblingSpeedDetector {
    config: DribblingSpeedConfig,
    player_team: SingleValueStore,
    player_in_possession: SingleValueStore,

    speed_level: SingleValueStore,
    last_speed_level_change_ts: SingleValueStore,
    level_duration_prefix: SingleValueStore,

    dribble_active: SingleValueStore,
    dribble_waiting_since: SingleValueStore,
    dribble_event_counter: SingleValueStore,
    dribble_start_ts: SingleValueStore,
    dribble_start_pos: SingleValueStore,
    dribble_last_pos: SingleValueStore,
    dribble_length: SingleValueStore,

    num_dribblings: SingleValueStore,
    sum_dribble_length: SingleValueStore,
    sum_dribble_duration: SingleValueStore,
}

impl DribblingSpeedDetector {
    pub fn new(config: DribblingSpeedConfig) -> Self {
        Self {
            config,
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            player_in_possession: SingleValueStore::new(stores::PLAYER_IN_POSSESSION),
            speed_level: SingleValueStore::new(stores::SPEED_LEVEL),
            last_speed_level_change_ts: SingleValueStore::new(stores::LAST_SPEED_LEVEL_CHANGE_TS),
            level_duration_prefix: SingleValueStore::new("speedLevelDurationPrefix"),
            dribble_active: SingleValueStore::new(stores::DRIBBLE_ACTIVE),
            dribble_waiting_since: SingleValueStore::new(stores::DRIBBLE_WAITING_SINCE),
            dribble_event_counter: SingleValueStore::new(stores::DRIBBLE_EVENT_COUNTER),
            dribble_start_ts: SingleValueStore::new(stores::DRIBBLE_START_TS),
            dribble_start_pos: SingleValueStore::new(stores::DRIBBLE_START_POS),
            dribble_last_pos: SingleValueStore::new(stores::DRIBBLE_LAST_POS),
            dribble_length: SingleValueStore::new(stores::DRIBBLE_LENGTH),
            num_dribblings: SingleValueStore::new("numDribblings"),
            sum_dribble_length: SingleValueStore::new("sumDribbleLength"),
            sum_dribble_duration: SingleValueStore::new("sumDribbleDuration"),
        }
    }

    fn emit_speed_statistics(&self, backend: &StateBackend, match_id: &str, key: &str, ts: i64, level: i64) -> Result<StreamElement, AnalyticsError> {
        Ok(StreamElement::new("speedLevelStatistics", StreamCategory::Statistics, match_id, ts)
            .with_object_ids(vec![key.to_string()])
            .with_payload("level", Value::Long(level))
            .with_payload("durationMs", Value::Long(self.level_duration_prefix.get_long(backend, match_id, &format!("{key}:{level}"))?)))
    }

    fn end_dribble(&self, backend: &mut StateBackend, match_id: &str, player: &str, team: &str, ts: i64, events: &mut Vec<StreamElement>) -> Result<(), AnalyticsError> {
        if !self.dribble_active.get_boolean(backend, match_id, player)? {
            return Ok(());
        }
        let counter = self.dribble_event_counter.get_long(backend, match_id, player)?;
        let start_ts = self.dribble_start_ts.get_long(backend, match_id, player)?;
        let length = self.dribble_length.get_double(backend, match_id, player)?;
        let duration = ts - start_ts;
        let velocity = if duration > 0 { length / (duration as f64 / 1000.0) } else { 0.0 };

        events.push(
            StreamElement::new("dribblingEvent", StreamCategory::Event, match_id, ts)
                .with_object_ids(vec![player.to_string()])
                .with_group_ids(vec![team.to_string()])
                .with_payload("length", length)
                .with_payload("durationMs", Value::Long(duration))
                .with_payload("velocity", velocity)
                .with_phase(NonAtomicPhase::End, format!("dribble-{player}-{counter}"), counter),
        );

        self.num_dribblings.increase_long(backend, match_id, player, 1)?;
        self.num_dribblings.increase_long(backend, match_id, team, 1)?;
        self.sum_dribble_length.increase(backend, match_id, player, length)?;
        self.sum_dribble_length.increase(backend, match_id, team, length)?;
        self.sum_dribble_duration.increase_long(backend, match_id, player, duration)?;
        self.sum_dribble_duration.increase_long(backend, match_id, team, duration)?;

        events.push(
            StreamElement::new("dribblingStatistics", StreamCategory::Statistics, match_id, ts)
                .with_object_ids(vec![player.to_string()])
                .with_payload("numDribblings", Value::Long(self.num_dribblings.get_long(backend, match_id, player)?))
                .with_payload("sumDribbleLength", self.sum_dribble_length.get_double(backend, match_id, player)?)
                .with_payload("sumDribbleDuration", Value::Long(self.sum_dribble_duration.get_long(backend, match_id, player)?)),
        );

        self.dribble_active.put(backend, match_id, player, false);
        self.dribble_waiting_since.clear(backend, match_id, player);
        Ok(())
    }
}

impl Processor for DribblingSpeedDetector {
    fn name(&self) -> &str {
        "dribblingSpeedDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let Some(player) = element.object_ids.first().cloned() else {
            return Ok(Vec::new());
        };
        let team = self.player_team.get_string(backend, &match_id, &player).unwrap_or_default();
        let v_abs = element.payload.get("vAbs").and_then(Value::as_f64).unwrap_or(0.0);

        let mut events = Vec::new();

        let level = speed_level(v_abs, &self.config.speed_thresholds);
        let previous_level = self.speed_level.get(backend, &match_id, &player);
        let first_observation = previous_level.is_none();
        let previous_level = previous_level.and_then(|v| v.as_i64()).unwrap_or(level);

        if first_observation {
            self.speed_level.put(backend, &match_id, &player, level);
            self.last_speed_level_change_ts.put(backend, &match_id, &player, ts);
        } else if level != previous_level {
            let last_change = self.last_speed_level_change_ts.get_long(backend, &match_id, &player)?;
            let elapsed = ts - last_change;
            self.level_duration_prefix.increase_long(backend, &match_id, &format!("{player}:{previous_level}"), elapsed)?;
            self.level_duration_prefix.increase_long(backend, &match_id, &format!("{team}:{previous_level}"), elapsed)?;

            self.speed_level.put(backend, &match_id, &player, level);
            self.last_speed_level_change_ts.put(backend, &match_id, &player, ts);

            events.push(
                StreamElement::new("speedLevelChangeEvent", StreamCategory::Event, &match_id, ts)
                    .with_object_ids(vec![player.clone()])
                    .with_group_ids(vec![team.clone()])
                    .with_payload("previousLevel", Value::Long(previous_level))
                    .with_payload("newLevel", Value::Long(level)),
            );
            events.push(self.emit_speed_statistics(backend, &match_id, &player, ts, previous_level)?);
            events.push(self.emit_speed_statistics(backend, &match_id, &team, ts, previous_level)?);
        }

        let possessor = self.player_in_possession.get_string(backend, &match_id, "all");
        let is_active_dribbler = self.dribble_active.get_boolean(backend, &match_id, &player)?;

        if is_active_dribbler && possessor.as_deref() != Some(player.as_str()) {
            self.end_dribble(backend, &match_id, &player, &team, ts, &mut events)?;
        } else if possessor.as_deref() == Some(player.as_str()) {
            let position = element.positions.first().copied().unwrap_or(Vec3::ZERO);

            if v_abs >= self.config.dribbling_speed_threshold && !is_active_dribbler {
                let waiting_since = self.dribble_waiting_since.get_long(backend, &match_id, &player)?;
                if waiting_since == 0 {
                    self.dribble_waiting_since.put(backend, &match_id, &player, ts);
                } else if ts - waiting_since > self.config.dribbling_time_threshold {
                    let counter = self.dribble_event_counter.increase_long(backend, &match_id, &player, 1)?;
                    self.dribble_active.put(backend, &match_id, &player, true);
                    self.dribble_start_ts.put(backend, &match_id, &player, waiting_since);
                    self.dribble_start_pos.put(backend, &match_id, &player, position);
                    self.dribble_last_pos.put(backend, &match_id, &player, position);
                    self.dribble_length.put(backend, &match_id, &player, 0.0_f64);

                    events.push(
                        StreamElement::new("dribblingEvent", StreamCategory::Event, &match_id, ts)
                            .with_object_ids(vec![player.clone()])
                            .with_group_ids(vec![team.clone()])
                            .with_positions(vec![position])
                            .with_phase(NonAtomicPhase::Start, format!("dribble-{player}-{counter}"), counter),
                    );
                }
            } else if is_active_dribbler {
                let last_pos = self.dribble_last_pos.get(backend, &match_id, &player).and_then(|v| v.as_vector()).unwrap_or(position);
                let segment = last_pos.distance_xy(position);
                let length = self.dribble_length.increase(backend, &match_id, &player, segment)?;
                self.dribble_last_pos.put(backend, &match_id, &player, position);

                let start_ts = self.dribble_start_ts.get_long(backend, &match_id, &player)?;
                let counter = self.dribble_event_counter.get_long(backend, &match_id, &player)?;

                events.push(
                    StreamElement::new("dribblingEvent", StreamCategory::Event, &match_id, ts)
                        .with_object_ids(vec![player.clone()])
                        .with_group_ids(vec![team.clone()])
                        .with_positions(vec![position])
                        .with_payload("length", length)
                        .with_payload("durationMs", Value::Long(ts - start_ts))
                        .with_phase(NonAtomicPhase::Active, format!("dribble-{player}-{counter}"), counter),
                );

                if v_abs < self.config.dribbling_speed_threshold {
                    self.end_dribble(backend, &match_id, &player, &team, ts, &mut events)?;
                }
            } else {
                self.dribble_waiting_since.clear(backend, &match_id, &player);
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(match_id: &str, ts: i64, player: &str, pos: Vec3, v_abs: f64) -> StreamElement {
        StreamElement::new("fieldObjectState", StreamCategory::State, match_id, ts)
            .with_object_ids(vec![player.to_string()])
            .with_positions(vec![pos])
            .with_payload("vAbs", v_abs)
    }

    #[test]
    fn speed_level_bucketing_matches_thresholds() {
        let thresholds = [2.0, 4.0, 6.0, 8.0];
        assert_eq!(speed_level(1.0, &thresholds), 0);
        assert_eq!(speed_level(3.5, &thresholds), 1);
        assert_eq!(speed_level(9.0, &thresholds), 4);
    }

    #[test]
    fn emits_change_event_on_crossing_and_attributes_duration_to_old_level() {
        let mut backend = StateBackend::new();
        let detector = DribblingSpeedDetector::new(DribblingSpeedConfig::default());
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "P1", "A".to_string());

        detector.process(&mut backend, &state("m1", 0, "P1", Vec3::ZERO, 1.0)).unwrap();
        let events = detector.process(&mut backend, &state("m1", 1000, "P1", Vec3::ZERO, 5.0)).unwrap();
        assert!(events.iter().any(|e| e.stream_name == "speedLevelChangeEvent"));
        let stats = events.iter().find(|e| e.stream_name == "speedLevelStatistics" && e.object_ids == vec!["P1".to_string()]).unwrap();
        assert_eq!(stats.payload.get("durationMs").and_then(Value::as_i64), Some(1000));
    }

    #[test]
    fn dribbling_start_active_end_sequence() {
        let mut backend = StateBackend::new();
        let detector = DribblingSpeedDetector::new(DribblingSpeedConfig::default());
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "P1", "A".to_string());
        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "P1".to_string());

        let e1 = detector.process(&mut backend, &state("m1", 0, "P1", Vec3::ZERO, 5.0)).unwrap();
        assert!(e1.iter().all(|e| e.stream_name != "dribblingEvent" || e.phase.is_none()));

        let e2 = detector.process(&mut backend, &state("m1", 600, "P1", Vec3::new(1.0, 0.0, 0.0), 5.0)).unwrap();
        let start = e2.iter().find(|e| e.stream_name == "dribblingEvent").unwrap();
        assert_eq!(start.phase, Some(NonAtomicPhase::Start));

        let e3 = detector.process(&mut backend, &state("m1", 800, "P1", Vec3::new(2.0, 0.0, 0.0), 5.0)).unwrap();
        let active = e3.iter().find(|e| e.stream_name == "dribblingEvent").unwrap();
        assert_eq!(active.phase, Some(NonAtomicPhase::Active));

        let e4 = detector.process(&mut backend, &state("m1", 900, "P1", Vec3::new(2.5, 0.0, 0.0), 1.0)).unwrap();
        let end = e4.iter().find(|e| e.stream_name == "dribblingEvent").unwrap();
        assert_eq!(end.phase, Some(NonAtomicPhase::End));
        assert!(!SingleValueStore::new(stores::DRIBBLE_ACTIVE).get_boolean(&backend, "m1", "P1").unwrap());
    }

    #[test]
    fn dribble_ends_when_possession_is_lost() {
        let mut backend = StateBackend::new();
        let detector = DribblingSpeedDetector::new(DribblingSpeedConfig::default());
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "P1", "A".to_string());
        SingleValueStore::new(stores::DRIBBLE_ACTIVE).put(&mut backend, "m1", "P1", true);
        SingleValueStore::new(stores::DRIBBLE_START_TS).put(&mut backend, "m1", "P1", 0_i64);
        SingleValueStore::new(stores::DRIBBLE_LENGTH).put(&mut backend, "m1", "P1", 4.0_f64);
        SingleValueStore::new(stores::PLAYER_IN_POSSESSION).put(&mut backend, "m1", "all", "P2".to_string());

        let events = detector.process(&mut backend, &state("m1", 1000, "P1", Vec3::new(4.0, 0.0, 0.0), 1.0)).unwrap();
        let end = events.iter().find(|e| e.stream_name == "dribblingEvent").unwrap();
        assert_eq!(end.phase, Some(NonAtomicPhase::End));
        assert_eq!(end.payload.get("length").and_then(Value::as_f64), Some(4.0));
    }
}
