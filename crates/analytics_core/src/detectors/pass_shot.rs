//! Pass-and-shot classifier (§4.9).
//!
//! Consumes ball-possession-change events and ball-area-entry events (the
//! "second event" of a kick), matches each against the last stored,
//! not-yet-consumed `kickEvent`, and classifies the outcome into one of
//! `successfulPassEvent` / `interceptionEvent` / `clearanceEvent` /
//! `goalEvent` / `shotOffTargetEvent` / `misplacedPassEvent`.
//!
//! Zone classification (`GlobalZone`) is x-position based and independent
//! of team: this is the same "third of field" notion the kick detector
//! stamps onto its own event, just computed directly here from the kick
//! and receive positions rather than read back from a stored flag — both
//! readings are then mapped to a kicking-team-relative own/mid/attack
//! third via [`relative_third`].

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy)]
pub struct PassShotConfig {
    pub max_time_ms: i64,
    pub sidewards_angle_threshold: f64,
    pub goal_height: f64,
}

impl Default for PassShotConfig {
    fn default() -> Self {
        Self { max_time_ms: 5000, sidewards_angle_threshold: 0.6, goal_height: 2.44 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GlobalZone {
    Left,
    Center,
    Right,
    Outside,
}

fn classify_global_zone(x: f64, field_length: f64) -> GlobalZone {
    if x.abs() > field_length / 2.0 {
        GlobalZone::Outside
    } else if x < -field_length / 6.0 {
        GlobalZone::Left
    } else if x > field_length / 6.0 {
        GlobalZone::Right
    } else {
        GlobalZone::Center
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RelativeThird {
    Own,
    Mid,
    Attack,
    Outside,
}

fn relative_third(zone: GlobalZone, attacking_right: bool) -> RelativeThird {
    match (zone, attacking_right) {
        (GlobalZone::Outside, _) => RelativeThird::Outside,
        (GlobalZone::Center, _) => RelativeThird::Mid,
        (GlobalZone::Left, true) => RelativeThird::Own,
        (GlobalZone::Left, false) => RelativeThird::Attack,
        (GlobalZone::Right, true) => RelativeThird::Attack,
        (GlobalZone::Right, false) => RelativeThird::Own,
    }
}

fn direction_category(delta: Vec3, attacking_right: bool, sidewards_threshold: f64) -> &'static str {
    let playing_dir = if attacking_right { Vec3::new(1.0, 0.0, 0.0) } else { Vec3::new(-1.0, 0.0, 0.0) };
    let angle = delta.angle_to(playing_dir);
    if angle <= sidewards_threshold {
        "FORWARD"
    } else if angle >= std::f64::consts::PI - sidewards_threshold {
        "BACKWARD"
    } else if delta.y > 0.0 {
        "LEFT"
    } else {
        "RIGHT"
    }
}

enum SecondEvent {
    PossessionChange { team: String, player: String, position: Vec3, receive_packing: i64 },
    AreaEntry { area_id: String, position: Vec3 },
}

fn parse_second_event(element: &StreamElement) -> Option<SecondEvent> {
    match element.stream_name.as_str() {
        "ballPossessionChangeEvent" => Some(SecondEvent::PossessionChange {
            team: element.payload.get("team")?.as_str()?.to_string(),
            player: element.payload.get("player")?.as_str()?.to_string(),
            position: element.positions.first().copied()?,
            receive_packing: element.payload.get("numPlayersNearerToGoal").and_then(Value::as_i64).unwrap_or(0),
        }),
        "areaEvent" => {
            let entered = element.payload.get("entered").and_then(Value::as_bool).unwrap_or(false);
            if !entered {
                return None;
            }
            Some(SecondEvent::AreaEntry {
                area_id: element.payload.get("areaId")?.as_str()?.to_string(),
                position: element.positions.first().copied()?,
            })
        }
        _ => None,
    }
}

#[derive(Debug)]
pub struct PassShotClassifier {
    config: PassShotConfig,
    field_length: SingleValueStore,
    left_team_id: SingleValueStore,
    last_kick_event_ts: SingleValueStore,
    last_kick_event_player: SingleValueStore,
    last_kick_event_team: SingleValueStore,
    last_kick_event_pos: SingleValueStore,
    last_kick_event_packing: SingleValueStore,
    last_kick_event_attacked: SingleValueStore,
    last_used_kick_event_ts: SingleValueStore,
    num_successful_passes: SingleValueStore,
    num_intercepted_passes: SingleValueStore,
    num_misplaced_passes: SingleValueStore,
    num_cleared_passes: SingleValueStore,
    num_forward: SingleValueStore,
    num_backward: SingleValueStore,
    num_left: SingleValueStore,
    num_right: SingleValueStore,
    num_shots_off_target: SingleValueStore,
    num_goals: SingleValueStore,
    packing_sum: SingleValueStore,
    stats_initialized: SingleValueStore,
    pass_chain_break_ts: SingleValueStore,
}

impl PassShotClassifier {
    pub fn new(config: PassShotConfig) -> Self {
        Self {
            config,
            field_length: SingleValueStore::new(stores::FIELD_LENGTH),
            left_team_id: SingleValueStore::new(stores::LEFT_TEAM_ID),
            last_kick_event_ts: SingleValueStore::new(stores::LAST_KICK_EVENT_TS),
            last_kick_event_player: SingleValueStore::new(stores::LAST_KICK_EVENT_PLAYER),
            last_kick_event_team: SingleValueStore::new(stores::LAST_KICK_EVENT_TEAM),
            last_kick_event_pos: SingleValueStore::new(stores::LAST_KICK_EVENT_POS),
            last_kick_event_packing: SingleValueStore::new(stores::LAST_KICK_EVENT_PACKING),
            last_kick_event_attacked: SingleValueStore::new(stores::LAST_KICK_EVENT_ATTACKED),
            last_used_kick_event_ts: SingleValueStore::new(stores::LAST_USED_KICK_EVENT_TS),
            num_successful_passes: SingleValueStore::new("numSuccessfulPasses"),
            num_intercepted_passes: SingleValueStore::new("numInterceptedPasses"),
            num_misplaced_passes: SingleValueStore::new("numMisplacedPasses"),
            num_cleared_passes: SingleValueStore::new("numClearedPasses"),
            num_forward: SingleValueStore::new("numForwardPasses"),
            num_backward: SingleValueStore::new("numBackwardPasses"),
            num_left: SingleValueStore::new("numLeftPasses"),
            num_right: SingleValueStore::new("numRightPasses"),
            num_shots_off_target: SingleValueStore::new("numShotsOffTarget"),
            num_goals: SingleValueStore::new("numGoals"),
            packing_sum: SingleValueStore::new("packingSum"),
            stats_initialized: SingleValueStore::new("passShotStatsInitialized"),
            pass_chain_break_ts: SingleValueStore::new(stores::PASS_CHAIN_BREAK_TS),
        }
    }

    fn bump_direction(&self, backend: &mut StateBackend, match_id: &str, key: &str, category: &str) -> Result<(), AnalyticsError> {
        match category {
            "FORWARD" => self.num_forward.increase_long(backend, match_id, key, 1).map(|_| ()),
            "BACKWARD" => self.num_backward.increase_long(backend, match_id, key, 1).map(|_| ()),
            "LEFT" => self.num_left.increase_long(backend, match_id, key, 1).map(|_| ()),
            _ => self.num_right.increase_long(backend, match_id, key, 1).map(|_| ()),
        }
    }

    fn emit_pass_statistics(&self, backend: &StateBackend, match_id: &str, key: &str, group_ids: Vec<String>, ts: i64) -> Result<StreamElement, AnalyticsError> {
        Ok(StreamElement::new("passStatistics", StreamCategory::Statistics, match_id, ts)
            .with_object_ids(vec![key.to_string()])
            .with_group_ids(group_ids)
            .with_payload("numSuccessfulPasses", Value::Long(self.num_successful_passes.get_long(backend, match_id, key)?))
            .with_payload("numInterceptedPasses", Value::Long(self.num_intercepted_passes.get_long(backend, match_id, key)?))
            .with_payload("numMisplacedPasses", Value::Long(self.num_misplaced_passes.get_long(backend, match_id, key)?))
            .with_payload("numClearedPasses", Value::Long(self.num_cleared_passes.get_long(backend, match_id, key)?))
            .with_payload("numForwardPasses", Value::Long(self.num_forward.get_long(backend, match_id, key)?))
            .with_payload("numBackwardPasses", Value::Long(self.num_backward.get_long(backend, match_id, key)?))
            .with_payload("numLeftPasses", Value::Long(self.num_left.get_long(backend, match_id, key)?))
            .with_payload("numRightPasses", Value::Long(self.num_right.get_long(backend, match_id, key)?))
            .with_payload("packingSum", Value::Long(self.packing_sum.get_long(backend, match_id, key)?)))
    }

    fn emit_shot_statistics(&self, backend: &StateBackend, match_id: &str, key: &str, group_ids: Vec<String>, ts: i64) -> Result<StreamElement, AnalyticsError> {
        Ok(StreamElement::new("shotStatistics", StreamCategory::Statistics, match_id, ts)
            .with_object_ids(vec![key.to_string()])
            .with_group_ids(group_ids)
            .with_payload("numShotsOffTarget", Value::Long(self.num_shots_off_target.get_long(backend, match_id, key)?))
            .with_payload("numGoals", Value::Long(self.num_goals.get_long(backend, match_id, key)?)))
    }
}

enum Outcome {
    SuccessfulPass { packing_diff: i64 },
    Interception,
    Clearance,
    Goal,
    ShotOffTarget,
    MisplacedPass,
}

impl Processor for PassShotClassifier {
    fn name(&self) -> &str {
        "passShotClassifier"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let mut events = Vec::new();

        if !self.stats_initialized.get_boolean(backend, &match_id, "all")? {
            self.stats_initialized.put(backend, &match_id, "all", true);
        }

        let Some(second_event) = parse_second_event(element) else {
            return Ok(events);
        };

        let kick_ts = self.last_kick_event_ts.get_long(backend, &match_id, "all")?;
        if kick_ts == 0 {
            return Ok(events);
        }
        let last_used = self.last_used_kick_event_ts.get_long(backend, &match_id, "all")?;
        if last_used >= kick_ts {
            return Ok(events);
        }
        let gap = element.generation_timestamp - kick_ts;
        if gap < 0 || gap > self.config.max_time_ms {
            return Ok(events);
        }

        let kick_player = self.last_kick_event_player.get_string(backend, &match_id, "all").unwrap_or_default();
        let kick_team = self.last_kick_event_team.get_string(backend, &match_id, "all").unwrap_or_default();
        let kick_pos = self.last_kick_event_pos.get(backend, &match_id, "all").and_then(|v| v.as_vector()).unwrap_or(Vec3::ZERO);
        let kick_packing = self.last_kick_event_packing.get_long(backend, &match_id, "all")?;
        let kick_attacked = self.last_kick_event_attacked.get_boolean(backend, &match_id, "all")?;
        let field_length = self.field_length.get_double(backend, &match_id, "all")?;
        let left_team = self.left_team_id.get_string(backend, &match_id, "all");
        let attacking_right = left_team.as_deref() == Some(kick_team.as_str());

        let receive_pos = match &second_event {
            SecondEvent::PossessionChange { position, .. } => *position,
            SecondEvent::AreaEntry { position, .. } => *position,
        };
        let delta = receive_pos.sub(kick_pos);
        let length = delta.norm_xy();
        let duration_s = (gap as f64) / 1000.0;
        let velocity = if duration_s > 0.0 { length / duration_s } else { 0.0 };
        let angle = delta.angle_to(if attacking_right { Vec3::new(1.0, 0.0, 0.0) } else { Vec3::new(-1.0, 0.0, 0.0) });
        let direction = direction_category(delta, attacking_right, self.config.sidewards_angle_threshold);

        let kick_zone = relative_third(classify_global_zone(kick_pos.x, field_length), attacking_right);
        let receive_zone = relative_third(classify_global_zone(receive_pos.x, field_length), attacking_right);
        let own_goal_area = if attacking_right { "leftGoal" } else { "rightGoal" };

        let receiving_player = match &second_event {
            SecondEvent::PossessionChange { player, .. } => player.clone(),
            SecondEvent::AreaEntry { .. } => String::new(),
        };

        let outcome = match second_event {
            SecondEvent::PossessionChange { ref team, receive_packing, .. } => {
                if *team == kick_team {
                    Outcome::SuccessfulPass { packing_diff: kick_packing - receive_packing }
                } else if kick_attacked && kick_zone == RelativeThird::Own && matches!(receive_zone, RelativeThird::Mid | RelativeThird::Attack) {
                    Outcome::Clearance
                } else {
                    Outcome::Interception
                }
            }
            SecondEvent::AreaEntry { ref area_id, position } => {
                let near_goal_frame = matches!(
                    area_id.as_str(),
                    "leftGoal" | "rightGoal" | "slightlyAboveLeftGoal" | "slightlyBelowLeftGoal" | "slightlyAboveRightGoal" | "slightlyBelowRightGoal"
                );
                if near_goal_frame {
                    let is_exact_goal_area = area_id == "leftGoal" || area_id == "rightGoal";
                    if is_exact_goal_area && position.z < self.config.goal_height {
                        Outcome::Goal
                    } else if kick_attacked && kick_zone == RelativeThird::Own {
                        Outcome::Clearance
                    } else {
                        let own_side = area_id.contains(if own_goal_area == "leftGoal" { "Left" } else { "Right" });
                        if own_side {
                            Outcome::MisplacedPass
                        } else {
                            Outcome::ShotOffTarget
                        }
                    }
                } else if kick_attacked && kick_zone == RelativeThird::Own {
                    Outcome::Clearance
                } else {
                    Outcome::MisplacedPass
                }
            }
        };

        self.last_used_kick_event_ts.put(backend, &match_id, "all", kick_ts);

        let counters: &[&str] = &[kick_player.as_str(), kick_team.as_str()];
        for key in counters {
            self.packing_sum.increase_long(backend, &match_id, key, match &outcome {
                Outcome::SuccessfulPass { packing_diff } => *packing_diff,
                _ => 0,
            })?;
        }

        match &outcome {
            Outcome::SuccessfulPass { packing_diff } => {
                for key in counters {
                    self.num_successful_passes.increase_long(backend, &match_id, key, 1)?;
                    self.bump_direction(backend, &match_id, key, direction)?;
                }
                events.push(
                    StreamElement::new("successfulPassEvent", StreamCategory::Event, &match_id, element.generation_timestamp)
                        .with_object_ids(vec![kick_player.clone()])
                        .with_group_ids(vec![kick_team.clone()])
                        .with_positions(vec![kick_pos, receive_pos])
                        .with_payload("length", length)
                        .with_payload("velocity", velocity)
                        .with_payload("angle", angle)
                        .with_payload("directionCategory", direction)
                        .with_payload("packingDiff", Value::Long(*packing_diff))
                        .with_payload("receiver", receiving_player.clone()),
                );
                for key in counters {
                    events.push(self.emit_pass_statistics(backend, &match_id, key, vec![kick_team.clone()], element.generation_timestamp)?);
                }
            }
            Outcome::Interception => {
                self.num_intercepted_passes.increase_long(backend, &match_id, &kick_player, 1)?;
                self.num_intercepted_passes.increase_long(backend, &match_id, &kick_team, 1)?;
                self.pass_chain_break_ts.put(backend, &match_id, &kick_team, element.generation_timestamp);
                events.push(
                    StreamElement::new("interceptionEvent", StreamCategory::Event, &match_id, element.generation_timestamp)
                        .with_object_ids(vec![kick_player.clone()])
                        .with_group_ids(vec![kick_team.clone()])
                        .with_positions(vec![kick_pos, receive_pos]),
                );
                for key in counters {
                    events.push(self.emit_pass_statistics(backend, &match_id, key, vec![kick_team.clone()], element.generation_timestamp)?);
                }
            }
            Outcome::Clearance => {
                self.num_cleared_passes.increase_long(backend, &match_id, &kick_player, 1)?;
                self.num_cleared_passes.increase_long(backend, &match_id, &kick_team, 1)?;
                self.pass_chain_break_ts.put(backend, &match_id, &kick_team, element.generation_timestamp);
                events.push(
                    StreamElement::new("clearanceEvent", StreamCategory::Event, &match_id, element.generation_timestamp)
                        .with_object_ids(vec![kick_player.clone()])
                        .with_group_ids(vec![kick_team.clone()])
                        .with_positions(vec![kick_pos, receive_pos]),
                );
                for key in counters {
                    events.push(self.emit_pass_statistics(backend, &match_id, key, vec![kick_team.clone()], element.generation_timestamp)?);
                }
            }
            Outcome::Goal => {
                self.num_goals.increase_long(backend, &match_id, &kick_player, 1)?;
                self.num_goals.increase_long(backend, &match_id, &kick_team, 1)?;
                events.push(
                    StreamElement::new("goalEvent", StreamCategory::Event, &match_id, element.generation_timestamp)
                        .with_object_ids(vec![kick_player.clone()])
                        .with_group_ids(vec![kick_team.clone()])
                        .with_positions(vec![kick_pos, receive_pos]),
                );
                events.push(self.emit_shot_statistics(backend, &match_id, &kick_player, vec![kick_team.clone()], element.generation_timestamp)?);
            }
            Outcome::ShotOffTarget => {
                self.num_shots_off_target.increase_long(backend, &match_id, &kick_player, 1)?;
                self.num_shots_off_target.increase_long(backend, &match_id, &kick_team, 1)?;
                events.push(
                    StreamElement::new("shotOffTargetEvent", StreamCategory::Event, &match_id, element.generation_timestamp)
                        .with_object_ids(vec![kick_player.clone()])
                        .with_group_ids(vec![kick_team.clone()])
                        .with_positions(vec![kick_pos, receive_pos]),
                );
                events.push(self.emit_shot_statistics(backend, &match_id, &kick_player, vec![kick_team.clone()], element.generation_timestamp)?);
            }
            Outcome::MisplacedPass => {
                self.num_misplaced_passes.increase_long(backend, &match_id, &kick_player, 1)?;
                self.num_misplaced_passes.increase_long(backend, &match_id, &kick_team, 1)?;
                self.pass_chain_break_ts.put(backend, &match_id, &kick_team, element.generation_timestamp);
                events.push(
                    StreamElement::new("misplacedPassEvent", StreamCategory::Event, &match_id, element.generation_timestamp)
                        .with_object_ids(vec![kick_player.clone()])
                        .with_group_ids(vec![kick_team.clone()])
                        .with_positions(vec![kick_pos, receive_pos]),
                );
                for key in counters {
                    events.push(self.emit_pass_statistics(backend, &match_id, key, vec![kick_team.clone()], element.generation_timestamp)?);
                }
            }
        }

        Ok(events)
    }
}
