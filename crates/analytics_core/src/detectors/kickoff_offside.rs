//! Kickoff and offside detectors (§4.12). Two independent processors that
//! happen to share this file because both key off the same roster of
//! player positions/teams maintained by the field-object-state stores, and
//! because the kickoff detector is the sole writer of `leftTeamId`, which
//! the possession/duel and kick detectors read.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::state::{SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy)]
pub struct KickoffConfig {
    pub max_ball_midpoint_dist: f64,
    pub midcircle_radius: f64,
    pub min_player_midline_dist: f64,
    pub team_size: usize,
    pub min_time_between_kickoffs: i64,
}

impl Default for KickoffConfig {
    fn default() -> Self {
        Self {
            max_ball_midpoint_dist: 2.0,
            midcircle_radius: 9.15,
            min_player_midline_dist: 0.5,
            team_size: 11,
            min_time_between_kickoffs: 5_000,
        }
    }
}

#[derive(Debug)]
pub struct KickoffDetector {
    config: KickoffConfig,
    player_position: SingleValueStore,
    player_team: SingleValueStore,
    left_team_id: SingleValueStore,
    last_kickoff_ts: SingleValueStore,
}

impl KickoffDetector {
    pub fn new(config: KickoffConfig) -> Self {
        Self {
            config,
            player_position: SingleValueStore::new(stores::PLAYER_POSITION),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            left_team_id: SingleValueStore::new(stores::LEFT_TEAM_ID),
            last_kickoff_ts: SingleValueStore::new(stores::LAST_KICKOFF_TS),
        }
    }

    fn roster(&self, backend: &StateBackend, match_id: &str) -> Vec<(String, String, Vec3)> {
        self.player_position
            .known_inner_keys(backend, match_id)
            .into_iter()
            .filter_map(|id| {
                let pos = self.player_position.get(backend, match_id, &id)?.as_vector()?;
                let team = self.player_team.get_string(backend, match_id, &id)?;
                Some((id, team, pos))
            })
            .collect()
    }
}

impl Processor for KickoffDetector {
    fn name(&self) -> &str {
        "kickoffDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let ball_pos = element.positions.first().copied().unwrap_or(Vec3::ZERO);

        if ball_pos.distance_xy(Vec3::ZERO) > self.config.max_ball_midpoint_dist {
            return Ok(Vec::new());
        }

        let last_ts = self.last_kickoff_ts.get_long(backend, &match_id, "all")?;
        if ts >= last_ts && ts - last_ts < self.config.min_time_between_kickoffs {
            return Ok(Vec::new());
        }

        let roster = self.roster(backend, &match_id);
        let mut midcircle: Vec<(&str, &str, Vec3)> = Vec::new();
        let mut left: Vec<&str> = Vec::new();
        let mut right: Vec<&str> = Vec::new();

        for (id, team, pos) in &roster {
            if pos.distance_xy(Vec3::ZERO) < self.config.midcircle_radius {
                midcircle.push((id, team, *pos));
            } else if pos.x < -self.config.min_player_midline_dist {
                left.push(team);
            } else if pos.x > self.config.min_player_midline_dist {
                right.push(team);
            }
        }

        if midcircle.is_empty() {
            return Ok(Vec::new());
        }

        fn single_team<'a>(teams: impl Iterator<Item = &'a str>) -> Option<&'a str> {
            let mut found = None;
            for t in teams {
                match found {
                    None => found = Some(t),
                    Some(existing) if existing == t => {}
                    Some(_) => return None,
                }
            }
            found
        }

        let Some(midcircle_team) = single_team(midcircle.iter().map(|(_, t, _)| *t)) else {
            return Ok(Vec::new());
        };
        let Some(left_team) = single_team(left.iter().copied()) else {
            return Ok(Vec::new());
        };
        let Some(right_team) = single_team(right.iter().copied()) else {
            return Ok(Vec::new());
        };
        if left.len() > self.config.team_size || right.len() > self.config.team_size {
            return Ok(Vec::new());
        }
        let _ = midcircle_team;

        let (kicker, kicker_pos) = midcircle
            .iter()
            .min_by(|a, b| a.2.distance_xy(ball_pos).partial_cmp(&b.2.distance_xy(ball_pos)).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _, pos)| (id.to_string(), *pos))
            .expect("midcircle is non-empty");

        self.last_kickoff_ts.put(backend, &match_id, "all", ts);
        self.left_team_id.put(backend, &match_id, "all", left_team.to_string());

        Ok(vec![StreamElement::new("kickoffEvent", StreamCategory::Event, &match_id, ts)
            .with_object_ids(vec![kicker.clone()])
            .with_positions(vec![kicker_pos])
            .with_payload("kicker", kicker)
            .with_payload("leftTeamId", left_team.to_string())
            .with_payload("rightTeamId", right_team.to_string())])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OffsideConfig;

#[derive(Debug)]
pub struct OffsideDetector {
    player_position: SingleValueStore,
    player_team: SingleValueStore,
    player_in_possession: SingleValueStore,
    team_in_possession: SingleValueStore,
    left_team_id: SingleValueStore,
    offside_emitted_null: SingleValueStore,
}

impl OffsideDetector {
    pub fn new(_config: OffsideConfig) -> Self {
        Self {
            player_position: SingleValueStore::new(stores::PLAYER_POSITION),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            player_in_possession: SingleValueStore::new(stores::PLAYER_IN_POSSESSION),
            team_in_possession: SingleValueStore::new(stores::TEAM_IN_POSSESSION),
            left_team_id: SingleValueStore::new(stores::LEFT_TEAM_ID),
            offside_emitted_null: SingleValueStore::new(stores::OFFSIDE_EMITTED_NULL),
        }
    }

    fn roster(&self, backend: &StateBackend, match_id: &str) -> Vec<(String, String, Vec3)> {
        self.player_position
            .known_inner_keys(backend, match_id)
            .into_iter()
            .filter_map(|id| {
                let pos = self.player_position.get(backend, match_id, &id)?.as_vector()?;
                let team = self.player_team.get_string(backend, match_id, &id)?;
                Some((id, team, pos))
            })
            .collect()
    }
}

impl Processor for OffsideDetector {
    fn name(&self) -> &str {
        "offsideDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;

        let Some(possessor) = self.player_in_possession.get_string(backend, &match_id, "all") else {
            if self.offside_emitted_null.get_boolean(backend, &match_id, "all")? {
                return Ok(Vec::new());
            }
            self.offside_emitted_null.put(backend, &match_id, "all", true);
            return Ok(vec![StreamElement::new("offsideLineState", StreamCategory::State, &match_id, ts)]);
        };
        self.offside_emitted_null.put(backend, &match_id, "all", false);

        let element_object = element.object_ids.first().map(String::as_str);
        if element_object != Some(possessor.as_str()) {
            return Ok(Vec::new());
        }

        let possessor_team = self.team_in_possession.get_string(backend, &match_id, "all").unwrap_or_default();
        let left_team = self.left_team_id.get_string(backend, &match_id, "all");
        let playing_dir = if left_team.as_deref() == Some(possessor_team.as_str()) { 1.0 } else { -1.0 };

        let roster = self.roster(backend, &match_id);
        let Some(possessor_pos) = roster.iter().find(|(id, _, _)| *id == possessor).map(|(_, _, pos)| *pos) else {
            return Ok(Vec::new());
        };

        let mut foreign: Vec<(String, f64)> = roster
            .iter()
            .filter(|(_, team, _)| *team != possessor_team)
            .map(|(id, _, pos)| (id.clone(), pos.x * playing_dir))
            .collect();
        foreign.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let own: Vec<(String, f64)> = roster
            .iter()
            .filter(|(_, team, _)| *team == possessor_team)
            .map(|(id, _, pos)| (id.clone(), pos.x * playing_dir))
            .collect();

        let possessor_dir_x = possessor_pos.x * playing_dir;

        let line = if foreign.len() < 2 {
            possessor_dir_x
        } else {
            // Second-last by playing-direction x is the offside line under
            // a normal back four; "last" (the goalkeeper, furthest back)
            // is excluded.
            let second_last = foreign[foreign.len() - 2].1;
            if second_last < possessor_dir_x { possessor_dir_x } else { second_last }
        };

        let offside_players: Vec<String> = own
            .into_iter()
            .filter(|(id, x)| *id != possessor && *x > line)
            .map(|(id, _)| id)
            .collect();

        Ok(vec![StreamElement::new("offsideLineState", StreamCategory::State, &match_id, ts)
            .with_payload("line", line)
            .with_payload(
                "offsidePlayers",
                Value::Array(offside_players.into_iter().map(Value::Str).collect()),
            )])
    }
}
