//! Maps the flat `analytics_core::config::Config` property bag (§6, A.4)
//! onto the typed config struct each detector's constructor takes, and
//! seeds the handful of per-match static values every detector reads
//! through a `SingleValueStore` rather than receiving as a constructor
//! argument (field dimensions, rename maps, mirrored axes, the ball's
//! object id, the ball-in-field default).

use analytics_core::config::Config;
use analytics_core::detectors::area::AreaSpec;
use analytics_core::detectors::dribbling_speed::DribblingSpeedConfig;
use analytics_core::detectors::field_object_state::FieldObjectStateConfig;
use analytics_core::detectors::heatmap::HeatmapConfig;
use analytics_core::detectors::kick::KickConfig;
use analytics_core::detectors::kickoff_offside::{KickoffConfig, OffsideConfig};
use analytics_core::detectors::pass_combination::PassCombinationConfig;
use analytics_core::detectors::pass_shot::PassShotConfig;
use analytics_core::detectors::possession_duel::PossessionDuelConfig;
use analytics_core::detectors::set_play::SetPlayConfig;
use analytics_core::detectors::stores;
use analytics_core::detectors::team_area_pressing::{PressingIndexConfig, TeamAreaConfig};
use analytics_core::detectors::zone::ZoneClassifierConfig;
use analytics_core::error::ConfigError;
use analytics_core::state::{SingleValueStore, StateBackend};

/// Everything the worker's graph builder and match seeder need, derived
/// once at startup from the merged [`Config`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub ball_object_id: String,
    pub field_length: f64,
    pub field_width: f64,
    pub mirrored_x: bool,
    pub mirrored_y: bool,
    pub object_rename_map_raw: String,
    pub team_rename_map_raw: String,
    pub goal_area_spec: String,

    pub field_object_state: FieldObjectStateConfig,
    pub possession_duel: PossessionDuelConfig,
    pub kick: KickConfig,
    pub pass_shot: PassShotConfig,
    pub pass_combination: PassCombinationConfig,
    pub dribbling_speed: DribblingSpeedConfig,
    pub kickoff: KickoffConfig,
    pub offside: OffsideConfig,
    pub zone: ZoneClassifierConfig,
    pub team_area: TeamAreaConfig,
    pub pressing_index: PressingIndexConfig,
    pub heatmap: HeatmapConfig,
    pub goal_areas: AreaSpec,
    pub out_of_bounds_areas: AreaSpec,
    pub set_play: SetPlayConfig,
}

impl WorkerConfig {
    /// Reads every detector's thresholds from `config`, falling back to
    /// that detector's own `Default` for any key left unset — consistent
    /// with §6's "sensible defaults, explicit overrides" configuration
    /// model. Fails fast on a malformed numeric value or area spec.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let possession_default = PossessionDuelConfig::default();
        let kick_default = KickConfig::default();
        let pass_shot_default = PassShotConfig::default();
        let pass_combination_default = PassCombinationConfig::default();
        let dribbling_default = DribblingSpeedConfig::default();
        let kickoff_default = KickoffConfig::default();
        let heatmap_default = HeatmapConfig::default();

        let speed_thresholds = config.get_f64_list("dribblingSpeed.speedThresholds")?;
        let heatmap_intervals = config.get_f64_list("heatmap.intervals")?;

        let goal_area_spec = config.get_str("goalAreas").unwrap_or_default().to_string();
        let goal_areas = AreaSpec::parse(&goal_area_spec).map_err(|e| ConfigError::InvalidValue {
            key: "goalAreas".to_string(),
            value: goal_area_spec.clone(),
            reason: e.to_string(),
        })?;

        let out_of_bounds_spec = config.get_str("setPlayDetection.outOfBoundsAreas").unwrap_or_default().to_string();
        let out_of_bounds_areas = AreaSpec::parse(&out_of_bounds_spec).map_err(|e| ConfigError::InvalidValue {
            key: "setPlayDetection.outOfBoundsAreas".to_string(),
            value: out_of_bounds_spec.clone(),
            reason: e.to_string(),
        })?;
        let penalty_area_spec = config.get_str("setPlayDetection.penaltyAreas").unwrap_or_default().to_string();
        let penalty_areas = AreaSpec::parse(&penalty_area_spec).map_err(|e| ConfigError::InvalidValue {
            key: "setPlayDetection.penaltyAreas".to_string(),
            value: penalty_area_spec.clone(),
            reason: e.to_string(),
        })?;
        let set_play_default = SetPlayConfig::default();

        Ok(Self {
            ball_object_id: config.get_str("ballObjectId").unwrap_or("ball").to_string(),
            field_length: config.get_f64("field.length", 105.0)?,
            field_width: config.get_f64("field.width", 68.0)?,
            mirrored_x: config.get_bool("field.mirroredX", false)?,
            mirrored_y: config.get_bool("field.mirroredY", false)?,
            object_rename_map_raw: config.get_str("renameMap.objects").unwrap_or_default().to_string(),
            team_rename_map_raw: config.get_str("renameMap.teams").unwrap_or_default().to_string(),
            goal_area_spec: goal_area_spec.clone(),

            field_object_state: FieldObjectStateConfig { position_scale: config.get_f64("fieldObjectState.positionScale", 1.0)? },
            possession_duel: PossessionDuelConfig {
                max_vabs_for_vabs_diff: config.get_f64("possessionDuel.maxVabsForVabsDiff", possession_default.max_vabs_for_vabs_diff)?,
                min_vabs_diff: config.get_f64("possessionDuel.minVabsDiff", possession_default.min_vabs_diff)?,
                min_moving_dir_angle_diff: config.get_f64("possessionDuel.minMovingDirAngleDiff", possession_default.min_moving_dir_angle_diff)?,
                max_ball_possession_change_dist: config
                    .get_f64("possessionDuel.maxBallPossessionChangeDist", possession_default.max_ball_possession_change_dist)?,
                max_duel_dist: config.get_f64("possessionDuel.maxDuelDist", possession_default.max_duel_dist)?,
            },
            kick: KickConfig {
                min_kick_dist: config.get_f64("kick.minKickDist", kick_default.min_kick_dist)?,
                max_ballback_dist: config.get_f64("kick.maxBallbackDist", kick_default.max_ballback_dist)?,
            },
            pass_shot: PassShotConfig {
                max_time_ms: config.get_i64("passShot.maxTimeMs", pass_shot_default.max_time_ms)?,
                sidewards_angle_threshold: config.get_f64("passShot.sidewardsAngleThreshold", pass_shot_default.sidewards_angle_threshold)?,
                goal_height: config.get_f64("passShot.goalHeight", pass_shot_default.goal_height)?,
            },
            pass_combination: PassCombinationConfig {
                history_capacity: config.get_usize("passCombination.historyCapacity", pass_combination_default.history_capacity)?,
                max_time_between_passes: config.get_i64("passCombination.maxTimeBetweenPasses", pass_combination_default.max_time_between_passes)?,
            },
            dribbling_speed: DribblingSpeedConfig {
                speed_thresholds: if speed_thresholds.is_empty() { dribbling_default.speed_thresholds } else { speed_thresholds },
                dribbling_speed_threshold: config.get_f64("dribblingSpeed.dribblingSpeedThreshold", dribbling_default.dribbling_speed_threshold)?,
                dribbling_time_threshold: config.get_i64("dribblingSpeed.dribblingTimeThreshold", dribbling_default.dribbling_time_threshold)?,
            },
            kickoff: KickoffConfig {
                max_ball_midpoint_dist: config.get_f64("kickoff.maxBallMidpointDist", kickoff_default.max_ball_midpoint_dist)?,
                midcircle_radius: config.get_f64("kickoff.midcircleRadius", kickoff_default.midcircle_radius)?,
                min_player_midline_dist: config.get_f64("kickoff.minPlayerMidlineDist", kickoff_default.min_player_midline_dist)?,
                team_size: config.get_usize("kickoff.teamSize", kickoff_default.team_size)?,
                min_time_between_kickoffs: config.get_i64("kickoff.minTimeBetweenKickoffs", kickoff_default.min_time_between_kickoffs)?,
            },
            offside: OffsideConfig,
            zone: ZoneClassifierConfig,
            team_area: TeamAreaConfig,
            pressing_index: PressingIndexConfig,
            heatmap: HeatmapConfig {
                num_x_cells: config.get_usize("heatmap.numXCells", heatmap_default.num_x_cells)?,
                num_y_cells: config.get_usize("heatmap.numYCells", heatmap_default.num_y_cells)?,
                active_time_threshold_ms: config.get_i64("heatmap.activeTimeThresholdMs", heatmap_default.active_time_threshold_ms)?,
                intervals: if heatmap_intervals.is_empty() {
                    heatmap_default.intervals
                } else {
                    heatmap_intervals.into_iter().map(|v| v as i64).collect()
                },
                diff_history_capacity: config.get_usize("heatmap.diffHistoryCapacity", heatmap_default.diff_history_capacity)?,
            },
            goal_areas,
            out_of_bounds_areas,
            set_play: SetPlayConfig {
                quiescence_vabs_threshold: config.get_f64("setPlayDetection.quiescenceVabsThreshold", set_play_default.quiescence_vabs_threshold)?,
                min_quiescence_duration_ms: config.get_i64("setPlayDetection.minQuiescenceDurationMs", set_play_default.min_quiescence_duration_ms)?,
                kickoff_suppress_ms: config.get_i64("setPlayDetection.kickoffSuppressMs", set_play_default.kickoff_suppress_ms)?,
                penalty_areas,
            },
        })
    }

    /// Seeds the per-match static state every detector reads through a
    /// store rather than a constructor argument. Called once per match id
    /// by [`crate::MatchSeeder`], before the first element for that match
    /// reaches the graph.
    pub fn seed_match_state(&self, backend: &mut StateBackend, match_id: &str) {
        SingleValueStore::new(stores::FIELD_LENGTH).put(backend, match_id, "all", self.field_length);
        SingleValueStore::new(stores::FIELD_WIDTH).put(backend, match_id, "all", self.field_width);
        SingleValueStore::new(stores::MIRRORED_X).put(backend, match_id, "all", self.mirrored_x);
        SingleValueStore::new(stores::MIRRORED_Y).put(backend, match_id, "all", self.mirrored_y);
        SingleValueStore::new(stores::OBJECT_RENAME_MAP_RAW).put(backend, match_id, "all", self.object_rename_map_raw.clone());
        SingleValueStore::new(stores::TEAM_RENAME_MAP_RAW).put(backend, match_id, "all", self.team_rename_map_raw.clone());
        SingleValueStore::new(stores::BALL_IN_FIELD).put(backend, match_id, "all", true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_detector_defaults_when_unconfigured() {
        let config = WorkerConfig::from_config(&Config::new()).unwrap();
        assert_eq!(config.field_length, 105.0);
        assert_eq!(config.kick.min_kick_dist, KickConfig::default().min_kick_dist);
        assert_eq!(config.possession_duel.min_vabs_diff, PossessionDuelConfig::default().min_vabs_diff);
        assert_eq!(config.ball_object_id, "ball");
        assert!(config.goal_areas.areas.is_empty());
        assert!(config.out_of_bounds_areas.areas.is_empty());
        assert_eq!(config.set_play.quiescence_vabs_threshold, SetPlayConfig::default().quiescence_vabs_threshold);
    }

    #[test]
    fn parses_set_play_area_specs_and_thresholds() {
        let raw = Config::from_str(
            "setPlayDetection.outOfBoundsAreas={leftSideline:-52.5:52.5:34:40}\n\
             setPlayDetection.penaltyAreas={leftPenalty:-52.5:-36:-20.16:20.16}\n\
             setPlayDetection.minQuiescenceDurationMs=2000\n",
        )
        .unwrap();
        let config = WorkerConfig::from_config(&raw).unwrap();
        assert_eq!(config.out_of_bounds_areas.areas.len(), 1);
        assert_eq!(config.set_play.penalty_areas.areas.len(), 1);
        assert_eq!(config.set_play.min_quiescence_duration_ms, 2000);
    }

    #[test]
    fn overrides_a_single_threshold_without_disturbing_others() {
        let raw = Config::from_str("kick.minKickDist=3.5\ngoalAreas={leftGoal:-52.5:-50:-3.66:3.66}\n").unwrap();
        let config = WorkerConfig::from_config(&raw).unwrap();
        assert_eq!(config.kick.min_kick_dist, 3.5);
        assert_eq!(config.kick.max_ballback_dist, KickConfig::default().max_ballback_dist);
        assert_eq!(config.goal_areas.areas.len(), 1);
    }

    #[test]
    fn rejects_malformed_goal_area_spec() {
        let raw = Config::from_str("goalAreas=notAnArea\n").unwrap();
        assert!(WorkerConfig::from_config(&raw).is_err());
    }

    #[test]
    fn seeds_field_dimensions_and_ball_in_field_default() {
        let config = WorkerConfig::from_config(&Config::new()).unwrap();
        let mut backend = StateBackend::new();
        config.seed_match_state(&mut backend, "m1");
        assert!(SingleValueStore::new(stores::BALL_IN_FIELD).get_boolean(&backend, "m1", "all").unwrap());
        assert_eq!(SingleValueStore::new(stores::FIELD_LENGTH).get_double(&backend, "m1", "all").unwrap(), 105.0);
    }
}
