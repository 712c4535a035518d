//! Representative event-detection state machines (§4.7–§4.16). Each
//! detector is a [`crate::processor::Processor`] (or, for the
//! window-triggered heatmap sender, a
//! [`crate::processor::WindowProcessor`]) wired against a handful of named
//! [`crate::state::SingleValueStore`]/[`crate::state::HistoryStore`]
//! instances that other processors upstream in the graph (typically a
//! [`crate::processor::StoreModule`] attached to the relevant input
//! stream) keep populated. Store names are centralized here so the
//! producer and consumer of a given piece of state never drift apart.

pub mod area;
pub mod dribbling_speed;
pub mod field_object_state;
pub mod heatmap;
pub mod kick;
pub mod kickoff_offside;
pub mod pass_combination;
pub mod pass_shot;
pub mod possession_duel;
pub mod set_play;
pub mod team_area_pressing;
pub mod zone;

/// Shared state-store names. Grouped here rather than scattered as string
/// literals per detector so a rename is a one-line change.
pub mod stores {
    pub const FIELD_LENGTH: &str = "fieldLength";
    pub const FIELD_WIDTH: &str = "fieldWidth";
    pub const LEFT_TEAM_ID: &str = "leftTeamId";
    pub const BALL_IN_FIELD: &str = "ballInField";

    pub const BALL_VABS_HISTORY: &str = "ballVabsHistory";
    pub const BALL_POSITION_HISTORY: &str = "ballPositionHistory";

    pub const PLAYER_POSITION: &str = "playerPosition";
    pub const PLAYER_VELOCITY: &str = "playerVelocity";
    pub const PLAYER_TEAM: &str = "playerTeam";
    pub const PLAYER_VABS: &str = "playerVabs";
    pub const PLAYER_VABS_HISTORY: &str = "playerVabsHistory";
    pub const PLAYER_POSITION_HISTORY: &str = "playerPositionHistory";
    pub const PLAYER_TIMESTAMP_HISTORY: &str = "playerTimestampHistory";

    pub const OBJECT_RENAME_MAP_RAW: &str = "objectRenameMapRaw";
    pub const TEAM_RENAME_MAP_RAW: &str = "teamRenameMapRaw";
    pub const MIRRORED_X: &str = "mirroredX";
    pub const MIRRORED_Y: &str = "mirroredY";

    pub const PLAYER_IN_POSSESSION: &str = "playerInPossession";
    pub const TEAM_IN_POSSESSION: &str = "teamInPossession";
    pub const DUEL_ACTIVE: &str = "duelActive";
    pub const DUEL_DEFENDER: &str = "duelDefender";
    pub const DUEL_ATTACKER: &str = "duelAttacker";
    pub const DUEL_EVENT_COUNTER: &str = "duelEventCounter";
    pub const DUEL_PHASE: &str = "duelPhase";

    pub const ACTIVE_KICK: &str = "activeKick";
    pub const UNDER_PRESSURE_PHASE: &str = "underPressurePhase";
    pub const THIRD_OF_FIELD: &str = "thirdOfField";

    pub const LAST_KICK_EVENT_TS: &str = "lastKickEventTs";
    pub const LAST_KICK_EVENT_PLAYER: &str = "lastKickEventPlayer";
    pub const LAST_KICK_EVENT_TEAM: &str = "lastKickEventTeam";
    pub const LAST_KICK_EVENT_POS: &str = "lastKickEventPos";
    pub const LAST_KICK_EVENT_PACKING: &str = "lastKickEventPacking";
    pub const LAST_KICK_EVENT_ATTACKED: &str = "lastKickEventAttacked";
    pub const LAST_USED_KICK_EVENT_TS: &str = "lastUsedKickEventTs";

    pub const PASS_HISTORY: &str = "successfulPassHistory";
    pub const PASS_CHAIN_BREAK_TS: &str = "lastPassChainBreakTs";

    pub const SPEED_LEVEL: &str = "speedLevel";
    pub const LAST_SPEED_LEVEL_CHANGE_TS: &str = "lastSpeedLevelChangeTs";
    pub const DRIBBLE_ACTIVE: &str = "dribbleActive";
    pub const DRIBBLE_WAITING_SINCE: &str = "dribbleWaitingSince";
    pub const DRIBBLE_EVENT_COUNTER: &str = "dribbleEventCounter";
    pub const DRIBBLE_START_TS: &str = "dribbleStartTs";
    pub const DRIBBLE_START_POS: &str = "dribbleStartPos";
    pub const DRIBBLE_LENGTH: &str = "dribbleLength";
    pub const DRIBBLE_LAST_POS: &str = "dribbleLastPos";

    pub const LAST_KICKOFF_TS: &str = "lastKickoffTs";
    pub const OFFSIDE_EMITTED_NULL: &str = "offsideEmittedNull";

    pub const AREA_FLAG_PREFIX: &str = "areaFlag";

    pub const SET_PLAY_QUIESCENT_SINCE: &str = "setPlayQuiescentSince";
    pub const SET_PLAY_LAST_TS: &str = "setPlayLastTs";

    pub const LAST_SECOND_HEATMAP_PREFIX: &str = "lastSecondHeatmap";
    pub const HEATMAP_DIFF_HISTORY_PREFIX: &str = "heatmapDiffHistory";
    pub const FULL_GAME_HEATMAP_PREFIX: &str = "fullGameHeatmap";
    pub const LAST_POSITION_TS: &str = "lastPositionTs";
    pub const HEATMAP_KNOWN_ITEM: &str = "heatmapKnownItem";

    pub const TEAM_AREA_BOUNDING_BOX: &str = "teamAreaBoundingBox";
    pub const TEAM_AREA_CONVEX_HULL: &str = "teamAreaConvexHull";
    pub const PRESSING_INDEX: &str = "pressingIndex";
}
