//! Heatmap construction + sender (§4.14). Two cooperating processors: the
//! per-sample `HeatmapConstructionDetector` accumulates a last-second grid
//! per statistics item (player and team), and the window-triggered
//! `HeatmapSender` rolls those last-second snapshots into bounded diff
//! histories, a monotonically-growing full-game heatmap, and one
//! `heatmapStatistics` element per configured interval.
//!
//! Grids are stored as a flat row-major `Value::Array` of cell counts
//! (index = y * numXGridCells + x) rather than a nested map, since
//! `Value` has no map variant and the grid size is fixed for the life of
//! the detector.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::{Processor, WindowProcessor};
use crate::state::{HistoryStore, SingleValueStore, StateBackend};

const ACTIVE_SINCE_PREFIX: &str = "heatmapActiveSince";

#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    pub num_x_cells: usize,
    pub num_y_cells: usize,
    pub active_time_threshold_ms: i64,
    /// Seconds; `0` means the full game.
    pub intervals: Vec<i64>,
    /// Capacity of the per-item diff history; must be at least the
    /// largest non-zero configured interval or that interval silently
    /// falls back to "all available diffs".
    pub diff_history_capacity: usize,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self { num_x_cells: 10, num_y_cells: 10, active_time_threshold_ms: 0, intervals: vec![0, 60], diff_history_capacity: 3600 }
    }
}

impl HeatmapConfig {
    fn num_cells(&self) -> usize {
        self.num_x_cells * self.num_y_cells
    }
}

/// Maps a field position to a row-major cell index, or `None` if the
/// position is at or beyond the field boundary.
fn cell_index(pos: Vec3, field_length: f64, field_width: f64, num_x: usize, num_y: usize) -> Option<usize> {
    let half_length = field_length / 2.0;
    let half_width = field_width / 2.0;
    if pos.x <= -half_length || pos.x >= half_length || pos.y <= -half_width || pos.y >= half_width {
        return None;
    }
    let x = (((pos.x + half_length) / field_length) * num_x as f64).floor().clamp(0.0, (num_x - 1) as f64) as usize;
    let y = (((pos.y + half_width) / field_width) * num_y as f64).floor().clamp(0.0, (num_y - 1) as f64) as usize;
    Some(y * num_x + x)
}

fn read_cells(store: &SingleValueStore, backend: &StateBackend, match_id: &str, key: &str, n: usize) -> Vec<i64> {
    store
        .get(backend, match_id, key)
        .and_then(|v| v.as_array().map(|arr| arr.iter().map(|cell| cell.as_i64().unwrap_or(0)).collect()))
        .unwrap_or_else(|| vec![0; n])
}

fn write_cells(store: &SingleValueStore, backend: &mut StateBackend, match_id: &str, key: &str, cells: &[i64]) {
    store.put(backend, match_id, key, Value::Array(cells.iter().map(|&v| Value::Long(v)).collect()));
}

/// Run-length encoding of a row-major cell vector: non-zero values are
/// literal decimals, runs of zeros collapse to `0xN`, entries `;`-joined.
fn encode_cells(cells: &[i64]) -> String {
    let mut parts = Vec::new();
    let mut zero_run = 0usize;
    for &v in cells {
        if v == 0 {
            zero_run += 1;
            continue;
        }
        if zero_run > 0 {
            parts.push(format!("0x{zero_run}"));
            zero_run = 0;
        }
        parts.push(v.to_string());
    }
    if zero_run > 0 {
        parts.push(format!("0x{zero_run}"));
    }
    parts.join(";")
}

#[derive(Debug)]
pub struct HeatmapConstructionDetector {
    config: HeatmapConfig,
    field_length: SingleValueStore,
    field_width: SingleValueStore,
    player_team: SingleValueStore,
    last_second_heatmap: SingleValueStore,
    last_position_ts: SingleValueStore,
    known_item: SingleValueStore,
    active_since: SingleValueStore,
}

impl HeatmapConstructionDetector {
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            field_length: SingleValueStore::new(stores::FIELD_LENGTH),
            field_width: SingleValueStore::new(stores::FIELD_WIDTH),
            player_team: SingleValueStore::new(stores::PLAYER_TEAM),
            last_second_heatmap: SingleValueStore::new(stores::LAST_SECOND_HEATMAP_PREFIX),
            last_position_ts: SingleValueStore::new(stores::LAST_POSITION_TS),
            known_item: SingleValueStore::new(stores::HEATMAP_KNOWN_ITEM),
            active_since: SingleValueStore::new(ACTIVE_SINCE_PREFIX),
            config,
        }
    }

    /// Registers `key` as known (mapping to itself for a team entry, or to
    /// `group` for a player entry — see [`HeatmapSender`]'s roster read)
    /// and stamps `lastPositionTs`, regardless of eligibility or whether
    /// this sample fell inside the field.
    fn touch(&self, backend: &mut StateBackend, match_id: &str, key: &str, group_marker: &str, ts: i64) {
        self.known_item.put(backend, match_id, key, group_marker.to_string());
        self.last_position_ts.put(backend, match_id, key, ts);
    }

    fn is_eligible(&self, backend: &mut StateBackend, match_id: &str, key: &str, ts: i64) -> bool {
        if self.config.active_time_threshold_ms <= 0 {
            return true;
        }
        let since = self.active_since.get_long(backend, match_id, key).unwrap_or(0);
        if since == 0 {
            self.active_since.put(backend, match_id, key, ts);
            return false;
        }
        ts - since >= self.config.active_time_threshold_ms
    }
}

impl Processor for HeatmapConstructionDetector {
    fn name(&self) -> &str {
        "heatmapConstructionDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;
        let Some(player) = element.object_ids.first().cloned() else {
            return Ok(Vec::new());
        };
        let Some(pos) = element.positions.first().copied() else {
            return Ok(Vec::new());
        };
        let team = self.player_team.get_string(backend, &match_id, &player).unwrap_or_default();

        self.touch(backend, &match_id, &player, &team, ts);
        if !team.is_empty() {
            self.touch(backend, &match_id, &team, &team, ts);
        }

        let player_eligible = self.is_eligible(backend, &match_id, &player, ts);

        let field_length = self.field_length.get_double(backend, &match_id, "all")?;
        let field_width = self.field_width.get_double(backend, &match_id, "all")?;
        let Some(idx) = cell_index(pos, field_length, field_width, self.config.num_x_cells, self.config.num_y_cells) else {
            return Ok(Vec::new());
        };

        if player_eligible {
            let n = self.config.num_cells();
            let mut cells = read_cells(&self.last_second_heatmap, backend, &match_id, &player, n);
            cells[idx] += 1;
            write_cells(&self.last_second_heatmap, backend, &match_id, &player, &cells);

            if !team.is_empty() {
                let mut team_cells = read_cells(&self.last_second_heatmap, backend, &match_id, &team, n);
                team_cells[idx] += 1;
                write_cells(&self.last_second_heatmap, backend, &match_id, &team, &team_cells);
            }
        }

        Ok(Vec::new())
    }
}

#[derive(Debug)]
pub struct HeatmapSender {
    config: HeatmapConfig,
    known_item: SingleValueStore,
    last_second_heatmap: SingleValueStore,
    diff_history: HistoryStore,
    full_game_heatmap: SingleValueStore,
}

impl HeatmapSender {
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            known_item: SingleValueStore::new(stores::HEATMAP_KNOWN_ITEM),
            last_second_heatmap: SingleValueStore::new(stores::LAST_SECOND_HEATMAP_PREFIX),
            diff_history: HistoryStore::new(stores::HEATMAP_DIFF_HISTORY_PREFIX, config.diff_history_capacity),
            full_game_heatmap: SingleValueStore::new(stores::FULL_GAME_HEATMAP_PREFIX),
            config,
        }
    }

    fn rollup(&self, backend: &StateBackend, match_id: &str, key: &str, interval: i64, n: usize) -> Vec<i64> {
        if interval == 0 {
            return read_cells(&self.full_game_heatmap, backend, match_id, key, n);
        }
        let diffs = self.diff_history.get_list(backend, match_id, key);
        let take = (interval as usize).min(diffs.len());
        let mut sum = vec![0_i64; n];
        for diff in diffs.iter().take(take) {
            if let Some(cells) = diff.as_array() {
                for (i, cell) in cells.iter().enumerate() {
                    sum[i] += cell.as_i64().unwrap_or(0);
                }
            }
        }
        sum
    }
}

impl WindowProcessor for HeatmapSender {
    fn name(&self) -> &str {
        "heatmapSender"
    }

    fn window(&self, backend: &mut StateBackend, match_id: &str, timestamp: i64) -> Result<Vec<StreamElement>, AnalyticsError> {
        let n = self.config.num_cells();
        let mut events = Vec::new();

        for key in self.known_item.known_inner_keys(backend, match_id) {
            let group_marker = self.known_item.get_string(backend, match_id, &key).unwrap_or_default();
            let is_team = group_marker == key;

            let diff = read_cells(&self.last_second_heatmap, backend, match_id, &key, n);
            self.diff_history.add(backend, match_id, &key, Value::Array(diff.iter().map(|&v| Value::Long(v)).collect()));

            let mut full_game = read_cells(&self.full_game_heatmap, backend, match_id, &key, n);
            for (i, delta) in diff.iter().enumerate() {
                full_game[i] += delta;
            }
            write_cells(&self.full_game_heatmap, backend, match_id, &key, &full_game);
            write_cells(&self.last_second_heatmap, backend, match_id, &key, &vec![0_i64; n]);

            for &interval in &self.config.intervals {
                let cells = self.rollup(backend, match_id, &key, interval, n);
                let total: i64 = cells.iter().sum();
                let mut element = StreamElement::new("heatmapStatistics", StreamCategory::Statistics, match_id, timestamp)
                    .with_payload("numXGridCells", Value::Long(self.config.num_x_cells as i64))
                    .with_payload("numYGridCells", Value::Long(self.config.num_y_cells as i64))
                    .with_payload("interval", Value::Long(interval))
                    .with_payload("totalNum", Value::Long(total))
                    .with_payload("cells", encode_cells(&cells));
                element = if is_team {
                    element.with_group_ids(vec![key.clone()])
                } else {
                    element.with_object_ids(vec![key.clone()]).with_group_ids(vec![group_marker.clone()])
                };
                events.push(element);
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_field(backend: &mut StateBackend, match_id: &str, length: f64, width: f64) {
        SingleValueStore::new(stores::FIELD_LENGTH).put(backend, match_id, "all", length);
        SingleValueStore::new(stores::FIELD_WIDTH).put(backend, match_id, "all", width);
    }

    fn sample(match_id: &str, ts: i64, player: &str, pos: Vec3) -> StreamElement {
        StreamElement::new("fieldObjectState", StreamCategory::State, match_id, ts)
            .with_object_ids(vec![player.to_string()])
            .with_positions(vec![pos])
    }

    #[test]
    fn encode_cells_matches_the_documented_run_length_scheme() {
        assert_eq!(encode_cells(&[2, 0, 0, 3]), "2;0x2;3");
        assert_eq!(encode_cells(&[0, 0, 0, 0, 0, 3, 0, 0, 1]), "0x5;3;0x2;1");
    }

    #[test]
    fn cell_index_maps_field_quadrants_on_a_2x2_grid() {
        assert_eq!(cell_index(Vec3::new(-25.0, -10.0, 0.0), 100.0, 40.0, 2, 2), Some(0));
        assert_eq!(cell_index(Vec3::new(25.0, 10.0, 0.0), 100.0, 40.0, 2, 2), Some(3));
        assert_eq!(cell_index(Vec3::new(50.0, 0.0, 0.0), 100.0, 40.0, 2, 2), None);
    }

    #[test]
    fn construction_increments_player_and_team_cells() {
        let mut backend = StateBackend::new();
        seed_field(&mut backend, "m1", 100.0, 40.0);
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "P1", "A".to_string());
        let detector = HeatmapConstructionDetector::new(HeatmapConfig { num_x_cells: 2, num_y_cells: 2, ..HeatmapConfig::default() });

        detector.process(&mut backend, &sample("m1", 0, "P1", Vec3::new(25.0, 10.0, 0.0))).unwrap();

        let player_cells = read_cells(&SingleValueStore::new(stores::LAST_SECOND_HEATMAP_PREFIX), &backend, "m1", "P1", 4);
        assert_eq!(player_cells, vec![0, 0, 0, 1]);
        let team_cells = read_cells(&SingleValueStore::new(stores::LAST_SECOND_HEATMAP_PREFIX), &backend, "m1", "A", 4);
        assert_eq!(team_cells, vec![0, 0, 0, 1]);
    }

    #[test]
    fn s6_two_second_rollup_matches_the_documented_scenario() {
        let mut backend = StateBackend::new();
        seed_field(&mut backend, "m1", 100.0, 40.0);
        SingleValueStore::new(stores::PLAYER_TEAM).put(&mut backend, "m1", "P1", "A".to_string());

        let detector = HeatmapConstructionDetector::new(HeatmapConfig { num_x_cells: 2, num_y_cells: 2, ..HeatmapConfig::default() });
        let sender = HeatmapSender::new(HeatmapConfig { num_x_cells: 2, num_y_cells: 2, intervals: vec![2], diff_history_capacity: 10, ..HeatmapConfig::default() });

        // second 0: one sample in cell (0,0).
        detector.process(&mut backend, &sample("m1", 0, "P1", Vec3::new(-25.0, -10.0, 0.0))).unwrap();
        sender.window(&mut backend, "m1", 1000).unwrap();

        // second 1: three samples in cell (1,1).
        for _ in 0..3 {
            detector.process(&mut backend, &sample("m1", 1000, "P1", Vec3::new(25.0, 10.0, 0.0))).unwrap();
        }
        sender.window(&mut backend, "m1", 2000).unwrap();

        // second 2: two samples in cell (0,0).
        for _ in 0..2 {
            detector.process(&mut backend, &sample("m1", 2000, "P1", Vec3::new(-25.0, -10.0, 0.0))).unwrap();
        }
        let events = sender.window(&mut backend, "m1", 3000).unwrap();

        let player_stat = events.iter().find(|e| e.object_ids == vec!["P1".to_string()]).unwrap();
        assert_eq!(player_stat.payload.get("totalNum").and_then(Value::as_i64), Some(5));
        assert_eq!(player_stat.payload.get("cells").and_then(Value::as_str), Some("2;0x2;3"));
    }
}
