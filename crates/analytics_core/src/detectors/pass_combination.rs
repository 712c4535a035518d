//! Pass-combination / double-pass detector (§4.10).
//!
//! Consumes `successfulPassEvent`s and, on each one, walks a bounded
//! history of recent successful passes backwards to find the longest
//! unbroken chain ending at the current pass: same team, no time gap
//! larger than `max_time_between_passes`, and each pass's receiver equal
//! to the next (older) pass's kicker. A chain of length 2 in the "ABA"
//! shape (kicker of the newer pass is the receiver of the older, and
//! vice versa) is additionally a double pass.

use crate::detectors::stores;
use crate::element::{StreamCategory, StreamElement, Value};
use crate::error::AnalyticsError;
use crate::geometry::Vec3;
use crate::processor::Processor;
use crate::state::{HistoryStore, SingleValueStore, StateBackend};

#[derive(Debug, Clone, Copy)]
pub struct PassCombinationConfig {
    pub history_capacity: usize,
    pub max_time_between_passes: i64,
}

impl Default for PassCombinationConfig {
    fn default() -> Self {
        Self { history_capacity: 16, max_time_between_passes: 4000 }
    }
}

#[derive(Debug, Clone)]
struct PassRecord {
    ts: i64,
    team: String,
    kicker: String,
    receiver: String,
    kick_pos: Vec3,
    receive_pos: Vec3,
}

fn decode_pass(value: &Value) -> Option<PassRecord> {
    let fields = value.as_array()?;
    Some(PassRecord {
        ts: fields.first()?.as_i64()?,
        team: fields.get(1)?.as_str()?.to_string(),
        kicker: fields.get(2)?.as_str()?.to_string(),
        receiver: fields.get(3)?.as_str()?.to_string(),
        kick_pos: fields.get(4)?.as_vector()?,
        receive_pos: fields.get(5)?.as_vector()?,
    })
}

fn encode_pass(record: &PassRecord) -> Value {
    Value::Array(vec![
        Value::Long(record.ts),
        Value::Str(record.team.clone()),
        Value::Str(record.kicker.clone()),
        Value::Str(record.receiver.clone()),
        Value::Vector(record.kick_pos),
        Value::Vector(record.receive_pos),
    ])
}

#[derive(Debug)]
pub struct PassCombinationDetector {
    config: PassCombinationConfig,
    pass_history: HistoryStore,
    last_break_ts: SingleValueStore,
    first_ts_of_last_sequence: SingleValueStore,
    num_pass_sequences: SingleValueStore,
    sum_pass_sequence_length: SingleValueStore,
    max_pass_sequence_length: SingleValueStore,
    num_double_passes: SingleValueStore,
}

impl PassCombinationDetector {
    pub fn new(config: PassCombinationConfig) -> Self {
        Self {
            pass_history: HistoryStore::new(stores::PASS_HISTORY, config.history_capacity),
            config,
            last_break_ts: SingleValueStore::new(stores::PASS_CHAIN_BREAK_TS),
            first_ts_of_last_sequence: SingleValueStore::new("firstTsOfLastPassSequence"),
            num_pass_sequences: SingleValueStore::new("numPassSequences"),
            sum_pass_sequence_length: SingleValueStore::new("sumPassSequenceLength"),
            max_pass_sequence_length: SingleValueStore::new("maxPassSequenceLength"),
            num_double_passes: SingleValueStore::new("numDoublePasses"),
        }
    }

    /// Walks the stored history (newest first, current pass already
    /// included at index 0) backwards and returns the chronologically
    /// ordered chain ending at the current pass.
    fn walk_chain(&self, backend: &StateBackend, match_id: &str, team: &str) -> Vec<PassRecord> {
        let history: Vec<PassRecord> = self.pass_history.get_list(backend, match_id, team).iter().filter_map(decode_pass).collect();
        let break_ts = self.last_break_ts.get_long(backend, match_id, team).unwrap_or(0);

        let mut chain = Vec::new();
        for (idx, pass) in history.iter().enumerate() {
            if idx == 0 {
                chain.push(pass.clone());
                continue;
            }
            let newer = &history[idx - 1];
            if pass.team != newer.team {
                break;
            }
            if newer.ts - pass.ts > self.config.max_time_between_passes {
                break;
            }
            if pass.receiver != newer.kicker {
                break;
            }
            if pass.ts <= break_ts {
                break;
            }
            chain.push(pass.clone());
        }
        chain.reverse();
        chain
    }

    fn participants(chain: &[PassRecord]) -> Vec<String> {
        let mut seen = Vec::new();
        for pass in chain {
            if !seen.contains(&pass.team) {
                seen.push(pass.team.clone());
            }
            if !seen.contains(&pass.kicker) {
                seen.push(pass.kicker.clone());
            }
            if !seen.contains(&pass.receiver) {
                seen.push(pass.receiver.clone());
            }
        }
        seen
    }

    fn emit_sequence_statistics(&self, backend: &StateBackend, match_id: &str, key: &str, ts: i64) -> Result<StreamElement, AnalyticsError> {
        Ok(StreamElement::new("passSequenceStatistics", StreamCategory::Statistics, match_id, ts)
            .with_object_ids(vec![key.to_string()])
            .with_payload("numPassSequences", Value::Long(self.num_pass_sequences.get_long(backend, match_id, key)?))
            .with_payload("sumPassSequenceLength", Value::Long(self.sum_pass_sequence_length.get_long(backend, match_id, key)?))
            .with_payload("maxPassSequenceLength", Value::Long(self.max_pass_sequence_length.get_long(backend, match_id, key)?))
            .with_payload("numDoublePasses", Value::Long(self.num_double_passes.get_long(backend, match_id, key)?)))
    }
}

impl Processor for PassCombinationDetector {
    fn name(&self) -> &str {
        "passCombinationDetector"
    }

    fn process(&self, backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        if element.stream_name != "successfulPassEvent" {
            return Ok(Vec::new());
        }
        let match_id = element.key.clone();
        let ts = element.generation_timestamp;

        let team = element.group_ids.first().cloned().unwrap_or_default();
        let kicker = element.object_ids.first().cloned().unwrap_or_default();
        let receiver = element.payload.get("receiver").and_then(Value::as_str).map(str::to_string).unwrap_or_default();
        let kick_pos = element.positions.first().copied().unwrap_or(Vec3::ZERO);
        let receive_pos = element.positions.get(1).copied().unwrap_or(kick_pos);

        let record = PassRecord { ts, team: team.clone(), kicker, receiver, kick_pos, receive_pos };
        self.pass_history.add(backend, &match_id, &team, encode_pass(&record));

        let chain = self.walk_chain(backend, &match_id, &team);
        let mut events = Vec::new();
        if chain.len() < 2 {
            return Ok(events);
        }

        let first_ts = chain[0].ts;
        let participants = Self::participants(&chain);

        events.push(
            StreamElement::new("passSequenceEvent", StreamCategory::Event, &match_id, ts)
                .with_object_ids(participants.iter().filter(|p| *p != &team).cloned().collect())
                .with_group_ids(vec![team.clone()])
                .with_payload("length", Value::Long(chain.len() as i64))
                .with_payload("firstTs", Value::Long(first_ts)),
        );

        for key in &participants {
            let already_counted = self.first_ts_of_last_sequence.get_long(backend, &match_id, key)? == first_ts;
            if !already_counted {
                self.first_ts_of_last_sequence.put(backend, &match_id, key, first_ts);
                self.num_pass_sequences.increase_long(backend, &match_id, key, 1)?;
                self.sum_pass_sequence_length.increase_long(backend, &match_id, key, chain.len() as i64)?;
                let current_max = self.max_pass_sequence_length.get_long(backend, &match_id, key)?;
                if chain.len() as i64 > current_max {
                    self.max_pass_sequence_length.put(backend, &match_id, key, chain.len() as i64);
                }
            }
        }

        if chain.len() == 2 && chain[0].kicker == chain[1].receiver && chain[0].receiver == chain[1].kicker {
            for key in &participants {
                self.num_double_passes.increase_long(backend, &match_id, key, 1)?;
            }
            events.push(
                StreamElement::new("doublePassEvent", StreamCategory::Event, &match_id, ts)
                    .with_object_ids(vec![chain[0].kicker.clone(), chain[0].receiver.clone()])
                    .with_group_ids(vec![team.clone()]),
            );
        }

        for key in &participants {
            events.push(self.emit_sequence_statistics(backend, &match_id, key, ts)?);
        }

        Ok(events)
    }
}
