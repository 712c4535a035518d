//! Keyed per-match state substrate (§3, §4.2).
//!
//! [`SingleValueStore`] and [`HistoryStore`] are thin, named wrappers over a
//! [`StateBackend`]; their physical key is `(store name, match id, inner
//! key)`. The backend holds one in-memory map per match id so that state for
//! distinct matches is strictly disjoint and independently reclaimable —
//! ownership of a match's map belongs to whichever worker currently holds
//! that match's input partition, so the backend itself performs no internal
//! locking: within a single match, all calls happen on one logical thread
//! by construction of the surrounding worker loop, not by locking here.

use crate::element::Value;
use crate::error::AnalyticsError;
use fxhash::FxHashMap;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct MatchState {
    single: FxHashMap<(String, String), Value>,
    history: FxHashMap<(String, String), VecDeque<Value>>,
}

/// Owns every match's state. One instance lives for the life of a worker;
/// there is no explicit end-of-match, state for an unused match-id simply
/// stops being touched.
#[derive(Debug, Default)]
pub struct StateBackend {
    matches: FxHashMap<String, MatchState>,
}

impl StateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn match_mut(&mut self, match_id: &str) -> &mut MatchState {
        self.matches.entry(match_id.to_string()).or_default()
    }

    fn match_ref(&self, match_id: &str) -> Option<&MatchState> {
        self.matches.get(match_id)
    }

    /// Drops all state for a match. Not part of the wire contract — useful
    /// for tests and for an embedded deployment that wants to reclaim
    /// memory for a match it knows has ended.
    pub fn reset_match(&mut self, match_id: &str) {
        self.matches.remove(match_id);
    }

    /// Every inner key currently populated in `store_name`'s single-value
    /// map for this match. Detectors that need to enumerate a roster (the
    /// nearest-player search in §4.7, the per-team bounding box in §4.16)
    /// use this rather than maintaining their own parallel index.
    pub fn known_inner_keys(&self, match_id: &str, store_name: &str) -> Vec<String> {
        self.match_ref(match_id)
            .map(|m| m.single.keys().filter(|(name, _)| name == store_name).map(|(_, key)| key.clone()).collect())
            .unwrap_or_default()
    }
}

/// Mapping *(match-id, inner-key) → T*, physically keyed by this store's
/// name plus the pair. Values are type-tagged `Value`s; typed getters do a
/// runtime check on read and a numeric getter defaults to the type's zero
/// value when unset, per §9's note on avoiding "uninitialized" special
/// cases in statistics emitters.
#[derive(Debug, Clone)]
pub struct SingleValueStore {
    name: String,
}

impl SingleValueStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn put(&self, backend: &mut StateBackend, match_id: &str, inner_key: &str, value: impl Into<Value>) {
        backend.match_mut(match_id).single.insert((self.name.clone(), inner_key.to_string()), value.into());
    }

    pub fn get(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Option<Value> {
        backend.match_ref(match_id)?.single.get(&(self.name.clone(), inner_key.to_string())).cloned()
    }

    fn type_mismatch(&self, inner_key: &str) -> AnalyticsError {
        AnalyticsError::StoredValueTypeMismatch { store: self.name.clone(), key: inner_key.to_string() }
    }

    pub fn get_long(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Result<i64, AnalyticsError> {
        match self.get(backend, match_id, inner_key) {
            None => Ok(0),
            Some(v) => v.as_i64().ok_or_else(|| self.type_mismatch(inner_key)),
        }
    }

    pub fn get_double(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Result<f64, AnalyticsError> {
        match self.get(backend, match_id, inner_key) {
            None => Ok(0.0),
            Some(v) => v.as_f64().ok_or_else(|| self.type_mismatch(inner_key)),
        }
    }

    pub fn get_boolean(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Result<bool, AnalyticsError> {
        match self.get(backend, match_id, inner_key) {
            None => Ok(false),
            Some(v) => v.as_bool().ok_or_else(|| self.type_mismatch(inner_key)),
        }
    }

    pub fn get_string(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Option<String> {
        self.get(backend, match_id, inner_key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Every inner key this store currently has a value for, in this match.
    pub fn known_inner_keys(&self, backend: &StateBackend, match_id: &str) -> Vec<String> {
        backend.known_inner_keys(match_id, &self.name)
    }

    /// Removes the value, so a subsequent read sees the zero/unset default
    /// again. Used to model "no player / no team" explicitly rather than
    /// the source's `"null"` string sentinel.
    pub fn clear(&self, backend: &mut StateBackend, match_id: &str, inner_key: &str) {
        backend.match_mut(match_id).single.remove(&(self.name.clone(), inner_key.to_string()));
    }

    /// Atomic read-modify-write: reads the current double (defaulting to
    /// 0.0), adds `delta`, stores and returns the new value.
    pub fn increase(&self, backend: &mut StateBackend, match_id: &str, inner_key: &str, delta: f64) -> Result<f64, AnalyticsError> {
        let updated = self.get_double(backend, match_id, inner_key)? + delta;
        self.put(backend, match_id, inner_key, updated);
        Ok(updated)
    }

    /// Integer counterpart of [`SingleValueStore::increase`].
    pub fn increase_long(&self, backend: &mut StateBackend, match_id: &str, inner_key: &str, delta: i64) -> Result<i64, AnalyticsError> {
        let updated = self.get_long(backend, match_id, inner_key)? + delta;
        self.put(backend, match_id, inner_key, updated);
        Ok(updated)
    }
}

/// Mapping *(match-id, inner-key) → bounded deque of T with capacity N*,
/// newest-first. N is fixed per store at construction.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    name: String,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self { name: name.into(), capacity }
    }

    fn key(&self, inner_key: &str) -> (String, String) {
        (self.name.clone(), inner_key.to_string())
    }

    /// Prepends `value`, dropping the oldest entry beyond this store's
    /// capacity.
    pub fn add(&self, backend: &mut StateBackend, match_id: &str, inner_key: &str, value: impl Into<Value>) {
        let key = self.key(inner_key);
        let deque = backend.match_mut(match_id).history.entry(key).or_default();
        deque.push_front(value.into());
        while deque.len() > self.capacity {
            deque.pop_back();
        }
    }

    /// Newest-first view of the stored history; never contains more than
    /// `capacity` entries and never contains an absent slot.
    pub fn get_list(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Vec<Value> {
        backend
            .match_ref(match_id)
            .and_then(|m| m.history.get(&self.key(inner_key)))
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_latest(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> Option<Value> {
        backend.match_ref(match_id).and_then(|m| m.history.get(&self.key(inner_key))).and_then(|d| d.front().cloned())
    }

    pub fn len(&self, backend: &StateBackend, match_id: &str, inner_key: &str) -> usize {
        backend.match_ref(match_id).and_then(|m| m.history.get(&self.key(inner_key))).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_store_defaults_to_zero_when_unset() {
        let backend = StateBackend::new();
        let store = SingleValueStore::new("possessionCount");
        assert_eq!(store.get_long(&backend, "m1", "p1").unwrap(), 0);
        assert_eq!(store.get_double(&backend, "m1", "p1").unwrap(), 0.0);
        assert!(!store.get_boolean(&backend, "m1", "p1").unwrap());
    }

    #[test]
    fn single_value_store_put_get_roundtrip() {
        let mut backend = StateBackend::new();
        let store = SingleValueStore::new("ballInField");
        store.put(&mut backend, "m1", "all", true);
        assert!(store.get_boolean(&backend, "m1", "all").unwrap());
    }

    #[test]
    fn increase_is_read_modify_write_from_zero() {
        let mut backend = StateBackend::new();
        let store = SingleValueStore::new("numSuccessfulPasses");
        assert_eq!(store.increase(&mut backend, "m1", "A1", 1.0).unwrap(), 1.0);
        assert_eq!(store.increase(&mut backend, "m1", "A1", 1.0).unwrap(), 2.0);
    }

    #[test]
    fn type_mismatch_on_read_is_a_structured_error() {
        let mut backend = StateBackend::new();
        let store = SingleValueStore::new("playerInPossession");
        store.put(&mut backend, "m1", "all", "P1".to_string());
        assert!(matches!(store.get_long(&backend, "m1", "all"), Err(AnalyticsError::StoredValueTypeMismatch { .. })));
    }

    #[test]
    fn distinct_matches_are_disjoint() {
        let mut backend = StateBackend::new();
        let store = SingleValueStore::new("score");
        store.put(&mut backend, "m1", "teamA", 3_i64);
        assert_eq!(store.get_long(&backend, "m2", "teamA").unwrap(), 0);
        assert_eq!(store.get_long(&backend, "m1", "teamA").unwrap(), 3);
    }

    #[test]
    fn history_store_caps_at_capacity_newest_first() {
        let mut backend = StateBackend::new();
        let store = HistoryStore::new("ballVabsHistory", 3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            store.add(&mut backend, "m1", "ball", v);
        }
        let list = store.get_list(&backend, "m1", "ball");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].as_f64(), Some(5.0));
        assert_eq!(list[1].as_f64(), Some(4.0));
        assert_eq!(list[2].as_f64(), Some(3.0));
    }

    #[test]
    fn history_store_get_latest_and_empty_defaults() {
        let backend = StateBackend::new();
        let store = HistoryStore::new("ballPositionHistory", 3);
        assert_eq!(store.get_latest(&backend, "m1", "ball"), None);
        assert!(store.get_list(&backend, "m1", "ball").is_empty());
    }

    #[test]
    fn known_inner_keys_enumerates_a_stores_roster() {
        let mut backend = StateBackend::new();
        let positions = SingleValueStore::new("playerPosition");
        positions.put(&mut backend, "m1", "P1", Value::Double(1.0));
        positions.put(&mut backend, "m1", "P2", Value::Double(2.0));
        let mut keys = positions.known_inner_keys(&backend, "m1");
        keys.sort();
        assert_eq!(keys, vec!["P1".to_string(), "P2".to_string()]);
        assert!(positions.known_inner_keys(&backend, "m2").is_empty());
    }

    #[test]
    fn reset_match_drops_all_of_its_state() {
        let mut backend = StateBackend::new();
        let single = SingleValueStore::new("score");
        let history = HistoryStore::new("positions", 2);
        single.put(&mut backend, "m1", "teamA", 1_i64);
        history.add(&mut backend, "m1", "ball", 1.0);
        backend.reset_match("m1");
        assert_eq!(single.get_long(&backend, "m1", "teamA").unwrap(), 0);
        assert!(history.get_list(&backend, "m1", "ball").is_empty());
    }

    proptest::proptest! {
        /// §8 property 5: a history store never holds more than its
        /// configured capacity, regardless of how many values are pushed,
        /// and always orders them newest-first.
        #[test]
        fn history_store_never_exceeds_capacity(capacity in 1usize..8, values in proptest::collection::vec(-1000.0..1000.0_f64, 0..40)) {
            let mut backend = StateBackend::new();
            let store = HistoryStore::new("propHistory", capacity);
            for v in &values {
                store.add(&mut backend, "m1", "k", *v);
            }
            let list = store.get_list(&backend, "m1", "k");
            prop_assert!(list.len() <= capacity);
            prop_assert_eq!(list.len(), values.len().min(capacity));
            for (stored, expected) in list.iter().zip(values.iter().rev()) {
                prop_assert_eq!(stored.as_f64(), Some(*expected));
            }
        }

        /// §8 property 1/7: distinct match ids never observe each other's
        /// state through the same store.
        #[test]
        fn single_value_store_matches_never_leak(match_a in "[a-z]{1,8}", match_b in "[a-z]{1,8}", value in -1000.0..1000.0_f64) {
            prop_assume!(match_a != match_b);
            let mut backend = StateBackend::new();
            let store = SingleValueStore::new("propScore");
            store.put(&mut backend, &match_a, "k", value);
            prop_assert_eq!(store.get_double(&backend, &match_a, "k").unwrap(), value);
            prop_assert_eq!(store.get_double(&backend, &match_b, "k").unwrap(), 0.0);
        }
    }
}
