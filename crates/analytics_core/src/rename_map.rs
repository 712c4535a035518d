//! Per-match object/team rename maps (§4.15, §6): a flat string encoding
//! `{oldId:newId}%{oldId:newId}%…`; an empty string is the identity map.
//! Parsing happens lazily, once per match, and the result is cached in
//! process for the life of the worker.

use crate::error::AnalyticsError;
use fxhash::FxHashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameMap {
    mapping: FxHashMap<String, String>,
}

impl RenameMap {
    pub fn parse(spec: &str) -> Result<Self, AnalyticsError> {
        let mut mapping = FxHashMap::default();
        for entry in spec.split('%') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let inner = entry
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .ok_or_else(|| AnalyticsError::MalformedRenameMap { entry: entry.to_string() })?;
            let (old, new) = inner.split_once(':').ok_or_else(|| AnalyticsError::MalformedRenameMap { entry: entry.to_string() })?;
            if old.is_empty() {
                return Err(AnalyticsError::MalformedRenameMap { entry: entry.to_string() });
            }
            mapping.insert(old.to_string(), new.to_string());
        }
        Ok(Self { mapping })
    }

    /// Renamed id, or the original id unchanged if it has no entry.
    pub fn apply(&self, id: &str) -> String {
        self.mapping.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

/// Caches one parsed [`RenameMap`] per match id. Parsing is fatal-on-error
/// only in the sense that a malformed map is reported; the cache itself
/// does not decide whether that is element-level or startup-fatal — the
/// caller does, since rename maps may arrive as part of either a
/// configuration descriptor or a per-match control stream.
#[derive(Debug, Default)]
pub struct RenameMapCache {
    inner: Mutex<FxHashMap<String, Arc<RenameMap>>>,
}

impl RenameMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached map for `match_id`, parsing `raw` on first use.
    pub fn get_or_parse(&self, match_id: &str, raw: &str) -> Result<Arc<RenameMap>, AnalyticsError> {
        let mut guard = self.inner.lock().expect("rename map cache lock poisoned");
        if let Some(existing) = guard.get(match_id) {
            return Ok(existing.clone());
        }
        let parsed = Arc::new(RenameMap::parse(raw)?);
        guard.insert(match_id.to_string(), parsed.clone());
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_identity() {
        let map = RenameMap::parse("").unwrap();
        assert_eq!(map.apply("P1"), "P1");
    }

    #[test]
    fn parses_multiple_entries() {
        let map = RenameMap::parse("{P1:Alice}%{P2:Bob}").unwrap();
        assert_eq!(map.apply("P1"), "Alice");
        assert_eq!(map.apply("P2"), "Bob");
        assert_eq!(map.apply("P3"), "P3");
    }

    #[test]
    fn rejects_malformed_entry() {
        assert!(RenameMap::parse("P1:Alice").is_err());
        assert!(RenameMap::parse("{P1-Alice}").is_err());
        assert!(RenameMap::parse("{:Alice}").is_err());
    }

    #[test]
    fn cache_parses_once_per_match() {
        let cache = RenameMapCache::new();
        let first = cache.get_or_parse("m1", "{P1:Alice}").unwrap();
        let second = cache.get_or_parse("m1", "{P1:Bob}").unwrap();
        assert_eq!(first.apply("P1"), "Alice");
        assert_eq!(second.apply("P1"), "Alice");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
