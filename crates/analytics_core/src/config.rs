//! Flat key→string configuration (§6): a property bag merged from a global
//! file and a per-worker file, the latter's keys winning. Hand-rolled
//! rather than built on a generic config crate — the merge rule is a
//! two-tier override and every consumer wants a specific typed accessor
//! (threshold doubles, comma-separated lists, `{id:group}` cohort lists),
//! not a deserialize-into-struct shape.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` lines; blank lines and lines starting with `#`
    /// are ignored. A line without `=` is a configuration error.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (lineno, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: format!("line {}", lineno + 1),
                    value: raw_line.to_string(),
                    reason: "expected `key=value`".to_string(),
                }
            })?;
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Inconsistent(format!("failed to read {}: {e}", path.display())))?;
        Self::from_str(&contents)
    }

    /// Merges `other` over `self`; keys present in `other` override `self`.
    /// Used to layer a per-worker file over the global file.
    pub fn merged_with(mut self, other: &Config) -> Self {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.get_str(key).ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.get_str(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| invalid(key, v, "expected a floating point number")),
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        match self.get_str(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| invalid(key, v, "expected an integer")),
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.get_str(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| invalid(key, v, "expected a non-negative integer")),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_str(key) {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(v) => Err(invalid(key, v, "expected true/false")),
        }
    }

    /// Comma-separated list of doubles, e.g. `speedLevelThresholds`.
    pub fn get_f64_list(&self, key: &str) -> Result<Vec<f64>, ConfigError> {
        match self.get_str(key) {
            None => Ok(Vec::new()),
            Some(v) if v.is_empty() => Ok(Vec::new()),
            Some(v) => v
                .split(',')
                .map(str::trim)
                .map(|part| part.parse::<f64>().map_err(|_| invalid(key, v, "expected a comma-separated list of numbers")))
                .collect(),
        }
    }

    /// Cohort list encoded as `{id:group},{id:group},…` (e.g.
    /// `streamTeam.teams`, `streamTeam.players`).
    pub fn get_id_group_list(&self, key: &str) -> Result<Vec<(String, String)>, ConfigError> {
        let raw = match self.get_str(key) {
            None => return Ok(Vec::new()),
            Some(v) if v.is_empty() => return Ok(Vec::new()),
            Some(v) => v,
        };
        raw.split(',')
            .map(str::trim)
            .map(|entry| {
                let inner = entry
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                    .ok_or_else(|| invalid(key, raw, "expected `{id:group}` entries"))?;
                let (id, group) = inner.split_once(':').ok_or_else(|| invalid(key, raw, "expected `{id:group}` entries"))?;
                Ok((id.to_string(), group.to_string()))
            })
            .collect()
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string(), reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_and_skips_comments() {
        let cfg = Config::from_str("# comment\n\nstreamTeam.ball = ball1\nminKickDist=1.5\n").unwrap();
        assert_eq!(cfg.get_str("streamTeam.ball"), Some("ball1"));
        assert_eq!(cfg.get_f64("minKickDist", 0.0).unwrap(), 1.5);
    }

    #[test]
    fn per_worker_overrides_global() {
        let global = Config::from_str("minKickDist=1.0\nmaxDuelDist=2.0\n").unwrap();
        let worker = Config::from_str("minKickDist=1.5\n").unwrap();
        let merged = global.merged_with(&worker);
        assert_eq!(merged.get_f64("minKickDist", 0.0).unwrap(), 1.5);
        assert_eq!(merged.get_f64("maxDuelDist", 0.0).unwrap(), 2.0);
    }

    #[test]
    fn missing_key_defaults_vs_required() {
        let cfg = Config::new();
        assert_eq!(cfg.get_f64("missing", 9.0).unwrap(), 9.0);
        assert!(matches!(cfg.require_str("missing"), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn invalid_numeric_value_is_structured_error() {
        let cfg = Config::from_str("minKickDist=notanumber\n").unwrap();
        assert!(matches!(cfg.get_f64("minKickDist", 0.0), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn parses_speed_level_thresholds_list() {
        let cfg = Config::from_str("speedLevelThresholds=2.0,4.0,7.0\n").unwrap();
        assert_eq!(cfg.get_f64_list("speedLevelThresholds").unwrap(), vec![2.0, 4.0, 7.0]);
    }

    #[test]
    fn parses_id_group_cohort_list() {
        let cfg = Config::from_str("streamTeam.teams={teamA:Home},{teamB:Away}\n").unwrap();
        let teams = cfg.get_id_group_list("streamTeam.teams").unwrap();
        assert_eq!(teams, vec![("teamA".to_string(), "Home".to_string()), ("teamB".to_string(), "Away".to_string())]);
    }

    #[test]
    fn line_without_separator_is_a_config_error() {
        assert!(Config::from_str("not-a-key-value-line").is_err());
    }
}
