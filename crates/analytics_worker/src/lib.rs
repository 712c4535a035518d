//! Reference launcher library (§6, A.1, A.7): wires `analytics_core`'s
//! processor graphs into one concrete worker topology and owns the
//! per-match static-state seeding the binary's stdin loop relies on.
//!
//! The CLI (`main.rs`) is the only caller; this module has no process
//! lifecycle of its own (no stdin/stdout, no signal handling) so the
//! topology and seeding logic stay unit-testable without a subprocess
//! harness.

pub mod config;
pub mod graph;
pub mod sink;

pub use config::WorkerConfig;
pub use graph::build_graphs;
pub use sink::OutputSink;

use analytics_core::error::ConfigError;
use analytics_core::state::StateBackend;
use std::collections::HashSet;
use std::sync::Mutex;

/// Tracks which match ids have already had their static state (field
/// dimensions, rename maps, mirrored flags, ball-in-field default) seeded,
/// so the worker does it exactly once per match regardless of how many
/// elements for that match have already streamed through.
#[derive(Default)]
pub struct MatchSeeder {
    seen: Mutex<HashSet<String>>,
}

impl MatchSeeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `match_id`'s static state on first sight; a no-op on every
    /// later call for the same match.
    pub fn seed_if_new(&self, backend: &mut StateBackend, config: &WorkerConfig, match_id: &str) {
        {
            let mut seen = self.seen.lock().expect("match seeder mutex poisoned");
            if !seen.insert(match_id.to_string()) {
                return;
            }
        }
        config.seed_match_state(backend, match_id);
        tracing::info!(match_id, "seeded static match state");
    }
}

/// Loads the merged global+worker configuration (per-worker file wins)
/// and fails fast with a `ConfigError` on any malformed or inconsistent
/// value, per §7's "configuration errors are fatal at startup".
pub fn load_config(global_path: Option<&std::path::Path>, worker_path: Option<&std::path::Path>) -> Result<WorkerConfig, ConfigError> {
    let global = match global_path {
        Some(path) => analytics_core::config::Config::load_file(path)?,
        None => analytics_core::config::Config::new(),
    };
    let merged = match worker_path {
        Some(path) => global.merged_with(&analytics_core::config::Config::load_file(path)?),
        None => global,
    };
    WorkerConfig::from_config(&merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_each_match_exactly_once() {
        let mut backend = StateBackend::new();
        let config = WorkerConfig::from_config(&analytics_core::config::Config::new()).unwrap();
        let seeder = MatchSeeder::new();

        seeder.seed_if_new(&mut backend, &config, "m1");
        let field_length = analytics_core::state::SingleValueStore::new(analytics_core::detectors::stores::FIELD_LENGTH)
            .get_double(&backend, "m1", "all")
            .unwrap();
        assert!(field_length > 0.0);

        analytics_core::state::SingleValueStore::new(analytics_core::detectors::stores::FIELD_LENGTH).put(&mut backend, "m1", "all", 1.0_f64);
        seeder.seed_if_new(&mut backend, &config, "m1");
        let unchanged = analytics_core::state::SingleValueStore::new(analytics_core::detectors::stores::FIELD_LENGTH)
            .get_double(&backend, "m1", "all")
            .unwrap();
        assert_eq!(unchanged, 1.0);
    }
}
