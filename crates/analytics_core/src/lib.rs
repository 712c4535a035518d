//! # analytics_core — Streaming Match-Analytics Engine
//!
//! Ingests a continuous stream of raw positional sensor samples from a
//! sports match and derives a family of higher-level game events and
//! per-player/per-team running statistics: ball possession changes, duels,
//! kicks, passes, shots, goals, pass sequences, dribblings, speed-level
//! changes, kickoffs, offside lines, set plays, area transitions, heatmaps,
//! team-area convex hulls, and a pressing index.
//!
//! All derivations are keyed by match identifier (see [`state`]) and
//! expressed as small, composable processors ([`processor`]) chained into
//! graphs. The crate performs no I/O; callers (see `analytics_worker`) own
//! the transport, the durable state mirror, and the worker process
//! lifecycle.

#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod detectors;
pub mod element;
pub mod error;
pub mod geometry;
pub mod object_info;
pub mod packing;
pub mod processor;
pub mod rename_map;
pub mod state;

pub use error::{AnalyticsError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
