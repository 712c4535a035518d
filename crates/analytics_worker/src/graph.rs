//! The worker's processor-graph topology (§4, A.1): one
//! [`SingleElementProcessorGraph`] rooted at the raw-position stream, and
//! one [`WindowProcessorGraph`] for the tick-triggered heatmap sender.
//!
//! Shape, in order of the `SingleElementProcessorGraph`'s single root:
//!
//! ```text
//! FilterModule(streamName == rawPosition)
//!  └─ FieldObjectStateGenerator                      -> fieldObjectState
//!      ├─ FilterModule(objectIds[0] != ball)           (player branch)
//!      │   └─ StoreModule(player roster: position/team/velocity/vAbs)
//!      │       ├─ ZoneClassifier
//!      │       ├─ DribblingSpeedDetector               -> sink
//!      │       ├─ TeamAreaDetector                     -> sink
//!      │       ├─ HeatmapConstructionDetector
//!      │       └─ OffsideDetector                      -> sink
//!      └─ FilterModule(objectIds[0] == ball)            (ball branch)
//!          └─ StoreModule(ball vAbs/position history)
//!              ├─ PossessionDuelDetector                -> sink
//!              │   └─ sink + PassShotClassifier#1       -> sink
//!              │       └─ PassCombinationDetector#1     -> sink
//!              ├─ KickDetector                          -> sink
//!              ├─ KickoffDetector                       -> sink
//!              ├─ PressingIndexDetector
//!              ├─ SetPlayDetector#1 (quiescence)          -> sink
//!              ├─ AreaDetector(goal areas)               -> sink
//!              │   └─ sink + PassShotClassifier#2        -> sink
//!              │       └─ PassCombinationDetector#2      -> sink
//!              └─ AreaDetector(out-of-bounds lines)       -> sink
//!                  └─ SetPlayDetector#2 (boundary exits)  -> sink
//! ```
//!
//! `PassShotClassifier` and `PassCombinationDetector` are each
//! instantiated twice — once per second-event source — because the graph
//! has no merge/union node; both instances share state correctly since
//! every store is keyed by name string, not by processor identity.
//! `SetPlayDetector` is likewise instantiated twice: once on the ball's own
//! `fieldObjectState` ticks (quiescence tracking) and once on the
//! out-of-bounds `AreaDetector`'s output (immediate boundary-exit
//! classification); both read/write the same named stores.

use crate::sink::OutputSink;
use crate::WorkerConfig;
use analytics_core::detectors::area::AreaDetector;
use analytics_core::detectors::dribbling_speed::DribblingSpeedDetector;
use analytics_core::detectors::field_object_state::FieldObjectStateGenerator;
use analytics_core::detectors::heatmap::{HeatmapConstructionDetector, HeatmapSender};
use analytics_core::detectors::kick::KickDetector;
use analytics_core::detectors::kickoff_offside::{KickoffDetector, OffsideDetector};
use analytics_core::detectors::pass_combination::PassCombinationDetector;
use analytics_core::detectors::pass_shot::PassShotClassifier;
use analytics_core::detectors::possession_duel::PossessionDuelDetector;
use analytics_core::detectors::set_play::SetPlayDetector;
use analytics_core::detectors::stores;
use analytics_core::detectors::team_area_pressing::{PressingIndexDetector, TeamAreaDetector};
use analytics_core::detectors::zone::ZoneClassifier;
use analytics_core::element::Schema;
use analytics_core::processor::{Combinator, FilterModule, GraphNode, HistoryWrite, Predicate, SingleElementProcessorGraph, SingleValueWrite, StoreModule, WindowProcessorGraph};
use analytics_core::state::{HistoryStore, SingleValueStore};

fn object_id_schema() -> Schema {
    Schema::ArrayValue { name: "objectIds".to_string(), index: 0, in_payload: false }
}

fn group_id_schema() -> Schema {
    Schema::ArrayValue { name: "groupIds".to_string(), index: 0, in_payload: false }
}

fn player_roster_store() -> StoreModule {
    StoreModule::new(
        "playerRosterStore",
        vec![
            SingleValueWrite { inner_key_schema: object_id_schema(), value_schema: Schema::PositionValue { index: 0 }, store: SingleValueStore::new(stores::PLAYER_POSITION) },
            SingleValueWrite { inner_key_schema: object_id_schema(), value_schema: group_id_schema(), store: SingleValueStore::new(stores::PLAYER_TEAM) },
            SingleValueWrite {
                inner_key_schema: object_id_schema(),
                value_schema: Schema::FieldValue { name: "velocity".to_string(), in_payload: true },
                store: SingleValueStore::new(stores::PLAYER_VELOCITY),
            },
            SingleValueWrite {
                inner_key_schema: object_id_schema(),
                value_schema: Schema::FieldValue { name: "vAbs".to_string(), in_payload: true },
                store: SingleValueStore::new(stores::PLAYER_VABS),
            },
        ],
        Vec::new(),
    )
}

fn ball_history_store() -> StoreModule {
    StoreModule::new(
        "ballHistoryStore",
        Vec::new(),
        vec![
            HistoryWrite {
                inner_key_schema: Schema::Static("ball".to_string()),
                value_schema: Schema::FieldValue { name: "vAbs".to_string(), in_payload: true },
                store: HistoryStore::new(stores::BALL_VABS_HISTORY, 2),
            },
            HistoryWrite {
                inner_key_schema: Schema::Static("ball".to_string()),
                value_schema: Schema::PositionValue { index: 0 },
                store: HistoryStore::new(stores::BALL_POSITION_HISTORY, 3),
            },
        ],
    )
}

fn sink_node(sink: &OutputSink) -> GraphNode {
    GraphNode::new(sink.clone())
}

/// Builds the player branch: the roster-writing store plus every detector
/// that consumes per-player `fieldObjectState` samples.
fn player_branch(config: &WorkerConfig, sink: &OutputSink) -> GraphNode {
    let roster_store = player_roster_store();

    GraphNode::new(FilterModule::new(
        "playerFilter",
        vec![Predicate::NotEq(object_id_schema(), config.ball_object_id.clone())],
        Combinator::And,
    ))
    .with_child(
        GraphNode::new(roster_store)
            .with_child(GraphNode::new(ZoneClassifier::new(config.zone)))
            .with_child(GraphNode::new(DribblingSpeedDetector::new(config.dribbling_speed.clone())).with_child(sink_node(sink)))
            .with_child(GraphNode::new(TeamAreaDetector::new(config.team_area)).with_child(sink_node(sink)))
            .with_child(GraphNode::new(HeatmapConstructionDetector::new(config.heatmap.clone())))
            .with_child(GraphNode::new(OffsideDetector::new(config.offside)).with_child(sink_node(sink))),
    )
}

/// Builds the ball branch: the vAbs/position history store plus every
/// detector that consumes the ball's own `fieldObjectState` samples, with
/// the pass-and-shot classifier fanned in from both second-event sources.
fn ball_branch(config: &WorkerConfig, sink: &OutputSink) -> GraphNode {
    let history_store = ball_history_store();

    let pass_shot_from_possession = GraphNode::new(PassShotClassifier::new(config.pass_shot))
        .with_child(sink_node(sink))
        .with_child(GraphNode::new(PassCombinationDetector::new(config.pass_combination)).with_child(sink_node(sink)));

    let pass_shot_from_area = GraphNode::new(PassShotClassifier::new(config.pass_shot))
        .with_child(sink_node(sink))
        .with_child(GraphNode::new(PassCombinationDetector::new(config.pass_combination)).with_child(sink_node(sink)));

    GraphNode::new(FilterModule::new(
        "ballFilter",
        vec![Predicate::Eq(object_id_schema(), config.ball_object_id.clone())],
        Combinator::And,
    ))
    .with_child(
        GraphNode::new(history_store)
            .with_child(GraphNode::new(PossessionDuelDetector::new(config.possession_duel)).with_child(sink_node(sink)).with_child(pass_shot_from_possession))
            .with_child(GraphNode::new(KickDetector::new(config.kick)).with_child(sink_node(sink)))
            .with_child(GraphNode::new(KickoffDetector::new(config.kickoff)).with_child(sink_node(sink)))
            .with_child(GraphNode::new(PressingIndexDetector::new(config.pressing_index)))
            .with_child(GraphNode::new(SetPlayDetector::new(config.set_play.clone())).with_child(sink_node(sink)))
            .with_child(
                GraphNode::new(AreaDetector::new(config.goal_areas.clone()))
                    .with_child(sink_node(sink))
                    .with_child(pass_shot_from_area),
            )
            .with_child(
                GraphNode::new(AreaDetector::new(config.out_of_bounds_areas.clone()))
                    .with_child(sink_node(sink))
                    .with_child(GraphNode::new(SetPlayDetector::new(config.set_play.clone())).with_child(sink_node(sink))),
            ),
    )
}

/// Builds both processor graphs the worker drives: the single-element
/// graph every stream-element line is fed through, and the window graph
/// ticked periodically for the heatmap sender.
pub fn build_graphs(config: &WorkerConfig, sink: OutputSink) -> (SingleElementProcessorGraph, WindowProcessorGraph) {
    let raw_root = GraphNode::new(FilterModule::new("rawPositionFilter", vec![Predicate::Eq(Schema::StreamName, "rawPosition".to_string())], Combinator::And))
        .with_child(GraphNode::new(FieldObjectStateGenerator::new(config.field_object_state)).with_children(vec![player_branch(config, &sink), ball_branch(config, &sink)]));

    let single_element_graph = SingleElementProcessorGraph::new(vec![raw_root]);

    let window_graph = WindowProcessorGraph::new(vec![
        analytics_core::processor::graph::WindowGraphRoot::new(HeatmapSender::new(config.heatmap.clone())).with_child(sink_node(&sink)),
    ]);

    (single_element_graph, window_graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::config::Config;
    use analytics_core::element::{StreamCategory, StreamElement, Value};
    use analytics_core::geometry::Vec3;
    use analytics_core::state::StateBackend;

    fn raw_sample(match_id: &str, ts: i64, object: &str, group: &str, pos: Vec3) -> StreamElement {
        StreamElement::new("rawPosition", StreamCategory::Raw, match_id, ts)
            .with_object_ids(vec![object.to_string()])
            .with_group_ids(vec![group.to_string()])
            .with_positions(vec![pos])
    }

    #[test]
    fn raw_samples_flow_through_to_field_object_state_and_are_captured_only_via_sink_leaves() {
        let raw = Config::from_str("ballObjectId=ball\nfield.length=100\nfield.width=60\n").unwrap();
        let config = WorkerConfig::from_config(&raw).unwrap();
        let sink = OutputSink::new();
        let (graph, _window) = build_graphs(&config, sink.clone());
        let mut backend = StateBackend::new();
        config.seed_match_state(&mut backend, "m1");

        graph.process(&mut backend, &raw_sample("m1", 0, "P1", "A", Vec3::new(-40.0, 0.0, 0.0)));
        graph.process(&mut backend, &raw_sample("m1", 1000, "ball", "", Vec3::new(0.0, 0.0, 0.0)));

        // Neither sample alone triggers a detector event (no possession
        // change, no kick, no area crossing yet), so nothing reached the
        // sink, but the player roster store must already carry P1.
        assert!(sink.drain().is_empty());
        let pos = SingleValueStore::new(stores::PLAYER_POSITION).get(&backend, "m1", "P1").and_then(|v| v.as_vector());
        assert_eq!(pos, Some(Vec3::new(-40.0, 0.0, 0.0)));
    }

    #[test]
    fn ball_leaving_over_the_sideline_reaches_a_set_play_event_on_the_sink() {
        let raw = Config::from_str(
            "ballObjectId=ball\nfield.length=100\nfield.width=60\n\
             setPlayDetection.outOfBoundsAreas={rightSideline:-50:50:30:34}\n",
        )
        .unwrap();
        let config = WorkerConfig::from_config(&raw).unwrap();
        let sink = OutputSink::new();
        let (graph, _window) = build_graphs(&config, sink.clone());
        let mut backend = StateBackend::new();
        config.seed_match_state(&mut backend, "m1");

        graph.process(&mut backend, &raw_sample("m1", 0, "A1", "teamA", Vec3::new(-10.0, 0.0, 0.0)));
        graph.process(&mut backend, &raw_sample("m1", 0, "B1", "teamB", Vec3::new(10.0, 0.0, 0.0)));
        SingleValueStore::new(stores::TEAM_IN_POSSESSION).put(&mut backend, "m1", "all", "teamA".to_string());
        SingleValueStore::new(stores::LEFT_TEAM_ID).put(&mut backend, "m1", "all", "teamA".to_string());

        graph.process(&mut backend, &raw_sample("m1", 1000, "ball", "", Vec3::new(0.0, 32.0, 0.0)));

        let events = sink.drain();
        assert!(events.iter().any(|e| e.stream_name == "setPlayEvent" && e.payload.get("type").and_then(Value::as_str) == Some("throwIn")));
    }

    #[test]
    fn non_raw_elements_are_ignored_by_the_root_filter() {
        let config = WorkerConfig::from_config(&Config::new()).unwrap();
        let sink = OutputSink::new();
        let (graph, _window) = build_graphs(&config, sink.clone());
        let mut backend = StateBackend::new();

        let element = StreamElement::new("someOtherStream", StreamCategory::Event, "m1", 0).with_payload("x", Value::Long(1));
        graph.process(&mut backend, &element);
        assert!(sink.drain().is_empty());
    }
}
