//! Test suite for graph building, validation, and compilation.

use std::sync::Arc;

use serde_json::json;

use super::GraphError;
use super::builder::StateGraph;
use super::edges::Route;
use crate::channels::ChannelRegistry;
use crate::command::{Command, sync_command_fn};
use crate::node::{NodePartial, sync_node_fn};
use crate::runtimes::CompileConfig;
use crate::types::NodeKind;

fn noop() -> Arc<dyn crate::node::Node> {
    sync_node_fn(|_snapshot, _ctx| Ok(NodePartial::new()))
}

fn empty_graph() -> StateGraph {
    StateGraph::new(ChannelRegistry::new())
}

#[test]
fn add_node_rejects_duplicates() {
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_node_arc("a", noop()));
    assert!(matches!(result, Err(GraphError::DuplicateNode { .. })));
}

#[test]
fn add_node_rejects_virtual_endpoints() {
    assert!(matches!(
        empty_graph().add_node_arc(NodeKind::End, noop()),
        Err(GraphError::ReservedNode { .. })
    ));
    assert!(matches!(
        empty_graph().add_node_arc(NodeKind::Start, noop()),
        Err(GraphError::ReservedNode { .. })
    ));
}

#[test]
fn add_node_rejects_empty_id() {
    assert!(matches!(
        empty_graph().add_node_arc(NodeKind::Custom(String::new()), noop()),
        Err(GraphError::InvalidNodeId { .. })
    ));
}

#[test]
fn add_edge_rejects_end_as_source() {
    assert!(matches!(
        empty_graph().add_edge("__END__", "a"),
        Err(GraphError::EdgeFromEnd)
    ));
}

#[test]
fn add_edge_rejects_start_as_target() {
    assert!(matches!(
        empty_graph().add_edge("a", "__START__"),
        Err(GraphError::EdgeToStart { .. })
    ));
}

#[test]
fn conditional_edges_reject_duplicate_source() {
    let route = sync_command_fn(|_s, _c| Ok(Command::goto("x")));
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_conditional_edges("a", route.clone(), [("x", "__END__")]))
        .and_then(|g| g.add_conditional_edges("a", route.clone(), [("y", "__END__")]));
    assert!(matches!(
        result,
        Err(GraphError::DuplicateConditionalEdge { .. })
    ));
}

#[test]
fn conditional_edges_reject_empty_mapping() {
    let route = sync_command_fn(|_s, _c| Ok(Command::goto("x")));
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_conditional_edges("a", route, Vec::<(String, NodeKind)>::new()));
    assert!(matches!(result, Err(GraphError::EmptyMapping { .. })));
}

#[test]
fn plain_and_conditional_edges_cannot_mix() {
    let route = sync_command_fn(|_s, _c| Ok(Command::goto("x")));
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_node_arc("b", noop()))
        .and_then(|g| g.add_edge("a", "b"))
        .and_then(|g| g.add_conditional_edges("a", route, [("x", "__END__")]));
    assert!(matches!(
        result,
        Err(GraphError::ConditionalOnParallel { .. })
    ));
}

#[test]
fn compile_requires_an_entry_point() {
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_edge("a", "__END__"))
        .and_then(|g| g.compile(CompileConfig::default()));
    assert!(matches!(result, Err(GraphError::MissingEntryPoint)));
}

#[test]
fn compile_rejects_dangling_targets() {
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_edge("__START__", "a"))
        .and_then(|g| g.add_edge("a", "ghost"))
        .and_then(|g| g.compile(CompileConfig::default()));
    assert!(matches!(result, Err(GraphError::DanglingTarget { .. })));
}

#[test]
fn compile_rejects_unknown_sources() {
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_edge("__START__", "a"))
        .and_then(|g| g.add_edge("a", "__END__"))
        .and_then(|g| g.add_edge("ghost", "a"))
        .and_then(|g| g.compile(CompileConfig::default()));
    assert!(matches!(result, Err(GraphError::UnknownSource { .. })));
}

#[test]
fn compile_rejects_duplicate_parallel_targets() {
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_node_arc("b", noop()))
        .and_then(|g| g.add_edge("__START__", "a"))
        .and_then(|g| g.add_edge("a", "b"))
        .and_then(|g| g.add_edge("a", "b"))
        .and_then(|g| g.add_edge("b", "__END__"))
        .and_then(|g| g.compile(CompileConfig::default()));
    assert!(matches!(
        result,
        Err(GraphError::DuplicateParallelTarget { .. })
    ));
}

#[test]
fn compile_rejects_unknown_interrupt_nodes() {
    let config = CompileConfig::new().with_interrupt_before(["ghost"]);
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_edge("__START__", "a"))
        .and_then(|g| g.add_edge("a", "__END__"))
        .and_then(|g| g.compile(config));
    assert!(matches!(
        result,
        Err(GraphError::UnknownInterruptNode { .. })
    ));
}

#[test]
fn compile_rejects_divergent_parallel_branches() {
    let result = empty_graph()
        .add_node_arc("a", noop())
        .and_then(|g| g.add_node_arc("b", noop()))
        .and_then(|g| g.add_node_arc("c", noop()))
        .and_then(|g| g.add_node_arc("d", noop()))
        .and_then(|g| g.add_edge("__START__", "a"))
        .and_then(|g| g.add_edge("a", "b"))
        .and_then(|g| g.add_edge("a", "c"))
        .and_then(|g| g.add_edge("b", "d"))
        .and_then(|g| g.add_edge("c", "__END__"))
        .and_then(|g| g.add_edge("d", "__END__"))
        .and_then(|g| g.compile(CompileConfig::default()));
    assert!(matches!(
        result,
        Err(GraphError::InvalidParallelShape { .. })
    ));
}

#[test]
fn compile_lowers_routes() -> Result<(), GraphError> {
    let route = sync_command_fn(|_s, _c| Ok(Command::goto("done")));
    let compiled = empty_graph()
        .add_node_arc("a", noop())?
        .add_node_arc("b", noop())?
        .add_edge("__START__", "a")?
        .add_conditional_edges("a", route, [("done", "b"), ("again", "a")])?
        .add_edge("b", "__END__")?
        .compile(CompileConfig::default())?;

    assert!(matches!(
        compiled.routes().get(&NodeKind::Start),
        Some(Route::Direct(NodeKind::Custom(name))) if name == "a"
    ));
    assert!(matches!(
        compiled.routes().get(&NodeKind::Custom("a".into())),
        Some(Route::Conditional { mapping, .. }) if mapping.len() == 2
    ));
    assert!(matches!(
        compiled.routes().get(&NodeKind::Custom("b".into())),
        Some(Route::Direct(NodeKind::End))
    ));
    Ok(())
}

#[test]
fn command_node_installs_node_and_conditional_edge() -> Result<(), GraphError> {
    let decide = sync_command_fn(|_s, _c| Ok(Command::goto("left")));
    let graph = empty_graph()
        .add_node_arc("l", noop())?
        .add_node_arc("r", noop())?
        .add_command_node("router", decide, [("left", "l"), ("right", "r")])?;

    assert!(graph.nodes.contains_key(&NodeKind::Custom("router".into())));
    let edge = graph
        .conditional
        .get(&NodeKind::Custom("router".into()))
        .expect("conditional edge installed");
    assert_eq!(edge.mapping.len(), 2);
    assert_eq!(
        edge.target_for("left"),
        Some(&NodeKind::Custom("l".into()))
    );
    Ok(())
}

#[test]
fn unreachable_nodes_are_reported() -> Result<(), GraphError> {
    let graph = empty_graph()
        .add_node_arc("a", noop())?
        .add_node_arc("island", noop())?
        .add_edge("__START__", "a")?
        .add_edge("a", "__END__")?;

    assert_eq!(
        graph.unreachable_nodes(),
        vec![NodeKind::Custom("island".into())]
    );
    Ok(())
}

#[test]
fn subgraph_is_flattened_with_prefixed_names() -> Result<(), GraphError> {
    let inner = empty_graph()
        .add_node_arc("first", noop())?
        .add_node_arc("second", noop())?
        .add_edge("__START__", "first")?
        .add_edge("first", "second")?
        .add_edge("second", "__END__")?;

    let compiled = empty_graph()
        .add_node_arc("before", noop())?
        .add_node_arc("after", noop())?
        .add_subgraph("sub", inner)?
        .add_edge("__START__", "before")?
        .add_edge("before", "sub")?
        .add_edge("sub", "after")?
        .add_edge("after", "__END__")?
        .compile(CompileConfig::default())?;

    // Subgraph nodes are inlined under prefixed names.
    assert!(
        compiled
            .nodes()
            .contains_key(&NodeKind::Custom("sub.first".into()))
    );
    assert!(
        compiled
            .nodes()
            .contains_key(&NodeKind::Custom("sub.second".into()))
    );
    // The `sub` vertex itself is gone, replaced by the enter/exit splice.
    assert!(matches!(
        compiled.routes().get(&NodeKind::Custom("before".into())),
        Some(Route::Direct(NodeKind::Custom(name))) if name == "sub.first"
    ));
    assert!(matches!(
        compiled.routes().get(&NodeKind::Custom("sub.second".into())),
        Some(Route::Direct(NodeKind::Custom(name))) if name == "after"
    ));
    assert!(!compiled.routes().contains_key(&NodeKind::Custom("sub".into())));
    Ok(())
}

#[test]
fn state_update_vocabulary_round_trips_through_builders() {
    // Exercised here for coverage of the fluent helpers used throughout
    // the graph tests.
    let partial = NodePartial::new()
        .with_entry("k", json!(1))
        .with_goto("somewhere");
    assert_eq!(partial.update.len(), 1);
    assert_eq!(partial.goto.as_deref(), Some("somewhere"));
}
