use serde_json::json;

use stategraph::channels::ChannelRegistry;
use stategraph::graphs::StateGraph;
use stategraph::runtimes::{
    Checkpoint, CheckpointSaver, InMemorySaver, RunConfig, RunnerError,
};
use stategraph::state::{StateUpdate, UpdateValue};
use stategraph::types::NodeKind;

mod common;
use common::*;

fn checkpoint(node: &str, next: Option<&str>) -> Checkpoint {
    Checkpoint::new(
        node.to_string(),
        next.map(str::to_string),
        b"{}".to_vec(),
    )
}

#[tokio::test]
async fn saver_put_get_list_roundtrip() {
    let saver = InMemorySaver::new();
    let first = saver.put("t1", checkpoint("a", Some("b"))).await.unwrap();
    let second = saver.put("t1", checkpoint("b", None)).await.unwrap();
    assert_ne!(first, second);

    // Latest is defined by insertion order.
    let latest = saver.get("t1", None).await.unwrap().unwrap();
    assert_eq!(latest.id, second);

    let by_id = saver.get("t1", Some(first.as_str())).await.unwrap().unwrap();
    assert_eq!(by_id.node, "a");

    let log = saver.list("t1").await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].id, first);
    assert_eq!(log[1].id, second);
}

#[tokio::test]
async fn saver_is_isolated_per_thread() {
    let saver = InMemorySaver::new();
    saver.put("t1", checkpoint("a", None)).await.unwrap();
    assert!(saver.get("t2", None).await.unwrap().is_none());
    assert!(saver.list("t2").await.unwrap().is_empty());
}

#[tokio::test]
async fn saver_delete_and_release() {
    let saver = InMemorySaver::new();
    let id = saver.put("t1", checkpoint("a", None)).await.unwrap();
    saver.put("t1", checkpoint("b", None)).await.unwrap();

    saver.delete("t1", &id).await.unwrap();
    assert_eq!(saver.list("t1").await.unwrap().len(), 1);

    saver.release("t1").await.unwrap();
    assert!(saver.get("t1", None).await.unwrap().is_none());
    // Releasing an unknown thread is a no-op.
    saver.release("missing").await.unwrap();
}

#[tokio::test]
async fn interrupt_before_pauses_and_resume_completes() {
    let (_saver, compile_config) = memory_saver_config();
    let compile_config = compile_config.with_interrupt_before(["b"]);

    let build = |config| {
        StateGraph::new(msgs_schema())
            .add_node_arc("a", append_node("msgs", json!("from-a")))
            .unwrap()
            .add_node_arc("b", append_node("msgs", json!("from-b")))
            .unwrap()
            .add_edge("__START__", "a")
            .unwrap()
            .add_edge("a", "b")
            .unwrap()
            .add_edge("b", "__END__")
            .unwrap()
            .compile(config)
            .unwrap()
    };
    let compiled = build(compile_config);

    let config = RunConfig::new().with_thread_id("interrupted-thread");
    let snapshots = compiled
        .stream(Default::default(), config.clone())
        .drain()
        .await
        .unwrap();

    // The stream ends after `a`'s snapshot, which carries the resume cursor.
    assert_eq!(snapshots.len(), 1);
    let paused = &snapshots[0];
    assert_eq!(paused.node, NodeKind::Custom("a".into()));
    assert_eq!(paused.next_node, Some(NodeKind::Custom("b".into())));
    let cursor = paused.checkpoint_id.clone().unwrap();

    // Resuming with the cursor finishes the run.
    let resume = config.with_checkpoint_id(cursor);
    let resumed = compiled
        .stream(Default::default(), resume)
        .drain()
        .await
        .unwrap();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].node, NodeKind::Custom("b".into()));
    assert!(resumed[0].is_terminal());
    assert_eq!(
        resumed[0].state.get("msgs"),
        Some(&json!(["from-a", "from-b"]))
    );
}

#[tokio::test]
async fn resumed_run_matches_an_uninterrupted_one() {
    let build = |config| {
        StateGraph::new(msgs_schema())
            .add_node_arc("a", append_node("msgs", json!("one")))
            .unwrap()
            .add_node_arc("b", append_node("msgs", json!("two")))
            .unwrap()
            .add_edge("__START__", "a")
            .unwrap()
            .add_edge("a", "b")
            .unwrap()
            .add_edge("b", "__END__")
            .unwrap()
            .compile(config)
            .unwrap()
    };

    // Uninterrupted reference run.
    let plain = build(stategraph::runtimes::CompileConfig::default());
    let expected = plain
        .invoke(Default::default(), RunConfig::new())
        .await
        .unwrap();

    // Interrupted-and-resumed run over the same graph.
    let (_saver, config) = memory_saver_config();
    let interrupted = build(config.with_interrupt_before(["b"]));
    let run = RunConfig::new().with_thread_id("compare");
    let paused = interrupted
        .stream(Default::default(), run.clone())
        .drain()
        .await
        .unwrap();
    let cursor = paused.last().unwrap().checkpoint_id.clone().unwrap();
    let resumed = interrupted
        .stream(Default::default(), run.with_checkpoint_id(cursor))
        .drain()
        .await
        .unwrap();

    assert_eq!(resumed.last().unwrap().state, expected);
}

#[tokio::test]
async fn interrupt_after_pauses_past_the_merge() {
    let (_saver, config) = memory_saver_config();
    let compiled = StateGraph::new(count_schema())
        .add_node_arc("a", static_node("count", json!(1)))
        .unwrap()
        .add_node_arc("b", static_node("count", json!(2)))
        .unwrap()
        .add_edge("__START__", "a")
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("b", "__END__")
        .unwrap()
        .compile(config.with_interrupt_after(["a"]))
        .unwrap();

    let run = RunConfig::new().with_thread_id("after-thread");
    let snapshots = compiled
        .stream(Default::default(), run.clone())
        .drain()
        .await
        .unwrap();

    // `a` merged and was emitted, then the run paused.
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].state.get("count"), Some(&json!(1)));
    assert_eq!(snapshots[0].next_node, Some(NodeKind::Custom("b".into())));

    // Resume via next_node instead of an explicit checkpoint id.
    let resumed = compiled
        .stream(Default::default(), run.with_next_node("b"))
        .drain()
        .await
        .unwrap();
    assert_eq!(
        resumed.last().unwrap().state.get("count"),
        Some(&json!(2))
    );
}

#[tokio::test]
async fn get_state_returns_the_latest_snapshot() {
    let (_saver, config) = memory_saver_config();
    let compiled = StateGraph::new(count_schema())
        .add_node_arc("a", static_node("count", json!(5)))
        .unwrap()
        .add_edge("__START__", "a")
        .unwrap()
        .add_edge("a", "__END__")
        .unwrap()
        .compile(config)
        .unwrap();

    let run = RunConfig::new().with_thread_id("inspect");
    compiled
        .invoke(Default::default(), run.clone())
        .await
        .unwrap();

    let snapshot = compiled.get_state(&run).await.unwrap();
    assert_eq!(snapshot.node, NodeKind::Custom("a".into()));
    assert_eq!(snapshot.state.get("count"), Some(&json!(5)));
    assert!(snapshot.is_terminal());
}

#[tokio::test]
async fn state_history_is_ordered_by_step() {
    let (_saver, config) = memory_saver_config();
    let compiled = StateGraph::new(count_schema())
        .add_node_arc("a", static_node("count", json!(1)))
        .unwrap()
        .add_node_arc("b", static_node("count", json!(2)))
        .unwrap()
        .add_edge("__START__", "a")
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("b", "__END__")
        .unwrap()
        .compile(config)
        .unwrap();

    let run = RunConfig::new().with_thread_id("history");
    compiled
        .invoke(Default::default(), run.clone())
        .await
        .unwrap();

    let history = compiled.state_history(&run).await.unwrap();
    let nodes: Vec<NodeKind> = history.iter().map(|s| s.node.clone()).collect();
    assert_eq!(
        nodes,
        vec![
            NodeKind::Start,
            NodeKind::Custom("a".into()),
            NodeKind::Custom("b".into())
        ]
    );
    assert_eq!(
        history.last().unwrap().state.get("count"),
        Some(&json!(2))
    );
}

#[tokio::test]
async fn update_state_inserts_a_synthetic_checkpoint() {
    let (_saver, config) = memory_saver_config();
    let compiled = StateGraph::new(count_schema())
        .add_node_arc("a", static_node("count", json!(1)))
        .unwrap()
        .add_node_arc("b", static_node("seen", json!(true)))
        .unwrap()
        .add_edge("__START__", "a")
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("b", "__END__")
        .unwrap()
        .compile(config.with_interrupt_before(["b"]))
        .unwrap();

    let run = RunConfig::new().with_thread_id("edit");
    compiled
        .stream(Default::default(), run.clone())
        .drain()
        .await
        .unwrap();

    // Overwrite `count` as if node `a` had produced 100.
    let mut values = StateUpdate::default();
    values.insert("count".to_string(), UpdateValue::Value(json!(100)));
    let edited = compiled
        .update_state(&run, values, Some("a"))
        .await
        .unwrap();

    let snapshot = compiled.get_state(&edited).await.unwrap();
    assert_eq!(snapshot.state.get("count"), Some(&json!(100)));
    assert_eq!(snapshot.next_node, Some(NodeKind::Custom("b".into())));

    // Resuming from the edited checkpoint continues with the new value.
    let resumed = compiled
        .stream(Default::default(), edited)
        .drain()
        .await
        .unwrap();
    let final_state = &resumed.last().unwrap().state;
    assert_eq!(final_state.get("count"), Some(&json!(100)));
    assert_eq!(final_state.get("seen"), Some(&json!(true)));
}

#[tokio::test]
async fn release_thread_drops_the_log_after_completion() {
    let (saver, config) = memory_saver_config();
    let compiled = StateGraph::new(count_schema())
        .add_node_arc("a", static_node("count", json!(1)))
        .unwrap()
        .add_edge("__START__", "a")
        .unwrap()
        .add_edge("a", "__END__")
        .unwrap()
        .compile(config.with_release_thread(true))
        .unwrap();

    let run = RunConfig::new().with_thread_id("released");
    compiled
        .invoke(Default::default(), run.clone())
        .await
        .unwrap();

    assert!(saver.list("released").await.unwrap().is_empty());
    let err = compiled.get_state(&run).await.unwrap_err();
    assert!(matches!(err, RunnerError::NoCheckpoint { .. }));
}

#[tokio::test]
async fn get_state_without_a_saver_is_an_error() {
    let compiled = StateGraph::new(count_schema())
        .add_node_arc("a", static_node("count", json!(1)))
        .unwrap()
        .add_edge("__START__", "a")
        .unwrap()
        .add_edge("a", "__END__")
        .unwrap()
        .compile(stategraph::runtimes::CompileConfig::default())
        .unwrap();

    let err = compiled.get_state(&RunConfig::new()).await.unwrap_err();
    assert!(matches!(err, RunnerError::SaverUnconfigured));
}
