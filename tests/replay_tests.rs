use callpath_profile::aggregator::metrics::{calculate_hot_paths, render_path};
use callpath_profile::aggregator::{FunctionData, MetricValue, ReplaySession, SystemTree};
use callpath_profile::parser::{parse_events, TraceEvent};
use callpath_profile::utils::ReplayError;
use pretty_assertions::assert_eq;

const NESTED_TRACE: &str = r#"
# two locations, one nested call each
{"type":"define_region","id":1,"name":"main"}
{"type":"define_region","id":2,"name":"solve","paradigm":"user"}
{"type":"enter","location":0,"region":1,"time":0}
{"type":"enter","location":0,"region":2,"time":10}
{"type":"leave","location":0,"time":30}
{"type":"leave","location":0,"time":50}
{"type":"enter","location":1,"region":1,"time":5}
{"type":"enter","location":1,"region":2,"time":6}
{"type":"leave","location":1,"time":16}
{"type":"leave","location":1,"time":25}
"#;

#[test]
fn test_nested_calls_split_inclusive_and_exclusive_time() {
    let events = parse_events(NESTED_TRACE).unwrap();
    let mut session = ReplaySession::new();
    assert_eq!(session.replay(&events), 0);
    let outcome = session.finish();

    let tree = &outcome.tree;
    let main = tree.find_path(&[1]).unwrap();
    let solve = tree.find_path(&[1, 2]).unwrap();

    assert_eq!(tree.len(), 2);
    assert_eq!(
        tree.node(main).data(0).unwrap().function,
        FunctionData::new(1, 50, 30)
    );
    assert_eq!(
        tree.node(solve).data(0).unwrap().function,
        FunctionData::new(1, 20, 20)
    );
    assert_eq!(
        tree.node(main).data(1).unwrap().function,
        FunctionData::new(1, 20, 10)
    );
    assert_eq!(
        tree.node(main).total_function(),
        FunctionData::new(2, 70, 40)
    );
    assert!(outcome.failures.is_empty());
    assert!(outcome.unclosed.is_empty());
}

#[test]
fn test_definitions_after_events_still_name_paths() {
    let trace = r#"
{"type":"enter","location":3,"region":7,"time":100}
{"type":"leave","location":3,"time":140}
{"type":"define_region","id":7,"name":"MPI_Allreduce","paradigm":"mpi"}
{"type":"define_location","id":3,"name":"rank 3","kind":"process","process":3,"node":"n01","machine":"cluster"}
"#;
    let events = parse_events(trace).unwrap();
    let mut session = ReplaySession::new();
    session.replay(&events);
    let outcome = session.finish();

    let id = outcome.tree.find_path(&[7]).unwrap();
    assert_eq!(
        render_path(&outcome.tree, &outcome.definitions, id),
        "MPI_Allreduce"
    );

    let system = SystemTree::build(&outcome.definitions, &outcome.tree.locations());
    assert_eq!(system.location_count(), 1);
    assert_eq!(system.machines["cluster"].nodes["n01"].processes[&3], vec![3]);
}

#[test]
fn test_unknown_region_renders_placeholder() {
    let events = parse_events(
        r#"{"type":"enter","location":0,"region":42,"time":0}
{"type":"leave","location":0,"time":1}"#,
    )
    .unwrap();
    let mut session = ReplaySession::new();
    session.replay(&events);
    let outcome = session.finish();

    let hot = calculate_hot_paths(&outcome.tree, &outcome.definitions, 5);
    assert_eq!(hot.len(), 1);
    assert_eq!(hot[0].stack, "region#42");
    assert_eq!(outcome.definitions.unknown_lookups(), 1);
}

#[test]
fn test_broken_location_does_not_affect_others() {
    let events = vec![
        TraceEvent::Enter {
            location: 0,
            region: 1,
            time: 0,
        },
        TraceEvent::Leave {
            location: 1,
            time: 3,
        },
        TraceEvent::Enter {
            location: 1,
            region: 1,
            time: 4,
        },
        TraceEvent::Leave {
            location: 0,
            time: 9,
        },
    ];

    let mut session = ReplaySession::new();
    assert!(session.handle(&events[0]).is_ok());
    assert_eq!(
        session.handle(&events[1]),
        Err(ReplayError::StackUnderflow { location: 1 })
    );
    assert_eq!(
        session.handle(&events[2]),
        Err(ReplayError::LocationAborted { location: 1 })
    );
    assert!(session.handle(&events[3]).is_ok());
    assert!(session.is_aborted(1));
    assert!(!session.is_aborted(0));

    let outcome = session.finish();
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].location, 1);

    let root = outcome.tree.find_path(&[1]).unwrap();
    let node = outcome.tree.node(root);
    assert_eq!(node.data(0).unwrap().function, FunctionData::new(1, 9, 9));
    assert!(node.data(1).is_none());
}

#[test]
fn test_metric_deltas_follow_call_nesting() {
    let trace = r#"
{"type":"define_metric","id":0,"name":"PAPI_TOT_INS","value_type":"u64"}
{"type":"metric","location":0,"metric":0,"value":{"u64":1000},"time":0}
{"type":"enter","location":0,"region":1,"time":0}
{"type":"metric","location":0,"metric":0,"value":{"u64":1010},"time":2}
{"type":"enter","location":0,"region":2,"time":2}
{"type":"metric","location":0,"metric":0,"value":{"u64":1040},"time":6}
{"type":"leave","location":0,"time":6}
{"type":"metric","location":0,"metric":0,"value":{"u64":1100},"time":9}
{"type":"leave","location":0,"time":9}
"#;
    let events = parse_events(trace).unwrap();
    let mut session = ReplaySession::new();
    session.replay(&events);
    let outcome = session.finish();

    let tree = &outcome.tree;
    let outer = tree.node(tree.find_path(&[1]).unwrap()).data(0).unwrap();
    let inner = tree.node(tree.find_path(&[1, 2]).unwrap()).data(0).unwrap();

    assert_eq!(inner.metrics[&0].inclusive, MetricValue::U64(30));
    assert_eq!(inner.metrics[&0].exclusive, MetricValue::U64(30));
    assert_eq!(outer.metrics[&0].inclusive, MetricValue::U64(100));
    assert_eq!(outer.metrics[&0].exclusive, MetricValue::U64(70));
    assert_eq!(outcome.metric_conflicts, 0);
}

#[test]
fn test_mistyped_metric_sample_is_dropped() {
    let trace = r#"
{"type":"define_metric","id":4,"name":"temperature","value_type":"f64"}
{"type":"metric","location":0,"metric":4,"value":{"i64":-3},"time":0}
{"type":"enter","location":0,"region":1,"time":0}
{"type":"leave","location":0,"time":1}
"#;
    let events = parse_events(trace).unwrap();
    let mut session = ReplaySession::new();
    session.replay(&events);
    let outcome = session.finish();

    let root = outcome.tree.find_path(&[1]).unwrap();
    assert!(outcome.tree.node(root).data(0).unwrap().metrics.is_empty());
    assert_eq!(outcome.metric_conflicts, 1);
}

#[test]
fn test_messages_and_collectives_mark_nodes() {
    let trace = r#"
{"type":"enter","location":0,"region":1,"time":0}
{"type":"message","location":0,"direction":"sent","bytes":64}
{"type":"message","location":0,"direction":"received","bytes":16}
{"type":"enter","location":0,"region":9,"time":1}
{"type":"collective","location":0,"direction":"sent","bytes":8}
{"type":"leave","location":0,"time":2}
{"type":"leave","location":0,"time":3}
{"type":"message","location":0,"direction":"sent","bytes":1}
"#;
    let events = parse_events(trace).unwrap();
    let mut session = ReplaySession::new();
    assert_eq!(session.replay(&events), 1);
    let outcome = session.finish();

    let tree = &outcome.tree;
    let root = tree.node(tree.find_path(&[1]).unwrap());
    let coll = tree.node(tree.find_path(&[1, 9]).unwrap());

    let message = root.data(0).unwrap().message.unwrap();
    assert_eq!(message.count_sent, 1);
    assert_eq!(message.bytes_sent, 64);
    assert_eq!(message.count_received, 1);
    assert_eq!(message.bytes_received, 16);
    assert!(root.has_p2p());
    assert!(!root.has_collop());
    assert!(coll.has_collop());
    assert_eq!(outcome.orphan_events, 1);
    assert!(outcome.failures.is_empty());
}
