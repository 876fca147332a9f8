// tests/graph_validation.rs

use std::collections::HashMap;

use migradag::dag::DependencyGraph;
use migradag::errors::GraphProblem;

#[test]
fn empty_graph_is_valid() {
    let graph = DependencyGraph::new();
    assert!(graph.validate().is_ok());
    assert!(graph.network().is_empty());
}

#[test]
fn acyclic_chain_with_declared_roots_is_valid() {
    let graph = DependencyGraph::new();
    graph.add_node("a");
    graph.add("b", ["a"]);
    graph.add("c", ["a", "b"]);

    assert!(graph.validate().is_ok());

    let network = graph.network();
    let expected: HashMap<String, Vec<String>> = HashMap::from([
        ("a".to_string(), vec![]),
        ("b".to_string(), vec!["a".to_string()]),
        ("c".to_string(), vec!["a".to_string(), "b".to_string()]),
    ]);
    assert_eq!(network, expected);
}

#[test]
fn three_node_cycle_is_reported_once_with_all_members() {
    let graph = DependencyGraph::new();
    graph.add("a", ["b"]);
    graph.add("b", ["c"]);
    graph.add("c", ["a"]);
    graph.add("d", ["e"]);
    graph.add_node("e");

    let err = graph.validate().unwrap_err();
    assert_eq!(
        err.problems,
        vec![GraphProblem::Cycle(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string()
        ])]
    );
    assert!(err.to_string().contains("cycle detected between nodes: [a, b, c]"));
}

#[test]
fn every_missing_dependency_is_reported() {
    let graph = DependencyGraph::new();
    graph.add("a", ["x", "y"]);
    graph.add("b", ["x"]);

    let err = graph.validate().unwrap_err();
    let missing: Vec<&String> = err.missing().collect();
    assert_eq!(missing, vec!["x", "y"]);
    assert_eq!(err.cycles().count(), 0);
    assert!(err.to_string().contains("dependency y is not defined"));
}

#[test]
fn problems_of_both_kinds_are_aggregated() {
    let graph = DependencyGraph::new();
    graph.add("a", ["b"]);
    graph.add("b", ["a", "ghost"]);
    graph.add("solo", ["solo"]);

    let err = graph.validate().unwrap_err();
    assert_eq!(err.missing().count(), 1);
    assert_eq!(err.cycles().count(), 2);
}

#[test]
fn groups_do_not_affect_validation() {
    let graph = DependencyGraph::new();
    graph.add_group("gen", ["gen.x.0", "undefined-anywhere"]);
    assert!(graph.validate().is_ok());
    assert_eq!(graph.get_group("gen"), vec!["gen.x.0", "undefined-anywhere"]);
}
