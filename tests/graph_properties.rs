//! Property tests for graph invariants

use mindmap::{Graph, GraphError, Node, NodeId, Position};
use proptest::prelude::*;

fn build(nodes: usize, pairs: &[(usize, usize)]) -> Graph {
    let mut graph = Graph::new();
    for i in 0..nodes {
        graph
            .insert_node(Node::new(
                NodeId::from(format!("n{}", i)),
                format!("Concept {}", i),
                Position::new(i as f64 * 10.0, 0.0),
            ))
            .unwrap();
    }
    for (s, t) in pairs {
        graph
            .connect(&NodeId::from(format!("n{}", s)), &NodeId::from(format!("n{}", t)))
            .unwrap();
    }
    graph
}

fn graph_strategy() -> impl Strategy<Value = Graph> {
    (1usize..12)
        .prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..30)))
        .prop_map(|(n, pairs)| build(n, &pairs))
}

proptest! {
    #[test]
    fn delete_node_leaves_no_incident_edge(
        (graph, victim) in graph_strategy().prop_flat_map(|g| {
            let n = g.node_count();
            (Just(g), 0..n)
        })
    ) {
        let mut graph = graph;
        let id = NodeId::from(format!("n{}", victim));
        let others = graph.node_count() - 1;

        graph.delete_node(&id).unwrap();

        prop_assert!(graph.edges().all(|e| e.source != id && e.target != id));
        prop_assert_eq!(graph.node_count(), others);
        prop_assert!(!graph.contains_node(&id));
    }

    #[test]
    fn connect_requires_both_endpoints(graph in graph_strategy(), s in 0usize..16, t in 0usize..16) {
        let mut graph = graph;
        let source = NodeId::from(format!("n{}", s));
        let target = NodeId::from(format!("n{}", t));
        let both_exist = graph.contains_node(&source) && graph.contains_node(&target);
        let before = graph.edge_count();

        match graph.connect(&source, &target) {
            Ok(edge) => {
                prop_assert!(both_exist);
                prop_assert_eq!(graph.edge_count(), before + 1);
                let created = graph.edge(&edge).unwrap();
                prop_assert_eq!(&created.source, &source);
                prop_assert_eq!(&created.target, &target);
            }
            Err(GraphError::InvalidEndpoint(_)) => {
                prop_assert!(!both_exist);
                prop_assert_eq!(graph.edge_count(), before);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn relabel_is_idempotent(graph in graph_strategy(), label in "[A-Za-z ]{1,24}") {
        let mut once = graph.clone();
        let id = NodeId::from("n0");
        once.relabel(&id, label.clone()).unwrap();

        let mut twice = once.clone();
        prop_assert!(!twice.relabel(&id, label.clone()).unwrap());

        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(twice.node(&id).unwrap().label(), label.as_str());
    }

    #[test]
    fn serialization_round_trip_preserves_structure(graph in graph_strategy()) {
        let json = serde_json::to_string(&graph).unwrap();
        let reparsed: Graph = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(reparsed.node_ids(), graph.node_ids());
        prop_assert_eq!(reparsed.edge_ids(), graph.edge_ids());
        prop_assert_eq!(reparsed, graph);
    }
}
