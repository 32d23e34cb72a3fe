use mcts::games::tictactoe::{Board, Square, TicTacToeModel, TicTacToeState};
use mcts::graph::GraphTables;
use mcts::{GameModel, Mcts, SearchConfig, SearchGraph};
use std::collections::HashMap;
use test_log::test;

fn searched(iterations: u64) -> Mcts<TicTacToeModel> {
    let config = SearchConfig::default().with_iterations(iterations).with_seed(3);
    let mut search = Mcts::new(TicTacToeModel, TicTacToeState::new(), config).unwrap();
    search.search().unwrap();
    search
}

#[test]
fn test_get_or_create_is_idempotent() {
    let mut graph: SearchGraph<&str, u8, u32, ()> = SearchGraph::new();
    let first = graph.get_or_create_node("s", || 1);
    let again = graph.get_or_create_node("s", || panic!("payload built for a known key"));
    assert_eq!(first, again);
    assert_eq!(graph.node_count(), 1);
    assert_eq!(*graph.node_payload(first), 1);
}

#[test]
fn test_move_orders_merge_into_one_node() {
    let search = searched(3000);
    let graph = search.graph();
    graph.check_invariants().unwrap();

    let shared = graph.node_ids().filter(|&n| graph.parents_of(n).len() >= 2).count();
    assert!(shared > 0, "no transposition was merged");

    // Both orders of the same three moves land on one node, if it was reached.
    let model = TicTacToeModel;
    let play = |moves: &[usize]| {
        moves.iter().fold(TicTacToeState::new(), |s, &m| model.apply_action(&s, &Square(m)).unwrap())
    };
    let a = model.canonical_state_key(&play(&[0, 4, 8]));
    let b = model.canonical_state_key(&play(&[8, 4, 0]));
    assert_eq!(graph.find_node(&a), graph.find_node(&b));
}

#[test]
fn test_visit_accounting_law() {
    let search = searched(2000);
    let graph = search.graph();
    let root = search.root();

    assert_eq!(graph.stats(root).unwrap().visits, 2000);
    assert!(graph.parents_of(root).iter().all(|&e| graph.stats(e).unwrap().visits == 0));

    for node in graph.node_ids() {
        let visits = graph.stats(node).unwrap().visits;
        let outgoing: u64 = graph.children_of(node).iter().map(|&e| graph.stats(e).unwrap().visits).sum();
        assert!(outgoing <= visits, "{} passes on more visits than it received", node);
        if node != root {
            let incoming: u64 = graph.parents_of(node).iter().map(|&e| graph.stats(e).unwrap().visits).sum();
            assert_eq!(incoming, visits, "{} visits do not match its incoming edges", node);
        }
    }
}

#[test]
fn test_statistics_never_decrease() {
    let config = SearchConfig::for_testing().with_iterations(250);
    let mut search = Mcts::new(TicTacToeModel, TicTacToeState::new(), config).unwrap();

    search.search().unwrap();
    let mut previous = search.export_tables().unwrap();
    for _ in 0..3 {
        search.search().unwrap();
        let current = search.export_tables().unwrap();
        assert!(current.nodes.len() >= previous.nodes.len());
        assert!(current.edges.len() >= previous.edges.len());
        for (before, after) in previous.nodes.iter().zip(&current.nodes) {
            assert_eq!(before.key, after.key);
            assert!(after.visits >= before.visits);
            assert!(after.expanded || !before.expanded);
        }
        for (before, after) in previous.edges.iter().zip(&current.edges) {
            assert_eq!((before.source, before.target), (after.source, after.target));
            assert!(after.visits >= before.visits);
        }
        previous = current;
    }
    assert_eq!(search.iterations(), 1000);
}

#[test]
fn test_tables_round_trip_through_json() {
    let search = searched(1500);
    let tables = search.export_tables().unwrap();

    let json = serde_json::to_string(&tables).unwrap();
    let parsed: GraphTables<Board, Square> = serde_json::from_str(&json).unwrap();
    let rebuilt: SearchGraph<Board, Square, (), ()> =
        SearchGraph::from_tables(parsed, |_| (), |_| ()).unwrap();
    rebuilt.check_invariants().unwrap();

    // Compare as key-addressed sets of rows.
    let reloaded = rebuilt.to_tables();
    let node_rows = |t: &GraphTables<Board, Square>| -> HashMap<Board, (u64, u64, bool)> {
        t.nodes.iter().map(|r| (r.key, (r.visits, r.value_sum.to_bits(), r.expanded))).collect()
    };
    let edge_rows = |t: &GraphTables<Board, Square>| -> HashMap<(Board, Square), (Board, u64, u64)> {
        t.edges
            .iter()
            .map(|r| {
                let key = |id: mcts::NodeId| t.nodes[id.index()].key;
                ((key(r.source), r.action), (key(r.target), r.visits, r.value_sum.to_bits()))
            })
            .collect()
    };
    assert_eq!(node_rows(&reloaded), node_rows(&tables));
    assert_eq!(edge_rows(&reloaded), edge_rows(&tables));
    assert_eq!(reloaded, tables);
}
