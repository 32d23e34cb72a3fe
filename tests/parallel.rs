use mcts::games::nim::{NimModel, NimRule, Take};
use mcts::games::tictactoe::{TicTacToeModel, TicTacToeState};
use mcts::{BestActionCriterion, Mcts, SearchConfig, StopReason};
use std::time::Duration;
use test_log::test;

#[test]
fn test_parallel_search_accounts_every_iteration() {
    let config = SearchConfig::default().with_iterations(5000).with_threads(4);
    let mut search = Mcts::new(TicTacToeModel, TicTacToeState::new(), config).unwrap();
    let stats = search.search().unwrap();

    assert_eq!(stats.iterations, 5000);
    assert_eq!(stats.root_visits, 5000);
    assert_eq!(stats.stop, StopReason::IterationBudget);

    let graph = search.graph();
    graph.check_invariants().unwrap();
    for node in graph.node_ids().filter(|&n| n != search.root()) {
        let incoming: u64 = graph.parents_of(node).iter().map(|&e| graph.stats(e).unwrap().visits).sum();
        assert_eq!(incoming, graph.stats(node).unwrap().visits);
    }
}

#[test]
fn test_parallel_search_finds_nim_move() {
    let config = SearchConfig::default()
        .with_iterations(4000)
        .with_exploration(1.4)
        .with_threads(4);
    let mut search = Mcts::new(NimModel::new(2, NimRule::Normal), NimModel::start(5), config).unwrap();
    search.search().unwrap();
    assert_eq!(search.best_action(BestActionCriterion::MostVisited).unwrap(), Take(2));
}

#[test]
fn test_parallel_time_budget() {
    let config = SearchConfig::default()
        .with_time(Duration::from_millis(100))
        .with_threads(3);
    let mut search = Mcts::new(TicTacToeModel, TicTacToeState::new(), config).unwrap();
    let stats = search.search().unwrap();

    assert_eq!(stats.stop, StopReason::TimeBudget);
    assert!(stats.iterations > 0);
    assert_eq!(stats.root_visits, stats.iterations);
}

#[test]
fn test_parallel_search_continues_after_advancing_root() {
    let config = SearchConfig::default().with_iterations(2000).with_threads(2);
    let mut search = Mcts::new(TicTacToeModel, TicTacToeState::new(), config).unwrap();
    search.search().unwrap();
    let action = search.best_action(BestActionCriterion::MostVisited).unwrap();
    let inherited = search
        .root_children_stats()
        .unwrap()
        .into_iter()
        .find(|c| c.action == action)
        .map(|c| c.visits)
        .unwrap();

    search.advance_root(&action).unwrap();
    assert_eq!(search.iterations(), inherited);
    search.search().unwrap();
    assert_eq!(search.stats(search.root()).unwrap().visits, inherited + 2000);
    search.graph().check_invariants().unwrap();
}
