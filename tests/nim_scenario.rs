use mcts::games::nim::{NimModel, NimRule, Take};
use mcts::{run_search, BestActionCriterion, Budget, Mcts, SearchConfig};
use test_log::test;

#[test]
fn test_normal_play_leaves_a_multiple_of_three() {
    let search = run_search(
        NimModel::new(2, NimRule::Normal),
        NimModel::start(5),
        Budget::Iterations(2000),
        1.4,
    )
    .unwrap();

    assert_eq!(search.best_action(BestActionCriterion::MostVisited).unwrap(), Take(2));
    assert_eq!(search.stats(search.root()).unwrap().visits, 2000);

    let children = search.root_children_stats().unwrap();
    assert_eq!(children.len(), 2);
    assert!(children[1].visits > children[0].visits);
    assert!(children[1].average.unwrap() > children[0].average.unwrap());
}

#[test]
fn test_misere_play_leaves_one_more_than_a_multiple_of_three() {
    let search = run_search(
        NimModel::new(2, NimRule::Misere),
        NimModel::start(5),
        Budget::Iterations(2000),
        1.4,
    )
    .unwrap();

    assert_eq!(search.best_action(BestActionCriterion::MostVisited).unwrap(), Take(1));
}

#[test]
fn test_criteria_agree_on_clear_positions() {
    let search = run_search(
        NimModel::new(3, NimRule::Normal),
        NimModel::start(10),
        Budget::Iterations(5000),
        1.4,
    )
    .unwrap();

    // 10 - 2 = 8 is the only multiple of four within reach.
    assert_eq!(search.best_action(BestActionCriterion::MostVisited).unwrap(), Take(2));
    assert_eq!(search.best_action(BestActionCriterion::HighestAverageValue).unwrap(), Take(2));
}

#[test]
fn test_self_play_follows_the_winning_strategy() {
    let config = SearchConfig::default().with_iterations(1500).with_exploration(1.4);
    let mut search = Mcts::new(NimModel::new(2, NimRule::Normal), NimModel::start(8), config).unwrap();

    while !search.root_is_terminal() {
        let state = search.root_state();
        search.search().unwrap();
        let action = search.best_action(BestActionCriterion::MostVisited).unwrap();
        if state.remaining % 3 != 0 {
            assert_eq!(
                (state.remaining - action.0) % 3,
                0,
                "{} from a winning position with {} objects",
                action,
                state.remaining
            );
        }
        search.advance_root(&action).unwrap();
        search.graph().check_invariants().unwrap();
    }

    // The first player starts from a winning position and takes the last object.
    let end = search.root_state();
    assert_eq!(end.remaining, 0);
    assert_eq!(end.to_move, mcts::games::Player::Second);
}
