//! Match flow integration tests
//!
//! Whole turns through the public API: orders in, reports out.

use signal_front::combat::CombatResult;
use signal_front::grid::Coord;
use signal_front::{
    is_terminal, new_match, winner, Controller, MatchConfig, MatchError, MatchState, Order, OrderStatus, RegionId,
    RegionLayout, Side, SideConfig, Subject, UnitId, UnitSpec,
};

/// A 1 x `cols` strip with a region per cell and no deception
fn strip(cols: u32, player: &[(i32, u32)], enemy: &[(i32, u32)]) -> MatchConfig {
    let side = |side: Side, units: &[(i32, u32)]| {
        units.iter().fold(SideConfig::new(side, Controller::Human), |config, &(col, strength)| {
            config.with_unit(UnitSpec::new(0, col, strength))
        })
    };

    MatchConfig::blank(1, cols)
        .with_regions(RegionLayout::Blocks { rows: 1, cols: 1 })
        .with_deception_rate(0.0)
        .with_side(side(Side::Player, player))
        .with_side(side(Side::Enemy, enemy))
}

fn strength(state: &MatchState, id: u32) -> Option<u32> {
    state.unit(UnitId(id)).map(|u| u.strength)
}

#[test]
fn test_overwhelming_attack_destroys_and_flips() {
    let mut state = new_match(strip(3, &[(0, 10)], &[(1, 4)])).unwrap();
    assert_eq!(state.grid().region(RegionId(1)).unwrap().owner, Some(Side::Enemy));

    let report = state.step_turn(vec![Order::attack(Side::Player, UnitId(1), RegionId(1))]).unwrap();

    let fight = &report.combat[0];
    assert_eq!(fight.result, CombatResult::AttackerVictory);
    assert_eq!(fight.attacker, Side::Player);

    // 10 vs 4: enemy destroyed, attacker loses max(1, 16 / 10) = 1 and
    // advances into the captured cell
    assert!(state.unit(UnitId(2)).is_none());
    assert_eq!(strength(&state, 1), Some(9));
    assert_eq!(state.unit(UnitId(1)).unwrap().position, Coord::new(0, 1));
    assert_eq!(state.grid().region(RegionId(1)).unwrap().owner, Some(Side::Player));

    assert!(is_terminal(&state));
    assert_eq!(winner(&state), Some(Side::Player));
}

#[test]
fn test_even_fight_defender_holds_for_every_seed() {
    for seed in 0..16 {
        let config = strip(3, &[(0, 5)], &[(1, 5)]).with_seed(seed);
        let mut state = new_match(config).unwrap();

        let report = state.step_turn(vec![Order::attack(Side::Player, UnitId(1), RegionId(1))]).unwrap();

        assert_eq!(report.combat[0].result, CombatResult::Stalemate, "seed {}", seed);
        assert_eq!(state.grid().region(RegionId(1)).unwrap().owner, Some(Side::Enemy));
        assert_eq!(strength(&state, 1), Some(4));
        assert_eq!(strength(&state, 2), Some(4));
        assert_eq!(state.unit(UnitId(1)).unwrap().position, Coord::new(0, 0));
        assert!(!report.terminal);
    }
}

#[test]
fn test_out_of_range_move_is_rejected() {
    let mut state = new_match(strip(5, &[(0, 5)], &[(4, 5)])).unwrap();

    let err = state.validate_order(&Order::move_to(Side::Player, UnitId(1), Coord::new(0, 2))).unwrap_err();
    assert!(matches!(err, MatchError::InvalidOrder(_)));
    assert!(!err.is_fatal());

    let report = state.step_turn(vec![Order::move_to(Side::Player, UnitId(1), Coord::new(0, 2))]).unwrap();
    match &report.orders[0].status {
        OrderStatus::Rejected { reason } => assert!(reason.contains("cannot reach"), "{}", reason),
        OrderStatus::Executed => panic!("move beyond the allowance was executed"),
    }
    assert_eq!(state.unit(UnitId(1)).unwrap().position, Coord::new(0, 0));
    assert_eq!(state.turn(), 2);
}

#[test]
fn test_move_into_enemy_region_starts_a_fight() {
    let config = MatchConfig::blank(2, 2)
        .with_regions(RegionLayout::Bands { count: 2 })
        .with_deception_rate(0.0)
        .with_side(SideConfig::new(Side::Player, Controller::Human).with_unit(UnitSpec::new(1, 0, 5)))
        .with_side(SideConfig::new(Side::Enemy, Controller::Human).with_unit(UnitSpec::new(0, 1, 5)));
    let mut state = new_match(config).unwrap();

    // The enemy's own cell still needs an attack
    let err = state.validate_order(&Order::move_to(Side::Player, UnitId(1), Coord::new(0, 1))).unwrap_err();
    assert!(err.to_string().contains("attack"));

    let report = state.step_turn(vec![Order::move_to(Side::Player, UnitId(1), Coord::new(0, 0))]).unwrap();
    assert!(report.orders[0].is_executed());

    // 5 vs 5 in the enemy's band: the owner defends and holds
    let fight = &report.combat[0];
    assert_eq!(fight.region, RegionId(0));
    assert_eq!(fight.attacker, Side::Player);
    assert_eq!(fight.result, CombatResult::Stalemate);
    assert_eq!(state.unit(UnitId(1)).unwrap().position, Coord::new(0, 0));
    assert_eq!(state.grid().region(RegionId(0)).unwrap().owner, Some(Side::Enemy));
}

#[test]
fn test_unseen_enemy_does_not_block_moves() {
    let config = MatchConfig::blank(1, 8)
        .with_deception_rate(0.0)
        .with_side(
            SideConfig::new(Side::Player, Controller::Human).with_unit(UnitSpec::new(0, 0, 5).with_visibility(1)),
        )
        .with_side(SideConfig::new(Side::Enemy, Controller::Human).with_unit(UnitSpec::new(0, 7, 5)));
    let state = new_match(config).unwrap();

    assert!(state.briefing(Side::Player).iter().all(|s| !matches!(s.subject(), Subject::Contact(_))));
    assert!(state.validate_order(&Order::move_to(Side::Player, UnitId(1), Coord::new(0, 1))).is_ok());
}

#[test]
fn test_colocated_forces_fight_without_orders() {
    let config = MatchConfig::blank(5, 5)
        .with_deception_rate(0.0)
        .with_side(SideConfig::new(Side::Player, Controller::Human).with_unit(UnitSpec::new(2, 2, 10)))
        .with_side(SideConfig::new(Side::Enemy, Controller::Human).with_unit(UnitSpec::new(2, 3, 4)));
    let mut state = new_match(config).unwrap();
    assert_eq!(state.grid().region(RegionId(0)).unwrap().owner, None);

    let report = state.step_turn(Vec::new()).unwrap();

    // Neutral and held by both: the weaker side defends and is overrun
    let fight = &report.combat[0];
    assert_eq!(fight.defender, Side::Enemy);
    assert_eq!(fight.result, CombatResult::AttackerVictory);
    assert_eq!(report.eliminated, vec![UnitId(2)]);
    assert_eq!(strength(&state, 1), Some(9));
    assert_eq!(state.grid().region(RegionId(0)).unwrap().owner, Some(Side::Player));
    assert_eq!(report.winner, Some(Side::Player));
}

#[test]
fn test_reinforcement_budget_enforced() {
    let mut config = strip(4, &[(0, 5), (1, 5)], &[(3, 5)]);
    config.sides[0].reinforcements = 5;
    let mut state = new_match(config).unwrap();

    let report = state
        .step_turn(vec![
            Order::reinforce(Side::Player, UnitId(1), 3),
            Order::reinforce(Side::Player, UnitId(2), 3),
        ])
        .unwrap();

    assert!(report.orders[0].is_executed());
    match &report.orders[1].status {
        OrderStatus::Rejected { reason } => assert!(reason.contains("only 2 remain"), "{}", reason),
        OrderStatus::Executed => panic!("second reinforcement overspent the budget"),
    }
    assert_eq!(strength(&state, 1), Some(8));
    assert_eq!(strength(&state, 2), Some(5));

    // The budget refills every turn
    let report = state.step_turn(vec![Order::reinforce(Side::Player, UnitId(2), 5)]).unwrap();
    assert!(report.orders[0].is_executed());
    assert_eq!(strength(&state, 2), Some(10));
}

#[test]
fn test_engine_side_ignores_human_orders() {
    let mut config = strip(3, &[(0, 5)], &[(2, 5)]);
    config.sides[1].controller = Controller::Ai;
    let mut state = new_match(config).unwrap();

    let report = state.step_turn(vec![Order::hold(Side::Enemy, UnitId(2))]).unwrap();
    let rejected: Vec<_> = report.rejected().collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].order.side, Side::Enemy);
}

#[test]
fn test_turn_limit_ends_on_region_count() {
    let config = strip(4, &[(0, 5), (1, 5)], &[(3, 5)]).with_turn_limit(2);
    let mut state = new_match(config).unwrap();

    assert!(!state.step_turn(Vec::new()).unwrap().terminal);
    let report = state.step_turn(Vec::new()).unwrap();
    assert!(report.terminal);
    assert_eq!(report.winner, Some(Side::Player));
    assert!(matches!(state.step_turn(Vec::new()), Err(MatchError::MatchConcluded)));
}

#[test]
fn test_invalid_configs_rejected_before_play() {
    let off_grid = strip(3, &[(5, 5)], &[(1, 5)]);
    assert!(matches!(new_match(off_grid), Err(MatchError::ConfigurationError(_))));

    let shared_cell = strip(3, &[(1, 5)], &[(1, 5)]);
    assert!(matches!(new_match(shared_cell), Err(MatchError::ConfigurationError(_))));

    let bad_rate = strip(3, &[(0, 5)], &[(2, 5)]).with_deception_rate(1.5);
    assert!(matches!(new_match(bad_rate), Err(MatchError::ConfigurationError(_))));

    let overlapping = r#"
        [grid_size]
        rows = 1
        cols = 2

        [regions]
        layout = "explicit"
        regions = [
            { name = "west", cells = [[0, 0], [0, 1]] },
            { name = "east", cells = [[0, 1]] },
        ]

        [[sides]]
        side = "player"

        [[sides]]
        side = "enemy"
    "#;
    let config = MatchConfig::from_toml_str(overlapping).unwrap();
    assert!(matches!(new_match(config), Err(MatchError::ConfigurationError(_))));
}

#[test]
fn test_bundled_scenario_plays() {
    let config = MatchConfig::load("data/matches/ridge.toml").expect("bundled scenario loads");
    let mut state = new_match(config).unwrap();
    assert_eq!(state.controller(Side::Enemy), Controller::Ai);

    for _ in 0..12 {
        if is_terminal(&state) {
            break;
        }
        let before = state.turn();
        let report = state.step_turn(Vec::new()).expect("engine invariants hold");
        assert_eq!(report.turn, before);
        assert!(report.orders.iter().all(|o| o.order.side == Side::Enemy));
    }
}
