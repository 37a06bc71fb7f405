//! End-to-end simulation scenarios.
//!
//! Covers:
//! - target-percent sizing against the group equity of the step
//! - fees and partial fills on a single asset
//! - skipped decisions when the lookback window is too short
//! - rejected orders leaving the cash untouched for the rest of the step
//! - sells executing before buys within a step
//! - the zero-equity halt policy

mod common;

use allocation::{FixedWeights, Lookback, MonteCarloSearch, PeriodicSearch, RebalanceSchedule};
use backtester::{DecisionOutcome, OrderSimulator, SimulationError, SkipReason};
use common::{group, panel, simulation, ScriptedWeights};
use configuration::Simulation;
use core_types::{CallSequence, FillStatus, OrderSide, RejectReason, WeightVector};

const TOLERANCE: f64 = 1e-9;

fn fixed(weights: &[f64]) -> Box<FixedWeights> {
    Box::new(FixedWeights::new(WeightVector::new(weights.to_vec())))
}

// ============================================================================
// Target-percent sizing
// ============================================================================

#[test]
fn test_equal_weights_split_the_cash() {
    let panel = panel(vec![("A", vec![100.0, 100.0, 100.0]), ("B", vec![50.0, 50.0, 50.0])]);
    let mut sim = OrderSimulator::new(
        group(&["A", "B"]),
        panel,
        simulation(1000.0, 0.0),
        RebalanceSchedule::EveryStep,
        fixed(&[0.5, 0.5]),
    )
    .unwrap();

    sim.step().unwrap();
    assert_eq!(sim.portfolio().positions, vec![5.0, 10.0]);
    assert!(sim.portfolio().cash.abs() < TOLERANCE, "cash left: {}", sim.portfolio().cash);

    let result = sim.run().unwrap();
    // Constant prices: later rebalances are already on target and produce no orders.
    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.decisions.len(), 3);
    assert!((result.final_equity() - 1000.0).abs() < TOLERANCE);
}

#[test]
fn test_orders_are_sized_against_equity_at_step_start() {
    // A sell followed by a buy must not resize the buy with the proceeds of the sell.
    let panel = panel(vec![("A", vec![100.0, 100.0]), ("B", vec![100.0, 100.0])]);
    let source = Box::new(ScriptedWeights::new(vec![vec![1.0, 0.0], vec![0.25, 0.75]]));
    let result = OrderSimulator::new(
        group(&["A", "B"]),
        panel,
        simulation(1000.0, 0.0),
        RebalanceSchedule::EveryStep,
        source,
    )
    .unwrap()
    .run()
    .unwrap();

    let last = result.snapshots.last().unwrap();
    assert!((last.positions[0] - 2.5).abs() < TOLERANCE);
    assert!((last.positions[1] - 7.5).abs() < TOLERANCE);
}

// ============================================================================
// Fees and partial fills
// ============================================================================

#[test]
fn test_single_asset_buy_pays_fees_and_is_shrunk_to_the_cash() {
    let panel = panel(vec![("A", vec![100.0, 110.0, 90.0, 120.0])]);
    let result = OrderSimulator::new(
        group(&["A"]),
        panel,
        simulation(1000.0, 0.01),
        RebalanceSchedule::FirstStepOnly,
        fixed(&[1.0]),
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(result.fills.len(), 1);
    let fill = &result.fills[0];
    assert_eq!(fill.side, OrderSide::Buy);
    assert!(matches!(fill.status, FillStatus::Partial { .. }), "status: {:?}", fill.status);
    assert!((fill.fees - fill.value() * 0.01).abs() < TOLERANCE);
    assert!((fill.shares - 1000.0 / 101.0).abs() < TOLERANCE);
    assert!(fill.resulting_cash >= -TOLERANCE);

    let final_state = result.final_state().unwrap();
    assert!(
        (result.final_equity() - (fill.shares * 120.0 + final_state.cash)).abs() < TOLERANCE,
        "final equity {} for {} shares",
        result.final_equity(),
        fill.shares
    );
    assert!((result.final_equity() - fill.shares * 120.0).abs() < 1e-6);
}

#[test]
fn test_all_in_buy_on_a_large_account_never_aborts_the_run() {
    for cash in [1e6, 1e7, 1e8, 1e9] {
        for price in [1.0, 3.0, 33.0, 77.7, 250.0, 9999.0] {
            let panel = panel(vec![("A", vec![price, price * 1.1])]);
            let result = OrderSimulator::new(
                group(&["A"]),
                panel,
                simulation(cash, 0.001),
                RebalanceSchedule::FirstStepOnly,
                fixed(&[1.0]),
            )
            .unwrap()
            .run()
            .unwrap_or_else(|err| panic!("cash={cash} price={price}: {err}"));

            assert_eq!(result.fills.len(), 1);
            assert!(result.fills[0].is_applied(), "cash={cash} price={price}");
            assert!(result.final_state().unwrap().cash >= -TOLERANCE);
        }
    }
}

#[test]
fn test_integer_lots_truncate_toward_zero() {
    let panel = panel(vec![("A", vec![30.0, 30.0])]);
    let params = Simulation {
        allow_fractional_shares: false,
        ..simulation(1000.0, 0.0)
    };
    let result = OrderSimulator::new(group(&["A"]), panel, params, RebalanceSchedule::FirstStepOnly, fixed(&[1.0]))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(result.fills[0].shares, 33.0);
    assert!((result.final_state().unwrap().cash - 10.0).abs() < TOLERANCE);
}

// ============================================================================
// Skipped decisions
// ============================================================================

#[test]
fn test_search_without_history_skips_and_holds_cash() {
    let panel = panel(vec![
        ("A", vec![100.0, 101.0, 99.0, 102.0, 104.0]),
        ("B", vec![50.0, 49.0, 51.0, 52.0, 51.5]),
    ]);
    let search = MonteCarloSearch::new(200, 7, 252.0).unwrap();
    let source = Box::new(PeriodicSearch::new(Lookback::All, Box::new(search)));
    let result = OrderSimulator::new(
        group(&["A", "B"]),
        panel,
        simulation(1000.0, 0.0),
        RebalanceSchedule::EveryStep,
        source,
    )
    .unwrap()
    .run()
    .unwrap();

    let first = &result.decisions[0];
    assert_eq!(first.time_index, 0);
    assert!(
        matches!(
            first.outcome,
            DecisionOutcome::Skipped {
                reason: SkipReason::InsufficientData { .. }
            }
        ),
        "first decision: {:?}",
        first.outcome
    );
    assert!(result.fills.iter().all(|f| f.time_index > 0), "no order may be generated at step 0");
    assert_eq!(result.snapshots[0].positions, vec![0.0, 0.0]);
    assert_eq!(result.snapshots[0].cash, 1000.0);

    // Once enough returns exist the search produces targets.
    assert!(
        result
            .decisions
            .iter()
            .any(|d| matches!(d.outcome, DecisionOutcome::Rebalanced { .. })),
        "decisions: {:?}",
        result.decisions
    );
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_rejected_order_leaves_cash_for_the_rest_of_the_step() {
    let flat = vec![10.0, 10.0];
    let panel = panel(vec![("A", flat.clone()), ("B", flat.clone()), ("C", flat)]);
    let params = Simulation {
        partial_fills: false,
        ..simulation(1000.0, 0.2)
    };
    let result = OrderSimulator::new(
        group(&["A", "B", "C"]),
        panel,
        params,
        RebalanceSchedule::FirstStepOnly,
        fixed(&[0.6, 0.35, 0.05]),
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(result.fills.len(), 3);

    // 600 + 120 fees leaves 280.
    assert_eq!(result.fills[0].status, FillStatus::Filled);
    assert!((result.fills[0].resulting_cash - 280.0).abs() < TOLERANCE);

    // 350 + 70 fees does not fit into 280.
    let rejected = &result.fills[1];
    match &rejected.status {
        FillStatus::Rejected {
            reason: RejectReason::InsufficientCash { required, available },
        } => {
            assert!((required - 420.0).abs() < TOLERANCE);
            assert!((available - 280.0).abs() < TOLERANCE);
        }
        other => panic!("expected an insufficient-cash rejection, got {:?}", other),
    }
    assert_eq!(rejected.fees, 0.0);
    assert!((rejected.resulting_cash - 280.0).abs() < TOLERANCE);

    // 50 + 10 fees still fits.
    assert_eq!(result.fills[2].status, FillStatus::Filled);
    assert!((result.fills[2].resulting_cash - 220.0).abs() < TOLERANCE);

    let final_state = result.final_state().unwrap();
    assert_eq!(final_state.positions[1], 0.0);
    assert_eq!(result.rejected_fills().count(), 1);
}

#[test]
fn test_negative_weights_are_skipped_under_long_only() {
    let panel = panel(vec![("A", vec![10.0, 10.0])]);
    let params = simulation(100.0, 0.0);
    let mut sim = OrderSimulator::new(
        group(&["A"]),
        panel,
        params,
        RebalanceSchedule::EveryStep,
        fixed(&[-0.5]),
    )
    .unwrap();
    sim.step().unwrap();
    assert_eq!(sim.portfolio().positions[0], 0.0);
    let result = sim.run().unwrap();
    assert!(result.fills.is_empty());
    assert_eq!(result.skipped_decisions().count(), 2);
}

// ============================================================================
// Call sequence
// ============================================================================

fn rotation(call_sequence: CallSequence) -> backtester::SimulationResult {
    let panel = panel(vec![("A", vec![100.0, 100.0]), ("B", vec![100.0, 100.0])]);
    let params = Simulation {
        partial_fills: false,
        call_sequence,
        ..simulation(1000.0, 0.0)
    };
    let source = Box::new(ScriptedWeights::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
    OrderSimulator::new(group(&["A", "B"]), panel, params, RebalanceSchedule::EveryStep, source)
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn test_sells_free_cash_before_buys() {
    let result = rotation(CallSequence::Auto);
    let rotation_fills: Vec<_> = result.fills.iter().filter(|f| f.time_index == 1).collect();
    assert_eq!(rotation_fills.len(), 2);
    assert_eq!(rotation_fills[0].side, OrderSide::Sell);
    assert_eq!(rotation_fills[1].side, OrderSide::Buy);
    assert!(rotation_fills.iter().all(|f| f.is_applied()));
    assert_eq!(result.final_state().unwrap().positions, vec![0.0, 10.0]);
}

#[test]
fn test_column_order_can_starve_a_buy() {
    // In column order the buy of A runs before the sell of B and finds no cash.
    let panel = panel(vec![("A", vec![100.0, 100.0]), ("B", vec![100.0, 100.0])]);
    let params = Simulation {
        partial_fills: false,
        call_sequence: CallSequence::Default,
        ..simulation(1000.0, 0.0)
    };
    let source = Box::new(ScriptedWeights::new(vec![vec![0.0, 1.0], vec![1.0, 0.0]]));
    let result = OrderSimulator::new(group(&["A", "B"]), panel, params, RebalanceSchedule::EveryStep, source)
        .unwrap()
        .run()
        .unwrap();

    let rotation_fills: Vec<_> = result.fills.iter().filter(|f| f.time_index == 1).collect();
    assert_eq!(rotation_fills[0].asset, "A");
    assert!(rotation_fills[0].is_rejected(), "buy before sell must be rejected");
    assert!(rotation_fills[1].is_applied());
    assert_eq!(result.final_state().unwrap().positions, vec![0.0, 0.0]);
    assert!((result.final_state().unwrap().cash - 1000.0).abs() < TOLERANCE);
}

// ============================================================================
// Zero equity
// ============================================================================

fn collapse(halt_on_zero_equity: bool) -> backtester::SimulationResult {
    let panel = panel(vec![("A", vec![100.0, 1e-12, 1e-12, 50.0])]);
    let params = Simulation {
        halt_on_zero_equity,
        ..simulation(1000.0, 0.0)
    };
    OrderSimulator::new(group(&["A"]), panel, params, RebalanceSchedule::EveryStep, fixed(&[1.0]))
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn test_halt_on_zero_equity_stops_decisions_but_keeps_snapshots() {
    let result = collapse(true);
    assert_eq!(result.num_steps(), 4);
    assert_eq!(result.decisions.len(), 2);
    assert!(matches!(result.decisions[0].outcome, DecisionOutcome::Rebalanced { .. }));
    assert!(matches!(
        result.decisions[1].outcome,
        DecisionOutcome::Skipped {
            reason: SkipReason::ZeroEquity
        }
    ));
    // Holdings are kept and revalued after the halt.
    let last = result.snapshots.last().unwrap();
    assert_eq!(last.positions, vec![10.0]);
    assert!((last.equity - 500.0).abs() < TOLERANCE);
}

#[test]
fn test_without_halt_decisions_continue() {
    let result = collapse(false);
    assert_eq!(result.decisions.len(), 4);
    assert_eq!(result.skipped_decisions().count(), 0);
}

#[test]
fn test_stepping_past_the_end_fails() {
    let panel = panel(vec![("A", vec![10.0])]);
    let mut sim = OrderSimulator::new(
        group(&["A"]),
        panel,
        simulation(100.0, 0.0),
        RebalanceSchedule::EveryStep,
        fixed(&[1.0]),
    )
    .unwrap();
    sim.step().unwrap();
    assert!(sim.is_finalized());
    let err = sim.step().unwrap_err();
    assert!(matches!(err, SimulationError::AlreadyFinalized), "got {:?}", err);
}
