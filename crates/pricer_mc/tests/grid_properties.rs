//! Property-based tests for the time grid and the simulation context.

use pricer_core::market_data::{FlatForward, FlatVol};
use pricer_core::types::{Date, DayCountConvention};
use pricer_mc::grid::{cosh_spaced_dates, SimulationContext};
use pricer_mc::payoff::{EuropeanPayoff, OptionType, PayoffTerms};
use pricer_mc::process::{LognormalProcess, MarketInputs, Schedule};
use pricer_mc::{Simulation, SimulationConfig, SimulationError};
use proptest::prelude::*;
use std::sync::Arc;

fn valuation() -> Date {
    Date::from_ymd(2025, 1, 15).unwrap()
}

fn frozen_context(offsets: &[i64]) -> SimulationContext {
    let mut ctx = SimulationContext::new(valuation(), DayCountConvention::ActualActual365);
    ctx.add_dates(offsets.iter().map(|&d| valuation().add_days(d)))
        .unwrap();
    ctx.freeze();
    ctx
}

proptest! {
    #[test]
    fn prop_times_sorted_with_valuation_at_zero(
        offsets in prop::collection::vec(-400i64..2000, 0..40)
    ) {
        let ctx = frozen_context(&offsets);
        let grid = ctx.grid();
        let times = grid.times();

        prop_assert_eq!(times[ctx.valuation_index()], 0.0);
        prop_assert_eq!(grid.date(ctx.valuation_index()), valuation());
        for w in times.windows(2) {
            prop_assert!(w[1] > w[0]);
        }
        for i in 0..grid.len() {
            prop_assert_eq!(times[i] < 0.0, grid.date(i) < valuation());
        }
    }

    #[test]
    fn prop_steps_consistent_with_times(
        offsets in prop::collection::vec(0i64..1500, 1..40)
    ) {
        let ctx = frozen_context(&offsets);
        let grid = ctx.grid();
        prop_assert_eq!(grid.dt()[0], 0.0);
        for i in 1..grid.len() {
            prop_assert!((grid.dt()[i] - (grid.time(i) - grid.time(i - 1))).abs() < 1e-15);
            prop_assert!((grid.sqrt_dt()[i].powi(2) - grid.dt()[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn prop_every_declared_date_resolves(
        offsets in prop::collection::vec(-100i64..1000, 1..30)
    ) {
        let ctx = frozen_context(&offsets);
        let mut distinct = offsets.clone();
        distinct.push(0);
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(ctx.n_steps(), distinct.len());

        for &d in &offsets {
            let date = valuation().add_days(d);
            let i = ctx.date_index(date).unwrap();
            prop_assert_eq!(ctx.grid().date(i), date);
        }
    }

    #[test]
    fn prop_steps_between_is_inclusive(
        offsets in prop::collection::vec(0i64..500, 2..30),
        a in 0usize..30,
        b in 0usize..30,
    ) {
        let ctx = frozen_context(&offsets);
        let start = valuation().add_days(offsets[a % offsets.len()]);
        let end = valuation().add_days(offsets[b % offsets.len()]);
        let range = ctx.grid().steps_between(start, end).unwrap();
        for i in 0..ctx.n_steps() {
            let date = ctx.grid().date(i);
            prop_assert_eq!(range.contains(&i), start <= date && date <= end);
        }
    }

    #[test]
    fn prop_cosh_spacing_spans_and_increases(
        span in 1i64..3000,
        n in 1usize..120,
        concentration in 0.1f64..6.0,
    ) {
        let end = valuation().add_days(span);
        let dates = cosh_spaced_dates(valuation(), end, n, concentration);
        prop_assert_eq!(dates.first().copied(), Some(valuation()));
        prop_assert_eq!(dates.last().copied(), Some(end));
        for w in dates.windows(2) {
            prop_assert!(w[1] > w[0]);
        }
        prop_assert!(dates.len() <= n + 1);
    }

    #[test]
    fn prop_blocks_cover_every_path(
        path_batches in 1usize..5000,
        block_batches in 1usize..750,
    ) {
        let (n_paths, block_size) = (4 * path_batches, 4 * block_batches);
        let config = SimulationConfig::builder()
            .n_paths(n_paths)
            .block_size(block_size)
            .build()
            .unwrap();
        let n_blocks = config.n_blocks();
        prop_assert!(n_blocks * block_size >= n_paths);
        prop_assert!((n_blocks - 1) * block_size < n_paths);
    }
}

#[test]
fn test_frozen_context_rejects_new_names_and_dates() {
    let mut ctx = frozen_context(&[10, 20]);
    assert!(ctx.add_date(valuation().add_days(10)).is_ok());
    assert!(matches!(
        ctx.add_date(valuation().add_days(11)),
        Err(SimulationError::GridFrozen(_))
    ));
    assert!(matches!(
        ctx.add_dimension("LATE"),
        Err(SimulationError::GridFrozen(_))
    ));
}

#[test]
fn test_unknown_lookups_fail() {
    let ctx = frozen_context(&[5]);
    assert_eq!(
        ctx.date_index(valuation().add_days(6)),
        Err(SimulationError::UnknownDate(valuation().add_days(6)))
    );
    assert_eq!(
        ctx.dimension("NOPE"),
        Err(SimulationError::UnknownDimension("NOPE".to_string()))
    );
}

#[test]
fn test_thirty_360_month_end_shares_a_step() {
    let today = Date::from_ymd(2025, 1, 30).unwrap();
    let the_30th = Date::from_ymd(2025, 3, 30).unwrap();
    let the_31st = Date::from_ymd(2025, 3, 31).unwrap();

    let config = SimulationConfig::builder()
        .n_paths(4096)
        .seed(7)
        .day_count(DayCountConvention::Thirty360)
        .build()
        .unwrap();
    let mut sim = Simulation::new(config, today);
    let inputs = MarketInputs::new(Arc::new(FlatForward::new(100.0)), Arc::new(FlatVol::new(0.2)));
    sim.add_process(LognormalProcess::new(
        "GAS",
        inputs,
        Schedule::new().with_dates([the_30th, the_31st]),
    ))
    .unwrap();
    for (label, date) in [("30th", the_30th), ("31st", the_31st)] {
        sim.add_payoff(EuropeanPayoff::new(
            PayoffTerms::new("GAS", date).with_label(label),
            OptionType::Call,
            0.0,
            date,
        ))
        .unwrap();
    }
    let output = sim.run().unwrap();

    let grid = output.context.grid();
    assert_eq!(grid.len(), 2);
    assert_eq!(output.context.date_index(the_31st), Ok(1));
    assert!(grid.dt()[1] > 0.0);

    let on_30th = &output.result("30th").unwrap().values;
    let on_31st = &output.result("31st").unwrap().values;
    assert_eq!(on_30th, on_31st);
    assert!(on_31st.iter().all(|v| v.is_finite() && *v > 0.0));
    let mean = output.result("31st").unwrap().mean();
    assert!((mean - 100.0).abs() < 1.0, "mean {}", mean);
}
