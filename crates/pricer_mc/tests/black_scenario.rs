//! End-to-end pricing against closed forms on a single lognormal factor.
//!
//! # Test Coverage
//!
//! - European call and put against Black-76
//! - Put-call parity per path
//! - Arithmetic average below the terminal option
//! - Zero-strike options reproduce the forward
//! - Exposures bucketed by currency and settlement date
//! - Historic fixings seed the path

use approx::assert_relative_eq;
use pricer_core::market_data::{fixings_from, FlatForward, FlatVol};
use pricer_core::math::black::black_price;
use pricer_core::types::Date;
use pricer_mc::payoff::{AsianPayoff, EuropeanPayoff, OptionType, PayoffTerms};
use pricer_mc::process::{LognormalProcess, MarketInputs, Schedule};
use pricer_mc::{Simulation, SimulationConfig, SimulationError};
use std::sync::Arc;

const FORWARD: f64 = 100.0;
const VOL: f64 = 0.2;

fn today() -> Date {
    Date::from_ymd(2025, 1, 2).unwrap()
}

fn expiry() -> Date {
    today().add_days(365)
}

fn inputs() -> MarketInputs {
    MarketInputs::new(Arc::new(FlatForward::new(FORWARD)), Arc::new(FlatVol::new(VOL)))
}

/// Weekly grid out to the expiry.
fn simulation(n_paths: usize) -> Simulation {
    let config = SimulationConfig::builder()
        .n_paths(n_paths)
        .block_size(4096)
        .seed(42)
        .build()
        .unwrap();
    let mut sim = Simulation::new(config, today());
    let schedule = Schedule::new().with_date_range(today(), expiry(), 7);
    sim.add_process(LognormalProcess::new("BRENT", inputs(), schedule))
        .unwrap();
    sim
}

fn european(label: &str, option: OptionType, strike: f64) -> EuropeanPayoff {
    EuropeanPayoff::new(
        PayoffTerms::new("BRENT", expiry()).with_label(label),
        option,
        strike,
        expiry(),
    )
}

fn monthly_fixings() -> Vec<Date> {
    (1..=12).map(|m| today().add_days(30 * m)).collect()
}

// ============================================================================
// Black-76
// ============================================================================

/// Mean of `y` corrected with the control `x` of known mean `x_mean`.
fn control_variate_mean(y: &[f64], x: &[f64], x_mean: f64) -> f64 {
    let n = y.len() as f64;
    let my = y.iter().sum::<f64>() / n;
    let mx = x.iter().sum::<f64>() / n;
    let (mut cov, mut var) = (0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        var += (a - mx) * (a - mx);
    }
    my - cov / var * (mx - x_mean)
}

#[test]
fn e2e_black_scenario() {
    // 50 equal steps over one year
    let config = SimulationConfig::builder()
        .n_paths(50_000)
        .block_size(4096)
        .seed(42)
        .build()
        .unwrap();
    let mut sim = Simulation::new(config, today());
    let schedule = Schedule::new().with_cosh_spacing(expiry(), 50, 0.0);
    sim.add_process(LognormalProcess::new("BRENT", inputs(), schedule))
        .unwrap();
    sim.add_payoff(european("call", OptionType::Call, 100.0)).unwrap();
    sim.add_payoff(european("put", OptionType::Put, 110.0)).unwrap();
    sim.add_payoff(european("level", OptionType::Call, 0.0)).unwrap();
    sim.add_payoff(AsianPayoff::new(
        PayoffTerms::new("BRENT", expiry()).with_label("asian"),
        OptionType::Call,
        100.0,
        monthly_fixings(),
    ))
    .unwrap();
    let output = sim.run().unwrap();
    assert!(output.context.n_steps() >= 51);

    let t = output.context.year_fraction(expiry());
    let level = &output.result("level").unwrap().values;
    let call = output.result("call").unwrap();
    let put = output.result("put").unwrap();
    let call_cv = control_variate_mean(&call.values, level, FORWARD);
    let put_cv = control_variate_mean(&put.values, level, FORWARD);
    let black_call = black_price(FORWARD, 100.0, VOL, t, true);
    let black_put = black_price(FORWARD, 110.0, VOL, t, false);

    assert!(
        (call_cv - black_call).abs() < 0.01 * black_call,
        "call {} vs Black {}",
        call_cv,
        black_call
    );
    assert!(
        (put_cv - black_put).abs() < 0.01 * black_put,
        "put {} vs Black {}",
        put_cv,
        black_put
    );
    assert!(call.std_error() > 0.0 && call.std_error() < 0.1);
    assert!(
        (call.mean() - black_call).abs() < 4.0 * call.std_error(),
        "raw call {} vs Black {} (se {})",
        call.mean(),
        black_call,
        call.std_error()
    );
    assert!(
        (put.mean() - black_put).abs() < 4.0 * put.std_error(),
        "raw put {} vs Black {} (se {})",
        put.mean(),
        black_put,
        put.std_error()
    );

    let asian = output.result("asian").unwrap().mean();
    assert!(asian > 0.0);
    assert!(asian < call.mean(), "asian {} european {}", asian, call.mean());
}

#[test]
fn e2e_put_call_parity_per_path() {
    let mut sim = simulation(8192);
    sim.add_payoff(european("call", OptionType::Call, 95.0)).unwrap();
    sim.add_payoff(european("put", OptionType::Put, 95.0)).unwrap();
    sim.add_payoff(european("fwd", OptionType::Call, 0.0)).unwrap();
    let output = sim.run().unwrap();

    let call = &output.results[0].values;
    let put = &output.results[1].values;
    let level = &output.results[2].values;
    for i in 0..call.len() {
        assert_relative_eq!(call[i] - put[i], level[i] - 95.0, epsilon = 1e-9);
    }
}

// ============================================================================
// Averaging
// ============================================================================

#[test]
fn e2e_zero_strike_reproduces_forward() {
    let mut sim = simulation(20_000);
    sim.add_payoff(european("level", OptionType::Call, 0.0)).unwrap();
    sim.add_payoff(AsianPayoff::new(
        PayoffTerms::new("BRENT", expiry()).with_label("average"),
        OptionType::Call,
        0.0,
        monthly_fixings(),
    ))
    .unwrap();
    let output = sim.run().unwrap();

    for result in &output.results {
        assert!(result.values.iter().all(|&v| v > 0.0));
        assert!(
            (result.mean() - FORWARD).abs() < 0.01 * FORWARD,
            "{} mean {}",
            result.name,
            result.mean()
        );
    }
}

#[test]
fn e2e_exposures_keyed_by_settlement_date() {
    let mut sim = simulation(4096);
    sim.add_payoff(european("call", OptionType::Call, 100.0)).unwrap();
    sim.add_payoff(european("put", OptionType::Put, 100.0)).unwrap();
    let output = sim.run().unwrap();

    assert_eq!(output.exposures.len(), 1);
    let total = output.results[0].mean() + output.results[1].mean();
    assert_relative_eq!(
        output.exposure("USD", expiry()).unwrap(),
        total,
        max_relative = 1e-10
    );
}

#[test]
fn e2e_exposures_split_by_currency() {
    let mut sim = simulation(4096);
    let yen = MarketInputs::new(Arc::new(FlatForward::new(5000.0)), Arc::new(FlatVol::new(VOL)));
    sim.add_process(LognormalProcess::new("TOCOM", yen, Schedule::new()))
        .unwrap();
    sim.add_payoff(european("usd", OptionType::Call, 0.0)).unwrap();
    sim.add_payoff(EuropeanPayoff::new(
        PayoffTerms::new("TOCOM", expiry())
            .with_currency("JPY")
            .with_asset_currency("JPY")
            .with_label("jpy"),
        OptionType::Call,
        0.0,
        expiry(),
    ))
    .unwrap();
    let output = sim.run().unwrap();

    assert_eq!(output.exposures.len(), 2);
    assert_relative_eq!(
        output.exposure("USD", expiry()).unwrap(),
        output.result("usd").unwrap().mean(),
        max_relative = 1e-10
    );
    assert_relative_eq!(
        output.exposure("JPY", expiry()).unwrap(),
        output.result("jpy").unwrap().mean(),
        max_relative = 1e-10
    );
}

// ============================================================================
// History
// ============================================================================

#[test]
fn e2e_historic_fixing_without_data_is_fatal() {
    let past = today().add_days(-10);
    let mut sim = simulation(1024);
    sim.add_payoff(AsianPayoff::new(
        PayoffTerms::new("BRENT", expiry()),
        OptionType::Call,
        100.0,
        vec![past, expiry()],
    ))
    .unwrap();

    assert_eq!(
        sim.run().unwrap_err(),
        SimulationError::MissingFixing {
            name: "BRENT".to_string(),
            date: past,
        }
    );
}

#[test]
fn e2e_historic_fixing_enters_average() {
    let past = today().add_days(-10);
    let config = SimulationConfig::builder().n_paths(1024).build().unwrap();
    let mut sim = Simulation::new(config, today());
    let inputs = inputs().with_fixings(fixings_from([(past, 80.0)]));
    sim.add_process(LognormalProcess::new("BRENT", inputs, Schedule::new()))
        .unwrap();
    sim.add_payoff(AsianPayoff::new(
        PayoffTerms::new("BRENT", today()),
        OptionType::Call,
        0.0,
        vec![past, today()],
    ))
    .unwrap();
    let output = sim.run().unwrap();

    // both fixings are known: (80 + 100) / 2 on every path
    for &v in &output.results[0].values {
        assert_relative_eq!(v, 90.0, epsilon = 1e-12);
    }
}
