//! Integration tests for module exports.
//!
//! Verifies that the public modules and types are reachable via absolute
//! paths and behave as documented when used from outside the crate.

use std::sync::Arc;

#[test]
fn test_types_module_exports() {
    use pricer_core::types::{Date, DateError, DayCountConvention};

    let start = Date::from_ymd(2025, 1, 1).unwrap();
    let end = start.add_days(73);
    let t = DayCountConvention::ActualActual365.year_fraction(start, end);
    assert!((t - 0.2).abs() < 1e-12);

    let bad: Result<Date, DateError> = Date::from_ymd(2025, 2, 30);
    assert!(bad.is_err());
}

#[test]
fn test_math_module_exports() {
    use pricer_core::math::black::black_price;
    use pricer_core::math::distributions::{norm_cdf, norm_inv};
    use pricer_core::math::interpolators::{Interpolator, LinearInterpolator};
    use pricer_core::math::{CholeskyFactor, CorrelationMatrix};

    let interp = LinearInterpolator::<f64>::new(&[0.0, 1.0], &[10.0, 20.0]).unwrap();
    assert!((interp.interpolate(0.25).unwrap() - 12.5).abs() < 1e-12);
    assert!(interp.interpolate(2.0).is_err());

    let corr = CorrelationMatrix::new(&[1.0, 0.6, 0.6, 1.0], 2).unwrap();
    let factor: CholeskyFactor<f64> = corr.cholesky().unwrap();
    let mut z = [1.0, 0.0];
    factor.transform_inplace(&mut z);
    assert!((z[1] - 0.6).abs() < 1e-12);

    assert!((norm_cdf(norm_inv(0.3)) - 0.3).abs() < 1e-9);
    // put-call parity on the forward
    let call = black_price(100.0, 90.0, 0.3, 1.0, true);
    let put = black_price(100.0, 90.0, 0.3, 1.0, false);
    assert!((call - put - 10.0).abs() < 1e-10);
}

#[test]
fn test_market_data_module_exports() {
    use pricer_core::market_data::{
        fixings_from, latest_fixing, resolve_correlation, CorrelationTable, DiscountSource,
        FlatDiscount, FlatForward, FlatVol, ForwardCurve, VolatilitySurface,
    };
    use pricer_core::types::Date;

    let curve: Arc<dyn ForwardCurve> = Arc::new(FlatForward::new(75.0));
    assert_eq!(curve.forward(3.0).unwrap(), 75.0);

    let surface: Arc<dyn VolatilitySurface> = Arc::new(FlatVol::new(0.3));
    assert!((surface.forward_atm_vol(0.5, 1.0).unwrap() - 0.3).abs() < 1e-12);

    let table = CorrelationTable::new().with("EUR/USD", "BRENT", 0.4);
    assert_eq!(resolve_correlation(&table, "BRENT", "USD/EUR", 0.0), Ok(-0.4));

    let d = Date::from_ymd(2025, 3, 3).unwrap();
    let fixings = fixings_from([(d, 70.0)]);
    assert_eq!(latest_fixing(&fixings, d.add_days(1)), Some((d, 70.0)));

    let discount = FlatDiscount::new().with_rate("USD", 0.0);
    assert_eq!(discount.discount_factor("USD", d, d.add_days(365)).unwrap(), 1.0);
}
