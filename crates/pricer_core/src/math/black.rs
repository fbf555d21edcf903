//! Black-76 formula on a forward.
//!
//! Used as the analytic reference for the lognormal generators and as the
//! vanilla leg when checking barrier parity.

use super::distributions::norm_cdf;

/// Undiscounted Black-76 price of a European option on a forward.
///
/// Degenerates to intrinsic value when `vol * sqrt(t)` is zero.
///
/// ```
/// use pricer_core::math::black::black_price;
///
/// let call = black_price(100.0, 100.0, 0.2, 1.0, true);
/// assert!((call - 7.965567).abs() < 1e-5);
/// ```
pub fn black_price(forward: f64, strike: f64, vol: f64, t: f64, is_call: bool) -> f64 {
    let std_dev = vol * t.max(0.0).sqrt();
    let sign = if is_call { 1.0 } else { -1.0 };

    if std_dev <= 0.0 || strike <= 0.0 {
        return (sign * (forward - strike)).max(0.0);
    }

    let d1 = ((forward / strike).ln() + 0.5 * std_dev * std_dev) / std_dev;
    let d2 = d1 - std_dev;
    sign * (forward * norm_cdf(sign * d1) - strike * norm_cdf(sign * d2))
}

/// Forward delta `Φ(d1)` of a Black call.
pub fn black_call_delta(forward: f64, strike: f64, vol: f64, t: f64) -> f64 {
    let std_dev = vol * t.max(0.0).sqrt();
    if std_dev <= 0.0 {
        return if forward > strike { 1.0 } else { 0.0 };
    }
    let d1 = ((forward / strike).ln() + 0.5 * std_dev * std_dev) / std_dev;
    norm_cdf(d1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_put_call_parity() {
        let (f, k, v, t) = (105.0, 100.0, 0.3, 0.75);
        let call = black_price(f, k, v, t, true);
        let put = black_price(f, k, v, t, false);
        assert_relative_eq!(call - put, f - k, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_vol_is_intrinsic() {
        assert_eq!(black_price(110.0, 100.0, 0.0, 1.0, true), 10.0);
        assert_eq!(black_price(110.0, 100.0, 0.0, 1.0, false), 0.0);
    }

    #[test]
    fn test_zero_strike_call_is_forward() {
        assert_eq!(black_price(80.0, 0.0, 0.2, 1.0, true), 80.0);
    }

    #[test]
    fn test_delta_at_the_money() {
        let d = black_call_delta(100.0, 100.0, 0.2, 1.0);
        assert_relative_eq!(d, norm_cdf(0.1), epsilon = 1e-14);
    }
}
