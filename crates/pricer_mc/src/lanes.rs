//! SIMD lane type shared by path storage and every kernel.
//!
//! One [`Lane`] holds the values of [`LANES`] paths at a single
//! (factor, step) coordinate.

pub use wide::f64x4 as Lane;

/// Number of paths per lane.
pub const LANES: usize = 4;

/// Broadcasts a scalar to every lane.
#[inline(always)]
pub fn splat(value: f64) -> Lane {
    Lane::splat(value)
}

/// Copies a lane out to an array.
#[inline(always)]
pub fn to_array(lane: Lane) -> [f64; LANES] {
    lane.to_array()
}

/// Applies a scalar function lane by lane.
#[inline]
pub fn map_lanes<F: Fn(f64) -> f64>(lane: Lane, f: F) -> Lane {
    let a = lane.to_array();
    Lane::from([f(a[0]), f(a[1]), f(a[2]), f(a[3])])
}

/// Horizontal sum.
#[inline]
pub fn lane_sum(lane: Lane) -> f64 {
    lane.to_array().iter().sum()
}

/// 1.0 where `predicate` holds, 0.0 elsewhere.
#[inline]
pub fn indicator<F: Fn(f64) -> bool>(lane: Lane, predicate: F) -> Lane {
    map_lanes(lane, |x| if predicate(x) { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_sum() {
        let lane = Lane::from([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(lane_sum(lane), 10.0);
        assert_eq!(to_array(map_lanes(lane, |x| x * x)), [1.0, 4.0, 9.0, 16.0]);
        assert_eq!(to_array(indicator(lane, |x| x > 2.5)), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_splat_arithmetic() {
        let lane = splat(2.0) * Lane::from([1.0, -1.0, 0.5, 0.0]) + splat(1.0);
        assert_eq!(to_array(lane), [3.0, -1.0, 2.0, 1.0]);
    }
}
