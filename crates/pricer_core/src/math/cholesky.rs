//! Correlation matrices and their lower-triangular Cholesky factors.
//!
//! The factorisation accepts positive *semi*-definite matrices: a pivot that
//! is zero within tolerance yields a zero column, provided every residual
//! below it is zero as well. Perfectly correlated factor pairs therefore
//! decompose, while an indefinite matrix is rejected rather than clipped.

use num_traits::Float;
use thiserror::Error;

/// Pivot tolerance for the semi-definite factorisation.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Correlation matrix validation and factorisation errors.
///
/// # Examples
///
/// ```
/// use pricer_core::math::cholesky::CholeskyError;
///
/// let err = CholeskyError::OutOfRange { i: 0, j: 1, value: 1.5 };
/// assert!(format!("{}", err).contains("1.5"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CholeskyError {
    /// Matrix is not positive semi-definite.
    #[error("Correlation matrix is not positive semi-definite (pivot {index} = {pivot})")]
    NotPositiveSemiDefinite {
        /// Row at which the factorisation failed
        index: usize,
        /// Offending pivot value
        pivot: f64,
    },

    /// Data length does not match `dim * dim`.
    #[error("Invalid dimensions: expected {expected} elements, got {got}")]
    InvalidDimensions {
        /// Expected number of elements
        expected: usize,
        /// Actual number of elements
        got: usize,
    },

    /// Diagonal element differs from one.
    #[error("Diagonal element at {index} must be 1.0, got {value}")]
    InvalidDiagonal {
        /// Diagonal index
        index: usize,
        /// Value found
        value: f64,
    },

    /// Matrix is not symmetric.
    #[error("Matrix is not symmetric at ({i}, {j})")]
    NotSymmetric {
        /// Row index
        i: usize,
        /// Column index
        j: usize,
    },

    /// Off-diagonal correlation outside [-1, 1].
    #[error("Correlation at ({i}, {j}) = {value} is outside [-1, 1]")]
    OutOfRange {
        /// Row index
        i: usize,
        /// Column index
        j: usize,
        /// Value found
        value: f64,
    },
}

/// Validated symmetric correlation matrix (row-major).
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix<T: Float> {
    data: Vec<T>,
    dim: usize,
}

impl<T: Float> CorrelationMatrix<T> {
    /// Create a correlation matrix from a row-major `dim * dim` array.
    ///
    /// # Errors
    ///
    /// Fails when the length is wrong, a diagonal entry is not one, the
    /// matrix is not symmetric, or an entry lies outside [-1, 1].
    pub fn new(data: &[T], dim: usize) -> Result<Self, CholeskyError> {
        let expected = dim * dim;
        if data.len() != expected {
            return Err(CholeskyError::InvalidDimensions {
                expected,
                got: data.len(),
            });
        }

        let one = T::one();
        let epsilon = T::from(1e-10).unwrap_or_else(T::zero);

        for i in 0..dim {
            let diag = data[i * dim + i];
            if (diag - one).abs() > epsilon {
                return Err(CholeskyError::InvalidDiagonal {
                    index: i,
                    value: diag.to_f64().unwrap_or(f64::NAN),
                });
            }
        }

        for i in 0..dim {
            for j in (i + 1)..dim {
                let val_ij = data[i * dim + j];
                let val_ji = data[j * dim + i];

                if (val_ij - val_ji).abs() > epsilon {
                    return Err(CholeskyError::NotSymmetric { i, j });
                }

                if val_ij.abs() > one + epsilon {
                    return Err(CholeskyError::OutOfRange {
                        i,
                        j,
                        value: val_ij.to_f64().unwrap_or(f64::NAN),
                    });
                }
            }
        }

        Ok(Self {
            data: data.to_vec(),
            dim,
        })
    }

    /// Identity correlation matrix.
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![T::zero(); dim * dim];
        for i in 0..dim {
            data[i * dim + i] = T::one();
        }
        Self { data, dim }
    }

    /// Matrix dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Element at (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.dim + j]
    }

    /// Lower-triangular factor `L` with `C = L Lᵀ`.
    ///
    /// # Errors
    ///
    /// `CholeskyError::NotPositiveSemiDefinite` when a pivot is negative
    /// beyond tolerance, or when a zero pivot leaves a non-zero residual.
    pub fn cholesky(&self) -> Result<CholeskyFactor<T>, CholeskyError> {
        let n = self.dim;
        let tol = T::from(PIVOT_TOLERANCE).unwrap_or_else(T::zero);
        let residual_tol = T::from(1e-8).unwrap_or_else(T::zero);
        let mut lower = vec![T::zero(); n * n];

        for j in 0..n {
            let mut sum = T::zero();
            for k in 0..j {
                let l_jk = lower[j * n + k];
                sum = sum + l_jk * l_jk;
            }
            let pivot = self.get(j, j) - sum;

            if pivot < -tol {
                return Err(CholeskyError::NotPositiveSemiDefinite {
                    index: j,
                    pivot: pivot.to_f64().unwrap_or(f64::NAN),
                });
            }

            if pivot <= tol {
                // Zero column: every residual below the pivot must vanish too.
                for i in (j + 1)..n {
                    let mut s = T::zero();
                    for k in 0..j {
                        s = s + lower[i * n + k] * lower[j * n + k];
                    }
                    let residual = self.get(i, j) - s;
                    if residual.abs() > residual_tol {
                        return Err(CholeskyError::NotPositiveSemiDefinite {
                            index: j,
                            pivot: pivot.to_f64().unwrap_or(f64::NAN),
                        });
                    }
                }
                continue;
            }

            let l_jj = pivot.sqrt();
            lower[j * n + j] = l_jj;

            for i in (j + 1)..n {
                let mut s = T::zero();
                for k in 0..j {
                    s = s + lower[i * n + k] * lower[j * n + k];
                }
                lower[i * n + j] = (self.get(i, j) - s) / l_jj;
            }
        }

        Ok(CholeskyFactor { data: lower, dim: n })
    }
}

/// Lower-triangular Cholesky factor of a correlation matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CholeskyFactor<T: Float> {
    data: Vec<T>,
    dim: usize,
}

impl<T: Float> CholeskyFactor<T> {
    /// Identity factor (uncorrelated draws).
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![T::zero(); dim * dim];
        for i in 0..dim {
            data[i * dim + i] = T::one();
        }
        Self { data, dim }
    }

    /// Matrix dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Element at (i, j); zero above the diagonal.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        if j > i {
            T::zero()
        } else {
            self.data[i * self.dim + j]
        }
    }

    /// Row `i` up to and including the diagonal.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.dim..i * self.dim + i + 1]
    }

    /// Computes `W = L Z` in place.
    ///
    /// # Panics
    ///
    /// Panics if `z.len() < self.dim()`.
    pub fn transform_inplace(&self, z: &mut [T]) {
        assert!(
            z.len() >= self.dim,
            "Input vector length {} is less than matrix dimension {}",
            z.len(),
            self.dim
        );

        // Walk rows bottom-up so each row only reads not-yet-overwritten inputs.
        for i in (0..self.dim).rev() {
            let mut sum = T::zero();
            for (j, &l) in self.row(i).iter().enumerate() {
                sum = sum + l * z[j];
            }
            z[i] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_bad_matrices() {
        assert!(matches!(
            CorrelationMatrix::new(&[1.0, 0.5, 0.5], 2),
            Err(CholeskyError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            CorrelationMatrix::new(&[0.9, 0.0, 0.0, 1.0], 2),
            Err(CholeskyError::InvalidDiagonal { .. })
        ));
        assert!(matches!(
            CorrelationMatrix::new(&[1.0, 0.2, 0.3, 1.0], 2),
            Err(CholeskyError::NotSymmetric { .. })
        ));
        assert!(matches!(
            CorrelationMatrix::new(&[1.0, 1.2, 1.2, 1.0], 2),
            Err(CholeskyError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_cholesky_2x2() {
        let rho: f64 = 0.6;
        let m = CorrelationMatrix::new(&[1.0, rho, rho, 1.0], 2).unwrap();
        let l = m.cholesky().unwrap();
        assert_relative_eq!(l.get(0, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(l.get(1, 0), rho, epsilon = 1e-12);
        assert_relative_eq!(l.get(1, 1), (1.0 - rho * rho).sqrt(), epsilon = 1e-12);
        assert_eq!(l.get(0, 1), 0.0);
    }

    #[test]
    fn test_cholesky_perfect_correlation_is_accepted() {
        let m = CorrelationMatrix::new(&[1.0, 1.0, 1.0, 1.0], 2).unwrap();
        let l = m.cholesky().unwrap();
        assert_relative_eq!(l.get(1, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(l.get(1, 1), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        #[rustfmt::skip]
        let data = [
            1.0, 0.9, -0.9,
            0.9, 1.0, 0.9,
            -0.9, 0.9, 1.0,
        ];
        let m = CorrelationMatrix::new(&data, 3).unwrap();
        assert!(matches!(
            m.cholesky(),
            Err(CholeskyError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn test_transform_inplace() {
        let m = CorrelationMatrix::new(&[1.0, 0.5, 0.5, 1.0], 2).unwrap();
        let l = m.cholesky().unwrap();
        let mut z = [1.0, 2.0];
        l.transform_inplace(&mut z);
        assert_relative_eq!(z[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(z[1], 0.5 + 0.75_f64.sqrt() * 2.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_reconstructs_equicorrelated(rho in -0.2f64..0.95, n in 2usize..6) {
            let mut data = vec![rho; n * n];
            for i in 0..n {
                data[i * n + i] = 1.0;
            }
            let m = CorrelationMatrix::new(&data, n).unwrap();
            let l = m.cholesky().unwrap();
            for i in 0..n {
                for j in 0..n {
                    let mut c = 0.0;
                    for k in 0..n {
                        c += l.get(i, k) * l.get(j, k);
                    }
                    prop_assert!((c - m.get(i, j)).abs() < 1e-9);
                }
            }
        }
    }
}
