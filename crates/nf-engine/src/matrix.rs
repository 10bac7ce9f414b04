//! Covariance matrix wrapper and the shared correlation-derivation rule.

use nalgebra::{DMatrix, DVector};
use nf_core::{Error, Result};

/// Relative threshold below which a diagonal entry counts as zero when
/// deriving correlations. Absorbs floating-point noise from the builders.
const SINGULAR_DIAG_REL_TOL: f64 = 1e-15;

/// A symmetric covariance matrix over the shared flat index.
///
/// Exists in absolute (flux units squared) and fractional (divided by the
/// outer product of means) forms; the wrapper does not distinguish them,
/// callers track which form they hold. Construction symmetrizes the input
/// to absorb floating-point asymmetry from accumulation order.
#[derive(Debug, Clone, PartialEq)]
pub struct CovMatrix {
    mat: DMatrix<f64>,
}

impl CovMatrix {
    /// Wrap a square matrix, symmetrizing it as (M + Mᵀ)/2.
    pub fn new(mat: DMatrix<f64>) -> Result<Self> {
        if mat.nrows() != mat.ncols() {
            return Err(Error::IndexMismatch(format!(
                "covariance matrix must be square, got {}x{}",
                mat.nrows(),
                mat.ncols()
            )));
        }
        let sym = (&mat + mat.transpose()) * 0.5;
        Ok(Self { mat: sym })
    }

    /// The zero matrix of dimension `n`.
    pub fn zeros(n: usize) -> Self {
        Self { mat: DMatrix::zeros(n, n) }
    }

    /// A diagonal covariance matrix from per-bin variances.
    pub fn from_diagonal(variances: &DVector<f64>) -> Self {
        Self { mat: DMatrix::from_diagonal(variances) }
    }

    /// Matrix dimension (length of the flat index it is ordered by).
    pub fn dim(&self) -> usize {
        self.mat.nrows()
    }

    /// The underlying dense matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.mat
    }

    /// Sum of diagonal entries.
    pub fn trace(&self) -> f64 {
        self.mat.trace()
    }

    /// Square roots of the diagonal (per-bin sigma). Small negative noise
    /// on the diagonal clamps to zero.
    pub fn diagonal_sigma(&self) -> DVector<f64> {
        DVector::from_iterator(self.dim(), self.mat.diagonal().iter().map(|d| d.max(0.0).sqrt()))
    }

    /// Elementwise sum with another matrix sharing the same flat index.
    pub fn add(&self, other: &CovMatrix) -> Result<CovMatrix> {
        if self.dim() != other.dim() {
            return Err(Error::IndexMismatch(format!(
                "cannot sum covariance matrices of dimension {} and {}",
                self.dim(),
                other.dim()
            )));
        }
        Ok(CovMatrix { mat: &self.mat + &other.mat })
    }

    /// Convert between absolute and fractional forms by dividing by the
    /// outer product of `mean`. Entries where the outer product is zero
    /// become zero, matching the upstream 0/0 convention.
    pub fn to_fractional(&self, mean: &DVector<f64>) -> Result<CovMatrix> {
        if mean.len() != self.dim() {
            return Err(Error::IndexMismatch(format!(
                "mean vector length {} does not match matrix dimension {}",
                mean.len(),
                self.dim()
            )));
        }
        let n = self.dim();
        let mut out = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let denom = mean[i] * mean[j];
                if denom != 0.0 {
                    out[(i, j)] = self.mat[(i, j)] / denom;
                }
            }
        }
        Ok(CovMatrix { mat: out })
    }

    /// Scale to absolute form by multiplying by the outer product of
    /// `mean`.
    pub fn to_absolute(&self, mean: &DVector<f64>) -> Result<CovMatrix> {
        if mean.len() != self.dim() {
            return Err(Error::IndexMismatch(format!(
                "mean vector length {} does not match matrix dimension {}",
                mean.len(),
                self.dim()
            )));
        }
        let n = self.dim();
        let mut out = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                out[(i, j)] = self.mat[(i, j)] * mean[i] * mean[j];
            }
        }
        Ok(CovMatrix { mat: out })
    }

    /// Derive the correlation matrix: `corr[i,j] = cov[i,j] / (σᵢ·σⱼ)`.
    ///
    /// Convention for zero diagonal terms: the diagonal entry is 1.0, a
    /// zero off-diagonal entry is 0.0, and a nonzero off-diagonal entry
    /// over a zero diagonal term is a [`Error::SingularBin`] failure.
    /// "Zero" is relative to the largest diagonal entry to absorb
    /// floating-point noise.
    pub fn correlation(&self) -> Result<DMatrix<f64>> {
        let n = self.dim();
        let diag = self.mat.diagonal();
        let dmax = diag.iter().fold(0.0f64, |a, d| a.max(d.abs()));
        let zero_tol = dmax * SINGULAR_DIAG_REL_TOL;

        let mut corr = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let dii = diag[i];
                let djj = diag[j];
                if dii.abs() <= zero_tol || djj.abs() <= zero_tol {
                    if i == j {
                        corr[(i, j)] = 1.0;
                    } else if self.mat[(i, j)].abs() > zero_tol {
                        return Err(Error::SingularBin(format!(
                            "correlation undefined at ({i}, {j}): nonzero covariance {} over zero variance",
                            self.mat[(i, j)]
                        )));
                    }
                    continue;
                }
                let c = self.mat[(i, j)] / (dii * djj).sqrt();
                // numerical noise can push |corr| marginally past 1
                corr[(i, j)] = c.clamp(-1.0, 1.0);
            }
        }
        Ok(corr)
    }
}

/// Sum a sequence of covariance matrices in the order given. The order is
/// fixed by callers (sorted category names) so floating-point totals are
/// reproducible.
pub fn sum_matrices(n: usize, matrices: &[CovMatrix]) -> Result<CovMatrix> {
    let mut total = CovMatrix::zeros(n);
    for m in matrices {
        total = total.add(m)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_symmetrized_on_construction() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.3, 2.0]);
        let cov = CovMatrix::new(m).unwrap();
        assert_relative_eq!(cov.matrix()[(0, 1)], 0.4);
        assert_relative_eq!(cov.matrix()[(1, 0)], 0.4);
    }

    #[test]
    fn test_non_square_rejected() {
        assert!(CovMatrix::new(DMatrix::zeros(2, 3)).is_err());
    }

    #[test]
    fn test_correlation_rule() {
        let m = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 0.0, 2.0, 9.0, 0.0, 0.0, 0.0, 0.0]);
        let cov = CovMatrix::new(m).unwrap();
        let corr = cov.correlation().unwrap();
        assert_relative_eq!(corr[(0, 0)], 1.0);
        assert_relative_eq!(corr[(0, 1)], 2.0 / 6.0);
        // zero-variance bin: diagonal 1 by convention, off-diagonal 0
        assert_relative_eq!(corr[(2, 2)], 1.0);
        assert_relative_eq!(corr[(0, 2)], 0.0);
    }

    #[test]
    fn test_singular_bin_error() {
        let m = DMatrix::from_row_slice(2, 2, &[0.0, 0.5, 0.5, 1.0]);
        let cov = CovMatrix::new(m).unwrap();
        assert!(matches!(cov.correlation(), Err(Error::SingularBin(_))));
    }

    #[test]
    fn test_fractional_roundtrip() {
        let mean = DVector::from_vec(vec![2.0, 4.0]);
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]);
        let cov = CovMatrix::new(m).unwrap();
        let frac = cov.to_fractional(&mean).unwrap();
        assert_relative_eq!(frac.matrix()[(0, 0)], 0.25);
        assert_relative_eq!(frac.matrix()[(0, 1)], 0.5 / 8.0);
        let back = frac.to_absolute(&mean).unwrap();
        assert_relative_eq!(back.matrix()[(1, 1)], 2.0);
    }

    #[test]
    fn test_fractional_zero_mean_bins() {
        let mean = DVector::from_vec(vec![2.0, 0.0]);
        let cov = CovMatrix::new(DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0])).unwrap();
        let frac = cov.to_fractional(&mean).unwrap();
        assert_relative_eq!(frac.matrix()[(1, 1)], 0.0);
    }

    #[test]
    fn test_sum_dimension_mismatch() {
        let a = CovMatrix::zeros(2);
        let b = CovMatrix::zeros(3);
        assert!(matches!(a.add(&b), Err(Error::IndexMismatch(_))));
    }
}
