//! Statistical (finite-sample) uncertainty of the simulated flux.

use nalgebra::DVector;
use nf_core::{Error, FlatIndex, Result};

use crate::matrix::CovMatrix;

/// Diagonal statistical-uncertainty model over the shared flat index.
///
/// Bins are statistically independent by construction, so the covariance
/// is exactly diagonal. The per-bin sigma must carry the same weighting
/// as the mean spectrum it accompanies: raw simulation errors are scaled
/// by the flux weights before squaring.
#[derive(Debug, Clone)]
pub struct StatisticalUncertainty {
    sigma: DVector<f64>,
}

impl StatisticalUncertainty {
    /// Build from raw per-bin statistical errors and the flux weights
    /// applied to the mean spectrum. `sigma[i]` becomes
    /// `raw_sigma[i] · weight[i]`.
    pub fn from_weighted_sigmas(
        index: &FlatIndex,
        raw_sigma: &DVector<f64>,
        weights: &DVector<f64>,
    ) -> Result<Self> {
        check_len(index, raw_sigma.len(), "statistical sigma")?;
        check_len(index, weights.len(), "flux weights")?;
        Ok(Self { sigma: raw_sigma.component_mul(weights) })
    }

    /// Build from unweighted per-bin event counts: Poisson variance equals
    /// the count, so sigma is its square root. Negative counts are
    /// rejected.
    pub fn from_counts(index: &FlatIndex, counts: &DVector<f64>) -> Result<Self> {
        check_len(index, counts.len(), "event counts")?;
        if let Some(bad) = counts.iter().find(|c| **c < 0.0 || !c.is_finite()) {
            return Err(Error::Configuration(format!(
                "event counts must be finite and non-negative, got {bad}"
            )));
        }
        Ok(Self { sigma: counts.map(f64::sqrt) })
    }

    /// Per-bin sigma over the flat axis.
    pub fn sigma(&self) -> &DVector<f64> {
        &self.sigma
    }

    /// The diagonal absolute covariance matrix: `diag[i] = sigma[i]²`,
    /// off-diagonal entries exactly zero.
    pub fn covariance(&self) -> CovMatrix {
        CovMatrix::from_diagonal(&self.sigma.component_mul(&self.sigma))
    }

    /// Fractional per-bin sigma: `sigma[i] / mean[i]`, zero where the mean
    /// vanishes.
    pub fn fractional_sigma(&self, mean: &DVector<f64>) -> Result<DVector<f64>> {
        if mean.len() != self.sigma.len() {
            return Err(Error::IndexMismatch(format!(
                "mean vector length {} does not match sigma length {}",
                mean.len(),
                self.sigma.len()
            )));
        }
        Ok(DVector::from_iterator(
            self.sigma.len(),
            self.sigma.iter().zip(mean.iter()).map(|(s, m)| if *m != 0.0 { s / m } else { 0.0 }),
        ))
    }
}

fn check_len(index: &FlatIndex, len: usize, what: &str) -> Result<()> {
    if len != index.len() {
        return Err(Error::IndexMismatch(format!(
            "{what} length {len} does not match flat index length {}",
            index.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nf_core::{Binning, BinningSpec, FlatIndex, Flavor};

    fn index() -> FlatIndex {
        let binnings = Flavor::ALL
            .iter()
            .map(|f| (*f, Binning::resolve(*f, &BinningSpec::Count(1)).unwrap()))
            .collect();
        FlatIndex::new(binnings).unwrap()
    }

    #[test]
    fn test_weighted_diagonal() {
        let idx = index();
        let raw = DVector::from_element(8, 2.0);
        let w = DVector::from_element(8, 0.5);
        let stat = StatisticalUncertainty::from_weighted_sigmas(&idx, &raw, &w).unwrap();
        let cov = stat.covariance();
        assert_relative_eq!(cov.matrix()[(0, 0)], 1.0);
        assert_relative_eq!(cov.matrix()[(0, 1)], 0.0);
        assert_relative_eq!(cov.trace(), 8.0);
    }

    #[test]
    fn test_poisson_counts() {
        let idx = index();
        let counts = DVector::from_element(8, 9.0);
        let stat = StatisticalUncertainty::from_counts(&idx, &counts).unwrap();
        assert_relative_eq!(stat.sigma()[0], 3.0);
        assert_relative_eq!(stat.covariance().matrix()[(3, 3)], 9.0);

        let bad = DVector::from_element(8, -1.0);
        assert!(StatisticalUncertainty::from_counts(&idx, &bad).is_err());
    }

    #[test]
    fn test_fractional_sigma_zero_mean() {
        let idx = index();
        let raw = DVector::from_element(8, 2.0);
        let w = DVector::from_element(8, 1.0);
        let stat = StatisticalUncertainty::from_weighted_sigmas(&idx, &raw, &w).unwrap();
        let mut mean = DVector::from_element(8, 4.0);
        mean[7] = 0.0;
        let frac = stat.fractional_sigma(&mean).unwrap();
        assert_relative_eq!(frac[0], 0.5);
        assert_relative_eq!(frac[7], 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let idx = index();
        let short = DVector::from_element(3, 1.0);
        let w = DVector::from_element(8, 1.0);
        assert!(StatisticalUncertainty::from_weighted_sigmas(&idx, &short, &w).is_err());
    }
}
