//! Hadron-production systematics: per-category empirical covariance over
//! the universe ensemble, and the summed total.

use nalgebra::{DMatrix, DVector};
use nf_core::{CategoryRegistry, Error, FlatIndex, Result};
use rayon::prelude::*;

use crate::aggregate::{aggregate, AggregatedFlux};
use crate::matrix::{sum_matrices, CovMatrix};
use crate::spectrum::UniverseSet;

/// Covariance products of a single enabled category.
#[derive(Debug, Clone)]
pub struct CategoryCovariance {
    /// Category name.
    pub category: String,
    /// Number of universes in the ensemble.
    pub n_universes: usize,
    /// Mean and sigma of the ensemble.
    pub flux: AggregatedFlux,
    /// Empirical covariance in flux units squared.
    pub absolute: CovMatrix,
    /// Covariance divided by the outer product of the category mean.
    pub fractional: CovMatrix,
    /// Correlation derived from the absolute covariance.
    pub correlation: DMatrix<f64>,
    /// Square root of the fractional diagonal: per-bin fractional
    /// uncertainty.
    pub fractional_sigma: DVector<f64>,
}

/// All hadron-production covariance products: one entry per enabled
/// category plus their sum.
#[derive(Debug, Clone)]
pub struct HadronSystematics {
    /// Per-category products, sorted by category name.
    pub categories: Vec<CategoryCovariance>,
    /// Sum of the per-category absolute covariances.
    pub total_absolute: CovMatrix,
    /// Sum of the per-category fractional covariances.
    pub total_fractional: CovMatrix,
    /// Correlation of the total absolute covariance.
    pub total_correlation: DMatrix<f64>,
}

/// Build the hadron-production covariance products.
///
/// Disabled categories are excluded entirely (they contribute nothing and
/// do not appear in the per-category output). Categories are independent
/// and build in parallel; the final sum runs single-threaded in sorted
/// category order, so the floating-point total is reproducible. Any
/// category failure aborts the whole build.
pub fn build_hadron_systematics(
    index: &FlatIndex,
    sets: &[UniverseSet],
    registry: &CategoryRegistry,
) -> Result<HadronSystematics> {
    let mut enabled: Vec<&UniverseSet> =
        sets.iter().filter(|s| registry.is_enabled(s.category())).collect();
    enabled.sort_by(|a, b| a.category().cmp(b.category()));

    if enabled.is_empty() {
        return Err(Error::Configuration(
            "no enabled hadron-production categories".to_string(),
        ));
    }
    for window in enabled.windows(2) {
        if window[0].category() == window[1].category() {
            return Err(Error::Configuration(format!(
                "duplicate universe set for category '{}'",
                window[0].category()
            )));
        }
    }

    tracing::debug!(n_categories = enabled.len(), "building hadron covariance matrices");

    let categories: Vec<CategoryCovariance> = enabled
        .par_iter()
        .map(|set| build_category(index, set))
        .collect::<Result<Vec<_>>>()?;

    let n = index.len();
    let absolutes: Vec<CovMatrix> = categories.iter().map(|c| c.absolute.clone()).collect();
    let fractionals: Vec<CovMatrix> = categories.iter().map(|c| c.fractional.clone()).collect();
    let total_absolute = sum_matrices(n, &absolutes)?;
    let total_fractional = sum_matrices(n, &fractionals)?;
    let total_correlation = total_absolute.correlation()?;

    Ok(HadronSystematics { categories, total_absolute, total_fractional, total_correlation })
}

/// Empirical covariance of one category: deviations of each universe from
/// the ensemble mean, accumulated with divisor N−1.
fn build_category(index: &FlatIndex, set: &UniverseSet) -> Result<CategoryCovariance> {
    let flux = aggregate(index, set)?;
    let flat = set.flattened(index)?;
    let n_universes = flat.nrows();
    let n = index.len();

    let mut m = DMatrix::zeros(n, n);
    for u in 0..n_universes {
        // a NaN bin was excluded from the mean; its deviation is treated
        // as zero so it drops out of the accumulation
        let dev = DVector::from_iterator(
            n,
            (0..n).map(|j| {
                let v = flat[(u, j)];
                if v.is_nan() {
                    0.0
                } else {
                    v - flux.mean[j]
                }
            }),
        );
        m.ger(1.0, &dev, &dev, 1.0);
    }
    m /= (n_universes - 1) as f64;

    let absolute = CovMatrix::new(m)?;
    let fractional = absolute.to_fractional(&flux.mean)?;
    let correlation = absolute.correlation()?;
    let fractional_sigma = fractional.diagonal_sigma();

    Ok(CategoryCovariance {
        category: set.category().to_string(),
        n_universes,
        flux,
        absolute,
        fractional,
        correlation,
        fractional_sigma,
    })
}
