//! Reduction of a universe ensemble to mean and sigma spectra.

use nalgebra::{DMatrix, DVector};
use nf_core::{Error, FlatIndex, Flavor, HornPolarity, Result};

use crate::spectrum::UniverseSet;

/// Mean and spread of one (horn, flavor) block across universes.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    /// Horn polarity of the block.
    pub horn: HornPolarity,
    /// Flavor of the block.
    pub flavor: Flavor,
    /// Per-bin arithmetic mean across universes.
    pub mean: Vec<f64>,
    /// Per-bin unbiased sample standard deviation (divisor N−1).
    pub sigma: Vec<f64>,
    /// Per-bin count of universes that actually contributed (NaN entries
    /// are excluded from the reduction).
    pub effective_n: Vec<usize>,
}

/// Result of aggregating one category's ensemble.
#[derive(Debug, Clone)]
pub struct AggregatedFlux {
    /// Category the ensemble samples.
    pub category: String,
    /// Per-block summaries in flat-index block order.
    pub blocks: Vec<BlockSummary>,
    /// Mean flattened onto the shared axis.
    pub mean: DVector<f64>,
    /// Sigma flattened onto the shared axis.
    pub sigma: DVector<f64>,
}

/// Reduce an ensemble to per-bin mean and unbiased standard deviation.
///
/// A universe missing a bin (NaN) is excluded from that bin's reduction
/// and the effective N for the bin is recorded. Any bin with fewer than
/// two contributing universes fails with
/// [`Error::InsufficientData`], since a sample variance is undefined
/// there. Pure reduction; the input is not modified.
pub fn aggregate(index: &FlatIndex, set: &UniverseSet) -> Result<AggregatedFlux> {
    let flat = set.flattened(index)?;
    let (mean, sigma, effective_n) = reduce_columns(&flat, set.category())?;

    let mut blocks = Vec::new();
    for (horn, flavor) in index.blocks() {
        let range = index.range(horn, flavor);
        blocks.push(BlockSummary {
            horn,
            flavor,
            mean: mean.as_slice()[range.clone()].to_vec(),
            sigma: sigma.as_slice()[range.clone()].to_vec(),
            effective_n: effective_n[range].to_vec(),
        });
    }

    Ok(AggregatedFlux { category: set.category().to_string(), blocks, mean, sigma })
}

fn reduce_columns(
    flat: &DMatrix<f64>,
    category: &str,
) -> Result<(DVector<f64>, DVector<f64>, Vec<usize>)> {
    let n_cols = flat.ncols();
    let mut mean = DVector::zeros(n_cols);
    let mut sigma = DVector::zeros(n_cols);
    let mut effective_n = vec![0usize; n_cols];

    for j in 0..n_cols {
        let mut n = 0usize;
        let mut sum = 0.0;
        for i in 0..flat.nrows() {
            let v = flat[(i, j)];
            if v.is_nan() {
                continue;
            }
            n += 1;
            sum += v;
        }
        if n < 2 {
            return Err(Error::InsufficientData(format!(
                "category '{category}': {n} universes contribute to flat bin {j}, need at least 2"
            )));
        }
        let m = sum / n as f64;

        let mut ss = 0.0;
        for i in 0..flat.nrows() {
            let v = flat[(i, j)];
            if v.is_nan() {
                continue;
            }
            let d = v - m;
            ss += d * d;
        }

        mean[j] = m;
        sigma[j] = (ss / (n - 1) as f64).sqrt();
        effective_n[j] = n;
    }

    Ok((mean, sigma, effective_n))
}
