//! Combination of statistical, hadron-production, and beam-line
//! covariances into the total uncertainty budget.

use nalgebra::{DMatrix, DVector};
use nf_core::{Error, Result};

use crate::matrix::CovMatrix;

/// Total uncertainty products.
#[derive(Debug, Clone)]
pub struct TotalUncertainty {
    /// Elementwise sum of the component absolute covariances.
    pub absolute: CovMatrix,
    /// Total covariance divided by the outer product of the mean flux.
    pub fractional: CovMatrix,
    /// Correlation derived from the total absolute covariance.
    pub correlation: DMatrix<f64>,
    /// Per-bin total sigma: square root of the absolute diagonal.
    pub sigma: DVector<f64>,
}

/// Sum the component covariances into the total budget.
///
/// All inputs must be ordered by the same flat index; a dimension mismatch
/// is a programming-contract violation reported as
/// [`Error::IndexMismatch`] and must abort the run. The beam term is
/// optional (single-run inputs have no alternate beam samples).
pub fn combine(
    statistical: &CovMatrix,
    hadron: &CovMatrix,
    beam: Option<&CovMatrix>,
    mean: &DVector<f64>,
) -> Result<TotalUncertainty> {
    if mean.len() != statistical.dim() {
        return Err(Error::IndexMismatch(format!(
            "mean flux length {} does not match covariance dimension {}",
            mean.len(),
            statistical.dim()
        )));
    }

    let mut absolute = statistical.add(hadron)?;
    if let Some(beam) = beam {
        absolute = absolute.add(beam)?;
    }

    let fractional = absolute.to_fractional(mean)?;
    let correlation = absolute.correlation()?;
    let sigma = absolute.diagonal_sigma();

    Ok(TotalUncertainty { absolute, fractional, correlation, sigma })
}
