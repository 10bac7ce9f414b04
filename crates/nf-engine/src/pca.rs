//! Principal component analysis of a covariance matrix.
//!
//! Eigen-decomposes a real symmetric covariance matrix, ranks components
//! by variance contribution, and reconstructs approximate covariances
//! from truncated component sets. Uses nalgebra's symmetric eigensolver;
//! no hand-rolled decomposition.

use nalgebra::{DMatrix, DVector};
use nf_core::{Error, FlatIndex, Flavor, HornPolarity, Result};

use crate::matrix::CovMatrix;

/// Negative eigenvalues with magnitude up to this fraction of the largest
/// eigenvalue are clamped to zero; anything beyond fails the
/// decomposition.
pub const NEGATIVE_EIGENVALUE_REL_TOL: f64 = 1e-9;

/// One principal component reshaped onto the energy axis of a single
/// (horn, flavor) block.
#[derive(Debug, Clone)]
pub struct ComponentSpectrum {
    /// Component rank (0 = largest eigenvalue).
    pub component: usize,
    /// Horn polarity of the block.
    pub horn: HornPolarity,
    /// Flavor of the block.
    pub flavor: Flavor,
    /// Eigenvector entries of the block.
    pub eigenvector: Vec<f64>,
    /// Eigenvector scaled by sqrt(eigenvalue): the principal component.
    pub principal: Vec<f64>,
}

/// Result of the eigen-decomposition, sorted by descending eigenvalue.
#[derive(Debug, Clone)]
pub struct PcaResult {
    /// Eigenvalues in descending order; small negative noise clamped to
    /// zero.
    pub eigenvalues: Vec<f64>,
    /// Fraction of the total variance carried by each component.
    pub fractions: Vec<f64>,
    /// Cumulative sums of the variance fractions.
    pub cumulative: Vec<f64>,
    /// Unit-norm eigenvectors as columns, ordered like the eigenvalues.
    pub eigenvectors: DMatrix<f64>,
    /// Principal components as columns: eigenvector scaled by
    /// sqrt(eigenvalue).
    pub components: DMatrix<f64>,
}

impl PcaResult {
    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.eigenvectors.nrows()
    }

    /// Reconstruct an approximate covariance from the top `k` components:
    /// Σ λᵢ vᵢ vᵢᵀ. With `k` equal to the dimension this reproduces the
    /// input within floating-point tolerance.
    pub fn reconstructed(&self, k: usize) -> Result<CovMatrix> {
        if k > self.eigenvalues.len() {
            return Err(Error::IndexMismatch(format!(
                "requested {k} components, decomposition has {}",
                self.eigenvalues.len()
            )));
        }
        let n = self.dim();
        let mut m = DMatrix::zeros(n, n);
        for i in 0..k {
            let v = self.eigenvectors.column(i);
            m.ger(self.eigenvalues[i], &v, &v, 1.0);
        }
        CovMatrix::new(m)
    }

    /// Number of leading components needed before the cumulative variance
    /// fraction reaches `threshold`. A threshold ≥ 1 keeps every component
    /// with nonzero eigenvalue.
    pub fn components_below_threshold(&self, threshold: f64) -> usize {
        self.eigenvalues
            .iter()
            .zip(self.cumulative.iter())
            .take_while(|(ev, cum)| **ev > 0.0 && **cum < threshold)
            .count()
    }

    /// Reshape the top `k` components onto the per-(horn, flavor) energy
    /// axes of `index`.
    pub fn component_spectra(&self, index: &FlatIndex, k: usize) -> Result<Vec<ComponentSpectrum>> {
        if index.len() != self.dim() {
            return Err(Error::IndexMismatch(format!(
                "flat index length {} does not match decomposition dimension {}",
                index.len(),
                self.dim()
            )));
        }
        if k > self.eigenvalues.len() {
            return Err(Error::IndexMismatch(format!(
                "requested {k} components, decomposition has {}",
                self.eigenvalues.len()
            )));
        }
        let mut out = Vec::with_capacity(k * 8);
        for component in 0..k {
            let evec = self.eigenvectors.column(component);
            let pc = self.components.column(component);
            for (horn, flavor) in index.blocks() {
                let range = index.range(horn, flavor);
                out.push(ComponentSpectrum {
                    component,
                    horn,
                    flavor,
                    eigenvector: evec.as_slice()[range.clone()].to_vec(),
                    principal: pc.as_slice()[range].to_vec(),
                });
            }
        }
        Ok(out)
    }
}

/// Eigen-decompose a symmetric covariance matrix.
///
/// Numerically negative eigenvalues within
/// [`NEGATIVE_EIGENVALUE_REL_TOL`] of the largest eigenvalue clamp to
/// zero; a larger negative eigenvalue means the input is not a valid
/// covariance and fails with [`Error::NonPositiveSemiDefinite`].
pub fn decompose(cov: &CovMatrix) -> Result<PcaResult> {
    let n = cov.dim();
    if n == 0 {
        return Err(Error::IndexMismatch("cannot decompose an empty matrix".to_string()));
    }

    let eigen = nalgebra::SymmetricEigen::new(cov.matrix().clone());

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let lambda_max = order.first().map(|&i| eigen.eigenvalues[i].abs()).unwrap_or(0.0);
    let clamp_tol = lambda_max * NEGATIVE_EIGENVALUE_REL_TOL;

    let mut eigenvalues = Vec::with_capacity(n);
    let mut eigenvectors = DMatrix::zeros(n, n);
    for (rank, &src) in order.iter().enumerate() {
        let mut ev = eigen.eigenvalues[src];
        if ev < 0.0 {
            if -ev > clamp_tol {
                return Err(Error::NonPositiveSemiDefinite(format!(
                    "eigenvalue {ev} below tolerance -{clamp_tol} (largest eigenvalue {lambda_max})"
                )));
            }
            ev = 0.0;
        }
        eigenvalues.push(ev);
        eigenvectors.set_column(rank, &eigen.eigenvectors.column(src));
    }

    let total: f64 = eigenvalues.iter().sum();
    let fractions: Vec<f64> = if total > 0.0 {
        eigenvalues.iter().map(|ev| ev / total).collect()
    } else {
        vec![0.0; n]
    };
    let mut cumulative = Vec::with_capacity(n);
    let mut running = 0.0;
    for f in &fractions {
        running += f;
        cumulative.push(running);
    }

    let mut components = eigenvectors.clone();
    for (i, ev) in eigenvalues.iter().enumerate() {
        let scale = ev.sqrt();
        components.column_mut(i).scale_mut(scale);
    }

    tracing::debug!(dim = n, lambda_max, "eigen-decomposition complete");

    Ok(PcaResult { eigenvalues, fractions, cumulative, eigenvectors, components })
}

/// Convenience check used in validation paths: eigenvalue sum must equal
/// the input trace.
pub fn eigenvalue_sum(result: &PcaResult) -> f64 {
    result.eigenvalues.iter().sum()
}
