//! Beam-line systematics: discrete alternate-configuration shifts turned
//! into rank-1 covariance contributions.
//!
//! Unlike the hadron-production path, beam uncertainties are sampled by a
//! handful of deliberately shifted simulations rather than many universes.
//! Each variation carries either a paired up/down shifted sample or a
//! single shifted sample; its covariance contribution is the outer product
//! of the symmetrized shift vector with itself.

use nalgebra::{DMatrix, DVector};
use nf_core::{Error, FlatIndex, Result};

use crate::matrix::{sum_matrices, CovMatrix};

/// One alternate beam configuration.
#[derive(Debug, Clone)]
pub struct BeamVariation {
    /// Variation name (e.g. "horn_current", "water_layer").
    pub name: String,
    /// Shifted flux over the shared flat axis ("up" sample).
    pub up: DVector<f64>,
    /// Optional second shifted sample ("down"). When present, the shift is
    /// symmetrized per bin by keeping the deviation of larger magnitude,
    /// with its sign.
    pub down: Option<DVector<f64>>,
    /// Optional energy window [GeV]: shifts of bins fully contained in the
    /// window are zeroed. Used to cut variations known to be pure
    /// statistical noise in part of the spectrum.
    pub zero_window: Option<(f64, f64)>,
}

/// Covariance products of a single beam variation.
#[derive(Debug, Clone)]
pub struct VariationCovariance {
    /// Variation name.
    pub name: String,
    /// Symmetrized absolute shift per bin (flux units).
    pub shift: DVector<f64>,
    /// Symmetrized fractional shift per bin (relative to nominal).
    pub fractional_shift: DVector<f64>,
    /// Rank-1 covariance in flux units squared.
    pub absolute: CovMatrix,
    /// Covariance divided by the outer product of the nominal flux.
    pub fractional: CovMatrix,
    /// Correlation derived from the absolute covariance.
    pub correlation: DMatrix<f64>,
}

/// All beam-line covariance products: one entry per variation plus their
/// sum.
#[derive(Debug, Clone)]
pub struct BeamSystematics {
    /// Per-variation products, in the order given.
    pub variations: Vec<VariationCovariance>,
    /// Sum of the per-variation absolute covariances.
    pub total_absolute: CovMatrix,
    /// Sum of the per-variation fractional covariances.
    pub total_fractional: CovMatrix,
    /// Correlation of the total absolute covariance.
    pub total_correlation: DMatrix<f64>,
}

/// Build the beam-line covariance products from a nominal flux and a set
/// of alternate configurations.
pub fn build_beam_systematics(
    index: &FlatIndex,
    nominal: &DVector<f64>,
    variations: &[BeamVariation],
) -> Result<BeamSystematics> {
    if nominal.len() != index.len() {
        return Err(Error::IndexMismatch(format!(
            "nominal flux length {} does not match flat index length {}",
            nominal.len(),
            index.len()
        )));
    }
    if variations.is_empty() {
        return Err(Error::Configuration("no beam variations supplied".to_string()));
    }

    tracing::debug!(n_variations = variations.len(), "building beam covariance matrices");

    let built: Vec<VariationCovariance> = variations
        .iter()
        .map(|v| build_variation(index, nominal, v))
        .collect::<Result<Vec<_>>>()?;

    let n = index.len();
    let absolutes: Vec<CovMatrix> = built.iter().map(|v| v.absolute.clone()).collect();
    let fractionals: Vec<CovMatrix> = built.iter().map(|v| v.fractional.clone()).collect();
    let total_absolute = sum_matrices(n, &absolutes)?;
    let total_fractional = sum_matrices(n, &fractionals)?;
    let total_correlation = total_absolute.correlation()?;

    Ok(BeamSystematics { variations: built, total_absolute, total_fractional, total_correlation })
}

fn build_variation(
    index: &FlatIndex,
    nominal: &DVector<f64>,
    variation: &BeamVariation,
) -> Result<VariationCovariance> {
    let n = index.len();
    if variation.up.len() != n {
        return Err(Error::IndexMismatch(format!(
            "beam variation '{}': up sample length {} does not match flat index length {n}",
            variation.name,
            variation.up.len()
        )));
    }
    if let Some(down) = &variation.down {
        if down.len() != n {
            return Err(Error::IndexMismatch(format!(
                "beam variation '{}': down sample length {} does not match flat index length {n}",
                variation.name,
                down.len()
            )));
        }
    }

    // symmetrization: per bin, keep the shift of larger magnitude with its
    // sign, so cross-bin sign structure survives the outer product
    let mut shift = DVector::zeros(n);
    for i in 0..n {
        let up = variation.up[i] - nominal[i];
        shift[i] = match &variation.down {
            Some(down) => {
                let dn = down[i] - nominal[i];
                if dn.abs() > up.abs() {
                    dn
                } else {
                    up
                }
            }
            None => up,
        };
    }

    if let Some((e_low, e_high)) = variation.zero_window {
        for (horn, flavor) in index.blocks() {
            let offset = index.offset(horn, flavor);
            for bin in index.binning(flavor).bins_within(e_low, e_high) {
                shift[offset + bin] = 0.0;
            }
        }
    }

    let fractional_shift = DVector::from_iterator(
        n,
        shift.iter().zip(nominal.iter()).map(|(s, m)| if *m != 0.0 { s / m } else { 0.0 }),
    );

    let mut m = DMatrix::zeros(n, n);
    m.ger(1.0, &shift, &shift, 1.0);
    let absolute = CovMatrix::new(m)?;
    let fractional = absolute.to_fractional(nominal)?;
    let correlation = absolute.correlation()?;

    Ok(VariationCovariance {
        name: variation.name.clone(),
        shift,
        fractional_shift,
        absolute,
        fractional,
        correlation,
    })
}
