//! Top-level analysis orchestrator: wires aggregation, covariance
//! construction, combination, and PCA into one fail-fast pipeline.

use nalgebra::DVector;
use nf_core::{CategoryRegistry, Error, FlatIndex, Result};

use crate::aggregate::aggregate;
use crate::beam::{build_beam_systematics, BeamVariation};
use crate::combine::combine;
use crate::hadron::build_hadron_systematics;
use crate::pca::decompose;
use crate::products::{
    slice_prediction, AnalysisProducts, PcaProducts, StatisticalProducts,
};
use crate::spectrum::UniverseSet;
use crate::statistics::StatisticalUncertainty;

/// Inputs to one analysis run, supplied by the excluded I/O layer as
/// already-validated flattened tensors and ensembles.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    /// The combined ("total") universe ensemble whose mean is the
    /// best-estimate flux.
    pub flux_ensemble: UniverseSet,
    /// Per-category universe ensembles for the hadron-production
    /// systematics.
    pub systematic_sets: Vec<UniverseSet>,
    /// Nominal (unweighted) flux over the flat axis; reference for flux
    /// weights and beam shifts.
    pub nominal_flux: DVector<f64>,
    /// Raw per-bin statistical errors of the nominal simulation.
    pub nominal_stat_sigma: DVector<f64>,
    /// Alternate beam configurations; may be empty when only a single run
    /// is available.
    pub beam_variations: Vec<BeamVariation>,
}

/// The analysis pipeline. Synchronous single-pass batch computation:
/// construct once, call [`FluxAnalysis::run`] per input set. Holds no
/// mutable state across invocations.
#[derive(Debug, Clone)]
pub struct FluxAnalysis {
    index: FlatIndex,
    registry: CategoryRegistry,
    pca_threshold: f64,
}

impl FluxAnalysis {
    /// Create a pipeline over the shared flat index and category
    /// registry. The default PCA threshold of 2.0 keeps every component
    /// with nonzero eigenvalue.
    pub fn new(index: FlatIndex, registry: CategoryRegistry) -> Self {
        Self { index, registry, pca_threshold: 2.0 }
    }

    /// Set the cumulative-variance threshold for PCA truncation.
    pub fn with_pca_threshold(mut self, threshold: f64) -> Self {
        self.pca_threshold = threshold;
        self
    }

    /// The flat index all products are ordered by.
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Run the pipeline. Any stage failure aborts the whole run: partial
    /// covariance matrices are not independently meaningful.
    pub fn run(&self, input: &AnalysisInput) -> Result<AnalysisProducts> {
        let n = self.index.len();
        if input.nominal_flux.len() != n || input.nominal_stat_sigma.len() != n {
            return Err(Error::IndexMismatch(format!(
                "nominal inputs must match flat index length {n} (flux {}, sigma {})",
                input.nominal_flux.len(),
                input.nominal_stat_sigma.len()
            )));
        }

        tracing::info!(flat_len = n, "aggregating flux ensemble");
        let flux = aggregate(&self.index, &input.flux_ensemble)?;

        // weights carry the ensemble correction onto the raw statistical
        // errors, so statistics and mean share the same scale
        let weights = DVector::from_iterator(
            n,
            flux.mean
                .iter()
                .zip(input.nominal_flux.iter())
                .map(|(m, nom)| if *nom != 0.0 { m / nom } else { 0.0 }),
        );
        let stat =
            StatisticalUncertainty::from_weighted_sigmas(&self.index, &input.nominal_stat_sigma, &weights)?;
        let stat_cov = stat.covariance();

        tracing::info!(
            n_categories = input.systematic_sets.len(),
            "building hadron-production covariances"
        );
        let hadron = build_hadron_systematics(&self.index, &input.systematic_sets, &self.registry)?;

        let beam = if input.beam_variations.is_empty() {
            tracing::info!("no beam variations supplied, skipping beam systematics");
            None
        } else {
            tracing::info!(
                n_variations = input.beam_variations.len(),
                "building beam-line covariances"
            );
            Some(build_beam_systematics(&self.index, &input.nominal_flux, &input.beam_variations)?)
        };

        tracing::info!("decomposing hadron covariance");
        let pca_result = decompose(&hadron.total_fractional)?;
        let n_kept = pca_result.components_below_threshold(self.pca_threshold);
        let component_spectra = pca_result.component_spectra(&self.index, n_kept)?;
        let reconstructed_fractional = pca_result.reconstructed(n_kept)?;
        let reconstructed_absolute = reconstructed_fractional.to_absolute(&flux.mean)?;

        tracing::info!(n_kept, "combining uncertainty budget");
        let total = combine(
            &stat_cov,
            &reconstructed_absolute,
            beam.as_ref().map(|b| &b.total_absolute),
            &flux.mean,
        )?;

        let flux_prediction = slice_prediction(&self.index, &flux.mean, &total.sigma);
        let fractional_sigma = stat.fractional_sigma(&flux.mean)?;
        let statistical = StatisticalProducts {
            absolute_sigma: stat.sigma().clone(),
            fractional_sigma,
            covariance: stat_cov,
        };

        Ok(AnalysisProducts {
            labels: self.index.labels(),
            bin_rows: self.index.bin_rows(),
            flux_prediction,
            statistical,
            hadron,
            beam,
            total,
            pca: PcaProducts {
                result: pca_result,
                n_kept,
                component_spectra,
                reconstructed_fractional,
                reconstructed_absolute,
            },
        })
    }
}
