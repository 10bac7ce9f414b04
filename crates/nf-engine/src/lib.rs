//! # nf-engine
//!
//! Uncertainty-propagation and matrix engine for simulated neutrino-flux
//! ensembles. Given per-category universe ensembles, a nominal run, and
//! optional alternate beam configurations, it produces:
//! - mean flux and per-bin sigma per (horn polarity, flavor)
//! - statistical, hadron-production, beam-line, and total
//!   covariance/correlation matrices, absolute and fractional
//! - a variance-ranked principal-component decomposition with truncated
//!   reconstructions
//!
//! File I/O, plotting, and report generation are external collaborators;
//! their whole contract with this crate is [`analysis::AnalysisInput`] in
//! and [`products::AnalysisProducts`] out.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Universe-ensemble reduction to mean and sigma spectra.
pub mod aggregate;
/// Top-level pipeline orchestrator.
pub mod analysis;
/// Beam-line systematics from discrete alternate configurations.
pub mod beam;
/// Combination of component covariances into the total budget.
pub mod combine;
/// Hadron-production systematics from universe ensembles.
pub mod hadron;
/// Covariance wrapper and correlation derivation.
pub mod matrix;
/// Principal component analysis.
pub mod pca;
/// Named output tensors.
pub mod products;
/// Spectra and universe ensembles.
pub mod spectrum;
/// Diagonal statistical-uncertainty model.
pub mod statistics;

pub use aggregate::{aggregate, AggregatedFlux, BlockSummary};
pub use analysis::{AnalysisInput, FluxAnalysis};
pub use beam::{build_beam_systematics, BeamSystematics, BeamVariation, VariationCovariance};
pub use combine::{combine, TotalUncertainty};
pub use hadron::{build_hadron_systematics, CategoryCovariance, HadronSystematics};
pub use matrix::CovMatrix;
pub use pca::{decompose, ComponentSpectrum, PcaResult};
pub use products::{AnalysisProducts, FluxPrediction, NamedMatrix, PcaProducts, StatisticalProducts};
pub use spectrum::{flatten_spectra, Spectrum, UniverseSet};
pub use statistics::StatisticalUncertainty;
