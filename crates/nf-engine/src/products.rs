//! Named output tensors consumed by the persistence and plotting layers.
//!
//! The engine's contract with the surrounding tool ends here: every
//! product is a plain matrix, vector, or label set annotated with the
//! shared flat index.

use nalgebra::{DMatrix, DVector};
use nf_core::{BinRow, FlatIndex, Flavor, HornPolarity};

use crate::beam::BeamSystematics;
use crate::combine::TotalUncertainty;
use crate::hadron::HadronSystematics;
use crate::matrix::CovMatrix;
use crate::pca::{ComponentSpectrum, PcaResult};

/// Best-estimate flux and total uncertainty for one (horn, flavor) block.
#[derive(Debug, Clone)]
pub struct FluxPrediction {
    /// Horn polarity of the block.
    pub horn: HornPolarity,
    /// Flavor of the block.
    pub flavor: Flavor,
    /// Mean flux per energy bin.
    pub mean: Vec<f64>,
    /// Total per-bin sigma (square root of the total covariance
    /// diagonal).
    pub sigma: Vec<f64>,
}

/// Statistical-uncertainty products.
#[derive(Debug, Clone)]
pub struct StatisticalProducts {
    /// Diagonal absolute covariance matrix.
    pub covariance: CovMatrix,
    /// Per-bin absolute sigma.
    pub absolute_sigma: DVector<f64>,
    /// Per-bin sigma divided by the mean flux.
    pub fractional_sigma: DVector<f64>,
}

/// PCA products, including the truncated reconstruction used for
/// validation.
#[derive(Debug, Clone)]
pub struct PcaProducts {
    /// The decomposition: eigenvalues, fractions, cumulative sums,
    /// eigenvectors, scaled components.
    pub result: PcaResult,
    /// Number of components kept by the configured variance threshold.
    pub n_kept: usize,
    /// Kept components reshaped onto per-block energy axes.
    pub component_spectra: Vec<ComponentSpectrum>,
    /// Covariance rebuilt from the kept components (fractional form, same
    /// as the decomposition input).
    pub reconstructed_fractional: CovMatrix,
    /// The reconstruction rescaled to flux units by the mean-flux outer
    /// product.
    pub reconstructed_absolute: CovMatrix,
}

/// The full set of named outputs of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisProducts {
    /// Axis labels, one per flat position ("fhc-numu-3").
    pub labels: Vec<String>,
    /// Physical bin rows annotating every matrix axis.
    pub bin_rows: Vec<BinRow>,
    /// Mean flux and total sigma per (horn, flavor) block.
    pub flux_prediction: Vec<FluxPrediction>,
    /// Statistical-uncertainty products.
    pub statistical: StatisticalProducts,
    /// Hadron-production products (per enabled category plus totals).
    pub hadron: HadronSystematics,
    /// Beam-line products, when alternate beam samples were supplied.
    pub beam: Option<BeamSystematics>,
    /// Total covariance, correlation, and sigma.
    pub total: TotalUncertainty,
    /// PCA products.
    pub pca: PcaProducts,
}

impl AnalysisProducts {
    /// The flat-index materialization as a text table: a header line
    /// followed by one `isRHC pdg e_low e_high` row per position. Written
    /// alongside exported matrices so external fitters can interpret the
    /// axis.
    pub fn binning_table(&self) -> String {
        let mut lines = Vec::with_capacity(self.bin_rows.len() + 1);
        lines.push("variables: isRHC NeutrinoCode Enu Enu".to_string());
        for row in &self.bin_rows {
            lines.push(format!("{} {} {} {}", row.is_rhc, row.pdg, row.e_low, row.e_high));
        }
        lines.join("\n")
    }

    /// Iterate every covariance/correlation triple in the product set
    /// under its export name.
    pub fn named_matrices(&self) -> Vec<NamedMatrix<'_>> {
        let mut out = Vec::new();
        for cat in &self.hadron.categories {
            out.push(NamedMatrix {
                name: format!("hadron/{}", cat.category),
                absolute: &cat.absolute,
                fractional: &cat.fractional,
                correlation: &cat.correlation,
            });
        }
        out.push(NamedMatrix {
            name: "hadron/total".to_string(),
            absolute: &self.hadron.total_absolute,
            fractional: &self.hadron.total_fractional,
            correlation: &self.hadron.total_correlation,
        });
        if let Some(beam) = &self.beam {
            for var in &beam.variations {
                out.push(NamedMatrix {
                    name: format!("beam/{}", var.name),
                    absolute: &var.absolute,
                    fractional: &var.fractional,
                    correlation: &var.correlation,
                });
            }
            out.push(NamedMatrix {
                name: "beam/total".to_string(),
                absolute: &beam.total_absolute,
                fractional: &beam.total_fractional,
                correlation: &beam.total_correlation,
            });
        }
        out.push(NamedMatrix {
            name: "total".to_string(),
            absolute: &self.total.absolute,
            fractional: &self.total.fractional,
            correlation: &self.total.correlation,
        });
        out
    }
}

/// Slice a flat vector into per-(horn, flavor) predictions.
pub fn slice_prediction(
    index: &FlatIndex,
    mean: &DVector<f64>,
    sigma: &DVector<f64>,
) -> Vec<FluxPrediction> {
    index
        .blocks()
        .map(|(horn, flavor)| {
            let range = index.range(horn, flavor);
            FluxPrediction {
                horn,
                flavor,
                mean: mean.as_slice()[range.clone()].to_vec(),
                sigma: sigma.as_slice()[range].to_vec(),
            }
        })
        .collect()
}

/// Matrix products exported for one named systematic group, in both
/// scales. Convenience for persistence layers that iterate uniformly.
#[derive(Debug, Clone)]
pub struct NamedMatrix<'a> {
    /// Output name, e.g. "hadron/mesinc" or "beam/horn_current".
    pub name: String,
    /// Absolute-scale covariance.
    pub absolute: &'a CovMatrix,
    /// Fractional-scale covariance.
    pub fractional: &'a CovMatrix,
    /// Correlation matrix.
    pub correlation: &'a DMatrix<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nf_core::{Binning, BinningSpec};

    #[test]
    fn test_binning_table_format() {
        let binnings = Flavor::ALL
            .iter()
            .map(|f| (*f, Binning::resolve(*f, &BinningSpec::Count(1)).unwrap()))
            .collect();
        let index = FlatIndex::new(binnings).unwrap();
        let rows = index.bin_rows();
        let labels = index.labels();

        // minimal product set just to exercise the table
        let stat = StatisticalProducts {
            covariance: CovMatrix::zeros(8),
            absolute_sigma: DVector::zeros(8),
            fractional_sigma: DVector::zeros(8),
        };
        let hadron = HadronSystematics {
            categories: vec![],
            total_absolute: CovMatrix::zeros(8),
            total_fractional: CovMatrix::zeros(8),
            total_correlation: DMatrix::identity(8, 8),
        };
        let total = TotalUncertainty {
            absolute: CovMatrix::zeros(8),
            fractional: CovMatrix::zeros(8),
            correlation: DMatrix::identity(8, 8),
            sigma: DVector::zeros(8),
        };
        let pca = PcaProducts {
            result: crate::pca::decompose(&CovMatrix::from_diagonal(&DVector::from_element(
                8, 1.0,
            )))
            .unwrap(),
            n_kept: 8,
            component_spectra: vec![],
            reconstructed_fractional: CovMatrix::zeros(8),
            reconstructed_absolute: CovMatrix::zeros(8),
        };
        let products = AnalysisProducts {
            labels,
            bin_rows: rows,
            flux_prediction: vec![],
            statistical: stat,
            hadron,
            beam: None,
            total,
            pca,
        };

        let table = products.binning_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "variables: isRHC NeutrinoCode Enu Enu");
        assert_eq!(lines[1], "0 12 0 20");
        assert_eq!(lines.len(), 9);

        let named = products.named_matrices();
        assert_eq!(named.first().map(|m| m.name.as_str()), Some("hadron/total"));
        assert_eq!(named.last().map(|m| m.name.as_str()), Some("total"));
    }
}
