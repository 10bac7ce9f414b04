//! Energy binning: the mixed-shape specification grammar and its resolution
//! into validated, strictly increasing edge lists.
//!
//! The grammar accepts an integer bin count (uniform bins over the full
//! energy range), an explicit edge list, or a list of `[start, stop, step]`
//! segments expanded and concatenated in order. Resolution happens once at
//! configuration time; downstream code only ever sees the canonical edge
//! list.

use serde::{Deserialize, Serialize};

use crate::types::Flavor;
use crate::{Error, Result};

/// Lower edge of the supported energy range [GeV].
pub const ENERGY_MIN: f64 = 0.0;
/// Upper edge of the supported energy range [GeV].
pub const ENERGY_MAX: f64 = 20.0;
/// Default bin width [GeV] when no specification is given (100 MeV).
pub const DEFAULT_BIN_WIDTH: f64 = 0.1;
/// Maximum allowed uniform bin count.
pub const MAX_BIN_COUNT: usize = 200;

/// Edges closer than this are treated as duplicates and collapsed.
const EDGE_EPS: f64 = 1e-9;

/// Per-flavor binning specification, as it appears in configuration input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinningSpec {
    /// Uniform bins over [0, 20] GeV; the value is the bin count.
    Count(usize),
    /// `[start, stop, step]` segments, expanded and concatenated in order.
    Segments(Vec<[f64; 3]>),
    /// Explicit, strictly increasing edge list.
    Edges(Vec<f64>),
}

/// A resolved, validated energy binning: strictly increasing edges within
/// [0, 20] GeV, at least two of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    edges: Vec<f64>,
}

impl Binning {
    /// The default binning: 100 MeV uniform bins over [0, 20] GeV.
    pub fn default_binning() -> Self {
        let n = (ENERGY_MAX / DEFAULT_BIN_WIDTH).round() as usize;
        Self { edges: uniform_edges(n) }
    }

    /// Resolve a specification into a canonical edge list.
    ///
    /// `flavor` is only used to identify the offender in error messages.
    pub fn resolve(flavor: Flavor, spec: &BinningSpec) -> Result<Self> {
        let label = flavor.label();
        let edges = match spec {
            BinningSpec::Count(n) => {
                if *n == 0 || *n > MAX_BIN_COUNT {
                    return Err(Error::Configuration(format!(
                        "binning for '{label}': bin count must be in 1..={MAX_BIN_COUNT}, got {n}"
                    )));
                }
                uniform_edges(*n)
            }
            BinningSpec::Edges(edges) => edges.clone(),
            BinningSpec::Segments(segments) => {
                if segments.is_empty() {
                    return Err(Error::Configuration(format!(
                        "binning for '{label}': empty segment list"
                    )));
                }
                let mut edges = Vec::new();
                for [start, stop, step] in segments {
                    if !(*step > 0.0) || !start.is_finite() || !stop.is_finite() || stop <= start {
                        return Err(Error::Configuration(format!(
                            "binning for '{label}': bad segment [{start}, {stop}, {step}]"
                        )));
                    }
                    let mut e = *start;
                    while e <= stop + EDGE_EPS {
                        edges.push(e.min(*stop));
                        e += step;
                    }
                }
                // duplicate junction edges collapse to one
                edges.dedup_by(|a, b| (*a - *b).abs() < EDGE_EPS);
                edges
            }
        };
        Self::from_edges(label, edges)
    }

    fn from_edges(label: &str, edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Configuration(format!(
                "binning for '{label}': need at least two edges, got {}",
                edges.len()
            )));
        }
        for pair in edges.windows(2) {
            if !(pair[1] > pair[0]) {
                return Err(Error::Configuration(format!(
                    "binning for '{label}': edges not strictly increasing at {} -> {}",
                    pair[0], pair[1]
                )));
            }
        }
        let (first, last) = (edges[0], edges[edges.len() - 1]);
        if !first.is_finite() || !last.is_finite() || first < ENERGY_MIN || last > ENERGY_MAX + EDGE_EPS
        {
            return Err(Error::Configuration(format!(
                "binning for '{label}': edges [{first}, {last}] outside [{ENERGY_MIN}, {ENERGY_MAX}] GeV"
            )));
        }
        Ok(Self { edges })
    }

    /// The bin edges [GeV].
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins (edges − 1).
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Zero-based indices of bins fully contained in `[e_low, e_high]` GeV.
    pub fn bins_within(&self, e_low: f64, e_high: f64) -> Vec<usize> {
        (0..self.n_bins())
            .filter(|&i| self.edges[i] >= e_low - EDGE_EPS && self.edges[i + 1] <= e_high + EDGE_EPS)
            .collect()
    }
}

fn uniform_edges(n_bins: usize) -> Vec<f64> {
    let step = (ENERGY_MAX - ENERGY_MIN) / n_bins as f64;
    (0..=n_bins).map(|i| ENERGY_MIN + step * i as f64).collect()
}
