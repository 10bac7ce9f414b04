//! Shared domain types: horn polarity, neutrino flavor, and the flat
//! (horn, flavor, bin) index every matrix in the system is ordered by.

use serde::{Deserialize, Serialize};

use crate::binning::Binning;
use crate::{Error, Result};

/// Beam focusing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HornPolarity {
    /// Forward horn current ("fhc"): neutrino-enhanced beam.
    Forward,
    /// Reverse horn current ("rhc"): antineutrino-enhanced beam.
    Reverse,
}

impl HornPolarity {
    /// Both polarities in the canonical ordering (forward first).
    pub const ALL: [HornPolarity; 2] = [HornPolarity::Forward, HornPolarity::Reverse];

    /// Short label used in output tensor names ("fhc" / "rhc").
    pub fn label(&self) -> &'static str {
        match self {
            HornPolarity::Forward => "fhc",
            HornPolarity::Reverse => "rhc",
        }
    }

    /// 1 for reverse horn current, 0 for forward. Used in the exported
    /// binning table.
    pub fn is_rhc(&self) -> u8 {
        match self {
            HornPolarity::Forward => 0,
            HornPolarity::Reverse => 1,
        }
    }
}

/// Neutrino species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Electron neutrino.
    NuE,
    /// Electron antineutrino.
    NuEBar,
    /// Muon neutrino.
    NuMu,
    /// Muon antineutrino.
    NuMuBar,
}

impl Flavor {
    /// All flavors in the canonical ordering (nue, nuebar, numu, numubar).
    pub const ALL: [Flavor; 4] = [Flavor::NuE, Flavor::NuEBar, Flavor::NuMu, Flavor::NuMuBar];

    /// Short label used in output tensor names.
    pub fn label(&self) -> &'static str {
        match self {
            Flavor::NuE => "nue",
            Flavor::NuEBar => "nuebar",
            Flavor::NuMu => "numu",
            Flavor::NuMuBar => "numubar",
        }
    }

    /// PDG particle code (12, -12, 14, -14).
    pub fn pdg_code(&self) -> i32 {
        match self {
            Flavor::NuE => 12,
            Flavor::NuEBar => -12,
            Flavor::NuMu => 14,
            Flavor::NuMuBar => -14,
        }
    }
}

/// One row of the exported binning table: the physical meaning of a single
/// flat-index position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinRow {
    /// 1 for reverse horn current, 0 for forward.
    pub is_rhc: u8,
    /// PDG neutrino code.
    pub pdg: i32,
    /// Lower energy edge of the bin [GeV].
    pub e_low: f64,
    /// Upper energy edge of the bin [GeV].
    pub e_high: f64,
}

/// Bijective ordering of (horn, flavor, energy bin) triples onto a single
/// matrix axis.
///
/// The ordering is horn-major (forward before reverse), then flavor in the
/// [`Flavor::ALL`] order, then energy bin ascending. It is fixed at
/// construction and shared by every vector and matrix in the analysis;
/// combining tensors built against different `FlatIndex` instances is a
/// contract violation.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    /// One binning per flavor, indexed by `Flavor as usize`.
    binnings: [Binning; 4],
    /// Block start positions, indexed by `[HornPolarity as usize][Flavor as usize]`.
    offsets: [[usize; 4]; 2],
    len: usize,
}

impl FlatIndex {
    /// Build the index from one binning per flavor.
    ///
    /// Every flavor in [`Flavor::ALL`] must be present exactly once; both
    /// horn polarities share the same per-flavor binning.
    pub fn new(binnings: Vec<(Flavor, Binning)>) -> Result<Self> {
        let mut slots: [Option<Binning>; 4] = [None, None, None, None];
        for (flavor, binning) in binnings {
            let slot = &mut slots[flavor as usize];
            if slot.is_some() {
                return Err(Error::Configuration(format!(
                    "duplicate binning for flavor '{}'",
                    flavor.label()
                )));
            }
            *slot = Some(binning);
        }
        let mut ordered = Vec::with_capacity(4);
        for flavor in Flavor::ALL {
            match slots[flavor as usize].take() {
                Some(b) => ordered.push(b),
                None => {
                    return Err(Error::Configuration(format!(
                        "missing binning for flavor '{}'",
                        flavor.label()
                    )));
                }
            }
        }
        let binnings: [Binning; 4] = match ordered.try_into() {
            Ok(b) => b,
            Err(_) => unreachable!("exactly four flavors collected"),
        };

        let mut offsets = [[0usize; 4]; 2];
        let mut len = 0;
        for horn in HornPolarity::ALL {
            for flavor in Flavor::ALL {
                offsets[horn as usize][flavor as usize] = len;
                len += binnings[flavor as usize].n_bins();
            }
        }

        Ok(Self { binnings, offsets, len })
    }

    /// Total number of flattened positions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the index covers no bins. Cannot happen for a validly
    /// constructed index, since every binning has at least one bin.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The binning used for `flavor`.
    pub fn binning(&self, flavor: Flavor) -> &Binning {
        &self.binnings[flavor as usize]
    }

    /// Number of energy bins for `flavor`.
    pub fn n_bins(&self, flavor: Flavor) -> usize {
        self.binning(flavor).n_bins()
    }

    /// Starting flat position of the (horn, flavor) block.
    pub fn offset(&self, horn: HornPolarity, flavor: Flavor) -> usize {
        self.offsets[horn as usize][flavor as usize]
    }

    /// Flat position range of the (horn, flavor) block.
    pub fn range(&self, horn: HornPolarity, flavor: Flavor) -> std::ops::Range<usize> {
        let start = self.offset(horn, flavor);
        start..start + self.n_bins(flavor)
    }

    /// Flat position of a single (horn, flavor, bin) triple. `bin` is
    /// zero-based.
    pub fn position(&self, horn: HornPolarity, flavor: Flavor, bin: usize) -> Result<usize> {
        let n = self.n_bins(flavor);
        if bin >= n {
            return Err(Error::IndexMismatch(format!(
                "bin {bin} out of range for {}-{} ({n} bins)",
                horn.label(),
                flavor.label()
            )));
        }
        Ok(self.offset(horn, flavor) + bin)
    }

    /// Inverse lookup: the (horn, flavor, bin) triple at a flat position.
    pub fn triple(&self, position: usize) -> Result<(HornPolarity, Flavor, usize)> {
        if position >= self.len {
            return Err(Error::IndexMismatch(format!(
                "flat position {position} out of range (len {})",
                self.len
            )));
        }
        let mut result = (HornPolarity::Forward, Flavor::NuE, 0);
        for (horn, flavor) in self.blocks() {
            let offset = self.offset(horn, flavor);
            if position >= offset {
                result = (horn, flavor, position - offset);
            }
        }
        Ok(result)
    }

    /// Iterate over all (horn, flavor) blocks in flat order.
    pub fn blocks(&self) -> impl Iterator<Item = (HornPolarity, Flavor)> {
        HornPolarity::ALL
            .into_iter()
            .flat_map(|h| Flavor::ALL.into_iter().map(move |f| (h, f)))
    }

    /// Human-readable axis labels, one per flat position, in the form
    /// `"fhc-numu-3"`. Bin numbers are 1-based, matching histogram
    /// conventions.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.len);
        for (horn, flavor) in self.blocks() {
            for bin in 1..=self.n_bins(flavor) {
                labels.push(format!("{}-{}-{}", horn.label(), flavor.label(), bin));
            }
        }
        labels
    }

    /// Physical bin rows (horn flag, PDG code, energy edges), one per flat
    /// position, for annotating exported matrices.
    pub fn bin_rows(&self) -> Vec<BinRow> {
        let mut rows = Vec::with_capacity(self.len);
        for (horn, flavor) in self.blocks() {
            let edges = self.binning(flavor).edges();
            for bin in 0..self.n_bins(flavor) {
                rows.push(BinRow {
                    is_rhc: horn.is_rhc(),
                    pdg: flavor.pdg_code(),
                    e_low: edges[bin],
                    e_high: edges[bin + 1],
                });
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::BinningSpec;

    fn index_with(n_bins: usize) -> FlatIndex {
        let binnings = Flavor::ALL
            .iter()
            .map(|f| (*f, Binning::resolve(*f, &BinningSpec::Count(n_bins)).unwrap()))
            .collect();
        FlatIndex::new(binnings).unwrap()
    }

    #[test]
    fn test_flat_index_length_and_order() {
        let idx = index_with(5);
        assert_eq!(idx.len(), 2 * 4 * 5);
        assert_eq!(idx.offset(HornPolarity::Forward, Flavor::NuE), 0);
        assert_eq!(idx.offset(HornPolarity::Forward, Flavor::NuEBar), 5);
        assert_eq!(idx.offset(HornPolarity::Reverse, Flavor::NuE), 20);
        assert_eq!(idx.range(HornPolarity::Reverse, Flavor::NuMuBar), 35..40);
    }

    #[test]
    fn test_flat_index_roundtrip() {
        let idx = index_with(3);
        for pos in 0..idx.len() {
            let (horn, flavor, bin) = idx.triple(pos).unwrap();
            assert_eq!(idx.position(horn, flavor, bin).unwrap(), pos);
        }
        assert!(idx.triple(idx.len()).is_err());
        assert!(idx.position(HornPolarity::Forward, Flavor::NuE, 3).is_err());
    }

    #[test]
    fn test_labels_and_rows() {
        let idx = index_with(2);
        let labels = idx.labels();
        assert_eq!(labels.len(), 16);
        assert_eq!(labels[0], "fhc-nue-1");
        assert_eq!(labels[15], "rhc-numubar-2");

        let rows = idx.bin_rows();
        assert_eq!(rows[0].pdg, 12);
        assert_eq!(rows[0].is_rhc, 0);
        assert_eq!(rows[15].pdg, -14);
        assert_eq!(rows[15].is_rhc, 1);
        assert!((rows[0].e_low - 0.0).abs() < 1e-12);
        assert!((rows[0].e_high - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_flavor_rejected() {
        let binnings = vec![(
            Flavor::NuE,
            Binning::resolve(Flavor::NuE, &BinningSpec::Count(4)).unwrap(),
        )];
        assert!(FlatIndex::new(binnings).is_err());
    }

    #[test]
    fn test_flavor_serde_labels() {
        let j = serde_json::to_string(&Flavor::NuEBar).unwrap();
        assert_eq!(j, "\"nuebar\"");
        let f: Flavor = serde_json::from_str("\"numubar\"").unwrap();
        assert_eq!(f, Flavor::NuMuBar);
    }
}
