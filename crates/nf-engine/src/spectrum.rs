//! Flux spectra and per-category universe ensembles.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use nf_core::{Error, FlatIndex, Flavor, HornPolarity, Result};

/// One flux spectrum: bin contents over the energy axis for a single
/// (horn, flavor) pair. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    horn: HornPolarity,
    flavor: Flavor,
    values: Vec<f64>,
}

impl Spectrum {
    /// Create a spectrum. The length must match the flavor's binning in
    /// whatever [`FlatIndex`] it is later used with; [`UniverseSet`]
    /// validates this on insertion.
    pub fn new(horn: HornPolarity, flavor: Flavor, values: Vec<f64>) -> Self {
        Self { horn, flavor, values }
    }

    /// Horn polarity tag.
    pub fn horn(&self) -> HornPolarity {
        self.horn
    }

    /// Flavor tag.
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Bin contents.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// One systematic category's universe ensemble: for every (horn, flavor)
/// pair, an ordered collection of spectra, one per universe.
///
/// Invariants, enforced on insertion and sealing:
/// - every spectrum's length matches the flavor's binning
/// - every (horn, flavor) block holds the same number of universes
#[derive(Debug, Clone)]
pub struct UniverseSet {
    category: String,
    spectra: BTreeMap<(HornPolarity, Flavor), Vec<Spectrum>>,
}

impl UniverseSet {
    /// Create an empty ensemble for `category`.
    pub fn new(category: impl Into<String>) -> Self {
        Self { category: category.into(), spectra: BTreeMap::new() }
    }

    /// Category name this ensemble samples.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Append one universe's spectrum for its (horn, flavor) block.
    /// Universe ordering is the insertion order and must be consistent
    /// across blocks.
    pub fn push(&mut self, index: &FlatIndex, spectrum: Spectrum) -> Result<()> {
        let expected = index.n_bins(spectrum.flavor());
        if spectrum.values().len() != expected {
            return Err(Error::Configuration(format!(
                "category '{}': spectrum for {}-{} has {} bins, binning has {}",
                self.category,
                spectrum.horn().label(),
                spectrum.flavor().label(),
                spectrum.values().len(),
                expected
            )));
        }
        self.spectra.entry((spectrum.horn(), spectrum.flavor())).or_default().push(spectrum);
        Ok(())
    }

    /// Number of universes, validated to be identical across all present
    /// (horn, flavor) blocks.
    pub fn n_universes(&self) -> Result<usize> {
        let mut n = None;
        for ((horn, flavor), list) in &self.spectra {
            match n {
                None => n = Some(list.len()),
                Some(expected) if list.len() != expected => {
                    return Err(Error::Configuration(format!(
                        "category '{}': {}-{} has {} universes, expected {}",
                        self.category,
                        horn.label(),
                        flavor.label(),
                        list.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
        }
        n.ok_or_else(|| {
            Error::InsufficientData(format!("category '{}': no universes", self.category))
        })
    }

    /// The spectra recorded for one (horn, flavor) block, if any.
    pub fn block(&self, horn: HornPolarity, flavor: Flavor) -> Option<&[Spectrum]> {
        self.spectra.get(&(horn, flavor)).map(|v| v.as_slice())
    }

    /// Flatten the ensemble onto the shared axis: one row per universe,
    /// one column per flat position. Blocks with no spectra yield NaN
    /// columns, which downstream reductions treat as missing.
    pub fn flattened(&self, index: &FlatIndex) -> Result<DMatrix<f64>> {
        let n_universes = self.n_universes()?;
        let mut m = DMatrix::from_element(n_universes, index.len(), f64::NAN);
        for (horn, flavor) in index.blocks() {
            let Some(list) = self.block(horn, flavor) else { continue };
            let offset = index.offset(horn, flavor);
            for (u, spectrum) in list.iter().enumerate() {
                for (b, v) in spectrum.values().iter().enumerate() {
                    m[(u, offset + b)] = *v;
                }
            }
        }
        Ok(m)
    }
}

/// Flatten a full set of per-(horn, flavor) spectra (e.g. a nominal run)
/// into a single vector over the shared axis. Every block of the index
/// must be covered exactly once.
pub fn flatten_spectra(index: &FlatIndex, spectra: &[Spectrum]) -> Result<DVector<f64>> {
    let mut v = DVector::from_element(index.len(), f64::NAN);
    for spectrum in spectra {
        let expected = index.n_bins(spectrum.flavor());
        if spectrum.values().len() != expected {
            return Err(Error::Configuration(format!(
                "spectrum for {}-{} has {} bins, binning has {}",
                spectrum.horn().label(),
                spectrum.flavor().label(),
                spectrum.values().len(),
                expected
            )));
        }
        let offset = index.offset(spectrum.horn(), spectrum.flavor());
        for (b, value) in spectrum.values().iter().enumerate() {
            v[offset + b] = *value;
        }
    }
    if v.iter().any(|x| x.is_nan()) {
        return Err(Error::Configuration(
            "flattened spectrum does not cover every (horn, flavor) block".to_string(),
        ));
    }
    Ok(v)
}
