//! Analysis configuration: per-flavor binning specifications and category
//! overrides.
//!
//! This is the whole configuration surface the surrounding I/O layer has
//! to fill. It deserializes with serde (the tests use JSON); resolution
//! turns the mixed-shape binning grammar into canonical edge lists and the
//! category map into a read-only registry.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::binning::{Binning, BinningSpec};
use crate::registry::CategoryRegistry;
use crate::types::{FlatIndex, Flavor};
use crate::Result;

/// Raw analysis configuration, prior to resolution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Per-flavor binning specification. Missing flavors use the default
    /// 100 MeV uniform binning.
    #[serde(default)]
    pub binning: BTreeMap<Flavor, BinningSpec>,

    /// Per-category enable overrides. Categories absent here use the
    /// default table (opt-in categories disabled, everything else
    /// enabled).
    #[serde(default)]
    pub categories: BTreeMap<String, bool>,
}

impl AnalysisConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Resolve every flavor's binning and build the shared flat index.
    pub fn flat_index(&self) -> Result<FlatIndex> {
        let mut binnings = Vec::with_capacity(Flavor::ALL.len());
        for flavor in Flavor::ALL {
            let binning = match self.binning.get(&flavor) {
                Some(spec) => Binning::resolve(flavor, spec)?,
                None => Binning::default_binning(),
            };
            binnings.push((flavor, binning));
        }
        FlatIndex::new(binnings)
    }

    /// Build the category registry from the configured overrides.
    pub fn registry(&self) -> CategoryRegistry {
        CategoryRegistry::new(self.categories.clone())
    }
}
