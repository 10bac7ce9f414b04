//! Enable/disable state of systematic-effect categories.
//!
//! The registry is built once at configuration time and read-only
//! afterward. Most hadron-production categories default to enabled; a
//! small set of opt-in categories defaults to disabled unless explicitly
//! switched on.

use std::collections::BTreeMap;

/// Categories that require explicit opt-in. Everything else defaults to
/// enabled.
pub const OPT_IN_CATEGORIES: [&str; 2] = ["thintarget", "mippnumi"];

/// Read-only enable/disable state per systematic category.
///
/// Consumed by the covariance builders to decide which universe sets
/// participate; a disabled category is excluded entirely, not
/// zero-filled.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    overrides: BTreeMap<String, bool>,
}

impl CategoryRegistry {
    /// Build a registry from explicit per-category overrides. Categories
    /// absent from the map fall back to the default table.
    pub fn new(overrides: BTreeMap<String, bool>) -> Self {
        Self { overrides }
    }

    /// Whether `category` participates in the analysis.
    pub fn is_enabled(&self, category: &str) -> bool {
        match self.overrides.get(category) {
            Some(enabled) => *enabled,
            None => !OPT_IN_CATEGORIES.contains(&category),
        }
    }

    /// The categories explicitly configured, with their states, in sorted
    /// order.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, bool)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
