//! # nf-core
//!
//! Core types for the neutrino-flux uncertainty engine:
//! - error taxonomy and `Result` alias
//! - horn polarity / flavor enums and the flat (horn, flavor, bin) index
//! - binning specification grammar and resolution
//! - systematic-category registry
//! - analysis configuration surface
//!
//! The numerical engine lives in `nf-engine`; this crate holds everything
//! both the engine and the surrounding tool need to agree on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binning;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use binning::{Binning, BinningSpec};
pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use registry::CategoryRegistry;
pub use types::{BinRow, FlatIndex, Flavor, HornPolarity};
