//! Schema definitions shared by the ripple test-selection pipeline.
//!
//! This crate contains the data structures passed between the phases of
//! ripple: the raw dependency map produced by an external extractor, the
//! per-test closure map produced by the graph phase and consumed by the
//! checksum store, and the pattern-based configuration that tells both
//! phases which units are uninteresting.
//!
//! The graph and store crates share these types without depending on each
//! other.

mod config;
mod dependency_map;
mod error;
mod patterns;
#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use config::*;
#[doc(inline)]
pub use dependency_map::*;
#[doc(inline)]
pub use crate::error::LoadError;
#[doc(inline)]
pub use patterns::*;
