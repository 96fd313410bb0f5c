//! Cross-module tests.
//!
//! - **Determinism tests**: same seed and inputs give identical results
//! - **Integration tests**: full turns, runes and batch runs end to end
//! - **Property tests**: invariants over generated inputs (`proptest`)
//! - **Helper functions**: actor, template and battle factories
//!
//! # Test Structure
//!
//! - `determinism.rs`: seed reproducibility of the RNG, battles and harness
//! - `integration.rs`: end-to-end scenarios
//! - `properties.rs`: pipeline and attunement invariants
//! - `helpers.rs`: setup utilities

mod helpers;

pub use helpers::*;
