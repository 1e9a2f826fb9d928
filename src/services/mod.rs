//! Duplicate classification services.
//!
//! Services tie fingerprinting, search, and storage together into the
//! save/compare flows the CLI exposes.

mod dedupe;

pub use dedupe::{DedupeService, SaveOutcome};
