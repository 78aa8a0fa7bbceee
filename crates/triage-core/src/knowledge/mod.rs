//! Embedding-indexed knowledge store.
//!
//! Holds the reference corpus and clinician-validated reports in one named
//! index. Every stored embedding has the dimension fixed when the index was
//! created.

pub mod migrations;
mod store;

pub use store::*;
