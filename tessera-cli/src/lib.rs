//! Library target for the `tessera` package.
//!
//! The deliverable of this package is the `tessera` CLI binary
//! (`src/main.rs`); this re-export lets doc tests reach the engine.

#[doc(hidden)]
pub use tessera_engine;
