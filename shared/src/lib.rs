//! Shared types and calculations for the Garment Production Management platform
//!
//! This crate holds the domain logic that does not need a database: quantity
//! arithmetic, reporting periods, stock plans for leaf records, rollup
//! helpers and validation. It is used by the backend and the WASM dashboard
//! bindings.

pub mod ledger;
pub mod models;
pub mod rollup;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use rollup::*;
pub use types::*;
pub use validation::*;
