//! Request and domain models for the Garment Production Management Platform
//!
//! Re-exports the input models from the shared crate; row types live next to
//! the services that own them

pub use shared::models::*;
