//! Domain models for the production platform

mod planning;
mod production;
mod receipt;
mod stock;

pub use planning::*;
pub use production::*;
pub use receipt::*;
pub use stock::*;
