//! Shared types and models for the Trading Ledger
//!
//! Domain types for the purchase, stock, fiber, sale and payment ledger,
//! plus pure validation and arithmetic helpers used by the backend.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
