//! Domain models for the Trading Ledger

mod fiber;
mod payment;
mod purchase;
mod sale;
mod stock;

pub use fiber::*;
pub use payment::*;
pub use purchase::*;
pub use sale::*;
pub use stock::*;
