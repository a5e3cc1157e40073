//! HTTP handlers

pub mod fiber;
pub mod health;
pub mod payment;
pub mod purchase;
pub mod sale;
pub mod stock;

pub use fiber::*;
pub use health::*;
pub use payment::*;
pub use purchase::*;
pub use sale::*;
pub use stock::*;
