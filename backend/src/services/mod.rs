//! Core ledger services
//!
//! Each service holds the shared store handle. Operations that must compose
//! inside another operation's transaction are exposed as associated functions
//! taking the open [`LedgerTx`](crate::store::LedgerTx).

pub mod fiber;
pub mod payment;
pub mod purchase;
pub mod sale;
pub mod stock;

pub use fiber::FiberService;
pub use payment::PaymentService;
pub use purchase::PurchaseService;
pub use sale::SaleService;
pub use stock::StockService;
