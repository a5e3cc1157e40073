//! Ledger store: the transactional boundary every core operation runs in
//!
//! Services never touch a connection directly. They open one [`LedgerTx`],
//! perform all reads and writes of an operation through it, and commit.
//! Dropping a transaction without committing rolls it back, so a cancelled
//! request leaves nothing behind.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared::{
    Amount, Fiber, FiberStatus, ItemAddOn, ItemSale, Payment, PaymentReference, PaymentStatus,
    Purchase, Sale, SaleFiber, StockEntry, StockItem, StockSort, UserBalance, Weight,
};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Store handle injected into every service
pub type SharedStore = Arc<dyn LedgerStore>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Check that the store is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// One open transaction. All lookups skip soft-deleted rows unless stated.
#[async_trait]
pub trait LedgerTx: Send {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    // Sequences
    async fn next_sale_sequence(&mut self) -> AppResult<i64>;
    async fn next_purchase_sequence(&mut self) -> AppResult<i64>;

    // Stock hierarchy
    async fn insert_stock_entry(&mut self, entry: &StockEntry) -> AppResult<()>;
    async fn insert_stock_item(&mut self, item: &StockItem) -> AppResult<()>;
    async fn insert_stock_sort(&mut self, sort: &StockSort) -> AppResult<()>;
    async fn stock_entry(&mut self, id: Uuid) -> AppResult<Option<StockEntry>>;
    async fn stock_items_of_entry(&mut self, entry_id: Uuid) -> AppResult<Vec<StockItem>>;
    async fn stock_item(&mut self, id: Uuid) -> AppResult<Option<StockItem>>;
    async fn mark_stock_item_sorted(&mut self, id: Uuid) -> AppResult<()>;
    async fn stock_sorts_of_item(&mut self, item_id: Uuid) -> AppResult<Vec<StockSort>>;
    async fn stock_sort(&mut self, id: Uuid) -> AppResult<Option<StockSort>>;
    /// Like [`LedgerTx::stock_sort`] but holds a row lock until the transaction ends
    async fn lock_stock_sort(&mut self, id: Uuid) -> AppResult<Option<StockSort>>;
    /// Non-deleted, non-shrinkage sorts with weight left to allocate
    async fn available_stock_sorts(&mut self) -> AppResult<Vec<StockSort>>;
    async fn set_stock_sort_current_weight(
        &mut self,
        id: Uuid,
        current_weight: Weight,
    ) -> AppResult<()>;
    /// Lock every live sort beneath an entry until the transaction ends
    async fn lock_stock_sorts_of_entry(&mut self, entry_id: Uuid) -> AppResult<Vec<StockSort>>;
    /// Weight the entry's sorts have given to non-deleted sales
    async fn sold_weight_of_entry(&mut self, entry_id: Uuid) -> AppResult<Weight>;
    /// Soft-delete an entry with its items and their sorts.
    /// Returns false if the entry was absent or already deleted.
    async fn soft_delete_stock_entry(&mut self, id: Uuid) -> AppResult<bool>;

    // Fibers
    async fn insert_fiber(&mut self, fiber: &Fiber) -> AppResult<()>;
    async fn fiber(&mut self, id: Uuid) -> AppResult<Option<Fiber>>;
    async fn fibers(&mut self, status: Option<FiberStatus>) -> AppResult<Vec<Fiber>>;
    /// FREE -> USED, only if the stored status is still FREE
    async fn claim_fiber(&mut self, id: Uuid) -> AppResult<bool>;
    /// USED -> FREE, only if the stored status is still USED
    async fn release_fiber(&mut self, id: Uuid) -> AppResult<bool>;
    async fn soft_delete_fiber(&mut self, id: Uuid) -> AppResult<bool>;

    // Sales
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()>;
    async fn insert_item_sale(&mut self, item: &ItemSale) -> AppResult<()>;
    async fn insert_item_add_on(&mut self, add_on: &ItemAddOn) -> AppResult<()>;
    async fn insert_sale_fiber(&mut self, allocation: &SaleFiber) -> AppResult<()>;
    async fn sale(&mut self, id: Uuid) -> AppResult<Option<Sale>>;
    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>>;
    async fn item_sales_of_sale(&mut self, sale_id: Uuid) -> AppResult<Vec<ItemSale>>;
    async fn add_ons_of_sale(&mut self, sale_id: Uuid) -> AppResult<Vec<ItemAddOn>>;
    /// Allocations of a sale that have not been released
    async fn open_sale_fibers(&mut self, sale_id: Uuid) -> AppResult<Vec<SaleFiber>>;
    /// Close the open allocations of a sale; returns the released fiber ids
    async fn release_sale_fibers(
        &mut self,
        sale_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>>;
    /// Close whatever open allocation holds a fiber
    async fn release_fiber_allocation(&mut self, fiber_id: Uuid, at: DateTime<Utc>)
        -> AppResult<()>;
    /// Soft-delete a sale with its line items and add-ons
    async fn soft_delete_sale(&mut self, id: Uuid) -> AppResult<bool>;

    // Purchases
    async fn insert_purchase(&mut self, purchase: &Purchase) -> AppResult<()>;
    async fn purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>>;
    async fn lock_purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>>;
    async fn update_purchase_payment(
        &mut self,
        id: Uuid,
        paid_amount: Amount,
        remaining_amount: Amount,
        status: PaymentStatus,
    ) -> AppResult<()>;
    async fn soft_delete_purchase(&mut self, id: Uuid) -> AppResult<bool>;

    // Payments
    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()>;
    /// Returns the number of entries newly marked deleted
    async fn soft_delete_payments(&mut self, reference: PaymentReference) -> AppResult<u64>;
    async fn payments_of_user(&mut self, user_id: Uuid) -> AppResult<Vec<Payment>>;
    async fn balance(&mut self, user_id: Uuid) -> AppResult<Amount>;
    /// One balance per requested id, in request order, zero where no entries exist
    async fn balances(&mut self, user_ids: &[Uuid]) -> AppResult<Vec<UserBalance>>;
}
