//! In-memory ledger store
//!
//! Intended for tests/dev. Transactions are serialized behind one async
//! mutex and work on a private copy of the state, which replaces the shared
//! state on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use shared::{
    ledger_balance, Amount, Fiber, FiberStatus, ItemAddOn, ItemSale, Payment, PaymentReference,
    PaymentStatus, Purchase, Sale, SaleFiber, StockEntry, StockItem, StockSort, UserBalance,
    Weight,
};

use super::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    sale_sequence: i64,
    purchase_sequence: i64,
    stock_entries: Vec<StockEntry>,
    stock_items: Vec<StockItem>,
    stock_sorts: Vec<StockSort>,
    fibers: Vec<Fiber>,
    sales: Vec<Sale>,
    item_sales: Vec<ItemSale>,
    add_ons: Vec<ItemAddOn>,
    sale_fibers: Vec<SaleFiber>,
    purchases: Vec<Purchase>,
    payments: Vec<Payment>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `begin` and `commit` fail as if the store were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(flag: &AtomicBool) -> AppResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        Self::check_available(&self.unavailable)?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            unavailable: self.unavailable.clone(),
        }))
    }

    async fn ping(&self) -> AppResult<()> {
        Self::check_available(&self.unavailable)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    unavailable: Arc<AtomicBool>,
}

impl MemoryTx {
    fn sort_mut(&mut self, id: Uuid) -> AppResult<&mut StockSort> {
        self.working
            .stock_sorts
            .iter_mut()
            .find(|s| s.id == id && !s.is_deleted)
            .ok_or_else(|| AppError::NotFound("Stock sort".to_string()))
    }

    fn fiber_mut(&mut self, id: Uuid) -> Option<&mut Fiber> {
        self.working
            .fibers
            .iter_mut()
            .find(|f| f.id == id && !f.is_deleted)
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        MemoryLedgerStore::check_available(&self.unavailable)?;
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn next_sale_sequence(&mut self) -> AppResult<i64> {
        self.working.sale_sequence += 1;
        Ok(self.working.sale_sequence)
    }

    async fn next_purchase_sequence(&mut self) -> AppResult<i64> {
        self.working.purchase_sequence += 1;
        Ok(self.working.purchase_sequence)
    }

    async fn insert_stock_entry(&mut self, entry: &StockEntry) -> AppResult<()> {
        self.working.stock_entries.push(entry.clone());
        Ok(())
    }

    async fn insert_stock_item(&mut self, item: &StockItem) -> AppResult<()> {
        self.working.stock_items.push(item.clone());
        Ok(())
    }

    async fn insert_stock_sort(&mut self, sort: &StockSort) -> AppResult<()> {
        self.working.stock_sorts.push(sort.clone());
        Ok(())
    }

    async fn stock_entry(&mut self, id: Uuid) -> AppResult<Option<StockEntry>> {
        Ok(self
            .working
            .stock_entries
            .iter()
            .find(|e| e.id == id && !e.is_deleted)
            .cloned())
    }

    async fn stock_items_of_entry(&mut self, entry_id: Uuid) -> AppResult<Vec<StockItem>> {
        Ok(self
            .working
            .stock_items
            .iter()
            .filter(|i| i.stock_entry_id == entry_id && !i.is_deleted)
            .cloned()
            .collect())
    }

    async fn stock_item(&mut self, id: Uuid) -> AppResult<Option<StockItem>> {
        Ok(self
            .working
            .stock_items
            .iter()
            .find(|i| i.id == id && !i.is_deleted)
            .cloned())
    }

    async fn mark_stock_item_sorted(&mut self, id: Uuid) -> AppResult<()> {
        if let Some(item) = self
            .working
            .stock_items
            .iter_mut()
            .find(|i| i.id == id && !i.is_deleted)
        {
            item.is_sorted = true;
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn stock_sorts_of_item(&mut self, item_id: Uuid) -> AppResult<Vec<StockSort>> {
        Ok(self
            .working
            .stock_sorts
            .iter()
            .filter(|s| s.stock_item_id == item_id && !s.is_deleted)
            .cloned()
            .collect())
    }

    async fn stock_sort(&mut self, id: Uuid) -> AppResult<Option<StockSort>> {
        Ok(self
            .working
            .stock_sorts
            .iter()
            .find(|s| s.id == id && !s.is_deleted)
            .cloned())
    }

    async fn lock_stock_sort(&mut self, id: Uuid) -> AppResult<Option<StockSort>> {
        // The whole transaction already holds the store lock.
        self.stock_sort(id).await
    }

    async fn available_stock_sorts(&mut self) -> AppResult<Vec<StockSort>> {
        Ok(self
            .working
            .stock_sorts
            .iter()
            .filter(|s| s.is_allocatable())
            .cloned()
            .collect())
    }

    async fn set_stock_sort_current_weight(
        &mut self,
        id: Uuid,
        current_weight: Weight,
    ) -> AppResult<()> {
        let sort = self.sort_mut(id)?;
        sort.current_weight = current_weight;
        sort.updated_at = Utc::now();
        Ok(())
    }

    async fn lock_stock_sorts_of_entry(&mut self, entry_id: Uuid) -> AppResult<Vec<StockSort>> {
        let item_ids: Vec<Uuid> = self
            .working
            .stock_items
            .iter()
            .filter(|i| i.stock_entry_id == entry_id && !i.is_deleted)
            .map(|i| i.id)
            .collect();
        Ok(self
            .working
            .stock_sorts
            .iter()
            .filter(|s| item_ids.contains(&s.stock_item_id) && !s.is_deleted)
            .cloned()
            .collect())
    }

    async fn sold_weight_of_entry(&mut self, entry_id: Uuid) -> AppResult<Weight> {
        let state = &self.working;
        let sort_ids: Vec<Uuid> = state
            .stock_sorts
            .iter()
            .filter(|s| {
                state
                    .stock_items
                    .iter()
                    .any(|i| i.id == s.stock_item_id && i.stock_entry_id == entry_id)
            })
            .map(|s| s.id)
            .collect();
        Ok(state
            .item_sales
            .iter()
            .filter(|l| !l.is_deleted && sort_ids.contains(&l.stock_sort_id))
            .filter(|l| state.sales.iter().any(|s| s.id == l.sale_id && !s.is_deleted))
            .map(|l| l.weight)
            .sum())
    }

    async fn soft_delete_stock_entry(&mut self, id: Uuid) -> AppResult<bool> {
        let now = Utc::now();
        let Some(entry) = self
            .working
            .stock_entries
            .iter_mut()
            .find(|e| e.id == id && !e.is_deleted)
        else {
            return Ok(false);
        };
        entry.is_deleted = true;
        entry.updated_at = now;

        let mut item_ids = Vec::new();
        for item in self
            .working
            .stock_items
            .iter_mut()
            .filter(|i| i.stock_entry_id == id && !i.is_deleted)
        {
            item.is_deleted = true;
            item.updated_at = now;
            item_ids.push(item.id);
        }
        for sort in self
            .working
            .stock_sorts
            .iter_mut()
            .filter(|s| item_ids.contains(&s.stock_item_id) && !s.is_deleted)
        {
            sort.is_deleted = true;
            sort.updated_at = now;
        }
        Ok(true)
    }

    async fn insert_fiber(&mut self, fiber: &Fiber) -> AppResult<()> {
        self.working.fibers.push(fiber.clone());
        Ok(())
    }

    async fn fiber(&mut self, id: Uuid) -> AppResult<Option<Fiber>> {
        Ok(self
            .working
            .fibers
            .iter()
            .find(|f| f.id == id && !f.is_deleted)
            .cloned())
    }

    async fn fibers(&mut self, status: Option<FiberStatus>) -> AppResult<Vec<Fiber>> {
        Ok(self
            .working
            .fibers
            .iter()
            .filter(|f| !f.is_deleted && status.map_or(true, |s| f.status == s))
            .cloned()
            .collect())
    }

    async fn claim_fiber(&mut self, id: Uuid) -> AppResult<bool> {
        match self.fiber_mut(id) {
            Some(fiber) if fiber.status == FiberStatus::Free => {
                fiber.status = FiberStatus::Used;
                fiber.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_fiber(&mut self, id: Uuid) -> AppResult<bool> {
        match self.fiber_mut(id) {
            Some(fiber) if fiber.status == FiberStatus::Used => {
                fiber.status = FiberStatus::Free;
                fiber.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete_fiber(&mut self, id: Uuid) -> AppResult<bool> {
        match self.fiber_mut(id) {
            Some(fiber) => {
                fiber.is_deleted = true;
                fiber.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        self.working.sales.push(sale.clone());
        Ok(())
    }

    async fn insert_item_sale(&mut self, item: &ItemSale) -> AppResult<()> {
        self.working.item_sales.push(item.clone());
        Ok(())
    }

    async fn insert_item_add_on(&mut self, add_on: &ItemAddOn) -> AppResult<()> {
        self.working.add_ons.push(add_on.clone());
        Ok(())
    }

    async fn insert_sale_fiber(&mut self, allocation: &SaleFiber) -> AppResult<()> {
        self.working.sale_fibers.push(allocation.clone());
        Ok(())
    }

    async fn sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self
            .working
            .sales
            .iter()
            .find(|s| s.id == id && !s.is_deleted)
            .cloned())
    }

    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        self.sale(id).await
    }

    async fn item_sales_of_sale(&mut self, sale_id: Uuid) -> AppResult<Vec<ItemSale>> {
        Ok(self
            .working
            .item_sales
            .iter()
            .filter(|i| i.sale_id == sale_id && !i.is_deleted)
            .cloned()
            .collect())
    }

    async fn add_ons_of_sale(&mut self, sale_id: Uuid) -> AppResult<Vec<ItemAddOn>> {
        Ok(self
            .working
            .add_ons
            .iter()
            .filter(|a| a.sale_id == sale_id && !a.is_deleted)
            .cloned()
            .collect())
    }

    async fn open_sale_fibers(&mut self, sale_id: Uuid) -> AppResult<Vec<SaleFiber>> {
        Ok(self
            .working
            .sale_fibers
            .iter()
            .filter(|a| a.sale_id == sale_id && a.released_at.is_none())
            .cloned()
            .collect())
    }

    async fn release_sale_fibers(
        &mut self,
        sale_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let mut released = Vec::new();
        for allocation in self
            .working
            .sale_fibers
            .iter_mut()
            .filter(|a| a.sale_id == sale_id && a.released_at.is_none())
        {
            allocation.released_at = Some(at);
            released.push(allocation.fiber_id);
        }
        Ok(released)
    }

    async fn release_fiber_allocation(
        &mut self,
        fiber_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        for allocation in self
            .working
            .sale_fibers
            .iter_mut()
            .filter(|a| a.fiber_id == fiber_id && a.released_at.is_none())
        {
            allocation.released_at = Some(at);
        }
        Ok(())
    }

    async fn soft_delete_sale(&mut self, id: Uuid) -> AppResult<bool> {
        let now = Utc::now();
        let Some(sale) = self
            .working
            .sales
            .iter_mut()
            .find(|s| s.id == id && !s.is_deleted)
        else {
            return Ok(false);
        };
        sale.is_deleted = true;
        sale.updated_at = now;

        for item in self
            .working
            .item_sales
            .iter_mut()
            .filter(|i| i.sale_id == id)
        {
            item.is_deleted = true;
        }
        for add_on in self.working.add_ons.iter_mut().filter(|a| a.sale_id == id) {
            add_on.is_deleted = true;
        }
        Ok(true)
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> AppResult<()> {
        self.working.purchases.push(purchase.clone());
        Ok(())
    }

    async fn purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>> {
        Ok(self
            .working
            .purchases
            .iter()
            .find(|p| p.id == id && !p.is_deleted)
            .cloned())
    }

    async fn lock_purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>> {
        self.purchase(id).await
    }

    async fn update_purchase_payment(
        &mut self,
        id: Uuid,
        paid_amount: Amount,
        remaining_amount: Amount,
        status: PaymentStatus,
    ) -> AppResult<()> {
        let purchase = self
            .working
            .purchases
            .iter_mut()
            .find(|p| p.id == id && !p.is_deleted)
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;
        purchase.paid_amount = paid_amount;
        purchase.remaining_amount = remaining_amount;
        purchase.payment_status = status;
        purchase.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete_purchase(&mut self, id: Uuid) -> AppResult<bool> {
        match self
            .working
            .purchases
            .iter_mut()
            .find(|p| p.id == id && !p.is_deleted)
        {
            Some(purchase) => {
                purchase.is_deleted = true;
                purchase.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn soft_delete_payments(&mut self, reference: PaymentReference) -> AppResult<u64> {
        let mut affected = 0;
        for payment in self.working.payments.iter_mut().filter(|p| {
            !p.is_deleted
                && match reference {
                    PaymentReference::Sale(id) => p.sale_id == Some(id),
                    PaymentReference::Purchase(id) => p.purchase_id == Some(id),
                }
        }) {
            payment.is_deleted = true;
            affected += 1;
        }
        Ok(affected)
    }

    async fn payments_of_user(&mut self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .working
            .payments
            .iter()
            .filter(|p| p.user_id == user_id && !p.is_deleted)
            .cloned()
            .collect();
        payments.reverse();
        Ok(payments)
    }

    async fn balance(&mut self, user_id: Uuid) -> AppResult<Amount> {
        Ok(ledger_balance(
            self.working.payments.iter().filter(|p| p.user_id == user_id),
        ))
    }

    async fn balances(&mut self, user_ids: &[Uuid]) -> AppResult<Vec<UserBalance>> {
        let mut totals: HashMap<Uuid, Amount> = user_ids.iter().map(|id| (*id, 0)).collect();
        for payment in self.working.payments.iter().filter(|p| !p.is_deleted) {
            if let Some(total) = totals.get_mut(&payment.user_id) {
                *total += payment.payment_type.signed(payment.total);
            }
        }
        Ok(user_ids
            .iter()
            .map(|id| UserBalance {
                user_id: *id,
                balance: totals.get(id).copied().unwrap_or(0),
            })
            .collect())
    }
}
