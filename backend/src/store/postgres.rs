//! PostgreSQL ledger store
//!
//! Row-level protection against lost updates:
//! - stock sorts and purchases are read with `SELECT ... FOR UPDATE` before
//!   their weight or amounts are rewritten
//! - fiber transitions are conditional updates on the stored status

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::{
    Amount, Fiber, FiberStatus, ItemAddOn, ItemSale, Payment, PaymentReference, PaymentStatus,
    PaymentType, Purchase, Sale, SaleFiber, StockEntry, StockItem, StockSort, UserBalance, Weight,
};

use super::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row mappings for tables with enum columns
// ============================================================================

#[derive(Debug, FromRow)]
struct FiberRow {
    id: Uuid,
    name: String,
    status: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FiberRow> for Fiber {
    type Error = AppError;

    fn try_from(row: FiberRow) -> Result<Self, Self::Error> {
        let status = FiberStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown fiber status {}", row.status)))?;
        Ok(Fiber {
            id: row.id,
            name: row.name,
            status,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    code: String,
    customer_id: Uuid,
    sale_date: NaiveDate,
    total_amount: i64,
    paid_amount: i64,
    remaining_amount: i64,
    payment_status: String,
    export_sale: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_payment_status(s: &str) -> AppResult<PaymentStatus> {
    PaymentStatus::from_str(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown payment status {}", s)))
}

impl TryFrom<SaleRow> for Sale {
    type Error = AppError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        Ok(Sale {
            payment_status: parse_payment_status(&row.payment_status)?,
            id: row.id,
            code: row.code,
            customer_id: row.customer_id,
            sale_date: row.sale_date,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            remaining_amount: row.remaining_amount,
            export_sale: row.export_sale,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: Uuid,
    code: String,
    supplier_id: Uuid,
    purchase_date: NaiveDate,
    stock_entry_id: Uuid,
    total_amount: i64,
    paid_amount: i64,
    remaining_amount: i64,
    payment_status: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = AppError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        Ok(Purchase {
            payment_status: parse_payment_status(&row.payment_status)?,
            id: row.id,
            code: row.code,
            supplier_id: row.supplier_id,
            purchase_date: row.purchase_date,
            stock_entry_id: row.stock_entry_id,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            remaining_amount: row.remaining_amount,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    total: i64,
    payment_type: String,
    sale_id: Option<Uuid>,
    purchase_id: Option<Uuid>,
    description: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let payment_type = PaymentType::from_str(&row.payment_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown payment type {}", row.payment_type))
        })?;
        Ok(Payment {
            id: row.id,
            user_id: row.user_id,
            total: row.total,
            payment_type,
            sale_id: row.sale_id,
            purchase_id: row.purchase_id,
            description: row.description,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
        })
    }
}

const STOCK_ITEM_COLUMNS: &str = "id, stock_entry_id, item_name, weight, price_per_unit, \
     total_payment, is_sorted, is_deleted, created_at, updated_at";

const STOCK_SORT_COLUMNS: &str = "id, stock_item_id, sorted_item_name, weight, price_per_unit, \
     current_weight, is_shrinkage, is_deleted, created_at, updated_at";

const SALE_COLUMNS: &str = "id, code, customer_id, sale_date, total_amount, paid_amount, \
     remaining_amount, payment_status, export_sale, is_deleted, created_at, updated_at";

const PURCHASE_COLUMNS: &str = "id, code, supplier_id, purchase_date, stock_entry_id, \
     total_amount, paid_amount, remaining_amount, payment_status, is_deleted, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, user_id, total, payment_type, sale_id, purchase_id, description, is_deleted, created_at";

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgLedgerTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn next_sale_sequence(&mut self) -> AppResult<i64> {
        let seq = sqlx::query_scalar::<_, i64>("SELECT nextval('sale_code_seq')")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(seq)
    }

    async fn next_purchase_sequence(&mut self) -> AppResult<i64> {
        let seq = sqlx::query_scalar::<_, i64>("SELECT nextval('purchase_code_seq')")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(seq)
    }

    async fn insert_stock_entry(&mut self, entry: &StockEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO stock_entries (id, is_deleted, created_at, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(entry.id)
        .bind(entry.is_deleted)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_stock_item(&mut self, item: &StockItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (
                id, stock_entry_id, item_name, weight, price_per_unit, total_payment,
                is_sorted, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.id)
        .bind(item.stock_entry_id)
        .bind(&item.item_name)
        .bind(item.weight)
        .bind(item.price_per_unit)
        .bind(item.total_payment)
        .bind(item.is_sorted)
        .bind(item.is_deleted)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_stock_sort(&mut self, sort: &StockSort) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_sorts (
                id, stock_item_id, sorted_item_name, weight, price_per_unit, current_weight,
                is_shrinkage, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(sort.id)
        .bind(sort.stock_item_id)
        .bind(&sort.sorted_item_name)
        .bind(sort.weight)
        .bind(sort.price_per_unit)
        .bind(sort.current_weight)
        .bind(sort.is_shrinkage)
        .bind(sort.is_deleted)
        .bind(sort.created_at)
        .bind(sort.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn stock_entry(&mut self, id: Uuid) -> AppResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(
            "SELECT id, is_deleted, created_at, updated_at FROM stock_entries WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn stock_items_of_entry(&mut self, entry_id: Uuid) -> AppResult<Vec<StockItem>> {
        let items = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {} FROM stock_items WHERE stock_entry_id = $1 AND is_deleted = false ORDER BY created_at, id",
            STOCK_ITEM_COLUMNS
        ))
        .bind(entry_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn stock_item(&mut self, id: Uuid) -> AppResult<Option<StockItem>> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {} FROM stock_items WHERE id = $1 AND is_deleted = false",
            STOCK_ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn mark_stock_item_sorted(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE stock_items SET is_sorted = true, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn stock_sorts_of_item(&mut self, item_id: Uuid) -> AppResult<Vec<StockSort>> {
        let sorts = sqlx::query_as::<_, StockSort>(&format!(
            "SELECT {} FROM stock_sorts WHERE stock_item_id = $1 AND is_deleted = false ORDER BY created_at, id",
            STOCK_SORT_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(sorts)
    }

    async fn stock_sort(&mut self, id: Uuid) -> AppResult<Option<StockSort>> {
        let sort = sqlx::query_as::<_, StockSort>(&format!(
            "SELECT {} FROM stock_sorts WHERE id = $1 AND is_deleted = false",
            STOCK_SORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(sort)
    }

    async fn lock_stock_sort(&mut self, id: Uuid) -> AppResult<Option<StockSort>> {
        let sort = sqlx::query_as::<_, StockSort>(&format!(
            "SELECT {} FROM stock_sorts WHERE id = $1 AND is_deleted = false FOR UPDATE",
            STOCK_SORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(sort)
    }

    async fn available_stock_sorts(&mut self) -> AppResult<Vec<StockSort>> {
        let sorts = sqlx::query_as::<_, StockSort>(&format!(
            r#"
            SELECT {} FROM stock_sorts
            WHERE is_deleted = false AND is_shrinkage = false AND current_weight > 0
            ORDER BY created_at, id
            "#,
            STOCK_SORT_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(sorts)
    }

    async fn set_stock_sort_current_weight(
        &mut self,
        id: Uuid,
        current_weight: Weight,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE stock_sorts SET current_weight = $1, updated_at = NOW() WHERE id = $2 AND is_deleted = false",
        )
        .bind(current_weight)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Stock sort".to_string()));
        }
        Ok(())
    }

    async fn lock_stock_sorts_of_entry(&mut self, entry_id: Uuid) -> AppResult<Vec<StockSort>> {
        let sorts = sqlx::query_as::<_, StockSort>(&format!(
            r#"
            SELECT {} FROM stock_sorts
            WHERE is_deleted = false
              AND stock_item_id IN (SELECT id FROM stock_items WHERE stock_entry_id = $1)
            ORDER BY id
            FOR UPDATE
            "#,
            STOCK_SORT_COLUMNS
        ))
        .bind(entry_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(sorts)
    }

    async fn sold_weight_of_entry(&mut self, entry_id: Uuid) -> AppResult<Weight> {
        let weight = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(l.weight), 0)::BIGINT
            FROM item_sales l
            JOIN sales s ON s.id = l.sale_id
            JOIN stock_sorts ss ON ss.id = l.stock_sort_id
            JOIN stock_items si ON si.id = ss.stock_item_id
            WHERE si.stock_entry_id = $1 AND l.is_deleted = false AND s.is_deleted = false
            "#,
        )
        .bind(entry_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(weight)
    }

    async fn soft_delete_stock_entry(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE stock_entries SET is_deleted = true, updated_at = NOW() WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE stock_sorts SET is_deleted = true, updated_at = NOW()
            WHERE is_deleted = false
              AND stock_item_id IN (SELECT id FROM stock_items WHERE stock_entry_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query(
            "UPDATE stock_items SET is_deleted = true, updated_at = NOW() WHERE stock_entry_id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(true)
    }

    async fn insert_fiber(&mut self, fiber: &Fiber) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fibers (id, name, status, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(fiber.id)
        .bind(&fiber.name)
        .bind(fiber.status.as_str())
        .bind(fiber.is_deleted)
        .bind(fiber.created_at)
        .bind(fiber.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fiber(&mut self, id: Uuid) -> AppResult<Option<Fiber>> {
        let row = sqlx::query_as::<_, FiberRow>(
            "SELECT id, name, status, is_deleted, created_at, updated_at FROM fibers WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Fiber::try_from).transpose()
    }

    async fn fibers(&mut self, status: Option<FiberStatus>) -> AppResult<Vec<Fiber>> {
        let rows = sqlx::query_as::<_, FiberRow>(
            r#"
            SELECT id, name, status, is_deleted, created_at, updated_at FROM fibers
            WHERE is_deleted = false AND ($1::TEXT IS NULL OR status = $1)
            ORDER BY name, id
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(Fiber::try_from).collect()
    }

    async fn claim_fiber(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fibers SET status = 'USED', updated_at = NOW()
            WHERE id = $1 AND status = 'FREE' AND is_deleted = false
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_fiber(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE fibers SET status = 'FREE', updated_at = NOW()
            WHERE id = $1 AND status = 'USED' AND is_deleted = false
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete_fiber(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE fibers SET is_deleted = true, updated_at = NOW() WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, code, customer_id, sale_date, total_amount, paid_amount, remaining_amount,
                payment_status, export_sale, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(sale.id)
        .bind(&sale.code)
        .bind(sale.customer_id)
        .bind(sale.sale_date)
        .bind(sale.total_amount)
        .bind(sale.paid_amount)
        .bind(sale.remaining_amount)
        .bind(sale.payment_status.as_str())
        .bind(sale.export_sale)
        .bind(sale.is_deleted)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_item_sale(&mut self, item: &ItemSale) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_sales (
                id, sale_id, stock_sort_id, stock_code, weight, price_per_unit, total_amount,
                is_deleted, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(item.sale_id)
        .bind(item.stock_sort_id)
        .bind(&item.stock_code)
        .bind(item.weight)
        .bind(item.price_per_unit)
        .bind(item.total_amount)
        .bind(item.is_deleted)
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_item_add_on(&mut self, add_on: &ItemAddOn) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_add_ons (id, sale_id, name, price, is_deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(add_on.id)
        .bind(add_on.sale_id)
        .bind(&add_on.name)
        .bind(add_on.price)
        .bind(add_on.is_deleted)
        .bind(add_on.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_sale_fiber(&mut self, allocation: &SaleFiber) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_fibers (sale_id, fiber_id, allocated_at, released_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(allocation.sale_id)
        .bind(allocation.fiber_id)
        .bind(allocation.allocated_at)
        .bind(allocation.released_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = $1 AND is_deleted = false",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Sale::try_from).transpose()
    }

    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {} FROM sales WHERE id = $1 AND is_deleted = false FOR UPDATE",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Sale::try_from).transpose()
    }

    async fn item_sales_of_sale(&mut self, sale_id: Uuid) -> AppResult<Vec<ItemSale>> {
        let items = sqlx::query_as::<_, ItemSale>(
            r#"
            SELECT id, sale_id, stock_sort_id, stock_code, weight, price_per_unit, total_amount,
                   is_deleted, created_at
            FROM item_sales
            WHERE sale_id = $1 AND is_deleted = false
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn add_ons_of_sale(&mut self, sale_id: Uuid) -> AppResult<Vec<ItemAddOn>> {
        let add_ons = sqlx::query_as::<_, ItemAddOn>(
            r#"
            SELECT id, sale_id, name, price, is_deleted, created_at
            FROM item_add_ons
            WHERE sale_id = $1 AND is_deleted = false
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(add_ons)
    }

    async fn open_sale_fibers(&mut self, sale_id: Uuid) -> AppResult<Vec<SaleFiber>> {
        let allocations = sqlx::query_as::<_, SaleFiber>(
            r#"
            SELECT sale_id, fiber_id, allocated_at, released_at
            FROM sale_fibers
            WHERE sale_id = $1 AND released_at IS NULL
            ORDER BY allocated_at, fiber_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(allocations)
    }

    async fn release_sale_fibers(
        &mut self,
        sale_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let fiber_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE sale_fibers SET released_at = $1
            WHERE sale_id = $2 AND released_at IS NULL
            RETURNING fiber_id
            "#,
        )
        .bind(at)
        .bind(sale_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(fiber_ids)
    }

    async fn release_fiber_allocation(
        &mut self,
        fiber_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE sale_fibers SET released_at = $1 WHERE fiber_id = $2 AND released_at IS NULL",
        )
        .bind(at)
        .bind(fiber_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn soft_delete_sale(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sales SET is_deleted = true, updated_at = NOW() WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE item_sales SET is_deleted = true WHERE sale_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("UPDATE item_add_ons SET is_deleted = true WHERE sale_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(true)
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, code, supplier_id, purchase_date, stock_entry_id, total_amount, paid_amount,
                remaining_amount, payment_status, is_deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(purchase.id)
        .bind(&purchase.code)
        .bind(purchase.supplier_id)
        .bind(purchase.purchase_date)
        .bind(purchase.stock_entry_id)
        .bind(purchase.total_amount)
        .bind(purchase.paid_amount)
        .bind(purchase.remaining_amount)
        .bind(purchase.payment_status.as_str())
        .bind(purchase.is_deleted)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE id = $1 AND is_deleted = false",
            PURCHASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Purchase::try_from).transpose()
    }

    async fn lock_purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE id = $1 AND is_deleted = false FOR UPDATE",
            PURCHASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Purchase::try_from).transpose()
    }

    async fn update_purchase_payment(
        &mut self,
        id: Uuid,
        paid_amount: Amount,
        remaining_amount: Amount,
        status: PaymentStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET paid_amount = $1, remaining_amount = $2, payment_status = $3, updated_at = NOW()
            WHERE id = $4 AND is_deleted = false
            "#,
        )
        .bind(paid_amount)
        .bind(remaining_amount)
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Purchase".to_string()));
        }
        Ok(())
    }

    async fn soft_delete_purchase(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE purchases SET is_deleted = true, updated_at = NOW() WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, total, payment_type, sale_id, purchase_id, description,
                is_deleted, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.total)
        .bind(payment.payment_type.as_str())
        .bind(payment.sale_id)
        .bind(payment.purchase_id)
        .bind(&payment.description)
        .bind(payment.is_deleted)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn soft_delete_payments(&mut self, reference: PaymentReference) -> AppResult<u64> {
        let (column, id) = match reference {
            PaymentReference::Sale(id) => ("sale_id", id),
            PaymentReference::Purchase(id) => ("purchase_id", id),
        };
        let result = sqlx::query(&format!(
            "UPDATE payments SET is_deleted = true WHERE {} = $1 AND is_deleted = false",
            column
        ))
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn payments_of_user(&mut self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 AND is_deleted = false ORDER BY created_at DESC, id",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn balance(&mut self, user_id: Uuid) -> AppResult<Amount> {
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN payment_type = 'INCOME' THEN total ELSE -total END), 0)::BIGINT
            FROM payments
            WHERE user_id = $1 AND is_deleted = false
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(balance)
    }

    async fn balances(&mut self, user_ids: &[Uuid]) -> AppResult<Vec<UserBalance>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT u.user_id,
                   COALESCE(SUM(CASE WHEN p.payment_type = 'INCOME' THEN p.total ELSE -p.total END), 0)::BIGINT
            FROM UNNEST($1::UUID[]) AS u(user_id)
            LEFT JOIN payments p ON p.user_id = u.user_id AND p.is_deleted = false
            GROUP BY u.user_id
            "#,
        )
        .bind(user_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let totals: HashMap<Uuid, Amount> = rows.into_iter().collect();
        Ok(user_ids
            .iter()
            .map(|id| UserBalance {
                user_id: *id,
                balance: totals.get(id).copied().unwrap_or(0),
            })
            .collect())
    }
}
