//! Stock hierarchy service: stock entries, their items, and graded sorts

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::{
    line_total, validate_current_weight, validate_name, validate_non_negative_price,
    validate_price, validate_weight, Amount, StockEntry, StockEntryDetail, StockItem,
    StockItemWithSorts, StockSort, Weight,
};

use crate::error::{AppError, AppResult};
use crate::store::{LedgerTx, SharedStore};

/// Stock service owning the entry -> item -> sort weight rules
#[derive(Clone)]
pub struct StockService {
    store: SharedStore,
}

/// One raw item delivered in a purchase
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewStockItem {
    #[validate(length(min = 1, max = 255))]
    pub item_name: String,
    pub weight: Weight,
    pub price_per_unit: Amount,
}

/// Input for creating a stock entry
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockEntryInput {
    #[validate(length(min = 1))]
    pub items: Vec<NewStockItem>,
}

/// One graded sort cut from a stock item
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewStockSort {
    #[serde(alias = "name")]
    #[validate(length(min = 1, max = 255))]
    pub sorted_item_name: String,
    pub weight: Weight,
    pub price_per_unit: Amount,
    /// Defaults to `weight`
    pub current_weight: Option<Weight>,
    #[serde(default)]
    pub is_shrinkage: bool,
}

/// Input for submitting the sorting of a stock item
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitSortInput {
    #[validate(length(min = 1))]
    pub sorts: Vec<NewStockSort>,
}

fn rule(field: &str, result: Result<(), &'static str>) -> AppResult<()> {
    result.map_err(|msg| AppError::validation(field, msg))
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create a stock entry and its items in one transaction
    #[tracing::instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn create_stock_entry(
        &self,
        input: CreateStockEntryInput,
    ) -> AppResult<StockEntryDetail> {
        let mut tx = self.store.begin().await?;
        let detail = Self::insert_entry(tx.as_mut(), &input.items).await?;
        tx.commit().await?;

        tracing::info!(stock_entry_id = %detail.entry.id, "Stock entry created");
        Ok(detail)
    }

    /// Insert a new entry with `items` inside an open transaction
    pub(crate) async fn insert_entry(
        tx: &mut dyn LedgerTx,
        items: &[NewStockItem],
    ) -> AppResult<StockEntryDetail> {
        if items.is_empty() {
            return Err(AppError::validation(
                "items",
                "At least one stock item is required",
            ));
        }

        // Validate every item before writing anything
        let mut totals = Vec::with_capacity(items.len());
        for item in items {
            rule("item_name", validate_name(&item.item_name))?;
            rule("weight", validate_weight(item.weight))?;
            rule("price_per_unit", validate_price(item.price_per_unit))?;
            let total = line_total(item.weight, item.price_per_unit)
                .map_err(|msg| AppError::validation("price_per_unit", msg))?;
            totals.push(total);
        }

        let now = Utc::now();
        let entry = StockEntry {
            id: Uuid::new_v4(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        tx.insert_stock_entry(&entry).await?;

        let mut created = Vec::with_capacity(items.len());
        for (item, total_payment) in items.iter().zip(totals) {
            let stock_item = StockItem {
                id: Uuid::new_v4(),
                stock_entry_id: entry.id,
                item_name: item.item_name.trim().to_string(),
                weight: item.weight,
                price_per_unit: item.price_per_unit,
                total_payment,
                is_sorted: false,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };
            tx.insert_stock_item(&stock_item).await?;
            created.push(StockItemWithSorts {
                item: stock_item,
                sorts: Vec::new(),
            });
        }

        Ok(StockEntryDetail {
            entry,
            items: created,
        })
    }

    /// Grade a stock item into one or more sorts
    #[tracing::instrument(skip(self, input), fields(sorts = input.sorts.len()))]
    pub async fn submit_sort(
        &self,
        stock_item_id: Uuid,
        input: SubmitSortInput,
    ) -> AppResult<Vec<StockSort>> {
        if input.sorts.is_empty() {
            return Err(AppError::validation("sorts", "At least one sort is required"));
        }

        for sort in &input.sorts {
            rule("sorted_item_name", validate_name(&sort.sorted_item_name))?;
            rule("weight", validate_weight(sort.weight))?;
            rule(
                "price_per_unit",
                validate_non_negative_price(sort.price_per_unit),
            )?;
            if let Some(current) = sort.current_weight {
                rule("current_weight", validate_current_weight(current, sort.weight))?;
            }
        }

        let mut tx = self.store.begin().await?;

        let item = tx
            .stock_item(stock_item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        // Sorted weight may never exceed what was delivered
        let already_sorted = tx
            .stock_sorts_of_item(item.id)
            .await?
            .iter()
            .try_fold(0i64, |acc, s| acc.checked_add(s.weight))
            .ok_or_else(|| AppError::validation("weight", "Sorted weight is out of range"))?;
        let submitted = input
            .sorts
            .iter()
            .try_fold(0i64, |acc, s| acc.checked_add(s.weight))
            .ok_or_else(|| AppError::validation("weight", "Sorted weight is out of range"))?;
        let total_sorted = already_sorted
            .checked_add(submitted)
            .ok_or_else(|| AppError::validation("weight", "Sorted weight is out of range"))?;
        if total_sorted > item.weight {
            return Err(AppError::validation(
                "weight",
                format!(
                    "Sorted weight {} exceeds stock item weight {}",
                    total_sorted, item.weight
                ),
            ));
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(input.sorts.len());
        for sort in input.sorts {
            let current_weight = if sort.is_shrinkage {
                0
            } else {
                sort.current_weight.unwrap_or(sort.weight)
            };
            let stock_sort = StockSort {
                id: Uuid::new_v4(),
                stock_item_id: item.id,
                sorted_item_name: sort.sorted_item_name.trim().to_string(),
                weight: sort.weight,
                price_per_unit: sort.price_per_unit,
                current_weight,
                is_shrinkage: sort.is_shrinkage,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            };
            tx.insert_stock_sort(&stock_sort).await?;
            created.push(stock_sort);
        }

        tx.mark_stock_item_sorted(item.id).await?;
        tx.commit().await?;

        tracing::info!(stock_item_id = %item.id, sorts = created.len(), "Stock item sorted");
        Ok(created)
    }

    /// Soft-delete a stock entry together with its items and sorts
    #[tracing::instrument(skip(self))]
    pub async fn delete_stock_entry(&self, stock_entry_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        Self::delete_entry(tx.as_mut(), stock_entry_id).await?;
        tx.commit().await?;

        tracing::info!(%stock_entry_id, "Stock entry deleted");
        Ok(())
    }

    /// Cascade soft-delete inside an open transaction.
    ///
    /// Refused while any sort beneath the entry still has weight allocated to
    /// a live sale; those sales have to be reversed first. The sorts stay
    /// locked until commit so no allocation can slip in after the check.
    pub(crate) async fn delete_entry(tx: &mut dyn LedgerTx, stock_entry_id: Uuid) -> AppResult<()> {
        if tx.stock_entry(stock_entry_id).await?.is_none() {
            return Err(AppError::NotFound("Stock entry".to_string()));
        }
        tx.lock_stock_sorts_of_entry(stock_entry_id).await?;

        let allocated = tx.sold_weight_of_entry(stock_entry_id).await?;
        if allocated > 0 {
            tracing::warn!(%stock_entry_id, allocated, "Refusing to delete allocated stock");
            return Err(AppError::conflict(
                "stock_entry",
                format!(
                    "Stock entry has {} weight units allocated to sales; reverse those sales first",
                    allocated
                ),
            ));
        }

        if !tx.soft_delete_stock_entry(stock_entry_id).await? {
            return Err(AppError::NotFound("Stock entry".to_string()));
        }
        Ok(())
    }

    /// Get a stock entry with its items and sorts
    pub async fn get_stock_entry(&self, stock_entry_id: Uuid) -> AppResult<StockEntryDetail> {
        let mut tx = self.store.begin().await?;
        Self::load_entry(tx.as_mut(), stock_entry_id).await
    }

    pub(crate) async fn load_entry(
        tx: &mut dyn LedgerTx,
        stock_entry_id: Uuid,
    ) -> AppResult<StockEntryDetail> {
        let entry = tx
            .stock_entry(stock_entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock entry".to_string()))?;

        let mut items = Vec::new();
        for item in tx.stock_items_of_entry(entry.id).await? {
            let sorts = tx.stock_sorts_of_item(item.id).await?;
            items.push(StockItemWithSorts { item, sorts });
        }

        Ok(StockEntryDetail { entry, items })
    }

    /// Get one stock sort
    pub async fn get_stock_sort(&self, stock_sort_id: Uuid) -> AppResult<StockSort> {
        let mut tx = self.store.begin().await?;
        tx.stock_sort(stock_sort_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stock sort".to_string()))
    }

    /// Sorts a sale can currently allocate from
    pub async fn list_available_sorts(&self) -> AppResult<Vec<StockSort>> {
        let mut tx = self.store.begin().await?;
        tx.available_stock_sorts().await
    }
}
