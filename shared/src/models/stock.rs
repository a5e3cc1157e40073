//! Stock hierarchy models: entry, item and graded sort

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Amount, Weight};

/// Root of one purchase's intake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockEntry {
    pub id: Uuid,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw bulk material delivered under a stock entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockItem {
    pub id: Uuid,
    pub stock_entry_id: Uuid,
    pub item_name: String,
    pub weight: Weight,
    pub price_per_unit: Amount,
    /// weight x price_per_unit
    pub total_payment: Amount,
    pub is_sorted: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A graded, sellable (or shrinkage) lot derived from a stock item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockSort {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub sorted_item_name: String,
    pub weight: Weight,
    pub price_per_unit: Amount,
    /// Remaining allocatable weight, always within `0..=weight`
    pub current_weight: Weight,
    /// Loss or wastage; never allocated to a sale
    pub is_shrinkage: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockSort {
    pub fn is_allocatable(&self) -> bool {
        !self.is_deleted && !self.is_shrinkage && self.current_weight > 0
    }
}

/// A stock item together with its sorts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItemWithSorts {
    #[serde(flatten)]
    pub item: StockItem,
    pub sorts: Vec<StockSort>,
}

/// A stock entry with its full (non-deleted) tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntryDetail {
    #[serde(flatten)]
    pub entry: StockEntry,
    pub items: Vec<StockItemWithSorts>,
}

impl StockEntryDetail {
    pub fn total_payment(&self) -> Amount {
        self.items.iter().map(|i| i.item.total_payment).sum()
    }
}
