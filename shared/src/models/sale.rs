//! Sale models: the sale, its line items and add-ons

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentStatus;
use crate::types::{Amount, Weight};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sale {
    pub id: Uuid,
    /// Display code, "SELL" followed by a sequence number
    pub code: String,
    pub customer_id: Uuid,
    pub sale_date: NaiveDate,
    pub total_amount: Amount,
    pub paid_amount: Amount,
    pub remaining_amount: Amount,
    pub payment_status: PaymentStatus,
    /// Export sales never consume fibers
    pub export_sale: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Weight consumed from one stock sort by a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemSale {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub stock_sort_id: Uuid,
    pub stock_code: Option<String>,
    pub weight: Weight,
    pub price_per_unit: Amount,
    pub total_amount: Amount,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Free-form charge attached to a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemAddOn {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub name: String,
    pub price: Amount,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// A sale with everything it owns or allocates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<ItemSale>,
    pub add_ons: Vec<ItemAddOn>,
    pub fiber_ids: Vec<Uuid>,
}
