//! Purchase models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentStatus, StockEntryDetail};
use crate::types::Amount;

/// A supplier delivery, linked to the stock entry it produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Purchase {
    pub id: Uuid,
    /// Display code, "BUY" followed by a sequence number
    pub code: String,
    pub supplier_id: Uuid,
    pub purchase_date: NaiveDate,
    pub stock_entry_id: Uuid,
    pub total_amount: Amount,
    pub paid_amount: Amount,
    pub remaining_amount: Amount,
    pub payment_status: PaymentStatus,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseDetail {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub stock: StockEntryDetail,
}
