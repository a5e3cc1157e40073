//! Payment ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Amount;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Income,
    Expense,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Income => "INCOME",
            PaymentType::Expense => "EXPENSE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INCOME" => Some(PaymentType::Income),
            "EXPENSE" => Some(PaymentType::Expense),
            _ => None,
        }
    }

    /// Contribution of `total` to a balance
    pub fn signed(&self, total: Amount) -> Amount {
        match self {
            PaymentType::Income => total,
            PaymentType::Expense => -total,
        }
    }
}

/// Settlement state of a sale or purchase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    PaymentInFull,
    PartialPayment,
    PaymentNotMadeYet,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PaymentInFull => "PAYMENT_IN_FULL",
            PaymentStatus::PartialPayment => "PARTIAL_PAYMENT",
            PaymentStatus::PaymentNotMadeYet => "PAYMENT_NOT_MADE_YET",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PAYMENT_IN_FULL" => Some(PaymentStatus::PaymentInFull),
            "PARTIAL_PAYMENT" => Some(PaymentStatus::PartialPayment),
            "PAYMENT_NOT_MADE_YET" => Some(PaymentStatus::PaymentNotMadeYet),
            _ => None,
        }
    }

    /// Status implied by how much of `total` has been paid
    pub fn for_amounts(paid: Amount, total: Amount) -> Self {
        if paid <= 0 {
            PaymentStatus::PaymentNotMadeYet
        } else if paid >= total {
            PaymentStatus::PaymentInFull
        } else {
            PaymentStatus::PartialPayment
        }
    }
}

/// Append-only ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Always positive; the sign comes from `payment_type`
    pub total: Amount,
    pub payment_type: PaymentType,
    pub sale_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
    pub description: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Reference used to soft-delete the payments of a sale or purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentReference {
    Sale(Uuid),
    Purchase(Uuid),
}

/// Derived balance of one user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBalance {
    pub user_id: Uuid,
    pub balance: Amount,
}
