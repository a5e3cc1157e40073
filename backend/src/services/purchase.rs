//! Purchase intake and supplier settlement

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{
    display_code, validate_amount, Amount, PaymentReference, PaymentStatus, PaymentType, Purchase,
    PurchaseDetail, PURCHASE_CODE_PREFIX,
};

use super::payment::{NewPayment, PaymentService};
use super::stock::{NewStockItem, StockService};
use crate::error::{AppError, AppResult};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct PurchaseService {
    store: SharedStore,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseInput {
    pub supplier_id: Uuid,
    pub purchase_date: NaiveDate,
    #[validate(length(min = 1))]
    pub items: Vec<NewStockItem>,
}

/// Payment made to the supplier against a purchase
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentInput {
    pub amount: Amount,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl PurchaseService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a delivery: stock entry, items and purchase row together
    #[tracing::instrument(skip(self, input), fields(supplier_id = %input.supplier_id))]
    pub async fn create_purchase(&self, input: CreatePurchaseInput) -> AppResult<PurchaseDetail> {
        let mut tx = self.store.begin().await?;

        let stock = StockService::insert_entry(tx.as_mut(), &input.items).await?;
        let total_amount = stock.total_payment();

        let sequence = tx.next_purchase_sequence().await?;
        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            code: display_code(PURCHASE_CODE_PREFIX, sequence),
            supplier_id: input.supplier_id,
            purchase_date: input.purchase_date,
            stock_entry_id: stock.entry.id,
            total_amount,
            paid_amount: 0,
            remaining_amount: total_amount,
            payment_status: PaymentStatus::PaymentNotMadeYet,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        tx.insert_purchase(&purchase).await?;
        tx.commit().await?;

        tracing::info!(purchase_id = %purchase.id, code = %purchase.code, total_amount, "Purchase created");
        Ok(PurchaseDetail { purchase, stock })
    }

    /// Pay part or all of what is owed to the supplier
    #[tracing::instrument(skip(self, input), fields(amount = input.amount))]
    pub async fn record_payment(
        &self,
        purchase_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<Purchase> {
        validate_amount(input.amount).map_err(|msg| AppError::validation("amount", msg))?;

        let mut tx = self.store.begin().await?;

        let purchase = tx
            .lock_purchase(purchase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;

        if input.amount > purchase.remaining_amount {
            return Err(AppError::validation(
                "amount",
                format!(
                    "Payment of {} exceeds remaining amount {}",
                    input.amount, purchase.remaining_amount
                ),
            ));
        }

        let paid_amount = purchase.paid_amount + input.amount;
        let remaining_amount = purchase.total_amount - paid_amount;
        let payment_status = PaymentStatus::for_amounts(paid_amount, purchase.total_amount);
        tx.update_purchase_payment(purchase.id, paid_amount, remaining_amount, payment_status)
            .await?;

        let description = input
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Payment for purchase {}", purchase.code));
        PaymentService::post_in(
            tx.as_mut(),
            NewPayment {
                user_id: purchase.supplier_id,
                payment_type: PaymentType::Expense,
                amount: input.amount,
                description,
                sale_id: None,
                purchase_id: Some(purchase.id),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%purchase_id, status = payment_status.as_str(), "Purchase payment recorded");
        Ok(Purchase {
            paid_amount,
            remaining_amount,
            payment_status,
            ..purchase
        })
    }

    /// Soft-delete a purchase with its stock tree and payments
    #[tracing::instrument(skip(self))]
    pub async fn delete_purchase(&self, purchase_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let purchase = tx
            .purchase(purchase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;

        StockService::delete_entry(tx.as_mut(), purchase.stock_entry_id).await?;
        tx.soft_delete_purchase(purchase.id).await?;
        PaymentService::soft_delete_in(tx.as_mut(), PaymentReference::Purchase(purchase.id))
            .await?;
        tx.commit().await?;

        tracing::info!(%purchase_id, "Purchase deleted");
        Ok(())
    }

    pub async fn get_purchase(&self, purchase_id: Uuid) -> AppResult<PurchaseDetail> {
        let mut tx = self.store.begin().await?;

        let purchase = tx
            .purchase(purchase_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Purchase".to_string()))?;
        let stock = StockService::load_entry(tx.as_mut(), purchase.stock_entry_id).await?;

        Ok(PurchaseDetail { purchase, stock })
    }
}
