//! Payment ledger: append-only INCOME/EXPENSE entries with derived balances

use chrono::Utc;
use uuid::Uuid;

use shared::{validate_amount, Amount, Payment, PaymentReference, PaymentType, UserBalance};

use crate::error::{AppError, AppResult};
use crate::store::{LedgerTx, SharedStore};

#[derive(Clone)]
pub struct PaymentService {
    store: SharedStore,
}

/// A ledger entry to append
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub payment_type: PaymentType,
    pub amount: Amount,
    pub description: String,
    pub sale_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
}

impl PaymentService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Append one entry
    pub async fn post(&self, input: NewPayment) -> AppResult<Payment> {
        let mut tx = self.store.begin().await?;
        let payment = Self::post_in(tx.as_mut(), input).await?;
        tx.commit().await?;
        Ok(payment)
    }

    /// Append one entry inside an open transaction
    pub(crate) async fn post_in(tx: &mut dyn LedgerTx, input: NewPayment) -> AppResult<Payment> {
        validate_amount(input.amount).map_err(|msg| AppError::validation("amount", msg))?;

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            total: input.amount,
            payment_type: input.payment_type,
            sale_id: input.sale_id,
            purchase_id: input.purchase_id,
            description: input.description,
            is_deleted: false,
            created_at: Utc::now(),
        };
        tx.insert_payment(&payment).await?;
        Ok(payment)
    }

    /// INCOME minus EXPENSE over live entries; 0 for a user with none
    pub async fn balance(&self, user_id: Uuid) -> AppResult<Amount> {
        let mut tx = self.store.begin().await?;
        tx.balance(user_id).await
    }

    /// Balances for many users in one query; every requested id is present
    pub async fn batch_balances(&self, user_ids: &[Uuid]) -> AppResult<Vec<UserBalance>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.store.begin().await?;
        tx.balances(user_ids).await
    }

    /// Mark the entries of a sale or purchase deleted; idempotent
    pub async fn soft_delete_by_reference(&self, reference: PaymentReference) -> AppResult<u64> {
        let mut tx = self.store.begin().await?;
        let affected = Self::soft_delete_in(tx.as_mut(), reference).await?;
        tx.commit().await?;
        Ok(affected)
    }

    pub(crate) async fn soft_delete_in(
        tx: &mut dyn LedgerTx,
        reference: PaymentReference,
    ) -> AppResult<u64> {
        tx.soft_delete_payments(reference).await
    }

    /// Live entries of a user, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut tx = self.store.begin().await?;
        tx.payments_of_user(user_id).await
    }
}
