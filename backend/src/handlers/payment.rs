//! HTTP handlers for the payment ledger

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::{Amount, Payment, UserBalance};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::payment::PaymentService;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct BatchBalanceRequest {
    #[validate(length(max = 1000))]
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: Amount,
}

pub async fn get_balance(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<BalanceResponse>> {
    let service = PaymentService::new(state.store);
    let balance = service.balance(user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

/// Balances of many users at once
pub async fn batch_balances(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<BatchBalanceRequest>,
) -> AppResult<Json<Vec<UserBalance>>> {
    input.validate()?;
    let service = PaymentService::new(state.store);
    Ok(Json(service.batch_balances(&input.user_ids).await?))
}

pub async fn list_user_payments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    let service = PaymentService::new(state.store);
    Ok(Json(service.list_for_user(user_id).await?))
}
