//! HTTP handlers for purchases

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use shared::{Purchase, PurchaseDetail};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase::{CreatePurchaseInput, PurchaseService, RecordPaymentInput};
use crate::AppState;

pub async fn create_purchase(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<PurchaseDetail>)> {
    input.validate()?;
    let service = PurchaseService::new(state.store);
    let purchase = service.create_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseDetail>> {
    let service = PurchaseService::new(state.store);
    Ok(Json(service.get_purchase(purchase_id).await?))
}

pub async fn delete_purchase(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = PurchaseService::new(state.store);
    service.delete_purchase(purchase_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record a payment made to the supplier
pub async fn record_purchase_payment(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<Purchase>> {
    input.validate()?;
    let service = PurchaseService::new(state.store);
    Ok(Json(service.record_payment(purchase_id, input).await?))
}
