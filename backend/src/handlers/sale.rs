//! HTTP handlers for sales

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use shared::SaleDetail;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sale::{AllocateSaleInput, SaleService};
use crate::AppState;

/// Allocate a new sale
pub async fn create_sale(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<AllocateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleDetail>)> {
    input.validate()?;
    let service = SaleService::new(state.store);
    let sale = service.allocate_sale(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleDetail>> {
    let service = SaleService::new(state.store);
    Ok(Json(service.get_sale(sale_id).await?))
}

/// Deleting a sale reverses its allocation
pub async fn delete_sale(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = SaleService::new(state.store);
    service.reverse_sale(sale_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
