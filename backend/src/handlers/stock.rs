//! HTTP handlers for the stock hierarchy

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use shared::{StockEntryDetail, StockSort};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock::{CreateStockEntryInput, StockService, SubmitSortInput};
use crate::AppState;

/// Create a stock entry outside of a purchase
pub async fn create_stock_entry(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateStockEntryInput>,
) -> AppResult<(StatusCode, Json<StockEntryDetail>)> {
    input.validate()?;
    let service = StockService::new(state.store);
    let entry = service.create_stock_entry(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_stock_entry(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_entry_id): Path<Uuid>,
) -> AppResult<Json<StockEntryDetail>> {
    let service = StockService::new(state.store);
    Ok(Json(service.get_stock_entry(stock_entry_id).await?))
}

pub async fn delete_stock_entry(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_entry_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = StockService::new(state.store);
    service.delete_stock_entry(stock_entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grade a stock item into sorts
pub async fn submit_sort(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_item_id): Path<Uuid>,
    Json(input): Json<SubmitSortInput>,
) -> AppResult<(StatusCode, Json<Vec<StockSort>>)> {
    input.validate()?;
    let service = StockService::new(state.store);
    let sorts = service.submit_sort(stock_item_id, input).await?;
    Ok((StatusCode::CREATED, Json(sorts)))
}

pub async fn get_stock_sort(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(stock_sort_id): Path<Uuid>,
) -> AppResult<Json<StockSort>> {
    let service = StockService::new(state.store);
    Ok(Json(service.get_stock_sort(stock_sort_id).await?))
}

/// Sorts with weight left to sell
pub async fn list_available_sorts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<StockSort>>> {
    let service = StockService::new(state.store);
    Ok(Json(service.list_available_sorts().await?))
}
