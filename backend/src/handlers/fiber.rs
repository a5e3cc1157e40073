//! HTTP handlers for the fiber registry

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{Fiber, FiberStatus};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::fiber::{CreateFiberInput, FiberService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListFibersQuery {
    pub status: Option<String>,
}

pub async fn create_fiber(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<CreateFiberInput>,
) -> AppResult<(StatusCode, Json<Fiber>)> {
    input.validate()?;
    let service = FiberService::new(state.store);
    let fiber = service.create_fiber(input).await?;
    Ok((StatusCode::CREATED, Json(fiber)))
}

/// List fibers, `?status=FREE|USED` to filter
pub async fn list_fibers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListFibersQuery>,
) -> AppResult<Json<Vec<Fiber>>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            FiberStatus::from_str(&s.to_uppercase())
                .ok_or_else(|| AppError::validation("status", "Status must be FREE or USED"))?,
        ),
        None => None,
    };
    let service = FiberService::new(state.store);
    Ok(Json(service.list_fibers(status).await?))
}

pub async fn get_fiber(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(fiber_id): Path<Uuid>,
) -> AppResult<Json<Fiber>> {
    let service = FiberService::new(state.store);
    Ok(Json(service.get_fiber(fiber_id).await?))
}

pub async fn mark_fiber_available(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(fiber_id): Path<Uuid>,
) -> AppResult<Json<Fiber>> {
    tracing::info!(%fiber_id, user_id = %current_user.0.user_id, "Manual fiber release");
    let service = FiberService::new(state.store);
    Ok(Json(service.mark_available(fiber_id).await?))
}

pub async fn delete_fiber(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(fiber_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = FiberService::new(state.store);
    service.delete_fiber(fiber_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
