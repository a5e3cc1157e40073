//! Fiber registry: FREE/USED spools allocated exclusively to one sale

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use shared::{validate_name, Fiber, FiberStatus};

use crate::error::{AppError, AppResult};
use crate::store::{LedgerTx, SharedStore};

#[derive(Clone)]
pub struct FiberService {
    store: SharedStore,
}

/// Input for registering a fiber
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFiberInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

impl FiberService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Register a new fiber in the FREE state
    pub async fn create_fiber(&self, input: CreateFiberInput) -> AppResult<Fiber> {
        validate_name(&input.name).map_err(|msg| AppError::validation("name", msg))?;

        let now = Utc::now();
        let fiber = Fiber {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            status: FiberStatus::Free,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_fiber(&fiber).await?;
        tx.commit().await?;

        Ok(fiber)
    }

    pub async fn get_fiber(&self, fiber_id: Uuid) -> AppResult<Fiber> {
        let mut tx = self.store.begin().await?;
        tx.fiber(fiber_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Fiber".to_string()))
    }

    /// List fibers, optionally only those in one state
    pub async fn list_fibers(&self, status: Option<FiberStatus>) -> AppResult<Vec<Fiber>> {
        let mut tx = self.store.begin().await?;
        tx.fibers(status).await
    }

    /// Administrative USED -> FREE. Already FREE fibers are returned unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn mark_available(&self, fiber_id: Uuid) -> AppResult<Fiber> {
        let mut tx = self.store.begin().await?;

        let fiber = tx
            .fiber(fiber_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Fiber".to_string()))?;

        if fiber.status == FiberStatus::Used {
            tx.release_fiber(fiber_id).await?;
            tx.release_fiber_allocation(fiber_id, Utc::now()).await?;
        }

        let updated = tx
            .fiber(fiber_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Fiber".to_string()))?;
        tx.commit().await?;

        tracing::info!(%fiber_id, "Fiber marked available");
        Ok(updated)
    }

    /// Soft-delete a fiber; it can never be allocated again
    #[tracing::instrument(skip(self))]
    pub async fn delete_fiber(&self, fiber_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        if !tx.soft_delete_fiber(fiber_id).await? {
            return Err(AppError::NotFound("Fiber".to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    /// FREE -> USED inside an open transaction (compare-and-set)
    pub(crate) async fn claim(tx: &mut dyn LedgerTx, fiber_id: Uuid) -> AppResult<()> {
        if tx.fiber(fiber_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Fiber {}", fiber_id)));
        }
        if !tx.claim_fiber(fiber_id).await? {
            tracing::warn!(%fiber_id, "Fiber already in use");
            return Err(AppError::FiberInUse(fiber_id));
        }
        Ok(())
    }

    /// USED -> FREE inside an open transaction; false if the fiber was not USED
    /// (already freed by an administrator, or deleted)
    pub(crate) async fn release(tx: &mut dyn LedgerTx, fiber_id: Uuid) -> AppResult<bool> {
        tx.release_fiber(fiber_id).await
    }
}
