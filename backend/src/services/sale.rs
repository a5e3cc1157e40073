//! Sale allocation engine
//!
//! A sale consumes weight from stock sorts and, unless it is an export sale,
//! claims fibers. Allocation and its inverse run in a single transaction so no
//! partial state is ever committed.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::{
    decrement_weight, display_code, restore_weight, validate_name, validate_non_negative_price,
    validate_unique_ids, validate_weight, Amount, ItemAddOn, ItemSale, PaymentReference,
    PaymentStatus, PaymentType, Sale, SaleDetail, SaleFiber, Weight, SALE_CODE_PREFIX,
};

use super::fiber::FiberService;
use super::payment::{NewPayment, PaymentService};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerTx, SharedStore};

#[derive(Clone)]
pub struct SaleService {
    store: SharedStore,
}

/// One line of a sale, drawn from a single stock sort
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaleLineInput {
    pub stock_sort_id: Uuid,
    pub weight: Weight,
    pub price_per_unit: Amount,
    pub total_amount: Amount,
    #[validate(length(max = 100))]
    pub stock_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddOnInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub price: Amount,
}

/// Request to allocate a sale
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AllocateSaleInput {
    pub customer_id: Uuid,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub export_sale: bool,
    #[validate(length(min = 1))]
    pub items: Vec<SaleLineInput>,
    #[serde(default)]
    pub fiber_ids: Vec<Uuid>,
    #[serde(default)]
    pub add_ons: Vec<AddOnInput>,
    pub total_amount: Amount,
}

impl AllocateSaleInput {
    /// Domain checks that need no store access
    fn check(&self) -> AppResult<()> {
        if self.items.is_empty() {
            return Err(AppError::validation("items", "At least one line item is required"));
        }
        for line in &self.items {
            validate_weight(line.weight).map_err(|msg| AppError::validation("weight", msg))?;
            validate_non_negative_price(line.price_per_unit)
                .map_err(|msg| AppError::validation("price_per_unit", msg))?;
            validate_non_negative_price(line.total_amount)
                .map_err(|msg| AppError::validation("total_amount", msg))?;
        }
        for add_on in &self.add_ons {
            validate_name(&add_on.name).map_err(|msg| AppError::validation("add_ons", msg))?;
            validate_non_negative_price(add_on.price)
                .map_err(|msg| AppError::validation("add_ons", msg))?;
        }
        if self.total_amount <= 0 {
            return Err(AppError::validation(
                "total_amount",
                "Sale total must be greater than zero",
            ));
        }
        if self.export_sale && !self.fiber_ids.is_empty() {
            return Err(AppError::validation(
                "fiber_ids",
                "Export sales do not use fibers",
            ));
        }
        validate_unique_ids(&self.fiber_ids)
            .map_err(|msg| AppError::validation("fiber_ids", msg))?;
        Ok(())
    }
}

impl SaleService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Allocate stock and fibers to a new sale and post its INCOME entry
    #[tracing::instrument(
        skip(self, input),
        fields(customer_id = %input.customer_id, lines = input.items.len(), fibers = input.fiber_ids.len())
    )]
    pub async fn allocate_sale(&self, input: AllocateSaleInput) -> AppResult<SaleDetail> {
        input.check()?;

        let mut tx = self.store.begin().await?;
        let detail = Self::allocate_in(tx.as_mut(), input).await?;
        tx.commit().await?;

        tracing::info!(
            sale_id = %detail.sale.id,
            code = %detail.sale.code,
            total = detail.sale.total_amount,
            "Sale allocated"
        );
        Ok(detail)
    }

    async fn allocate_in(tx: &mut dyn LedgerTx, input: AllocateSaleInput) -> AppResult<SaleDetail> {
        let now = Utc::now();

        // 1. Fibers first; any conflict aborts before anything else is written
        let fiber_ids = if input.export_sale {
            Vec::new()
        } else {
            for fiber_id in &input.fiber_ids {
                FiberService::claim(tx, *fiber_id).await?;
            }
            input.fiber_ids.clone()
        };

        // 2. Sale header
        let sequence = tx.next_sale_sequence().await?;
        let sale = Sale {
            id: Uuid::new_v4(),
            code: display_code(SALE_CODE_PREFIX, sequence),
            customer_id: input.customer_id,
            sale_date: input.sale_date,
            total_amount: input.total_amount,
            paid_amount: 0,
            remaining_amount: input.total_amount,
            payment_status: PaymentStatus::PaymentNotMadeYet,
            export_sale: input.export_sale,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        tx.insert_sale(&sale).await?;

        for fiber_id in &fiber_ids {
            tx.insert_sale_fiber(&SaleFiber {
                sale_id: sale.id,
                fiber_id: *fiber_id,
                allocated_at: now,
                released_at: None,
            })
            .await?;
        }

        // 3. Line items; the sort row stays locked until commit
        let mut items = Vec::with_capacity(input.items.len());
        for line in input.items {
            let sort = tx
                .lock_stock_sort(line.stock_sort_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Stock sort {}", line.stock_sort_id)))?;
            if sort.is_shrinkage {
                return Err(AppError::validation(
                    "stock_sort_id",
                    "Shrinkage sorts cannot be sold",
                ));
            }

            let remaining = decrement_weight(sort.current_weight, line.weight).map_err(|_| {
                tracing::warn!(
                    stock_sort_id = %sort.id,
                    requested = line.weight,
                    available = sort.current_weight,
                    "Insufficient stock"
                );
                AppError::InsufficientStock {
                    stock_sort_id: sort.id,
                    requested: line.weight,
                    available: sort.current_weight,
                }
            })?;
            tx.set_stock_sort_current_weight(sort.id, remaining).await?;

            let item = ItemSale {
                id: Uuid::new_v4(),
                sale_id: sale.id,
                stock_sort_id: sort.id,
                stock_code: line.stock_code,
                weight: line.weight,
                price_per_unit: line.price_per_unit,
                total_amount: line.total_amount,
                is_deleted: false,
                created_at: now,
            };
            tx.insert_item_sale(&item).await?;
            items.push(item);
        }

        // 4. Add-ons carry no allocation
        let mut add_ons = Vec::with_capacity(input.add_ons.len());
        for add_on in input.add_ons {
            let add_on = ItemAddOn {
                id: Uuid::new_v4(),
                sale_id: sale.id,
                name: add_on.name.trim().to_string(),
                price: add_on.price,
                is_deleted: false,
                created_at: now,
            };
            tx.insert_item_add_on(&add_on).await?;
            add_ons.push(add_on);
        }

        // 5. Ledger entry owned by the customer
        PaymentService::post_in(
            tx,
            NewPayment {
                user_id: sale.customer_id,
                payment_type: PaymentType::Income,
                amount: sale.total_amount,
                description: format!("Sale {}", sale.code),
                sale_id: Some(sale.id),
                purchase_id: None,
            },
        )
        .await?;

        Ok(SaleDetail {
            sale,
            items,
            add_ons,
            fiber_ids,
        })
    }

    /// Undo an allocation: restore weight, drop payments, free fibers
    #[tracing::instrument(skip(self))]
    pub async fn reverse_sale(&self, sale_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let released = Self::reverse_in(tx.as_mut(), sale_id).await?;
        tx.commit().await?;

        tracing::info!(%sale_id, fibers_released = released, "Sale reversed");
        Ok(())
    }

    /// Returns how many fibers went back to FREE
    async fn reverse_in(tx: &mut dyn LedgerTx, sale_id: Uuid) -> AppResult<usize> {
        // Held until commit; a concurrent reversal waits here and then sees the sale gone
        if tx.lock_sale(sale_id).await?.is_none() {
            return Err(AppError::NotFound("Sale".to_string()));
        }

        for item in tx.item_sales_of_sale(sale_id).await? {
            let sort = tx.lock_stock_sort(item.stock_sort_id).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "Stock sort {} of sale {} is missing",
                    item.stock_sort_id, sale_id
                ))
            })?;
            let restored = restore_weight(sort.current_weight, item.weight, sort.weight)
                .map_err(|msg| {
                    AppError::Internal(format!("Stock sort {}: {}", sort.id, msg))
                })?;
            tx.set_stock_sort_current_weight(sort.id, restored).await?;
        }

        if !tx.soft_delete_sale(sale_id).await? {
            return Err(AppError::NotFound("Sale".to_string()));
        }
        PaymentService::soft_delete_in(tx, PaymentReference::Sale(sale_id)).await?;

        let mut released = 0;
        for fiber_id in tx.release_sale_fibers(sale_id, Utc::now()).await? {
            if FiberService::release(tx, fiber_id).await? {
                released += 1;
            }
        }
        Ok(released)
    }

    /// A sale with its lines, add-ons and currently allocated fibers
    pub async fn get_sale(&self, sale_id: Uuid) -> AppResult<SaleDetail> {
        let mut tx = self.store.begin().await?;

        let sale = tx
            .sale(sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;
        let items = tx.item_sales_of_sale(sale_id).await?;
        let add_ons = tx.add_ons_of_sale(sale_id).await?;
        let fiber_ids = tx
            .open_sale_fibers(sale_id)
            .await?
            .into_iter()
            .map(|allocation| allocation.fiber_id)
            .collect();

        Ok(SaleDetail {
            sale,
            items,
            add_ons,
            fiber_ids,
        })
    }
}
