//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use shared::{StockSort, Weight};
use trading_ledger_backend::services::fiber::CreateFiberInput;
use trading_ledger_backend::services::purchase::CreatePurchaseInput;
use trading_ledger_backend::services::sale::{AllocateSaleInput, SaleLineInput};
use trading_ledger_backend::services::stock::{NewStockItem, NewStockSort, SubmitSortInput};
use trading_ledger_backend::services::{
    FiberService, PaymentService, PurchaseService, SaleService, StockService,
};
use trading_ledger_backend::MemoryLedgerStore;

pub struct Ledger {
    pub store: MemoryLedgerStore,
    pub stock: StockService,
    pub fibers: FiberService,
    pub payments: PaymentService,
    pub sales: SaleService,
    pub purchases: PurchaseService,
}

impl Ledger {
    pub fn new() -> Self {
        let store = MemoryLedgerStore::new();
        let shared: trading_ledger_backend::SharedStore = Arc::new(store.clone());
        Self {
            stock: StockService::new(shared.clone()),
            fibers: FiberService::new(shared.clone()),
            payments: PaymentService::new(shared.clone()),
            sales: SaleService::new(shared.clone()),
            purchases: PurchaseService::new(shared),
            store,
        }
    }

    /// A purchased item of `weight` graded into one sellable sort of the same weight
    pub async fn sort_with_weight(&self, weight: Weight) -> StockSort {
        let purchase = self
            .purchases
            .create_purchase(CreatePurchaseInput {
                supplier_id: Uuid::new_v4(),
                purchase_date: date(),
                items: vec![raw_item("Robusta cherry", weight, 10)],
            })
            .await
            .unwrap();
        let item_id = purchase.stock.items[0].item.id;
        let mut sorts = self
            .stock
            .submit_sort(
                item_id,
                SubmitSortInput {
                    sorts: vec![sort("Grade A", weight, 25)],
                },
            )
            .await
            .unwrap();
        sorts.remove(0)
    }

    pub async fn free_fiber(&self, name: &str) -> Uuid {
        self.fibers
            .create_fiber(CreateFiberInput {
                name: name.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn current_weight(&self, stock_sort_id: Uuid) -> Weight {
        self.stock
            .get_stock_sort(stock_sort_id)
            .await
            .unwrap()
            .current_weight
    }
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

pub fn raw_item(name: &str, weight: Weight, price_per_unit: i64) -> NewStockItem {
    NewStockItem {
        item_name: name.to_string(),
        weight,
        price_per_unit,
    }
}

pub fn sort(name: &str, weight: Weight, price_per_unit: i64) -> NewStockSort {
    NewStockSort {
        sorted_item_name: name.to_string(),
        weight,
        price_per_unit,
        current_weight: None,
        is_shrinkage: false,
    }
}

pub fn line(stock_sort_id: Uuid, weight: Weight) -> SaleLineInput {
    SaleLineInput {
        stock_sort_id,
        weight,
        price_per_unit: 30,
        total_amount: weight * 30,
        stock_code: None,
    }
}

/// A domestic sale of `lines` for `customer_id`
pub fn sale(customer_id: Uuid, lines: Vec<SaleLineInput>, fiber_ids: Vec<Uuid>) -> AllocateSaleInput {
    let total_amount = lines.iter().map(|l| l.total_amount).sum::<i64>().max(1);
    AllocateSaleInput {
        customer_id,
        sale_date: date(),
        export_sale: false,
        items: lines,
        fiber_ids,
        add_ons: Vec::new(),
        total_amount,
    }
}
