//! Sale allocation tests
//!
//! Exercise allocation and reversal through the real services against the
//! in-memory store:
//! - weight conservation across allocate/reverse
//! - insufficient stock leaves no trace
//! - fiber exclusivity, including concurrent sales
//! - store outages surface as retryable errors

mod common;

use std::sync::Arc;

use common::{line, sale, Ledger};
use proptest::prelude::*;
use shared::{FiberStatus, PaymentStatus};
use trading_ledger_backend::services::purchase::CreatePurchaseInput;
use trading_ledger_backend::services::sale::AddOnInput;
use trading_ledger_backend::services::stock::{NewStockSort, SubmitSortInput};
use trading_ledger_backend::{AppError, ErrorKind, LedgerStore, LedgerTx};
use uuid::Uuid;

// ============================================================================
// Weight Allocation
// ============================================================================

#[tokio::test]
async fn test_allocate_then_reverse_restores_weight() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(100).await;
    let customer = Uuid::new_v4();

    let sale_a = ledger
        .sales
        .allocate_sale(sale(customer, vec![line(sort.id, 40)], vec![]))
        .await
        .unwrap();
    assert_eq!(ledger.current_weight(sort.id).await, 60);
    assert_eq!(sale_a.items.len(), 1);
    assert_eq!(sale_a.items[0].weight, 40);

    // Sale B asks for more than is left
    let err = ledger
        .sales
        .allocate_sale(sale(customer, vec![line(sort.id, 70)], vec![]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            requested: 70,
            available: 60,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(ledger.current_weight(sort.id).await, 60);

    ledger.sales.reverse_sale(sale_a.sale.id).await.unwrap();
    assert_eq!(ledger.current_weight(sort.id).await, 100);
}

#[tokio::test]
async fn test_new_sale_is_unpaid_with_sell_code() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(50).await;

    let first = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 10)], vec![]))
        .await
        .unwrap();
    let second = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 10)], vec![]))
        .await
        .unwrap();

    assert_eq!(first.sale.code, "SELL1");
    assert_eq!(second.sale.code, "SELL2");
    assert_eq!(first.sale.paid_amount, 0);
    assert_eq!(first.sale.remaining_amount, first.sale.total_amount);
    assert_eq!(first.sale.payment_status, PaymentStatus::PaymentNotMadeYet);
}

#[tokio::test]
async fn test_two_lines_on_same_sort_are_both_deducted() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(100).await;

    ledger
        .sales
        .allocate_sale(sale(
            Uuid::new_v4(),
            vec![line(sort.id, 30), line(sort.id, 20)],
            vec![],
        ))
        .await
        .unwrap();

    assert_eq!(ledger.current_weight(sort.id).await, 50);
}

#[tokio::test]
async fn test_insufficient_stock_on_later_line_rolls_back_everything() {
    let ledger = Ledger::new();
    let plenty = ledger.sort_with_weight(100).await;
    let scarce = ledger.sort_with_weight(5).await;
    let fiber = ledger.free_fiber("Spool 1").await;
    let customer = Uuid::new_v4();

    let mut input = sale(
        customer,
        vec![line(plenty.id, 40), line(scarce.id, 10)],
        vec![fiber],
    );
    input.add_ons = vec![AddOnInput {
        name: "Packing".to_string(),
        price: 50,
    }];

    let err = ledger.sales.allocate_sale(input).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(ledger.current_weight(plenty.id).await, 100);
    assert_eq!(ledger.current_weight(scarce.id).await, 5);
    assert_eq!(
        ledger.fibers.get_fiber(fiber).await.unwrap().status,
        FiberStatus::Free
    );
    assert_eq!(ledger.payments.balance(customer).await.unwrap(), 0);
    assert!(ledger
        .payments
        .list_for_user(customer)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unknown_sort_is_not_found() {
    let ledger = Ledger::new();

    let err = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(Uuid::new_v4(), 1)], vec![]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_shrinkage_sort_cannot_be_sold() {
    let ledger = Ledger::new();
    let purchase = ledger
        .purchases
        .create_purchase(CreatePurchaseInput {
            supplier_id: Uuid::new_v4(),
            purchase_date: common::date(),
            items: vec![common::raw_item("Arabica cherry", 20, 10)],
        })
        .await
        .unwrap();
    let sorts = ledger
        .stock
        .submit_sort(
            purchase.stock.items[0].item.id,
            SubmitSortInput {
                sorts: vec![
                    common::sort("Grade A", 17, 25),
                    NewStockSort {
                        sorted_item_name: "Husk loss".to_string(),
                        weight: 3,
                        price_per_unit: 0,
                        current_weight: Some(3),
                        is_shrinkage: true,
                    },
                ],
            },
        )
        .await
        .unwrap();
    let shrinkage = &sorts[1];
    assert!(shrinkage.is_shrinkage);
    assert_eq!(shrinkage.current_weight, 0);

    let err = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(shrinkage.id, 1)], vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_request_validation() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(10).await;
    let customer = Uuid::new_v4();

    let mut empty = sale(customer, vec![], vec![]);
    empty.total_amount = 10;
    assert_eq!(
        ledger.sales.allocate_sale(empty).await.unwrap_err().kind(),
        ErrorKind::Validation
    );

    let zero_weight = sale(customer, vec![line(sort.id, 0)], vec![]);
    assert_eq!(
        ledger
            .sales
            .allocate_sale(zero_weight)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );

    let mut zero_total = sale(customer, vec![line(sort.id, 1)], vec![]);
    zero_total.total_amount = 0;
    assert_eq!(
        ledger
            .sales
            .allocate_sale(zero_total)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );

    let fiber = ledger.free_fiber("Spool").await;
    let duplicate_fibers = sale(customer, vec![line(sort.id, 1)], vec![fiber, fiber]);
    assert_eq!(
        ledger
            .sales
            .allocate_sale(duplicate_fibers)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );

    let mut export_with_fiber = sale(customer, vec![line(sort.id, 1)], vec![fiber]);
    export_with_fiber.export_sale = true;
    assert_eq!(
        ledger
            .sales
            .allocate_sale(export_with_fiber)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );

    assert_eq!(ledger.current_weight(sort.id).await, 10);
}

#[tokio::test]
async fn test_reverse_unknown_or_reversed_sale_is_not_found() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(10).await;

    assert_eq!(
        ledger
            .sales
            .reverse_sale(Uuid::new_v4())
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );

    let allocated = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 4)], vec![]))
        .await
        .unwrap();
    ledger.sales.reverse_sale(allocated.sale.id).await.unwrap();

    // A second reversal must not restore the weight twice
    assert_eq!(
        ledger
            .sales
            .reverse_sale(allocated.sale.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(ledger.current_weight(sort.id).await, 10);
    assert_eq!(
        ledger
            .sales
            .get_sale(allocated.sale.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_get_sale_returns_lines_add_ons_and_fibers() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(10).await;
    let fiber = ledger.free_fiber("Spool").await;

    let mut input = sale(Uuid::new_v4(), vec![line(sort.id, 2)], vec![fiber]);
    input.add_ons = vec![AddOnInput {
        name: "Delivery".to_string(),
        price: 120,
    }];
    let created = ledger.sales.allocate_sale(input).await.unwrap();

    let detail = ledger.sales.get_sale(created.sale.id).await.unwrap();
    assert_eq!(detail.sale.code, created.sale.code);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.add_ons.len(), 1);
    assert_eq!(detail.add_ons[0].name, "Delivery");
    assert_eq!(detail.fiber_ids, vec![fiber]);
}

// ============================================================================
// Fiber Exclusivity
// ============================================================================

#[tokio::test]
async fn test_fiber_is_used_until_sale_is_reversed() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(100).await;
    let fiber = ledger.free_fiber("Spool F").await;

    let sale_x = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 10)], vec![fiber]))
        .await
        .unwrap();
    assert_eq!(sale_x.fiber_ids, vec![fiber]);
    assert_eq!(
        ledger.fibers.get_fiber(fiber).await.unwrap().status,
        FiberStatus::Used
    );

    let err = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 10)], vec![fiber]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FiberInUse(id) if id == fiber));
    assert_eq!(ledger.current_weight(sort.id).await, 90);

    ledger.sales.reverse_sale(sale_x.sale.id).await.unwrap();
    assert_eq!(
        ledger.fibers.get_fiber(fiber).await.unwrap().status,
        FiberStatus::Free
    );
}

#[tokio::test]
async fn test_concurrent_sales_for_one_fiber_exactly_one_wins() {
    let ledger = Arc::new(Ledger::new());
    let sort_id = ledger.sort_with_weight(1_000).await.id;
    let fiber = ledger.free_fiber("Contended spool").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .sales
                .allocate_sale(sale(Uuid::new_v4(), vec![line(sort_id, 10)], vec![fiber]))
                .await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::FiberInUse(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(ledger.current_weight(sort_id).await, 990);
}

#[tokio::test]
async fn test_concurrent_sales_never_overdraw_a_sort() {
    let ledger = Arc::new(Ledger::new());
    let sort_id = ledger.sort_with_weight(100).await.id;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .sales
                .allocate_sale(sale(Uuid::new_v4(), vec![line(sort_id, 30)], vec![]))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(ledger.current_weight(sort_id).await, 10);
}

#[tokio::test]
async fn test_concurrent_reversals_restore_weight_once() {
    let ledger = Arc::new(Ledger::new());
    let sort_id = ledger.sort_with_weight(100).await.id;

    let sale_a = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort_id, 40)], vec![]))
        .await
        .unwrap();
    ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort_id, 50)], vec![]))
        .await
        .unwrap();
    assert_eq!(ledger.current_weight(sort_id).await, 10);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let ledger = ledger.clone();
        let sale_id = sale_a.sale.id;
        handles.push(tokio::spawn(async move {
            ledger.sales.reverse_sale(sale_id).await
        }));
    }

    let mut reversed = 0;
    let mut not_found = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => reversed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => not_found += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(reversed, 1);
    assert_eq!(not_found, 3);
    assert_eq!(ledger.current_weight(sort_id).await, 50);
}

#[tokio::test]
async fn test_export_sale_consumes_no_fiber() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(10).await;
    let fiber = ledger.free_fiber("Spool").await;

    let mut input = sale(Uuid::new_v4(), vec![line(sort.id, 5)], vec![]);
    input.export_sale = true;
    let detail = ledger.sales.allocate_sale(input).await.unwrap();

    assert!(detail.fiber_ids.is_empty());
    assert!(detail.sale.export_sale);
    assert_eq!(
        ledger.fibers.get_fiber(fiber).await.unwrap().status,
        FiberStatus::Free
    );
}

#[tokio::test]
async fn test_reversal_skips_fiber_already_freed_by_hand() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(20).await;
    let fiber = ledger.free_fiber("Spool").await;

    let first = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 5)], vec![fiber]))
        .await
        .unwrap();
    ledger.fibers.mark_available(fiber).await.unwrap();

    // The freed fiber is claimed again by another sale
    let second = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 5)], vec![fiber]))
        .await
        .unwrap();

    // Reversing the first sale must not free the fiber the second one holds
    ledger.sales.reverse_sale(first.sale.id).await.unwrap();
    assert_eq!(
        ledger.fibers.get_fiber(fiber).await.unwrap().status,
        FiberStatus::Used
    );
    assert_eq!(
        ledger.sales.get_sale(second.sale.id).await.unwrap().fiber_ids,
        vec![fiber]
    );
}

// ============================================================================
// Infrastructure Failures
// ============================================================================

#[tokio::test]
async fn test_store_outage_is_retryable_and_has_no_effect() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(10).await;

    ledger.store.set_unavailable(true);
    let err = ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 5)], vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(err.is_retryable());

    ledger.store.set_unavailable(false);
    assert_eq!(ledger.current_weight(sort.id).await, 10);

    // Retrying the same request now succeeds
    ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, 5)], vec![]))
        .await
        .unwrap();
    assert_eq!(ledger.current_weight(sort.id).await, 5);
}

#[tokio::test]
async fn test_reversal_with_missing_sort_rolls_back() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(20).await;
    let customer = Uuid::new_v4();
    let allocated = ledger
        .sales
        .allocate_sale(sale(customer, vec![line(sort.id, 5)], vec![]))
        .await
        .unwrap();

    // Remove the stock underneath the sale behind the services' back
    let mut tx = ledger.store.begin().await.unwrap();
    let item = tx.stock_item(sort.stock_item_id).await.unwrap().unwrap();
    assert!(tx.soft_delete_stock_entry(item.stock_entry_id).await.unwrap());
    tx.commit().await.unwrap();

    let err = ledger
        .sales
        .reverse_sale(allocated.sale.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert!(ledger.sales.get_sale(allocated.sale.id).await.is_ok());
    assert_eq!(ledger.payments.balance(customer).await.unwrap(), 150);
}

#[tokio::test]
async fn test_dropped_transaction_commits_nothing() {
    let ledger = Ledger::new();
    let sort = ledger.sort_with_weight(10).await;

    let mut tx = ledger.store.begin().await.unwrap();
    tx.set_stock_sort_current_weight(sort.id, 0).await.unwrap();
    drop(tx);

    assert_eq!(ledger.current_weight(sort.id).await, 10);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any mix of allocations, reversed in any order, returns the sort to its start
    #[test]
    fn prop_allocate_reverse_conserves_weight(
        weight in 1i64..500,
        requests in prop::collection::vec(1i64..120, 1..8),
        reverse_order in any::<bool>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ledger = Ledger::new();
            let sort = ledger.sort_with_weight(weight).await;

            let mut sale_ids = Vec::new();
            let mut expected = weight;
            for requested in requests {
                let result = ledger
                    .sales
                    .allocate_sale(sale(Uuid::new_v4(), vec![line(sort.id, requested)], vec![]))
                    .await;
                match result {
                    Ok(detail) => {
                        expected -= requested;
                        sale_ids.push(detail.sale.id);
                    }
                    Err(e) => {
                        let insufficient = matches!(e, AppError::InsufficientStock { .. });
                        prop_assert!(insufficient);
                    }
                }
                let current = ledger.current_weight(sort.id).await;
                prop_assert_eq!(current, expected);
                prop_assert!(current >= 0 && current <= weight);
            }

            if reverse_order {
                sale_ids.reverse();
            }
            for sale_id in sale_ids {
                ledger.sales.reverse_sale(sale_id).await.unwrap();
            }
            prop_assert_eq!(ledger.current_weight(sort.id).await, weight);
            Ok(())
        })?;
    }
}
