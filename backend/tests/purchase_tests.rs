//! Purchase intake and supplier settlement tests

mod common;

use common::{date, line, raw_item, sale, sort, Ledger};
use shared::{PaymentStatus, PaymentType};
use trading_ledger_backend::services::purchase::{CreatePurchaseInput, RecordPaymentInput};
use trading_ledger_backend::services::stock::SubmitSortInput;
use trading_ledger_backend::ErrorKind;
use uuid::Uuid;

fn purchase_input(supplier_id: Uuid) -> CreatePurchaseInput {
    CreatePurchaseInput {
        supplier_id,
        purchase_date: date(),
        items: vec![raw_item("Cherry", 100, 10), raw_item("Parchment", 20, 50)],
    }
}

fn pay(amount: i64) -> RecordPaymentInput {
    RecordPaymentInput {
        amount,
        description: None,
    }
}

#[tokio::test]
async fn test_create_purchase_links_new_stock_entry() {
    let ledger = Ledger::new();
    let supplier = Uuid::new_v4();

    let detail = ledger
        .purchases
        .create_purchase(purchase_input(supplier))
        .await
        .unwrap();

    assert_eq!(detail.purchase.code, "BUY1");
    assert_eq!(detail.purchase.supplier_id, supplier);
    assert_eq!(detail.purchase.stock_entry_id, detail.stock.entry.id);
    assert_eq!(detail.purchase.total_amount, 2_000);
    assert_eq!(detail.purchase.remaining_amount, 2_000);
    assert_eq!(
        detail.purchase.payment_status,
        PaymentStatus::PaymentNotMadeYet
    );

    let fetched = ledger.purchases.get_purchase(detail.purchase.id).await.unwrap();
    assert_eq!(fetched.stock.items.len(), 2);
}

#[tokio::test]
async fn test_invalid_purchase_creates_no_stock() {
    let ledger = Ledger::new();

    let err = ledger
        .purchases
        .create_purchase(CreatePurchaseInput {
            supplier_id: Uuid::new_v4(),
            purchase_date: date(),
            items: vec![raw_item("Cherry", 10, 10), raw_item("Broken", -1, 10)],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // The sequence was not consumed either
    let next = ledger
        .purchases
        .create_purchase(purchase_input(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(next.purchase.code, "BUY1");
}

#[tokio::test]
async fn test_partial_then_full_payment() {
    let ledger = Ledger::new();
    let supplier = Uuid::new_v4();
    let detail = ledger
        .purchases
        .create_purchase(purchase_input(supplier))
        .await
        .unwrap();
    let purchase_id = detail.purchase.id;

    let partial = ledger
        .purchases
        .record_payment(purchase_id, pay(500))
        .await
        .unwrap();
    assert_eq!(partial.paid_amount, 500);
    assert_eq!(partial.remaining_amount, 1_500);
    assert_eq!(partial.payment_status, PaymentStatus::PartialPayment);
    assert_eq!(ledger.payments.balance(supplier).await.unwrap(), -500);

    let full = ledger
        .purchases
        .record_payment(purchase_id, pay(1_500))
        .await
        .unwrap();
    assert_eq!(full.remaining_amount, 0);
    assert_eq!(full.payment_status, PaymentStatus::PaymentInFull);
    assert_eq!(ledger.payments.balance(supplier).await.unwrap(), -2_000);

    let entries = ledger.payments.list_for_user(supplier).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|p| p.payment_type == PaymentType::Expense && p.purchase_id == Some(purchase_id)));
    assert!(entries[0].description.contains("BUY1"));
}

#[tokio::test]
async fn test_overpayment_is_rejected_without_side_effects() {
    let ledger = Ledger::new();
    let supplier = Uuid::new_v4();
    let detail = ledger
        .purchases
        .create_purchase(purchase_input(supplier))
        .await
        .unwrap();

    let err = ledger
        .purchases
        .record_payment(detail.purchase.id, pay(2_001))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .purchases
        .record_payment(detail.purchase.id, pay(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let fetched = ledger.purchases.get_purchase(detail.purchase.id).await.unwrap();
    assert_eq!(fetched.purchase.paid_amount, 0);
    assert_eq!(ledger.payments.balance(supplier).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payment_against_unknown_purchase_is_not_found() {
    let ledger = Ledger::new();

    let err = ledger
        .purchases
        .record_payment(Uuid::new_v4(), pay(10))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_purchase_removes_stock_and_payments() {
    let ledger = Ledger::new();
    let supplier = Uuid::new_v4();
    let detail = ledger
        .purchases
        .create_purchase(purchase_input(supplier))
        .await
        .unwrap();
    ledger
        .purchases
        .record_payment(detail.purchase.id, pay(300))
        .await
        .unwrap();

    ledger
        .purchases
        .delete_purchase(detail.purchase.id)
        .await
        .unwrap();

    assert_eq!(
        ledger
            .purchases
            .get_purchase(detail.purchase.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        ledger
            .stock
            .get_stock_entry(detail.stock.entry.id)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(ledger.payments.balance(supplier).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_purchase_blocked_by_live_sale() {
    let ledger = Ledger::new();
    let supplier = Uuid::new_v4();
    let detail = ledger
        .purchases
        .create_purchase(purchase_input(supplier))
        .await
        .unwrap();
    ledger
        .purchases
        .record_payment(detail.purchase.id, pay(100))
        .await
        .unwrap();
    let sorts = ledger
        .stock
        .submit_sort(
            detail.stock.items[0].item.id,
            SubmitSortInput {
                sorts: vec![sort("Grade A", 100, 20)],
            },
        )
        .await
        .unwrap();
    ledger
        .sales
        .allocate_sale(sale(Uuid::new_v4(), vec![line(sorts[0].id, 10)], vec![]))
        .await
        .unwrap();

    let err = ledger
        .purchases
        .delete_purchase(detail.purchase.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Nothing was deleted
    assert!(ledger.purchases.get_purchase(detail.purchase.id).await.is_ok());
    assert_eq!(ledger.payments.balance(supplier).await.unwrap(), -100);
}
