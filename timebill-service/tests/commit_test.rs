mod common;

use common::{request, RacingStore, TestApp, TEST_USER};
use rust_decimal_macros::dec;
use std::sync::Arc;
use timebill_service::services::InMemoryStore;

#[tokio::test]
async fn lost_race_keeps_invoice_and_other_claim() {
    let memory = Arc::new(InMemoryStore::new());
    let setup = TestApp::spawn_on(memory.clone());
    let (client, project) = setup.billing_setup(TEST_USER).await;
    let a = setup
        .work_item(TEST_USER, &project.id, "A", &[("Standard", dec!(1))])
        .await;
    let b = setup
        .work_item(TEST_USER, &project.id, "B", &[("Standard", dec!(2))])
        .await;

    let app = TestApp::on_store(memory.clone(), Arc::new(RacingStore::new(memory, &a.id)));
    let invoice = app
        .engine
        .create_invoice(TEST_USER, request(&client, &project, &[&a, &b]))
        .await
        .expect("Invoice must survive a partial commit");

    // The invoice bills both items, but only `b` could still be claimed.
    assert_eq!(invoice.work_item_ids(), vec![a.id.clone(), b.id.clone()]);
    assert_eq!(app.invoice_count(), 1);

    let a_now = app.catalog.get_work_item(TEST_USER, &a.id).await.unwrap();
    assert_eq!(a_now.invoice_id.as_deref(), Some("concurrent-invoice"));
    let b_now = app.catalog.get_work_item(TEST_USER, &b.id).await.unwrap();
    assert_eq!(b_now.invoice_id.as_deref(), Some(invoice.id.as_str()));
}

#[tokio::test]
async fn work_item_without_entries_is_left_unbilled() {
    let app = TestApp::spawn();
    let (client, project) = app.billing_setup(TEST_USER).await;
    let empty = app.work_item(TEST_USER, &project.id, "Empty", &[]).await;
    let full = app
        .work_item(TEST_USER, &project.id, "Full", &[("Standard", dec!(1))])
        .await;

    let invoice = app
        .engine
        .create_invoice(TEST_USER, request(&client, &project, &[&empty, &full]))
        .await
        .unwrap();

    assert_eq!(invoice.work_item_ids(), vec![full.id.clone()]);
    assert!(!app
        .catalog
        .get_work_item(TEST_USER, &empty.id)
        .await
        .unwrap()
        .is_billed());
}

#[tokio::test]
async fn only_empty_work_items_is_not_an_invoice() {
    let app = TestApp::spawn();
    let (client, project) = app.billing_setup(TEST_USER).await;
    let empty = app.work_item(TEST_USER, &project.id, "Empty", &[]).await;

    let err = app
        .engine
        .create_invoice(TEST_USER, request(&client, &project, &[&empty]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        timebill_service::error::BillingError::NoBillableItems
    ));
    assert_eq!(app.counter_value(2024), None);
}
