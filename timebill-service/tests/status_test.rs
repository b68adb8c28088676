mod common;

use chrono::NaiveDate;
use common::{request, TestApp, OTHER_USER, TEST_USER};
use rust_decimal_macros::dec;
use timebill_service::error::BillingError;
use timebill_service::models::{Invoice, InvoiceStatus};
use timebill_service::services::{Filter, FindOptions};

async fn invoice(app: &TestApp) -> Invoice {
    let (client, project) = app.billing_setup(TEST_USER).await;
    let item = app
        .work_item(TEST_USER, &project.id, "A", &[("Standard", dec!(4))])
        .await;
    app.engine
        .create_invoice(TEST_USER, request(&client, &project, &[&item]))
        .await
        .unwrap()
}

#[tokio::test]
async fn mark_paid_records_payment_date() {
    let app = TestApp::spawn();
    let created = invoice(&app).await;
    let paid_on = NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();

    let paid = app
        .engine
        .mark_paid(TEST_USER, &created.id, paid_on)
        .await
        .unwrap();

    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.payment_date, Some(paid_on));
    assert_eq!(paid.total_amount, created.total_amount);
    assert_eq!(paid.invoice_number, created.invoice_number);
}

#[tokio::test]
async fn sent_then_paid_is_allowed() {
    let app = TestApp::spawn();
    let created = invoice(&app).await;

    let sent = app
        .engine
        .update_status(TEST_USER, &created.id, InvoiceStatus::Sent)
        .await
        .unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);

    let paid = app
        .engine
        .mark_paid(TEST_USER, &created.id, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn terminal_statuses_reject_transitions() {
    let app = TestApp::spawn();
    let created = invoice(&app).await;

    app.engine
        .update_status(TEST_USER, &created.id, InvoiceStatus::Void)
        .await
        .unwrap();

    for target in [InvoiceStatus::Sent, InvoiceStatus::Paid, InvoiceStatus::Draft] {
        let err = app
            .engine
            .update_status(TEST_USER, &created.id, target)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)), "{target}");
    }

    let still_void = app.engine.get_invoice(TEST_USER, &created.id).await.unwrap();
    assert_eq!(still_void.status, InvoiceStatus::Void);
    assert_eq!(still_void.payment_date, None);
}

#[tokio::test]
async fn status_change_by_other_user_is_not_found() {
    let app = TestApp::spawn();
    let created = invoice(&app).await;

    let err = app
        .engine
        .mark_paid(OTHER_USER, &created.id, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::NotFound { .. }));

    let unchanged = app.engine.get_invoice(TEST_USER, &created.id).await.unwrap();
    assert_eq!(unchanged.status, InvoiceStatus::Processed);
}

#[tokio::test]
async fn transitions_are_audited() {
    let app = TestApp::spawn();
    let created = invoice(&app).await;
    app.engine
        .update_status(TEST_USER, &created.id, InvoiceStatus::Sent)
        .await
        .unwrap();

    let events = app
        .store
        .find_many(
            "events",
            &Filter::eq("related_entity_id", created.id.as_str()),
            &FindOptions::default(),
        )
        .await
        .unwrap();
    let types: Vec<String> = events
        .iter()
        .filter_map(|e| e.get_str("event_type").ok().map(str::to_string))
        .collect();
    assert!(types.contains(&"invoice.created".to_string()));
    assert!(types.contains(&"invoice.status.updated".to_string()));
}
