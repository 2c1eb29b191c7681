//! Integration tests for the checkout/return state machine.
//!
//! These tests require a running PostgreSQL database. Run with:
//! `cargo test --package tabletrack-core --features integration`

#![cfg(feature = "integration")]

use chrono::{Duration, Utc};

use tabletrack_core::{CheckoutRequest, ResourceLedger, ReturnRequest};
use tabletrack_db::models::{Checkout, CheckoutStatus, Table, TableStatus};

mod common;
use common::{create_test_organization, create_test_table, due_tomorrow, setup_test_db, unique_name};

fn checkout_request(
    table: &Table,
    organization: &tabletrack_db::models::Organization,
) -> CheckoutRequest {
    CheckoutRequest {
        table_id: table.id,
        organization_id: organization.id,
        expected_return_time: due_tomorrow(),
        notes: None,
        checked_out_by: Some("front desk".to_string()),
    }
}

#[tokio::test]
async fn test_checkout_then_return_round_trip() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    let checkout = ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect("checkout should succeed");
    assert_eq!(checkout.status, CheckoutStatus::Active);
    assert!(checkout.actual_return_time.is_none());

    let table_after = Table::find_by_id(&pool, table.id).await.unwrap().unwrap();
    assert_eq!(table_after.status, TableStatus::CheckedOut);

    let returned = ledger
        .return_checkout(checkout.id, ReturnRequest::default())
        .await
        .expect("return should succeed");
    assert_eq!(returned.status, CheckoutStatus::Returned);
    assert!(returned.actual_return_time.is_some());

    let table_restored = Table::find_by_id(&pool, table.id).await.unwrap().unwrap();
    assert_eq!(table_restored.status, TableStatus::Available);
}

#[tokio::test]
async fn test_checked_out_table_rejects_second_checkout() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let first_org = create_test_organization(&pool, &unique_name("First Club")).await;
    let second_org = create_test_organization(&pool, &unique_name("Second Club")).await;

    ledger
        .checkout(checkout_request(&table, &first_org))
        .await
        .expect("first checkout should succeed");

    let err = ledger
        .checkout(checkout_request(&table, &second_org))
        .await
        .expect_err("second checkout should fail");
    assert!(err.is_conflict(), "expected conflict, got: {err}");
}

#[tokio::test]
async fn test_organization_cannot_hold_two_tables() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let first_table = create_test_table(&pool).await;
    let second_table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    let first = ledger
        .checkout(checkout_request(&first_table, &org))
        .await
        .expect("first checkout should succeed");

    let err = ledger
        .checkout(checkout_request(&second_table, &org))
        .await
        .expect_err("second table for same organization should fail");
    assert!(err.is_conflict(), "expected conflict, got: {err}");
    assert!(
        err.to_string().contains(&first_table.table_number),
        "conflict should name the held table"
    );

    // After returning the first table, the same organization can check out
    // the second one.
    ledger
        .return_checkout(first.id, ReturnRequest::default())
        .await
        .expect("return should succeed");
    ledger
        .checkout(checkout_request(&second_table, &org))
        .await
        .expect("checkout after return should succeed");
}

#[tokio::test]
async fn test_expected_return_time_must_be_in_future() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    let mut request = checkout_request(&table, &org);
    request.expected_return_time = Utc::now() - Duration::hours(1);

    let err = ledger
        .checkout(request)
        .await
        .expect_err("past due time should fail");
    assert!(err.is_validation(), "expected validation error, got: {err}");
}

#[tokio::test]
async fn test_banned_organization_cannot_checkout() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());
    let directory = tabletrack_core::OrganizationDirectory::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Rowdy Club")).await;
    directory
        .ban(org.id, "Damaged equipment", false)
        .await
        .expect("ban should succeed");

    let err = ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect_err("banned organization must not check out");
    assert!(err.is_conflict(), "expected conflict, got: {err}");
    assert!(err.to_string().contains("banned"));
}

#[tokio::test]
async fn test_maintenance_table_is_not_eligible() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    ledger
        .set_maintenance(table.id)
        .await
        .expect("maintenance transition should succeed");

    let err = ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect_err("maintenance table must not be checked out");
    assert!(err.is_conflict(), "expected conflict, got: {err}");
    assert!(err.to_string().contains("maintenance"));

    // Back in service, checkout succeeds.
    ledger
        .set_available(table.id)
        .await
        .expect("available transition should succeed");
    ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect("checkout should succeed after maintenance ends");
}

#[tokio::test]
async fn test_maintenance_blocked_while_checked_out() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect("checkout should succeed");

    let err = ledger
        .set_maintenance(table.id)
        .await
        .expect_err("maintenance must be rejected while on loan");
    assert!(err.is_conflict(), "expected conflict, got: {err}");
}

#[tokio::test]
async fn test_double_return_is_rejected_and_idempotent() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    let checkout = ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect("checkout should succeed");

    let first = ledger
        .return_checkout(checkout.id, ReturnRequest::default())
        .await
        .expect("first return should succeed");

    let err = ledger
        .return_checkout(checkout.id, ReturnRequest::default())
        .await
        .expect_err("second return should fail");
    assert!(err.is_conflict(), "expected conflict, got: {err}");
    assert!(err.to_string().contains("already been returned"));

    // The first return's effect is unchanged.
    let row = Checkout::find_by_id(&pool, checkout.id).await.unwrap().unwrap();
    assert_eq!(row.actual_return_time, first.actual_return_time);
    assert_eq!(row.status, CheckoutStatus::Returned);
}

#[tokio::test]
async fn test_return_notes_are_appended_not_overwritten() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    let mut request = checkout_request(&table, &org);
    request.notes = Some("one leg wobbly".to_string());
    let checkout = ledger.checkout(request).await.expect("checkout");

    let returned = ledger
        .return_checkout(
            checkout.id,
            ReturnRequest {
                returned_by: Some("front desk".to_string()),
                notes: Some("returned clean".to_string()),
            },
        )
        .await
        .expect("return should succeed");

    let notes = returned.notes.expect("notes should be present");
    assert!(notes.contains("one leg wobbly"));
    assert!(notes.contains("[Return] returned clean"));
    assert_eq!(returned.returned_by.as_deref(), Some("front desk"));
}

#[tokio::test]
async fn test_return_unknown_checkout_is_not_found() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let err = ledger
        .return_checkout(uuid::Uuid::new_v4(), ReturnRequest::default())
        .await
        .expect_err("unknown checkout should fail");
    assert!(err.is_not_found(), "expected not found, got: {err}");
}

#[tokio::test]
async fn test_overdue_is_derived_not_persisted() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    // Shortest future due time we can honestly create.
    let mut request = checkout_request(&table, &org);
    request.expected_return_time = Utc::now() + Duration::milliseconds(300);
    let checkout = ledger.checkout(request).await.expect("checkout");

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    // Now past due: listed as overdue while status stays active.
    let overdue = ledger.overdue_checkouts().await.expect("overdue query");
    assert!(overdue.iter().any(|c| c.id == checkout.id));
    let row = Checkout::find_by_id(&pool, checkout.id).await.unwrap().unwrap();
    assert_eq!(row.status, CheckoutStatus::Active);
    assert!(row.is_overdue(Utc::now()));

    // A late return stays status=returned; lateness remains derivable.
    let returned = ledger
        .return_checkout(checkout.id, ReturnRequest::default())
        .await
        .expect("late return should succeed");
    assert_eq!(returned.status, CheckoutStatus::Returned);
    assert!(returned.is_overdue(Utc::now()));
}

#[tokio::test]
async fn test_stats_reflect_committed_state() {
    let pool = setup_test_db().await;
    let ledger = ResourceLedger::new(pool.clone());

    let table = create_test_table(&pool).await;
    let org = create_test_organization(&pool, &unique_name("Acme Club")).await;

    let before = ledger.stats().await.expect("stats");
    ledger
        .checkout(checkout_request(&table, &org))
        .await
        .expect("checkout");
    let after = ledger.stats().await.expect("stats");

    assert!(after.total_active >= before.total_active + 1);
    assert!(after.today_checkouts >= before.today_checkouts + 1);
    assert!(after.total_tables >= 1);
}
