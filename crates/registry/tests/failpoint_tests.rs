#![cfg(feature = "failpoints")]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Registry behavior under injected backend failures.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p ticketry-registry --features failpoints --test failpoint_tests
//! ```

use chrono::Utc;
use ticketry_registry::{
    Expiration, ServiceTicket, TicketError, TicketGrantingTicket,
    testutil::{app, authentication, proxy_app, registry, tgt},
};
use ticketry_storage::{StorageBackend, StorageError, assert_connection_error};

#[tokio::test]
async fn add_failure_surfaces_as_connection_error() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("memory-add", "return").expect("failed to configure fail point");

    let registry = registry();
    let session = tgt("TGT-1", Utc::now());
    let result = registry.add_ticket(&session).await;

    assert_connection_error!(result);
    assert!(registry.backend().is_empty());

    scenario.teardown();
}

#[tokio::test]
async fn read_failure_is_not_reported_as_absent() {
    let scenario = fail::FailScenario::setup();

    let registry = registry();
    let session = tgt("TGT-1", Utc::now());
    registry.add_ticket(&session).await.unwrap();

    fail::cfg("memory-get", "return").expect("failed to configure fail point");
    let result = registry.get_ticket::<TicketGrantingTicket>(session.id()).await;
    fail::remove("memory-get");

    assert_connection_error!(result);
    assert!(registry.get_ticket::<TicketGrantingTicket>(session.id()).await.unwrap().is_some());

    scenario.teardown();
}

#[tokio::test]
async fn interrupted_cascade_keeps_what_it_removed() {
    let scenario = fail::FailScenario::setup();

    let registry = registry();
    let now = Utc::now();
    let mut session = tgt("TGT-1", now);
    let st1 = session
        .grant_service_ticket("ST-1".into(), app(), Expiration::NeverExpires, false, false, now)
        .unwrap();
    let st2 = session
        .grant_service_ticket("ST-2".into(), app(), Expiration::NeverExpires, false, false, now)
        .unwrap();
    registry.add_ticket(&session).await.unwrap();
    registry.add_ticket(&st1).await.unwrap();
    registry.add_ticket(&st2).await.unwrap();

    // First delete succeeds, every later one fails.
    fail::cfg("memory-delete", "1*off->return").expect("failed to configure fail point");
    let result = registry.delete_ticket(session.id()).await;
    fail::remove("memory-delete");

    assert_connection_error!(result);
    assert!(registry.backend().contains_raw(b"TGT-1"), "parent goes last");
    assert_eq!(registry.backend().len(), 2, "one child was removed before the failure");

    assert_eq!(registry.delete_ticket(session.id()).await.unwrap(), 2);
    assert!(registry.backend().is_empty());

    scenario.teardown();
}

#[tokio::test]
async fn failed_parent_update_after_grant_propagates() {
    let scenario = fail::FailScenario::setup();

    let registry = registry();
    let session = tgt("TGT-1", Utc::now());
    registry.add_ticket(&session).await.unwrap();

    fail::cfg("memory-replace", "return").expect("failed to configure fail point");
    let result = registry
        .grant_service_ticket(
            session.id(),
            "ST-1".into(),
            app(),
            Expiration::NeverExpires,
            false,
            false,
        )
        .await;
    fail::remove("memory-replace");

    match result {
        Err(TicketError::Storage(StorageError::Connection { .. })) => {},
        other => panic!("expected a storage error, got {other:?}"),
    }
    // The child was written, but the parent never learned about it.
    assert!(registry.backend().contains_raw(b"ST-1"));
    let stored =
        registry.get_ticket::<TicketGrantingTicket>(session.id()).await.unwrap().unwrap();
    assert!(stored.services().is_empty());

    scenario.teardown();
}

#[tokio::test]
async fn failed_pgt_write_leaves_service_ticket_unspent() {
    let scenario = fail::FailScenario::setup();

    let registry = registry();
    let session = tgt("TGT-1", Utc::now());
    registry.add_ticket(&session).await.unwrap();
    let st = registry
        .grant_service_ticket(
            session.id(),
            "ST-1".into(),
            proxy_app(),
            Expiration::NeverExpires,
            false,
            true,
        )
        .await
        .unwrap();

    fail::cfg("memory-add", "return").expect("failed to configure fail point");
    let result = registry
        .grant_proxy_granting_ticket(
            st.id(),
            "PGT-1".into(),
            authentication("casuser"),
            Expiration::NeverExpires,
        )
        .await;
    fail::remove("memory-add");

    assert!(matches!(result, Err(TicketError::Storage(_))), "got {result:?}");
    assert!(!registry.backend().contains_raw(b"PGT-1"));

    let stored = registry.get_ticket::<ServiceTicket>(st.id()).await.unwrap().unwrap();
    assert!(!stored.granted_proxy_granting_ticket());
    assert!(
        registry
            .grant_proxy_granting_ticket(
                st.id(),
                "PGT-1".into(),
                authentication("casuser"),
                Expiration::NeverExpires,
            )
            .await
            .is_ok(),
        "the grant can be retried once the backend recovers"
    );

    scenario.teardown();
}

#[tokio::test]
async fn health_check_reports_backend_failure() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("health-check", "return").expect("failed to configure fail point");

    let registry = registry();
    assert!(registry.health_check().await.is_err());
    fail::remove("health-check");
    assert!(registry.health_check().await.is_ok());

    scenario.teardown();
}
