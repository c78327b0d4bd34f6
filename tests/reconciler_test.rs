//! Reconciler integration against a real Postgres instance.
//!
//! Prerequisites:
//! - A reachable Postgres instance with the URL in `RECONCILER_TEST_DATABASE_URL`
//! - Run via: `RECONCILER_TEST_DATABASE_URL=postgres://... cargo test --test reconciler_test -- --ignored`
//!
//! These tests are `#[ignore]`d by default since CI does not provision a
//! database for this crate's test run.

use hsds_pipeline::config::ReconcilerConfig;
use hsds_pipeline::llm::{AlignedLocation, AlignedOrganization, AlignedRecord, AlignedService};
use hsds_pipeline::reconciler::Reconciler;

fn sample_record(name: &str) -> AlignedRecord {
    AlignedRecord {
        organization: AlignedOrganization {
            name: name.to_string(),
            description: Some("Weekly food distribution".into()),
            website: None,
            email: None,
        },
        location: Some(AlignedLocation {
            address_line_1: Some("500 Elm St".into()),
            city: Some("Topeka".into()),
            state: Some("KS".into()),
            postal_code: Some("66603".into()),
            latitude: Some(39.0473),
            longitude: Some(-95.6752),
        }),
        services: vec![],
        schedules: vec![],
    }
}

async fn connect() -> Reconciler {
    let database_url = std::env::var("RECONCILER_TEST_DATABASE_URL")
        .expect("RECONCILER_TEST_DATABASE_URL must be set for ignored reconciler tests");
    Reconciler::connect(&database_url, ReconcilerConfig::default())
        .await
        .expect("failed to connect and migrate")
}

#[tokio::test]
#[ignore]
async fn reconciling_the_same_organization_twice_reuses_the_canonical_id() {
    let reconciler = connect().await;
    let record = sample_record("Reconciler Test Pantry");

    let first = reconciler
        .reconcile(record.clone(), "scraper-test", None)
        .await
        .expect("first reconcile should succeed");
    let second = reconciler
        .reconcile(record, "scraper-test", None)
        .await
        .expect("second reconcile should succeed");

    assert_eq!(first.organization_id, second.organization_id);
}

#[tokio::test]
#[ignore]
async fn empty_organization_name_is_rejected_without_hitting_the_database() {
    let reconciler = connect().await;
    let mut record = sample_record("");
    record.organization.name = "   ".into();

    let result = reconciler.reconcile(record, "scraper-test", None).await;
    assert!(result.is_err());
}

#[tokio::test]
#[ignore]
async fn service_with_a_location_is_linked_via_service_at_location() {
    let reconciler = connect().await;
    let mut record = sample_record("Service At Location Test Pantry");
    record.services.push(AlignedService {
        name: "Weekly food box".into(),
        description: None,
        status: Some("active".into()),
    });

    let ids = reconciler
        .reconcile(record, "scraper-test", None)
        .await
        .expect("reconcile should succeed");

    assert_eq!(ids.location_ids.len(), 1);
    assert_eq!(ids.service_ids.len(), 1);
}
