//! Exercises the in-process seam of the pipeline: a scraper submits raw
//! bytes, the content store dedups them, a queue carries the job, a mock
//! LLM aligns it, and the validator scores the result.
//!
//! Reconciliation against Postgres is covered separately in
//! `reconciler_test.rs`, which needs a real database and is `#[ignore]`d
//! by default.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hsds_pipeline::content_store::{ContentStore, SourceMetadata};
use hsds_pipeline::geocoder::{GeocodeCache, Geocoder, GeocoderError, GeocodeResult, GeocoderProvider};
use hsds_pipeline::llm::{AlignedLocation, AlignedOrganization, AlignedRecord, LlmJob, LlmProvider, MockProvider};
use hsds_pipeline::queue::{QueueBroker, QueueName};
use hsds_pipeline::validator::{ValidatedRecord, Validator};
use tempfile::TempDir;

/// Reverse-geocodes every coordinate to a fixed, different state than the
/// incoming record claims, to exercise the address/coordinate state
/// cross-check without a network call.
struct DisagreeingStateProvider;

#[async_trait]
impl GeocoderProvider for DisagreeingStateProvider {
    fn name(&self) -> &'static str {
        "disagreeing-state"
    }

    async fn geocode(&self, _address: &str) -> Result<GeocodeResult, GeocoderError> {
        Err(GeocoderError::NotGeocodable)
    }

    async fn reverse(&self, _lat: f64, _lng: f64) -> Result<String, GeocoderError> {
        Ok("500 Elm St, Topeka, NE, 68001".to_string())
    }
}

fn geocoder_with_disagreeing_state() -> Arc<Geocoder> {
    let dir = TempDir::new().unwrap();
    let keyspace = fjall::Config::new(dir.path()).open().unwrap();
    let partition = keyspace
        .open_partition("geocode", fjall::PartitionCreateOptions::default())
        .unwrap();
    let cache = GeocodeCache::new(partition, Duration::from_secs(3600));
    let breaker_partition = keyspace
        .open_partition("circuit_breaker", fjall::PartitionCreateOptions::default())
        .unwrap();
    let provider: Arc<dyn GeocoderProvider> = Arc::new(DisagreeingStateProvider);
    Arc::new(Geocoder::new(vec![provider], cache, breaker_partition, 5, Duration::from_secs(60)))
}

fn sample_record() -> AlignedRecord {
    AlignedRecord {
        organization: AlignedOrganization {
            name: "Example Food Pantry".into(),
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

fn empty_geocoder() -> Arc<Geocoder> {
    let dir = TempDir::new().unwrap();
    let keyspace = fjall::Config::new(dir.path()).open().unwrap();
    let partition = keyspace
        .open_partition("geocode", fjall::PartitionCreateOptions::default())
        .unwrap();
    let cache = GeocodeCache::new(partition, Duration::from_secs(3600));
    let breaker_partition = keyspace
        .open_partition("circuit_breaker", fjall::PartitionCreateOptions::default())
        .unwrap();
    Arc::new(Geocoder::new(vec![], cache, breaker_partition, 5, Duration::from_secs(60)))
}

#[tokio::test]
async fn submit_dedups_identical_payloads() {
    let dir = TempDir::new().unwrap();
    let store = ContentStore::open(dir.path().join("content")).unwrap();

    let source = SourceMetadata {
        scraper_id: "scraper-a".into(),
        source_url: "https://example.org/pantries".into(),
        scraped_at: chrono::Utc::now(),
    };

    let first = store.submit(b"raw payload bytes", source.clone()).await.unwrap();
    assert!(first.was_new);

    let second = store.submit(b"raw payload bytes", source).await.unwrap();
    assert!(!second.was_new);
    assert_eq!(first.job_id, second.job_id);
}

#[tokio::test]
async fn scrape_intake_job_round_trips_through_the_queue() {
    let dir = TempDir::new().unwrap();
    let broker = QueueBroker::open(dir.path().join("queues"), 5).unwrap();

    let job_id = broker
        .enqueue(QueueName::ScrapeIntake, &serde_json::json!({"hash_hex": "abc123"}))
        .await
        .unwrap();

    let handle = broker
        .dequeue(QueueName::ScrapeIntake, Duration::from_secs(30))
        .await
        .unwrap()
        .expect("job should be immediately available");
    assert_eq!(handle.job_id, job_id);
    assert_eq!(handle.payload["hash_hex"], "abc123");

    broker.ack(QueueName::ScrapeIntake, handle.job_id).await.unwrap();
    assert_eq!(broker.depth(QueueName::ScrapeIntake).unwrap(), 0);
}

#[tokio::test]
async fn mock_llm_alignment_feeds_a_valid_record_into_the_validator() {
    let provider = MockProvider::always_returning(sample_record());
    let job = LlmJob {
        job_id: uuid::Uuid::now_v7(),
        raw_bytes: b"<html>a pantry listing</html>".to_vec(),
        source_hint: Some("scraper-a".into()),
    };

    let aligned = provider.align(&job).await.unwrap();

    let validator = Validator::new(empty_geocoder(), 10);
    match validator.validate(aligned).await {
        ValidatedRecord::Accepted { score, .. } => assert_eq!(score, 100),
        ValidatedRecord::Rejected(rejection) => panic!("expected acceptance, got {rejection:?}"),
    }
}

#[tokio::test]
async fn missing_city_and_postal_code_deduct_independently() {
    let mut record = sample_record();
    if let Some(location) = record.location.as_mut() {
        location.city = None;
        location.postal_code = None;
    }

    let validator = Validator::new(empty_geocoder(), 10);
    match validator.validate(record).await {
        ValidatedRecord::Accepted { score, .. } => assert_eq!(score, 85),
        ValidatedRecord::Rejected(rejection) => panic!("expected acceptance, got {rejection:?}"),
    }
}

#[tokio::test]
async fn placeholder_address_is_rejected() {
    let mut record = sample_record();
    if let Some(location) = record.location.as_mut() {
        location.address_line_1 = Some("123 Main St".into());
    }
    record.organization.name = "Test Pantry - Do Not Use".into();

    let validator = Validator::new(empty_geocoder(), 10);
    match validator.validate(record).await {
        ValidatedRecord::Accepted { score, .. } => panic!("expected rejection, got score {score}"),
        ValidatedRecord::Rejected(rejection) => assert!(rejection.is_test_data),
    }
}

#[tokio::test]
async fn address_state_disagreeing_with_coordinate_lookup_deducts_and_corrects() {
    let mut record = sample_record();
    // No postal code, so the cheap ZIP cross-check can't resolve and the
    // validator falls back to the geocoder's reverse lookup below.
    record.location.as_mut().unwrap().postal_code = None;

    let validator = Validator::new(geocoder_with_disagreeing_state(), 10);
    match validator.validate(record).await {
        ValidatedRecord::Accepted { score, record } => {
            assert_eq!(score, 75);
            assert_eq!(record.location.unwrap().state.as_deref(), Some("NE"));
        }
        ValidatedRecord::Rejected(rejection) => panic!("expected acceptance, got {rejection:?}"),
    }
}

#[tokio::test]
async fn legacy_forgiving_state_check_skips_the_cross_check() {
    let record = sample_record();

    let validator =
        Validator::new(geocoder_with_disagreeing_state(), 10).with_legacy_forgiving_state_check(true);
    match validator.validate(record).await {
        ValidatedRecord::Accepted { score, record } => {
            assert_eq!(score, 100);
            assert_eq!(record.location.unwrap().state.as_deref(), Some("KS"));
        }
        ValidatedRecord::Rejected(rejection) => panic!("expected acceptance, got {rejection:?}"),
    }
}
