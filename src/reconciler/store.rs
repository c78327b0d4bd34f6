use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReconcilerConfig as ReconcilerSettings;
use crate::llm::AlignedRecord;
use crate::retry::{retry_with_backoff, RetryPolicy};

use super::error::{ReconcilerError, Result};
use super::lock::hashed_lock_key;
use super::matchers::{match_location, match_organization, match_service, normalize_name};
use super::merge::{merge_field, MergeOutcome};
use super::migrations;
use super::model::{CanonicalIds, EntityKind, FieldSource};

/// Per-(record, scraper) integration into the canonical store: a
/// connect-and-migrate-on-startup pool wrapping a match/lock/merge/upsert
/// cycle.
pub struct Reconciler {
    pool: PgPool,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub async fn connect(database_url: &str, settings: ReconcilerSettings) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::query(migrations()).execute(&pool).await?;
        Ok(Self { pool, settings })
    }

    pub fn with_pool(pool: PgPool, settings: ReconcilerSettings) -> Self {
        Self { pool, settings }
    }

    /// Integrates one aligned record, returning the stable canonical ids.
    /// Transient constraint violations are
    /// retried with the shared backoff combinator; malformed payloads and
    /// post-retry integrity violations are surfaced to the caller, which
    /// dead-letters the job.
    pub async fn reconcile(&self, record: AlignedRecord, scraper_id: &str, source_org_id: Option<&str>) -> Result<CanonicalIds> {
        if record.organization.name.trim().is_empty() {
            return Err(ReconcilerError::MalformedPayload("organization.name is empty".into()));
        }

        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: std::time::Duration::from_secs(5),
        };

        retry_with_backoff(
            policy,
            || self.reconcile_once(&record, scraper_id, source_org_id),
            |err| matches!(err, ReconcilerError::Database(_)),
        )
        .await
    }

    async fn reconcile_once(&self, record: &AlignedRecord, scraper_id: &str, source_org_id: Option<&str>) -> Result<CanonicalIds> {
        let mut tx = self.pool.begin().await?;

        let org_match_key = normalize_name(&record.organization.name);
        let lock_key = hashed_lock_key(EntityKind::Organization, &org_match_key);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut *tx)
            .await?;

        let existing_org = sqlx::query("SELECT id, name, description, website, email FROM organizations WHERE name_normalized = $1")
            .bind(&org_match_key)
            .fetch_optional(&mut *tx)
            .await?;

        let organization_id = match existing_org {
            Some(row) => {
                let id: Uuid = row.get("id");
                self.merge_organization_fields(&mut tx, id, record, scraper_id).await?;
                id
            }
            None => {
                match self
                    .find_similar_organization(&mut tx, &record.organization.name, scraper_id, source_org_id)
                    .await?
                {
                    Some(id) => {
                        self.merge_organization_fields(&mut tx, id, record, scraper_id).await?;
                        id
                    }
                    None => self.insert_organization(&mut tx, record, scraper_id, source_org_id).await?,
                }
            }
        };

        let mut location_ids = Vec::new();
        if let Some(location) = &record.location {
            if let (Some(lat), Some(lng)) = (location.latitude, location.longitude) {
                let address = location.address_line_1.clone().unwrap_or_default();
                let loc_match_key = format!("{organization_id}:{address}");
                let lock_key = hashed_lock_key(EntityKind::Location, &loc_match_key);
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(lock_key)
                    .execute(&mut *tx)
                    .await?;

                let candidates = sqlx::query(
                    "SELECT id, address_line_1, latitude, longitude FROM locations WHERE organization_id = $1 AND latitude IS NOT NULL AND longitude IS NOT NULL",
                )
                .bind(organization_id)
                .fetch_all(&mut *tx)
                .await?;

                let mut matched_id = None;
                for row in &candidates {
                    let existing_lat: f64 = row.get("latitude");
                    let existing_lng: f64 = row.get("longitude");
                    let existing_addr: String = row.try_get("address_line_1").unwrap_or_default();
                    if match_location(
                        (lat, lng, &address),
                        (existing_lat, existing_lng, &existing_addr),
                        self.settings.location_epsilon_m,
                        self.settings.name_similarity,
                    ) {
                        matched_id = Some(row.get::<Uuid, _>("id"));
                        break;
                    }
                }

                let location_id = match matched_id {
                    Some(id) => id,
                    None => {
                        self.insert_location(&mut tx, organization_id, location).await?
                    }
                };
                location_ids.push(location_id);
            }
        }

        let mut service_ids = Vec::new();
        for service in &record.services {
            let name_normalized = normalize_name(&service.name);
            let lock_key = hashed_lock_key(EntityKind::Service, &format!("{organization_id}:{name_normalized}"));
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(lock_key)
                .execute(&mut *tx)
                .await?;

            let existing = sqlx::query("SELECT id FROM services WHERE organization_id = $1 AND name_normalized = $2")
                .bind(organization_id)
                .bind(&name_normalized)
                .fetch_optional(&mut *tx)
                .await?;

            let service_id = match existing {
                Some(row) => row.get("id"),
                None => {
                    let id = Uuid::now_v7();
                    sqlx::query(
                        "INSERT INTO services (id, organization_id, name, name_normalized, description, status) VALUES ($1, $2, $3, $4, $5, $6)",
                    )
                    .bind(id)
                    .bind(organization_id)
                    .bind(&service.name)
                    .bind(&name_normalized)
                    .bind(&service.description)
                    .bind(&service.status)
                    .execute(&mut *tx)
                    .await?;
                    id
                }
            };
            service_ids.push(service_id);

            for location_id in &location_ids {
                self.link_service_at_location(&mut tx, service_id, *location_id).await?;
            }
        }

        tx.commit().await?;
        debug!(%organization_id, locations = location_ids.len(), services = service_ids.len(), "record reconciled");

        Ok(CanonicalIds {
            organization_id,
            location_ids,
            service_ids,
        })
    }

    /// Fallback when no exact normalised-name match exists: a name
    /// similar enough to an organization this same scraper has previously
    /// reported under the same `source_org_id` counts as the same entity
    /// (name-similarity above threshold combined with an existing
    /// SourceRecord).
    async fn find_similar_organization(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        candidate_name: &str,
        scraper_id: &str,
        source_org_id: Option<&str>,
    ) -> Result<Option<Uuid>> {
        let Some(source_org_id) = source_org_id else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT DISTINCT o.id, o.name FROM organizations o JOIN source_records sr ON sr.entity_id = o.id AND sr.entity_kind = 'organization' WHERE sr.scraper_id = $1 AND sr.source_org_id = $2",
        )
        .bind(scraper_id)
        .bind(source_org_id)
        .fetch_all(&mut **tx)
        .await?;

        for row in rows {
            let existing_name: String = row.get("name");
            if match_organization(candidate_name, &existing_name, self.settings.name_similarity) {
                return Ok(Some(row.get("id")));
            }
        }
        Ok(None)
    }

    async fn insert_organization(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        record: &AlignedRecord,
        scraper_id: &str,
        source_org_id: Option<&str>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let name_normalized = normalize_name(&record.organization.name);
        sqlx::query(
            "INSERT INTO organizations (id, name, name_normalized, description, website, email) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&record.organization.name)
        .bind(&name_normalized)
        .bind(&record.organization.description)
        .bind(&record.organization.website)
        .bind(&record.organization.email)
        .execute(&mut **tx)
        .await?;

        self.record_source(tx, EntityKind::Organization, id, "name", Some(&record.organization.name), scraper_id, source_org_id)
            .await?;

        info!(%id, name = %record.organization.name, "created new organization");
        Ok(id)
    }

    async fn insert_location(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        organization_id: Uuid,
        location: &crate::llm::AlignedLocation,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO locations (id, organization_id, address_line_1, city, state, postal_code, latitude, longitude) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(organization_id)
        .bind(&location.address_line_1)
        .bind(&location.city)
        .bind(&location.state)
        .bind(&location.postal_code)
        .bind(location.latitude)
        .bind(location.longitude)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Applies the per-field merge strategy to the organization's mutable
    /// fields and records a version entry for any field that changed.
    async fn merge_organization_fields(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        organization_id: Uuid,
        record: &AlignedRecord,
        scraper_id: &str,
    ) -> Result<()> {
        let fields: [(&str, Option<&str>); 3] = [
            ("description", record.organization.description.as_deref()),
            ("website", record.organization.website.as_deref()),
            ("email", record.organization.email.as_deref()),
        ];

        for (field_name, incoming_value) in fields {
            let existing_rows = sqlx::query(
                "SELECT scraper_id, field_value, recorded_at FROM source_records WHERE entity_kind = 'organization' AND entity_id = $1 AND field_name = $2",
            )
            .bind(organization_id)
            .bind(field_name)
            .fetch_all(&mut **tx)
            .await?;

            let others: Vec<FieldSource> = existing_rows
                .iter()
                .map(|row| FieldSource {
                    scraper_id: row.get("scraper_id"),
                    value: row.try_get("field_value").ok(),
                    recorded_at: row.get("recorded_at"),
                })
                .collect();

            let canonical_row = sqlx::query(&format!("SELECT {field_name} FROM organizations WHERE id = $1"))
                .bind(organization_id)
                .fetch_one(&mut **tx)
                .await?;
            let canonical_value: Option<String> = canonical_row.try_get(field_name).ok();

            let incoming = FieldSource {
                scraper_id: scraper_id.to_string(),
                value: incoming_value.map(str::to_string),
                recorded_at: Utc::now(),
            };

            let outcome: MergeOutcome = merge_field(
                canonical_value.as_deref(),
                &incoming,
                &others,
                &self.settings.source_priority,
            );

            self.record_source(tx, EntityKind::Organization, organization_id, field_name, incoming_value, scraper_id, None)
                .await?;

            if outcome.changed {
                sqlx::query(&format!("UPDATE organizations SET {field_name} = $1, updated_at = NOW() WHERE id = $2"))
                    .bind(&outcome.value)
                    .bind(organization_id)
                    .execute(&mut **tx)
                    .await?;

                sqlx::query(
                    "INSERT INTO version_entries (entity_kind, entity_id, field_name, old_value, new_value) VALUES ('organization', $1, $2, $3, $4)",
                )
                .bind(organization_id)
                .bind(field_name)
                .bind(&canonical_value)
                .bind(&outcome.value)
                .execute(&mut **tx)
                .await?;

                warn!(%organization_id, field_name, "field updated by merge strategy");
            }
        }

        Ok(())
    }

    /// Links a service to the location it's offered at (HSDS
    /// `service_at_location`). Idempotent on the `(service_id,
    /// location_id)` unique index so reconciling the same record twice
    /// inserts the join row at most once.
    async fn link_service_at_location(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        service_id: Uuid,
        location_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO service_at_locations (id, service_id, location_id) VALUES ($1, $2, $3) ON CONFLICT (service_id, location_id) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(service_id)
        .bind(location_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn record_source(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        kind: EntityKind,
        entity_id: Uuid,
        field_name: &str,
        value: Option<&str>,
        scraper_id: &str,
        source_org_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO source_records (entity_kind, entity_id, field_name, field_value, scraper_id, source_org_id) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(field_name)
        .bind(value)
        .bind(scraper_id)
        .bind(source_org_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
