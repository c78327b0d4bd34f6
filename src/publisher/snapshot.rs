use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub address_line_1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceAtLocationRow {
    pub id: Uuid,
    pub service_id: Uuid,
    pub location_id: Uuid,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RowCounts {
    pub organizations: i64,
    pub locations: i64,
    pub services: i64,
    pub service_at_locations: i64,
}

pub struct Snapshot {
    pub organizations: Vec<OrganizationRow>,
    pub locations: Vec<LocationRow>,
    pub services: Vec<ServiceRow>,
    pub service_at_locations: Vec<ServiceAtLocationRow>,
}

impl Snapshot {
    pub fn row_counts(&self) -> RowCounts {
        RowCounts {
            organizations: self.organizations.len() as i64,
            locations: self.locations.len() as i64,
            services: self.services.len() as i64,
            service_at_locations: self.service_at_locations.len() as i64,
        }
    }
}

impl RowCounts {
    /// Total row count across all exported entities, the quantity the
    /// ratchet guard is actually meant to protect.
    pub fn total(&self) -> i64 {
        self.organizations + self.locations + self.services + self.service_at_locations
    }
}

/// Reads a consistent snapshot via a single `REPEATABLE READ` transaction.
pub async fn read_snapshot(pool: &PgPool) -> Result<Snapshot> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *tx)
        .await?;

    let organizations = sqlx::query("SELECT id, name, description, website, email FROM organizations ORDER BY id")
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| OrganizationRow {
            id: row.get("id"),
            name: row.get("name"),
            description: row.try_get("description").ok(),
            website: row.try_get("website").ok(),
            email: row.try_get("email").ok(),
        })
        .collect();

    let locations = sqlx::query(
        "SELECT id, organization_id, address_line_1, city, state, postal_code, latitude, longitude FROM locations ORDER BY id",
    )
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| LocationRow {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        address_line_1: row.try_get("address_line_1").ok(),
        city: row.try_get("city").ok(),
        state: row.try_get("state").ok(),
        postal_code: row.try_get("postal_code").ok(),
        latitude: row.try_get("latitude").ok(),
        longitude: row.try_get("longitude").ok(),
    })
    .collect();

    let services = sqlx::query("SELECT id, organization_id, name, description, status FROM services ORDER BY id")
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| ServiceRow {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            description: row.try_get("description").ok(),
            status: row.try_get("status").ok(),
        })
        .collect();

    let service_at_locations = sqlx::query("SELECT id, service_id, location_id FROM service_at_locations ORDER BY id")
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| ServiceAtLocationRow {
            id: row.get("id"),
            service_id: row.get("service_id"),
            location_id: row.get("location_id"),
        })
        .collect();

    tx.commit().await?;

    Ok(Snapshot {
        organizations,
        locations,
        services,
        service_at_locations,
    })
}
