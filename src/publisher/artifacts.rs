use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::Connection;
use serde_json::json;

use super::error::Result;
use super::snapshot::Snapshot;

/// One line of JSON per entity, per file (`organizations.jsonl`,
/// `locations.jsonl`, `services.jsonl`).
pub fn write_jsonl(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    write_lines(dir, "organizations.jsonl", &snapshot.organizations)?;
    write_lines(dir, "locations.jsonl", &snapshot.locations)?;
    write_lines(dir, "services.jsonl", &snapshot.services)?;
    write_lines(dir, "service_at_locations.jsonl", &snapshot.service_at_locations)?;
    Ok(())
}

fn write_lines<T: serde::Serialize>(dir: &Path, filename: &str, rows: &[T]) -> Result<()> {
    let file = File::create(dir.join(filename))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Manual `FeatureCollection` builder for locations with valid
/// coordinates — a handful of fields don't justify a full geojson crate
/// dependency.
pub fn write_geojson(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let features: Vec<_> = snapshot
        .locations
        .iter()
        .filter_map(|loc| {
            let (lat, lng) = (loc.latitude?, loc.longitude?);
            Some(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [lng, lat] },
                "properties": {
                    "id": loc.id,
                    "organization_id": loc.organization_id,
                    "address_line_1": loc.address_line_1,
                    "city": loc.city,
                    "state": loc.state,
                    "postal_code": loc.postal_code,
                }
            }))
        })
        .collect();

    let collection = json!({ "type": "FeatureCollection", "features": features });
    let file = File::create(dir.join("locations.geojson"))?;
    serde_json::to_writer_pretty(file, &collection)?;
    Ok(())
}

/// Full relational projection as a single disposable SQLite file, separate
/// from the canonical Postgres store ("single SQLite file
/// containing the full relational projection").
pub fn write_sqlite(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let path = dir.join("snapshot.sqlite");
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    let conn = Connection::open(&path)?;

    conn.execute_batch(
        "CREATE TABLE organizations (id TEXT PRIMARY KEY, name TEXT, description TEXT, website TEXT, email TEXT);
         CREATE TABLE locations (id TEXT PRIMARY KEY, organization_id TEXT, address_line_1 TEXT, city TEXT, state TEXT, postal_code TEXT, latitude REAL, longitude REAL);
         CREATE TABLE services (id TEXT PRIMARY KEY, organization_id TEXT, name TEXT, description TEXT, status TEXT);
         CREATE TABLE service_at_locations (id TEXT PRIMARY KEY, service_id TEXT, location_id TEXT);",
    )?;

    for org in &snapshot.organizations {
        conn.execute(
            "INSERT INTO organizations (id, name, description, website, email) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![org.id.to_string(), org.name, org.description, org.website, org.email],
        )?;
    }
    for loc in &snapshot.locations {
        conn.execute(
            "INSERT INTO locations (id, organization_id, address_line_1, city, state, postal_code, latitude, longitude) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                loc.id.to_string(),
                loc.organization_id.to_string(),
                loc.address_line_1,
                loc.city,
                loc.state,
                loc.postal_code,
                loc.latitude,
                loc.longitude,
            ],
        )?;
    }
    for svc in &snapshot.services {
        conn.execute(
            "INSERT INTO services (id, organization_id, name, description, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![svc.id.to_string(), svc.organization_id.to_string(), svc.name, svc.description, svc.status],
        )?;
    }
    for sal in &snapshot.service_at_locations {
        conn.execute(
            "INSERT INTO service_at_locations (id, service_id, location_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![sal.id.to_string(), sal.service_id.to_string(), sal.location_id.to_string()],
        )?;
    }

    Ok(())
}
