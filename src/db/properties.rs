use crate::domain::PropertyFacts;
use crate::errors::{AvmError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub const PROPERTY_COLUMNS: &str = "p.id, p.address_line, p.city, p.postal_code, p.latitude, p.longitude, \
     p.beds, p.baths, p.sqft, p.lot_sqft, p.year_built, p.property_type";

/// Insert or refresh a property's facts. Later payloads win.
pub fn upsert_property(conn: &Connection, facts: &PropertyFacts) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO properties (
            id, address_line, city, postal_code, latitude, longitude,
            beds, baths, sqft, lot_sqft, year_built, property_type, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(id) DO UPDATE SET
            address_line  = excluded.address_line,
            city          = excluded.city,
            postal_code   = excluded.postal_code,
            latitude      = COALESCE(excluded.latitude, latitude),
            longitude     = COALESCE(excluded.longitude, longitude),
            beds          = COALESCE(excluded.beds, beds),
            baths         = COALESCE(excluded.baths, baths),
            sqft          = COALESCE(excluded.sqft, sqft),
            lot_sqft      = COALESCE(excluded.lot_sqft, lot_sqft),
            year_built    = COALESCE(excluded.year_built, year_built),
            property_type = COALESCE(excluded.property_type, property_type),
            updated_at    = excluded.updated_at
        "#,
        params![
            facts.id,
            facts.address_line,
            facts.city,
            facts.postal_code,
            facts.latitude,
            facts.longitude,
            facts.beds,
            facts.baths,
            facts.sqft,
            facts.lot_sqft,
            facts.year_built,
            facts.property_type,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| AvmError::DbError(e.to_string()))?;
    Ok(())
}

/// Map the leading `PROPERTY_COLUMNS` (or `SALE_FACT_COLUMNS`) of a row.
pub fn facts_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyFacts> {
    Ok(PropertyFacts {
        id: row.get(0)?,
        address_line: row.get(1)?,
        city: row.get(2)?,
        postal_code: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        beds: row.get(6)?,
        baths: row.get(7)?,
        sqft: row.get(8)?,
        lot_sqft: row.get(9)?,
        year_built: row.get(10)?,
        property_type: row.get(11)?,
    })
}

pub fn get_property(conn: &Connection, id: &str) -> Result<Option<PropertyFacts>> {
    conn.query_row(
        &format!("SELECT {PROPERTY_COLUMNS} FROM properties p WHERE p.id = ?1"),
        params![id],
        facts_from_row,
    )
    .optional()
    .map_err(|e| AvmError::DbError(e.to_string()))
}
