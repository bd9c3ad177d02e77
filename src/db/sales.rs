use crate::db::connection::Database;
use crate::db::properties::{facts_from_row, upsert_property};
use crate::domain::SaleRecord;
use crate::errors::{AvmError, Result};
use chrono::NaiveDate;
use rusqlite::params;
use tracing::debug;

/// The facts snapshot stored with each sale, in `facts_from_row` order.
const SALE_FACT_COLUMNS: &str = "s.property_id, s.address_line, s.city, s.postal_code, s.latitude, \
     s.longitude, s.beds, s.baths, s.sqft, s.lot_sqft, s.year_built, s.property_type";

/// Save sales and their properties in one transaction.
///
/// Each sale keeps the facts it was reported with; `properties` only holds
/// the latest known facts. A sale already stored for the same property and
/// date is updated in place.
pub fn save_sales(db: &Database, sales: &[SaleRecord]) -> Result<usize> {
    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        for sale in sales {
            upsert_property(&tx, &sale.facts)?;
            tx.execute(
                r#"
                INSERT INTO sales (
                    property_id, sale_date, sale_price, list_price, list_date,
                    address_line, city, postal_code, latitude, longitude,
                    beds, baths, sqft, lot_sqft, year_built, property_type
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT(property_id, sale_date) DO UPDATE SET
                    sale_price    = excluded.sale_price,
                    list_price    = COALESCE(excluded.list_price, list_price),
                    list_date     = COALESCE(excluded.list_date, list_date),
                    address_line  = excluded.address_line,
                    city          = excluded.city,
                    postal_code   = excluded.postal_code,
                    latitude      = excluded.latitude,
                    longitude     = excluded.longitude,
                    beds          = excluded.beds,
                    baths         = excluded.baths,
                    sqft          = excluded.sqft,
                    lot_sqft      = excluded.lot_sqft,
                    year_built    = excluded.year_built,
                    property_type = excluded.property_type
                "#,
                params![
                    sale.facts.id,
                    sale.sale_date,
                    sale.sale_price,
                    sale.list_price,
                    sale.list_date,
                    sale.facts.address_line,
                    sale.facts.city,
                    sale.facts.postal_code,
                    sale.facts.latitude,
                    sale.facts.longitude,
                    sale.facts.beds,
                    sale.facts.baths,
                    sale.facts.sqft,
                    sale.facts.lot_sqft,
                    sale.facts.year_built,
                    sale.facts.property_type,
                ],
            )
            .map_err(|e| AvmError::DbError(e.to_string()))?;
        }

        tx.commit().map_err(|e| AvmError::DbError(e.to_string()))?;
        debug!("Saved {} sales", sales.len());
        Ok(sales.len())
    })
}

/// Sales with `from <= sale_date < to`, oldest first, each with its own facts
/// snapshot. Open bounds when `None`.
pub fn load_sales(
    db: &Database,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<SaleRecord>> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {SALE_FACT_COLUMNS}, s.sale_price, s.sale_date, s.list_price, s.list_date \
             FROM sales s \
             WHERE (?1 IS NULL OR s.sale_date >= ?1) AND (?2 IS NULL OR s.sale_date < ?2) \
             ORDER BY s.sale_date, s.property_id"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map(params![from, to], |row| {
                Ok(SaleRecord {
                    facts: facts_from_row(row)?,
                    sale_price: row.get(12)?,
                    sale_date: row.get(13)?,
                    list_price: row.get(14)?,
                    list_date: row.get(15)?,
                })
            })
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| AvmError::DbError(e.to_string()))?);
        }
        Ok(out)
    })
}

pub fn count_sales(db: &Database) -> Result<usize> {
    db.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| AvmError::DbError(e.to_string()))
    })
}
