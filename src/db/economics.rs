use crate::db::connection::Database;
use crate::domain::EconomicObservation;
use crate::errors::{AvmError, Result};
use rusqlite::params;

pub fn save_observations(db: &Database, observations: &[EconomicObservation]) -> Result<usize> {
    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        for obs in observations {
            tx.execute(
                r#"
                INSERT INTO economic_observations (series, period, value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(series, period) DO UPDATE SET value = excluded.value
                "#,
                params![obs.series, obs.period, obs.value],
            )
            .map_err(|e| AvmError::DbError(e.to_string()))?;
        }

        tx.commit().map_err(|e| AvmError::DbError(e.to_string()))?;
        Ok(observations.len())
    })
}

pub fn load_observations(db: &Database) -> Result<Vec<EconomicObservation>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT series, period, value FROM economic_observations ORDER BY series, period")
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(EconomicObservation {
                    series: row.get(0)?,
                    period: row.get(1)?,
                    value: row.get(2)?,
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
