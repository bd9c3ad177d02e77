use crate::db::connection::Database;
use crate::errors::{AvmError, Result};
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IngestRun {
    pub id: i64,
    pub source: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub listings_seen: Option<i64>,
    pub sales_kept: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
}

pub fn start_ingest_run(db: &Database, source: &str, now: i64) -> Result<i64> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO ingest_runs (source, started_at, success) VALUES (?, ?, 0)",
            params![source, now],
        )
        .map_err(|e| AvmError::DbError(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn end_ingest_run(
    db: &Database,
    run_id: i64,
    now: i64,
    listings_seen: usize,
    sales_kept: usize,
    error: Option<String>,
) -> Result<()> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE ingest_runs SET finished_at = ?, listings_seen = ?, sales_kept = ?, success = ?, error_message = ? WHERE id = ?",
            params![now, listings_seen as i64, sales_kept as i64, error.is_none(), error, run_id],
        )
        .map_err(|e| AvmError::DbError(e.to_string()))?;
        Ok(())
    })
}

pub fn get_recent_ingest_runs(db: &Database, limit: usize) -> Result<Vec<IngestRun>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT id, source, started_at, finished_at, listings_seen, sales_kept, success, error_message FROM ingest_runs ORDER BY started_at DESC, id DESC LIMIT ?")
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(IngestRun {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    listings_seen: row.get(4)?,
                    sales_kept: row.get(5)?,
                    success: row.get(6)?,
                    error_message: row.get(7)?,
                })
            })
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let mut runs = Vec::new();
        for r in rows {
            runs.push(r.map_err(|e| AvmError::DbError(e.to_string()))?);
        }
        Ok(runs)
    })
}
