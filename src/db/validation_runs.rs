use crate::db::connection::Database;
use crate::errors::{AvmError, Result};
use crate::validation::ValidationReport;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// One row of the run history.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRunSummary {
    pub id: i64,
    pub created_at: i64,
    pub model: String,
    pub n_folds: i64,
    pub n_skipped: i64,
    pub n_predictions: i64,
    pub pooled_medae: f64,
    pub pooled_mdape: f64,
    pub pooled_ppe10: f64,
    pub medae_mean: f64,
    pub medae_std: f64,
}

/// Persist a report with its folds and predictions; returns the run id.
pub fn save_validation_run(db: &Database, report: &ValidationReport, now: i64) -> Result<i64> {
    let config_json =
        serde_json::to_string(&report.config).map_err(|e| AvmError::Parse(e.to_string()))?;
    let report_json =
        serde_json::to_string(report).map_err(|e| AvmError::Parse(e.to_string()))?;

    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        tx.execute(
            r#"
            INSERT INTO validation_runs (
                created_at, model, config_json, n_folds, n_skipped, n_predictions,
                pooled_medae, pooled_mdape, pooled_ppe10, medae_mean, medae_std, report_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                now,
                report.model,
                config_json,
                report.folds.len() as i64,
                report.skipped.len() as i64,
                report.predictions.len() as i64,
                report.pooled.medae,
                report.pooled.mdape,
                report.pooled.ppe10,
                report.medae_mean,
                report.medae_std,
                report_json,
            ],
        )
        .map_err(|e| AvmError::DbError(e.to_string()))?;
        let run_id = tx.last_insert_rowid();

        for r in &report.folds {
            let m = &r.metrics;
            tx.execute(
                r#"
                INSERT INTO fold_results (
                    run_id, fold_index, train_start, cutoff, test_start, test_end,
                    n_train, n_test, medae, mdape, mae, rmse, r2, ppe5, ppe10, ppe20
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
                params![
                    run_id,
                    r.fold.index as i64,
                    r.fold.train_start,
                    r.fold.cutoff,
                    r.fold.test_start,
                    r.fold.test_end,
                    r.n_train as i64,
                    r.n_test as i64,
                    m.medae,
                    m.mdape,
                    m.mae,
                    m.rmse,
                    m.r2,
                    m.ppe5,
                    m.ppe10,
                    m.ppe20,
                ],
            )
            .map_err(|e| AvmError::DbError(e.to_string()))?;
        }

        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO fold_predictions (
                        run_id, fold_index, property_id, sale_date, as_of,
                        actual, predicted, observed_through
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .map_err(|e| AvmError::DbError(e.to_string()))?;
            for p in &report.predictions {
                stmt.execute(params![
                    run_id,
                    p.fold as i64,
                    p.property_id,
                    p.sale_date,
                    p.as_of,
                    p.actual,
                    p.predicted,
                    p.observed_through,
                ])
                .map_err(|e| AvmError::DbError(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| AvmError::DbError(e.to_string()))?;
        Ok(run_id)
    })
}

pub fn load_validation_report(db: &Database, run_id: i64) -> Result<ValidationReport> {
    let json: Option<String> = db.with_conn(|conn| {
        conn.query_row(
            "SELECT report_json FROM validation_runs WHERE id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AvmError::DbError(e.to_string()))
    })?;

    let json = json.ok_or_else(|| AvmError::NotFound(format!("validation run {run_id}")))?;
    serde_json::from_str(&json).map_err(|e| AvmError::Parse(e.to_string()))
}

pub fn get_recent_validation_runs(db: &Database, limit: usize) -> Result<Vec<ValidationRunSummary>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, model, n_folds, n_skipped, n_predictions, pooled_medae, \
                 pooled_mdape, pooled_ppe10, medae_mean, medae_std \
                 FROM validation_runs ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ValidationRunSummary {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    model: row.get(2)?,
                    n_folds: row.get(3)?,
                    n_skipped: row.get(4)?,
                    n_predictions: row.get(5)?,
                    pooled_medae: row.get(6)?,
                    pooled_mdape: row.get(7)?,
                    pooled_ppe10: row.get(8)?,
                    medae_mean: row.get(9)?,
                    medae_std: row.get(10)?,
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

/// Stored fold predictions for a run as `(fold, property_id, actual, predicted)`.
pub fn load_fold_predictions(db: &Database, run_id: i64) -> Result<Vec<(i64, String, f64, f64)>> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT fold_index, property_id, actual, predicted FROM fold_predictions \
                 WHERE run_id = ?1 ORDER BY fold_index, rowid",
            )
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(|e| AvmError::DbError(e.to_string()))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| AvmError::DbError(e.to_string()))?);
        }
        Ok(out)
    })
}
