use crate::errors::{AvmError, Result};
use crate::validation::ValidationReport;
use crate::valuation::Valuation;
use rust_xlsxwriter::{Workbook, Worksheet};

fn write_headers(worksheet: &mut Worksheet, headers: &[&str]) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .map_err(|e| {
                AvmError::XlsxError(format!("Failed to write header '{}': {}", header, e))
            })?;
    }
    Ok(())
}

fn put_str(worksheet: &mut Worksheet, row: u32, col: u16, value: &str) -> Result<()> {
    worksheet
        .write_string(row, col, value)
        .map_err(|e| AvmError::XlsxError(format!("Failed to write cell ({row}, {col}): {e}")))?;
    Ok(())
}

/// Missing and non-finite numbers leave the cell empty.
fn put_num(worksheet: &mut Worksheet, row: u32, col: u16, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if v.is_finite() => {
            worksheet.write_number(row, col, v).map_err(|e| {
                AvmError::XlsxError(format!("Failed to write cell ({row}, {col}): {e}"))
            })?;
        }
        _ => {}
    }
    Ok(())
}

/// Workbook with `Folds`, `Predictions` and `Summary` sheets.
pub fn export_validation_xlsx(report: &ValidationReport) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let folds = workbook.add_worksheet();
    folds
        .set_name("Folds")
        .map_err(|e| AvmError::XlsxError(format!("Failed to name sheet: {e}")))?;
    write_headers(
        folds,
        &[
            "Fold", "Train Start", "Cutoff", "Test Start", "Test End", "Train", "Test", "MedAE",
            "MdAPE %", "MAE", "RMSE", "R2", "PPE5", "PPE10", "PPE20", "Skipped",
        ],
    )?;
    let mut r = 1u32;
    for fold in &report.folds {
        let m = &fold.metrics;
        put_num(folds, r, 0, Some(fold.fold.index as f64))?;
        put_str(folds, r, 1, &fold.fold.train_start.to_string())?;
        put_str(folds, r, 2, &fold.fold.cutoff.to_string())?;
        put_str(folds, r, 3, &fold.fold.test_start.to_string())?;
        put_str(folds, r, 4, &fold.fold.test_end.to_string())?;
        put_num(folds, r, 5, Some(fold.n_train as f64))?;
        put_num(folds, r, 6, Some(fold.n_test as f64))?;
        put_num(folds, r, 7, Some(m.medae))?;
        put_num(folds, r, 8, Some(m.mdape))?;
        put_num(folds, r, 9, Some(m.mae))?;
        put_num(folds, r, 10, Some(m.rmse))?;
        put_num(folds, r, 11, m.r2)?;
        put_num(folds, r, 12, Some(m.ppe5))?;
        put_num(folds, r, 13, Some(m.ppe10))?;
        put_num(folds, r, 14, Some(m.ppe20))?;
        r += 1;
    }
    for skipped in &report.skipped {
        put_num(folds, r, 0, Some(skipped.fold.index as f64))?;
        put_str(folds, r, 1, &skipped.fold.train_start.to_string())?;
        put_str(folds, r, 2, &skipped.fold.cutoff.to_string())?;
        put_str(folds, r, 3, &skipped.fold.test_start.to_string())?;
        put_str(folds, r, 4, &skipped.fold.test_end.to_string())?;
        put_num(folds, r, 5, Some(skipped.n_train as f64))?;
        put_num(folds, r, 6, Some(skipped.n_test as f64))?;
        put_str(folds, r, 15, &skipped.reason)?;
        r += 1;
    }

    let predictions = workbook.add_worksheet();
    predictions
        .set_name("Predictions")
        .map_err(|e| AvmError::XlsxError(format!("Failed to name sheet: {e}")))?;
    write_headers(
        predictions,
        &[
            "Fold", "Property", "Sale Date", "As Of", "Actual", "Predicted", "Error", "APE %",
            "Observed Through",
        ],
    )?;
    for (i, p) in report.predictions.iter().enumerate() {
        let r = (i + 1) as u32;
        put_num(predictions, r, 0, Some(p.fold as f64))?;
        put_str(predictions, r, 1, &p.property_id)?;
        put_str(predictions, r, 2, &p.sale_date.to_string())?;
        put_str(predictions, r, 3, &p.as_of.to_string())?;
        put_num(predictions, r, 4, Some(p.actual))?;
        put_num(predictions, r, 5, Some(p.predicted))?;
        put_num(predictions, r, 6, Some(p.predicted - p.actual))?;
        put_num(
            predictions,
            r,
            7,
            Some((p.predicted - p.actual).abs() / p.actual * 100.0),
        )?;
        let observed = p.observed_through.map(|d| d.to_string()).unwrap_or_default();
        put_str(predictions, r, 8, &observed)?;
    }

    let summary = workbook.add_worksheet();
    summary
        .set_name("Summary")
        .map_err(|e| AvmError::XlsxError(format!("Failed to name sheet: {e}")))?;
    write_headers(summary, &["Metric", "Value"])?;
    let pooled = &report.pooled;
    let rows: Vec<(&str, Option<f64>)> = vec![
        ("Folds scored", Some(report.folds.len() as f64)),
        ("Folds skipped", Some(report.skipped.len() as f64)),
        ("Predictions", Some(pooled.count as f64)),
        ("Pooled MedAE", Some(pooled.medae)),
        ("Pooled MdAPE %", Some(pooled.mdape)),
        ("Pooled MAE", Some(pooled.mae)),
        ("Pooled RMSE", Some(pooled.rmse)),
        ("Pooled R2", pooled.r2),
        ("Pooled PPE5", Some(pooled.ppe5)),
        ("Pooled PPE10", Some(pooled.ppe10)),
        ("Pooled PPE20", Some(pooled.ppe20)),
        ("Fold MedAE mean", Some(report.medae_mean)),
        ("Fold MedAE std", Some(report.medae_std)),
    ];
    put_str(summary, 1, 0, "Model")?;
    put_str(summary, 1, 1, &report.model)?;
    for (i, (label, value)) in rows.iter().enumerate() {
        let r = (i + 2) as u32;
        put_str(summary, r, 0, label)?;
        put_num(summary, r, 1, *value)?;
    }
    let offset = rows.len() as u32 + 3;
    put_str(summary, offset, 0, "Feature")?;
    put_str(summary, offset, 1, "Importance")?;
    for (i, (name, value)) in report.feature_importance.iter().enumerate() {
        let r = offset + 1 + i as u32;
        put_str(summary, r, 0, name)?;
        put_num(summary, r, 1, Some(*value))?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| AvmError::XlsxError(format!("Failed to save workbook: {}", e)))
}

/// Workbook with a single `Valuations` sheet.
pub fn export_valuations_xlsx(valuations: &[Valuation]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Valuations")
        .map_err(|e| AvmError::XlsxError(format!("Failed to name sheet: {e}")))?;

    write_headers(
        worksheet,
        &[
            "Property", "Address", "Zip / Postal", "As Of", "Estimate", "List Price",
            "Observed Through",
        ],
    )?;

    for (i, v) in valuations.iter().enumerate() {
        let r = (i + 1) as u32;
        put_str(worksheet, r, 0, &v.property_id)?;
        put_str(worksheet, r, 1, &v.address_line)?;
        put_str(worksheet, r, 2, &v.postal_code)?;
        put_str(worksheet, r, 3, &v.as_of.to_string())?;
        put_num(worksheet, r, 4, Some(v.estimate as f64))?;
        put_num(worksheet, r, 5, v.list_price.map(|p| p as f64))?;
        let observed = v.observed_through.map(|d| d.to_string()).unwrap_or_default();
        put_str(worksheet, r, 6, &observed)?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| AvmError::XlsxError(format!("Failed to save workbook: {}", e)))
}
