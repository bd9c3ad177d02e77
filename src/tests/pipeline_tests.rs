use crate::config::EconomicSeriesConfig;
use crate::db::{economics, ingest_runs, sales, validation_runs};
use crate::domain::{EconomicObservation, SaleRecord, Subject};
use crate::errors::AvmError;
use crate::files::save_json;
use crate::model::{ModelKind, PriceModel};
use crate::pipeline::{self, PayloadFormat};
use crate::tests::utils::{d, facts, init_test_db, synthetic_sales, test_config};
use crate::validation::{ValidationReport, WalkForwardValidator};
use chrono::{Months, NaiveDate};
use serde_json::{json, Value};
use std::fs;

fn listing_json(sale: &SaleRecord) -> Value {
    let f = &sale.facts;
    json!({
        "source": {"name": "test", "id": f.id.trim_start_matches("test:")},
        "location": {
            "address": {
                "line": f.address_line,
                "city": f.city,
                "state_code": "TX",
                "postal_code": f.postal_code,
            },
            "coordinate": {"lat": f.latitude, "lon": f.longitude},
        },
        "description": {
            "beds": f.beds,
            "baths": f.baths,
            "sqft": f.sqft,
            "lot_sqft": f.lot_sqft,
            "year_built": f.year_built,
            "sold_date": sale.sale_date.to_string(),
            "type": f.property_type,
        },
        "status": "sold",
        "sold_price": sale.sale_price,
    })
}

/// Every out-of-sample prediction was made as of its fold's cutoff, from
/// data observed no later than that, for a sale closing on or after it.
fn assert_no_leakage(report: &ValidationReport) {
    for p in &report.predictions {
        let fold = &report.folds.iter().find(|f| f.fold.index == p.fold).unwrap().fold;
        assert_eq!(p.as_of, fold.cutoff);
        assert!(p.sale_date >= p.as_of, "{p:?}");
        if let Some(observed) = p.observed_through {
            assert!(observed <= p.as_of, "{p:?}");
        }
    }
}

#[test]
fn ingest_json_directory() {
    let (dir, db) = init_test_db();
    let config = test_config(&dir);
    let payloads = dir.path().join("payloads");
    fs::create_dir_all(&payloads).unwrap();

    let records = synthetic_sales(d("2022-01-01"), 30);
    let mut first: Vec<Value> = records[..20].iter().map(listing_json).collect();
    let mut second: Vec<Value> = records[20..].iter().map(listing_json).collect();

    // Still for sale: not a sale record
    let mut active = listing_json(&records[0]);
    active["source"]["id"] = json!("active-1");
    active["description"]["sold_date"] = Value::Null;
    active["status"] = json!("for_sale");
    first.push(active);

    // Same address sold on the same day under another id
    let mut duplicate = listing_json(&records[1]);
    duplicate["source"]["id"] = json!("dup-1");
    second.push(duplicate);

    // Outside the metro
    let mut far = listing_json(&records[2]);
    far["source"]["id"] = json!("far-1");
    far["location"]["address"]["line"] = json!("9 Far Rd");
    far["location"]["coordinate"]["lat"] = json!(40.0);
    second.push(far);

    save_json(&payloads.join("a.json"), &first).unwrap();
    save_json(&payloads.join("b.json"), &second).unwrap();
    fs::write(payloads.join("notes.txt"), "ignored").unwrap();

    let summary =
        pipeline::ingest_listings(&db, &config, &payloads, PayloadFormat::Json).unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.listings_seen, 33);
    assert_eq!(summary.sales_parsed, 32);
    assert_eq!(summary.cleaning.duplicates, 1);
    assert_eq!(summary.cleaning.out_of_bounds, 1);
    assert_eq!(summary.saved, 30);

    let stored = sales::load_sales(&db, None, None).unwrap();
    assert_eq!(stored, records);

    let cached: Vec<_> = fs::read_dir(&config.cache.dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(cached.len(), 2);

    let runs = ingest_runs::get_recent_ingest_runs(&db, 5).unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].success);
    assert_eq!(runs[0].sales_kept, Some(30));
}

#[test]
fn ingest_saved_html_page() {
    let (dir, db) = init_test_db();
    let config = test_config(&dir);
    let records = synthetic_sales(d("2022-03-01"), 3);
    let next_data = json!({
        "props": {"pageProps": {"properties": records.iter().map(listing_json).collect::<Vec<_>>()}}
    });
    let page = format!(
        r#"<html><head><title>Sold homes</title></head><body>
        <script id="__NEXT_DATA__" type="application/json">{next_data}</script>
        </body></html>"#
    );
    let path = dir.path().join("page.html");
    fs::write(&path, page).unwrap();

    let summary = pipeline::ingest_listings(&db, &config, &path, PayloadFormat::Html).unwrap();
    assert_eq!(summary.saved, 3);
    assert_eq!(sales::load_sales(&db, None, None).unwrap(), records);
}

#[test]
fn failed_ingest_is_recorded() {
    let (dir, db) = init_test_db();
    let config = test_config(&dir);
    let path = dir.path().join("broken.json");
    fs::write(&path, "{\"not\": \"an array\"}").unwrap();

    let err = pipeline::ingest_listings(&db, &config, &path, PayloadFormat::Json).unwrap_err();
    assert!(matches!(err, AvmError::Scraper(_)));

    let runs = ingest_runs::get_recent_ingest_runs(&db, 5).unwrap();
    assert!(!runs[0].success);
    assert!(runs[0].error_message.is_some());
}

#[test]
fn walk_forward_gbm_end_to_end() {
    let (dir, db) = init_test_db();
    let config = test_config(&dir);
    sales::save_sales(&db, &synthetic_sales(d("2021-01-01"), 540)).unwrap();

    let (run_id, report) = pipeline::run_validation(&db, &config).unwrap();
    assert_eq!(report.model, "gbm");
    assert!(report.log_target);
    assert_eq!(report.folds.len(), 4);
    assert!(report.skipped.is_empty());
    assert_eq!(
        report.pooled.count,
        report.folds.iter().map(|f| f.n_test).sum::<usize>()
    );
    assert!(report.pooled.mdape < 15.0, "MdAPE {}", report.pooled.mdape);
    assert!(report.medae_std >= 0.0);
    assert!(!report.feature_importance.is_empty());
    assert_no_leakage(&report);

    for pair in report.folds.windows(2) {
        assert!(pair[0].fold.cutoff < pair[1].fold.cutoff);
        assert!(pair[0].n_train < pair[1].n_train);
    }

    let runs = validation_runs::get_recent_validation_runs(&db, 5).unwrap();
    assert_eq!(runs[0].id, run_id);
}

#[test]
fn future_prices_do_not_change_past_predictions() {
    let (dir, _db) = init_test_db();
    let config = test_config(&dir);
    let records = synthetic_sales(d("2021-01-01"), 540);
    let validator = WalkForwardValidator::new(
        config.validation.clone(),
        config.features.clone(),
        config.geography.clone(),
    );
    let factory = || PriceModel::from_settings(&config.model);

    let baseline = validator.run(&records, &[], factory).unwrap();
    let first_cutoff = baseline.folds[0].fold.cutoff;

    // Inflate every sale from the first cutoff on
    let mut poisoned = records.clone();
    for sale in poisoned.iter_mut().filter(|s| s.sale_date >= first_cutoff) {
        sale.sale_price *= 10;
    }
    let rerun = validator.run(&poisoned, &[], factory).unwrap();

    let fold0 = |r: &ValidationReport| -> Vec<f64> {
        r.predictions
            .iter()
            .filter(|p| p.fold == 0)
            .map(|p| p.predicted)
            .collect()
    };
    assert!(!fold0(&baseline).is_empty());
    assert_eq!(fold0(&baseline), fold0(&rerun));
    assert_no_leakage(&rerun);
}

/// A monthly series that trends with prices, from January 2020.
fn monthly_unemployment(months: u32) -> Vec<EconomicObservation> {
    (0..months)
        .map(|m| EconomicObservation {
            series: "unemployment_rate".to_string(),
            period: d("2020-01-01") + Months::new(m),
            value: 6.0 - 0.05 * m as f64,
        })
        .collect()
}

#[test]
fn unpublished_economic_values_do_not_change_predictions() {
    let (dir, db) = init_test_db();
    let mut config = test_config(&dir);
    config.features.economic = vec![EconomicSeriesConfig {
        name: "unemployment_rate".to_string(),
        publication_lag_days: 35,
    }];
    let records = synthetic_sales(d("2021-01-01"), 540);
    let observations = monthly_unemployment(30);
    let validator = WalkForwardValidator::new(
        config.validation.clone(),
        config.features.clone(),
        config.geography.clone(),
    );
    let factory = || PriceModel::from_settings(&config.model);

    let baseline = validator.run(&records, &observations, factory).unwrap();
    assert_eq!(baseline.folds.len(), 4);
    assert_no_leakage(&baseline);
    assert!(baseline.predictions.iter().all(|p| p.observed_through.is_some()));

    let fold_predictions = |r: &ValidationReport, fold: usize| -> Vec<f64> {
        r.predictions
            .iter()
            .filter(|p| p.fold == fold)
            .map(|p| p.predicted)
            .collect()
    };

    for result in &baseline.folds {
        let cutoff = result.fold.cutoff;
        // The previous month's figure is dated before the cutoff but only
        // published 35 days after its period start, which is past the cutoff.
        let unpublished: NaiveDate = cutoff - Months::new(1);
        assert!(unpublished < cutoff);
        assert!(unpublished + chrono::Duration::days(35) > cutoff);

        let mut changed = observations.clone();
        for obs in changed.iter_mut().filter(|o| o.period >= unpublished) {
            obs.value = 99.0;
        }
        let rerun = validator.run(&records, &changed, factory).unwrap();
        assert_no_leakage(&rerun);

        let index = result.fold.index;
        assert!(!fold_predictions(&baseline, index).is_empty());
        assert_eq!(
            fold_predictions(&baseline, index),
            fold_predictions(&rerun, index),
            "fold {index} (cutoff {cutoff})"
        );
    }

    // Same run through the database
    sales::save_sales(&db, &records).unwrap();
    economics::save_observations(&db, &observations).unwrap();
    let (_, stored) = pipeline::run_validation(&db, &config).unwrap();
    assert_no_leakage(&stored);
    assert_eq!(stored.predictions, baseline.predictions);
}

#[test]
fn skipped_folds_are_reported() {
    let (dir, _db) = init_test_db();
    let mut config = test_config(&dir);
    config.model.kind = ModelKind::Comps;
    config.validation.max_folds = None;
    config.validation.min_train_samples = 380;

    let records = synthetic_sales(d("2021-01-01"), 500);
    let validator = WalkForwardValidator::new(
        config.validation.clone(),
        config.features.clone(),
        config.geography.clone(),
    );
    let report = validator
        .run(&records, &[], || PriceModel::from_settings(&config.model))
        .unwrap();

    // The January 2022 fold has only 365 training sales
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].fold.cutoff, d("2022-01-01"));
    assert_eq!(report.skipped[0].n_train, 365);
    assert_eq!(report.folds.len(), 4);
    assert_no_leakage(&report);
}

#[test]
fn predict_values_subjects_as_of_date() {
    let (dir, db) = init_test_db();
    let config = test_config(&dir);
    sales::save_sales(&db, &synthetic_sales(d("2021-01-01"), 400)).unwrap();

    let subjects: Vec<Subject> = (1000..1005)
        .map(|i| Subject {
            facts: facts(i),
            list_price: Some(400_000),
        })
        .collect();
    let as_of = d("2022-01-15");
    let valuations = pipeline::run_predictions(&db, &config, &subjects, as_of).unwrap();

    assert_eq!(valuations.len(), 5);
    for (v, s) in valuations.iter().zip(&subjects) {
        assert_eq!(v.property_id, s.facts.id);
        assert_eq!(v.as_of, as_of);
        assert!(v.estimate > 0);
        assert!(v.observed_through.unwrap() < as_of);
        assert!(v.display_estimate().starts_with('$'));
    }

    let too_early = pipeline::run_predictions(&db, &config, &subjects, d("2021-02-01"));
    assert!(matches!(too_early, Err(AvmError::InsufficientData { .. })));
}
