//! Test utilities for bizsight-core
//!
//! Deterministic fixture data and an in-code model artifact so unit tests,
//! integration tests and the CLI tests share one realistic dataset.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};

use crate::features::FEATURE_NAMES;
use crate::model::{LinearModel, LoadedModel, ModelArtifact, ModelSpec};
use crate::models::{SalesRow, TransactionRecord};
use crate::snapshot::ReferenceDataSnapshot;
use crate::vocabulary::CategoryVocabulary;

/// (product id, base price, cost ratio, base units per sale)
const PRODUCTS: [(&str, f64, f64, f64); 3] = [
    ("12", 80.0, 0.55, 3.0),
    ("7", 25.0, 0.40, 8.0),
    ("31", 8.0, 0.70, 20.0),
];

/// (location, demand factor)
const LOCATIONS: [(&str, f64); 3] = [("North", 1.4), ("South", 1.0), ("East", 0.6)];

/// Eighteen months (Jan 2023 - Jun 2024) of weekly-ish sales across three
/// products and three locations, with a summer peak and small price jitter
pub fn sample_rows() -> Vec<SalesRow> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut rows = Vec::new();

    for month_offset in 0..18u32 {
        let month_start = start + Months::new(month_offset);
        let month = (month_offset % 12) + 1;
        let seasonal = 1.0 + 0.3 * (2.0 * PI * (month as f64 - 4.0) / 12.0).sin();

        for day in [3u32, 10, 17, 24] {
            let date =
                NaiveDate::from_ymd_opt(month_start.year(), month_start.month(), day).unwrap();
            for (product, base_price, cost_ratio, base_qty) in PRODUCTS {
                for (location, demand) in LOCATIONS {
                    let jitter = ((day + month_offset) % 3) as f64 - 1.0;
                    let unit_price = base_price * (1.0 + 0.05 * jitter);
                    let quantity = (base_qty * demand * seasonal).round().max(1.0);
                    rows.push(SalesRow {
                        date,
                        product_id: product.to_string(),
                        location: location.to_string(),
                        unit_price,
                        unit_cost: base_price * cost_ratio,
                        quantity,
                        revenue: unit_price * quantity,
                    });
                }
            }
        }
    }

    rows
}

/// The sample data with a spring 2024 slump and a collapsing product "31"
///
/// April, May and June 2024 keep 70%, 50% and 30% of their sales, and every
/// sale of product "31" is worth 30% of its normal value. Revenue declines
/// three months running and "31" falls far below the catalog median.
pub fn struggling_rows() -> Vec<SalesRow> {
    sample_rows()
        .into_iter()
        .map(|mut row| {
            let mut factor = 1.0;
            if row.date.year() == 2024 {
                factor *= match row.date.month() {
                    4 => 0.7,
                    5 => 0.5,
                    6 => 0.3,
                    _ => 1.0,
                };
            }
            if row.product_id == "31" {
                factor *= 0.3;
            }
            row.quantity *= factor;
            row.revenue *= factor;
            row
        })
        .collect()
}

/// Vocabulary the sample model was "trained" on
pub fn sample_vocabulary() -> CategoryVocabulary {
    CategoryVocabulary::new(
        LOCATIONS.iter().map(|(l, _)| l.to_string()),
        PRODUCTS.iter().map(|(p, ..)| p.to_string()),
    )
}

/// Linear model coefficients in `FEATURE_NAMES` order
///
/// Revenue is `A + B × price` for a fixed record with `A > 0`, so the implied
/// quantity `revenue / price` falls as price rises.
pub fn sample_coefficients() -> Vec<f64> {
    vec![
        1.5,   // unit_price
        0.0,   // unit_cost
        0.0,   // unit_margin_ratio
        -20.0, // price_vs_product_avg
        0.0,   // price_vs_location_avg
        5.0,   // month_sin
        3.0,   // month_cos
        0.0,   // day_sin
        0.0,   // day_cos
        2.0,   // season
        0.5,   // weekday
        8.0,   // is_weekend
        0.0,   // year
        1.0,   // location_code
        2.0,   // product_code
        50.0,  // product_popularity
        40.0,  // location_popularity
        30.0,  // seasonal_index
    ]
}

pub fn sample_artifact() -> ModelArtifact {
    ModelArtifact {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        vocabulary: sample_vocabulary(),
        model: ModelSpec::Linear(LinearModel {
            intercept: 60.0,
            coefficients: sample_coefficients(),
        }),
    }
}

pub fn sample_model() -> LoadedModel {
    sample_artifact()
        .into_model()
        .expect("sample artifact matches the feature contract")
}

pub fn sample_snapshot() -> Arc<ReferenceDataSnapshot> {
    Arc::new(ReferenceDataSnapshot::new(sample_model(), &sample_rows()))
}

/// The worked example: product 12 at North, $100 price, $50 cost
pub fn example_record() -> TransactionRecord {
    TransactionRecord {
        product_id: "12".to_string(),
        location: "North".to_string(),
        unit_price: Some(100.0),
        unit_cost: Some(50.0),
        year: 2024,
        month: 6,
        day: 15,
        weekday: Some("Friday".to_string()),
    }
}

/// Render rows in the CSV provider's format
pub fn sales_csv(rows: &[SalesRow]) -> String {
    let mut out = String::from("date,product_id,location,unit_price,unit_cost,quantity,revenue\n");
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            r.date.format("%Y-%m-%d"),
            r.product_id,
            r.location,
            r.unit_price,
            r.unit_cost,
            r.quantity,
            r.revenue
        ));
    }
    out
}

/// Write the sample CSV and model artifact into `dir`, returning their paths
pub fn write_fixture_files(dir: &Path) -> (PathBuf, PathBuf) {
    let csv_path = dir.join("sales.csv");
    let model_path = dir.join("model.json");
    std::fs::write(&csv_path, sales_csv(&sample_rows())).expect("write sales fixture");
    std::fs::write(
        &model_path,
        serde_json::to_string_pretty(&sample_artifact()).expect("serialize artifact"),
    )
    .expect("write model fixture");
    (csv_path, model_path)
}
