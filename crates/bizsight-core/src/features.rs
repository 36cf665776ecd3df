//! Feature engineering
//!
//! Converts one [`TransactionRecord`] into the exact feature vector the trained
//! model expects. [`FEATURE_NAMES`] is the contract: model artifacts declare the
//! same list and are refused at load time if it differs.

use std::f64::consts::PI;

use chrono::Datelike;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Season, TransactionRecord};
use crate::reference::ReferenceStats;
use crate::vocabulary::{CategoryField, CategoryVocabulary};

/// Ordered feature names shared with the model artifact
pub const FEATURE_NAMES: [&str; 18] = [
    "unit_price",
    "unit_cost",
    "unit_margin_ratio",
    "price_vs_product_avg",
    "price_vs_location_avg",
    "month_sin",
    "month_cos",
    "day_sin",
    "day_cos",
    "season",
    "weekday",
    "is_weekend",
    "year",
    "location_code",
    "product_code",
    "product_popularity",
    "location_popularity",
    "seasonal_index",
];

/// Named, ordered feature values for a single prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    /// Values in [`FEATURE_NAMES`] order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Require a monetary field to be present, finite and non-negative
pub fn require_amount(field: &str, value: Option<f64>) -> Result<f64> {
    let value = value.ok_or_else(|| Error::validation(field, "is required"))?;
    if !value.is_finite() {
        return Err(Error::validation(field, format!("{} is not a finite number", value)));
    }
    if value < 0.0 {
        return Err(Error::validation(field, format!("{} must not be negative", value)));
    }
    Ok(value)
}

/// Sine/cosine encoding of a cyclic value in `1..=period`
fn cyclical(value: u32, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * (value as f64 - 1.0) / period;
    (angle.sin(), angle.cos())
}

fn ratio_or_one(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        1.0
    }
}

/// Build the model feature vector for a record
pub fn build_features(
    record: &TransactionRecord,
    reference: &ReferenceStats,
    vocabulary: &CategoryVocabulary,
) -> Result<FeatureVector> {
    let unit_price = require_amount("unit_price", record.unit_price)?;
    let unit_cost = require_amount("unit_cost", record.unit_cost)?;
    let date = record.date()?;

    let weekday_name = record.weekday_or_derived()?;
    let weekday = vocabulary.index_of(CategoryField::Weekday, &weekday_name)?;
    let location_code = vocabulary.index_of(CategoryField::Location, &record.location)?;
    let product_code = vocabulary.index_of(CategoryField::Product, &record.product_id)?;

    let (month_sin, month_cos) = cyclical(date.month(), 12.0);
    let days_in_month = days_in_month(date.year(), date.month()) as f64;
    let (day_sin, day_cos) = cyclical(date.day(), days_in_month);
    let season = Season::from_month(date.month());

    let unit_margin_ratio = if unit_price > 0.0 {
        (unit_price - unit_cost) / unit_price
    } else {
        0.0
    };

    let values = vec![
        unit_price,
        unit_cost,
        unit_margin_ratio,
        ratio_or_one(unit_price, reference.reference_price_for_product(&record.product_id)),
        ratio_or_one(unit_price, reference.reference_price_for_location(&record.location)),
        month_sin,
        month_cos,
        day_sin,
        day_cos,
        season.index() as f64,
        weekday as f64,
        if weekday >= 5 { 1.0 } else { 0.0 },
        date.year() as f64,
        location_code as f64,
        product_code as f64,
        reference.product_popularity(&record.product_id),
        reference.location_popularity(&record.location),
        reference.seasonal_index(date.month()),
    ];
    debug_assert_eq!(values.len(), FEATURE_NAMES.len());

    Ok(FeatureVector { values })
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}
