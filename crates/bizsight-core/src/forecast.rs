//! Multi-period revenue forecasts with confidence bands
//!
//! Each date in the requested range becomes its own transaction record and is
//! predicted independently. Bands come from the historical revenue spread of
//! the (product, location, season) segment, or a fixed percentage of the
//! prediction when that segment has too little history.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EngineConfig, ForecastConfig, PredictionConfig};
use crate::error::{Error, Result};
use crate::features::require_amount;
use crate::models::{Frequency, Season, TransactionRecord};
use crate::prediction::PredictionService;
use crate::vocabulary::CategoryField;

/// Which locations a forecast covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationScope {
    /// One named location
    Single(String),
    /// Per-date totals across every known location
    AllSum,
    /// Per-date mean across every known location (a representative location)
    AllMean,
}

/// `all` / `all-sum`, `all-mean`, or a location name
impl std::str::FromStr for LocationScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("location must not be empty".to_string()),
            "all" | "all-sum" => Ok(LocationScope::AllSum),
            "all-mean" => Ok(LocationScope::AllMean),
            name => Ok(LocationScope::Single(name.to_string())),
        }
    }
}

impl fmt::Display for LocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationScope::Single(name) => write!(f, "{}", name),
            LocationScope::AllSum => write!(f, "all locations (sum)"),
            LocationScope::AllMean => write!(f, "all locations (mean)"),
        }
    }
}

/// Parameters for a single-product forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastRequest {
    pub product_id: String,
    pub location: LocationScope,
    pub unit_price: f64,
    pub unit_cost: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub frequency: Frequency,
}

/// One forecast period. Always `lower_bound <= predicted_value <= upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// A date that could not be predicted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Flat => "flat",
        }
    }
}

/// Headline figures for a forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub periods: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub trend: Trend,
}

/// Second-half mean must differ from the first-half mean by this fraction
const TREND_THRESHOLD: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub product_id: String,
    pub location: LocationScope,
    pub frequency: Frequency,
    pub confidence_level: f64,
    /// In date order
    pub points: Vec<ForecastPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedDate>,
}

impl Forecast {
    pub fn summary(&self) -> Option<ForecastSummary> {
        if self.points.is_empty() {
            return None;
        }
        let values: Vec<f64> = self.points.iter().map(|p| p.predicted_value).collect();
        let total: f64 = values.iter().sum();
        let mean = total / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let trend = if values.len() < 2 {
            Trend::Flat
        } else {
            let (first, second) = values.split_at(values.len() / 2);
            let first_mean = first.iter().sum::<f64>() / first.len() as f64;
            let second_mean = second.iter().sum::<f64>() / second.len() as f64;
            if first_mean <= 0.0 {
                if second_mean > 0.0 {
                    Trend::Rising
                } else {
                    Trend::Flat
                }
            } else {
                let change = (second_mean - first_mean) / first_mean;
                if change > TREND_THRESHOLD {
                    Trend::Rising
                } else if change < -TREND_THRESHOLD {
                    Trend::Falling
                } else {
                    Trend::Flat
                }
            }
        };

        Some(ForecastSummary {
            periods: values.len(),
            total,
            mean,
            min,
            max,
            trend,
        })
    }
}

/// Per-product forecasts, with products that failed reported separately
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiForecast {
    pub forecasts: BTreeMap<String, Forecast>,
    pub failures: BTreeMap<String, String>,
}

/// Dates from `start` to `end`, both inclusive
///
/// Monthly steps are offsets from `start` (`start + n months`), with the day
/// clamped to the end of shorter months.
pub fn forecast_dates(
    start: NaiveDate,
    end: NaiveDate,
    frequency: Frequency,
    max_points: usize,
) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(Error::validation(
            "end_date",
            format!("{} is before start date {}", end, start),
        ));
    }

    let mut dates = Vec::new();
    for n in 0u32.. {
        let date = match frequency {
            Frequency::Daily => start.checked_add_signed(Duration::days(n as i64)),
            Frequency::Weekly => start.checked_add_signed(Duration::weeks(n as i64)),
            Frequency::Monthly => start.checked_add_months(Months::new(n)),
        };
        match date {
            Some(d) if d <= end => dates.push(d),
            _ => break,
        }
        if dates.len() > max_points {
            return Err(Error::validation(
                "end_date",
                format!(
                    "{} to {} at {} frequency exceeds {} points",
                    start, end, frequency, max_points
                ),
            ));
        }
    }
    Ok(dates)
}

/// Two-sided standard normal critical value for a confidence level
pub fn z_score(confidence: f64) -> f64 {
    inverse_normal_cdf(0.5 + confidence / 2.0)
}

/// Rational approximation of the standard normal quantile (relative error
/// below 1.2e-9)
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Forecasts over one prediction service
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    service: PredictionService,
    config: ForecastConfig,
    defaults: PredictionConfig,
}

impl ForecastEngine {
    pub fn new(service: PredictionService, config: &EngineConfig) -> Self {
        Self {
            service,
            config: config.forecast.clone(),
            defaults: config.prediction.clone(),
        }
    }

    /// Forecast one product over a date range
    pub fn forecast(&self, request: &ForecastRequest) -> Result<Forecast> {
        require_amount("unit_price", Some(request.unit_price))?;
        require_amount("unit_cost", Some(request.unit_cost))?;
        let dates = forecast_dates(
            request.start,
            request.end,
            request.frequency,
            self.config.max_points,
        )?;

        let vocabulary = self.service.snapshot().vocabulary();
        vocabulary.index_of(CategoryField::Product, &request.product_id)?;

        let (points, skipped) = match &request.location {
            LocationScope::Single(location) => {
                vocabulary.index_of(CategoryField::Location, location)?;
                self.forecast_location(request, location, &dates)
            }
            LocationScope::AllSum => self.forecast_all_locations(request, &dates, false),
            LocationScope::AllMean => self.forecast_all_locations(request, &dates, true),
        };

        if !skipped.is_empty() {
            warn!(
                product = %request.product_id,
                skipped = skipped.len(),
                "Forecast dates skipped"
            );
        }
        debug!(
            product = %request.product_id,
            location = %request.location,
            points = points.len(),
            "Forecast complete"
        );

        Ok(Forecast {
            product_id: request.product_id.clone(),
            location: request.location.clone(),
            frequency: request.frequency,
            confidence_level: self.config.confidence_level,
            points,
            skipped,
        })
    }

    /// Forecast several products at their historical average price and cost
    pub fn forecast_multiple(
        &self,
        products: &[String],
        scope: &LocationScope,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
    ) -> MultiForecast {
        let outcomes: Vec<(String, Result<Forecast>)> = products
            .par_iter()
            .map(|product_id| {
                let (unit_price, unit_cost) = self.typical_amounts(product_id);
                let request = ForecastRequest {
                    product_id: product_id.clone(),
                    location: scope.clone(),
                    unit_price,
                    unit_cost,
                    start,
                    end,
                    frequency,
                };
                (product_id.clone(), self.forecast(&request))
            })
            .collect();

        let mut multi = MultiForecast::default();
        for (product_id, outcome) in outcomes {
            match outcome {
                Ok(forecast) => {
                    multi.forecasts.insert(product_id, forecast);
                }
                Err(e) => {
                    warn!(product = %product_id, error = %e, "Product forecast failed");
                    multi.failures.insert(product_id, e.to_string());
                }
            }
        }
        multi
    }

    /// Historical average price and cost, else the configured defaults
    pub fn typical_amounts(&self, product_id: &str) -> (f64, f64) {
        match self.service.snapshot().reference.product(product_id) {
            Some(stats) => (stats.avg_price, stats.avg_cost),
            None => (
                self.defaults.default_unit_price,
                self.defaults.default_unit_cost,
            ),
        }
    }

    fn forecast_location(
        &self,
        request: &ForecastRequest,
        location: &str,
        dates: &[NaiveDate],
    ) -> (Vec<ForecastPoint>, Vec<SkippedDate>) {
        let z = z_score(self.config.confidence_level);
        let outcomes: Vec<(NaiveDate, Result<ForecastPoint>)> = dates
            .par_iter()
            .map(|&date| (date, self.forecast_point(request, location, date, z)))
            .collect();

        let mut points = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for (date, outcome) in outcomes {
            match outcome {
                Ok(point) => points.push(point),
                Err(e) => skipped.push(SkippedDate {
                    date,
                    reason: e.to_string(),
                }),
            }
        }
        (points, skipped)
    }

    fn forecast_point(
        &self,
        request: &ForecastRequest,
        location: &str,
        date: NaiveDate,
        z: f64,
    ) -> Result<ForecastPoint> {
        let record = TransactionRecord::new(
            request.product_id.as_str(),
            location,
            request.unit_price,
            request.unit_cost,
            date,
        );
        let predicted = self.service.predict(&record)?.predicted_revenue;

        let segment = self.service.snapshot().reference.segment(
            &request.product_id,
            location,
            Season::from_month(date.month()),
        );
        let half_width = match segment.map(|s| z * s.std_dev) {
            Some(width) if width.is_finite() && width >= 0.0 => width,
            _ => self.config.fallback_band_pct * predicted,
        };

        Ok(ForecastPoint {
            date,
            predicted_value: predicted,
            lower_bound: (predicted - half_width).max(0.0).min(predicted),
            upper_bound: predicted + half_width,
        })
    }

    /// Combine per-location forecasts date by date; a date is only reported
    /// when every location predicted it
    fn forecast_all_locations(
        &self,
        request: &ForecastRequest,
        dates: &[NaiveDate],
        mean: bool,
    ) -> (Vec<ForecastPoint>, Vec<SkippedDate>) {
        let locations = self.service.snapshot().vocabulary().locations();
        let mut totals: BTreeMap<NaiveDate, (ForecastPoint, usize)> = BTreeMap::new();
        let mut failed: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();

        for location in locations {
            let (points, skipped) = self.forecast_location(request, location, dates);
            for p in points {
                let entry = totals.entry(p.date).or_insert((
                    ForecastPoint {
                        date: p.date,
                        predicted_value: 0.0,
                        lower_bound: 0.0,
                        upper_bound: 0.0,
                    },
                    0,
                ));
                entry.0.predicted_value += p.predicted_value;
                entry.0.lower_bound += p.lower_bound;
                entry.0.upper_bound += p.upper_bound;
                entry.1 += 1;
            }
            for s in skipped {
                failed
                    .entry(s.date)
                    .or_default()
                    .push(format!("{}: {}", location, s.reason));
            }
        }

        let mut points = Vec::new();
        let mut skipped = Vec::new();
        for date in dates {
            if let Some(reasons) = failed.remove(date) {
                skipped.push(SkippedDate {
                    date: *date,
                    reason: reasons.join("; "),
                });
                continue;
            }
            if let Some((mut point, count)) = totals.remove(date) {
                if mean && count > 0 {
                    let n = count as f64;
                    point.predicted_value /= n;
                    point.lower_bound /= n;
                    point.upper_bound /= n;
                }
                // Summed bounds can drift by rounding
                point.lower_bound = point.lower_bound.min(point.predicted_value);
                point.upper_bound = point.upper_bound.max(point.predicted_value);
                points.push(point);
            }
        }
        (points, skipped)
    }
}
