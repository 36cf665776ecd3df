//! Seasonal volatility: peak-to-trough ratio of calendar-month revenue

use serde_json::json;

use crate::error::Result;

use super::engine::{insufficient, AnalysisContext, Detector};
use super::severity::classify_band;
use super::types::{Insight, InsightCategory, Severity};

const MIN_CALENDAR_MONTHS: usize = 6;

const VOLATILITY_BANDS: [(f64, Severity); 3] = [
    (3.0, Severity::High),
    (2.0, Severity::Medium),
    (1.5, Severity::Low),
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub struct SeasonalVolatilityDetector;

impl Detector for SeasonalVolatilityDetector {
    fn id(&self) -> &'static str {
        "seasonal_volatility"
    }

    fn name(&self) -> &'static str {
        "Seasonal Volatility"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        let months: Vec<(usize, f64)> = ctx
            .dataset
            .month_of_year
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .collect();
        if months.len() < MIN_CALENDAR_MONTHS {
            return Err(insufficient(
                self.id(),
                format!(
                    "{} calendar months observed, need {}",
                    months.len(),
                    MIN_CALENDAR_MONTHS
                ),
            ));
        }

        let (mut peak, mut trough) = (months[0], months[0]);
        for &(i, v) in &months {
            if v > peak.1 {
                peak = (i, v);
            }
            if v < trough.1 {
                trough = (i, v);
            }
        }
        if peak.1 <= 0.0 {
            return Ok(None);
        }
        // A month with no revenue at all is as volatile as it gets
        let ratio = if trough.1 > 0.0 {
            peak.1 / trough.1
        } else {
            f64::INFINITY
        };
        let Some(severity) = classify_band(ratio, &VOLATILITY_BANDS) else {
            return Ok(None);
        };

        let insight = Insight::new(
            self.id(),
            InsightCategory::Seasonality,
            severity,
            "Strong Seasonal Swings",
            format!(
                "{} revenue is {:.1}x {} revenue",
                MONTH_NAMES[peak.0], ratio, MONTH_NAMES[trough.0]
            ),
        )
        .with_metrics(json!({
            "peak_month": MONTH_NAMES[peak.0],
            "peak_revenue": peak.1,
            "trough_month": MONTH_NAMES[trough.0],
            "trough_revenue": trough.1,
            "peak_trough_ratio": if ratio.is_finite() { json!(ratio) } else { json!(null) },
        }))
        .with_action(format!(
            "Plan inventory and staffing around {} and run off-season promotions in {}",
            MONTH_NAMES[peak.0], MONTH_NAMES[trough.0]
        ))
        .with_scores((ratio - 1.0) / 3.0, 0.6, 0.6);

        Ok(Some(insight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatedDataset;

    fn dataset(month_of_year: [Option<f64>; 12]) -> AggregatedDataset {
        AggregatedDataset {
            month_of_year,
            ..AggregatedDataset::default()
        }
    }

    fn detect(month_of_year: [Option<f64>; 12]) -> Option<Insight> {
        let data = dataset(month_of_year);
        SeasonalVolatilityDetector
            .detect(&AnalysisContext::new(&data))
            .unwrap()
    }

    fn year(low: f64, high: f64) -> [Option<f64>; 12] {
        let mut months = [Some(100.0); 12];
        months[0] = Some(low);
        months[6] = Some(high);
        months
    }

    #[test]
    fn test_volatility_bands() {
        let high = detect(year(100.0, 350.0)).unwrap();
        assert_eq!(high.severity, Severity::High);
        assert_eq!(high.metrics["peak_month"], "July");

        assert_eq!(detect(year(100.0, 250.0)).unwrap().severity, Severity::Medium);
        assert_eq!(detect(year(100.0, 160.0)).unwrap().severity, Severity::Low);
        assert!(detect(year(100.0, 140.0)).is_none());
    }

    #[test]
    fn test_zero_trough_is_maximal() {
        let insight = detect(year(0.0, 100.0)).unwrap();
        assert_eq!(insight.severity, Severity::High);
        assert!(insight.metrics["peak_trough_ratio"].is_null());
        assert_eq!(insight.impact, 1.0);
    }

    #[test]
    fn test_partial_year_is_insufficient() {
        let mut months = [None; 12];
        for m in months.iter_mut().take(4) {
            *m = Some(100.0);
        }
        let data = dataset(months);
        assert!(SeasonalVolatilityDetector
            .detect(&AnalysisContext::new(&data))
            .is_err());
    }
}
