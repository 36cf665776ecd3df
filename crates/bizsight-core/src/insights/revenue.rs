//! Revenue trend detectors
//!
//! - Revenue decline: two or more consecutive monthly drops ending at the
//!   latest month
//! - Revenue below typical: the latest month ranks low among all months

use serde_json::json;

use crate::error::Result;

use super::engine::{insufficient, AnalysisContext, Detector};
use super::severity::{classify_band, median, percentile_rank, severity_from_percentile};
use super::types::{Insight, InsightCategory, Severity};

/// Months of history before a trend is judged
const MIN_TREND_MONTHS: usize = 3;
/// Months of history before "typical" means anything
const MIN_TYPICAL_MONTHS: usize = 6;

const DECLINE_BANDS: [(f64, Severity); 3] = [
    (20.0, Severity::Critical),
    (10.0, Severity::High),
    (5.0, Severity::Medium),
];

pub struct RevenueDeclineDetector;

impl Detector for RevenueDeclineDetector {
    fn id(&self) -> &'static str {
        "revenue_decline"
    }

    fn name(&self) -> &'static str {
        "Revenue Decline"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        let monthly = &ctx.dataset.monthly;
        if monthly.len() < MIN_TREND_MONTHS {
            return Err(insufficient(
                self.id(),
                format!("{} months of history, need {}", monthly.len(), MIN_TREND_MONTHS),
            ));
        }

        let declines = monthly
            .windows(2)
            .rev()
            .take_while(|w| w[1].revenue < w[0].revenue)
            .count();
        if declines < 2 {
            return Ok(None);
        }

        let before = &monthly[monthly.len() - 1 - declines];
        let latest = &monthly[monthly.len() - 1];
        if before.revenue <= 0.0 {
            return Ok(None);
        }
        let lost = before.revenue - latest.revenue;
        let decline_pct = lost / before.revenue * 100.0;
        let severity = classify_band(decline_pct, &DECLINE_BANDS).unwrap_or(Severity::Low);
        let annual_recovery = lost * 12.0;

        let insight = Insight::new(
            self.id(),
            InsightCategory::Revenue,
            severity,
            "Revenue Declining",
            format!(
                "Monthly revenue has fallen {} months in a row, down {:.1}% since {}",
                declines,
                decline_pct,
                before.period.format("%B %Y")
            ),
        )
        .with_metrics(json!({
            "consecutive_declines": declines,
            "decline_pct": decline_pct,
            "from_period": before.period,
            "from_revenue": before.revenue,
            "latest_period": latest.period,
            "latest_revenue": latest.revenue,
        }))
        .with_action(
            "Compare the declining months against the same months last year and review \
             pricing and promotions for the products driving the drop",
        )
        .with_scores(decline_pct / 30.0, 0.9, 0.5)
        .with_expected_impact(
            annual_recovery,
            "annual_revenue_increase",
            format!(
                "Restoring revenue to the {} level recovers about {:.0} a year",
                before.period.format("%B %Y"),
                annual_recovery
            ),
        );

        Ok(Some(insight))
    }
}

pub struct RevenueBelowTypicalDetector;

impl Detector for RevenueBelowTypicalDetector {
    fn id(&self) -> &'static str {
        "revenue_below_typical"
    }

    fn name(&self) -> &'static str {
        "Revenue Below Typical"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        let monthly = &ctx.dataset.monthly;
        if monthly.len() < MIN_TYPICAL_MONTHS {
            return Err(insufficient(
                self.id(),
                format!("{} months of history, need {}", monthly.len(), MIN_TYPICAL_MONTHS),
            ));
        }

        let values: Vec<f64> = monthly.iter().map(|m| m.revenue).collect();
        let Some(latest) = monthly.last() else {
            return Ok(None);
        };
        let percentile = percentile_rank(latest.revenue, &values);
        if percentile >= 50.0 {
            return Ok(None);
        }

        let typical = median(&values);
        let gap_ratio = if typical > 0.0 {
            (typical - latest.revenue) / typical
        } else {
            0.0
        };

        let insight = Insight::new(
            self.id(),
            InsightCategory::Revenue,
            severity_from_percentile(percentile),
            "Revenue Below Typical",
            format!(
                "{} revenue ranks at the {:.0}th percentile of the last {} months",
                latest.period.format("%B %Y"),
                percentile,
                values.len()
            ),
        )
        .with_metrics(json!({
            "period": latest.period,
            "revenue": latest.revenue,
            "median_revenue": typical,
            "percentile": percentile,
            "months": values.len(),
        }))
        .with_action("Check whether the shortfall is seasonal before changing prices or stock levels")
        .with_scores(gap_ratio * 2.0, 0.8, 0.5);

        Ok(Some(insight))
    }
}
