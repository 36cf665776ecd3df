//! Location concentration: how much revenue depends on the top locations

use serde_json::json;

use crate::error::Result;

use super::engine::{insufficient, AnalysisContext, Detector};
use super::severity::classify_band;
use super::types::{Insight, InsightCategory, Severity};

const MIN_LOCATIONS: usize = 3;
/// Top-N is this fraction of all locations, at least one
const TOP_FRACTION: f64 = 0.2;

const CONCENTRATION_BANDS: [(f64, Severity); 3] = [
    (80.0, Severity::Critical),
    (60.0, Severity::High),
    (40.0, Severity::Medium),
];

pub struct LocationConcentrationDetector;

impl Detector for LocationConcentrationDetector {
    fn id(&self) -> &'static str {
        "location_concentration"
    }

    fn name(&self) -> &'static str {
        "Location Concentration"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        // Already sorted by revenue, highest first
        let locations = &ctx.dataset.locations;
        if locations.len() < MIN_LOCATIONS {
            return Err(insufficient(
                self.id(),
                format!("{} locations, need {}", locations.len(), MIN_LOCATIONS),
            ));
        }
        let total: f64 = locations.iter().map(|l| l.revenue).sum();
        if total <= 0.0 {
            return Ok(None);
        }

        let top_n = ((locations.len() as f64 * TOP_FRACTION).ceil() as usize).max(1);
        let top = &locations[..top_n];
        let share = top.iter().map(|l| l.revenue).sum::<f64>() / total * 100.0;
        let Some(severity) = classify_band(share, &CONCENTRATION_BANDS) else {
            return Ok(None);
        };

        let names: Vec<&str> = top.iter().map(|l| l.location.as_str()).collect();
        let insight = Insight::new(
            self.id(),
            InsightCategory::Locations,
            severity,
            "Revenue Concentrated in Few Locations",
            format!(
                "{} of {} locations ({}) bring in {:.1}% of revenue",
                top_n,
                locations.len(),
                names.join(", "),
                share
            ),
        )
        .with_metrics(json!({
            "top_locations": names,
            "top_n": top_n,
            "location_count": locations.len(),
            "top_share_pct": share,
        }))
        .with_action("Grow secondary locations with targeted promotions to reduce dependence on the leaders")
        .with_scores(share / 100.0, 0.3, 0.4);

        Ok(Some(insight))
    }
}
