//! Pricing inconsistency: how much each product's unit price wanders

use serde_json::json;

use crate::error::Result;
use crate::reference::sample_std_dev;

use super::engine::{insufficient, AnalysisContext, Detector};
use super::severity::classify_band;
use super::types::{Insight, InsightCategory, Severity};

/// Price observations a product needs before its variation counts
const MIN_PRICE_OBSERVATIONS: usize = 3;

const CV_BANDS: [(f64, Severity); 3] = [
    (0.4, Severity::High),
    (0.25, Severity::Medium),
    (0.15, Severity::Low),
];

/// Coefficient of variation (sample standard deviation / mean)
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(sample_std_dev(values) / mean)
}

pub struct PricingInconsistencyDetector;

impl Detector for PricingInconsistencyDetector {
    fn id(&self) -> &'static str {
        "pricing_inconsistency"
    }

    fn name(&self) -> &'static str {
        "Pricing Inconsistency"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        let per_product: Vec<(&str, f64)> = ctx
            .dataset
            .products
            .iter()
            .filter(|p| p.prices.len() >= MIN_PRICE_OBSERVATIONS)
            .filter_map(|p| coefficient_of_variation(&p.prices).map(|cv| (p.product_id.as_str(), cv)))
            .collect();
        if per_product.is_empty() {
            return Err(insufficient(
                self.id(),
                format!("no product has {} priced sales", MIN_PRICE_OBSERVATIONS),
            ));
        }

        let mean_cv = per_product.iter().map(|(_, cv)| cv).sum::<f64>() / per_product.len() as f64;
        let Some(severity) = classify_band(mean_cv, &CV_BANDS) else {
            return Ok(None);
        };

        let (worst_id, worst_cv) = per_product
            .iter()
            .copied()
            .fold(per_product[0], |acc, p| if p.1 > acc.1 { p } else { acc });

        let insight = Insight::new(
            self.id(),
            InsightCategory::Pricing,
            severity,
            "Inconsistent Pricing",
            format!(
                "Unit prices vary by {:.0}% on average across {} products; {} varies most ({:.0}%)",
                mean_cv * 100.0,
                per_product.len(),
                worst_id,
                worst_cv * 100.0
            ),
        )
        .with_metrics(json!({
            "mean_cv": mean_cv,
            "products_measured": per_product.len(),
            "most_variable_product": worst_id,
            "most_variable_cv": worst_cv,
        }))
        .with_action("Publish a standard price list and limit ad-hoc discounts to planned promotions")
        .with_scores(mean_cv / 0.5, 0.3, 0.8);

        Ok(Some(insight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatedDataset;
    use crate::models::SalesRow;
    use chrono::NaiveDate;

    fn dataset(prices: &[(&str, &[f64])]) -> AggregatedDataset {
        let mut rows = Vec::new();
        for (id, product_prices) in prices {
            for price in product_prices.iter() {
                rows.push(SalesRow {
                    date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    product_id: id.to_string(),
                    location: "North".to_string(),
                    unit_price: *price,
                    unit_cost: 1.0,
                    quantity: 1.0,
                    revenue: *price,
                });
            }
        }
        AggregatedDataset::from_rows(&rows)
    }

    #[test]
    fn test_cv() {
        assert_eq!(coefficient_of_variation(&[5.0]), None);
        assert_eq!(coefficient_of_variation(&[10.0, 10.0, 10.0]), Some(0.0));
        // mean 10, sample std 5
        let cv = coefficient_of_variation(&[5.0, 10.0, 15.0]).unwrap();
        assert!((cv - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_erratic_prices_are_flagged() {
        let data = dataset(&[("A", &[5.0, 10.0, 15.0][..]), ("B", &[8.0, 10.0, 12.0][..])]);
        let insight = PricingInconsistencyDetector
            .detect(&AnalysisContext::new(&data))
            .unwrap()
            .unwrap();
        // (0.5 + 0.2) / 2
        assert_eq!(insight.severity, Severity::Medium);
        assert_eq!(insight.metrics["most_variable_product"], "A");
    }

    #[test]
    fn test_stable_prices_are_quiet() {
        let data = dataset(&[("A", &[10.0, 10.5, 9.5][..]), ("B", &[20.0, 20.0, 20.0][..])]);
        assert!(PricingInconsistencyDetector
            .detect(&AnalysisContext::new(&data))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_sparse_prices_are_insufficient() {
        let data = dataset(&[("A", &[10.0, 12.0][..])]);
        assert!(PricingInconsistencyDetector
            .detect(&AnalysisContext::new(&data))
            .is_err());
    }
}
