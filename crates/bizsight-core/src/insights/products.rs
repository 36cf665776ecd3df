//! Product mix detectors
//!
//! - Underperforming products: average sale value far below the catalog median
//! - Margin spread: gross margins differ widely across products

use serde_json::json;

use crate::aggregate::ProductSummary;
use crate::error::Result;

use super::engine::{insufficient, AnalysisContext, Detector};
use super::severity::{classify_band, median, percentile_rank, severity_from_percentile};
use super::types::{Insight, InsightCategory, Severity};

/// Products needed before the catalog has a meaningful median
const MIN_PRODUCTS: usize = 3;
/// A product underperforms below this fraction of the median average sale
const UNDERPERFORMANCE_RATIO: f64 = 0.5;

const MARGIN_SPREAD_BANDS: [(f64, Severity); 3] = [
    (50.0, Severity::Critical),
    (30.0, Severity::High),
    (15.0, Severity::Medium),
];

fn active_products<'a>(ctx: &'a AnalysisContext<'_>) -> Vec<&'a ProductSummary> {
    ctx.dataset
        .products
        .iter()
        .filter(|p| p.transactions > 0)
        .collect()
}

pub struct UnderperformingProductsDetector;

impl Detector for UnderperformingProductsDetector {
    fn id(&self) -> &'static str {
        "underperforming_products"
    }

    fn name(&self) -> &'static str {
        "Underperforming Products"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        let products = active_products(ctx);
        if products.len() < MIN_PRODUCTS {
            return Err(insufficient(
                self.id(),
                format!("{} products, need {}", products.len(), MIN_PRODUCTS),
            ));
        }

        let averages: Vec<f64> = products.iter().map(|p| p.avg_revenue()).collect();
        let median_avg = median(&averages);
        let cutoff = median_avg * UNDERPERFORMANCE_RATIO;

        let mut weak: Vec<&ProductSummary> = products
            .iter()
            .copied()
            .filter(|p| p.avg_revenue() < cutoff)
            .collect();
        if weak.is_empty() || median_avg <= 0.0 {
            return Ok(None);
        }
        weak.sort_by(|a, b| {
            a.avg_revenue()
                .total_cmp(&b.avg_revenue())
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        let worst = weak[0];

        // Where the worst product's typical sale falls among all sales
        let percentile = percentile_rank(worst.avg_revenue(), &ctx.dataset.transaction_revenues);

        // Lifting each weak product to the cutoff
        let gap: f64 = weak
            .iter()
            .map(|p| (cutoff - p.avg_revenue()) * p.transactions as f64)
            .sum();
        let annual_gain = gap * ctx.dataset.annualization_factor();

        let ids: Vec<&str> = weak.iter().map(|p| p.product_id.as_str()).collect();
        let insight = Insight::new(
            self.id(),
            InsightCategory::Products,
            severity_from_percentile(percentile),
            "Underperforming Products",
            format!(
                "{} of {} products average less than half the typical sale ({})",
                weak.len(),
                products.len(),
                ids.join(", ")
            ),
        )
        .with_metrics(json!({
            "products": ids,
            "median_avg_revenue": median_avg,
            "worst_product": worst.product_id,
            "worst_avg_revenue": worst.avg_revenue(),
            "worst_percentile": percentile,
        }))
        .with_action(
            "Bundle the weak products with best sellers, reprice them, or drop them from the range",
        )
        .with_scores(1.0 - worst.avg_revenue() / median_avg, 0.5, 0.7)
        .with_expected_impact(
            annual_gain,
            "annual_revenue_increase",
            format!(
                "Raising the weak products to half the median sale adds about {:.0} a year",
                annual_gain
            ),
        );

        Ok(Some(insight))
    }
}

pub struct MarginSpreadDetector;

impl Detector for MarginSpreadDetector {
    fn id(&self) -> &'static str {
        "margin_spread"
    }

    fn name(&self) -> &'static str {
        "Margin Spread"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>> {
        let margins: Vec<(&ProductSummary, f64)> = active_products(ctx)
            .into_iter()
            .filter_map(|p| p.margin_pct().map(|m| (p, m)))
            .collect();
        if margins.len() < MIN_PRODUCTS {
            return Err(insufficient(
                self.id(),
                format!("{} products with revenue, need {}", margins.len(), MIN_PRODUCTS),
            ));
        }

        let (mut lowest, mut highest) = (margins[0], margins[0]);
        for &(product, margin) in &margins {
            if margin < lowest.1 {
                lowest = (product, margin);
            }
            if margin > highest.1 {
                highest = (product, margin);
            }
        }
        let spread = highest.1 - lowest.1;
        let Some(severity) = classify_band(spread, &MARGIN_SPREAD_BANDS) else {
            return Ok(None);
        };

        let median_margin = median(&margins.iter().map(|(_, m)| *m).collect::<Vec<_>>());
        let annual_profit = (median_margin - lowest.1) / 100.0
            * lowest.0.revenue
            * ctx.dataset.annualization_factor();

        let insight = Insight::new(
            self.id(),
            InsightCategory::Margins,
            severity,
            "Wide Margin Spread",
            format!(
                "Product margins range from {:.1}% ({}) to {:.1}% ({})",
                lowest.1, lowest.0.product_id, highest.1, highest.0.product_id
            ),
        )
        .with_metrics(json!({
            "spread_points": spread,
            "lowest_product": lowest.0.product_id,
            "lowest_margin_pct": lowest.1,
            "highest_product": highest.0.product_id,
            "highest_margin_pct": highest.1,
            "median_margin_pct": median_margin,
        }))
        .with_action(format!(
            "Renegotiate supplier costs or raise the price of {} toward the median margin",
            lowest.0.product_id
        ))
        .with_scores(spread / 60.0, 0.4, 0.6)
        .with_expected_impact(
            annual_profit,
            "annual_profit_increase",
            format!(
                "Bringing {} to the median margin adds about {:.0} profit a year",
                lowest.0.product_id, annual_profit
            ),
        );

        Ok(Some(insight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatedDataset;
    use crate::models::SalesRow;
    use chrono::NaiveDate;

    /// Four sales per product: (id, revenue per sale, cost ratio)
    fn dataset(products: &[(&str, f64, f64)]) -> AggregatedDataset {
        let mut rows = Vec::new();
        for (id, revenue, cost_ratio) in products {
            for month in 1..=4 {
                rows.push(SalesRow {
                    date: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
                    product_id: id.to_string(),
                    location: "North".to_string(),
                    unit_price: *revenue,
                    unit_cost: revenue * cost_ratio,
                    quantity: 1.0,
                    revenue: *revenue,
                });
            }
        }
        AggregatedDataset::from_rows(&rows)
    }

    #[test]
    fn test_weak_product_is_flagged() {
        let data = dataset(&[("A", 200.0, 0.5), ("B", 180.0, 0.5), ("C", 220.0, 0.5), ("D", 40.0, 0.5)]);
        let insight = UnderperformingProductsDetector
            .detect(&AnalysisContext::new(&data))
            .unwrap()
            .unwrap();

        assert_eq!(insight.metrics["products"], json!(["D"]));
        // D's sales are the bottom quarter of all sales
        assert_eq!(insight.severity, Severity::Critical);
        // (95 - 40) × 4 sales, 4-month span annualized ×3
        let expected = insight.expected_impact.unwrap().value;
        assert!((expected - 660.0).abs() < 1e-9);
    }

    #[test]
    fn test_even_catalog_is_quiet() {
        let data = dataset(&[("A", 200.0, 0.5), ("B", 180.0, 0.5), ("C", 120.0, 0.5)]);
        assert!(UnderperformingProductsDetector
            .detect(&AnalysisContext::new(&data))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_margin_spread_bands() {
        let detect = |ratios: [f64; 3]| {
            let data = dataset(&[("A", 100.0, ratios[0]), ("B", 100.0, ratios[1]), ("C", 100.0, ratios[2])]);
            MarginSpreadDetector.detect(&AnalysisContext::new(&data)).unwrap()
        };

        // Margins 80%, 50%, 20%: 60 points
        let wide = detect([0.2, 0.5, 0.8]).unwrap();
        assert_eq!(wide.severity, Severity::Critical);
        assert_eq!(wide.metrics["lowest_product"], "C");

        // 60%, 50%, 40%: 20 points
        assert_eq!(detect([0.4, 0.5, 0.6]).unwrap().severity, Severity::Medium);
        // 55%, 50%, 45%: 10 points
        assert!(detect([0.45, 0.5, 0.55]).is_none());
    }

    #[test]
    fn test_too_few_products() {
        let data = dataset(&[("A", 100.0, 0.5), ("B", 50.0, 0.5)]);
        assert!(UnderperformingProductsDetector
            .detect(&AnalysisContext::new(&data))
            .is_err());
    }
}
