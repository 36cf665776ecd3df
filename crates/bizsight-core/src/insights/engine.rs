//! Insight Engine - runs detectors, adds compound insights and ranks the result

use crate::aggregate::AggregatedDataset;
use crate::config::InsightConfig;
use crate::error::{Error, Result};

use super::compound::apply_compound_rules;
use super::types::Insight;
use super::{
    LocationConcentrationDetector, MarginSpreadDetector, PricingInconsistencyDetector,
    RevenueBelowTypicalDetector, RevenueDeclineDetector, SeasonalVolatilityDetector,
    UnderperformingProductsDetector,
};

/// Context provided to detectors
pub struct AnalysisContext<'a> {
    /// Aggregated historical data for this pass
    pub dataset: &'a AggregatedDataset,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(dataset: &'a AggregatedDataset) -> Self {
        Self { dataset }
    }
}

/// Signal that a detector lacks the data it needs; the engine skips it
pub fn insufficient(detector: &str, message: impl std::fmt::Display) -> Error {
    Error::InsufficientData(format!("{}: {}", detector, message))
}

/// Trait for pattern detectors
pub trait Detector: Send + Sync {
    /// Id of the insight this detector emits
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Examine the dataset; `Ok(None)` when the pattern is absent
    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Option<Insight>>;
}

/// The main insight engine that orchestrates analysis
pub struct InsightEngine {
    detectors: Vec<Box<dyn Detector>>,
    config: InsightConfig,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new(InsightConfig::default())
    }
}

impl InsightEngine {
    /// Create a new insight engine with the built-in detectors
    pub fn new(config: InsightConfig) -> Self {
        let mut engine = Self {
            detectors: vec![],
            config,
        };

        engine.register(Box::new(RevenueDeclineDetector));
        engine.register(Box::new(RevenueBelowTypicalDetector));
        engine.register(Box::new(UnderperformingProductsDetector));
        engine.register(Box::new(MarginSpreadDetector));
        engine.register(Box::new(LocationConcentrationDetector));
        engine.register(Box::new(SeasonalVolatilityDetector));
        engine.register(Box::new(PricingInconsistencyDetector));

        engine
    }

    /// Register a detector
    pub fn register(&mut self, detector: Box<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Run every detector and collect base insights, scored but unranked
    pub fn detect_all(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        let mut insights = vec![];

        for detector in &self.detectors {
            match detector.detect(ctx) {
                Ok(Some(mut insight)) => {
                    insight.priority_score = self.priority(&insight);
                    tracing::debug!(
                        detector = detector.id(),
                        severity = insight.severity.as_str(),
                        "Pattern detected"
                    );
                    insights.push(insight);
                }
                Ok(None) => {
                    tracing::debug!(detector = detector.id(), "Pattern absent");
                }
                Err(Error::InsufficientData(reason)) => {
                    tracing::debug!(detector = detector.id(), %reason, "Category skipped");
                }
                Err(e) => {
                    tracing::warn!(
                        detector = detector.id(),
                        error = %e,
                        "Detector failed"
                    );
                }
            }
        }

        insights
    }

    /// Base and compound insights, highest priority first (not truncated)
    pub fn rank_all(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        let mut insights = self.detect_all(ctx);
        let compounds = apply_compound_rules(&insights, self.config.compound_boost);
        insights.extend(compounds);
        rank(&mut insights);
        insights
    }

    /// The top `max_insights` insights for a dataset
    pub fn generate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        let mut insights = self.rank_all(ctx);
        let total = insights.len();
        insights.truncate(self.config.max_insights);
        tracing::debug!(total, kept = insights.len(), "Insights prioritized");
        insights
    }

    /// `100 × (w_impact × impact + w_urgency × urgency + w_feasibility × feasibility)`
    pub fn priority(&self, insight: &Insight) -> f64 {
        100.0
            * (self.config.impact_weight * insight.impact
                + self.config.urgency_weight * insight.urgency
                + self.config.feasibility_weight * insight.feasibility)
    }
}

/// Sort by priority (highest first), then by id
pub fn rank(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.id.cmp(&b.id))
    });
}
