//! Decision engine: the single entry point over every analysis
//!
//! Each call pins the current reference snapshot once, so a concurrent
//! `reload` never changes data halfway through a request.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::data::DataProvider;
use crate::error::{Error, Result};
use crate::feedback::{
    FeedbackRecord, FeedbackStore, FeedbackSummary, MemoryFeedbackStore, NewFeedback,
};
use crate::forecast::{Forecast, ForecastEngine, ForecastRequest, LocationScope, MultiForecast};
use crate::insights::{AnalysisContext, Insight, InsightEngine};
use crate::models::{Frequency, Metric, TransactionRecord};
use crate::prediction::{PredictionResult, PredictionService};
use crate::scenario::{ScenarioEngine, ScenarioPoint, ScenarioResult, SimulateOptions};
use crate::snapshot::{ReferenceDataSnapshot, SnapshotHandle};

pub struct DecisionEngine {
    snapshot: SnapshotHandle,
    config: EngineConfig,
    insights: InsightEngine,
    feedback: Arc<dyn FeedbackStore>,
}

impl DecisionEngine {
    /// Engine over a loaded snapshot with an in-memory feedback store
    pub fn new(snapshot: ReferenceDataSnapshot, config: EngineConfig) -> Result<Self> {
        Self::with_feedback_store(snapshot, config, Arc::new(MemoryFeedbackStore::new()))
    }

    pub fn with_feedback_store(
        snapshot: ReferenceDataSnapshot,
        config: EngineConfig,
        feedback: Arc<dyn FeedbackStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            snapshot: SnapshotHandle::new(snapshot),
            insights: InsightEngine::new(config.insights.clone()),
            config,
            feedback,
        })
    }

    /// Load the model and dataset, then build the engine
    pub fn load(
        provider: &dyn DataProvider,
        model_path: &Path,
        config: EngineConfig,
        feedback: Arc<dyn FeedbackStore>,
    ) -> Result<Self> {
        let snapshot = ReferenceDataSnapshot::load(provider, model_path)?;
        Self::with_feedback_store(snapshot, config, feedback)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The snapshot requests currently see
    pub fn snapshot(&self) -> Arc<ReferenceDataSnapshot> {
        self.snapshot.current()
    }

    fn service(&self) -> PredictionService {
        PredictionService::new(self.snapshot.current())
    }

    pub fn predict(&self, record: &TransactionRecord) -> Result<PredictionResult> {
        self.service().predict(record)
    }

    pub fn predict_batch(&self, records: &[TransactionRecord]) -> Vec<Result<PredictionResult>> {
        self.service().predict_batch(records)
    }

    pub fn simulate(
        &self,
        record: &TransactionRecord,
        options: &SimulateOptions,
    ) -> Result<ScenarioResult> {
        ScenarioEngine::new(self.service(), &self.config).simulate(record, options)
    }

    pub fn optimize(
        &self,
        record: &TransactionRecord,
        metric: Metric,
        options: &SimulateOptions,
    ) -> Result<ScenarioPoint> {
        ScenarioEngine::new(self.service(), &self.config).optimize(record, metric, options)
    }

    /// Sweep options from configuration
    pub fn simulate_options(&self) -> SimulateOptions {
        SimulateOptions::simulate(&self.config.scenario)
    }

    pub fn optimize_options(&self) -> SimulateOptions {
        SimulateOptions::optimize(&self.config.scenario)
    }

    pub fn forecast(&self, request: &ForecastRequest) -> Result<Forecast> {
        ForecastEngine::new(self.service(), &self.config).forecast(request)
    }

    pub fn forecast_multiple(
        &self,
        products: &[String],
        scope: &LocationScope,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
    ) -> MultiForecast {
        ForecastEngine::new(self.service(), &self.config)
            .forecast_multiple(products, scope, start, end, frequency)
    }

    /// A product's historical average price and cost (config defaults when unknown)
    pub fn typical_amounts(&self, product_id: &str) -> (f64, f64) {
        ForecastEngine::new(self.service(), &self.config).typical_amounts(product_id)
    }

    /// Ranked insights for the current dataset, at most `max_insights`
    pub fn generate_insights(&self) -> Vec<Insight> {
        let snapshot = self.snapshot.current();
        self.insights
            .generate(&AnalysisContext::new(&snapshot.dataset))
    }

    /// Open pending feedback for every insight with a quantified prediction
    ///
    /// Insights with a pending record are left alone; once that record is
    /// resolved, the next pass opens a new one. Returns the records opened by
    /// this call.
    pub fn track_insights(&self, insights: &[Insight]) -> Result<Vec<FeedbackRecord>> {
        let mut opened = Vec::new();
        for insight in insights {
            let Some(prediction) = &insight.expected_impact else {
                continue;
            };
            let feedback = NewFeedback::new(
                insight.id.clone(),
                prediction.value,
                prediction.prediction_type.clone(),
                self.config.insights.tracking_period_weeks,
            );
            match self.feedback.insert(&feedback) {
                Ok(record) => {
                    info!(
                        insight = %record.insight_id,
                        predicted = record.predicted_value,
                        due = %record.due_at().format("%Y-%m-%d"),
                        "Tracking insight prediction"
                    );
                    opened.push(record);
                }
                Err(Error::FeedbackAlreadyTracked(id)) => {
                    debug!(insight = %id, "Insight already has a pending prediction");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(opened)
    }

    pub fn record_feedback(
        &self,
        insight_id: &str,
        predicted_value: f64,
        prediction_type: &str,
        tracking_period_weeks: u32,
    ) -> Result<FeedbackRecord> {
        let record = self.feedback.insert(&NewFeedback::new(
            insight_id,
            predicted_value,
            prediction_type,
            tracking_period_weeks,
        ))?;
        info!(insight = %insight_id, "Feedback record opened");
        Ok(record)
    }

    /// Resolve a pending record, returning its accuracy (0-100)
    pub fn resolve_feedback(&self, insight_id: &str, actual: f64) -> Result<f64> {
        let record = self.feedback.resolve(insight_id, actual, Utc::now())?;
        let accuracy = record.accuracy_pct.unwrap_or(0.0);
        info!(
            insight = %insight_id,
            predicted = record.predicted_value,
            actual,
            accuracy_pct = accuracy,
            "Feedback resolved"
        );
        Ok(accuracy)
    }

    pub fn feedback_records(&self) -> Result<Vec<FeedbackRecord>> {
        self.feedback.list(None)
    }

    /// Every prediction tracked for one insight, oldest first
    pub fn feedback_history(&self, insight_id: &str) -> Result<Vec<FeedbackRecord>> {
        self.feedback.history(insight_id)
    }

    pub fn feedback_due(&self, as_of: DateTime<Utc>) -> Result<Vec<FeedbackRecord>> {
        self.feedback.due(as_of)
    }

    pub fn feedback_summary(&self) -> Result<FeedbackSummary> {
        self.feedback.summary(Utc::now())
    }

    /// Rebuild the snapshot from source and swap it in
    ///
    /// On failure the current snapshot stays in place.
    pub fn reload(&self, provider: &dyn DataProvider, model_path: &Path) -> Result<()> {
        self.snapshot.reload(provider, model_path)
    }

    /// Swap in an already-built snapshot
    pub fn replace_snapshot(&self, snapshot: ReferenceDataSnapshot) {
        self.snapshot.replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{example_record, sample_model, sample_rows, struggling_rows};

    fn engine() -> DecisionEngine {
        DecisionEngine::new(
            ReferenceDataSnapshot::new(sample_model(), &sample_rows()),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_matches_service() {
        let engine = engine();
        let direct = PredictionService::new(engine.snapshot())
            .predict(&example_record())
            .unwrap();
        assert_eq!(engine.predict(&example_record()).unwrap(), direct);
    }

    #[test]
    fn test_track_insights_once() {
        let engine = engine();
        engine.replace_snapshot(ReferenceDataSnapshot::new(sample_model(), &struggling_rows()));

        let insights = engine.generate_insights();
        let quantified = insights
            .iter()
            .filter(|i| i.expected_impact.is_some())
            .count();
        assert!(quantified > 0);

        let opened = engine.track_insights(&insights).unwrap();
        assert_eq!(opened.len(), quantified);
        // A second pass opens nothing new
        assert!(engine.track_insights(&insights).unwrap().is_empty());
        assert_eq!(engine.feedback_summary().unwrap().pending, quantified);
    }

    #[test]
    fn test_tracking_resumes_after_resolution() {
        let engine = engine();
        engine.replace_snapshot(ReferenceDataSnapshot::new(sample_model(), &struggling_rows()));
        let insights = engine.generate_insights();

        let first = engine.track_insights(&insights).unwrap();
        assert!(!first.is_empty());
        for record in &first {
            engine
                .resolve_feedback(&record.insight_id, record.predicted_value)
                .unwrap();
        }

        let second = engine.track_insights(&insights).unwrap();
        let ids = |records: &[FeedbackRecord]| {
            records.iter().map(|r| r.insight_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&second), ids(&first));
        assert!(engine.track_insights(&insights).unwrap().is_empty());

        let history = engine.feedback_history(&first[0].insight_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].accuracy_pct, Some(100.0));
        assert_eq!(history[1].status, crate::feedback::FeedbackStatus::Pending);

        let summary = engine.feedback_summary().unwrap();
        assert_eq!(summary.resolved, first.len());
        assert_eq!(summary.pending, first.len());
    }

    #[test]
    fn test_resolve_feedback_returns_accuracy() {
        let engine = engine();
        engine
            .record_feedback("revenue_decline", 1000.0, "annual_revenue_increase", 12)
            .unwrap();
        let accuracy = engine.resolve_feedback("revenue_decline", 900.0).unwrap();
        assert!((accuracy - 90.0).abs() < 1e-9);
        assert!(matches!(
            engine.resolve_feedback("revenue_decline", 900.0),
            Err(Error::FeedbackAlreadyResolved(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.insights.max_insights = 0;
        assert!(matches!(
            DecisionEngine::new(ReferenceDataSnapshot::new(sample_model(), &[]), config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
