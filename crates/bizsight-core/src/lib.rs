//! Bizsight Core Library
//!
//! Decision support for a small business selling products across locations:
//! - Feature engineering and revenue prediction from a trained model artifact
//! - Price scenario simulation and optimization
//! - Date-range forecasts with confidence bands
//! - Prioritized business insights with compound patterns
//! - Feedback tracking for quantified insight predictions (memory or SQLite)

pub mod aggregate;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod feedback;
pub mod forecast;
pub mod insights;
pub mod model;
pub mod models;
pub mod prediction;
pub mod reference;
pub mod scenario;
pub mod snapshot;
pub mod vocabulary;

/// Fixture dataset and in-code model artifact
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::AggregatedDataset;
pub use config::{EngineConfig, ForecastConfig, InsightConfig, PredictionConfig, ScenarioConfig};
pub use data::{CsvDataProvider, DataProvider, MemoryDataProvider};
pub use engine::DecisionEngine;
pub use error::{Error, Result};
pub use features::{FeatureVector, FEATURE_NAMES};
pub use feedback::{
    FeedbackRecord, FeedbackStatus, FeedbackStore, FeedbackSummary, MemoryFeedbackStore,
    NewFeedback, SqliteFeedbackStore, MAX_TRACKING_PERIOD_WEEKS,
};
pub use forecast::{
    Forecast, ForecastEngine, ForecastPoint, ForecastRequest, ForecastSummary, LocationScope,
    MultiForecast, Trend,
};
pub use insights::{Insight, InsightCategory, InsightEngine, Severity};
pub use model::{LoadedModel, ModelArtifact, Regressor};
pub use models::{Frequency, Metric, SalesRow, Season, TransactionRecord};
pub use prediction::{PredictionResult, PredictionService};
pub use scenario::{
    ScenarioEngine, ScenarioPoint, ScenarioResult, ScenarioWarning, SimulateOptions,
};
pub use snapshot::{ReferenceDataSnapshot, SnapshotHandle};
pub use vocabulary::{CategoryField, CategoryVocabulary};
