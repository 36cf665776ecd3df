//! Insight Engine - prioritized business insights from aggregate sales
//!
//! Each pass segments the aggregated dataset, runs one detector per pattern,
//! classifies severity relative to the dataset itself, layers compound
//! insights over co-occurring patterns, and keeps the highest-priority few.
//!
//! ## Detectors
//!
//! - **revenue_decline** / **revenue_below_typical** - monthly revenue trend
//! - **underperforming_products** / **margin_spread** - product mix
//! - **location_concentration** - dependence on the top locations
//! - **seasonal_volatility** - calendar-month peak/trough ratio
//! - **pricing_inconsistency** - unit price variation per product
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bizsight_core::insights::{AnalysisContext, InsightEngine};
//!
//! let engine = InsightEngine::new(config.insights.clone());
//! let insights = engine.generate(&AnalysisContext::new(&snapshot.dataset));
//! ```

pub mod compound;
pub mod engine;
pub mod locations;
pub mod pricing;
pub mod products;
pub mod revenue;
pub mod seasonality;
pub mod severity;
pub mod types;

pub use compound::{apply_compound_rules, CompoundRule, COMPOUND_RULES};
pub use engine::{AnalysisContext, Detector, InsightEngine};
pub use locations::LocationConcentrationDetector;
pub use pricing::PricingInconsistencyDetector;
pub use products::{MarginSpreadDetector, UnderperformingProductsDetector};
pub use revenue::{RevenueBelowTypicalDetector, RevenueDeclineDetector};
pub use seasonality::SeasonalVolatilityDetector;
pub use severity::{percentile_rank, severity_from_percentile};
pub use types::{Insight, InsightCategory, QuantifiedPrediction, Severity};
