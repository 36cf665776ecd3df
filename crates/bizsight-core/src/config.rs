//! Engine configuration
//!
//! Config is loaded with a layered resolution:
//! 1. An explicit path (must exist)
//! 2. The override in the data dir (~/.local/share/bizsight/engine.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Unknown keys are rejected rather than ignored, and every section falls back
//! to its defaults when omitted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::feedback::MAX_TRACKING_PERIOD_WEEKS;
use crate::models::Metric;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PredictionConfig {
    pub default_unit_price: f64,
    pub default_unit_cost: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            default_unit_price: 10.0,
            default_unit_cost: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScenarioConfig {
    pub min_price_factor: f64,
    pub max_price_factor: f64,
    pub simulate_steps: usize,
    pub optimize_steps: usize,
    /// Upper bound on the points of any one sweep
    pub max_steps: usize,
    pub metric: Metric,
    pub min_unit_price: f64,
    pub max_revenue_multiple: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            min_price_factor: 0.5,
            max_price_factor: 2.0,
            simulate_steps: 7,
            optimize_steps: 20,
            max_steps: 1000,
            metric: Metric::Revenue,
            min_unit_price: 0.01,
            max_revenue_multiple: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForecastConfig {
    pub confidence_level: f64,
    pub fallback_band_pct: f64,
    pub max_points: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.90,
            fallback_band_pct: 0.15,
            max_points: 3660,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct InsightConfig {
    pub max_insights: usize,
    pub impact_weight: f64,
    pub urgency_weight: f64,
    pub feasibility_weight: f64,
    pub compound_boost: f64,
    pub tracking_period_weeks: u32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            max_insights: 5,
            impact_weight: 0.5,
            urgency_weight: 0.3,
            feasibility_weight: 0.2,
            compound_boost: 15.0,
            tracking_period_weeks: 12,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    pub prediction: PredictionConfig,
    pub scenario: ScenarioConfig,
    pub forecast: ForecastConfig,
    pub insights: InsightConfig,
}

/// Default override location in the platform data dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("bizsight").join("engine.toml"))
}

/// Default SQLite feedback store in the platform data dir
pub fn default_feedback_db_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("bizsight").join("feedback.db"))
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
}

impl EngineConfig {
    /// Load configuration (explicit path, then data dir override, then embedded)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(p) => fs::read_to_string(p)
                .map_err(|e| invalid(format!("cannot read {}: {}", p.display(), e)))?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => {
                    debug!(path = %p.display(), "Using config override");
                    fs::read_to_string(&p)?
                }
                None => DEFAULT_CONFIG.to_string(),
            },
        };
        Self::parse(&content)
    }

    /// Embedded defaults
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let p = &self.prediction;
        if !(p.default_unit_price.is_finite() && p.default_unit_price >= 0.0) {
            return Err(invalid("prediction.default_unit_price must be a non-negative number"));
        }
        if !(p.default_unit_cost.is_finite() && p.default_unit_cost >= 0.0) {
            return Err(invalid("prediction.default_unit_cost must be a non-negative number"));
        }

        let s = &self.scenario;
        if s.max_steps == 0 {
            return Err(invalid("scenario.max_steps must be at least 1"));
        }
        validate_sweep(s.min_price_factor, s.max_price_factor, s.simulate_steps, s.max_steps)?;
        validate_sweep(s.min_price_factor, s.max_price_factor, s.optimize_steps, s.max_steps)?;
        if !(s.min_unit_price.is_finite() && s.min_unit_price > 0.0) {
            return Err(invalid("scenario.min_unit_price must be positive"));
        }
        if !(s.max_revenue_multiple.is_finite() && s.max_revenue_multiple > 1.0) {
            return Err(invalid("scenario.max_revenue_multiple must be greater than 1"));
        }

        let f = &self.forecast;
        if !(f.confidence_level > 0.0 && f.confidence_level < 1.0) {
            return Err(invalid(format!(
                "forecast.confidence_level {} must be between 0 and 1",
                f.confidence_level
            )));
        }
        if !(f.fallback_band_pct.is_finite() && f.fallback_band_pct >= 0.0) {
            return Err(invalid("forecast.fallback_band_pct must be non-negative"));
        }
        if f.max_points == 0 {
            return Err(invalid("forecast.max_points must be at least 1"));
        }

        let i = &self.insights;
        if i.max_insights == 0 {
            return Err(invalid("insights.max_insights must be at least 1"));
        }
        let weights = [i.impact_weight, i.urgency_weight, i.feasibility_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(invalid("insights weights must be non-negative and not all zero"));
        }
        if !(i.compound_boost.is_finite() && i.compound_boost >= 0.0) {
            return Err(invalid("insights.compound_boost must be non-negative"));
        }
        if i.tracking_period_weeks == 0 || i.tracking_period_weeks > MAX_TRACKING_PERIOD_WEEKS {
            return Err(invalid(format!(
                "insights.tracking_period_weeks must be between 1 and {}",
                MAX_TRACKING_PERIOD_WEEKS
            )));
        }
        Ok(())
    }
}

/// Validate a price sweep definition
pub fn validate_sweep(
    min_factor: f64,
    max_factor: f64,
    steps: usize,
    max_steps: usize,
) -> Result<()> {
    if !min_factor.is_finite() || !max_factor.is_finite() {
        return Err(Error::validation(
            "price_factor",
            format!("factors must be finite (got {} to {})", min_factor, max_factor),
        ));
    }
    if min_factor > max_factor {
        return Err(Error::validation(
            "min_price_factor",
            format!("{} is greater than max_price_factor {}", min_factor, max_factor),
        ));
    }
    if steps == 0 {
        return Err(Error::validation("steps", "must be at least 1"));
    }
    if steps > max_steps {
        return Err(Error::validation(
            "steps",
            format!("{} exceeds the limit of {}", steps, max_steps),
        ));
    }
    Ok(())
}
