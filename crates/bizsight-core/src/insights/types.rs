//! Core types for the Insight Engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity level of an insight, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth knowing, no action needed yet
    Low,
    /// Worth attention but not urgent
    Medium,
    /// Should be addressed soon
    High,
    /// Requires immediate attention
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// One level more severe, saturating at critical
    pub fn raised(&self) -> Severity {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Business area an insight concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Revenue,
    Products,
    Margins,
    Locations,
    Seasonality,
    Pricing,
    /// Two or more co-occurring base insights
    Compound,
}

impl InsightCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::Revenue => "revenue",
            InsightCategory::Products => "products",
            InsightCategory::Margins => "margins",
            InsightCategory::Locations => "locations",
            InsightCategory::Seasonality => "seasonality",
            InsightCategory::Pricing => "pricing",
            InsightCategory::Compound => "compound",
        }
    }
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A forecast an insight makes about its own outcome, tracked for accuracy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantifiedPrediction {
    /// Predicted amount (e.g. annual revenue recovered)
    pub value: f64,
    /// What `value` measures (e.g. "annual_revenue_increase")
    pub prediction_type: String,
    pub description: String,
}

/// An insight produced by one analysis pass (never persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Stable identifier of the detected pattern (e.g. "revenue_decline")
    pub id: String,
    pub category: InsightCategory,
    pub severity: Severity,
    /// Short title (e.g. "Revenue Declining")
    pub title: String,
    /// One-line summary
    pub summary: String,
    /// Pattern-specific measurements
    pub metrics: serde_json::Value,
    pub recommended_action: String,
    /// Impact, urgency and feasibility in 0-1, combined into `priority_score`
    pub impact: f64,
    pub urgency: f64,
    pub feasibility: f64,
    pub priority_score: f64,
    /// Base insight ids that triggered a compound insight
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constituents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_impact: Option<QuantifiedPrediction>,
}

impl Insight {
    /// Create a new insight with neutral scores
    pub fn new(
        id: impl Into<String>,
        category: InsightCategory,
        severity: Severity,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            severity,
            title: title.into(),
            summary: summary.into(),
            metrics: serde_json::Value::Null,
            recommended_action: String::new(),
            impact: 0.5,
            urgency: 0.5,
            feasibility: 0.5,
            priority_score: 0.0,
            constituents: Vec::new(),
            expected_impact: None,
        }
    }

    /// Add structured measurements
    pub fn with_metrics(mut self, metrics: serde_json::Value) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.recommended_action = action.into();
        self
    }

    /// Set impact, urgency and feasibility, each clamped to 0-1
    pub fn with_scores(mut self, impact: f64, urgency: f64, feasibility: f64) -> Self {
        let unit = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        self.impact = unit(impact);
        self.urgency = unit(urgency);
        self.feasibility = unit(feasibility);
        self
    }

    /// Attach a quantified outcome prediction
    pub fn with_expected_impact(
        mut self,
        value: f64,
        prediction_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.expected_impact = Some(QuantifiedPrediction {
            value,
            prediction_type: prediction_type.into(),
            description: description.into(),
        });
        self
    }

    pub fn is_compound(&self) -> bool {
        !self.constituents.is_empty()
    }
}
