//! Feedback tracking for quantified insight predictions
//!
//! An insight that predicts an outcome ("about 4,000 more revenue a year")
//! opens a pending record. Once its tracking period has passed, the observed
//! actual is supplied and the record is resolved exactly once with an accuracy
//! score. Records are never deleted or overwritten.
//!
//! An insight id has at most one pending record at a time. After it resolves,
//! a later pass that detects the same pattern opens a fresh record, so the
//! store keeps a history of predictions per insight.
//!
//! Storage sits behind [`FeedbackStore`]:
//! - `memory` - mutex-guarded map (tests, embedding)
//! - `sqlite` - pooled SQLite file

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod memory;
mod sqlite;

pub use memory::MemoryFeedbackStore;
pub use sqlite::SqliteFeedbackStore;

/// Longest tracking period accepted (ten years)
pub const MAX_TRACKING_PERIOD_WEEKS: u32 = 520;

/// Lifecycle of a feedback record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    /// Waiting for the tracking period to pass and an actual to be supplied
    Pending,
    /// Actual recorded and accuracy computed
    Resolved,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FeedbackStatus::Pending),
            "resolved" => Ok(FeedbackStatus::Resolved),
            _ => Err(format!("Unknown feedback status: {}", s)),
        }
    }
}

/// Data for opening a feedback record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub insight_id: String,
    pub predicted_value: f64,
    pub prediction_type: String,
    pub tracking_period_weeks: u32,
    pub predicted_at: DateTime<Utc>,
}

impl NewFeedback {
    pub fn new(
        insight_id: impl Into<String>,
        predicted_value: f64,
        prediction_type: impl Into<String>,
        tracking_period_weeks: u32,
    ) -> Self {
        Self {
            insight_id: insight_id.into(),
            predicted_value,
            prediction_type: prediction_type.into(),
            tracking_period_weeks,
            predicted_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.insight_id.trim().is_empty() {
            return Err(Error::validation("insight_id", "must not be empty"));
        }
        if !self.predicted_value.is_finite() {
            return Err(Error::validation(
                "predicted_value",
                format!("{} is not a finite number", self.predicted_value),
            ));
        }
        if self.tracking_period_weeks == 0
            || self.tracking_period_weeks > MAX_TRACKING_PERIOD_WEEKS
        {
            return Err(Error::validation(
                "tracking_period_weeks",
                format!(
                    "{} is not between 1 and {}",
                    self.tracking_period_weeks, MAX_TRACKING_PERIOD_WEEKS
                ),
            ));
        }
        Ok(())
    }

    /// The pending record this creates
    pub fn into_record(self) -> FeedbackRecord {
        FeedbackRecord {
            insight_id: self.insight_id,
            predicted_value: self.predicted_value,
            prediction_type: self.prediction_type,
            predicted_at: self.predicted_at,
            tracking_period_weeks: self.tracking_period_weeks,
            status: FeedbackStatus::Pending,
            actual_value: None,
            accuracy_pct: None,
            resolved_at: None,
        }
    }
}

/// A tracked prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub insight_id: String,
    pub predicted_value: f64,
    pub prediction_type: String,
    pub predicted_at: DateTime<Utc>,
    pub tracking_period_weeks: u32,
    pub status: FeedbackStatus,
    pub actual_value: Option<f64>,
    /// 0-100
    pub accuracy_pct: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl FeedbackRecord {
    /// When the tracking period ends
    ///
    /// Saturates at the latest representable time for periods that were
    /// stored before the upper bound existed.
    pub fn due_at(&self) -> DateTime<Utc> {
        Duration::try_weeks(i64::from(self.tracking_period_weeks))
            .and_then(|period| self.predicted_at.checked_add_signed(period))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Pending and past its tracking period
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.status == FeedbackStatus::Pending && self.due_at() <= as_of
    }

    /// Resolved copy of this record
    fn resolved(&self, actual: f64, resolved_at: DateTime<Utc>) -> FeedbackRecord {
        FeedbackRecord {
            status: FeedbackStatus::Resolved,
            actual_value: Some(actual),
            accuracy_pct: Some(accuracy(self.predicted_value, actual) * 100.0),
            resolved_at: Some(resolved_at),
            ..self.clone()
        }
    }
}

/// `1 − |actual − predicted| / |predicted|`, clamped to 0-1
///
/// A prediction of zero is exact only when the actual is also zero.
pub fn accuracy(predicted: f64, actual: f64) -> f64 {
    if predicted == 0.0 {
        return if actual == 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - (actual - predicted).abs() / predicted.abs()).clamp(0.0, 1.0)
}

fn validate_actual(actual: f64) -> Result<()> {
    if actual.is_finite() {
        Ok(())
    } else {
        Err(Error::validation(
            "actual_value",
            format!("{} is not a finite number", actual),
        ))
    }
}

/// Counts and accuracy across all records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
    /// Pending records past their tracking period
    pub due: usize,
    pub mean_accuracy_pct: Option<f64>,
}

impl FeedbackSummary {
    pub fn from_records(records: &[FeedbackRecord], as_of: DateTime<Utc>) -> Self {
        let accuracies: Vec<f64> = records.iter().filter_map(|r| r.accuracy_pct).collect();
        let resolved = records
            .iter()
            .filter(|r| r.status == FeedbackStatus::Resolved)
            .count();
        Self {
            total: records.len(),
            pending: records.len() - resolved,
            resolved,
            due: records.iter().filter(|r| r.is_due(as_of)).count(),
            mean_accuracy_pct: if accuracies.is_empty() {
                None
            } else {
                Some(accuracies.iter().sum::<f64>() / accuracies.len() as f64)
            },
        }
    }
}

/// Storage for feedback records
///
/// Implementations must make `insert` fail rather than overwrite, and make
/// `resolve` a compare-and-swap on the pending status so two concurrent
/// resolutions of one record cannot both succeed.
pub trait FeedbackStore: Send + Sync {
    /// Open a pending record
    ///
    /// Fails with `FeedbackAlreadyTracked` while the insight still has a
    /// pending record; resolved records do not block a new one.
    fn insert(&self, feedback: &NewFeedback) -> Result<FeedbackRecord>;

    /// Resolve the insight's pending record with an observed actual
    ///
    /// `FeedbackAlreadyResolved` when the insight only has resolved records,
    /// `FeedbackNotFound` when it has none.
    fn resolve(
        &self,
        insight_id: &str,
        actual: f64,
        resolved_at: DateTime<Utc>,
    ) -> Result<FeedbackRecord>;

    /// The insight's most recent record
    fn get(&self, insight_id: &str) -> Result<Option<FeedbackRecord>>;

    /// Every record for one insight, oldest first
    fn history(&self, insight_id: &str) -> Result<Vec<FeedbackRecord>> {
        Ok(self
            .list(None)?
            .into_iter()
            .filter(|r| r.insight_id == insight_id)
            .collect())
    }

    /// Records oldest first, optionally filtered by status
    fn list(&self, status: Option<FeedbackStatus>) -> Result<Vec<FeedbackRecord>>;

    /// Pending records whose tracking period has passed
    fn due(&self, as_of: DateTime<Utc>) -> Result<Vec<FeedbackRecord>> {
        Ok(self
            .list(Some(FeedbackStatus::Pending))?
            .into_iter()
            .filter(|r| r.is_due(as_of))
            .collect())
    }

    fn summary(&self, as_of: DateTime<Utc>) -> Result<FeedbackSummary> {
        Ok(FeedbackSummary::from_records(&self.list(None)?, as_of))
    }
}
