//! In-memory feedback store

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{validate_actual, FeedbackRecord, FeedbackStatus, FeedbackStore, NewFeedback};
use crate::error::{Error, Result};

/// Feedback records held in a mutex-guarded list, in insertion order
#[derive(Debug, Default)]
pub struct MemoryFeedbackStore {
    records: Mutex<Vec<FeedbackRecord>>,
}

fn is_pending_for(record: &FeedbackRecord, insight_id: &str) -> bool {
    record.insight_id == insight_id && record.status == FeedbackStatus::Pending
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackStore for MemoryFeedbackStore {
    fn insert(&self, feedback: &NewFeedback) -> Result<FeedbackRecord> {
        feedback.validate()?;
        let mut records = self.records.lock();
        if records.iter().any(|r| is_pending_for(r, &feedback.insight_id)) {
            return Err(Error::FeedbackAlreadyTracked(feedback.insight_id.clone()));
        }
        let record = feedback.clone().into_record();
        records.push(record.clone());
        Ok(record)
    }

    fn resolve(
        &self,
        insight_id: &str,
        actual: f64,
        resolved_at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        validate_actual(actual)?;
        // Check and update under one lock
        let mut records = self.records.lock();
        match records.iter().position(|r| is_pending_for(r, insight_id)) {
            Some(idx) => {
                let record = &mut records[idx];
                *record = record.resolved(actual, resolved_at);
                Ok(record.clone())
            }
            None if records.iter().any(|r| r.insight_id == insight_id) => {
                Err(Error::FeedbackAlreadyResolved(insight_id.to_string()))
            }
            None => Err(Error::FeedbackNotFound(insight_id.to_string())),
        }
    }

    fn get(&self, insight_id: &str) -> Result<Option<FeedbackRecord>> {
        // Later entries win ties on predicted_at
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.insight_id == insight_id)
            .max_by_key(|r| r.predicted_at)
            .cloned())
    }

    fn list(&self, status: Option<FeedbackStatus>) -> Result<Vec<FeedbackRecord>> {
        let mut records: Vec<FeedbackRecord> = self
            .records
            .lock()
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal keys
        records.sort_by(|a, b| {
            a.predicted_at
                .cmp(&b.predicted_at)
                .then_with(|| a.insight_id.cmp(&b.insight_id))
        });
        Ok(records)
    }
}
