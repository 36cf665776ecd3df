//! Immutable reference data snapshot with atomic reload
//!
//! Every request pins one `Arc<ReferenceDataSnapshot>` for its whole duration.
//! A reload builds a complete new snapshot first and then swaps the pointer, so
//! in-flight requests never observe a mix of old and new data.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::aggregate::AggregatedDataset;
use crate::data::DataProvider;
use crate::error::Result;
use crate::model::{LoadedModel, ModelArtifact};
use crate::models::SalesRow;
use crate::reference::ReferenceStats;
use crate::vocabulary::{CategoryField, CategoryVocabulary};

/// Everything a request needs, loaded once and never mutated
#[derive(Debug)]
pub struct ReferenceDataSnapshot {
    pub model: LoadedModel,
    pub reference: ReferenceStats,
    pub dataset: AggregatedDataset,
    pub loaded_at: DateTime<Utc>,
}

impl ReferenceDataSnapshot {
    /// Build a snapshot from a loaded model and historical rows
    pub fn new(model: LoadedModel, rows: &[SalesRow]) -> Self {
        warn_on_untrained_categories(&model.vocabulary, &CategoryVocabulary::from_rows(rows));
        Self {
            reference: ReferenceStats::from_rows(rows),
            dataset: AggregatedDataset::from_rows(rows),
            model,
            loaded_at: Utc::now(),
        }
    }

    /// Load the model artifact and the provider's dataset
    pub fn load(provider: &dyn DataProvider, model_path: &Path) -> Result<Self> {
        let model = ModelArtifact::load(model_path)?;
        let rows = provider.sales()?;
        let snapshot = Self::new(model, &rows);
        info!(
            rows = rows.len(),
            months = snapshot.dataset.monthly.len(),
            "Reference snapshot built"
        );
        Ok(snapshot)
    }

    /// The trained vocabulary (model encoders)
    pub fn vocabulary(&self) -> &CategoryVocabulary {
        &self.model.vocabulary
    }
}

/// Categories in the data the model was never trained on cannot be predicted
fn warn_on_untrained_categories(trained: &CategoryVocabulary, observed: &CategoryVocabulary) {
    let unknown_locations: Vec<&String> = observed
        .locations()
        .iter()
        .filter(|l| !trained.contains(CategoryField::Location, l))
        .collect();
    let unknown_products: Vec<&String> = observed
        .products()
        .iter()
        .filter(|p| !trained.contains(CategoryField::Product, p))
        .collect();

    if !unknown_locations.is_empty() || !unknown_products.is_empty() {
        warn!(
            locations = ?unknown_locations,
            products = ?unknown_products,
            "Dataset contains categories outside the model vocabulary"
        );
    }
}

/// Shared handle to the current snapshot
#[derive(Debug)]
pub struct SnapshotHandle {
    current: RwLock<Arc<ReferenceDataSnapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: ReferenceDataSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Pin the current snapshot
    pub fn current(&self) -> Arc<ReferenceDataSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new snapshot, returning the previous one
    pub fn replace(&self, snapshot: ReferenceDataSnapshot) -> Arc<ReferenceDataSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, next)
    }

    /// Rebuild from source and swap; on failure the current snapshot is kept
    pub fn reload(&self, provider: &dyn DataProvider, model_path: &Path) -> Result<()> {
        let snapshot = ReferenceDataSnapshot::load(provider, model_path)?;
        self.replace(snapshot);
        info!("Reference snapshot reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_model, sample_rows};

    #[test]
    fn test_pinned_snapshot_survives_replace() {
        let handle = SnapshotHandle::new(ReferenceDataSnapshot::new(sample_model(), &sample_rows()));
        let pinned = handle.current();
        let before = pinned.dataset.transactions;

        let old = handle.replace(ReferenceDataSnapshot::new(sample_model(), &[]));

        // The request that pinned the old snapshot still sees all of it
        assert_eq!(pinned.dataset.transactions, before);
        assert!(Arc::ptr_eq(&pinned, &old));
        assert_eq!(handle.current().dataset.transactions, 0);
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let handle = SnapshotHandle::new(ReferenceDataSnapshot::new(sample_model(), &sample_rows()));
        let provider = crate::data::MemoryDataProvider::new(vec![]);

        let result = handle.reload(&provider, Path::new("/nonexistent/model.json"));
        assert!(result.is_err());
        assert!(handle.current().dataset.transactions > 0);
    }
}
