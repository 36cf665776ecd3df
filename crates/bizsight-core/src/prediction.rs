//! Prediction service: features → model → derived business figures

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::features::{build_features, require_amount, FeatureVector};
use crate::models::TransactionRecord;
use crate::snapshot::ReferenceDataSnapshot;

/// Revenue prediction and the figures derived from it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_revenue: f64,
    /// `predicted_revenue / unit_price`. A heuristic, not a modeled quantity:
    /// it inherits all of the revenue model's error and is zero when the
    /// price is zero.
    pub estimated_quantity: f64,
    pub total_cost: f64,
    pub profit: f64,
    pub profit_margin_pct: f64,
}

impl PredictionResult {
    /// Derive quantity, cost and profit from a revenue figure
    pub fn from_revenue(predicted_revenue: f64, unit_price: f64, unit_cost: f64) -> Self {
        let estimated_quantity = if unit_price > 0.0 {
            predicted_revenue / unit_price
        } else {
            0.0
        };
        Self::from_quantity(predicted_revenue, estimated_quantity, unit_cost)
    }

    /// Derive cost and profit from an already-estimated quantity
    pub fn from_quantity(predicted_revenue: f64, estimated_quantity: f64, unit_cost: f64) -> Self {
        let total_cost = estimated_quantity * unit_cost;
        let profit = predicted_revenue - total_cost;
        let profit_margin_pct = if predicted_revenue > 0.0 {
            profit / predicted_revenue * 100.0
        } else {
            0.0
        };
        Self {
            predicted_revenue,
            estimated_quantity,
            total_cost,
            profit,
            profit_margin_pct,
        }
    }
}

/// Turns transaction records into revenue predictions against one snapshot
#[derive(Debug, Clone)]
pub struct PredictionService {
    snapshot: Arc<ReferenceDataSnapshot>,
}

impl PredictionService {
    pub fn new(snapshot: Arc<ReferenceDataSnapshot>) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &ReferenceDataSnapshot {
        &self.snapshot
    }

    /// Features for a record, as the model will see them
    pub fn features(&self, record: &TransactionRecord) -> Result<FeatureVector> {
        build_features(record, &self.snapshot.reference, self.snapshot.vocabulary())
    }

    /// Raw model output for a record, before any flooring
    pub fn raw_revenue(&self, record: &TransactionRecord) -> Result<f64> {
        let features = self.features(record)?;
        Ok(self.snapshot.model.regressor.predict(&features))
    }

    /// Predict revenue and derived figures for one record
    pub fn predict(&self, record: &TransactionRecord) -> Result<PredictionResult> {
        let raw = self.raw_revenue(record)?;
        // Features already validated both amounts
        let unit_price = require_amount("unit_price", record.unit_price)?;
        let unit_cost = require_amount("unit_cost", record.unit_cost)?;

        let predicted_revenue = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
        Ok(PredictionResult::from_revenue(
            predicted_revenue,
            unit_price,
            unit_cost,
        ))
    }

    /// Predict many records; results keep input order and one failure does not
    /// affect the others
    pub fn predict_batch(&self, records: &[TransactionRecord]) -> Vec<Result<PredictionResult>> {
        records
            .par_iter()
            .enumerate()
            .map(|(index, record)| {
                let result = self.predict(record);
                if let Err(e) = &result {
                    warn!(index, error = %e, "Batch record failed");
                }
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_utils::{example_record, sample_snapshot};

    #[test]
    fn test_predict_derives_profit() {
        let service = PredictionService::new(sample_snapshot());
        let result = service.predict(&example_record()).unwrap();

        assert!(result.predicted_revenue > 0.0);
        assert!((result.estimated_quantity - result.predicted_revenue / 100.0).abs() < 1e-9);
        let expected_profit = result.predicted_revenue - result.estimated_quantity * 50.0;
        assert!((result.profit - expected_profit).abs() < 1e-9);
        assert!((result.profit_margin_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let service = PredictionService::new(sample_snapshot());
        let a = service.predict(&example_record()).unwrap();
        let b = service.predict(&example_record()).unwrap();
        assert_eq!(a.predicted_revenue.to_bits(), b.predicted_revenue.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors_bubble_up_unchanged() {
        let service = PredictionService::new(sample_snapshot());

        let mut record = example_record();
        record.location = "Atlantis".to_string();
        assert!(matches!(
            service.predict(&record),
            Err(Error::UnknownCategory { .. })
        ));

        let mut record = example_record();
        record.unit_cost = None;
        assert!(matches!(
            service.predict(&record),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_batch_preserves_order_and_isolates_failures() {
        let service = PredictionService::new(sample_snapshot());
        let good = example_record();
        let mut bad = example_record();
        bad.product_id = "nope".to_string();
        let cheaper = good.with_unit_price(60.0);

        let results = service.predict_batch(&[good.clone(), bad, cheaper.clone()]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &service.predict(&good).unwrap());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), &service.predict(&cheaper).unwrap());
    }

    #[test]
    fn test_zero_price_yields_zero_quantity() {
        let result = PredictionResult::from_revenue(100.0, 0.0, 5.0);
        assert_eq!(result.estimated_quantity, 0.0);
        assert_eq!(result.profit, 100.0);
    }
}
