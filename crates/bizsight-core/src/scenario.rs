//! Price scenario planning
//!
//! A sweep re-prices one record at evenly spaced multipliers of its base price
//! (cost held constant) and predicts each point. Degenerate points are clamped
//! and annotated rather than dropped.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{validate_sweep, EngineConfig, PredictionConfig, ScenarioConfig};
use crate::error::{Error, Result};
use crate::features::require_amount;
use crate::models::{Metric, TransactionRecord};
use crate::prediction::PredictionService;

/// Sweep parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulateOptions {
    pub min_factor: f64,
    pub max_factor: f64,
    pub steps: usize,
}

impl SimulateOptions {
    /// Defaults for an exploratory sweep
    pub fn simulate(config: &ScenarioConfig) -> Self {
        Self {
            min_factor: config.min_price_factor,
            max_factor: config.max_price_factor,
            steps: config.simulate_steps,
        }
    }

    /// Defaults for an optimizing sweep (finer grid)
    pub fn optimize(config: &ScenarioConfig) -> Self {
        Self {
            steps: config.optimize_steps,
            ..Self::simulate(config)
        }
    }

    /// Evenly spaced multipliers, both ends inclusive
    pub fn factors(&self) -> Vec<f64> {
        if self.steps == 1 {
            return vec![self.min_factor];
        }
        let span = self.max_factor - self.min_factor;
        let last = (self.steps - 1) as f64;
        (0..self.steps)
            .map(|i| self.min_factor + span * i as f64 / last)
            .collect()
    }
}

/// Something adjusted while evaluating a sweep point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioWarning {
    /// The scaled price fell below the minimum price
    PriceClamped { requested: f64, applied: f64 },
    /// The model predicted negative revenue
    NegativeRevenueClamped { raw: f64 },
    /// The model produced NaN or infinity
    NonFiniteOutput,
    /// Quantity rose with price and was held at the previous point's level
    QuantityClamped { raw: f64, applied: f64 },
    /// Revenue is implausibly large relative to the base price's revenue
    ExtremeRevenue { revenue: f64, base_revenue: f64 },
    /// The point could not be predicted at all
    PredictionFailed { message: String },
}

impl fmt::Display for ScenarioWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioWarning::PriceClamped { requested, applied } => {
                write!(f, "price {:.2} clamped to {:.2}", requested, applied)
            }
            ScenarioWarning::NegativeRevenueClamped { raw } => {
                write!(f, "negative revenue {:.2} clamped to 0", raw)
            }
            ScenarioWarning::NonFiniteOutput => write!(f, "non-finite model output zeroed"),
            ScenarioWarning::QuantityClamped { raw, applied } => {
                write!(f, "quantity {:.3} held at {:.3}", raw, applied)
            }
            ScenarioWarning::ExtremeRevenue {
                revenue,
                base_revenue,
            } => write!(
                f,
                "revenue {:.2} is {:.0}x the base revenue",
                revenue,
                revenue / base_revenue
            ),
            ScenarioWarning::PredictionFailed { message } => {
                write!(f, "prediction failed: {}", message)
            }
        }
    }
}

/// Where a substituted amount came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionSource {
    ProductHistory,
    ConfigDefault,
}

/// A missing price or cost replaced before sweeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub field: String,
    pub value: f64,
    pub source: SubstitutionSource,
}

/// One sample along a price sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPoint {
    pub price_factor: f64,
    pub unit_price: f64,
    /// Model revenue after sanitizing. On a point carrying
    /// [`ScenarioWarning::QuantityClamped`] this is derived instead:
    /// clamped quantity × `unit_price`.
    pub predicted_revenue: f64,
    pub quantity: f64,
    pub profit: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScenarioWarning>,
}

impl ScenarioPoint {
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Revenue => self.predicted_revenue,
            Metric::Profit => self.profit,
        }
    }

    /// Replace the quantity; revenue and profit are recomputed from it
    fn set_quantity(&mut self, quantity: f64, unit_cost: f64) {
        self.quantity = quantity;
        self.predicted_revenue = quantity * self.unit_price;
        self.profit = self.predicted_revenue - quantity * unit_cost;
    }
}

/// Points of a sweep in ascending price order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub base_unit_price: f64,
    pub unit_cost: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
    pub points: Vec<ScenarioPoint>,
}

impl ScenarioResult {
    /// The point maximizing `metric`; ties go to the lowest price
    pub fn best(&self, metric: Metric) -> Option<&ScenarioPoint> {
        let mut best: Option<&ScenarioPoint> = None;
        for point in &self.points {
            match best {
                Some(b) if point.metric(metric) <= b.metric(metric) => {}
                _ => best = Some(point),
            }
        }
        best
    }

    /// Arc elasticity of quantity with respect to price between the sweep ends
    pub fn elasticity(&self) -> Option<f64> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        let price_mid = (first.unit_price + last.unit_price) / 2.0;
        let qty_mid = (first.quantity + last.quantity) / 2.0;
        if first.unit_price == last.unit_price || price_mid <= 0.0 || qty_mid <= 0.0 {
            return None;
        }
        let qty_change = (last.quantity - first.quantity) / qty_mid;
        let price_change = (last.unit_price - first.unit_price) / price_mid;
        Some(qty_change / price_change)
    }

    /// Points where predicted demand has collapsed to zero
    pub fn saturated_points(&self) -> usize {
        self.points.iter().filter(|p| p.quantity <= 0.0).count()
    }

    pub fn warning_count(&self) -> usize {
        self.points.iter().map(|p| p.warnings.len()).sum()
    }
}

/// Simulates and optimizes prices over one prediction service
#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    service: PredictionService,
    scenario: ScenarioConfig,
    defaults: PredictionConfig,
}

impl ScenarioEngine {
    pub fn new(service: PredictionService, config: &EngineConfig) -> Self {
        Self {
            service,
            scenario: config.scenario.clone(),
            defaults: config.prediction.clone(),
        }
    }

    /// Predict every point of a price sweep
    pub fn simulate(
        &self,
        record: &TransactionRecord,
        options: &SimulateOptions,
    ) -> Result<ScenarioResult> {
        validate_sweep(
            options.min_factor,
            options.max_factor,
            options.steps,
            self.scenario.max_steps,
        )?;

        let (base, substitutions) = self.resolve_amounts(record)?;
        let base_price = require_amount("unit_price", base.unit_price)?;
        let unit_cost = require_amount("unit_cost", base.unit_cost)?;

        // Category and date errors apply to every point; report them once
        let base_revenue = sanitize(self.service.raw_revenue(&base)?).0;

        let mut points: Vec<ScenarioPoint> = options
            .factors()
            .par_iter()
            .map(|&factor| self.evaluate(&base, base_price, unit_cost, factor, base_revenue))
            .collect();

        enforce_non_increasing_quantity(&mut points, unit_cost);

        let result = ScenarioResult {
            base_unit_price: base_price,
            unit_cost,
            substitutions,
            points,
        };
        debug!(
            product = %record.product_id,
            points = result.points.len(),
            warnings = result.warning_count(),
            "Price sweep complete"
        );
        Ok(result)
    }

    /// The sweep point maximizing `metric`
    pub fn optimize(
        &self,
        record: &TransactionRecord,
        metric: Metric,
        options: &SimulateOptions,
    ) -> Result<ScenarioPoint> {
        let result = self.simulate(record, options)?;
        result
            .best(metric)
            .cloned()
            .ok_or_else(|| Error::validation("steps", "sweep produced no points"))
    }

    /// Fill a missing price or cost from product history, else config defaults
    fn resolve_amounts(
        &self,
        record: &TransactionRecord,
    ) -> Result<(TransactionRecord, Vec<Substitution>)> {
        let mut base = record.clone();
        let mut substitutions = Vec::new();
        let history = self.service.snapshot().reference.product(&record.product_id);

        match record.unit_price {
            Some(price) => {
                require_amount("unit_price", Some(price))?;
            }
            None => {
                let (value, source) = match history {
                    Some(stats) => (stats.avg_price, SubstitutionSource::ProductHistory),
                    None => (
                        self.defaults.default_unit_price,
                        SubstitutionSource::ConfigDefault,
                    ),
                };
                base.unit_price = Some(value);
                substitutions.push(Substitution {
                    field: "unit_price".to_string(),
                    value,
                    source,
                });
            }
        }

        match record.unit_cost {
            Some(cost) => {
                require_amount("unit_cost", Some(cost))?;
            }
            None => {
                let (value, source) = match history {
                    Some(stats) => (stats.avg_cost, SubstitutionSource::ProductHistory),
                    None => (
                        self.defaults.default_unit_cost,
                        SubstitutionSource::ConfigDefault,
                    ),
                };
                base.unit_cost = Some(value);
                substitutions.push(Substitution {
                    field: "unit_cost".to_string(),
                    value,
                    source,
                });
            }
        }

        for s in &substitutions {
            debug!(field = %s.field, value = s.value, source = ?s.source, "Substituted missing amount");
        }
        Ok((base, substitutions))
    }

    fn evaluate(
        &self,
        base: &TransactionRecord,
        base_price: f64,
        unit_cost: f64,
        factor: f64,
        base_revenue: f64,
    ) -> ScenarioPoint {
        let mut warnings = Vec::new();

        let requested = base_price * factor;
        let unit_price = if requested.is_finite() && requested >= self.scenario.min_unit_price {
            requested
        } else {
            let applied = self.scenario.min_unit_price;
            warnings.push(ScenarioWarning::PriceClamped { requested, applied });
            applied
        };

        let predicted_revenue = match self.service.raw_revenue(&base.with_unit_price(unit_price)) {
            Ok(raw) => {
                let (revenue, warning) = sanitize(raw);
                warnings.extend(warning);
                revenue
            }
            Err(e) => {
                warnings.push(ScenarioWarning::PredictionFailed {
                    message: e.to_string(),
                });
                0.0
            }
        };

        if base_revenue > 0.0 && predicted_revenue > self.scenario.max_revenue_multiple * base_revenue
        {
            warnings.push(ScenarioWarning::ExtremeRevenue {
                revenue: predicted_revenue,
                base_revenue,
            });
        }

        let quantity = predicted_revenue / unit_price;
        ScenarioPoint {
            price_factor: factor,
            unit_price,
            predicted_revenue,
            quantity,
            profit: predicted_revenue - quantity * unit_cost,
            warnings,
        }
    }
}

/// Zero non-finite output and floor negative revenue
fn sanitize(raw: f64) -> (f64, Option<ScenarioWarning>) {
    if !raw.is_finite() {
        (0.0, Some(ScenarioWarning::NonFiniteOutput))
    } else if raw < 0.0 {
        (0.0, Some(ScenarioWarning::NegativeRevenueClamped { raw }))
    } else {
        (raw, None)
    }
}

/// Hold quantity at the running minimum so demand never rises with price
fn enforce_non_increasing_quantity(points: &mut [ScenarioPoint], unit_cost: f64) {
    let mut floor = f64::INFINITY;
    for point in points.iter_mut() {
        if point.quantity > floor {
            let raw = point.quantity;
            // Rounding noise is absorbed without a warning
            if raw - floor > 1e-9 * floor.max(1.0) {
                point.warnings.push(ScenarioWarning::QuantityClamped {
                    raw,
                    applied: floor,
                });
            }
            point.set_quantity(floor, unit_cost);
        }
        floor = floor.min(point.quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{example_record, sample_snapshot};

    fn engine() -> ScenarioEngine {
        ScenarioEngine::new(
            PredictionService::new(sample_snapshot()),
            &EngineConfig::default(),
        )
    }

    fn options(min_factor: f64, max_factor: f64, steps: usize) -> SimulateOptions {
        SimulateOptions {
            min_factor,
            max_factor,
            steps,
        }
    }

    fn point(price: f64, revenue: f64) -> ScenarioPoint {
        ScenarioPoint {
            price_factor: 1.0,
            unit_price: price,
            predicted_revenue: revenue,
            quantity: revenue / price,
            profit: revenue,
            warnings: vec![],
        }
    }

    #[test]
    fn test_factors_are_inclusive_and_even() {
        let factors = options(0.5, 2.0, 7).factors();
        assert_eq!(factors, vec![0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0]);
        assert_eq!(options(0.8, 1.2, 1).factors(), vec![0.8]);
    }

    #[test]
    fn test_worked_example_sweep() {
        let result = engine()
            .simulate(&example_record(), &options(0.5, 2.0, 7))
            .unwrap();

        let prices: Vec<f64> = result.points.iter().map(|p| p.unit_price).collect();
        assert_eq!(prices, vec![50.0, 75.0, 100.0, 125.0, 150.0, 175.0, 200.0]);
        for pair in result.points.windows(2) {
            assert!(pair[1].quantity <= pair[0].quantity);
        }
        assert!(result.substitutions.is_empty());
    }

    #[test]
    fn test_sweep_points_match_direct_predictions() {
        let service = PredictionService::new(sample_snapshot());
        let result = engine()
            .simulate(&example_record(), &options(0.5, 2.0, 7))
            .unwrap();
        let at_base = &result.points[2];
        let direct = service.predict(&example_record()).unwrap();
        assert!((at_base.predicted_revenue - direct.predicted_revenue).abs() < 1e-9);
        assert!((at_base.profit - direct.profit).abs() < 1e-9);
    }

    #[test]
    fn test_optimize_returns_a_simulated_point() {
        let engine = engine();
        let opts = options(0.5, 2.0, 20);
        let sweep = engine.simulate(&example_record(), &opts).unwrap();

        for metric in [Metric::Revenue, Metric::Profit] {
            let best = engine.optimize(&example_record(), metric, &opts).unwrap();
            assert!(sweep.points.contains(&best));
            assert!(sweep
                .points
                .iter()
                .all(|p| p.metric(metric) <= best.metric(metric)));
        }
    }

    #[test]
    fn test_best_breaks_ties_by_lowest_price() {
        let result = ScenarioResult {
            base_unit_price: 10.0,
            unit_cost: 0.0,
            substitutions: vec![],
            points: vec![point(5.0, 40.0), point(10.0, 50.0), point(15.0, 50.0)],
        };
        assert_eq!(result.best(Metric::Revenue).unwrap().unit_price, 10.0);
    }

    #[test]
    fn test_zero_price_is_clamped_not_dropped() {
        let record = example_record().with_unit_price(0.0);
        let result = engine().simulate(&record, &options(0.5, 2.0, 4)).unwrap();
        assert_eq!(result.points.len(), 4);
        for p in &result.points {
            assert_eq!(p.unit_price, 0.01);
            assert!(p
                .warnings
                .iter()
                .any(|w| matches!(w, ScenarioWarning::PriceClamped { .. })));
        }
    }

    #[test]
    fn test_rising_quantity_is_clamped_with_warning() {
        let mut points = vec![point(10.0, 100.0), point(20.0, 400.0), point(30.0, 150.0)];
        enforce_non_increasing_quantity(&mut points, 2.0);

        assert_eq!(points[1].quantity, 10.0);
        assert_eq!(points[1].predicted_revenue, 200.0);
        assert_eq!(points[1].profit, 180.0);
        assert!(matches!(
            points[1].warnings[0],
            ScenarioWarning::QuantityClamped { raw, applied } if raw == 20.0 && applied == 10.0
        ));
        assert_eq!(points[2].quantity, 5.0);
        assert!(points[2].warnings.is_empty());
    }

    #[test]
    fn test_sanitize_flags_bad_output() {
        assert_eq!(sanitize(12.5), (12.5, None));
        assert_eq!(sanitize(f64::NAN).0, 0.0);
        let (revenue, warning) = sanitize(-3.0);
        assert_eq!(revenue, 0.0);
        assert_eq!(
            warning,
            Some(ScenarioWarning::NegativeRevenueClamped { raw: -3.0 })
        );
    }

    #[test]
    fn test_missing_amounts_are_substituted() {
        let mut record = example_record();
        record.unit_price = None;
        record.unit_cost = None;
        let result = engine().simulate(&record, &options(0.5, 2.0, 3)).unwrap();

        assert_eq!(result.substitutions.len(), 2);
        assert!(result
            .substitutions
            .iter()
            .all(|s| s.source == SubstitutionSource::ProductHistory));
        assert!(result.base_unit_price > 70.0 && result.base_unit_price < 90.0);
    }

    #[test]
    fn test_invalid_sweep_and_category_fail_up_front() {
        let engine = engine();
        assert!(matches!(
            engine.simulate(&example_record(), &options(2.0, 0.5, 7)),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            engine.simulate(&example_record(), &options(0.5, 2.0, 0)),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            engine.simulate(&example_record(), &options(0.5, 2.0, usize::MAX)),
            Err(Error::Validation { ref field, .. }) if field == "steps"
        ));
        assert!(matches!(
            engine.optimize(&example_record(), Metric::Revenue, &options(0.5, 2.0, 1001)),
            Err(Error::Validation { .. })
        ));

        let mut record = example_record();
        record.location = "Atlantis".to_string();
        assert!(matches!(
            engine.simulate(&record, &options(0.5, 2.0, 7)),
            Err(Error::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_elasticity_is_negative_for_falling_demand() {
        let result = engine()
            .simulate(&example_record(), &options(0.5, 2.0, 7))
            .unwrap();
        assert!(result.elasticity().unwrap() < 0.0);
    }

    #[test]
    fn test_options_reject_unknown_keys() {
        let err = serde_json::from_str::<SimulateOptions>(
            r#"{"min_factor":0.5,"max_factor":2.0,"steps":7,"jitter":true}"#,
        );
        assert!(err.is_err());
    }
}
