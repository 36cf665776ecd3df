//! Property tests for prediction, planning, forecasting and insight ranking

use std::sync::Arc;

use bizsight_core::{
    config::EngineConfig,
    insights::{
        apply_compound_rules, percentile_rank, severity_from_percentile, AnalysisContext, Insight,
        InsightCategory, InsightEngine, Severity, COMPOUND_RULES,
    },
    test_utils::{example_record, sample_model, sample_rows, sample_snapshot, struggling_rows},
    DecisionEngine, ForecastEngine, ForecastRequest, Frequency, LocationScope, PredictionService,
    ReferenceDataSnapshot, SalesRow, ScenarioEngine, SimulateOptions,
};
use chrono::NaiveDate;
use proptest::prelude::*;

const PRODUCTS: [&str; 3] = ["12", "7", "31"];
const LOCATIONS: [&str; 3] = ["North", "South", "East"];
const BASE_IDS: [&str; 7] = [
    "revenue_decline",
    "revenue_below_typical",
    "underperforming_products",
    "margin_spread",
    "location_concentration",
    "seasonal_volatility",
    "pricing_inconsistency",
];

fn snapshot() -> Arc<ReferenceDataSnapshot> {
    sample_snapshot()
}

/// Every insight of one pass, compounds included, as (id, severity) by id
fn severities(rows: &[SalesRow]) -> Vec<(String, Severity)> {
    let snapshot = ReferenceDataSnapshot::new(sample_model(), rows);
    let mut found: Vec<(String, Severity)> = InsightEngine::new(EngineConfig::default().insights)
        .rank_all(&AnalysisContext::new(&snapshot.dataset))
        .into_iter()
        .map(|i| (i.id, i.severity))
        .collect();
    found.sort();
    found
}

fn ids(severities: &[(String, Severity)]) -> Vec<&str> {
    severities.iter().map(|(id, _)| id.as_str()).collect()
}

fn scaled(rows: &[SalesRow], scale: f64) -> Vec<SalesRow> {
    rows.iter()
        .cloned()
        .map(|mut row| {
            row.unit_price *= scale;
            row.unit_cost *= scale;
            row.revenue *= scale;
            row
        })
        .collect()
}

/// Struggling data with product "31" selling normally again
fn slump_without_product_collapse() -> Vec<SalesRow> {
    struggling_rows()
        .into_iter()
        .map(|mut row| {
            if row.product_id == "31" {
                row.quantity /= 0.3;
                row.revenue /= 0.3;
            }
            row
        })
        .collect()
}

/// Sample data with only product "31" collapsing, no spring slump
fn product_collapse_without_slump() -> Vec<SalesRow> {
    sample_rows()
        .into_iter()
        .map(|mut row| {
            if row.product_id == "31" {
                row.quantity *= 0.3;
                row.revenue *= 0.3;
            }
            row
        })
        .collect()
}

#[test]
fn insight_severities_ignore_currency_scale() {
    let rows = struggling_rows();
    let baseline = severities(&rows);
    assert!(!baseline.is_empty());

    for scale in [0.01, 100.0, 1000.0] {
        assert_eq!(severities(&scaled(&rows, scale)), baseline, "scale {}", scale);
    }

    // The capped, ranked output agrees too; a power of two keeps ties exact
    let top = |rows: &[SalesRow]| {
        DecisionEngine::new(
            ReferenceDataSnapshot::new(sample_model(), rows),
            EngineConfig::default(),
        )
        .unwrap()
        .generate_insights()
        .into_iter()
        .map(|i| (i.id, i.severity))
        .collect::<Vec<_>>()
    };
    assert_eq!(top(&scaled(&rows, 1024.0)), top(&rows));
}

#[test]
fn product_crisis_needs_both_decline_and_weak_product() {
    let both = severities(&struggling_rows());
    assert!(ids(&both).contains(&"revenue_product_crisis"));

    let no_weak_product = severities(&slump_without_product_collapse());
    assert!(ids(&no_weak_product).contains(&"revenue_decline"));
    assert!(!ids(&no_weak_product).contains(&"underperforming_products"));
    assert!(!ids(&no_weak_product).contains(&"revenue_product_crisis"));

    let no_decline = severities(&product_collapse_without_slump());
    assert!(ids(&no_decline).contains(&"underperforming_products"));
    assert!(!ids(&no_decline).contains(&"revenue_decline"));
    assert!(!ids(&no_decline).contains(&"revenue_product_crisis"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prediction_is_deterministic(
        product in 0usize..3,
        location in 0usize..3,
        price in 1.0f64..500.0,
        cost_ratio in 0.0f64..1.0,
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let service = PredictionService::new(snapshot());
        let mut record = example_record();
        record.product_id = PRODUCTS[product].to_string();
        record.location = LOCATIONS[location].to_string();
        record.unit_price = Some(price);
        record.unit_cost = Some(price * cost_ratio);
        record.month = month;
        record.day = day;
        record.weekday = None;

        let first = service.predict(&record).unwrap();
        let second = service.predict(&record).unwrap();
        prop_assert_eq!(first, second);
        prop_assert!(first.predicted_revenue >= 0.0);
    }

    #[test]
    fn sweep_quantity_never_rises(
        price in 0.5f64..400.0,
        min_factor in 0.1f64..1.0,
        span in 0.1f64..3.0,
        steps in 2usize..25,
    ) {
        let engine = ScenarioEngine::new(PredictionService::new(snapshot()), &EngineConfig::default());
        let mut record = example_record();
        record.unit_price = Some(price);
        let options = SimulateOptions { min_factor, max_factor: min_factor + span, steps };

        let result = engine.simulate(&record, &options).unwrap();
        prop_assert_eq!(result.points.len(), steps);
        for pair in result.points.windows(2) {
            prop_assert!(pair[1].unit_price >= pair[0].unit_price);
            prop_assert!(pair[1].quantity <= pair[0].quantity);
        }
    }

    #[test]
    fn forecast_bounds_contain_prediction(
        product in 0usize..3,
        scope in 0usize..5,
        price in 0.0f64..300.0,
        start_offset in 0i64..365,
        length in 0i64..60,
        frequency in prop_oneof![
            Just(Frequency::Daily),
            Just(Frequency::Weekly),
            Just(Frequency::Monthly),
        ],
    ) {
        let engine = ForecastEngine::new(PredictionService::new(snapshot()), &EngineConfig::default());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(start_offset);
        let location = match scope {
            0 => LocationScope::AllSum,
            1 => LocationScope::AllMean,
            n => LocationScope::Single(LOCATIONS[n - 2].to_string()),
        };
        let forecast = engine
            .forecast(&ForecastRequest {
                product_id: PRODUCTS[product].to_string(),
                location,
                unit_price: price,
                unit_cost: price / 2.0,
                start,
                end: start + chrono::Duration::days(length),
                frequency,
            })
            .unwrap();

        prop_assert!(!forecast.points.is_empty());
        for p in &forecast.points {
            prop_assert!(p.lower_bound >= 0.0);
            prop_assert!(p.lower_bound <= p.predicted_value);
            prop_assert!(p.predicted_value <= p.upper_bound);
        }
    }

    #[test]
    fn percentile_severity_is_scale_invariant(
        values in prop::collection::vec(1.0f64..10_000.0, 1..50),
        pick in 0usize..50,
        exponent in -8i32..8,
    ) {
        // Powers of two scale exactly, so comparisons are preserved bit for bit
        let scale = 2f64.powi(exponent);
        let value = values[pick % values.len()];
        let scaled: Vec<f64> = values.iter().map(|v| v * scale).collect();

        let original = percentile_rank(value, &values);
        let rescaled = percentile_rank(value * scale, &scaled);
        prop_assert_eq!(original, rescaled);
        prop_assert_eq!(severity_from_percentile(original), severity_from_percentile(rescaled));
    }

    #[test]
    fn insight_severities_ignore_power_of_two_scale(exponent in -10i32..12) {
        let rows = struggling_rows();
        let scale = 2f64.powi(exponent);
        prop_assert_eq!(severities(&scaled(&rows, scale)), severities(&rows));
    }

    #[test]
    fn compounds_need_every_constituent(present in prop::collection::vec(any::<bool>(), 7)) {
        let base: Vec<Insight> = BASE_IDS
            .iter()
            .zip(&present)
            .filter(|(_, on)| **on)
            .map(|(id, _)| {
                let mut insight = Insight::new(*id, InsightCategory::Revenue, Severity::Medium, *id, "")
                    .with_scores(0.5, 0.5, 0.5);
                insight.priority_score = 50.0;
                insight
            })
            .collect();

        let compounds = apply_compound_rules(&base, 15.0);
        for rule in COMPOUND_RULES {
            let expected = rule
                .constituents
                .iter()
                .all(|c| base.iter().any(|b| b.id == *c));
            let emitted = compounds.iter().find(|c| c.id == rule.id);
            prop_assert_eq!(emitted.is_some(), expected);
            if let Some(compound) = emitted {
                prop_assert_eq!(compound.severity, Severity::High);
                prop_assert_eq!(compound.priority_score, 65.0);
            }
        }
    }
}
