//! Prediction and price planning commands (predict, batch, simulate, optimize)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bizsight_core::{Metric, PredictionResult, ScenarioResult, TransactionRecord};
use serde::Serialize;

use super::core::{money, open_engine, print_json, record_from_args, sweep_options, EngineArgs};
use crate::cli::{RecordArgs, SweepArgs};

pub fn cmd_predict(args: &EngineArgs, record: &RecordArgs) -> Result<()> {
    let engine = open_engine(args)?;
    let record = record_from_args(record);
    let result = engine.predict(&record)?;

    if args.json {
        return print_json(&result);
    }

    println!();
    println!(
        "📈 Prediction for product {} at {} on {}-{:02}-{:02}",
        record.product_id, record.location, record.year, record.month, record.day
    );
    print_prediction(&result);
    println!();
    Ok(())
}

fn print_prediction(result: &PredictionResult) {
    println!("   Revenue:   {}", money(result.predicted_revenue));
    println!("   Quantity:  {:.2} (revenue / price)", result.estimated_quantity);
    println!("   Cost:      {}", money(result.total_cost));
    println!(
        "   Profit:    {} ({:.1}% margin)",
        money(result.profit),
        result.profit_margin_pct
    );
}

#[derive(Serialize)]
struct BatchLine {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn cmd_batch(args: &EngineArgs, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<TransactionRecord> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of records", file.display()))?;

    let engine = open_engine(args)?;
    let lines: Vec<BatchLine> = engine
        .predict_batch(&records)
        .into_iter()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(r) => BatchLine {
                index,
                result: Some(r),
                error: None,
            },
            Err(e) => BatchLine {
                index,
                result: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    if args.json {
        return print_json(&lines);
    }

    let failed = lines.iter().filter(|l| l.error.is_some()).count();
    println!();
    println!("📦 Batch: {} records, {} failed", lines.len(), failed);
    println!();
    println!("   {:>5}  {:<10}  {:<12}  {:>14}  {:>14}", "#", "Product", "Location", "Revenue", "Profit");
    println!("   ─────────────────────────────────────────────────────────────");
    for (line, record) in lines.iter().zip(&records) {
        match (&line.result, &line.error) {
            (Some(r), _) => println!(
                "   {:>5}  {:<10}  {:<12}  {:>14}  {:>14}",
                line.index,
                record.product_id,
                record.location,
                money(r.predicted_revenue),
                money(r.profit)
            ),
            (None, Some(e)) => println!(
                "   {:>5}  {:<10}  {:<12}  ❌ {}",
                line.index, record.product_id, record.location, e
            ),
            (None, None) => {}
        }
    }
    println!();
    Ok(())
}

pub fn cmd_simulate(args: &EngineArgs, record: &RecordArgs, sweep: &SweepArgs) -> Result<()> {
    let engine = open_engine(args)?;
    let options = sweep_options(engine.simulate_options(), sweep);
    let result = engine.simulate(&record_from_args(record), &options)?;

    if args.json {
        return print_json(&result);
    }

    println!();
    println!(
        "🔀 Price scenarios for product {} at {}",
        record.product, record.location
    );
    let best = result
        .best(engine.config().scenario.metric)
        .map(|p| p.unit_price);
    print_sweep(&result, best);
    if let Some(elasticity) = result.elasticity() {
        println!("   Price elasticity: {:.2}", elasticity);
    }
    println!();
    Ok(())
}

pub fn cmd_optimize(
    args: &EngineArgs,
    record: &RecordArgs,
    metric: Option<Metric>,
    sweep: &SweepArgs,
) -> Result<()> {
    let engine = open_engine(args)?;
    let metric = metric.unwrap_or(engine.config().scenario.metric);
    let options = sweep_options(engine.optimize_options(), sweep);
    let record = record_from_args(record);
    let best = engine.optimize(&record, metric, &options)?;

    if args.json {
        return print_json(&best);
    }

    println!();
    println!(
        "🎯 Best price for {} (product {} at {})",
        metric, record.product_id, record.location
    );
    println!(
        "   Price:     {} ({:.0}% of current)",
        money(best.unit_price),
        best.price_factor * 100.0
    );
    println!("   Revenue:   {}", money(best.predicted_revenue));
    println!("   Quantity:  {:.2}", best.quantity);
    println!("   Profit:    {}", money(best.profit));
    for warning in &best.warnings {
        println!("   ⚠️  {}", warning);
    }
    println!();
    Ok(())
}

fn print_sweep(result: &ScenarioResult, highlight: Option<f64>) {
    for sub in &result.substitutions {
        println!(
            "   ℹ️  {} not given; using {} ({:?})",
            sub.field,
            money(sub.value),
            sub.source
        );
    }
    println!();
    println!(
        "   {:>10}  {:>7}  {:>14}  {:>10}  {:>14}",
        "Price", "Factor", "Revenue", "Quantity", "Profit"
    );
    println!("   ─────────────────────────────────────────────────────────────");
    for point in &result.points {
        let marker = if highlight == Some(point.unit_price) { "◀" } else { "" };
        println!(
            "   {:>10}  {:>6.0}%  {:>14}  {:>10.2}  {:>14} {}",
            money(point.unit_price),
            point.price_factor * 100.0,
            money(point.predicted_revenue),
            point.quantity,
            money(point.profit),
            marker
        );
        for warning in &point.warnings {
            println!("              ⚠️  {}", warning);
        }
    }
    println!();
}
