//! Feedback tracking commands (record, resolve, list, due, summary)
//!
//! These only touch the feedback database; no sales data or model is loaded.

use anyhow::{Context, Result};
use bizsight_core::{FeedbackRecord, FeedbackStatus, FeedbackStore, NewFeedback};
use chrono::Utc;

use super::core::{load_config, money, open_feedback_store, print_json, EngineArgs};

pub fn cmd_feedback_record(
    args: &EngineArgs,
    insight_id: &str,
    predicted: f64,
    prediction_type: &str,
    weeks: Option<u32>,
) -> Result<()> {
    let weeks = match weeks {
        Some(w) => w,
        None => load_config(args)?.insights.tracking_period_weeks,
    };
    let store = open_feedback_store(args)?;
    let record = store
        .insert(&NewFeedback::new(insight_id, predicted, prediction_type, weeks))
        .with_context(|| format!("Failed to track '{}'", insight_id))?;

    if args.json {
        return print_json(&record);
    }
    println!(
        "📌 Tracking {}: {} {} (due {})",
        record.insight_id,
        money(record.predicted_value),
        record.prediction_type,
        record.due_at().format("%Y-%m-%d")
    );
    Ok(())
}

pub fn cmd_feedback_resolve(args: &EngineArgs, insight_id: &str, actual: f64) -> Result<()> {
    let store = open_feedback_store(args)?;
    let record = store
        .resolve(insight_id, actual, Utc::now())
        .with_context(|| format!("Failed to resolve '{}'", insight_id))?;

    if args.json {
        return print_json(&record);
    }
    println!(
        "✅ Resolved {}: predicted {}, actual {}, accuracy {:.1}%",
        record.insight_id,
        money(record.predicted_value),
        money(actual),
        record.accuracy_pct.unwrap_or(0.0)
    );
    Ok(())
}

pub fn cmd_feedback_list(args: &EngineArgs, status: Option<FeedbackStatus>) -> Result<()> {
    let records = open_feedback_store(args)?.list(status)?;
    if args.json {
        return print_json(&records);
    }
    print_records("📋 Tracked predictions", &records);
    Ok(())
}

pub fn cmd_feedback_due(args: &EngineArgs) -> Result<()> {
    let records = open_feedback_store(args)?.due(Utc::now())?;
    if args.json {
        return print_json(&records);
    }
    print_records("⏰ Predictions ready to resolve", &records);
    Ok(())
}

pub fn cmd_feedback_summary(args: &EngineArgs) -> Result<()> {
    let summary = open_feedback_store(args)?.summary(Utc::now())?;
    if args.json {
        return print_json(&summary);
    }

    println!();
    println!("📊 Feedback Summary");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Tracked:   {}", summary.total);
    println!("   Pending:   {} ({} due)", summary.pending, summary.due);
    println!("   Resolved:  {}", summary.resolved);
    match summary.mean_accuracy_pct {
        Some(acc) => println!("   Accuracy:  {:.1}% mean", acc),
        None => println!("   Accuracy:  (nothing resolved yet)"),
    }
    println!();
    Ok(())
}

fn print_records(title: &str, records: &[FeedbackRecord]) {
    println!();
    println!("{} ({})", title, records.len());
    if records.is_empty() {
        println!();
        return;
    }
    println!();
    println!(
        "   {:<28}  {:>14}  {:<9}  {:<10}  {:>9}",
        "Insight", "Predicted", "Status", "Due", "Accuracy"
    );
    println!("   ─────────────────────────────────────────────────────────────────────────");
    for r in records {
        let accuracy = r
            .accuracy_pct
            .map(|a| format!("{:.1}%", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {:<28}  {:>14}  {:<9}  {:<10}  {:>9}",
            r.insight_id,
            money(r.predicted_value),
            r.status.as_str(),
            r.due_at().format("%Y-%m-%d").to_string(),
            accuracy
        );
    }
    println!();
}
