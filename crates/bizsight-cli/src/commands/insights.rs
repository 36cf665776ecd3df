//! Insight commands

use anyhow::Result;
use bizsight_core::{Insight, Severity};
use serde_json::json;

use super::core::{money, open_engine, print_json, EngineArgs};

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Medium => "🟡",
        Severity::Low => "🟢",
    }
}

pub fn cmd_insights(args: &EngineArgs, track: bool) -> Result<()> {
    let engine = open_engine(args)?;
    let insights = engine.generate_insights();
    let tracked = if track {
        engine.track_insights(&insights)?
    } else {
        vec![]
    };

    if args.json {
        return print_json(&json!({
            "insights": insights,
            "tracked": tracked,
        }));
    }

    println!();
    if insights.is_empty() {
        println!("✅ No notable patterns in the sales history");
        println!();
        return Ok(());
    }

    println!("💡 Top {} insights", insights.len());
    for (rank, insight) in insights.iter().enumerate() {
        print_insight(rank + 1, insight);
    }

    if track {
        println!();
        if tracked.is_empty() {
            println!("   No new predictions to track");
        } else {
            for record in &tracked {
                println!(
                    "   📌 Tracking {} (check back after {})",
                    record.insight_id,
                    record.due_at().format("%Y-%m-%d")
                );
            }
        }
    }
    println!();
    Ok(())
}

fn print_insight(rank: usize, insight: &Insight) {
    println!();
    println!(
        "{}. {} {} [{}] (priority {:.0})",
        rank,
        severity_icon(insight.severity),
        insight.title,
        insight.severity,
        insight.priority_score
    );
    println!("   {}", insight.summary);
    if insight.is_compound() {
        println!("   Combines: {}", insight.constituents.join(" + "));
    }
    if !insight.recommended_action.is_empty() {
        println!("   → {}", insight.recommended_action);
    }
    if let Some(impact) = &insight.expected_impact {
        println!("   Expected: {} ({})", money(impact.value), impact.description);
    }
}
