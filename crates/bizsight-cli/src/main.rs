//! Bizsight CLI - Sales decision support for small businesses
//!
//! Usage:
//!   bizsight predict -p 12 -l North --price 100 --cost 50 -d 2024-06-15
//!   bizsight simulate -p 12 -l North --price 100 --cost 50 -d 2024-06-15
//!   bizsight forecast -p 12 --start 2024-07-01 --end 2024-09-30 -f weekly
//!   bizsight insights --track

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let args = commands::EngineArgs {
        data: cli.data,
        model: cli.model,
        config: cli.config,
        feedback_db: cli.feedback_db,
        json: cli.json,
    };

    match cli.command {
        Commands::Predict { record } => commands::cmd_predict(&args, &record),
        Commands::Batch { file } => commands::cmd_batch(&args, &file),
        Commands::Simulate { record, sweep } => commands::cmd_simulate(&args, &record, &sweep),
        Commands::Optimize {
            record,
            metric,
            sweep,
        } => commands::cmd_optimize(&args, &record, metric, &sweep),
        Commands::Forecast {
            product,
            price,
            cost,
            range,
        } => commands::cmd_forecast(&args, &product, price, cost, &range),
        Commands::ForecastMulti { products, range } => {
            commands::cmd_forecast_multi(&args, &products, &range)
        }
        Commands::Insights { track } => commands::cmd_insights(&args, track),
        Commands::Feedback { action } => match action {
            FeedbackAction::Record {
                insight_id,
                predicted,
                prediction_type,
                weeks,
            } => commands::cmd_feedback_record(
                &args,
                &insight_id,
                predicted,
                &prediction_type,
                weeks,
            ),
            FeedbackAction::Resolve { insight_id, actual } => {
                commands::cmd_feedback_resolve(&args, &insight_id, actual)
            }
            FeedbackAction::List { status } => commands::cmd_feedback_list(&args, status),
            FeedbackAction::Due => commands::cmd_feedback_due(&args),
            FeedbackAction::Summary => commands::cmd_feedback_summary(&args),
        },
    }
}
