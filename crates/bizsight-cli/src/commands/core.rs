//! Shared utilities for command implementations
//!
//! - `EngineArgs` - where the data, model, config and feedback store live
//! - `open_engine` / `open_feedback_store` - load them
//! - `print_json` - `--json` output

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bizsight_core::config::default_feedback_db_path;
use bizsight_core::{
    CsvDataProvider, DecisionEngine, EngineConfig, SimulateOptions, SqliteFeedbackStore,
    TransactionRecord,
};
use chrono::Datelike;
use serde::Serialize;

use crate::cli::{RecordArgs, SweepArgs};

/// Global options every command shares
#[derive(Debug, Clone)]
pub struct EngineArgs {
    pub data: PathBuf,
    pub model: PathBuf,
    pub config: Option<PathBuf>,
    pub feedback_db: Option<PathBuf>,
    pub json: bool,
}

pub fn load_config(args: &EngineArgs) -> Result<EngineConfig> {
    EngineConfig::load(args.config.as_deref()).context("Failed to load engine configuration")
}

/// Open the SQLite feedback store (explicit path or the platform data dir)
pub fn open_feedback_store(args: &EngineArgs) -> Result<SqliteFeedbackStore> {
    let path = match &args.feedback_db {
        Some(path) => path.clone(),
        None => default_feedback_db_path()
            .context("No data directory on this platform; pass --feedback-db")?,
    };
    SqliteFeedbackStore::open(&path)
        .with_context(|| format!("Failed to open feedback database {}", path.display()))
}

/// Load the dataset and model into a decision engine
pub fn open_engine(args: &EngineArgs) -> Result<DecisionEngine> {
    let config = load_config(args)?;
    let store = open_feedback_store(args)?;
    check_exists(&args.data, "sales data")?;
    DecisionEngine::load(
        &CsvDataProvider::new(&args.data),
        &args.model,
        config,
        Arc::new(store),
    )
    .with_context(|| {
        format!(
            "Failed to load {} with model {}",
            args.data.display(),
            args.model.display()
        )
    })
}

fn check_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("{} file not found: {}", what, path.display());
    }
    Ok(())
}

/// Build a transaction record from command-line arguments
pub fn record_from_args(args: &RecordArgs) -> TransactionRecord {
    TransactionRecord {
        product_id: args.product.clone(),
        location: args.location.clone(),
        unit_price: args.price,
        unit_cost: args.cost,
        year: args.date.year(),
        month: args.date.month(),
        day: args.date.day(),
        weekday: None,
    }
}

/// Configured sweep with command-line overrides applied
pub fn sweep_options(base: SimulateOptions, sweep: &SweepArgs) -> SimulateOptions {
    SimulateOptions {
        min_factor: sweep.min_factor.unwrap_or(base.min_factor),
        max_factor: sweep.max_factor.unwrap_or(base.max_factor),
        steps: sweep.steps.unwrap_or(base.steps),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Format a money amount with thousands separators
pub fn money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = format!("{:.2}", amount.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, frac)
}
