//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use bizsight_core::{FeedbackStatus, Frequency, LocationScope, Metric};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Bizsight - Pricing, forecasting and insights for small businesses
#[derive(Parser)]
#[command(name = "bizsight")]
#[command(about = "Sales decision support: predict, plan prices, forecast, find insights", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Historical sales CSV
    #[arg(long, default_value = "sales.csv", global = true)]
    pub data: PathBuf,

    /// Trained model artifact (JSON)
    #[arg(long, default_value = "model.json", global = true)]
    pub model: PathBuf,

    /// Engine configuration (TOML); defaults to the data-dir override or built-in values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Feedback database (defaults to ~/.local/share/bizsight/feedback.db)
    #[arg(long, global = true)]
    pub feedback_db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// One transaction to evaluate
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Product id
    #[arg(short, long)]
    pub product: String,

    /// Location name
    #[arg(short, long)]
    pub location: String,

    /// Unit price (scenario planning falls back to product history when omitted)
    #[arg(long)]
    pub price: Option<f64>,

    /// Unit cost
    #[arg(long)]
    pub cost: Option<f64>,

    /// Sale date (YYYY-MM-DD)
    #[arg(short, long)]
    pub date: NaiveDate,
}

/// Price sweep overrides
#[derive(Args, Debug, Clone, Default)]
pub struct SweepArgs {
    /// Lowest price multiplier
    #[arg(long)]
    pub min_factor: Option<f64>,

    /// Highest price multiplier
    #[arg(long)]
    pub max_factor: Option<f64>,

    /// Number of prices in the sweep
    #[arg(long)]
    pub steps: Option<usize>,
}

/// Forecast date range
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First date (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// daily, weekly or monthly
    #[arg(short, long, default_value = "daily")]
    pub frequency: Frequency,

    /// A location name, "all" (totals) or "all-mean" (per-location mean)
    #[arg(short, long, default_value = "all")]
    pub location: LocationScope,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict revenue, quantity and profit for one transaction
    Predict {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Predict every record in a JSON file (array of transaction records)
    Batch {
        /// JSON file to read
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Sweep prices around the current price
    Simulate {
        #[command(flatten)]
        record: RecordArgs,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Find the price that maximizes revenue or profit
    Optimize {
        #[command(flatten)]
        record: RecordArgs,

        /// revenue or profit (defaults to the configured metric)
        #[arg(short, long)]
        metric: Option<Metric>,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Forecast one product over a date range
    Forecast {
        /// Product id
        #[arg(short, long)]
        product: String,

        /// Unit price (defaults to the product's historical average)
        #[arg(long)]
        price: Option<f64>,

        /// Unit cost (defaults to the product's historical average)
        #[arg(long)]
        cost: Option<f64>,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Forecast several products at their historical average price
    ForecastMulti {
        /// Comma-separated product ids (defaults to every known product)
        #[arg(short, long, value_delimiter = ',')]
        products: Vec<String>,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Show the highest-priority business insights
    Insights {
        /// Start tracking the quantified predictions of the shown insights
        #[arg(long)]
        track: bool,
    },

    /// Track and resolve insight predictions
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },
}

#[derive(Subcommand)]
pub enum FeedbackAction {
    /// Start tracking a prediction
    Record {
        /// Insight id (e.g. revenue_decline)
        insight_id: String,

        /// Predicted value
        predicted: f64,

        /// What the value measures
        #[arg(short = 't', long, default_value = "annual_revenue_increase")]
        prediction_type: String,

        /// Tracking period in weeks (defaults to the configured period)
        #[arg(short, long)]
        weeks: Option<u32>,
    },

    /// Record the observed outcome of a tracked prediction
    Resolve {
        /// Insight id
        insight_id: String,

        /// Observed actual value
        actual: f64,
    },

    /// List tracked predictions
    List {
        /// Only pending or resolved records
        #[arg(short, long)]
        status: Option<FeedbackStatus>,
    },

    /// Pending predictions whose tracking period has ended
    Due,

    /// Counts and mean accuracy
    Summary,
}
