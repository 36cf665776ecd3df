//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_engine, open_feedback_store, output helpers)
//! - `predict` - Prediction and price planning (predict, batch, simulate, optimize)
//! - `forecast` - Forecasts (forecast, forecast-multi)
//! - `insights` - Business insights
//! - `feedback` - Prediction tracking (record, resolve, list, due, summary)

pub mod core;
pub mod feedback;
pub mod forecast;
pub mod insights;
pub mod predict;

// Re-export command functions for main.rs
pub use self::core::*;
pub use feedback::*;
pub use forecast::*;
pub use insights::*;
pub use predict::*;
