//! Forecast commands (forecast, forecast-multi)

use anyhow::Result;
use bizsight_core::{Forecast, ForecastRequest};

use super::core::{money, open_engine, print_json, EngineArgs};
use crate::cli::RangeArgs;

pub fn cmd_forecast(
    args: &EngineArgs,
    product: &str,
    price: Option<f64>,
    cost: Option<f64>,
    range: &RangeArgs,
) -> Result<()> {
    let engine = open_engine(args)?;
    let (typical_price, typical_cost) = engine.typical_amounts(product);
    let request = ForecastRequest {
        product_id: product.to_string(),
        location: range.location.clone(),
        unit_price: price.unwrap_or(typical_price),
        unit_cost: cost.unwrap_or(typical_cost),
        start: range.start,
        end: range.end,
        frequency: range.frequency,
    };
    let forecast = engine.forecast(&request)?;

    if args.json {
        return print_json(&forecast);
    }

    println!();
    println!(
        "🔮 {} forecast for product {} ({}) at {}",
        forecast.frequency,
        forecast.product_id,
        forecast.location,
        money(request.unit_price)
    );
    print_forecast(&forecast);
    Ok(())
}

pub fn cmd_forecast_multi(args: &EngineArgs, products: &[String], range: &RangeArgs) -> Result<()> {
    let engine = open_engine(args)?;
    let products: Vec<String> = if products.is_empty() {
        engine.snapshot().vocabulary().products().to_vec()
    } else {
        products.to_vec()
    };
    let multi = engine.forecast_multiple(
        &products,
        &range.location,
        range.start,
        range.end,
        range.frequency,
    );

    if args.json {
        return print_json(&multi);
    }

    println!();
    println!(
        "🔮 {} forecasts for {} products ({})",
        range.frequency,
        products.len(),
        range.location
    );
    println!();
    println!(
        "   {:<10}  {:>8}  {:>14}  {:>14}  {:<8}",
        "Product", "Periods", "Total", "Mean", "Trend"
    );
    println!("   ─────────────────────────────────────────────────────────────");
    for (product, forecast) in &multi.forecasts {
        match forecast.summary() {
            Some(s) => println!(
                "   {:<10}  {:>8}  {:>14}  {:>14}  {:<8}",
                product,
                s.periods,
                money(s.total),
                money(s.mean),
                s.trend.as_str()
            ),
            None => println!("   {:<10}  (no dates could be predicted)", product),
        }
    }
    for (product, error) in &multi.failures {
        println!("   {:<10}  ❌ {}", product, error);
    }
    println!();
    Ok(())
}

fn print_forecast(forecast: &Forecast) {
    println!(
        "   {:.0}% confidence band",
        forecast.confidence_level * 100.0
    );
    println!();
    println!(
        "   {:<12}  {:>14}  {:>14}  {:>14}",
        "Date", "Predicted", "Lower", "Upper"
    );
    println!("   ─────────────────────────────────────────────────────────────");
    for p in &forecast.points {
        println!(
            "   {:<12}  {:>14}  {:>14}  {:>14}",
            p.date.format("%Y-%m-%d").to_string(),
            money(p.predicted_value),
            money(p.lower_bound),
            money(p.upper_bound)
        );
    }
    for skipped in &forecast.skipped {
        println!(
            "   {:<12}  ⚠️  skipped: {}",
            skipped.date.format("%Y-%m-%d").to_string(),
            skipped.reason
        );
    }

    if let Some(summary) = forecast.summary() {
        println!();
        println!(
            "   Total {} over {} periods (mean {}, {})",
            money(summary.total),
            summary.periods,
            money(summary.mean),
            summary.trend.as_str()
        );
    }
    println!();
}
