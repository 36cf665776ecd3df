//! Aggregated views of the historical dataset for insight detection

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::models::SalesRow;

/// Revenue for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRevenue {
    /// First day of the month
    pub period: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub transactions: usize,
}

/// Totals for one product across the dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product_id: String,
    pub revenue: f64,
    pub cost: f64,
    pub quantity: f64,
    pub transactions: usize,
    /// Observed unit prices, one per transaction
    pub prices: Vec<f64>,
}

impl ProductSummary {
    pub fn avg_revenue(&self) -> f64 {
        if self.transactions == 0 {
            0.0
        } else {
            self.revenue / self.transactions as f64
        }
    }

    /// Gross margin as a percentage of revenue
    pub fn margin_pct(&self) -> Option<f64> {
        if self.revenue > 0.0 {
            Some((self.revenue - self.cost) / self.revenue * 100.0)
        } else {
            None
        }
    }
}

/// Totals for one location across the dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub location: String,
    pub revenue: f64,
    pub transactions: usize,
}

/// Dataset aggregates consumed by the insight detectors
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregatedDataset {
    /// Every calendar month from the first sale to the last, oldest first.
    /// Months without sales appear with zero revenue.
    pub monthly: Vec<PeriodRevenue>,
    /// Sorted by product id
    pub products: Vec<ProductSummary>,
    /// Sorted by revenue, highest first
    pub locations: Vec<LocationSummary>,
    /// Average monthly revenue per calendar month (index 0 = January)
    pub month_of_year: [Option<f64>; 12],
    pub total_revenue: f64,
    pub total_cost: f64,
    pub transactions: usize,
    /// Revenue of every transaction, ascending
    #[serde(skip)]
    pub transaction_revenues: Vec<f64>,
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Insert an empty period for every month missing between the first and last
fn fill_missing_months(monthly: &mut BTreeMap<NaiveDate, PeriodRevenue>) {
    let (Some(&first), Some(&last)) = (monthly.keys().next(), monthly.keys().next_back()) else {
        return;
    };
    let mut period = first;
    while period < last {
        monthly.entry(period).or_insert_with(|| PeriodRevenue {
            period,
            revenue: 0.0,
            cost: 0.0,
            transactions: 0,
        });
        match period.checked_add_months(Months::new(1)) {
            Some(next) => period = next,
            None => break,
        }
    }
}

impl AggregatedDataset {
    pub fn from_rows(rows: &[SalesRow]) -> Self {
        let mut monthly: BTreeMap<NaiveDate, PeriodRevenue> = BTreeMap::new();
        let mut products: BTreeMap<&str, ProductSummary> = BTreeMap::new();
        let mut locations: BTreeMap<&str, LocationSummary> = BTreeMap::new();

        for row in rows {
            let period = month_start(row.date);
            let m = monthly.entry(period).or_insert_with(|| PeriodRevenue {
                period,
                revenue: 0.0,
                cost: 0.0,
                transactions: 0,
            });
            m.revenue += row.revenue;
            m.cost += row.cost();
            m.transactions += 1;

            let p = products
                .entry(&row.product_id)
                .or_insert_with(|| ProductSummary {
                    product_id: row.product_id.clone(),
                    revenue: 0.0,
                    cost: 0.0,
                    quantity: 0.0,
                    transactions: 0,
                    prices: Vec::new(),
                });
            p.revenue += row.revenue;
            p.cost += row.cost();
            p.quantity += row.quantity;
            p.transactions += 1;
            p.prices.push(row.unit_price);

            let l = locations
                .entry(&row.location)
                .or_insert_with(|| LocationSummary {
                    location: row.location.clone(),
                    revenue: 0.0,
                    transactions: 0,
                });
            l.revenue += row.revenue;
            l.transactions += 1;
        }

        fill_missing_months(&mut monthly);
        let monthly: Vec<PeriodRevenue> = monthly.into_values().collect();

        // Average each calendar month over the years the series covers it
        let mut sums = [(0.0, 0usize); 12];
        for m in &monthly {
            let slot = &mut sums[m.period.month0() as usize];
            slot.0 += m.revenue;
            slot.1 += 1;
        }
        let mut month_of_year = [None; 12];
        for (i, (sum, count)) in sums.iter().enumerate() {
            if *count > 0 {
                month_of_year[i] = Some(sum / *count as f64);
            }
        }

        let mut locations: Vec<LocationSummary> = locations.into_values().collect();
        locations.sort_by(|a, b| {
            b.revenue
                .partial_cmp(&a.revenue)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.location.cmp(&b.location))
        });

        let mut transaction_revenues: Vec<f64> = rows.iter().map(|r| r.revenue).collect();
        transaction_revenues.sort_by(|a, b| a.total_cmp(b));

        Self {
            total_revenue: monthly.iter().map(|m| m.revenue).sum(),
            total_cost: monthly.iter().map(|m| m.cost).sum(),
            transactions: rows.len(),
            monthly,
            products: products.into_values().collect(),
            locations,
            month_of_year,
            transaction_revenues,
        }
    }

    /// Number of calendar months spanned, first to last inclusive
    pub fn span_months(&self) -> u32 {
        match (self.monthly.first(), self.monthly.last()) {
            (Some(first), Some(last)) => {
                let months = (last.period.year() - first.period.year()) * 12
                    + last.period.month() as i32
                    - first.period.month() as i32;
                (months + 1).max(1) as u32
            }
            _ => 0,
        }
    }

    /// Multiplier that turns a per-dataset amount into a yearly one
    pub fn annualization_factor(&self) -> f64 {
        match self.span_months() {
            0 => 0.0,
            span => 12.0 / span as f64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions == 0
    }
}
