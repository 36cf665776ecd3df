//! Reference statistics precomputed from historical sales
//!
//! These aggregates feed price-relative features and forecast confidence bands.
//! They are computed once per snapshot and never mutated afterwards.

use std::collections::HashMap;

use chrono::Datelike;

use crate::models::{SalesRow, Season};

/// Minimum rows in a segment before its variance is trusted
pub const MIN_SEGMENT_SAMPLES: usize = 3;

/// Historical aggregates for one product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductStats {
    pub avg_price: f64,
    pub avg_cost: f64,
    /// Share of total units sold (0-1)
    pub popularity: f64,
    pub transactions: usize,
}

/// Historical aggregates for one location
#[derive(Debug, Clone, PartialEq)]
pub struct LocationStats {
    pub avg_price: f64,
    /// Share of total revenue (0-1)
    pub popularity: f64,
    pub transactions: usize,
}

/// Revenue distribution of a (product, location, season) segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SegmentKey {
    product_id: String,
    location: String,
    season: Season,
}

/// Precomputed lookups used by feature engineering and forecasting
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStats {
    pub global_avg_price: f64,
    pub global_avg_cost: f64,
    pub global_avg_revenue: f64,
    products: HashMap<String, ProductStats>,
    locations: HashMap<String, LocationStats>,
    /// Average revenue per transaction in each calendar month relative to the
    /// global average; 1.0 where a month has no history
    month_index: [f64; 12],
    segments: HashMap<SegmentKey, SegmentStats>,
}

impl Default for ReferenceStats {
    fn default() -> Self {
        Self {
            global_avg_price: 0.0,
            global_avg_cost: 0.0,
            global_avg_revenue: 0.0,
            products: HashMap::new(),
            locations: HashMap::new(),
            month_index: [1.0; 12],
            segments: HashMap::new(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1); zero for fewer than two values
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

impl ReferenceStats {
    /// Aggregate a dataset into reference lookups
    pub fn from_rows(rows: &[SalesRow]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let prices: Vec<f64> = rows.iter().map(|r| r.unit_price).collect();
        let costs: Vec<f64> = rows.iter().map(|r| r.unit_cost).collect();
        let revenues: Vec<f64> = rows.iter().map(|r| r.revenue).collect();
        let global_avg_revenue = mean(&revenues);

        let total_quantity: f64 = rows.iter().map(|r| r.quantity).sum();
        let total_revenue: f64 = revenues.iter().sum();

        let mut by_product: HashMap<&str, Vec<&SalesRow>> = HashMap::new();
        let mut by_location: HashMap<&str, Vec<&SalesRow>> = HashMap::new();
        let mut by_month: [Vec<f64>; 12] = Default::default();
        let mut by_segment: HashMap<SegmentKey, Vec<f64>> = HashMap::new();

        for row in rows {
            by_product.entry(&row.product_id).or_default().push(row);
            by_location.entry(&row.location).or_default().push(row);
            by_month[row.date.month0() as usize].push(row.revenue);
            by_segment
                .entry(SegmentKey {
                    product_id: row.product_id.clone(),
                    location: row.location.clone(),
                    season: Season::from_month(row.date.month()),
                })
                .or_default()
                .push(row.revenue);
        }

        let products = by_product
            .into_iter()
            .map(|(id, rows)| {
                let quantity: f64 = rows.iter().map(|r| r.quantity).sum();
                let stats = ProductStats {
                    avg_price: mean(&rows.iter().map(|r| r.unit_price).collect::<Vec<_>>()),
                    avg_cost: mean(&rows.iter().map(|r| r.unit_cost).collect::<Vec<_>>()),
                    popularity: if total_quantity > 0.0 {
                        quantity / total_quantity
                    } else {
                        0.0
                    },
                    transactions: rows.len(),
                };
                (id.to_string(), stats)
            })
            .collect();

        let locations = by_location
            .into_iter()
            .map(|(name, rows)| {
                let revenue: f64 = rows.iter().map(|r| r.revenue).sum();
                let stats = LocationStats {
                    avg_price: mean(&rows.iter().map(|r| r.unit_price).collect::<Vec<_>>()),
                    popularity: if total_revenue > 0.0 {
                        revenue / total_revenue
                    } else {
                        0.0
                    },
                    transactions: rows.len(),
                };
                (name.to_string(), stats)
            })
            .collect();

        let mut month_index = [1.0; 12];
        for (i, values) in by_month.iter().enumerate() {
            if !values.is_empty() && global_avg_revenue > 0.0 {
                month_index[i] = mean(values) / global_avg_revenue;
            }
        }

        let segments = by_segment
            .into_iter()
            .map(|(key, values)| {
                let stats = SegmentStats {
                    mean: mean(&values),
                    std_dev: sample_std_dev(&values),
                    count: values.len(),
                };
                (key, stats)
            })
            .collect();

        Self {
            global_avg_price: mean(&prices),
            global_avg_cost: mean(&costs),
            global_avg_revenue,
            products,
            locations,
            month_index,
            segments,
        }
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductStats> {
        self.products.get(product_id)
    }

    pub fn location(&self, location: &str) -> Option<&LocationStats> {
        self.locations.get(location)
    }

    /// Product's historical average price, else the global average
    pub fn reference_price_for_product(&self, product_id: &str) -> f64 {
        self.product(product_id)
            .map(|p| p.avg_price)
            .filter(|p| *p > 0.0)
            .unwrap_or(self.global_avg_price)
    }

    /// Location's historical average price, else the global average
    pub fn reference_price_for_location(&self, location: &str) -> f64 {
        self.location(location)
            .map(|l| l.avg_price)
            .filter(|p| *p > 0.0)
            .unwrap_or(self.global_avg_price)
    }

    /// Product's share of units sold; products without history get an even share
    pub fn product_popularity(&self, product_id: &str) -> f64 {
        match self.product(product_id) {
            Some(p) => p.popularity,
            None if !self.products.is_empty() => 1.0 / self.products.len() as f64,
            None => 0.0,
        }
    }

    /// Location's share of revenue; locations without history get an even share
    pub fn location_popularity(&self, location: &str) -> f64 {
        match self.location(location) {
            Some(l) => l.popularity,
            None if !self.locations.is_empty() => 1.0 / self.locations.len() as f64,
            None => 0.0,
        }
    }

    /// Revenue index for a calendar month (1-12)
    pub fn seasonal_index(&self, month: u32) -> f64 {
        match month {
            1..=12 => self.month_index[(month - 1) as usize],
            _ => 1.0,
        }
    }

    /// Revenue spread for a segment, if it has enough history to be meaningful
    pub fn segment(&self, product_id: &str, location: &str, season: Season) -> Option<SegmentStats> {
        self.segments
            .get(&SegmentKey {
                product_id: product_id.to_string(),
                location: location.to_string(),
                season,
            })
            .copied()
            .filter(|s| s.count >= MIN_SEGMENT_SAMPLES && s.std_dev.is_finite())
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &String> {
        self.products.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(date: (i32, u32, u32), product: &str, location: &str, price: f64, qty: f64) -> SalesRow {
        SalesRow {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            product_id: product.to_string(),
            location: location.to_string(),
            unit_price: price,
            unit_cost: price / 2.0,
            quantity: qty,
            revenue: price * qty,
        }
    }

    #[test]
    fn test_empty_dataset_has_neutral_defaults() {
        let stats = ReferenceStats::from_rows(&[]);
        assert_eq!(stats.seasonal_index(6), 1.0);
        assert_eq!(stats.product_popularity("x"), 0.0);
        assert!(stats.segment("x", "y", Season::Summer).is_none());
    }

    #[test]
    fn test_product_and_location_aggregates() {
        let rows = vec![
            row((2024, 1, 5), "A", "North", 10.0, 3.0),
            row((2024, 1, 6), "A", "South", 20.0, 1.0),
            row((2024, 7, 5), "B", "North", 5.0, 4.0),
        ];
        let stats = ReferenceStats::from_rows(&rows);

        let a = stats.product("A").unwrap();
        assert!((a.avg_price - 15.0).abs() < 1e-9);
        assert!((a.popularity - 0.5).abs() < 1e-9);

        // North: 30 + 20 = 50 of 70 total revenue
        assert!((stats.location_popularity("North") - 50.0 / 70.0).abs() < 1e-9);

        // Unknown product falls back to the global average price
        assert!((stats.reference_price_for_product("Z") - 35.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_requires_minimum_samples() {
        let mut rows = vec![
            row((2024, 6, 1), "A", "North", 10.0, 1.0),
            row((2024, 6, 2), "A", "North", 10.0, 3.0),
        ];
        let stats = ReferenceStats::from_rows(&rows);
        assert!(stats.segment("A", "North", Season::Summer).is_none());

        rows.push(row((2024, 7, 2), "A", "North", 10.0, 5.0));
        let stats = ReferenceStats::from_rows(&rows);
        let seg = stats.segment("A", "North", Season::Summer).unwrap();
        assert_eq!(seg.count, 3);
        assert!((seg.mean - 30.0).abs() < 1e-9);
        assert!((seg.std_dev - 20.0).abs() < 1e-9);
    }
}
