//! Historical sales data providers
//!
//! The engine only reads historical data. A provider hands back the combined
//! dataset; everything derived from it (reference stats, aggregates) is built
//! once per snapshot.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::SalesRow;
use crate::vocabulary::CategoryVocabulary;

/// Source of historical sales rows
pub trait DataProvider: Send + Sync {
    /// All historical rows
    fn sales(&self) -> Result<Vec<SalesRow>>;

    /// Categories present in the data
    fn vocabulary(&self) -> Result<CategoryVocabulary> {
        Ok(CategoryVocabulary::from_rows(&self.sales()?))
    }
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDataProvider {
    rows: Vec<SalesRow>,
}

impl MemoryDataProvider {
    pub fn new(rows: Vec<SalesRow>) -> Self {
        Self { rows }
    }
}

impl DataProvider for MemoryDataProvider {
    fn sales(&self) -> Result<Vec<SalesRow>> {
        Ok(self.rows.clone())
    }
}

/// Combined sales CSV export
///
/// Required headers: `date, product_id, location, unit_price, unit_cost,
/// quantity`. An optional `revenue` column is used when present and non-empty,
/// otherwise revenue is `quantity × unit_price`.
#[derive(Debug, Clone)]
pub struct CsvDataProvider {
    path: PathBuf,
}

impl CsvDataProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataProvider for CsvDataProvider {
    fn sales(&self) -> Result<Vec<SalesRow>> {
        let file = File::open(&self.path)?;
        parse_sales_csv(file)
    }
}

struct Columns {
    date: usize,
    product_id: usize,
    location: usize,
    unit_price: usize,
    unit_cost: usize,
    quantity: usize,
    revenue: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::validation("csv", format!("missing column '{}'", name)))
        };
        Ok(Self {
            date: require("date")?,
            product_id: require("product_id")?,
            location: require("location")?,
            unit_price: require("unit_price")?,
            unit_cost: require("unit_cost")?,
            quantity: require("quantity")?,
            revenue: find("revenue"),
        })
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

fn parse_number(s: &str) -> Option<f64> {
    let cleaned = s.trim().replace(['$', ','], "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_row(record: &StringRecord, cols: &Columns) -> std::result::Result<SalesRow, String> {
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing {}", name))
    };
    let number = |idx: usize, name: &str| {
        let raw = field(idx, name)?;
        parse_number(raw).ok_or_else(|| format!("{} '{}' is not a number", name, raw))
    };

    let date_str = field(cols.date, "date")?;
    let date = parse_date(date_str).ok_or_else(|| format!("date '{}' is not a date", date_str))?;
    let unit_price = number(cols.unit_price, "unit_price")?;
    let unit_cost = number(cols.unit_cost, "unit_cost")?;
    let quantity = number(cols.quantity, "quantity")?;
    if unit_price < 0.0 || unit_cost < 0.0 || quantity < 0.0 {
        return Err("negative price, cost or quantity".to_string());
    }

    let revenue = match cols.revenue.and_then(|i| record.get(i)).map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            parse_number(raw).ok_or_else(|| format!("revenue '{}' is not a number", raw))?
        }
        _ => quantity * unit_price,
    };

    Ok(SalesRow {
        date,
        product_id: field(cols.product_id, "product_id")?.to_string(),
        location: field(cols.location, "location")?.to_string(),
        unit_price,
        unit_cost,
        quantity,
        revenue,
    })
}

/// Parse a combined sales CSV; malformed rows are skipped with a warning
pub fn parse_sales_csv<R: Read>(reader: R) -> Result<Vec<SalesRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let cols = Columns::from_headers(rdr.headers()?)?;
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (line, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            // A failing reader is not a bad row
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                skipped += 1;
                warn!(line = line + 2, error = %e, "Skipping unreadable sales row");
                continue;
            }
        };
        match parse_row(&record, &cols) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                skipped += 1;
                // +2: header line and 1-based numbering
                warn!(line = line + 2, reason = %reason, "Skipping malformed sales row");
            }
        }
    }

    debug!(rows = rows.len(), skipped, "Parsed sales CSV");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sales_csv() {
        let csv = "date,product_id,location,unit_price,unit_cost,quantity,revenue\n\
                   2024-01-05,12,North,10.00,4.00,3,\n\
                   2024-01-06,7,South,20.00,8.00,2,38.00\n";
        let rows = parse_sales_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, "12");
        // Blank revenue falls back to quantity × price
        assert!((rows[0].revenue - 30.0).abs() < 1e-9);
        // Explicit revenue (e.g. after discounts) is kept
        assert!((rows[1].revenue - 38.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_sales_csv_with_quoted_amounts() {
        let csv = "Date,Product_ID,Location,Unit_Price,Unit_Cost,Quantity\n\
                   01/06/2024,7,South,\"$1,200.50\",600,2\n";
        let rows = parse_sales_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert!((rows[0].unit_price - 1200.5).abs() < 1e-9);
        assert!((rows[0].revenue - 2401.0).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let csv = "date,product_id,location,unit_price,unit_cost,quantity\n\
                   not-a-date,1,North,1,1,1\n\
                   2024-01-01,1,North,-5,1,1\n\
                   2024-01-02,1,North,5,1,abc\n\
                   2024-01-03,1,North,5,1,2\n";
        let rows = parse_sales_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let mut csv = b"date,product_id,location,unit_price,unit_cost,quantity\n\
                        2024-01-01,1,North,5,1,2\n\
                        2024-01-02,1,"
            .to_vec();
        csv.extend_from_slice(&[0xFF, 0xFE]);
        csv.extend_from_slice(b",5,1,2\n2024-01-03,1,South,5,1,4\n");

        let rows = parse_sales_csv(csv.as_slice()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].location, "North");
        assert_eq!(rows[1].location, "South");
    }

    #[test]
    fn test_missing_column_is_validation_error() {
        let csv = "date,product_id,unit_price,unit_cost,quantity\n";
        match parse_sales_csv(csv.as_bytes()) {
            Err(Error::Validation { field, message }) => {
                assert_eq!(field, "csv");
                assert!(message.contains("location"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_provider_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(
            &path,
            "date,product_id,location,unit_price,unit_cost,quantity\n2024-02-01,A,East,2,1,5\n",
        )
        .unwrap();

        let provider = CsvDataProvider::new(&path);
        let rows = provider.sales().unwrap();
        assert_eq!(rows.len(), 1);
        let vocab = provider.vocabulary().unwrap();
        assert_eq!(vocab.locations(), &["East".to_string()]);
    }
}
