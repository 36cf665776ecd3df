//! Domain models for Bizsight

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Weekday names in the order used by the vocabulary and by `Weekday::num_days_from_monday`
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Full English name for a chrono weekday
pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_NAMES[weekday.num_days_from_monday() as usize]
}

/// A single transaction to be scored
///
/// Price and cost are optional so scenario planning can run on partial input;
/// prediction rejects a record that lacks either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
    pub location: String,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub unit_cost: Option<f64>,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Derived from the date when omitted
    #[serde(default)]
    pub weekday: Option<String>,
}

impl TransactionRecord {
    /// Create a record for a calendar date, deriving the weekday
    pub fn new(
        product_id: impl Into<String>,
        location: impl Into<String>,
        unit_price: f64,
        unit_cost: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            location: location.into(),
            unit_price: Some(unit_price),
            unit_cost: Some(unit_cost),
            year: date.year(),
            month: date.month(),
            day: date.day(),
            weekday: Some(weekday_name(date.weekday()).to_string()),
        }
    }

    /// The calendar date named by the year/month/day fields
    pub fn date(&self) -> Result<NaiveDate> {
        if !(1..=12).contains(&self.month) {
            return Err(Error::validation(
                "month",
                format!("{} is outside 1-12", self.month),
            ));
        }
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).ok_or_else(|| {
            Error::validation(
                "day",
                format!(
                    "{} is not a valid day for {}-{:02}",
                    self.day, self.year, self.month
                ),
            )
        })
    }

    /// The weekday name as given, or derived from the date
    pub fn weekday_or_derived(&self) -> Result<String> {
        match &self.weekday {
            Some(w) => Ok(w.clone()),
            None => Ok(weekday_name(self.date()?.weekday()).to_string()),
        }
    }

    /// Same record with a different unit price
    pub fn with_unit_price(&self, unit_price: f64) -> Self {
        Self {
            unit_price: Some(unit_price),
            ..self.clone()
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(f) => f.to_string(),
    })
}

/// A historical sale as supplied by a data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRow {
    pub date: NaiveDate,
    pub product_id: String,
    pub location: String,
    pub unit_price: f64,
    pub unit_cost: f64,
    pub quantity: f64,
    pub revenue: f64,
}

impl SalesRow {
    pub fn cost(&self) -> f64 {
        self.quantity * self.unit_cost
    }
}

/// Sampling frequency for forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "d" => Ok(Self::Daily),
            "weekly" | "w" => Ok(Self::Weekly),
            "monthly" | "m" => Ok(Self::Monthly),
            _ => Err(format!(
                "Unknown frequency: {} (valid: daily, weekly, monthly)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Objective for price optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Revenue,
    Profit,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Profit => "profit",
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "revenue" => Ok(Self::Revenue),
            "profit" => Ok(Self::Profit),
            _ => Err(format!("Unknown metric: {} (valid: revenue, profit)", s)),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Meteorological season (northern hemisphere) for a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Autumn,
            _ => Self::Winter,
        }
    }

    /// Discrete flag used as a model feature
    pub fn index(&self) -> u8 {
        match self {
            Self::Winter => 0,
            Self::Spring => 1,
            Self::Summer => 2,
            Self::Autumn => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
        }
    }
}
