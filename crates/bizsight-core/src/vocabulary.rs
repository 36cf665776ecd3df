//! Category vocabularies (trained label encoders)
//!
//! Each field maps a known name to a stable index. Lookups of names outside the
//! vocabulary fail with [`Error::UnknownCategory`]; there is no fallback index.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{SalesRow, WEEKDAY_NAMES};

/// Which categorical field a lookup is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Location,
    Product,
    Weekday,
}

impl CategoryField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Product => "product_id",
            Self::Weekday => "weekday",
        }
    }
}

/// Immutable set of known category names with stable index assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VocabularyFile")]
pub struct CategoryVocabulary {
    locations: Vec<String>,
    products: Vec<String>,
    weekdays: Vec<String>,
}

/// On-disk form; normalized through [`CategoryVocabulary::new`] so artifact
/// order never affects index assignment
#[derive(Deserialize)]
struct VocabularyFile {
    locations: Vec<String>,
    products: Vec<String>,
}

impl From<VocabularyFile> for CategoryVocabulary {
    fn from(file: VocabularyFile) -> Self {
        Self::new(file.locations, file.products)
    }
}

fn default_weekdays() -> Vec<String> {
    WEEKDAY_NAMES.iter().map(|w| w.to_string()).collect()
}

fn normalize(names: impl IntoIterator<Item = String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl CategoryVocabulary {
    /// Build a vocabulary; names are trimmed, deduplicated and sorted so the
    /// index assignment does not depend on input order
    pub fn new(
        locations: impl IntoIterator<Item = String>,
        products: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            locations: normalize(locations),
            products: normalize(products),
            weekdays: default_weekdays(),
        }
    }

    /// Collect the vocabulary observed in a dataset
    pub fn from_rows(rows: &[SalesRow]) -> Self {
        Self::new(
            rows.iter().map(|r| r.location.clone()),
            rows.iter().map(|r| r.product_id.clone()),
        )
    }

    fn names(&self, field: CategoryField) -> &[String] {
        match field {
            CategoryField::Location => &self.locations,
            CategoryField::Product => &self.products,
            CategoryField::Weekday => &self.weekdays,
        }
    }

    /// Index of a name within a field's vocabulary
    pub fn index_of(&self, field: CategoryField, value: &str) -> Result<usize> {
        let names = self.names(field);
        let needle = value.trim();
        let found = match field {
            // Weekday input is free-form text, so accept any casing
            CategoryField::Weekday => names.iter().position(|n| n.eq_ignore_ascii_case(needle)),
            _ => names.binary_search_by(|n| n.as_str().cmp(needle)).ok(),
        };
        found.ok_or_else(|| Error::unknown_category(field.as_str(), value))
    }

    pub fn contains(&self, field: CategoryField, value: &str) -> bool {
        self.index_of(field, value).is_ok()
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn weekdays(&self) -> &[String] {
        &self.weekdays
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() || self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> CategoryVocabulary {
        CategoryVocabulary::new(
            vec!["South".to_string(), "North".to_string(), "North".to_string()],
            vec!["12".to_string(), "7".to_string()],
        )
    }

    #[test]
    fn test_indices_are_stable_and_sorted() {
        let v = vocab();
        assert_eq!(v.locations(), &["North".to_string(), "South".to_string()]);
        assert_eq!(v.index_of(CategoryField::Location, "North").unwrap(), 0);
        assert_eq!(v.index_of(CategoryField::Location, "South").unwrap(), 1);
        // Lexicographic: "12" < "7"
        assert_eq!(v.index_of(CategoryField::Product, "7").unwrap(), 1);
    }

    #[test]
    fn test_unknown_is_rejected_not_defaulted() {
        let v = vocab();
        match v.index_of(CategoryField::Location, "Atlantis") {
            Err(Error::UnknownCategory { field, value }) => {
                assert_eq!(field, "location");
                assert_eq!(value, "Atlantis");
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialized_vocabulary_is_normalized() {
        let v: CategoryVocabulary =
            serde_json::from_str(r#"{"locations": ["West", "East"], "products": ["b", "a"]}"#)
                .unwrap();
        assert_eq!(v.index_of(CategoryField::Location, "East").unwrap(), 0);
        assert_eq!(v.index_of(CategoryField::Product, "b").unwrap(), 1);
        assert_eq!(v.weekdays().len(), 7);
    }

    #[test]
    fn test_weekday_lookup_ignores_case() {
        let v = vocab();
        assert_eq!(v.index_of(CategoryField::Weekday, "friday").unwrap(), 4);
        assert!(v.index_of(CategoryField::Weekday, "Funday").is_err());
    }
}
