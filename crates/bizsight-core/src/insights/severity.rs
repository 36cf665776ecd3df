//! Severity classification
//!
//! Distribution-relative metrics are classified by percentile rank within the
//! current dataset, so the same relative underperformance gets the same
//! severity whatever the business's scale. Ratio metrics use fixed bands.

use super::types::Severity;

/// Percentage (0-100) of `values` strictly below `value`
pub fn percentile_rank(value: f64, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 50.0;
    }
    let below = values.iter().filter(|v| **v < value).count();
    below as f64 / values.len() as f64 * 100.0
}

/// ≤10th critical, ≤25th high, below the 50th medium, else low
pub fn severity_from_percentile(percentile: f64) -> Severity {
    if percentile <= 10.0 {
        Severity::Critical
    } else if percentile <= 25.0 {
        Severity::High
    } else if percentile < 50.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// First severity whose threshold `value` exceeds; bands are ordered from the
/// highest threshold down
pub fn classify_band(value: f64, bands: &[(f64, Severity)]) -> Option<Severity> {
    bands
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(_, severity)| *severity)
}

/// Median of unsorted values (0 when empty)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_thresholds() {
        assert_eq!(severity_from_percentile(0.0), Severity::Critical);
        assert_eq!(severity_from_percentile(10.0), Severity::Critical);
        assert_eq!(severity_from_percentile(25.0), Severity::High);
        assert_eq!(severity_from_percentile(45.0), Severity::Medium);
        assert_eq!(severity_from_percentile(50.0), Severity::Low);
    }

    #[test]
    fn test_percentile_rank_is_scale_invariant() {
        let small: Vec<f64> = (1..=20).map(|v| v as f64 * 50.0).collect();
        let large: Vec<f64> = small.iter().map(|v| v * 100.0).collect();

        let p_small = percentile_rank(small[9], &small);
        let p_large = percentile_rank(large[9], &large);
        assert_eq!(p_small, 45.0);
        assert_eq!(p_small, p_large);
        assert_eq!(severity_from_percentile(p_large), Severity::Medium);
    }

    #[test]
    fn test_classify_band() {
        let bands = [
            (20.0, Severity::Critical),
            (10.0, Severity::High),
            (5.0, Severity::Medium),
        ];
        assert_eq!(classify_band(25.0, &bands), Some(Severity::Critical));
        assert_eq!(classify_band(20.0, &bands), Some(Severity::High));
        assert_eq!(classify_band(7.0, &bands), Some(Severity::Medium));
        assert_eq!(classify_band(3.0, &bands), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}
