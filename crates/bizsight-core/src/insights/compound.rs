//! Compound insights: fixed co-occurrence rules over base insights
//!
//! A compound is emitted in addition to its constituents, never instead of
//! them. Its severity is the most severe constituent raised one level and its
//! priority is the highest constituent priority plus a boost.

use serde_json::json;

use super::types::{Insight, InsightCategory};

/// A pattern that only matters when all of its constituents are present
#[derive(Debug, Clone, Copy)]
pub struct CompoundRule {
    pub id: &'static str,
    pub title: &'static str,
    pub constituents: &'static [&'static str],
    pub summary: &'static str,
    pub action: &'static str,
}

pub const COMPOUND_RULES: &[CompoundRule] = &[
    CompoundRule {
        id: "revenue_product_crisis",
        title: "Revenue-Product Crisis",
        constituents: &["revenue_decline", "underperforming_products"],
        summary: "Revenue is falling while part of the catalog is already underperforming",
        action: "Cut or reposition the weakest products and redirect effort to the best sellers before the decline compounds",
    },
    CompoundRule {
        id: "strategic_vulnerability",
        title: "Strategic Vulnerability",
        constituents: &["location_concentration", "pricing_inconsistency"],
        summary: "Revenue depends on few locations and pricing varies widely",
        action: "Standardize pricing first, then use the consistent price list to grow secondary locations",
    },
    CompoundRule {
        id: "seasonal_cash_squeeze",
        title: "Seasonal Cash Squeeze",
        constituents: &["seasonal_volatility", "revenue_decline"],
        summary: "A revenue decline is landing on top of strong seasonal swings",
        action: "Build a cash buffer for the trough months and move promotions into the off-season",
    },
];

/// Evaluate every rule against one pass's base insights
pub fn apply_compound_rules(base: &[Insight], boost: f64) -> Vec<Insight> {
    COMPOUND_RULES
        .iter()
        .filter_map(|rule| compound_for(rule, base, boost))
        .collect()
}

fn compound_for(rule: &CompoundRule, base: &[Insight], boost: f64) -> Option<Insight> {
    let members: Vec<&Insight> = rule
        .constituents
        .iter()
        .map(|id| base.iter().find(|i| !i.is_compound() && i.id == *id))
        .collect::<Option<_>>()?;

    let severity = members.iter().map(|m| m.severity).max()?.raised();
    let top = |f: fn(&Insight) -> f64| members.iter().map(|m| f(m)).fold(0.0, f64::max);

    let mut insight = Insight::new(
        rule.id,
        InsightCategory::Compound,
        severity,
        rule.title,
        rule.summary,
    )
    .with_metrics(json!({
        "constituent_severities": members
            .iter()
            .map(|m| (m.id.clone(), m.severity.as_str()))
            .collect::<std::collections::BTreeMap<_, _>>(),
    }))
    .with_action(rule.action)
    .with_scores(top(|i| i.impact), top(|i| i.urgency), top(|i| i.feasibility));

    insight.priority_score = top(|i| i.priority_score) + boost;
    insight.constituents = rule.constituents.iter().map(|c| c.to_string()).collect();
    Some(insight)
}
