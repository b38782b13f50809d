//! Red/Amber/Green contractor scoring.
//!
//! Each sub-score starts green and is worsened by fixed-threshold rules over
//! metrics gathered from the database. The overall score is the worst
//! sub-score. Scoring is pure: callers gather the metrics and persist the
//! resulting factors.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Minimum acceptable insurance coverage
pub const MIN_INSURANCE_COVERAGE: i64 = 1_000_000;

/// Bonding capacity below this is flagged
pub const MIN_BONDING_CAPACITY: i64 = 500_000;

/// Document types that must be approved for a compliant contractor
pub const REQUIRED_DOCUMENT_TYPES: [&str; 4] = [
    "business_registration",
    "insurance_liability",
    "insurance_wcb",
    "bank_information",
];

/// Traffic-light score. Ordering is by severity: `Green < Amber < Red`.
/// Unscored contractors default to amber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagScore {
    Green,
    #[default]
    Amber,
    Red,
}

impl RagScore {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "green" => Some(Self::Green),
            "amber" => Some(Self::Amber),
            "red" => Some(Self::Red),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }

    /// Raise to amber unless already worse.
    fn at_least_amber(&mut self) {
        if *self == Self::Green {
            *self = Self::Amber;
        }
    }
}

impl fmt::Display for RagScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which score a factor or update applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    Overall,
    Financial,
    Compliance,
    Performance,
    Safety,
}

impl ScoreType {
    /// The four sub-scores, in evaluation order.
    pub const COMPONENTS: [ScoreType; 4] = [
        Self::Financial,
        Self::Compliance,
        Self::Performance,
        Self::Safety,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "overall" => Some(Self::Overall),
            "financial" => Some(Self::Financial),
            "compliance" => Some(Self::Compliance),
            "performance" => Some(Self::Performance),
            "safety" => Some(Self::Safety),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Financial => "financial",
            Self::Compliance => "compliance",
            Self::Performance => "performance",
            Self::Safety => "safety",
        }
    }

    /// Column on `contractors` holding this score.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Overall => "rag_overall",
            Self::Financial => "rag_financial",
            Self::Compliance => "rag_compliance",
            Self::Performance => "rag_performance",
            Self::Safety => "rag_safety",
        }
    }
}

/// Effect a factor had on its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Negative,
    Moderate,
    Neutral,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Moderate => "moderate",
            Self::Neutral => "neutral",
        }
    }
}

/// A single reason recorded against a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagFactor {
    #[serde(rename = "type")]
    pub score_type: ScoreType,
    pub name: String,
    pub value: Value,
    pub impact: Impact,
}

impl RagFactor {
    fn new(score_type: ScoreType, name: &str, value: Value, impact: Impact) -> Self {
        Self {
            score_type,
            name: name.to_string(),
            value,
            impact,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialMetrics {
    pub insurance_coverage: Option<Decimal>,
    pub bonding_capacity: Option<Decimal>,
    pub overdue_projects: i64,
    pub years_in_business: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplianceMetrics {
    pub total_documents: i64,
    pub approved_documents: i64,
    pub rejected_documents: i64,
    pub expired_documents: i64,
    /// Approved documents among [`REQUIRED_DOCUMENT_TYPES`]
    pub required_approved: i64,
    pub compliance_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceMetrics {
    pub total_projects: i64,
    pub completed_projects: i64,
    pub cancelled_projects: i64,
    /// Actual duration over planned duration, averaged over completed projects
    pub avg_schedule_performance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyMetrics {
    pub safety_certs: i64,
    /// Incidents in the last year
    pub incidents: i64,
    pub high_severity_incidents: i64,
}

/// Outcome of evaluating one sub-score
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub score: RagScore,
    pub factors: Vec<RagFactor>,
}

pub fn score_financial(m: &FinancialMetrics) -> Evaluation {
    let mut score = RagScore::Green;
    let mut factors = Vec::new();
    let t = ScoreType::Financial;

    if m.insurance_coverage
        .map_or(true, |c| c < Decimal::from(MIN_INSURANCE_COVERAGE))
    {
        score = RagScore::Red;
        factors.push(RagFactor::new(t, "insurance_coverage", json!("insufficient"), Impact::Negative));
    }

    if m.bonding_capacity
        .map_or(true, |c| c < Decimal::from(MIN_BONDING_CAPACITY))
    {
        score.at_least_amber();
        factors.push(RagFactor::new(t, "bonding_capacity", json!("low"), Impact::Negative));
    }

    if m.overdue_projects > 0 {
        score = RagScore::Red;
        factors.push(RagFactor::new(t, "overdue_projects", json!(m.overdue_projects), Impact::Negative));
    }

    let years = m.years_in_business.unwrap_or(0);
    if years < 2 {
        score.at_least_amber();
        factors.push(RagFactor::new(t, "years_in_business", json!(years), Impact::Negative));
    }

    Evaluation { score, factors }
}

pub fn score_compliance(m: &ComplianceMetrics) -> Evaluation {
    let mut score = RagScore::Green;
    let mut factors = Vec::new();
    let t = ScoreType::Compliance;
    let required = REQUIRED_DOCUMENT_TYPES.len() as i64;

    if m.expired_documents > 0 {
        score = RagScore::Red;
        factors.push(RagFactor::new(t, "expired_documents", json!(m.expired_documents), Impact::Negative));
    }

    if m.rejected_documents > 0 {
        score.at_least_amber();
        factors.push(RagFactor::new(t, "rejected_documents", json!(m.rejected_documents), Impact::Negative));
    }

    if m.required_approved < required {
        score = RagScore::Red;
        factors.push(RagFactor::new(
            t,
            "missing_required_documents",
            json!(required - m.required_approved),
            Impact::Negative,
        ));
    }

    if m.compliance_status.as_deref() == Some("non_compliant") {
        score = RagScore::Red;
        factors.push(RagFactor::new(t, "compliance_status", json!("non_compliant"), Impact::Negative));
    }

    Evaluation { score, factors }
}

pub fn score_performance(m: &PerformanceMetrics) -> Evaluation {
    let t = ScoreType::Performance;

    if m.total_projects <= 0 {
        return Evaluation {
            score: RagScore::Amber,
            factors: vec![RagFactor::new(t, "project_history", json!("none"), Impact::Neutral)],
        };
    }

    let mut score = RagScore::Green;
    let mut factors = Vec::new();
    let completion_rate = m.completed_projects as f64 / m.total_projects as f64 * 100.0;

    if completion_rate < 70.0 {
        score = RagScore::Red;
        factors.push(RagFactor::new(t, "completion_rate", json!(completion_rate), Impact::Negative));
    } else if completion_rate < 85.0 {
        score = RagScore::Amber;
        factors.push(RagFactor::new(t, "completion_rate", json!(completion_rate), Impact::Moderate));
    }

    if m.cancelled_projects as f64 > m.total_projects as f64 * 0.1 {
        score.at_least_amber();
        factors.push(RagFactor::new(t, "cancellation_rate", json!("high"), Impact::Negative));
    }

    if m.avg_schedule_performance.is_some_and(|s| s > 1.2) {
        score.at_least_amber();
        factors.push(RagFactor::new(t, "schedule_performance", json!("delayed"), Impact::Negative));
    }

    Evaluation { score, factors }
}

pub fn score_safety(m: &SafetyMetrics) -> Evaluation {
    let mut score = RagScore::Green;
    let mut factors = Vec::new();
    let t = ScoreType::Safety;

    if m.high_severity_incidents > 0 {
        score = RagScore::Red;
        factors.push(RagFactor::new(
            t,
            "high_severity_incidents",
            json!(m.high_severity_incidents),
            Impact::Negative,
        ));
    } else if m.incidents > 2 {
        score = RagScore::Amber;
        factors.push(RagFactor::new(t, "safety_incidents", json!(m.incidents), Impact::Negative));
    }

    if m.safety_certs == 0 {
        score.at_least_amber();
        factors.push(RagFactor::new(t, "safety_certification", json!("missing"), Impact::Negative));
    }

    Evaluation { score, factors }
}

/// Worst of the given scores; green when empty.
pub fn overall<I>(scores: I) -> RagScore
where
    I: IntoIterator<Item = RagScore>,
{
    scores.into_iter().max().unwrap_or(RagScore::Green)
}

/// Which sub-scores a calculation request covers.
///
/// `"all"` (or an empty list) selects every component. Unknown names are
/// returned as the error value.
pub fn select_components(requested: &[String]) -> Result<Vec<ScoreType>, String> {
    if requested.is_empty() || requested.iter().any(|r| r.eq_ignore_ascii_case("all")) {
        return Ok(ScoreType::COMPONENTS.to_vec());
    }

    let mut selected = Vec::new();
    for name in requested {
        match ScoreType::parse(name) {
            Some(ScoreType::Overall) => {}
            Some(t) if !selected.contains(&t) => selected.push(t),
            Some(_) => {}
            None => return Err(name.clone()),
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_financials() -> FinancialMetrics {
        FinancialMetrics {
            insurance_coverage: Some(Decimal::from(2_000_000)),
            bonding_capacity: Some(Decimal::from(750_000)),
            overdue_projects: 0,
            years_in_business: Some(10),
        }
    }

    #[test]
    fn financial_green_when_all_thresholds_met() {
        let eval = score_financial(&healthy_financials());
        assert_eq!(eval.score, RagScore::Green);
        assert!(eval.factors.is_empty());
    }

    #[test]
    fn missing_insurance_is_red() {
        let mut m = healthy_financials();
        m.insurance_coverage = None;
        let eval = score_financial(&m);
        assert_eq!(eval.score, RagScore::Red);
        assert_eq!(eval.factors[0].name, "insurance_coverage");
    }

    #[test]
    fn low_bonding_does_not_downgrade_red() {
        let mut m = healthy_financials();
        m.insurance_coverage = Some(Decimal::from(10));
        m.bonding_capacity = Some(Decimal::from(10));
        let eval = score_financial(&m);
        assert_eq!(eval.score, RagScore::Red);
        assert_eq!(eval.factors.len(), 2);
    }

    #[test]
    fn young_business_is_amber() {
        let mut m = healthy_financials();
        m.years_in_business = Some(1);
        assert_eq!(score_financial(&m).score, RagScore::Amber);
    }

    #[test]
    fn compliance_requires_all_four_documents() {
        let m = ComplianceMetrics {
            total_documents: 3,
            approved_documents: 3,
            required_approved: 3,
            ..Default::default()
        };
        let eval = score_compliance(&m);
        assert_eq!(eval.score, RagScore::Red);
        assert_eq!(eval.factors[0].value, json!(1));
    }

    #[test]
    fn compliance_rejected_is_amber() {
        let m = ComplianceMetrics {
            total_documents: 5,
            approved_documents: 4,
            rejected_documents: 1,
            required_approved: 4,
            ..Default::default()
        };
        assert_eq!(score_compliance(&m).score, RagScore::Amber);
    }

    #[test]
    fn performance_without_history_is_neutral_amber() {
        let eval = score_performance(&PerformanceMetrics::default());
        assert_eq!(eval.score, RagScore::Amber);
        assert_eq!(eval.factors[0].impact, Impact::Neutral);
    }

    #[test]
    fn performance_completion_bands() {
        let mut m = PerformanceMetrics {
            total_projects: 10,
            completed_projects: 6,
            ..Default::default()
        };
        assert_eq!(score_performance(&m).score, RagScore::Red);

        m.completed_projects = 8;
        let eval = score_performance(&m);
        assert_eq!(eval.score, RagScore::Amber);
        assert_eq!(eval.factors[0].impact, Impact::Moderate);

        m.completed_projects = 9;
        assert_eq!(score_performance(&m).score, RagScore::Green);
    }

    #[test]
    fn delayed_schedule_is_amber() {
        let m = PerformanceMetrics {
            total_projects: 4,
            completed_projects: 4,
            avg_schedule_performance: Some(1.5),
            ..Default::default()
        };
        let eval = score_performance(&m);
        assert_eq!(eval.score, RagScore::Amber);
        assert_eq!(eval.factors[0].value, json!("delayed"));
    }

    #[test]
    fn safety_rules() {
        let m = SafetyMetrics {
            safety_certs: 1,
            incidents: 1,
            high_severity_incidents: 1,
        };
        assert_eq!(score_safety(&m).score, RagScore::Red);

        let m = SafetyMetrics {
            safety_certs: 1,
            incidents: 3,
            high_severity_incidents: 0,
        };
        assert_eq!(score_safety(&m).score, RagScore::Amber);

        let m = SafetyMetrics {
            safety_certs: 0,
            ..Default::default()
        };
        assert_eq!(score_safety(&m).score, RagScore::Amber);
    }

    #[test]
    fn overall_is_worst() {
        assert_eq!(overall([RagScore::Green, RagScore::Amber]), RagScore::Amber);
        assert_eq!(overall([RagScore::Red, RagScore::Green]), RagScore::Red);
        assert_eq!(overall([]), RagScore::Green);
    }

    #[test]
    fn select_components_handles_all_and_unknown() {
        assert_eq!(select_components(&[]).unwrap().len(), 4);
        assert_eq!(select_components(&["all".into()]).unwrap().len(), 4);
        assert_eq!(
            select_components(&["safety".into(), "safety".into()]).unwrap(),
            vec![ScoreType::Safety]
        );
        assert_eq!(select_components(&["bogus".into()]).unwrap_err(), "bogus");
    }

    #[test]
    fn factor_serializes_with_type_key() {
        let f = RagFactor::new(ScoreType::Safety, "x", json!(1), Impact::Negative);
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["type"], "safety");
        assert_eq!(v["impact"], "negative");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn any_score() -> impl Strategy<Value = RagScore> {
            prop_oneof![
                Just(RagScore::Green),
                Just(RagScore::Amber),
                Just(RagScore::Red),
            ]
        }

        proptest! {
            #[test]
            fn overall_is_worst_component(scores in prop::collection::vec(any_score(), 1..8)) {
                let worst = overall(scores.iter().copied());
                prop_assert!(scores.contains(&worst));
                prop_assert!(scores.iter().all(|s| *s <= worst));
            }

            #[test]
            fn one_red_forces_red(mut scores in prop::collection::vec(any_score(), 0..8), at in 0usize..8) {
                let at = at.min(scores.len());
                scores.insert(at, RagScore::Red);
                prop_assert_eq!(overall(scores), RagScore::Red);
            }

            #[test]
            fn overdue_projects_never_improve_financials(overdue in 0i64..20) {
                let base = score_financial(&healthy_financials()).score;
                let worse = score_financial(&FinancialMetrics {
                    overdue_projects: overdue,
                    ..healthy_financials()
                })
                .score;
                prop_assert!(worse >= base);
            }
        }
    }
}
