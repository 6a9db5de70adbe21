//! Typed response schemas for the provider endpoints.
//!
//! The upstream API is loosely typed: numeric fields arrive as numbers or
//! strings depending on the fund, and whole sub-trees disappear for some
//! share classes. Required keys are plain fields (a missing one fails the
//! decode of the whole payload); keys the extractor tolerates are `Option`s.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A value the provider serializes either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumOrStr {
    Num(f64),
    Str(String),
}

impl NumOrStr {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumOrStr::Num(n) => Some(*n),
            NumOrStr::Str(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fundsheet {
    pub classification: Classification,
    pub fundshare_id: NumOrStr,
    pub legal_name: String,
    pub portfolio: PortfolioInfo,
    pub fundshare_selection: FundshareSelection,
    pub nav: Nav,
    pub overview: Overview,
    pub performances: Performances,
    pub risk: Risk,
    pub fees: Fees,
    #[serde(default)]
    pub publications: HashMap<String, Publication>,
    pub fundsheet_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    pub asset_class: String,
    pub region_reporting: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioInfo {
    pub legal_form: String,
    pub creation_date: String,
    /// Display name, e.g. "Euro".
    pub base_currency: String,
    /// ISO code, e.g. "EUR".
    pub base_currency_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundshareSelection {
    /// Share type labels keyed by fundshare id.
    pub share_types: HashMap<String, String>,
    /// ISIN codes keyed by fundshare id; must echo the requested ISIN.
    pub share_types_isin_codes: HashMap<String, String>,
    #[serde(default)]
    pub morning_star: Option<NumOrStr>,
    pub flags: ShareFlags,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareFlags {
    #[serde(default)]
    pub pea_flag: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nav {
    /// Keyed by ISO currency code.
    pub nav_info: HashMap<String, NavInfo>,
    /// Most recent NAV points, newest first, keyed by ISO currency code.
    pub two_latest_nav: HashMap<String, Vec<NavPoint>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavInfo {
    #[serde(default)]
    pub share_size: Option<NumOrStr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavPoint {
    pub nav: NumOrStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Overview {
    pub bench: Bench,
    pub disclaimers: OverviewDisclaimers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bench {
    /// Multiple indices are joined with " + ".
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverviewDisclaimers {
    pub investment_policy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Performances {
    #[serde(default)]
    pub perfs: Option<Perfs>,
    #[serde(default)]
    pub disclaimers: PerformanceDisclaimers,
    #[serde(default)]
    pub risk_analysis: Option<RiskAnalysis>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerformanceDisclaimers {
    #[serde(default)]
    pub currency_fluctuation_not_euro: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Perfs {
    pub cumulated: CumulatedPerfs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CumulatedPerfs {
    #[serde(default)]
    pub shares: Option<Vec<PerfEntry>>,
    #[serde(default)]
    pub benches: Option<Vec<PerfEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerfEntry {
    /// Statistical window tag, e.g. "INDEXTYPE_5Y".
    #[serde(rename = "type")]
    pub kind: String,
    pub currency: String,
    pub value: NumOrStr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskAnalysis {
    #[serde(default)]
    pub stats: Option<RiskStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskStats {
    #[serde(default)]
    pub volatility: Option<NumOrStr>,
    #[serde(default)]
    pub sharpe_ratio: Option<NumOrStr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Risk {
    pub sri_risk: SriRisk,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SriRisk {
    #[serde(default)]
    pub value: Option<NumOrStr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fees {
    /// Kept as a raw map so the allow-list audit sees every key the
    /// provider sends, including ones we do not model.
    pub fees_timed: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentEntry {
    pub url: String,
    #[serde(default)]
    pub doc_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Holdings {
    #[serde(default)]
    pub breakdowns: Option<Vec<BreakdownBlock>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownBlock {
    pub labels: BreakdownLabels,
    pub level_1_breakdowns: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownLabels {
    pub header: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub rank: i64,
    #[serde(default)]
    pub ptf_value: Option<f64>,
    #[serde(default)]
    pub bench_value: Option<f64>,
}

impl BreakdownEntry {
    /// Portfolio weight, preferring the portfolio value over the benchmark
    /// value when the former is present and non-zero.
    pub fn weight(&self) -> f64 {
        self.ptf_value
            .filter(|v| *v != 0.0)
            .or(self.bench_value)
            .unwrap_or(0.0)
    }
}

/// One row of the raw performance-scenario endpoint. The column names are
/// the provider's truncated regulatory identifiers, verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRow {
    #[serde(rename = "num02120_portfolio_return_stress_scenario_rhp_or_first_call_dat")]
    pub stressed: f64,
    #[serde(rename = "num02030_portfolio_return_unfavourable_scenario_rhp_or_first_ca")]
    pub unfavorable: f64,
    #[serde(rename = "num02060_portfolio_return_moderate_scenario_rhp_or_first_call_d")]
    pub moderate: f64,
    #[serde(rename = "num02090_portfolio_return_favourable_scenario_rhp_or_first_call")]
    pub favorable: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingResponse {
    pub data: Vec<RatingRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingRow {
    #[serde(rename = "ID_Produit")]
    pub product_id: NumOrStr,
    #[serde(rename = "nStarRating")]
    pub star_rating: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub funds: Vec<SearchFund>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchFund {
    pub codes: SearchCodes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchCodes {
    pub isin: String,
}

/// Truthiness the way the provider means it: absent, null, zero and empty
/// string all read as false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_num_or_str_coercion() {
        let n: NumOrStr = serde_json::from_value(json!(1.5)).unwrap();
        assert_eq!(n.as_f64(), Some(1.5));
        let s: NumOrStr = serde_json::from_value(json!("2.25")).unwrap();
        assert_eq!(s.as_f64(), Some(2.25));
        let bad: NumOrStr = serde_json::from_value(json!("n/a")).unwrap();
        assert_eq!(bad.as_f64(), None);
    }

    #[test]
    fn test_breakdown_weight_prefers_portfolio_value() {
        let entry = BreakdownEntry {
            label: "France".to_string(),
            rank: 1,
            ptf_value: Some(0.25),
            bench_value: Some(0.10),
        };
        assert_eq!(entry.weight(), 0.25);

        let zero_ptf = BreakdownEntry {
            ptf_value: Some(0.0),
            ..entry.clone()
        };
        assert_eq!(zero_ptf.weight(), 0.10);

        let no_values = BreakdownEntry {
            ptf_value: None,
            bench_value: None,
            ..entry
        };
        assert_eq!(no_values.weight(), 0.0);
    }

    #[test]
    fn test_scenario_row_decodes_provider_columns() {
        let row: ScenarioRow = serde_json::from_value(json!({
            "isin": "fr0000120271",
            "num02120_portfolio_return_stress_scenario_rhp_or_first_call_dat": 0.034,
            "num02030_portfolio_return_unfavourable_scenario_rhp_or_first_ca": -0.12,
            "num02060_portfolio_return_moderate_scenario_rhp_or_first_call_d": 0.05,
            "num02090_portfolio_return_favourable_scenario_rhp_or_first_call": 0.21,
            "some_other_regulatory_column": "ignored"
        }))
        .unwrap();
        assert_eq!(row.stressed, 0.034);
        assert_eq!(row.favorable, 0.21);
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!("0")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("4")));
        assert!(truthy(&json!(true)));
    }
}
