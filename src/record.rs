//! The normalized per-fund record and the cell values it exposes to the
//! renderer.

/// Outcome of an optional provider lookup.
///
/// Distinguishes a real value from data the provider did not publish, so
/// callers cannot mistake a placeholder for a measurement. The rendering
/// layer decides how an `Unavailable` is displayed per column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<T> {
    Value(T),
    Unavailable,
}

impl<T> Resolved<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Resolved<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Resolved::Value(v),
            None => Resolved::Unavailable,
        }
    }
}

/// A single cell as handed to the spreadsheet renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// Rendered newline-joined; drives the row height.
    Lines(Vec<String>),
    /// Rendered as a hyperlink showing the title (or the URL itself).
    Link { url: String, title: Option<String> },
}

#[derive(Debug, Clone)]
pub struct FundIdentity {
    pub isin: String,
    pub fundshare_id: u64,
    pub legal_name: String,
    pub legal_form: String,
    pub creation_date: String,
    /// Display name, e.g. "Euro".
    pub currency: String,
    /// ISO code, e.g. "EUR".
    pub currency_code: String,
    pub base_index: Vec<String>,
}

/// Seven normalized fee percentages. The two reconciled pairs are stored as
/// their sum; mutual exclusivity is enforced before construction.
#[derive(Debug, Clone, Default)]
pub struct FeeSet {
    pub conversion_rate: f64,
    pub ongoing_charges: f64,
    pub maximum_subscription: f64,
    pub maximum_redemption: f64,
    pub real_ongoing: f64,
    pub redemption_acquired: f64,
    pub maximum_management: f64,
}

#[derive(Debug, Clone)]
pub struct PerformanceSet {
    /// 5-year cumulated return of the share, in percent.
    pub cumulated_5y: Resolved<f64>,
    /// Difference against the benchmark over the same window.
    pub cumulated_5y_diff: Resolved<f64>,
    pub volatility: Resolved<f64>,
    pub sharpe_ratio: Resolved<f64>,
}

/// PRIIPS return scenarios at the 5-year horizon, in percent.
#[derive(Debug, Clone)]
pub struct ScenarioSet {
    pub stressed: f64,
    pub unfavorable: f64,
    pub moderate: f64,
    pub favorable: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakdownCategory {
    Countries,
    Currencies,
    Holdings,
    Sectors,
}

impl BreakdownCategory {
    pub fn name(self) -> &'static str {
        match self {
            BreakdownCategory::Countries => "countries",
            BreakdownCategory::Currencies => "currencies",
            BreakdownCategory::Holdings => "holdings",
            BreakdownCategory::Sectors => "sectors",
        }
    }
}

/// Canonical portfolio decomposition. Each category holds an ordered list of
/// "Label (12.34%)" strings and may be populated at most once per fund.
#[derive(Debug, Clone, Default)]
pub struct PortfolioBreakdown {
    pub countries: Vec<String>,
    pub currencies: Vec<String>,
    pub holdings: Vec<String>,
    pub sectors: Vec<String>,
}

impl PortfolioBreakdown {
    pub fn get(&self, category: BreakdownCategory) -> &[String] {
        match category {
            BreakdownCategory::Countries => &self.countries,
            BreakdownCategory::Currencies => &self.currencies,
            BreakdownCategory::Holdings => &self.holdings,
            BreakdownCategory::Sectors => &self.sectors,
        }
    }

    pub fn slot_mut(&mut self, category: BreakdownCategory) -> &mut Vec<String> {
        match category {
            BreakdownCategory::Countries => &mut self.countries,
            BreakdownCategory::Currencies => &mut self.currencies,
            BreakdownCategory::Holdings => &mut self.holdings,
            BreakdownCategory::Sectors => &mut self.sectors,
        }
    }

    pub fn is_populated(&self, category: BreakdownCategory) -> bool {
        !self.get(category).is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentLink {
    pub url: String,
    pub title: Option<String>,
}

/// The flat aggregate for one fund. Constructed once by the extractor,
/// immutable afterwards, consumed exactly once by the renderer.
#[derive(Debug, Clone)]
pub struct FundRecord {
    pub favorite: bool,
    pub identity: FundIdentity,
    pub asset_class: String,
    pub asset_region: String,
    pub share_type: String,
    /// Total share assets, formatted with the currency symbol.
    pub share_size: String,
    /// Latest net asset value, formatted with the currency symbol.
    pub share_nav: String,
    pub sri_risk: i64,
    pub morning_star: i64,
    /// Third-party star rating (0-5).
    pub star_rating: f64,
    pub pea_eligible: bool,
    /// Investment policy text, wrapped to 40 columns.
    pub policy: Vec<String>,
    pub source_link: DocumentLink,
    pub kid_link: Option<DocumentLink>,
    pub detail_link: DocumentLink,
    pub performance: PerformanceSet,
    pub scenarios: ScenarioSet,
    pub breakdown: PortfolioBreakdown,
    pub fees: FeeSet,
}

impl FundRecord {
    /// Looks up a cell by schema column reference.
    ///
    /// Unknown references resolve to an empty cell, never an error, so the
    /// column schema can evolve independently of the record.
    pub fn field(&self, key: &str) -> CellValue {
        match key {
            "favorite" => {
                if self.favorite {
                    CellValue::Text("⭐".to_string())
                } else {
                    CellValue::Empty
                }
            }
            "isin" => CellValue::Text(self.identity.isin.clone()),
            "asset_class" => CellValue::Text(self.asset_class.clone()),
            "asset_region_class" => CellValue::Text(self.asset_region.clone()),
            "fundshare_id" => CellValue::Number(self.identity.fundshare_id as f64),
            "legal_name" => CellValue::Text(self.identity.legal_name.clone()),
            "legal_form" => CellValue::Text(self.identity.legal_form.clone()),
            "creation_date" => CellValue::Text(self.identity.creation_date.clone()),
            "share_type" => CellValue::Text(self.share_type.clone()),
            "share_size" => CellValue::Text(self.share_size.clone()),
            "share_vl" => CellValue::Text(self.share_nav.clone()),
            "currency" => CellValue::Text(self.identity.currency.clone()),
            "base_index" => CellValue::Lines(self.identity.base_index.clone()),
            "sri_risk" => CellValue::Number(self.sri_risk as f64),
            "morning_star" => CellValue::Number(self.morning_star as f64),
            "q_notation" => CellValue::Number(self.star_rating),
            "pea" => CellValue::Text(if self.pea_eligible { "Yes" } else { "No" }.to_string()),
            "policy" => CellValue::Lines(self.policy.clone()),
            "source_details" => link_cell(&self.source_link),
            "perf_cumulated" => percent_cell(self.performance.cumulated_5y, "N/A"),
            "perf_cumulated_diff" => percent_cell(self.performance.cumulated_5y_diff, "N/A"),
            "volatility" => number_cell(self.performance.volatility, "Unknown"),
            "sharpe_ratio" => number_cell(self.performance.sharpe_ratio, "Unknown"),
            "dic_details" => match &self.kid_link {
                Some(link) => link_cell(link),
                None => CellValue::Empty,
            },
            "more_details" => link_cell(&self.detail_link),
            "scenario_stressed" => CellValue::Text(format_percent(self.scenarios.stressed)),
            "scenario_unfavorable" => CellValue::Text(format_percent(self.scenarios.unfavorable)),
            "scenario_moderate" => CellValue::Text(format_percent(self.scenarios.moderate)),
            "scenario_favorable" => CellValue::Text(format_percent(self.scenarios.favorable)),
            "portfolio_countries" => CellValue::Lines(self.breakdown.countries.clone()),
            "portfolio_currencies" => CellValue::Lines(self.breakdown.currencies.clone()),
            "portfolio_holdings" => CellValue::Lines(self.breakdown.holdings.clone()),
            "portfolio_sectors" => CellValue::Lines(self.breakdown.sectors.clone()),
            "fee_conversion_rate" => CellValue::Number(self.fees.conversion_rate),
            "fee_ongoing_charges" => CellValue::Number(self.fees.ongoing_charges),
            "fee_maximum_subscription" => CellValue::Number(self.fees.maximum_subscription),
            "fee_maximum_redemption" => CellValue::Number(self.fees.maximum_redemption),
            "fee_real_ongoing" => CellValue::Number(self.fees.real_ongoing),
            "fee_redemption_acquired" => CellValue::Number(self.fees.redemption_acquired),
            "fee_maximum_management" => CellValue::Number(self.fees.maximum_management),
            _ => CellValue::Empty,
        }
    }
}

fn link_cell(link: &DocumentLink) -> CellValue {
    CellValue::Link {
        url: link.url.clone(),
        title: link.title.clone(),
    }
}

fn percent_cell(value: Resolved<f64>, fallback: &str) -> CellValue {
    match value {
        Resolved::Value(v) => CellValue::Text(format_percent(v)),
        Resolved::Unavailable => CellValue::Text(fallback.to_string()),
    }
}

fn number_cell(value: Resolved<f64>, fallback: &str) -> CellValue {
    match value {
        Resolved::Value(v) => CellValue::Number(v),
        Resolved::Unavailable => CellValue::Text(fallback.to_string()),
    }
}

/// Rounds to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders a rounded value without trailing zeros: 3.4 -> "3.4", 12.0 -> "12".
pub fn format_number(value: f64) -> String {
    let rendered = format!("{:.2}", round2(value));
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Renders a percentage value the way the workbook displays it: "3.4 %".
pub fn format_percent(value: f64) -> String {
    format!("{} %", format_number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> FundRecord {
        FundRecord {
            favorite: true,
            identity: FundIdentity {
                isin: "FR0000120271".to_string(),
                fundshare_id: 4217,
                legal_name: "Fund A".to_string(),
                legal_form: "SICAV".to_string(),
                creation_date: "2001-05-02".to_string(),
                currency: "Euro".to_string(),
                currency_code: "EUR".to_string(),
                base_index: vec!["MSCI World".to_string(), "ESTER".to_string()],
            },
            asset_class: "Equity".to_string(),
            asset_region: "Europe".to_string(),
            share_type: "Classic".to_string(),
            share_size: "123456€".to_string(),
            share_nav: "101.5€".to_string(),
            sri_risk: 4,
            morning_star: 3,
            star_rating: 4.0,
            pea_eligible: true,
            policy: vec!["Invests in".to_string(), "stuff".to_string()],
            source_link: DocumentLink {
                url: "https://example.com/fund".to_string(),
                title: Some("FR".to_string()),
            },
            kid_link: None,
            detail_link: DocumentLink {
                url: "https://example.com/detail".to_string(),
                title: Some("FR".to_string()),
            },
            performance: PerformanceSet {
                cumulated_5y: Resolved::Value(12.34),
                cumulated_5y_diff: Resolved::Unavailable,
                volatility: Resolved::Value(8.1),
                sharpe_ratio: Resolved::Unavailable,
            },
            scenarios: ScenarioSet {
                stressed: -42.1,
                unfavorable: -10.0,
                moderate: 3.4,
                favorable: 18.75,
            },
            breakdown: PortfolioBreakdown::default(),
            fees: FeeSet::default(),
        }
    }

    #[test]
    fn test_format_number_trims_trailing_zeros() {
        assert_eq!(format_number(3.4000000000000004), "3.4");
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(-3.456), "-3.46");
        assert_eq!(format_number(-0.001), "0");
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(format_percent(3.4), "3.4 %");
        assert_eq!(format_percent(-10.0), "-10 %");
    }

    #[test]
    fn test_resolved_fields_fall_back_to_markers() {
        let record = sample_record();
        assert_eq!(
            record.field("perf_cumulated"),
            CellValue::Text("12.34 %".to_string())
        );
        assert_eq!(
            record.field("perf_cumulated_diff"),
            CellValue::Text("N/A".to_string())
        );
        assert_eq!(record.field("volatility"), CellValue::Number(8.1));
        assert_eq!(
            record.field("sharpe_ratio"),
            CellValue::Text("Unknown".to_string())
        );
    }

    #[test]
    fn test_fundshare_id_field_is_numeric() {
        let record = sample_record();
        assert_eq!(record.field("fundshare_id"), CellValue::Number(4217.0));
    }

    #[test]
    fn test_unknown_reference_yields_empty_cell() {
        let record = sample_record();
        assert_eq!(record.field("does_not_exist"), CellValue::Empty);
    }

    #[test]
    fn test_favorite_marker() {
        let mut record = sample_record();
        assert_eq!(record.field("favorite"), CellValue::Text("⭐".to_string()));
        record.favorite = false;
        assert_eq!(record.field("favorite"), CellValue::Empty);
    }

    #[test]
    fn test_missing_kid_document_renders_empty() {
        let record = sample_record();
        assert_eq!(record.field("dic_details"), CellValue::Empty);
    }
}
