//! Normalizes one fund's raw payloads into a [`FundRecord`].
//!
//! Everything here is a pure function of its inputs apart from the warnings
//! it logs; all network access happens in the provider client.

use crate::config::{AppConfig, currency_symbol};
use crate::error::ProviderError;
use crate::provider::RatingInfo;
use crate::provider::model::{
    BreakdownEntry, Fundsheet, Holdings, PerfEntry, Publication, ScenarioRow, truthy,
};
use crate::record::{
    BreakdownCategory, DocumentLink, FeeSet, FundIdentity, FundRecord, PerformanceSet,
    PortfolioBreakdown, ScenarioSet, format_number, round2,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Every fee key the provider is known to send. A key outside this list
/// carrying a real value fails the whole record: silently ignoring a newly
/// introduced fee would skew the comparison.
pub const KNOWN_FEE_KEYS: &[&str] = &[
    "at_launch_ongoing_charges",
    "estimated_ongoing_charges",
    "maximum_conversion_rate",
    "maximum_management_fees",
    "maximum_redemption_fixed_fees_acquired",
    "maximum_redemption_fixed_fees",
    "maximum_subscription_fixed_fees_acquired",
    "maximum_subscription_fixed_fees",
    "perf_benchmark_spread",
    "real_ongoing_charges",
    "redemption_fixed_fees_acquired",
    "total_redemption_fees",
    "total_subscription_fees",
];

/// Provider breakdown headers mapped to canonical categories.
const BREAKDOWN_HEADERS: &[(&str, BreakdownCategory)] = &[
    ("FUNDSHEET_HOLDINGS_TITLE_BY_COUNTRY", BreakdownCategory::Countries),
    ("FUNDSHEET_HOLDINGS_TITLE_BY_COUNTRY_BENCH", BreakdownCategory::Countries),
    ("FUNDSHEET_HOLDINGS_TITLE_BY_CURRENCY", BreakdownCategory::Currencies),
    ("FUNDSHEET_HOLDINGS_MAIN_HOLDINGS", BreakdownCategory::Holdings),
    ("FUNDSHEET_HOLDINGS_TITLE_BY_SECTOR_BENCH", BreakdownCategory::Sectors),
    ("FUNDSHEET_HOLDINGS_TITLE_BY_SECTOR", BreakdownCategory::Sectors),
    ("FUNDSHEET_HOLDINGS_MAQS_TYPE", BreakdownCategory::Sectors),
];

/// Headers we know about and deliberately do not render.
const BREAKDOWN_EXCLUDE: &[&str] = &["FUNDSHEET_HOLDINGS_TITLE_BY_RATINGS"];

const PERF_5Y_TAG: &str = "INDEXTYPE_5Y";
const KID_DOC_TYPE: &str = "DOC_KID_PRIIPS";
const POLICY_WRAP_WIDTH: usize = 40;

/// The fund's share-class id, needed before the holdings endpoint can be
/// queried.
pub fn fundshare_id(fundsheet: &Fundsheet) -> Result<u64, ProviderError> {
    fundsheet
        .fundshare_id
        .as_f64()
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .ok_or_else(|| ProviderError::schema("fundsheet", "fundshare_id"))
}

/// Builds the normalized record for one fund from its four raw payloads.
pub fn extract_record(
    isin: &str,
    fundsheet: &Fundsheet,
    holdings: &Holdings,
    scenarios: &[ScenarioRow],
    rating: &RatingInfo,
    config: &AppConfig,
    is_favorite: bool,
) -> Result<FundRecord, ProviderError> {
    let id = fundshare_id(fundsheet)?;
    let selection = &fundsheet.fundshare_selection;

    let share_type = selection
        .share_types
        .get(&id.to_string())
        .cloned()
        .ok_or_else(|| {
            ProviderError::schema("fundsheet", format!("fundshare_selection.share_types.{id}"))
        })?;

    // The ISIN the provider echoes back must be the one we asked for.
    let echoed_isin = selection
        .share_types_isin_codes
        .get(&id.to_string())
        .ok_or_else(|| {
            ProviderError::schema(
                "fundsheet",
                format!("fundshare_selection.share_types_isin_codes.{id}"),
            )
        })?;
    if echoed_isin != isin {
        return Err(ProviderError::validation(format!(
            "ISIN mismatch (expected {isin}, got {echoed_isin})"
        )));
    }

    // The base currency picks the NAV sub-record; fall back to EUR when the
    // provider publishes no share size under the base currency.
    let mut nav_key = fundsheet.portfolio.base_currency_code.as_str();
    let has_share_size = fundsheet
        .nav
        .nav_info
        .get(nav_key)
        .is_some_and(|info| info.share_size.is_some());
    if !has_share_size {
        nav_key = "EUR";
    }
    let symbol = currency_symbol(nav_key).ok_or_else(|| {
        ProviderError::validation(format!("unknown currency code `{nav_key}` for fund {isin}"))
    })?;

    let share_size_value = fundsheet
        .nav
        .nav_info
        .get(nav_key)
        .and_then(|info| info.share_size.as_ref())
        .and_then(|v| v.as_f64())
        .ok_or_else(|| {
            ProviderError::schema("fundsheet", format!("nav.nav_info.{nav_key}.share_size"))
        })?;
    let share_size = format!("{}{}", share_size_value.trunc() as i64, symbol);

    let latest_nav = fundsheet
        .nav
        .two_latest_nav
        .get(nav_key)
        .and_then(|points| points.first())
        .and_then(|point| point.nav.as_f64())
        .ok_or_else(|| {
            ProviderError::schema("fundsheet", format!("nav.two_latest_nav.{nav_key}[0].nav"))
        })?;
    let share_nav = format!("{}{}", format_number(latest_nav), symbol);

    // A Euro-based fund must not carry the non-Euro fluctuation disclaimer.
    if fundsheet.portfolio.base_currency == "Euro" {
        let disclaimer = fundsheet
            .performances
            .disclaimers
            .currency_fluctuation_not_euro
            .get("EUR");
        if disclaimer.is_some_and(|entry| !entry.is_null()) {
            return Err(ProviderError::validation(format!(
                "base currency mismatch with currency disclaimer for fund {isin}"
            )));
        }
    }

    let identity = FundIdentity {
        isin: isin.to_string(),
        fundshare_id: id,
        legal_name: fundsheet.legal_name.clone(),
        legal_form: fundsheet.portfolio.legal_form.clone(),
        creation_date: fundsheet.portfolio.creation_date.clone(),
        currency: fundsheet.portfolio.base_currency.clone(),
        currency_code: fundsheet.portfolio.base_currency_code.clone(),
        base_index: fundsheet
            .overview
            .bench
            .name
            .split(" + ")
            .map(str::to_string)
            .collect(),
    };

    let performance = extract_performance(isin, fundsheet);
    let kid_link = kid_document(isin, &fundsheet.publications, config.language.as_str());

    let source_link = DocumentLink {
        url: format!(
            "{}/fr-fr/{}/fundsheet/{}?tab=overview",
            config.website_base,
            config.investor.website_prefix(),
            fundsheet.fundsheet_uri
        ),
        title: Some("FR".to_string()),
    };

    let detail_link = DocumentLink {
        url: rating.url.clone(),
        title: Some("FR".to_string()),
    };

    let fees_timed = &fundsheet.fees.fees_timed;
    audit_fees(isin, fees_timed)?;
    let fees = FeeSet {
        conversion_rate: fee_value(fees_timed, "maximum_conversion_rate")?,
        ongoing_charges: reconcile_fee_pair(
            isin,
            fees_timed,
            "estimated_ongoing_charges",
            "at_launch_ongoing_charges",
        )?,
        maximum_subscription: fee_value(fees_timed, "total_subscription_fees")?,
        maximum_redemption: fee_value(fees_timed, "total_redemption_fees")?,
        real_ongoing: fee_value(fees_timed, "real_ongoing_charges")?,
        redemption_acquired: reconcile_fee_pair(
            isin,
            fees_timed,
            "redemption_fixed_fees_acquired",
            "maximum_redemption_fixed_fees_acquired",
        )?,
        maximum_management: fee_value(fees_timed, "maximum_management_fees")?,
    };

    Ok(FundRecord {
        favorite: is_favorite,
        asset_class: fundsheet.classification.asset_class.clone(),
        asset_region: fundsheet.classification.region_reporting.clone(),
        share_type,
        share_size,
        share_nav,
        sri_risk: int_or_zero(fundsheet.risk.sri_risk.value.as_ref()),
        morning_star: int_or_zero(selection.morning_star.as_ref()),
        star_rating: rating.rating,
        pea_eligible: truthy(&selection.flags.pea_flag),
        policy: textwrap::wrap(
            &fundsheet.overview.disclaimers.investment_policy,
            POLICY_WRAP_WIDTH,
        )
        .into_iter()
        .map(|line| line.into_owned())
        .collect(),
        source_link,
        kid_link,
        detail_link,
        performance,
        scenarios: extract_scenarios(isin, scenarios)?,
        breakdown: classify_breakdowns(id, holdings)?,
        fees,
        identity,
    })
}

fn int_or_zero(value: Option<&crate::provider::model::NumOrStr>) -> i64 {
    value.and_then(|v| v.as_f64()).unwrap_or(0.0) as i64
}

fn find_5y_perf(entries: &[PerfEntry], currency: &str) -> Option<f64> {
    entries
        .iter()
        .find(|e| e.kind == PERF_5Y_TAG && e.currency == currency)
        .and_then(|e| e.value.as_f64())
        .map(round2)
}

fn extract_performance(isin: &str, fundsheet: &Fundsheet) -> PerformanceSet {
    let currency = &fundsheet.portfolio.base_currency_code;
    let cumulated = fundsheet.performances.perfs.as_ref().map(|p| &p.cumulated);

    let fund_perf = match cumulated.and_then(|c| c.shares.as_deref()) {
        Some(shares) => {
            let found = find_5y_perf(shares, currency);
            if found.is_none() {
                warn!("{PERF_5Y_TAG} shares with currency {currency} not found for {isin}");
            }
            found
        }
        None => None,
    };

    // The benchmark difference only makes sense when both sides were found.
    let diff = fund_perf.and_then(|fund| {
        let benches = cumulated.and_then(|c| c.benches.as_deref())?;
        let bench = find_5y_perf(benches, currency);
        if bench.is_none() {
            warn!("{PERF_5Y_TAG} benches with currency {currency} not found for {isin}");
        }
        bench.map(|b| round2(fund - b))
    });

    let stats = fundsheet
        .performances
        .risk_analysis
        .as_ref()
        .and_then(|r| r.stats.as_ref());
    let volatility = stats
        .and_then(|s| s.volatility.as_ref())
        .and_then(|v| v.as_f64())
        .map(round2);
    if volatility.is_none() {
        warn!("Missing volatility for {isin}");
    }
    let sharpe_ratio = stats
        .and_then(|s| s.sharpe_ratio.as_ref())
        .and_then(|v| v.as_f64())
        .map(round2);
    if sharpe_ratio.is_none() {
        warn!("Missing sharpe_ratio for {isin}");
    }

    PerformanceSet {
        cumulated_5y: fund_perf.into(),
        cumulated_5y_diff: diff.into(),
        volatility: volatility.into(),
        sharpe_ratio: sharpe_ratio.into(),
    }
}

fn publication_url(publications: &HashMap<String, Publication>, language: &str) -> Option<String> {
    publications
        .get(language)?
        .documents
        .iter()
        .find(|d| d.doc_type.as_deref() == Some(KID_DOC_TYPE))
        .map(|d| d.url.clone())
}

/// Key-information-document lookup with language fallback: the requested
/// language first, then the provider's default. No document is not an error.
fn kid_document(
    isin: &str,
    publications: &HashMap<String, Publication>,
    language: &str,
) -> Option<DocumentLink> {
    let mut doc_language = language;
    let mut url = publication_url(publications, doc_language);
    if url.is_none() {
        doc_language = "FRE";
        url = publication_url(publications, doc_language);
    }
    if url.is_none() {
        warn!("No key information document published for {isin}");
    }
    url.map(|url| DocumentLink {
        url,
        title: Some(doc_language.to_string()),
    })
}

fn extract_scenarios(isin: &str, rows: &[ScenarioRow]) -> Result<ScenarioSet, ProviderError> {
    let latest = rows
        .last()
        .ok_or_else(|| ProviderError::validation(format!("no scenarios found for fund {isin}")))?;
    Ok(ScenarioSet {
        stressed: round2(latest.stressed * 100.0),
        unfavorable: round2(latest.unfavorable * 100.0),
        moderate: round2(latest.moderate * 100.0),
        favorable: round2(latest.favorable * 100.0),
    })
}

/// Maps every breakdown block to its canonical category.
///
/// A category may be populated at most once: a second header landing on an
/// already-filled category means the provider data is ambiguous and the
/// record cannot be trusted. Unknown headers outside the exclude list are
/// dropped with a warning.
pub fn classify_breakdowns(
    fundshare_id: u64,
    holdings: &Holdings,
) -> Result<PortfolioBreakdown, ProviderError> {
    let mut breakdown = PortfolioBreakdown::default();

    let blocks = match holdings.breakdowns.as_deref() {
        Some(blocks) if !blocks.is_empty() => blocks,
        _ => {
            warn!("Missing breakdowns for {fundshare_id}");
            return Ok(breakdown);
        }
    };

    for block in blocks {
        let header = block.labels.header.as_str();
        let category = BREAKDOWN_HEADERS
            .iter()
            .find(|(h, _)| *h == header)
            .map(|(_, c)| *c);

        match category {
            Some(category) => {
                if breakdown.is_populated(category) {
                    return Err(ProviderError::validation(format!(
                        "breakdown category {} populated twice (header `{header}`) for fundshare {fundshare_id}",
                        category.name()
                    )));
                }
                *breakdown.slot_mut(category) = format_breakdown_entries(&block.level_1_breakdowns);
            }
            None if BREAKDOWN_EXCLUDE.contains(&header) => {}
            None => {
                warn!("Unknown portfolio breakdown header {header} for {fundshare_id}");
            }
        }
    }

    Ok(breakdown)
}

/// Sorts by provider rank, then by descending weight, and renders each entry
/// as "Label (12.34%)".
fn format_breakdown_entries(entries: &[BreakdownEntry]) -> Vec<String> {
    let mut entries: Vec<&BreakdownEntry> = entries.iter().collect();
    entries.sort_by(|a, b| {
        a.rank.cmp(&b.rank).then(
            b.weight()
                .partial_cmp(&a.weight())
                .unwrap_or(Ordering::Equal),
        )
    });
    entries
        .iter()
        .map(|e| format!("{} ({}%)", e.label, format_number(e.weight() * 100.0)))
        .collect()
}

/// Rejects any fee key outside the allow-list that carries a real value.
pub fn audit_fees(isin: &str, fees: &BTreeMap<String, Value>) -> Result<(), ProviderError> {
    for (key, entry) in fees {
        if KNOWN_FEE_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Some(object) = entry.as_object() else {
            continue;
        };
        let Some(value) = object.get("value") else {
            continue;
        };
        if !truthy(value) {
            continue;
        }
        return Err(ProviderError::validation(format!(
            "fund {isin} carries unknown fee `{key}` with value {value}"
        )));
    }
    Ok(())
}

/// Sums a mutually exclusive fee pair.
///
/// The provider publishes exactly one of the two depending on the share
/// class age; both being non-zero means we would double count.
pub fn reconcile_fee_pair(
    isin: &str,
    fees: &BTreeMap<String, Value>,
    primary: &str,
    secondary: &str,
) -> Result<f64, ProviderError> {
    let a = fee_value(fees, primary)?;
    let b = fee_value(fees, secondary)?;
    if a != 0.0 && b != 0.0 {
        return Err(ProviderError::validation(format!(
            "`{primary}` and `{secondary}` are both non-zero for fund {isin}"
        )));
    }
    Ok(round2(a + b))
}

fn fee_value(fees: &BTreeMap<String, Value>, key: &str) -> Result<f64, ProviderError> {
    let entry = fees
        .get(key)
        .ok_or_else(|| ProviderError::schema("fundsheet", format!("fees.fees_timed.{key}")))?;
    let value = entry.get("value").ok_or_else(|| {
        ProviderError::schema("fundsheet", format!("fees.fees_timed.{key}.value"))
    })?;

    let parsed = match value {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().map_err(|_| {
            ProviderError::validation(format!("fee `{key}` has non-numeric value `{s}`"))
        })?,
        other => {
            return Err(ProviderError::validation(format!(
                "fee `{key}` has unexpected value {other}"
            )));
        }
    };
    Ok(round2(parsed))
}
