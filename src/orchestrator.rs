//! Fans the per-fund fetch pipeline out over the universe.
//!
//! Funds are fetched concurrently but the output preserves the input order,
//! so the workbook rows follow the requested ISIN list. One failing fund
//! aborts the whole batch: a partially filled comparison sheet is worse
//! than none.

use crate::config::AppConfig;
use crate::error::ProviderError;
use crate::extract;
use crate::provider::FundDataSource;
use crate::record::FundRecord;
use futures::StreamExt;
use futures::stream::{self, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::thread;
use tracing::debug;

async fn fetch_fund(
    source: &dyn FundDataSource,
    config: &AppConfig,
    isin: &str,
    is_favorite: bool,
) -> Result<FundRecord, ProviderError> {
    debug!(%isin, "fetching fund");
    let fundsheet = source.fundsheet(isin).await?;
    let fundshare_id = extract::fundshare_id(&fundsheet)?;
    let holdings = source.holdings(fundshare_id).await?;
    let scenarios = source.scenarios(isin).await?;
    let rating = source.rating(isin).await?;
    extract::extract_record(
        isin,
        &fundsheet,
        &holdings,
        &scenarios,
        &rating,
        config,
        is_favorite,
    )
}

/// Fetches and normalizes every fund in `isins`, in order.
pub async fn gather(
    source: &dyn FundDataSource,
    config: &AppConfig,
    isins: &[String],
    favorites: &HashSet<String>,
) -> Result<Vec<FundRecord>, ProviderError> {
    let parallelism = thread::available_parallelism().map_or(4, usize::from);

    let progress = ProgressBar::new(isins.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        progress.set_style(style.progress_chars("#>-"));
    }

    let records: Vec<FundRecord> = stream::iter(isins.iter().map(|isin| {
        let progress = &progress;
        async move {
            let record = fetch_fund(source, config, isin, favorites.contains(isin)).await?;
            progress.inc(1);
            Ok::<_, ProviderError>(record)
        }
    }))
    .buffered(parallelism)
    .try_collect()
    .await?;

    progress.finish_and_clear();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InvestorType, Language};
    use crate::provider::RatingInfo;
    use crate::provider::model::{Fundsheet, Holdings, ScenarioRow};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn test_config() -> AppConfig {
        AppConfig {
            country: "FRA".to_string(),
            language: Language::Fre,
            investor: InvestorType::Private,
            isin: None,
            favorites: PathBuf::from("favorites.csv"),
            output: PathBuf::from("out.xlsx"),
            api_base: "https://api.example.com".to_string(),
            website_base: "https://www.example.com".to_string(),
            rating_base: "https://rates.example.com".to_string(),
        }
    }

    fn fundsheet_for(isin: &str, id: u64) -> Fundsheet {
        serde_json::from_value(json!({
            "classification": {"asset_class": "Equity", "region_reporting": "Europe"},
            "fundshare_id": id.to_string(),
            "legal_name": format!("Fund {isin}"),
            "portfolio": {
                "legal_form": "SICAV",
                "creation_date": "2001-05-02",
                "base_currency": "US Dollar",
                "base_currency_code": "USD"
            },
            "fundshare_selection": {
                "share_types": {id.to_string(): "Classic"},
                "share_types_isin_codes": {id.to_string(): isin},
                "morning_star": "3",
                "flags": {"pea_flag": 0}
            },
            "nav": {
                "nav_info": {"USD": {"share_size": 1000.0}},
                "two_latest_nav": {"USD": [{"nav": "100.0"}]}
            },
            "overview": {
                "bench": {"name": "MSCI World"},
                "disclaimers": {"investment_policy": "Invests"}
            },
            "performances": {
                "perfs": null,
                "disclaimers": {"currency_fluctuation_not_euro": {}},
                "risk_analysis": null
            },
            "risk": {"sri_risk": {"value": "4"}},
            "fees": {"fees_timed": {
                "maximum_conversion_rate": {"value": "0"},
                "estimated_ongoing_charges": {"value": "1.0"},
                "at_launch_ongoing_charges": {"value": null},
                "total_subscription_fees": {"value": "0"},
                "total_redemption_fees": {"value": "0"},
                "real_ongoing_charges": {"value": "0"},
                "redemption_fixed_fees_acquired": {"value": "0"},
                "maximum_redemption_fixed_fees_acquired": {"value": "0"},
                "maximum_management_fees": {"value": "0"}
            }},
            "publications": {},
            "fundsheet_uri": "fund"
        }))
        .unwrap()
    }

    fn scenario_row() -> ScenarioRow {
        serde_json::from_value(json!({
            "num02120_portfolio_return_stress_scenario_rhp_or_first_call_dat": -0.4,
            "num02030_portfolio_return_unfavourable_scenario_rhp_or_first_ca": -0.1,
            "num02060_portfolio_return_moderate_scenario_rhp_or_first_call_d": 0.03,
            "num02090_portfolio_return_favourable_scenario_rhp_or_first_call": 0.2
        }))
        .unwrap()
    }

    struct MockSource {
        isins: Vec<String>,
        fail_on: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockSource {
        fn new(isins: &[&str]) -> Self {
            MockSource {
                isins: isins.iter().map(|s| s.to_string()).collect(),
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FundDataSource for MockSource {
        async fn fundsheet(&self, isin: &str) -> Result<Fundsheet, ProviderError> {
            self.calls.lock().unwrap().push(isin.to_string());
            if self.fail_on.as_deref() == Some(isin) {
                return Err(ProviderError::schema("fundsheet", "boom"));
            }
            let id = self.isins.iter().position(|i| i == isin).unwrap() as u64 + 1;
            Ok(fundsheet_for(isin, id))
        }
        async fn holdings(&self, _fundshare_id: u64) -> Result<Holdings, ProviderError> {
            Ok(serde_json::from_value(json!({"breakdowns": []})).unwrap())
        }
        async fn scenarios(&self, _isin: &str) -> Result<Vec<ScenarioRow>, ProviderError> {
            Ok(vec![scenario_row()])
        }
        async fn rating(&self, _isin: &str) -> Result<RatingInfo, ProviderError> {
            Ok(RatingInfo {
                url: "https://rates.example.com/Fonds/1".to_string(),
                rating: 3.0,
            })
        }
        async fn search_isins(&self) -> Result<Vec<String>, ProviderError> {
            Ok(self.isins.clone())
        }
    }

    #[tokio::test]
    async fn test_gather_preserves_input_order() {
        let isins = vec![
            "FR0000120271".to_string(),
            "US0378331005".to_string(),
            "LU0823414635".to_string(),
        ];
        let source = MockSource::new(&["FR0000120271", "US0378331005", "LU0823414635"]);
        let favorites: HashSet<String> = ["US0378331005".to_string()].into();

        let records = gather(&source, &test_config(), &isins, &favorites)
            .await
            .unwrap();

        let got: Vec<&str> = records.iter().map(|r| r.identity.isin.as_str()).collect();
        assert_eq!(got, vec!["FR0000120271", "US0378331005", "LU0823414635"]);
        assert!(!records[0].favorite);
        assert!(records[1].favorite);
    }

    #[tokio::test]
    async fn test_one_failing_fund_aborts_the_batch() {
        let isins = vec!["FR0000120271".to_string(), "US0378331005".to_string()];
        let mut source = MockSource::new(&["FR0000120271", "US0378331005"]);
        source.fail_on = Some("US0378331005".to_string());

        let err = gather(&source, &test_config(), &isins, &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Schema { .. }));
    }
}
