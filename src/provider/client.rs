use super::model::{Fundsheet, Holdings, RatingResponse, ScenarioRow, SearchResponse};
use crate::config::AppConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

const RATING_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
const RATING_COOKIE: &str = "UQY4IPIWOASM4GQGUWJBCHPU4VEQPCGBKDRKFXCHSXJIWTIOYPQKCY2NFOO4RZ7LAU6NNSQQX5UVQJT767P677SOKY3SEW74PBUDHBEQEWH4E===;";

/// Third-party detail page and star rating for one fund.
#[derive(Debug, Clone)]
pub struct RatingInfo {
    pub url: String,
    pub rating: f64,
}

/// The provider's data endpoints, abstracted so tests can substitute a mock.
#[async_trait]
pub trait FundDataSource: Send + Sync {
    async fn fundsheet(&self, isin: &str) -> Result<Fundsheet, ProviderError>;
    async fn holdings(&self, fundshare_id: u64) -> Result<Holdings, ProviderError>;
    async fn scenarios(&self, isin: &str) -> Result<Vec<ScenarioRow>, ProviderError>;
    async fn rating(&self, isin: &str) -> Result<RatingInfo, ProviderError>;
    /// All ISINs known to the provider for the configured investor type and
    /// language, sorted lexicographically.
    async fn search_isins(&self) -> Result<Vec<String>, ProviderError>;
}

pub struct ProviderClient {
    http: reqwest::Client,
    api_base: String,
    rating_base: String,
    api_prefix: &'static str,
    language: &'static str,
    country: String,
}

impl ProviderClient {
    pub fn new(config: &AppConfig) -> Self {
        ProviderClient {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            rating_base: config.rating_base.clone(),
            api_prefix: config.investor.api_prefix(),
            language: config.language.as_str(),
            country: config.country.clone(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
    ) -> Result<T, ProviderError> {
        debug!(endpoint, %url, "requesting");
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;
        decode(endpoint, &body)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &'static str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| {
        error!(
            endpoint,
            error = ?e,
            response = %body,
            "failed to decode response"
        );
        ProviderError::Decode { endpoint, source: e }
    })
}

#[async_trait]
impl FundDataSource for ProviderClient {
    async fn fundsheet(&self, isin: &str) -> Result<Fundsheet, ProviderError> {
        let url = format!(
            "{}/push/fundsheet/{}/{}/{}/{}",
            self.api_base,
            self.api_prefix,
            self.language,
            self.country,
            isin.to_lowercase()
        );
        self.get_json("fundsheet", url).await
    }

    async fn holdings(&self, fundshare_id: u64) -> Result<Holdings, ProviderError> {
        let url = format!(
            "{}/push/holdings/{}/{}",
            self.api_base, self.language, fundshare_id
        );
        self.get_json("holdings", url).await
    }

    async fn scenarios(&self, isin: &str) -> Result<Vec<ScenarioRow>, ProviderError> {
        let url = format!(
            "{}/push-raw/all_perf_scenarios?isin={}",
            self.api_base,
            isin.to_lowercase()
        );
        self.get_json("scenarios", url).await
    }

    async fn rating(&self, isin: &str) -> Result<RatingInfo, ProviderError> {
        let form = [
            ("columns[0][name]", "ID_Produit"),
            ("columns[1][name]", "nStarRating"),
            ("order[0][column]", "0"),
            ("length", "1"),
            ("Values.sNomOrISIN", isin),
        ];
        let response = self
            .http
            .post(format!("{}/Recherche/Data", self.rating_base))
            .header(reqwest::header::USER_AGENT, RATING_USER_AGENT)
            .header(
                reqwest::header::COOKIE,
                format!("bot_mitigation_cookie={RATING_COOKIE}"),
            )
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        let parsed: RatingResponse = decode("rating", &body)?;

        let row = parsed
            .data
            .first()
            .ok_or_else(|| ProviderError::schema("rating", "data[0]"))?;
        let product_id = row
            .product_id
            .as_f64()
            .ok_or_else(|| ProviderError::schema("rating", "data[0].ID_Produit"))?
            as i64;
        info!(
            product_id,
            rating = row.star_rating,
            "resolved third-party rating"
        );

        Ok(RatingInfo {
            url: format!("{}/Fonds/{}", self.rating_base, product_id),
            rating: row.star_rating,
        })
    }

    async fn search_isins(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!(
            "{}/push/fundsearchv2/{}/{}?without_has_docs=True&action_column_tool=fundpanorama&with_first_navs=false",
            self.api_base, self.api_prefix, self.language
        );
        let parsed: SearchResponse = self.get_json("fundsearch", url).await?;
        let mut isins: Vec<String> = parsed.funds.into_iter().map(|f| f.codes.isin).collect();
        isins.sort();
        Ok(isins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_WEBSITE_BASE, InvestorType, Language};
    use std::path::PathBuf;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: &str, rating_base: &str) -> AppConfig {
        AppConfig {
            country: "FRA".to_string(),
            language: Language::Fre,
            investor: InvestorType::Private,
            isin: None,
            favorites: PathBuf::from("favorites.csv"),
            output: PathBuf::from("out.xlsx"),
            api_base: api_base.to_string(),
            website_base: DEFAULT_WEBSITE_BASE.to_string(),
            rating_base: rating_base.to_string(),
        }
    }

    #[tokio::test]
    async fn test_scenarios_request_lowercases_isin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push-raw/all_perf_scenarios"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{
                    "num02120_portfolio_return_stress_scenario_rhp_or_first_call_dat": 0.034,
                    "num02030_portfolio_return_unfavourable_scenario_rhp_or_first_ca": -0.1,
                    "num02060_portfolio_return_moderate_scenario_rhp_or_first_call_d": 0.02,
                    "num02090_portfolio_return_favourable_scenario_rhp_or_first_call": 0.15
                }]"#,
            ))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&test_config(&server.uri(), &server.uri()));
        let rows = client.scenarios("FR0000120271").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stressed, 0.034);

        let received = &server.received_requests().await.unwrap()[0];
        assert_eq!(received.url.query(), Some("isin=fr0000120271"));
    }

    #[tokio::test]
    async fn test_rating_posts_form_and_builds_detail_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Recherche/Data"))
            .and(body_string_contains("Values.sNomOrISIN=FR0000120271"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [{"ID_Produit": 98765, "nStarRating": 4}]}"#,
            ))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&test_config(&server.uri(), &server.uri()));
        let rating = client.rating("FR0000120271").await.unwrap();
        assert_eq!(rating.rating, 4.0);
        assert_eq!(rating.url, format!("{}/Fonds/98765", server.uri()));
    }

    #[tokio::test]
    async fn test_rating_with_empty_data_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Recherche/Data"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": []}"#))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&test_config(&server.uri(), &server.uri()));
        let err = client.rating("FR0000120271").await.unwrap_err();
        assert!(matches!(err, ProviderError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_non_json_response_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push/holdings/FRE/4217"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&test_config(&server.uri(), &server.uri()));
        let err = client.holdings(4217).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_http_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push/holdings/FRE/4217"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&test_config(&server.uri(), &server.uri()));
        let err = client.holdings(4217).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_search_isins_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push/fundsearchv2/IP_FR-IND/FRE"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"funds": [
                    {"codes": {"isin": "LU0823414635"}},
                    {"codes": {"isin": "FR0000120271"}}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let client = ProviderClient::new(&test_config(&server.uri(), &server.uri()));
        let isins = client.search_isins().await.unwrap();
        assert_eq!(isins, vec!["FR0000120271", "LU0823414635"]);
    }
}
