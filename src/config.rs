use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.bnpparibas-am.com";
pub const DEFAULT_WEBSITE_BASE: &str = "https://www.bnpparibas-am.com";
pub const DEFAULT_RATING_BASE: &str = "https://www.quantalys.com";

/// Country codes accepted by the provider's fundsheet endpoint.
pub const COUNTRIES: &[&str] = &[
    "AUT", "HRV", "FIN", "HUN", "LIE", "PRT", "SWE", "BHR", "CYP", "FRA", "IRL", "LUX", "SVK",
    "CHE", "BEL", "CZE", "DEU", "ITA", "NOR", "SVN", "NLD", "CHL", "DNK", "GRC", "JER", "POL",
    "SPA", "GBR", "AUS", "MAC", "TWN", "HKG", "MYR", "IDN", "SGP", "JPN", "KOR", "BRA", "PER",
    "USA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InvestorType {
    Private,
    Institutional,
}

impl InvestorType {
    /// Path segment the provider API uses for this investor type.
    pub fn api_prefix(self) -> &'static str {
        match self {
            InvestorType::Private => "IP_FR-IND",
            InvestorType::Institutional => "PV_FR-FSE",
        }
    }

    /// Path segment the provider website uses for this investor type.
    pub fn website_prefix(self) -> &'static str {
        match self {
            InvestorType::Private => "individuel",
            InvestorType::Institutional => "intermediaires",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Language {
    Fre,
    Eng,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Fre => "FRE",
            Language::Eng => "ENG",
        }
    }
}

/// Immutable run configuration, built once from the CLI arguments and passed
/// by reference to every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub country: String,
    pub language: Language,
    pub investor: InvestorType,
    /// Raw `--isin` argument: a comma separated list or a fund list file path.
    pub isin: Option<String>,
    pub favorites: PathBuf,
    pub output: PathBuf,
    pub api_base: String,
    pub website_base: String,
    pub rating_base: String,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if !COUNTRIES.contains(&self.country.as_str()) {
            bail!("unsupported country code: {}", self.country);
        }

        if self.output.extension().and_then(|e| e.to_str()) != Some("xlsx") {
            bail!("output file {} must have xlsx extension", self.output.display());
        }

        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
                warn!("Directory {} created", parent.display());
            }
        }

        Ok(())
    }
}

/// The display symbol appended to monetary amounts, by ISO currency code.
pub fn currency_symbol(code: &str) -> Option<&'static str> {
    Some(match code {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        "JPY" => "¥",
        "CAD" => "$",
        "AUD" => "$",
        "CHF" => "Fr",
        "CNY" => "¥",
        "SEK" => "kr",
        "NZD" => "$",
        _ => return None,
    })
}
