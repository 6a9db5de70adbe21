use anyhow::Result;
use clap::Parser;
use fundgrid::config::{
    AppConfig, DEFAULT_API_BASE, DEFAULT_RATING_BASE, DEFAULT_WEBSITE_BASE, InvestorType, Language,
};
use fundgrid::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Country code used for fund availability, e.g. FRA
    #[arg(short, long, default_value = "FRA")]
    country: String,

    /// Language of the provider data
    #[arg(short, long, value_enum, default_value = "fre")]
    language: Language,

    /// Comma separated ISIN list, or a path to a file with one ISIN per line.
    /// Compares every fund the provider lists when omitted.
    #[arg(short, long)]
    isin: Option<String>,

    /// CSV file of favorite funds (requires an `isin` column)
    #[arg(short, long, default_value = "favorites.csv")]
    favorites: PathBuf,

    /// Investor type the provider tailors its catalog to
    #[arg(short = 't', long = "type", value_enum, default_value = "private")]
    investor: InvestorType,

    /// Output workbook path
    #[arg(short, long, default_value = "arbitrage.xlsx")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = AppConfig {
        country: cli.country,
        language: cli.language,
        investor: cli.investor,
        isin: cli.isin,
        favorites: cli.favorites,
        output: cli.output,
        api_base: DEFAULT_API_BASE.to_string(),
        website_base: DEFAULT_WEBSITE_BASE.to_string(),
        rating_base: DEFAULT_RATING_BASE.to_string(),
    };

    let result = match config.validate() {
        Ok(()) => fundgrid::run(&config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
