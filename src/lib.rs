pub mod config;
pub mod error;
pub mod extract;
pub mod log;
pub mod orchestrator;
pub mod provider;
pub mod record;
pub mod render;
pub mod schema;
pub mod universe;

use anyhow::{Context, Result};
use tracing::{debug, info};

pub async fn run(config: &config::AppConfig) -> Result<()> {
    info!("Fund comparison starting...");
    debug!("Run config: {config:#?}");

    let client = provider::ProviderClient::new(config);

    let (isins, favorites) = universe::resolve(config, &client).await?;
    info!(
        funds = isins.len(),
        favorites = favorites.len(),
        "universe resolved"
    );

    let records = orchestrator::gather(&client, config, &isins, &favorites)
        .await
        .context("Failed to gather fund data")?;

    let schema = schema::workbook_schema();
    render::write_workbook(&config.output, &schema, &records)?;

    info!(
        funds = records.len(),
        output = %config.output.display(),
        "workbook written"
    );
    Ok(())
}
