// HTTP API server binary for the country catalog

use anyhow::Result;
use country_catalog::api::ApiServer;
use country_catalog::cli;
use country_catalog::tracing::{init_tracing, DEFAULT_FILTER};
use country_catalog::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;

    tracing::info!("Initializing country catalog API server");
    env_util::preflight_check(
        "api_server",
        &[],
        &["DATABASE_URL", "API_HOST", "API_PORT", "ALLOWED_ORIGINS", "AUTO_MIGRATE"],
    )?;

    let server = ApiServer::from_env()?;
    let store = cli::connect_store(None).await?;
    tracing::info!("Database connected successfully");

    server.run(store).await?;
    Ok(())
}
