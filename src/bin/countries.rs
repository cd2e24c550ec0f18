use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use country_catalog::api::ApiServer;
use country_catalog::cli::{self, import::ImportConfig};
use country_catalog::tracing::{init_tracing, DEFAULT_FILTER};
use country_catalog::util::env as env_util;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "countries", version, about = "Country catalog import and API")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Postgres connection string (defaults to DATABASE_URL / DB_* env)
    #[arg(long, global = true)]
    db_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every country from the source API and reconcile it into the catalog
    Import(ImportArgs),
    /// Delete every catalog row
    Reset,
    /// Start the REST API server
    Serve,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// Source endpoint returning a JSON array of country records
    #[arg(long, env = "COUNTRIES_API_URL")]
    api_url: Option<String>,
    /// HTTP timeout for the fetch
    #[arg(long, env = "FETCH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    /// Wipe existing data in the same transaction before importing
    #[arg(long, action = ArgAction::SetTrue)]
    reset: bool,
    /// Import into an in-memory store (no database needed)
    #[arg(long, action = ArgAction::SetTrue)]
    memory: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;
    let cli = Cli::parse();

    match cli.command {
        Command::Import(args) => {
            let summary = cli::import::run(ImportConfig {
                database_url: cli.db_url,
                api_url: args.api_url,
                timeout_secs: args.timeout_secs,
                reset: args.reset,
                memory: args.memory,
            })
            .await?;
            println!("{}", cli::summary_line(&summary));
        }
        Command::Reset => {
            let store = cli::connect_pg(cli.db_url).await?;
            let summary = cli::reset(&store).await?;
            info!(deleted = summary.total(), "reset complete");
            println!("Deleted {} rows", summary.total());
        }
        Command::Serve => {
            let server = ApiServer::from_env()?;
            let store = cli::connect_store(cli.db_url).await?;
            server.run(store).await?;
        }
    }
    Ok(())
}
