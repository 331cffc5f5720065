use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modmail_db::schema::derive_ranks;
use modmail_db::schema::descriptor::all_descriptors;
use modmail_db::{ConnectionConfig, DatabaseManager};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "modmail-db")]
#[command(about = "Schema tooling for the modmail backing store")]
struct Cli {
    /// Connection URL; falls back to MODMAIL_DATABASE_URL, then DATABASE_URL.
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create missing tables and migrate existing ones.
    Migrate {
        /// Print the startup report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the startup ranks without connecting.
    Plan,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Migrate { json } => migrate(cli.url.as_deref(), json).await,
        Command::Plan => plan(),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modmail_db=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(url: Option<&str>) -> Result<ConnectionConfig> {
    let config = match url {
        Some(url) => ConnectionConfig::from_url(url),
        None => ConnectionConfig::from_env(),
    };
    config.context("failed to load connection configuration")
}

async fn migrate(url: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(url)?;
    info!(url = %config.to_url(), "connecting");

    let (_db, report) = DatabaseManager::connect(&config)
        .await
        .context("schema startup failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (index, rank) in report.ranks.iter().enumerate() {
        for kind in rank {
            let outcome = report
                .outcome(*kind)
                .map(|o| format!("{o:?}").to_lowercase())
                .unwrap_or_else(|| "skipped".to_string());
            println!("rank {index}  {:<18} {outcome}", kind.to_string());
        }
    }
    Ok(())
}

fn plan() -> Result<()> {
    let ranks = derive_ranks(&all_descriptors())?;

    for (index, rank) in ranks.iter().enumerate() {
        let names: Vec<_> = rank.iter().map(|kind| kind.to_string()).collect();
        println!("rank {index}: {}", names.join(", "));
    }
    Ok(())
}
