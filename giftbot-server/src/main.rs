use std::path::PathBuf;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod config;
mod context;
mod server;

use config::{Config, LoggingConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "giftbot")]
#[command(author, version, about = "Giftbot - scheduled gift code redemption service")]
struct Args {
    /// Path to the YAML config file. Missing file means defaults plus environment.
    #[arg(long, short = 'c', default_value = "config.yaml")]
    config: PathBuf,
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", logging.level)));

    if logging.format == "json" {
        let sub = fmt().json().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(sub)?;
    } else {
        let sub = fmt().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(sub)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    init_tracing(&config.logging)?;

    info!(
        "Giftbot starting. config={}, listen={}:{}, db={}",
        args.config.display(),
        config.server.host,
        config.server.port,
        config.database.path
    );

    if let Err(e) = server::run_server(config).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
