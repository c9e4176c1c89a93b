//! tempo-latency-guard binary: loads configuration, wires the app, and
//! runs it to completion.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tempo_latency_guard::{App, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tempo-latency-guard", version, about)]
struct Cli {
    /// Path to a YAML config file. Missing CLI flag means defaults+env only.
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    info!(
        timezone = %config.timezone,
        redis_host = %config.redis.host,
        tempo_url = %config.tempo.url,
        "tempo-latency-guard starting"
    );

    let app = App::new(config).await.context("building app")?;
    app.run().await.context("running app")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempo_latency_guard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];
    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
