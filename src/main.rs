use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use channel_bot::{cli::Cli, dispatch::DispatchConfig, repl, seed::SeedData, store::Store};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let seed = match &cli.seed {
        Some(path) => SeedData::from_path(path)?,
        None => SeedData::embedded()?,
    };

    let store = Store::new();
    seed.apply(&store)?;

    let config = DispatchConfig {
        receive_timeout: Duration::from_millis(cli.receive_timeout_ms),
        dm_channel: cli.dm_channel,
    };
    repl::run(store, config).await
}
