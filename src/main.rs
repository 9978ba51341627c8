use clap::Parser;
use printlink::cli::Cli;
use printlink::{init_logging, run_gateway, run_observer, BUILD_DATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    init_logging(&config.logging)?;
    tracing::info!("printlink {} (built {})", VERSION, BUILD_DATE);

    match &cli.connect {
        Some(url) => run_observer(url, config).await,
        None => run_gateway(config).await,
    }
}
