use anyhow::{Context, Result};
use siteflow::cli::output::{style, CROSS};
use siteflow::cli::{commands, Cli};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    if let Err(e) = commands::run(&cli).await {
        error!("{:#}", e);
        println!("{} {}", CROSS, style("failed").red());
        std::process::exit(1);
    }

    Ok(())
}
