use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gen3d::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, so `gen3d job` keeps stdout for the result)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gen3d=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, worker } => {
            gen3d::cli::serve(host, port, worker).await?;
        }
        Commands::Job {
            input,
            pretty,
            worker,
        } => {
            gen3d::cli::job(input, pretty, worker).await?;
        }
    }

    Ok(())
}
