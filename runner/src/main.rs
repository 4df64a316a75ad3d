use clap::Parser;
use runner::Options;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| options.log_level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let report = runner::run(&options).await?;
    info!(
        "{} results, {} errors, {} of the query groups completed",
        report.results, report.errors, report.groups_completed
    );
    Ok(())
}
