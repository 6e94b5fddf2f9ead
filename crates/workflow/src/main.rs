use std::process::ExitCode;

use anyhow::Context;
use bundle_cluster::ClusterConfig;
use bundle_workflow::config::Cli;
use bundle_workflow::run_workflow;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "bundle_workflow=info,bundle_cluster=info,bundle_storage=info,bundle_core=info";
const VERBOSE_FILTER: &str = "bundle_workflow=debug,bundle_cluster=debug,bundle_storage=debug,bundle_core=debug";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let fallback = if cli.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cluster = ClusterConfig::from_env().context("Failed to load cluster configuration")?;
    let config = cli.into_config(cluster).context("Invalid arguments")?;

    let finished = run_workflow(&config)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Integration test run failed"))?;

    println!("{}", finished.report.summary());
    if let Some(e) = finished.error {
        return Err(anyhow::Error::new(e).context("Integration test run aborted"));
    }
    if finished.report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
