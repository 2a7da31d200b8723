//! etl-worker — one-shot mirror run for a set of project keys.
//!
//! Wires env config → Postgres pool → upstream client → engine, runs one
//! `update_projects` pass and exits non-zero on the first error.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use trackmirror_core::{config, Config};
use trackmirror_etl::Etl;
use trackmirror_jira::JiraClient;

/// Mirror issue-tracker projects into Postgres.
#[derive(Parser, Debug)]
#[command(name = "etl-worker", version, about)]
struct Cli {
    /// Project keys to mirror (e.g. KAFKA HADOOP).
    #[arg(required = true)]
    projects: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    config::load_dotenv();
    let cli = Cli::parse();
    let cfg = Config::from_env();

    let pool = trackmirror_storage::pool::connect(&cfg.postgres).await?;
    let client = Arc::new(JiraClient::new(&cfg.jira)?);
    let etl = Etl::new(client, pool, &cfg.jira);

    info!(projects = cli.projects.len(), "starting update");
    etl.update_projects(&cli.projects).await?;
    info!("update complete");

    Ok(())
}
