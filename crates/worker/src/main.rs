//! Scheduled workflow sweep worker.
//!
//! Connects to the database, constructs the workflow engine, and drives the
//! periodic SCHEDULED-trigger sweep until SIGINT.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docuflow_engine::WorkflowEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docuflow_worker=info,docuflow_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = docuflow_db::connect(&database_url).await?;
    docuflow_db::health_check(&pool).await?;

    let engine = Arc::new(WorkflowEngine::new(pool));
    let cancel = CancellationToken::new();
    let sweep = tokio::spawn(docuflow_engine::sweep::run(engine, cancel.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    let _ = sweep.await;

    Ok(())
}
