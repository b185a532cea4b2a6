//! Oraculo - sales forecasting service
//!
//! Trains a regression over historical sales goals and serves predictions.

use oraculo::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (INFO level by default, RUST_LOG narrows or widens it)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    cli::run().await
}
