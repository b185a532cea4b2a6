//! CLI interface for oraculo

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::artifacts;
use crate::config::Config;
use crate::model::SalesModel;
use crate::training::{Trainer, TrainingSummary};
use crate::types::PredictionInput;

#[derive(Parser)]
#[command(name = "oraculo")]
#[command(about = "Sales forecasting: train a regression over sales goals and serve predictions", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (default: ./oraculo.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrain the model and append to the training history
    Train {
        /// SQLite database holding the `metas` table
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Start the prediction API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
    /// Predict with the persisted model without starting the server
    Predict {
        /// Vendor identifier
        #[arg(long)]
        vendedor_id: i64,
        /// Month number
        #[arg(long)]
        mes: i64,
    },
    /// Show the training history
    History,
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Train { database } => {
            if let Some(database) = database {
                config.paths.database = database;
            }
            let trainer = Trainer::new(config);
            let summary = tokio::task::spawn_blocking(move || trainer.run())
                .await
                .context("Training task panicked")??;
            print_summary(&summary);
        }
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            crate::server::start(config).await?;
        }
        Commands::Predict { vendedor_id, mes } => {
            predict_once(&config, vendedor_id, mes)?;
        }
        Commands::History => {
            show_history(&config)?;
        }
    }

    Ok(())
}

fn print_summary(summary: &TrainingSummary) {
    println!("✅ Model updated with {} records.", summary.metadata.record_count);
    if summary.dropped > 0 {
        println!(
            "   {} of {} rows discarded during cleaning",
            summary.dropped, summary.extracted
        );
    }
    println!("   intercept: {:.4}", summary.model.intercept());
    for (name, coefficient) in summary.model.named_coefficients() {
        println!("   {:<12} {:.4}", name, coefficient);
    }
    println!("📁 History now holds {} training runs", summary.history_len);
}

fn predict_once(config: &Config, vendedor_id: i64, mes: i64) -> Result<()> {
    config
        .prediction
        .validate(vendedor_id, mes)
        .map_err(anyhow::Error::msg)?;

    let model = SalesModel::load(&config.paths.model)?.with_context(|| {
        format!(
            "No model at {}. Run `oraculo train` first.",
            config.paths.model.display()
        )
    })?;
    let value = model.predict(&PredictionInput { vendor_id: vendedor_id, month: mes })?;

    println!("vendedor_id={} mes={} previsao_valor={:.2}", vendedor_id, mes, value);
    Ok(())
}

fn show_history(config: &Config) -> Result<()> {
    let history = artifacts::load_history(&config.paths.history)?;
    if history.is_empty() {
        println!("No training runs recorded yet.");
        return Ok(());
    }

    println!("{:<20} │ {:<8} │ {:>9} │ {}", "Trained at", "Version", "Records", "Algorithm");
    println!("{}", "─".repeat(60));
    for entry in &history {
        println!(
            "{:<20} │ {:<8} │ {:>9} │ {}",
            field(entry, "data_treinamento"),
            field(entry, "versao"),
            field(entry, "quantidade_registros"),
            field(entry, "algoritmo")
        );
    }
    println!("\n{} training runs", history.len());
    Ok(())
}

/// Render one history field; entries written by older runs may lack it
fn field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_history_field_rendering() {
        let entry = json!({ "versao": "1.0.1", "quantidade_registros": 42, "algoritmo": null });
        assert_eq!(field(&entry, "versao"), "1.0.1");
        assert_eq!(field(&entry, "quantidade_registros"), "42");
        assert_eq!(field(&entry, "algoritmo"), "-");
        assert_eq!(field(&entry, "data_treinamento"), "-");
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_predict() {
        let cli = Cli::try_parse_from(["oraculo", "predict", "--vendedor-id", "3", "--mes", "7"]).unwrap();
        match cli.command {
            Commands::Predict { vendedor_id, mes } => {
                assert_eq!(vendedor_id, 3);
                assert_eq!(mes, 7);
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["oraculo", "serve", "--config", "alt.toml", "-p", "9000"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000), host: None }));
    }
}
