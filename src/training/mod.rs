//! Batch training job
//!
//! Extract goal rows, clean them, fit the model, then persist the model,
//! the current metadata and the appended history. The history is read and
//! validated before anything is written, so a corrupt history leaves every
//! artifact untouched.

pub mod clean;
pub mod extract;

pub use clean::{clean, CleanError, CleanedData};
pub use extract::{extract_rows, RawGoalRow};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{info, warn};

use crate::artifacts;
use crate::config::Config;
use crate::model::SalesModel;
use crate::types::ModelMetadata;

/// What a training run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub metadata: ModelMetadata,
    pub model: SalesModel,
    /// Rows read from the database
    pub extracted: usize,
    /// Rows removed by cleaning
    pub dropped: usize,
    /// History length after this run
    pub history_len: usize,
}

/// Runs the train-and-persist pipeline against one configuration
pub struct Trainer {
    config: Config,
}

impl Trainer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run with the current local time as the training timestamp
    pub fn run(&self) -> Result<TrainingSummary> {
        let now = Local::now().naive_local();
        // Metadata is second precision
        let now = now.with_nanosecond(0).unwrap_or(now);
        self.run_at(now)
    }

    /// Run with an explicit training timestamp
    pub fn run_at(&self, trained_at: NaiveDateTime) -> Result<TrainingSummary> {
        let paths = &self.config.paths;

        let rows = extract_rows(&paths.database)?;
        let cleaned = clean(&rows).context("Failed to clean goal rows")?;
        if cleaned.dropped() > 0 {
            info!(
                "Discarded {} rows ({} with missing fields, {} with non-positive realized value)",
                cleaned.dropped(),
                cleaned.dropped_missing,
                cleaned.dropped_non_positive
            );
        }

        let mut history = artifacts::load_history(&paths.history)
            .context("Training history is unreadable; refusing to overwrite it")?;

        let model = SalesModel::fit(&cleaned.records).context("Failed to fit sales model")?;

        model
            .save(&paths.model)
            .with_context(|| format!("Failed to save model to {}", paths.model.display()))?;

        let metadata = ModelMetadata::new(&self.config.metadata, cleaned.records.len(), trained_at);
        artifacts::write_json(&paths.info, &metadata)
            .with_context(|| format!("Failed to write {}", paths.info.display()))?;

        let entry = serde_json::to_value(&metadata).context("Failed to encode metadata")?;
        history.push(entry);
        if let Err(e) = artifacts::write_json(&paths.history, &history) {
            warn!("Model and metadata were written but history was not");
            return Err(e).with_context(|| format!("Failed to write {}", paths.history.display()));
        }

        info!(
            "Trained model on {} records; history now has {} entries",
            metadata.record_count,
            history.len()
        );

        Ok(TrainingSummary {
            metadata,
            model,
            extracted: rows.len(),
            dropped: cleaned.dropped(),
            history_len: history.len(),
        })
    }
}
