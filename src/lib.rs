//! Oraculo - sales forecasting library
//!
//! - `training`: extract goal rows from SQLite, clean them, fit and persist
//! - `model`: the linear model, its feature schema and artifact format
//! - `server`: HTTP API over the persisted artifacts
//!
//! # Example
//!
//! ```ignore
//! use oraculo::{Config, Trainer};
//!
//! let summary = Trainer::new(Config::load(None)?).run()?;
//! println!("trained on {} rows", summary.metadata.record_count);
//! ```

pub mod types;
pub mod config;
pub mod artifacts;
pub mod model;
pub mod training;
pub mod server;
pub mod cli;

pub use config::Config;
pub use model::{ModelError, SalesModel};
pub use server::{router, start as start_server, AppContext};
pub use training::{Trainer, TrainingSummary};
pub use types::{ModelMetadata, PredictionInput, TrainingRecord, FEATURES};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
