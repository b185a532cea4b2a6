//! Shared types used across modules
//!
//! The feature schema lives here so the trainer and the inference path
//! read the same ordered column list.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::MetadataConfig;

/// Ordered feature names. Training columns and inference vectors follow this order.
pub const FEATURES: &[&str] = &["mes", "vendedor_id"];

/// Anything that can supply named feature values.
pub trait FeatureSource {
    /// Value of the named feature, or `None` if this source does not carry it
    fn feature(&self, name: &str) -> Option<f64>;
}

/// Build a feature vector in the order given by `schema`.
///
/// Returns the name of the first feature the source cannot supply.
pub fn feature_vector<S, N>(source: &S, schema: &[N]) -> Result<Vec<f64>, String>
where
    S: FeatureSource + ?Sized,
    N: AsRef<str>,
{
    schema
        .iter()
        .map(|name| {
            let name = name.as_ref();
            source.feature(name).ok_or_else(|| name.to_string())
        })
        .collect()
}

/// A cleaned sales goal row
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    pub vendor_id: i64,
    pub month: i64,
    /// Realized value (the regression target)
    pub target_value: f64,
    /// Planned goal value; `None` when the stored value is not numeric.
    /// Not a model feature.
    pub planned_value: Option<f64>,
}

impl FeatureSource for TrainingRecord {
    fn feature(&self, name: &str) -> Option<f64> {
        match name {
            "mes" => Some(self.month as f64),
            "vendedor_id" => Some(self.vendor_id as f64),
            _ => None,
        }
    }
}

/// Inputs of a single prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionInput {
    pub vendor_id: i64,
    pub month: i64,
}

impl FeatureSource for PredictionInput {
    fn feature(&self, name: &str) -> Option<f64> {
        match name {
            "mes" => Some(self.month as f64),
            "vendedor_id" => Some(self.vendor_id as f64),
            _ => None,
        }
    }
}

/// Metadata describing one training run.
///
/// Field names on the wire are the ones the dashboard reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(rename = "nome_modelo")]
    pub model_name: String,
    #[serde(rename = "algoritmo")]
    pub algorithm: String,
    #[serde(rename = "data_treinamento", with = "timestamp_format")]
    pub trained_at: NaiveDateTime,
    #[serde(rename = "origem_dados")]
    pub data_source: String,
    #[serde(rename = "quantidade_registros")]
    pub record_count: usize,
    #[serde(rename = "versao")]
    pub version: String,
}

impl ModelMetadata {
    /// Build the metadata of a run that used `record_count` rows
    pub fn new(config: &MetadataConfig, record_count: usize, trained_at: NaiveDateTime) -> Self {
        Self {
            model_name: config.model_name.clone(),
            algorithm: config.algorithm.clone(),
            trained_at,
            data_source: config.data_source.clone(),
            record_count,
            version: config.version.clone(),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` timestamps, second precision
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
