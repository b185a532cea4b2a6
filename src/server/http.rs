//! HTTP handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::artifacts::{self, ArtifactError};
use crate::server::error::ApiError;
use crate::server::AppContext;
use crate::types::PredictionInput;

/// Query of `/prever`
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub vendedor_id: i64,
    pub mes: i64,
}

/// Prediction response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub vendedor_id: i64,
    pub mes: i64,
    pub previsao_valor: f64,
}

/// Optional inclusive date bounds for `/historico-treinamentos`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub inicio: Option<NaiveDate>,
    pub fim: Option<NaiveDate>,
}

/// Status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Current model metadata, returned as stored
pub async fn model_info_handler(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let path = &ctx.config.paths.info;
    let document = artifacts::read_document(path).await.map_err(|e| match e {
        ArtifactError::NotFound(_) => ApiError::NotFound(format!("{} not found", file_label(path))),
        other => ApiError::Internal(format!("Failed to read {}: {}", file_label(path), other)),
    })?;
    Ok(Json(document))
}

/// Training history, oldest first, optionally filtered by training date
pub async fn history_handler(
    State(ctx): State<AppContext>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(bounds) = query?;
    if let (Some(from), Some(to)) = (bounds.inicio, bounds.fim) {
        if from > to {
            return Err(ApiError::BadRequest(format!(
                "inicio ({}) is after fim ({})",
                from, to
            )));
        }
    }

    let path = &ctx.config.paths.history;
    let entries = artifacts::read_array_document(path).await.map_err(|e| match e {
        ArtifactError::NotFound(_) => ApiError::NotFound("No training history found".to_string()),
        other => ApiError::Internal(format!("Failed to read {}: {}", file_label(path), other)),
    })?;

    if bounds.inicio.is_none() && bounds.fim.is_none() {
        return Ok(Json(Value::Array(entries)));
    }

    let total = entries.len();
    let filtered: Vec<Value> = entries
        .into_iter()
        .filter(|entry| trained_within(entry, bounds.inicio, bounds.fim))
        .collect();
    debug!("History filter kept {} of {} entries", filtered.len(), total);
    Ok(Json(Value::Array(filtered)))
}

/// Whether an entry's training date falls in the inclusive range.
/// Entries without a readable date never match an active filter.
fn trained_within(entry: &Value, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    let date = entry
        .get("data_treinamento")
        .and_then(Value::as_str)
        .and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

    match date {
        Some(date) => from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t),
        None => false,
    }
}

/// Predict the realized value for a vendor and month.
/// Without a loaded model every request is a 500, whatever the query holds.
pub async fn predict_handler(
    State(ctx): State<AppContext>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let model = ctx.model.as_ref().ok_or_else(|| {
        ApiError::Internal("Model not loaded. Run `oraculo train` first.".to_string())
    })?;

    let Query(params) = query?;
    ctx.config
        .prediction
        .validate(params.vendedor_id, params.mes)
        .map_err(ApiError::BadRequest)?;

    let input = PredictionInput {
        vendor_id: params.vendedor_id,
        month: params.mes,
    };
    let value = model
        .predict(&input)
        .map_err(|e| ApiError::Internal(format!("Failed to generate prediction: {}", e)))?;
    if !value.is_finite() {
        return Err(ApiError::Internal(format!(
            "Failed to generate prediction: model produced {}",
            value
        )));
    }

    Ok(Json(PredictionResponse {
        vendedor_id: params.vendedor_id,
        mes: params.mes,
        previsao_valor: value,
    }))
}

/// Liveness and model state
pub async fn status_handler(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        model_loaded: ctx.model_loaded(),
    })
}
