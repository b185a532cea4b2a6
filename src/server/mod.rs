//! Prediction API server
//!
//! The model is loaded once at startup into an [`AppContext`] that every
//! handler receives as axum state. Metadata and history are read from disk
//! on each request.

pub mod error;
pub mod http;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::model::SalesModel;

pub use error::ApiError;

/// Shared, read-only state of the API process
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub model: Option<Arc<SalesModel>>,
}

impl AppContext {
    pub fn new(config: Config, model: Option<SalesModel>) -> Self {
        Self {
            config: Arc::new(config),
            model: model.map(Arc::new),
        }
    }

    /// Build the context, loading the model artifact if one exists.
    ///
    /// A missing artifact is not an error: the server starts and `/prever`
    /// answers 500 until a model is trained and the server restarted. An
    /// artifact that exists but cannot be decoded aborts startup.
    pub fn load(config: Config) -> Result<Self> {
        let path = config.paths.model.clone();
        let model = SalesModel::load(&path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;
        match &model {
            Some(_) => info!("Loaded model from {}", path.display()),
            None => warn!("No model at {}; predictions are disabled", path.display()),
        }
        Ok(Self::new(config, model))
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }
}

/// Build the application router
pub fn router(ctx: AppContext) -> Router {
    // The dashboard is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/modelo-info", get(http::model_info_handler))
        .route("/historico-treinamentos", get(http::history_handler))
        .route("/prever", get(http::predict_handler))
        .route("/status", get(http::status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the API server and serve until the process is stopped
pub async fn start(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::load(config)?;
    let model_loaded = ctx.model_loaded();
    let app = router(ctx);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     Oraculo Forecast Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Server binding to: {}", addr);
    if model_loaded {
        println!("✓ Model loaded");
    } else {
        println!("⚠ No model loaded");
        println!("  Tip: run `oraculo train` and restart the server");
    }
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts;
    use crate::config::PathsConfig;
    use crate::types::ModelMetadata;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::path::Path;
    use tower::ServiceExt;

    fn config_in(dir: &Path) -> Config {
        Config {
            paths: PathsConfig::with_artifact_dir(dir),
            ..Config::default()
        }
    }

    fn metadata(day: u32, count: usize) -> ModelMetadata {
        let at = NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        ModelMetadata::new(&Default::default(), count, at)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_model_info_missing_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppContext::new(config_in(dir.path()), None));

        let (status, body) = get(app, "/modelo-info").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "modelo_info.json not found");
    }

    #[tokio::test]
    async fn test_model_info_returns_document_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        // Extra fields survive because the document is not reinterpreted
        let document = json!({ "nome_modelo": "Oráculo", "versao": "1.0.1", "extra": [1, 2] });
        artifacts::write_json(&config.paths.info, &document).unwrap();
        let app = router(AppContext::new(config, None));

        let (status, first) = get(app.clone(), "/modelo-info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, document);

        let (_, second) = get(app, "/modelo-info").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_model_info_corrupt_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.paths.info, "{ broken").unwrap();
        let app = router(AppContext::new(config, None));

        let (status, body) = get(app, "/modelo-info").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("modelo_info.json"));
    }

    #[tokio::test]
    async fn test_history_missing_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppContext::new(config_in(dir.path()), None));

        let (status, body) = get(app, "/historico-treinamentos").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No training history found");
    }

    #[tokio::test]
    async fn test_history_not_an_array_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        artifacts::write_json(&config.paths.history, &metadata(1, 3)).unwrap();
        let app = router(AppContext::new(config, None));

        let (status, _) = get(app, "/historico-treinamentos").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_history_filter_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let history = vec![metadata(1, 3), metadata(10, 5), metadata(20, 8)];
        artifacts::write_json(&config.paths.history, &history).unwrap();
        let app = router(AppContext::new(config, None));

        let (status, all) = get(app.clone(), "/historico-treinamentos").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (status, some) =
            get(app.clone(), "/historico-treinamentos?inicio=2025-06-05&fim=2025-06-20").await;
        assert_eq!(status, StatusCode::OK);
        let counts: Vec<u64> = some
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["quantidade_registros"].as_u64().unwrap())
            .collect();
        assert_eq!(counts, vec![5, 8]);

        let (status, _) = get(app.clone(), "/historico-treinamentos?inicio=junho").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            get(app, "/historico-treinamentos?inicio=2025-06-20&fim=2025-06-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_without_model_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppContext::new(config_in(dir.path()), None));

        for uri in [
            "/prever?vendedor_id=1&mes=1",
            "/prever?vendedor_id=7&mes=12",
            "/prever?vendedor_id=1&mes=13",
            "/prever?vendedor_id=0&mes=5",
            "/prever?vendedor_id=abc&mes=1",
            "/prever",
        ] {
            let (status, body) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body["detail"].as_str().unwrap().contains("not loaded"));
        }
    }

    #[tokio::test]
    async fn test_predict_with_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = SalesModel::from_parts(60.0, vec![50.0, -10.0]).unwrap();
        let app = router(AppContext::new(config_in(dir.path()), Some(model)));

        let (status, body) = get(app, "/prever?vendedor_id=2&mes=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "vendedor_id": 2, "mes": 3, "previsao_valor": 190.0 }));
    }

    #[tokio::test]
    async fn test_predict_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let model = SalesModel::from_parts(1.0, vec![1.0, 1.0]).unwrap();
        let app = router(AppContext::new(config_in(dir.path()), Some(model)));

        for uri in [
            "/prever?vendedor_id=abc&mes=1",
            "/prever?vendedor_id=1",
            "/prever?vendedor_id=1&mes=13",
            "/prever?vendedor_id=0&mes=4",
        ] {
            let (status, body) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert!(body["detail"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_status_reports_model_state() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppContext::new(config_in(dir.path()), None));
        let (status, body) = get(app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], false);
    }

    #[test]
    fn test_load_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::load(config_in(dir.path())).unwrap();
        assert!(!ctx.model_loaded());
    }

    #[test]
    fn test_load_corrupt_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.paths.model, b"garbage").unwrap();
        assert!(AppContext::load(config).is_err());
    }
}
