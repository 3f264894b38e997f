//! Request handlers for the inference API

use super::error::Result;
use super::state::AppState;
use crate::error::ForecastError;
use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, info_span};

pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Vec<f64>>> {
    let request_id = AppState::generate_id();
    let span = info_span!("predict", request_id = %request_id);
    let engine = Arc::clone(&state.engine);

    let predictions = tokio::task::spawn_blocking(move || {
        span.in_scope(|| {
            let predictions = engine.predict_bytes(&body)?;
            info!(rows = predictions.len(), "Prediction served");
            Ok::<_, ForecastError>(predictions)
        })
    })
    .await??;

    Ok(Json(predictions))
}

/// Alias of `/predict` for hosted-endpoint compatibility
pub async fn invocations(state: State<Arc<AppState>>, body: Bytes) -> Result<Json<Vec<f64>>> {
    debug!("Invocation routed to predict");
    predict(state, body).await
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.engine.model_name(),
        "n_features": state.engine.contract().len(),
        "uptime_secs": state.uptime_secs(),
        "stats": state.engine.stats(),
    }))
}

/// Ordered feature columns the model expects
pub async fn get_contract(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "columns": state.engine.contract().columns(),
        "n_features": state.engine.contract().len(),
    }))
}
