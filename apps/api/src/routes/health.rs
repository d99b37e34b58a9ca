use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "queue_size": state.queue.depth()
    }))
}

/// GET /
/// Service metadata and current queue size.
pub async fn index_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "Outreach API",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "strategy": state.strategy.to_string(),
        "queue_size": state.queue.depth(),
        "endpoints": {
            "POST /process": "Queue one company's employee records for outreach",
            "GET /health": "Liveness and queue size"
        }
    }))
}
