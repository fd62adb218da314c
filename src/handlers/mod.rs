pub mod admin;
pub mod auth;
pub mod payment_requests;
pub mod transactions;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub store: String,
    pub monitored_wallets: usize,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (store, healthy) = match &state.db {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => ("postgres", true),
            Err(e) => {
                tracing::warn!(error = %e, "Health check could not reach the database");
                ("postgres", false)
            }
        },
        None => ("memory", true),
    };

    let health_response = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
        monitored_wallets: state.monitor.monitored_count(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
