use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::AuthenticatedBusiness;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .accounts
        .register(&payload.name, &payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.accounts.login(&payload.email, &payload.password).await?;
    Ok(Json(session))
}

pub async fn profile(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.accounts.profile(business_id).await?;
    Ok(Json(profile))
}
