use crate::error::AppError;
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};

pub async fn list_businesses(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let overview = state.accounts.admin_overview().await?;
    Ok(Json(overview))
}

pub async fn list_all_transactions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state.accounts.admin_transactions().await?;
    Ok(Json(transactions))
}
