use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, Transaction};
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedBusiness;
use crate::services::PaymentError;
use crate::validation::{validate_amount, validate_memo, validate_stellar_address};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(alias = "toAddress")]
    pub destination: String,
    pub amount: String,
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub transaction: Transaction,
    pub balance: Amount,
}

pub async fn send_payment(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
    Json(payload): Json<SendRequest>,
) -> Result<impl IntoResponse, AppError> {
    let destination = validate_stellar_address(&payload.destination)
        .map_err(|_| PaymentError::InvalidAddress(payload.destination.clone()))?;
    let amount = validate_amount(&payload.amount)?;
    let memo = validate_memo(payload.memo.as_deref())?;

    let outcome = state
        .transfers
        .initiate_send(business_id, &destination, amount, memo)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendResponse {
            transaction: outcome.transaction,
            balance: outcome.sender_balance,
        }),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
) -> Result<impl IntoResponse, AppError> {
    let transactions = state
        .store
        .transactions_for_business(business_id)
        .await
        .map_err(PaymentError::from)?;
    Ok(Json(transactions))
}
