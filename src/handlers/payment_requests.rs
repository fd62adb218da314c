use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::{PaymentRequest, PaymentRequestId, Transaction};
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedBusiness;
use crate::validation::{validate_amount, validate_email, validate_memo};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(alias = "email")]
    pub to_email: String,
    pub amount: String,
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponse {
    pub payment_request: PaymentRequest,
    pub transaction: Transaction,
}

pub async fn create_invoice(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let to_email = validate_email(&payload.to_email)?;
    let amount = validate_amount(&payload.amount)?;
    let memo = validate_memo(payload.memo.as_deref())?;

    let request = state
        .invoices
        .create_invoice(business_id, &to_email, amount, memo)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_payment_requests(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
) -> Result<impl IntoResponse, AppError> {
    let requests = state.invoices.list_for_business(business_id).await?;
    Ok(Json(requests))
}

pub async fn pay_payment_request(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
    Path(request_id): Path<PaymentRequestId>,
) -> Result<impl IntoResponse, AppError> {
    let paid = state.invoices.pay_request(request_id, business_id).await?;
    Ok(Json(PayResponse {
        payment_request: paid.request,
        transaction: paid.settlement.transaction,
    }))
}

pub async fn cancel_payment_request(
    State(state): State<AppState>,
    AuthenticatedBusiness(business_id): AuthenticatedBusiness,
    Path(request_id): Path<PaymentRequestId>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.invoices.cancel_request(request_id, business_id).await?;
    Ok(Json(request))
}
