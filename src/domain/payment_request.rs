use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Amount, BusinessId, PaymentRequestId, TransactionId, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRequestStatus {
    Pending,
    Paid,
    Cancelled,
}

impl PaymentRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRequestStatus::Pending => "pending",
            PaymentRequestStatus::Paid => "paid",
            PaymentRequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentRequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRequestStatus::Pending),
            "paid" => Ok(PaymentRequestStatus::Paid),
            "cancelled" => Ok(PaymentRequestStatus::Cancelled),
            other => Err(UnknownVariant::new("payment request status", other)),
        }
    }
}

/// An invoice: `from_business_id` is owed `amount` by `to_business_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: PaymentRequestId,
    pub from_business_id: BusinessId,
    pub to_business_id: BusinessId,
    pub amount: Amount,
    pub memo: Option<String>,
    pub status: PaymentRequestStatus,
    pub transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn involves(&self, business_id: BusinessId) -> bool {
        self.from_business_id == business_id || self.to_business_id == business_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentRequest {
    pub from_business_id: BusinessId,
    pub to_business_id: BusinessId,
    pub amount: Amount,
    pub memo: Option<String>,
}
