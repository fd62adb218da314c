use chrono::{DateTime, Utc};
use serde::Serialize;

use super::BusinessId;

/// A registered business. The password hash never leaves the service layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBusiness {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
