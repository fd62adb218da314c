use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HorizonError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Invalid response from Horizon: {0}")]
    InvalidResponse(String),
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),
    #[error("Friendbot refused to fund {0}")]
    FundingRefused(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// Response from Horizon /accounts endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub account_id: String,
    pub balances: Vec<Balance>,
    pub sequence: String,
    #[serde(default)]
    pub subentry_count: i32,
    pub home_domain: Option<String>,
    #[serde(default)]
    pub last_modified_ledger: i64,
    #[serde(default)]
    pub last_modified_time: Option<String>,
}

impl AccountResponse {
    pub fn native_balance(&self) -> Option<&str> {
        self.balances
            .iter()
            .find(|balance| balance.asset_type == "native")
            .map(|balance| balance.balance.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub balance: String,
    pub limit: Option<String>,
    pub asset_type: String,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
}

/// One record of /accounts/{id}/payments. Only `payment` records carry
/// `to`, `amount` and `asset_type`; `create_account` and others do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub paging_token: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub transaction_hash: String,
    pub asset_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<String>,
    pub transaction: Option<EmbeddedTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedTransaction {
    pub memo: Option<String>,
    pub memo_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Records<T>,
}

#[derive(Debug, Deserialize)]
struct Records<T> {
    records: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    #[serde(default)]
    pub ledger: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SubmitProblem {
    title: Option<String>,
    extras: Option<SubmitExtras>,
}

#[derive(Debug, Deserialize)]
struct SubmitExtras {
    result_codes: Option<serde_json::Value>,
}

/// HTTP client for interacting with the Stellar Horizon API
#[derive(Clone)]
pub struct HorizonClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HorizonClient {
    /// Creates a new HorizonClient with the specified base URL
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60)
    }

    /// Creates a new HorizonClient with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HorizonClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn guarded<T, F>(&self, request: F) -> Result<T, HorizonError>
    where
        F: Future<Output = Result<T, HorizonError>>,
    {
        match self.circuit_breaker.call(request).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(HorizonError::CircuitBreakerOpen(
                "Horizon API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Fetches account details from the Horizon API
    pub async fn get_account(&self, address: &str) -> Result<AccountResponse, HorizonError> {
        let url = self.url(&format!("accounts/{}", address));
        let client = self.client.clone();
        let addr = address.to_string();

        self.guarded(async move {
            let response = client.get(&url).send().await?;

            if response.status() == 404 {
                return Err(HorizonError::AccountNotFound(addr));
            }
            if !response.status().is_success() {
                return Err(HorizonError::InvalidResponse(format!(
                    "GET accounts returned {}",
                    response.status()
                )));
            }

            let account = response.json::<AccountResponse>().await?;
            Ok(account)
        })
        .await
    }

    /// Most recent payment operations touching the account, newest first,
    /// with their parent transaction joined in for the memo.
    pub async fn account_payments(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<PaymentRecord>, HorizonError> {
        let url = self.url(&format!("accounts/{}/payments", address));
        let client = self.client.clone();
        let addr = address.to_string();
        let limit = limit.to_string();

        self.guarded(async move {
            let response = client
                .get(&url)
                .query(&[
                    ("order", "desc"),
                    ("limit", limit.as_str()),
                    ("join", "transactions"),
                ])
                .send()
                .await?;

            if response.status() == 404 {
                return Err(HorizonError::AccountNotFound(addr));
            }
            if !response.status().is_success() {
                return Err(HorizonError::InvalidResponse(format!(
                    "GET payments returned {}",
                    response.status()
                )));
            }

            let page = response.json::<Page<PaymentRecord>>().await?;
            Ok(page.embedded.records)
        })
        .await
    }

    /// Submits a base64 XDR envelope and waits for the ledger result.
    pub async fn submit_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SubmitResponse, HorizonError> {
        let url = self.url("transactions");
        let client = self.client.clone();
        let envelope = envelope_xdr.to_string();

        self.guarded(async move {
            let response = client
                .post(&url)
                .form(&[("tx", envelope.as_str())])
                .send()
                .await?;

            if response.status().is_success() {
                return Ok(response.json::<SubmitResponse>().await?);
            }

            let status = response.status();
            let detail = match response.json::<SubmitProblem>().await {
                Ok(problem) => describe_problem(problem),
                Err(_) => format!("status {}", status),
            };
            Err(HorizonError::TransactionRejected(detail))
        })
        .await
    }

    /// Asks a friendbot instance to create and fund the account.
    pub async fn fund_with_friendbot(
        &self,
        friendbot_url: &str,
        address: &str,
    ) -> Result<(), HorizonError> {
        let url = friendbot_url.to_string();
        let client = self.client.clone();
        let addr = address.to_string();

        self.guarded(async move {
            let response = client.get(&url).query(&[("addr", addr.as_str())]).send().await?;
            if !response.status().is_success() {
                return Err(HorizonError::FundingRefused(addr));
            }
            Ok(())
        })
        .await
    }
}

fn describe_problem(problem: SubmitProblem) -> String {
    let codes = problem
        .extras
        .and_then(|extras| extras.result_codes)
        .map(|codes| codes.to_string());
    match (problem.title, codes) {
        (Some(title), Some(codes)) => format!("{} {}", title, codes),
        (Some(title), None) => title,
        (None, Some(codes)) => codes,
        (None, None) => "unknown failure".to_string(),
    }
}
