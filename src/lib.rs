pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod secrets;
pub mod services;
pub mod stellar;
pub mod utils;
pub mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::middleware::auth::{admin_auth, SessionKeys};
use crate::middleware::request_logger::request_logger_middleware;
use crate::ports::{LedgerGateway, Store};
use crate::secrets::SecretBox;
use crate::services::{AccountService, InvoiceService, KeyedLocks, TransferEngine, WalletMonitor};

/// Knobs for wiring the services together.
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub monitor_interval: Duration,
    pub monitor_page_size: u32,
    pub admin_api_key: Option<String>,
    pub bcrypt_cost: u32,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            monitor_interval: services::monitor::DEFAULT_POLL_INTERVAL,
            monitor_page_size: services::monitor::DEFAULT_PAGE_SIZE,
            admin_api_key: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub db: Option<PgPool>,
    pub accounts: Arc<AccountService>,
    pub transfers: Arc<TransferEngine>,
    pub invoices: Arc<InvoiceService>,
    pub monitor: Arc<WalletMonitor>,
    pub sessions: Arc<SessionKeys>,
    pub admin_api_key: Option<String>,
}

impl AppState {
    /// Builds every service over one store and one ledger. The engine and
    /// the monitor share the per-wallet lock table.
    pub fn assemble(
        store: Arc<dyn Store>,
        ledger: Arc<dyn LedgerGateway>,
        vault: SecretBox,
        sessions: SessionKeys,
        settings: CoreSettings,
    ) -> Self {
        let vault = Arc::new(vault);
        let sessions = Arc::new(sessions);
        let wallet_locks = Arc::new(KeyedLocks::new());

        let monitor = Arc::new(WalletMonitor::new(
            store.clone(),
            ledger.clone(),
            wallet_locks.clone(),
            settings.monitor_interval,
            settings.monitor_page_size,
        ));
        let transfers = Arc::new(TransferEngine::new(
            store.clone(),
            ledger.clone(),
            vault.clone(),
            wallet_locks,
        ));
        let invoices = Arc::new(InvoiceService::new(store.clone(), transfers.clone()));
        let accounts = Arc::new(
            AccountService::new(
                store.clone(),
                ledger,
                vault,
                monitor.clone(),
                sessions.clone(),
            )
            .with_bcrypt_cost(settings.bcrypt_cost),
        );

        Self {
            store,
            db: None,
            accounts,
            transfers,
            invoices,
            monitor,
            sessions,
            admin_api_key: settings.admin_api_key,
        }
    }

    /// Lets the health check ping the database.
    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/businesses", get(handlers::admin::list_businesses))
        .route("/transactions", get(handlers::admin::list_all_transactions))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/profile", get(handlers::auth::profile))
        .route("/send", post(handlers::transactions::send_payment))
        .route("/transactions", get(handlers::transactions::list_transactions))
        .route(
            "/invoices",
            post(handlers::payment_requests::create_invoice),
        )
        .route(
            "/payment-requests",
            get(handlers::payment_requests::list_payment_requests),
        )
        .route(
            "/payment-requests/:id/pay",
            post(handlers::payment_requests::pay_payment_request),
        )
        .route(
            "/payment-requests/:id/cancel",
            post(handlers::payment_requests::cancel_payment_request),
        )
        .nest("/admin", admin)
        .layer(axum_middleware::from_fn(request_logger_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
