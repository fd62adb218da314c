use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paydesk_core::adapters::{InMemoryStore, PostgresStore};
use paydesk_core::cli::{self, Cli, Commands, DbCommands};
use paydesk_core::config::Config;
use paydesk_core::middleware::auth::SessionKeys;
use paydesk_core::ports::LedgerGateway;
use paydesk_core::secrets::SecretBox;
use paydesk_core::stellar::{HorizonClient, HorizonGateway};
use paydesk_core::{create_app, db, AppState, CoreSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let horizon_client = HorizonClient::new(config.stellar_horizon_url.clone());
    tracing::info!("Stellar Horizon client initialized with URL: {}", config.stellar_horizon_url);

    let ledger: Arc<dyn LedgerGateway> = Arc::new(HorizonGateway::new(
        horizon_client,
        config.stellar_friendbot_url.clone(),
        config.stellar_network_passphrase.clone(),
    ));
    let vault = SecretBox::from_passphrase(&config.wallet_encryption_key);
    let sessions = SessionKeys::new(&config.jwt_secret, config.session_ttl_hours);
    let settings = CoreSettings {
        monitor_interval: config.monitor_interval,
        monitor_page_size: config.monitor_page_size,
        admin_api_key: config.admin_api_key.clone(),
        ..CoreSettings::default()
    };

    match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            let store = Arc::new(PostgresStore::new(pool.clone()));
            Ok(AppState::assemble(store, ledger, vault, sessions, settings).with_database(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; using the in-memory store, data will not survive a restart");
            let store = Arc::new(InMemoryStore::new());
            Ok(AppState::assemble(store, ledger, vault, sessions, settings))
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config).await?;

    let resumed = state.monitor.start_all().await?;
    tracing::info!("Monitoring {} existing wallet(s)", resumed);

    let monitor = state.monitor.clone();
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.shutdown();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::warn!("Shutdown signal received");
}
