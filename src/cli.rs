use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "paydesk-core")]
#[command(about = "Paydesk Core - B2B payments over the Stellar network", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and wallet monitors (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let database_url = match &config.database_url {
        Some(url) => url,
        None => anyhow::bail!("DATABASE_URL must be set to run migrations"),
    };

    let pool = crate::db::create_pool(database_url).await?;
    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");
    config.validate()?;

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: <unset, in-memory store>"),
    }
    println!("  Stellar Horizon URL: {}", config.stellar_horizon_url);
    println!("  Stellar Friendbot URL: {}", config.stellar_friendbot_url);
    println!("  Network Passphrase: {}", config.stellar_network_passphrase);
    println!(
        "  Admin API: {}",
        if config.admin_api_key.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Session TTL: {}h", config.session_ttl_hours);
    println!(
        "  Monitor: every {}s, {} payments per poll",
        config.monitor_interval.as_secs(),
        config.monitor_page_size
    );

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
