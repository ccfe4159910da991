//! Comet Absorb Bot
//!
//! Watches a Compound V3 (Comet) market and absorbs underwater accounts.
//! Features:
//! - Borrower discovery from Withdraw history
//! - Per-block refresh of stale liquidation margins
//! - Batched absorb of every negative-margin account
//! - Graceful shutdown on Ctrl-C / SIGTERM

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use comet_liquidator_chain::{
    CometContract, CometMarket, ProviderManager, TransactionSenderBuilder,
};
use comet_liquidator_core::{BotConfig, Scanner, ScannerConfig};

/// Environment variable names.
mod env {
    pub const RPC_URL: &str = "RPC_URL";
    pub const COMET_ADDRESS: &str = "COMET_ADDRESS";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const NETWORK: &str = "NETWORK";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const GAS_LIMIT: &str = "GAS_LIMIT";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,comet_liquidator_core=debug,comet_liquidator_chain=debug")
        }))
        .init();

    // BOT_CONFIG selects an optional TOML file, LOOP_DELAY_MS overrides the idle wait
    let bot_config = BotConfig::from_env()?;
    bot_config.log_config();

    let config = load_config()?;
    info!(network = %config.network, comet = %config.comet, "Starting Comet absorb bot");

    // Provider manager
    let provider = Arc::new(ProviderManager::new(&config.rpc_url, config.comet).await?);
    if !provider.health_check().await.context("health check failed")? {
        anyhow::bail!("RPC endpoint {} reports no blocks", provider.rpc_url());
    }

    let chain_id = match config.chain_id {
        Some(id) => id,
        None => provider.chain_id().await.context("failed to fetch chain id")?,
    };

    // Transaction sender
    let mut sender_builder = TransactionSenderBuilder::new(&config.rpc_url, chain_id);
    if let Some(limit) = config.gas_limit {
        sender_builder = sender_builder.gas_limit(limit);
    }
    let tx_sender = Arc::new(sender_builder.build(&config.private_key)?);
    match tx_sender.get_balance().await {
        Ok(balance) => info!(address = %tx_sender.address, balance_wei = %balance, "Absorber balance"),
        Err(e) => warn!(error = %e, "Failed to fetch absorber balance"),
    }

    let market = Arc::new(CometMarket::new(
        provider,
        CometContract::with_sender(config.comet, tx_sender),
        bot_config.history.range(),
    ));
    let absorber = market
        .absorber()
        .context("absorb requires a configured signer")?;

    info!("Bootstrapping...");
    let mut scanner = Scanner::bootstrap(market, absorber, ScannerConfig::from(&bot_config)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    info!("Starting main loop...");
    scanner.run(shutdown_rx).await?;

    Ok(())
}

/// Endpoint and key configuration loaded from environment.
struct Config {
    network: String,
    rpc_url: String,
    comet: Address,
    private_key: String,
    chain_id: Option<u64>,
    gas_limit: Option<u64>,
}

fn load_config() -> Result<Config> {
    let get_env = |name: &str| -> Result<String> {
        std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
    };

    let get_number = |name: &str| -> Result<Option<u64>> {
        match std::env::var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid number for {}: {}", name, e)),
            Err(_) => Ok(None),
        }
    };

    let comet = get_env(env::COMET_ADDRESS)?
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address for {}: {}", env::COMET_ADDRESS, e))?;

    Ok(Config {
        network: get_env(env::NETWORK).unwrap_or_else(|_| "mainnet".to_string()),
        rpc_url: get_env(env::RPC_URL)?,
        comet,
        private_key: get_env(env::PRIVATE_KEY)?,
        chain_id: get_number(env::CHAIN_ID)?,
        gas_limit: get_number(env::GAS_LIMIT)?,
    })
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔═╗┌─┐┌┬┐┌─┐┌┬┐  ╔═╗┌┐ ┌─┐┌─┐┬─┐┌┐
    ║  │ │││││├┤  │   ╠═╣├┴┐└─┐│ │├┬┘├┴┐
    ╚═╝└─┘┴ ┴└─┘ ┴   ╩ ╩└─┘└─┘└─┘┴└─└─┘
    Absorb Bot v0.1.0
    "#
    );
}
