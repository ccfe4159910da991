//! Provider management for HTTP reads against the Comet market.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, I256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::contracts::IComet;
use crate::protocol::WithdrawEvent;

/// Provider manager for read-only RPC access.
#[derive(Clone)]
pub struct ProviderManager {
    /// HTTP URL for reads
    rpc_url: String,
    /// Comet market address
    comet_address: Address,
}

impl ProviderManager {
    /// Create a new provider manager and verify the endpoint answers.
    pub async fn new(rpc_url: &str, comet_address: Address) -> Result<Self> {
        info!(
            rpc = rpc_url,
            comet = %comet_address,
            "Initializing provider manager with Alloy providers"
        );

        let manager = Self {
            rpc_url: rpc_url.to_string(),
            comet_address,
        };

        let block = manager
            .block_number()
            .await
            .with_context(|| format!("RPC endpoint {rpc_url} unreachable"))?;
        info!(block = block, "Provider connection verified");

        Ok(manager)
    }

    /// Get the RPC URL.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get current block number using Alloy provider.
    pub async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let block = provider.get_block_number().await?;
        Ok(block)
    }

    /// Get chain ID using Alloy provider.
    pub async fn chain_id(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let chain_id = provider.get_chain_id().await?;
        Ok(chain_id)
    }

    /// Read `getLiquidationMargin(account)` at the latest block.
    pub async fn liquidation_margin(&self, account: Address) -> Result<I256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.comet_address, &provider);

        let margin = comet
            .getLiquidationMargin(account)
            .call()
            .await
            .with_context(|| format!("getLiquidationMargin({account}) failed"))?
            ._0;

        debug!(account = %account, margin = %margin, "Liquidation margin fetched");
        Ok(margin)
    }

    /// Fetch every `Withdraw` event from `from_block` to the chain head.
    ///
    /// With `chunk_size` set the range is walked in windows of that many
    /// blocks, for providers that cap `eth_getLogs` ranges.
    pub async fn withdraw_events(
        &self,
        from_block: u64,
        chunk_size: Option<u64>,
    ) -> Result<Vec<WithdrawEvent>> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let base = Filter::new()
            .address(self.comet_address)
            .event_signature(IComet::Withdraw::SIGNATURE_HASH);

        let logs = match chunk_size {
            None => {
                let filter = base.from_block(from_block).to_block(BlockNumberOrTag::Latest);
                provider.get_logs(&filter).await?
            }
            Some(size) => {
                let head = provider.get_block_number().await?;
                let windows = block_windows(from_block, head, size);
                info!(
                    from_block = from_block,
                    to_block = head,
                    windows = windows.len(),
                    "Querying Withdraw history in windows"
                );

                let mut logs = Vec::new();
                for (start, end) in windows {
                    let filter = base.clone().from_block(start).to_block(end);
                    let chunk = provider
                        .get_logs(&filter)
                        .await
                        .with_context(|| format!("eth_getLogs {start}..={end} failed"))?;
                    debug!(start = start, end = end, logs = chunk.len(), "Window fetched");
                    logs.extend(chunk);
                }
                logs
            }
        };

        let events: Vec<WithdrawEvent> = logs.into_iter().filter_map(parse_withdraw).collect();
        info!(count = events.len(), "Withdraw events fetched");
        Ok(events)
    }

    /// Check if provider is healthy.
    pub async fn health_check(&self) -> Result<bool> {
        let block = self.block_number().await?;
        debug!(block = block, "Provider health check passed");
        Ok(block > 0)
    }
}

/// Decode a Withdraw log into its source address.
fn parse_withdraw(log: Log) -> Option<WithdrawEvent> {
    match log.log_decode::<IComet::Withdraw>() {
        Ok(decoded) => Some(WithdrawEvent {
            source: decoded.inner.data.src,
        }),
        Err(e) => {
            warn!(
                tx_hash = ?log.transaction_hash,
                error = %e,
                "Skipping undecodable Withdraw log"
            );
            None
        }
    }
}

/// Split `from..=to` into inclusive windows of at most `size` blocks.
fn block_windows(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
    let size = size.max(1);
    let mut windows = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(size - 1).min(to);
        windows.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    windows
}
