//! Compound V3 (Comet) market backed by an RPC endpoint.

use alloy::primitives::{Address, B256, I256};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{AbsorbableMarket, MarketReader, WithdrawEvent};
use crate::contracts::CometContract;
use crate::provider::ProviderManager;

/// Block range used to rebuild the borrower set from Withdraw history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryRange {
    /// First block to scan
    pub from_block: u64,
    /// Maximum blocks per `eth_getLogs` call; one unbounded call when unset
    pub chunk_size: Option<u64>,
}

/// Comet market: reads through the provider, absorbs through the contract.
pub struct CometMarket {
    provider: Arc<ProviderManager>,
    contract: CometContract,
    history: HistoryRange,
}

impl CometMarket {
    /// Create a market view.
    pub fn new(
        provider: Arc<ProviderManager>,
        contract: CometContract,
        history: HistoryRange,
    ) -> Self {
        Self {
            provider,
            contract,
            history,
        }
    }

    /// Address absorb rewards are credited to, when a signer is configured.
    pub fn absorber(&self) -> Option<Address> {
        self.contract.signer_address()
    }
}

impl std::fmt::Debug for CometMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CometMarket")
            .field("comet", &self.contract.address)
            .field("rpc_url", &self.provider.rpc_url())
            .field("history", &self.history)
            .finish()
    }
}

#[async_trait]
impl MarketReader for CometMarket {
    fn market_address(&self) -> Address {
        self.contract.address
    }

    async fn withdraw_events(&self) -> Result<Vec<WithdrawEvent>> {
        info!(
            comet = %self.contract.address,
            from_block = self.history.from_block,
            chunk_size = ?self.history.chunk_size,
            "Loading Withdraw history"
        );
        self.provider
            .withdraw_events(self.history.from_block, self.history.chunk_size)
            .await
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider.block_number().await
    }

    async fn liquidation_margin(&self, account: Address) -> Result<I256> {
        self.provider.liquidation_margin(account).await
    }
}

#[async_trait]
impl AbsorbableMarket for CometMarket {
    async fn absorb(&self, absorber: Address, accounts: &[Address]) -> Result<B256> {
        self.contract.absorb(absorber, accounts).await
    }
}
