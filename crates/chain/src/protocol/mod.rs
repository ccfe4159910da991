//! Market abstraction consumed by the liquidation core.
//!
//! The core never talks to a provider directly. It sees a market through
//! two traits:
//!
//! - [`MarketReader`]: historical Withdraw sources, block height, margins
//! - [`AbsorbableMarket`]: batched absorb submission
//!
//! # Example
//!
//! ```rust,ignore
//! use comet_liquidator_chain::protocol::{AbsorbableMarket, MarketReader};
//!
//! let margin = market.liquidation_margin(account).await?;
//! if margin.is_negative() {
//!     let tx_hash = market.absorb(absorber, &[account]).await?;
//! }
//! ```

mod comet;

pub use comet::{CometMarket, HistoryRange};

use alloy::primitives::{Address, B256, I256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// A historical `Withdraw` event, reduced to the one field the core uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WithdrawEvent {
    /// Account the funds were withdrawn from
    pub source: Address,
}

/// Read-only view of a lending market.
#[async_trait]
pub trait MarketReader: Send + Sync + Debug {
    /// Address of the market contract.
    fn market_address(&self) -> Address;

    /// Every Withdraw event the market has emitted.
    async fn withdraw_events(&self) -> Result<Vec<WithdrawEvent>>;

    /// Current chain head.
    async fn block_number(&self) -> Result<u64>;

    /// Signed liquidation margin of `account`; negative means absorbable.
    async fn liquidation_margin(&self, account: Address) -> Result<I256>;
}

/// Market that accepts batched absorb transactions.
#[async_trait]
pub trait AbsorbableMarket: MarketReader {
    /// Absorb every account in `accounts` in one transaction, crediting
    /// `absorber`. Returns the hash of the confirmed transaction; any revert
    /// is an error.
    async fn absorb(&self, absorber: Address, accounts: &[Address]) -> Result<B256>;
}
