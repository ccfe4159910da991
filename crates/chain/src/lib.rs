//! Comet liquidator chain interaction layer.
//!
//! This crate provides:
//! - Provider management for HTTP reads (block height, margins, Withdraw logs)
//! - Contract bindings for the Comet market
//! - Transaction signing and sending for absorb calls
//! - The market traits the liquidation core is written against

pub mod contracts;
pub mod protocol;
mod provider;
mod signer;

pub use contracts::{CometContract, IComet};
pub use protocol::{
    AbsorbableMarket, CometMarket, HistoryRange, MarketReader, WithdrawEvent,
};
pub use provider::ProviderManager;
pub use signer::{AbsorbError, TransactionSender, TransactionSenderBuilder};
