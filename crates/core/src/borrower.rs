//! Borrower record: the last observed liquidation margin of one account.

use alloy::primitives::{Address, I256};

/// One known account and what we last read about it.
///
/// `liquidation_margin` and `last_updated` are `None` until the first
/// refresh, and again after the account has been absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowerRecord {
    /// Account address (registry key)
    pub address: Address,
    /// Signed margin from `getLiquidationMargin`; negative means absorbable
    pub liquidation_margin: Option<I256>,
    /// Block height the margin was read at
    pub last_updated: Option<u64>,
}

impl BorrowerRecord {
    /// Create an unset record.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            liquidation_margin: None,
            last_updated: None,
        }
    }

    /// Copy of this record carrying a fresh observation.
    pub fn refreshed(&self, margin: I256, block: u64) -> Self {
        Self {
            address: self.address,
            liquidation_margin: Some(margin),
            last_updated: Some(block),
        }
    }

    /// True until the first refresh lands.
    pub fn is_unset(&self) -> bool {
        self.last_updated.is_none()
    }

    /// Margin is known and strictly negative.
    ///
    /// An unknown margin is never absorbable.
    pub fn is_absorbable(&self) -> bool {
        matches!(self.liquidation_margin, Some(margin) if margin.is_negative())
    }

    /// Blocks elapsed since the last refresh, saturating at zero when the
    /// observed head is behind `last_updated`.
    pub fn blocks_since_update(&self, block: u64) -> Option<u64> {
        self.last_updated.map(|last| block.saturating_sub(last))
    }
}
