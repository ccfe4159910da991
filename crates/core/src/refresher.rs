//! Margin refresh for a single borrower.

use anyhow::{Context, Result};

use crate::borrower::BorrowerRecord;
use comet_liquidator_chain::MarketReader;

/// Read the account's current margin and the chain head, and return a copy
/// of `record` carrying both.
///
/// Read errors are returned as-is; retry policy belongs to the caller.
pub async fn refresh<M: MarketReader + ?Sized>(
    market: &M,
    record: &BorrowerRecord,
) -> Result<BorrowerRecord> {
    let margin = market
        .liquidation_margin(record.address)
        .await
        .with_context(|| format!("margin read failed for {}", record.address))?;
    let block = market
        .block_number()
        .await
        .context("block height read failed during refresh")?;

    Ok(record.refreshed(margin, block))
}
