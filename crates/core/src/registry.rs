//! Borrower registry: every account that has ever withdrawn from the market.
//!
//! Built once from Withdraw history, then owned by the scanner and updated
//! in place. Accounts that never emitted a Withdraw are not discovered.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::borrower::BorrowerRecord;
use comet_liquidator_chain::MarketReader;

/// Map of account address to its borrower record.
#[derive(Debug, Clone, Default)]
pub struct BorrowerRegistry {
    records: HashMap<Address, BorrowerRecord>,
}

impl BorrowerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the market's Withdraw history.
    ///
    /// One unset record per distinct non-zero source address.
    pub async fn build_initial<M: MarketReader + ?Sized>(market: &M) -> Result<Self> {
        let events = market
            .withdraw_events()
            .await
            .context("failed to load Withdraw history")?;

        let registry = Self::from_addresses(events.iter().map(|e| e.source));

        info!(
            market = %market.market_address(),
            withdraw_events = events.len(),
            borrowers = registry.len(),
            "Borrower registry built"
        );

        Ok(registry)
    }

    /// Build a registry of unset records, dropping duplicates and the zero
    /// address.
    pub fn from_addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        let unique: HashSet<Address> = addresses.into_iter().collect();
        let records = unique
            .into_iter()
            .filter(|address| {
                if address.is_zero() {
                    debug!("Skipping zero address from Withdraw history");
                    return false;
                }
                true
            })
            .map(|address| (address, BorrowerRecord::new(address)))
            .collect();

        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, address: &Address) -> Option<&BorrowerRecord> {
        self.records.get(address)
    }

    #[cfg(test)]
    pub fn contains(&self, address: &Address) -> bool {
        self.records.contains_key(address)
    }

    /// Iterate over all records (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &BorrowerRecord> {
        self.records.values()
    }

    /// Write a record back at its address, replacing the previous entry.
    pub fn upsert(&mut self, record: BorrowerRecord) {
        self.records.insert(record.address, record);
    }

    /// Put `address` back into the unset state, creating it if unknown.
    pub fn reset(&mut self, address: Address) {
        self.records.insert(address, BorrowerRecord::new(address));
    }

    /// Addresses whose last known margin is strictly negative.
    pub fn absorbable_addresses(&self) -> Vec<Address> {
        self.records
            .values()
            .filter(|record| record.is_absorbable())
            .map(|record| record.address)
            .collect()
    }
}
