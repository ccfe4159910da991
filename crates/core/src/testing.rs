//! In-memory market for unit tests.

use alloy::primitives::{Address, B256, I256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use comet_liquidator_chain::{AbsorbableMarket, MarketReader, WithdrawEvent};

#[derive(Debug, Default)]
struct State {
    height: u64,
    withdraw_sources: Vec<Address>,
    margins: HashMap<Address, I256>,
    fail_withdraw_query: bool,
    failing_height_reads: usize,
    fail_absorb: bool,
    height_reads: usize,
    margin_reads: usize,
    absorb_calls: Vec<(Address, Vec<Address>)>,
}

/// Scriptable market: fixed head, per-account margins, switchable failures,
/// and a log of every call the core makes.
#[derive(Debug, Default)]
pub struct FakeMarket {
    state: Mutex<State>,
}

impl FakeMarket {
    pub fn new(height: u64) -> Self {
        let market = Self::default();
        market.state.lock().height = height;
        market
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().height = height;
    }

    pub fn set_withdraw_sources(&self, sources: &[Address]) {
        self.state.lock().withdraw_sources = sources.to_vec();
    }

    pub fn set_margin(&self, account: Address, margin: I256) {
        self.state.lock().margins.insert(account, margin);
    }

    pub fn fail_withdraw_query(&self) {
        self.state.lock().fail_withdraw_query = true;
    }

    /// Make the next `count` block height reads fail.
    pub fn fail_height_reads(&self, count: usize) {
        self.state.lock().failing_height_reads = count;
    }

    pub fn fail_absorb(&self) {
        self.state.lock().fail_absorb = true;
    }

    pub fn height_reads(&self) -> usize {
        self.state.lock().height_reads
    }

    pub fn margin_reads(&self) -> usize {
        self.state.lock().margin_reads
    }

    pub fn absorb_calls(&self) -> Vec<(Address, Vec<Address>)> {
        self.state.lock().absorb_calls.clone()
    }
}

#[async_trait]
impl MarketReader for FakeMarket {
    fn market_address(&self) -> Address {
        Address::repeat_byte(0xc0)
    }

    async fn withdraw_events(&self) -> Result<Vec<WithdrawEvent>> {
        let state = self.state.lock();
        if state.fail_withdraw_query {
            bail!("eth_getLogs unavailable");
        }
        Ok(state
            .withdraw_sources
            .iter()
            .map(|&source| WithdrawEvent { source })
            .collect())
    }

    async fn block_number(&self) -> Result<u64> {
        let mut state = self.state.lock();
        state.height_reads += 1;
        if state.failing_height_reads > 0 {
            state.failing_height_reads -= 1;
            bail!("eth_blockNumber timed out");
        }
        Ok(state.height)
    }

    async fn liquidation_margin(&self, account: Address) -> Result<I256> {
        let mut state = self.state.lock();
        state.margin_reads += 1;
        state
            .margins
            .get(&account)
            .copied()
            .ok_or_else(|| anyhow!("execution reverted: not an account"))
    }
}

#[async_trait]
impl AbsorbableMarket for FakeMarket {
    async fn absorb(&self, absorber: Address, accounts: &[Address]) -> Result<B256> {
        let mut state = self.state.lock();
        state.absorb_calls.push((absorber, accounts.to_vec()));
        if state.fail_absorb {
            bail!("execution reverted: NotLiquidatable()");
        }
        Ok(B256::repeat_byte(state.absorb_calls.len() as u8))
    }
}
