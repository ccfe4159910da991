//! Transaction signer and sender for absorb transactions.
//! Uses Alloy providers for type-safe RPC interactions.
//!
//! Nonce, fee and gas-limit fields are filled by the provider's
//! recommended fillers unless a fixed gas limit is configured.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Failure modes of an absorb submission that callers may want to tell apart.
#[derive(Debug, thiserror::Error)]
pub enum AbsorbError {
    /// The transaction was mined but its receipt reports failure.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },
    /// No private key was supplied, so nothing can be signed.
    #[error("signer not configured (calldata ready: {calldata_len} bytes)")]
    SignerNotConfigured { calldata_len: usize },
}

/// Transaction sender bound to a single local key.
pub struct TransactionSender {
    /// RPC URL for sending transactions
    rpc_url: String,
    /// Signer wallet
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    /// Chain ID
    chain_id: u64,
    /// Fixed gas limit; estimated per transaction when unset
    gas_limit: Option<u64>,
}

/// Builder for TransactionSender.
pub struct TransactionSenderBuilder {
    rpc_url: String,
    chain_id: u64,
    gas_limit: Option<u64>,
}

impl TransactionSenderBuilder {
    /// Create a new builder.
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            gas_limit: None,
        }
    }

    /// Use a fixed gas limit instead of estimating.
    pub fn gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = Some(limit);
        self
    }

    /// Build the TransactionSender.
    pub fn build(self, private_key: &str) -> Result<TransactionSender> {
        // Accept keys with or without 0x prefix
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str.parse().context("invalid private key")?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        info!(
            address = %address,
            chain_id = self.chain_id,
            gas_limit = ?self.gas_limit,
            "Transaction sender initialized"
        );

        Ok(TransactionSender {
            rpc_url: self.rpc_url,
            wallet,
            address,
            chain_id: self.chain_id,
            gas_limit: self.gas_limit,
        })
    }
}

impl TransactionSender {
    /// Create a new transaction sender from a private key.
    pub fn new(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self> {
        TransactionSenderBuilder::new(rpc_url, chain_id).build(private_key)
    }

    /// Chain ID transactions are signed for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Send a transaction and wait for its receipt.
    ///
    /// Returns the transaction hash when the receipt reports success and
    /// [`AbsorbError::Reverted`] when it does not.
    pub async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        value: U256,
    ) -> Result<B256> {
        let total_start = Instant::now();

        debug!(
            to = %to,
            calldata_len = calldata.len(),
            value = %value,
            "Preparing transaction"
        );

        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_value(value)
            .with_chain_id(self.chain_id);
        if let Some(limit) = self.gas_limit {
            tx.set_gas_limit(limit);
        }

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse()?);

        let submit_start = Instant::now();
        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        let submit_elapsed = submit_start.elapsed();

        info!(
            tx_hash = %tx_hash,
            submit_ms = submit_elapsed.as_millis(),
            "Transaction submitted, waiting for confirmation"
        );

        let confirm_start = Instant::now();
        let receipt = pending.get_receipt().await?;
        let confirm_elapsed = confirm_start.elapsed();
        let total_elapsed = total_start.elapsed();

        if receipt.status() {
            info!(
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                gas_used = receipt.gas_used,
                confirm_ms = confirm_elapsed.as_millis(),
                total_ms = total_elapsed.as_millis(),
                "Transaction confirmed"
            );
            Ok(tx_hash)
        } else {
            warn!(
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                total_ms = total_elapsed.as_millis(),
                "Transaction reverted"
            );
            Err(AbsorbError::Reverted { tx_hash }.into())
        }
    }

    /// Get current balance of the signer.
    pub async fn get_balance(&self) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let balance = provider.get_balance(self.address).await?;
        Ok(balance)
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}
