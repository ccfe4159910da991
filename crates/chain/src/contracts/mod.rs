//! Contract bindings for the Comet market.
//!
//! Reads go through the `#[sol(rpc)]` bindings in [`comet`]; the absorb
//! transaction is encoded here and handed to the [`TransactionSender`].

pub mod comet;

pub use comet::{encode_absorb, IComet};

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use std::time::Instant;

use crate::signer::{AbsorbError, TransactionSender};

/// Comet contract wrapper with transaction sending capability.
pub struct CometContract {
    /// Market (proxy) address
    pub address: Address,
    /// Transaction sender (optional)
    sender: Option<Arc<TransactionSender>>,
}

impl CometContract {
    /// Create a read-only wrapper.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            sender: None,
        }
    }

    /// Create a wrapper that can submit transactions.
    pub fn with_sender(address: Address, sender: Arc<TransactionSender>) -> Self {
        Self {
            address,
            sender: Some(sender),
        }
    }

    /// Address of the configured signer, if any.
    pub fn signer_address(&self) -> Option<Address> {
        self.sender.as_ref().map(|s| s.address)
    }

    /// Submit `absorb(absorber, accounts)` and wait for the receipt.
    pub async fn absorb(&self, absorber: Address, accounts: &[Address]) -> anyhow::Result<B256> {
        let encode_start = Instant::now();
        let calldata = encode_absorb(absorber, accounts);
        let encode_elapsed = encode_start.elapsed();

        let Some(sender) = &self.sender else {
            return Err(AbsorbError::SignerNotConfigured {
                calldata_len: calldata.len(),
            }
            .into());
        };

        tracing::info!(
            contract = %self.address,
            absorber = %absorber,
            accounts = accounts.len(),
            encode_us = encode_elapsed.as_micros(),
            calldata_len = calldata.len(),
            "[CONTRACT] Sending absorb"
        );

        sender
            .send_transaction(self.address, calldata, U256::ZERO)
            .await
    }
}

impl std::fmt::Debug for CometContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CometContract")
            .field("address", &self.address)
            .field("signer", &self.signer_address())
            .finish()
    }
}
