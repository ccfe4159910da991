//! Batched absorb submission and registry reconciliation.
//!
//! `absorb` is all-or-nothing on chain: either every listed account is
//! absorbed or the whole transaction reverts. A revert is routine here
//! (another absorber got there first, or a margin recovered between the
//! read and the submission), so it is reported as an outcome, not an error.

use alloy::primitives::{Address, B256};
use std::time::Instant;
use tracing::{info, warn};

use crate::registry::BorrowerRegistry;
use comet_liquidator_chain::AbsorbableMarket;

/// Result of one absorb attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsorbOutcome {
    /// No targets; nothing was sent.
    Skipped,
    /// Transaction confirmed; every target was absorbed.
    Absorbed { accounts: Vec<Address>, tx_hash: B256 },
    /// Submission failed or reverted; nothing was absorbed.
    Reverted { attempted: usize, reason: String },
}

impl AbsorbOutcome {
    /// Accounts this attempt absorbed (empty unless `Absorbed`).
    pub fn absorbed(&self) -> &[Address] {
        match self {
            Self::Absorbed { accounts, .. } => accounts,
            Self::Skipped | Self::Reverted { .. } => &[],
        }
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}

/// Absorb `targets` in one transaction on behalf of `absorber`.
///
/// An empty target list returns [`AbsorbOutcome::Skipped`] without touching
/// the chain. Any submission error becomes [`AbsorbOutcome::Reverted`].
pub async fn attempt_absorb<M: AbsorbableMarket + ?Sized>(
    market: &M,
    absorber: Address,
    targets: Vec<Address>,
) -> AbsorbOutcome {
    if targets.is_empty() {
        return AbsorbOutcome::Skipped;
    }

    info!(
        absorber = %absorber,
        targets = targets.len(),
        accounts = ?targets,
        "Submitting absorb"
    );

    let start = Instant::now();
    match market.absorb(absorber, &targets).await {
        Ok(tx_hash) => {
            info!(
                tx_hash = %tx_hash,
                absorbed = targets.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "Absorb succeeded"
            );
            AbsorbOutcome::Absorbed {
                accounts: targets,
                tx_hash,
            }
        }
        Err(e) => {
            warn!(
                targets = targets.len(),
                error = %format!("{e:#}"),
                elapsed_ms = start.elapsed().as_millis(),
                "Absorb failed; treating batch as not absorbed"
            );
            AbsorbOutcome::Reverted {
                attempted: targets.len(),
                reason: format!("{e:#}"),
            }
        }
    }
}

/// Reset every absorbed account to the unset state so it is fully
/// re-measured before it can be a target again. Returns the number reset.
pub fn apply_outcome(registry: &mut BorrowerRegistry, outcome: &AbsorbOutcome) -> usize {
    let absorbed = outcome.absorbed();
    for address in absorbed {
        registry.reset(*address);
    }
    absorbed.len()
}
