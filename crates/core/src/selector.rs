//! Candidate selection: which records deserve a fresh margin read this block.

use crate::borrower::BorrowerRecord;
use crate::registry::BorrowerRegistry;

/// Blocks that must pass after a refresh before the record is read again.
pub const STALENESS_THRESHOLD_BLOCKS: u64 = 3;

/// A record is stale when it was never read, or when more than
/// [`STALENESS_THRESHOLD_BLOCKS`] blocks have passed since it was.
pub fn is_stale(record: &BorrowerRecord, block: u64) -> bool {
    if record.is_unset() {
        return true;
    }
    record
        .blocks_since_update(block)
        .is_some_and(|elapsed| elapsed > STALENESS_THRESHOLD_BLOCKS)
}

/// Records to refresh at `block`. Order is unspecified.
pub fn select_candidates(registry: &BorrowerRegistry, block: u64) -> Vec<BorrowerRecord> {
    registry
        .iter()
        .filter(|record| is_stale(record, block))
        .cloned()
        .collect()
}
