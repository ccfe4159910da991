//! Poll loop for the absorb bot.
//!
//! One logical thread of control: per new block, select stale borrowers,
//! refresh them one at a time, absorb the ones with negative margin in a
//! single batch, then reset what was absorbed. When the head has not moved
//! the loop sleeps for `loop_delay`; that sleep and chain I/O are the only
//! suspension points.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::config::BotConfig;
use crate::refresher::refresh;
use crate::registry::BorrowerRegistry;
use crate::selector::select_candidates;
use crate::submitter::{apply_outcome, attempt_absorb, AbsorbOutcome};
use comet_liquidator_chain::AbsorbableMarket;

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Idle wait when the head has not moved (and after a failed cycle)
    pub loop_delay: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            loop_delay: Duration::from_millis(5000),
        }
    }
}

impl From<&BotConfig> for ScannerConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            loop_delay: config.scanner.loop_delay(),
        }
    }
}

/// What one processed block did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Block height the cycle ran for
    pub block: u64,
    /// Records selected for refresh
    pub candidates: usize,
    /// Records whose refreshed margin was written back
    pub refreshed: usize,
    /// Records with a negative margin after the refresh
    pub absorbable: usize,
    /// Absorb attempt result
    pub outcome: AbsorbOutcome,
    /// Wall time of the cycle
    pub elapsed: Duration,
}

impl CycleReport {
    /// Number of accounts absorbed this cycle.
    pub fn absorbed(&self) -> usize {
        self.outcome.absorbed().len()
    }
}

/// Result of a single loop iteration.
#[derive(Debug, Clone)]
pub enum Tick {
    /// Head unchanged since the last processed block; nothing was done.
    Idle { block: u64 },
    /// A new block was processed.
    Processed(CycleReport),
}

/// Owns the borrower registry and drives select → refresh → absorb.
pub struct Scanner<M: AbsorbableMarket + ?Sized> {
    /// Market to read from and absorb on
    market: Arc<M>,
    /// Address credited by absorb
    absorber: Address,
    /// Known borrowers; only this scanner writes to it
    registry: BorrowerRegistry,
    /// Last fully processed block (`None` until the first cycle completes)
    last_processed: Option<u64>,
    /// Configuration
    config: ScannerConfig,
}

impl<M: AbsorbableMarket + ?Sized> Scanner<M> {
    /// Create a scanner over an already built registry.
    pub fn new(
        market: Arc<M>,
        absorber: Address,
        registry: BorrowerRegistry,
        config: ScannerConfig,
    ) -> Self {
        Self {
            market,
            absorber,
            registry,
            last_processed: None,
            config,
        }
    }

    /// Build the registry from Withdraw history and create the scanner.
    #[instrument(skip(market, config))]
    pub async fn bootstrap(
        market: Arc<M>,
        absorber: Address,
        config: ScannerConfig,
    ) -> Result<Self> {
        info!("Starting bootstrap...");
        let registry = BorrowerRegistry::build_initial(market.as_ref())
            .await
            .context("bootstrap failed")?;
        info!(borrowers = registry.len(), "Bootstrap complete");
        Ok(Self::new(market, absorber, registry, config))
    }

    pub fn registry(&self) -> &BorrowerRegistry {
        &self.registry
    }

    pub fn last_processed(&self) -> Option<u64> {
        self.last_processed
    }

    /// Run one loop iteration: read the head and process it if it is new.
    ///
    /// On error the last processed block is left unchanged, so the same
    /// block is retried on the next iteration.
    pub async fn tick(&mut self) -> Result<Tick> {
        let block = self
            .market
            .block_number()
            .await
            .context("failed to read block height")?;

        if self.last_processed == Some(block) {
            return Ok(Tick::Idle { block });
        }

        let report = self.process_block(block).await?;
        self.last_processed = Some(block);
        Ok(Tick::Processed(report))
    }

    /// Run the pipeline for `block`.
    #[instrument(skip(self))]
    pub async fn process_block(&mut self, block: u64) -> Result<CycleReport> {
        let cycle_start = Instant::now();
        info!(block = block, "Running for block");

        let candidates = select_candidates(&self.registry, block);
        info!(
            block = block,
            candidates = candidates.len(),
            borrowers = self.registry.len(),
            "Updating candidates"
        );

        // Refresh sequentially; each write-back lands before the next read.
        let mut refreshed = 0;
        for candidate in &candidates {
            let updated = refresh(self.market.as_ref(), candidate).await?;
            info!(
                account = %updated.address,
                margin = ?updated.liquidation_margin,
                block = ?updated.last_updated,
                "Candidate refreshed"
            );
            self.registry.upsert(updated);
            refreshed += 1;
        }

        let targets = self.registry.absorbable_addresses();
        info!(block = block, absorbable = targets.len(), "Absorbable borrowers");
        let absorbable = targets.len();

        let outcome = attempt_absorb(self.market.as_ref(), self.absorber, targets).await;
        let reset = apply_outcome(&mut self.registry, &outcome);
        if reset > 0 {
            debug!(reset = reset, "Cleared absorbed borrowers");
        }

        Ok(CycleReport {
            block,
            candidates: candidates.len(),
            refreshed,
            absorbable,
            outcome,
            elapsed: cycle_start.elapsed(),
        })
    }

    /// Loop until `shutdown` becomes `true`.
    ///
    /// The signal is checked before every iteration and raced against the
    /// idle wait. A failed cycle is logged and retried after one idle wait.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            absorber = %self.absorber,
            market = %self.market.market_address(),
            borrowers = self.registry.len(),
            loop_delay_ms = self.config.loop_delay.as_millis(),
            "Starting scanner loop..."
        );

        loop {
            if *shutdown.borrow() {
                info!(last_processed = ?self.last_processed, "Shutdown requested, scanner stopped");
                return Ok(());
            }

            let wait = match self.tick().await {
                Ok(Tick::Idle { block }) => {
                    info!(
                        block = block,
                        delay_ms = self.config.loop_delay.as_millis(),
                        "Already ran for block; waiting"
                    );
                    true
                }
                Ok(Tick::Processed(report)) => {
                    info!(
                        block = report.block,
                        candidates = report.candidates,
                        refreshed = report.refreshed,
                        absorbable = report.absorbable,
                        absorbed = report.absorbed(),
                        reverted = report.outcome.is_reverted(),
                        elapsed_ms = report.elapsed.as_millis(),
                        "Cycle complete"
                    );
                    false
                }
                Err(e) => {
                    error!(
                        error = %format!("{e:#}"),
                        last_processed = ?self.last_processed,
                        delay_ms = self.config.loop_delay.as_millis(),
                        "Cycle failed; retrying after idle wait"
                    );
                    true
                }
            };

            if wait {
                self.idle_wait(&mut shutdown).await;
            }
        }
    }

    /// Sleep for `loop_delay`, returning early if the shutdown signal changes.
    async fn idle_wait(&self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.loop_delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender gone: nothing can stop us any more, keep pacing.
                    tokio::time::sleep(self.config.loop_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::borrower::BorrowerRecord;
    use crate::testing::FakeMarket;
    use alloy::primitives::I256;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn i256(value: i64) -> I256 {
        I256::try_from(value).unwrap()
    }

    fn absorber() -> Address {
        Address::repeat_byte(0xee)
    }

    fn scanner(market: &Arc<FakeMarket>, registry: BorrowerRegistry) -> Scanner<FakeMarket> {
        Scanner::new(
            market.clone(),
            absorber(),
            registry,
            ScannerConfig {
                loop_delay: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn test_end_to_end_block() {
        let (a, b) = (addr(0xa), addr(0xb));
        let mut registry = BorrowerRegistry::new();
        registry.upsert(BorrowerRecord::new(a).refreshed(i256(-5), 10));
        registry.upsert(BorrowerRecord::new(b).refreshed(i256(3), 10));

        let market = Arc::new(FakeMarket::new(14));
        market.set_margin(a, i256(-2));
        market.set_margin(b, i256(1));

        let mut scanner = scanner(&market, registry);
        let report = match scanner.tick().await.unwrap() {
            Tick::Processed(report) => report,
            other => panic!("expected a processed block, got {other:?}"),
        };

        assert_eq!(report.block, 14);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.refreshed, 2);
        assert_eq!(report.absorbable, 1);
        assert_eq!(report.outcome.absorbed(), &[a]);
        assert_eq!(market.absorb_calls(), vec![(absorber(), vec![a])]);

        assert_eq!(scanner.registry().get(&a), Some(&BorrowerRecord::new(a)));
        let b_record = scanner.registry().get(&b).unwrap();
        assert_eq!(b_record.liquidation_margin, Some(i256(1)));
        assert_eq!(b_record.last_updated, Some(14));
        assert_eq!(scanner.last_processed(), Some(14));
    }

    #[tokio::test]
    async fn test_same_block_is_idle() {
        let market = Arc::new(FakeMarket::new(7));
        market.set_margin(addr(1), i256(100));
        let mut scanner = scanner(&market, BorrowerRegistry::from_addresses([addr(1)]));

        assert!(matches!(scanner.tick().await.unwrap(), Tick::Processed(_)));
        let reads_after_first = market.margin_reads();

        assert!(matches!(scanner.tick().await.unwrap(), Tick::Idle { block: 7 }));
        assert_eq!(market.margin_reads(), reads_after_first);
    }

    #[tokio::test]
    async fn test_first_tick_processes_block_zero() {
        let market = Arc::new(FakeMarket::new(0));
        let mut scanner = scanner(&market, BorrowerRegistry::new());

        assert!(matches!(scanner.tick().await.unwrap(), Tick::Processed(_)));
        assert_eq!(scanner.last_processed(), Some(0));
    }

    #[tokio::test]
    async fn test_fresh_records_not_reread_within_threshold() {
        let market = Arc::new(FakeMarket::new(20));
        market.set_margin(addr(1), i256(50));
        let mut scanner = scanner(&market, BorrowerRegistry::from_addresses([addr(1)]));

        scanner.tick().await.unwrap();
        assert_eq!(market.margin_reads(), 1);

        for height in 21..=23 {
            market.set_height(height);
            match scanner.tick().await.unwrap() {
                Tick::Processed(report) => assert_eq!(report.candidates, 0),
                other => panic!("expected a processed block, got {other:?}"),
            }
        }
        assert_eq!(market.margin_reads(), 1);

        market.set_height(24);
        scanner.tick().await.unwrap();
        assert_eq!(market.margin_reads(), 2);
    }

    #[tokio::test]
    async fn test_read_failure_keeps_block_pending() {
        let market = Arc::new(FakeMarket::new(30));
        market.set_margin(addr(1), i256(-1));
        // addr(2) has no margin configured, so its read fails
        let mut scanner = scanner(&market, BorrowerRegistry::from_addresses([addr(1), addr(2)]));

        assert!(scanner.tick().await.is_err());
        assert_eq!(scanner.last_processed(), None);
        assert!(market.absorb_calls().is_empty());

        market.set_margin(addr(2), i256(4));
        let report = match scanner.tick().await.unwrap() {
            Tick::Processed(report) => report,
            other => panic!("expected a processed block, got {other:?}"),
        };
        assert_eq!(report.block, 30);
        assert_eq!(report.outcome.absorbed(), &[addr(1)]);
        assert_eq!(scanner.last_processed(), Some(30));
    }

    #[tokio::test]
    async fn test_reverted_absorb_keeps_registry() {
        let market = Arc::new(FakeMarket::new(5));
        market.set_margin(addr(1), i256(-3));
        market.fail_absorb();
        let mut scanner = scanner(&market, BorrowerRegistry::from_addresses([addr(1)]));

        let report = match scanner.tick().await.unwrap() {
            Tick::Processed(report) => report,
            other => panic!("expected a processed block, got {other:?}"),
        };

        assert!(report.outcome.is_reverted());
        assert_eq!(report.absorbed(), 0);
        let record = scanner.registry().get(&addr(1)).unwrap();
        assert_eq!(record.liquidation_margin, Some(i256(-3)));
        assert_eq!(scanner.last_processed(), Some(5));
    }

    #[tokio::test]
    async fn test_no_targets_no_submission() {
        let market = Arc::new(FakeMarket::new(5));
        market.set_margin(addr(1), i256(0));
        let mut scanner = scanner(&market, BorrowerRegistry::from_addresses([addr(1)]));

        scanner.tick().await.unwrap();
        assert!(market.absorb_calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_already_shut_down() {
        let market = Arc::new(FakeMarket::new(1));
        let mut scanner = scanner(&market, BorrowerRegistry::new());
        let (_tx, rx) = watch::channel(true);

        scanner.run(rx).await.unwrap();
        assert_eq!(market.height_reads(), 0);
    }

    #[tokio::test]
    async fn test_run_idles_then_stops_on_signal() {
        let market = Arc::new(FakeMarket::new(7));
        market.set_margin(addr(1), i256(10));
        let mut scanner = scanner(&market, BorrowerRegistry::from_addresses([addr(1)]));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            scanner.run(rx).await.unwrap();
            scanner
        });

        // Wait for a few idle iterations on the unchanged head.
        let deadline = Instant::now() + Duration::from_secs(5);
        while market.height_reads() < 3 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();

        let scanner = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scanner did not stop")
            .unwrap();

        assert!(market.height_reads() >= 3);
        assert_eq!(market.margin_reads(), 1);
        assert_eq!(scanner.last_processed(), Some(7));
    }

    #[tokio::test]
    async fn test_shutdown_cuts_long_idle_wait_short() {
        let market = Arc::new(FakeMarket::new(7));
        let mut scanner = Scanner::new(
            market.clone(),
            absorber(),
            BorrowerRegistry::new(),
            ScannerConfig {
                loop_delay: Duration::from_secs(600),
            },
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            scanner.run(rx).await.unwrap();
            scanner
        });

        // Block 7 is processed, the second head read finds it unchanged and
        // the loop settles into the idle wait.
        let deadline = Instant::now() + Duration::from_secs(5);
        while market.height_reads() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(market.height_reads(), 2);
        tx.send(true).unwrap();

        let scanner = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("shutdown did not interrupt the idle wait")
            .unwrap();

        assert_eq!(market.height_reads(), 2);
        assert_eq!(scanner.last_processed(), Some(7));
    }

    #[tokio::test]
    async fn test_run_survives_read_failures() {
        let market = Arc::new(FakeMarket::new(9));
        market.fail_height_reads(2);
        let mut scanner = scanner(&market, BorrowerRegistry::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            scanner.run(rx).await.unwrap();
            scanner
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while market.height_reads() < 4 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();

        let scanner = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scanner did not stop")
            .unwrap();

        assert_eq!(scanner.last_processed(), Some(9));
    }

    #[tokio::test]
    async fn test_bootstrap_builds_registry() {
        let market = Arc::new(FakeMarket::new(1));
        market.set_withdraw_sources(&[addr(1), addr(2), Address::ZERO]);

        let scanner = Scanner::bootstrap(market.clone(), absorber(), ScannerConfig::default())
            .await
            .unwrap();

        assert_eq!(scanner.registry().len(), 2);
        assert_eq!(scanner.last_processed(), None);
    }
}
