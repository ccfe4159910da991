//! Runtime configuration for the absorb bot.
//!
//! Defaults cover everything; a TOML file (path in `BOT_CONFIG`) and the
//! `LOOP_DELAY_MS` variable can override them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use comet_liquidator_chain::HistoryRange;

/// Environment variable holding the path of an optional TOML config file.
pub const BOT_CONFIG_ENV: &str = "BOT_CONFIG";

/// Environment variable overriding `scanner.loop_delay_ms`.
pub const LOOP_DELAY_ENV: &str = "LOOP_DELAY_MS";

/// Configuration problems detected before the bot starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("scanner.loop_delay_ms must be greater than zero")]
    ZeroLoopDelay,
    #[error("history.log_chunk_size must be greater than zero when set")]
    ZeroChunkSize,
    #[error("invalid value {value:?} for {name}")]
    InvalidOverride { name: &'static str, value: String },
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Poll loop timing
    #[serde(default)]
    pub scanner: ScannerTimingConfig,

    /// Withdraw history scan used to seed the registry
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Poll loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerTimingConfig {
    /// Idle wait when no new block has arrived (milliseconds)
    #[serde(default = "default_loop_delay")]
    pub loop_delay_ms: u64,
}

fn default_loop_delay() -> u64 {
    5000
}

impl Default for ScannerTimingConfig {
    fn default() -> Self {
        Self {
            loop_delay_ms: default_loop_delay(),
        }
    }
}

impl ScannerTimingConfig {
    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }
}

/// Withdraw history scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// First block to scan (0 = genesis)
    #[serde(default)]
    pub from_block: u64,

    /// Blocks per `eth_getLogs` request; unset = one unbounded request
    #[serde(default)]
    pub log_chunk_size: Option<u64>,
}

impl HistoryConfig {
    pub fn range(&self) -> HistoryRange {
        HistoryRange {
            from_block: self.from_block,
            chunk_size: self.log_chunk_size,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerTimingConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from `BOT_CONFIG` (or defaults), apply `LOOP_DELAY_MS`, validate.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var(BOT_CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)
                .map_err(|e| anyhow::anyhow!("failed to load {path}: {e}"))?,
            Err(_) => Self::default(),
        };

        config.apply_loop_delay_override(std::env::var(LOOP_DELAY_ENV).ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a `LOOP_DELAY_MS` style override, if one is given.
    pub fn apply_loop_delay_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        let Some(raw) = value else {
            return Ok(());
        };
        self.scanner.loop_delay_ms =
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    name: LOOP_DELAY_ENV,
                    value: raw.to_string(),
                })?;
        Ok(())
    }

    /// Reject values that would make the loop spin or the history scan stall.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.loop_delay_ms == 0 {
            return Err(ConfigError::ZeroLoopDelay);
        }
        if self.history.log_chunk_size == Some(0) {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            loop_delay_ms = self.scanner.loop_delay_ms,
            "Scanner timing"
        );
        tracing::info!(
            from_block = self.history.from_block,
            log_chunk_size = ?self.history.log_chunk_size,
            "Withdraw history scan"
        );
    }
}
