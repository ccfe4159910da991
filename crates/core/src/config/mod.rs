//! Configuration for the absorb bot.
//!
//! Endpoint and key selection live in the binary; this module holds the
//! runtime knobs of the poll loop and the history scan.

mod bot;

pub use bot::{
    BotConfig, ConfigError, HistoryConfig, ScannerTimingConfig, BOT_CONFIG_ENV, LOOP_DELAY_ENV,
};
