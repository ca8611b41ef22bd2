//! mlaudit: audits whether a trading bot's ML subsystem is wired to live
//! exchange data. Read-only over the bot's store; optionally samples live
//! exchange tickers for a consistency check.

pub mod checks;
pub mod config;
pub mod context;
pub mod exchange;
pub mod orchestrator;
pub mod render;
pub mod scoring;
pub mod store;
