//! Wallet Pulse - On-chain wallet intelligence engine
//!
//! Watches a curated set of wallets across chains, classifies their raw
//! transactions into semantic trade events, and runs behavioral detectors
//! over the event history: reload prediction, cabal clustering, contrarian
//! tier analysis, alpha decay, and per-wallet pattern anomalies.

pub mod classify;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod model;
pub mod profile;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
