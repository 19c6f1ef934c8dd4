//! Transaction ingestion
//!
//! One `ChainIngestor` per chain polls its monitored wallets on a fixed
//! interval, normalizes each new transaction into balance deltas, classifies
//! it, and hands the persisted event to the profiler and detectors. Sources
//! are trait objects so scans can run against live RPC, a replay file, or
//! test doubles without touching the loop.

pub mod fetcher;
pub mod price;
pub mod resolver;

pub use fetcher::ReplayFetcher;
pub use price::{JupiterPriceResolver, NullPriceResolver};
pub use resolver::{CachingSymbolResolver, StaticSymbolResolver};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{classify, AssetChange, ClassifierConfig};
use crate::config::ChainScheduleConfig;
use crate::detect::DetectorSet;
use crate::error::{Error, Result};
use crate::model::{Chain, Event, EventKind, RawTransaction, Wallet};
use crate::profile::Profiler;
use crate::store::Store;

const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Source of raw transactions for a wallet, newest first.
#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    async fn fetch(&self, wallet: &Wallet) -> Result<Vec<RawTransaction>>;
}

/// Maps chain asset ids to display symbols.
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    async fn resolve(&self, chain: Chain, asset_id: &str) -> Result<Option<String>>;
}

/// USD valuation for an asset amount.
#[async_trait]
pub trait PriceResolver: Send + Sync {
    async fn usd_value(&self, chain: Chain, symbol: &str, amount: f64) -> Result<Option<f64>>;
}

/// The scan loop for one chain.
pub struct ChainIngestor {
    chain: Chain,
    schedule: ChainScheduleConfig,
    classifier: ClassifierConfig,
    store: Arc<Store>,
    profiler: Arc<Profiler>,
    detectors: Arc<DetectorSet>,
    fetcher: Arc<dyn TransactionFetcher>,
    symbols: Arc<dyn SymbolResolver>,
    prices: Arc<dyn PriceResolver>,
}

impl ChainIngestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Chain,
        schedule: ChainScheduleConfig,
        classifier: ClassifierConfig,
        store: Arc<Store>,
        profiler: Arc<Profiler>,
        detectors: Arc<DetectorSet>,
        fetcher: Arc<dyn TransactionFetcher>,
        symbols: Arc<dyn SymbolResolver>,
        prices: Arc<dyn PriceResolver>,
    ) -> Self {
        Self {
            chain,
            schedule,
            classifier,
            store,
            profiler,
            detectors,
            fetcher,
            symbols,
            prices,
        }
    }

    /// Poll until cancelled. The first cycle runs immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.schedule.scan_interval_secs);
        info!(
            chain = %self.chain,
            interval_secs = self.schedule.scan_interval_secs,
            "Ingestor started"
        );

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(chain = %self.chain, "Ingestor stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Scan every active wallet once, then run the time-based detectors.
    /// Per-wallet failures are logged and skipped; the cycle always
    /// completes.
    pub async fn run_cycle(&self) {
        let wallets = self.store.active_wallets(self.chain);
        let mut new_events = 0usize;

        for wallet in &wallets {
            match self.scan_wallet(wallet).await {
                Ok(count) => new_events += count,
                Err(e) => {
                    if e.is_retryable() {
                        warn!(chain = %self.chain, wallet = %wallet.name, error = %e, "Scan failed; will retry next cycle");
                    } else {
                        error!(chain = %self.chain, wallet = %wallet.name, error = %e, "Scan failed");
                    }
                }
            }
        }

        self.detectors.finish_cycle(chrono::Utc::now());
        if new_events > 0 {
            info!(chain = %self.chain, events = new_events, "Scan cycle complete");
        } else {
            debug!(chain = %self.chain, wallets = wallets.len(), "Scan cycle complete; no new events");
        }
    }

    async fn scan_wallet(&self, wallet: &Wallet) -> Result<usize> {
        let timeout = Duration::from_secs(self.schedule.tx_timeout_secs);
        let transactions = tokio::time::timeout(timeout, self.fetcher.fetch(wallet))
            .await
            .map_err(|_| Error::FetchTimeout(self.schedule.tx_timeout_secs))??;

        let mut inserted = 0;
        // Oldest first so history-sensitive detectors see events in order.
        for tx in transactions.iter().rev() {
            if self.process_transaction(wallet, tx).await? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Normalize, classify, persist, and detect. Returns whether the
    /// transaction produced a new event.
    pub async fn process_transaction(
        &self,
        wallet: &Wallet,
        tx: &RawTransaction,
    ) -> Result<bool> {
        if self.store.has_event(&tx.hash) {
            return Ok(false);
        }

        let mut changes = Vec::with_capacity(tx.asset_deltas.len());
        for delta in &tx.asset_deltas {
            let change = delta.delta();
            if !change.is_finite() || change.abs() <= self.classifier.token_dust {
                continue;
            }
            let symbol = match self.symbols.resolve(self.chain, &delta.asset_id).await {
                Ok(Some(symbol)) => symbol,
                Ok(None) => UNKNOWN_SYMBOL.to_string(),
                Err(e) => {
                    debug!(asset = %delta.asset_id, error = %e, "Symbol resolution failed");
                    UNKNOWN_SYMBOL.to_string()
                }
            };
            changes.push(AssetChange {
                asset_id: delta.asset_id.clone(),
                symbol,
                delta: change,
            });
        }

        let stables = self.detectors.stables(self.chain);
        let classified = classify(tx.native_delta, &changes, stables, &self.classifier);

        let amount_usd = match &classified.token_symbol {
            Some(symbol) if classified.amount > 0.0 => {
                match self
                    .prices
                    .usd_value(self.chain, symbol, classified.amount)
                    .await
                {
                    Ok(value) => value,
                    Err(e) => {
                        debug!(symbol = %symbol, error = %e, "Price lookup failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let event = Event {
            wallet: wallet.address.clone(),
            tx_hash: tx.hash.clone(),
            chain: self.chain,
            timestamp: tx.timestamp,
            kind: classified.kind,
            token_symbol: classified.token_symbol,
            token_address: classified.token_address,
            amount: classified.amount,
            amount_usd,
        };

        if !self.store.insert_event(event.clone()) {
            return Ok(false);
        }

        debug!(
            wallet = %wallet.name,
            kind = %event.kind,
            token = event.token_symbol.as_deref().unwrap_or("-"),
            "Event recorded"
        );

        // Profile first so detectors compare against up-to-date baselines.
        self.profiler.update(&self.store, &wallet.address);
        if event.kind != EventKind::Unknown {
            self.detectors
                .process(&event, tx.native_delta, tx.counterparty.as_deref());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectorConfig;
    use crate::model::{RawAssetDelta, ReputationTier};
    use crate::profile::ProfilerConfig;
    use crate::store::MomentSink;
    use chrono::Utc;
    use std::collections::HashMap;

    struct StaticFetcher {
        by_wallet: HashMap<String, Vec<RawTransaction>>,
    }

    #[async_trait]
    impl TransactionFetcher for StaticFetcher {
        async fn fetch(&self, wallet: &Wallet) -> Result<Vec<RawTransaction>> {
            Ok(self
                .by_wallet
                .get(&wallet.address)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn wallet(address: &str) -> Wallet {
        Wallet {
            address: address.to_string(),
            name: address.to_string(),
            chain: Chain::Sol,
            is_active: true,
            reputation_tier: ReputationTier::U,
        }
    }

    fn ingestor(
        store: Arc<Store>,
        by_wallet: HashMap<String, Vec<RawTransaction>>,
    ) -> ChainIngestor {
        let sink = Arc::new(MomentSink::new());
        let classifier = ClassifierConfig::default();
        let detectors = Arc::new(DetectorSet::new(
            DetectorConfig::default(),
            &classifier,
            store.clone(),
            sink,
        ));
        let mut tokens = HashMap::new();
        tokens.insert("mint-zap".to_string(), "ZAP".to_string());
        ChainIngestor::new(
            Chain::Sol,
            ChainScheduleConfig {
                scan_interval_secs: 30,
                tx_timeout_secs: 5,
            },
            classifier,
            store,
            Arc::new(Profiler::new(ProfilerConfig::default())),
            detectors,
            Arc::new(StaticFetcher { by_wallet }),
            Arc::new(StaticSymbolResolver::new(tokens)),
            Arc::new(NullPriceResolver),
        )
    }

    fn buy_tx(hash: &str) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            timestamp: Utc::now(),
            native_delta: -1.5,
            asset_deltas: vec![RawAssetDelta {
                asset_id: "mint-zap".to_string(),
                pre_amount: 0.0,
                post_amount: 500.0,
            }],
            counterparty: None,
        }
    }

    #[tokio::test]
    async fn test_cycle_persists_and_classifies() {
        let store = Arc::new(Store::new());
        store.upsert_wallet(wallet("w1"));
        let mut txs = HashMap::new();
        txs.insert("w1".to_string(), vec![buy_tx("tx1")]);

        let ing = ingestor(store.clone(), txs);
        ing.run_cycle().await;

        let events = store.recent_events("w1", 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Buy);
        assert_eq!(events[0].token_symbol.as_deref(), Some("ZAP"));
        assert!((events[0].amount - 500.0).abs() < 1e-9);

        // The profile is built in the same pass.
        assert!(store.profile("w1").is_some());
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let store = Arc::new(Store::new());
        store.upsert_wallet(wallet("w1"));
        let mut txs = HashMap::new();
        txs.insert("w1".to_string(), vec![buy_tx("tx1")]);

        let ing = ingestor(store.clone(), txs);
        ing.run_cycle().await;
        ing.run_cycle().await;

        assert_eq!(store.recent_events("w1", 10).len(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_symbol_falls_back() {
        let store = Arc::new(Store::new());
        store.upsert_wallet(wallet("w1"));
        let tx = RawTransaction {
            hash: "tx1".to_string(),
            timestamp: Utc::now(),
            native_delta: -1.5,
            asset_deltas: vec![RawAssetDelta {
                asset_id: "mint-mystery".to_string(),
                pre_amount: 0.0,
                post_amount: 42.0,
            }],
            counterparty: None,
        };
        let mut txs = HashMap::new();
        txs.insert("w1".to_string(), vec![tx]);

        let ing = ingestor(store.clone(), txs);
        ing.run_cycle().await;

        let events = store.recent_events("w1", 10);
        assert_eq!(events[0].token_symbol.as_deref(), Some("UNKNOWN"));
        assert_eq!(events[0].kind, EventKind::Buy);
    }

    #[tokio::test]
    async fn test_inactive_wallets_not_scanned() {
        let store = Arc::new(Store::new());
        let mut w = wallet("w1");
        w.is_active = false;
        store.upsert_wallet(w);
        let mut txs = HashMap::new();
        txs.insert("w1".to_string(), vec![buy_tx("tx1")]);

        let ing = ingestor(store.clone(), txs);
        ing.run_cycle().await;

        assert!(store.recent_events("w1", 10).is_empty());
    }

    #[tokio::test]
    async fn test_dust_only_transaction_is_unknown() {
        let store = Arc::new(Store::new());
        store.upsert_wallet(wallet("w1"));
        let tx = RawTransaction {
            hash: "tx1".to_string(),
            timestamp: Utc::now(),
            native_delta: 0.0001,
            asset_deltas: Vec::new(),
            counterparty: None,
        };
        let mut txs = HashMap::new();
        txs.insert("w1".to_string(), vec![tx]);

        let ing = ingestor(store.clone(), txs);
        ing.run_cycle().await;

        let events = store.recent_events("w1", 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Unknown);
    }
}
