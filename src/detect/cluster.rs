//! Cluster / cabal detection
//!
//! When several monitored wallets buy the same non-stable asset inside a
//! short trailing window, that is rarely a coincidence. Confidence starts at
//! a timing-only baseline and rises for every clustered wallet that shares a
//! funding source with the trigger, read from the funding graph.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::classify::StableAssets;
use crate::model::{Event, EventKind, Moment, MomentKind};
use crate::store::{MomentSink, Store};

/// Cluster detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Trailing window for same-asset buys.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Minimum participants, including the triggering wallet.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Timing-only baseline confidence (percent).
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    /// Confidence added per clustered wallet sharing a funding source with
    /// the trigger (percentage points).
    #[serde(default = "default_shared_funding_bonus")]
    pub shared_funding_bonus: f64,
}

fn default_window_minutes() -> i64 {
    30
}

fn default_min_cluster_size() -> usize {
    2
}

fn default_base_confidence() -> f64 {
    50.0
}

fn default_shared_funding_bonus() -> f64 {
    15.0
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            min_cluster_size: default_min_cluster_size(),
            base_confidence: default_base_confidence(),
            shared_funding_bonus: default_shared_funding_bonus(),
        }
    }
}

/// A detected buy cluster.
#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub token: String,
    /// Total participants, including the trigger.
    pub cluster_size: usize,
    /// Display names, trigger first, capped at five.
    pub participants: Vec<String>,
    /// 0-100.
    pub confidence: f64,
}

/// Detects coordinated same-asset buying across monitored wallets.
pub struct CabalDetector {
    config: ClusterConfig,
    store: Arc<Store>,
    sink: Arc<MomentSink>,
}

impl CabalDetector {
    pub fn new(config: ClusterConfig, store: Arc<Store>, sink: Arc<MomentSink>) -> Self {
        Self { config, store, sink }
    }

    /// Check a new buy/swap event for cluster membership. Emits a CABAL
    /// moment at maximum severity when a cluster forms. Stable assets never
    /// trigger.
    pub fn on_buy(&self, event: &Event, stables: &StableAssets) -> Option<ClusterResult> {
        let symbol = event.token_symbol.as_deref()?;
        if stables.is_stable(symbol) {
            return None;
        }

        let cutoff = event.timestamp - Duration::minutes(self.config.window_minutes);
        let recent =
            self.store
                .events_for_asset_since(symbol, cutoff, &[EventKind::Buy, EventKind::Swap]);

        // Distinct other wallets, newest activity first.
        let mut others: Vec<String> = Vec::new();
        for e in &recent {
            if e.wallet != event.wallet && !others.contains(&e.wallet) {
                others.push(e.wallet.clone());
            }
        }

        let cluster_size = others.len() + 1;
        if cluster_size < self.config.min_cluster_size {
            return None;
        }

        let confidence = self.cluster_confidence(&event.wallet, &others);

        let mut participants = vec![self.display_name(&event.wallet)];
        participants.extend(others.iter().take(5).map(|w| self.display_name(w)));
        participants.truncate(5);

        let description = format!(
            "CABAL: {cluster_size} wallets bought ${symbol} within {} min ({}; confidence {confidence:.0}%)",
            self.config.window_minutes,
            participants.join(", "),
        );

        info!(
            token = %symbol,
            cluster_size = cluster_size,
            confidence = %format!("{confidence:.0}"),
            "Cabal detected"
        );

        self.sink.emit(Moment {
            wallet: event.wallet.clone(),
            tx_hash: Some(event.tx_hash.clone()),
            kind: MomentKind::Cabal,
            token_symbol: Some(symbol.to_string()),
            description,
            severity: 10,
            detected_at: Utc::now(),
        });

        Some(ClusterResult {
            token: symbol.to_string(),
            cluster_size,
            participants,
            confidence,
        })
    }

    /// Base confidence from timing alone, plus a bonus per clustered wallet
    /// sharing at least one funding source with the trigger, capped at 100.
    fn cluster_confidence(&self, trigger: &str, others: &[String]) -> f64 {
        let my_sources = self.store.funding_sources(trigger);
        if my_sources.is_empty() || others.is_empty() {
            return self.config.base_confidence;
        }

        let shared = others
            .iter()
            .filter(|other| {
                !self
                    .store
                    .funding_sources(other)
                    .is_disjoint(&my_sources)
            })
            .count();

        (self.config.base_confidence + shared as f64 * self.config.shared_funding_bonus).min(100.0)
    }

    fn display_name(&self, address: &str) -> String {
        self.store
            .wallet(address)
            .map(|w| w.name)
            .unwrap_or_else(|| crate::model::short_address(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chain, FundingLink, ReputationTier, Wallet};
    use chrono::{DateTime, Duration, Utc};

    fn wallet(address: &str, name: &str) -> Wallet {
        Wallet {
            address: address.to_string(),
            name: name.to_string(),
            chain: Chain::Sol,
            is_active: true,
            reputation_tier: ReputationTier::U,
        }
    }

    fn buy(wallet: &str, hash: &str, symbol: &str, at: DateTime<Utc>) -> Event {
        Event {
            wallet: wallet.to_string(),
            tx_hash: hash.to_string(),
            chain: Chain::Sol,
            timestamp: at,
            kind: EventKind::Buy,
            token_symbol: Some(symbol.to_string()),
            token_address: Some(format!("mint-{symbol}")),
            amount: 100.0,
            amount_usd: None,
        }
    }

    fn link(source: &str, dest: &str, hash: &str) -> FundingLink {
        FundingLink {
            source_address: source.to_string(),
            dest_wallet: dest.to_string(),
            amount: 1.0,
            tx_hash: hash.to_string(),
            detected_at: Utc::now(),
        }
    }

    fn setup() -> (Arc<Store>, Arc<MomentSink>, CabalDetector) {
        let store = Arc::new(Store::new());
        let sink = Arc::new(MomentSink::new());
        let detector = CabalDetector::new(ClusterConfig::default(), store.clone(), sink.clone());
        for (addr, name) in [("w1", "alice"), ("w2", "bob"), ("w3", "carol")] {
            store.upsert_wallet(wallet(addr, name));
        }
        (store, sink, detector)
    }

    #[test]
    fn test_single_buyer_no_cluster() {
        let (store, sink, detector) = setup();
        let now = Utc::now();
        let e = buy("w1", "tx1", "Z", now);
        store.insert_event(e.clone());

        assert!(detector.on_buy(&e, &StableAssets::for_chain(Chain::Sol, &[])).is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_stable_asset_never_triggers() {
        let (store, _sink, detector) = setup();
        let now = Utc::now();
        store.insert_event(buy("w2", "tx0", "USDC", now));
        let e = buy("w1", "tx1", "USDC", now);
        store.insert_event(e.clone());

        assert!(detector.on_buy(&e, &StableAssets::for_chain(Chain::Sol, &[])).is_none());
    }

    #[test]
    fn test_cluster_without_shared_funding_is_base_confidence() {
        let (store, _sink, detector) = setup();
        let now = Utc::now();
        store.insert_event(buy("w2", "tx0", "Z", now - Duration::minutes(5)));
        let e = buy("w1", "tx1", "Z", now);
        store.insert_event(e.clone());

        let result = detector
            .on_buy(&e, &StableAssets::for_chain(Chain::Sol, &[]))
            .unwrap();
        assert_eq!(result.cluster_size, 2);
        assert!((result.confidence - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_three_wallets_one_shared_source_confidence_65() {
        let (store, sink, detector) = setup();
        let now = Utc::now();

        // w1 and w2 share funding source src1; w3 is funded elsewhere.
        store.insert_funding_link(link("src1", "w1", "f1"));
        store.insert_funding_link(link("src1", "w2", "f2"));
        store.insert_funding_link(link("src2", "w3", "f3"));

        store.insert_event(buy("w2", "tx0", "Z", now - Duration::minutes(8)));
        store.insert_event(buy("w3", "tx2", "Z", now - Duration::minutes(3)));
        let e = buy("w1", "tx1", "Z", now);
        store.insert_event(e.clone());

        let result = detector
            .on_buy(&e, &StableAssets::for_chain(Chain::Sol, &[]))
            .unwrap();
        assert_eq!(result.cluster_size, 3);
        assert!((result.confidence - 65.0).abs() < 1e-9);

        let moments = sink.recent(10);
        assert_eq!(moments.len(), 1);
        assert_eq!(moments[0].kind, MomentKind::Cabal);
        assert_eq!(moments[0].severity, 10);
    }

    #[test]
    fn test_confidence_capped_at_100() {
        let (store, _sink, detector) = setup();
        let now = Utc::now();

        store.insert_funding_link(link("src1", "w1", "f1"));
        let mut others = Vec::new();
        for i in 0..6 {
            let addr = format!("peer{i}");
            store.upsert_wallet(wallet(&addr, &addr));
            store.insert_funding_link(link("src1", &addr, &format!("f-{i}")));
            store.insert_event(buy(&addr, &format!("tx-{i}"), "Z", now - Duration::minutes(2)));
            others.push(addr);
        }
        let e = buy("w1", "tx1", "Z", now);
        store.insert_event(e.clone());

        let result = detector
            .on_buy(&e, &StableAssets::for_chain(Chain::Sol, &[]))
            .unwrap();
        assert!((result.confidence - 100.0).abs() < 1e-9);
        assert!(result.participants.len() <= 5);
    }

    #[test]
    fn test_old_buys_outside_window_ignored() {
        let (store, _sink, detector) = setup();
        let now = Utc::now();
        store.insert_event(buy("w2", "tx0", "Z", now - Duration::minutes(45)));
        let e = buy("w1", "tx1", "Z", now);
        store.insert_event(e.clone());

        assert!(detector.on_buy(&e, &StableAssets::for_chain(Chain::Sol, &[])).is_none());
    }
}
