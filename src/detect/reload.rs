//! Reload prediction
//!
//! A "reload" is a qualifying inbound transfer of native funds to a
//! monitored wallet. Each one is tracked until it either resolves with a
//! buy inside the prediction window or times out. Resolved history feeds a
//! per-wallet probability of "reload then buy" and an average time-to-buy,
//! stored on the profile.
//!
//! State machine per reload: unresolved -> resolved-with-buy | resolved-
//! without-buy, exactly once; repeat transitions are no-ops.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::model::{FundingLink, ReloadEvent, ReloadState};
use crate::store::{reload_followed_by_buy, Store};

/// Reload predictor thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Minimum inbound native amount to qualify as a reload.
    #[serde(default = "default_min_reload_native")]
    pub min_reload_native: f64,

    /// Minutes after detection within which a buy resolves the reload.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Minimum inbound amount to record a funding-graph edge.
    #[serde(default = "default_min_funding_amount")]
    pub min_funding_amount: f64,
}

fn default_min_reload_native() -> f64 {
    5.0
}

fn default_window_minutes() -> i64 {
    120
}

fn default_min_funding_amount() -> f64 {
    0.1
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            min_reload_native: default_min_reload_native(),
            window_minutes: default_window_minutes(),
            min_funding_amount: default_min_funding_amount(),
        }
    }
}

/// Tracks reloads and their resolution.
pub struct ReloadPredictor {
    config: ReloadConfig,
    store: Arc<Store>,
}

impl ReloadPredictor {
    pub fn new(config: ReloadConfig, store: Arc<Store>) -> Self {
        Self { config, store }
    }

    /// Handle an inbound native transfer. Records a funding-graph edge for
    /// any non-dust inflow with a known source, and tracks a reload when the
    /// amount qualifies. Returns whether a new reload was created.
    pub fn on_inflow(
        &self,
        wallet: &str,
        tx_hash: &str,
        amount: f64,
        source: Option<&str>,
        at: DateTime<Utc>,
    ) -> bool {
        if let Some(source) = source {
            if amount >= self.config.min_funding_amount {
                self.store.insert_funding_link(FundingLink {
                    source_address: source.to_string(),
                    dest_wallet: wallet.to_string(),
                    amount,
                    tx_hash: tx_hash.to_string(),
                    detected_at: at,
                });
            }
        }

        if amount < self.config.min_reload_native {
            return false;
        }

        let created = self.store.insert_reload(ReloadEvent {
            wallet: wallet.to_string(),
            tx_hash: tx_hash.to_string(),
            amount,
            source_address: source.map(str::to_string),
            state: ReloadState::Unresolved,
            detected_at: at,
            resolved_at: None,
        });

        if created {
            info!(
                wallet = %wallet,
                amount = %format!("{amount:.2}"),
                "Reload detected"
            );
        }
        created
    }

    /// Resolve open reloads for a wallet against a buy. Every unresolved
    /// reload within the window flips to resolved-with-buy; already-resolved
    /// ones are untouched. Returns the number resolved.
    pub fn on_buy(&self, wallet: &str, buy_tx_hash: &str, at: DateTime<Utc>) -> usize {
        let cutoff = at - Duration::minutes(self.config.window_minutes);
        let open = self.store.unresolved_reloads_for(wallet, cutoff);

        let mut resolved = 0;
        for hash in open {
            let mut flipped = false;
            self.store.with_reload_mut(&hash, |reload| {
                if reload.is_resolved() {
                    return;
                }
                let minutes = (at - reload.detected_at).num_minutes().max(0);
                reload.state = ReloadState::ResolvedWithBuy {
                    minutes,
                    buy_tx_hash: buy_tx_hash.to_string(),
                };
                reload.resolved_at = Some(at);
                flipped = true;
                info!(
                    wallet = %reload.wallet,
                    minutes = minutes,
                    "Reload resolved with buy"
                );
            });
            if flipped {
                resolved += 1;
            }
        }

        if resolved > 0 {
            self.recompute_stats(wallet);
        }
        resolved
    }

    /// Expire unresolved reloads older than the window. Returns the number
    /// expired.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::minutes(self.config.window_minutes);
        let stale = self.store.stale_unresolved_reloads(cutoff);

        let mut expired = 0;
        let mut wallets: Vec<String> = Vec::new();
        for hash in stale {
            self.store.with_reload_mut(&hash, |reload| {
                if reload.is_resolved() {
                    return;
                }
                reload.state = ReloadState::ResolvedWithoutBuy;
                reload.resolved_at = Some(now);
                expired += 1;
                if !wallets.contains(&reload.wallet) {
                    wallets.push(reload.wallet.clone());
                }
            });
        }

        for wallet in &wallets {
            self.recompute_stats(wallet);
        }

        if expired > 0 {
            debug!(count = expired, "Expired stale reloads without buy");
        }
        expired
    }

    /// Recompute aggregate reload statistics onto the wallet's profile.
    fn recompute_stats(&self, wallet: &str) {
        let resolved = self.store.resolved_reloads_for(wallet);
        if resolved.is_empty() {
            return;
        }

        let with_buy: Vec<&ReloadEvent> = resolved
            .iter()
            .filter(|r| reload_followed_by_buy(&r.state))
            .collect();
        let probability = with_buy.len() as f64 / resolved.len() as f64 * 100.0;

        let minutes: Vec<i64> = with_buy
            .iter()
            .filter_map(|r| match &r.state {
                ReloadState::ResolvedWithBuy { minutes, .. } => Some(*minutes),
                _ => None,
            })
            .collect();
        let avg_minutes = if minutes.is_empty() {
            None
        } else {
            Some(minutes.iter().sum::<i64>() / minutes.len() as i64)
        };

        self.store.with_profile_mut(wallet, |p| {
            p.reload_buy_probability = Some(probability);
            p.avg_minutes_to_buy = avg_minutes;
        });

        debug!(
            wallet = %wallet,
            probability = %format!("{probability:.0}%"),
            "Reload prediction stats updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor(store: Arc<Store>) -> ReloadPredictor {
        ReloadPredictor::new(ReloadConfig::default(), store)
    }

    #[test]
    fn test_small_inflow_not_tracked() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());

        assert!(!p.on_inflow("w1", "tx1", 2.0, None, Utc::now()));
        assert!(store.reload("tx1").is_none());
    }

    #[test]
    fn test_small_inflow_still_records_funding_link() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());

        p.on_inflow("w1", "tx1", 0.5, Some("src1"), Utc::now());
        assert!(store.funding_sources("w1").contains("src1"));
        assert!(store.reload("tx1").is_none());
    }

    #[test]
    fn test_inflow_dedup_by_hash() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());

        assert!(p.on_inflow("w1", "tx1", 10.0, None, Utc::now()));
        assert!(!p.on_inflow("w1", "tx1", 10.0, None, Utc::now()));
    }

    #[test]
    fn test_buy_resolves_within_window() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());
        let t0 = Utc::now();

        p.on_inflow("w1", "tx1", 10.0, None, t0);
        let resolved = p.on_buy("w1", "buy1", t0 + Duration::minutes(15));
        assert_eq!(resolved, 1);

        let reload = store.reload("tx1").unwrap();
        match reload.state {
            ReloadState::ResolvedWithBuy { minutes, ref buy_tx_hash } => {
                assert_eq!(minutes, 15);
                assert_eq!(buy_tx_hash, "buy1");
            }
            _ => panic!("expected resolved-with-buy"),
        }

        let profile = store.profile("w1").unwrap();
        assert!((profile.reload_buy_probability.unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(profile.avg_minutes_to_buy, Some(15));
    }

    #[test]
    fn test_buy_outside_window_does_not_resolve() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());
        let t0 = Utc::now();

        p.on_inflow("w1", "tx1", 10.0, None, t0);
        let resolved = p.on_buy("w1", "buy1", t0 + Duration::minutes(121));
        assert_eq!(resolved, 0);
        assert!(!store.reload("tx1").unwrap().is_resolved());
    }

    #[test]
    fn test_resolution_exactly_once() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());
        let t0 = Utc::now();

        p.on_inflow("w1", "tx1", 10.0, None, t0);
        assert_eq!(p.on_buy("w1", "buy1", t0 + Duration::minutes(10)), 1);
        // Second buy finds nothing open; state keeps the first buy hash.
        assert_eq!(p.on_buy("w1", "buy2", t0 + Duration::minutes(20)), 0);

        match store.reload("tx1").unwrap().state {
            ReloadState::ResolvedWithBuy { ref buy_tx_hash, .. } => {
                assert_eq!(buy_tx_hash, "buy1")
            }
            _ => panic!("expected resolved-with-buy"),
        }

        // Sweeping afterwards must not flip the outcome.
        p.sweep(t0 + Duration::minutes(300));
        assert!(reload_followed_by_buy(&store.reload("tx1").unwrap().state));
    }

    #[test]
    fn test_sweep_expires_stale() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());
        let t0 = Utc::now();

        p.on_inflow("w1", "tx1", 10.0, None, t0);
        assert_eq!(p.sweep(t0 + Duration::minutes(121)), 1);
        assert_eq!(
            store.reload("tx1").unwrap().state,
            ReloadState::ResolvedWithoutBuy
        );

        // Expired reload drags the probability down.
        let profile = store.profile("w1").unwrap();
        assert!((profile.reload_buy_probability.unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_history_probability() {
        let store = Arc::new(Store::new());
        let p = predictor(store.clone());
        let t0 = Utc::now() - Duration::hours(10);

        p.on_inflow("w1", "tx1", 10.0, None, t0);
        p.on_buy("w1", "buy1", t0 + Duration::minutes(30));
        p.on_inflow("w1", "tx2", 10.0, None, t0 + Duration::hours(1));
        p.sweep(t0 + Duration::hours(4));

        let profile = store.profile("w1").unwrap();
        assert!((profile.reload_buy_probability.unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(profile.avg_minutes_to_buy, Some(30));
    }
}
