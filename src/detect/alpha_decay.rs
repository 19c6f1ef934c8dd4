//! Alpha decay tracking
//!
//! Measures how crowded a wallet's signal is: when it leads into a token,
//! how many other monitored wallets pile in within minutes. Copier counts
//! feed an exponential moving average per wallet, and the alpha score decays
//! from 100 as the average rises. A low score means the wallet's trades are
//! copied too fast to leave edge for followers.
//!
//! Copiers arrive after the lead buy by definition, so leads are queued and
//! settled once their copy window has fully elapsed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::Mutex;
use tracing::debug;

use crate::classify::StableAssets;
use crate::model::{Event, EventKind, Profile};
use crate::store::Store;

/// Alpha decay thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaDecayConfig {
    /// Seconds after a lead buy within which a same-asset buy counts as a
    /// copy.
    #[serde(default = "default_copy_window_secs")]
    pub copy_window_secs: i64,

    /// Alpha points lost per average copier.
    #[serde(default = "default_decay_per_copier")]
    pub decay_per_copier: f64,

    /// EMA weight for the newest observation.
    #[serde(default = "default_ema_weight")]
    pub ema_weight: f64,

    /// Scores below this are considered crowded.
    #[serde(default = "default_crowded_threshold")]
    pub crowded_threshold: f64,
}

fn default_copy_window_secs() -> i64 {
    300
}

fn default_decay_per_copier() -> f64 {
    5.0
}

fn default_ema_weight() -> f64 {
    0.3
}

fn default_crowded_threshold() -> f64 {
    70.0
}

impl Default for AlphaDecayConfig {
    fn default() -> Self {
        Self {
            copy_window_secs: default_copy_window_secs(),
            decay_per_copier: default_decay_per_copier(),
            ema_weight: default_ema_weight(),
            crowded_threshold: default_crowded_threshold(),
        }
    }
}

/// A lead buy awaiting its copy window to elapse.
#[derive(Debug, Clone)]
struct PendingLead {
    wallet: String,
    symbol: String,
    timestamp: DateTime<Utc>,
}

/// Tracks copier-driven alpha decay per wallet.
pub struct AlphaDecayTracker {
    config: AlphaDecayConfig,
    store: Arc<Store>,
    pending: Mutex<Vec<PendingLead>>,
}

impl AlphaDecayTracker {
    pub fn new(config: AlphaDecayConfig, store: Arc<Store>) -> Self {
        Self {
            config,
            store,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue a buy/swap as a lead to be scored once its copy window closes.
    /// Stable assets carry no signal and are skipped.
    pub fn note_lead(&self, event: &Event, stables: &StableAssets) {
        let Some(symbol) = event.token_symbol.as_deref() else {
            return;
        };
        if stables.is_stable(symbol) || !event.kind.is_acquisition() {
            return;
        }
        let mut pending = self.pending.lock().expect("alpha pending lock poisoned");
        pending.push(PendingLead {
            wallet: event.wallet.clone(),
            symbol: symbol.to_string(),
            timestamp: event.timestamp,
        });
    }

    /// Count distinct other wallets that bought the asset within the copy
    /// window after the lead buy.
    pub fn on_lead_buy(&self, wallet: &str, symbol: &str, at: DateTime<Utc>) -> usize {
        let window_end = at + Duration::seconds(self.config.copy_window_secs);
        let copies = self
            .store
            .events_for_asset_since(symbol, at, &[EventKind::Buy, EventKind::Swap]);

        let mut copiers: Vec<&str> = Vec::new();
        for event in &copies {
            if event.wallet != wallet
                && event.timestamp > at
                && event.timestamp <= window_end
                && !copiers.contains(&event.wallet.as_str())
            {
                copiers.push(&event.wallet);
            }
        }
        copiers.len()
    }

    /// Fold a new copier observation into the wallet's EMA and recompute
    /// its alpha score. Returns the new score.
    pub fn update_score(&self, wallet: &str, copier_count: usize) -> f64 {
        let weight = self.config.ema_weight;
        let decay = self.config.decay_per_copier;
        let profile = self.store.with_profile_mut(wallet, |p| {
            let new_avg = weight * copier_count as f64 + (1.0 - weight) * p.avg_copiers_per_trade;
            p.avg_copiers_per_trade = new_avg;
            p.alpha_score = (100.0 - new_avg * decay).clamp(0.0, 100.0);
        });

        debug!(
            wallet = %wallet,
            copiers = copier_count,
            alpha = %format!("{:.0}", profile.alpha_score),
            "Alpha score updated"
        );
        profile.alpha_score
    }

    /// Score and drain all pending leads whose copy window has elapsed.
    /// Returns the number settled.
    pub fn settle(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<PendingLead> = {
            let mut pending = self.pending.lock().expect("alpha pending lock poisoned");
            let window = Duration::seconds(self.config.copy_window_secs);
            let (ready, waiting): (Vec<PendingLead>, Vec<PendingLead>) = pending
                .drain(..)
                .partition(|lead| now - lead.timestamp >= window);
            *pending = waiting;
            ready
        };

        for lead in &due {
            let copiers = self.on_lead_buy(&lead.wallet, &lead.symbol, lead.timestamp);
            self.update_score(&lead.wallet, copiers);
        }
        due.len()
    }

    /// Wallets ranked by alpha score, highest (least crowded) first.
    pub fn leaderboard(&self, limit: usize) -> Vec<Profile> {
        let mut profiles = self.store.profiles_snapshot();
        profiles.sort_by(|a, b| {
            b.alpha_score
                .partial_cmp(&a.alpha_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        profiles.truncate(limit);
        profiles
    }

    /// Wallets below the crowded threshold, most crowded first.
    pub fn most_crowded(&self, limit: usize) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self
            .store
            .profiles_snapshot()
            .into_iter()
            .filter(|p| p.alpha_score < self.config.crowded_threshold)
            .collect();
        profiles.sort_by(|a, b| {
            a.alpha_score
                .partial_cmp(&b.alpha_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        profiles.truncate(limit);
        profiles
    }
}
