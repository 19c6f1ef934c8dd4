//! Contrarian signal engine
//!
//! Partitions recent activity on an asset by the acting wallet's reputation
//! tier and reads it against the grain: heavy tier-C buying is exit
//! liquidity forming, and tier-A selling into that demand is the strongest
//! signal available. Signals are independent and can fire simultaneously
//! for the same window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::classify::StableAssets;
use crate::model::{Event, EventKind, Moment, MomentKind, ReputationTier};
use crate::store::{MomentSink, Store};

/// Contrarian engine thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContrarianConfig {
    /// Lookback window for tier activity.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,

    /// Minimum tier-C buyers for an accumulation warning.
    #[serde(default = "default_min_tier_c_buyers")]
    pub min_tier_c_buyers: usize,
}

fn default_window_minutes() -> i64 {
    60
}

fn default_min_tier_c_buyers() -> usize {
    2
}

impl Default for ContrarianConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            min_tier_c_buyers: default_min_tier_c_buyers(),
        }
    }
}

/// Signal strength labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalSeverity {
    Medium,
    High,
    Critical,
}

impl SignalSeverity {
    /// Moment severity on the 1-10 scale.
    pub fn score(&self) -> u8 {
        match self {
            SignalSeverity::Critical => 10,
            SignalSeverity::Medium | SignalSeverity::High => 7,
        }
    }
}

/// One contrarian signal for an asset.
#[derive(Debug, Clone)]
pub struct ContrarianSignal {
    pub kind: MomentKind,
    pub severity: SignalSeverity,
    pub token: String,
    pub message: String,
}

/// Reputation-tier contrarian analysis.
pub struct ContrarianEngine {
    config: ContrarianConfig,
    store: Arc<Store>,
    sink: Arc<MomentSink>,
}

impl ContrarianEngine {
    pub fn new(config: ContrarianConfig, store: Arc<Store>, sink: Arc<MomentSink>) -> Self {
        Self { config, store, sink }
    }

    /// Analyze recent activity on an asset by reputation tier. Pure read;
    /// emits nothing.
    pub fn analyze(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        stables: &StableAssets,
    ) -> Vec<ContrarianSignal> {
        if stables.is_stable(symbol) {
            return Vec::new();
        }

        let cutoff = now - Duration::minutes(self.config.window_minutes);
        let activity = self.store.events_for_asset_since(
            symbol,
            cutoff,
            &[EventKind::Buy, EventKind::Swap, EventKind::Sell],
        );
        if activity.is_empty() {
            return Vec::new();
        }

        let mut tier_a_buys: Vec<String> = Vec::new();
        let mut tier_a_sells: Vec<String> = Vec::new();
        let mut tier_c_buys: Vec<String> = Vec::new();

        for event in &activity {
            let tier = self
                .store
                .wallet(&event.wallet)
                .map(|w| w.reputation_tier)
                .unwrap_or_default();
            let name = self.display_name(&event.wallet);
            match (tier, event.kind) {
                (ReputationTier::A, EventKind::Buy | EventKind::Swap) => tier_a_buys.push(name),
                (ReputationTier::A, EventKind::Sell) => tier_a_sells.push(name),
                (ReputationTier::C, EventKind::Buy | EventKind::Swap) => tier_c_buys.push(name),
                _ => {}
            }
        }

        let mut signals = Vec::new();

        if tier_c_buys.len() >= self.config.min_tier_c_buyers {
            signals.push(ContrarianSignal {
                kind: MomentKind::ContrarianScammerAccumulation,
                severity: SignalSeverity::High,
                token: symbol.to_string(),
                message: format!(
                    "{} known bad actors buying ${symbol} ({}); likely exit liquidity",
                    tier_c_buys.len(),
                    tier_c_buys
                        .iter()
                        .take(3)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            });
        }

        if !tier_a_sells.is_empty() && !tier_c_buys.is_empty() {
            signals.push(ContrarianSignal {
                kind: MomentKind::ContrarianSmartMoneyExit,
                severity: SignalSeverity::Critical,
                token: symbol.to_string(),
                message: format!(
                    "Smart money selling ${symbol} ({}) while bad actors buy ({})",
                    tier_a_sells
                        .iter()
                        .take(2)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                    tier_c_buys
                        .iter()
                        .take(2)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            });
        }

        if !tier_c_buys.is_empty() && tier_a_buys.is_empty() && tier_a_sells.is_empty() {
            signals.push(ContrarianSignal {
                kind: MomentKind::ContrarianScammerOnly,
                severity: SignalSeverity::Medium,
                token: symbol.to_string(),
                message: format!("Only tier-C wallets active on ${symbol}; no smart money interest"),
            });
        }

        signals
    }

    /// Run the analysis for an event's asset and persist each qualifying
    /// signal as a Moment attributed to the acting wallet.
    pub fn on_activity(&self, event: &Event, stables: &StableAssets) -> Vec<ContrarianSignal> {
        let Some(symbol) = event.token_symbol.as_deref() else {
            return Vec::new();
        };
        let signals = self.analyze(symbol, event.timestamp, stables);

        for signal in &signals {
            warn!(
                kind = %signal.kind,
                token = %signal.token,
                severity = ?signal.severity,
                "Contrarian signal"
            );
            self.sink.emit(Moment {
                wallet: event.wallet.clone(),
                tx_hash: Some(event.tx_hash.clone()),
                kind: signal.kind,
                token_symbol: Some(signal.token.clone()),
                description: signal.message.clone(),
                severity: signal.severity.score(),
                detected_at: Utc::now(),
            });
        }

        signals
    }

    fn display_name(&self, address: &str) -> String {
        self.store
            .wallet(address)
            .map(|w| w.name)
            .unwrap_or_else(|| crate::model::short_address(address))
    }
}
