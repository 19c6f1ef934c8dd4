//! Wallet profiling
//!
//! Recomputes a wallet's rolling statistical fingerprint from its most
//! recent events: trade-size averages, realized win rate from matched
//! buy/sell pairs, average hold time and a trading-style label. Called after
//! every new event; recomputation from the window makes it idempotent.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Event, EventKind, Profile, TradingStyle};
use crate::store::Store;

/// Profiler thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Number of recent events the rolling profile is computed over.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Average hold below this many hours classifies as sniper.
    #[serde(default = "default_sniper_hold_hours")]
    pub sniper_hold_hours: f64,

    /// Average hold below this many hours classifies as trader; above it,
    /// holder.
    #[serde(default = "default_holder_hold_hours")]
    pub holder_hold_hours: f64,
}

fn default_window() -> usize {
    50
}

fn default_sniper_hold_hours() -> f64 {
    24.0
}

fn default_holder_hold_hours() -> f64 {
    168.0
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            sniper_hold_hours: default_sniper_hold_hours(),
            holder_hold_hours: default_holder_hold_hours(),
        }
    }
}

/// Outcome of matching one buy to its earliest subsequent exit.
#[derive(Debug, Clone, Copy)]
struct TradeOutcome {
    is_win: Option<bool>,
    hold_hours: f64,
}

/// Recomputes rolling wallet statistics.
pub struct Profiler {
    config: ProfilerConfig,
}

impl Profiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    /// Recompute the profile for a wallet from its recent event window and
    /// persist it. Returns the updated snapshot, or None when the wallet has
    /// no events yet. Detector-owned fields (alpha, reload stats) are left
    /// untouched.
    pub fn update(&self, store: &Store, wallet: &str) -> Option<Profile> {
        let recent = store.recent_events(wallet, self.config.window);
        if recent.is_empty() {
            return None;
        }

        // Chronological order for pair matching.
        let mut events: Vec<Event> = recent;
        events.reverse();

        let amounts: Vec<f64> = events
            .iter()
            .filter(|e| e.kind != EventKind::Unknown && e.amount > 0.0)
            .map(|e| e.amount)
            .collect();

        let avg_trade_size = if amounts.is_empty() {
            0.0
        } else {
            amounts.iter().sum::<f64>() / amounts.len() as f64
        };
        let max_trade_size = amounts.iter().fold(0.0_f64, |acc, a| acc.max(*a));

        let outcomes = match_trades(&events);
        let wins = outcomes.iter().filter(|o| o.is_win == Some(true)).count();
        let resolved = outcomes.iter().filter(|o| o.is_win.is_some()).count();
        let win_rate = if resolved > 0 {
            Some(wins as f64 / resolved as f64 * 100.0)
        } else {
            None
        };

        let avg_hold_hours = if outcomes.is_empty() {
            None
        } else {
            Some(outcomes.iter().map(|o| o.hold_hours).sum::<f64>() / outcomes.len() as f64)
        };

        let style = self.classify_style(avg_hold_hours);
        let total_events = events.len() as u32;
        let trades_analyzed = outcomes.len() as u32;

        let profile = store.with_profile_mut(wallet, |p| {
            p.avg_trade_size = avg_trade_size;
            p.max_trade_size = max_trade_size;
            p.total_events = total_events;
            p.win_rate = win_rate;
            p.trades_analyzed = trades_analyzed;
            p.avg_hold_hours = avg_hold_hours;
            p.style = style;
        });

        debug!(
            wallet = %wallet,
            avg = %format!("{avg_trade_size:.2}"),
            max = %format!("{max_trade_size:.2}"),
            trades = trades_analyzed,
            style = ?style,
            "Profile updated"
        );

        Some(profile)
    }

    fn classify_style(&self, avg_hold_hours: Option<f64>) -> TradingStyle {
        match avg_hold_hours {
            None => TradingStyle::Unknown,
            Some(h) if h < self.config.sniper_hold_hours => TradingStyle::Sniper,
            Some(h) if h < self.config.holder_hold_hours => TradingStyle::Trader,
            Some(_) => TradingStyle::Holder,
        }
    }
}

/// Match each BUY to the earliest subsequent SELL/SWAP of the same asset.
/// A pair with USD values on both legs resolves to win or loss; without
/// them it still contributes hold time.
fn match_trades(events: &[Event]) -> Vec<TradeOutcome> {
    let mut outcomes = Vec::new();

    for (i, buy) in events.iter().enumerate() {
        if buy.kind != EventKind::Buy {
            continue;
        }
        let Some(token) = buy.token_address.as_deref() else {
            continue;
        };

        let exit = events[i + 1..].iter().find(|e| {
            matches!(e.kind, EventKind::Sell | EventKind::Swap)
                && e.token_address.as_deref() == Some(token)
                && e.timestamp > buy.timestamp
        });

        if let Some(exit) = exit {
            let hold_hours = (exit.timestamp - buy.timestamp).num_seconds() as f64 / 3600.0;
            let is_win = match (buy.amount_usd, exit.amount_usd) {
                (Some(cost), Some(proceeds)) if cost > 0.0 => Some(proceeds > cost),
                _ => None,
            };
            outcomes.push(TradeOutcome { is_win, hold_hours });
        }
    }

    outcomes
}
