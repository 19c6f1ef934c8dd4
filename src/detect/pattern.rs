//! Behavioral pattern detection
//!
//! Per-wallet anomaly checks against the learned profile: outsized trades
//! relative to the wallet's own average, repeated buys of the same token,
//! and first-ever entries. First matching rule wins; a wallet still
//! building its profile produces nothing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::model::{Event, Moment, MomentKind};
use crate::store::{MomentSink, Store};

/// Pattern engine thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Trade at or above this multiple of the wallet's average is a whale
    /// move.
    #[serde(default = "default_whale_multiple")]
    pub whale_multiple: f64,

    /// Trade at or above this multiple is merely above average.
    #[serde(default = "default_above_avg_multiple")]
    pub above_avg_multiple: f64,

    /// Same-token buys within the lookback that count as accumulation.
    #[serde(default = "default_accumulation_count")]
    pub accumulation_count: usize,

    /// Recent events examined for accumulation.
    #[serde(default = "default_accumulation_lookback")]
    pub accumulation_lookback: usize,
}

fn default_whale_multiple() -> f64 {
    3.0
}

fn default_above_avg_multiple() -> f64 {
    2.0
}

fn default_accumulation_count() -> usize {
    3
}

fn default_accumulation_lookback() -> usize {
    5
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            whale_multiple: default_whale_multiple(),
            above_avg_multiple: default_above_avg_multiple(),
            accumulation_count: default_accumulation_count(),
            accumulation_lookback: default_accumulation_lookback(),
        }
    }
}

/// Profile-relative behavior checks.
pub struct PatternEngine {
    config: PatternConfig,
    store: Arc<Store>,
    sink: Arc<MomentSink>,
}

impl PatternEngine {
    pub fn new(config: PatternConfig, store: Arc<Store>, sink: Arc<MomentSink>) -> Self {
        Self { config, store, sink }
    }

    /// Check one new event against the wallet's profile and history.
    /// Returns the emitted moment kind, if any.
    pub fn on_event(&self, event: &Event) -> Option<MomentKind> {
        if let Some(kind) = self.check_size_anomaly(event) {
            return Some(kind);
        }
        if let Some(kind) = self.check_accumulation(event) {
            return Some(kind);
        }
        self.check_new_token(event)
    }

    /// Deviation from the wallet's own average trade size. No profile yet
    /// means no baseline to deviate from.
    fn check_size_anomaly(&self, event: &Event) -> Option<MomentKind> {
        if event.amount <= 0.0 {
            return None;
        }
        let profile = self.store.profile(&event.wallet)?;
        if profile.avg_trade_size <= 0.0 {
            return None;
        }

        let deviation = event.amount / profile.avg_trade_size;
        let pct = (deviation - 1.0) * 100.0;
        let symbol = event.token_symbol.as_deref().unwrap_or("units");

        if deviation >= self.config.whale_multiple {
            self.emit(
                event,
                MomentKind::WhaleMove,
                9,
                format!(
                    "Whale move: {:.2} {symbol}, +{pct:.0}% vs avg {:.2}",
                    event.amount, profile.avg_trade_size
                ),
            );
            return Some(MomentKind::WhaleMove);
        }
        if deviation >= self.config.above_avg_multiple {
            self.emit(
                event,
                MomentKind::AboveAverage,
                6,
                format!(
                    "Above average: {:.2} {symbol}, +{pct:.0}% vs avg {:.2}",
                    event.amount, profile.avg_trade_size
                ),
            );
            return Some(MomentKind::AboveAverage);
        }
        None
    }

    /// Repeated buys of the same token within the recent history.
    fn check_accumulation(&self, event: &Event) -> Option<MomentKind> {
        if !event.kind.is_acquisition() {
            return None;
        }
        let symbol = event.token_symbol.as_deref()?;

        let history = self
            .store
            .recent_events(&event.wallet, self.config.accumulation_lookback);
        let matches = history
            .iter()
            .filter(|e| e.kind.is_acquisition() && e.token_symbol.as_deref() == Some(symbol))
            .count();

        if matches >= self.config.accumulation_count {
            self.emit(
                event,
                MomentKind::Accumulation,
                8,
                format!("Accumulation: {matches} recent buys of ${symbol}"),
            );
            return Some(MomentKind::Accumulation);
        }
        None
    }

    /// First time this wallet touches the token.
    fn check_new_token(&self, event: &Event) -> Option<MomentKind> {
        if !event.kind.is_acquisition() {
            return None;
        }
        let token = event.token_address.as_deref()?;

        if !self
            .store
            .has_prior_token_event(&event.wallet, token, &event.tx_hash)
        {
            let symbol = event.token_symbol.as_deref().unwrap_or("UNKNOWN");
            self.emit(
                event,
                MomentKind::NewToken,
                7,
                format!("First buy of ${symbol}; fresh entry"),
            );
            return Some(MomentKind::NewToken);
        }
        None
    }

    fn emit(&self, event: &Event, kind: MomentKind, severity: u8, description: String) {
        info!(wallet = %event.wallet, kind = %kind, "Pattern detected");
        self.sink.emit(Moment {
            wallet: event.wallet.clone(),
            tx_hash: Some(event.tx_hash.clone()),
            kind,
            token_symbol: event.token_symbol.clone(),
            description,
            severity,
            detected_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chain, EventKind};
    use chrono::{DateTime, Duration};

    fn event(hash: &str, kind: EventKind, symbol: &str, amount: f64, at: DateTime<Utc>) -> Event {
        Event {
            wallet: "w1".to_string(),
            tx_hash: hash.to_string(),
            chain: Chain::Sol,
            timestamp: at,
            kind,
            token_symbol: Some(symbol.to_string()),
            token_address: Some(format!("mint-{symbol}")),
            amount,
            amount_usd: None,
        }
    }

    fn setup() -> (Arc<Store>, Arc<MomentSink>, PatternEngine) {
        let store = Arc::new(Store::new());
        let sink = Arc::new(MomentSink::new());
        let engine = PatternEngine::new(PatternConfig::default(), store.clone(), sink.clone());
        (store, sink, engine)
    }

    #[test]
    fn test_whale_move_on_3x_deviation() {
        let (store, _sink, engine) = setup();
        store.with_profile_mut("w1", |p| p.avg_trade_size = 10.0);

        let e = event("t1", EventKind::Buy, "X", 30.0, Utc::now());
        store.insert_event(e.clone());
        // has_prior is irrelevant: size anomaly wins first.
        assert_eq!(engine.on_event(&e), Some(MomentKind::WhaleMove));
    }

    #[test]
    fn test_above_average_on_2x_deviation() {
        let (store, _sink, engine) = setup();
        store.with_profile_mut("w1", |p| p.avg_trade_size = 10.0);

        let e = event("t1", EventKind::Sell, "X", 20.0, Utc::now());
        store.insert_event(e.clone());
        assert_eq!(engine.on_event(&e), Some(MomentKind::AboveAverage));
    }

    #[test]
    fn test_no_profile_no_size_anomaly() {
        let (store, _sink, engine) = setup();
        let now = Utc::now();
        // Prior event so this isn't a fresh entry either.
        store.insert_event(event("t0", EventKind::Buy, "X", 5.0, now - Duration::hours(1)));
        let e = event("t1", EventKind::Sell, "X", 500.0, now);
        store.insert_event(e.clone());
        assert_eq!(engine.on_event(&e), None);
    }

    #[test]
    fn test_accumulation_after_repeated_buys() {
        let (store, _sink, engine) = setup();
        store.with_profile_mut("w1", |p| p.avg_trade_size = 10.0);
        let t0 = Utc::now() - Duration::hours(1);

        store.insert_event(event("t1", EventKind::Buy, "X", 10.0, t0));
        store.insert_event(event("t2", EventKind::Swap, "X", 10.0, t0 + Duration::minutes(5)));
        let e = event("t3", EventKind::Buy, "X", 10.0, t0 + Duration::minutes(10));
        store.insert_event(e.clone());

        assert_eq!(engine.on_event(&e), Some(MomentKind::Accumulation));
    }

    #[test]
    fn test_new_token_first_entry() {
        let (store, _sink, engine) = setup();
        store.with_profile_mut("w1", |p| p.avg_trade_size = 10.0);

        let e = event("t1", EventKind::Buy, "FRESH", 10.0, Utc::now());
        store.insert_event(e.clone());
        assert_eq!(engine.on_event(&e), Some(MomentKind::NewToken));

        // A later buy of the same token is no longer a fresh entry.
        let e2 = event("t2", EventKind::Buy, "FRESH", 10.0, Utc::now());
        store.insert_event(e2.clone());
        assert_eq!(engine.on_event(&e2), None);
    }

    #[test]
    fn test_transfer_never_patterns_beyond_size() {
        let (store, _sink, engine) = setup();
        store.with_profile_mut("w1", |p| p.avg_trade_size = 100.0);

        let e = event("t1", EventKind::Transfer, "SOL", 50.0, Utc::now());
        store.insert_event(e.clone());
        assert_eq!(engine.on_event(&e), None);
    }
}
