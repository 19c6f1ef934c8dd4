//! Moment sink
//!
//! Append-only record of emitted signals. Deduplicates at emission time by
//! (wallet, kind, asset) within a kind-specific window so a hot token does
//! not turn into an alert storm. Downstream dispatch subscribes to what
//! lands here; the engine itself never renders user-facing text beyond the
//! stored description.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::RwLock;
use tracing::info;

use crate::model::{Moment, MomentKind};

type DedupKey = (String, MomentKind, String);

/// Append-only, deduplicating sink for emitted moments.
#[derive(Default)]
pub struct MomentSink {
    moments: RwLock<Vec<Moment>>,
    last_emitted: DashMap<DedupKey, DateTime<Utc>>,
}

impl MomentSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a moment unless an equivalent one was emitted within the
    /// kind's dedup window. Returns whether the moment was accepted.
    pub fn emit(&self, moment: Moment) -> bool {
        let key: DedupKey = (
            moment.wallet.clone(),
            moment.kind,
            moment.token_symbol.clone().unwrap_or_default(),
        );

        if let Some(last) = self.last_emitted.get(&key) {
            if moment.detected_at - *last < moment.kind.dedup_window() {
                return false;
            }
        }
        self.last_emitted.insert(key, moment.detected_at);

        info!(
            wallet = %moment.wallet,
            kind = %moment.kind,
            severity = %moment.severity,
            token = %moment.token_symbol.as_deref().unwrap_or("-"),
            "Moment emitted"
        );

        let mut moments = self.moments.write().expect("moment sink lock poisoned");
        moments.push(moment);
        true
    }

    /// Most recent moments, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Moment> {
        let moments = self.moments.read().expect("moment sink lock poisoned");
        moments.iter().rev().take(limit).cloned().collect()
    }

    /// Moments of one kind since `cutoff`, newest first.
    pub fn of_kind_since(&self, kind: MomentKind, cutoff: DateTime<Utc>) -> Vec<Moment> {
        let moments = self.moments.read().expect("moment sink lock poisoned");
        moments
            .iter()
            .rev()
            .filter(|m| m.kind == kind && m.detected_at >= cutoff)
            .cloned()
            .collect()
    }

    /// Moments for one wallet, newest first.
    pub fn for_wallet(&self, wallet: &str, limit: usize) -> Vec<Moment> {
        let moments = self.moments.read().expect("moment sink lock poisoned");
        moments
            .iter()
            .rev()
            .filter(|m| m.wallet == wallet)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.moments.read().expect("moment sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn moment(wallet: &str, kind: MomentKind, token: &str, at: DateTime<Utc>) -> Moment {
        Moment {
            wallet: wallet.to_string(),
            tx_hash: None,
            kind,
            token_symbol: Some(token.to_string()),
            description: "test".to_string(),
            severity: 5,
            detected_at: at,
        }
    }

    #[test]
    fn test_emit_dedups_within_window() {
        let sink = MomentSink::new();
        let now = Utc::now();

        assert!(sink.emit(moment("w1", MomentKind::Cabal, "X", now)));
        assert!(!sink.emit(moment("w1", MomentKind::Cabal, "X", now + Duration::minutes(5))));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_emit_allows_after_window() {
        let sink = MomentSink::new();
        let now = Utc::now();

        assert!(sink.emit(moment("w1", MomentKind::Cabal, "X", now)));
        assert!(sink.emit(moment("w1", MomentKind::Cabal, "X", now + Duration::minutes(31))));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_emit_distinguishes_kind_and_asset() {
        let sink = MomentSink::new();
        let now = Utc::now();

        assert!(sink.emit(moment("w1", MomentKind::Cabal, "X", now)));
        assert!(sink.emit(moment("w1", MomentKind::Cabal, "Y", now)));
        assert!(sink.emit(moment("w1", MomentKind::NewToken, "X", now)));
        assert!(sink.emit(moment("w2", MomentKind::Cabal, "X", now)));
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn test_queries() {
        let sink = MomentSink::new();
        let now = Utc::now();
        sink.emit(moment("w1", MomentKind::Cabal, "X", now));
        sink.emit(moment("w2", MomentKind::NewToken, "Y", now));

        assert_eq!(sink.recent(10).len(), 2);
        assert_eq!(sink.for_wallet("w1", 10).len(), 1);
        assert_eq!(
            sink.of_kind_since(MomentKind::Cabal, now - Duration::minutes(1))
                .len(),
            1
        );
    }
}
