//! In-memory storage collaborator
//!
//! Owns every persisted entity: wallets, events, profiles, reload events and
//! funding links. The engine only touches these through the query/upsert
//! methods here, never by holding long-lived copies. Event insertion is
//! idempotent by transaction hash, the single concurrency-critical
//! constraint in the system.

pub mod sink;

pub use sink::MomentSink;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

use crate::model::{
    Chain, Event, EventKind, FundingLink, Profile, ReloadEvent, ReloadState, Wallet,
};

/// Shared store for all engine entities.
#[derive(Default)]
pub struct Store {
    /// Wallets by address.
    wallets: DashMap<String, Wallet>,
    /// Canonical events by transaction hash; enforces system-wide uniqueness.
    events_by_hash: DashMap<String, Event>,
    /// Per-wallet event history in ingestion order (ascending on-chain time
    /// within a wallet).
    events_by_wallet: DashMap<String, Vec<Event>>,
    /// Profiles by wallet address, created lazily.
    profiles: DashMap<String, Profile>,
    /// Reload events by funding transaction hash.
    reloads: DashMap<String, ReloadEvent>,
    /// Funding links by transaction hash.
    funding_links: DashMap<String, FundingLink>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Wallets ---

    pub fn upsert_wallet(&self, wallet: Wallet) {
        self.wallets.insert(wallet.address.clone(), wallet);
    }

    pub fn wallet(&self, address: &str) -> Option<Wallet> {
        self.wallets.get(address).map(|w| w.clone())
    }

    /// Active wallets for a chain, name-sorted for deterministic scan order.
    pub fn active_wallets(&self, chain: Chain) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self
            .wallets
            .iter()
            .filter(|w| w.chain == chain && w.is_active)
            .map(|w| w.clone())
            .collect();
        wallets.sort_by(|a, b| a.name.cmp(&b.name));
        wallets
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    // --- Events ---

    /// Insert an event, ignoring duplicates by hash. Returns false when the
    /// hash was already present (re-ingestion is a no-op).
    pub fn insert_event(&self, event: Event) -> bool {
        match self.events_by_hash.entry(event.tx_hash.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                self.events_by_wallet
                    .entry(event.wallet.clone())
                    .or_default()
                    .push(event);
                true
            }
        }
    }

    pub fn has_event(&self, tx_hash: &str) -> bool {
        self.events_by_hash.contains_key(tx_hash)
    }

    pub fn event_count(&self) -> usize {
        self.events_by_hash.len()
    }

    /// The most recent `limit` events for a wallet, newest first.
    pub fn recent_events(&self, wallet: &str, limit: usize) -> Vec<Event> {
        self.events_by_wallet
            .get(wallet)
            .map(|events| events.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Events of the given kinds touching an asset symbol since `cutoff`,
    /// across all wallets, newest first.
    pub fn events_for_asset_since(
        &self,
        symbol: &str,
        cutoff: DateTime<Utc>,
        kinds: &[EventKind],
    ) -> Vec<Event> {
        let mut matches: Vec<Event> = Vec::new();
        for entry in self.events_by_wallet.iter() {
            for event in entry.value() {
                if event.timestamp >= cutoff
                    && kinds.contains(&event.kind)
                    && event.token_symbol.as_deref() == Some(symbol)
                {
                    matches.push(event.clone());
                }
            }
        }
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches
    }

    /// Whether the wallet has any event for this token address other than
    /// the given transaction.
    pub fn has_prior_token_event(
        &self,
        wallet: &str,
        token_address: &str,
        exclude_tx: &str,
    ) -> bool {
        self.events_by_wallet
            .get(wallet)
            .map(|events| {
                events.iter().any(|e| {
                    e.tx_hash != exclude_tx && e.token_address.as_deref() == Some(token_address)
                })
            })
            .unwrap_or(false)
    }

    // --- Profiles ---

    pub fn profile(&self, wallet: &str) -> Option<Profile> {
        self.profiles.get(wallet).map(|p| p.clone())
    }

    /// Mutate a wallet's profile, creating it lazily. Returns the updated
    /// snapshot.
    pub fn with_profile_mut<F>(&self, wallet: &str, mutate: F) -> Profile
    where
        F: FnOnce(&mut Profile),
    {
        let mut entry = self
            .profiles
            .entry(wallet.to_string())
            .or_insert_with(|| Profile::new(wallet));
        mutate(entry.value_mut());
        entry.value_mut().last_updated = Utc::now();
        entry.value().clone()
    }

    /// Snapshot of all profiles for read-only leaderboard views.
    pub fn profiles_snapshot(&self) -> Vec<Profile> {
        self.profiles.iter().map(|p| p.clone()).collect()
    }

    // --- Reload events ---

    /// Track a new reload, ignoring duplicates by funding hash.
    pub fn insert_reload(&self, reload: ReloadEvent) -> bool {
        match self.reloads.entry(reload.tx_hash.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(reload);
                true
            }
        }
    }

    pub fn reload(&self, tx_hash: &str) -> Option<ReloadEvent> {
        self.reloads.get(tx_hash).map(|r| r.clone())
    }

    /// Hashes of unresolved reloads for a wallet detected at or after
    /// `cutoff`.
    pub fn unresolved_reloads_for(&self, wallet: &str, cutoff: DateTime<Utc>) -> Vec<String> {
        self.reloads
            .iter()
            .filter(|r| {
                r.wallet == wallet && !r.is_resolved() && r.detected_at >= cutoff
            })
            .map(|r| r.tx_hash.clone())
            .collect()
    }

    /// Hashes of unresolved reloads detected before `cutoff` (sweep input).
    pub fn stale_unresolved_reloads(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.reloads
            .iter()
            .filter(|r| !r.is_resolved() && r.detected_at < cutoff)
            .map(|r| r.tx_hash.clone())
            .collect()
    }

    /// Mutate a reload event in place. Returns false when the hash is
    /// untracked.
    pub fn with_reload_mut<F>(&self, tx_hash: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut ReloadEvent),
    {
        match self.reloads.get_mut(tx_hash) {
            Some(mut reload) => {
                mutate(reload.value_mut());
                true
            }
            None => false,
        }
    }

    /// All resolved reloads for a wallet, either outcome.
    pub fn resolved_reloads_for(&self, wallet: &str) -> Vec<ReloadEvent> {
        self.reloads
            .iter()
            .filter(|r| r.wallet == wallet && r.is_resolved())
            .map(|r| r.clone())
            .collect()
    }

    // --- Funding links ---

    /// Record a funding edge, ignoring duplicates by transaction hash.
    pub fn insert_funding_link(&self, link: FundingLink) -> bool {
        match self.funding_links.entry(link.tx_hash.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(link);
                true
            }
        }
    }

    /// Distinct funding sources observed for a wallet.
    pub fn funding_sources(&self, wallet: &str) -> HashSet<String> {
        self.funding_links
            .iter()
            .filter(|l| l.dest_wallet == wallet)
            .map(|l| l.source_address.clone())
            .collect()
    }
}

/// Helper for tests and sweeps: whether a reload ended in a buy.
pub fn reload_followed_by_buy(state: &ReloadState) -> bool {
    matches!(state, ReloadState::ResolvedWithBuy { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventKind;

    fn event(wallet: &str, hash: &str, kind: EventKind, symbol: &str) -> Event {
        Event {
            wallet: wallet.to_string(),
            tx_hash: hash.to_string(),
            chain: Chain::Sol,
            timestamp: Utc::now(),
            kind,
            token_symbol: Some(symbol.to_string()),
            token_address: Some(format!("mint-{symbol}")),
            amount: 100.0,
            amount_usd: None,
        }
    }

    #[test]
    fn test_insert_event_idempotent() {
        let store = Store::new();
        let e = event("w1", "tx1", EventKind::Buy, "X");

        assert!(store.insert_event(e.clone()));
        assert!(!store.insert_event(e));
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.recent_events("w1", 10).len(), 1);
    }

    #[test]
    fn test_recent_events_newest_first() {
        let store = Store::new();
        store.insert_event(event("w1", "tx1", EventKind::Buy, "X"));
        store.insert_event(event("w1", "tx2", EventKind::Sell, "X"));

        let recent = store.recent_events("w1", 10);
        assert_eq!(recent[0].tx_hash, "tx2");
        assert_eq!(recent[1].tx_hash, "tx1");
    }

    #[test]
    fn test_events_for_asset_filters_kind_and_symbol() {
        let store = Store::new();
        store.insert_event(event("w1", "tx1", EventKind::Buy, "X"));
        store.insert_event(event("w2", "tx2", EventKind::Sell, "X"));
        store.insert_event(event("w3", "tx3", EventKind::Buy, "Y"));

        let cutoff = Utc::now() - chrono::Duration::minutes(5);
        let buys = store.events_for_asset_since("X", cutoff, &[EventKind::Buy, EventKind::Swap]);
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].wallet, "w1");
    }

    #[test]
    fn test_funding_link_dedup_and_sources() {
        let store = Store::new();
        let link = FundingLink {
            source_address: "src1".to_string(),
            dest_wallet: "w1".to_string(),
            amount: 1.0,
            tx_hash: "ftx1".to_string(),
            detected_at: Utc::now(),
        };
        assert!(store.insert_funding_link(link.clone()));
        assert!(!store.insert_funding_link(link));

        let sources = store.funding_sources("w1");
        assert!(sources.contains("src1"));
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_profile_created_lazily() {
        let store = Store::new();
        assert!(store.profile("w1").is_none());

        let profile = store.with_profile_mut("w1", |p| p.avg_trade_size = 5.0);
        assert_eq!(profile.avg_trade_size, 5.0);
        assert!(store.profile("w1").is_some());
    }
}
