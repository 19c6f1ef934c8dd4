//! Behavioral signal detectors
//!
//! One detector per signal family, all sharing the event store and moment
//! sink. `DetectorSet` is the single entry point the ingestion loop drives:
//! each persisted event is routed to the detectors that care about its kind,
//! and `finish_cycle` handles the time-based work (reload expiry, alpha
//! settlement) once per scan.

pub mod alpha_decay;
pub mod cluster;
pub mod contrarian;
pub mod pattern;
pub mod reload;

pub use alpha_decay::{AlphaDecayConfig, AlphaDecayTracker};
pub use cluster::{CabalDetector, ClusterConfig, ClusterResult};
pub use contrarian::{ContrarianConfig, ContrarianEngine, ContrarianSignal, SignalSeverity};
pub use pattern::{PatternConfig, PatternEngine};
pub use reload::{ReloadConfig, ReloadPredictor};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::{ClassifierConfig, StableAssets};
use crate::model::{Chain, Event, EventKind};
use crate::store::{MomentSink, Store};

/// Per-family detector configuration, as loaded from the config file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub reload: ReloadConfig,
    #[serde(default)]
    pub pattern: PatternConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub contrarian: ContrarianConfig,
    #[serde(default)]
    pub alpha: AlphaDecayConfig,
}

/// All detectors wired to a shared store and sink.
pub struct DetectorSet {
    pub reload: ReloadPredictor,
    pub pattern: PatternEngine,
    pub cluster: CabalDetector,
    pub contrarian: ContrarianEngine,
    pub alpha: AlphaDecayTracker,
    stables: HashMap<Chain, StableAssets>,
}

impl DetectorSet {
    pub fn new(
        config: DetectorConfig,
        classifier: &ClassifierConfig,
        store: Arc<Store>,
        sink: Arc<MomentSink>,
    ) -> Self {
        let stables = [Chain::Sol, Chain::Base]
            .into_iter()
            .map(|chain| {
                (
                    chain,
                    StableAssets::for_chain(chain, &classifier.extra_stables),
                )
            })
            .collect();

        Self {
            reload: ReloadPredictor::new(config.reload, store.clone()),
            pattern: PatternEngine::new(config.pattern, store.clone(), sink.clone()),
            cluster: CabalDetector::new(config.cluster, store.clone(), sink.clone()),
            contrarian: ContrarianEngine::new(config.contrarian, store.clone(), sink),
            alpha: AlphaDecayTracker::new(config.alpha, store),
            stables,
        }
    }

    pub fn stables(&self, chain: Chain) -> &StableAssets {
        &self.stables[&chain]
    }

    /// Route one freshly persisted event through every detector that applies
    /// to its kind. The profile must already be updated when this runs, so
    /// size anomalies compare against the history including this event.
    pub fn process(&self, event: &Event, native_delta: f64, counterparty: Option<&str>) {
        if event.kind == EventKind::Unknown {
            return;
        }
        let stables = self.stables(event.chain);

        if event.kind == EventKind::Transfer && native_delta > 0.0 {
            self.reload.on_inflow(
                &event.wallet,
                &event.tx_hash,
                native_delta,
                counterparty,
                event.timestamp,
            );
        }

        if event.kind.is_acquisition() {
            self.reload
                .on_buy(&event.wallet, &event.tx_hash, event.timestamp);
            self.cluster.on_buy(event, stables);
            self.alpha.note_lead(event, stables);
        }

        if event.kind.is_acquisition() || event.kind == EventKind::Sell {
            self.contrarian.on_activity(event, stables);
        }

        self.pattern.on_event(event);
    }

    /// Time-based detector work, run once at the end of each scan cycle.
    pub fn finish_cycle(&self, now: DateTime<Utc>) {
        self.reload.sweep(now);
        self.alpha.settle(now);
    }
}
