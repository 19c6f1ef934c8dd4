//! Event classification
//!
//! Turns a raw transaction's balance deltas into exactly one semantic event
//! kind. Pure: no I/O, no shared state. Symbol resolution happens upstream
//! in the ingestion loop, so this module only ever sees normalized,
//! symbol-annotated deltas.
//!
//! Resolution precedence (first match wins):
//! 1. Lost a non-stable and gained stable/native -> SELL
//! 2. Gained a non-stable and lost stable/native -> BUY
//! 3. Lost and gained non-stables -> SWAP (gained asset is primary)
//! 4. Lost a non-stable with no compensating gain -> SELL (wrapped-asset edge)
//! 5. Non-trivial native delta alone -> TRANSFER
//! 6. Otherwise -> UNKNOWN

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::{Chain, EventKind};

/// Dust thresholds and extra stable symbols for the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Native-asset deltas below this are noise.
    #[serde(default = "default_native_dust")]
    pub native_dust: f64,

    /// Token deltas below this are noise.
    #[serde(default = "default_token_dust")]
    pub token_dust: f64,

    /// Additional symbols to treat as stable/pegged.
    #[serde(default)]
    pub extra_stables: Vec<String>,
}

fn default_native_dust() -> f64 {
    0.001
}

fn default_token_dust() -> f64 {
    0.000_001
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            native_dust: default_native_dust(),
            token_dust: default_token_dust(),
            extra_stables: Vec::new(),
        }
    }
}

/// Recognized stable/pegged assets for one chain. Stables are excluded from
/// "alpha" classification: gaining USDC is proceeds, not a position.
#[derive(Debug, Clone)]
pub struct StableAssets {
    native: &'static str,
    pegged: HashSet<String>,
}

const PEGGED_SYMBOLS: &[&str] = &["USDC", "USDT", "wSOL", "WSOL", "USDC.e", "USDCet", "WETH"];

impl StableAssets {
    pub fn for_chain(chain: Chain, extra: &[String]) -> Self {
        let mut pegged: HashSet<String> = PEGGED_SYMBOLS.iter().map(|s| s.to_string()).collect();
        pegged.extend(extra.iter().cloned());
        Self {
            native: chain.native_symbol(),
            pegged,
        }
    }

    pub fn is_stable(&self, symbol: &str) -> bool {
        symbol == self.native || self.pegged.contains(symbol)
    }

    pub fn native_symbol(&self) -> &'static str {
        self.native
    }
}

/// One symbol-resolved asset delta, as fed to the classifier.
#[derive(Debug, Clone)]
pub struct AssetChange {
    pub asset_id: String,
    pub symbol: String,
    /// Signed change in the wallet's balance of this asset.
    pub delta: f64,
}

/// Result of classifying one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: EventKind,
    pub token_symbol: Option<String>,
    pub token_address: Option<String>,
    /// Absolute amount of the primary asset.
    pub amount: f64,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            kind: EventKind::Unknown,
            token_symbol: None,
            token_address: None,
            amount: 0.0,
        }
    }

    fn of_asset(kind: EventKind, change: &AssetChange) -> Self {
        Self {
            kind,
            token_symbol: Some(change.symbol.clone()),
            token_address: Some(change.asset_id.clone()),
            amount: change.delta.abs(),
        }
    }
}

/// Classify one transaction from its native delta and per-asset deltas.
///
/// Total: every input yields exactly one kind, malformed or empty delta sets
/// fall through to UNKNOWN. When several non-stable assets move in the same
/// direction the one with the largest absolute amount is primary; the rest
/// are dropped (one event per transaction).
pub fn classify(
    native_delta: f64,
    changes: &[AssetChange],
    stables: &StableAssets,
    config: &ClassifierConfig,
) -> Classification {
    let native_gained = native_delta > config.native_dust;
    let native_lost = native_delta < -config.native_dust;

    let mut gained_alpha: Vec<&AssetChange> = Vec::new();
    let mut lost_alpha: Vec<&AssetChange> = Vec::new();
    let mut gained_stable = false;
    let mut lost_stable = false;

    for change in changes {
        if change.delta.abs() <= config.token_dust || !change.delta.is_finite() {
            continue;
        }
        let stable = stables.is_stable(&change.symbol);
        if change.delta > 0.0 {
            if stable {
                gained_stable = true;
            } else {
                gained_alpha.push(change);
            }
        } else if stable {
            lost_stable = true;
        } else {
            lost_alpha.push(change);
        }
    }

    let largest = |set: &[&AssetChange]| -> Option<AssetChange> {
        set.iter()
            .max_by(|a, b| {
                a.delta
                    .abs()
                    .partial_cmp(&b.delta.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|c| (*c).clone())
    };

    // Exit to stable value: a sell even when the proceeds are small.
    if !lost_alpha.is_empty() && (gained_stable || native_gained) {
        if let Some(primary) = largest(&lost_alpha) {
            return Classification::of_asset(EventKind::Sell, &primary);
        }
    }

    // Entry from stable value: a buy.
    if !gained_alpha.is_empty() && (lost_stable || native_lost) {
        if let Some(primary) = largest(&gained_alpha) {
            return Classification::of_asset(EventKind::Buy, &primary);
        }
    }

    // Token-to-token rotation; the gained side is primary.
    if !lost_alpha.is_empty() && !gained_alpha.is_empty() {
        if let Some(primary) = largest(&gained_alpha) {
            return Classification::of_asset(EventKind::Swap, &primary);
        }
    }

    // Lost a token with no visible proceeds (wrap/unwrap transitions).
    if !lost_alpha.is_empty() {
        if let Some(primary) = largest(&lost_alpha) {
            return Classification::of_asset(EventKind::Sell, &primary);
        }
    }

    // Pure native movement.
    if native_gained || native_lost {
        return Classification {
            kind: EventKind::Transfer,
            token_symbol: Some(stables.native_symbol().to_string()),
            token_address: None,
            amount: native_delta.abs(),
        };
    }

    Classification::unknown()
}
