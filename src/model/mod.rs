//! Core domain types
//!
//! Everything the engine stores or emits is defined here: monitored wallets,
//! classified events, rolling profiles, reload tracking, funding links and
//! emitted moments. All kinds are closed enums, exhaustively matched at each
//! consumer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Monitored chains. Each chain runs its own ingestion schedule since block
/// times differ materially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Sol,
    Base,
}

impl Chain {
    /// Symbol of the chain's native asset.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Sol => "SOL",
            Chain::Base => "ETH",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Sol => write!(f, "SOL"),
            Chain::Base => write!(f, "BASE"),
        }
    }
}

/// Reputation tier, assigned externally and consumed by the contrarian
/// engine. A = historically profitable, B = mixed, C = known bad actor,
/// U = unrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReputationTier {
    A,
    B,
    C,
    #[default]
    U,
}

/// A monitored wallet. Created at configuration load; only the active flag
/// and reputation tier are ever mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub name: String,
    pub chain: Chain,
    pub is_active: bool,
    pub reputation_tier: ReputationTier,
}

impl Wallet {
    /// Short display form of the address for logs.
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

/// Abbreviate an on-chain address for logging.
pub fn short_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..4], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

/// Semantic classification of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Buy,
    Sell,
    Swap,
    Transfer,
    Unknown,
}

impl EventKind {
    /// Buys and token-to-token swaps both represent acquiring a position.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, EventKind::Buy | EventKind::Swap)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Buy => "BUY",
            EventKind::Sell => "SELL",
            EventKind::Swap => "SWAP",
            EventKind::Transfer => "TRANSFER",
            EventKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified transaction for a monitored wallet. Immutable once stored;
/// the transaction hash is unique system-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub wallet: String,
    pub tx_hash: String,
    pub chain: Chain,
    /// On-chain time, never processing time.
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub token_symbol: Option<String>,
    pub token_address: Option<String>,
    /// Absolute amount of the primary asset.
    pub amount: f64,
    pub amount_usd: Option<f64>,
}

/// Trading style derived from average hold time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingStyle {
    /// Sells within 24h.
    Sniper,
    /// Holds under a week.
    Trader,
    /// Long-term conviction.
    Holder,
    #[default]
    Unknown,
}

/// Rolling statistical fingerprint for one wallet. Created lazily on the
/// first event, updated after every new one, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub wallet: String,

    // Trade size profile
    pub avg_trade_size: f64,
    pub max_trade_size: f64,
    pub total_events: u32,

    // Realized outcomes from matched buy/sell pairs
    pub win_rate: Option<f64>,
    pub trades_analyzed: u32,
    pub avg_hold_hours: Option<f64>,
    pub style: TradingStyle,

    // Alpha decay (owned by the alpha-decay tracker)
    pub alpha_score: f64,
    pub avg_copiers_per_trade: f64,

    // Reload prediction (owned by the reload predictor)
    pub reload_buy_probability: Option<f64>,
    pub avg_minutes_to_buy: Option<i64>,

    pub last_updated: DateTime<Utc>,
}

impl Profile {
    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            avg_trade_size: 0.0,
            max_trade_size: 0.0,
            total_events: 0,
            win_rate: None,
            trades_analyzed: 0,
            avg_hold_hours: None,
            style: TradingStyle::Unknown,
            alpha_score: 100.0,
            avg_copiers_per_trade: 0.0,
            reload_buy_probability: None,
            avg_minutes_to_buy: None,
            last_updated: Utc::now(),
        }
    }
}

/// Kinds of emitted behavioral alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MomentKind {
    WhaleMove,
    AboveAverage,
    Accumulation,
    NewToken,
    Cabal,
    ContrarianScammerAccumulation,
    ContrarianSmartMoneyExit,
    ContrarianScammerOnly,
}

impl MomentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentKind::WhaleMove => "WHALE_MOVE",
            MomentKind::AboveAverage => "ABOVE_AVG",
            MomentKind::Accumulation => "ACCUMULATION",
            MomentKind::NewToken => "NEW_TOKEN",
            MomentKind::Cabal => "CABAL",
            MomentKind::ContrarianScammerAccumulation => "CONTRARIAN_SCAMMER_ACCUMULATION",
            MomentKind::ContrarianSmartMoneyExit => "CONTRARIAN_SMART_MONEY_EXIT",
            MomentKind::ContrarianScammerOnly => "CONTRARIAN_SCAMMER_ONLY",
        }
    }

    /// Window within which a repeat (wallet, kind, asset) emission is
    /// suppressed to avoid alert storms.
    pub fn dedup_window(&self) -> Duration {
        match self {
            MomentKind::Cabal => Duration::minutes(30),
            MomentKind::ContrarianScammerAccumulation
            | MomentKind::ContrarianSmartMoneyExit
            | MomentKind::ContrarianScammerOnly => Duration::minutes(60),
            MomentKind::WhaleMove
            | MomentKind::AboveAverage
            | MomentKind::Accumulation
            | MomentKind::NewToken => Duration::minutes(60),
        }
    }
}

impl std::fmt::Display for MomentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An emitted signal, append-only once accepted by the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moment {
    pub wallet: String,
    pub tx_hash: Option<String>,
    pub kind: MomentKind,
    pub token_symbol: Option<String>,
    pub description: String,
    /// 1-10.
    pub severity: u8,
    pub detected_at: DateTime<Utc>,
}

/// Resolution state of a reload. A reload resolves exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReloadState {
    Unresolved,
    ResolvedWithBuy { minutes: i64, buy_tx_hash: String },
    ResolvedWithoutBuy,
}

/// An incoming-funds event tracked for buy prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadEvent {
    pub wallet: String,
    /// Funding transaction hash, unique.
    pub tx_hash: String,
    pub amount: f64,
    pub source_address: Option<String>,
    pub state: ReloadState,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReloadEvent {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.state, ReloadState::Unresolved)
    }
}

/// An edge in the funding graph: source (possibly unmonitored) to a
/// monitored wallet. Immutable; read by cluster confidence scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingLink {
    pub source_address: String,
    pub dest_wallet: String,
    pub amount: f64,
    pub tx_hash: String,
    pub detected_at: DateTime<Utc>,
}

/// Normalized raw transaction as produced by a chain fetcher. Chain-specific
/// adapters are responsible for reducing RPC responses to this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    /// On-chain timestamp.
    pub timestamp: DateTime<Utc>,
    /// Signed native-asset delta for the monitored wallet.
    pub native_delta: f64,
    /// Per-asset balance deltas restricted to the monitored wallet.
    #[serde(default)]
    pub asset_deltas: Vec<RawAssetDelta>,
    /// Counterparty for plain transfers, when the adapter can identify one.
    #[serde(default)]
    pub counterparty: Option<String>,
}

/// Pre/post balance pair for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAssetDelta {
    pub asset_id: String,
    pub pre_amount: f64,
    pub post_amount: f64,
}

impl RawAssetDelta {
    pub fn delta(&self) -> f64 {
        self.post_amount - self.pre_amount
    }
}
