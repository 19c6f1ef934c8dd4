use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::classify::ClassifierConfig;
use crate::detect::DetectorConfig;
use crate::error::{Error, Result};
use crate::model::{Chain, ReputationTier, Wallet};
use crate::profile::ProfilerConfig;

/// Scan scheduling for one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainScheduleConfig {
    /// Seconds between scan cycles.
    pub scan_interval_secs: u64,

    /// Per-wallet fetch timeout.
    #[serde(default = "default_tx_timeout_secs")]
    pub tx_timeout_secs: u64,
}

fn default_tx_timeout_secs() -> u64 {
    30
}

fn default_solana_schedule() -> ChainScheduleConfig {
    ChainScheduleConfig {
        scan_interval_secs: 30,
        tx_timeout_secs: default_tx_timeout_secs(),
    }
}

fn default_base_schedule() -> ChainScheduleConfig {
    ChainScheduleConfig {
        scan_interval_secs: 120,
        tx_timeout_secs: default_tx_timeout_secs(),
    }
}

/// USD price lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    #[serde(default = "default_price_enabled")]
    pub enabled: bool,

    #[serde(default = "default_price_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_price_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a fetched price stays fresh.
    #[serde(default = "default_price_cache_secs")]
    pub cache_secs: u64,
}

fn default_price_enabled() -> bool {
    true
}

fn default_price_endpoint() -> String {
    "https://api.jup.ag/price/v2".to_string()
}

fn default_price_timeout_secs() -> u64 {
    5
}

fn default_price_cache_secs() -> u64 {
    60
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            enabled: default_price_enabled(),
            endpoint: default_price_endpoint(),
            timeout_secs: default_price_timeout_secs(),
            cache_secs: default_price_cache_secs(),
        }
    }
}

/// One monitored wallet as declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub address: String,

    #[serde(default)]
    pub name: Option<String>,

    pub chain: Chain,

    #[serde(default = "default_wallet_active")]
    pub active: bool,

    #[serde(default)]
    pub tier: ReputationTier,
}

fn default_wallet_active() -> bool {
    true
}

impl WalletEntry {
    pub fn to_wallet(&self) -> Wallet {
        Wallet {
            address: self.address.clone(),
            name: self
                .name
                .clone()
                .unwrap_or_else(|| crate::model::short_address(&self.address)),
            chain: self.chain,
            is_active: self.active,
            reputation_tier: self.tier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_solana_schedule")]
    pub solana: ChainScheduleConfig,

    #[serde(default = "default_base_schedule")]
    pub base: ChainScheduleConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub profiler: ProfilerConfig,

    #[serde(default)]
    pub detectors: DetectorConfig,

    #[serde(default)]
    pub price: PriceConfig,

    /// Static asset-id to symbol map, consulted before any live resolver.
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solana: default_solana_schedule(),
            base: default_base_schedule(),
            classifier: ClassifierConfig::default(),
            profiler: ProfilerConfig::default(),
            detectors: DetectorConfig::default(),
            price: PriceConfig::default(),
            tokens: HashMap::new(),
            wallets: Vec::new(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file with `PULSE__`-prefixed environment
    /// overrides layered on top, e.g. `PULSE__SOLANA__SCAN_INTERVAL_SECS=10`.
    pub fn load(path: &Path) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("PULSE").separator("__"));

        let config: Config = builder
            .build()
            .map_err(|e| Error::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn schedule(&self, chain: Chain) -> &ChainScheduleConfig {
        match chain {
            Chain::Sol => &self.solana,
            Chain::Base => &self.base,
        }
    }

    fn validate(&self) -> Result<()> {
        for schedule in [&self.solana, &self.base] {
            if schedule.scan_interval_secs == 0 {
                return Err(Error::Config(
                    "scan_interval_secs must be positive".to_string(),
                ));
            }
        }
        for entry in &self.wallets {
            if entry.address.trim().is_empty() {
                return Err(Error::Config("wallet address cannot be empty".to_string()));
            }
        }
        let ema = self.detectors.alpha.ema_weight;
        if !(0.0..=1.0).contains(&ema) || ema == 0.0 {
            return Err(Error::Config(format!(
                "alpha ema_weight must be in (0, 1], got {ema}"
            )));
        }
        if self.classifier.native_dust < 0.0 || self.classifier.token_dust < 0.0 {
            return Err(Error::Config(
                "dust thresholds cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Monitored wallets for one chain.
    pub fn wallets_for(&self, chain: Chain) -> Vec<Wallet> {
        self.wallets
            .iter()
            .filter(|w| w.chain == chain)
            .map(WalletEntry::to_wallet)
            .collect()
    }
}
