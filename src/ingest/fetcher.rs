//! Replay transaction source
//!
//! Reads pre-normalized transactions from a JSON file keyed by wallet
//! address. Used to replay captured history through the full pipeline and
//! as the offline mode of the binary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::model::{RawTransaction, Wallet};

use super::TransactionFetcher;

/// Serves transactions from an in-memory map loaded at startup.
///
/// File format: `{ "<wallet address>": [ <RawTransaction>, ... ], ... }`,
/// newest transaction first within each wallet, matching what a live RPC
/// source returns.
pub struct ReplayFetcher {
    by_wallet: HashMap<String, Vec<RawTransaction>>,
}

impl ReplayFetcher {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let by_wallet: HashMap<String, Vec<RawTransaction>> = serde_json::from_str(&raw)?;
        Ok(Self { by_wallet })
    }

    pub fn new(by_wallet: HashMap<String, Vec<RawTransaction>>) -> Self {
        Self { by_wallet }
    }

    pub fn transaction_count(&self) -> usize {
        self.by_wallet.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl TransactionFetcher for ReplayFetcher {
    async fn fetch(&self, wallet: &Wallet) -> Result<Vec<RawTransaction>> {
        Ok(self
            .by_wallet
            .get(&wallet.address)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chain, ReputationTier};
    use std::io::Write as _;

    fn wallet(address: &str) -> Wallet {
        Wallet {
            address: address.to_string(),
            name: address.to_string(),
            chain: Chain::Sol,
            is_active: true,
            reputation_tier: ReputationTier::U,
        }
    }

    #[tokio::test]
    async fn test_load_and_fetch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
  "w1": [
    {{
      "hash": "tx1",
      "timestamp": "2026-01-15T12:00:00Z",
      "native_delta": -1.5,
      "asset_deltas": [
        {{"asset_id": "mint-a", "pre_amount": 0.0, "post_amount": 100.0}}
      ]
    }}
  ]
}}"#
        )
        .unwrap();

        let fetcher = ReplayFetcher::from_file(file.path()).unwrap();
        assert_eq!(fetcher.transaction_count(), 1);

        let txs = fetcher.fetch(&wallet("w1")).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash, "tx1");
        assert!(txs[0].counterparty.is_none());

        assert!(fetcher.fetch(&wallet("w2")).await.unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ReplayFetcher::from_file(file.path()).is_err());
    }
}
