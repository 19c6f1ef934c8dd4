//! Symbol resolution
//!
//! Asset ids (Solana mints, EVM contract addresses) map to display symbols
//! through a configured static table, with a caching wrapper for any
//! resolver that does real lookups.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::Chain;

use super::SymbolResolver;

/// Resolves from the `[tokens]` table in the config file. Lookups are
/// case-sensitive on the asset id.
pub struct StaticSymbolResolver {
    tokens: HashMap<String, String>,
}

impl StaticSymbolResolver {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl SymbolResolver for StaticSymbolResolver {
    async fn resolve(&self, _chain: Chain, asset_id: &str) -> Result<Option<String>> {
        Ok(self.tokens.get(asset_id).cloned())
    }
}

/// Memoizes successful lookups from an inner resolver. Misses are not
/// cached, so an asset that resolves later is picked up.
pub struct CachingSymbolResolver {
    inner: Arc<dyn SymbolResolver>,
    cache: DashMap<(Chain, String), String>,
}

impl CachingSymbolResolver {
    pub fn new(inner: Arc<dyn SymbolResolver>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl SymbolResolver for CachingSymbolResolver {
    async fn resolve(&self, chain: Chain, asset_id: &str) -> Result<Option<String>> {
        let key = (chain, asset_id.to_string());
        if let Some(symbol) = self.cache.get(&key) {
            return Ok(Some(symbol.clone()));
        }

        let resolved = self.inner.resolve(chain, asset_id).await?;
        if let Some(symbol) = &resolved {
            self.cache.insert(key, symbol.clone());
        }
        Ok(resolved)
    }
}
