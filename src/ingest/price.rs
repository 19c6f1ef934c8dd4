//! USD price resolution
//!
//! Prices come from the Jupiter price API and are cached for a configurable
//! freshness window so a burst of events on the same token costs one lookup.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::PriceConfig;
use crate::error::{Error, Result};
use crate::model::Chain;

use super::PriceResolver;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, Option<PriceEntry>>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    price: String,
}

/// Jupiter price API client with a freshness-bounded cache.
pub struct JupiterPriceResolver {
    config: PriceConfig,
    client: reqwest::Client,
    cache: DashMap<String, (f64, DateTime<Utc>)>,
}

impl JupiterPriceResolver {
    pub fn new(config: PriceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            cache: DashMap::new(),
        }
    }

    fn cached(&self, symbol: &str) -> Option<f64> {
        let entry = self.cache.get(symbol)?;
        let (price, fetched) = *entry;
        let fresh = Utc::now() - fetched < Duration::seconds(self.config.cache_secs as i64);
        fresh.then_some(price)
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}?ids={}", self.config.endpoint, symbol);
        let resp = self.client.get(&url).send().await?;
        let body: PriceResponse = resp.json().await?;

        let price = body
            .data
            .get(symbol)
            .and_then(|entry| entry.as_ref())
            .map(|entry| entry.price.parse::<f64>())
            .transpose()
            .map_err(|e| Error::Price(format!("unparseable price for {symbol}: {e}")))?;

        if let Some(price) = price {
            self.cache.insert(symbol.to_string(), (price, Utc::now()));
            debug!(symbol = %symbol, price = %format!("{price:.4}"), "Price fetched");
        }
        Ok(price)
    }
}

#[async_trait]
impl PriceResolver for JupiterPriceResolver {
    async fn usd_value(&self, _chain: Chain, symbol: &str, amount: f64) -> Result<Option<f64>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let price = match self.cached(symbol) {
            Some(price) => Some(price),
            None => self.fetch_price(symbol).await?,
        };
        Ok(price.map(|p| p * amount))
    }
}

/// Disables USD annotation entirely; events carry amounts only.
pub struct NullPriceResolver;

#[async_trait]
impl PriceResolver for NullPriceResolver {
    async fn usd_value(&self, _chain: Chain, _symbol: &str, _amount: f64) -> Result<Option<f64>> {
        Ok(None)
    }
}
