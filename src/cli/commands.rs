//! CLI command implementations

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::detect::DetectorSet;
use crate::ingest::{
    CachingSymbolResolver, ChainIngestor, JupiterPriceResolver, ReplayFetcher,
    StaticSymbolResolver, TransactionFetcher,
};
use crate::model::Chain;
use crate::profile::Profiler;
use crate::store::{MomentSink, Store};

/// Start the engine: one ingestion loop per chain with monitored wallets.
pub async fn start(config: &Config, replay: Option<&Path>, once: bool) -> Result<()> {
    info!("Starting wallet intelligence engine...");

    let store = Arc::new(Store::new());
    let sink = Arc::new(MomentSink::new());
    let profiler = Arc::new(Profiler::new(config.profiler.clone()));
    let detectors = Arc::new(DetectorSet::new(
        config.detectors.clone(),
        &config.classifier,
        store.clone(),
        sink.clone(),
    ));

    let mut chains = Vec::new();
    for chain in [Chain::Sol, Chain::Base] {
        let wallets = config.wallets_for(chain);
        if wallets.is_empty() {
            continue;
        }
        info!(chain = %chain, wallets = wallets.len(), "Monitoring wallets");
        for wallet in wallets {
            store.upsert_wallet(wallet);
        }
        chains.push(chain);
    }
    if chains.is_empty() {
        anyhow::bail!("no wallets configured; add [[wallets]] entries to the config file");
    }

    let fetcher: Arc<dyn TransactionFetcher> = match replay {
        Some(path) => {
            let fetcher = ReplayFetcher::from_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load replay file: {e}"))?;
            info!(
                transactions = fetcher.transaction_count(),
                "Replaying transactions from file"
            );
            Arc::new(fetcher)
        }
        None => anyhow::bail!("no transaction source configured; pass --replay <file>"),
    };

    let symbols = Arc::new(CachingSymbolResolver::new(Arc::new(
        StaticSymbolResolver::new(config.tokens.clone()),
    )));
    let prices = Arc::new(JupiterPriceResolver::new(config.price.clone()));
    if !config.price.enabled {
        warn!("USD price lookups disabled; events will carry raw amounts only");
    }

    let ingestors: Vec<Arc<ChainIngestor>> = chains
        .iter()
        .map(|&chain| {
            Arc::new(ChainIngestor::new(
                chain,
                config.schedule(chain).clone(),
                config.classifier.clone(),
                store.clone(),
                profiler.clone(),
                detectors.clone(),
                fetcher.clone(),
                symbols.clone(),
                prices.clone(),
            ))
        })
        .collect();

    if once {
        for ingestor in &ingestors {
            ingestor.run_cycle().await;
        }
        print_summary(&store, &sink);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for ingestor in ingestors {
        let token = cancel.child_token();
        handles.push(tokio::spawn(async move {
            ingestor.run(token).await;
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();
    futures::future::join_all(handles).await;

    print_summary(&store, &sink);
    Ok(())
}

fn print_summary(store: &Store, sink: &MomentSink) {
    let profiles = store.profiles_snapshot();
    info!(
        profiles = profiles.len(),
        moments = sink.len(),
        "Engine summary"
    );
    for moment in sink.recent(20) {
        println!(
            "[{}] {} {} (severity {}): {}",
            moment.detected_at.format("%H:%M:%S"),
            moment.kind,
            moment.token_symbol.as_deref().unwrap_or("-"),
            moment.severity,
            moment.description
        );
    }
}

/// Show the effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// List configured wallets.
pub fn wallets(config: &Config) -> Result<()> {
    if config.wallets.is_empty() {
        println!("No wallets configured.");
        return Ok(());
    }
    for entry in &config.wallets {
        let wallet = entry.to_wallet();
        println!(
            "{:<6} {:<24} tier {:?} {} {}",
            wallet.chain.to_string(),
            wallet.name,
            wallet.reputation_tier,
            wallet.short_address(),
            if wallet.is_active { "" } else { "(inactive)" }
        );
    }
    Ok(())
}
