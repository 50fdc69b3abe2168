//! Job bodies
//!
//! Each job fans out over its records with `join_all` and isolates failures
//! per record. Only the initial listing call can fail a whole run.

use crate::analysis::{AnalysisPipeline, AnalysisResult};
use crate::error::Result;
use crate::persistence::{BalanceSnapshot, PersistenceGateway, User};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use trader_market::{MarketDataGateway, to_exchange_symbol};

/// Outcome of a price sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceSyncReport {
    pub updated: usize,
}

/// Outcome of an analysis cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub results: Vec<AnalysisResult>,
    pub failed: usize,
}

/// Outcome of a balance snapshot run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub snapshots: usize,
    pub total: usize,
}

/// Refresh the price of every tracked instrument with one batched lookup
///
/// Instruments the quote source does not know keep their old price.
pub async fn sync_prices(
    market: &dyn MarketDataGateway,
    store: &dyn PersistenceGateway,
) -> Result<PriceSyncReport> {
    let instruments = store.list_instruments().await?;
    if instruments.is_empty() {
        return Ok(PriceSyncReport { updated: 0 });
    }

    let symbols: Vec<String> = instruments.iter().map(|i| i.symbol.clone()).collect();
    let quotes = market.get_batch_quotes(&symbols).await?;

    let updates = instruments.iter().filter_map(|instrument| {
        quotes
            .get(&to_exchange_symbol(&instrument.symbol))
            .map(|&price| (instrument.symbol.as_str(), price))
    });

    let outcomes = join_all(updates.map(|(symbol, price)| async move {
        match store.update_instrument_price(symbol, price).await {
            Ok(()) => true,
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Failed to update price");
                false
            }
        }
    }))
    .await;

    let updated = outcomes.into_iter().filter(|ok| *ok).count();
    debug!(job = "price_sync", updated, total = instruments.len(), "Prices synced");
    Ok(PriceSyncReport { updated })
}

/// Analyze every tracked instrument concurrently
///
/// A failing instrument is logged and counted; it never fails the cycle.
pub async fn analyze_all(
    pipeline: &AnalysisPipeline,
    store: &dyn PersistenceGateway,
) -> Result<AnalysisReport> {
    let instruments = store.list_instruments().await?;
    let outcomes = join_all(instruments.iter().map(|i| pipeline.analyze(i))).await;

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failed = 0;
    for (instrument, outcome) in instruments.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                error!(symbol = %instrument.symbol, error = %e, "Error analyzing instrument");
                failed += 1;
            }
        }
    }

    info!(
        job = "analysis",
        analyzed = results.len(),
        failed,
        "Analysis cycle finished"
    );
    Ok(AnalysisReport { results, failed })
}

/// Snapshot the balance of every user
///
/// Users without a balance are skipped with a warning.
pub async fn snapshot_balances(store: &dyn PersistenceGateway) -> Result<SnapshotReport> {
    info!(job = "snapshot", "Starting daily balance snapshot");
    let users = store.list_users().await?;
    if users.is_empty() {
        debug!(job = "snapshot", "No users found for balance snapshot");
        return Ok(SnapshotReport {
            snapshots: 0,
            total: 0,
        });
    }

    let outcomes = join_all(users.iter().map(|user| snapshot_user(store, user))).await;
    let snapshots = outcomes.iter().flatten().count();

    info!(
        job = "snapshot",
        snapshots,
        total = users.len(),
        "Balance snapshot completed"
    );
    Ok(SnapshotReport {
        snapshots,
        total: users.len(),
    })
}

async fn snapshot_user(store: &dyn PersistenceGateway, user: &User) -> Option<BalanceSnapshot> {
    let wallet = user.wallet_address.as_str();
    let balance = match store.get_balance(wallet).await {
        Ok(Some(balance)) => balance,
        Ok(None) => {
            warn!(wallet = %wallet, "No balance found, skipping snapshot");
            return None;
        }
        Err(e) => {
            error!(wallet = %wallet, error = %e, "Error reading balance");
            return None;
        }
    };

    match store.record_balance_snapshot(balance.id, balance.amount).await {
        Ok(snapshot) => {
            debug!(wallet = %wallet, amount = balance.amount, "Snapshot created");
            Some(snapshot)
        }
        Err(e) => {
            error!(wallet = %wallet, error = %e, "Error creating snapshot");
            None
        }
    }
}
