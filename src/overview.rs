use alloy_primitives::Address;
use anyhow::Result;
use bon::Builder;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    events::KnownEvent,
    fallback::{self, Deal},
    indexer_client::{IndexerClient, schema::EntityInfo},
    reconciler::{Reconciler, ScanRequest},
    registry::{ContractStore, INSTANCE_PREFIX},
    transport::LogSource,
};

#[derive(Builder, Clone, Debug)]
pub struct OverviewRequest {
    pub chain_id: u64,
    #[builder(default)]
    pub entities: Vec<EntityInfo>,
    #[builder(default = 200)]
    pub limit: usize,
    /// Marketplaces to scan on fallback. When empty, the indexer's factory
    /// deployments are used, then the registered instances.
    #[builder(default)]
    pub addresses: Vec<Address>,
    #[builder(default)]
    pub from_block: u64,
    pub to_block: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Overview {
    pub counts: IndexMap<String, usize>,
    pub users: Vec<Value>,
    pub deals: Vec<Deal>,
}

fn rows(events: &IndexMap<String, Value>, key: &str) -> Vec<Value> {
    events
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

async fn marketplaces<C: ContractStore>(
    indexer: Option<&IndexerClient>,
    store: &C,
    request: &OverviewRequest,
) -> Result<Vec<Address>> {
    if !request.addresses.is_empty() {
        return Ok(request.addresses.clone());
    }
    if let Some(indexer) = indexer {
        let deployed: Vec<Address> = indexer
            .marketplace_deployments()
            .await
            .into_iter()
            .map(|deployment| deployment.marketplace)
            .collect();
        if !deployed.is_empty() {
            info!("Using {} marketplaces from indexer", deployed.len());
            return Ok(deployed);
        }
    }
    Ok(store
        .all(request.chain_id)?
        .into_iter()
        .filter(|(name, _)| name.starts_with(INSTANCE_PREFIX))
        .map(|(_, contract)| contract.address)
        .collect())
}

fn scan_request(
    event: KnownEvent,
    addresses: &[Address],
    request: &OverviewRequest,
) -> Result<ScanRequest> {
    Ok(ScanRequest::builder()
        .addresses(addresses.to_vec())
        .event(event.signature()?)
        .from_block(request.from_block)
        .maybe_to_block(request.to_block)
        .key(event.key())
        .build())
}

/// Event counts, registered users and deals. Users and deals come from the
/// indexer's recent events and fall back to chain scans when it has none.
pub async fn overview<S: LogSource, C: ContractStore>(
    indexer: Option<&IndexerClient>,
    reconciler: &Reconciler<S>,
    store: &C,
    request: &OverviewRequest,
) -> Result<Overview> {
    let mut overview = Overview::default();
    let mut recent = None;
    if let Some(indexer) = indexer {
        match indexer.event_counts(&request.entities).await {
            Ok(counts) => overview.counts = counts,
            Err(e) => warn!("Failed to load event counts: {}", e),
        }
        if !request.entities.is_empty() {
            match indexer.recent_events(&request.entities, request.limit).await {
                Ok(events) => recent = Some(events),
                Err(e) => warn!("Failed to load recent events: {}", e),
            }
        }
    }

    if let Some(events) = &recent {
        if let Some(key) = fallback::find_users_key(events) {
            overview.users = rows(events, key);
        }
        if let Some(key) = fallback::find_deals_key(events) {
            overview.deals = fallback::normalize_deals(key, rows(events, key));
        }
    }
    if !overview.users.is_empty() && !overview.deals.is_empty() {
        return Ok(overview);
    }

    // Recent events already reflect what the indexer holds.
    let collection_source = if recent.is_some() { None } else { indexer };
    let addresses = marketplaces(indexer, store, request).await?;

    if overview.users.is_empty() {
        let scan = scan_request(KnownEvent::UserRegistered, &addresses, request)?;
        overview.users = fallback::load_users(collection_source, reconciler, &scan).await;
    }
    if overview.deals.is_empty() {
        let scan = scan_request(KnownEvent::DealCreated, &addresses, request)?;
        overview.deals = fallback::load_deals(collection_source, reconciler, &scan).await;
    }
    Ok(overview)
}
