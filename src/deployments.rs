use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::{
    events::KnownEvent,
    reconciler::{ReconciledRecord, Reconciler, ScanRequest},
    registry::{self, ContractRef, ContractStore, Contracts},
    transport::LogSource,
};

/// Reads a `{ "<Name>": { "address": ... } }` deployment file.
pub fn load_deployments(path: &Path) -> Result<Contracts> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read deployments {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse deployments {}", path.display()))
}

pub fn find_factory(contracts: &Contracts) -> Option<(&String, &ContractRef)> {
    contracts
        .iter()
        .find(|(name, _)| name.to_lowercase().contains("factory"))
}

/// Marketplaces announced by the factory, in deployment order.
pub fn contract_refs(records: &[ReconciledRecord]) -> Vec<ContractRef> {
    records
        .iter()
        .filter_map(|record| {
            let Some(address) = record.fields.get("marketplace").and_then(|t| t.as_address())
            else {
                warn!("Deployment record {} has no marketplace address", record.id);
                return None;
            };
            Some(ContractRef {
                address,
                creator: record.fields.get("creator").and_then(|t| t.as_address()),
                deployed_on_block: Some(record.block_number),
                abi: None,
            })
        })
        .collect()
}

pub async fn discover<S: LogSource, T: ContractStore>(
    reconciler: &Reconciler<S>,
    store: &T,
    chain_id: u64,
    deployments: &Contracts,
    from_block: u64,
    to_block: Option<u64>,
) -> Result<Contracts> {
    let (name, factory) =
        find_factory(deployments).ok_or_else(|| anyhow!("No factory contract in deployments"))?;
    info!("Discovering marketplaces deployed by {} at {}", name, factory.address);

    let event = KnownEvent::MarketplaceDeployed;
    let request = ScanRequest::builder()
        .addresses(vec![factory.address])
        .event(event.signature()?)
        .from_block(factory.deployed_on_block.unwrap_or(from_block).max(from_block))
        .maybe_to_block(to_block)
        .key(event.key())
        .build();
    let records = reconciler.scan(&request).await;

    registry::register_instances(store, chain_id, contract_refs(&records))
}
