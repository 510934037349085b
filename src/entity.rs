use alloy_primitives::{Address, B256};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    abi::{self, DecodedEvent, EventSignature, Token},
    rpc_client::types::{BlockTag, LogFilter, LogRecord},
    transport::LogSource,
};

pub fn entity_id(chain_id: u64, block_number: u64, log_index: u64) -> String {
    format!("{}_{}_{}", chain_id, block_number, log_index)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, Token>,
    pub block_number: u64,
    pub transaction_hash: Option<B256>,
}

impl Entity {
    /// `None` for logs that are not yet mined.
    pub fn from_log(chain_id: u64, log: &LogRecord, decoded: DecodedEvent) -> Option<Self> {
        let block_number = log.block_number?;
        let log_index = log.log_index?;
        Some(Entity {
            id: entity_id(chain_id, block_number, log_index),
            fields: decoded.args,
            block_number,
            transaction_hash: log.transaction_hash,
        })
    }
}

/// Entities grouped by `<Contract>_<Event>` collection, upserted by id.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EntityStore {
    collections: IndexMap<String, IndexMap<String, Entity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, entity: Entity) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(entity.id.clone(), entity);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&Entity> {
        self.collections.get(collection)?.get(id)
    }

    pub fn collection(&self, collection: &str) -> Vec<&Entity> {
        self.collections
            .get(collection)
            .map(|entities| entities.values().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(IndexMap::is_empty)
    }
}

pub fn collection_name(contract: &str, event: &EventSignature) -> String {
    format!("{}_{}", contract, event.name())
}

/// Fetches `event` logs emitted by `address` and upserts one entity per log.
/// Returns the number of entities written.
#[allow(clippy::too_many_arguments)]
pub async fn index<S: LogSource>(
    source: &S,
    store: &mut EntityStore,
    chain_id: u64,
    collection: &str,
    address: Address,
    event: &EventSignature,
    from_block: BlockTag,
    to_block: BlockTag,
) -> usize {
    let filter = LogFilter::new(address, event.selector(), from_block, to_block);
    let logs = match source.get_logs(&filter).await {
        Ok(logs) => logs,
        Err(e) => {
            warn!("Failed to fetch {} logs for {}: {}", event.name(), address, e);
            return 0;
        }
    };

    let mut written = 0;
    for log in logs {
        if log.address != address || log.removed {
            warn!("Skipping {} log from {}", event.name(), log.address);
            continue;
        }
        let decoded = match abi::decode_log(event, &log.topics, log.data.as_ref()) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    "Skipping undecodable {} log at block {:?}: {}",
                    event.name(),
                    log.block_number,
                    e
                );
                continue;
            }
        };
        match Entity::from_log(chain_id, &log, decoded) {
            Some(entity) => {
                store.set(collection, entity);
                written += 1;
            }
            None => warn!("Skipping pending {} log", event.name()),
        }
    }
    info!("Indexed {} {} entities", written, collection);
    written
}
