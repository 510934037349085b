use alloy_primitives::{Address, B256};
use bon::Builder;
use indexmap::{IndexMap, map::Entry};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::Serialize;
use thiserror::Error as ThisError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    abi::{self, EventSignature, Token},
    retry::{new_backoff_limited, retry},
    rpc_client::types::{BlockTag, LogFilter, LogRecord},
    transport::LogSource,
};

/// How the identity part of a record id is derived.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The stable string of one decoded parameter (e.g. `user`, `dealId`).
    Field(String),
    /// `blockNumber_logIndex`, for events without a natural identity.
    #[default]
    LogPosition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Populated,
    Empty,
    Aborted,
}

#[derive(Builder, Clone, Debug)]
pub struct ScanRequest {
    pub addresses: Vec<Address>,
    pub event: EventSignature,
    #[builder(default)]
    pub from_block: u64,
    /// `None` means the chain head at the start of the scan.
    pub to_block: Option<u64>,
    #[builder(default)]
    pub key: KeyStrategy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledRecord {
    pub id: String,
    #[serde(serialize_with = "abi::serialize_checksummed")]
    pub source_address: Address,
    pub event_name: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, Token>,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<B256>,
}

#[derive(ThisError, Debug)]
enum SkipReason {
    #[error(transparent)]
    Decode(#[from] abi::Error),
    #[error("log is pending")]
    Pending,
    #[error("log was removed by a reorg")]
    Removed,
    #[error("log was emitted by {0}")]
    ForeignAddress(Address),
    #[error("decoded event has no field {0}")]
    MissingKey(String),
}

pub fn record_id(address: &Address, identity: &str) -> String {
    format!("0x{}_{}", hex::encode(address.as_slice()), identity)
}

fn to_record(
    address: Address,
    event: &EventSignature,
    key: &KeyStrategy,
    log: LogRecord,
) -> Result<ReconciledRecord, SkipReason> {
    if log.address != address {
        return Err(SkipReason::ForeignAddress(log.address));
    }
    if log.removed {
        return Err(SkipReason::Removed);
    }
    let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
        return Err(SkipReason::Pending);
    };

    let decoded = abi::decode_log(event, &log.topics, log.data.as_ref())?;
    let identity = match key {
        KeyStrategy::Field(name) => decoded
            .args
            .get(name)
            .ok_or_else(|| SkipReason::MissingKey(name.clone()))?
            .stable_string(),
        KeyStrategy::LogPosition => format!("{}_{}", block_number, log_index),
    };

    Ok(ReconciledRecord {
        id: record_id(&address, &identity),
        source_address: address,
        event_name: decoded.event_name,
        fields: decoded.args,
        block_number,
        log_index,
        transaction_hash: log.transaction_hash,
    })
}

fn decode_batch(
    address: Address,
    event: &EventSignature,
    key: &KeyStrategy,
    mut logs: Vec<LogRecord>,
) -> Vec<ReconciledRecord> {
    logs.sort_by_key(|log| {
        (
            log.block_number.unwrap_or(u64::MAX),
            log.log_index.unwrap_or(u64::MAX),
        )
    });

    let results: Vec<_> = logs
        .into_par_iter()
        .map(|log| {
            let position = (log.block_number, log.log_index);
            (position, to_record(address, event, key, log))
        })
        .collect();

    results
        .into_iter()
        .filter_map(|((block_number, log_index), result)| match result {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    "Skipping {} log from {} (block {:?}, index {:?}): {}",
                    event.name(),
                    address,
                    block_number,
                    log_index,
                    e
                );
                None
            }
        })
        .collect()
}

/// Keeps the first record seen for every id, in first-seen order.
pub fn dedup(records: impl IntoIterator<Item = ReconciledRecord>) -> Vec<ReconciledRecord> {
    let mut unique: IndexMap<String, ReconciledRecord> = IndexMap::new();
    let mut dropped = 0;
    for record in records {
        match unique.entry(record.id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
            Entry::Occupied(_) => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("Dropped {} duplicate records", dropped);
    }
    unique.into_values().collect()
}

/// Rebuilds a view of one event type straight from chain logs.
///
/// Every failure below the scan boundary is logged and degrades to fewer
/// records; `scan` itself never fails.
#[derive(Debug)]
pub struct Reconciler<S> {
    transport: Option<S>,
    cancel_token: CancellationToken,
    state: watch::Sender<ScanState>,
}

impl<S: LogSource> Reconciler<S> {
    pub fn new(transport: Option<S>, cancel_token: CancellationToken) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            transport,
            cancel_token,
            state,
        }
    }

    pub fn transport(&self) -> Option<&S> {
        self.transport.as_ref()
    }

    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    async fn resolve_to_block(&self, source: &S, to_block: Option<u64>) -> BlockTag {
        if let Some(n) = to_block {
            return BlockTag::Number(n);
        }
        match retry(
            move || source.block_number(),
            "get block number",
            new_backoff_limited(),
            self.cancel_token.clone(),
        )
        .await
        {
            Ok(n) => BlockTag::Number(n),
            Err(e) => {
                warn!("Could not pin chain head, scanning to latest: {}", e);
                BlockTag::Latest
            }
        }
    }

    pub async fn scan(&self, request: &ScanRequest) -> Vec<ReconciledRecord> {
        if request.addresses.is_empty() {
            debug!("No addresses to scan for {}", request.event.name());
            self.state.send_replace(ScanState::Empty);
            return vec![];
        }

        let Some(source) = &self.transport else {
            warn!(
                "No transport available, skipping {} scan",
                request.event.name()
            );
            self.state.send_replace(ScanState::Aborted);
            return vec![];
        };

        self.state.send_replace(ScanState::Scanning);
        let selector = request.event.selector();
        let from_block = BlockTag::Number(request.from_block);
        let to_block = self.resolve_to_block(source, request.to_block).await;

        let mut accumulator = vec![];
        for address in request.addresses.iter() {
            let filter = LogFilter::new(*address, selector, from_block, to_block);
            let logs = match source.get_logs(&filter).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!(
                        "Failed to fetch {} logs for {}: {}",
                        request.event.name(),
                        address,
                        e
                    );
                    continue;
                }
            };
            debug!("Fetched {} {} logs for {}", logs.len(), request.event.name(), address);
            accumulator.extend(decode_batch(*address, &request.event, &request.key, logs));
        }

        let records = dedup(accumulator);
        info!(
            "Reconciled {} {} records from {} addresses",
            records.len(),
            request.event.name(),
            request.addresses.len()
        );
        self.state.send_replace(if records.is_empty() {
            ScanState::Empty
        } else {
            ScanState::Populated
        });
        records
    }
}
