use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    events::KnownEvent,
    indexer_client::IndexerClient,
    reconciler::{ReconciledRecord, Reconciler, ScanRequest},
    transport::LogSource,
};

#[derive(Clone, Debug)]
pub enum Loaded {
    Indexed(Vec<Value>),
    Reconciled(Vec<ReconciledRecord>),
}

impl Loaded {
    pub fn len(&self) -> usize {
        match self {
            Loaded::Indexed(rows) => rows.len(),
            Loaded::Reconciled(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Loaded::Indexed(rows) => rows,
            Loaded::Reconciled(records) => records
                .into_iter()
                .filter_map(|record| serde_json::to_value(record).ok())
                .collect(),
        }
    }
}

/// Reads `collection` from the indexer and falls back to a chain scan when
/// the indexer is missing, failing or still empty.
pub async fn load_collection<S: LogSource>(
    indexer: Option<&IndexerClient>,
    collection: &str,
    fields: &[&str],
    reconciler: &Reconciler<S>,
    request: &ScanRequest,
) -> Loaded {
    if let Some(indexer) = indexer {
        match indexer.collection(collection, fields, None).await {
            Ok(rows) if !rows.is_empty() => {
                info!("Loaded {} {} rows from indexer", rows.len(), collection);
                return Loaded::Indexed(rows);
            }
            Ok(_) => info!("Indexer has no {} rows yet, scanning chain", collection),
            Err(e) => warn!("Indexer query for {} failed, scanning chain: {}", collection, e),
        }
    }
    Loaded::Reconciled(reconciler.scan(request).await)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub deal_id: Option<Value>,
    pub payer: Option<Value>,
    pub beneficiary: Option<Value>,
    pub amount: Option<Value>,
    pub marketplace: Option<Value>,
    pub raw: Value,
}

fn first_of(raw: &Value, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find(|v| !v.is_null())
        .cloned()
}

fn nested(raw: &Value, key: &str) -> Option<Value> {
    raw.get("args")
        .and_then(|args| args.get(key))
        .filter(|v| !v.is_null())
        .cloned()
}

fn id_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Deal {
    /// Maps a deal-like row from either source onto one shape. Rows without
    /// an id fall back to `<collection>_<index>`.
    pub fn normalize(collection: &str, raw: Value, index: usize) -> Self {
        let id = first_of(&raw, &["id", "dealId"])
            .map(id_string)
            .unwrap_or_else(|| format!("{}_{}", collection, index));
        Deal {
            id,
            deal_id: first_of(&raw, &["dealId", "id"]),
            payer: first_of(&raw, &["payer", "payerAddress"]).or_else(|| nested(&raw, "payer")),
            beneficiary: first_of(&raw, &["beneficiary", "beneficiaryAddress"])
                .or_else(|| nested(&raw, "beneficiary")),
            amount: first_of(&raw, &["amount"]).or_else(|| nested(&raw, "amount")),
            marketplace: first_of(&raw, &["marketplace", "marketplaceAddress", "sourceAddress"]),
            raw,
        }
    }
}

/// Key of the first collection that looks like it holds registered users.
pub fn find_users_key(events: &IndexMap<String, Value>) -> Option<&str> {
    events
        .keys()
        .find(|key| key.to_lowercase().contains("user"))
        .map(String::as_str)
}

/// Key of the first collection that looks like it holds deals.
pub fn find_deals_key(events: &IndexMap<String, Value>) -> Option<&str> {
    events
        .keys()
        .find(|key| key.to_lowercase().contains("deal"))
        .map(String::as_str)
}

pub fn normalize_deals(collection: &str, rows: Vec<Value>) -> Vec<Deal> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| Deal::normalize(collection, row, i))
        .collect()
}

pub async fn load_deals<S: LogSource>(
    indexer: Option<&IndexerClient>,
    reconciler: &Reconciler<S>,
    request: &ScanRequest,
) -> Vec<Deal> {
    let collection = KnownEvent::DealCreated.collection();
    let loaded = load_collection(
        indexer,
        collection,
        &["id", "dealId", "payer", "beneficiary", "amount"],
        reconciler,
        request,
    )
    .await;
    normalize_deals(collection, loaded.into_values())
}

pub async fn load_users<S: LogSource>(
    indexer: Option<&IndexerClient>,
    reconciler: &Reconciler<S>,
    request: &ScanRequest,
) -> Vec<Value> {
    load_collection(
        indexer,
        KnownEvent::UserRegistered.collection(),
        &["id", "user", "isPayer", "isBeneficiary", "isJudge"],
        reconciler,
        request,
    )
    .await
    .into_values()
}
