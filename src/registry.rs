use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use alloy_primitives::Address;
use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub const INSTANCE_PREFIX: &str = "MarketplaceInstance_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRef {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_on_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Value>,
}

impl ContractRef {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            creator: None,
            deployed_on_block: None,
            abi: None,
        }
    }
}

pub type Contracts = IndexMap<String, ContractRef>;

/// Chain-scoped name to contract lookup shared between runs.
pub trait ContractStore {
    fn get(&self, chain_id: u64, name: &str) -> Result<Option<ContractRef>>;
    fn put(&self, chain_id: u64, name: &str, contract: ContractRef) -> Result<()>;
    fn all(&self, chain_id: u64) -> Result<Contracts>;
}

type Layout = BTreeMap<String, Contracts>;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    chains: Arc<Mutex<Layout>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Layout>> {
        self.chains
            .lock()
            .map_err(|e| anyhow!("Contract store poisoned: {}", e))
    }
}

impl ContractStore for MemoryStore {
    fn get(&self, chain_id: u64, name: &str) -> Result<Option<ContractRef>> {
        Ok(self
            .lock()?
            .get(&chain_id.to_string())
            .and_then(|contracts| contracts.get(name))
            .cloned())
    }

    fn put(&self, chain_id: u64, name: &str, contract: ContractRef) -> Result<()> {
        self.lock()?
            .entry(chain_id.to_string())
            .or_default()
            .insert(name.to_string(), contract);
        Ok(())
    }

    fn all(&self, chain_id: u64) -> Result<Contracts> {
        Ok(self
            .lock()?
            .get(&chain_id.to_string())
            .cloned()
            .unwrap_or_default())
    }
}

/// JSON file keyed by chain id, then contract name. Unreadable contents are
/// treated as an empty store and overwritten on the next `put`.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Layout> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Layout::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        match serde_json::from_str(&contents) {
            Ok(layout) => Ok(layout),
            Err(e) => {
                warn!(
                    "Ignoring unparsable contract store {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Layout::new())
            }
        }
    }

    fn write(&self, layout: &Layout) -> Result<()> {
        let contents = serde_json::to_string_pretty(layout)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

impl ContractStore for FileStore {
    fn get(&self, chain_id: u64, name: &str) -> Result<Option<ContractRef>> {
        Ok(self
            .read()?
            .get(&chain_id.to_string())
            .and_then(|contracts| contracts.get(name))
            .cloned())
    }

    fn put(&self, chain_id: u64, name: &str, contract: ContractRef) -> Result<()> {
        let mut layout = self.read()?;
        layout
            .entry(chain_id.to_string())
            .or_default()
            .insert(name.to_string(), contract);
        self.write(&layout)
    }

    fn all(&self, chain_id: u64) -> Result<Contracts> {
        Ok(self
            .read()?
            .remove(&chain_id.to_string())
            .unwrap_or_default())
    }
}

pub fn instance_name(address: &Address) -> String {
    let checksummed = address.to_checksum(None);
    format!("{}{}", INSTANCE_PREFIX, &checksummed[2..8])
}

/// Dynamic entries replace static ones with the same name.
pub fn merge(static_contracts: &Contracts, dynamic: &Contracts) -> Contracts {
    let mut merged = static_contracts.clone();
    for (name, contract) in dynamic {
        merged.insert(name.clone(), contract.clone());
    }
    merged
}

pub fn register_instances<S: ContractStore>(
    store: &S,
    chain_id: u64,
    contracts: impl IntoIterator<Item = ContractRef>,
) -> Result<Contracts> {
    let mut registered = Contracts::new();
    for contract in contracts {
        let name = instance_name(&contract.address);
        store.put(chain_id, &name, contract.clone())?;
        registered.insert(name, contract);
    }
    info!(
        "Registered {} marketplace instances on chain {}",
        registered.len(),
        chain_id
    );
    Ok(registered)
}
