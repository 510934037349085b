use std::{path::PathBuf, time::Duration};

use alloy_primitives::Address;
use backon::ConstantBuilder;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::{events::KnownEvent, logging, retry::new_backoff_fixed};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[clap(
    author = "Lancer Protocol",
    version = "0.1.0",
    about = "Lancer",
    long_about = r#"Reconciles Lancer marketplace events straight from chain logs"#
)]
pub struct Config {
    #[clap(
        long,
        env = "LOG_FORMAT",
        help = "Log format (plain, json)",
        default_value = "plain"
    )]
    pub log_format: logging::Format,

    #[clap(
        long,
        env = "RPC_URL",
        help = "URL of the JSON-RPC node",
        default_value = "http://localhost:8545"
    )]
    pub rpc_url: Option<String>,

    #[clap(long, env = "RPC_USER", help = "User for RPC basic authentication")]
    pub rpc_user: Option<String>,

    #[serde(skip_serializing)]
    #[clap(
        long,
        env = "RPC_PASSWORD",
        help = "Password for RPC basic authentication"
    )]
    pub rpc_password: Option<String>,

    #[clap(
        long,
        env = "RPC_TIMEOUT_SECS",
        help = "Timeout for each HTTP request in seconds",
        default_value = "30"
    )]
    pub rpc_timeout_secs: u64,

    #[clap(
        long,
        env = "INDEXER_URL",
        help = "GraphQL endpoint of the indexing service (e.g., http://localhost:8080/v1/graphql)"
    )]
    pub indexer_url: Option<String>,

    #[clap(
        long,
        env = "CHAIN_ID",
        help = "Chain id; asked from the node when omitted (e.g. 31337)"
    )]
    pub chain_id: Option<u64>,

    #[clap(
        long,
        env = "FROM_BLOCK",
        help = "First block to scan",
        default_value = "0"
    )]
    pub from_block: u64,

    #[clap(
        long,
        env = "TO_BLOCK",
        help = "Last block to scan; the chain head when omitted"
    )]
    pub to_block: Option<u64>,

    #[clap(
        long,
        env = "HANDLE_RETRY_ATTEMPTS",
        help = "Attempts to acquire the session client before using raw RPC",
        default_value = "3"
    )]
    pub handle_retry_attempts: usize,

    #[clap(
        long,
        env = "HANDLE_RETRY_DELAY_MS",
        help = "Delay between session client attempts in milliseconds",
        default_value = "500"
    )]
    pub handle_retry_delay_ms: u64,

    #[clap(
        long,
        env = "STORE_PATH",
        help = "JSON file holding dynamically registered contracts",
        default_value = "dynamic_contracts.json"
    )]
    pub store_path: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum Command {
    /// Reconcile one event type across contract addresses
    Scan {
        #[clap(
            long,
            value_enum,
            conflicts_with = "signature",
            required_unless_present = "signature"
        )]
        event: Option<KnownEvent>,

        #[clap(
            long,
            help = "Event signature (e.g. \"Transfer(address indexed from, address indexed to, uint256 value)\")"
        )]
        signature: Option<String>,

        #[clap(
            long,
            help = "Decoded field identifying an entity; defaults to the event's own key, or the log position"
        )]
        key: Option<String>,

        #[clap(required = true)]
        addresses: Vec<Address>,
    },

    /// Find marketplaces deployed by the factory and register them
    Discover {
        #[clap(long, help = "Deployment file with the factory address")]
        deployments: PathBuf,
    },

    /// Index one contract's events into entities
    Index {
        #[clap(long, help = "Contract name used to build the collection name")]
        contract: String,

        #[clap(
            long,
            value_enum,
            conflicts_with = "signature",
            required_unless_present = "signature"
        )]
        event: Option<KnownEvent>,

        #[clap(long)]
        signature: Option<String>,

        address: Address,
    },

    /// Summarize indexed events and deals, scanning chain when the indexer is empty
    Overview {
        #[clap(long, help = "GraphQL schema of the indexer", default_value = "schema.graphql")]
        schema: PathBuf,

        #[clap(long, default_value = "200")]
        limit: usize,

        #[clap(
            help = "Marketplace addresses; the indexer's deployments, then registered instances, when omitted"
        )]
        addresses: Vec<Address>,
    },
}

impl Config {
    pub fn rpc_credentials(&self) -> Option<(String, String)> {
        self.rpc_user
            .clone()
            .map(|user| (user, self.rpc_password.clone().unwrap_or_default()))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn handle_backoff(&self) -> ConstantBuilder {
        new_backoff_fixed(
            self.handle_retry_attempts,
            Duration::from_millis(self.handle_retry_delay_ms),
        )
    }
}
