use std::fs;

use anyhow::{Context, Result, anyhow};
use lancer::{
    abi::EventSignature,
    config::{Command, Config},
    deployments, entity,
    events::KnownEvent,
    indexer_client::{IndexerClient, schema},
    logging,
    overview::{self, OverviewRequest},
    reconciler::{KeyStrategy, Reconciler, ScanRequest},
    registry::{self, ContractStore, FileStore},
    rpc_client::{self, types::BlockTag},
    stopper,
    transport::Transport,
};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_CHAIN_ID: u64 = 31337;

fn resolve_event(
    event: Option<KnownEvent>,
    signature: Option<&str>,
    key: Option<&str>,
) -> Result<(EventSignature, KeyStrategy)> {
    let (signature, default_key) = match (event, signature) {
        (Some(event), _) => (event.signature()?, event.key()),
        (None, Some(signature)) => (
            signature
                .parse()
                .with_context(|| format!("Invalid event signature {}", signature))?,
            KeyStrategy::LogPosition,
        ),
        (None, None) => return Err(anyhow!("Either --event or --signature is required")),
    };
    let key = key.map_or(default_key, |name| KeyStrategy::Field(name.to_string()));
    Ok((signature, key))
}

async fn chain_id(config: &Config, rpc: Option<&rpc_client::Client>) -> u64 {
    if let Some(chain_id) = config.chain_id {
        return chain_id;
    }
    if let Some(rpc) = rpc {
        match rpc.chain_id().await {
            Ok(chain_id) => return chain_id,
            Err(e) => warn!("Failed to read chain id from node: {}", e),
        }
    }
    DEFAULT_CHAIN_ID
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logging::setup(config.log_format);
    debug!("Config: {}", serde_json::to_string(&config)?);

    let cancel_token = CancellationToken::new();
    let stopper_handle = stopper::run(cancel_token.clone())?;

    let rpc = rpc_client::Client::new_from_config(&config)?;
    let indexer = IndexerClient::new_from_config(&config)?;
    let chain_id = chain_id(&config, rpc.as_ref()).await;
    info!("Using chain {}", chain_id);

    let transport = Transport::<rpc_client::Client>::resolve(
        None,
        rpc,
        config.handle_backoff(),
        cancel_token.clone(),
    )
    .await;
    let reconciler = Reconciler::new(transport, cancel_token.clone());
    let store = FileStore::new(config.store_path.clone());

    match &config.command {
        Command::Scan {
            event,
            signature,
            key,
            addresses,
        } => {
            let (event, key) = resolve_event(*event, signature.as_deref(), key.as_deref())?;
            let request = ScanRequest::builder()
                .addresses(addresses.clone())
                .event(event)
                .from_block(config.from_block)
                .maybe_to_block(config.to_block)
                .key(key)
                .build();
            print(&reconciler.scan(&request).await)?;
        }
        Command::Discover {
            deployments: path,
        } => {
            let static_contracts = deployments::load_deployments(path)?;
            let from_indexer = match &indexer {
                Some(indexer) => indexer.marketplace_deployments().await,
                None => vec![],
            };
            if from_indexer.is_empty() {
                deployments::discover(
                    &reconciler,
                    &store,
                    chain_id,
                    &static_contracts,
                    config.from_block,
                    config.to_block,
                )
                .await?;
            } else {
                registry::register_instances(
                    &store,
                    chain_id,
                    from_indexer.into_iter().map(Into::into),
                )?;
            }
            print(&registry::merge(&static_contracts, &store.all(chain_id)?))?;
        }
        Command::Index {
            contract,
            event,
            signature,
            address,
        } => {
            let (event, _) = resolve_event(*event, signature.as_deref(), None)?;
            let collection = entity::collection_name(contract, &event);
            let mut entities = entity::EntityStore::new();
            match reconciler.transport() {
                Some(source) => {
                    entity::index(
                        source,
                        &mut entities,
                        chain_id,
                        &collection,
                        *address,
                        &event,
                        BlockTag::Number(config.from_block),
                        config.to_block.map_or(BlockTag::Latest, BlockTag::Number),
                    )
                    .await;
                }
                None => warn!("No transport available, nothing indexed"),
            }
            print(&entities.collection(&collection))?;
        }
        Command::Overview {
            schema: schema_path,
            limit,
            addresses,
        } => {
            let entities = match fs::read_to_string(schema_path) {
                Ok(contents) => schema::parse_schema_entities(&contents),
                Err(e) => {
                    warn!("Failed to read schema {}: {}", schema_path.display(), e);
                    vec![]
                }
            };

            let request = OverviewRequest::builder()
                .chain_id(chain_id)
                .entities(entities)
                .limit(*limit)
                .addresses(addresses.clone())
                .from_block(config.from_block)
                .maybe_to_block(config.to_block)
                .build();
            print(&overview::overview(indexer.as_ref(), &reconciler, &store, &request).await?)?;
        }
    }

    cancel_token.cancel();
    stopper_handle.await?;
    Ok(())
}
