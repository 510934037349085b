use backon::ConstantBuilder;
use thiserror::Error as ThisError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    retry::retry,
    rpc_client::{
        self,
        types::{LogFilter, LogRecord},
    },
    session::SessionSlot,
};

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Client handle not yet available")]
    HandleUnavailable,
}

/// Anything that can answer `eth_blockNumber` and `eth_getLogs`.
pub trait LogSource: Send + Sync + Clone + 'static {
    fn block_number(&self) -> impl Future<Output = Result<u64, rpc_client::Error>> + Send;

    fn get_logs(
        &self,
        filter: &LogFilter,
    ) -> impl Future<Output = Result<Vec<LogRecord>, rpc_client::Error>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Session,
    Rpc,
}

/// The log source chosen once, at construction: the wallet session's client
/// when it shows up in time, the raw JSON-RPC endpoint otherwise.
#[derive(Clone, Debug)]
pub enum Transport<C> {
    Session(C),
    Rpc(rpc_client::Client),
}

impl<C: LogSource> Transport<C> {
    /// Returns `None` when neither a session handle nor an RPC endpoint is
    /// available.
    pub async fn resolve(
        slot: Option<&SessionSlot<C>>,
        fallback: Option<rpc_client::Client>,
        backoff: ConstantBuilder,
        cancel_token: CancellationToken,
    ) -> Option<Self> {
        if let Some(slot) = slot {
            match retry(
                move || async move { slot.current().ok_or(Error::HandleUnavailable) },
                "acquire client handle",
                backoff,
                cancel_token,
            )
            .await
            {
                Ok(session) => {
                    info!("Using session client on chain {}", session.chain_id);
                    return Some(Transport::Session(session.client));
                }
                Err(e) => warn!("Session client unavailable: {}", e),
            }
        }

        match fallback {
            Some(client) => {
                info!("Using raw JSON-RPC endpoint {}", client.url());
                Some(Transport::Rpc(client))
            }
            None => {
                warn!("No client handle and no RPC endpoint configured");
                None
            }
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Transport::Session(_) => Tier::Session,
            Transport::Rpc(_) => Tier::Rpc,
        }
    }
}

impl<C: LogSource> LogSource for Transport<C> {
    async fn block_number(&self) -> Result<u64, rpc_client::Error> {
        match self {
            Transport::Session(client) => client.block_number().await,
            Transport::Rpc(client) => client.block_number().await,
        }
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, rpc_client::Error> {
        match self {
            Transport::Session(client) => client.get_logs(filter).await,
            Transport::Rpc(client) => client.get_logs(filter).await,
        }
    }
}
