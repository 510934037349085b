pub mod abi;
pub mod config;
pub mod deployments;
pub mod entity;
pub mod events;
pub mod fallback;
pub mod indexer_client;
pub mod logging;
pub mod overview;
pub mod reconciler;
pub mod registry;
pub mod retry;
pub mod rpc_client;
pub mod session;
pub mod stopper;
pub mod test_utils;
pub mod transport;
