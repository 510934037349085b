use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};

use crate::{
    events::KnownEvent,
    rpc_client::{
        Error,
        types::{LogFilter, LogRecord},
    },
    transport::LogSource,
};

#[derive(Clone, Debug)]
pub enum MockResponse {
    Logs(Vec<LogRecord>),
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    head: Option<u64>,
    responses: HashMap<Address, MockResponse>,
    calls: Vec<LogFilter>,
    block_number_calls: usize,
}

/// Scripted log source. Returns whatever was set for an address regardless
/// of the filter topics, like a node that ignores them.
#[derive(Clone, Debug, Default)]
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(self, head: u64) -> Self {
        self.state.lock().expect("mock state").head = Some(head);
        self
    }

    pub fn set_logs(&self, address: Address, logs: Vec<LogRecord>) {
        self.state
            .lock()
            .expect("mock state")
            .responses
            .insert(address, MockResponse::Logs(logs));
    }

    pub fn fail(&self, address: Address) {
        self.state
            .lock()
            .expect("mock state")
            .responses
            .insert(address, MockResponse::Fail);
    }

    pub fn calls(&self) -> Vec<LogFilter> {
        self.state.lock().expect("mock state").calls.clone()
    }

    pub fn block_number_calls(&self) -> usize {
        self.state.lock().expect("mock state").block_number_calls
    }
}

impl LogSource for MockSource {
    async fn block_number(&self) -> Result<u64, Error> {
        let mut state = self.state.lock().expect("mock state");
        state.block_number_calls += 1;
        state
            .head
            .ok_or_else(|| Error::Unexpected("no head configured".to_string()))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, Error> {
        let mut state = self.state.lock().expect("mock state");
        state.calls.push(filter.clone());
        match state.responses.get(&filter.address) {
            Some(MockResponse::Logs(logs)) => Ok(logs.clone()),
            Some(MockResponse::Fail) => Err(Error::Rpc {
                code: -32000,
                message: "scripted failure".to_string(),
            }),
            None => Ok(vec![]),
        }
    }
}

pub fn word(value: u64) -> B256 {
    B256::from(U256::from(value).to_be_bytes::<32>())
}

pub fn address_word(address: Address) -> B256 {
    address.into_word()
}

pub fn bool_word(value: bool) -> B256 {
    word(value as u64)
}

pub fn selector(event: KnownEvent) -> B256 {
    event.signature().expect("known signature").selector()
}

pub fn log(
    address: Address,
    topics: Vec<B256>,
    data: Vec<B256>,
    block_number: u64,
    log_index: u64,
) -> LogRecord {
    let data: Vec<u8> = data.iter().flat_map(|w| w.0).collect();
    LogRecord {
        address,
        topics,
        data: Bytes::from(data),
        block_number: Some(block_number),
        log_index: Some(log_index),
        transaction_hash: Some(keccak256(format!("{}:{}", block_number, log_index))),
        removed: false,
    }
}

pub fn user_registered_log(
    marketplace: Address,
    user: Address,
    roles: (bool, bool, bool),
    block_number: u64,
    log_index: u64,
) -> LogRecord {
    log(
        marketplace,
        vec![selector(KnownEvent::UserRegistered), address_word(user)],
        vec![bool_word(roles.0), bool_word(roles.1), bool_word(roles.2)],
        block_number,
        log_index,
    )
}

pub fn deal_created_log(
    marketplace: Address,
    deal_id: u64,
    payer: Address,
    beneficiary: Address,
    amount: u64,
    block_number: u64,
    log_index: u64,
) -> LogRecord {
    log(
        marketplace,
        vec![
            selector(KnownEvent::DealCreated),
            word(deal_id),
            address_word(payer),
            address_word(beneficiary),
        ],
        vec![word(amount)],
        block_number,
        log_index,
    )
}

pub fn marketplace_deployed_log(
    factory: Address,
    marketplace: Address,
    creator: Address,
    block_number: u64,
    log_index: u64,
) -> LogRecord {
    log(
        factory,
        vec![
            selector(KnownEvent::MarketplaceDeployed),
            address_word(marketplace),
            address_word(creator),
        ],
        vec![],
        block_number,
        log_index,
    )
}

pub fn transfer_log(
    token: Address,
    from: Address,
    to: Address,
    value: u64,
    block_number: u64,
    log_index: u64,
) -> LogRecord {
    log(
        token,
        vec![
            selector(KnownEvent::Transfer),
            address_word(from),
            address_word(to),
        ],
        vec![word(value)],
        block_number,
        log_index,
    )
}
