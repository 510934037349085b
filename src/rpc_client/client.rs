use std::time::Duration;

use base64::prelude::*;
use reqwest::{Client as HttpClient, ClientBuilder, header::HeaderMap};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::transport::LogSource;

use super::{
    error::{Error, RpcErrorResponse},
    types::{LogFilter, LogRecord, Request, Response, parse_quantity},
};

#[derive(Clone, Debug)]
pub struct Client {
    client: HttpClient,
    url: String,
}

const JSONRPC: &str = "2.0";

impl Client {
    pub fn new(
        url: String,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .default_headers({
                let mut headers = HeaderMap::new();
                if let Some((user, password)) = credentials {
                    let auth_str = BASE64_STANDARD.encode(format!("{}:{}", user, password));
                    headers.insert("Authorization", format!("Basic {}", auth_str).parse()?);
                }
                headers.insert("Content-Type", "application/json".parse()?);
                headers.insert("Accept", "application/json".parse()?);
                headers
            })
            .build()?;

        Ok(Client { client, url })
    }

    /// Returns `None` when no RPC endpoint is configured.
    pub fn new_from_config(config: &Config) -> Result<Option<Self>, Error> {
        config
            .rpc_url
            .as_ref()
            .map(|url| Client::new(url.to_owned(), config.rpc_credentials(), config.rpc_timeout()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn handle_response<T>(response: Response) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        match (response.result, response.error) {
            (Some(result), None) => Ok(serde_json::from_value(result)?),
            (None, Some(error)) => {
                let detail: RpcErrorResponse = serde_json::from_value(error)?;
                Err(Error::Rpc {
                    code: detail.code,
                    message: detail.message,
                })
            }
            (None, None) => Err(Error::Unexpected(
                "No result or error in RPC response".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Unexpected(
                "Both result and error present in RPC response".to_string(),
            )),
        }
    }

    pub async fn call<T>(&self, method: &str, params: Vec<Value>) -> Result<T, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = Request {
            jsonrpc: JSONRPC.to_owned(),
            id: "0".to_string(),
            method: method.to_string(),
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json::<Response>()
            .await?;

        Self::handle_response(response)
    }

    async fn call_quantity(&self, method: &str) -> Result<u64, Error> {
        let hex: String = self.call(method, vec![]).await?;
        parse_quantity(&hex).map_err(Error::InvalidQuantity)
    }

    pub async fn block_number(&self) -> Result<u64, Error> {
        self.call_quantity("eth_blockNumber").await
    }

    pub async fn chain_id(&self) -> Result<u64, Error> {
        self.call_quantity("eth_chainId").await
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, Error> {
        self.call("eth_getLogs", vec![serde_json::to_value(filter)?])
            .await
    }
}

impl LogSource for Client {
    async fn block_number(&self) -> Result<u64, Error> {
        self.block_number().await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, Error> {
        self.get_logs(filter).await
    }
}
