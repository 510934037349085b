use std::time::Duration;

use alloy_primitives::Address;
use indexmap::IndexMap;
use reqwest::{Client as HttpClient, ClientBuilder, header::HeaderMap};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{config::Config, registry::ContractRef};

use super::{
    error::Error,
    schema::{self, EntityInfo},
};

pub const DEFAULT_URL: &str = "http://localhost:8080/v1/graphql";

#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct Response<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MarketplaceDeployment {
    pub id: String,
    pub marketplace: Address,
    pub creator: Address,
}

impl From<MarketplaceDeployment> for ContractRef {
    fn from(deployment: MarketplaceDeployment) -> Self {
        ContractRef {
            creator: Some(deployment.creator),
            ..ContractRef::new(deployment.marketplace)
        }
    }
}

const MARKETPLACE_DEPLOYMENTS: &str = "FactoryContract_MarketplaceDeployed";

#[derive(Clone, Debug)]
pub struct IndexerClient {
    client: HttpClient,
    url: String,
}

impl IndexerClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .default_headers({
                let mut headers = HeaderMap::new();
                headers.insert(
                    reqwest::header::CONTENT_TYPE,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()?;
        Ok(IndexerClient { client, url })
    }

    pub fn new_from_config(config: &Config) -> Result<Option<Self>, Error> {
        config
            .indexer_url
            .as_ref()
            .map(|url| IndexerClient::new(url.to_owned(), config.rpc_timeout()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, Error> {
        let response = self
            .client
            .post(&self.url)
            .json(&Request { query, variables })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status,
                url: self.url.clone(),
            });
        }

        let body: Response<T> = response.json().await?;
        if let Some(errors) = body.errors {
            return Err(Error::GraphQl(
                errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }
        body.data.ok_or(Error::MissingData)
    }

    /// Rows of one collection, newest first. A collection absent from the
    /// response reads as empty.
    pub async fn collection(
        &self,
        name: &str,
        fields: &[&str],
        limit: Option<usize>,
    ) -> Result<Vec<Value>, Error> {
        let query = schema::collection_query(name, fields, limit);
        let mut data: IndexMap<String, Value> = self.query(&query, None).await?;
        Ok(match data.swap_remove(name) {
            Some(Value::Array(rows)) => rows,
            _ => vec![],
        })
    }

    pub async fn event_counts(
        &self,
        entities: &[EntityInfo],
    ) -> Result<IndexMap<String, usize>, Error> {
        if entities.is_empty() {
            warn!("No entities found in schema");
            return Ok(IndexMap::new());
        }
        let data: IndexMap<String, Value> =
            self.query(&schema::counts_query(entities), None).await?;
        Ok(entities
            .iter()
            .map(|entity| {
                let count = data
                    .get(&entity.name)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                (entity.name.clone(), count)
            })
            .collect())
    }

    pub async fn recent_events(
        &self,
        entities: &[EntityInfo],
        limit: usize,
    ) -> Result<IndexMap<String, Value>, Error> {
        if entities.is_empty() {
            warn!("No entities found in schema");
            return Ok(IndexMap::new());
        }
        self.query(&schema::recent_events_query(entities, limit), None)
            .await
    }

    pub async fn marketplace_deployments(&self) -> Vec<MarketplaceDeployment> {
        let rows = match self
            .collection(MARKETPLACE_DEPLOYMENTS, &["id", "marketplace", "creator"], None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to fetch marketplace deployments from {}: {}", self.url, e);
                return vec![];
            }
        };
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(deployment) => Some(deployment),
                Err(e) => {
                    debug!("Skipping malformed deployment row: {}", e);
                    None
                }
            })
            .collect()
    }
}
