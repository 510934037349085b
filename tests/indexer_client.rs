use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_primitives::{Address, address};
use anyhow::Result;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use indexmap::IndexMap;
use lancer::{
    events::KnownEvent,
    fallback::{self, Deal, Loaded},
    indexer_client::{
        Error, IndexerClient,
        schema::{self, EntityInfo, FieldInfo},
    },
    overview::{self, OverviewRequest},
    reconciler::{Reconciler, ScanRequest},
    registry::MemoryStore,
    test_utils::{MockSource, deal_created_log, user_registered_log},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const MARKETPLACE: Address = address!("0xa16E02E87b7454126E5E10d957A927A7F5B5d2be");
const ALICE: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
const BOB: Address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

const SCHEMA: &str = r#"
type FactoryContract_MarketplaceDeployed {
  id: ID!
  marketplace: String!
  creator: String!
}

type MarketplaceInstance_DealCreated {
  id: ID!
  dealId: BigInt!
  amount: BigInt!
}
"#;

const OVERVIEW_SCHEMA: &str = r#"
type FactoryContract_MarketplaceDeployed {
  id: ID!
  marketplace: String!
  creator: String!
}

type MarketplaceInstance_UserRegistered {
  id: ID!
  user: String!
}

type MarketplaceInstance_DealCreated {
  id: ID!
  dealId: BigInt!
}
"#;

struct Reply {
    status: StatusCode,
    body: Value,
    queries: Mutex<Vec<Value>>,
}

async fn handle(
    State(reply): State<Arc<Reply>>,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    reply.queries.lock().unwrap().push(request);
    (reply.status, Json(reply.body.clone()))
}

async fn spawn_indexer(status: StatusCode, body: Value) -> Result<(IndexerClient, Arc<Reply>)> {
    let reply = Arc::new(Reply {
        status,
        body,
        queries: Mutex::new(vec![]),
    });
    let app = Router::new().route("/v1/graphql", post(handle)).with_state(reply.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let client = IndexerClient::new(
        format!("http://{}/v1/graphql", addr),
        Duration::from_secs(5),
    )?;
    Ok((client, reply))
}

fn deal_request() -> Result<ScanRequest> {
    let event = KnownEvent::DealCreated;
    Ok(ScanRequest::builder()
        .addresses(vec![MARKETPLACE])
        .event(event.signature()?)
        .to_block(100)
        .key(event.key())
        .build())
}

fn user_request() -> Result<ScanRequest> {
    let event = KnownEvent::UserRegistered;
    Ok(ScanRequest::builder()
        .addresses(vec![MARKETPLACE])
        .event(event.signature()?)
        .to_block(100)
        .key(event.key())
        .build())
}

#[test]
fn test_parse_schema_entities() {
    let entities = schema::parse_schema_entities(SCHEMA);

    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].name, "FactoryContract_MarketplaceDeployed");
    assert_eq!(
        entities[1].fields,
        vec![
            FieldInfo {
                name: "id".to_string(),
                kind: "ID".to_string()
            },
            FieldInfo {
                name: "dealId".to_string(),
                kind: "BigInt".to_string()
            },
            FieldInfo {
                name: "amount".to_string(),
                kind: "BigInt".to_string()
            },
        ]
    );
}

#[test]
fn test_parse_schema_skips_outside_types() {
    let entities = schema::parse_schema_entities(
        "scalar BigInt\nnote: ignored\ntype Query(arg: Int) {\n  x: Int\n}\ntype Empty {\n}\n",
    );
    assert_eq!(
        entities,
        vec![EntityInfo {
            name: "Empty".to_string(),
            fields: vec![]
        }]
    );
}

#[test]
fn test_generated_queries() {
    let entities = schema::parse_schema_entities(SCHEMA);

    assert_eq!(
        schema::counts_query(&entities),
        "query GetEventCounts {\n    FactoryContract_MarketplaceDeployed {\n      id\n    }\n    MarketplaceInstance_DealCreated {\n      id\n    }\n  }"
    );
    assert_eq!(
        schema::recent_events_query(&entities[1..], 5),
        "query GetRecentEvents {\n    MarketplaceInstance_DealCreated(limit: 5, order_by: { id: desc }) {\n      id\n      dealId\n      amount\n    }\n  }"
    );
}

#[tokio::test]
async fn test_event_counts() -> Result<()> {
    let body = json!({
        "data": {
            "FactoryContract_MarketplaceDeployed": [{ "id": "1" }, { "id": "2" }],
        }
    });
    let (client, reply) = spawn_indexer(StatusCode::OK, body).await?;
    let entities = schema::parse_schema_entities(SCHEMA);

    let counts = client.event_counts(&entities).await?;

    let mut expected = IndexMap::new();
    expected.insert("FactoryContract_MarketplaceDeployed".to_string(), 2);
    expected.insert("MarketplaceInstance_DealCreated".to_string(), 0);
    assert_eq!(counts, expected);
    assert_eq!(
        reply.queries.lock().unwrap()[0]["query"],
        schema::counts_query(&entities)
    );
    Ok(())
}

#[tokio::test]
async fn test_status_and_graphql_errors() -> Result<()> {
    let (client, _) = spawn_indexer(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await?;
    let result = client.collection("Anything", &["id"], None).await;
    assert!(matches!(result, Err(Error::Status { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR));

    let body = json!({ "errors": [{ "message": "field not found" }, { "message": "bad" }] });
    let (client, _) = spawn_indexer(StatusCode::OK, body).await?;
    let result = client.collection("Anything", &["id"], None).await;
    assert!(matches!(result, Err(Error::GraphQl(ref m)) if m == "field not found, bad"));
    Ok(())
}

#[tokio::test]
async fn test_marketplace_deployments() -> Result<()> {
    let body = json!({
        "data": {
            "FactoryContract_MarketplaceDeployed": [
                { "id": "31337_9_0", "marketplace": MARKETPLACE, "creator": ALICE },
                { "id": "broken", "marketplace": "nope", "creator": ALICE },
            ]
        }
    });
    let (client, _) = spawn_indexer(StatusCode::OK, body).await?;

    let deployments = client.marketplace_deployments().await;

    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].marketplace, MARKETPLACE);
    assert_eq!(deployments[0].creator, ALICE);

    let (client, _) = spawn_indexer(StatusCode::BAD_GATEWAY, json!({})).await?;
    assert!(client.marketplace_deployments().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_load_collection_prefers_indexer() -> Result<()> {
    let body = json!({
        "data": {
            "MarketplaceInstance_DealCreated": [{ "id": "x", "dealId": "4", "amount": "10" }]
        }
    });
    let (client, _) = spawn_indexer(StatusCode::OK, body).await?;
    let source = MockSource::new();
    let reconciler = Reconciler::new(Some(source.clone()), CancellationToken::new());

    let loaded = fallback::load_collection(
        Some(&client),
        KnownEvent::DealCreated.collection(),
        &["id", "dealId", "amount"],
        &reconciler,
        &deal_request()?,
    )
    .await;

    assert!(matches!(loaded, Loaded::Indexed(ref rows) if rows.len() == 1));
    assert!(source.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_load_deals_falls_back_to_chain() -> Result<()> {
    let body = json!({ "data": { "MarketplaceInstance_DealCreated": [] } });
    let (client, _) = spawn_indexer(StatusCode::OK, body).await?;
    let source = MockSource::new();
    source.set_logs(
        MARKETPLACE,
        vec![deal_created_log(MARKETPLACE, 3, ALICE, BOB, 250, 20, 1)],
    );
    let reconciler = Reconciler::new(Some(source.clone()), CancellationToken::new());

    let deals = fallback::load_deals(Some(&client), &reconciler, &deal_request()?).await;

    assert_eq!(source.calls().len(), 1);
    assert_eq!(deals.len(), 1);
    let deal = &deals[0];
    assert_eq!(deal.id, format!("0x{}_3", hex::encode(MARKETPLACE.as_slice())));
    assert_eq!(deal.deal_id, Some(json!("3")));
    assert_eq!(deal.payer, Some(json!(ALICE.to_checksum(None))));
    assert_eq!(deal.amount, Some(json!("250")));
    assert_eq!(deal.marketplace, Some(json!(MARKETPLACE.to_checksum(None))));
    Ok(())
}

#[tokio::test]
async fn test_load_collection_without_indexer() -> Result<()> {
    let reconciler: Reconciler<MockSource> = Reconciler::new(None, CancellationToken::new());

    let loaded = fallback::load_collection(
        None,
        KnownEvent::DealCreated.collection(),
        &["id"],
        &reconciler,
        &deal_request()?,
    )
    .await;

    assert!(matches!(loaded, Loaded::Reconciled(ref records) if records.is_empty()));
    assert!(loaded.is_empty());
    Ok(())
}

#[test]
fn test_deal_normalize_fallbacks() {
    let deal = Deal::normalize(
        "Deals",
        json!({
            "payerAddress": "0xpayer",
            "args": { "beneficiary": "0xbene", "amount": "7" },
            "marketplaceAddress": "0xmarket",
        }),
        4,
    );
    assert_eq!(deal.id, "Deals_4");
    assert_eq!(deal.deal_id, None);
    assert_eq!(deal.payer, Some(json!("0xpayer")));
    assert_eq!(deal.beneficiary, Some(json!("0xbene")));
    assert_eq!(deal.amount, Some(json!("7")));
    assert_eq!(deal.marketplace, Some(json!("0xmarket")));

    let deal = Deal::normalize("Deals", json!({ "dealId": 12, "payer": null, "args": { "payer": "0xa" } }), 0);
    assert_eq!(deal.id, "12");
    assert_eq!(deal.deal_id, Some(json!(12)));
    assert_eq!(deal.payer, Some(json!("0xa")));
}

#[test]
fn test_find_deals_key() {
    let mut events = IndexMap::new();
    events.insert("FactoryContract_MarketplaceDeployed".to_string(), json!([]));
    events.insert("MarketplaceInstance_DealCreated".to_string(), json!([]));
    assert_eq!(
        fallback::find_deals_key(&events),
        Some("MarketplaceInstance_DealCreated")
    );

    events.swap_remove("MarketplaceInstance_DealCreated");
    assert_eq!(fallback::find_deals_key(&events), None);
}

#[test]
fn test_find_users_key() {
    let mut events = IndexMap::new();
    events.insert("FactoryContract_MarketplaceDeployed".to_string(), json!([]));
    events.insert("MarketplaceInstance_UserRegistered".to_string(), json!([]));
    events.insert("MarketplaceInstance_DealCreated".to_string(), json!([]));
    assert_eq!(
        fallback::find_users_key(&events),
        Some("MarketplaceInstance_UserRegistered")
    );

    events.swap_remove("MarketplaceInstance_UserRegistered");
    assert_eq!(fallback::find_users_key(&events), None);
}

#[tokio::test]
async fn test_load_users_falls_back_to_chain() -> Result<()> {
    let body = json!({ "data": { "MarketplaceInstance_UserRegistered": [] } });
    let (client, reply) = spawn_indexer(StatusCode::OK, body).await?;
    let source = MockSource::new();
    source.set_logs(
        MARKETPLACE,
        vec![user_registered_log(MARKETPLACE, ALICE, (true, false, true), 5, 0)],
    );
    let reconciler = Reconciler::new(Some(source.clone()), CancellationToken::new());

    let users = fallback::load_users(Some(&client), &reconciler, &user_request()?).await;

    assert_eq!(reply.queries.lock().unwrap().len(), 1);
    assert_eq!(source.calls().len(), 1);
    assert_eq!(users.len(), 1);
    assert_eq!(
        users[0]["id"],
        json!(format!(
            "0x{}_0x{}",
            hex::encode(MARKETPLACE.as_slice()),
            hex::encode(ALICE.as_slice())
        ))
    );
    assert_eq!(users[0]["user"], json!(ALICE.to_checksum(None)));
    assert_eq!(users[0]["isPayer"], json!(true));
    assert_eq!(users[0]["isBeneficiary"], json!(false));
    Ok(())
}

#[tokio::test]
async fn test_overview_scans_without_requerying_indexer() -> Result<()> {
    let body = json!({
        "data": {
            "MarketplaceInstance_UserRegistered": [],
            "MarketplaceInstance_DealCreated": [],
        }
    });
    let (client, reply) = spawn_indexer(StatusCode::OK, body).await?;
    let source = MockSource::new();
    source.set_logs(
        MARKETPLACE,
        vec![
            user_registered_log(MARKETPLACE, ALICE, (true, false, false), 5, 0),
            deal_created_log(MARKETPLACE, 1, ALICE, BOB, 40, 6, 0),
        ],
    );
    let reconciler = Reconciler::new(Some(source.clone()), CancellationToken::new());
    let request = OverviewRequest::builder()
        .chain_id(31337)
        .entities(schema::parse_schema_entities(OVERVIEW_SCHEMA))
        .addresses(vec![MARKETPLACE])
        .to_block(100)
        .build();

    let store = MemoryStore::new();
    let result = overview::overview(Some(&client), &reconciler, &store, &request).await?;

    // counts and recent events only
    assert_eq!(reply.queries.lock().unwrap().len(), 2);
    assert_eq!(source.calls().len(), 2);
    assert_eq!(result.counts["MarketplaceInstance_DealCreated"], 0);
    assert_eq!(result.users.len(), 1);
    assert_eq!(result.users[0]["user"], json!(ALICE.to_checksum(None)));
    assert_eq!(result.deals.len(), 1);
    assert_eq!(result.deals[0].deal_id, Some(json!("1")));
    Ok(())
}

#[tokio::test]
async fn test_overview_scans_indexed_marketplaces() -> Result<()> {
    let body = json!({
        "data": {
            "FactoryContract_MarketplaceDeployed": [
                { "id": "31337_9_0", "marketplace": MARKETPLACE, "creator": ALICE },
            ],
            "MarketplaceInstance_UserRegistered": [{ "id": "u1", "user": BOB }],
            "MarketplaceInstance_DealCreated": [],
        }
    });
    let (client, reply) = spawn_indexer(StatusCode::OK, body).await?;
    let source = MockSource::new();
    source.set_logs(
        MARKETPLACE,
        vec![deal_created_log(MARKETPLACE, 2, ALICE, BOB, 75, 8, 1)],
    );
    let reconciler = Reconciler::new(Some(source.clone()), CancellationToken::new());
    let request = OverviewRequest::builder()
        .chain_id(31337)
        .entities(schema::parse_schema_entities(OVERVIEW_SCHEMA))
        .to_block(100)
        .build();

    let store = MemoryStore::new();
    let result = overview::overview(Some(&client), &reconciler, &store, &request).await?;

    // counts, recent events, marketplace deployments
    assert_eq!(reply.queries.lock().unwrap().len(), 3);
    assert_eq!(result.counts["FactoryContract_MarketplaceDeployed"], 1);
    assert_eq!(result.users, vec![json!({ "id": "u1", "user": BOB })]);

    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].address, MARKETPLACE);
    assert_eq!(result.deals.len(), 1);
    assert_eq!(result.deals[0].amount, Some(json!("75")));

    let json = serde_json::to_value(&result)?;
    assert!(json.get("counts").is_some() && json.get("users").is_some());
    Ok(())
}
