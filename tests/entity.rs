use alloy_primitives::{Address, address};
use anyhow::Result;
use lancer::{
    abi::decode_log,
    entity::{self, Entity, EntityStore, entity_id},
    events::KnownEvent,
    rpc_client::types::BlockTag,
    test_utils::{MockSource, transfer_log, user_registered_log},
};

const TOKEN: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
const ALICE: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
const BOB: Address = address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

#[test]
fn test_entity_from_log() -> Result<()> {
    let event = KnownEvent::Transfer.signature()?;
    let log = transfer_log(TOKEN, ALICE, BOB, 42, 15, 3);
    let decoded = decode_log(&event, &log.topics, log.data.as_ref())?;

    let entity = Entity::from_log(31337, &log, decoded).expect("mined log");

    assert_eq!(entity.id, "31337_15_3");
    assert_eq!(entity.block_number, 15);
    assert_eq!(entity.transaction_hash, log.transaction_hash);
    let json = serde_json::to_value(&entity)?;
    assert_eq!(json["from"], ALICE.to_checksum(None));
    assert_eq!(json["value"], "42");
    assert_eq!(json["blockNumber"], 15);
    Ok(())
}

#[test]
fn test_entity_from_pending_log() -> Result<()> {
    let event = KnownEvent::Transfer.signature()?;
    let mut log = transfer_log(TOKEN, ALICE, BOB, 42, 15, 3);
    log.log_index = None;
    let decoded = decode_log(&event, &log.topics, log.data.as_ref())?;

    assert!(Entity::from_log(31337, &log, decoded).is_none());
    Ok(())
}

#[test]
fn test_store_upserts_by_id() -> Result<()> {
    let event = KnownEvent::Transfer.signature()?;
    let mut store = EntityStore::new();
    let collection = entity::collection_name("MockPYUSD", &event);
    assert_eq!(collection, "MockPYUSD_Transfer");

    for value in [1, 2] {
        let log = transfer_log(TOKEN, ALICE, BOB, value, 15, 3);
        let decoded = decode_log(&event, &log.topics, log.data.as_ref())?;
        store.set(&collection, Entity::from_log(1, &log, decoded).expect("mined"));
    }

    assert_eq!(store.len(&collection), 1);
    let entity = store.get(&collection, &entity_id(1, 15, 3)).expect("entity");
    assert_eq!(entity.fields["value"].stable_string(), "2");
    assert!(store.collection("Other").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_index_contract_events() -> Result<()> {
    let source = MockSource::new();
    let mut bad = transfer_log(TOKEN, ALICE, BOB, 1, 4, 0);
    bad.data = Default::default();
    source.set_logs(
        TOKEN,
        vec![
            transfer_log(TOKEN, ALICE, BOB, 100, 2, 0),
            bad,
            user_registered_log(TOKEN, ALICE, (true, false, false), 3, 0),
            transfer_log(TOKEN, BOB, ALICE, 40, 5, 1),
        ],
    );
    let event = KnownEvent::Transfer.signature()?;
    let mut store = EntityStore::new();

    let written = entity::index(
        &source,
        &mut store,
        31337,
        "MockPYUSD_Transfer",
        TOKEN,
        &event,
        BlockTag::Number(0),
        BlockTag::Latest,
    )
    .await;

    assert_eq!(written, 2);
    let ids: Vec<_> = store
        .collection("MockPYUSD_Transfer")
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(ids, vec!["31337_2_0", "31337_5_1"]);
    assert_eq!(source.calls()[0].to_block, BlockTag::Latest);
    Ok(())
}

#[tokio::test]
async fn test_index_failed_fetch_writes_nothing() -> Result<()> {
    let source = MockSource::new();
    source.fail(TOKEN);
    let mut store = EntityStore::new();

    let written = entity::index(
        &source,
        &mut store,
        1,
        "MockPYUSD_Approval",
        TOKEN,
        &KnownEvent::Approval.signature()?,
        BlockTag::Number(0),
        BlockTag::Number(10),
    )
    .await;

    assert_eq!(written, 0);
    assert!(store.is_empty());
    Ok(())
}
