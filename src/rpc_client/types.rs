use std::fmt;

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

#[derive(Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Deserialize, Debug)]
pub struct Response {
    pub result: Option<Value>,
    pub error: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

pub fn parse_quantity(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| format!("missing 0x prefix: {}", s))?;
    u64::from_str_radix(digits, 16).map_err(|e| format!("{}: {}", s, e))
}

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct QuantityVisitor;
    impl<'de> serde::de::Visitor<'de> for QuantityVisitor {
        type Value = Option<u64>;

        fn visit_str<E: serde::de::Error>(self, s: &str) -> Result<Self::Value, E> {
            parse_quantity(s).map(Some).map_err(|_| {
                E::invalid_value(
                    serde::de::Unexpected::Str(s),
                    &"hex quantity with 0x prefix",
                )
            })
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: serde::Deserializer<'de>>(
            self,
            deserializer: D,
        ) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(self)
        }

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "hex quantity, number or null")
        }
    }

    deserializer.deserialize_any(QuantityVisitor)
}

/// A log entry as returned by `eth_getLogs`. Pending logs carry no block
/// number, log index or transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl Serialize for BlockTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BlockTag::Number(n) => serializer.serialize_str(&format!("{:#x}", n)),
            BlockTag::Latest => serializer.serialize_str("latest"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<B256>,
    pub from_block: BlockTag,
    pub to_block: BlockTag,
}

impl LogFilter {
    pub fn new(address: Address, selector: B256, from_block: BlockTag, to_block: BlockTag) -> Self {
        Self {
            address,
            topics: vec![selector],
            from_block,
            to_block,
        }
    }
}
