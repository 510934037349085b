use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, B256, Bytes, I256, U256};
use serde::{Serialize, Serializer};

/// A decoded event argument.
///
/// `Hash` holds the topic of an indexed dynamic parameter, which only
/// carries the keccak hash of the original value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    FixedBytes(Bytes),
    Bytes(Bytes),
    String(String),
    Array(Vec<Token>),
    Tuple(Vec<Token>),
    Hash(B256),
}

fn hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn join(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::stable_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl Token {
    /// Converts a decoded ABI value, rejecting integers wider than their
    /// declared size.
    pub fn from_value(value: DynSolValue) -> Result<Self, String> {
        Ok(match value {
            DynSolValue::Address(address) => Token::Address(address),
            DynSolValue::Bool(b) => Token::Bool(b),
            DynSolValue::Uint(v, bits) => {
                if v.bit_len() > bits {
                    return Err(format!("value exceeds uint{}", bits));
                }
                Token::Uint(v)
            }
            DynSolValue::Int(v, _) => Token::Int(v),
            DynSolValue::FixedBytes(word, size) => {
                Token::FixedBytes(Bytes::copy_from_slice(&word[..size]))
            }
            DynSolValue::Function(function) => {
                Token::FixedBytes(Bytes::copy_from_slice(function.as_slice()))
            }
            DynSolValue::Bytes(bytes) => Token::Bytes(Bytes::from(bytes)),
            DynSolValue::String(s) => Token::String(s),
            DynSolValue::Array(values) | DynSolValue::FixedArray(values) => Token::Array(
                values
                    .into_iter()
                    .map(Token::from_value)
                    .collect::<Result<_, _>>()?,
            ),
            DynSolValue::Tuple(values) => Token::Tuple(
                values
                    .into_iter()
                    .map(Token::from_value)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Case-insensitive rendering used to build identity keys.
    pub fn stable_string(&self) -> String {
        match self {
            Token::Address(address) => hex_string(address.as_slice()),
            Token::Bool(b) => b.to_string(),
            Token::Uint(v) => v.to_string(),
            Token::Int(v) => v.to_string(),
            Token::FixedBytes(bytes) | Token::Bytes(bytes) => hex_string(bytes),
            Token::String(s) => s.clone(),
            Token::Array(tokens) => format!("[{}]", join(tokens)),
            Token::Tuple(tokens) => format!("({})", join(tokens)),
            Token::Hash(hash) => hex_string(hash.as_slice()),
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(*v),
            _ => None,
        }
    }
}

/// EIP-55 rendering for address fields outside a `Token`.
pub fn serialize_checksummed<S: Serializer>(
    address: &Address,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Token::Address(address) => serializer.serialize_str(&address.to_checksum(None)),
            Token::Bool(b) => serializer.serialize_bool(*b),
            Token::Array(tokens) | Token::Tuple(tokens) => serializer.collect_seq(tokens),
            _ => serializer.serialize_str(&self.stable_string()),
        }
    }
}
