use alloy_primitives::B256;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Invalid event signature: {0}")]
    InvalidSignature(String),
    #[error("Unsupported parameter type: {0}")]
    UnsupportedType(String),
    #[error("Anonymous events have no selector: {0}")]
    Anonymous(String),
    #[error("Duplicate parameter name: {0}")]
    DuplicateParam(String),
    #[error("Too many indexed parameters: {0} (max 3)")]
    TooManyIndexed(usize),
    #[error("Log has no topics")]
    MissingSelector,
    #[error("Selector mismatch: expected {expected}, got {actual}")]
    SelectorMismatch { expected: B256, actual: B256 },
    #[error("Expected {expected} indexed topics, got {actual}")]
    TopicCount { expected: usize, actual: usize },
    #[error("ABI decode error: {0}")]
    Decode(#[from] alloy_dyn_abi::Error),
    #[error("Invalid value for parameter {param}: {reason}")]
    InvalidValue { param: String, reason: String },
}
