use alloy_dyn_abi::{DynSolValue, EventExt};
use alloy_primitives::B256;
use indexmap::IndexMap;
use serde::Serialize;

use super::{
    error::Error,
    event::{EventParam, EventSignature},
    token::Token,
};

const WORD: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    pub event_name: String,
    pub args: IndexMap<String, Token>,
}

fn invalid(param: &EventParam, reason: impl Into<String>) -> Error {
    Error::InvalidValue {
        param: param.name.clone(),
        reason: reason.into(),
    }
}

fn non_canonical(param: &EventParam) -> Error {
    invalid(param, "non-canonical encoding")
}

/// The decoder reads value types leniently (dirty padding, bools other than
/// 0 and 1). Re-encoding a value must give back the exact topic.
fn check_topic(param: &EventParam, value: &DynSolValue, topic: &B256) -> Result<(), Error> {
    match value.as_word() {
        Some(word) if word == *topic => Ok(()),
        _ => Err(non_canonical(param)),
    }
}

/// Same check for the head slot(s) of a static body parameter. Dynamic
/// parameters only own an offset word in the head.
fn check_head(
    param: &EventParam,
    value: &DynSolValue,
    data: &[u8],
    head: &mut usize,
) -> Result<(), Error> {
    let at = *head;
    if param.kind.is_dynamic() {
        *head += WORD;
        return Ok(());
    }
    let encoded = value.abi_encode();
    *head += encoded.len();
    match data.get(at..at + encoded.len()) {
        Some(slice) if slice == encoded.as_slice() => Ok(()),
        _ => Err(non_canonical(param)),
    }
}

/// Decodes a raw log against `event`. Topic 0 must equal the event selector
/// and the remaining topics must match the indexed parameters one to one.
pub fn decode_log(
    event: &EventSignature,
    topics: &[B256],
    data: &[u8],
) -> Result<DecodedEvent, Error> {
    let (selector, indexed_topics) = topics.split_first().ok_or(Error::MissingSelector)?;
    if *selector != event.selector() {
        return Err(Error::SelectorMismatch {
            expected: event.selector(),
            actual: *selector,
        });
    }
    if indexed_topics.len() != event.indexed_count() {
        return Err(Error::TopicCount {
            expected: event.indexed_count(),
            actual: indexed_topics.len(),
        });
    }

    let decoded = event.event().decode_log_parts(topics.iter().copied(), data)?;
    let mut indexed = decoded.indexed.into_iter().zip(indexed_topics.iter());
    let mut body = decoded.body.into_iter();
    let mut head = 0;

    let mut args = IndexMap::with_capacity(event.params().len());
    for param in event.params() {
        let token = if param.indexed {
            let (value, topic) = indexed.next().ok_or_else(|| Error::TopicCount {
                expected: event.indexed_count(),
                actual: indexed_topics.len(),
            })?;
            if param.is_value_type() {
                check_topic(param, &value, topic)?;
                Token::from_value(value).map_err(|reason| invalid(param, reason))?
            } else {
                Token::Hash(*topic)
            }
        } else {
            let value = body
                .next()
                .ok_or_else(|| invalid(param, "missing from log data"))?;
            check_head(param, &value, data, &mut head)?;
            Token::from_value(value).map_err(|reason| invalid(param, reason))?
        };
        args.insert(param.name.clone(), token);
    }

    Ok(DecodedEvent {
        event_name: event.name().to_string(),
        args,
    })
}
