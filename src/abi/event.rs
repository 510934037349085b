use std::{collections::HashSet, fmt, str::FromStr};

use alloy_dyn_abi::{DynSolType, Specifier};
use alloy_json_abi::Event;
use alloy_primitives::B256;

use super::error::Error;

const MAX_INDEXED: usize = 3;

/// One resolved event input. Unnamed inputs are called `param<position>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventParam {
    pub name: String,
    pub kind: DynSolType,
    pub indexed: bool,
}

impl EventParam {
    /// Indexed inputs of these types keep their value in the topic; every
    /// other indexed input only leaves the keccak hash of its encoding.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self.kind,
            DynSolType::Address
                | DynSolType::Bool
                | DynSolType::Int(_)
                | DynSolType::Uint(_)
                | DynSolType::FixedBytes(_)
                | DynSolType::Function
        )
    }
}

/// A parsed human-readable event signature such as
/// `DealCreated(uint64 indexed dealId, address indexed payer, address indexed beneficiary, uint256 amount)`.
///
/// The topic-0 selector is computed once at parse time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSignature {
    event: Event,
    params: Vec<EventParam>,
    selector: B256,
}

impl EventSignature {
    pub fn new(mut event: Event) -> Result<Self, Error> {
        if event.anonymous {
            return Err(Error::Anonymous(event.name));
        }
        for (position, input) in event.inputs.iter_mut().enumerate() {
            if input.name.is_empty() {
                input.name = format!("param{}", position);
            }
        }

        let mut seen = HashSet::new();
        for input in event.inputs.iter() {
            if !seen.insert(input.name.as_str()) {
                return Err(Error::DuplicateParam(input.name.clone()));
            }
        }

        let indexed = event.inputs.iter().filter(|p| p.indexed).count();
        if indexed > MAX_INDEXED {
            return Err(Error::TooManyIndexed(indexed));
        }

        let params = event
            .inputs
            .iter()
            .map(|input| {
                let kind: DynSolType = input
                    .resolve()
                    .map_err(|e| Error::UnsupportedType(format!("{}: {}", input.ty, e)))?;
                Ok(EventParam {
                    name: input.name.clone(),
                    kind,
                    indexed: input.indexed,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let selector = event.selector();
        Ok(Self {
            event,
            params,
            selector,
        })
    }

    pub fn name(&self) -> &str {
        &self.event.name
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn params(&self) -> &[EventParam] {
        &self.params
    }

    pub fn selector(&self) -> B256 {
        self.selector
    }

    pub fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }

    pub fn canonical(&self) -> String {
        self.event.signature()
    }
}

impl FromStr for EventSignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = Event::parse(s.trim())
            .map_err(|e| Error::InvalidSignature(format!("{}: {}", s, e)))?;
        EventSignature::new(event)
    }
}

impl fmt::Display for EventSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.indexed {
                    format!("{} indexed {}", p.kind.sol_type_name(), p.name)
                } else {
                    format!("{} {}", p.kind.sol_type_name(), p.name)
                }
            })
            .collect();
        write!(f, "{}({})", self.name(), params.join(", "))
    }
}
