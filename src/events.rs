use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    abi::{self, EventSignature},
    reconciler::KeyStrategy,
};

pub const USER_REGISTERED: &str =
    "UserRegistered(address indexed user, bool isPayer, bool isBeneficiary, bool isJudge)";
pub const DEAL_CREATED: &str = "DealCreated(uint64 indexed dealId, address indexed payer, address indexed beneficiary, uint256 amount)";
pub const MARKETPLACE_DEPLOYED: &str =
    "MarketplaceDeployed(address indexed marketplace, address indexed creator)";
pub const TRANSFER: &str = "Transfer(address indexed from, address indexed to, uint256 value)";
pub const APPROVAL: &str =
    "Approval(address indexed owner, address indexed spender, uint256 value)";

/// Events emitted by the Lancer contracts that the tooling knows by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum KnownEvent {
    UserRegistered,
    DealCreated,
    MarketplaceDeployed,
    Transfer,
    Approval,
}

impl KnownEvent {
    pub fn signature_str(&self) -> &'static str {
        match self {
            KnownEvent::UserRegistered => USER_REGISTERED,
            KnownEvent::DealCreated => DEAL_CREATED,
            KnownEvent::MarketplaceDeployed => MARKETPLACE_DEPLOYED,
            KnownEvent::Transfer => TRANSFER,
            KnownEvent::Approval => APPROVAL,
        }
    }

    pub fn signature(&self) -> Result<EventSignature, abi::Error> {
        self.signature_str().parse()
    }

    /// The field that identifies one logical entity per emitting contract.
    /// Token movements have no such field, every log stands on its own.
    pub fn key(&self) -> KeyStrategy {
        match self {
            KnownEvent::UserRegistered => KeyStrategy::Field("user".to_string()),
            KnownEvent::DealCreated => KeyStrategy::Field("dealId".to_string()),
            KnownEvent::MarketplaceDeployed => KeyStrategy::Field("marketplace".to_string()),
            KnownEvent::Transfer | KnownEvent::Approval => KeyStrategy::LogPosition,
        }
    }

    /// Name of the matching collection in the indexing service.
    pub fn collection(&self) -> &'static str {
        match self {
            KnownEvent::UserRegistered => "MarketplaceInstance_UserRegistered",
            KnownEvent::DealCreated => "MarketplaceInstance_DealCreated",
            KnownEvent::MarketplaceDeployed => "FactoryContract_MarketplaceDeployed",
            KnownEvent::Transfer => "MockPYUSD_Transfer",
            KnownEvent::Approval => "MockPYUSD_Approval",
        }
    }
}
