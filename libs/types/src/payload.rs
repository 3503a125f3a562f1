//! Authorization payload types
//!
//! A payload describes one asset-movement intent plus the anti-replay
//! metadata that binds it to a single vault instance on a single network.

use serde::{Deserialize, Serialize};

use crate::ids::{Address, AssetId, ChainId, RequestId, Timestamp};
use crate::numeric::Amount;

/// Vault operation a payload authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Deposit,
    Withdraw,
}

impl Action {
    /// Wire discriminant
    pub fn code(&self) -> u8 {
        match self {
            Action::Deposit => 0,
            Action::Withdraw => 1,
        }
    }
}

/// One (asset, amount) entry of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub asset: AssetId,
    pub amount: Amount,
}

impl Allocation {
    pub fn new(asset: AssetId, amount: Amount) -> Self {
        Self { asset, amount }
    }
}

/// Request signed by both the broker and the co-signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    pub action: Action,
    pub request_id: RequestId,
    pub expiry: Timestamp,
    pub destination: Address,
    pub allocations: Vec<Allocation>,
    pub target_contract: Address,
    pub chain_id: ChainId,
}

impl AuthorizationPayload {
    /// Sum of native-currency allocations, `None` on overflow
    pub fn native_total(&self) -> Option<Amount> {
        crate::numeric::checked_sum(
            self.allocations
                .iter()
                .filter(|a| a.asset.is_native())
                .map(|a| &a.amount),
        )
    }
}

/// Payload a participant signs to prove control of its identity
///
/// The nonce is always one past the nonce currently stored for the identity,
/// so each issued payload can be consumed at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub instance: Address,
    pub identity: Address,
    pub nonce: u64,
}
