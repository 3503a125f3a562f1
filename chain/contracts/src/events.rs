//! Contract events
//!
//! Events are immutable records emitted by contract operations and consumed
//! by off-chain indexers. Each instance keeps its own append-only log.

use custody_types::ids::{Address, AssetId, RequestId};
use custody_types::numeric::Amount;
use custody_types::participant::ParticipantStatus;
use serde::{Deserialize, Serialize};

use crate::security::Role;

/// Assets pulled into custody, one event per allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub ledger_id: u64,
    pub account: Address,
    pub asset: AssetId,
    pub amount: Amount,
    pub request_id: RequestId,
}

/// Assets released from custody, one event per allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub ledger_id: u64,
    pub account: Address,
    pub asset: AssetId,
    pub amount: Amount,
    pub request_id: RequestId,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ContractEvent {
    Deposited(Deposited),
    Withdrawn(Withdrawn),
    BrokerAddressSet {
        address: Address,
    },
    CoSignerAddressSet {
        address: Address,
    },
    ParticipantRegistered {
        identity: Address,
    },
    ParticipantStatusChanged {
        identity: Address,
        status: ParticipantStatus,
    },
    ParticipantDataSet {
        identity: Address,
        data: Vec<u8>,
    },
    ParticipantMigratedFrom {
        identity: Address,
        source: Address,
    },
    ParticipantMigratedTo {
        identity: Address,
        target: Address,
    },
    NextImplementationSet {
        address: Address,
    },
    Initialized {
        version: u32,
    },
    Upgraded {
        implementation: Address,
    },
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
}

impl ContractEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ContractEvent::Deposited(_) => "Deposited",
            ContractEvent::Withdrawn(_) => "Withdrawn",
            ContractEvent::BrokerAddressSet { .. } => "BrokerAddressSet",
            ContractEvent::CoSignerAddressSet { .. } => "CoSignerAddressSet",
            ContractEvent::ParticipantRegistered { .. } => "ParticipantRegistered",
            ContractEvent::ParticipantStatusChanged { .. } => "ParticipantStatusChanged",
            ContractEvent::ParticipantDataSet { .. } => "ParticipantDataSet",
            ContractEvent::ParticipantMigratedFrom { .. } => "ParticipantMigratedFrom",
            ContractEvent::ParticipantMigratedTo { .. } => "ParticipantMigratedTo",
            ContractEvent::NextImplementationSet { .. } => "NextImplementationSet",
            ContractEvent::Initialized { .. } => "Initialized",
            ContractEvent::Upgraded { .. } => "Upgraded",
            ContractEvent::RoleGranted { .. } => "RoleGranted",
            ContractEvent::RoleRevoked { .. } => "RoleRevoked",
        }
    }
}

/// Append-only event log owned by one instance.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ContractEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: ContractEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop events recorded after `len`, used when an operation reverts.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }
}
