//! Transaction and block context
//!
//! Every externally invoked operation receives the caller, the network it
//! runs on, the block timestamp, and the native amount attached to the call.

use chrono::Utc;
use custody_types::ids::{Address, ChainId, Timestamp};
use custody_types::numeric::Amount;
use rust_decimal::Decimal;

use crate::config::ChainConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub caller: Address,
    pub chain_id: ChainId,
    pub timestamp: Timestamp,
    /// Native currency supplied with the call
    pub value: Amount,
}

impl TxContext {
    pub fn new(caller: Address, chain_id: ChainId, timestamp: Timestamp) -> Self {
        Self {
            caller,
            chain_id,
            timestamp,
            value: Decimal::ZERO,
        }
    }

    /// Context at the current wall-clock time.
    pub fn now(caller: Address, config: &ChainConfig) -> Self {
        Self::new(caller, config.chain_id, Utc::now().timestamp())
    }

    pub fn from_config(caller: Address, config: &ChainConfig, timestamp: Timestamp) -> Self {
        Self::new(caller, config.chain_id, timestamp)
    }

    /// Attach native currency to the call.
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    /// Same block, different caller.
    pub fn as_caller(&self, caller: Address) -> Self {
        Self {
            caller,
            value: Decimal::ZERO,
            ..self.clone()
        }
    }
}
