//! Deployment configuration
//!
//! The chain id every payload must carry and the domain string mixed into
//! every signing digest. Loaded from JSON by deployment tooling.

use custody_types::ids::ChainId;
use serde::{Deserialize, Serialize};

/// Default signing domain separator.
pub const DEFAULT_SIGNING_DOMAIN: &str = "custody-v1";

/// Network-level configuration shared by all instances on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Identity of the network the instances are deployed on.
    pub chain_id: ChainId,
    /// Domain separator prepended to every canonical encoding before hashing.
    pub signing_domain: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: ChainId(1),
            signing_domain: DEFAULT_SIGNING_DOMAIN.to_owned(),
        }
    }
}

impl ChainConfig {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
