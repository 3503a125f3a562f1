//! Types library for the custody vault and participant registry
//!
//! This library provides the value types shared by the contract layer and by
//! any off-chain signer that builds payloads for it.
//!
//! # Modules
//! - `ids`: Identifiers (Address, RequestId, AssetId, ChainId)
//! - `numeric`: Decimal amounts
//! - `payload`: Authorization and identity payloads
//! - `participant`: Participant status lifecycle and records
//! - `errors`: Error taxonomy

pub mod ids;
pub mod numeric;
pub mod payload;
pub mod participant;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::payload::*;
    pub use crate::participant::*;
    pub use crate::errors::*;
}
