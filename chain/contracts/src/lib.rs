//! Contract logic for dual-signature custody and versioned participant registries
//!
//! This crate implements the contract layer: a custody vault that moves assets
//! only with broker and co-signer approval, a chain of participant directories
//! that can migrate records forward, and the proxy/upgrade chain the vault is
//! deployed behind.
//!
//! # Modules
//! - `config`: Chain identity and signing domain
//! - `context`: Transaction and block context
//! - `errors`: Contract error taxonomy with stable reason codes
//! - `events`: Contract events and per-instance event logs
//! - `ledger`: In-memory native/token balances with allowance semantics
//! - `security`: Role-based access control and spent-request tracking
//! - `signing`: Canonical payload encoding and signer recovery
//! - `vault`: Deposits and withdrawals authorized by two signatures
//! - `registry`: Linked participant directories and migration
//! - `upgrade`: Logic chain and delegating front-end
//!
//! # Version
//! v0.1.0

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod security;
pub mod signing;
pub mod upgrade;
pub mod vault;

/// Contract ABI version, frozen after release
pub const CONTRACT_ABI_VERSION: &str = "1.0.0";

pub use config::ChainConfig;
pub use context::TxContext;
pub use errors::ContractError;
pub use registry::RegistryChain;
pub use upgrade::{Proxy, UpgradeChain};
pub use vault::CustodyVault;
