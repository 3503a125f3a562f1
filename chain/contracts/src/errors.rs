//! Contract-specific error types
//!
//! Errors are grouped into the four failure families of the protocol
//! (authorization, replay, validity, state). Every leaf carries a stable
//! reason code through [`ContractError::code`].

use custody_types::ids::Address;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::security::{Operation, Role};

/// Caller or signer is not who the operation requires
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid signer: expected {expected}, recovered {recovered}")]
    InvalidSigner { expected: Address, recovered: Address },

    #[error("Account {account} is missing a role permitting {operation:?}")]
    AccountMissingRole { account: Address, operation: Operation },

    #[error("Next implementation does not grant {role:?} to this instance")]
    PrevImplRoleRequired { role: Role },
}

/// Something single-use has already been consumed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Signature or request id already used")]
    SignatureAlreadyUsed,

    #[error("Participant already exists: {identity}")]
    ParticipantAlreadyExist { identity: Address },

    #[error("Participant already migrated: {identity}")]
    ParticipantAlreadyMigrated { identity: Address },

    #[error("Already initialized")]
    AlreadyInitialized,

    #[error("Already migrated to implementation {implementation}")]
    AlreadyMigrated { implementation: Address },

    #[error("Next implementation already set")]
    NextImplAlreadySet,
}

/// Request content is malformed or not applicable here
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidityError {
    #[error("Request expired at {expiry}")]
    RequestExpired { expiry: i64 },

    #[error("Invalid action for this operation")]
    InvalidAction,

    #[error("Invalid chain id: expected {expected}, got {actual}")]
    InvalidChainId { expected: u64, actual: u64 },

    #[error("Payload targets {actual}, not this instance {expected}")]
    InvalidImplAddress { expected: Address, actual: Address },

    #[error("Allocation amount must be positive")]
    AmountZero,

    #[error("Address must not be null")]
    InvalidAddress,

    #[error("Destination must not be null")]
    DestinationZeroAddress,

    #[error("Supplied native amount {supplied} does not match required {required}")]
    InvalidEthAmount { required: String, supplied: String },

    #[error("Payload carries no allocations")]
    EmptyAllocations,

    #[error("Participant address must not be null")]
    InvalidParticipantAddress,

    #[error("Invalid participant status for this transition")]
    InvalidStatus,

    #[error("Invalid next implementation")]
    InvalidNextImpl,
}

/// Operation is not possible in the current state of the instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Vault already set up")]
    VaultAlreadySetup,

    #[error("Vault not set up")]
    VaultNotSetup,

    #[error("No next implementation linked")]
    NoNextImpl,

    #[error("Next implementation is not set")]
    NextImplZero,

    #[error("No participant: {identity}")]
    NoParticipant { identity: Address },

    #[error("Must be called through the delegating front-end")]
    MustThroughDelegatecall,

    #[error("Must not be called through the delegating front-end")]
    MustNotThroughDelegatecall,

    #[error("Unknown instance: {address}")]
    UnknownInstance { address: Address },
}

/// Codec failures that are not a role mismatch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Malformed signature: expected {expected} bytes, got {actual}")]
    MalformedSignature { expected: usize, actual: usize },

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// Top-level contract error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Validity error: {0}")]
    Validity(#[from] ValidityError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Asset transfer error: {0}")]
    Asset(#[from] LedgerError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
}

impl ContractError {
    /// Stable reason code identifying exactly one failure condition.
    pub fn code(&self) -> &'static str {
        match self {
            ContractError::Authorization(e) => match e {
                AuthorizationError::InvalidSignature => "InvalidSignature",
                AuthorizationError::InvalidSigner { .. } => "InvalidSigner",
                AuthorizationError::AccountMissingRole { .. } => "AccountMissingRole",
                AuthorizationError::PrevImplRoleRequired { .. } => "PrevImplRoleRequired",
            },
            ContractError::Replay(e) => match e {
                ReplayError::SignatureAlreadyUsed => "SignatureAlreadyUsed",
                ReplayError::ParticipantAlreadyExist { .. } => "ParticipantAlreadyExist",
                ReplayError::ParticipantAlreadyMigrated { .. } => "ParticipantAlreadyMigrated",
                ReplayError::AlreadyInitialized => "AlreadyInitialized",
                ReplayError::AlreadyMigrated { .. } => "AlreadyMigrated",
                ReplayError::NextImplAlreadySet => "NextImplAlreadySet",
            },
            ContractError::Validity(e) => match e {
                ValidityError::RequestExpired { .. } => "RequestExpired",
                ValidityError::InvalidAction => "InvalidAction",
                ValidityError::InvalidChainId { .. } => "InvalidChainId",
                ValidityError::InvalidImplAddress { .. } => "InvalidImplAddress",
                ValidityError::AmountZero => "AmountZero",
                ValidityError::InvalidAddress => "InvalidAddress",
                ValidityError::DestinationZeroAddress => "DestinationZeroAddress",
                ValidityError::InvalidEthAmount { .. } => "InvalidEthAmount",
                ValidityError::EmptyAllocations => "EmptyAllocations",
                ValidityError::InvalidParticipantAddress => "InvalidParticipantAddress",
                ValidityError::InvalidStatus => "InvalidStatus",
                ValidityError::InvalidNextImpl => "InvalidNextImpl",
            },
            ContractError::State(e) => match e {
                StateError::VaultAlreadySetup => "VaultAlreadySetup",
                StateError::VaultNotSetup => "VaultNotSetup",
                StateError::NoNextImpl => "NoNextImpl",
                StateError::NextImplZero => "NextImplZero",
                StateError::NoParticipant { .. } => "NoParticipant",
                StateError::MustThroughDelegatecall => "MustThroughDelegatecall",
                StateError::MustNotThroughDelegatecall => "MustNotThroughDelegatecall",
                StateError::UnknownInstance { .. } => "UnknownInstance",
            },
            ContractError::Asset(e) => e.code(),
            ContractError::Signing(_) => "InvalidSignature",
        }
    }
}
