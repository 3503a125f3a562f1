//! Error types for the shared custody types
//!
//! Parsing and lifecycle errors using thiserror

use thiserror::Error;

use crate::participant::ParticipantStatus;

/// Errors produced when parsing identifiers from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid hex: {input}")]
    InvalidHex { input: String },

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Participant lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Participant already migrated")]
    AlreadyMigrated,

    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ParticipantStatus,
        to: ParticipantStatus,
    },
}
