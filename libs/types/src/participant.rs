//! Participant lifecycle types
//!
//! `None → Pending → Active ⇄ Suspended`, and any present state may move to
//! `Migrated`, which is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TransitionError;
use crate::ids::Timestamp;

/// Participant status
///
/// Discriminants are the wire codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    #[default]
    None,
    Pending,
    Inactive,
    Active,
    Suspended,
    Migrated,
}

impl ParticipantStatus {
    pub fn code(&self) -> u8 {
        match self {
            ParticipantStatus::None => 0,
            ParticipantStatus::Pending => 1,
            ParticipantStatus::Inactive => 2,
            ParticipantStatus::Active => 3,
            ParticipantStatus::Suspended => 4,
            ParticipantStatus::Migrated => 5,
        }
    }

    /// Whether the record in this instance is authoritative.
    ///
    /// `None` is absent and `Migrated` means the record lives further down
    /// the chain, so neither counts as present.
    pub fn is_present(&self) -> bool {
        !matches!(self, ParticipantStatus::None | ParticipantStatus::Migrated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ParticipantStatus::Migrated)
    }
}

/// Participant record held by one directory instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub status: ParticipantStatus,
    pub registration_time: Timestamp,
    /// Last consumed identity-payload nonce
    pub nonce: u64,
    pub data: Vec<u8>,
}

impl ParticipantRecord {
    /// Move to `to`, enforcing the lifecycle graph.
    pub fn transition(&mut self, to: ParticipantStatus) -> Result<(), TransitionError> {
        use ParticipantStatus::*;

        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyMigrated);
        }
        let allowed = match (self.status, to) {
            (None, Pending) => true,
            (Pending, Active) => true,
            (Active, Suspended) => true,
            (Suspended, Active) => true,
            (Inactive, Active) => true,
            (from, Migrated) => from.is_present(),
            _ => false,
        };
        if !allowed {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Next nonce an identity payload must carry
    pub fn next_nonce(&self) -> u64 {
        self.nonce + 1
    }

    /// Registration time as a UTC datetime, `None` if never registered.
    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        if self.registration_time == 0 {
            return None;
        }
        DateTime::from_timestamp(self.registration_time, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_absent() {
        let record = ParticipantRecord::default();
        assert_eq!(record.status, ParticipantStatus::None);
        assert!(!record.status.is_present());
        assert_eq!(record.next_nonce(), 1);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut record = ParticipantRecord::default();
        record.transition(ParticipantStatus::Pending).unwrap();
        record.transition(ParticipantStatus::Active).unwrap();
        record.transition(ParticipantStatus::Suspended).unwrap();
        record.transition(ParticipantStatus::Active).unwrap();
        record.transition(ParticipantStatus::Migrated).unwrap();
        assert!(record.status.is_terminal());
        assert!(!record.status.is_present());
    }

    #[test]
    fn test_migrated_is_terminal() {
        let mut record = ParticipantRecord {
            status: ParticipantStatus::Migrated,
            ..Default::default()
        };
        assert_eq!(
            record.transition(ParticipantStatus::Active),
            Err(TransitionError::AlreadyMigrated)
        );
        assert_eq!(
            record.transition(ParticipantStatus::Migrated),
            Err(TransitionError::AlreadyMigrated)
        );
    }

    #[test]
    fn test_cannot_suspend_pending() {
        let mut record = ParticipantRecord::default();
        record.transition(ParticipantStatus::Pending).unwrap();
        assert_eq!(
            record.transition(ParticipantStatus::Suspended),
            Err(TransitionError::InvalidTransition {
                from: ParticipantStatus::Pending,
                to: ParticipantStatus::Suspended,
            })
        );
    }

    #[test]
    fn test_cannot_migrate_absent() {
        let mut record = ParticipantRecord::default();
        assert!(record.transition(ParticipantStatus::Migrated).is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ParticipantStatus::None.code(), 0);
        assert_eq!(ParticipantStatus::Migrated.code(), 5);
    }

    #[test]
    fn test_registered_at() {
        let mut record = ParticipantRecord::default();
        assert!(record.registered_at().is_none());
        record.registration_time = 1_700_000_000;
        assert_eq!(record.registered_at().map(|t| t.timestamp()), Some(1_700_000_000));
    }

    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        fn any_status() -> impl Strategy<Value = ParticipantStatus> {
            prop_oneof![
                Just(ParticipantStatus::None),
                Just(ParticipantStatus::Pending),
                Just(ParticipantStatus::Inactive),
                Just(ParticipantStatus::Active),
                Just(ParticipantStatus::Suspended),
                Just(ParticipantStatus::Migrated),
            ]
        }

        proptest! {
            /// Whatever path a record takes, once Migrated it never moves.
            #[test]
            fn fuzz_migrated_stays_migrated(path in prop::collection::vec(any_status(), 0..16)) {
                let mut record = ParticipantRecord::default();
                let mut migrated = false;
                for to in path {
                    let result = record.transition(to);
                    if migrated {
                        prop_assert_eq!(result, Err(TransitionError::AlreadyMigrated));
                    }
                    migrated = record.status.is_terminal();
                }
            }

            /// A failed transition leaves the record untouched.
            #[test]
            fn fuzz_rejected_transition_is_noop(from in any_status(), to in any_status()) {
                let mut record = ParticipantRecord { status: from, ..Default::default() };
                if record.transition(to).is_err() {
                    prop_assert_eq!(record.status, from);
                }
            }
        }
    }
}
