//! Shared security primitives for contract modules
//!
//! Role-based access control with a data-driven policy (role → permitted
//! operations), and the spent-request set backing vault replay protection.

use custody_types::ids::{Address, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::errors::AuthorizationError;
use crate::signing::SignatureBytes;

/// Access control roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full instance control: setup, role management, upgrades
    Admin,
    /// Operational upkeep: participant data, chain links, upgrades
    Maintainer,
    /// Promotes pending participants
    Validator,
    /// Suspends and reinstates participants
    Auditor,
    /// Granted by a directory to the instance that links to it
    PreviousImplementation,
}

/// Gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    SetupVault,
    GrantRole,
    RevokeRole,
    ValidateParticipant,
    SuspendParticipant,
    ReinstateParticipant,
    SetParticipantData,
    SetNextImplementation,
    AcceptMigration,
    Upgrade,
    ApplyUpgrade,
}

/// Role → permitted operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    grants: BTreeMap<Role, BTreeSet<Operation>>,
}

impl AccessPolicy {
    /// Policy with no permissions at all.
    pub fn empty() -> Self {
        Self {
            grants: BTreeMap::new(),
        }
    }

    /// Permit `operation` for holders of `role`.
    pub fn allow(mut self, role: Role, operation: Operation) -> Self {
        self.grants.entry(role).or_default().insert(operation);
        self
    }

    pub fn permits(&self, role: Role, operation: Operation) -> bool {
        self.grants
            .get(&role)
            .map_or(false, |ops| ops.contains(&operation))
    }

    /// Roles whose holders may perform `operation`.
    pub fn roles_for(&self, operation: Operation) -> Vec<Role> {
        self.grants
            .iter()
            .filter(|(_, ops)| ops.contains(&operation))
            .map(|(role, _)| *role)
            .collect()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        use Operation::*;
        use Role::*;

        let table = [
            (Admin, vec![SetupVault, GrantRole, RevokeRole, Upgrade, ApplyUpgrade]),
            (
                Maintainer,
                vec![SetParticipantData, SetNextImplementation, Upgrade, ApplyUpgrade],
            ),
            (Validator, vec![ValidateParticipant]),
            (Auditor, vec![SuspendParticipant, ReinstateParticipant]),
            (PreviousImplementation, vec![AcceptMigration]),
        ];

        table
            .into_iter()
            .flat_map(|(role, ops)| ops.into_iter().map(move |op| (role, op)))
            .fold(AccessPolicy::empty(), |policy, (role, op)| policy.allow(role, op))
    }
}

/// Role-based access control manager.
///
/// Maps accounts to their assigned roles; whether a role may perform an
/// operation is decided by the [`AccessPolicy`].
#[derive(Debug, Clone)]
pub struct AccessControl {
    members: HashMap<Address, BTreeSet<Role>>,
    policy: AccessPolicy,
}

impl AccessControl {
    /// Access control with no members; nothing is permitted until a role is
    /// seeded with [`AccessControl::bootstrap`].
    pub fn new() -> Self {
        Self::with_policy(AccessPolicy::default())
    }

    pub fn with_policy(policy: AccessPolicy) -> Self {
        Self {
            members: HashMap::new(),
            policy,
        }
    }

    /// Access control with an initial admin.
    pub fn with_admin(admin: Address) -> Self {
        let mut ac = Self::new();
        ac.bootstrap(Role::Admin, admin);
        ac
    }

    /// Assign a role without a permission check (deployment/initialization).
    pub fn bootstrap(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(account).or_default().insert(role)
    }

    /// Check if an account holds the specified role.
    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        self.members
            .get(account)
            .map_or(false, |roles| roles.contains(&role))
    }

    /// True if any account holds `role`.
    pub fn is_assigned(&self, role: Role) -> bool {
        self.members.values().any(|roles| roles.contains(&role))
    }

    pub fn is_admin(&self, account: &Address) -> bool {
        self.has_role(account, Role::Admin)
    }

    /// Capability check: does any role held by `caller` permit `operation`?
    pub fn authorize(&self, caller: &Address, operation: Operation) -> Result<(), AuthorizationError> {
        let permitted = self
            .members
            .get(caller)
            .map_or(false, |roles| {
                roles.iter().any(|role| self.policy.permits(*role, operation))
            });
        if !permitted {
            return Err(AuthorizationError::AccountMissingRole {
                account: *caller,
                operation,
            });
        }
        Ok(())
    }

    /// Assign a role. Returns `Ok(false)` if the account already held it.
    pub fn grant_role(
        &mut self,
        sender: &Address,
        role: Role,
        account: Address,
    ) -> Result<bool, AuthorizationError> {
        self.authorize(sender, Operation::GrantRole)?;
        Ok(self.bootstrap(role, account))
    }

    /// Remove a role. Returns `Ok(false)` if the account did not hold it.
    pub fn revoke_role(
        &mut self,
        sender: &Address,
        role: Role,
        account: &Address,
    ) -> Result<bool, AuthorizationError> {
        self.authorize(sender, Operation::RevokeRole)?;
        Ok(self
            .members
            .get_mut(account)
            .map_or(false, |roles| roles.remove(&role)))
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumed request identifiers and signatures.
///
/// Both sets only grow. A request is replayed if its id or either of its
/// signatures has been seen before, whatever the rest of the payload says.
#[derive(Debug, Clone, Default)]
pub struct SpentRequests {
    request_ids: HashSet<RequestId>,
    signatures: HashSet<SignatureBytes>,
}

impl SpentRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_request_spent(&self, request_id: &RequestId) -> bool {
        self.request_ids.contains(request_id)
    }

    pub fn is_signature_spent(&self, signature: &SignatureBytes) -> bool {
        self.signatures.contains(signature)
    }

    /// True if the id or any of the signatures was already consumed.
    pub fn is_spent(&self, request_id: &RequestId, signatures: &[&SignatureBytes]) -> bool {
        self.is_request_spent(request_id)
            || signatures.iter().any(|sig| self.is_signature_spent(sig))
    }

    /// Mark the id and signatures consumed.
    pub fn consume(&mut self, request_id: RequestId, signatures: &[&SignatureBytes]) {
        self.request_ids.insert(request_id);
        for sig in signatures {
            self.signatures.insert((*sig).clone());
        }
    }

    pub fn consume_signature(&mut self, signature: &SignatureBytes) {
        self.signatures.insert(signature.clone());
    }

    pub fn request_count(&self) -> usize {
        self.request_ids.len()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }
}
