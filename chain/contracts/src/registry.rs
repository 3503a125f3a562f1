//! Registry: versioned participant directories
//!
//! Directories are deployed into an arena and linked forward exactly once,
//! forming a chain of successive versions. An identity may be present in at
//! most one directory of a chain; registration therefore searches the whole
//! chain in both directions, and migration moves a record to the tail.
//!
//! ```text
//! V1 ──next──▶ V2 ──next──▶ V3
//!    ◀─prev───    ◀─prev───
//! ```

use std::collections::HashMap;

use custody_types::errors::TransitionError;
use custody_types::ids::Address;
use custody_types::participant::{ParticipantRecord, ParticipantStatus};
use custody_types::payload::IdentityPayload;
use tracing::{debug, info, warn};

use crate::config::ChainConfig;
use crate::context::TxContext;
use crate::errors::{AuthorizationError, ContractError, ReplayError, StateError, ValidityError};
use crate::events::{ContractEvent, EventLog};
use crate::security::{AccessControl, Operation, Role};
use crate::signing::{Ed25519Scheme, SignatureBytes, SignatureCodec, SignatureRecovery};

/// Arena index of a directory within its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DirectoryId(usize);

/// Direction of a chain walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backwards,
    Forwards,
}

/// One directory version.
#[derive(Debug, Clone)]
pub struct Directory {
    address: Address,
    access_control: AccessControl,
    participants: HashMap<Address, ParticipantRecord>,
    next: Option<DirectoryId>,
    previous: Option<DirectoryId>,
    events: EventLog,
}

impl Directory {
    fn new(address: Address, admin: Address) -> Self {
        let mut events = EventLog::new();
        events.emit(ContractEvent::RoleGranted {
            role: Role::Admin,
            account: admin,
            sender: admin,
        });
        Self {
            address,
            access_control: AccessControl::with_admin(admin),
            participants: HashMap::new(),
            next: None,
            previous: None,
            events,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        self.access_control.has_role(account, role)
    }

    /// Local record, if this directory ever stored one.
    pub fn record(&self, identity: &Address) -> Option<&ParticipantRecord> {
        self.participants.get(identity)
    }

    pub fn status(&self, identity: &Address) -> ParticipantStatus {
        self.record(identity)
            .map_or(ParticipantStatus::None, |record| record.status)
    }

    /// Present means Pending, Inactive, Active or Suspended.
    pub fn is_present(&self, identity: &Address) -> bool {
        self.status(identity).is_present()
    }

    pub fn participant_count(&self) -> usize {
        self.participants
            .values()
            .filter(|record| record.status.is_present())
            .count()
    }

    pub fn events(&self) -> &[ContractEvent] {
        self.events.events()
    }
}

/// Arena of directory versions sharing one signature codec.
#[derive(Debug, Clone)]
pub struct RegistryChain<R = Ed25519Scheme> {
    directories: Vec<Directory>,
    index: HashMap<Address, DirectoryId>,
    codec: SignatureCodec<R>,
}

impl RegistryChain<Ed25519Scheme> {
    pub fn new(config: &ChainConfig) -> Self {
        Self::with_codec(SignatureCodec::ed25519(config.signing_domain.clone()))
    }
}

impl<R: SignatureRecovery> RegistryChain<R> {
    pub fn with_codec(codec: SignatureCodec<R>) -> Self {
        Self {
            directories: Vec::new(),
            index: HashMap::new(),
            codec,
        }
    }

    pub fn codec(&self) -> &SignatureCodec<R> {
        &self.codec
    }

    // ───────────────────────── Deployment ─────────────────────────

    /// Deploy an unlinked directory at `address` administered by `admin`.
    pub fn deploy_directory(&mut self, address: Address, admin: Address) -> Result<(), ContractError> {
        if address.is_zero() || admin.is_zero() || self.index.contains_key(&address) {
            return Err(ValidityError::InvalidAddress.into());
        }
        let id = DirectoryId(self.directories.len());
        self.directories.push(Directory::new(address, admin));
        self.index.insert(address, id);

        info!(instance = %address, %admin, "Directory deployed");
        Ok(())
    }

    pub fn directory_by_address(&self, address: &Address) -> Option<&Directory> {
        self.index.get(address).map(|id| &self.directories[id.0])
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    // ───────────────────────── Roles ─────────────────────────

    pub fn grant_role(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        role: Role,
        account: Address,
    ) -> Result<(), ContractError> {
        let dir = self.directory_mut(instance)?;
        if dir.access_control.grant_role(&ctx.caller, role, account)? {
            dir.events.emit(ContractEvent::RoleGranted {
                role,
                account,
                sender: ctx.caller,
            });
            info!(%instance, ?role, %account, "Role granted");
        }
        Ok(())
    }

    pub fn revoke_role(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        role: Role,
        account: Address,
    ) -> Result<(), ContractError> {
        let dir = self.directory_mut(instance)?;
        if dir.access_control.revoke_role(&ctx.caller, role, &account)? {
            dir.events.emit(ContractEvent::RoleRevoked {
                role,
                account,
                sender: ctx.caller,
            });
            info!(%instance, ?role, %account, "Role revoked");
        }
        Ok(())
    }

    /// Let `origin` link to `instance` as its previous version.
    pub fn grant_previous_implementation(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        origin: Address,
    ) -> Result<(), ContractError> {
        self.grant_role(ctx, instance, Role::PreviousImplementation, origin)
    }

    // ───────────────────────── Linking ─────────────────────────

    pub fn get_next_implementation(&self, instance: Address) -> Result<Option<Address>, ContractError> {
        let dir = self.directory(instance)?;
        Ok(dir.next.map(|id| self.directories[id.0].address))
    }

    pub fn get_previous_implementation(&self, instance: Address) -> Result<Option<Address>, ContractError> {
        let dir = self.directory(instance)?;
        Ok(dir.previous.map(|id| self.directories[id.0].address))
    }

    /// Link `instance` to `next`. Maintainer-only, once per instance.
    ///
    /// The target must not already have a predecessor, must not lie behind
    /// `instance`, and must have granted `instance` the previous-implementation
    /// role.
    pub fn set_next_implementation(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        next: Address,
    ) -> Result<(), ContractError> {
        let id = self.resolve(instance)?;
        let dir = &self.directories[id.0];
        dir.access_control
            .authorize(&ctx.caller, Operation::SetNextImplementation)?;

        if dir.next.is_some() {
            return Err(ReplayError::NextImplAlreadySet.into());
        }
        if next.is_zero() || next == instance {
            return Err(ValidityError::InvalidNextImpl.into());
        }
        let target = self
            .index
            .get(&next)
            .copied()
            .ok_or(ValidityError::InvalidNextImpl)?;
        if self.directories[target.0].previous.is_some() || self.walk(target, Direction::Forwards).any(|d| d == id) {
            return Err(ValidityError::InvalidNextImpl.into());
        }
        if !self.directories[target.0].has_role(&instance, Role::PreviousImplementation) {
            warn!(%instance, %next, "Next implementation does not recognize this instance");
            return Err(AuthorizationError::PrevImplRoleRequired {
                role: Role::PreviousImplementation,
            }
            .into());
        }

        self.directories[id.0].next = Some(target);
        self.directories[target.0].previous = Some(id);
        self.directories[id.0]
            .events
            .emit(ContractEvent::NextImplementationSet { address: next });

        info!(%instance, %next, "Next implementation set");
        Ok(())
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn has_participant(&self, instance: Address, identity: &Address) -> Result<bool, ContractError> {
        Ok(self.directory(instance)?.is_present(identity))
    }

    /// Local record, `None` status if never stored.
    pub fn participant(&self, instance: Address, identity: &Address) -> Result<ParticipantRecord, ContractError> {
        Ok(self
            .directory(instance)?
            .record(identity)
            .cloned()
            .unwrap_or_default())
    }

    pub fn participant_status(&self, instance: Address, identity: &Address) -> Result<ParticipantStatus, ContractError> {
        Ok(self.directory(instance)?.status(identity))
    }

    pub fn get_participant_data(&self, instance: Address, identity: &Address) -> Result<Vec<u8>, ContractError> {
        Ok(self
            .directory(instance)?
            .record(identity)
            .map(|record| record.data.clone())
            .unwrap_or_default())
    }

    /// The payload `identity` must sign for its next registration or
    /// migration at `instance`.
    pub fn get_identity_payload(&self, instance: Address, identity: &Address) -> Result<IdentityPayload, ContractError> {
        let nonce = self
            .directory(instance)?
            .record(identity)
            .map_or(1, ParticipantRecord::next_nonce);
        Ok(IdentityPayload {
            instance,
            identity: *identity,
            nonce,
        })
    }

    // ───────────────────────── Existence checks ─────────────────────────

    /// Fails if `identity` is present in any directory before `from`.
    pub fn require_participant_not_present_backwards(
        &self,
        from: Address,
        identity: &Address,
    ) -> Result<(), ContractError> {
        let id = self.resolve(from)?;
        self.require_absent_along(id, Direction::Backwards, identity)
    }

    /// Fails if `identity` is present in any directory after `from`.
    pub fn require_participant_not_present_forwards(
        &self,
        from: Address,
        identity: &Address,
    ) -> Result<(), ContractError> {
        let id = self.resolve(from)?;
        self.require_absent_along(id, Direction::Forwards, identity)
    }

    /// Fails if `identity` is present anywhere in the chain through `at`.
    pub fn require_participant_not_present_recursive(
        &self,
        at: Address,
        identity: &Address,
    ) -> Result<(), ContractError> {
        let id = self.resolve(at)?;
        if self.directories[id.0].is_present(identity) {
            return Err(ReplayError::ParticipantAlreadyExist { identity: *identity }.into());
        }
        self.require_absent_along(id, Direction::Backwards, identity)?;
        self.require_absent_along(id, Direction::Forwards, identity)
    }

    // ───────────────────────── Lifecycle ─────────────────────────

    /// Self-signed registration; the identity becomes Pending.
    pub fn register_participant(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
        sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        if identity.is_zero() {
            return Err(ValidityError::InvalidParticipantAddress.into());
        }
        let id = self.resolve(instance)?;
        if self.directories[id.0].status(&identity) == ParticipantStatus::Migrated {
            return Err(ReplayError::ParticipantAlreadyMigrated { identity }.into());
        }
        self.require_participant_not_present_recursive(instance, &identity)?;
        let payload = self.get_identity_payload(instance, &identity)?;
        self.require_self_signed(&payload, sig)?;

        let dir = &mut self.directories[id.0];
        let record = dir.participants.entry(identity).or_default();
        record
            .transition(ParticipantStatus::Pending)
            .map_err(|e| transition_error(e, identity))?;
        record.nonce = payload.nonce;
        record.registration_time = ctx.timestamp;
        dir.events
            .emit(ContractEvent::ParticipantRegistered { identity });

        info!(%instance, %identity, nonce = payload.nonce, "Participant registered");
        Ok(())
    }

    /// Pending → Active. Validator-only.
    pub fn validate_participant(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
    ) -> Result<(), ContractError> {
        self.change_status(
            ctx,
            instance,
            identity,
            Operation::ValidateParticipant,
            ParticipantStatus::Pending,
            ParticipantStatus::Active,
        )
    }

    /// Active → Suspended. Auditor-only.
    pub fn suspend_participant(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
    ) -> Result<(), ContractError> {
        self.change_status(
            ctx,
            instance,
            identity,
            Operation::SuspendParticipant,
            ParticipantStatus::Active,
            ParticipantStatus::Suspended,
        )
    }

    /// Suspended → Active. Auditor-only.
    pub fn reinstate_participant(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
    ) -> Result<(), ContractError> {
        self.change_status(
            ctx,
            instance,
            identity,
            Operation::ReinstateParticipant,
            ParticipantStatus::Suspended,
            ParticipantStatus::Active,
        )
    }

    /// Replace the opaque application data. Maintainer-only.
    pub fn set_participant_data(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
        data: Vec<u8>,
    ) -> Result<(), ContractError> {
        let dir = self.directory_mut(instance)?;
        dir.access_control
            .authorize(&ctx.caller, Operation::SetParticipantData)?;
        if identity.is_zero() {
            return Err(ValidityError::InvalidParticipantAddress.into());
        }
        if dir.status(&identity) == ParticipantStatus::Migrated {
            return Err(ReplayError::ParticipantAlreadyMigrated { identity }.into());
        }

        dir.participants.entry(identity).or_default().data = data.clone();
        dir.events
            .emit(ContractEvent::ParticipantDataSet { identity, data });

        info!(%instance, %identity, "Participant data set");
        Ok(())
    }

    /// Move `identity`'s record to the tail of the chain and mark it
    /// Migrated here. The identity signs its next identity payload; any
    /// caller may submit that signature, `ctx` only feeds the log.
    ///
    /// Fails with `ParticipantAlreadyExist` if a later version already
    /// holds a present record for the identity.
    pub fn migrate_participant(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
        sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        let id = self.resolve(instance)?;
        let source = &self.directories[id.0];
        if source.next.is_none() {
            return Err(StateError::NoNextImpl.into());
        }
        match source.status(&identity) {
            ParticipantStatus::Migrated => {
                return Err(ReplayError::ParticipantAlreadyMigrated { identity }.into())
            }
            ParticipantStatus::None => return Err(StateError::NoParticipant { identity }.into()),
            _ => {}
        }
        self.require_absent_along(id, Direction::Forwards, &identity)?;
        let payload = self.get_identity_payload(instance, &identity)?;
        self.require_self_signed(&payload, sig)?;

        let tail = self.tail_of(id);
        let tail_address = self.directories[tail.0].address;

        let mut record = source.record(&identity).cloned().unwrap_or_default();
        record.nonce = payload.nonce;

        let source = &mut self.directories[id.0];
        source
            .participants
            .entry(identity)
            .or_default()
            .transition(ParticipantStatus::Migrated)
            .map_err(|e| transition_error(e, identity))?;
        source.events.emit(ContractEvent::ParticipantMigratedTo {
            identity,
            target: tail_address,
        });

        let target = &mut self.directories[tail.0];
        target.participants.insert(identity, record);
        target.events.emit(ContractEvent::ParticipantMigratedFrom {
            identity,
            source: instance,
        });

        info!(%instance, %identity, target = %tail_address, caller = %ctx.caller, "Participant migrated");
        Ok(())
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self, instance: Address) -> Result<&[ContractEvent], ContractError> {
        Ok(self.directory(instance)?.events())
    }

    pub fn drain_events(&mut self, instance: Address) -> Result<Vec<ContractEvent>, ContractError> {
        Ok(self.directory_mut(instance)?.events.drain())
    }

    // ───────────────────────── Internal ─────────────────────────

    fn resolve(&self, address: Address) -> Result<DirectoryId, ContractError> {
        self.index
            .get(&address)
            .copied()
            .ok_or_else(|| StateError::UnknownInstance { address }.into())
    }

    fn directory(&self, address: Address) -> Result<&Directory, ContractError> {
        let id = self.resolve(address)?;
        Ok(&self.directories[id.0])
    }

    fn directory_mut(&mut self, address: Address) -> Result<&mut Directory, ContractError> {
        let id = self.resolve(address)?;
        Ok(&mut self.directories[id.0])
    }

    /// Directories reachable from `from` (exclusive), at most one visit per
    /// arena slot.
    fn walk(&self, from: DirectoryId, direction: Direction) -> impl Iterator<Item = DirectoryId> + '_ {
        let step = move |id: DirectoryId| match direction {
            Direction::Backwards => self.directories[id.0].previous,
            Direction::Forwards => self.directories[id.0].next,
        };
        std::iter::successors(step(from), move |id| step(*id)).take(self.directories.len())
    }

    fn tail_of(&self, from: DirectoryId) -> DirectoryId {
        self.walk(from, Direction::Forwards).last().unwrap_or(from)
    }

    fn require_absent_along(
        &self,
        from: DirectoryId,
        direction: Direction,
        identity: &Address,
    ) -> Result<(), ContractError> {
        for id in self.walk(from, direction) {
            let dir = &self.directories[id.0];
            debug!(instance = %dir.address, %identity, ?direction, "Checking directory");
            if dir.is_present(identity) {
                return Err(ReplayError::ParticipantAlreadyExist { identity: *identity }.into());
            }
        }
        Ok(())
    }

    fn require_self_signed(&self, payload: &IdentityPayload, sig: &SignatureBytes) -> Result<(), ContractError> {
        let recovered = self.codec.recover(payload, sig)?;
        if recovered != payload.identity {
            warn!(instance = %payload.instance, expected = %payload.identity, %recovered, "Identity payload signed by someone else");
            return Err(AuthorizationError::InvalidSigner {
                expected: payload.identity,
                recovered,
            }
            .into());
        }
        Ok(())
    }

    fn change_status(
        &mut self,
        ctx: &TxContext,
        instance: Address,
        identity: Address,
        operation: Operation,
        from: ParticipantStatus,
        to: ParticipantStatus,
    ) -> Result<(), ContractError> {
        let dir = self.directory_mut(instance)?;
        dir.access_control.authorize(&ctx.caller, operation)?;

        let record = match dir.participants.get_mut(&identity) {
            Some(record) if record.status != ParticipantStatus::None => record,
            _ => return Err(StateError::NoParticipant { identity }.into()),
        };
        if record.status == ParticipantStatus::Migrated {
            return Err(ReplayError::ParticipantAlreadyMigrated { identity }.into());
        }
        if record.status != from {
            return Err(ValidityError::InvalidStatus.into());
        }
        record
            .transition(to)
            .map_err(|e| transition_error(e, identity))?;
        dir.events
            .emit(ContractEvent::ParticipantStatusChanged { identity, status: to });

        info!(%instance, %identity, ?from, ?to, "Participant status changed");
        Ok(())
    }
}

fn transition_error(err: TransitionError, identity: Address) -> ContractError {
    match err {
        TransitionError::AlreadyMigrated => ReplayError::ParticipantAlreadyMigrated { identity }.into(),
        TransitionError::InvalidTransition { .. } => ValidityError::InvalidStatus.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{Ed25519Signer, MessageSigner};
    use custody_types::ids::ChainId;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn ctx(caller: Address) -> TxContext {
        TxContext::new(caller, ChainId(1), 1_700_000_000)
    }

    fn admin() -> Address {
        addr("admin")
    }

    /// Chain with one directory per label, roles granted to fixed accounts.
    fn chain_of(labels: &[&str]) -> RegistryChain {
        let mut chain = RegistryChain::new(&ChainConfig::default());
        for label in labels {
            let instance = addr(label);
            chain.deploy_directory(instance, admin()).unwrap();
            for (role, account) in [
                (Role::Maintainer, addr("maintainer")),
                (Role::Validator, addr("validator")),
                (Role::Auditor, addr("auditor")),
            ] {
                chain.grant_role(&ctx(admin()), instance, role, account).unwrap();
            }
        }
        chain
    }

    fn link(chain: &mut RegistryChain, from: &str, to: &str) {
        chain
            .grant_previous_implementation(&ctx(admin()), addr(to), addr(from))
            .unwrap();
        chain
            .set_next_implementation(&ctx(addr("maintainer")), addr(from), addr(to))
            .unwrap();
    }

    fn register(chain: &mut RegistryChain, instance: &str, who: &Ed25519Signer) -> Result<(), ContractError> {
        let payload = chain.get_identity_payload(addr(instance), &who.address()).unwrap();
        let sig = chain.codec().sign(who, &payload);
        chain.register_participant(&ctx(who.address()), addr(instance), who.address(), &sig)
    }

    #[test]
    fn test_register_sets_pending() {
        let mut chain = chain_of(&["v1"]);
        let alice = Ed25519Signer::from_label("alice");
        register(&mut chain, "v1", &alice).unwrap();
        let record = chain.participant(addr("v1"), &alice.address()).unwrap();
        assert_eq!(record.status, ParticipantStatus::Pending);
        assert_eq!(record.nonce, 1);
        assert!(chain.has_participant(addr("v1"), &alice.address()).unwrap());
    }

    #[test]
    fn test_register_wrong_signer() {
        let mut chain = chain_of(&["v1"]);
        let alice = Ed25519Signer::from_label("alice");
        let mallory = Ed25519Signer::from_label("mallory");
        let payload = chain.get_identity_payload(addr("v1"), &alice.address()).unwrap();
        let sig = chain.codec().sign(&mallory, &payload);
        let result = chain.register_participant(&ctx(alice.address()), addr("v1"), alice.address(), &sig);
        assert_eq!(result.unwrap_err().code(), "InvalidSigner");
    }

    #[test]
    fn test_register_twice_rejected() {
        let mut chain = chain_of(&["v1"]);
        let alice = Ed25519Signer::from_label("alice");
        register(&mut chain, "v1", &alice).unwrap();
        let result = register(&mut chain, "v1", &alice);
        assert_eq!(result.unwrap_err().code(), "ParticipantAlreadyExist");
    }

    #[test]
    fn test_register_null_identity() {
        let mut chain = chain_of(&["v1"]);
        let sig = SignatureBytes::new(vec![0; 96]);
        let result = chain.register_participant(&ctx(admin()), addr("v1"), Address::ZERO, &sig);
        assert_eq!(result, Err(ValidityError::InvalidParticipantAddress.into()));
    }

    #[test]
    fn test_status_lifecycle() {
        let mut chain = chain_of(&["v1"]);
        let alice = Ed25519Signer::from_label("alice");
        let id = alice.address();
        register(&mut chain, "v1", &alice).unwrap();

        chain.validate_participant(&ctx(addr("validator")), addr("v1"), id).unwrap();
        chain.suspend_participant(&ctx(addr("auditor")), addr("v1"), id).unwrap();
        assert_eq!(chain.participant_status(addr("v1"), &id).unwrap(), ParticipantStatus::Suspended);
        chain.reinstate_participant(&ctx(addr("auditor")), addr("v1"), id).unwrap();
        assert_eq!(chain.participant_status(addr("v1"), &id).unwrap(), ParticipantStatus::Active);
    }

    #[test]
    fn test_status_change_errors() {
        let mut chain = chain_of(&["v1"]);
        let alice = Ed25519Signer::from_label("alice");
        let id = alice.address();

        let absent = chain.suspend_participant(&ctx(addr("auditor")), addr("v1"), id);
        assert_eq!(absent, Err(StateError::NoParticipant { identity: id }.into()));

        register(&mut chain, "v1", &alice).unwrap();
        let wrong_state = chain.reinstate_participant(&ctx(addr("auditor")), addr("v1"), id);
        assert_eq!(wrong_state, Err(ValidityError::InvalidStatus.into()));

        let wrong_role = chain.validate_participant(&ctx(addr("auditor")), addr("v1"), id);
        assert_eq!(wrong_role.unwrap_err().code(), "AccountMissingRole");
    }

    #[test]
    fn test_set_participant_data() {
        let mut chain = chain_of(&["v1"]);
        let id = addr("alice");
        chain
            .set_participant_data(&ctx(addr("maintainer")), addr("v1"), id, b"kyc".to_vec())
            .unwrap();
        assert_eq!(chain.get_participant_data(addr("v1"), &id).unwrap(), b"kyc".to_vec());

        let null = chain.set_participant_data(&ctx(addr("maintainer")), addr("v1"), Address::ZERO, vec![]);
        assert_eq!(null, Err(ValidityError::InvalidParticipantAddress.into()));
    }

    #[test]
    fn test_link_requires_previous_role() {
        let mut chain = chain_of(&["v1", "v2"]);
        let result = chain.set_next_implementation(&ctx(addr("maintainer")), addr("v1"), addr("v2"));
        assert_eq!(result.unwrap_err().code(), "PrevImplRoleRequired");
    }

    #[test]
    fn test_link_once() {
        let mut chain = chain_of(&["v1", "v2", "v3"]);
        link(&mut chain, "v1", "v2");
        chain
            .grant_previous_implementation(&ctx(admin()), addr("v3"), addr("v1"))
            .unwrap();
        let result = chain.set_next_implementation(&ctx(addr("maintainer")), addr("v1"), addr("v3"));
        assert_eq!(result, Err(ReplayError::NextImplAlreadySet.into()));
        assert_eq!(chain.get_next_implementation(addr("v1")).unwrap(), Some(addr("v2")));
        assert_eq!(chain.get_previous_implementation(addr("v2")).unwrap(), Some(addr("v1")));
    }

    #[test]
    fn test_link_rejects_self_null_and_cycle() {
        let mut chain = chain_of(&["v1", "v2"]);
        let maintainer = ctx(addr("maintainer"));
        assert_eq!(
            chain.set_next_implementation(&maintainer, addr("v1"), addr("v1")),
            Err(ValidityError::InvalidNextImpl.into())
        );
        assert_eq!(
            chain.set_next_implementation(&maintainer, addr("v1"), Address::ZERO),
            Err(ValidityError::InvalidNextImpl.into())
        );
        link(&mut chain, "v1", "v2");
        chain
            .grant_previous_implementation(&ctx(admin()), addr("v1"), addr("v2"))
            .unwrap();
        assert_eq!(
            chain.set_next_implementation(&maintainer, addr("v2"), addr("v1")),
            Err(ValidityError::InvalidNextImpl.into())
        );
    }

    #[test]
    fn test_link_requires_maintainer() {
        let mut chain = chain_of(&["v1", "v2"]);
        let result = chain.set_next_implementation(&ctx(addr("validator")), addr("v1"), addr("v2"));
        assert_eq!(result.unwrap_err().code(), "AccountMissingRole");
    }

    #[test]
    fn test_existence_checks_both_directions() {
        let mut chain = chain_of(&["v1", "v2", "v3"]);
        link(&mut chain, "v1", "v2");
        link(&mut chain, "v2", "v3");
        let alice = Ed25519Signer::from_label("alice");
        register(&mut chain, "v3", &alice).unwrap();

        let forward = register(&mut chain, "v1", &alice);
        assert_eq!(forward.unwrap_err().code(), "ParticipantAlreadyExist");

        let bob = Ed25519Signer::from_label("bob");
        register(&mut chain, "v1", &bob).unwrap();
        let backward = register(&mut chain, "v3", &bob);
        assert_eq!(backward.unwrap_err().code(), "ParticipantAlreadyExist");
    }

    #[test]
    fn test_migrate_without_link() {
        let mut chain = chain_of(&["v1"]);
        let alice = Ed25519Signer::from_label("alice");
        register(&mut chain, "v1", &alice).unwrap();
        let payload = chain.get_identity_payload(addr("v1"), &alice.address()).unwrap();
        let sig = chain.codec().sign(&alice, &payload);
        let result = chain.migrate_participant(&ctx(alice.address()), addr("v1"), alice.address(), &sig);
        assert_eq!(result, Err(StateError::NoNextImpl.into()));
    }

    #[test]
    fn test_migrate_lands_at_tail() {
        let mut chain = chain_of(&["v1", "v2", "v3"]);
        let alice = Ed25519Signer::from_label("alice");
        register(&mut chain, "v1", &alice).unwrap();
        link(&mut chain, "v1", "v2");
        link(&mut chain, "v2", "v3");

        let payload = chain.get_identity_payload(addr("v1"), &alice.address()).unwrap();
        let sig = chain.codec().sign(&alice, &payload);
        chain
            .migrate_participant(&ctx(alice.address()), addr("v1"), alice.address(), &sig)
            .unwrap();

        assert_eq!(chain.participant_status(addr("v1"), &alice.address()).unwrap(), ParticipantStatus::Migrated);
        assert!(!chain.has_participant(addr("v2"), &alice.address()).unwrap());
        assert!(chain.has_participant(addr("v3"), &alice.address()).unwrap());
        assert_eq!(chain.participant(addr("v3"), &alice.address()).unwrap().nonce, 2);
    }

    #[test]
    fn test_unknown_instance() {
        let chain = chain_of(&["v1"]);
        let result = chain.has_participant(addr("nowhere"), &addr("alice"));
        assert_eq!(result.unwrap_err().code(), "UnknownInstance");
    }
}
