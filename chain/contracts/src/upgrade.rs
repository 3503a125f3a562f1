//! Upgrade: logic instances behind a delegating front-end
//!
//! Logic instances are deployed into an [`UpgradeChain`] and linked forward
//! once each. A [`Proxy`] owns the storage and forwards to its current logic
//! instance. Upgrading repoints the proxy hop by hop to the end of the chain,
//! running each new version's migration exactly once.

use std::collections::HashSet;
use std::fmt;

use custody_types::ids::Address;
use tracing::{debug, info, warn};

use crate::context::TxContext;
use crate::errors::{ContractError, ReplayError, StateError, ValidityError};
use crate::events::{ContractEvent, EventLog};
use crate::security::{AccessControl, Operation, Role};

/// Storage that can sit behind a proxy.
pub trait Initializable {
    /// One-time setup run through the proxy; `admin` is the deployer.
    fn initialize_storage(&mut self, admin: Address) -> Result<(), ContractError>;
}

/// Stateful migration run when the proxy moves onto a logic version.
pub trait Migration<S> {
    fn migrate(&self, storage: &mut S) -> Result<(), ContractError>;
}

impl<S, F> Migration<S> for F
where
    F: Fn(&mut S) -> Result<(), ContractError>,
{
    fn migrate(&self, storage: &mut S) -> Result<(), ContractError> {
        self(storage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ImplId(usize);

/// Deployed logic version.
pub struct LogicInstance<S> {
    address: Address,
    /// 1-based deployment order
    version: u32,
    next: Option<ImplId>,
    access_control: AccessControl,
    migration: Option<Box<dyn Migration<S>>>,
}

impl<S> LogicInstance<S> {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn has_migration(&self) -> bool {
        self.migration.is_some()
    }
}

impl<S> fmt::Debug for LogicInstance<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicInstance")
            .field("address", &self.address)
            .field("version", &self.version)
            .field("next", &self.next)
            .field("has_migration", &self.migration.is_some())
            .finish()
    }
}

/// Arena of logic versions.
#[derive(Debug)]
pub struct UpgradeChain<S> {
    instances: Vec<LogicInstance<S>>,
}

impl<S> Default for UpgradeChain<S> {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
        }
    }
}

impl<S> UpgradeChain<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a logic version. `maintainer` may link it forward.
    pub fn deploy_implementation(
        &mut self,
        address: Address,
        maintainer: Address,
        migration: Option<Box<dyn Migration<S>>>,
    ) -> Result<(), ContractError> {
        if address.is_zero() || self.find(&address).is_some() {
            return Err(ValidityError::InvalidAddress.into());
        }
        let mut access_control = AccessControl::new();
        access_control.bootstrap(Role::Maintainer, maintainer);

        let version = self.instances.len() as u32 + 1;
        self.instances.push(LogicInstance {
            address,
            version,
            next: None,
            access_control,
            migration,
        });

        info!(implementation = %address, version, "Logic instance deployed");
        Ok(())
    }

    pub fn instance(&self, address: &Address) -> Option<&LogicInstance<S>> {
        self.find(address).map(|id| &self.instances[id.0])
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    // ─── Instance-local entry points ───

    pub fn get_next(&self, instance: Address) -> Result<Option<Address>, ContractError> {
        let id = self.resolve(instance)?;
        Ok(self.instances[id.0].next.map(|n| self.instances[n.0].address))
    }

    /// Link `instance` to `next`. Maintainer-only, once per instance.
    pub fn set_next(&mut self, ctx: &TxContext, instance: Address, next: Address) -> Result<(), ContractError> {
        let id = self.resolve(instance)?;
        let logic = &self.instances[id.0];
        logic
            .access_control
            .authorize(&ctx.caller, Operation::SetNextImplementation)?;
        if logic.next.is_some() {
            return Err(ReplayError::NextImplAlreadySet.into());
        }
        if next.is_zero() || next == instance {
            return Err(ValidityError::InvalidNextImpl.into());
        }
        let target = self.find(&next).ok_or(ValidityError::InvalidNextImpl)?;
        if self.successors(target).any(|n| n == id) {
            return Err(ValidityError::InvalidNextImpl.into());
        }

        self.instances[id.0].next = Some(target);
        info!(implementation = %instance, %next, "Next logic instance set");
        Ok(())
    }

    /// Direct calls never initialize anything; storage lives in the proxy.
    pub fn initialize(&self, instance: Address) -> Result<(), ContractError> {
        self.resolve(instance)?;
        Err(StateError::MustThroughDelegatecall.into())
    }

    pub fn apply_upgrade(&self, instance: Address) -> Result<(), ContractError> {
        self.resolve(instance)?;
        Err(StateError::MustThroughDelegatecall.into())
    }

    // ─── Internal ───

    fn find(&self, address: &Address) -> Option<ImplId> {
        self.instances
            .iter()
            .position(|logic| logic.address == *address)
            .map(ImplId)
    }

    fn resolve(&self, address: Address) -> Result<ImplId, ContractError> {
        self.find(&address)
            .ok_or_else(|| StateError::UnknownInstance { address }.into())
    }

    fn successors(&self, from: ImplId) -> impl Iterator<Item = ImplId> + '_ {
        std::iter::successors(self.instances[from.0].next, move |id| self.instances[id.0].next)
            .take(self.instances.len())
    }
}

/// Delegating front-end owning the storage `S`.
#[derive(Debug, Clone)]
pub struct Proxy<S> {
    address: Address,
    /// Current logic instance, resolved against the chain on each call
    implementation: Address,
    storage: S,
    initialized: bool,
    /// Logic versions whose migration already ran against this storage
    applied: HashSet<Address>,
    access_control: AccessControl,
    events: EventLog,
}

impl<S: Initializable + Clone> Proxy<S> {
    /// Front-end at `address` pointing at the deployed logic `implementation`.
    pub fn deploy(
        address: Address,
        chain: &UpgradeChain<S>,
        implementation: Address,
        storage: S,
    ) -> Result<Self, ContractError> {
        if address.is_zero() {
            return Err(ValidityError::InvalidAddress.into());
        }
        chain.resolve(implementation)?;
        Ok(Self {
            address,
            implementation,
            storage,
            initialized: false,
            applied: HashSet::new(),
            access_control: AccessControl::new(),
            events: EventLog::new(),
        })
    }

    /// One-time initialization; the caller becomes admin.
    pub fn initialize(&mut self, ctx: &TxContext, chain: &UpgradeChain<S>) -> Result<(), ContractError> {
        if self.initialized {
            return Err(ReplayError::AlreadyInitialized.into());
        }
        let version = self.version(chain)?;
        self.storage.initialize_storage(ctx.caller)?;
        self.access_control.bootstrap(Role::Admin, ctx.caller);
        self.initialized = true;
        self.applied.insert(self.implementation);

        self.events.emit(ContractEvent::RoleGranted {
            role: Role::Admin,
            account: ctx.caller,
            sender: ctx.caller,
        });
        self.events.emit(ContractEvent::Initialized { version });

        info!(proxy = %self.address, admin = %ctx.caller, version, "Proxy initialized");
        Ok(())
    }

    /// Run the current version's migration if it has not run yet.
    pub fn apply_upgrade(&mut self, ctx: &TxContext, chain: &UpgradeChain<S>) -> Result<(), ContractError> {
        self.access_control
            .authorize(&ctx.caller, Operation::ApplyUpgrade)?;
        self.apply_current(chain)
    }

    /// Follow next links to the end of the chain, one hop at a time.
    ///
    /// All hops succeed or none do. Returns the final implementation.
    pub fn upgrade(&mut self, ctx: &TxContext, chain: &UpgradeChain<S>) -> Result<Address, ContractError> {
        self.access_control
            .authorize(&ctx.caller, Operation::Upgrade)?;
        if self.logic(chain)?.next.is_none() {
            return Err(StateError::NextImplZero.into());
        }

        let storage = self.storage.clone();
        let applied = self.applied.clone();
        let implementation = self.implementation;
        let mark = self.events.len();

        if let Err(e) = self.cascade(chain) {
            warn!(proxy = %self.address, error = %e, "Upgrade reverted");
            self.storage = storage;
            self.applied = applied;
            self.implementation = implementation;
            self.events.truncate(mark);
            return Err(e);
        }

        info!(proxy = %self.address, implementation = %self.implementation, "Upgrade complete");
        Ok(self.implementation)
    }

    pub fn grant_role(&mut self, ctx: &TxContext, role: Role, account: Address) -> Result<(), ContractError> {
        if self.access_control.grant_role(&ctx.caller, role, account)? {
            self.events.emit(ContractEvent::RoleGranted {
                role,
                account,
                sender: ctx.caller,
            });
        }
        Ok(())
    }

    /// Next links are instance-local and cannot be read through the proxy.
    pub fn get_next(&self) -> Result<Option<Address>, ContractError> {
        Err(StateError::MustNotThroughDelegatecall.into())
    }

    pub fn set_next(&mut self, _next: Address) -> Result<(), ContractError> {
        Err(StateError::MustNotThroughDelegatecall.into())
    }

    // ─── Accessors ───

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn implementation(&self) -> Address {
        self.implementation
    }

    /// Version of the current logic instance within `chain`.
    pub fn version(&self, chain: &UpgradeChain<S>) -> Result<u32, ContractError> {
        Ok(self.logic(chain)?.version)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Delegated calls operate on the proxy's storage.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn events(&self) -> &[ContractEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        self.events.drain()
    }

    // ─── Internal ───

    fn logic<'c>(&self, chain: &'c UpgradeChain<S>) -> Result<&'c LogicInstance<S>, ContractError> {
        let id = chain.resolve(self.implementation)?;
        Ok(&chain.instances[id.0])
    }

    fn cascade(&mut self, chain: &UpgradeChain<S>) -> Result<(), ContractError> {
        while let Some(next) = self.logic(chain)?.next {
            let logic = &chain.instances[next.0];
            self.implementation = logic.address;
            debug!(proxy = %self.address, implementation = %logic.address, version = logic.version, "Upgrade hop");
            self.events.emit(ContractEvent::Upgraded {
                implementation: logic.address,
            });
            self.apply_current(chain)?;
        }
        Ok(())
    }

    fn apply_current(&mut self, chain: &UpgradeChain<S>) -> Result<(), ContractError> {
        let logic = self.logic(chain)?;
        if self.applied.contains(&self.implementation) {
            return Err(ReplayError::AlreadyMigrated {
                implementation: logic.address,
            }
            .into());
        }
        if let Some(migration) = &logic.migration {
            migration.migrate(&mut self.storage)?;
        }
        self.applied.insert(self.implementation);
        info!(proxy = %self.address, implementation = %logic.address, version = logic.version, "Upgrade applied");
        Ok(())
    }
}
