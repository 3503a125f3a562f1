//! Vault: dual-signature custody of native currency and tokens
//!
//! Every asset movement is authorized off-chain by two independent
//! identities, the broker and the co-signer, who both sign the same
//! [`AuthorizationPayload`]. The vault checks, in order:
//! 1. Action matches the entry point
//! 2. Payload targets this instance on this chain
//! 3. Payload has not expired
//! 4. Neither the request id nor either signature was consumed before
//! 5. Both signatures recover to the current role holders
//! 6. Allocations are well formed and the assets can be moved
//!
//! Any failure leaves the vault and the ledger untouched.

use custody_types::ids::{Address, AssetId, RequestId};
use custody_types::numeric::Amount;
use custody_types::payload::{Action, AuthorizationPayload};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::ChainConfig;
use crate::context::TxContext;
use crate::errors::{AuthorizationError, ContractError, ReplayError, StateError, ValidityError};
use crate::events::{ContractEvent, Deposited, EventLog, Withdrawn};
use crate::ledger::{AssetLedger, LedgerError, TransferReturn};
use crate::security::{AccessControl, Operation, Role, SpentRequests};
use crate::signing::{Ed25519Scheme, SignatureBytes, SignatureCodec, SignatureRecovery};
use crate::upgrade::Initializable;

/// Which authorizing identity a signature must come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signatory {
    Broker,
    CoSigner,
}

/// Custody vault instance.
///
/// Created unconfigured; a one-time `setup` by the admin installs the broker
/// and co-signer identities. Each of those can afterwards be rotated only by
/// a payload signed by its current holder.
#[derive(Debug, Clone)]
pub struct CustodyVault<R = Ed25519Scheme> {
    /// Address payloads must target
    address: Address,
    codec: SignatureCodec<R>,
    broker: Option<Address>,
    co_signer: Option<Address>,
    /// Monotonic operation counter, one per deposit/withdraw
    ledger_counter: u64,
    spent: SpentRequests,
    access_control: AccessControl,
    events: EventLog,
}

impl CustodyVault<Ed25519Scheme> {
    /// Unconfigured vault without an admin, for deployment behind a proxy.
    pub fn new(address: Address, config: &ChainConfig) -> Self {
        Self::with_codec(address, SignatureCodec::ed25519(config.signing_domain.clone()))
    }

    /// Standalone vault with `admin` holding the admin role.
    pub fn deploy(address: Address, admin: Address, config: &ChainConfig) -> Self {
        let mut vault = Self::new(address, config);
        vault.bootstrap_admin(admin);
        vault
    }
}

impl<R: SignatureRecovery> CustodyVault<R> {
    pub fn with_codec(address: Address, codec: SignatureCodec<R>) -> Self {
        Self {
            address,
            codec,
            broker: None,
            co_signer: None,
            ledger_counter: 0,
            spent: SpentRequests::new(),
            access_control: AccessControl::new(),
            events: EventLog::new(),
        }
    }

    fn bootstrap_admin(&mut self, admin: Address) {
        if self.access_control.bootstrap(Role::Admin, admin) {
            self.events.emit(ContractEvent::RoleGranted {
                role: Role::Admin,
                account: admin,
                sender: admin,
            });
        }
    }

    // ───────────────────────── Setup ─────────────────────────

    /// Install broker and co-signer. Admin-only, callable once.
    pub fn setup(
        &mut self,
        ctx: &TxContext,
        broker: Address,
        co_signer: Address,
    ) -> Result<(), ContractError> {
        self.access_control.authorize(&ctx.caller, Operation::SetupVault)?;

        if self.broker.is_some() || self.co_signer.is_some() {
            return Err(StateError::VaultAlreadySetup.into());
        }
        if broker.is_zero() || co_signer.is_zero() {
            return Err(ValidityError::InvalidAddress.into());
        }

        self.broker = Some(broker);
        self.co_signer = Some(co_signer);
        self.events.emit(ContractEvent::BrokerAddressSet { address: broker });
        self.events.emit(ContractEvent::CoSignerAddressSet { address: co_signer });

        info!(vault = %self.address, %broker, %co_signer, "Vault setup complete");
        Ok(())
    }

    // ───────────────────────── Deposit / Withdraw ─────────────────────────

    /// Pull the payload's allocations from the caller into custody.
    ///
    /// Native allocations must be covered exactly by `ctx.value`; tokens are
    /// pulled with `transfer_from` against the caller's allowance.
    /// Returns the ledger id assigned to the operation.
    pub fn deposit(
        &mut self,
        ctx: &TxContext,
        ledger: &mut AssetLedger,
        payload: &AuthorizationPayload,
        broker_sig: &SignatureBytes,
        co_signer_sig: &SignatureBytes,
    ) -> Result<u64, ContractError> {
        self.authorize_request(ctx, payload, Action::Deposit, broker_sig, co_signer_sig)?;
        self.validate_allocations(payload)?;

        let required = payload.native_total().ok_or(LedgerError::Overflow)?;
        if ctx.value != required {
            return Err(ValidityError::InvalidEthAmount {
                required: required.to_string(),
                supplied: ctx.value.to_string(),
            }
            .into());
        }

        let checkpoint = ledger.checkpoint();
        if let Err(e) = self.pull_assets(ctx, ledger, payload) {
            ledger.restore(checkpoint);
            warn!(vault = %self.address, request_id = %payload.request_id, error = %e, "Deposit transfer failed");
            return Err(e);
        }

        let ledger_id = self.commit(payload, broker_sig, co_signer_sig);
        for allocation in &payload.allocations {
            self.events.emit(ContractEvent::Deposited(Deposited {
                ledger_id,
                account: payload.destination,
                asset: allocation.asset,
                amount: allocation.amount,
                request_id: payload.request_id,
            }));
        }

        info!(
            vault = %self.address,
            ledger_id,
            request_id = %payload.request_id,
            allocations = payload.allocations.len(),
            "Deposit accepted"
        );
        Ok(ledger_id)
    }

    /// Release the payload's allocations from custody to its destination.
    pub fn withdraw(
        &mut self,
        ctx: &TxContext,
        ledger: &mut AssetLedger,
        payload: &AuthorizationPayload,
        broker_sig: &SignatureBytes,
        co_signer_sig: &SignatureBytes,
    ) -> Result<u64, ContractError> {
        self.authorize_request(ctx, payload, Action::Withdraw, broker_sig, co_signer_sig)?;
        self.validate_allocations(payload)?;

        if !ctx.value.is_zero() {
            return Err(ValidityError::InvalidEthAmount {
                required: Decimal::ZERO.to_string(),
                supplied: ctx.value.to_string(),
            }
            .into());
        }

        let checkpoint = ledger.checkpoint();
        if let Err(e) = self.push_assets(ledger, payload) {
            ledger.restore(checkpoint);
            warn!(vault = %self.address, request_id = %payload.request_id, error = %e, "Withdraw transfer failed");
            return Err(e);
        }

        let ledger_id = self.commit(payload, broker_sig, co_signer_sig);
        for allocation in &payload.allocations {
            self.events.emit(ContractEvent::Withdrawn(Withdrawn {
                ledger_id,
                account: payload.destination,
                asset: allocation.asset,
                amount: allocation.amount,
                request_id: payload.request_id,
            }));
        }

        info!(
            vault = %self.address,
            ledger_id,
            request_id = %payload.request_id,
            allocations = payload.allocations.len(),
            "Withdraw accepted"
        );
        Ok(ledger_id)
    }

    // ───────────────────────── Role rotation ─────────────────────────

    /// Replace the broker. `sig` must be the current broker's signature over
    /// the new address.
    pub fn set_broker_address(
        &mut self,
        new_address: Address,
        sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        self.rotate(Signatory::Broker, new_address, sig)?;
        self.spent.consume_signature(sig);
        self.broker = Some(new_address);
        self.events.emit(ContractEvent::BrokerAddressSet { address: new_address });
        info!(vault = %self.address, broker = %new_address, "Broker address rotated");
        Ok(())
    }

    /// Replace the co-signer. `sig` must be the current co-signer's signature
    /// over the new address.
    pub fn set_co_signer_address(
        &mut self,
        new_address: Address,
        sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        self.rotate(Signatory::CoSigner, new_address, sig)?;
        self.spent.consume_signature(sig);
        self.co_signer = Some(new_address);
        self.events.emit(ContractEvent::CoSignerAddressSet { address: new_address });
        info!(vault = %self.address, co_signer = %new_address, "Co-signer address rotated");
        Ok(())
    }

    // ───────────────────────── Access Control ─────────────────────────

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

    pub fn revoke_role(&mut self, ctx: &TxContext, role: Role, account: Address) -> Result<(), ContractError> {
        if self.access_control.revoke_role(&ctx.caller, role, &account)? {
            self.events.emit(ContractEvent::RoleRevoked {
                role,
                account,
                sender: ctx.caller,
            });
        }
        Ok(())
    }

    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        self.access_control.has_role(account, role)
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn broker_address(&self) -> Option<Address> {
        self.broker
    }

    pub fn co_signer_address(&self) -> Option<Address> {
        self.co_signer
    }

    /// Ledger id of the most recent operation, 0 before the first.
    pub fn get_last_id(&self) -> u64 {
        self.ledger_counter
    }

    pub fn is_setup(&self) -> bool {
        self.broker.is_some() && self.co_signer.is_some()
    }

    pub fn is_request_spent(&self, request_id: &RequestId) -> bool {
        self.spent.is_request_spent(request_id)
    }

    pub fn is_signature_spent(&self, signature: &SignatureBytes) -> bool {
        self.spent.is_signature_spent(signature)
    }

    pub fn codec(&self) -> &SignatureCodec<R> {
        &self.codec
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[ContractEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        self.events.drain()
    }

    // ───────────────────────── Internal ─────────────────────────

    /// Steps 1-5: everything that does not depend on the allocations.
    fn authorize_request(
        &self,
        ctx: &TxContext,
        payload: &AuthorizationPayload,
        expected: Action,
        broker_sig: &SignatureBytes,
        co_signer_sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        if payload.action != expected {
            return Err(ValidityError::InvalidAction.into());
        }
        if payload.target_contract != self.address {
            return Err(ValidityError::InvalidImplAddress {
                expected: self.address,
                actual: payload.target_contract,
            }
            .into());
        }
        if payload.chain_id != ctx.chain_id {
            return Err(ValidityError::InvalidChainId {
                expected: ctx.chain_id.0,
                actual: payload.chain_id.0,
            }
            .into());
        }
        if ctx.timestamp >= payload.expiry {
            return Err(ValidityError::RequestExpired {
                expiry: payload.expiry,
            }
            .into());
        }
        if self
            .spent
            .is_spent(&payload.request_id, &[broker_sig, co_signer_sig])
        {
            warn!(vault = %self.address, request_id = %payload.request_id, "Replayed request rejected");
            return Err(ReplayError::SignatureAlreadyUsed.into());
        }

        let encoded = self.codec.encode(payload);
        self.require_signatory(Signatory::Broker, &encoded, broker_sig)?;
        self.require_signatory(Signatory::CoSigner, &encoded, co_signer_sig)?;
        Ok(())
    }

    fn require_signatory(
        &self,
        who: Signatory,
        encoded: &[u8],
        sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        let expected = match who {
            Signatory::Broker => self.broker,
            Signatory::CoSigner => self.co_signer,
        }
        .ok_or(StateError::VaultNotSetup)?;

        match self.codec.verify(encoded, sig) {
            Ok(recovered) if recovered == expected => Ok(()),
            Ok(recovered) => {
                warn!(vault = %self.address, ?who, %expected, %recovered, "Signature from wrong signer");
                Err(AuthorizationError::InvalidSignature.into())
            }
            Err(e) => {
                warn!(vault = %self.address, ?who, error = %e, "Signature did not verify");
                Err(AuthorizationError::InvalidSignature.into())
            }
        }
    }

    fn validate_allocations(&self, payload: &AuthorizationPayload) -> Result<(), ContractError> {
        if payload.allocations.is_empty() {
            return Err(ValidityError::EmptyAllocations.into());
        }
        if payload.allocations.iter().any(|a| a.amount <= Decimal::ZERO) {
            return Err(ValidityError::AmountZero.into());
        }
        if payload.destination.is_zero() {
            return Err(ValidityError::DestinationZeroAddress.into());
        }
        Ok(())
    }

    fn rotate(
        &self,
        who: Signatory,
        new_address: Address,
        sig: &SignatureBytes,
    ) -> Result<(), ContractError> {
        if new_address.is_zero() {
            return Err(ValidityError::InvalidAddress.into());
        }
        if self.spent.is_signature_spent(sig) {
            return Err(ReplayError::SignatureAlreadyUsed.into());
        }
        self.require_signatory(who, &self.codec.encode(&new_address), sig)
    }

    fn pull_assets(
        &self,
        ctx: &TxContext,
        ledger: &mut AssetLedger,
        payload: &AuthorizationPayload,
    ) -> Result<(), ContractError> {
        if !ctx.value.is_zero() {
            ledger.transfer_native(&ctx.caller, self.address, ctx.value)?;
        }
        for allocation in &payload.allocations {
            if let AssetId::Token(token) = allocation.asset {
                let ret = ledger.token_transfer_from(
                    &token,
                    &self.address,
                    &ctx.caller,
                    self.address,
                    allocation.amount,
                )?;
                Self::require_transfer_success(token, ret)?;
            }
        }
        Ok(())
    }

    fn push_assets(
        &self,
        ledger: &mut AssetLedger,
        payload: &AuthorizationPayload,
    ) -> Result<(), ContractError> {
        for allocation in &payload.allocations {
            self.safe_transfer(ledger, allocation.asset, payload.destination, allocation.amount)?;
        }
        Ok(())
    }

    fn safe_transfer(
        &self,
        ledger: &mut AssetLedger,
        asset: AssetId,
        to: Address,
        amount: Amount,
    ) -> Result<(), ContractError> {
        match asset {
            AssetId::Native => ledger.transfer_native(&self.address, to, amount)?,
            AssetId::Token(token) => {
                let ret = ledger.token_transfer(&token, &self.address, to, amount)?;
                Self::require_transfer_success(token, ret)?;
            }
        }
        Ok(())
    }

    /// Tokens that return nothing are treated as successful; an explicit
    /// `false` is a failure.
    fn require_transfer_success(token: Address, ret: TransferReturn) -> Result<(), ContractError> {
        match ret {
            TransferReturn::True | TransferReturn::Empty => Ok(()),
            TransferReturn::False => Err(LedgerError::TransferFailed { token }.into()),
        }
    }

    /// Step 7: consume replay material and assign the ledger id.
    fn commit(
        &mut self,
        payload: &AuthorizationPayload,
        broker_sig: &SignatureBytes,
        co_signer_sig: &SignatureBytes,
    ) -> u64 {
        self.spent
            .consume(payload.request_id, &[broker_sig, co_signer_sig]);
        self.ledger_counter += 1;
        self.ledger_counter
    }
}

impl<R: SignatureRecovery> Initializable for CustodyVault<R> {
    fn initialize_storage(&mut self, admin: Address) -> Result<(), ContractError> {
        if self.access_control.is_assigned(Role::Admin) {
            return Err(ReplayError::AlreadyInitialized.into());
        }
        self.bootstrap_admin(admin);
        Ok(())
    }
}
