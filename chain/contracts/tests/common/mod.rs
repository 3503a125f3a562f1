//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use custody_contracts::config::ChainConfig;
use custody_contracts::context::TxContext;
use custody_contracts::errors::ContractError;
use custody_contracts::ledger::{AssetLedger, TokenKind};
use custody_contracts::signing::{Ed25519Signer, MessageSigner, SignatureBytes};
use custody_contracts::vault::CustodyVault;
use custody_types::ids::{Address, AssetId, ChainId, RequestId};
use custody_types::payload::{Action, Allocation, AuthorizationPayload};
use rust_decimal::Decimal;

pub const NOW: i64 = 1_700_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn addr(label: &str) -> Address {
    Address::from_label(label)
}

pub fn ctx(caller: Address) -> TxContext {
    TxContext::new(caller, ChainId(1), NOW)
}

pub fn request_id(n: u64) -> RequestId {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    RequestId::from_bytes(bytes)
}

/// Vault set up with deterministic broker/co-signer keys and a funded user.
pub struct VaultHarness {
    pub vault: CustodyVault,
    pub ledger: AssetLedger,
    pub broker: Ed25519Signer,
    pub co_signer: Ed25519Signer,
    pub admin: Address,
    pub user: Address,
    pub token: Address,
}

impl VaultHarness {
    pub fn new() -> Self {
        let admin = addr("admin");
        let vault = CustodyVault::deploy(addr("vault"), admin, &ChainConfig::default());
        Self::with_vault(vault, admin)
    }

    /// Set up `vault` (already initialized with `admin`) and fund the user.
    pub fn with_vault(mut vault: CustodyVault, admin: Address) -> Self {
        let broker = Ed25519Signer::from_label("broker");
        let co_signer = Ed25519Signer::from_label("co-signer");
        vault
            .setup(&ctx(admin), broker.address(), co_signer.address())
            .unwrap();

        let mut ledger = AssetLedger::new();
        let token = addr("asset-a");
        ledger.register_token(token, TokenKind::Standard);
        let user = addr("user");
        ledger
            .mint(user, AssetId::Token(token), Decimal::from(10_000))
            .unwrap();
        ledger.mint(user, AssetId::Native, Decimal::from(10_000)).unwrap();
        ledger
            .approve(user, token, vault.address(), Decimal::from(10_000))
            .unwrap();

        Self {
            vault,
            ledger,
            broker,
            co_signer,
            admin,
            user,
            token,
        }
    }

    pub fn token_allocation(&self, amount: i64) -> Allocation {
        Allocation::new(AssetId::Token(self.token), Decimal::from(amount))
    }

    pub fn payload(&self, action: Action, id: u64, allocations: Vec<Allocation>) -> AuthorizationPayload {
        AuthorizationPayload {
            action,
            request_id: request_id(id),
            expiry: NOW + 3_600,
            destination: self.user,
            allocations,
            target_contract: self.vault.address(),
            chain_id: ChainId(1),
        }
    }

    pub fn sign(&self, payload: &AuthorizationPayload) -> (SignatureBytes, SignatureBytes) {
        let codec = self.vault.codec();
        (codec.sign(&self.broker, payload), codec.sign(&self.co_signer, payload))
    }

    pub fn deposit(&mut self, payload: &AuthorizationPayload) -> Result<u64, ContractError> {
        let (b, c) = self.sign(payload);
        let native = payload.native_total().unwrap_or(Decimal::ZERO);
        let call = ctx(self.user).with_value(native);
        self.vault.deposit(&call, &mut self.ledger, payload, &b, &c)
    }

    pub fn withdraw(&mut self, payload: &AuthorizationPayload) -> Result<u64, ContractError> {
        let (b, c) = self.sign(payload);
        self.vault
            .withdraw(&ctx(self.user), &mut self.ledger, payload, &b, &c)
    }

    pub fn custody(&self, asset: AssetId) -> Decimal {
        self.ledger.balance_of(&self.vault.address(), &asset)
    }
}
