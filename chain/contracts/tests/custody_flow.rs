//! Custody flow: end-to-end deposit/withdraw scenarios
//!
//! - Deposit, replay, withdraw with ledger ids
//! - Request id and signature replay tracked separately
//! - Context checks (chain, target, expiry)
//! - Mixed native/token allocations and non-standard tokens
//! - Broker and co-signer rotation

mod common;

use common::*;
use custody_contracts::errors::{AuthorizationError, ReplayError, ValidityError};
use custody_contracts::events::ContractEvent;
use custody_contracts::ledger::TokenKind;
use custody_contracts::signing::{Ed25519Signer, MessageSigner};
use custody_types::ids::{AssetId, ChainId};
use custody_types::payload::{Action, Allocation};
use rust_decimal::Decimal;

#[test]
fn test_deposit_replay_withdraw_scenario() {
    init_tracing();
    let mut h = VaultHarness::new();
    let asset = AssetId::Token(h.token);

    let deposit = h.payload(Action::Deposit, 1, vec![h.token_allocation(100)]);
    assert_eq!(h.deposit(&deposit).unwrap(), 1);
    assert_eq!(h.custody(asset), Decimal::from(100));
    assert_eq!(h.vault.get_last_id(), 1);

    let replay = h.deposit(&deposit);
    assert_eq!(replay, Err(ReplayError::SignatureAlreadyUsed.into()));
    assert_eq!(h.custody(asset), Decimal::from(100));

    let withdraw = h.payload(Action::Withdraw, 2, vec![h.token_allocation(100)]);
    assert_eq!(h.withdraw(&withdraw).unwrap(), 2);
    assert_eq!(h.custody(asset), Decimal::ZERO);
    assert_eq!(h.vault.get_last_id(), 2);
    assert_eq!(h.ledger.balance_of(&h.user, &asset), Decimal::from(10_000));
}

#[test]
fn test_fresh_request_after_consumed_one() {
    let mut h = VaultHarness::new();
    h.deposit(&h.payload(Action::Deposit, 1, vec![h.token_allocation(5)]))
        .unwrap();
    h.deposit(&h.payload(Action::Deposit, 2, vec![h.token_allocation(5)]))
        .unwrap();
    assert_eq!(h.vault.get_last_id(), 2);
}

#[test]
fn test_same_request_id_different_payload() {
    let mut h = VaultHarness::new();
    h.deposit(&h.payload(Action::Deposit, 1, vec![h.token_allocation(5)]))
        .unwrap();

    let altered = h.payload(Action::Deposit, 1, vec![h.token_allocation(6)]);
    assert_eq!(h.deposit(&altered), Err(ReplayError::SignatureAlreadyUsed.into()));
}

#[test]
fn test_reused_signature_with_new_request_id() {
    let mut h = VaultHarness::new();
    let first = h.payload(Action::Deposit, 1, vec![h.token_allocation(5)]);
    let (b, c) = h.sign(&first);
    h.vault
        .deposit(&ctx(h.user), &mut h.ledger, &first, &b, &c)
        .unwrap();

    let second = h.payload(Action::Deposit, 2, vec![h.token_allocation(5)]);
    let (_, fresh_c) = h.sign(&second);
    let result = h
        .vault
        .deposit(&ctx(h.user), &mut h.ledger, &second, &b, &fresh_c);
    assert_eq!(result, Err(ReplayError::SignatureAlreadyUsed.into()));
    assert!(!h.vault.is_request_spent(&second.request_id));
}

#[test]
fn test_swapped_signatures() {
    let mut h = VaultHarness::new();
    let p = h.payload(Action::Deposit, 1, vec![h.token_allocation(5)]);
    let (b, c) = h.sign(&p);
    let result = h.vault.deposit(&ctx(h.user), &mut h.ledger, &p, &c, &b);
    assert_eq!(result, Err(AuthorizationError::InvalidSignature.into()));
    assert_eq!(h.vault.get_last_id(), 0);
}

#[test]
fn test_wrong_chain_and_target() {
    let mut h = VaultHarness::new();

    let mut other_chain = h.payload(Action::Deposit, 1, vec![h.token_allocation(5)]);
    other_chain.chain_id = ChainId(5);
    assert_eq!(h.deposit(&other_chain).unwrap_err().code(), "InvalidChainId");

    let mut other_vault = h.payload(Action::Deposit, 2, vec![h.token_allocation(5)]);
    other_vault.target_contract = addr("other-vault");
    assert_eq!(h.deposit(&other_vault).unwrap_err().code(), "InvalidImplAddress");
}

#[test]
fn test_expiry_boundary() {
    let mut h = VaultHarness::new();
    let mut p = h.payload(Action::Deposit, 1, vec![h.token_allocation(5)]);
    p.expiry = NOW;
    assert_eq!(
        h.deposit(&p),
        Err(ValidityError::RequestExpired { expiry: NOW }.into())
    );

    p.expiry = NOW + 1;
    assert_eq!(h.deposit(&p).unwrap(), 1);
}

#[test]
fn test_allocation_validation() {
    let mut h = VaultHarness::new();

    let empty = h.payload(Action::Deposit, 1, vec![]);
    assert_eq!(h.deposit(&empty), Err(ValidityError::EmptyAllocations.into()));

    let zero = h.payload(Action::Deposit, 2, vec![h.token_allocation(0)]);
    assert_eq!(h.deposit(&zero), Err(ValidityError::AmountZero.into()));

    let mut nowhere = h.payload(Action::Withdraw, 3, vec![h.token_allocation(1)]);
    nowhere.destination = custody_types::ids::Address::ZERO;
    assert_eq!(h.withdraw(&nowhere), Err(ValidityError::DestinationZeroAddress.into()));
}

#[test]
fn test_mixed_allocations_share_ledger_id() {
    let mut h = VaultHarness::new();
    h.vault.drain_events();
    let p = h.payload(
        Action::Deposit,
        1,
        vec![
            h.token_allocation(40),
            Allocation::new(AssetId::Native, Decimal::from(3)),
            Allocation::new(AssetId::Native, Decimal::from(2)),
        ],
    );
    h.deposit(&p).unwrap();

    assert_eq!(h.custody(AssetId::Native), Decimal::from(5));
    let events = h.vault.drain_events();
    assert_eq!(events.len(), 3);
    for event in &events {
        match event {
            ContractEvent::Deposited(d) => {
                assert_eq!(d.ledger_id, 1);
                assert_eq!(d.request_id, p.request_id);
                assert_eq!(d.account, h.user);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[test]
fn test_native_amount_must_match_exactly() {
    let mut h = VaultHarness::new();
    let p = h.payload(Action::Deposit, 1, vec![Allocation::new(AssetId::Native, Decimal::from(10))]);
    let (b, c) = h.sign(&p);
    let over = ctx(h.user).with_value(Decimal::from(11));
    let result = h.vault.deposit(&over, &mut h.ledger, &p, &b, &c);
    assert_eq!(result.unwrap_err().code(), "InvalidEthAmount");
    assert!(!h.vault.is_signature_spent(&b));
}

#[test]
fn test_no_return_value_token_roundtrip() {
    let mut h = VaultHarness::new();
    let quiet = addr("quiet-token");
    h.ledger.register_token(quiet, TokenKind::NoReturnValue);
    h.ledger.mint(h.user, AssetId::Token(quiet), Decimal::from(50)).unwrap();
    h.ledger
        .approve(h.user, quiet, h.vault.address(), Decimal::from(50))
        .unwrap();

    let alloc = Allocation::new(AssetId::Token(quiet), Decimal::from(50));
    h.deposit(&h.payload(Action::Deposit, 1, vec![alloc])).unwrap();
    assert_eq!(h.custody(AssetId::Token(quiet)), Decimal::from(50));

    h.withdraw(&h.payload(Action::Withdraw, 2, vec![alloc])).unwrap();
    assert_eq!(h.custody(AssetId::Token(quiet)), Decimal::ZERO);
}

#[test]
fn test_rotated_broker_authorizes_next_request() {
    let mut h = VaultHarness::new();
    let next = Ed25519Signer::from_label("broker-2");
    let sig = h.vault.codec().sign(&h.broker, &next.address());
    h.vault.set_broker_address(next.address(), &sig).unwrap();
    assert_eq!(h.vault.broker_address(), Some(next.address()));

    // Old broker no longer authorizes deposits.
    let p = h.payload(Action::Deposit, 1, vec![h.token_allocation(1)]);
    assert_eq!(h.deposit(&p), Err(AuthorizationError::InvalidSignature.into()));

    h.broker = next;
    assert_eq!(h.deposit(&p).unwrap(), 1);
}

#[test]
fn test_withdraw_action_mismatch() {
    let mut h = VaultHarness::new();
    let p = h.payload(Action::Deposit, 1, vec![h.token_allocation(1)]);
    assert_eq!(h.withdraw(&p), Err(ValidityError::InvalidAction.into()));
}
