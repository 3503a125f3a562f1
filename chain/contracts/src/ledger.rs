//! Asset ledger: native currency and token balances
//!
//! Stands in for the chain's asset transfer primitives:
//! - Native balances moved with `transfer_native`
//! - Token balances with allowance semantics (`approve`, `transfer_from`)
//! - Tokens that return nothing or return `false` instead of reverting
//! - Checkpoint/restore so a failed operation leaves no partial transfers

use custody_types::ids::{Address, AssetId};
use custody_types::numeric::Amount;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

/// How a token contract reports the outcome of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Returns `true` on success, reverts on failure
    Standard,
    /// Returns no data on success, reverts on failure
    NoReturnValue,
    /// Returns `true` on success, `false` on failure without reverting
    ReturnsFalse,
}

/// Raw return of a token transfer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferReturn {
    True,
    Empty,
    False,
}

/// Ledger-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown token: {token}")]
    UnknownToken { token: Address },

    #[error("Insufficient balance for {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: AssetId,
        required: String,
        available: String,
    },

    #[error("Insufficient allowance for {token}: required {required}, available {available}")]
    InsufficientAllowance {
        token: Address,
        required: String,
        available: String,
    },

    #[error("Token {token} reported a failed transfer")]
    TransferFailed { token: Address },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::UnknownToken { .. } => "UnknownToken",
            LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
            LedgerError::InsufficientAllowance { .. } => "InsufficientAllowance",
            LedgerError::TransferFailed { .. } => "TransferFailed",
            LedgerError::Overflow => "Overflow",
        }
    }
}

/// Saved ledger state, see [`AssetLedger::checkpoint`].
#[derive(Debug, Clone)]
pub struct LedgerCheckpoint {
    balances: HashMap<Address, HashMap<AssetId, Amount>>,
    allowances: HashMap<(Address, Address, Address), Amount>,
}

/// In-memory asset ledger.
///
/// Balances are stored as `HashMap<Address, HashMap<AssetId, Decimal>>`.
/// Allowances are keyed by `(token, owner, spender)`.
#[derive(Debug, Clone, Default)]
pub struct AssetLedger {
    balances: HashMap<Address, HashMap<AssetId, Amount>>,
    allowances: HashMap<(Address, Address, Address), Amount>,
    tokens: HashMap<Address, TokenKind>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────────── Token registry ─────────────────────────

    /// Deploy a token contract with the given return-value behaviour.
    pub fn register_token(&mut self, token: Address, kind: TokenKind) -> AssetId {
        self.tokens.insert(token, kind);
        AssetId::Token(token)
    }

    pub fn token_kind(&self, token: &Address) -> Option<TokenKind> {
        self.tokens.get(token).copied()
    }

    // ───────────────────────── Balance queries ─────────────────────────

    pub fn balance_of(&self, account: &Address, asset: &AssetId) -> Amount {
        self.balances
            .get(account)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    // ───────────────────────── Mutations ─────────────────────────

    /// Create `amount` of `asset` out of thin air for `account`.
    pub fn mint(&mut self, account: Address, asset: AssetId, amount: Amount) -> Result<(), LedgerError> {
        if let AssetId::Token(token) = asset {
            self.require_token(&token)?;
        }
        self.safe_credit(account, asset, amount)
    }

    /// Set the allowance `owner` grants `spender` over `token`.
    pub fn approve(
        &mut self,
        owner: Address,
        token: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.require_token(&token)?;
        self.allowances.insert((token, owner, spender), amount);
        Ok(())
    }

    /// Move native currency between accounts.
    pub fn transfer_native(&mut self, from: &Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        self.move_balance(from, to, AssetId::Native, amount)
    }

    /// Token `transfer` called by `from`.
    pub fn token_transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: Address,
        amount: Amount,
    ) -> Result<TransferReturn, LedgerError> {
        let kind = self.require_token(token)?;
        let result = self.move_balance(from, to, AssetId::Token(*token), amount);
        Self::report(kind, result)
    }

    /// Token `transferFrom` called by `spender`, consuming allowance.
    pub fn token_transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: Address,
        amount: Amount,
    ) -> Result<TransferReturn, LedgerError> {
        let kind = self.require_token(token)?;

        let allowed = self.allowance(token, from, spender);
        if allowed < amount {
            let err = LedgerError::InsufficientAllowance {
                token: *token,
                required: amount.to_string(),
                available: allowed.to_string(),
            };
            return Self::report(kind, Err(err));
        }

        let result = self.move_balance(from, to, AssetId::Token(*token), amount);
        if result.is_ok() {
            self.allowances
                .insert((*token, *from, *spender), allowed - amount);
        }
        Self::report(kind, result)
    }

    // ───────────────────────── Checkpoints ─────────────────────────

    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            balances: self.balances.clone(),
            allowances: self.allowances.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: LedgerCheckpoint) {
        self.balances = checkpoint.balances;
        self.allowances = checkpoint.allowances;
    }

    // ───────────────────────── Internal ─────────────────────────

    fn require_token(&self, token: &Address) -> Result<TokenKind, LedgerError> {
        self.token_kind(token)
            .ok_or(LedgerError::UnknownToken { token: *token })
    }

    /// Map a balance move onto the token's reporting convention.
    fn report(kind: TokenKind, result: Result<(), LedgerError>) -> Result<TransferReturn, LedgerError> {
        match (kind, result) {
            (TokenKind::Standard, Ok(())) => Ok(TransferReturn::True),
            (TokenKind::NoReturnValue, Ok(())) => Ok(TransferReturn::Empty),
            (TokenKind::ReturnsFalse, Ok(())) => Ok(TransferReturn::True),
            (TokenKind::ReturnsFalse, Err(_)) => Ok(TransferReturn::False),
            (_, Err(e)) => Err(e),
        }
    }

    fn move_balance(
        &mut self,
        from: &Address,
        to: Address,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let checkpoint = self.checkpoint();
        self.safe_debit(from, &asset, amount)?;
        if let Err(e) = self.safe_credit(to, asset, amount) {
            self.restore(checkpoint);
            return Err(e);
        }
        Ok(())
    }

    /// Credit with overflow protection.
    fn safe_credit(&mut self, account: Address, asset: AssetId, amount: Amount) -> Result<(), LedgerError> {
        let current = self
            .balances
            .entry(account)
            .or_default()
            .entry(asset)
            .or_insert(Decimal::ZERO);

        *current = current.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Debit with underflow protection.
    fn safe_debit(&mut self, account: &Address, asset: &AssetId, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(account, asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: *asset,
                required: amount.to_string(),
                available: available.to_string(),
            });
        }

        let current = self
            .balances
            .entry(*account)
            .or_default()
            .entry(*asset)
            .or_insert(Decimal::ZERO);
        *current = current.checked_sub(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }
}
