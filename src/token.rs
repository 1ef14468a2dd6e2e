//! Balance-transferring token collaborators.
//!
//! The engine treats the dollar and USDG tokens as opaque ledgers: balances
//! per holder, transfer, mint and burn. A configurable transfer fee models
//! fee-on-transfer dollars, which is why the vault always measures the actual
//! received delta instead of trusting the requested amount.

use crate::math;
use crate::types::{AccountId, CallerId, PRECISION};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Who holds a balance. Plugins (order book, delayed-order market) escrow
/// under their own caller identity; the vault holds the pool and fee reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Holder {
    Account(AccountId),
    Plugin(CallerId),
    Vault,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("{symbol}: balance {balance} below transfer amount {amount}")]
    InsufficientBalance {
        symbol: String,
        balance: U256,
        amount: U256,
    },

    #[error("{symbol}: burn amount {amount} exceeds balance")]
    BurnExceedsBalance { symbol: String, amount: U256 },

    #[error("token math: {0}")]
    Math(#[from] math::MathError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    symbol: String,
    decimals: u32,
    balances: HashMap<Holder, U256>,
    total_supply: U256,
    /// PRECISION-scaled fraction skimmed from every transfer (0 = vanilla).
    transfer_fee: u64,
}

impl TokenLedger {
    pub fn new(symbol: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            balances: HashMap::new(),
            total_supply: U256::zero(),
            transfer_fee: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Holder) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn set_transfer_fee(&mut self, fee: u64) {
        self.transfer_fee = fee;
    }

    pub fn mint(&mut self, to: Holder, amount: U256) {
        *self.balances.entry(to).or_default() += amount;
        self.total_supply += amount;
    }

    pub fn burn(&mut self, from: Holder, amount: U256) -> Result<(), TokenError> {
        let balance = self.balances.entry(from).or_default();
        if *balance < amount {
            return Err(TokenError::BurnExceedsBalance {
                symbol: self.symbol.clone(),
                amount,
            });
        }
        *balance -= amount;
        self.total_supply -= amount;
        Ok(())
    }

    /// Debits `amount` from the sender; the receiver is credited `amount`
    /// minus the transfer fee. The fee portion leaves circulation.
    pub fn transfer(&mut self, from: Holder, to: Holder, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                symbol: self.symbol.clone(),
                balance,
                amount,
            });
        }

        let fee = math::mul_div(amount, U256::from(self.transfer_fee), U256::from(PRECISION))?;
        let received = amount - fee;

        *self.balances.entry(from).or_default() -= amount;
        *self.balances.entry(to).or_default() += received;
        self.total_supply -= fee;
        Ok(())
    }

    // raw rollback hooks for the vault's transactional snapshot
    pub(crate) fn restore_balance(&mut self, holder: Holder, amount: U256) {
        self.balances.insert(holder, amount);
    }

    pub(crate) fn restore_total_supply(&mut self, supply: U256) {
        self.total_supply = supply;
    }
}
