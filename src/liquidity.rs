// 8.0 liquidity.rs: thin LP onboarding around USDG. deposits mint USDG at
// oracle value through the vault; withdrawals burn it after a cooldown so
// liquidity cannot flash in and out around funding boundaries.

use crate::types::{AccountId, Timestamp, Usd};
use crate::vault::{Vault, VaultError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_COOLDOWN: u64 = 900; // 15 minutes

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiquidityError {
    #[error("Liquidity: cooldown active, {remaining}s remaining")]
    CooldownActive { remaining: u64 },

    #[error(transparent)]
    Vault(#[from] VaultError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityManager {
    cooldown: u64,
    last_added: HashMap<AccountId, Timestamp>,
}

impl Default for LiquidityManager {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl LiquidityManager {
    pub fn new(cooldown: u64) -> Self {
        Self {
            cooldown,
            last_added: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }

    /// Deposit dollars, receive USDG.
    pub fn add_liquidity(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        amount: Usd,
    ) -> Result<U256, LiquidityError> {
        let minted = vault.buy_usdg(account, amount)?;
        self.last_added.insert(account, vault.time());
        Ok(minted)
    }

    /// Burn USDG, receive dollars. Gated by the per-account cooldown.
    pub fn remove_liquidity(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        usdg_amount: U256,
    ) -> Result<Usd, LiquidityError> {
        if let Some(added) = self.last_added.get(&account) {
            let unlock = added.as_secs() + self.cooldown;
            let now = vault.time().as_secs();
            if now < unlock {
                return Err(LiquidityError::CooldownActive {
                    remaining: unlock - now,
                });
            }
        }
        Ok(vault.sell_usdg(account, usdg_amount)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultParams;
    use crate::price_feed::PriceFeed;
    use crate::token::{Holder, TokenLedger};
    use crate::types::TokenId;

    const DOLLAR: TokenId = TokenId(0);

    fn vault() -> Vault {
        let mut feed = PriceFeed::new();
        feed.config_token(DOLLAR, 8, 6);
        feed.push_round(DOLLAR, 1_0000_0000, 0).unwrap();
        Vault::new(
            AccountId(0),
            DOLLAR,
            VaultParams::default(),
            feed,
            TokenLedger::new("USD", 6),
            TokenLedger::new("USDG", 18),
        )
    }

    fn usd(v: u64) -> U256 {
        U256::from(v) * U256::exp10(6)
    }

    #[test]
    fn add_then_remove_after_cooldown() {
        let mut vault = vault();
        let mut lp = LiquidityManager::new(900);
        let alice = AccountId(1);
        vault.dollar_mut().mint(Holder::Account(alice), usd(1_000));

        let minted = lp.add_liquidity(&mut vault, alice, usd(1_000)).unwrap();
        assert_eq!(minted, U256::from(1_000u64) * U256::exp10(18));

        // too soon
        let err = lp.remove_liquidity(&mut vault, alice, minted).unwrap_err();
        assert!(matches!(err, LiquidityError::CooldownActive { remaining: 900 }));

        vault.advance_time(900);
        let out = lp.remove_liquidity(&mut vault, alice, minted).unwrap();
        assert_eq!(out, usd(1_000));
    }

    #[test]
    fn fresh_account_has_no_cooldown() {
        let mut vault = vault();
        let mut lp = LiquidityManager::default();
        let alice = AccountId(1);
        let bob = AccountId(2);
        vault.dollar_mut().mint(Holder::Account(alice), usd(100));

        let minted = lp.add_liquidity(&mut vault, alice, usd(100)).unwrap();
        // transfer the USDG to an account that never deposited
        vault
            .usdg_mut()
            .transfer(Holder::Account(alice), Holder::Account(bob), minted)
            .unwrap();
        let out = lp.remove_liquidity(&mut vault, bob, minted).unwrap();
        assert_eq!(out, usd(100));
    }
}
