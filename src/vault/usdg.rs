// 7.5: USDG mint and redeem against the shared pool. pricing is adversarial:
// mints value the dollar at its min price, redemptions at its max.

use super::core::Vault;
use super::results::VaultError;
use crate::events::{BuyUsdgEvent, EventPayload, SellUsdgEvent};
use crate::math;
use crate::token::Holder;
use crate::types::{AccountId, Usd, PRICE_PRECISION};
use primitive_types::U256;

impl Vault {
    /// Pull `amount` dollars from `account` and mint USDG proportional to
    /// the oracle value of what actually arrived. Grows the pool.
    pub fn buy_usdg(&mut self, account: AccountId, amount: Usd) -> Result<U256, VaultError> {
        let holders = [Holder::Account(account)];
        self.transactional(&[], &holders, |v| {
            v.ensure_not_paused()?;
            v.refresh_cumulative_funding_rate()?;

            let actual_amount = v.do_transfer_in(Holder::Account(account), amount)?;
            let price = v.min_price(v.dollar_token)?;
            let usdg_amount = math::mul_div(actual_amount, price, U256::from(PRICE_PRECISION))?;
            if usdg_amount.is_zero() {
                return Err(VaultError::InvalidUsdgAmount);
            }

            v.increase_pool_amount(actual_amount)?;
            v.usdg.mint(Holder::Account(account), usdg_amount);

            v.emit(EventPayload::BuyUsdg(BuyUsdgEvent {
                account,
                token_amount: actual_amount,
                usdg_amount,
            }));
            Ok(usdg_amount)
        })
    }

    /// Burn `usdg_amount` from `account` and pay out the redemption value in
    /// dollars. Shrinks the pool; fails if that would dip into the reserve.
    pub fn sell_usdg(&mut self, account: AccountId, usdg_amount: U256) -> Result<Usd, VaultError> {
        let holders = [Holder::Account(account)];
        self.transactional(&[], &holders, |v| {
            v.ensure_not_paused()?;
            v.refresh_cumulative_funding_rate()?;

            if usdg_amount.is_zero() {
                return Err(VaultError::InvalidUsdgAmount);
            }
            v.usdg.burn(Holder::Account(account), usdg_amount)?;

            let price = v.max_price(v.dollar_token)?;
            let redemption = math::mul_div(usdg_amount, U256::from(PRICE_PRECISION), price)?;
            if redemption.is_zero() {
                return Err(VaultError::InvalidUsdgAmount);
            }

            v.decrease_pool_amount(redemption)?;
            v.transfer_out(Holder::Account(account), redemption)?;

            v.emit(EventPayload::SellUsdg(SellUsdgEvent {
                account,
                usdg_amount,
                token_amount: redemption,
            }));
            Ok(redemption)
        })
    }
}
