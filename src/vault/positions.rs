//! Position mutators. Only registered plugins reach these; the vault is the
//! sole owner of position and pool state.
//!
//! Ordering inside `increase_position` is load-bearing: the funding fee is
//! charged on the increased size but against the funding snapshot taken at
//! the previous increase, so fees are computed after the size update and
//! before the snapshot is overwritten.

use super::core::Vault;
use super::results::VaultError;
use crate::events::{
    ClosePositionEvent, DecreasePositionEvent, EventPayload, IncreasePositionEvent,
    UpdatePnlEvent, UpdatePositionEvent,
};
use crate::math;
use crate::position::{self, Position, PositionKey};
use crate::token::Holder;
use crate::types::{AccountId, CallerId, Price, Side, Timestamp, TokenId, Usd};
use primitive_types::U256;

impl Vault {
    /// `(has_profit, |pnl|)` for a position at the conservative mark price:
    /// min for longs, max for shorts.
    pub fn get_delta(
        &self,
        index_token: TokenId,
        size: Usd,
        entry_price: Price,
        side: Side,
        last_increased_time: Timestamp,
    ) -> Result<(bool, Usd), VaultError> {
        let mark_price = match side {
            Side::Long => self.min_price(index_token)?,
            Side::Short => self.max_price(index_token)?,
        };
        let (has_profit, delta) = position::position_delta(
            size,
            entry_price,
            mark_price,
            side,
            self.now,
            last_increased_time,
            self.params.min_profit_time,
            self.params.min_profit_bps_for(index_token),
        )?;
        Ok((has_profit, delta))
    }

    /// Open or grow a position. Pulls `amount_in` dollars from the calling
    /// plugin's escrow and credits the measured delta as collateral.
    pub fn increase_position(
        &mut self,
        caller: CallerId,
        account: AccountId,
        index_token: TokenId,
        amount_in: Usd,
        size_delta: Usd,
        side: Side,
    ) -> Result<(), VaultError> {
        let key = PositionKey::new(account, index_token, side);
        let holders = [Holder::Plugin(caller), Holder::Account(account)];
        self.transactional(&[key], &holders, |v| {
            v.ensure_not_paused()?;
            v.ensure_plugin(caller)?;
            v.ensure_whitelisted(index_token)?;
            v.refresh_cumulative_funding_rate()?;

            let actual_amount = v.do_transfer_in(Holder::Plugin(caller), amount_in)?;

            let mark_price = match side {
                Side::Long => v.max_price(index_token)?,
                Side::Short => v.min_price(index_token)?,
            };

            let mut position = v.positions.get(&key).cloned().unwrap_or_default();

            if position.size.is_zero() {
                position.entry_price = mark_price;
            } else if !size_delta.is_zero() {
                let (has_profit, delta) = v.get_delta(
                    index_token,
                    position.size,
                    position.entry_price,
                    side,
                    position.last_increased_time,
                )?;
                position.entry_price = position::next_average_price(
                    mark_price,
                    position.size,
                    size_delta,
                    side,
                    has_profit,
                    delta,
                )?;
            }

            // fee on the increased size, funding against the previous snapshot
            let new_size = math::checked_add(position.size, size_delta)?;
            let fee = math::checked_add(
                position::position_fee(size_delta, v.params.margin_fee_factor)?,
                position::funding_fee(
                    new_size,
                    position.entry_funding_rate,
                    v.cumulative_funding_rate,
                )?,
            )?;

            position.size = new_size;
            position.entry_funding_rate = v.cumulative_funding_rate;
            position.last_increased_time = v.now;

            let funded = math::checked_add(position.collateral, actual_amount)?;
            position.collateral =
                math::checked_sub(funded, fee).map_err(|_| VaultError::FeesExceedCollateral)?;
            v.fee_reserves = math::checked_add(v.fee_reserves, fee)?;

            v.validate_position(&position)?;
            v.liquidation_state_of(&position, index_token, side)?
                .require_healthy()?;

            position.reserve_amount = math::checked_add(position.reserve_amount, size_delta)?;
            v.increase_reserved_amount(size_delta)?;

            // long collateral lives inside the pool; the fee moves out of it
            if side.is_long() {
                v.increase_pool_amount(actual_amount)?;
                v.decrease_pool_amount(fee)?;
            }

            v.emit(EventPayload::IncreasePosition(IncreasePositionEvent {
                key,
                account,
                index_token,
                collateral_delta: actual_amount,
                size_delta,
                side,
                price: mark_price,
                fee,
            }));
            v.emit(EventPayload::UpdatePosition(UpdatePositionEvent {
                key,
                size: position.size,
                collateral: position.collateral,
                entry_price: position.entry_price,
                entry_funding_rate: position.entry_funding_rate,
                reserve_amount: position.reserve_amount,
                realised_pnl: position.realised_pnl,
                mark_price,
            }));

            v.positions.insert(key, position);
            Ok(())
        })
    }

    /// Shrink or close a position, paying dollars out to `account`.
    /// Returns the amount actually transferred (net of fees).
    pub fn decrease_position(
        &mut self,
        caller: CallerId,
        account: AccountId,
        index_token: TokenId,
        collateral_delta: Usd,
        size_delta: Usd,
        side: Side,
    ) -> Result<Usd, VaultError> {
        let key = PositionKey::new(account, index_token, side);
        let holders = [Holder::Plugin(caller), Holder::Account(account)];
        self.transactional(&[key], &holders, |v| {
            v.ensure_not_paused()?;
            v.ensure_plugin(caller)?;
            v.ensure_whitelisted(index_token)?;
            v.refresh_cumulative_funding_rate()?;

            let mut position = v
                .positions
                .get(&key)
                .cloned()
                .ok_or(VaultError::EmptyPosition)?;
            if position.size.is_zero() {
                return Err(VaultError::EmptyPosition);
            }
            if size_delta > position.size {
                return Err(VaultError::InvalidPositionSize);
            }
            if collateral_delta >= position.collateral {
                return Err(VaultError::CollateralExceeded);
            }

            // release the pro-rata share of the reserve
            let reserve_delta = math::mul_div(position.reserve_amount, size_delta, position.size)?;
            position.reserve_amount = math::checked_sub(position.reserve_amount, reserve_delta)?;
            v.decrease_reserved_amount(reserve_delta)?;

            let mark_price = match side {
                Side::Long => v.min_price(index_token)?,
                Side::Short => v.max_price(index_token)?,
            };

            let fee = math::checked_add(
                position::position_fee(size_delta, v.params.margin_fee_factor)?,
                position::funding_fee(
                    position.size,
                    position.entry_funding_rate,
                    v.cumulative_funding_rate,
                )?,
            )?;
            v.fee_reserves = math::checked_add(v.fee_reserves, fee)?;

            let (usd_out, usd_out_after_fee) = v.adjust_collateral(
                &mut position,
                key,
                index_token,
                side,
                collateral_delta,
                size_delta,
                fee,
            )?;

            let full_close = position.size == size_delta;
            if full_close {
                v.emit(EventPayload::DecreasePosition(DecreasePositionEvent {
                    key,
                    account,
                    index_token,
                    collateral_delta,
                    size_delta,
                    side,
                    price: mark_price,
                    fee,
                    usd_out,
                }));
                v.emit(EventPayload::ClosePosition(ClosePositionEvent {
                    key,
                    size: position.size,
                    collateral: position.collateral,
                    entry_price: position.entry_price,
                    entry_funding_rate: position.entry_funding_rate,
                    reserve_amount: position.reserve_amount,
                    realised_pnl: position.realised_pnl,
                }));
                v.positions.remove(&key);
            } else {
                position.entry_funding_rate = v.cumulative_funding_rate;
                position.size = math::checked_sub(position.size, size_delta)?;

                v.validate_position(&position)?;
                v.liquidation_state_of(&position, index_token, side)?
                    .require_healthy()?;

                v.emit(EventPayload::DecreasePosition(DecreasePositionEvent {
                    key,
                    account,
                    index_token,
                    collateral_delta,
                    size_delta,
                    side,
                    price: mark_price,
                    fee,
                    usd_out,
                }));
                v.emit(EventPayload::UpdatePosition(UpdatePositionEvent {
                    key,
                    size: position.size,
                    collateral: position.collateral,
                    entry_price: position.entry_price,
                    entry_funding_rate: position.entry_funding_rate,
                    reserve_amount: position.reserve_amount,
                    realised_pnl: position.realised_pnl,
                    mark_price,
                }));
                v.positions.insert(key, position);
            }

            // accounting first, the transfer is the last act
            if !usd_out.is_zero() {
                if side.is_long() {
                    v.decrease_pool_amount(usd_out)?;
                }
                v.transfer_out(Holder::Account(account), usd_out_after_fee)?;
            }

            Ok(usd_out_after_fee)
        })
    }

    /// Settle PnL and collateral for a decrease. Returns `(usd_out,
    /// usd_out_after_fee)`; mutates the position's collateral and realised
    /// PnL in place. Long PnL settles against the pool on the way out;
    /// short PnL settles here because short collateral sits outside it.
    #[allow(clippy::too_many_arguments)]
    fn adjust_collateral(
        &mut self,
        position: &mut Position,
        key: PositionKey,
        index_token: TokenId,
        side: Side,
        collateral_delta: Usd,
        size_delta: Usd,
        fee: Usd,
    ) -> Result<(Usd, Usd), VaultError> {
        let (has_profit, delta) = self.get_delta(
            index_token,
            position.size,
            position.entry_price,
            side,
            position.last_increased_time,
        )?;
        let adjusted_delta = math::mul_div(size_delta, delta, position.size)?;

        let mut usd_out = U256::zero();
        if !adjusted_delta.is_zero() {
            if has_profit {
                usd_out = adjusted_delta;
                position.realised_pnl = position.realised_pnl.plus(adjusted_delta);
                if !side.is_long() {
                    self.decrease_pool_amount(adjusted_delta)?;
                }
            } else {
                position.collateral = math::checked_sub(position.collateral, adjusted_delta)
                    .map_err(|_| VaultError::LossesExceedCollateral)?;
                position.realised_pnl = position.realised_pnl.minus(adjusted_delta);
                if !side.is_long() {
                    self.increase_pool_amount(adjusted_delta)?;
                }
            }
            self.emit(EventPayload::UpdatePnl(UpdatePnlEvent {
                key,
                has_profit,
                delta: adjusted_delta,
            }));
        }

        if !collateral_delta.is_zero() {
            usd_out = math::checked_add(usd_out, collateral_delta)?;
            position.collateral = math::checked_sub(position.collateral, collateral_delta)
                .map_err(|_| VaultError::CollateralExceeded)?;
        }

        if position.size == size_delta {
            usd_out = math::checked_add(usd_out, position.collateral)?;
            position.collateral = U256::zero();
        }

        let usd_out_after_fee = if usd_out > fee {
            usd_out - fee
        } else {
            position.collateral = math::checked_sub(position.collateral, fee)
                .map_err(|_| VaultError::FeesExceedCollateral)?;
            if side.is_long() {
                self.decrease_pool_amount(fee)?;
            }
            usd_out
        };

        Ok((usd_out, usd_out_after_fee))
    }

    pub(super) fn validate_position(&self, position: &Position) -> Result<(), VaultError> {
        if position.size.is_zero() {
            if !position.collateral.is_zero() {
                return Err(VaultError::InvalidPositionSize);
            }
            return Ok(());
        }
        if position.size < position.collateral {
            return Err(VaultError::SizeLessThanCollateral);
        }
        Ok(())
    }
}
