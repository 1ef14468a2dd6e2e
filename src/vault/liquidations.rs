// 7.4: the liquidation predicate and the liquidation itself. a position is
// liquidatable when losses eat the collateral, fees eat what is left, or
// leverage breaches the cap. liquidated collateral is retained by the pool.

use super::core::Vault;
use super::results::{LiquidationState, VaultError};
use crate::events::{EventPayload, LiquidatePositionEvent, UpdatePnlEvent};
use crate::math;
use crate::position::{self, Position, PositionKey};
use crate::types::{AccountId, Side, TokenId};
use primitive_types::U256;

impl Vault {
    /// The liquidation predicate, evaluated in a fixed order so the reported
    /// reason is deterministic.
    pub fn liquidation_state(&self, key: &PositionKey) -> Result<LiquidationState, VaultError> {
        let position = self
            .positions
            .get(key)
            .ok_or(VaultError::PositionNotExist)?;
        self.liquidation_state_of(position, key.index_token, key.side)
    }

    /// `true` when the position may be liquidated right now.
    pub fn can_liquidate(&self, key: &PositionKey) -> Result<bool, VaultError> {
        Ok(!self.liquidation_state(key)?.is_healthy())
    }

    pub(super) fn liquidation_state_of(
        &self,
        position: &Position,
        index_token: TokenId,
        side: Side,
    ) -> Result<LiquidationState, VaultError> {
        if position.size.is_zero() {
            return Err(VaultError::PositionNotExist);
        }

        let (has_profit, delta) = self.get_delta(
            index_token,
            position.size,
            position.entry_price,
            side,
            position.last_increased_time,
        )?;

        if !has_profit && position.collateral <= delta {
            return Ok(LiquidationState::LossesExceedCollateral);
        }

        let remaining_collateral = if has_profit {
            position.collateral
        } else {
            position.collateral - delta
        };

        let fees = math::checked_add(
            position::funding_fee(
                position.size,
                position.entry_funding_rate,
                self.cumulative_funding_rate,
            )?,
            position::position_fee(position.size, self.params.margin_fee_factor)?,
        )?;

        if remaining_collateral < fees {
            return Ok(LiquidationState::FeesExceedCollateral);
        }
        if remaining_collateral < math::checked_add(fees, self.params.liquidation_fee)? {
            return Ok(LiquidationState::LiquidationFeeExceedsCollateral);
        }
        if position.size / remaining_collateral > U256::from(self.params.max_leverage) {
            return Ok(LiquidationState::MaxLeverageExceeded);
        }

        Ok(LiquidationState::Healthy)
    }

    /// Close an eligible position involuntarily. Anyone may call. The
    /// remaining collateral stays in the pool; the reserve is released.
    pub fn liquidate_position(
        &mut self,
        account: AccountId,
        index_token: TokenId,
        side: Side,
    ) -> Result<(), VaultError> {
        let key = PositionKey::new(account, index_token, side);
        self.transactional(&[key], &[], |v| {
            v.refresh_cumulative_funding_rate()?;

            let position = v
                .positions
                .get(&key)
                .cloned()
                .ok_or(VaultError::PositionNotExist)?;

            let state = v.liquidation_state_of(&position, index_token, side)?;
            if state.is_healthy() {
                return Err(VaultError::NotLiquidatable);
            }

            let mark_price = match side {
                Side::Long => v.min_price(index_token)?,
                Side::Short => v.max_price(index_token)?,
            };

            v.decrease_reserved_amount(position.reserve_amount)?;

            // long collateral already sits in the pool; short collateral is
            // pulled in now so the pool retains it
            if !side.is_long() {
                v.increase_pool_amount(position.collateral)?;
            }

            let (has_profit, delta) = v.get_delta(
                index_token,
                position.size,
                position.entry_price,
                side,
                position.last_increased_time,
            )?;
            v.emit(EventPayload::UpdatePnl(UpdatePnlEvent {
                key,
                has_profit,
                delta,
            }));
            v.emit(EventPayload::LiquidatePosition(LiquidatePositionEvent {
                key,
                account,
                index_token,
                side,
                size: position.size,
                collateral: position.collateral,
                reserve_amount: position.reserve_amount,
                realised_pnl: position.realised_pnl,
                mark_price,
            }));

            v.positions.remove(&key);
            Ok(())
        })
    }
}
