// 4.0: open position tracking. delta = size * |entry - mark| / entry.
// 4.2 has the entry-price averaging rule used on every increase.

use crate::math::{self, MathError};
use crate::types::{AccountId, Price, Side, SignedUsd, Timestamp, TokenId, Usd, PRECISION};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Positions are owned by the vault and keyed by this triple. External
/// systems can reproduce the key because it is derived from nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub account: AccountId,
    pub index_token: TokenId,
    pub side: Side,
}

impl PositionKey {
    pub fn new(account: AccountId, index_token: TokenId, side: Side) -> Self {
        Self {
            account,
            index_token,
            side,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    /// Notional exposure in dollar units.
    pub size: Usd,
    /// Dollar collateral posted, net of accrued fees.
    pub collateral: Usd,
    /// Size-weighted average entry mark price.
    pub entry_price: Price,
    /// Snapshot of the cumulative funding rate at last increase.
    pub entry_funding_rate: U256,
    /// Portion of the pool locked to cover this position's payouts.
    pub reserve_amount: Usd,
    /// Lifetime realised PnL, signed.
    pub realised_pnl: SignedUsd,
    /// Engine time of the last increase.
    pub last_increased_time: Timestamp,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }
}

/// Unrealised PnL of a position at `mark_price`: `(has_profit, |pnl|)`.
///
/// Small profits inside the min-profit window are clamped to zero, which
/// blunts single-block oracle front-running.
#[allow(clippy::too_many_arguments)]
pub fn position_delta(
    size: Usd,
    entry_price: Price,
    mark_price: Price,
    side: Side,
    now: Timestamp,
    last_increased_time: Timestamp,
    min_profit_time: u64,
    min_profit_bps: u64,
) -> Result<(bool, Usd), MathError> {
    let price_delta = math::abs_diff(entry_price, mark_price);
    let mut delta = math::mul_div(size, price_delta, entry_price)?;

    let has_profit = match side {
        Side::Long => mark_price > entry_price,
        Side::Short => entry_price > mark_price,
    };

    if has_profit && now.as_secs() <= last_increased_time.as_secs() + min_profit_time {
        let scaled_delta = delta
            .checked_mul(U256::from(PRECISION))
            .ok_or(MathError::Overflow)?;
        let threshold = size
            .checked_mul(U256::from(min_profit_bps))
            .ok_or(MathError::Overflow)?;
        if scaled_delta <= threshold {
            delta = U256::zero();
        }
    }

    Ok((has_profit, delta))
}

/// Entry price after growing a position by `size_delta` at `mark_price`.
///
/// The divisor folds the prior PnL in so that the position's total PnL at the
/// new entry price equals the prior PnL, up to integer truncation.
pub fn next_average_price(
    mark_price: Price,
    size: Usd,
    size_delta: Usd,
    side: Side,
    has_profit: bool,
    delta: Usd,
) -> Result<Price, MathError> {
    let next_size = math::checked_add(size, size_delta)?;
    let divisor = match (side, has_profit) {
        (Side::Long, true) | (Side::Short, false) => math::checked_add(next_size, delta)?,
        (Side::Long, false) | (Side::Short, true) => math::checked_sub(next_size, delta)?,
    };
    math::mul_div(mark_price, next_size, divisor)
}

/// Margin fee on a size change. `margin_fee_factor` is PRECISION-scaled.
pub fn position_fee(size_delta: Usd, margin_fee_factor: u64) -> Result<Usd, MathError> {
    math::mul_div(
        size_delta,
        U256::from(margin_fee_factor),
        U256::from(PRECISION),
    )
}

/// Funding owed since the position's snapshot of the accumulator.
pub fn funding_fee(
    size: Usd,
    entry_funding_rate: U256,
    cumulative_funding_rate: U256,
) -> Result<Usd, MathError> {
    let rate_delta = math::checked_sub(cumulative_funding_rate, entry_funding_rate)?;
    math::mul_div(size, rate_delta, U256::from(PRECISION))
}
