// 7.2: utilization funding. the accumulator advances once per full interval
// by factor * reserved / pool, so a fully-reserved pool accrues the whole
// factor and an idle pool accrues nothing.

use super::core::Vault;
use super::results::VaultError;
use crate::events::{EventPayload, UpdateFundingRateEvent};
use crate::math;
use crate::types::{FUNDING_INTERVAL, PRECISION};
use primitive_types::U256;

impl Vault {
    /// Advance the cumulative funding rate up to the current engine time.
    ///
    /// `last_funding_time` always advances by the full elapsed span, even
    /// though the accrual only counts whole intervals. With an empty pool
    /// the accumulator stays frozen until liquidity returns.
    pub fn refresh_cumulative_funding_rate(&mut self) -> Result<(), VaultError> {
        let elapsed = self.now.since(self.last_funding_time);
        if elapsed < FUNDING_INTERVAL {
            return Ok(());
        }

        let intervals = elapsed / FUNDING_INTERVAL;
        if !self.pool_amount.is_zero() {
            let accrued = math::mul_div(
                U256::from(self.params.funding_rate_factor) * U256::from(intervals),
                self.reserved_amount,
                self.pool_amount,
            )?;
            self.cumulative_funding_rate =
                math::checked_add(self.cumulative_funding_rate, accrued)?;
        }
        self.last_funding_time = self.now;

        self.emit(EventPayload::UpdateFundingRate(UpdateFundingRateEvent {
            cumulative_funding_rate: self.cumulative_funding_rate,
        }));
        Ok(())
    }

    /// Reserved-to-pool ratio, PRECISION-scaled. Zero on an empty pool.
    pub fn utilisation(&self) -> U256 {
        if self.pool_amount.is_zero() {
            return U256::zero();
        }
        self.reserved_amount * U256::from(PRECISION) / self.pool_amount
    }
}
