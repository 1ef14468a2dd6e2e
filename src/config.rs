// 6.0 config.rs: all vault settings in one place. fees, leverage, funding,
// min-profit windows. presets cover the common deployments.

use crate::types::{TokenId, Usd, PRECISION};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultParams {
    // Margin fee on every size change, PRECISION-scaled (1000 = 0.1%)
    pub margin_fee_factor: u64,
    // Flat fee reserved for the liquidation executor, dollar units
    pub liquidation_fee: Usd,
    // Per-position leverage cap, plain multiplier
    pub max_leverage: u64,
    // Funding per interval at full utilisation, PRECISION-scaled
    pub funding_rate_factor: u64,
    // Window after an increase during which small profits are clamped
    pub min_profit_time: u64,
    // PRECISION-scaled profit floor per index token
    pub min_profit_bps: Vec<(TokenId, u64)>,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            margin_fee_factor: 1_000,                    // 0.1%
            liquidation_fee: U256::from(5_000_000u64),   // $5
            max_leverage: 50,
            funding_rate_factor: 600,                    // 0.06% per interval
            min_profit_time: 0,
            min_profit_bps: Vec::new(),
        }
    }
}

impl VaultParams {
    // Lower leverage, pricier liquidations, a min-profit window on everything
    // configured through `with_min_profit`.
    pub fn conservative() -> Self {
        Self {
            margin_fee_factor: 1_000,
            liquidation_fee: U256::from(10_000_000u64), // $10
            max_leverage: 10,
            funding_rate_factor: 600,
            min_profit_time: 10_800, // 3 hours
            min_profit_bps: Vec::new(),
        }
    }

    pub fn with_min_profit(mut self, token: TokenId, bps: u64) -> Self {
        self.min_profit_bps.retain(|(t, _)| *t != token);
        self.min_profit_bps.push((token, bps));
        self
    }

    pub fn min_profit_bps_for(&self, token: TokenId) -> u64 {
        self.min_profit_bps
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, bps)| *bps)
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_leverage == 0 {
            return Err(ConfigError::InvalidLeverage {
                reason: "max leverage must be at least 1x".to_string(),
            });
        }
        if self.margin_fee_factor as u128 >= PRECISION {
            return Err(ConfigError::InvalidFees {
                reason: "margin fee must be below 100%".to_string(),
            });
        }
        if self.funding_rate_factor as u128 >= PRECISION {
            return Err(ConfigError::InvalidFunding {
                reason: "funding factor must be below 100% per interval".to_string(),
            });
        }
        for (token, bps) in &self.min_profit_bps {
            if *bps as u128 >= PRECISION {
                return Err(ConfigError::InvalidFees {
                    reason: format!("min profit floor for {token:?} must be below 100%"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid leverage config: {reason}")]
    InvalidLeverage { reason: String },

    #[error("invalid fee config: {reason}")]
    InvalidFees { reason: String },

    #[error("invalid funding config: {reason}")]
    InvalidFunding { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_valid() {
        assert!(VaultParams::default().validate().is_ok());
        assert!(VaultParams::conservative().validate().is_ok());
    }

    #[test]
    fn min_profit_lookup_defaults_to_zero() {
        let params = VaultParams::default().with_min_profit(TokenId(1), 7_500);
        assert_eq!(params.min_profit_bps_for(TokenId(1)), 7_500);
        assert_eq!(params.min_profit_bps_for(TokenId(2)), 0);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let mut params = VaultParams::default();
        params.max_leverage = 0;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidLeverage { .. })
        ));

        let mut params = VaultParams::default();
        params.margin_fee_factor = PRECISION as u64;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidFees { .. })
        ));
    }

    #[test]
    fn params_serde_round_trip() {
        let params = VaultParams::conservative().with_min_profit(TokenId(3), 2_500);
        let json = serde_json::to_string(&params).unwrap();
        let back: VaultParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_leverage, params.max_leverage);
        assert_eq!(back.min_profit_bps_for(TokenId(3)), 2_500);
    }
}
