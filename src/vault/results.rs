// 7.0.1: result types and errors for vault operations.

use crate::math::MathError;
use crate::price_feed::PriceFeedError;
use crate::token::TokenError;
use crate::types::TokenId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of the liquidation predicate. Anything but `Healthy` makes the
/// position eligible for liquidation; position mutators require `Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationState {
    Healthy,
    LossesExceedCollateral,
    FeesExceedCollateral,
    LiquidationFeeExceedsCollateral,
    MaxLeverageExceeded,
}

impl LiquidationState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, LiquidationState::Healthy)
    }

    /// Position mutators must leave the position healthy; map any other
    /// state to the matching error.
    pub(crate) fn require_healthy(self) -> Result<(), VaultError> {
        match self {
            LiquidationState::Healthy => Ok(()),
            LiquidationState::LossesExceedCollateral => Err(VaultError::LossesExceedCollateral),
            LiquidationState::FeesExceedCollateral => Err(VaultError::FeesExceedCollateral),
            LiquidationState::LiquidationFeeExceedsCollateral => {
                Err(VaultError::LiquidationFeesExceedCollateral)
            }
            LiquidationState::MaxLeverageExceeded => Err(VaultError::MaxLeverageExceeded),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VaultError {
    // authorization
    #[error("Vault: caller is not the owner")]
    NotOwner,

    #[error("Vault: caller is not a registered plugin")]
    NotPlugin,

    #[error("Vault: token {0:?} is not whitelisted")]
    NotWhitelisted(TokenId),

    #[error("Vault: paused")]
    Paused,

    #[error("Vault: reentrant call")]
    Reentrancy,

    // invariants
    #[error("Vault: size must not be below collateral")]
    SizeLessThanCollateral,

    #[error("Vault: pool underflow")]
    PoolUnderflow,

    #[error("Vault: reserve exceeds pool")]
    ReserveExceedsPool,

    #[error("Vault: pool exceeds held balance")]
    PoolExceedsBalance,

    #[error("Vault: insufficient reserve")]
    InsufficientReserve,

    // position lifecycle
    #[error("Vault: position does not exist")]
    PositionNotExist,

    #[error("Vault: empty position")]
    EmptyPosition,

    #[error("Vault: invalid position size")]
    InvalidPositionSize,

    #[error("Vault: collateral delta exceeds collateral")]
    CollateralExceeded,

    // liquidation
    #[error("Vault: losses exceed collateral")]
    LossesExceedCollateral,

    #[error("Vault: fees exceed collateral")]
    FeesExceedCollateral,

    #[error("Vault: liquidation fees exceed collateral")]
    LiquidationFeesExceedCollateral,

    #[error("Vault: max leverage exceeded")]
    MaxLeverageExceeded,

    #[error("Vault: position cannot be liquidated")]
    NotLiquidatable,

    // usdg
    #[error("Vault: invalid usdg amount")]
    InvalidUsdgAmount,

    // nested failures
    #[error(transparent)]
    Price(#[from] PriceFeedError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Math(#[from] MathError),
}
