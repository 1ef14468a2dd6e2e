// 1.0: all the primitives live here. nothing in the vault works without these types.
// IDs, sides, timestamps, signed dollar amounts. each id is a newtype so the
// compiler catches type mixups between accounts, tokens and plugin callers.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dollar-denominated amount in the quote token's native fixed point.
pub type Usd = U256;

/// Oracle price scaled by [`PRICE_PRECISION`].
pub type Price = U256;

/// Prices and price-derived quantities are 18-decimal fixed point.
pub const PRICE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Basis-point-like factors (fees, funding factor) are 1e6 fixed point.
pub const PRECISION: u128 = 1_000_000;

/// Funding accrues once per 8-hour interval.
pub const FUNDING_INTERVAL: u64 = 28_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

// 1.1: opaque identity of a registered plugin. the vault only ever compares
// these against its plugin set; it never knows the caller's concrete shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(pub u64);

/// Per-account order/request index. Counters start at 1.
pub type OrderIndex = u64;

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

// 1.2: signed dollar amount: realised PnL is the only signed quantity in the
// engine. stored as sign + magnitude so the unsigned math stays U256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignedUsd {
    pub negative: bool,
    pub magnitude: U256,
}

impl SignedUsd {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn gain(magnitude: U256) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    pub fn loss(magnitude: U256) -> Self {
        // -0 is normalised to +0
        Self {
            negative: !magnitude.is_zero(),
            magnitude,
        }
    }

    /// Add an unsigned profit to the running total.
    pub fn plus(self, amount: U256) -> Self {
        if self.negative {
            if self.magnitude > amount {
                Self::loss(self.magnitude - amount)
            } else {
                Self::gain(amount - self.magnitude)
            }
        } else {
            Self::gain(self.magnitude + amount)
        }
    }

    /// Subtract an unsigned loss from the running total.
    pub fn minus(self, amount: U256) -> Self {
        if self.negative {
            Self::loss(self.magnitude + amount)
        } else if self.magnitude >= amount {
            Self::gain(self.magnitude - amount)
        } else {
            Self::loss(amount - self.magnitude)
        }
    }
}

impl fmt::Display for SignedUsd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

// 1.3: second-resolution timestamp driven by the engine clock. wall-clock
// `now` exists for the simulation binary; tests pin explicit times.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp() as u64)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0 + secs)
    }

    /// Seconds elapsed from `earlier` to `self`, zero if `earlier` is ahead.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_helpers() {
        assert!(Side::Long.is_long());
        assert!(!Side::Short.is_long());
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert_eq!(Side::Short.opposite(), Side::Long);
    }

    #[test]
    fn signed_usd_crossing_zero() {
        let pnl = SignedUsd::zero().plus(U256::from(100u64));
        assert!(!pnl.negative);
        assert_eq!(pnl.magnitude, U256::from(100u64));

        let pnl = pnl.minus(U256::from(150u64));
        assert!(pnl.negative);
        assert_eq!(pnl.magnitude, U256::from(50u64));

        let pnl = pnl.plus(U256::from(50u64));
        assert!(pnl.is_zero());
        assert!(!pnl.negative); // -0 never happens
    }

    #[test]
    fn signed_usd_accumulates_losses() {
        let pnl = SignedUsd::zero()
            .minus(U256::from(30u64))
            .minus(U256::from(20u64));
        assert!(pnl.negative);
        assert_eq!(pnl.magnitude, U256::from(50u64));
        assert_eq!(pnl.to_string(), "-50");
    }

    #[test]
    fn timestamp_since() {
        let t0 = Timestamp::from_secs(100);
        let t1 = Timestamp::from_secs(700);
        assert_eq!(t1.since(t0), 600);
        assert_eq!(t0.since(t1), 0); // saturates, never underflows
        assert_eq!(t0.plus_secs(50).as_secs(), 150);
    }
}
