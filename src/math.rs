// 2.0: checked 256-bit fixed-point helpers. every mul-div in the engine goes
// through a 512-bit intermediate; overflow and underflow are errors, never
// silent wraps. division truncates toward zero.

use primitive_types::{U256, U512};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,
}

/// `(a * b) / c` with the product widened to 512 bits.
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256, MathError> {
    if c.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let wide = a.full_mul(b) / U512::from(c);
    narrow(wide)
}

pub fn checked_add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn narrow(wide: U512) -> Result<U256, MathError> {
    U256::try_from(wide).map_err(|_| MathError::Overflow)
}
