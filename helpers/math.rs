use crate::constants::stable_pool::{RATE_PRECISION, TOKEN_TARGET_DECIMALS};
use ink::prelude::vec::Vec;
use primitive_types::U256;

/// Arithmetic failures. The code identifies the failing call site.
#[derive(Debug, Copy, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum MathError {
    AddOverflow(u8),
    CastOverflow(u8),
    DivByZero(u8),
    MulOverflow(u8),
    SubUnderflow(u8),
    /// Newton-Raphson did not settle within `MAX_ITERATIONS`.
    ConvergenceFailure,
}

/// Widening multiplication, never overflows.
pub fn casted_mul(a: u128, b: u128) -> U256 {
    U256::from(a) * U256::from(b)
}

/// `10^(18 - decimals)`
pub fn precision_multiplier(token_decimals: u8) -> Result<u128, MathError> {
    let exp = TOKEN_TARGET_DECIMALS
        .checked_sub(token_decimals)
        .ok_or(MathError::SubUnderflow(91))?;
    10u128
        .checked_pow(exp as u32)
        .ok_or(MathError::MulOverflow(91))
}

/// Rescales a native token amount to 18 decimal pool units.
pub fn normalize(amount: u128, token_decimals: u8) -> Result<u128, MathError> {
    amount
        .checked_mul(precision_multiplier(token_decimals)?)
        .ok_or(MathError::MulOverflow(92))
}

/// Inverse of [`normalize`]. Truncates, so the remainder stays with the pool.
pub fn denormalize(pool_units: u128, token_decimals: u8) -> Result<u128, MathError> {
    pool_units
        .checked_div(precision_multiplier(token_decimals)?)
        .ok_or(MathError::DivByZero(92))
}

/// `amount * scaled_rate / RATE_PRECISION`, where `scaled_rate` is
/// a token's precision multiplier times its rate.
pub fn amount_to_comparable(amount: u128, scaled_rate: u128) -> Result<u128, MathError> {
    casted_mul(amount, scaled_rate)
        .checked_div(RATE_PRECISION.into())
        .ok_or(MathError::DivByZero(93))?
        .try_into()
        .map_err(|_| MathError::CastOverflow(93))
}

/// Inverse of [`amount_to_comparable`], rounding down.
pub fn amount_from_comparable(amount: u128, scaled_rate: u128) -> Result<u128, MathError> {
    casted_mul(amount, RATE_PRECISION)
        .checked_div(scaled_rate.into())
        .ok_or(MathError::DivByZero(94))?
        .try_into()
        .map_err(|_| MathError::CastOverflow(94))
}

pub fn amounts_to_comparable(
    amounts: &[u128],
    scaled_rates: &[u128],
) -> Result<Vec<u128>, MathError> {
    amounts
        .iter()
        .zip(scaled_rates.iter())
        .map(|(&amount, &rate)| amount_to_comparable(amount, rate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_six_decimals() {
        assert_eq!(normalize(1_500_000, 6), Ok(1_500_000_000_000_000_000));
        assert_eq!(normalize(7, 18), Ok(7));
    }

    #[test]
    fn denormalize_truncates() {
        assert_eq!(denormalize(1_999_999_999_999, 6), Ok(1));
        assert_eq!(denormalize(999_999_999_999, 6), Ok(0));
    }

    #[test]
    fn too_many_decimals() {
        assert_eq!(precision_multiplier(19), Err(MathError::SubUnderflow(91)));
    }

    #[test]
    fn normalize_overflow() {
        assert_eq!(normalize(u128::MAX, 6), Err(MathError::MulOverflow(92)));
    }

    #[test]
    fn comparable_round_trip_rounds_down() {
        // 6 decimals token with rate 1.5
        let scaled_rate = precision_multiplier(6).unwrap() * (RATE_PRECISION * 3 / 2);
        let comparable = amount_to_comparable(1_000_001, scaled_rate).unwrap();
        assert_eq!(comparable, 1_500_001_500_000_000_000);
        assert_eq!(amount_from_comparable(comparable, scaled_rate), Ok(1_000_001));
        assert_eq!(amount_from_comparable(comparable - 1, scaled_rate), Ok(1_000_000));
    }
}
