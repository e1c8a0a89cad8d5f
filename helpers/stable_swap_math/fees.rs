use crate::constants::stable_pool::{FEE_DENOM, MAX_ADMIN_FEE, MAX_SWAP_FEE};
use crate::math::{casted_mul, MathError};

/// Swap fee and the admin share of it, both with `FEE_DENOM` precision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct Fees {
    pub trade_fee: u64,
    pub admin_fee: u64,
}

impl Fees {
    pub fn new(trade_fee: u64, admin_fee: u64) -> Option<Self> {
        if trade_fee > MAX_SWAP_FEE || admin_fee > MAX_ADMIN_FEE {
            None
        } else {
            Some(Self {
                trade_fee,
                admin_fee,
            })
        }
    }

    pub fn zero() -> Self {
        Self {
            trade_fee: 0,
            admin_fee: 0,
        }
    }

    pub fn trade_fee_from_gross(&self, amount: u128) -> Result<u128, MathError> {
        u128_ratio(amount, self.trade_fee, FEE_DENOM)
    }

    /// Part of an already charged fee that goes to the fee address.
    pub fn admin_trade_fee(&self, fee: u128) -> Result<u128, MathError> {
        u128_ratio(fee, self.admin_fee, FEE_DENOM)
    }

    /// Fee charged per token on deposits and withdrawals that move the pool away
    /// from its current composition: `trade_fee * n / (4 * (n - 1))`.
    /// Same as in https://github.com/curvefi/curve-contract/blob/e5fb8c0e0bcd2fe2e03634135806c0f36b245511/tests/simulation.py#L124
    pub fn normalized_trade_fee(&self, num_coins: u32, amount: u128) -> Result<u128, MathError> {
        u128_ratio(amount, self.fee_per_token(num_coins)?, FEE_DENOM)
    }

    fn fee_per_token(&self, num_coins: u32) -> Result<u64, MathError> {
        self.trade_fee
            .checked_mul(num_coins.into())
            .ok_or(MathError::MulOverflow(61))?
            .checked_div(
                (num_coins as u64)
                    .checked_sub(1)
                    .ok_or(MathError::SubUnderflow(61))?
                    .checked_mul(4)
                    .ok_or(MathError::MulOverflow(62))?,
            )
            .ok_or(MathError::DivByZero(61))
    }
}

fn u128_ratio(amount: u128, num: u64, denom: u64) -> Result<u128, MathError> {
    casted_mul(amount, num.into())
        .checked_div(denom.into())
        .ok_or(MathError::DivByZero(62))?
        .try_into()
        .map_err(|_| MathError::CastOverflow(61))
}
