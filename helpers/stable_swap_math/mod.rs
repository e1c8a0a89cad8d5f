pub mod fees;

use crate::constants::stable_pool::{A_PRECISION, VIRTUAL_PRICE_PRECISION};
use crate::math::{
    amount_from_comparable, amount_to_comparable, amounts_to_comparable, casted_mul, MathError,
};
use ink::prelude::{vec, vec::Vec};
use primitive_types::U256;

use fees::Fees;

/// Max number of iterations for curve computation using Newton–Raphson method
pub const MAX_ITERATIONS: u8 = 255;

fn within_one(a: U256, b: U256) -> bool {
    if a > b {
        a - b <= U256::one()
    } else {
        b - a <= U256::one()
    }
}

/// A * n^n, with A given in `A_PRECISION` units.
fn compute_ann(amp_coef: u128, n: u32) -> Result<U256, MathError> {
    Ok(casted_mul(
        amp_coef,
        n.checked_pow(n).ok_or(MathError::MulOverflow(1))?.into(),
    ))
}

/// Computes stable swap invariant (D).
///
/// `amp_coef` is the amplification coefficient multiplied by `A_PRECISION`.
pub fn compute_d(amounts: &[u128], amp_coef: u128) -> Result<U256, MathError> {
    // SUM{x_i}
    let amount_sum = amounts.iter().try_fold(U256::from(0), |acc, &amount| {
        acc.checked_add(amount.into())
            .ok_or(MathError::AddOverflow(1))
    })?;
    if amount_sum == 0.into() {
        return Ok(0.into());
    }
    let n = amounts.len() as u32;
    let ann = compute_ann(amp_coef, n)?;
    // A * n^n * SUM{x_i}
    let ann_sum = ann
        .checked_mul(amount_sum)
        .ok_or(MathError::MulOverflow(2))?
        .checked_div(A_PRECISION.into())
        .ok_or(MathError::DivByZero(1))?;
    // A * n^n - 1
    let ann_sub_one = ann
        .checked_sub(A_PRECISION.into())
        .ok_or(MathError::SubUnderflow(1))?;
    // n + 1
    let n_add_one = n.checked_add(1).ok_or(MathError::AddOverflow(2))?;
    let mut d = amount_sum;
    for _ in 0..MAX_ITERATIONS {
        let d_next = compute_d_next(d, n, amounts, ann_sum, ann_sub_one, n_add_one)?;
        if within_one(d_next, d) {
            return Ok(d_next);
        }
        d = d_next;
    }
    Err(MathError::ConvergenceFailure)
}

fn compute_d_next(
    d_prev: U256,
    n: u32,
    amounts: &[u128],
    ann_sum: U256,
    ann_sub_one: U256,
    n_add_one: u32,
) -> Result<U256, MathError> {
    let mut d_prod = d_prev;
    // d_prod = ... * [d_prev / (x_(i) * n)] * ...
    // where i in (0,n)
    for &amount in amounts {
        d_prod = d_prod
            .checked_mul(d_prev)
            .ok_or(MathError::MulOverflow(3))?
            .checked_div(casted_mul(amount, n.into()))
            .ok_or(MathError::DivByZero(2))?;
    }
    let numerator = d_prev
        .checked_mul(
            d_prod
                .checked_mul(n.into())
                .ok_or(MathError::MulOverflow(4))?
                .checked_add(ann_sum)
                .ok_or(MathError::AddOverflow(3))?,
        )
        .ok_or(MathError::MulOverflow(5))?;
    let denominator = d_prev
        .checked_mul(ann_sub_one)
        .ok_or(MathError::MulOverflow(6))?
        .checked_div(A_PRECISION.into())
        .ok_or(MathError::DivByZero(3))?
        .checked_add(
            d_prod
                .checked_mul(n_add_one.into())
                .ok_or(MathError::MulOverflow(7))?,
        )
        .ok_or(MathError::AddOverflow(4))?;
    numerator
        .checked_div(denominator)
        .ok_or(MathError::DivByZero(4))
}

/// Returns new reserve of `y` tokens
/// given new reserve of `x` tokens and the invariant `d` to hold.
///
/// NOTICE: it does not check if `token_x_id` != `token_y_id` and if tokens' `id`s are out of bounds
pub fn compute_y(
    new_reserve_x: u128,
    reserves: &[u128],
    token_x_id: usize,
    token_y_id: usize,
    amp_coef: u128,
    d: U256,
) -> Result<u128, MathError> {
    let mut reserves = reserves.to_vec();
    reserves[token_x_id] = new_reserve_x;
    compute_y_d(&reserves, token_y_id, amp_coef, d)
}

/// Returns reserve of `token_y_id` for which the invariant equals `d`,
/// other reserves being fixed.
pub fn compute_y_d(
    reserves: &[u128],
    token_y_id: usize,
    amp_coef: u128,
    d: U256,
) -> Result<u128, MathError> {
    let n = reserves.len() as u32;
    let ann = compute_ann(amp_coef, n)?;

    let mut c = d;
    let mut reserves_sum = U256::zero();
    // reserves_sum = ... + x_(i') + ...
    // c = d * ... * d / (x_(i') * n) * ...
    // where  i' in (0,n) AND i' != token_y_id
    for (idx, &reserve) in reserves.iter().enumerate() {
        if idx == token_y_id {
            continue;
        }
        reserves_sum = reserves_sum
            .checked_add(reserve.into())
            .ok_or(MathError::AddOverflow(5))?;
        c = c
            .checked_mul(d)
            .ok_or(MathError::MulOverflow(8))?
            .checked_div(casted_mul(reserve, n.into()))
            .ok_or(MathError::DivByZero(5))?;
    }
    // c = c * d / (A * n^n * n)
    c = c
        .checked_mul(d)
        .ok_or(MathError::MulOverflow(9))?
        .checked_mul(A_PRECISION.into())
        .ok_or(MathError::MulOverflow(10))?
        .checked_div(ann.checked_mul(n.into()).ok_or(MathError::MulOverflow(11))?)
        .ok_or(MathError::DivByZero(6))?;
    // reserves_sum + d / (A * n^n)
    let b: U256 = d
        .checked_mul(A_PRECISION.into())
        .ok_or(MathError::MulOverflow(12))?
        .checked_div(ann)
        .ok_or(MathError::DivByZero(7))?
        .checked_add(reserves_sum)
        .ok_or(MathError::AddOverflow(6))?; // d will be subtracted later

    let mut y = d;
    for _ in 0..MAX_ITERATIONS {
        let y_next = compute_y_next(y, b, c, d)?;
        if within_one(y_next, y) {
            return y_next.try_into().map_err(|_| MathError::CastOverflow(1));
        }
        y = y_next;
    }
    Err(MathError::ConvergenceFailure)
}

fn compute_y_next(y_prev: U256, b: U256, c: U256, d: U256) -> Result<U256, MathError> {
    let numerator = y_prev
        .checked_pow(2.into())
        .ok_or(MathError::MulOverflow(13))?
        .checked_add(c)
        .ok_or(MathError::AddOverflow(7))?;
    let denominator = y_prev
        .checked_mul(2.into())
        .ok_or(MathError::MulOverflow(14))?
        .checked_add(b)
        .ok_or(MathError::AddOverflow(8))?
        .checked_sub(d)
        .ok_or(MathError::SubUnderflow(2))?;
    numerator
        .checked_div(denominator)
        .ok_or(MathError::DivByZero(8))
}

fn d_to_u128(d: U256) -> Result<u128, MathError> {
    d.try_into().map_err(|_| MathError::CastOverflow(2))
}

/// Compute SwapResult after an exchange given `amount_in` of the `token_in_id`.
/// panics if token ids are out of bounds.
/// NOTICE: it does not check if `token_in_id` != `token_out_id`.
/// Returns (amount_out, fee_amount)
pub fn swap_to(
    token_in_idx: usize,
    token_in_amount: u128,
    token_out_idx: usize,
    current_reserves: &[u128],
    fees: &Fees,
    amp_coef: u128,
) -> Result<(u128, u128), MathError> {
    let d = compute_d(current_reserves, amp_coef)?;
    let y = compute_y(
        token_in_amount
            .checked_add(current_reserves[token_in_idx])
            .ok_or(MathError::AddOverflow(9))?,
        current_reserves,
        token_in_idx,
        token_out_idx,
        amp_coef,
        d,
    )?;
    // sub 1 in case there are any rounding errors
    // https://github.com/curvefi/curve-contract/blob/b0bbf77f8f93c9c5f4e415bce9cd71f0cdee960e/contracts/pool-templates/base/SwapTemplateBase.vy#L466
    let dy = current_reserves[token_out_idx]
        .checked_sub(y)
        .ok_or(MathError::SubUnderflow(3))?
        .checked_sub(1)
        .ok_or(MathError::SubUnderflow(4))?;
    // fees are applied to "token_out" amount
    let fee = fees.trade_fee_from_gross(dy)?;
    let amount_swapped = dy.checked_sub(fee).ok_or(MathError::SubUnderflow(5))?;

    Ok((amount_swapped, fee))
}

/// Same as [`swap_to`] with native amounts rescaled by `scaled_rates`.
/// Returns (amount_out, fee_amount) in `token_out` units.
pub fn rated_swap_to(
    scaled_rates: &[u128],
    token_in_idx: usize,
    token_in_amount: u128,
    token_out_idx: usize,
    current_reserves: &[u128],
    fees: &Fees,
    amp_coef: u128,
) -> Result<(u128, u128), MathError> {
    let r_token_in_amount = amount_to_comparable(token_in_amount, scaled_rates[token_in_idx])?;
    let r_reserves = amounts_to_comparable(current_reserves, scaled_rates)?;
    let (r_amount_out, r_fee) = swap_to(
        token_in_idx,
        r_token_in_amount,
        token_out_idx,
        &r_reserves,
        fees,
        amp_coef,
    )?;
    let rate_out = scaled_rates[token_out_idx];
    Ok((
        amount_from_comparable(r_amount_out, rate_out)?,
        amount_from_comparable(r_fee, rate_out)?,
    ))
}

/// Applies the imbalance fee to `new_reserves` in place.
/// Returns fee charged per token, in native units.
fn charge_imbalance_fees(
    fees: &Fees,
    old_reserves: &[u128],
    new_reserves: &mut [u128],
    d_0: U256,
    d_1: U256,
) -> Result<Vec<u128>, MathError> {
    let n_coins = old_reserves.len() as u32;
    let mut token_fees = Vec::with_capacity(old_reserves.len());
    for (new_reserve, &old_reserve) in new_reserves.iter_mut().zip(old_reserves.iter()) {
        let ideal_reserve: u128 = d_1
            .checked_mul(old_reserve.into())
            .ok_or(MathError::MulOverflow(15))?
            .checked_div(d_0)
            .ok_or(MathError::DivByZero(9))?
            .try_into()
            .map_err(|_| MathError::CastOverflow(3))?;
        let difference = ideal_reserve.abs_diff(*new_reserve);
        let fee = fees.normalized_trade_fee(n_coins, difference)?;
        *new_reserve = new_reserve
            .checked_sub(fee)
            .ok_or(MathError::SubUnderflow(6))?;
        token_fees.push(fee);
    }
    Ok(token_fees)
}

/// Compute the amount of LP tokens to mint after a deposit.
/// Without `fees` no imbalance fee is charged.
/// Returns (lp_amount_to_mint, fee_charged_per_token)
pub fn rated_compute_lp_amount_for_deposit(
    scaled_rates: &[u128],
    deposit_amounts: &[u128],
    old_reserves: &[u128],
    pool_token_supply: u128,
    fees: Option<&Fees>,
    amp_coef: u128,
) -> Result<(u128, Vec<u128>), MathError> {
    let n_coins = old_reserves.len();
    let mut new_reserves = old_reserves
        .iter()
        .zip(deposit_amounts.iter())
        .map(|(reserve, &amount)| {
            reserve
                .checked_add(amount)
                .ok_or(MathError::AddOverflow(10))
        })
        .collect::<Result<Vec<u128>, MathError>>()?;
    if pool_token_supply == 0 {
        if new_reserves.contains(&0) {
            return Err(MathError::DivByZero(10));
        }
        let d = compute_d(&amounts_to_comparable(&new_reserves, scaled_rates)?, amp_coef)?;
        return Ok((d_to_u128(d)?, vec![0; n_coins]));
    }
    // Initial invariant
    let d_0 = compute_d(&amounts_to_comparable(old_reserves, scaled_rates)?, amp_coef)?;
    // Invariant after change
    let d_1 = compute_d(&amounts_to_comparable(&new_reserves, scaled_rates)?, amp_coef)?;
    if d_1 <= d_0 {
        return Ok((0, vec![0; n_coins]));
    }
    let (d_2, token_fees) = match fees {
        Some(fees) => {
            let token_fees =
                charge_imbalance_fees(fees, old_reserves, &mut new_reserves, d_0, d_1)?;
            let d_2 = compute_d(&amounts_to_comparable(&new_reserves, scaled_rates)?, amp_coef)?;
            (d_2, token_fees)
        }
        None => (d_1, vec![0; n_coins]),
    };
    // d1 >= d2 >= d0,
    // (d2-d0) => mint_shares (charged fee)
    let mint_shares: u128 = U256::from(pool_token_supply)
        .checked_mul(d_2.checked_sub(d_0).ok_or(MathError::SubUnderflow(7))?)
        .ok_or(MathError::MulOverflow(16))?
        .checked_div(d_0)
        .ok_or(MathError::DivByZero(11))?
        .try_into()
        .map_err(|_| MathError::CastOverflow(4))?;
    Ok((mint_shares, token_fees))
}

/// Given token amounts to withdraw, compute LP tokens to burn.
/// The result is rounded down, callers charging fees are expected to round it up.
/// Returns (lp_amount_to_burn, fee_charged_per_token)
pub fn rated_compute_lp_amount_for_withdraw(
    scaled_rates: &[u128],
    withdraw_amounts: &[u128],
    old_reserves: &[u128],
    pool_token_supply: u128,
    fees: Option<&Fees>,
    amp_coef: u128,
) -> Result<(u128, Vec<u128>), MathError> {
    let n_coins = old_reserves.len();
    // Initial invariant, D0
    let d_0 = compute_d(&amounts_to_comparable(old_reserves, scaled_rates)?, amp_coef)?;

    // real invariant after withdraw, D1
    let mut new_reserves = old_reserves
        .iter()
        .zip(withdraw_amounts.iter())
        .map(|(reserve, &amount)| {
            reserve
                .checked_sub(amount)
                .ok_or(MathError::SubUnderflow(8))
        })
        .collect::<Result<Vec<u128>, MathError>>()?;
    let d_1 = compute_d(&amounts_to_comparable(&new_reserves, scaled_rates)?, amp_coef)?;

    let (d_2, token_fees) = match fees {
        Some(fees) => {
            let token_fees =
                charge_imbalance_fees(fees, old_reserves, &mut new_reserves, d_0, d_1)?;
            let d_2 = compute_d(&amounts_to_comparable(&new_reserves, scaled_rates)?, amp_coef)?;
            (d_2, token_fees)
        }
        None => (d_1, vec![0; n_coins]),
    };
    // d0 >= d1 >= d2,
    // (d0-d2) => burn_shares (plus fee)
    let burn_shares: u128 = U256::from(pool_token_supply)
        .checked_mul(d_0.checked_sub(d_2).ok_or(MathError::SubUnderflow(9))?)
        .ok_or(MathError::MulOverflow(17))?
        .checked_div(d_0)
        .ok_or(MathError::DivByZero(12))?
        .try_into()
        .map_err(|_| MathError::CastOverflow(5))?;
    Ok((burn_shares, token_fees))
}

/// Compute amounts withdrawn (or required to deposit) for `lp_amount` of LP tokens,
/// proportionally to the reserves. Rounds down.
pub fn compute_amounts_given_lp(
    lp_amount: u128,
    reserves: &[u128],
    pool_token_supply: u128,
) -> Result<Vec<u128>, MathError> {
    reserves
        .iter()
        .map(|&reserve| {
            casted_mul(reserve, lp_amount)
                .checked_div(pool_token_supply.into())
                .ok_or(MathError::DivByZero(13))?
                .try_into()
                .map_err(|_| MathError::CastOverflow(6))
        })
        .collect()
}

/// Amount of `token_idx` received for burning `lp_amount`.
/// The imbalance fee is charged on the whole withdrawal.
/// Returns (amount_out, fee_amount) in `token_idx` units.
pub fn rated_compute_withdraw_one_token(
    scaled_rates: &[u128],
    lp_amount: u128,
    token_idx: usize,
    reserves: &[u128],
    pool_token_supply: u128,
    fees: &Fees,
    amp_coef: u128,
) -> Result<(u128, u128), MathError> {
    let n_coins = reserves.len() as u32;
    let r_reserves = amounts_to_comparable(reserves, scaled_rates)?;
    let d_0 = compute_d(&r_reserves, amp_coef)?;
    // d1 = d0 - lp_amount * d0 / supply
    let d_1 = d_0
        .checked_sub(
            d_0.checked_mul(lp_amount.into())
                .ok_or(MathError::MulOverflow(18))?
                .checked_div(pool_token_supply.into())
                .ok_or(MathError::DivByZero(14))?,
        )
        .ok_or(MathError::SubUnderflow(10))?;
    let new_y = compute_y_d(&r_reserves, token_idx, amp_coef, d_1)?;

    let mut reduced_reserves = Vec::with_capacity(r_reserves.len());
    for (idx, &reserve) in r_reserves.iter().enumerate() {
        let ideal: u128 = U256::from(reserve)
            .checked_mul(d_1)
            .ok_or(MathError::MulOverflow(19))?
            .checked_div(d_0)
            .ok_or(MathError::DivByZero(15))?
            .try_into()
            .map_err(|_| MathError::CastOverflow(7))?;
        let expected_dx = if idx == token_idx {
            ideal.checked_sub(new_y).ok_or(MathError::SubUnderflow(11))?
        } else {
            reserve.checked_sub(ideal).ok_or(MathError::SubUnderflow(12))?
        };
        reduced_reserves.push(
            reserve
                .checked_sub(fees.normalized_trade_fee(n_coins, expected_dx)?)
                .ok_or(MathError::SubUnderflow(13))?,
        );
    }
    let dy = reduced_reserves[token_idx]
        .checked_sub(compute_y_d(&reduced_reserves, token_idx, amp_coef, d_1)?)
        .ok_or(MathError::SubUnderflow(14))?
        .checked_sub(1)
        .ok_or(MathError::SubUnderflow(15))?;
    let rate = scaled_rates[token_idx];
    let amount_out = amount_from_comparable(dy, rate)?;
    let gross = amount_from_comparable(
        r_reserves[token_idx]
            .checked_sub(new_y)
            .ok_or(MathError::SubUnderflow(16))?,
        rate,
    )?;
    let fee = gross
        .checked_sub(amount_out)
        .ok_or(MathError::SubUnderflow(17))?;
    Ok((amount_out, fee))
}

/// D / supply with `VIRTUAL_PRICE_PRECISION`, 0 for an empty pool.
pub fn rated_compute_virtual_price(
    scaled_rates: &[u128],
    reserves: &[u128],
    pool_token_supply: u128,
    amp_coef: u128,
) -> Result<u128, MathError> {
    if pool_token_supply == 0 {
        return Ok(0);
    }
    compute_d(&amounts_to_comparable(reserves, scaled_rates)?, amp_coef)?
        .checked_mul(VIRTUAL_PRICE_PRECISION.into())
        .ok_or(MathError::MulOverflow(20))?
        .checked_div(pool_token_supply.into())
        .ok_or(MathError::DivByZero(16))?
        .try_into()
        .map_err(|_| MathError::CastOverflow(8))
}
