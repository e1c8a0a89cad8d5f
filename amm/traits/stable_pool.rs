use ink::prelude::vec::Vec;
use ink::primitives::AccountId;

use crate::{Env, MathError, PSP22Error, Timestamp, TokenLedger};

/// Snapshot of the pool parameters.
#[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct SwapStorage {
    /// Ramp start, with `A_PRECISION`.
    pub initial_a: u128,
    /// Ramp target, with `A_PRECISION`.
    pub future_a: u128,
    pub initial_a_time: Timestamp,
    pub future_a_time: Timestamp,
    pub swap_fee: u64,
    pub admin_fee: u64,
    pub lp_token: AccountId,
}

pub trait StablePoolView {
    /// Returns list of tokens in the pool.
    fn tokens(&self) -> Vec<AccountId>;

    /// Returns address of the token at `index`.
    fn token(&self, index: usize) -> Result<AccountId, StablePoolError>;

    /// Returns position of `token` in the pool.
    fn token_index(&self, token: AccountId) -> Result<usize, StablePoolError>;

    /// Returns list of tokens reserves, in native token units.
    /// Admin fees not withdrawn yet are included.
    fn reserves(&self) -> Vec<u128>;

    fn token_balance(&self, index: usize) -> Result<u128, StablePoolError>;

    /// Part of the reserve at `index` earmarked for the fee address.
    fn admin_balance(&self, index: usize) -> Result<u128, StablePoolError>;

    /// `10^(18 - decimals)` for every token.
    fn token_precision_multipliers(&self) -> Vec<u128>;

    fn lp_token(&self) -> AccountId;

    fn swap_storage(&self) -> SwapStorage;

    /// Current amplification coefficient.
    fn amp_coef(&self, env: &Env) -> Result<u128, StablePoolError>;

    /// Current amplification coefficient, multiplied by `A_PRECISION`.
    fn amp_coef_precise(&self, env: &Env) -> Result<u128, StablePoolError>;

    /// D / LP supply with 18 decimals. 0 for an empty pool.
    fn virtual_price<L: TokenLedger>(&self, ledger: &L, env: &Env)
        -> Result<u128, StablePoolError>;

    /// Amount of `token_out_idx` received for `token_in_amount` of `token_in_idx`,
    /// swap fee deducted.
    fn calculate_swap(
        &self,
        env: &Env,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
    ) -> Result<u128, StablePoolError>;

    /// LP amount minted (`deposit`) or burned (`!deposit`) for `amounts`,
    /// without the imbalance fee. Meant for slippage estimates.
    fn calculate_token_amount<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        amounts: &[u128],
        deposit: bool,
    ) -> Result<u128, StablePoolError>;

    /// Amounts returned by `remove_liquidity` for `lp_amount`.
    fn calculate_remove_liquidity<L: TokenLedger>(
        &self,
        ledger: &L,
        lp_amount: u128,
    ) -> Result<Vec<u128>, StablePoolError>;

    /// Amount returned by `remove_liquidity_one_token`, fee deducted.
    fn calculate_remove_liquidity_one_token<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        lp_amount: u128,
        token_idx: usize,
    ) -> Result<u128, StablePoolError>;
}

pub trait StablePool {
    /// Swaps `token_in_amount` of `token_in_idx` for `token_out_idx`.
    /// Caller must allow enough spending allowance of token_in for the pool.
    /// Returns amount of token_out sent to the caller.
    fn swap<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
        min_token_out_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError>;

    /// Deposits `amounts` and mints LP tokens to the caller.
    /// First deposit must include every token.
    /// Returns minted LP amount.
    fn add_liquidity<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        amounts: Vec<u128>,
        min_mint_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError>;

    /// Burns `lp_amount` and returns tokens in proportion to reserves.
    /// Available when the pool is paused.
    fn remove_liquidity<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        lp_amount: u128,
        min_amounts: Vec<u128>,
        deadline: Timestamp,
    ) -> Result<Vec<u128>, StablePoolError>;

    /// Burns `lp_amount` and returns a single token.
    fn remove_liquidity_one_token<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        lp_amount: u128,
        token_idx: usize,
        min_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError>;

    /// Withdraws exactly `amounts`, burning at most `max_burn_amount` LP tokens.
    /// Returns burned LP amount.
    fn remove_liquidity_imbalance<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        amounts: Vec<u128>,
        max_burn_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError>;

    /// Sends accrued admin fees to the fee address. Only the fee address may call it.
    fn withdraw_admin_fees<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
    ) -> Result<Vec<u128>, StablePoolError>;

    fn set_owner(&mut self, env: &mut Env, new_owner: AccountId) -> Result<(), StablePoolError>;

    fn set_fee_address(
        &mut self,
        env: &mut Env,
        fee_address: AccountId,
    ) -> Result<(), StablePoolError>;

    fn set_swap_fee(&mut self, env: &mut Env, swap_fee: u64) -> Result<(), StablePoolError>;

    fn set_admin_fee(&mut self, env: &mut Env, admin_fee: u64) -> Result<(), StablePoolError>;

    /// Starts ramping A towards `future_a` (in A units), reached at `future_time`.
    fn ramp_a(
        &mut self,
        env: &mut Env,
        future_a: u128,
        future_time: Timestamp,
    ) -> Result<(), StablePoolError>;

    fn stop_ramp_a(&mut self, env: &mut Env) -> Result<(), StablePoolError>;

    fn pause(&mut self, env: &mut Env) -> Result<(), StablePoolError>;

    fn unpause(&mut self, env: &mut Env) -> Result<(), StablePoolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, scale::Encode, scale::Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum StablePoolError {
    MathError(MathError),
    PSP22Error(PSP22Error),
    /// Invariant solver did not converge.
    ConvergenceFailure,
    DeadlineExpired,
    Paused,
    Reentrancy,
    TokenIndexOutOfRange,
    TokenNotFound(AccountId),
    AmountsLengthMismatch,
    InsufficientLiquidity,
    SlippageExceeded,
    MinMintNotMet,
    MaxBurnExceeded,
    WithdrawExceedsAvailable,
    Unauthorized,
    IdenticalTokenId,
    IncorrectTokenCount,
    TooLargeTokenDecimal,
    InvalidAmpCoef,
    SwapFeeTooHigh,
    AdminFeeTooHigh,
    MustSupplyAllTokens,
    ZeroAmount,
    RampDelayNotElapsed,
    InsufficientRampTime,
    FutureAOutOfRange,
    FutureATooSmall,
    FutureATooLarge,
    AlreadyStopped,
    InvalidBasePool,
    CouldntMintMinRequested,
    ToleranceExceeded,
}

impl StablePoolError {
    /// True for errors caused by output or burn limits set by the caller.
    pub fn is_slippage(&self) -> bool {
        matches!(
            self,
            StablePoolError::SlippageExceeded
                | StablePoolError::MinMintNotMet
                | StablePoolError::MaxBurnExceeded
                | StablePoolError::WithdrawExceedsAvailable
                | StablePoolError::CouldntMintMinRequested
                | StablePoolError::ToleranceExceeded
        )
    }
}

impl From<PSP22Error> for StablePoolError {
    fn from(error: PSP22Error) -> Self {
        StablePoolError::PSP22Error(error)
    }
}

impl From<MathError> for StablePoolError {
    fn from(error: MathError) -> Self {
        match error {
            MathError::ConvergenceFailure => StablePoolError::ConvergenceFailure,
            error => StablePoolError::MathError(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convergence_failure_is_lifted() {
        assert_eq!(
            StablePoolError::from(MathError::ConvergenceFailure),
            StablePoolError::ConvergenceFailure
        );
        assert_eq!(
            StablePoolError::from(MathError::DivByZero(3)),
            StablePoolError::MathError(MathError::DivByZero(3))
        );
    }

    #[test]
    fn slippage_specializations() {
        assert!(StablePoolError::MinMintNotMet.is_slippage());
        assert!(StablePoolError::MaxBurnExceeded.is_slippage());
        assert!(!StablePoolError::Paused.is_slippage());
    }
}
