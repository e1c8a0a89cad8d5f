use amm_helpers::{
    constants::stable_pool::{BASE_WITHDRAW_FEE_MULTIPLIER, FEE_DENOM},
    ensure,
    math::casted_mul,
};
use ink::prelude::{vec, vec::Vec};
use ink::primitives::AccountId;
use traits::{
    Env, MathError, StablePool, StablePoolError, StablePoolView, Timestamp, TokenLedger,
};

use crate::{
    meta_pool::MetaPool,
    stable_pool::StablePoolContract,
    transaction::{transactional, Transactional},
};

/// Liquidity operations of a meta pool over `[meta tokens without the base LP..., base tokens...]`.
///
/// The facade holds no tokens between calls. Amounts in base tokens are first converted
/// to or from the base LP token in the base pool, which then takes part in the meta pool
/// operation as its last token.
#[derive(Debug, Clone)]
pub struct MetaPoolDeposit {
    address: AccountId,
    meta_pool: AccountId,
    base_pool: AccountId,
    meta_tokens: Vec<AccountId>,
    base_tokens: Vec<AccountId>,
    meta_lp_token: AccountId,
    in_progress: bool,
}

impl Transactional for MetaPoolDeposit {
    fn in_progress(&mut self) -> &mut bool {
        &mut self.in_progress
    }
}

impl MetaPoolDeposit {
    /// Binds the facade at `address` to `meta` and its base pool, and lets both pools
    /// spend the facade's tokens.
    pub fn new<L: TokenLedger>(
        ledger: &mut L,
        env: &mut Env,
        address: AccountId,
        meta: &MetaPool,
        base: &StablePoolContract,
    ) -> Result<Self, StablePoolError> {
        ensure!(
            meta.base_pool() == base.address(),
            StablePoolError::InvalidBasePool
        );
        let meta_tokens = meta.pool().tokens();
        let base_tokens = base.tokens();
        let (meta_pool, base_pool) = (meta.address(), base.address());
        env.call_as(address, |env| -> Result<(), StablePoolError> {
            for &token in meta_tokens.iter() {
                ledger.approve(env, token, meta_pool, u128::MAX)?;
            }
            for &token in base_tokens.iter() {
                ledger.approve(env, token, base_pool, u128::MAX)?;
            }
            Ok(())
        })?;
        Ok(Self {
            address,
            meta_pool,
            base_pool,
            meta_tokens,
            base_tokens,
            meta_lp_token: meta.pool().lp_token(),
            in_progress: false,
        })
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    /// Meta tokens without the base LP token, followed by the base pool's tokens.
    pub fn tokens(&self) -> Vec<AccountId> {
        let mut tokens = self.meta_tokens[..self.base_lp_index()].to_vec();
        tokens.extend(self.base_tokens.iter().copied());
        tokens
    }

    fn base_lp_index(&self) -> usize {
        self.meta_tokens.len() - 1
    }

    fn base_lp_token(&self) -> AccountId {
        self.meta_tokens[self.base_lp_index()]
    }

    fn ensure_amounts_len(&self, amounts: &[u128]) -> Result<(), StablePoolError> {
        ensure!(
            amounts.len() == self.base_lp_index() + self.base_tokens.len(),
            StablePoolError::AmountsLengthMismatch
        );
        Ok(())
    }

    fn check_pools(
        &self,
        meta: &MetaPool,
        base: &StablePoolContract,
    ) -> Result<(), StablePoolError> {
        ensure!(
            meta.address() == self.meta_pool && base.address() == self.base_pool,
            StablePoolError::InvalidBasePool
        );
        Ok(())
    }

    fn pull<L: TokenLedger>(
        &self,
        ledger: &mut L,
        env: &mut Env,
        token: AccountId,
        from: AccountId,
        amount: u128,
    ) -> Result<(), StablePoolError> {
        if amount == 0 {
            return Ok(());
        }
        let facade = self.address;
        env.call_as(facade, |env| {
            ledger.transfer_from(env, token, from, facade, amount)
        })?;
        Ok(())
    }

    fn push<L: TokenLedger>(
        &self,
        ledger: &mut L,
        env: &mut Env,
        token: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), StablePoolError> {
        if amount == 0 {
            return Ok(());
        }
        env.call_as(self.address, |env| ledger.transfer(env, token, to, amount))?;
        Ok(())
    }

    /// Runs `f` as one call spanning the facade and both pools.
    /// On error the pools are restored together with the ledger.
    fn atomic<L, T, F>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        meta: &mut MetaPool,
        base: &mut StablePoolContract,
        f: F,
    ) -> Result<T, StablePoolError>
    where
        L: TokenLedger,
        F: FnOnce(
            &mut Self,
            &mut L,
            &mut Env,
            &mut MetaPool,
            &mut StablePoolContract,
        ) -> Result<T, StablePoolError>,
    {
        self.check_pools(meta, base)?;
        let meta_snapshot = meta.clone();
        let base_snapshot = base.clone();
        let result = transactional(self, ledger, env, |facade, ledger, env| {
            f(facade, ledger, env, meta, base)
        });
        if result.is_err() {
            *meta = meta_snapshot;
            *base = base_snapshot;
        }
        result
    }

    /// Deposits `amounts` of the flattened tokens and sends the minted meta LP to the caller.
    pub fn add_liquidity<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        meta: &mut MetaPool,
        base: &mut StablePoolContract,
        amounts: Vec<u128>,
        min_to_mint: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        self.atomic(ledger, env, meta, base, |facade, ledger, env, meta, base| {
            facade.ensure_amounts_len(&amounts)?;
            let blp = facade.base_lp_index();
            let caller = env.caller();
            for (&token, &amount) in facade.tokens().iter().zip(amounts.iter()) {
                facade.pull(ledger, env, token, caller, amount)?;
            }

            let base_amounts = amounts[blp..].to_vec();
            let base_lp_amount = if base_amounts.iter().any(|&amount| amount > 0) {
                env.call_as(facade.address, |env| {
                    base.add_liquidity(ledger, env, base_amounts, 0, deadline)
                })?
            } else {
                0
            };

            let mut meta_amounts = amounts[..blp].to_vec();
            meta_amounts.push(base_lp_amount);
            let minted = env.call_as(facade.address, |env| {
                meta.add_liquidity(ledger, env, base, meta_amounts, 0, deadline)
            })?;
            ensure!(
                minted >= min_to_mint,
                StablePoolError::CouldntMintMinRequested
            );
            facade.push(ledger, env, facade.meta_lp_token, caller, minted)?;
            Ok(minted)
        })
    }

    /// Burns `lp_amount` meta LP and returns flattened token amounts in proportion to both pools' reserves.
    pub fn remove_liquidity<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        meta: &mut MetaPool,
        base: &mut StablePoolContract,
        lp_amount: u128,
        min_amounts: Vec<u128>,
        deadline: Timestamp,
    ) -> Result<Vec<u128>, StablePoolError> {
        self.atomic(ledger, env, meta, base, |facade, ledger, env, meta, base| {
            facade.ensure_amounts_len(&min_amounts)?;
            let blp = facade.base_lp_index();
            let caller = env.caller();
            facade.pull(ledger, env, facade.meta_lp_token, caller, lp_amount)?;

            let meta_amounts = env.call_as(facade.address, |env| {
                meta.remove_liquidity(ledger, env, lp_amount, vec![0; blp + 1], deadline)
            })?;
            let base_lp_amount = meta_amounts[blp];
            let base_amounts = if base_lp_amount > 0 {
                env.call_as(facade.address, |env| {
                    base.remove_liquidity(
                        ledger,
                        env,
                        base_lp_amount,
                        vec![0; facade.base_tokens.len()],
                        deadline,
                    )
                })?
            } else {
                vec![0; facade.base_tokens.len()]
            };

            let amounts: Vec<u128> = meta_amounts[..blp]
                .iter()
                .chain(base_amounts.iter())
                .copied()
                .collect();
            ensure!(
                amounts
                    .iter()
                    .zip(min_amounts.iter())
                    .all(|(amount, min_amount)| amount >= min_amount),
                StablePoolError::SlippageExceeded
            );
            for (&token, &amount) in facade.tokens().iter().zip(amounts.iter()) {
                facade.push(ledger, env, token, caller, amount)?;
            }
            Ok(amounts)
        })
    }

    /// Burns `lp_amount` meta LP and returns a single flattened token.
    /// A base token is withdrawn from the base pool in a second step.
    pub fn remove_liquidity_one_token<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        meta: &mut MetaPool,
        base: &mut StablePoolContract,
        lp_amount: u128,
        token_idx: usize,
        min_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        self.atomic(ledger, env, meta, base, |facade, ledger, env, meta, base| {
            let tokens = facade.tokens();
            ensure!(
                token_idx < tokens.len(),
                StablePoolError::TokenIndexOutOfRange
            );
            let blp = facade.base_lp_index();
            let caller = env.caller();
            facade.pull(ledger, env, facade.meta_lp_token, caller, lp_amount)?;

            let amount = if token_idx < blp {
                env.call_as(facade.address, |env| {
                    meta.remove_liquidity_one_token(
                        ledger, env, base, lp_amount, token_idx, 0, deadline,
                    )
                })?
            } else {
                let base_lp_amount = env.call_as(facade.address, |env| {
                    meta.remove_liquidity_one_token(ledger, env, base, lp_amount, blp, 0, deadline)
                })?;
                env.call_as(facade.address, |env| {
                    base.remove_liquidity_one_token(
                        ledger,
                        env,
                        base_lp_amount,
                        token_idx - blp,
                        0,
                        deadline,
                    )
                })?
            };
            ensure!(amount >= min_amount, StablePoolError::SlippageExceeded);
            facade.push(ledger, env, tokens[token_idx], caller, amount)?;
            Ok(amount)
        })
    }

    /// Withdraws exactly `amounts` of the flattened tokens, burning at most `max_burn_amount` meta LP.
    ///
    /// The base LP needed for the base tokens is estimated without fees and padded by
    /// `BASE_WITHDRAW_FEE_MULTIPLIER`. Base LP left over after the base withdrawal is
    /// deposited back into the meta pool, so the caller only pays for what was used.
    /// Returns the meta LP amount burned.
    pub fn remove_liquidity_imbalance<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        meta: &mut MetaPool,
        base: &mut StablePoolContract,
        amounts: Vec<u128>,
        max_burn_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        self.atomic(ledger, env, meta, base, |facade, ledger, env, meta, base| {
            facade.ensure_amounts_len(&amounts)?;
            let blp = facade.base_lp_index();
            let caller = env.caller();
            let base_amounts = amounts[blp..].to_vec();
            let withdraw_base = base_amounts.iter().any(|&amount| amount > 0);

            let base_lp_amount = if withdraw_base {
                let estimate = base.calculate_token_amount(ledger, env, &base_amounts, false)?;
                let padded: u128 = casted_mul(estimate, BASE_WITHDRAW_FEE_MULTIPLIER as u128)
                    .checked_div(FEE_DENOM.into())
                    .ok_or(MathError::DivByZero(121))?
                    .try_into()
                    .map_err(|_| MathError::CastOverflow(121))?;
                padded
            } else {
                0
            };
            let mut meta_amounts = amounts[..blp].to_vec();
            meta_amounts.push(base_lp_amount);

            facade.pull(ledger, env, facade.meta_lp_token, caller, max_burn_amount)?;
            env.call_as(facade.address, |env| {
                meta.remove_liquidity_imbalance(
                    ledger,
                    env,
                    base,
                    meta_amounts,
                    max_burn_amount,
                    deadline,
                )
            })?;

            if withdraw_base {
                env.call_as(facade.address, |env| {
                    base.remove_liquidity_imbalance(
                        ledger,
                        env,
                        base_amounts,
                        base_lp_amount,
                        deadline,
                    )
                })
                .map_err(|err| match err {
                    StablePoolError::MaxBurnExceeded => StablePoolError::ToleranceExceeded,
                    err => err,
                })?;

                let leftover = ledger.balance_of(facade.base_lp_token(), facade.address);
                if leftover > 0 {
                    let mut deposit = vec![0; blp + 1];
                    deposit[blp] = leftover;
                    let redeposit = env.call_as(facade.address, |env| {
                        meta.add_liquidity(ledger, env, base, deposit, 0, deadline)
                    });
                    match redeposit {
                        Ok(_) => {}
                        // too little to mint anything
                        Err(StablePoolError::ZeroAmount) => {
                            facade.push(ledger, env, facade.base_lp_token(), caller, leftover)?
                        }
                        Err(err) => return Err(err),
                    }
                }
            }

            for (&token, &amount) in facade.tokens().iter().zip(amounts.iter()) {
                facade.push(ledger, env, token, caller, amount)?;
            }
            let unused = ledger.balance_of(facade.meta_lp_token, facade.address);
            facade.push(ledger, env, facade.meta_lp_token, caller, unused)?;
            Ok(max_burn_amount
                .checked_sub(unused)
                .ok_or(MathError::SubUnderflow(121))?)
        })
    }

    /// Meta LP minted (`deposit`) or burned (`!deposit`) for flattened `amounts`, without fees.
    pub fn calculate_token_amount<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        meta: &MetaPool,
        base: &StablePoolContract,
        amounts: &[u128],
        deposit: bool,
    ) -> Result<u128, StablePoolError> {
        self.check_pools(meta, base)?;
        self.ensure_amounts_len(amounts)?;
        let blp = self.base_lp_index();
        let base_amounts = &amounts[blp..];
        let base_lp_amount = if base_amounts.iter().any(|&amount| amount > 0) {
            base.calculate_token_amount(ledger, env, base_amounts, deposit)?
        } else {
            0
        };
        let mut meta_amounts = amounts[..blp].to_vec();
        meta_amounts.push(base_lp_amount);
        meta.calculate_token_amount(ledger, env, base, &meta_amounts, deposit)
    }

    pub fn calculate_remove_liquidity<L: TokenLedger>(
        &self,
        ledger: &L,
        meta: &MetaPool,
        base: &StablePoolContract,
        lp_amount: u128,
    ) -> Result<Vec<u128>, StablePoolError> {
        self.check_pools(meta, base)?;
        let blp = self.base_lp_index();
        let meta_amounts = meta.calculate_remove_liquidity(ledger, lp_amount)?;
        let base_amounts = if meta_amounts[blp] > 0 {
            base.calculate_remove_liquidity(ledger, meta_amounts[blp])?
        } else {
            vec![0; self.base_tokens.len()]
        };
        Ok(meta_amounts[..blp]
            .iter()
            .chain(base_amounts.iter())
            .copied()
            .collect())
    }

    pub fn calculate_remove_liquidity_one_token<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        meta: &MetaPool,
        base: &StablePoolContract,
        lp_amount: u128,
        token_idx: usize,
    ) -> Result<u128, StablePoolError> {
        self.check_pools(meta, base)?;
        ensure!(
            token_idx < self.tokens().len(),
            StablePoolError::TokenIndexOutOfRange
        );
        let blp = self.base_lp_index();
        if token_idx < blp {
            return meta.calculate_remove_liquidity_one_token(ledger, env, base, lp_amount, token_idx);
        }
        let base_lp_amount =
            meta.calculate_remove_liquidity_one_token(ledger, env, base, lp_amount, blp)?;
        base.calculate_remove_liquidity_one_token(ledger, env, base_lp_amount, token_idx - blp)
    }
}
