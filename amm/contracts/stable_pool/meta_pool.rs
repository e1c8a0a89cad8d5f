use amm_helpers::{constants::stable_pool::RATE_PRECISION, ensure};
use ink::prelude::{vec, vec::Vec};
use ink::primitives::AccountId;
use traits::{
    Env, RateProvider, StablePool, StablePoolError, StablePoolEvent, StablePoolView, Timestamp,
    TokenLedger,
};

use crate::{
    stable_pool::{InitParams, StablePoolContract},
    token_rate::TokenRate,
    transaction::{transactional, Transactional},
};

/// A pool whose last token is the LP token of a base pool.
///
/// The base LP token is priced at the base pool's virtual price, read again before
/// every operation, so the base pool has to be passed to every call that prices anything.
/// Besides its own tokens, the pool trades the base pool's tokens through
/// [`MetaPool::swap_underlying`], indexed over `[meta tokens without the base LP..., base tokens...]`.
#[derive(Debug, Clone)]
pub struct MetaPool {
    pool: StablePoolContract,
    base_pool: AccountId,
    base_tokens: Vec<AccountId>,
}

impl Transactional for MetaPool {
    fn in_progress(&mut self) -> &mut bool {
        self.pool.in_progress()
    }
}

impl MetaPool {
    /// Creates the pool and lets the base pool spend its base tokens.
    ///
    /// Fails with `InvalidBasePool` unless the last of `params.tokens` is the LP token
    /// of `base` and `base` holds liquidity.
    pub fn new<L: TokenLedger>(
        ledger: &mut L,
        env: &mut Env,
        params: InitParams,
        base: &StablePoolContract,
    ) -> Result<Self, StablePoolError> {
        ensure!(
            params.tokens.last() == Some(&base.lp_token()),
            StablePoolError::InvalidBasePool
        );
        let base_virtual_price = base.get_rate(ledger, env)?;
        ensure!(base_virtual_price > 0, StablePoolError::InvalidBasePool);

        let mut token_rates = vec![TokenRate::new_constant(RATE_PRECISION); params.tokens.len()];
        if let Some(rate) = token_rates.last_mut() {
            *rate = TokenRate::new_external(base.rate_provider_id(), base_virtual_price);
        }
        let pool = StablePoolContract::new_pool(ledger, params, token_rates)?;

        let meta = pool.address();
        let base_pool = base.address();
        let base_tokens = base.tokens();
        for &token in base_tokens.iter() {
            env.call_as(meta, |env| ledger.approve(env, token, base_pool, u128::MAX))?;
        }
        Ok(Self {
            pool,
            base_pool,
            base_tokens,
        })
    }

    /// The pool's own state. Pricing views on it use the last cached base virtual price.
    pub fn pool(&self) -> &StablePoolContract {
        &self.pool
    }

    pub fn address(&self) -> AccountId {
        self.pool.address()
    }

    pub fn base_pool(&self) -> AccountId {
        self.base_pool
    }

    pub fn base_tokens(&self) -> Vec<AccountId> {
        self.base_tokens.clone()
    }

    /// Index of the base LP token among the pool's tokens.
    pub fn base_lp_index(&self) -> usize {
        self.pool.tokens().len() - 1
    }

    /// Meta tokens without the base LP token, followed by the base pool's tokens.
    pub fn underlying_tokens(&self) -> Vec<AccountId> {
        let mut tokens = self.pool.tokens();
        tokens.pop();
        tokens.extend(self.base_tokens.iter().copied());
        tokens
    }

    /// Copy of the pool with the base LP priced at the current base virtual price.
    /// Views price against it and leave the cached rate alone.
    fn priced_pool<L: TokenLedger>(
        &self,
        base: &StablePoolContract,
        ledger: &L,
        env: &Env,
    ) -> Result<StablePoolContract, StablePoolError> {
        let mut pool = self.pool.clone();
        refresh_base_rate(&mut pool, base, ledger, env)?;
        Ok(pool)
    }

    pub fn swap<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        base: &StablePoolContract,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
        min_token_out_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        transactional(self, ledger, env, |meta, ledger, env| {
            refresh_base_rate(&mut meta.pool, base, ledger, env)?;
            meta.pool.do_swap(
                ledger,
                env,
                token_in_idx,
                token_out_idx,
                token_in_amount,
                min_token_out_amount,
                deadline,
            )
        })
    }

    pub fn add_liquidity<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        base: &StablePoolContract,
        amounts: Vec<u128>,
        min_mint_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        transactional(self, ledger, env, |meta, ledger, env| {
            refresh_base_rate(&mut meta.pool, base, ledger, env)?;
            meta.pool
                .do_add_liquidity(ledger, env, amounts, min_mint_amount, deadline)
        })
    }

    /// Proportional withdrawal does not price anything, so the base pool is not consulted.
    pub fn remove_liquidity<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        lp_amount: u128,
        min_amounts: Vec<u128>,
        deadline: Timestamp,
    ) -> Result<Vec<u128>, StablePoolError> {
        self.pool
            .remove_liquidity(ledger, env, lp_amount, min_amounts, deadline)
    }

    pub fn remove_liquidity_one_token<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        base: &StablePoolContract,
        lp_amount: u128,
        token_idx: usize,
        min_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        transactional(self, ledger, env, |meta, ledger, env| {
            refresh_base_rate(&mut meta.pool, base, ledger, env)?;
            meta.pool.do_remove_liquidity_one_token(
                ledger, env, lp_amount, token_idx, min_amount, deadline,
            )
        })
    }

    pub fn remove_liquidity_imbalance<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        base: &StablePoolContract,
        amounts: Vec<u128>,
        max_burn_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        transactional(self, ledger, env, |meta, ledger, env| {
            refresh_base_rate(&mut meta.pool, base, ledger, env)?;
            meta.pool
                .do_remove_liquidity_imbalance(ledger, env, amounts, max_burn_amount, deadline)
        })
    }

    /// Swaps between any two underlying tokens.
    ///
    /// A base token given in is first deposited into the base pool, and a base token asked
    /// for is withdrawn from it with `remove_liquidity_one_token`, so each leg pays the fee
    /// of the pool it runs in. Swaps between two base tokens go through the base pool alone.
    pub fn swap_underlying<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        base: &mut StablePoolContract,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
        min_token_out_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        ensure!(
            base.address() == self.base_pool,
            StablePoolError::InvalidBasePool
        );
        let base_snapshot = base.clone();
        let result = transactional(self, ledger, env, |meta, ledger, env| {
            meta.do_swap_underlying(
                ledger,
                env,
                base,
                token_in_idx,
                token_out_idx,
                token_in_amount,
                min_token_out_amount,
                deadline,
            )
        });
        if result.is_err() {
            *base = base_snapshot;
        }
        result
    }

    fn do_swap_underlying<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
        base: &mut StablePoolContract,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
        min_token_out_amount: u128,
        deadline: Timestamp,
    ) -> Result<u128, StablePoolError> {
        self.pool.ensure_deadline(env, deadline)?;
        self.pool.ensure_not_paused()?;
        let underlying_tokens = self.underlying_tokens();
        ensure!(
            token_in_idx < underlying_tokens.len() && token_out_idx < underlying_tokens.len(),
            StablePoolError::TokenIndexOutOfRange
        );
        ensure!(
            token_in_idx != token_out_idx,
            StablePoolError::IdenticalTokenId
        );
        ensure!(token_in_amount > 0, StablePoolError::ZeroAmount);
        refresh_base_rate(&mut self.pool, base, ledger, env)?;

        let base_lp_idx = self.base_lp_index();
        let meta = self.address();
        let caller = env.caller();
        self.pool.pull_tokens(
            ledger,
            env,
            underlying_tokens[token_in_idx],
            caller,
            token_in_amount,
        )?;

        let token_out_amount = if token_in_idx >= base_lp_idx && token_out_idx >= base_lp_idx {
            env.call_as(meta, |env| {
                base.swap(
                    ledger,
                    env,
                    token_in_idx - base_lp_idx,
                    token_out_idx - base_lp_idx,
                    token_in_amount,
                    0,
                    deadline,
                )
            })?
        } else {
            let (meta_in_idx, meta_in_amount) = if token_in_idx < base_lp_idx {
                (token_in_idx, token_in_amount)
            } else {
                let mut base_amounts = vec![0; self.base_tokens.len()];
                base_amounts[token_in_idx - base_lp_idx] = token_in_amount;
                let base_lp_amount = env.call_as(meta, |env| {
                    base.add_liquidity(ledger, env, base_amounts, 0, deadline)
                })?;
                // the deposit moved the base virtual price
                refresh_base_rate(&mut self.pool, base, ledger, env)?;
                (base_lp_idx, base_lp_amount)
            };
            let meta_out_idx = token_out_idx.min(base_lp_idx);
            let (meta_out_amount, _) =
                self.pool
                    .swap_reserves(env, meta_in_idx, meta_out_idx, meta_in_amount)?;
            if token_out_idx < base_lp_idx {
                meta_out_amount
            } else {
                env.call_as(meta, |env| {
                    base.remove_liquidity_one_token(
                        ledger,
                        env,
                        meta_out_amount,
                        token_out_idx - base_lp_idx,
                        0,
                        deadline,
                    )
                })?
            }
        };
        ensure!(
            token_out_amount >= min_token_out_amount,
            StablePoolError::SlippageExceeded
        );
        self.pool.push_tokens(
            ledger,
            env,
            underlying_tokens[token_out_idx],
            caller,
            token_out_amount,
        )?;

        env.emit_event(
            meta,
            StablePoolEvent::TokenSwapUnderlying {
                buyer: caller,
                tokens_sold: token_in_amount,
                tokens_bought: token_out_amount,
                sold_id: token_in_idx as u8,
                bought_id: token_out_idx as u8,
            },
        );
        Ok(token_out_amount)
    }

    /// Amount [`MetaPool::swap_underlying`] would pay out now. A base token given in is
    /// deposited with the base pool's imbalance fee, and the meta leg is priced at the base
    /// virtual price that deposit leaves behind.
    pub fn calculate_swap_underlying<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        base: &StablePoolContract,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
    ) -> Result<u128, StablePoolError> {
        let underlying_count = self.underlying_tokens().len();
        ensure!(
            token_in_idx < underlying_count && token_out_idx < underlying_count,
            StablePoolError::TokenIndexOutOfRange
        );
        ensure!(
            token_in_idx != token_out_idx,
            StablePoolError::IdenticalTokenId
        );
        let base_lp_idx = self.base_lp_index();
        if token_in_idx >= base_lp_idx && token_out_idx >= base_lp_idx {
            return base.calculate_swap(
                env,
                token_in_idx - base_lp_idx,
                token_out_idx - base_lp_idx,
                token_in_amount,
            );
        }
        let mut pool = self.priced_pool(base, ledger, env)?;
        let (meta_in_idx, meta_in_amount) = if token_in_idx < base_lp_idx {
            (token_in_idx, token_in_amount)
        } else {
            let mut base_amounts = vec![0; self.base_tokens.len()];
            base_amounts[token_in_idx - base_lp_idx] = token_in_amount;
            let (base_lp_amount, base_virtual_price) =
                base.deposit_outcome(ledger, env, &base_amounts)?;
            pool.set_cached_rate(base_lp_idx, base_virtual_price)?;
            (base_lp_idx, base_lp_amount)
        };
        let meta_out_amount = pool.calculate_swap(
            env,
            meta_in_idx,
            token_out_idx.min(base_lp_idx),
            meta_in_amount,
        )?;
        if token_out_idx < base_lp_idx || meta_out_amount == 0 {
            Ok(meta_out_amount)
        } else {
            base.calculate_remove_liquidity_one_token(
                ledger,
                env,
                meta_out_amount,
                token_out_idx - base_lp_idx,
            )
        }
    }

    pub fn calculate_swap<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        base: &StablePoolContract,
        token_in_idx: usize,
        token_out_idx: usize,
        token_in_amount: u128,
    ) -> Result<u128, StablePoolError> {
        self.priced_pool(base, ledger, env)?
            .calculate_swap(env, token_in_idx, token_out_idx, token_in_amount)
    }

    pub fn calculate_token_amount<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        base: &StablePoolContract,
        amounts: &[u128],
        deposit: bool,
    ) -> Result<u128, StablePoolError> {
        self.priced_pool(base, ledger, env)?
            .calculate_token_amount(ledger, env, amounts, deposit)
    }

    pub fn calculate_remove_liquidity<L: TokenLedger>(
        &self,
        ledger: &L,
        lp_amount: u128,
    ) -> Result<Vec<u128>, StablePoolError> {
        self.pool.calculate_remove_liquidity(ledger, lp_amount)
    }

    pub fn calculate_remove_liquidity_one_token<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        base: &StablePoolContract,
        lp_amount: u128,
        token_idx: usize,
    ) -> Result<u128, StablePoolError> {
        self.priced_pool(base, ledger, env)?
            .calculate_remove_liquidity_one_token(ledger, env, lp_amount, token_idx)
    }

    pub fn virtual_price<L: TokenLedger>(
        &self,
        ledger: &L,
        env: &Env,
        base: &StablePoolContract,
    ) -> Result<u128, StablePoolError> {
        self.priced_pool(base, ledger, env)?
            .virtual_price(ledger, env)
    }

    pub fn withdraw_admin_fees<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        env: &mut Env,
    ) -> Result<Vec<u128>, StablePoolError> {
        self.pool.withdraw_admin_fees(ledger, env)
    }

    pub fn set_owner(&mut self, env: &mut Env, new_owner: AccountId) -> Result<(), StablePoolError> {
        self.pool.set_owner(env, new_owner)
    }

    pub fn set_fee_address(
        &mut self,
        env: &mut Env,
        fee_address: AccountId,
    ) -> Result<(), StablePoolError> {
        self.pool.set_fee_address(env, fee_address)
    }

    pub fn set_swap_fee(&mut self, env: &mut Env, swap_fee: u64) -> Result<(), StablePoolError> {
        self.pool.set_swap_fee(env, swap_fee)
    }

    pub fn set_admin_fee(&mut self, env: &mut Env, admin_fee: u64) -> Result<(), StablePoolError> {
        self.pool.set_admin_fee(env, admin_fee)
    }

    pub fn ramp_a(
        &mut self,
        env: &mut Env,
        future_a: u128,
        future_time: Timestamp,
    ) -> Result<(), StablePoolError> {
        self.pool.ramp_a(env, future_a, future_time)
    }

    pub fn stop_ramp_a(&mut self, env: &mut Env) -> Result<(), StablePoolError> {
        self.pool.stop_ramp_a(env)
    }

    pub fn pause(&mut self, env: &mut Env) -> Result<(), StablePoolError> {
        self.pool.pause(env)
    }

    pub fn unpause(&mut self, env: &mut Env) -> Result<(), StablePoolError> {
        self.pool.unpause(env)
    }
}

/// Re-reads the base LP rate of `pool` from `base`. An empty base pool cannot price it.
fn refresh_base_rate<L: TokenLedger>(
    pool: &mut StablePoolContract,
    base: &StablePoolContract,
    ledger: &L,
    env: &Env,
) -> Result<(), StablePoolError> {
    pool.update_rates(base, ledger, env)?;
    let base_virtual_price = pool
        .token_rates()
        .last()
        .map(TokenRate::get_rate)
        .unwrap_or_default();
    log::trace!("base LP rate refreshed to {}", base_virtual_price);
    ensure!(
        base_virtual_price > 0,
        StablePoolError::InsufficientLiquidity
    );
    Ok(())
}
