#![cfg_attr(not(feature = "std"), no_std)]
mod amp_coef;
mod meta_pool;
mod meta_pool_deposit;
mod token_rate;
mod transaction;

pub use amp_coef::AmplificationCoefficient;
pub use meta_pool::MetaPool;
pub use meta_pool_deposit::MetaPoolDeposit;
pub use stable_pool::{InitParams, StablePoolContract};
pub use token_rate::TokenRate;

pub mod stable_pool {
    use crate::{
        amp_coef::AmplificationCoefficient,
        token_rate::TokenRate,
        transaction::{transactional, Transactional},
    };
    use amm_helpers::{
        constants::stable_pool::{
            A_PRECISION, MAX_A, MAX_ADMIN_FEE, MAX_SWAP_FEE, MAX_TOKENS, MIN_TOKENS,
            RATE_PRECISION, TOKEN_TARGET_DECIMALS,
        },
        ensure,
        math::{amounts_to_comparable, precision_multiplier},
        stable_swap_math::{self as math, fees::Fees},
    };
    use ink::prelude::{string::String, vec, vec::Vec};
    use ink::primitives::AccountId;
    use traits::{
        Env, MathError, RateProvider, StablePool, StablePoolError, StablePoolEvent,
        StablePoolView, SwapStorage, Timestamp, TokenLedger, TokenMetadata,
    };

    /// Parameters a pool is created with.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct InitParams {
        /// Account of the pool itself. Pooled tokens are held by it.
        pub address: AccountId,
        pub tokens: Vec<AccountId>,
        pub tokens_decimals: Vec<u8>,
        /// Address of the LP token, created together with the pool.
        pub lp_token: AccountId,
        pub lp_token_name: String,
        pub lp_token_symbol: String,
        /// Initial amplification coefficient, multiplied by `A_PRECISION`.
        pub amp_coef_precise: u128,
        pub swap_fee: u64,
        pub admin_fee: u64,
        pub owner: AccountId,
        pub fee_address: AccountId,
    }

    #[derive(Debug, Clone)]
    pub struct StablePoolData {
        /// List of tokens.
        tokens: Vec<AccountId>,
        /// Tokens precision factors used for normalization.
        precisions: Vec<u128>,
        /// Reserves of tokens owned by liquidity providers.
        reserves: Vec<u128>,
        /// Fees owed to the fee address. The pool holds them on top of `reserves`.
        admin_reserves: Vec<u128>,
        /// Means of getting token rates, either constant or read from a rate provider.
        token_rates: Vec<TokenRate>,
        /// Amplification coefficient.
        amp_coef: AmplificationCoefficient,
        /// Fees
        fees: Fees,
        /// Who receives admin fees.
        fee_address: AccountId,
        lp_token: AccountId,
        paused: bool,
    }

    #[derive(Debug, Clone)]
    pub struct StablePoolContract {
        address: AccountId,
        owner: AccountId,
        pool: StablePoolData,
        in_progress: bool,
    }

    fn validate_amp_coef(amp_coef_precise: u128) -> Result<(), StablePoolError> {
        ensure!(
            amp_coef_precise >= A_PRECISION && amp_coef_precise < MAX_A * A_PRECISION,
            StablePoolError::InvalidAmpCoef
        );
        Ok(())
    }

    impl Transactional for StablePoolContract {
        fn in_progress(&mut self) -> &mut bool {
            &mut self.in_progress
        }
    }

    impl StablePoolContract {
        /// Creates a pool of tokens valued 1:1 and registers its LP token in `ledger`.
        pub fn new<L: TokenLedger>(
            ledger: &mut L,
            params: InitParams,
        ) -> Result<Self, StablePoolError> {
            let token_rates = vec![TokenRate::new_constant(RATE_PRECISION); params.tokens.len()];
            Self::new_pool(ledger, params, token_rates)
        }

        pub(crate) fn new_pool<L: TokenLedger>(
            ledger: &mut L,
            params: InitParams,
            token_rates: Vec<TokenRate>,
        ) -> Result<Self, StablePoolError> {
            let token_count = params.tokens.len();
            ensure!(
                (MIN_TOKENS..=MAX_TOKENS).contains(&token_count)
                    && token_count == params.tokens_decimals.len()
                    && token_count == token_rates.len(),
                StablePoolError::IncorrectTokenCount
            );
            let mut unique_tokens = params.tokens.clone();
            unique_tokens.sort();
            unique_tokens.dedup();
            ensure!(
                unique_tokens.len() == token_count,
                StablePoolError::IdenticalTokenId
            );
            ensure!(
                params
                    .tokens_decimals
                    .iter()
                    .all(|&d| d <= TOKEN_TARGET_DECIMALS),
                StablePoolError::TooLargeTokenDecimal
            );
            validate_amp_coef(params.amp_coef_precise)?;
            ensure!(
                params.swap_fee <= MAX_SWAP_FEE,
                StablePoolError::SwapFeeTooHigh
            );
            ensure!(
                params.admin_fee <= MAX_ADMIN_FEE,
                StablePoolError::AdminFeeTooHigh
            );

            let precisions = params
                .tokens_decimals
                .iter()
                .map(|&decimals| precision_multiplier(decimals))
                .collect::<Result<Vec<u128>, MathError>>()?;

            ledger.create_token(
                params.lp_token,
                TokenMetadata {
                    name: Some(params.lp_token_name),
                    symbol: Some(params.lp_token_symbol),
                    decimals: TOKEN_TARGET_DECIMALS,
                },
                params.address,
            )?;

            Ok(Self {
                address: params.address,
                owner: params.owner,
                pool: StablePoolData {
                    tokens: params.tokens,
                    precisions,
                    reserves: vec![0; token_count],
                    admin_reserves: vec![0; token_count],
                    token_rates,
                    amp_coef: AmplificationCoefficient::new(params.amp_coef_precise),
                    fees: Fees {
                        trade_fee: params.swap_fee,
                        admin_fee: params.admin_fee,
                    },
                    fee_address: params.fee_address,
                    lp_token: params.lp_token,
                    paused: false,
                },
                in_progress: false,
            })
        }

        pub fn address(&self) -> AccountId {
            self.address
        }

        pub fn owner(&self) -> AccountId {
            self.owner
        }

        pub fn fee_address(&self) -> AccountId {
            self.pool.fee_address
        }

        pub fn is_paused(&self) -> bool {
            self.pool.paused
        }

        pub(crate) fn token_rates(&self) -> &[TokenRate] {
            &self.pool.token_rates
        }

        /// Re-reads every external rate from `provider`.
        pub(crate) fn update_rates<P: RateProvider, L: TokenLedger>(
            &mut self,
            provider: &P,
            ledger: &L,
            env: &Env,
        ) -> Result<(), StablePoolError> {
            for rate in self.pool.token_rates.iter_mut() {
                rate.update_rate(provider, ledger, env)?;
            }
            Ok(())
        }

        /// Overrides the cached rate of an external-rate token. Constant rates are left alone.
        pub(crate) fn set_cached_rate(
            &mut self,
            token_id: usize,
            rate: u128,
        ) -> Result<(), StablePoolError> {
            let token_rate = self
                .pool
                .token_rates
                .get_mut(token_id)
                .ok_or(StablePoolError::TokenIndexOutOfRange)?;
            if let Some(rate_provider) = token_rate.rate_provider() {
                *token_rate = TokenRate::new_external(rate_provider, rate);
            }
            Ok(())
        }

        /// Scaled rates are rates multiplied by precision. They are assumed to fit in u128.
        /// For a token with no decimals, rates up to ~340 times the unit fit.
        fn get_scaled_rates(&self) -> Result<Vec<u128>, MathError> {
            self.pool
                .token_rates
                .iter()
                .zip(self.pool.precisions.iter())
                .map(|(rate, &precision)| {
                    rate.get_rate()
                        .checked_mul(precision)
                        .ok_or(MathError::MulOverflow(114))
                })
                .collect()
        }

        fn lp_total_supply<L: TokenLedger>(&self, ledger: &L) -> u128 {
            ledger.total_supply(self.pool.lp_token)
        }

        fn invariant(&self, env: &Env) -> Result<u128, StablePoolError> {
            let rates = self.get_scaled_rates()?;
            let d = math::compute_d(
                &amounts_to_comparable(&self.pool.reserves, &rates)?,
                self.amp_coef_precise(env)?,
            )?;
            let d: u128 = d.try_into().map_err(|_| MathError::CastOverflow(103))?;
            Ok(d)
        }

        fn ensure_owner(&self, env: &Env) -> Result<(), StablePoolError> {
            ensure!(env.caller() == self.owner, StablePoolError::Unauthorized);
            Ok(())
        }

        pub(crate) fn ensure_not_paused(&self) -> Result<(), StablePoolError> {
            ensure!(!self.pool.paused, StablePoolError::Paused);
            Ok(())
        }

        pub(crate) fn ensure_deadline(
            &self,
            env: &Env,
            deadline: Timestamp,
        ) -> Result<(), StablePoolError> {
            ensure!(
                env.block_timestamp() <= deadline,
                StablePoolError::DeadlineExpired
            );
            Ok(())
        }

        fn ensure_amounts_len(&self, amounts: &[u128]) -> Result<(), StablePoolError> {
            ensure!(
                amounts.len() == self.pool.tokens.len(),
                StablePoolError::AmountsLengthMismatch
            );
            Ok(())
        }

        fn check_index(&self, token_id: usize) -> Result<(), StablePoolError> {
            ensure!(
                token_id < self.pool.tokens.len(),
                StablePoolError::TokenIndexOutOfRange
            );
            Ok(())
        }

        /// Checks if token ids are valid and distinct.
        pub(crate) fn check_indices(
            &self,
            token_in_id: usize,
            token_out_id: usize,
        ) -> Result<(), StablePoolError> {
            self.check_index(token_in_id)?;
            self.check_index(token_out_id)?;
            ensure!(
                token_in_id != token_out_id,
                StablePoolError::IdenticalTokenId
            );
            Ok(())
        }

        /// Moves `amount` of `token` from `from` to the pool, spending the pool's allowance.
        pub(crate) fn pull_tokens<L: TokenLedger>(
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
            let pool = self.address;
            env.call_as(pool, |env| {
                ledger.transfer_from(env, token, from, pool, amount)
            })?;
            Ok(())
        }

        pub(crate) fn push_tokens<L: TokenLedger>(
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

        fn mint_lp<L: TokenLedger>(
            &self,
            ledger: &mut L,
            env: &mut Env,
            to: AccountId,
            amount: u128,
        ) -> Result<(), StablePoolError> {
            let lp_token = self.pool.lp_token;
            env.call_as(self.address, |env| ledger.mint(env, lp_token, to, amount))?;
            Ok(())
        }

        fn burn_lp<L: TokenLedger>(
            &self,
            ledger: &mut L,
            env: &mut Env,
            from: AccountId,
            amount: u128,
        ) -> Result<(), StablePoolError> {
            let lp_token = self.pool.lp_token;
            env.call_as(self.address, |env| {
                ledger.burn_from(env, lp_token, from, amount)
            })?;
            Ok(())
        }

        fn decrease_reserve(
            &mut self,
            token_id: usize,
            amount: u128,
        ) -> Result<(), StablePoolError> {
            self.pool.reserves[token_id] = self.pool.reserves[token_id]
                .checked_sub(amount)
                .ok_or(MathError::SubUnderflow(101))?;
            Ok(())
        }

        fn increase_reserve(
            &mut self,
            token_id: usize,
            amount: u128,
        ) -> Result<(), StablePoolError> {
            self.pool.reserves[token_id] = self.pool.reserves[token_id]
                .checked_add(amount)
                .ok_or(MathError::AddOverflow(101))?;
            Ok(())
        }

        /// Moves the admin part of `fee` charged in `token_id` out of the reserve.
        /// The pool keeps holding it, earmarked for the fee address.
        fn accrue_admin_fee(&mut self, token_id: usize, fee: u128) -> Result<(), StablePoolError> {
            let admin_fee = self.pool.fees.admin_trade_fee(fee)?;
            self.decrease_reserve(token_id, admin_fee)?;
            self.pool.admin_reserves[token_id] = self.pool.admin_reserves[token_id]
                .checked_add(admin_fee)
                .ok_or(MathError::AddOverflow(102))?;
            Ok(())
        }

        fn emit(&self, env: &mut Env, event: StablePoolEvent) {
            env.emit_event(self.address, event);
        }

        /// This method is for internal use only
        /// - calculates token_out amount
        /// - calculates swap fee
        /// - accrues admin fee
        /// - updates reserves
        /// It assumes that rates have been updated and `token_in_amount` is already held by the pool.
        /// Returns (token_out_amount, swap_fee)
        pub(crate) fn swap_reserves(
            &mut self,
            env: &Env,
            token_in_id: usize,
            token_out_id: usize,
            token_in_amount: u128,
        ) -> Result<(u128, u128), StablePoolError> {
            ensure!(token_in_amount > 0, StablePoolError::ZeroAmount);
            ensure!(
                self.pool.reserves.iter().all(|&reserve| reserve > 0),
                StablePoolError::InsufficientLiquidity
            );
            let rates = self.get_scaled_rates()?;
            let (token_out_amount, fee) = math::rated_swap_to(
                &rates,
                token_in_id,
                token_in_amount,
                token_out_id,
                &self.pool.reserves,
                &self.pool.fees,
                self.amp_coef_precise(env)?,
            )?;
            self.increase_reserve(token_in_id, token_in_amount)?;
            self.decrease_reserve(token_out_id, token_out_amount)?;
            self.accrue_admin_fee(token_out_id, fee)?;
            Ok((token_out_amount, fee))
        }

        pub(crate) fn do_swap<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            token_in_id: usize,
            token_out_id: usize,
            token_in_amount: u128,
            min_token_out_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            self.ensure_deadline(env, deadline)?;
            self.ensure_not_paused()?;
            self.check_indices(token_in_id, token_out_id)?;
            let caller = env.caller();

            // transfer token_in
            self.pull_tokens(
                ledger,
                env,
                self.pool.tokens[token_in_id],
                caller,
                token_in_amount,
            )?;

            let (token_out_amount, _) =
                self.swap_reserves(env, token_in_id, token_out_id, token_in_amount)?;
            ensure!(
                token_out_amount >= min_token_out_amount,
                StablePoolError::SlippageExceeded
            );

            // transfer token_out
            self.push_tokens(
                ledger,
                env,
                self.pool.tokens[token_out_id],
                caller,
                token_out_amount,
            )?;

            self.emit(
                env,
                StablePoolEvent::TokenSwap {
                    buyer: caller,
                    tokens_sold: token_in_amount,
                    tokens_bought: token_out_amount,
                    sold_id: token_in_id as u8,
                    bought_id: token_out_id as u8,
                },
            );
            Ok(token_out_amount)
        }

        /// Returns (lp_amount, fee_per_token) for depositing `amounts`, imbalance fee included.
        fn compute_deposit<L: TokenLedger>(
            &self,
            ledger: &L,
            env: &Env,
            amounts: &[u128],
        ) -> Result<(u128, Vec<u128>), StablePoolError> {
            self.ensure_amounts_len(amounts)?;
            let total_supply = self.lp_total_supply(ledger);
            if total_supply == 0 {
                ensure!(
                    amounts.iter().all(|&amount| amount > 0),
                    StablePoolError::MustSupplyAllTokens
                );
            }
            let rates = self.get_scaled_rates()?;
            let (lp_amount, fees) = math::rated_compute_lp_amount_for_deposit(
                &rates,
                amounts,
                &self.pool.reserves,
                total_supply,
                Some(&self.pool.fees),
                self.amp_coef_precise(env)?,
            )?;
            ensure!(lp_amount > 0, StablePoolError::ZeroAmount);
            Ok((lp_amount, fees))
        }

        fn apply_deposit(&mut self, amounts: &[u128], fees: &[u128]) -> Result<(), StablePoolError> {
            for (id, (&amount, &fee)) in amounts.iter().zip(fees.iter()).enumerate() {
                self.increase_reserve(id, amount)?;
                self.accrue_admin_fee(id, fee)?;
            }
            Ok(())
        }

        /// LP amount minted for depositing `amounts` and the virtual price right after,
        /// exactly as `add_liquidity` would leave the pool.
        pub(crate) fn deposit_outcome<L: TokenLedger>(
            &self,
            ledger: &L,
            env: &Env,
            amounts: &[u128],
        ) -> Result<(u128, u128), StablePoolError> {
            let (lp_amount, fees) = self.compute_deposit(ledger, env, amounts)?;
            let mut pool = self.clone();
            pool.apply_deposit(amounts, &fees)?;
            let total_supply = self
                .lp_total_supply(ledger)
                .checked_add(lp_amount)
                .ok_or(MathError::AddOverflow(104))?;
            let virtual_price = math::rated_compute_virtual_price(
                &pool.get_scaled_rates()?,
                &pool.pool.reserves,
                total_supply,
                pool.amp_coef_precise(env)?,
            )?;
            Ok((lp_amount, virtual_price))
        }

        pub(crate) fn do_add_liquidity<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            amounts: Vec<u128>,
            min_mint_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            self.ensure_deadline(env, deadline)?;
            self.ensure_not_paused()?;
            let (lp_amount, fees) = self.compute_deposit(ledger, env, &amounts)?;
            ensure!(
                lp_amount >= min_mint_amount,
                StablePoolError::MinMintNotMet
            );

            let caller = env.caller();
            for (id, &amount) in amounts.iter().enumerate() {
                self.pull_tokens(ledger, env, self.pool.tokens[id], caller, amount)?;
            }
            self.apply_deposit(&amounts, &fees)?;
            self.mint_lp(ledger, env, caller, lp_amount)?;

            let invariant = self.invariant(env)?;
            self.emit(
                env,
                StablePoolEvent::AddLiquidity {
                    provider: caller,
                    token_amounts: amounts,
                    fees,
                    invariant,
                    lp_token_supply: self.lp_total_supply(ledger),
                },
            );
            Ok(lp_amount)
        }

        // Note that this method does not use rates nor the amplification coefficient,
        // so it is always possible to call it, even when the pool is paused.
        pub(crate) fn do_remove_liquidity<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            lp_amount: u128,
            min_amounts: Vec<u128>,
            deadline: Timestamp,
        ) -> Result<Vec<u128>, StablePoolError> {
            self.ensure_deadline(env, deadline)?;
            self.ensure_amounts_len(&min_amounts)?;
            let total_supply = self.lp_total_supply(ledger);
            ensure!(
                lp_amount <= total_supply,
                StablePoolError::InsufficientLiquidity
            );
            let amounts =
                math::compute_amounts_given_lp(lp_amount, &self.pool.reserves, total_supply)?;

            // Check if enough tokens are withdrawn
            ensure!(
                amounts
                    .iter()
                    .zip(min_amounts.iter())
                    .all(|(amount, min_amount)| amount >= min_amount),
                StablePoolError::SlippageExceeded
            );

            let caller = env.caller();
            self.burn_lp(ledger, env, caller, lp_amount)?;
            for (id, &amount) in amounts.iter().enumerate() {
                self.decrease_reserve(id, amount)?;
                self.push_tokens(ledger, env, self.pool.tokens[id], caller, amount)?;
            }

            self.emit(
                env,
                StablePoolEvent::RemoveLiquidity {
                    provider: caller,
                    token_amounts: amounts.clone(),
                    lp_token_supply: self.lp_total_supply(ledger),
                },
            );
            Ok(amounts)
        }

        pub(crate) fn do_remove_liquidity_one_token<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            lp_amount: u128,
            token_id: usize,
            min_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            self.ensure_deadline(env, deadline)?;
            self.ensure_not_paused()?;
            self.check_index(token_id)?;
            let (token_amount, fee) =
                self.compute_withdraw_one_token(ledger, env, lp_amount, token_id)?;
            ensure!(
                token_amount <= self.pool.reserves[token_id],
                StablePoolError::WithdrawExceedsAvailable
            );
            ensure!(
                token_amount >= min_amount,
                StablePoolError::SlippageExceeded
            );

            let caller = env.caller();
            self.burn_lp(ledger, env, caller, lp_amount)?;
            self.decrease_reserve(token_id, token_amount)?;
            self.accrue_admin_fee(token_id, fee)?;
            self.push_tokens(
                ledger,
                env,
                self.pool.tokens[token_id],
                caller,
                token_amount,
            )?;

            self.emit(
                env,
                StablePoolEvent::RemoveLiquidityOne {
                    provider: caller,
                    lp_token_amount: lp_amount,
                    lp_token_supply: self.lp_total_supply(ledger),
                    bought_id: token_id as u8,
                    tokens_bought: token_amount,
                },
            );
            Ok(token_amount)
        }

        pub(crate) fn do_remove_liquidity_imbalance<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            amounts: Vec<u128>,
            max_burn_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            self.ensure_deadline(env, deadline)?;
            self.ensure_not_paused()?;
            self.ensure_amounts_len(&amounts)?;
            let total_supply = self.lp_total_supply(ledger);
            ensure!(total_supply > 0, StablePoolError::InsufficientLiquidity);
            for (&amount, &reserve) in amounts.iter().zip(self.pool.reserves.iter()) {
                ensure!(
                    amount <= reserve,
                    StablePoolError::WithdrawExceedsAvailable
                );
                ensure!(amount < reserve, StablePoolError::InsufficientLiquidity);
            }

            let rates = self.get_scaled_rates()?;
            let (lp_amount, fees) = math::rated_compute_lp_amount_for_withdraw(
                &rates,
                &amounts,
                &self.pool.reserves,
                total_supply,
                Some(&self.pool.fees),
                self.amp_coef_precise(env)?,
            )?;
            ensure!(lp_amount > 0, StablePoolError::ZeroAmount);
            // round up in favor of the pool
            let lp_amount = lp_amount
                .checked_add(1)
                .ok_or(MathError::AddOverflow(103))?;
            ensure!(
                lp_amount <= max_burn_amount,
                StablePoolError::MaxBurnExceeded
            );

            let caller = env.caller();
            self.burn_lp(ledger, env, caller, lp_amount)?;
            for (id, &amount) in amounts.iter().enumerate() {
                self.decrease_reserve(id, amount)?;
                self.accrue_admin_fee(id, fees[id])?;
                self.push_tokens(ledger, env, self.pool.tokens[id], caller, amount)?;
            }

            let invariant = self.invariant(env)?;
            self.emit(
                env,
                StablePoolEvent::RemoveLiquidityImbalance {
                    provider: caller,
                    token_amounts: amounts,
                    fees,
                    invariant,
                    lp_token_supply: self.lp_total_supply(ledger),
                },
            );
            Ok(lp_amount)
        }

        pub(crate) fn do_withdraw_admin_fees<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
        ) -> Result<Vec<u128>, StablePoolError> {
            let fee_address = self.pool.fee_address;
            ensure!(env.caller() == fee_address, StablePoolError::Unauthorized);
            let mut amounts = Vec::with_capacity(self.pool.tokens.len());
            for id in 0..self.pool.tokens.len() {
                let amount = self.pool.admin_reserves[id];
                self.pool.admin_reserves[id] = 0;
                self.push_tokens(ledger, env, self.pool.tokens[id], fee_address, amount)?;
                amounts.push(amount);
            }
            log::debug!("admin fees {:?} sent to {:?}", amounts, fee_address);
            self.emit(
                env,
                StablePoolEvent::AdminFeesWithdrawn {
                    to: fee_address,
                    amounts: amounts.clone(),
                },
            );
            Ok(amounts)
        }

        /// Returns (token_amount, fee) for burning `lp_amount` into `token_id`.
        fn compute_withdraw_one_token<L: TokenLedger>(
            &self,
            ledger: &L,
            env: &Env,
            lp_amount: u128,
            token_id: usize,
        ) -> Result<(u128, u128), StablePoolError> {
            ensure!(lp_amount > 0, StablePoolError::ZeroAmount);
            let total_supply = self.lp_total_supply(ledger);
            ensure!(
                lp_amount < total_supply,
                StablePoolError::InsufficientLiquidity
            );
            let rates = self.get_scaled_rates()?;
            Ok(math::rated_compute_withdraw_one_token(
                &rates,
                lp_amount,
                token_id,
                &self.pool.reserves,
                total_supply,
                &self.pool.fees,
                self.amp_coef_precise(env)?,
            )?)
        }
    }

    impl StablePool for StablePoolContract {
        fn swap<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            token_in_idx: usize,
            token_out_idx: usize,
            token_in_amount: u128,
            min_token_out_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            transactional(self, ledger, env, |pool, ledger, env| {
                pool.do_swap(
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

        fn add_liquidity<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            amounts: Vec<u128>,
            min_mint_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            transactional(self, ledger, env, |pool, ledger, env| {
                pool.do_add_liquidity(ledger, env, amounts, min_mint_amount, deadline)
            })
        }

        fn remove_liquidity<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            lp_amount: u128,
            min_amounts: Vec<u128>,
            deadline: Timestamp,
        ) -> Result<Vec<u128>, StablePoolError> {
            transactional(self, ledger, env, |pool, ledger, env| {
                pool.do_remove_liquidity(ledger, env, lp_amount, min_amounts, deadline)
            })
        }

        fn remove_liquidity_one_token<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            lp_amount: u128,
            token_idx: usize,
            min_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            transactional(self, ledger, env, |pool, ledger, env| {
                pool.do_remove_liquidity_one_token(
                    ledger, env, lp_amount, token_idx, min_amount, deadline,
                )
            })
        }

        fn remove_liquidity_imbalance<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
            amounts: Vec<u128>,
            max_burn_amount: u128,
            deadline: Timestamp,
        ) -> Result<u128, StablePoolError> {
            transactional(self, ledger, env, |pool, ledger, env| {
                pool.do_remove_liquidity_imbalance(ledger, env, amounts, max_burn_amount, deadline)
            })
        }

        fn withdraw_admin_fees<L: TokenLedger>(
            &mut self,
            ledger: &mut L,
            env: &mut Env,
        ) -> Result<Vec<u128>, StablePoolError> {
            transactional(self, ledger, env, |pool, ledger, env| {
                pool.do_withdraw_admin_fees(ledger, env)
            })
        }

        fn set_owner(&mut self, env: &mut Env, new_owner: AccountId) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            self.owner = new_owner;
            self.emit(env, StablePoolEvent::OwnerChanged { new_owner });
            Ok(())
        }

        fn set_fee_address(
            &mut self,
            env: &mut Env,
            fee_address: AccountId,
        ) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            self.pool.fee_address = fee_address;
            self.emit(
                env,
                StablePoolEvent::FeeAddressChanged {
                    new_fee_address: fee_address,
                },
            );
            Ok(())
        }

        fn set_swap_fee(&mut self, env: &mut Env, swap_fee: u64) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            ensure!(swap_fee <= MAX_SWAP_FEE, StablePoolError::SwapFeeTooHigh);
            self.pool.fees.trade_fee = swap_fee;
            self.emit(
                env,
                StablePoolEvent::NewSwapFee {
                    new_swap_fee: swap_fee,
                },
            );
            Ok(())
        }

        fn set_admin_fee(&mut self, env: &mut Env, admin_fee: u64) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            ensure!(admin_fee <= MAX_ADMIN_FEE, StablePoolError::AdminFeeTooHigh);
            self.pool.fees.admin_fee = admin_fee;
            self.emit(
                env,
                StablePoolEvent::NewAdminFee {
                    new_admin_fee: admin_fee,
                },
            );
            Ok(())
        }

        fn ramp_a(
            &mut self,
            env: &mut Env,
            future_a: u128,
            future_time: Timestamp,
        ) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            let current_time = env.block_timestamp();
            let old_a = self
                .pool
                .amp_coef
                .ramp_amp_coef(future_a, future_time, current_time)?;
            log::info!(
                "ramping A from {} to {} until {}",
                old_a,
                self.pool.amp_coef.future_amp_coef(),
                future_time
            );
            self.emit(
                env,
                StablePoolEvent::RampA {
                    old_a,
                    new_a: self.pool.amp_coef.future_amp_coef(),
                    initial_time: current_time,
                    future_time,
                },
            );
            Ok(())
        }

        fn stop_ramp_a(&mut self, env: &mut Env) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            let current_time = env.block_timestamp();
            let current_a = self.pool.amp_coef.stop_ramp(current_time)?;
            self.emit(
                env,
                StablePoolEvent::StopRampA {
                    current_a,
                    time: current_time,
                },
            );
            Ok(())
        }

        fn pause(&mut self, env: &mut Env) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            if !self.pool.paused {
                self.pool.paused = true;
                let account = env.caller();
                log::info!("pool {:?} paused", self.address);
                self.emit(env, StablePoolEvent::Paused { account });
            }
            Ok(())
        }

        fn unpause(&mut self, env: &mut Env) -> Result<(), StablePoolError> {
            self.ensure_owner(env)?;
            if self.pool.paused {
                self.pool.paused = false;
                let account = env.caller();
                log::info!("pool {:?} unpaused", self.address);
                self.emit(env, StablePoolEvent::Unpaused { account });
            }
            Ok(())
        }
    }

    impl StablePoolView for StablePoolContract {
        fn tokens(&self) -> Vec<AccountId> {
            self.pool.tokens.clone()
        }

        fn token(&self, index: usize) -> Result<AccountId, StablePoolError> {
            self.pool
                .tokens
                .get(index)
                .copied()
                .ok_or(StablePoolError::TokenIndexOutOfRange)
        }

        fn token_index(&self, token: AccountId) -> Result<usize, StablePoolError> {
            self.pool
                .tokens
                .iter()
                .position(|&id| id == token)
                .ok_or(StablePoolError::TokenNotFound(token))
        }

        fn reserves(&self) -> Vec<u128> {
            self.pool.reserves.clone()
        }

        fn token_balance(&self, index: usize) -> Result<u128, StablePoolError> {
            self.pool
                .reserves
                .get(index)
                .copied()
                .ok_or(StablePoolError::TokenIndexOutOfRange)
        }

        fn admin_balance(&self, index: usize) -> Result<u128, StablePoolError> {
            self.pool
                .admin_reserves
                .get(index)
                .copied()
                .ok_or(StablePoolError::TokenIndexOutOfRange)
        }

        fn token_precision_multipliers(&self) -> Vec<u128> {
            self.pool.precisions.clone()
        }

        fn lp_token(&self) -> AccountId {
            self.pool.lp_token
        }

        fn swap_storage(&self) -> SwapStorage {
            let amp_coef = &self.pool.amp_coef;
            SwapStorage {
                initial_a: amp_coef.initial_amp_coef(),
                future_a: amp_coef.future_amp_coef(),
                initial_a_time: amp_coef.initial_amp_time(),
                future_a_time: amp_coef.future_amp_time(),
                swap_fee: self.pool.fees.trade_fee,
                admin_fee: self.pool.fees.admin_fee,
                lp_token: self.pool.lp_token,
            }
        }

        fn amp_coef(&self, env: &Env) -> Result<u128, StablePoolError> {
            Ok(self.amp_coef_precise(env)? / A_PRECISION)
        }

        fn amp_coef_precise(&self, env: &Env) -> Result<u128, StablePoolError> {
            Ok(self
                .pool
                .amp_coef
                .compute_amp_coef(env.block_timestamp())?)
        }

        fn virtual_price<L: TokenLedger>(
            &self,
            ledger: &L,
            env: &Env,
        ) -> Result<u128, StablePoolError> {
            let rates = self.get_scaled_rates()?;
            Ok(math::rated_compute_virtual_price(
                &rates,
                &self.pool.reserves,
                self.lp_total_supply(ledger),
                self.amp_coef_precise(env)?,
            )?)
        }

        fn calculate_swap(
            &self,
            env: &Env,
            token_in_idx: usize,
            token_out_idx: usize,
            token_in_amount: u128,
        ) -> Result<u128, StablePoolError> {
            self.check_indices(token_in_idx, token_out_idx)?;
            if token_in_amount == 0 {
                return Ok(0);
            }
            ensure!(
                self.pool.reserves.iter().all(|&reserve| reserve > 0),
                StablePoolError::InsufficientLiquidity
            );
            let rates = self.get_scaled_rates()?;
            let (token_out_amount, _) = math::rated_swap_to(
                &rates,
                token_in_idx,
                token_in_amount,
                token_out_idx,
                &self.pool.reserves,
                &self.pool.fees,
                self.amp_coef_precise(env)?,
            )?;
            Ok(token_out_amount)
        }

        fn calculate_token_amount<L: TokenLedger>(
            &self,
            ledger: &L,
            env: &Env,
            amounts: &[u128],
            deposit: bool,
        ) -> Result<u128, StablePoolError> {
            self.ensure_amounts_len(amounts)?;
            let total_supply = self.lp_total_supply(ledger);
            let rates = self.get_scaled_rates()?;
            let amp_coef = self.amp_coef_precise(env)?;
            if deposit {
                if total_supply == 0 {
                    ensure!(
                        amounts.iter().all(|&amount| amount > 0),
                        StablePoolError::MustSupplyAllTokens
                    );
                }
                let (lp_amount, _) = math::rated_compute_lp_amount_for_deposit(
                    &rates,
                    amounts,
                    &self.pool.reserves,
                    total_supply,
                    None,
                    amp_coef,
                )?;
                Ok(lp_amount)
            } else {
                ensure!(total_supply > 0, StablePoolError::InsufficientLiquidity);
                ensure!(
                    amounts
                        .iter()
                        .zip(self.pool.reserves.iter())
                        .all(|(amount, reserve)| amount <= reserve),
                    StablePoolError::WithdrawExceedsAvailable
                );
                let (lp_amount, _) = math::rated_compute_lp_amount_for_withdraw(
                    &rates,
                    amounts,
                    &self.pool.reserves,
                    total_supply,
                    None,
                    amp_coef,
                )?;
                Ok(lp_amount)
            }
        }

        fn calculate_remove_liquidity<L: TokenLedger>(
            &self,
            ledger: &L,
            lp_amount: u128,
        ) -> Result<Vec<u128>, StablePoolError> {
            let total_supply = self.lp_total_supply(ledger);
            ensure!(
                total_supply > 0 && lp_amount <= total_supply,
                StablePoolError::InsufficientLiquidity
            );
            Ok(math::compute_amounts_given_lp(
                lp_amount,
                &self.pool.reserves,
                total_supply,
            )?)
        }

        fn calculate_remove_liquidity_one_token<L: TokenLedger>(
            &self,
            ledger: &L,
            env: &Env,
            lp_amount: u128,
            token_idx: usize,
        ) -> Result<u128, StablePoolError> {
            self.check_index(token_idx)?;
            let (token_amount, _) =
                self.compute_withdraw_one_token(ledger, env, lp_amount, token_idx)?;
            Ok(token_amount)
        }
    }

    impl RateProvider for StablePoolContract {
        fn rate_provider_id(&self) -> AccountId {
            self.address
        }

        /// The pool's LP token is worth its virtual price.
        fn get_rate<L: TokenLedger>(&self, ledger: &L, env: &Env) -> Result<u128, StablePoolError> {
            self.virtual_price(ledger, env)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use amm_helpers::constants::stable_pool::DAY;
        use lp_token_contract::Ledger;

        const ONE: u128 = 10u128.pow(18);
        const START: Timestamp = 1_700_000_000;

        fn account(byte: u8) -> AccountId {
            AccountId::from([byte; 32])
        }

        fn owner() -> AccountId {
            account(1)
        }

        fn user() -> AccountId {
            account(2)
        }

        fn pool_address() -> AccountId {
            account(50)
        }

        fn params(tokens: Vec<AccountId>, tokens_decimals: Vec<u8>) -> InitParams {
            InitParams {
                address: pool_address(),
                tokens,
                tokens_decimals,
                lp_token: account(60),
                lp_token_name: "Stable LP".into(),
                lp_token_symbol: "SLP".into(),
                amp_coef_precise: 5000,
                swap_fee: 1_000_000,
                admin_fee: 0,
                owner: owner(),
                fee_address: account(3),
            }
        }

        /// Ledger with two 18 decimal tokens, user holding 10 of each and
        /// allowing the pool to spend them.
        fn setup() -> (Ledger, Env, StablePoolContract) {
            let mut ledger = Ledger::new();
            let mut env = Env::new(owner(), START);
            let tokens = vec![account(10), account(11)];
            for &token in tokens.iter() {
                ledger
                    .create_token(token, TokenMetadata::default(), owner())
                    .unwrap();
                ledger.mint(&mut env, token, user(), 10 * ONE).unwrap();
                env.call_as(user(), |env| {
                    ledger.approve(env, token, pool_address(), u128::MAX)
                })
                .unwrap();
            }
            let pool = StablePoolContract::new(&mut ledger, params(tokens, vec![18, 18])).unwrap();
            env.set_caller(user());
            (ledger, env, pool)
        }

        fn init_error(params: InitParams) -> StablePoolError {
            StablePoolContract::new(&mut Ledger::new(), params).unwrap_err()
        }

        #[test]
        fn init_validation() {
            let (a, b, c) = (account(10), account(11), account(12));
            assert_eq!(
                init_error(params(vec![a], vec![18])),
                StablePoolError::IncorrectTokenCount
            );
            assert_eq!(
                init_error(params(vec![a; 9], vec![18; 9])),
                StablePoolError::IncorrectTokenCount
            );
            assert_eq!(
                init_error(params(vec![a, b], vec![18])),
                StablePoolError::IncorrectTokenCount
            );
            assert_eq!(
                init_error(params(vec![a, b, a], vec![18; 3])),
                StablePoolError::IdenticalTokenId
            );
            assert_eq!(
                init_error(params(vec![a, b, c], vec![18, 19, 6])),
                StablePoolError::TooLargeTokenDecimal
            );
            let mut bad_amp = params(vec![a, b], vec![18, 18]);
            bad_amp.amp_coef_precise = 99;
            assert_eq!(init_error(bad_amp), StablePoolError::InvalidAmpCoef);
            let mut bad_fee = params(vec![a, b], vec![18, 18]);
            bad_fee.swap_fee = MAX_SWAP_FEE + 1;
            assert_eq!(init_error(bad_fee), StablePoolError::SwapFeeTooHigh);
            let mut bad_admin_fee = params(vec![a, b], vec![18, 18]);
            bad_admin_fee.admin_fee = MAX_ADMIN_FEE + 1;
            assert_eq!(init_error(bad_admin_fee), StablePoolError::AdminFeeTooHigh);
        }

        #[test]
        fn lp_token_is_created_once() {
            let mut ledger = Ledger::new();
            let tokens = vec![account(10), account(11)];
            let pool =
                StablePoolContract::new(&mut ledger, params(tokens.clone(), vec![6, 18])).unwrap();
            assert_eq!(pool.token_precision_multipliers(), vec![10u128.pow(12), 1]);
            assert_eq!(
                ledger.token_metadata(pool.lp_token()).unwrap().decimals,
                TOKEN_TARGET_DECIMALS
            );
            assert_eq!(
                StablePoolContract::new(&mut ledger, params(tokens, vec![6, 18])).unwrap_err(),
                StablePoolError::PSP22Error(traits::PSP22Error::TokenAlreadyExists(account(60)))
            );
        }

        #[test]
        fn swap_golden() {
            let (mut ledger, mut env, mut pool) = setup();
            let deadline = START + DAY;
            let minted = pool
                .add_liquidity(&mut ledger, &mut env, vec![ONE, ONE], 0, deadline)
                .unwrap();
            assert_eq!(minted, 2 * ONE);
            assert_eq!(pool.virtual_price(&ledger, &env), Ok(ONE));
            assert_eq!(
                pool.calculate_swap(&env, 0, 1, ONE / 10),
                Ok(99890120853672039)
            );
            let out = pool
                .swap(&mut ledger, &mut env, 0, 1, ONE / 10, 0, deadline)
                .unwrap();
            assert_eq!(out, 99890120853672039);
            assert_eq!(pool.token_balance(0), Ok(ONE + ONE / 10));
            assert_eq!(pool.token_balance(1), Ok(ONE - out));
            assert_eq!(ledger.balance_of(account(11), user()), 9 * ONE + out);
        }

        #[test]
        fn failed_call_changes_nothing() {
            let (mut ledger, mut env, mut pool) = setup();
            let deadline = START + DAY;
            pool.add_liquidity(&mut ledger, &mut env, vec![ONE, ONE], 0, deadline)
                .unwrap();
            let events = env.event_count();
            assert_eq!(
                pool.swap(&mut ledger, &mut env, 0, 1, ONE / 10, ONE / 10, deadline),
                Err(StablePoolError::SlippageExceeded)
            );
            assert_eq!(pool.reserves(), vec![ONE, ONE]);
            assert_eq!(ledger.balance_of(account(10), user()), 9 * ONE);
            assert_eq!(env.event_count(), events);
        }

        #[test]
        fn nested_call_is_rejected() {
            let (mut ledger, mut env, mut pool) = setup();
            pool.in_progress = true;
            assert_eq!(
                pool.add_liquidity(&mut ledger, &mut env, vec![ONE, ONE], 0, START),
                Err(StablePoolError::Reentrancy)
            );
            assert!(pool.in_progress);
        }

        #[test]
        fn guards() {
            let (mut ledger, mut env, mut pool) = setup();
            assert_eq!(
                pool.add_liquidity(&mut ledger, &mut env, vec![ONE, 0], 0, START),
                Err(StablePoolError::MustSupplyAllTokens)
            );
            assert_eq!(
                pool.add_liquidity(&mut ledger, &mut env, vec![ONE], 0, START),
                Err(StablePoolError::AmountsLengthMismatch)
            );
            assert_eq!(
                pool.add_liquidity(&mut ledger, &mut env, vec![ONE, ONE], 0, START - 1),
                Err(StablePoolError::DeadlineExpired)
            );
            assert_eq!(
                pool.swap(&mut ledger, &mut env, 0, 1, ONE, 0, START),
                Err(StablePoolError::InsufficientLiquidity)
            );
            assert_eq!(
                pool.swap(&mut ledger, &mut env, 0, 2, ONE, 0, START),
                Err(StablePoolError::TokenIndexOutOfRange)
            );
            assert_eq!(pool.pause(&mut env), Err(StablePoolError::Unauthorized));
            assert_eq!(
                pool.withdraw_admin_fees(&mut ledger, &mut env),
                Err(StablePoolError::Unauthorized)
            );
        }

        #[test]
        fn pause_blocks_all_but_proportional_withdrawal() {
            let (mut ledger, mut env, mut pool) = setup();
            let deadline = START + DAY;
            pool.add_liquidity(&mut ledger, &mut env, vec![ONE, ONE], 0, deadline)
                .unwrap();
            env.call_as(owner(), |env| pool.pause(env)).unwrap();
            assert!(pool.is_paused());
            assert_eq!(
                pool.swap(&mut ledger, &mut env, 0, 1, ONE / 10, 0, deadline),
                Err(StablePoolError::Paused)
            );
            assert_eq!(
                pool.remove_liquidity_one_token(&mut ledger, &mut env, ONE, 0, 0, deadline),
                Err(StablePoolError::Paused)
            );
            assert_eq!(
                pool.remove_liquidity_imbalance(
                    &mut ledger,
                    &mut env,
                    vec![ONE / 2, 0],
                    2 * ONE,
                    deadline
                ),
                Err(StablePoolError::Paused)
            );
            assert_eq!(
                pool.remove_liquidity(&mut ledger, &mut env, ONE, vec![0, 0], deadline),
                Ok(vec![ONE / 2, ONE / 2])
            );
            env.call_as(owner(), |env| pool.unpause(env)).unwrap();
            assert!(pool
                .swap(&mut ledger, &mut env, 0, 1, ONE / 10, 0, deadline)
                .is_ok());
        }

        #[test]
        fn admin_setters() {
            let (_, mut env, mut pool) = setup();
            env.set_caller(owner());
            assert_eq!(
                pool.set_swap_fee(&mut env, MAX_SWAP_FEE + 1),
                Err(StablePoolError::SwapFeeTooHigh)
            );
            pool.set_swap_fee(&mut env, MAX_SWAP_FEE).unwrap();
            pool.set_admin_fee(&mut env, MAX_ADMIN_FEE).unwrap();
            pool.set_fee_address(&mut env, user()).unwrap();
            assert_eq!(pool.fee_address(), user());
            pool.ramp_a(&mut env, 100, START + 14 * DAY).unwrap();
            let storage = pool.swap_storage();
            assert_eq!(storage.swap_fee, MAX_SWAP_FEE);
            assert_eq!(storage.admin_fee, MAX_ADMIN_FEE);
            assert_eq!(storage.initial_a, 5000);
            assert_eq!(storage.future_a, 10000);
            env.advance_block_timestamp(7 * DAY);
            assert_eq!(pool.amp_coef(&env), Ok(75));
            pool.stop_ramp_a(&mut env).unwrap();
            assert_eq!(pool.amp_coef_precise(&env), Ok(7500));
            pool.set_owner(&mut env, user()).unwrap();
            assert_eq!(pool.set_swap_fee(&mut env, 0), Err(StablePoolError::Unauthorized));
        }
    }
}
