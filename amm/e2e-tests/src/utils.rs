use core::fmt::Debug;

pub use ink_primitives::AccountId;
pub use lp_token_contract::Ledger;
pub use stable_pool_contract::{InitParams, MetaPool, MetaPoolDeposit, StablePoolContract};
pub use traits::{
    Env, StablePool as _, StablePoolError, StablePoolView as _, Timestamp, TokenLedger as _,
    TokenMetadata,
};

pub const ONE_DAI: u128 = 10u128.pow(18);
pub const ONE_USDT: u128 = 10u128.pow(6);
pub const ONE_USDC: u128 = 10u128.pow(6);
pub const ONE_LPT: u128 = 10u128.pow(18);

pub const START: Timestamp = 1_700_000_000;
pub const NO_DEADLINE: Timestamp = Timestamp::MAX;

/// Whole token units every test account starts with, per token.
const INITIAL_SUPPLY: u128 = 1_000_000_000_000;

pub fn account(byte: u8) -> AccountId {
    AccountId::from([byte; 32])
}

pub fn owner() -> AccountId {
    account(1)
}

pub fn bob() -> AccountId {
    account(2)
}

pub fn charlie() -> AccountId {
    account(3)
}

pub fn fee_receiver() -> AccountId {
    account(42)
}

pub fn base_pool_address() -> AccountId {
    account(50)
}

pub fn meta_pool_address() -> AccountId {
    account(51)
}

pub fn base_lp_token() -> AccountId {
    account(60)
}

pub fn meta_lp_token() -> AccountId {
    account(61)
}

pub fn meta_deposit_address() -> AccountId {
    account(70)
}

/// Lets test bodies returning `anyhow::Result` use `?` on pool and token results.
pub trait IntoAnyhow<T> {
    fn into_anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: Debug> IntoAnyhow<T> for Result<T, E> {
    fn into_anyhow(self) -> anyhow::Result<T> {
        self.map_err(|err| anyhow::anyhow!("{err:?}"))
    }
}

/// Token ledger and call context shared by all pools of a test.
#[derive(Clone)]
pub struct Sandbox {
    pub ledger: Ledger,
    pub env: Env,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            ledger: Ledger::new(),
            env: Env::new(owner(), START),
        }
    }

    pub fn set_caller(&mut self, caller: AccountId) {
        self.env.set_caller(caller);
    }

    /// Creates `token` and gives `INITIAL_SUPPLY` whole units of it to bob and charlie.
    pub fn create_token(&mut self, token: AccountId, decimals: u8) {
        self.ledger
            .create_token(
                token,
                TokenMetadata {
                    name: None,
                    symbol: None,
                    decimals,
                },
                owner(),
            )
            .expect("SETUP: token should be created");
        let amount = INITIAL_SUPPLY * 10u128.pow(decimals as u32);
        for holder in [bob(), charlie()] {
            self.env
                .call_as(owner(), |env| self.ledger.mint(env, token, holder, amount))
                .expect("SETUP: mint should succeed");
        }
    }

    pub fn approve(&mut self, token: AccountId, holder: AccountId, spender: AccountId) {
        self.env
            .call_as(holder, |env| {
                self.ledger.approve(env, token, spender, u128::MAX)
            })
            .expect("SETUP: approve should succeed");
    }

    pub fn balance_of(&self, token: AccountId, holder: AccountId) -> u128 {
        self.ledger.balance_of(token, holder)
    }

    pub fn balances_of(&self, tokens: &[AccountId], holder: AccountId) -> Vec<u128> {
        tokens
            .iter()
            .map(|&token| self.balance_of(token, holder))
            .collect()
    }
}

pub fn pool_params(
    address: AccountId,
    lp_token: AccountId,
    tokens: Vec<AccountId>,
    tokens_decimals: Vec<u8>,
    amp_coef_precise: u128,
    swap_fee: u64,
    admin_fee: u64,
) -> InitParams {
    InitParams {
        address,
        tokens,
        tokens_decimals,
        lp_token,
        lp_token_name: "Stable LP".into(),
        lp_token_symbol: "SLP".into(),
        amp_coef_precise,
        swap_fee,
        admin_fee,
        owner: owner(),
        fee_address: fee_receiver(),
    }
}

/// Creates tokens `account(10)`, `account(11)`, ... and a pool of them at `base_pool_address()`.
/// Bob and charlie hold the tokens and allow the pool to spend them. Bob is the caller.
pub fn setup_stable_swap(
    sandbox: &mut Sandbox,
    token_decimals: Vec<u8>,
    amp_coef_precise: u128,
    swap_fee: u64,
    admin_fee: u64,
) -> StablePoolContract {
    let tokens: Vec<AccountId> = (0..token_decimals.len())
        .map(|id| account(10 + id as u8))
        .collect();
    for (&token, &decimals) in tokens.iter().zip(token_decimals.iter()) {
        sandbox.create_token(token, decimals);
        sandbox.approve(token, bob(), base_pool_address());
        sandbox.approve(token, charlie(), base_pool_address());
    }
    let pool = StablePoolContract::new(
        &mut sandbox.ledger,
        pool_params(
            base_pool_address(),
            base_lp_token(),
            tokens,
            token_decimals,
            amp_coef_precise,
            swap_fee,
            admin_fee,
        ),
    )
    .expect("SETUP: pool should be created");
    sandbox.set_caller(bob());
    pool
}

#[derive(Clone)]
pub struct MetaSetup {
    pub sandbox: Sandbox,
    pub base: StablePoolContract,
    pub meta: MetaPool,
    pub deposit: MetaPoolDeposit,
}

impl MetaSetup {
    /// `[meta token, DAI, USDT, USDC]`
    pub fn underlying_tokens(&self) -> Vec<AccountId> {
        self.meta.underlying_tokens()
    }
}

/// Base pool of DAI/USDT/USDC and a meta pool of a fourth stable token against the base LP,
/// each seeded by bob with a million of every token, plus a deposit facade for both.
pub fn setup_meta_pool() -> MetaSetup {
    let mut sandbox = Sandbox::new();
    let mut base = setup_stable_swap(&mut sandbox, vec![18, 6, 6], 20_000, 4_000_000, 0);
    base.add_liquidity(
        &mut sandbox.ledger,
        &mut sandbox.env,
        vec![1_000_000 * ONE_DAI, 1_000_000 * ONE_USDT, 1_000_000 * ONE_USDC],
        0,
        NO_DEADLINE,
    )
    .expect("SETUP: base deposit should succeed");

    let meta_token = account(13);
    sandbox.create_token(meta_token, 18);
    let mut meta = MetaPool::new(
        &mut sandbox.ledger,
        &mut sandbox.env,
        pool_params(
            meta_pool_address(),
            meta_lp_token(),
            vec![meta_token, base_lp_token()],
            vec![18, 18],
            10_000,
            4_000_000,
            0,
        ),
        &base,
    )
    .expect("SETUP: meta pool should be created");
    let mut meta_tokens = meta.underlying_tokens();
    meta_tokens.push(base_lp_token());
    for holder in [bob(), charlie()] {
        for &token in meta_tokens.iter() {
            sandbox.approve(token, holder, meta_pool_address());
        }
    }
    meta.add_liquidity(
        &mut sandbox.ledger,
        &mut sandbox.env,
        &base,
        vec![1_000_000 * ONE_DAI, 1_000_000 * ONE_LPT],
        0,
        NO_DEADLINE,
    )
    .expect("SETUP: meta deposit should succeed");

    let deposit = MetaPoolDeposit::new(
        &mut sandbox.ledger,
        &mut sandbox.env,
        meta_deposit_address(),
        &meta,
        &base,
    )
    .expect("SETUP: deposit facade should be created");
    let mut facade_tokens = deposit.tokens();
    facade_tokens.push(meta_lp_token());
    for holder in [bob(), charlie()] {
        for &token in facade_tokens.iter() {
            sandbox.approve(token, holder, meta_deposit_address());
        }
    }

    MetaSetup {
        sandbox,
        base,
        meta,
        deposit,
    }
}

/// Asserts the facade kept nothing of any token it handles.
pub fn assert_no_residue(setup: &MetaSetup) {
    let mut tokens = setup.deposit.tokens();
    tokens.push(base_lp_token());
    tokens.push(meta_lp_token());
    for token in tokens {
        assert_eq!(
            setup.sandbox.balance_of(token, meta_deposit_address()),
            0,
            "facade holds {token:?}"
        );
    }
}
