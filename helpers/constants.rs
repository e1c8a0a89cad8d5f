pub mod stable_pool {
    // Token amounts are rescaled so as if they have TOKEN_TARGET_DECIMALS decimal places.
    pub const TOKEN_TARGET_DECIMALS: u8 = 18;

    // Precision for rate values. If the rate is 1.2, the rate provider should return 1.2 * RATE_PRECISION.
    pub const RATE_DECIMALS: u8 = 18;
    pub const RATE_PRECISION: u128 = 10u128.pow(RATE_DECIMALS as u32);

    /// Virtual price is reported with 18 decimal places.
    pub const VIRTUAL_PRICE_PRECISION: u128 = 10u128.pow(18);

    /// Min number of tokens in a pool.
    pub const MIN_TOKENS: usize = 2;
    /// Max number of tokens in a pool.
    pub const MAX_TOKENS: usize = 8;

    /// Amplification coefficient is stored multiplied by A_PRECISION ("APrecise").
    pub const A_PRECISION: u128 = 100;
    /// Max amplification coefficient (in A units, exclusive).
    pub const MAX_A: u128 = 1_000_000;
    /// Max factor by which A may change during a single ramp.
    pub const MAX_A_CHANGE: u128 = 10;

    /// Seconds in one day.
    pub const DAY: u64 = 86_400;
    /// Min time between the start of two consecutive ramps, in seconds.
    pub const RAMP_DELAY: u64 = DAY;
    /// Min ramp duration, in seconds.
    pub const MIN_RAMP_TIME: u64 = 14 * DAY;

    /// Fee denominator, fees are given as integers with 1e10 precision.
    pub const FEE_DENOM: u64 = 10_000_000_000;
    /// 1%
    pub const MAX_SWAP_FEE: u64 = 100_000_000;
    /// 100% of the swap fee
    pub const MAX_ADMIN_FEE: u64 = FEE_DENOM;
    /// Base LP burn allowance of an imbalanced withdrawal through a meta pool, 100.5%.
    pub const BASE_WITHDRAW_FEE_MULTIPLIER: u64 = FEE_DENOM / 1000 * 1005;
}
