use ink::primitives::AccountId;

use crate::{Env, StablePoolError, TokenLedger};

pub trait RateProvider {
    /// Account the rate is attributed to. Consumers bind to it once and
    /// refuse rates coming from any other provider.
    fn rate_provider_id(&self) -> AccountId;

    // Get "rate" of a particular token with respect to the value it represents.
    // In the context of meta pools the token is the LP token of the base pool and the rate
    // is its virtual price, with precision of 18 decimal places.
    fn get_rate<L: TokenLedger>(&self, ledger: &L, env: &Env) -> Result<u128, StablePoolError>;
}
