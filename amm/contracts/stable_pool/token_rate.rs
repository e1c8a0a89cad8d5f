use amm_helpers::ensure;
use ink::primitives::AccountId;
use scale::{Decode, Encode};
use traits::{Env, RateProvider, StablePoolError, TokenLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct ExternalTokenRate {
    cached_token_rate: u128,
    rate_provider: AccountId,
}

/// Value of one token unit, with `RATE_PRECISION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub enum TokenRate {
    Constant(u128),
    External(ExternalTokenRate),
}

impl TokenRate {
    pub fn new_constant(rate: u128) -> Self {
        Self::Constant(rate)
    }

    pub fn new_external(rate_provider: AccountId, initial_rate: u128) -> Self {
        Self::External(ExternalTokenRate {
            cached_token_rate: initial_rate,
            rate_provider,
        })
    }

    // To make sure the rate is up-to-date, the caller should call `update_rate` before calling this method.
    pub fn get_rate(&self) -> u128 {
        match self {
            Self::Constant(rate) => *rate,
            Self::External(external) => external.cached_token_rate,
        }
    }

    pub fn rate_provider(&self) -> Option<AccountId> {
        match self {
            Self::Constant(_) => None,
            Self::External(external) => Some(external.rate_provider),
        }
    }

    /// Re-reads an external rate from `provider`, which must be the one the rate is bound to.
    /// Returns whether the cached rate changed.
    pub fn update_rate<P: RateProvider, L: TokenLedger>(
        &mut self,
        provider: &P,
        ledger: &L,
        env: &Env,
    ) -> Result<bool, StablePoolError> {
        match self {
            Self::Constant(_) => Ok(false),
            Self::External(external) => {
                ensure!(
                    provider.rate_provider_id() == external.rate_provider,
                    StablePoolError::InvalidBasePool
                );
                let rate = provider.get_rate(ledger, env)?;
                let changed = rate != external.cached_token_rate;
                external.cached_token_rate = rate;
                Ok(changed)
            }
        }
    }
}
