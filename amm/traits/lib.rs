#![cfg_attr(not(feature = "std"), no_std)]

mod env;
mod ledger;
mod rate_provider;
mod stable_pool;

pub use amm_helpers::math::MathError;
pub use env::{EmittedEvent, Env, Event, PSP22Event, StablePoolEvent, Timestamp};
pub use ledger::{Checkpoint, PSP22Error, TokenLedger, TokenMetadata};
pub use rate_provider::RateProvider;
pub use stable_pool::{StablePool, StablePoolError, StablePoolView, SwapStorage};
