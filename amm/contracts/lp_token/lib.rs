#![cfg_attr(not(feature = "std"), no_std)]

mod data;
mod ledger;

pub use data::LpTokenData;
pub use ledger::Ledger;
