#![cfg_attr(not(feature = "std"), no_std)]

pub mod constants;
pub mod math;
pub mod stable_swap_math;

/// Returns early with `$y` unless `$x` holds.
#[macro_export]
macro_rules! ensure {
    ( $x:expr, $y:expr $(,)? ) => {{
        if !$x {
            return Err($y);
        }
    }};
}
