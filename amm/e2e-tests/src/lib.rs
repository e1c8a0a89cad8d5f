#[cfg(test)]
mod utils;
#[cfg(test)]
mod stable_swap_tests;
