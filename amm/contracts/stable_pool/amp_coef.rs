use amm_helpers::{
    constants::stable_pool::{A_PRECISION, MAX_A, MAX_A_CHANGE, MIN_RAMP_TIME, RAMP_DELAY},
    ensure,
};
use traits::{MathError, StablePoolError, Timestamp};

/// Amplification coefficient, linearly ramped between two points in time.
/// All coefficients are kept multiplied by `A_PRECISION`.
#[derive(Default, Debug, scale::Encode, scale::Decode, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
pub struct AmplificationCoefficient {
    /// Amplification coefficient at the start of the ramp.
    initial_amp_coef: u128,
    /// Amplification coefficient at the end of the ramp.
    future_amp_coef: u128,
    /// Ramp start, in seconds.
    initial_amp_time: Timestamp,
    /// Ramp end, in seconds.
    future_amp_time: Timestamp,
}

impl AmplificationCoefficient {
    pub fn new(amp_coef_precise: u128) -> Self {
        Self {
            initial_amp_coef: amp_coef_precise,
            future_amp_coef: amp_coef_precise,
            initial_amp_time: 0,
            future_amp_time: 0,
        }
    }

    pub fn initial_amp_coef(&self) -> u128 {
        self.initial_amp_coef
    }

    pub fn future_amp_coef(&self) -> u128 {
        self.future_amp_coef
    }

    pub fn initial_amp_time(&self) -> Timestamp {
        self.initial_amp_time
    }

    pub fn future_amp_time(&self) -> Timestamp {
        self.future_amp_time
    }

    /// from https://github.com/ref-finance/ref-contracts/blob/752f42d7ec67b66fadda7756ed7eb3d312fb6473/ref-exchange/src/stable_swap/math.rs#L100-L101
    pub fn compute_amp_coef(&self, current_time: Timestamp) -> Result<u128, MathError> {
        if current_time >= self.future_amp_time {
            return Ok(self.future_amp_coef);
        }
        if current_time <= self.initial_amp_time {
            return Ok(self.initial_amp_coef);
        }
        let time_range = self
            .future_amp_time
            .checked_sub(self.initial_amp_time)
            .ok_or(MathError::SubUnderflow(31))?;
        let time_delta = current_time
            .checked_sub(self.initial_amp_time)
            .ok_or(MathError::SubUnderflow(32))?;

        if self.future_amp_coef >= self.initial_amp_coef {
            // Ramp up
            let amp_delta = (self.future_amp_coef - self.initial_amp_coef)
                .checked_mul(time_delta as u128)
                .ok_or(MathError::MulOverflow(31))?
                .checked_div(time_range as u128)
                .ok_or(MathError::DivByZero(31))?;
            self.initial_amp_coef
                .checked_add(amp_delta)
                .ok_or(MathError::AddOverflow(31))
        } else {
            // Ramp down
            let amp_delta = (self.initial_amp_coef - self.future_amp_coef)
                .checked_mul(time_delta as u128)
                .ok_or(MathError::MulOverflow(32))?
                .checked_div(time_range as u128)
                .ok_or(MathError::DivByZero(32))?;
            self.initial_amp_coef
                .checked_sub(amp_delta)
                .ok_or(MathError::SubUnderflow(33))
        }
    }

    /// Starts ramping towards `future_amp_coef` (given in whole A units) reached at `future_time`.
    /// Returns the coefficient the ramp starts from.
    pub fn ramp_amp_coef(
        &mut self,
        future_amp_coef: u128,
        future_time: Timestamp,
        current_time: Timestamp,
    ) -> Result<u128, StablePoolError> {
        ensure!(
            current_time >= self.initial_amp_time.saturating_add(RAMP_DELAY),
            StablePoolError::RampDelayNotElapsed
        );
        ensure!(
            future_time >= current_time.saturating_add(MIN_RAMP_TIME),
            StablePoolError::InsufficientRampTime
        );
        ensure!(
            future_amp_coef > 0 && future_amp_coef < MAX_A,
            StablePoolError::FutureAOutOfRange
        );
        let current_amp_coef = self.compute_amp_coef(current_time)?;
        let future_amp_coef = future_amp_coef
            .checked_mul(A_PRECISION)
            .ok_or(MathError::MulOverflow(33))?;
        if future_amp_coef < current_amp_coef {
            ensure!(
                future_amp_coef
                    .checked_mul(MAX_A_CHANGE)
                    .ok_or(MathError::MulOverflow(34))?
                    >= current_amp_coef,
                StablePoolError::FutureATooSmall
            );
        } else {
            ensure!(
                future_amp_coef
                    <= current_amp_coef
                        .checked_mul(MAX_A_CHANGE)
                        .ok_or(MathError::MulOverflow(35))?,
                StablePoolError::FutureATooLarge
            );
        }
        self.initial_amp_coef = current_amp_coef;
        self.future_amp_coef = future_amp_coef;
        self.initial_amp_time = current_time;
        self.future_amp_time = future_time;
        Ok(current_amp_coef)
    }

    /// Freezes the coefficient at its current value. Returns that value.
    pub fn stop_ramp(&mut self, current_time: Timestamp) -> Result<u128, StablePoolError> {
        ensure!(
            self.future_amp_time > current_time,
            StablePoolError::AlreadyStopped
        );
        let current_amp_coef = self.compute_amp_coef(current_time)?;
        self.initial_amp_coef = current_amp_coef;
        self.future_amp_coef = current_amp_coef;
        self.initial_amp_time = current_time;
        self.future_amp_time = current_time;
        Ok(current_amp_coef)
    }
}
