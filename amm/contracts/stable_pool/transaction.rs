use amm_helpers::ensure;
use traits::{Env, StablePoolError, TokenLedger};

/// State that is restored as a whole when a call fails.
pub(crate) trait Transactional: Clone {
    /// Set for the duration of a call, rejects nested calls into the same state.
    fn in_progress(&mut self) -> &mut bool;
}

/// Runs `f` as a single all-or-nothing call.
///
/// On error `state`, the ledger and the event log are brought back to where they
/// were before the call.
pub(crate) fn transactional<S, L, T, F>(
    state: &mut S,
    ledger: &mut L,
    env: &mut Env,
    f: F,
) -> Result<T, StablePoolError>
where
    S: Transactional,
    L: TokenLedger,
    F: FnOnce(&mut S, &mut L, &mut Env) -> Result<T, StablePoolError>,
{
    ensure!(!*state.in_progress(), StablePoolError::Reentrancy);
    let snapshot = state.clone();
    let checkpoint = ledger.checkpoint();
    let event_count = env.event_count();
    *state.in_progress() = true;

    let result = f(state, ledger, env);
    match &result {
        Ok(_) => ledger.commit(checkpoint),
        Err(err) => {
            if *err == StablePoolError::ConvergenceFailure {
                log::warn!("invariant solver did not converge, call reverted");
            } else {
                log::debug!("call reverted: {:?}", err);
            }
            *state = snapshot;
            ledger.rollback(checkpoint);
            env.revert_events(event_count);
        }
    }
    *state.in_progress() = false;
    result
}
