use amm_helpers::{
    constants::stable_pool::{DAY, FEE_DENOM, MIN_RAMP_TIME, RATE_PRECISION},
    stable_swap_math::{self, fees::Fees},
};
use assert2::{assert, check, let_assert};
use traits::{Event, StablePoolEvent};

use crate::utils::*;

fn dai() -> AccountId {
    account(10)
}

fn usdt() -> AccountId {
    account(11)
}

fn add_liquidity(
    sandbox: &mut Sandbox,
    pool: &mut StablePoolContract,
    caller: AccountId,
    amounts: Vec<u128>,
) -> anyhow::Result<u128> {
    sandbox.set_caller(caller);
    pool.add_liquidity(
        &mut sandbox.ledger,
        &mut sandbox.env,
        amounts,
        0,
        NO_DEADLINE,
    )
    .into_anyhow()
}

#[test]
fn example_scenario() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    let minted = add_liquidity(&mut sandbox, &mut pool, bob(), vec![ONE_DAI, ONE_DAI])?;
    assert!(minted == 2 * ONE_LPT);
    assert!(pool.virtual_price(&sandbox.ledger, &sandbox.env) == Ok(ONE_DAI));

    let expected_out = 99890120853672039;
    assert!(pool.calculate_swap(&sandbox.env, 0, 1, ONE_DAI / 10) == Ok(expected_out));
    let out = pool
        .swap(
            &mut sandbox.ledger,
            &mut sandbox.env,
            0,
            1,
            ONE_DAI / 10,
            expected_out,
            NO_DEADLINE,
        )
        .into_anyhow()?;
    assert!(out == expected_out);
    assert!(pool.token_balance(0) == Ok(ONE_DAI + ONE_DAI / 10));
    assert!(pool.token_balance(1) == Ok(ONE_DAI - expected_out));

    let_assert!(Some(last) = sandbox.env.events().last());
    check!(last.emitter == base_pool_address());
    check!(
        last.event
            == Event::StablePool(StablePoolEvent::TokenSwap {
                buyer: bob(),
                tokens_sold: ONE_DAI / 10,
                tokens_bought: expected_out,
                sold_id: 0,
                bought_id: 1,
            })
    );
    Ok(())
}

#[test]
fn swap_between_different_decimals() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 6], 20_000, 4_000_000, 0);
    let minted = add_liquidity(
        &mut sandbox,
        &mut pool,
        bob(),
        vec![100_000 * ONE_DAI, 100_000 * ONE_USDT],
    )?;
    assert!(minted == 200_000 * ONE_LPT);

    let usdt_before = sandbox.balance_of(usdt(), charlie());
    sandbox.set_caller(charlie());
    let out = pool
        .swap(
            &mut sandbox.ledger,
            &mut sandbox.env,
            0,
            1,
            1_000 * ONE_DAI,
            0,
            NO_DEADLINE,
        )
        .into_anyhow()?;
    assert!(out == 999_575_070);
    assert!(sandbox.balance_of(usdt(), charlie()) == usdt_before + out);
    assert!(pool.reserves() == vec![101_000 * ONE_DAI, 100_000 * ONE_USDT - out]);
    Ok(())
}

#[test]
fn balanced_deposit_and_withdrawal_conserve_tokens() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    add_liquidity(&mut sandbox, &mut pool, bob(), vec![100 * ONE_DAI, 100 * ONE_DAI])?;

    let tokens = pool.tokens();
    let before = sandbox.balances_of(&tokens, charlie());
    let minted = add_liquidity(
        &mut sandbox,
        &mut pool,
        charlie(),
        vec![10 * ONE_DAI, 10 * ONE_DAI],
    )?;
    assert!(minted == 20 * ONE_LPT);
    let returned = pool
        .remove_liquidity(
            &mut sandbox.ledger,
            &mut sandbox.env,
            minted,
            vec![0, 0],
            NO_DEADLINE,
        )
        .into_anyhow()?;
    assert!(returned == vec![10 * ONE_DAI, 10 * ONE_DAI]);
    assert!(sandbox.balances_of(&tokens, charlie()) == before);
    assert!(sandbox.balance_of(pool.lp_token(), charlie()) == 0);
    Ok(())
}

#[test]
fn imbalanced_deposit_pays_fee_on_withdrawal() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 40_000_000, 0);
    add_liquidity(&mut sandbox, &mut pool, bob(), vec![100 * ONE_DAI, 100 * ONE_DAI])?;

    let minted = add_liquidity(&mut sandbox, &mut pool, charlie(), vec![10 * ONE_DAI, 0])?;
    let returned = pool
        .remove_liquidity(
            &mut sandbox.ledger,
            &mut sandbox.env,
            minted,
            vec![0, 0],
            NO_DEADLINE,
        )
        .into_anyhow()?;
    assert!(returned[0] > returned[1]);
    assert!(returned.iter().sum::<u128>() < 10 * ONE_DAI);
    Ok(())
}

#[test]
fn one_token_round_trip_loss_shrinks_with_fee() -> anyhow::Result<()> {
    let mut losses = Vec::new();
    for swap_fee in [100_000_000, 10_000_000, 1_000_000, 0] {
        let mut sandbox = Sandbox::new();
        let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, swap_fee, 0);
        add_liquidity(
            &mut sandbox,
            &mut pool,
            bob(),
            vec![1_000 * ONE_DAI, 1_000 * ONE_DAI],
        )?;
        let minted = add_liquidity(&mut sandbox, &mut pool, charlie(), vec![10 * ONE_DAI, 0])?;
        let expected = pool
            .calculate_remove_liquidity_one_token(&sandbox.ledger, &sandbox.env, minted, 0)
            .into_anyhow()?;
        let received = pool
            .remove_liquidity_one_token(
                &mut sandbox.ledger,
                &mut sandbox.env,
                minted,
                0,
                expected,
                NO_DEADLINE,
            )
            .into_anyhow()?;
        assert!(received == expected);
        assert!(received < 10 * ONE_DAI);
        losses.push(10 * ONE_DAI - received);
    }
    assert!(losses.windows(2).all(|pair| pair[0] > pair[1]));
    // without fees only rounding is lost
    assert!(losses[3] <= 1);
    Ok(())
}

#[test]
fn virtual_price_moves_slowly_during_ramp() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    add_liquidity(
        &mut sandbox,
        &mut pool,
        bob(),
        vec![1_000 * ONE_DAI, 500 * ONE_DAI],
    )?;
    let initial = pool
        .virtual_price(&sandbox.ledger, &sandbox.env)
        .into_anyhow()?;

    let ramp_end = START + MIN_RAMP_TIME;
    sandbox.set_caller(owner());
    pool.ramp_a(&mut sandbox.env, 100, ramp_end).into_anyhow()?;

    let mut previous = initial;
    while sandbox.env.block_timestamp() < ramp_end {
        sandbox.env.advance_block_timestamp(999);
        let current = pool
            .virtual_price(&sandbox.ledger, &sandbox.env)
            .into_anyhow()?;
        // below 0.01% per block
        assert!(current.abs_diff(previous) * 10_000 < previous);
        previous = current;
    }
    assert!(pool.amp_coef(&sandbox.env) == Ok(100));
    assert!(previous > initial);
    Ok(())
}

#[test]
fn admin_fees_accrue_on_output_and_are_withdrawn() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let swap_fee = 4_000_000;
    // 1% of the swap fee
    let admin_fee = FEE_DENOM / 100;
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 20_000, swap_fee, admin_fee);
    add_liquidity(
        &mut sandbox,
        &mut pool,
        bob(),
        vec![10_000 * ONE_DAI, 10_000 * ONE_DAI],
    )?;

    let fees = Fees::new(swap_fee, admin_fee).expect("fees within bounds");
    let rates = [RATE_PRECISION; 2];
    let mut expected_admin = [0u128; 2];
    sandbox.set_caller(charlie());
    for round in 1..=10u128 {
        let (token_in, token_out) = if round % 2 == 0 { (0, 1) } else { (1, 0) };
        let amount = round * 100 * ONE_DAI;
        let (expected_out, fee) = stable_swap_math::rated_swap_to(
            &rates,
            token_in,
            amount,
            token_out,
            &pool.reserves(),
            &fees,
            pool.amp_coef_precise(&sandbox.env).into_anyhow()?,
        )
        .into_anyhow()?;
        expected_admin[token_out] += fees.admin_trade_fee(fee).into_anyhow()?;
        let out = pool
            .swap(
                &mut sandbox.ledger,
                &mut sandbox.env,
                token_in,
                token_out,
                amount,
                0,
                NO_DEADLINE,
            )
            .into_anyhow()?;
        check!(out == expected_out);
    }
    assert!(pool.admin_balance(0) == Ok(expected_admin[0]));
    assert!(pool.admin_balance(1) == Ok(expected_admin[1]));
    assert!(expected_admin.iter().all(|&fee| fee > 0));

    assert!(
        pool.withdraw_admin_fees(&mut sandbox.ledger, &mut sandbox.env)
            == Err(StablePoolError::Unauthorized)
    );
    let reserves = pool.reserves();
    sandbox.set_caller(fee_receiver());
    let withdrawn = pool
        .withdraw_admin_fees(&mut sandbox.ledger, &mut sandbox.env)
        .into_anyhow()?;
    assert!(withdrawn == expected_admin.to_vec());
    assert!(sandbox.balances_of(&[dai(), usdt()], fee_receiver()) == expected_admin.to_vec());
    assert!(pool.admin_balance(0) == Ok(0));
    assert!(pool.admin_balance(1) == Ok(0));
    // admin fees were never part of the reserves
    assert!(pool.reserves() == reserves);
    Ok(())
}

#[test]
fn admin_fees_survive_full_liquidity_exit() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(
        &mut sandbox,
        vec![18, 18],
        20_000,
        40_000_000,
        FEE_DENOM / 2,
    );
    for provider in [bob(), charlie()] {
        add_liquidity(
            &mut sandbox,
            &mut pool,
            provider,
            vec![1_000 * ONE_DAI, 1_000 * ONE_DAI],
        )?;
    }
    sandbox.set_caller(charlie());
    for round in 0..10 {
        let token_in = round % 2;
        pool.swap(
            &mut sandbox.ledger,
            &mut sandbox.env,
            token_in,
            1 - token_in,
            100 * ONE_DAI,
            0,
            NO_DEADLINE,
        )
        .into_anyhow()?;
    }

    let tokens = [dai(), usdt()];
    let admin: Vec<u128> = (0..2)
        .map(|id| pool.admin_balance(id))
        .collect::<Result<_, _>>()
        .into_anyhow()?;
    assert!(admin.iter().all(|&fee| fee > 0));
    let held = sandbox.balances_of(&tokens, base_pool_address());
    for id in 0..2 {
        check!(held[id] == pool.reserves()[id] + admin[id]);
    }

    for provider in [bob(), charlie()] {
        let lp_amount = sandbox.balance_of(base_lp_token(), provider);
        sandbox.set_caller(provider);
        pool.remove_liquidity(
            &mut sandbox.ledger,
            &mut sandbox.env,
            lp_amount,
            vec![0, 0],
            NO_DEADLINE,
        )
        .into_anyhow()?;
    }
    assert!(sandbox.ledger.total_supply(base_lp_token()) == 0);
    assert!(pool.reserves() == vec![0, 0]);
    assert!(sandbox.balances_of(&tokens, base_pool_address()) == admin);

    sandbox.set_caller(fee_receiver());
    let withdrawn = pool
        .withdraw_admin_fees(&mut sandbox.ledger, &mut sandbox.env)
        .into_anyhow()?;
    assert!(withdrawn == admin);
    assert!(sandbox.balances_of(&tokens, fee_receiver()) == admin);
    assert!(sandbox.balances_of(&tokens, base_pool_address()) == vec![0, 0]);
    Ok(())
}

#[test]
fn deadline_is_inclusive() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    add_liquidity(&mut sandbox, &mut pool, bob(), vec![ONE_DAI, ONE_DAI])?;
    sandbox.env.advance_block_timestamp(DAY);
    let now = sandbox.env.block_timestamp();
    assert!(
        pool.swap(&mut sandbox.ledger, &mut sandbox.env, 0, 1, ONE_DAI / 10, 0, now - 1)
            == Err(StablePoolError::DeadlineExpired)
    );
    pool.swap(&mut sandbox.ledger, &mut sandbox.env, 0, 1, ONE_DAI / 10, 0, now)
        .into_anyhow()?;
    Ok(())
}

#[test]
fn pause_is_owner_only_and_idempotent() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    let minted = add_liquidity(&mut sandbox, &mut pool, bob(), vec![ONE_DAI, ONE_DAI])?;

    assert!(pool.pause(&mut sandbox.env) == Err(StablePoolError::Unauthorized));
    sandbox.set_caller(owner());
    pool.pause(&mut sandbox.env).into_anyhow()?;
    pool.pause(&mut sandbox.env).into_anyhow()?;
    let pause_events = sandbox
        .env
        .events()
        .iter()
        .filter(|emitted| matches!(emitted.event, Event::StablePool(StablePoolEvent::Paused { .. })))
        .count();
    assert!(pause_events == 1);

    sandbox.set_caller(bob());
    assert!(
        pool.add_liquidity(
            &mut sandbox.ledger,
            &mut sandbox.env,
            vec![ONE_DAI, ONE_DAI],
            0,
            NO_DEADLINE
        ) == Err(StablePoolError::Paused)
    );
    let returned = pool
        .remove_liquidity(
            &mut sandbox.ledger,
            &mut sandbox.env,
            minted / 2,
            vec![0, 0],
            NO_DEADLINE,
        )
        .into_anyhow()?;
    assert!(returned == vec![ONE_DAI / 2, ONE_DAI / 2]);

    assert!(pool.unpause(&mut sandbox.env) == Err(StablePoolError::Unauthorized));
    sandbox.set_caller(owner());
    pool.unpause(&mut sandbox.env).into_anyhow()?;
    assert!(!pool.is_paused());
    Ok(())
}

#[test]
fn ramp_is_owner_only_and_rate_limited() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    assert!(
        pool.ramp_a(&mut sandbox.env, 100, START + MIN_RAMP_TIME)
            == Err(StablePoolError::Unauthorized)
    );
    sandbox.set_caller(owner());
    pool.ramp_a(&mut sandbox.env, 100, START + MIN_RAMP_TIME)
        .into_anyhow()?;
    sandbox.env.advance_block_timestamp(DAY / 2);
    assert!(
        pool.ramp_a(&mut sandbox.env, 60, START + 2 * MIN_RAMP_TIME)
            == Err(StablePoolError::RampDelayNotElapsed)
    );
    pool.stop_ramp_a(&mut sandbox.env).into_anyhow()?;
    assert!(pool.stop_ramp_a(&mut sandbox.env) == Err(StablePoolError::AlreadyStopped));
    assert!(pool.swap_storage().future_a_time == sandbox.env.block_timestamp());
    Ok(())
}

#[test]
fn failed_withdrawal_changes_nothing() -> anyhow::Result<()> {
    let mut sandbox = Sandbox::new();
    let mut pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    let minted = add_liquidity(&mut sandbox, &mut pool, bob(), vec![ONE_DAI, ONE_DAI])?;

    let tokens = pool.tokens();
    let balances = sandbox.balances_of(&tokens, bob());
    let reserves = pool.reserves();
    let events = sandbox.env.event_count();
    let estimate = pool
        .calculate_token_amount(&sandbox.ledger, &sandbox.env, &[ONE_DAI / 2, 0], false)
        .into_anyhow()?;
    assert!(
        pool.remove_liquidity_imbalance(
            &mut sandbox.ledger,
            &mut sandbox.env,
            vec![ONE_DAI / 2, 0],
            estimate,
            NO_DEADLINE,
        ) == Err(StablePoolError::MaxBurnExceeded)
    );
    check!(sandbox.balances_of(&tokens, bob()) == balances);
    check!(sandbox.balance_of(pool.lp_token(), bob()) == minted);
    check!(sandbox.ledger.total_supply(pool.lp_token()) == minted);
    check!(pool.reserves() == reserves);
    check!(sandbox.env.event_count() == events);

    let burned = pool
        .remove_liquidity_imbalance(
            &mut sandbox.ledger,
            &mut sandbox.env,
            vec![ONE_DAI / 2, 0],
            minted,
            NO_DEADLINE,
        )
        .into_anyhow()?;
    assert!(burned > estimate);
    assert!(sandbox.balances_of(&tokens, bob()) == vec![balances[0] + ONE_DAI / 2, balances[1]]);
    assert!(sandbox.balance_of(pool.lp_token(), bob()) == minted - burned);
    Ok(())
}

#[test]
fn unknown_token_is_reported() {
    let mut sandbox = Sandbox::new();
    let pool = setup_stable_swap(&mut sandbox, vec![18, 18], 5000, 1_000_000, 0);
    assert!(pool.token_index(usdt()) == Ok(1));
    assert!(pool.token_index(account(99)) == Err(StablePoolError::TokenNotFound(account(99))));
    assert!(pool.token(2) == Err(StablePoolError::TokenIndexOutOfRange));
}
