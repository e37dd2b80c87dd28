//! Integration Tests
//!
//! End-to-end scenarios driving the wired protocol: deposits, offsets,
//! scale and epoch boundaries, front-end splits and the withdrawal gate.

use crate::constants::lockup::ONE_YEAR_SECONDS;
use crate::constants::stability_pool::SCALE_FACTOR;
use crate::constants::token::ONE;
use crate::errors::FurUsdError;
use crate::math;
use crate::protocol::{GenesisConfig, Protocol};
use crate::types::{Address, AddressBook};
use primitive_types::U256;

const DEPLOY: u64 = 1_000_000;

fn book() -> AddressBook {
    AddressBook {
        stablecoin: [10u8; 32],
        loan_token: [11u8; 32],
        community_issuance: [12u8; 32],
        stability_pool: [13u8; 32],
        trove_manager: [14u8; 32],
        borrower_operations: [15u8; 32],
        active_pool: [16u8; 32],
        default_pool: [17u8; 32],
        coll_surplus_pool: [18u8; 32],
        multisig: [19u8; 32],
    }
}

fn dec(n: u128) -> U256 {
    U256::from(n) * U256::from(ONE)
}

fn alice() -> Address {
    [1u8; 32]
}

fn bob() -> Address {
    [2u8; 32]
}

fn carol() -> Address {
    [3u8; 32]
}

fn frontend() -> Address {
    [5u8; 32]
}

/// Genesis at a FURFI price of 200
fn genesis() -> Protocol {
    Protocol::new(GenesisConfig {
        book: book(),
        deployment_time: DEPLOY,
        initial_price: dec(200),
    })
    .unwrap()
}

/// Fund a user with collateral and open a trove, leaving them holding
/// the drawn FURUSD
fn open_trove(protocol: &mut Protocol, owner: Address, coll: U256, debt: U256) {
    protocol.fund_collateral(owner, coll).unwrap();
    protocol.open_trove(owner, coll, debt).unwrap();
}

fn tm() -> Address {
    book().trove_manager
}

/// a and b within `tol` wei of each other
fn assert_close(a: U256, b: U256, tol: u128) {
    let diff = if a > b { a - b } else { b - a };
    assert!(
        diff <= U256::from(tol),
        "expected {} ~ {} within {} wei, diff {}",
        a,
        b,
        tol,
        diff
    );
}

// ============================================================================
// Core offset scenarios
// ============================================================================

#[test]
fn test_single_depositor_partial_offset() {
    // Alice deposits 1000, one offset of debt 400 / coll 10
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(400));

    protocol
        .provide_to_stability_pool(alice(), dec(1_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(400), dec(10), DEPLOY).unwrap();

    let pool = protocol.stability_pool();
    assert_eq!(pool.total_furusd_deposits(), dec(600));
    // the loss per unit rounds up one wei in the pool's favor
    assert_close(pool.compounded_furusd_deposit(&alice()).unwrap(), dec(600), 2_000);
    assert_eq!(pool.depositor_collateral_gain(&alice()).unwrap(), dec(10));
    assert_close(pool.p(), math::one() * 6u64 / 10u64, 2);
    assert_eq!(pool.current_scale(), 0);
    assert_eq!(pool.current_epoch(), 0);
    assert_eq!(pool.furfi_balance(), dec(10));
}

#[test]
fn test_two_depositors_proportional_gain() {
    // Alice 1000 and Bob 3000, offset debt 400 / coll 10
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(30), dec(3_000));
    open_trove(&mut protocol, carol(), dec(10), dec(400));

    protocol
        .provide_to_stability_pool(alice(), dec(1_000), None, DEPLOY)
        .unwrap();
    protocol
        .provide_to_stability_pool(bob(), dec(3_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(400), dec(10), DEPLOY).unwrap();

    let pool = protocol.stability_pool();
    let alice_gain = pool.depositor_collateral_gain(&alice()).unwrap();
    let bob_gain = pool.depositor_collateral_gain(&bob()).unwrap();
    assert_close(alice_gain, dec(10) / 4u64, 2);
    assert_close(bob_gain, dec(10) * 3u64 / 4u64, 2);

    assert_close(pool.compounded_furusd_deposit(&alice()).unwrap(), dec(900), 4_100);
    assert_close(pool.compounded_furusd_deposit(&bob()).unwrap(), dec(2_700), 12_100);
    assert_eq!(pool.total_furusd_deposits(), dec(3_600));
}

#[test]
fn test_full_depletion_then_redeposit() {
    // a full offset wipes the deposit, pays the gain, bumps the epoch
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_500));
    open_trove(&mut protocol, carol(), dec(10), dec(1_000));

    protocol
        .provide_to_stability_pool(alice(), dec(1_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(1_000), dec(5), DEPLOY).unwrap();

    {
        let pool = protocol.stability_pool();
        assert!(pool.compounded_furusd_deposit(&alice()).unwrap().is_zero());
        assert_eq!(pool.depositor_collateral_gain(&alice()).unwrap(), dec(5));
        assert_eq!(pool.current_epoch(), 1);
        assert_eq!(pool.current_scale(), 0);
        assert_eq!(pool.p(), math::one());
        assert!(pool.total_furusd_deposits().is_zero());
    }

    // redeposit: the pre-depletion gain is paid out at the provide call
    protocol
        .provide_to_stability_pool(alice(), dec(500), None, DEPLOY)
        .unwrap();

    let pool = protocol.stability_pool();
    assert_eq!(pool.compounded_furusd_deposit(&alice()).unwrap(), dec(500));
    assert!(pool.depositor_collateral_gain(&alice()).unwrap().is_zero());
    assert_eq!(protocol.collateral().balance_of(&alice()), dec(5));
}

#[test]
fn test_scale_boundary_crossing() {
    // a deposit made late in scale 0 spans exactly one scale
    // boundary; its compounded value and its two-term gain stay correct
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(100), dec(10_000));
    open_trove(&mut protocol, bob(), dec(100), dec(10_000));

    // alice absorbs an offset that grinds P down to ~2e9, near the
    // bottom of scale 0 but not across it
    protocol
        .provide_to_stability_pool(alice(), dec(10_000), None, DEPLOY)
        .unwrap();
    let residue = U256::from(20_000_000_000_000u64); // 2e13 wei stays behind
    protocol
        .offset(tm(), dec(10_000) - residue, dec(10), DEPLOY)
        .unwrap();
    assert_eq!(protocol.stability_pool().current_scale(), 0);
    assert!(protocol.stability_pool().p() < U256::from(3_000_000_000u64));

    // bob deposits at the low P, then a 60% offset pushes P across the
    // boundary exactly once
    protocol
        .provide_to_stability_pool(bob(), dec(10_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(6_000), dec(12), DEPLOY).unwrap();

    {
        let pool = protocol.stability_pool();
        assert_eq!(pool.current_scale(), 1);
        assert_eq!(pool.current_epoch(), 0);
        assert!(pool.p() >= U256::from(SCALE_FACTOR));
        // bob keeps ~40% across the boundary
        assert_close(
            pool.compounded_furusd_deposit(&bob()).unwrap(),
            dec(4_000),
            1_000_000_000_000_000,
        );
        assert_close(pool.depositor_collateral_gain(&bob()).unwrap(), dec(12), 1_000_000_000_000);
    }

    // a further offset lands in scale 1; bob's gain picks it up through
    // the second portion of the two-term formula
    protocol.offset(tm(), dec(1_000), dec(2), DEPLOY).unwrap();

    let pool = protocol.stability_pool();
    assert_eq!(pool.current_scale(), 1);
    assert_close(pool.depositor_collateral_gain(&bob()).unwrap(), dec(14), 1_000_000_000_000);
    assert_close(
        pool.compounded_furusd_deposit(&bob()).unwrap(),
        dec(3_000),
        1_000_000_000_000_000,
    );
}

#[test]
fn test_front_end_split() {
    // 80% kickback; LOAN issuance splits 80/20 between Alice and F
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));

    protocol
        .register_front_end(frontend(), dec(8) / 10u64)
        .unwrap();
    protocol
        .provide_to_stability_pool(alice(), dec(1_000), Some(frontend()), DEPLOY)
        .unwrap();

    // a day of issuance accrues, then a gains-only withdrawal pays out
    let later = DEPLOY + 24 * 60 * 60;
    protocol
        .withdraw_from_stability_pool(alice(), U256::zero(), later)
        .unwrap();

    let issued = protocol.issuance().total_loan_issued();
    assert!(!issued.is_zero());

    // G advances in per-unit steps, so payouts sit within a thousand wei
    let alice_loan = protocol.loan().balance_of(&alice());
    let frontend_loan = protocol.loan().balance_of(&frontend());
    assert_close(alice_loan, issued * 8u64 / 10u64, 2_000);
    assert_close(frontend_loan, issued * 2u64 / 10u64, 2_000);
    assert_close(alice_loan + frontend_loan, issued, 2_000);
}

#[test]
fn test_withdraw_blocked_by_undercollateralized_trove() {
    // a trove under MCR blocks principal withdrawals but not
    // gains-only calls
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(1_500));

    protocol
        .provide_to_stability_pool(alice(), dec(500), None, DEPLOY)
        .unwrap();

    // at price 150, bob's ICR is 1.0 < MCR
    protocol.set_price(dec(150));

    let before = protocol.clone();
    let err = protocol.withdraw_from_stability_pool(alice(), dec(100), DEPLOY);
    assert!(matches!(
        err,
        Err(FurUsdError::UnderCollateralizedTrovePresent)
    ));
    assert_eq!(protocol, before);

    // zero-amount withdrawal skips the gate
    protocol
        .withdraw_from_stability_pool(alice(), U256::zero(), DEPLOY)
        .unwrap();
    assert_eq!(
        protocol
            .stability_pool()
            .compounded_furusd_deposit(&alice())
            .unwrap(),
        dec(500)
    );
}

// ============================================================================
// Further flows
// ============================================================================

#[test]
fn test_zero_amount_provide_rejected_without_state_change() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));

    let before = protocol.clone();
    let err = protocol.provide_to_stability_pool(alice(), U256::zero(), None, DEPLOY);
    assert_eq!(err, Err(FurUsdError::ZeroAmount));
    assert_eq!(protocol, before);
}

#[test]
fn test_front_end_cannot_deposit_and_tag_must_exist() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));

    let err = protocol.provide_to_stability_pool(alice(), dec(100), Some([9u8; 32]), DEPLOY);
    assert!(matches!(err, Err(FurUsdError::FrontEndNotRegistered { .. })));

    protocol.register_front_end(frontend(), dec(1) / 2u64).unwrap();

    // the front end opens a trove and tries to deposit its own funds
    open_trove(&mut protocol, frontend(), dec(10), dec(1_000));
    let err = protocol.provide_to_stability_pool(frontend(), dec(100), None, DEPLOY);
    assert!(matches!(err, Err(FurUsdError::CallerIsFrontEnd { .. })));

    // a depositor cannot later register as a front end
    protocol
        .provide_to_stability_pool(alice(), dec(100), Some(frontend()), DEPLOY)
        .unwrap();
    let err = protocol.register_front_end(alice(), dec(1) / 2u64);
    assert!(matches!(err, Err(FurUsdError::DepositorHasDeposit { .. })));
}

#[test]
fn test_partial_withdrawal_caps_at_compounded() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(400));

    protocol
        .provide_to_stability_pool(alice(), dec(1_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(400), dec(10), DEPLOY).unwrap();

    // ask for more than the compounded deposit: only the compounded
    // amount comes back
    let balance_before = protocol.stablecoin().balance_of(&alice());
    protocol
        .withdraw_from_stability_pool(alice(), dec(10_000), DEPLOY)
        .unwrap();

    let received = protocol.stablecoin().balance_of(&alice()) - balance_before;
    assert_close(received, dec(600), 2_000);

    let pool = protocol.stability_pool();
    assert!(pool.deposit(&alice()).is_none());
    assert!(pool.total_furusd_deposits() < U256::from(2_000u64));
    // the collateral gain was paid alongside
    assert_eq!(protocol.collateral().balance_of(&alice()), dec(10));
}

#[test]
fn test_withdraw_gain_to_trove() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(400));

    protocol
        .provide_to_stability_pool(alice(), dec(1_000), None, DEPLOY)
        .unwrap();

    // no gain yet: the reroute refuses
    let err = protocol.withdraw_furfi_gain_to_trove(alice(), [0u8; 32], [0u8; 32], DEPLOY);
    assert!(matches!(err, Err(FurUsdError::NoCollateralGain { .. })));

    protocol.offset(tm(), dec(400), dec(10), DEPLOY).unwrap();

    let coll_before = protocol.trove(&alice()).unwrap().collateral;
    protocol
        .withdraw_furfi_gain_to_trove(alice(), [0u8; 32], [0u8; 32], DEPLOY)
        .unwrap();

    let trove = protocol.trove(&alice()).unwrap();
    assert_eq!(trove.collateral - coll_before, dec(10));
    // principal stayed compounded in the pool
    assert_close(
        protocol
            .stability_pool()
            .compounded_furusd_deposit(&alice())
            .unwrap(),
        dec(600),
        2_000,
    );
    assert!(protocol
        .stability_pool()
        .depositor_collateral_gain(&alice())
        .unwrap()
        .is_zero());
    assert!(protocol.stability_pool().furfi_balance().is_zero());
}

#[test]
fn test_liquidation_splits_between_pool_and_redistribution() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(1_500));

    protocol
        .provide_to_stability_pool(alice(), dec(900), None, DEPLOY)
        .unwrap();

    // bob goes under water at price 150
    protocol.set_price(dec(150));
    protocol.liquidate(bob(), DEPLOY).unwrap();

    // 900 of bob's 1500 debt offset against the pool, 600 redistributed
    let pool = protocol.stability_pool();
    assert!(pool.total_furusd_deposits().is_zero());
    assert_eq!(pool.current_epoch(), 1);
    assert_eq!(protocol.default_pool().furusd_debt(), dec(600));
    // collateral split 6:4 along the debt split
    assert_eq!(pool.furfi_balance(), dec(6));
    assert_eq!(protocol.default_pool().furfi(), dec(4));
    assert!(!protocol.trove(&bob()).unwrap().is_active());
}

#[test]
fn test_offset_is_noop_on_empty_pool_and_asserts_bounds() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));

    // empty pool: no-op
    protocol.offset(tm(), dec(100), dec(1), DEPLOY).unwrap();
    assert_eq!(protocol.stability_pool().p(), math::one());

    protocol
        .provide_to_stability_pool(alice(), dec(500), None, DEPLOY)
        .unwrap();

    // zero debt: no-op
    protocol.offset(tm(), U256::zero(), dec(1), DEPLOY).unwrap();
    assert_eq!(protocol.stability_pool().total_furusd_deposits(), dec(500));

    // over-offset is an invariant breach and rolls back
    let before = protocol.clone();
    let err = protocol.offset(tm(), dec(501), dec(1), DEPLOY);
    assert!(matches!(err, Err(FurUsdError::InvariantBreached { .. })));
    assert_eq!(protocol, before);
}

#[test]
fn test_stale_epoch_deposit_earns_nothing_further() {
    // gains freeze at their pre-depletion values once the epoch turns,
    // and nothing accrues to the stale position afterwards
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(30), dec(3_000));
    open_trove(&mut protocol, carol(), dec(10), dec(1_000));

    protocol
        .provide_to_stability_pool(alice(), dec(1_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(1_000), dec(5), DEPLOY).unwrap();

    let frozen_gain = protocol
        .stability_pool()
        .depositor_collateral_gain(&alice())
        .unwrap();
    assert_eq!(frozen_gain, dec(5));

    // a new epoch's worth of activity: bob deposits and suffers an offset
    protocol
        .provide_to_stability_pool(bob(), dec(2_000), None, DEPLOY)
        .unwrap();
    protocol.offset(tm(), dec(500), dec(8), DEPLOY).unwrap();

    let pool = protocol.stability_pool();
    // alice's stale position: compounded zero, gain unchanged
    assert!(pool.compounded_furusd_deposit(&alice()).unwrap().is_zero());
    assert_eq!(pool.depositor_collateral_gain(&alice()).unwrap(), dec(5));
    assert!(pool.depositor_loan_gain(&alice()).unwrap().is_zero());
    // bob's fresh position carries the new epoch's gain
    assert_eq!(pool.depositor_collateral_gain(&bob()).unwrap(), dec(8));
}

#[test]
fn test_loan_vesting_flow() {
    // multisig funds a lock during year one; the beneficiary collects
    // after the cliff
    let mut protocol = genesis();
    let unlock = DEPLOY + ONE_YEAR_SECONDS;

    let lock = protocol
        .deploy_vesting_lock(book().multisig, carol(), unlock)
        .unwrap();
    protocol
        .transfer_loan(book().multisig, lock, dec(1_000), DEPLOY + 10)
        .unwrap();

    let err = protocol.withdraw_from_lock(carol(), lock, unlock - 1);
    assert!(matches!(err, Err(FurUsdError::VestingNotDue { .. })));

    let amount = protocol.withdraw_from_lock(carol(), lock, unlock).unwrap();
    assert_eq!(amount, dec(1_000));
    assert_eq!(protocol.loan().balance_of(&carol()), dec(1_000));
}

#[test]
fn test_error_feedback_reclaims_lost_precision() {
    // three deposits of 1, offset by amounts that do not divide evenly;
    // the correction terms keep cumulative drift within wei
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(1_000));
    open_trove(&mut protocol, carol(), dec(10), dec(1_000));

    for user in [alice(), bob(), carol()] {
        protocol
            .provide_to_stability_pool(user, dec(1), None, DEPLOY)
            .unwrap();
    }

    for _ in 0..5 {
        protocol
            .offset(tm(), U256::from(ONE) / 7u64, U256::from(ONE) / 11u64, DEPLOY)
            .unwrap();
    }

    let pool = protocol.stability_pool();
    let sum: U256 = [alice(), bob(), carol()]
        .iter()
        .map(|u| pool.compounded_furusd_deposit(u).unwrap())
        .fold(U256::zero(), |acc, x| acc + x);
    assert!(sum <= pool.total_furusd_deposits());
    assert_close(sum, pool.total_furusd_deposits(), 100);

    let gain_sum: U256 = [alice(), bob(), carol()]
        .iter()
        .map(|u| pool.depositor_collateral_gain(u).unwrap())
        .fold(U256::zero(), |acc, x| acc + x);
    assert!(gain_sum <= pool.furfi_balance());
    assert_close(gain_sum, pool.furfi_balance(), 100);
}

#[test]
fn test_front_end_stake_tracks_tagged_deposits() {
    let mut protocol = genesis();
    open_trove(&mut protocol, alice(), dec(10), dec(1_000));
    open_trove(&mut protocol, bob(), dec(10), dec(1_000));
    open_trove(&mut protocol, carol(), dec(10), dec(500));

    protocol.register_front_end(frontend(), dec(9) / 10u64).unwrap();
    protocol
        .provide_to_stability_pool(alice(), dec(400), Some(frontend()), DEPLOY)
        .unwrap();
    protocol
        .provide_to_stability_pool(bob(), dec(600), Some(frontend()), DEPLOY)
        .unwrap();

    assert_eq!(
        protocol.stability_pool().front_end_stake(&frontend()),
        dec(1_000)
    );

    protocol.offset(tm(), dec(500), dec(10), DEPLOY).unwrap();

    let pool = protocol.stability_pool();
    let tagged_sum = pool.compounded_furusd_deposit(&alice()).unwrap()
        + pool.compounded_furusd_deposit(&bob()).unwrap();
    let fe_stake = pool.compounded_front_end_stake(&frontend()).unwrap();
    assert_close(fe_stake, tagged_sum, 10_000);
}
