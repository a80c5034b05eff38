//! Integration test: dual-timelock swaps (deposit leg + payment leg).

use proptest::prelude::*;

use etomic_core::{Asset, EngineConfig, EscrowError, LegStatus};
use etomic_crypto::{generate_secret, HashAlgorithm, Secret};
use etomic_escrow::{Leg, LegClaimRequest, LegReclaimRequest, LegRequest};
use etomic_integration_tests::*;

const AMOUNT: u128 = 400;

fn leg_request(id: u8) -> (Secret, LegRequest) {
    let (secret, commitment) = generate_secret(HashAlgorithm::Dhash160);
    let request = LegRequest {
        id: swap_id(id),
        counterparty: BOB,
        amount: AMOUNT,
        asset: Asset::Native,
        commitment,
    };
    (secret, request)
}

fn claim(request: &LegRequest, secret: &Secret) -> LegClaimRequest {
    LegClaimRequest {
        id: request.id,
        amount: request.amount,
        secret: secret.clone(),
        asset: request.asset,
        owner: ALICE,
    }
}

fn reclaim(request: &LegRequest) -> LegReclaimRequest {
    LegReclaimRequest {
        id: request.id,
        amount: request.amount,
        commitment: request.commitment.clone(),
        asset: request.asset,
        counterparty: request.counterparty,
    }
}

#[test]
fn test_full_swap_counterparty_claims_both_legs() {
    let fx = Fixture::new();
    let (deposit_secret, deposit) = leg_request(1);
    let (payment_secret, payment) = leg_request(1);

    let made = fx
        .escrow
        .legs
        .make_deposit(&paying(ALICE, AMOUNT), deposit.clone())
        .unwrap();
    assert_eq!(made.lock_expiry, START + 20);

    let made = fx
        .escrow
        .legs
        .make_payment(&paying(ALICE, AMOUNT), payment.clone())
        .unwrap();
    assert_eq!(made.lock_expiry, START + 10);
    assert_eq!(fx.escrowed(Asset::Native), 2 * AMOUNT);

    fx.clock.advance(9);
    fx.escrow
        .legs
        .counterparty_claim(Leg::Payment, &call(BOB), claim(&payment, &payment_secret))
        .unwrap();
    fx.escrow
        .legs
        .counterparty_claim(Leg::Deposit, &call(BOB), claim(&deposit, &deposit_secret))
        .unwrap();

    assert_eq!(fx.native(BOB), FUNDS + 2 * AMOUNT);
    let deposit = fx.escrow.legs.deposit(&swap_id(1)).unwrap().unwrap();
    let payment = fx.escrow.legs.leg_payment(&swap_id(1)).unwrap().unwrap();
    assert_eq!(deposit.status, LegStatus::CounterpartyClaimed);
    assert_eq!(payment.status, LegStatus::CounterpartyClaimed);
}

#[test]
fn test_owner_reclaims_after_each_lock() {
    let fx = Fixture::new();
    let (_, deposit) = leg_request(2);
    let (payment_secret, payment) = leg_request(2);
    fx.escrow
        .legs
        .make(Leg::Deposit, &paying(ALICE, AMOUNT), deposit.clone())
        .unwrap();
    fx.escrow
        .legs
        .make(Leg::Payment, &paying(ALICE, AMOUNT), payment.clone())
        .unwrap();

    // Payment leg: claim closes and reclaim opens at the same instant
    fx.clock.set(START + 10);
    let err = fx
        .escrow
        .legs
        .counterparty_claim(Leg::Payment, &call(BOB), claim(&payment, &payment_secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::Expired { .. }));
    fx.escrow
        .legs
        .owner_reclaim(Leg::Payment, &call(ALICE), reclaim(&payment))
        .unwrap();

    // Deposit leg is still locked
    let err = fx
        .escrow
        .legs
        .owner_reclaim(Leg::Deposit, &call(ALICE), reclaim(&deposit))
        .unwrap_err();
    assert!(matches!(err, EscrowError::NotYetExpired { expiry, .. } if expiry == START + 20));

    fx.clock.set(START + 20);
    let record = fx
        .escrow
        .legs
        .owner_reclaim(Leg::Deposit, &call(ALICE), reclaim(&deposit))
        .unwrap();
    assert_eq!(record.status, LegStatus::OwnerClaimed);
    assert_eq!(fx.native(ALICE), FUNDS);
    assert_eq!(fx.escrowed(Asset::Native), 0);
}

#[test]
fn test_payment_leg_requires_matching_deposit() {
    let fx = Fixture::new();
    let (_, payment) = leg_request(3);

    // No deposit at all
    let err = fx
        .escrow
        .legs
        .make_payment(&paying(ALICE, AMOUNT), payment.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::NotInitialized { .. }));

    let (_, deposit) = leg_request(3);
    fx.escrow
        .legs
        .make_deposit(&paying(ALICE, AMOUNT), deposit)
        .unwrap();

    // Someone else cannot hang a payment leg off Alice's deposit
    let err = fx
        .escrow
        .legs
        .make_payment(&paying(EVE, AMOUNT), payment.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized { caller, .. } if caller == EVE));

    let mut other_counterparty = payment.clone();
    other_counterparty.counterparty = EVE;
    let err = fx
        .escrow
        .legs
        .make_payment(&paying(ALICE, AMOUNT), other_counterparty)
        .unwrap_err();
    assert!(matches!(err, EscrowError::ParameterMismatch { field: "counterparty", .. }));

    assert_eq!(fx.native(EVE), FUNDS);
    assert!(fx.escrow.legs.leg_payment(&swap_id(3)).unwrap().is_none());
}

#[test]
fn test_legs_reject_non_dhash160_commitments() {
    let fx = Fixture::new();
    let (_, commitment) = generate_secret(HashAlgorithm::Sha256);
    let request = LegRequest {
        id: swap_id(4),
        counterparty: BOB,
        amount: AMOUNT,
        asset: Asset::Native,
        commitment,
    };
    let err = fx
        .escrow
        .legs
        .make_deposit(&paying(ALICE, AMOUNT), request)
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidCommitment { expected: 20, actual: 32 }));
    assert_eq!(fx.native(ALICE), FUNDS);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A payment leg is accepted exactly when its claim window, widened by
    /// the safety margin, closes no later than the deposit's.
    #[test]
    fn prop_payment_window_stays_inside_deposit(
        deal_period in 1u64..50,
        margin_fraction in 0u64..=100,
        delay in 0u64..120,
    ) {
        let safety_margin = deal_period * margin_fraction / 100;
        let fx = Fixture::with_config(EngineConfig {
            deal_period,
            safety_margin,
            ..Default::default()
        });
        let (_, deposit) = leg_request(9);
        let (_, payment) = leg_request(9);
        fx.escrow
            .legs
            .make_deposit(&paying(ALICE, AMOUNT), deposit)
            .unwrap();

        fx.clock.advance(delay);
        let result = fx
            .escrow
            .legs
            .make_payment(&paying(ALICE, AMOUNT), payment);

        let payment_lock = START + delay + deal_period;
        let deposit_lock = START + 2 * deal_period;
        if payment_lock + safety_margin <= deposit_lock {
            let record = result.unwrap();
            prop_assert_eq!(record.lock_expiry, payment_lock);
        } else {
            let is_overlap = matches!(result, Err(EscrowError::WindowOverlap { .. }));
            prop_assert!(is_overlap);
            prop_assert_eq!(fx.native(ALICE), FUNDS - AMOUNT);
        }
    }
}
