//! Integration test: two-secret deals. Whichever secret is revealed first
//! decides who is paid.

use etomic_core::{Asset, DealStatus, EscrowError};
use etomic_crypto::{generate_secret, HashAlgorithm, Secret};
use etomic_escrow::{CounterpartyDealClaim, DealRequest, InitiatorDealClaim};
use etomic_integration_tests::*;

const AMOUNT: u128 = 750;

struct Deal {
    request: DealRequest,
    initiator_secret: Secret,
    counterparty_secret: Secret,
}

fn open_deal(fx: &Fixture, id: u8, asset: Asset) -> Deal {
    let (initiator_secret, initiator_commitment) = generate_secret(HashAlgorithm::Dhash160);
    let (counterparty_secret, counterparty_commitment) = generate_secret(HashAlgorithm::Dhash160);
    let request = DealRequest {
        id: swap_id(id),
        counterparty: BOB,
        amount: AMOUNT,
        asset,
        initiator_commitment,
        counterparty_commitment,
    };
    let value = if asset.is_native() { AMOUNT } else { 0 };
    let record = fx
        .escrow
        .deals
        .init_deal(&paying(ALICE, value), request.clone())
        .expect("deal init should succeed");
    assert_eq!(record.status, DealStatus::Initialized);
    Deal {
        request,
        initiator_secret,
        counterparty_secret,
    }
}

fn counterparty_claim(deal: &Deal, secret: &Secret) -> CounterpartyDealClaim {
    CounterpartyDealClaim {
        id: deal.request.id,
        amount: deal.request.amount,
        asset: deal.request.asset,
        initiator: ALICE,
        counterparty_commitment: deal.request.counterparty_commitment.clone(),
        secret: secret.clone(),
    }
}

fn initiator_claim(deal: &Deal, secret: &Secret) -> InitiatorDealClaim {
    InitiatorDealClaim {
        id: deal.request.id,
        amount: deal.request.amount,
        asset: deal.request.asset,
        counterparty: BOB,
        initiator_commitment: deal.request.initiator_commitment.clone(),
        secret: secret.clone(),
    }
}

#[test]
fn test_initiator_secret_pays_counterparty() {
    let fx = Fixture::new();
    let deal = open_deal(&fx, 1, Asset::Native);

    let record = fx
        .escrow
        .deals
        .counterparty_claims_deal(&call(BOB), counterparty_claim(&deal, &deal.initiator_secret))
        .unwrap();
    assert_eq!(record.status, DealStatus::PaidToCounterparty);
    assert_eq!(fx.native(BOB), FUNDS + AMOUNT);

    // The other branch is closed for good
    let err = fx
        .escrow
        .deals
        .initiator_claims_deal(&call(ALICE), initiator_claim(&deal, &deal.counterparty_secret))
        .unwrap_err();
    assert!(err.is_status_conflict());
    assert_eq!(fx.native(ALICE), FUNDS - AMOUNT);
}

#[test]
fn test_counterparty_secret_pays_initiator() {
    let fx = Fixture::new();
    let deal = open_deal(&fx, 2, Asset::Native);

    let record = fx
        .escrow
        .deals
        .initiator_claims_deal(&call(ALICE), initiator_claim(&deal, &deal.counterparty_secret))
        .unwrap();
    assert_eq!(record.status, DealStatus::PaidToInitiator);
    assert_eq!(fx.native(ALICE), FUNDS);

    let err = fx
        .escrow
        .deals
        .counterparty_claims_deal(&call(BOB), counterparty_claim(&deal, &deal.initiator_secret))
        .unwrap_err();
    assert!(err.is_status_conflict());
    assert_eq!(fx.native(BOB), FUNDS);
}

#[test]
fn test_each_party_needs_the_other_secret() {
    let fx = Fixture::new();
    let deal = open_deal(&fx, 3, Asset::Native);

    // A party's own secret does not unlock its branch
    let err = fx
        .escrow
        .deals
        .counterparty_claims_deal(&call(BOB), counterparty_claim(&deal, &deal.counterparty_secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidSecret(_)));
    let err = fx
        .escrow
        .deals
        .initiator_claims_deal(&call(ALICE), initiator_claim(&deal, &deal.initiator_secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidSecret(_)));

    // Knowing the secret is not enough without being the party
    let err = fx
        .escrow
        .deals
        .counterparty_claims_deal(&call(EVE), counterparty_claim(&deal, &deal.initiator_secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized { .. }));

    let record = fx.escrow.deals.deal(&deal.request.id).unwrap().unwrap();
    assert_eq!(record.status, DealStatus::Initialized);
    assert_eq!(fx.escrowed(Asset::Native), AMOUNT);
}

#[test]
fn test_deal_has_no_timelock() {
    let fx = Fixture::new();
    let deal = open_deal(&fx, 4, Asset::Native);

    fx.clock.advance(1_000_000);
    fx.escrow
        .deals
        .counterparty_claims_deal(&call(BOB), counterparty_claim(&deal, &deal.initiator_secret))
        .unwrap();
    assert_eq!(fx.native(BOB), FUNDS + AMOUNT);
}

#[test]
fn test_token_deal_and_double_init() {
    let fx = Fixture::new();
    fx.allow(ALICE, AMOUNT);
    let deal = open_deal(&fx, 5, Asset::Token(TOKEN));
    assert_eq!(fx.token(ALICE), FUNDS - AMOUNT);

    fx.allow(ALICE, AMOUNT);
    let err = fx
        .escrow
        .deals
        .init_deal(&call(ALICE), deal.request.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::AlreadyInitialized(_)));
    assert_eq!(fx.token(ALICE), FUNDS - AMOUNT);

    fx.escrow
        .deals
        .initiator_claims_deal(&call(ALICE), initiator_claim(&deal, &deal.counterparty_secret))
        .unwrap();
    assert_eq!(fx.token(ALICE), FUNDS);
}
