//! Integration test: signed envelopes drive the engine only for the
//! operation they were signed for.

use etomic_core::{Asset, Call};
use etomic_crypto::{
    generate_secret, CryptoError, HashAlgorithm, KeyPair, Operation, SignedRequest,
};
use etomic_escrow::LegRequest;
use etomic_integration_tests::*;

const NOW: i64 = 1_700_000_000;

#[test]
fn test_deposit_envelope_cannot_make_payment_leg() {
    let fx = Fixture::new();
    let alice = KeyPair::from_seed(&[0x0a; 32]);
    fx.ledger.mint(Asset::Native, alice.address(), 1_000).unwrap();

    let (_, commitment) = generate_secret(HashAlgorithm::Sha256);
    let leg = LegRequest {
        id: swap_id(1),
        counterparty: BOB,
        amount: 300,
        asset: Asset::Native,
        commitment,
    };
    let envelope =
        SignedRequest::sign_with(Operation::MakeDeposit, &leg, 300, 1, NOW + 60, &alice).unwrap();

    let (call, request): (Call, LegRequest) = envelope.open(Operation::MakeDeposit, NOW).unwrap();
    fx.escrow.legs.make_deposit(&call, request).unwrap();
    assert_eq!(fx.native(alice.address()), 700);

    let replayed: Result<(Call, LegRequest), _> = envelope.open(Operation::MakeLegPayment, NOW);
    assert!(matches!(replayed, Err(CryptoError::OperationMismatch { .. })));
    assert!(fx.escrow.legs.leg_payment(&leg.id).unwrap().is_none());
    assert_eq!(fx.native(alice.address()), 700);
}

#[test]
fn test_envelope_expires() {
    let alice = KeyPair::from_seed(&[0x0b; 32]);
    let envelope = SignedRequest::sign_with(
        Operation::LedgerApprove,
        &serde_json::json!({"token": TOKEN, "amount": 5}),
        0,
        2,
        NOW,
        &alice,
    )
    .unwrap();
    assert!(envelope
        .open::<serde_json::Value>(Operation::LedgerApprove, NOW)
        .is_ok());
    assert!(matches!(
        envelope.open::<serde_json::Value>(Operation::LedgerApprove, NOW + 1),
        Err(CryptoError::RequestExpired { .. })
    ));
}
