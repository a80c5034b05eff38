//! Integration test: single-leg HTLC payments through the engine and the
//! reference ledger.

use etomic_core::{Asset, EscrowError, PaymentStatus};
use etomic_crypto::{generate_secret, HashAlgorithm, Secret};
use etomic_escrow::{PaymentRequest, RefundRequest, SpendRequest};
use etomic_integration_tests::*;

const EXPIRY: u64 = START + 100;

fn pay_request(id: u8, amount: u128, asset: Asset, algorithm: HashAlgorithm) -> (Secret, PaymentRequest) {
    let (secret, commitment) = generate_secret(algorithm);
    let request = PaymentRequest {
        id: swap_id(id),
        receiver: BOB,
        amount,
        asset,
        lock_expiry: EXPIRY,
        algorithm: algorithm.code(),
        commitment,
    };
    (secret, request)
}

fn spend(request: &PaymentRequest, secret: &Secret) -> SpendRequest {
    SpendRequest {
        id: request.id,
        amount: request.amount,
        secret: secret.clone(),
        asset: request.asset,
        sender: ALICE,
    }
}

fn refund(request: &PaymentRequest) -> RefundRequest {
    RefundRequest {
        id: request.id,
        amount: request.amount,
        commitment: request.commitment.clone(),
        asset: request.asset,
        receiver: request.receiver,
    }
}

// =========================================================================
// Happy paths
// =========================================================================

#[test]
fn test_receiver_spends_with_every_algorithm() {
    let fx = Fixture::new();
    for (n, algorithm) in HashAlgorithm::ALL.into_iter().enumerate() {
        let (secret, request) = pay_request(n as u8 + 1, 500, Asset::Native, algorithm);
        fx.escrow
            .payments
            .pay(&paying(ALICE, 500), request.clone())
            .expect("pay should succeed");

        let record = fx
            .escrow
            .payments
            .receiver_spend(&call(BOB), spend(&request, &secret))
            .expect("spend should succeed");
        assert_eq!(record.status, PaymentStatus::ReceiverSpent);
        assert_eq!(record.algorithm, algorithm);
    }
    assert_eq!(fx.native(ALICE), FUNDS - 1_500);
    assert_eq!(fx.native(BOB), FUNDS + 1_500);
    assert_eq!(fx.escrowed(Asset::Native), 0);
}

#[test]
fn test_one_unit_native_payment() {
    let fx = Fixture::new();
    let (secret, commitment) = generate_secret(HashAlgorithm::Sha256);
    let request = PaymentRequest {
        id: swap_id(1),
        receiver: BOB,
        amount: 1,
        asset: Asset::Native,
        lock_expiry: START + 1_000,
        algorithm: HashAlgorithm::Sha256.code(),
        commitment,
    };
    fx.escrow.payments.pay(&paying(ALICE, 1), request.clone()).unwrap();
    assert_eq!(fx.escrowed(Asset::Native), 1);

    let record = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap();
    assert_eq!(record.status, PaymentStatus::ReceiverSpent);
    assert_eq!(fx.native(BOB), FUNDS + 1);
    assert_eq!(fx.escrowed(Asset::Native), 0);

    // Repeating the same spend hits the terminal status
    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::NotInitialized { .. }));
    assert_eq!(fx.native(BOB), FUNDS + 1);
}

#[test]
fn test_token_payment_pulls_allowance() {
    let fx = Fixture::new();
    let asset = Asset::Token(TOKEN);
    let (secret, request) = pay_request(1, 250, asset, HashAlgorithm::Sha256);

    // No allowance yet
    let err = fx.escrow.payments.pay(&call(ALICE), request.clone()).unwrap_err();
    assert!(matches!(err, EscrowError::AssetTransferFailed(_)));
    assert!(fx.escrow.payments.payment(&request.id).unwrap().is_none());

    fx.allow(ALICE, 300);
    // Value attached to a token payment is refused
    let err = fx
        .escrow
        .payments
        .pay(&paying(ALICE, 250), request.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::AmountMismatch { .. }));

    fx.escrow.payments.pay(&call(ALICE), request.clone()).unwrap();
    assert_eq!(fx.token(ALICE), FUNDS - 250);
    assert_eq!(fx.escrowed(asset), 250);
    assert_eq!(
        fx.ledger
            .allowance(TOKEN, ALICE, fx.ledger.escrow_account()),
        50
    );

    fx.escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap();
    assert_eq!(fx.token(BOB), FUNDS + 250);
}

#[test]
fn test_stored_record_wire_form() {
    let fx = Fixture::new();
    let (_, request) = pay_request(1, 10, Asset::Native, HashAlgorithm::Keccak256);
    let record = fx.escrow.payments.pay(&paying(ALICE, 10), request).unwrap();

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["status"], "Sent");
    assert_eq!(json["algorithm"], 2);
    assert_eq!(json["asset"], "native");
}

// =========================================================================
// Exactly one terminal transition
// =========================================================================

#[test]
fn test_double_init_rejected() {
    let fx = Fixture::new();
    let (_, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Dhash160);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();

    let err = fx
        .escrow
        .payments
        .pay(&paying(ALICE, 100), request.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::AlreadyInitialized(id) if id == request.id));
    // The second attempt moved nothing
    assert_eq!(fx.native(ALICE), FUNDS - 100);
    assert_eq!(fx.escrowed(Asset::Native), 100);
}

#[test]
fn test_spend_then_refund_rejected() {
    let fx = Fixture::new();
    let (secret, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Sha256);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();
    fx.escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap();

    fx.clock.set(EXPIRY + 1);
    let err = fx
        .escrow
        .payments
        .sender_refund(&call(ALICE), refund(&request))
        .unwrap_err();
    assert!(err.is_status_conflict());
    assert_eq!(fx.native(ALICE), FUNDS - 100);
}

#[test]
fn test_refund_then_spend_rejected() {
    let fx = Fixture::new();
    let (secret, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Dhash160);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();

    fx.clock.set(EXPIRY);
    let record = fx
        .escrow
        .payments
        .sender_refund(&call(ALICE), refund(&request))
        .unwrap();
    assert_eq!(record.status, PaymentStatus::SenderRefunded);

    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap_err();
    assert!(err.is_status_conflict());
    assert_eq!(fx.native(ALICE), FUNDS);
    assert_eq!(fx.native(BOB), FUNDS);
}

#[test]
fn test_spend_allowed_after_expiry_until_refunded() {
    let fx = Fixture::new();
    let (secret, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Dhash160);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();

    fx.clock.set(EXPIRY + 50);
    fx.escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap();
    assert_eq!(fx.native(BOB), FUNDS + 100);
}

// =========================================================================
// Guards leave the record untouched
// =========================================================================

#[test]
fn test_flipped_parameters_rejected() {
    let fx = Fixture::new();
    let (secret, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Keccak256);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();

    // Wrong secret
    let (other, _) = generate_secret(HashAlgorithm::Keccak256);
    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &other))
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidSecret(_)));

    // Wrong caller
    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(EVE), spend(&request, &secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized { caller, .. } if caller == EVE));

    // Wrong amount
    let mut wrong_amount = spend(&request, &secret);
    wrong_amount.amount = 101;
    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), wrong_amount)
        .unwrap_err();
    assert!(matches!(err, EscrowError::AmountMismatch { expected: 100, actual: 101 }));

    // Wrong sender
    let mut wrong_sender = spend(&request, &secret);
    wrong_sender.sender = EVE;
    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), wrong_sender)
        .unwrap_err();
    assert!(matches!(err, EscrowError::ParameterMismatch { field: "sender", .. }));

    let record = fx.escrow.payments.payment(&request.id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Sent);
    assert_eq!(fx.escrowed(Asset::Native), 100);
    assert_eq!(fx.native(BOB), FUNDS);
}

#[test]
fn test_refund_boundary_at_expiry() {
    let fx = Fixture::new();
    let (_, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Dhash160);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();

    fx.clock.set(EXPIRY - 1);
    let err = fx
        .escrow
        .payments
        .sender_refund(&call(ALICE), refund(&request))
        .unwrap_err();
    assert!(matches!(err, EscrowError::NotYetExpired { now, expiry, .. } if now == EXPIRY - 1 && expiry == EXPIRY));

    // Only the sender may refund, even after expiry
    fx.clock.set(EXPIRY);
    let err = fx
        .escrow
        .payments
        .sender_refund(&call(BOB), refund(&request))
        .unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized { .. }));

    fx.escrow
        .payments
        .sender_refund(&call(ALICE), refund(&request))
        .unwrap();
    assert_eq!(fx.native(ALICE), FUNDS);
}

#[test]
fn test_rejected_payout_keeps_payment_open() {
    let fx = Fixture::new();
    let (secret, request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Sha256);
    fx.escrow.payments.pay(&paying(ALICE, 100), request.clone()).unwrap();

    fx.ledger.set_rejecting(Asset::Native, BOB, true);
    let err = fx
        .escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap_err();
    assert!(matches!(err, EscrowError::AssetTransferFailed(_)));
    let record = fx.escrow.payments.payment(&request.id).unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Sent);

    fx.ledger.set_rejecting(Asset::Native, BOB, false);
    fx.escrow
        .payments
        .receiver_spend(&call(BOB), spend(&request, &secret))
        .unwrap();
    assert_eq!(fx.native(BOB), FUNDS + 100);
}

#[test]
fn test_invalid_inputs_rejected_before_locking() {
    let fx = Fixture::new();
    let (_, mut request) = pay_request(1, 100, Asset::Native, HashAlgorithm::Dhash160);

    // Native value must equal the amount
    let err = fx
        .escrow
        .payments
        .pay(&paying(ALICE, 99), request.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::AmountMismatch { expected: 100, actual: 99 }));

    // Unknown algorithm code
    request.algorithm = 7;
    let err = fx
        .escrow
        .payments
        .pay(&paying(ALICE, 100), request.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::UnsupportedHashAlgorithm(7)));

    // Commitment length must match the algorithm
    request.algorithm = HashAlgorithm::Sha256.code();
    let err = fx
        .escrow
        .payments
        .pay(&paying(ALICE, 100), request.clone())
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidCommitment { expected: 32, actual: 20 }));

    assert!(fx.escrow.payments.payment(&request.id).unwrap().is_none());
    assert_eq!(fx.native(ALICE), FUNDS);
}
