//! Integration test: relay-approved deals settled by the relay worker
//! against a scripted foreign ledger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use etomic_core::{Asset, EscrowError, ForeignTxRef, RelayDealStatus, SwapId};
use etomic_escrow::{DealRef, ReceiverClaim, RelayDealRequest};
use etomic_integration_tests::*;
use etomic_relay::{ForeignLedger, LocalEngine, Lookup, Relay, RelayConfig, RelayError};

const AMOUNT: u128 = 900;

/// Foreign ledger that knows only the transactions it has been told about.
#[derive(Default)]
struct ScriptedLedger {
    confirmed: Mutex<HashSet<String>>,
}

impl ScriptedLedger {
    fn confirm(&self, reference: &str) {
        self.confirmed.lock().unwrap().insert(reference.to_owned());
    }
}

#[async_trait]
impl ForeignLedger for ScriptedLedger {
    async fn lookup_transaction(&self, reference: &ForeignTxRef) -> Result<Lookup, RelayError> {
        if self.confirmed.lock().unwrap().contains(reference.as_str()) {
            Ok(Lookup::Found)
        } else {
            Ok(Lookup::NotFound)
        }
    }
}

fn relay_for(fx: &Fixture, oracle: Arc<ScriptedLedger>) -> Relay {
    let engine = Arc::new(LocalEngine::new(fx.escrow.clone(), RELAY));
    Relay::new(
        oracle,
        engine.clone(),
        engine,
        RelayConfig {
            poll_interval: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        },
    )
}

fn open_deal(fx: &Fixture, id: SwapId) {
    fx.escrow
        .relay_deals
        .init_deal(
            &paying(ALICE, AMOUNT),
            RelayDealRequest {
                id,
                receiver: BOB,
                amount: AMOUNT,
                asset: Asset::Native,
            },
        )
        .expect("relay deal init should succeed");
}

fn raise(fx: &Fixture, id: SwapId, foreign_tx: &str) {
    fx.escrow
        .relay_deals
        .receiver_claims_payment(
            &call(BOB),
            ReceiverClaim {
                id,
                foreign_tx: ForeignTxRef::new(foreign_tx),
            },
        )
        .expect("receiver claim should succeed");
}

fn status(fx: &Fixture, id: SwapId) -> RelayDealStatus {
    fx.escrow.relay_deals.relay_deal(&id).unwrap().unwrap().status
}

#[tokio::test]
async fn test_relay_approves_once_foreign_tx_appears() {
    let fx = Fixture::new();
    let oracle = Arc::new(ScriptedLedger::default());
    let relay = relay_for(&fx, oracle.clone());
    let id = swap_id(1);
    open_deal(&fx, id);
    raise(&fx, id, "btc-tx-1");

    let report = relay.poll_once().await.unwrap();
    assert!(report.approved.is_empty());
    assert_eq!(report.not_found, 1);
    assert_eq!(status(&fx, id), RelayDealStatus::Initialized);

    oracle.confirm("btc-tx-1");
    let report = relay.poll_once().await.unwrap();
    assert_eq!(report.approved, vec![id]);
    assert_eq!(status(&fx, id), RelayDealStatus::PaidToReceiver);
    assert_eq!(fx.native(BOB), FUNDS + AMOUNT);
    assert!(fx.escrow.relay_deals.pending_approvals().unwrap().is_empty());

    // Nothing left to do
    let report = relay.poll_once().await.unwrap();
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn test_only_relay_may_approve() {
    let fx = Fixture::new();
    let id = swap_id(2);
    open_deal(&fx, id);
    raise(&fx, id, "btc-tx-2");

    for impostor in [ALICE, BOB, EVE] {
        let err = fx
            .escrow
            .relay_deals
            .approve(&call(impostor), DealRef { id })
            .unwrap_err();
        assert!(matches!(err, EscrowError::Unauthorized { .. }));
    }
    assert_eq!(status(&fx, id), RelayDealStatus::Initialized);

    fx.escrow
        .relay_deals
        .approve(&call(RELAY), DealRef { id })
        .unwrap();
    assert_eq!(fx.native(BOB), FUNDS + AMOUNT);
}

#[tokio::test]
async fn test_confirmed_deal_drops_out_of_pending() {
    let fx = Fixture::new();
    let oracle = Arc::new(ScriptedLedger::default());
    oracle.confirm("btc-tx-3");
    let relay = relay_for(&fx, oracle);
    let id = swap_id(3);
    open_deal(&fx, id);
    raise(&fx, id, "btc-tx-3");

    // The initiator settles directly before the relay gets to it
    fx.escrow
        .relay_deals
        .confirm_deal(&call(ALICE), DealRef { id })
        .unwrap();
    assert_eq!(status(&fx, id), RelayDealStatus::PaidToReceiver);

    let report = relay.poll_once().await.unwrap();
    assert!(report.approved.is_empty());
    assert_eq!(fx.native(BOB), FUNDS + AMOUNT);
}

#[tokio::test]
async fn test_expired_claim_is_refunded_not_approved() {
    let fx = Fixture::new();
    let oracle = Arc::new(ScriptedLedger::default());
    oracle.confirm("btc-tx-4");
    let relay = relay_for(&fx, oracle);
    let id = swap_id(4);
    open_deal(&fx, id);
    raise(&fx, id, "btc-tx-4");
    let claim_until = fx
        .escrow
        .relay_deals
        .relay_deal(&id)
        .unwrap()
        .unwrap()
        .claim_until;

    // Refund is not open yet
    let err = fx
        .escrow
        .relay_deals
        .initiator_claims_payment(&call(ALICE), DealRef { id })
        .unwrap_err();
    assert!(matches!(err, EscrowError::NotYetExpired { .. }));

    fx.clock.set(claim_until);
    let report = relay.poll_once().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(report.is_clean());
    assert_eq!(status(&fx, id), RelayDealStatus::Initialized);

    fx.escrow
        .relay_deals
        .initiator_claims_payment(&call(ALICE), DealRef { id })
        .unwrap();
    assert_eq!(status(&fx, id), RelayDealStatus::PaidToInitiator);
    assert_eq!(fx.native(ALICE), FUNDS);
    assert_eq!(fx.native(BOB), FUNDS);
}

#[tokio::test]
async fn test_receiver_can_replace_reference() {
    let fx = Fixture::new();
    let oracle = Arc::new(ScriptedLedger::default());
    oracle.confirm("btc-tx-good");
    let relay = relay_for(&fx, oracle);
    let id = swap_id(5);
    open_deal(&fx, id);

    raise(&fx, id, "btc-tx-typo");
    assert_eq!(relay.poll_once().await.unwrap().not_found, 1);

    raise(&fx, id, "btc-tx-good");
    let pending = fx.escrow.relay_deals.pending_approvals().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].foreign_tx.as_str(), "btc-tx-good");

    assert_eq!(relay.poll_once().await.unwrap().approved, vec![id]);
}

#[tokio::test]
async fn test_run_settles_in_background() {
    let fx = Fixture::new();
    let oracle = Arc::new(ScriptedLedger::default());
    let relay = relay_for(&fx, oracle.clone());
    let id = swap_id(6);
    open_deal(&fx, id);
    raise(&fx, id, "btc-tx-6");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(async move { relay.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(status(&fx, id), RelayDealStatus::Initialized);
    oracle.confirm("btc-tx-6");

    let mut settled = false;
    for _ in 0..100 {
        if status(&fx, id) == RelayDealStatus::PaidToReceiver {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(settled, "relay should approve the deal");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("relay should stop on shutdown")
        .unwrap();
}
