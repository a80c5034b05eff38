//! Signed request envelopes.
//!
//! Every mutating call to the node carries the caller's public key, the
//! operation it authorizes, a nonce, an expiry, the native value attached to
//! the call, and the JSON body of the operation. The signature covers all of
//! them together with the exact body text, so an envelope is only good for
//! the one operation it names and only until it expires.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use etomic_core::{Address, Amount, Call};

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};
use crate::signing::{sign, verify, Signature};

const DOMAIN: &[u8] = b"etomic-request-v2";

/// How long a freshly signed request stays valid, in seconds.
pub const DEFAULT_REQUEST_TTL_SECS: i64 = 300;

/// Longest validity a node accepts, in seconds.
pub const MAX_REQUEST_TTL_SECS: i64 = 600;

/// The operation a signed request authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Pay,
    SpendPayment,
    RefundPayment,
    MakeDeposit,
    ClaimDeposit,
    ReclaimDeposit,
    MakeLegPayment,
    ClaimLegPayment,
    ReclaimLegPayment,
    InitDeal,
    CounterpartyClaimDeal,
    InitiatorClaimDeal,
    InitRelayDeal,
    ConfirmRelayDeal,
    ClaimRelayDeal,
    ApproveRelayDeal,
    RefundRelayDeal,
    LedgerApprove,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Pay => "pay",
            Operation::SpendPayment => "spend_payment",
            Operation::RefundPayment => "refund_payment",
            Operation::MakeDeposit => "make_deposit",
            Operation::ClaimDeposit => "claim_deposit",
            Operation::ReclaimDeposit => "reclaim_deposit",
            Operation::MakeLegPayment => "make_leg_payment",
            Operation::ClaimLegPayment => "claim_leg_payment",
            Operation::ReclaimLegPayment => "reclaim_leg_payment",
            Operation::InitDeal => "init_deal",
            Operation::CounterpartyClaimDeal => "counterparty_claim_deal",
            Operation::InitiatorClaimDeal => "initiator_claim_deal",
            Operation::InitRelayDeal => "init_relay_deal",
            Operation::ConfirmRelayDeal => "confirm_relay_deal",
            Operation::ClaimRelayDeal => "claim_relay_deal",
            Operation::ApproveRelayDeal => "approve_relay_deal",
            Operation::RefundRelayDeal => "refund_relay_deal",
            Operation::LedgerApprove => "ledger_approve",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request authenticated by an ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Hex-encoded ed25519 public key of the caller.
    pub public_key: String,
    /// Hex-encoded signature over [`SignedRequest::message`].
    pub signature: String,
    /// Operation this request authorizes.
    pub operation: Operation,
    /// Caller-chosen number, never accepted twice from the same key.
    pub nonce: u64,
    /// Unix seconds after which the request is refused.
    pub expires_at: i64,
    /// Native value attached to the call.
    #[serde(default)]
    pub value: Amount,
    /// JSON text of the operation's parameters.
    pub body: String,
}

impl SignedRequest {
    /// Bytes covered by the signature.
    pub fn message(
        operation: Operation,
        nonce: u64,
        expires_at: i64,
        value: Amount,
        body: &str,
    ) -> Vec<u8> {
        let header = format!(
            "{}\n{}\n{}\n{}\n",
            operation.as_str(),
            nonce,
            expires_at,
            value
        );
        let mut message = Vec::with_capacity(DOMAIN.len() + 1 + header.len() + body.len());
        message.extend_from_slice(DOMAIN);
        message.push(b'\n');
        message.extend_from_slice(header.as_bytes());
        message.extend_from_slice(body.as_bytes());
        message
    }

    /// Sign `body` for `operation` with a random nonce and the default
    /// validity.
    pub fn sign<T: Serialize>(
        operation: Operation,
        body: &T,
        value: Amount,
        keypair: &KeyPair,
    ) -> Result<Self, CryptoError> {
        let expires_at = chrono::Utc::now().timestamp() + DEFAULT_REQUEST_TTL_SECS;
        Self::sign_with(operation, body, value, rand::random(), expires_at, keypair)
    }

    /// Sign `body` for `operation` with an explicit nonce and expiry.
    pub fn sign_with<T: Serialize>(
        operation: Operation,
        body: &T,
        value: Amount,
        nonce: u64,
        expires_at: i64,
        keypair: &KeyPair,
    ) -> Result<Self, CryptoError> {
        let body = serde_json::to_string(body)
            .map_err(|e| CryptoError::InvalidInput(format!("unserializable body: {}", e)))?;
        let message = Self::message(operation, nonce, expires_at, value, &body);
        let signature = sign(&message, keypair);
        Ok(Self {
            public_key: keypair.public_key().to_hex(),
            signature: signature.to_hex(),
            operation,
            nonce,
            expires_at,
            value,
            body,
        })
    }

    /// Check the signature and return the caller's address.
    pub fn verify(&self) -> Result<Address, CryptoError> {
        let public_key = PublicKey::from_hex(&self.public_key)?;
        let signature = Signature::from_hex(&self.signature)?;
        let message = Self::message(
            self.operation,
            self.nonce,
            self.expires_at,
            self.value,
            &self.body,
        );
        verify(&message, &signature, &public_key)?;
        Ok(public_key.address())
    }

    /// Verify the request for `expected` at unix time `now` and decode its
    /// body into the operation's parameters.
    ///
    /// Nonce bookkeeping is left to the receiver.
    pub fn open<T: DeserializeOwned>(
        &self,
        expected: Operation,
        now: i64,
    ) -> Result<(Call, T), CryptoError> {
        let caller = self.verify()?;
        if self.operation != expected {
            return Err(CryptoError::OperationMismatch {
                expected: expected.as_str(),
                actual: self.operation.as_str(),
            });
        }
        if self.expires_at < now {
            return Err(CryptoError::RequestExpired {
                expires_at: self.expires_at,
                now,
            });
        }
        if self.expires_at > now.saturating_add(MAX_REQUEST_TTL_SECS) {
            return Err(CryptoError::InvalidInput(format!(
                "expiry {} is more than {}s ahead",
                self.expires_at, MAX_REQUEST_TTL_SECS
            )));
        }
        let body = serde_json::from_str(&self.body)
            .map_err(|e| CryptoError::InvalidInput(format!("malformed request body: {}", e)))?;
        Ok((Call::new(caller).with_value(self.value), body))
    }
}
