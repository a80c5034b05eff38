//! Hash commitments for HTLC escrows.
//!
//! A commitment is the digest of a 32-byte secret under one of the supported
//! algorithms. Verification is pure and stateless; the secret becomes public
//! the moment a claim reveals it.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use etomic_core::Commitment;

use crate::error::CryptoError;

/// Length of generated secrets.
pub const SECRET_LEN: usize = 32;

/// Hash algorithm a commitment is computed with. The numeric codes are the
/// ones callers pass on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HashAlgorithm {
    /// RIPEMD160 of SHA256 (20 bytes).
    Dhash160,
    /// SHA256 (32 bytes).
    Sha256,
    /// Keccak256 as used by EVM ledgers (32 bytes).
    Keccak256,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [Self::Dhash160, Self::Sha256, Self::Keccak256];

    pub fn code(&self) -> u8 {
        match self {
            Self::Dhash160 => 0,
            Self::Sha256 => 1,
            Self::Keccak256 => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, CryptoError> {
        match code {
            0 => Ok(Self::Dhash160),
            1 => Ok(Self::Sha256),
            2 => Ok(Self::Keccak256),
            other => Err(CryptoError::UnsupportedHashAlgorithm(other)),
        }
    }
}

impl TryFrom<u8> for HashAlgorithm {
    type Error = CryptoError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<HashAlgorithm> for u8 {
    fn from(algorithm: HashAlgorithm) -> Self {
        algorithm.code()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dhash160 => write!(f, "dhash160"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Keccak256 => write!(f, "keccak256"),
        }
    }
}

/// Digest length in bytes.
pub fn digest_len(algorithm: HashAlgorithm) -> usize {
    match algorithm {
        HashAlgorithm::Dhash160 => 20,
        HashAlgorithm::Sha256 | HashAlgorithm::Keccak256 => 32,
    }
}

/// Hash a secret with the given algorithm.
pub fn digest(secret: &[u8], algorithm: HashAlgorithm) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Dhash160 => Ripemd160::digest(Sha256::digest(secret)).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(secret).to_vec(),
        HashAlgorithm::Keccak256 => Keccak256::digest(secret).to_vec(),
    }
}

/// Check a revealed secret against a stored commitment in constant time.
pub fn verify_secret(secret: &[u8], commitment: &Commitment, algorithm: HashAlgorithm) -> bool {
    digest(secret, algorithm)
        .as_slice()
        .ct_eq(commitment.as_bytes())
        .into()
}

/// Reject commitments whose length cannot be a digest of `algorithm`.
pub fn validate_commitment(
    commitment: &Commitment,
    algorithm: HashAlgorithm,
) -> Result<(), CryptoError> {
    let expected = digest_len(algorithm);
    if commitment.len() != expected {
        return Err(CryptoError::InvalidCommitment {
            expected,
            actual: commitment.len(),
        });
    }
    Ok(())
}

/// A swap secret. Zeroized on drop; hex on the wire.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn from_hex(input: &str) -> Result<Self, CryptoError> {
        let trimmed = input.strip_prefix("0x").unwrap_or(input);
        hex::decode(trimmed)
            .map(Self)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid secret hex: {}", e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// Commitment to this secret under `algorithm`.
    pub fn commitment(&self, algorithm: HashAlgorithm) -> Commitment {
        Commitment(digest(&self.0, algorithm))
    }
}

impl TryFrom<String> for Secret {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.to_hex()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes>)", self.0.len())
    }
}

/// Draw a fresh 32-byte secret from OS entropy and commit to it.
pub fn generate_secret(algorithm: HashAlgorithm) -> (Secret, Commitment) {
    let mut bytes = vec![0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    let secret = Secret(bytes);
    let commitment = secret.commitment(algorithm);
    (secret, commitment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hex_of(algorithm: HashAlgorithm, data: &[u8]) -> String {
        hex::encode(digest(data, algorithm))
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            hex_of(HashAlgorithm::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex_of(HashAlgorithm::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex_of(HashAlgorithm::Keccak256, b""),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hex_of(HashAlgorithm::Dhash160, b""),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_dhash160_is_ripemd_of_sha256() {
        let secret = [0x42u8; 32];
        let inner = Sha256::digest(secret);
        let expected = Ripemd160::digest(inner).to_vec();
        assert_eq!(digest(&secret, HashAlgorithm::Dhash160), expected);
    }

    #[test]
    fn test_digest_len_matches_output() {
        for algorithm in HashAlgorithm::ALL {
            assert_eq!(digest(b"x", algorithm).len(), digest_len(algorithm));
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(HashAlgorithm::from_code(0).unwrap(), HashAlgorithm::Dhash160);
        assert_eq!(HashAlgorithm::from_code(1).unwrap(), HashAlgorithm::Sha256);
        assert_eq!(HashAlgorithm::from_code(2).unwrap(), HashAlgorithm::Keccak256);
        assert!(matches!(
            HashAlgorithm::from_code(3),
            Err(CryptoError::UnsupportedHashAlgorithm(3))
        ));
    }

    #[test]
    fn test_algorithm_serde_as_code() {
        assert_eq!(serde_json::to_string(&HashAlgorithm::Keccak256).unwrap(), "2");
        let parsed: HashAlgorithm = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, HashAlgorithm::Dhash160);
        assert!(serde_json::from_str::<HashAlgorithm>("7").is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let (secret, commitment) = generate_secret(HashAlgorithm::Sha256);
        assert!(verify_secret(secret.as_bytes(), &commitment, HashAlgorithm::Sha256));
        assert!(!verify_secret(b"not the secret", &commitment, HashAlgorithm::Sha256));
        assert!(!verify_secret(secret.as_bytes(), &commitment, HashAlgorithm::Keccak256));
    }

    #[test]
    fn test_verify_rejects_truncated_commitment() {
        let (secret, commitment) = generate_secret(HashAlgorithm::Keccak256);
        let truncated = Commitment(commitment.as_bytes()[..20].to_vec());
        assert!(!verify_secret(secret.as_bytes(), &truncated, HashAlgorithm::Keccak256));
    }

    #[test]
    fn test_validate_commitment_length() {
        let twenty = Commitment(vec![0u8; 20]);
        assert!(validate_commitment(&twenty, HashAlgorithm::Dhash160).is_ok());
        assert!(matches!(
            validate_commitment(&twenty, HashAlgorithm::Sha256),
            Err(CryptoError::InvalidCommitment {
                expected: 32,
                actual: 20
            })
        ));
    }

    #[test]
    fn test_generated_secrets_differ() {
        let (a, _) = generate_secret(HashAlgorithm::Dhash160);
        let (b, _) = generate_secret(HashAlgorithm::Dhash160);
        assert_eq!(a.as_bytes().len(), SECRET_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_hex_roundtrip() {
        let (secret, _) = generate_secret(HashAlgorithm::Sha256);
        let parsed = Secret::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(parsed, secret);
        assert!(!format!("{:?}", secret).contains(&secret.to_hex()[2..]));
    }

    proptest! {
        #[test]
        fn prop_secret_verifies_under_its_own_algorithm(
            bytes in proptest::collection::vec(any::<u8>(), 1..64),
            code in 0u8..3,
        ) {
            let algorithm = HashAlgorithm::from_code(code).unwrap();
            let secret = Secret::from_bytes(&bytes);
            let commitment = secret.commitment(algorithm);
            prop_assert!(validate_commitment(&commitment, algorithm).is_ok());
            prop_assert!(verify_secret(&bytes, &commitment, algorithm));

            let mut flipped = bytes.clone();
            flipped[0] ^= 0x01;
            prop_assert!(!verify_secret(&flipped, &commitment, algorithm));
        }
    }
}
