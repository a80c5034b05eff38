//! Integration test: hash commitments as the engine checks them.

use proptest::prelude::*;

use etomic_core::Commitment;
use etomic_crypto::{digest, digest_len, validate_commitment, verify_secret, HashAlgorithm, Secret};

fn algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop::sample::select(HashAlgorithm::ALL.to_vec())
}

#[test]
fn test_known_digests() {
    let cases = [
        (
            HashAlgorithm::Sha256,
            b"abc".as_slice(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ),
        (
            HashAlgorithm::Keccak256,
            b"".as_slice(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
        ),
        (
            HashAlgorithm::Dhash160,
            b"".as_slice(),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb",
        ),
    ];
    for (algorithm, input, expected) in cases {
        assert_eq!(hex::encode(digest(input, algorithm)), expected, "{}", algorithm);
    }
}

#[test]
fn test_wire_codes_are_stable() {
    for (code, algorithm) in HashAlgorithm::ALL.into_iter().enumerate() {
        assert_eq!(algorithm.code() as usize, code);
        assert_eq!(HashAlgorithm::from_code(code as u8).unwrap(), algorithm);
    }
    assert!(HashAlgorithm::from_code(3).is_err());
}

proptest! {
    #[test]
    fn prop_secret_opens_its_commitment(
        bytes in prop::collection::vec(any::<u8>(), 1..64),
        algorithm in algorithm(),
    ) {
        let secret = Secret::from_bytes(&bytes);
        let commitment = secret.commitment(algorithm);
        prop_assert_eq!(commitment.len(), digest_len(algorithm));
        prop_assert!(validate_commitment(&commitment, algorithm).is_ok());
        prop_assert!(verify_secret(secret.as_bytes(), &commitment, algorithm));
    }

    #[test]
    fn prop_altered_secret_fails(
        bytes in prop::collection::vec(any::<u8>(), 1..64),
        flip in any::<prop::sample::Index>(),
        algorithm in algorithm(),
    ) {
        let commitment = Commitment::from(digest(&bytes, algorithm));
        let mut altered = bytes.clone();
        let i = flip.index(altered.len());
        altered[i] ^= 0x01;
        prop_assert!(!verify_secret(&altered, &commitment, algorithm));
    }

    #[test]
    fn prop_commitment_does_not_cross_algorithms(
        bytes in prop::collection::vec(any::<u8>(), 1..64),
        first in algorithm(),
        second in algorithm(),
    ) {
        prop_assume!(first != second);
        let commitment = Commitment::from(digest(&bytes, first));
        prop_assert!(!verify_secret(&bytes, &commitment, second));
    }
}
