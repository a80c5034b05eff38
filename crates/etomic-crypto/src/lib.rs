pub mod error;
pub mod hashing;
pub mod keys;
pub mod request;
pub mod signing;

pub use error::CryptoError;
pub use hashing::{
    digest, digest_len, generate_secret, validate_commitment, verify_secret, HashAlgorithm, Secret,
};
pub use keys::{KeyPair, PublicKey};
pub use request::{
    Operation, SignedRequest, DEFAULT_REQUEST_TTL_SECS, MAX_REQUEST_TTL_SECS,
};
pub use signing::{sign, verify, Signature};
