use etomic_core::EscrowError;

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("unsupported hash algorithm code: {0}")]
    UnsupportedHashAlgorithm(u8),

    #[error("invalid commitment length: expected {expected}, got {actual}")]
    InvalidCommitment { expected: usize, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request signed for {actual}, not {expected}")]
    OperationMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("request expired at {expires_at} (now {now})")]
    RequestExpired { expires_at: i64, now: i64 },
}

impl From<CryptoError> for EscrowError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedHashAlgorithm(code) => {
                EscrowError::UnsupportedHashAlgorithm(code)
            }
            CryptoError::InvalidCommitment { expected, actual } => {
                EscrowError::InvalidCommitment { expected, actual }
            }
            other => EscrowError::Validation(other.to_string()),
        }
    }
}
