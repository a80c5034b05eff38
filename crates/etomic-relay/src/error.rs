use etomic_core::EscrowError;

/// Relay errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("JSON-RPC request failed with code {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    Protocol(String),

    #[error("engine rejected the request: {0}")]
    Rejected(#[from] EscrowError),

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RelayError::Protocol(err.to_string())
        } else {
            RelayError::Connection(err.to_string())
        }
    }
}
