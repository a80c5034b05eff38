use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use etomic_core::ForeignTxRef;

use crate::error::RelayError;

/// What the foreign ledger knows about a transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    NotFound,
}

/// Read-only view of the foreign ledger the relay vouches for.
#[async_trait]
pub trait ForeignLedger: Send + Sync {
    async fn lookup_transaction(&self, reference: &ForeignTxRef) -> Result<Lookup, RelayError>;
}

/// Credentials for the foreign node's RPC interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcAuth {
    pub user: String,
    pub password: String,
}

/// Bitcoin-style JSON-RPC node queried with `getrawtransaction`.
#[derive(Debug, Clone)]
pub struct JsonRpcForeignLedger {
    inner: reqwest::Client,
    url: String,
    auth: Option<RpcAuth>,
}

/// `RPC_INVALID_ADDRESS_OR_KEY`, returned for unknown transaction ids.
const RPC_NOT_FOUND: i64 = -5;

impl JsonRpcForeignLedger {
    pub fn new(
        url: impl Into<String>,
        auth: Option<RpcAuth>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Connection(e.to_string()))?;
        Ok(Self {
            inner,
            url: url.into(),
            auth,
        })
    }

    pub async fn send<Req, Res>(&self, request: Request<Req>) -> Result<Res, RelayError>
    where
        Req: Debug + Serialize,
        Res: DeserializeOwned,
    {
        let mut builder = self.inner.post(&self.url).json(&request);
        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let response: Response<Res> = serde_json::from_str(&body).map_err(|e| {
            RelayError::Protocol(format!(
                "HTTP {} with non JSON-RPC body for {:?}: {}",
                status, request, e
            ))
        })?;

        match (response.result, response.error) {
            (_, Some(error)) => Err(RelayError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RelayError::Protocol(format!(
                "response to {:?} carries neither result nor error",
                request
            ))),
        }
    }
}

#[async_trait]
impl ForeignLedger for JsonRpcForeignLedger {
    async fn lookup_transaction(&self, reference: &ForeignTxRef) -> Result<Lookup, RelayError> {
        let request = Request::new(
            "getrawtransaction",
            (reference.as_str().to_owned(), 1u8),
        );
        match self.send::<_, serde_json::Value>(request).await {
            Ok(_) => Ok(Lookup::Found),
            Err(RelayError::Rpc { code, .. }) if code == RPC_NOT_FOUND => Ok(Lookup::NotFound),
            Err(e) => Err(e),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Request<T> {
    id: String,
    jsonrpc: String,
    method: String,
    params: T,
}

impl<T> Request<T> {
    pub fn new(method: &str, params: T) -> Self {
        Self {
            id: "etomic-relay".to_owned(),
            jsonrpc: "1.0".to_owned(),
            method: method.to_owned(),
            params,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Response<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    code: i64,
    message: String,
}
