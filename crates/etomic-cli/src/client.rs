//! HTTP client for the node API and helpers shared by every command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use etomic_core::{Amount, Asset, Commitment, SwapId};
use etomic_crypto::{HashAlgorithm, KeyPair, Operation, Secret, SignedRequest};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9001";

/// Where to reach the node.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// API endpoint of the node.
    #[arg(short, long, global = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

/// Key used to sign the request.
#[derive(Args, Debug, Clone)]
pub struct SignerArgs {
    /// File holding the hex-encoded signing key (see `etomic keygen`).
    #[arg(short, long)]
    pub key: PathBuf,
}

impl SignerArgs {
    pub fn keypair(&self) -> anyhow::Result<KeyPair> {
        load_key(&self.key)
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Record returned by the node together with its id.
#[derive(Debug, Deserialize)]
pub struct RecordResponse<T> {
    pub id: SwapId,
    pub record: T,
}

pub struct NodeClient {
    endpoint: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(args: &NodeArgs) -> Self {
        Self {
            endpoint: args.endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.endpoint, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| self.unreachable())?;
        decode(resp).await
    }

    pub async fn get_query<Q, T>(&self, path: &str, query: &Q) -> anyhow::Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| self.unreachable())?;
        decode(resp).await
    }

    /// Sign `body` for `operation` with `keypair`, attach `value`, and post it.
    pub async fn post_signed<B, T>(
        &self,
        path: &str,
        operation: Operation,
        body: &B,
        value: Amount,
        keypair: &KeyPair,
    ) -> anyhow::Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = SignedRequest::sign(operation, body, value, keypair)?;
        let url = self.url(path);
        tracing::debug!(%url, %operation, caller = %keypair.address(), value, "POST");
        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| self.unreachable())?;
        decode(resp).await
    }

    fn unreachable(&self) -> String {
        format!(
            "could not reach node at {} (is etomic-node running?)",
            self.endpoint
        )
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    match resp.json::<ErrorResponse>().await {
        Ok(err) => anyhow::bail!("request failed (HTTP {}): {}", status, err.error),
        Err(_) => anyhow::bail!("request failed (HTTP {})", status),
    }
}

/// Native value to attach when locking `amount` of `asset`.
pub fn attached_value(asset: &Asset, amount: Amount) -> Amount {
    if asset.is_native() {
        amount
    } else {
        0
    }
}

pub fn load_key(path: &Path) -> anyhow::Result<KeyPair> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    KeyPair::from_hex(contents.trim())
        .map_err(|e| anyhow::anyhow!("invalid key in {}: {}", path.display(), e))
}

pub fn parse_commitment(input: &str) -> Result<Commitment, String> {
    Commitment::from_hex(input).map_err(|e| e.to_string())
}

pub fn parse_secret(input: &str) -> Result<Secret, String> {
    Secret::from_hex(input).map_err(|e| e.to_string())
}

/// Accepts an algorithm name or its wire code.
pub fn parse_algorithm(input: &str) -> Result<HashAlgorithm, String> {
    if let Ok(code) = input.parse::<u8>() {
        return HashAlgorithm::from_code(code).map_err(|e| e.to_string());
    }
    HashAlgorithm::ALL
        .into_iter()
        .find(|alg| alg.to_string().eq_ignore_ascii_case(input))
        .ok_or_else(|| format!("unknown hash algorithm '{}'", input))
}
