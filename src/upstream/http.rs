use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use bitcoin::{BlockHash, Network, Txid};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Broadcaster, InscriptionSource, TransactionSource};
use crate::inscription::{Inscription, InscriptionId};
use crate::utxo::UtxoStatus;
use crate::{SwapError, SwapResult};

/// Maps a transport failure onto the swap error model.
fn transport_error(err: reqwest::Error) -> SwapError {
    SwapError::UpstreamUnavailable(err.to_string())
}

/// Server errors and rate limiting are transient, anything else is a bad request.
async fn check_status(response: Response) -> SwapResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!("upstream replied {status}: {body}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(SwapError::UpstreamUnavailable(format!("{status}: {body}")))
    } else {
        Err(SwapError::InvalidInput(format!("{status}: {body}")))
    }
}

fn parse_txid(txid: &str) -> SwapResult<Txid> {
    Txid::from_str(txid.trim())
        .map_err(|e| SwapError::InvalidInput(format!("invalid txid `{txid}`: {e}")))
}

/// Esplora REST API client, such as the one served by blockstream.info.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    block_height: Option<u32>,
    block_hash: Option<BlockHash>,
    block_time: Option<u64>,
}

impl From<EsploraStatus> for UtxoStatus {
    fn from(status: EsploraStatus) -> Self {
        Self {
            confirmed: status.confirmed,
            block_height: status.block_height,
            block_hash: status.block_hash,
            block_time: status.block_time,
        }
    }
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public blockstream.info instance for `network`.
    pub fn blockstream(network: Network) -> Self {
        let network_str = match network {
            Network::Testnet => "/testnet",
            Network::Regtest => "/regtest",
            Network::Signet => "/signet",
            _ => "",
        };

        Self::new(format!("https://blockstream.info{network_str}/api"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> SwapResult<Response> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        check_status(response).await
    }
}

#[async_trait::async_trait]
impl TransactionSource for EsploraClient {
    async fn get_raw_transaction(&self, txid: &Txid) -> SwapResult<String> {
        self.get(&format!("/tx/{txid}/hex"))
            .await?
            .text()
            .await
            .map_err(transport_error)
    }

    async fn get_transaction_status(&self, txid: &Txid) -> SwapResult<UtxoStatus> {
        let status: EsploraStatus = self
            .get(&format!("/tx/{txid}/status"))
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(status.into())
    }
}

#[async_trait::async_trait]
impl Broadcaster for EsploraClient {
    async fn send_raw_transaction(&self, tx_hex: &str) -> SwapResult<Txid> {
        let url = format!("{}/tx", self.base_url);
        let response = self
            .client
            .post(&url)
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(transport_error)?;

        let txid = check_status(response)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        debug!("txid: {txid}");

        parse_txid(&txid)
    }
}

/// Bitcoin Core JSON-RPC client.
#[derive(Debug)]
pub struct BitcoinRpcClient {
    client: Client,
    url: String,
    auth: Option<(String, String)>,
    id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct VerboseTransaction {
    blockhash: Option<BlockHash>,
    confirmations: Option<u32>,
    blocktime: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    height: u32,
}

impl BitcoinRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            auth: None,
            id: AtomicU64::new(0),
        }
    }

    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> SwapResult<T> {
        let id = self.id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("rpc call {method} ({id})");

        let mut request = self.client.post(&self.url).json(&body);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, Some(password));
        }
        let response = request.send().await.map_err(transport_error)?;

        // bitcoind reports rpc errors with a 500 status and a json body
        let status = response.status();
        let reply: RpcResponse<T> = match response.json().await {
            Ok(reply) => reply,
            Err(e) if status.is_success() => return Err(transport_error(e)),
            Err(_) => {
                return Err(SwapError::UpstreamUnavailable(format!(
                    "{method} failed with status {status}"
                )))
            }
        };

        if let Some(error) = reply.error {
            return Err(SwapError::InvalidInput(format!(
                "{method} failed: {} ({})",
                error.message, error.code
            )));
        }
        reply
            .result
            .ok_or_else(|| SwapError::InvalidInput(format!("{method} returned no result")))
    }
}

#[async_trait::async_trait]
impl TransactionSource for BitcoinRpcClient {
    async fn get_raw_transaction(&self, txid: &Txid) -> SwapResult<String> {
        self.call("getrawtransaction", json!([txid, false])).await
    }

    async fn get_transaction_status(&self, txid: &Txid) -> SwapResult<UtxoStatus> {
        let tx: VerboseTransaction = self.call("getrawtransaction", json!([txid, true])).await?;

        let Some(block_hash) = tx.blockhash.filter(|_| tx.confirmations.unwrap_or(0) > 0) else {
            return Ok(UtxoStatus::default());
        };
        let header: BlockHeader = self.call("getblockheader", json!([block_hash])).await?;

        Ok(UtxoStatus {
            confirmed: true,
            block_height: Some(header.height),
            block_hash: Some(block_hash),
            block_time: tx.blocktime,
        })
    }
}

#[async_trait::async_trait]
impl Broadcaster for BitcoinRpcClient {
    async fn send_raw_transaction(&self, tx_hex: &str) -> SwapResult<Txid> {
        let txid: String = self.call("sendrawtransaction", json!([tx_hex])).await?;
        parse_txid(&txid)
    }
}

/// Client of the `ord` server JSON API.
#[derive(Debug, Clone)]
pub struct OrdApiClient {
    client: Client,
    base_url: String,
}

impl OrdApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl InscriptionSource for OrdApiClient {
    async fn get_inscription(&self, id: &InscriptionId) -> SwapResult<Inscription> {
        let url = format!("{}/inscription/{id}", self.base_url);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }
}
