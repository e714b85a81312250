//! Services a swap depends on: a transaction source, an inscription indexer
//! and a broadcaster.
//!
//! Builders never perform I/O; callers resolve UTXOs and inscriptions through
//! these traits before building listings and offers.

#[cfg(feature = "http")]
mod http;
mod retry;

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{Address, Network, OutPoint, Transaction, Txid};

#[cfg(feature = "http")]
pub use self::http::{BitcoinRpcClient, EsploraClient, OrdApiClient};
pub use self::retry::{RetryPolicy, Retrying};
use crate::address::parse_address;
use crate::inscription::{Inscription, InscriptionId};
use crate::utxo::{Utxo, UtxoStatus};
use crate::{SwapError, SwapResult};

/// Source of confirmed and mempool transactions.
#[async_trait::async_trait]
pub trait TransactionSource: Send + Sync {
    /// Consensus-encoded transaction, as hex.
    async fn get_raw_transaction(&self, txid: &Txid) -> SwapResult<String>;

    async fn get_transaction_status(&self, txid: &Txid) -> SwapResult<UtxoStatus>;
}

/// Ordinals indexer.
#[async_trait::async_trait]
pub trait InscriptionSource: Send + Sync {
    async fn get_inscription(&self, id: &InscriptionId) -> SwapResult<Inscription>;
}

/// Relays transactions to the network.
#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    /// Broadcasts a hex-encoded transaction and returns its txid.
    async fn send_raw_transaction(&self, tx_hex: &str) -> SwapResult<Txid>;
}

/// Fetches and decodes transaction `txid`.
pub async fn fetch_transaction<S>(source: &S, txid: &Txid) -> SwapResult<Transaction>
where
    S: TransactionSource + ?Sized,
{
    let raw = source.get_raw_transaction(txid).await?;
    let bytes = hex::decode(raw.trim()).map_err(|e| {
        SwapError::InvalidInput(format!("transaction {txid} is not valid hex: {e}"))
    })?;
    let transaction: Transaction = bitcoin::consensus::deserialize(&bytes).map_err(|e| {
        SwapError::InvalidInput(format!("transaction {txid} cannot be decoded: {e}"))
    })?;

    if transaction.txid() != *txid {
        return Err(SwapError::InvalidInput(format!(
            "source returned transaction {} for {txid}",
            transaction.txid()
        )));
    }

    Ok(transaction)
}

/// Resolves `outpoint`, owned by `owner`, into a validated [`Utxo`].
pub async fn resolve_utxo<S>(source: &S, outpoint: OutPoint, owner: &Address) -> SwapResult<Utxo>
where
    S: TransactionSource + ?Sized,
{
    let transaction = fetch_transaction(source, &outpoint.txid).await?;
    let status = source.get_transaction_status(&outpoint.txid).await?;
    debug!("resolved {outpoint}: confirmed {}", status.confirmed);

    Utxo::new(outpoint.txid, outpoint.vout, owner.clone(), status, transaction)
}

/// Looks up inscription `id` and resolves the output holding it.
pub async fn resolve_inscription_utxo<I, S>(
    indexer: &I,
    source: &S,
    id: &InscriptionId,
    network: Network,
) -> SwapResult<(Inscription, Utxo)>
where
    I: InscriptionSource + ?Sized,
    S: TransactionSource + ?Sized,
{
    let inscription = indexer.get_inscription(id).await?;
    if inscription.id != *id {
        return Err(SwapError::InvalidInput(format!(
            "indexer returned inscription {} for {id}",
            inscription.id
        )));
    }

    let owner = parse_address(&inscription.owner, network)?;
    let utxo = resolve_utxo(source, inscription.output, &owner).await?;
    inscription.validate_utxo(&utxo)?;

    Ok((inscription, utxo))
}

/// Broadcasts a finalized transaction.
pub async fn broadcast_transaction<B>(
    broadcaster: &B,
    transaction: &Transaction,
) -> SwapResult<Txid>
where
    B: Broadcaster + ?Sized,
{
    let tx_hex = serialize_hex(transaction);
    debug!("broadcasting tx ({} bytes): {tx_hex}", tx_hex.len() / 2);

    let txid = broadcaster.send_raw_transaction(&tx_hex).await?;
    if txid != transaction.txid() {
        warn!(
            "broadcaster reported txid {txid}, expected {}",
            transaction.txid()
        );
    }
    info!("broadcast transaction {txid}");

    Ok(txid)
}
