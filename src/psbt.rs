//! PSBT validation, finalization and extraction shared by sellers and buyers.

mod finalizer;
mod sighash;
mod signature;

use std::str::FromStr;

use bitcoin::psbt::Psbt;
use bitcoin::TxOut;

pub use self::finalizer::{extract_transaction, finalize_input};
pub use self::sighash::{ecdsa_sighash, taproot_sighash, SighashMode};
pub(crate) use self::signature::input_signatures;
pub use self::signature::{check_input_signature, verify_input_signature};
use crate::{SwapError, SwapResult};

/// Encodes a PSBT as base64, the form exchanged between seller and buyer.
pub fn encode_psbt(psbt: &Psbt) -> String {
    psbt.to_string()
}

/// Decodes a base64 PSBT. Unknown and proprietary keys are preserved.
pub fn decode_psbt(base64: &str) -> SwapResult<Psbt> {
    Ok(Psbt::from_str(base64.trim())?)
}

/// Returns the output spent by input `index`.
///
/// The witness UTXO is preferred; otherwise the output is looked up in the
/// full previous transaction, whose txid must match the outpoint.
pub fn spent_output(psbt: &Psbt, index: usize) -> SwapResult<TxOut> {
    let input = psbt.inputs.get(index).ok_or(SwapError::InputNotFound(index))?;
    let txin = psbt
        .unsigned_tx
        .input
        .get(index)
        .ok_or(SwapError::InputNotFound(index))?;

    if let Some(witness_utxo) = &input.witness_utxo {
        return Ok(witness_utxo.clone());
    }

    let previous_tx = input.non_witness_utxo.as_ref().ok_or_else(|| {
        SwapError::InvalidInput(format!("input {index} does not describe its previous output"))
    })?;
    if previous_tx.txid() != txin.previous_output.txid {
        return Err(SwapError::InvalidInput(format!(
            "input {index} previous transaction does not match {}",
            txin.previous_output
        )));
    }

    previous_tx
        .output
        .get(txin.previous_output.vout as usize)
        .cloned()
        .ok_or_else(|| {
            SwapError::InvalidInput(format!("previous output {} not found", txin.previous_output))
        })
}

/// Returns the outputs spent by every input, in input order.
pub fn spent_outputs(psbt: &Psbt) -> SwapResult<Vec<TxOut>> {
    (0..psbt.inputs.len())
        .map(|index| spent_output(psbt, index))
        .collect()
}
