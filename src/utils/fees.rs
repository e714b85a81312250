use bitcoin::{Amount, FeeRate, ScriptBuf, Transaction, Witness};

use crate::address::ScriptType;
use crate::{SwapError, SwapResult};

/// Single ECDSA signature + SIGHASH type size in bytes.
const ECDSA_SIGHASH_SIZE: usize = 72 + 1;
/// Single Schnorr signature + explicit SIGHASH type size for Taproot in bytes.
const SCHNORR_SIGHASH_SIZE: usize = 64 + 1;
/// Compressed public key size in bytes.
const PUBKEY_SIZE: usize = 33;
/// `<sig> <pubkey>` scriptSig of a P2PKH spend, push opcodes included.
const P2PKH_SCRIPT_SIG_SIZE: usize = 1 + ECDSA_SIGHASH_SIZE + 1 + PUBKEY_SIZE;

/// Estimates the virtual size of `transaction` once every input carries the
/// unlocking data of its script type.
///
/// `script_types` must list the script type spent by each input, in input order.
pub fn estimate_vsize(transaction: &Transaction, script_types: &[ScriptType]) -> SwapResult<usize> {
    if transaction.input.len() != script_types.len() {
        return Err(SwapError::InvalidInput(format!(
            "{} inputs but {} script types",
            transaction.input.len(),
            script_types.len()
        )));
    }

    let mut transaction = transaction.clone();
    for (input, script_type) in transaction.input.iter_mut().zip(script_types) {
        match script_type {
            ScriptType::P2PKH => {
                input.script_sig = ScriptBuf::from_bytes(vec![0; P2PKH_SCRIPT_SIG_SIZE]);
                input.witness = Witness::new();
            }
            ScriptType::P2WPKH => {
                input.script_sig = ScriptBuf::new();
                input.witness =
                    Witness::from_slice(&[vec![0; ECDSA_SIGHASH_SIZE], vec![0; PUBKEY_SIZE]]);
            }
            ScriptType::P2TR => {
                input.script_sig = ScriptBuf::new();
                input.witness = Witness::from_slice(&[vec![0; SCHNORR_SIGHASH_SIZE]]);
            }
        }
    }

    Ok(transaction.vsize())
}

/// Fee paid at `fee_rate` by a transaction of `vsize` virtual bytes.
pub fn fee_for_vsize(fee_rate: FeeRate, vsize: usize) -> SwapResult<Amount> {
    fee_rate
        .fee_vb(vsize as u64)
        .ok_or_else(|| SwapError::InvalidInput(format!("fee overflow for {vsize} vbytes")))
}
