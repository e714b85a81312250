use bitcoin::psbt::Psbt;
use bitcoin::script::Builder;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::taproot::TapLeafHash;
use bitcoin::{ScriptBuf, Transaction, Witness};

use super::signature::{input_signatures, InputSignature};
use super::spent_output;
use crate::address::{taproot_output_key, ScriptType};
use crate::utils::bytes_to_push_bytes;
use crate::{SwapError, SwapResult};

/// Turns the signature on input `index` into its final scriptSig or witness.
///
/// The first signature that verifies is used. Once finalized, the partial
/// signing fields of the input are cleared. Inputs already finalized are left
/// untouched.
pub fn finalize_input(secp: &Secp256k1<All>, psbt: &mut Psbt, index: usize) -> SwapResult<()> {
    let input = psbt.inputs.get(index).ok_or(SwapError::InputNotFound(index))?;
    if input.final_script_sig.is_some() || input.final_script_witness.is_some() {
        debug!("input {index} is already finalized");
        return Ok(());
    }

    let spent = spent_output(psbt, index).map_err(|e| SwapError::finalization(index, e))?;
    let script_type = ScriptType::from_script(&spent.script_pubkey)
        .map_err(|e| SwapError::finalization(index, e))?;

    let signature = input_signatures(psbt, index)
        .map_err(|e| SwapError::finalization(index, e))?
        .into_iter()
        .find(|signature| {
            match signature.verify(secp, psbt, index, &spent.script_pubkey) {
                Ok(()) => true,
                Err(err) => {
                    warn!("skipping invalid signature on input {index}: {err}");
                    false
                }
            }
        })
        .ok_or_else(|| SwapError::finalization(index, "no valid signature"))?;

    let (script_sig, witness) = match (script_type, signature) {
        (ScriptType::P2PKH, InputSignature::Ecdsa { pubkey, signature }) => {
            let script_sig = Builder::new()
                .push_slice(bytes_to_push_bytes(&signature.to_vec())?)
                .push_key(&pubkey)
                .into_script();
            (Some(script_sig), None)
        }
        (ScriptType::P2WPKH, InputSignature::Ecdsa { pubkey, signature }) => {
            (None, Some(Witness::p2wpkh(&signature, &pubkey.inner)))
        }
        (ScriptType::P2TR, InputSignature::TaprootKey(signature)) => {
            let mut witness = Witness::new();
            witness.push(signature.to_vec());
            (None, Some(witness))
        }
        (
            ScriptType::P2TR,
            InputSignature::TaprootScript {
                leaf_hash,
                signature,
                ..
            },
        ) => {
            let output_key = taproot_output_key(&spent.script_pubkey)?;
            let (control_block, script) = psbt.inputs[index]
                .tap_scripts
                .iter()
                .find(|(_, (script, version))| {
                    TapLeafHash::from_script(script, *version) == leaf_hash
                })
                .map(|(control_block, (script, _))| (control_block, script))
                .ok_or_else(|| SwapError::finalization(index, "missing leaf script"))?;

            if !control_block.verify_taproot_commitment(secp, output_key, script) {
                return Err(SwapError::finalization(
                    index,
                    "control block does not commit to the output key",
                ));
            }

            let mut witness = Witness::new();
            witness.push(signature.to_vec());
            witness.push(script.as_bytes());
            witness.push(control_block.serialize());
            (None, Some(witness))
        }
        (script_type, _) => {
            return Err(SwapError::finalization(
                index,
                format!("signature does not fit a {script_type:?} input"),
            ))
        }
    };

    let input = &mut psbt.inputs[index];
    input.final_script_sig = script_sig;
    input.final_script_witness = witness;
    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();
    input.tap_key_sig = None;
    input.tap_script_sigs.clear();
    input.tap_scripts.clear();
    input.tap_key_origins.clear();
    input.tap_internal_key = None;
    input.tap_merkle_root = None;
    debug!("finalized input {index} ({script_type:?})");

    Ok(())
}

/// Builds the network transaction out of a fully finalized PSBT.
pub fn extract_transaction(psbt: &Psbt) -> SwapResult<Transaction> {
    if psbt.inputs.len() != psbt.unsigned_tx.input.len() {
        return Err(SwapError::InvalidInput(format!(
            "{} PSBT inputs for {} transaction inputs",
            psbt.inputs.len(),
            psbt.unsigned_tx.input.len()
        )));
    }

    let mut transaction = psbt.unsigned_tx.clone();
    for (index, (txin, input)) in transaction.input.iter_mut().zip(&psbt.inputs).enumerate() {
        if input.final_script_sig.is_none() && input.final_script_witness.is_none() {
            return Err(SwapError::IncompleteTransaction(index));
        }
        txin.script_sig = input.final_script_sig.clone().unwrap_or_else(ScriptBuf::new);
        txin.witness = input.final_script_witness.clone().unwrap_or_default();
    }

    Ok(transaction)
}
