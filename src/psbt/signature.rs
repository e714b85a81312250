use bitcoin::psbt::Psbt;
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::taproot::LeafVersion;
use bitcoin::{ecdsa, taproot, PublicKey, Script, TapLeafHash, XOnlyPublicKey};

use super::sighash::{ecdsa_sighash, taproot_sighash, SighashMode};
use super::spent_output;
use crate::address::{pubkey_matches_script, taproot_output_key, ScriptType};
use crate::{SwapError, SwapResult};

/// Length of a `<x-only pubkey> OP_CHECKSIG` tapscript.
const SINGLE_KEY_LEAF_LEN: usize = 34;
const OP_PUSHBYTES_32: u8 = 0x20;
const OP_CHECKSIG: u8 = 0xac;

/// A signature found on a PSBT input, partial or already finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputSignature {
    Ecdsa {
        pubkey: PublicKey,
        signature: ecdsa::Signature,
    },
    TaprootKey(taproot::Signature),
    TaprootScript {
        pubkey: XOnlyPublicKey,
        leaf_hash: TapLeafHash,
        signature: taproot::Signature,
    },
}

impl InputSignature {
    pub(crate) fn sighash_mode(&self) -> Option<SighashMode> {
        match self {
            Self::Ecdsa { signature, .. } => SighashMode::from_ecdsa(signature.hash_ty),
            Self::TaprootKey(signature) | Self::TaprootScript { signature, .. } => {
                SighashMode::from_taproot(signature.hash_ty)
            }
        }
    }

    /// Verifies the signature against the sighash of input `index` spending `script`.
    pub(crate) fn verify(
        &self,
        secp: &Secp256k1<All>,
        psbt: &Psbt,
        index: usize,
        script: &Script,
    ) -> SwapResult<()> {
        match self {
            Self::Ecdsa { pubkey, signature } => {
                if !pubkey_matches_script(pubkey, script) {
                    return Err(SwapError::InvalidInput(format!(
                        "key {pubkey} does not unlock {script}"
                    )));
                }
                let msg = ecdsa_sighash(psbt, index, signature.hash_ty)?;
                secp.verify_ecdsa(&msg, &signature.sig, &pubkey.inner)?;
            }
            Self::TaprootKey(signature) => {
                let output_key = taproot_output_key(script)?;
                let msg = taproot_sighash(psbt, index, signature.hash_ty, None)?;
                secp.verify_schnorr(&signature.sig, &msg, &output_key)?;
            }
            Self::TaprootScript {
                pubkey,
                leaf_hash,
                signature,
            } => {
                let msg = taproot_sighash(psbt, index, signature.hash_ty, Some(*leaf_hash))?;
                secp.verify_schnorr(&signature.sig, &msg, pubkey)?;
            }
        }

        Ok(())
    }
}

/// Collects the signatures carried by input `index`.
///
/// Partial signatures are read first; a finalized input is decoded from its
/// final witness or scriptSig instead.
pub(crate) fn input_signatures(psbt: &Psbt, index: usize) -> SwapResult<Vec<InputSignature>> {
    let input = psbt.inputs.get(index).ok_or(SwapError::InputNotFound(index))?;

    let mut signatures: Vec<InputSignature> = input
        .partial_sigs
        .iter()
        .map(|(pubkey, signature)| InputSignature::Ecdsa {
            pubkey: *pubkey,
            signature: *signature,
        })
        .collect();
    if let Some(signature) = input.tap_key_sig {
        signatures.push(InputSignature::TaprootKey(signature));
    }
    signatures.extend(input.tap_script_sigs.iter().map(|((pubkey, leaf_hash), signature)| {
        InputSignature::TaprootScript {
            pubkey: *pubkey,
            leaf_hash: *leaf_hash,
            signature: *signature,
        }
    }));

    if !signatures.is_empty() {
        return Ok(signatures);
    }

    if input.final_script_witness.is_none() && input.final_script_sig.is_none() {
        return Ok(signatures);
    }

    let spent = spent_output(psbt, index)?;
    final_signature(psbt, index, ScriptType::from_script(&spent.script_pubkey)?)
        .map(|signature| vec![signature])
}

fn final_signature(
    psbt: &Psbt,
    index: usize,
    script_type: ScriptType,
) -> SwapResult<InputSignature> {
    let input = &psbt.inputs[index];
    let malformed = |reason: &str| SwapError::InvalidInput(format!("input {index}: {reason}"));

    match script_type {
        ScriptType::P2PKH => {
            let script_sig = input
                .final_script_sig
                .as_ref()
                .ok_or_else(|| malformed("missing final scriptSig"))?;
            let pushes = script_sig
                .instructions()
                .map(|instruction| match instruction {
                    Ok(Instruction::PushBytes(bytes)) => Ok(bytes.as_bytes().to_vec()),
                    _ => Err(malformed("scriptSig is not push-only")),
                })
                .collect::<SwapResult<Vec<_>>>()?;
            let [signature, pubkey] = pushes.as_slice() else {
                return Err(malformed("scriptSig is not <sig> <pubkey>"));
            };

            ecdsa_signature(signature, pubkey).map_err(|e| malformed(&e.to_string()))
        }
        ScriptType::P2WPKH => {
            let witness = input
                .final_script_witness
                .as_ref()
                .ok_or_else(|| malformed("missing final witness"))?
                .to_vec();
            let [signature, pubkey] = witness.as_slice() else {
                return Err(malformed("witness is not <sig> <pubkey>"));
            };

            ecdsa_signature(signature, pubkey).map_err(|e| malformed(&e.to_string()))
        }
        ScriptType::P2TR => {
            let witness = input
                .final_script_witness
                .as_ref()
                .ok_or_else(|| malformed("missing final witness"))?
                .to_vec();

            match witness.as_slice() {
                [signature] => taproot::Signature::from_slice(signature)
                    .map(InputSignature::TaprootKey)
                    .map_err(|e| malformed(&e.to_string())),
                [signature, script, _control_block] => {
                    let script = Script::from_bytes(script);
                    let pubkey = single_key_leaf(script)
                        .ok_or_else(|| malformed("unsupported tapscript"))?;
                    Ok(InputSignature::TaprootScript {
                        pubkey,
                        leaf_hash: TapLeafHash::from_script(script, LeafVersion::TapScript),
                        signature: taproot::Signature::from_slice(signature)
                            .map_err(|e| malformed(&e.to_string()))?,
                    })
                }
                _ => Err(malformed("unsupported taproot witness")),
            }
        }
    }
}

fn ecdsa_signature(signature: &[u8], pubkey: &[u8]) -> Result<InputSignature, String> {
    Ok(InputSignature::Ecdsa {
        pubkey: PublicKey::from_slice(pubkey).map_err(|e| e.to_string())?,
        signature: ecdsa::Signature::from_slice(signature).map_err(|e| e.to_string())?,
    })
}

/// Key of a `<x-only pubkey> OP_CHECKSIG` leaf script.
pub(crate) fn single_key_leaf(script: &Script) -> Option<XOnlyPublicKey> {
    let bytes = script.as_bytes();
    if bytes.len() != SINGLE_KEY_LEAF_LEN
        || bytes[0] != OP_PUSHBYTES_32
        || bytes[SINGLE_KEY_LEAF_LEN - 1] != OP_CHECKSIG
    {
        return None;
    }

    XOnlyPublicKey::from_slice(&bytes[1..SINGLE_KEY_LEAF_LEN - 1]).ok()
}

/// Verifies every signature on input `index`, requiring that the input spends
/// `expected_script`.
pub fn check_input_signature(
    secp: &Secp256k1<All>,
    psbt: &Psbt,
    index: usize,
    expected_script: &Script,
) -> SwapResult<()> {
    let spent = spent_output(psbt, index)?;
    if spent.script_pubkey.as_script() != expected_script {
        return Err(SwapError::InvalidInput(format!(
            "input {index} spends {}, expected {expected_script}",
            spent.script_pubkey
        )));
    }

    let signatures = input_signatures(psbt, index)?;
    if signatures.is_empty() {
        return Err(SwapError::InvalidInput(format!(
            "input {index} carries no signature"
        )));
    }

    for signature in &signatures {
        signature.verify(secp, psbt, index, expected_script)?;
    }

    Ok(())
}

/// Tells whether input `index` carries only valid signatures over `expected_script`.
pub fn verify_input_signature(
    secp: &Secp256k1<All>,
    psbt: &Psbt,
    index: usize,
    expected_script: &Script,
) -> bool {
    match check_input_signature(secp, psbt, index, expected_script) {
        Ok(()) => true,
        Err(err) => {
            debug!("signature of input {index} rejected: {err}");
            false
        }
    }
}
