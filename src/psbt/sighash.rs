use bitcoin::hashes::Hash as _;
use bitcoin::psbt::{Psbt, PsbtSighashType};
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::{EcdsaSighashType, TapLeafHash, TapSighashType};

use super::{spent_output, spent_outputs};
use crate::address::ScriptType;
use crate::{SwapError, SwapResult};

/// Which parts of the transaction a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighashMode {
    /// Every input and every output
    All,
    /// The signed input and the output at the same index only
    SinglePlusAnyoneCanPay,
}

impl SighashMode {
    pub fn ecdsa(self) -> EcdsaSighashType {
        match self {
            Self::All => EcdsaSighashType::All,
            Self::SinglePlusAnyoneCanPay => EcdsaSighashType::SinglePlusAnyoneCanPay,
        }
    }

    /// Taproot flavour; `All` is explicit so that signatures carry a sighash byte.
    pub fn taproot(self) -> TapSighashType {
        match self {
            Self::All => TapSighashType::All,
            Self::SinglePlusAnyoneCanPay => TapSighashType::SinglePlusAnyoneCanPay,
        }
    }

    /// Value recorded in the PSBT input sighash field.
    pub fn psbt_sighash_type(self, script_type: ScriptType) -> PsbtSighashType {
        match script_type {
            ScriptType::P2TR => self.taproot().into(),
            ScriptType::P2PKH | ScriptType::P2WPKH => self.ecdsa().into(),
        }
    }

    pub fn from_ecdsa(sighash_type: EcdsaSighashType) -> Option<Self> {
        match sighash_type {
            EcdsaSighashType::All => Some(Self::All),
            EcdsaSighashType::SinglePlusAnyoneCanPay => Some(Self::SinglePlusAnyoneCanPay),
            _ => None,
        }
    }

    pub fn from_taproot(sighash_type: TapSighashType) -> Option<Self> {
        match sighash_type {
            TapSighashType::Default | TapSighashType::All => Some(Self::All),
            TapSighashType::SinglePlusAnyoneCanPay => Some(Self::SinglePlusAnyoneCanPay),
            _ => None,
        }
    }
}

/// Computes the ECDSA sighash of input `index`, legacy or BIP143 depending on
/// the spent script.
pub fn ecdsa_sighash(
    psbt: &Psbt,
    index: usize,
    sighash_type: EcdsaSighashType,
) -> SwapResult<Message> {
    let spent = spent_output(psbt, index)?;
    let mut cache = SighashCache::new(&psbt.unsigned_tx);

    let digest = match &spent.script_pubkey {
        script if script.is_p2wpkh() => cache
            .p2wpkh_signature_hash(index, script, spent.value, sighash_type)?
            .to_byte_array(),
        script if script.is_p2pkh() => cache
            .legacy_signature_hash(index, script, sighash_type.to_u32())?
            .to_byte_array(),
        script => {
            return Err(SwapError::InvalidInput(format!(
                "input {index} spends {script}, which is not signed with ECDSA"
            )))
        }
    };

    Ok(Message::from_digest(digest))
}

/// Computes the BIP341 sighash of input `index`.
///
/// Key-path when `leaf_hash` is `None`, script-path for that leaf otherwise.
/// ANYONECANPAY sighashes only need the output spent by `index`.
pub fn taproot_sighash(
    psbt: &Psbt,
    index: usize,
    sighash_type: TapSighashType,
    leaf_hash: Option<TapLeafHash>,
) -> SwapResult<Message> {
    let anyone_can_pay = matches!(
        sighash_type,
        TapSighashType::AllPlusAnyoneCanPay
            | TapSighashType::NonePlusAnyoneCanPay
            | TapSighashType::SinglePlusAnyoneCanPay
    );

    let all_prevouts;
    let prevouts = if anyone_can_pay {
        Prevouts::One(index, spent_output(psbt, index)?)
    } else {
        all_prevouts = spent_outputs(psbt)?;
        Prevouts::All(all_prevouts.as_slice())
    };

    let mut cache = SighashCache::new(&psbt.unsigned_tx);
    let sighash = match leaf_hash {
        None => cache.taproot_key_spend_signature_hash(index, &prevouts, sighash_type)?,
        Some(leaf_hash) => {
            cache.taproot_script_spend_signature_hash(index, &prevouts, leaf_hash, sighash_type)?
        }
    };

    Ok(Message::from_digest(sighash.to_byte_array()))
}
