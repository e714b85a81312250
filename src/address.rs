use std::str::FromStr;

use bitcoin::hashes::Hash as _;
use bitcoin::{Address, Network, PublicKey, Script, XOnlyPublicKey};

use crate::{SwapError, SwapResult};

/// Locking script types the swap protocol can spend and pay to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    /// Legacy pay-to-pubkey-hash
    P2PKH,
    /// Segwit v0 pay-to-witness-pubkey-hash
    P2WPKH,
    /// Taproot key-path (and single-key script-path) spends
    P2TR,
}

impl ScriptType {
    /// Classifies a locking script, failing for anything outside P2PKH, P2WPKH and P2TR.
    pub fn from_script(script: &Script) -> SwapResult<Self> {
        if script.is_p2tr() {
            Ok(Self::P2TR)
        } else if script.is_p2wpkh() {
            Ok(Self::P2WPKH)
        } else if script.is_p2pkh() {
            Ok(Self::P2PKH)
        } else {
            Err(SwapError::InvalidInput(format!(
                "unsupported locking script: {script}"
            )))
        }
    }

    pub fn is_segwit(&self) -> bool {
        !matches!(self, Self::P2PKH)
    }
}

/// Decodes `address` and checks it belongs to `network` and to a supported script type.
pub fn parse_address(address: &str, network: Network) -> SwapResult<Address> {
    let address = Address::from_str(address)
        .map_err(|e| SwapError::invalid_address(address, e))?
        .require_network(network)
        .map_err(|e| SwapError::invalid_address(address, e))?;

    ScriptType::from_script(&address.script_pubkey())
        .map_err(|_| SwapError::invalid_address(&address, "unsupported address type"))?;

    Ok(address)
}

/// Tells whether `pubkey` is the key committed to by a P2PKH or P2WPKH script.
pub(crate) fn pubkey_matches_script(pubkey: &PublicKey, script: &Script) -> bool {
    let bytes = script.as_bytes();
    if script.is_p2wpkh() {
        pubkey
            .wpubkey_hash()
            .map_or(false, |hash| bytes[2..22] == hash.to_byte_array())
    } else if script.is_p2pkh() {
        bytes[3..23] == pubkey.pubkey_hash().to_byte_array()
    } else {
        false
    }
}

/// Extracts the tweaked output key of a P2TR script.
pub(crate) fn taproot_output_key(script: &Script) -> SwapResult<XOnlyPublicKey> {
    if !script.is_p2tr() {
        return Err(SwapError::InvalidInput(format!(
            "not a taproot script: {script}"
        )));
    }

    Ok(XOnlyPublicKey::from_slice(&script.as_bytes()[2..34])?)
}
