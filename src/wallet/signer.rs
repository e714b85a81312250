use bitcoin::key::TapTweak as _;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::schnorr::Signature as SchnorrSignature;
use bitcoin::secp256k1::{All, Keypair, Message, Secp256k1};
use bitcoin::{ecdsa, taproot, PrivateKey, PublicKey, Script, XOnlyPublicKey};

use crate::address::{pubkey_matches_script, taproot_output_key, ScriptType};
use crate::psbt::{ecdsa_sighash, spent_output, taproot_sighash, SighashMode};
use crate::{SwapError, SwapResult};

/// A single-key wallet signing PSBT inputs.
///
/// The curve context is owned by the caller and shared by reference; the
/// private key never leaves the wallet.
pub struct Wallet<'a> {
    secp: &'a Secp256k1<All>,
    private_key: PrivateKey,
}

impl<'a> Wallet<'a> {
    pub fn new(secp: &'a Secp256k1<All>, private_key: PrivateKey) -> Self {
        Self { secp, private_key }
    }

    pub fn secp(&self) -> &'a Secp256k1<All> {
        self.secp
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key(self.secp)
    }

    /// Untweaked x-only key, the taproot internal key of this wallet.
    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.private_key.inner.x_only_public_key(self.secp).0
    }

    /// Signs input `index` of `psbt` and stores the partial signature on it.
    ///
    /// ECDSA signatures go to `partial_sigs` for P2PKH and P2WPKH inputs;
    /// taproot inputs get a key-path Schnorr signature in `tap_key_sig`.
    /// Fails with [`SwapError::KeyMismatch`] when the key does not control the input.
    pub fn sign_input(&self, psbt: &mut Psbt, index: usize, mode: SighashMode) -> SwapResult<()> {
        let spent = spent_output(psbt, index)?;
        let script_type = ScriptType::from_script(&spent.script_pubkey)?;

        match script_type {
            ScriptType::P2TR => self.sign_taproot(psbt, index, &spent.script_pubkey, mode)?,
            ScriptType::P2PKH | ScriptType::P2WPKH => {
                self.sign_ecdsa(psbt, index, &spent.script_pubkey, mode)?
            }
        }
        psbt.inputs[index].sighash_type = Some(mode.psbt_sighash_type(script_type));

        Ok(())
    }

    fn sign_ecdsa(
        &self,
        psbt: &mut Psbt,
        index: usize,
        script: &Script,
        mode: SighashMode,
    ) -> SwapResult<()> {
        let public_key = self.public_key();
        if !pubkey_matches_script(&public_key, script) {
            return Err(SwapError::KeyMismatch(index));
        }

        let hash_ty = mode.ecdsa();
        let msg = ecdsa_sighash(psbt, index, hash_ty)?;
        let sig = self.secp.sign_ecdsa(&msg, &self.private_key.inner);

        // verify
        self.secp.verify_ecdsa(&msg, &sig, &public_key.inner)?;
        debug!("signed input {index} with ECDSA ({hash_ty:?})");

        psbt.inputs[index]
            .partial_sigs
            .insert(public_key, ecdsa::Signature { sig, hash_ty });

        Ok(())
    }

    fn sign_taproot(
        &self,
        psbt: &mut Psbt,
        index: usize,
        script: &Script,
        mode: SighashMode,
    ) -> SwapResult<()> {
        let internal_key = self.x_only_public_key();
        let input = &psbt.inputs[index];
        if input
            .tap_internal_key
            .map_or(false, |declared| declared != internal_key)
        {
            return Err(SwapError::KeyMismatch(index));
        }

        let keypair = Keypair::from_secret_key(self.secp, &self.private_key.inner);
        let tweaked = keypair
            .tap_tweak(self.secp, input.tap_merkle_root)
            .to_inner();
        let (output_key, _) = tweaked.x_only_public_key();
        if output_key != taproot_output_key(script)? {
            return Err(SwapError::KeyMismatch(index));
        }

        let hash_ty = mode.taproot();
        let msg = taproot_sighash(psbt, index, hash_ty, None)?;
        let sig = self.sign_schnorr(&msg, &tweaked);

        // verify
        self.secp.verify_schnorr(&sig, &msg, &output_key)?;
        debug!("signed input {index} with Schnorr ({hash_ty:?})");

        let input = &mut psbt.inputs[index];
        input.tap_key_sig = Some(taproot::Signature { sig, hash_ty });
        input.tap_internal_key = Some(internal_key);

        Ok(())
    }

    #[cfg(feature = "rand")]
    fn sign_schnorr(&self, msg: &Message, keypair: &Keypair) -> SchnorrSignature {
        self.secp
            .sign_schnorr_with_rng(msg, keypair, &mut rand::thread_rng())
    }

    #[cfg(not(feature = "rand"))]
    fn sign_schnorr(&self, msg: &Message, keypair: &Keypair) -> SchnorrSignature {
        self.secp.sign_schnorr_no_aux_rand(msg, keypair)
    }
}

#[cfg(test)]
mod test {
    use bitcoin::{Network, PrivateKey};

    use super::*;
    use crate::config::SwapConfig;
    use crate::utils::test_utils::{
        listing_fixture, private_key, segwit_address, taproot_address, SELLER_KEY, WIF,
    };
    use crate::wallet::SellerSigner;

    #[test]
    fn test_should_sign_taproot_input() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = taproot_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 1_000);
        let mut psbt = SellerSigner::new(&config)
            .build_unsigned_listing(&mut listing)
            .unwrap();

        let wallet = Wallet::new(&secp, key);
        wallet
            .sign_input(&mut psbt, 0, SighashMode::SinglePlusAnyoneCanPay)
            .unwrap();

        let signature = psbt.inputs[0].tap_key_sig.unwrap();
        assert_eq!(signature.hash_ty, SighashMode::SinglePlusAnyoneCanPay.taproot());
        assert_eq!(signature.to_vec().len(), 65);
        assert_eq!(psbt.inputs[0].tap_internal_key, Some(wallet.x_only_public_key()));
    }

    #[test]
    fn test_should_sign_segwit_input_with_wif_key() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = PrivateKey::from_wif(WIF).unwrap();
        let address = segwit_address(&secp, &key, Network::Testnet);
        assert_eq!(
            address.to_string(),
            "tb1qzc8dhpkg5e4t6xyn4zmexxljc4nkje59dg3ark"
        );

        let mut listing = listing_fixture(&secp, &config, &key, &address, 1_000);
        let mut psbt = SellerSigner::new(&config)
            .build_unsigned_listing(&mut listing)
            .unwrap();

        let wallet = Wallet::new(&secp, key);
        wallet
            .sign_input(&mut psbt, 0, SighashMode::SinglePlusAnyoneCanPay)
            .unwrap();

        let signature = psbt.inputs[0].partial_sigs[&wallet.public_key()];
        assert_eq!(
            signature.hash_ty,
            bitcoin::EcdsaSighashType::SinglePlusAnyoneCanPay
        );
    }

    #[test]
    fn test_should_refuse_foreign_input() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);

        for segwit in [false, true] {
            let key = private_key(SELLER_KEY);
            let address = if segwit {
                segwit_address(&secp, &key, Network::Testnet)
            } else {
                taproot_address(&secp, &key, Network::Testnet)
            };
            let mut listing = listing_fixture(&secp, &config, &key, &address, 1_000);
            let mut psbt = SellerSigner::new(&config)
                .build_unsigned_listing(&mut listing)
                .unwrap();

            let stranger = Wallet::new(&secp, private_key(0x99));
            assert!(matches!(
                stranger.sign_input(&mut psbt, 0, SighashMode::All),
                Err(SwapError::KeyMismatch(0))
            ));
            assert!(psbt.inputs[0].partial_sigs.is_empty());
            assert!(psbt.inputs[0].tap_key_sig.is_none());
        }
    }
}
