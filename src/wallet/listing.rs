use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Transaction, TxOut, XOnlyPublicKey};

use super::signer::Wallet;
use crate::address::{parse_address, ScriptType};
use crate::config::SwapConfig;
use crate::inscription::Inscription;
use crate::psbt::{decode_psbt, encode_psbt, SighashMode};
use crate::utxo::Utxo;
use crate::{SwapError, SwapResult};

#[derive(Debug, Clone)]
/// Arguments for creating a listing
pub struct ListingArgs {
    /// Marketplace maker fee, in basis points of the price
    pub maker_fee_bp: u64,
    /// Address currently holding the inscription
    pub seller_ord_address: String,
    /// Asking price
    pub price: Amount,
    /// Inscription being sold
    pub inscription: Inscription,
    /// Address receiving the proceeds
    pub seller_receive_address: String,
    /// Untweaked key of the seller, required when the inscription sits on a taproot output
    pub tap_internal_key: Option<XOnlyPublicKey>,
}

/// A seller's offer to sell one inscription at a fixed price.
#[derive(Debug, Clone)]
pub struct ListingState {
    maker_fee_bp: u64,
    seller_ord_address: Address,
    price: Amount,
    inscription: Inscription,
    inscription_utxo: Option<Utxo>,
    seller_receive_address: Address,
    unsigned_listing_psbt: Option<Psbt>,
    signed_listing_psbt: Option<Psbt>,
    tap_internal_key: Option<XOnlyPublicKey>,
}

impl ListingState {
    pub fn new(args: ListingArgs, config: &SwapConfig) -> SwapResult<Self> {
        SwapConfig::check_maker_fee_bp(args.maker_fee_bp)?;
        check_price(args.price)?;

        Ok(Self {
            maker_fee_bp: args.maker_fee_bp,
            seller_ord_address: parse_address(&args.seller_ord_address, config.network)?,
            price: args.price,
            inscription: args.inscription,
            inscription_utxo: None,
            seller_receive_address: parse_address(&args.seller_receive_address, config.network)?,
            unsigned_listing_psbt: None,
            signed_listing_psbt: None,
            tap_internal_key: args.tap_internal_key,
        })
    }

    /// Rebuilds a listing from its public data and the base64 PSBT signed by the seller.
    ///
    /// The signature is not checked here; the buyer validates it while
    /// building the swap.
    pub fn with_signed_psbt(
        args: ListingArgs,
        config: &SwapConfig,
        signed_listing_psbt: &str,
    ) -> SwapResult<Self> {
        let mut listing = Self::new(args, config)?;
        listing.signed_listing_psbt = Some(decode_psbt(signed_listing_psbt)?);

        Ok(listing)
    }

    pub fn maker_fee_bp(&self) -> u64 {
        self.maker_fee_bp
    }

    pub fn seller_ord_address(&self) -> &Address {
        &self.seller_ord_address
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    pub fn inscription(&self) -> &Inscription {
        &self.inscription
    }

    pub fn inscription_utxo(&self) -> Option<&Utxo> {
        self.inscription_utxo.as_ref()
    }

    pub fn seller_receive_address(&self) -> &Address {
        &self.seller_receive_address
    }

    pub fn tap_internal_key(&self) -> Option<XOnlyPublicKey> {
        self.tap_internal_key
    }

    pub fn unsigned_listing_psbt(&self) -> Option<&Psbt> {
        self.unsigned_listing_psbt.as_ref()
    }

    pub fn signed_listing_psbt(&self) -> Option<&Psbt> {
        self.signed_listing_psbt.as_ref()
    }

    /// Base64 form of the signed listing, handed over to buyers.
    pub fn signed_listing_base64(&self) -> Option<String> {
        self.signed_listing_psbt.as_ref().map(encode_psbt)
    }

    /// Whether the listing carries a seller signature.
    pub fn is_sealed(&self) -> bool {
        self.signed_listing_psbt.is_some()
    }

    pub fn set_price(&mut self, price: Amount) -> SwapResult<()> {
        self.ensure_unsealed()?;
        check_price(price)?;
        self.price = price;
        self.unsigned_listing_psbt = None;

        Ok(())
    }

    pub fn set_seller_receive_address(
        &mut self,
        address: &str,
        config: &SwapConfig,
    ) -> SwapResult<()> {
        self.ensure_unsealed()?;
        self.seller_receive_address = parse_address(address, config.network)?;
        self.unsigned_listing_psbt = None;

        Ok(())
    }

    /// Sets the output holding the inscription, as resolved from upstream.
    pub fn set_inscription_utxo(&mut self, utxo: Utxo) -> SwapResult<()> {
        self.ensure_unsealed()?;
        self.inscription.validate_utxo(&utxo)?;
        if utxo.address() != &self.seller_ord_address {
            return Err(SwapError::InvalidInput(format!(
                "inscription output {} is not held by {}",
                utxo.outpoint(),
                self.seller_ord_address
            )));
        }

        self.inscription_utxo = Some(utxo);
        self.unsigned_listing_psbt = None;

        Ok(())
    }

    fn ensure_unsealed(&self) -> SwapResult<()> {
        if self.is_sealed() {
            return Err(SwapError::ListingSealed);
        }
        Ok(())
    }
}

fn check_price(price: Amount) -> SwapResult<()> {
    if price == Amount::ZERO {
        return Err(SwapError::InvalidInput("price must be positive".to_string()));
    }
    if price > Amount::MAX_MONEY {
        return Err(SwapError::InvalidInput(format!(
            "price of {} sats exceeds the bitcoin supply",
            price.to_sat()
        )));
    }
    Ok(())
}

/// Seller side of the swap: builds and signs the listing PSBT.
pub struct SellerSigner<'a> {
    config: &'a SwapConfig,
}

impl<'a> SellerSigner<'a> {
    pub fn new(config: &'a SwapConfig) -> Self {
        Self { config }
    }

    /// Builds the one-input, one-output listing PSBT: the inscription output
    /// spent towards the seller proceeds.
    pub fn build_unsigned_listing(&self, listing: &mut ListingState) -> SwapResult<Psbt> {
        listing.ensure_unsealed()?;

        let utxo = listing.inscription_utxo.as_ref().ok_or_else(|| {
            SwapError::InvalidInput(format!(
                "output of inscription {} has not been resolved",
                listing.inscription.id
            ))
        })?;
        listing.inscription.validate_utxo(utxo)?;
        if utxo.address() != &listing.seller_ord_address {
            return Err(SwapError::InvalidInput(format!(
                "inscription output {} is not held by {}",
                utxo.outpoint(),
                listing.seller_ord_address
            )));
        }

        match utxo.script_type() {
            // a legacy SINGLE|ANYONECANPAY signature commits to its input index
            ScriptType::P2PKH => {
                return Err(SwapError::InvalidInput(format!(
                    "inscription output {} is legacy P2PKH and cannot be listed",
                    utxo.outpoint()
                )))
            }
            ScriptType::P2TR if listing.tap_internal_key.is_none() => {
                return Err(SwapError::InvalidInput(
                    "taproot inscription output requires the seller internal key".to_string(),
                ))
            }
            ScriptType::P2TR | ScriptType::P2WPKH => {}
        }

        let proceeds = TxOut {
            value: self
                .config
                .seller_proceeds(listing.price, listing.maker_fee_bp),
            script_pubkey: listing.seller_receive_address.script_pubkey(),
        };
        if proceeds.value.to_sat() < self.config.dust_threshold {
            warn!(
                "seller proceeds of {} are below the dust threshold",
                proceeds.value
            );
        }

        let unsigned_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![utxo.tx_in()],
            output: vec![proceeds],
        };

        let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)?;
        let mut input = utxo.psbt_input();
        input.sighash_type = Some(
            SighashMode::SinglePlusAnyoneCanPay.psbt_sighash_type(utxo.script_type()),
        );
        if utxo.script_type() == ScriptType::P2TR {
            input.tap_internal_key = listing.tap_internal_key;
        }
        psbt.inputs[0] = input;

        debug!(
            "unsigned listing of {} spending {} for {}",
            listing.inscription.id,
            utxo.outpoint(),
            listing.price
        );
        listing.unsigned_listing_psbt = Some(psbt.clone());

        Ok(psbt)
    }

    /// Signs the listing input with SINGLE|ANYONECANPAY and seals the listing.
    pub fn sign_listing(&self, listing: &mut ListingState, wallet: &Wallet) -> SwapResult<Psbt> {
        listing.ensure_unsealed()?;

        let mut psbt = listing.unsigned_listing_psbt.clone().ok_or_else(|| {
            SwapError::InvalidInput("listing PSBT has not been built".to_string())
        })?;
        wallet.sign_input(&mut psbt, 0, SighashMode::SinglePlusAnyoneCanPay)?;

        info!(
            "listed inscription {} for {}",
            listing.inscription.id, listing.price
        );
        listing.signed_listing_psbt = Some(psbt.clone());

        Ok(psbt)
    }
}

#[cfg(test)]
mod test {
    use bitcoin::secp256k1::Secp256k1;
    use bitcoin::{Network, Sequence};

    use super::*;
    use crate::config::MakerFeeLayout;
    use crate::psbt::verify_input_signature;
    use crate::utils::test_utils::{
        init_logger, inscription_fixture, inscription_utxo, legacy_address, listing_fixture,
        private_key, segwit_address, taproot_address, INSCRIPTION_OUTPUT_VALUE, SELLER_KEY,
    };

    #[test]
    fn test_should_build_and_sign_listing() {
        init_logger();
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = taproot_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 1);

        let seller = SellerSigner::new(&config);
        let unsigned = seller.build_unsigned_listing(&mut listing).unwrap();

        assert_eq!(unsigned.unsigned_tx.version, Version::TWO);
        assert_eq!(unsigned.unsigned_tx.lock_time, LockTime::ZERO);
        assert_eq!(unsigned.unsigned_tx.input.len(), 1);
        assert_eq!(unsigned.unsigned_tx.output.len(), 1);
        assert_eq!(unsigned.unsigned_tx.input[0].sequence, Sequence::MAX);
        assert_eq!(
            unsigned.unsigned_tx.input[0].previous_output,
            listing.inscription().output
        );
        assert_eq!(unsigned.unsigned_tx.output[0].value, Amount::from_sat(1));
        assert_eq!(
            unsigned.inputs[0].sighash_type,
            Some(SighashMode::SinglePlusAnyoneCanPay.psbt_sighash_type(ScriptType::P2TR))
        );
        assert_eq!(
            unsigned.inputs[0].witness_utxo.as_ref().unwrap().value,
            Amount::from_sat(INSCRIPTION_OUTPUT_VALUE)
        );

        let signed = seller
            .sign_listing(&mut listing, &Wallet::new(&secp, key))
            .unwrap();
        assert!(listing.is_sealed());
        assert!(verify_input_signature(
            &secp,
            &signed,
            0,
            &address.script_pubkey()
        ));
        assert_eq!(
            decode_psbt(&listing.signed_listing_base64().unwrap()).unwrap(),
            signed
        );
    }

    #[test]
    fn test_signed_listing_is_immutable() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = segwit_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 5_000);

        // price may change until the listing is signed
        listing.set_price(Amount::from_sat(6_000)).unwrap();
        let seller = SellerSigner::new(&config);
        seller.build_unsigned_listing(&mut listing).unwrap();
        seller
            .sign_listing(&mut listing, &Wallet::new(&secp, key))
            .unwrap();

        assert!(matches!(
            listing.set_price(Amount::from_sat(1)),
            Err(SwapError::ListingSealed)
        ));
        assert!(matches!(
            listing.set_seller_receive_address(&address.to_string(), &config),
            Err(SwapError::ListingSealed)
        ));
        assert!(matches!(
            seller.build_unsigned_listing(&mut listing),
            Err(SwapError::ListingSealed)
        ));
        assert_eq!(listing.price(), Amount::from_sat(6_000));
    }

    #[test]
    fn test_should_reject_legacy_inscription_output() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = legacy_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 5_000);

        assert!(matches!(
            SellerSigner::new(&config).build_unsigned_listing(&mut listing),
            Err(SwapError::InvalidInput(_))
        ));
        assert!(listing.unsigned_listing_psbt().is_none());
    }

    #[test]
    fn test_should_require_resolved_utxo_and_internal_key() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = taproot_address(&secp, &key, Network::Testnet);
        let utxo = inscription_utxo(&address);

        let args = ListingArgs {
            maker_fee_bp: 0,
            seller_ord_address: address.to_string(),
            price: Amount::from_sat(5_000),
            inscription: inscription_fixture(&utxo),
            seller_receive_address: address.to_string(),
            tap_internal_key: None,
        };
        let mut listing = ListingState::new(args, &config).unwrap();
        let seller = SellerSigner::new(&config);

        assert!(matches!(
            seller.build_unsigned_listing(&mut listing),
            Err(SwapError::InvalidInput(_))
        ));

        listing.set_inscription_utxo(utxo).unwrap();
        assert!(matches!(
            seller.build_unsigned_listing(&mut listing),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_should_reject_utxo_of_another_owner() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = taproot_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 5_000);

        let stranger = taproot_address(&secp, &private_key(0x42), Network::Testnet);
        let foreign = inscription_utxo(&stranger);
        assert!(listing.set_inscription_utxo(foreign).is_err());
    }

    #[test]
    fn test_should_validate_listing_args() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let address = taproot_address(&secp, &private_key(SELLER_KEY), Network::Testnet);
        let utxo = inscription_utxo(&address);
        let args = ListingArgs {
            maker_fee_bp: 1,
            seller_ord_address: address.to_string(),
            price: Amount::from_sat(5_000),
            inscription: inscription_fixture(&utxo),
            seller_receive_address: address.to_string(),
            tap_internal_key: None,
        };

        let mainnet = SwapConfig::new(Network::Bitcoin);
        assert!(matches!(
            ListingState::new(args.clone(), &mainnet),
            Err(SwapError::InvalidAddress { .. })
        ));
        assert!(matches!(
            ListingState::new(
                ListingArgs {
                    maker_fee_bp: 10_001,
                    ..args.clone()
                },
                &config
            ),
            Err(SwapError::InvalidInput(_))
        ));
        assert!(matches!(
            ListingState::new(
                ListingArgs {
                    price: Amount::ZERO,
                    ..args
                },
                &config
            ),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_should_reject_price_above_money_supply() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let address = taproot_address(&secp, &private_key(SELLER_KEY), Network::Testnet);
        let mut listing =
            listing_fixture(&secp, &config, &private_key(SELLER_KEY), &address, 5_000);

        let too_high = Amount::MAX_MONEY + Amount::from_sat(1);
        assert!(matches!(
            listing.set_price(too_high),
            Err(SwapError::InvalidInput(_))
        ));
        assert!(matches!(
            listing.set_price(Amount::from_sat(u64::MAX)),
            Err(SwapError::InvalidInput(_))
        ));
        assert_eq!(listing.price(), Amount::from_sat(5_000));

        listing.set_price(Amount::MAX_MONEY).unwrap();
        assert_eq!(listing.price(), Amount::MAX_MONEY);
    }

    #[test]
    fn test_proceeds_follow_maker_fee_layout() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet).with_maker_fee(MakerFeeLayout::FeeOutput {
            address: "tb1qzc8dhpkg5e4t6xyn4zmexxljc4nkje59dg3ark".to_string(),
        });
        let key = private_key(SELLER_KEY);
        let address = taproot_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 10_000_000);

        let psbt = SellerSigner::new(&config)
            .build_unsigned_listing(&mut listing)
            .unwrap();

        // 1 basis point of 10M sats
        assert_eq!(
            psbt.unsigned_tx.output[0].value,
            Amount::from_sat(10_000_000 - 1_000)
        );
    }

    #[test]
    fn test_should_rebuild_listing_from_base64() {
        let secp = Secp256k1::new();
        let config = SwapConfig::new(Network::Testnet);
        let key = private_key(SELLER_KEY);
        let address = taproot_address(&secp, &key, Network::Testnet);
        let mut listing = listing_fixture(&secp, &config, &key, &address, 5_000);
        let seller = SellerSigner::new(&config);
        seller.build_unsigned_listing(&mut listing).unwrap();
        let signed = seller
            .sign_listing(&mut listing, &Wallet::new(&secp, key))
            .unwrap();

        let rebuilt = ListingState::with_signed_psbt(
            ListingArgs {
                maker_fee_bp: listing.maker_fee_bp(),
                seller_ord_address: listing.seller_ord_address().to_string(),
                price: listing.price(),
                inscription: listing.inscription().clone(),
                seller_receive_address: listing.seller_receive_address().to_string(),
                tap_internal_key: None,
            },
            &config,
            &encode_psbt(&signed),
        )
        .unwrap();

        assert!(rebuilt.is_sealed());
        assert_eq!(rebuilt.signed_listing_psbt(), Some(&signed));
        assert!(matches!(
            ListingState::with_signed_psbt(
                ListingArgs {
                    maker_fee_bp: 1,
                    seller_ord_address: address.to_string(),
                    price: Amount::from_sat(5_000),
                    inscription: listing.inscription().clone(),
                    seller_receive_address: address.to_string(),
                    tap_internal_key: None,
                },
                &config,
                "not base64"
            ),
            Err(SwapError::PsbtEncoding(_))
        ));
    }
}
