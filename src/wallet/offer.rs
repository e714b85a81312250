use std::collections::HashSet;

use bitcoin::psbt::Psbt;
use bitcoin::{Address, Amount, FeeRate, Transaction, TxOut};

use super::listing::ListingState;
use super::signer::Wallet;
use crate::address::{parse_address, ScriptType};
use crate::config::SwapConfig;
use crate::psbt::{
    check_input_signature, encode_psbt, finalize_input, input_signatures, spent_output,
    SighashMode,
};
use crate::utils::fees::{estimate_vsize, fee_for_vsize};
use crate::utxo::Utxo;
use crate::{SwapError, SwapResult};

/// Position of the seller input in the swap transaction, right after the dummy.
pub const SELLER_INPUT_INDEX: usize = 1;

#[derive(Debug, Clone)]
/// Arguments for creating an offer
pub struct OfferArgs {
    /// Address receiving the dummy replacement and the change
    pub buyer_address: String,
    /// Address receiving the inscription along with the dummy sats
    pub buyer_receive_address: String,
    /// Small UTXO spent ahead of the seller input
    pub dummy_utxo: Utxo,
    /// UTXOs paying for the inscription and the fee, in spending order
    pub payment_utxos: Vec<Utxo>,
    /// Fee rate in sat/vB
    pub fee_rate_sat_per_vb: u64,
}

/// A buyer's intent to purchase a listing.
#[derive(Debug, Clone)]
pub struct OfferState {
    buyer_address: Address,
    buyer_receive_address: Address,
    dummy_utxo: Utxo,
    payment_utxos: Vec<Utxo>,
    fee_rate: FeeRate,
    unsigned_swap_psbt: Option<Psbt>,
    signed_swap_psbt: Option<Psbt>,
}

impl OfferState {
    pub fn new(args: OfferArgs, config: &SwapConfig) -> SwapResult<Self> {
        let buyer_address = parse_address(&args.buyer_address, config.network)?;
        let buyer_receive_address = parse_address(&args.buyer_receive_address, config.network)?;

        let fee_rate = FeeRate::from_sat_per_vb(args.fee_rate_sat_per_vb)
            .filter(|rate| *rate > FeeRate::ZERO)
            .ok_or_else(|| {
                SwapError::InvalidInput(format!(
                    "invalid fee rate of {} sat/vB",
                    args.fee_rate_sat_per_vb
                ))
            })?;

        if args.payment_utxos.is_empty() {
            return Err(SwapError::InvalidInput(
                "at least one payment utxo is required".to_string(),
            ));
        }
        if args.dummy_utxo.value().to_sat() > config.max_dummy_value {
            return Err(SwapError::InvalidInput(format!(
                "dummy utxo {} holds {}, more than {} sats",
                args.dummy_utxo.outpoint(),
                args.dummy_utxo.value(),
                config.max_dummy_value
            )));
        }

        let mut outpoints = HashSet::new();
        for utxo in std::iter::once(&args.dummy_utxo).chain(&args.payment_utxos) {
            if !outpoints.insert(utxo.outpoint()) {
                return Err(SwapError::InvalidInput(format!(
                    "utxo {} is used twice",
                    utxo.outpoint()
                )));
            }
        }

        Ok(Self {
            buyer_address,
            buyer_receive_address,
            dummy_utxo: args.dummy_utxo,
            payment_utxos: args.payment_utxos,
            fee_rate,
            unsigned_swap_psbt: None,
            signed_swap_psbt: None,
        })
    }

    pub fn buyer_address(&self) -> &Address {
        &self.buyer_address
    }

    pub fn buyer_receive_address(&self) -> &Address {
        &self.buyer_receive_address
    }

    pub fn dummy_utxo(&self) -> &Utxo {
        &self.dummy_utxo
    }

    pub fn payment_utxos(&self) -> &[Utxo] {
        &self.payment_utxos
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    pub fn unsigned_swap_psbt(&self) -> Option<&Psbt> {
        self.unsigned_swap_psbt.as_ref()
    }

    pub fn signed_swap_psbt(&self) -> Option<&Psbt> {
        self.signed_swap_psbt.as_ref()
    }

    pub fn signed_swap_base64(&self) -> Option<String> {
        self.signed_swap_psbt.as_ref().map(encode_psbt)
    }

    /// Sats brought by the payment utxos. The dummy sats end up in the
    /// inscription output and cannot pay for anything.
    pub fn available(&self) -> u64 {
        self.payment_utxos
            .iter()
            .map(|utxo| utxo.value().to_sat())
            .sum()
    }
}

/// Buyer side of the swap: merges the signed listing with the buyer funds
/// into a fully signed transaction.
pub struct BuyerSigner<'a> {
    config: &'a SwapConfig,
    wallet: &'a Wallet<'a>,
}

impl<'a> BuyerSigner<'a> {
    pub fn new(config: &'a SwapConfig, wallet: &'a Wallet<'a>) -> Self {
        Self { config, wallet }
    }

    /// Builds, signs and finalizes the swap of `listing` funded by `offer`.
    pub fn build_swap(&self, offer: &mut OfferState, listing: &ListingState) -> SwapResult<Psbt> {
        self.build_unsigned_swap(offer, listing)?;
        self.sign_swap(offer)
    }

    /// Assembles the unsigned swap PSBT around the seller's signed input and output.
    ///
    /// Inputs: `[dummy, seller, ...payments]`.
    /// Outputs: `[inscription, seller proceeds, dummy replacement, marketplace fee?, change?]`.
    ///
    /// Sats flow first-in, first-out, so the inscription output takes the dummy
    /// and the whole inscription utxo.
    pub fn build_unsigned_swap(
        &self,
        offer: &mut OfferState,
        listing: &ListingState,
    ) -> SwapResult<Psbt> {
        let seller_psbt = listing.signed_listing_psbt().ok_or_else(|| {
            SwapError::InvalidSellerSignature("listing carries no signed PSBT".to_string())
        })?;
        let seller_spent = self.validate_listing(listing, seller_psbt)?;
        let seller_txin = seller_psbt.unsigned_tx.input[0].clone();
        let proceeds = seller_psbt.unsigned_tx.output[0].clone();

        if std::iter::once(&offer.dummy_utxo)
            .chain(&offer.payment_utxos)
            .any(|utxo| utxo.outpoint() == seller_txin.previous_output)
        {
            return Err(SwapError::InvalidInput(format!(
                "buyer utxos include the inscription output {}",
                seller_txin.previous_output
            )));
        }

        // inputs
        let buyer_input = |utxo: &Utxo| {
            let mut input = utxo.psbt_input();
            input.sighash_type = Some(SighashMode::All.psbt_sighash_type(utxo.script_type()));
            input
        };
        let mut inputs = vec![offer.dummy_utxo.tx_in(), seller_txin];
        let mut psbt_inputs = vec![
            buyer_input(&offer.dummy_utxo),
            seller_psbt.inputs[0].clone(),
        ];
        let mut script_types = vec![
            offer.dummy_utxo.script_type(),
            ScriptType::from_script(&seller_spent.script_pubkey)?,
        ];
        for utxo in &offer.payment_utxos {
            inputs.push(utxo.tx_in());
            psbt_inputs.push(buyer_input(utxo));
            script_types.push(utxo.script_type());
        }

        // outputs
        let inscription = listing.inscription();
        let inscription_value = offer
            .dummy_utxo
            .value()
            .checked_add(seller_spent.value)
            .ok_or_else(|| SwapError::InvalidInput("inscription output overflows".to_string()))?;
        let inscribed_sat = offer
            .dummy_utxo
            .value()
            .to_sat()
            .saturating_add(inscription.location.offset);
        if inscribed_sat >= inscription_value.to_sat() {
            return Err(SwapError::InvalidInput(format!(
                "inscription {} at offset {} falls outside of the {inscription_value} output",
                inscription.id, inscription.location.offset
            )));
        }
        let mut outputs = vec![
            TxOut {
                value: inscription_value,
                script_pubkey: offer.buyer_receive_address.script_pubkey(),
            },
            proceeds,
            TxOut {
                value: Amount::from_sat(self.config.dummy_replacement_value),
                script_pubkey: offer.buyer_address.script_pubkey(),
            },
        ];
        if let Some(fee_output) = self
            .config
            .marketplace_fee_output(listing.price(), listing.maker_fee_bp())?
        {
            debug!("marketplace fee output: {}", fee_output.value);
            outputs.push(fee_output);
        }

        let mut unsigned_tx = Transaction {
            version: seller_psbt.unsigned_tx.version,
            lock_time: seller_psbt.unsigned_tx.lock_time,
            input: inputs,
            output: outputs,
        };

        // fees
        let available = offer.available();
        let buyer_spend = listing
            .price()
            .to_sat()
            .checked_add(self.config.dummy_replacement_value)
            .ok_or_else(|| SwapError::InvalidInput("buyer spend overflows".to_string()))?;
        let fee_without_change =
            fee_for_vsize(offer.fee_rate, estimate_vsize(&unsigned_tx, &script_types)?)?;
        debug!("fee without change: {fee_without_change}");

        let required = buyer_spend
            .checked_add(fee_without_change.to_sat())
            .ok_or_else(|| SwapError::InvalidInput("required funds overflow".to_string()))?;
        if available < required {
            return Err(SwapError::InsufficientFunds {
                required,
                available,
            });
        }

        unsigned_tx.output.push(TxOut {
            value: Amount::ZERO,
            script_pubkey: offer.buyer_address.script_pubkey(),
        });
        let fee_with_change =
            fee_for_vsize(offer.fee_rate, estimate_vsize(&unsigned_tx, &script_types)?)?;
        let change = buyer_spend
            .checked_add(fee_with_change.to_sat())
            .and_then(|spend| available.checked_sub(spend));
        match change {
            Some(change) if change >= self.config.dust_threshold => {
                debug!("change: {change} sats, fee: {fee_with_change}");
                if let Some(output) = unsigned_tx.output.last_mut() {
                    output.value = Amount::from_sat(change);
                }
            }
            change => {
                debug!(
                    "change of {} sats folded into the fee",
                    change.unwrap_or_default()
                );
                unsigned_tx.output.pop();
            }
        }

        let mut psbt = Psbt::from_unsigned_tx(unsigned_tx)?;
        psbt.inputs = psbt_inputs;
        psbt.outputs[SELLER_INPUT_INDEX] =
            seller_psbt.outputs.first().cloned().unwrap_or_default();

        check_input_signature(
            self.wallet.secp(),
            &psbt,
            SELLER_INPUT_INDEX,
            &seller_spent.script_pubkey,
        )
        .map_err(|e| {
            SwapError::InvalidSellerSignature(format!(
                "signature does not hold at input {SELLER_INPUT_INDEX}: {e}"
            ))
        })?;

        debug!(
            "unsigned swap for {}: {} inputs, {} outputs",
            listing.inscription().id,
            psbt.inputs.len(),
            psbt.unsigned_tx.output.len()
        );
        offer.unsigned_swap_psbt = Some(psbt.clone());
        offer.signed_swap_psbt = None;

        Ok(psbt)
    }

    /// Signs every buyer input with SIGHASH_ALL and finalizes all inputs.
    pub fn sign_swap(&self, offer: &mut OfferState) -> SwapResult<Psbt> {
        let mut psbt = offer.unsigned_swap_psbt.clone().ok_or_else(|| {
            SwapError::InvalidInput("swap PSBT has not been built".to_string())
        })?;

        for index in (0..psbt.inputs.len()).filter(|index| *index != SELLER_INPUT_INDEX) {
            self.wallet.sign_input(&mut psbt, index, SighashMode::All)?;
        }
        for index in 0..psbt.inputs.len() {
            finalize_input(self.wallet.secp(), &mut psbt, index)?;
        }

        info!(
            "signed swap {} spending {} inputs",
            psbt.unsigned_tx.txid(),
            psbt.inputs.len()
        );
        offer.signed_swap_psbt = Some(psbt.clone());

        Ok(psbt)
    }

    /// Checks the seller's signed listing and returns the output it spends.
    fn validate_listing(&self, listing: &ListingState, seller_psbt: &Psbt) -> SwapResult<TxOut> {
        if seller_psbt.unsigned_tx.input.len() != 1
            || seller_psbt.unsigned_tx.output.len() != 1
            || seller_psbt.inputs.len() != 1
        {
            return Err(SwapError::InvalidSellerSignature(
                "listing must have exactly one input and one output".to_string(),
            ));
        }

        let spent = spent_output(seller_psbt, 0)
            .map_err(|e| SwapError::InvalidSellerSignature(e.to_string()))?;
        let signatures = input_signatures(seller_psbt, 0)
            .map_err(|e| SwapError::InvalidSellerSignature(e.to_string()))?;
        if signatures
            .iter()
            .any(|signature| signature.sighash_mode() != Some(SighashMode::SinglePlusAnyoneCanPay))
        {
            return Err(SwapError::InvalidSellerSignature(
                "listing signature does not use SINGLE|ANYONECANPAY".to_string(),
            ));
        }
        check_input_signature(self.wallet.secp(), seller_psbt, 0, &spent.script_pubkey)
            .map_err(|e| SwapError::InvalidSellerSignature(e.to_string()))?;

        let inscription = listing.inscription();
        let previous_output = seller_psbt.unsigned_tx.input[0].previous_output;
        if previous_output != inscription.output || spent.value.to_sat() != inscription.output_value
        {
            return Err(SwapError::InvalidInput(format!(
                "listing spends {previous_output} holding {}, inscription {} is on {} with {} sats",
                spent.value, inscription.id, inscription.output, inscription.output_value
            )));
        }

        let expected_proceeds = TxOut {
            value: self
                .config
                .seller_proceeds(listing.price(), listing.maker_fee_bp()),
            script_pubkey: listing.seller_receive_address().script_pubkey(),
        };
        if seller_psbt.unsigned_tx.output[0] != expected_proceeds {
            return Err(SwapError::InvalidInput(format!(
                "listing pays {} to {}, expected {} to {}",
                seller_psbt.unsigned_tx.output[0].value,
                seller_psbt.unsigned_tx.output[0].script_pubkey,
                expected_proceeds.value,
                listing.seller_receive_address()
            )));
        }

        Ok(spent)
    }
}
