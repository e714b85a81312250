use bitcoin::{Amount, Network, TxOut};
use serde::{Deserialize, Serialize};

use crate::address::parse_address;
use crate::utils::constants::{
    BASIS_POINTS, DUMMY_REPLACEMENT_VALUE, DUST_THRESHOLD, MAX_DUMMY_VALUE,
};
use crate::{SwapError, SwapResult};

/// How the marketplace maker fee shows up in the swap transaction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum MakerFeeLayout {
    /// The seller proceeds output carries the full price. Any maker fee is settled off-chain.
    #[default]
    FullPrice,
    /// The seller proceeds output carries the price less the maker fee, and the
    /// swap transaction pays the maker fee to `address` in a dedicated output.
    FeeOutput { address: String },
}

/// Marketplace-wide settings shared by sellers and buyers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SwapConfig {
    /// Network every address must belong to
    pub network: Network,
    #[serde(default)]
    pub maker_fee: MakerFeeLayout,
    /// Value of the output returning the dummy to the buyer, in sats
    #[serde(default = "default_dummy_replacement_value")]
    pub dummy_replacement_value: u64,
    /// Largest dummy UTXO accepted, in sats
    #[serde(default = "default_max_dummy_value")]
    pub max_dummy_value: u64,
    /// Change below this value is folded into the miner fee, in sats
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: u64,
}

fn default_dummy_replacement_value() -> u64 {
    DUMMY_REPLACEMENT_VALUE
}

fn default_max_dummy_value() -> u64 {
    MAX_DUMMY_VALUE
}

fn default_dust_threshold() -> u64 {
    DUST_THRESHOLD
}

impl SwapConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            maker_fee: MakerFeeLayout::default(),
            dummy_replacement_value: DUMMY_REPLACEMENT_VALUE,
            max_dummy_value: MAX_DUMMY_VALUE,
            dust_threshold: DUST_THRESHOLD,
        }
    }

    pub fn with_maker_fee(mut self, maker_fee: MakerFeeLayout) -> Self {
        self.maker_fee = maker_fee;
        self
    }

    /// Loads the configuration from its JSON representation.
    pub fn from_json(json: &str) -> SwapResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        if let MakerFeeLayout::FeeOutput { address } = &config.maker_fee {
            parse_address(address, config.network)?;
        }

        Ok(config)
    }

    /// Maker fee charged on `price` at `maker_fee_bp` basis points, rounded down.
    pub fn maker_fee(&self, price: Amount, maker_fee_bp: u64) -> Amount {
        match self.maker_fee {
            MakerFeeLayout::FullPrice => Amount::ZERO,
            MakerFeeLayout::FeeOutput { .. } => {
                let fee = u128::from(price.to_sat()) * u128::from(maker_fee_bp)
                    / u128::from(BASIS_POINTS);
                Amount::from_sat(fee.min(u128::from(price.to_sat())) as u64)
            }
        }
    }

    /// Value of the output paying the seller.
    pub fn seller_proceeds(&self, price: Amount, maker_fee_bp: u64) -> Amount {
        price - self.maker_fee(price, maker_fee_bp)
    }

    /// Output paying the maker fee to the marketplace, if any.
    ///
    /// A maker fee below the dust threshold gets no output of its own and is
    /// paid to miners as part of the transaction fee.
    pub fn marketplace_fee_output(
        &self,
        price: Amount,
        maker_fee_bp: u64,
    ) -> SwapResult<Option<TxOut>> {
        let MakerFeeLayout::FeeOutput { address } = &self.maker_fee else {
            return Ok(None);
        };

        let fee = self.maker_fee(price, maker_fee_bp);
        if fee.to_sat() < self.dust_threshold {
            debug!("maker fee {fee} is dust and goes to miners");
            return Ok(None);
        }

        let address = parse_address(address, self.network)?;
        Ok(Some(TxOut {
            value: fee,
            script_pubkey: address.script_pubkey(),
        }))
    }

    pub(crate) fn check_maker_fee_bp(maker_fee_bp: u64) -> SwapResult<()> {
        if maker_fee_bp > BASIS_POINTS {
            return Err(SwapError::InvalidInput(format!(
                "maker fee of {maker_fee_bp} basis points exceeds 100%"
            )));
        }
        Ok(())
    }
}
