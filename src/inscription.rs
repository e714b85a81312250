//! Inscription metadata as served by an Ordinals indexer.

mod iid;
mod satpoint;

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

pub use self::iid::InscriptionId;
pub use self::satpoint::SatPoint;
use crate::utxo::Utxo;
use crate::{SwapError, SwapResult};

/// An Ordinal inscription and the output currently holding its satoshi.
///
/// The whole output is the unit being traded: it is spent as a single input
/// and reappears as a single output of the same value on the buyer's side.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inscription {
    pub id: InscriptionId,
    #[serde(rename = "contentURI")]
    pub content_uri: String,
    pub content_type: String,
    pub genesis_transaction: Txid,
    pub inscription_number: i64,
    /// Satoshi carrying the inscription, `txid:vout:offset`
    pub location: SatPoint,
    /// Output holding the inscribed satoshi, `txid:vout`
    #[serde_as(as = "DisplayFromStr")]
    pub output: OutPoint,
    /// Value of `output` in sats
    pub output_value: u64,
    pub owner: String,
}

impl Inscription {
    /// Checks that `utxo` is the output holding this inscription.
    pub fn validate_utxo(&self, utxo: &Utxo) -> SwapResult<()> {
        if self.location.outpoint != self.output {
            return Err(SwapError::InvalidInput(format!(
                "inscription {} located at {} outside of its output {}",
                self.id, self.location, self.output
            )));
        }
        if self.location.offset >= self.output_value {
            return Err(SwapError::InvalidInput(format!(
                "inscription {} offset {} beyond output value {}",
                self.id, self.location.offset, self.output_value
            )));
        }
        if utxo.outpoint() != self.output {
            return Err(SwapError::InvalidInput(format!(
                "utxo {} does not hold inscription {} (expected {})",
                utxo.outpoint(),
                self.id,
                self.output
            )));
        }
        if utxo.value().to_sat() != self.output_value {
            return Err(SwapError::InvalidInput(format!(
                "utxo {} holds {} sats, inscription {} expects {}",
                utxo.outpoint(),
                utxo.value().to_sat(),
                self.id,
                self.output_value
            )));
        }

        Ok(())
    }
}
