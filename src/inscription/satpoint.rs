use std::str::FromStr;

use bitcoin::{OutPoint, Txid};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::InscriptionParseError;

/// Location of a single satoshi: `txid:vout:offset`.
#[derive(
    Debug, PartialEq, Copy, Clone, Hash, Eq, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct SatPoint {
    pub outpoint: OutPoint,
    /// Offset of the satoshi inside the output value
    pub offset: u64,
}

impl std::fmt::Display for SatPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.outpoint, self.offset)
    }
}

impl FromStr for SatPoint {
    type Err = InscriptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(txid), Some(vout), Some(offset), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(InscriptionParseError::SatPoint(s.to_string()));
        };

        Ok(Self {
            outpoint: OutPoint {
                txid: txid
                    .parse::<Txid>()
                    .map_err(|e| InscriptionParseError::Txid(e.to_string()))?,
                vout: vout
                    .parse::<u32>()
                    .map_err(InscriptionParseError::Index)?,
            },
            offset: offset
                .parse::<u64>()
                .map_err(InscriptionParseError::Offset)?,
        })
    }
}
