//! Implements `InscriptionId`

use std::str::FromStr;

use bitcoin::Txid;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::InscriptionParseError;

/// Identifier of an inscription: the reveal transaction id and the inscription index in it.
#[derive(
    Debug, PartialEq, Copy, Clone, Hash, Eq, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct InscriptionId {
    pub txid: Txid,
    pub index: u32,
}

impl std::fmt::Display for InscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}i{}", self.txid, self.index)
    }
}

impl FromStr for InscriptionId {
    type Err = InscriptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(char) = s.chars().find(|char| !char.is_ascii()) {
            return Err(InscriptionParseError::Character(char));
        }

        const TXID_LEN: usize = 64;
        const MIN_LEN: usize = TXID_LEN + 2;

        if s.len() < MIN_LEN {
            return Err(InscriptionParseError::InscriptionIdLength(s.len()));
        }

        let (txid, rest) = s.split_at(TXID_LEN);
        let mut rest = rest.chars();
        match rest.next() {
            Some('i') => {}
            Some(separator) => return Err(InscriptionParseError::CharacterSeparator(separator)),
            None => return Err(InscriptionParseError::InscriptionIdLength(s.len())),
        }

        Ok(Self {
            txid: txid
                .parse::<Txid>()
                .map_err(|e| InscriptionParseError::Txid(e.to_string()))?,
            index: rest
                .as_str()
                .parse::<u32>()
                .map_err(InscriptionParseError::Index)?,
        })
    }
}
