use std::num::ParseIntError;

use thiserror::Error;

/// Swap protocol error
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("invalid seller signature: {0}")]
    InvalidSellerSignature(String),
    #[error("insufficient funds: {required} sats required, {available} sats available")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("cannot finalize input {index}: {reason}")]
    FinalizationError { index: usize, reason: String },
    #[error("transaction is incomplete: input {0} is not finalized")]
    IncompleteTransaction(usize),
    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("listing is already signed; price and receive address are immutable")]
    ListingSealed,
    #[error("signing key does not control input {0}")]
    KeyMismatch(usize),
    #[error("input {0} not found")]
    InputNotFound(usize),
    #[error("inscription parser error: {0}")]
    InscriptionParser(#[from] InscriptionParseError),
    #[error("PSBT error: {0}")]
    Psbt(#[from] bitcoin::psbt::Error),
    #[error("PSBT encoding error: {0}")]
    PsbtEncoding(#[from] bitcoin::psbt::PsbtParseError),
    #[error("Bitcoin sighash error: {0}")]
    BitcoinSigHash(#[from] bitcoin::sighash::Error),
    #[error("Bitcoin script error: {0}")]
    PushBytes(#[from] bitcoin::script::PushBytesError),
    #[error("secp256k1 error: {0}")]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl SwapError {
    pub(crate) fn invalid_address(address: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn finalization(index: usize, reason: impl ToString) -> Self {
        Self::FinalizationError {
            index,
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while parsing inscription identifiers and locations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InscriptionParseError {
    #[error("invalid character: '{0}'")]
    Character(char),
    #[error("invalid length: {0}")]
    InscriptionIdLength(usize),
    #[error("invalid separator: '{0}'")]
    CharacterSeparator(char),
    #[error("invalid txid: {0}")]
    Txid(String),
    #[error("invalid index: {0}")]
    Index(ParseIntError),
    #[error("invalid sat offset: {0}")]
    Offset(ParseIntError),
    #[error("expected `txid:vout:offset`, got `{0}`")]
    SatPoint(String),
}
