//! # ord-swap
//!
//! Trustless swaps of Ordinal inscriptions for bitcoin, built on partially
//! signed Bitcoin transactions (PSBT).
//!
//! # Get started
//!
//! The seller lists an inscription by signing a one-input, one-output PSBT
//! with `SIGHASH_SINGLE | SIGHASH_ANYONECANPAY`: the signature commits to the
//! inscription input and the seller's proceeds output only. The buyer merges
//! that signed input into a larger transaction which pays the seller, moves the
//! inscription to the buyer and returns the change, then signs the remaining
//! inputs and broadcasts it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ord_swap::{
//!     BuyerSigner, ListingState, OfferState, SellerSigner, SwapConfig, Wallet,
//! };
//!
//! let config = SwapConfig::new(bitcoin::Network::Testnet);
//!
//! // seller side
//! let mut listing = ListingState::new(listing_args.clone(), &config)?;
//! listing.set_inscription_utxo(inscription_utxo)?;
//! let seller = SellerSigner::new(&config);
//! seller.build_unsigned_listing(&mut listing)?;
//! seller.sign_listing(&mut listing, &Wallet::new(&secp, seller_key))?;
//! let signed_listing = listing.signed_listing_base64().unwrap_or_default();
//!
//! // buyer side
//! let listing = ListingState::with_signed_psbt(listing_args, &config, &signed_listing)?;
//! let wallet = Wallet::new(&secp, buyer_key);
//! let mut offer = OfferState::new(offer_args, &config)?;
//! let swap = BuyerSigner::new(&config, &wallet).build_swap(&mut offer, &listing)?;
//! let tx = ord_swap::extract_transaction(&swap)?;
//! ```
//!

#[macro_use]
extern crate log;

mod address;
mod config;
mod error;
pub mod inscription;
pub mod psbt;
mod result;
pub mod upstream;
pub mod utils;
mod utxo;
pub mod wallet;

pub use bitcoin;

pub use self::address::{parse_address, ScriptType};
pub use self::config::{MakerFeeLayout, SwapConfig};
pub use self::error::{InscriptionParseError, SwapError};
pub use self::inscription::{Inscription, InscriptionId, SatPoint};
pub use self::psbt::{decode_psbt, encode_psbt, extract_transaction, finalize_input};
pub use self::result::SwapResult;
pub use self::utxo::{Utxo, UtxoStatus};
pub use self::wallet::{
    BuyerSigner, ListingArgs, ListingState, OfferArgs, OfferState, SellerSigner, SighashMode,
    Wallet, SELLER_INPUT_INDEX,
};
