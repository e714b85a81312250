mod listing;
mod offer;
mod signer;

pub use listing::{ListingArgs, ListingState, SellerSigner};
pub use offer::{BuyerSigner, OfferArgs, OfferState, SELLER_INPUT_INDEX};
pub use signer::Wallet;

pub use crate::psbt::SighashMode;
