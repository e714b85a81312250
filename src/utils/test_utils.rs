use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash as _;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, PrivateKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};

use crate::config::SwapConfig;
use crate::inscription::{Inscription, InscriptionId, SatPoint};
use crate::utxo::{Utxo, UtxoStatus};
use crate::wallet::{ListingArgs, ListingState, OfferArgs, OfferState};

// <https://mempool.space/testnet/address/tb1qzc8dhpkg5e4t6xyn4zmexxljc4nkje59dg3ark>
pub const WIF: &str = "cVkWbHmoCx6jS8AyPNQqvFr8V9r2qzDHJLaxGDQgDJfxT73w6fuU";

pub const INSCRIPTION_OUTPUT_VALUE: u64 = 10_000;
pub const DUMMY_VALUE: u64 = 1_000;
pub const PAYMENT_VALUE: u64 = 916_372;
pub const SELLER_KEY: u8 = 0x51;
pub const BUYER_KEY: u8 = 0xb7;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic testnet private key made of `seed` bytes.
pub fn private_key(seed: u8) -> PrivateKey {
    PrivateKey::from_slice(&[seed; 32], Network::Testnet).unwrap()
}

pub fn taproot_address(secp: &Secp256k1<All>, key: &PrivateKey, network: Network) -> Address {
    let (x_only, _) = key.inner.x_only_public_key(secp);
    Address::p2tr(secp, x_only, None, network)
}

pub fn segwit_address(secp: &Secp256k1<All>, key: &PrivateKey, network: Network) -> Address {
    Address::p2wpkh(&key.public_key(secp), network).unwrap()
}

pub fn legacy_address(secp: &Secp256k1<All>, key: &PrivateKey, network: Network) -> Address {
    Address::p2pkh(&key.public_key(secp), network)
}

/// A synthetic confirmed transaction funding the given outputs.
///
/// `seed` makes the spent outpoint, and therefore the txid, unique.
pub fn funding_transaction(seed: u32, outputs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::all_zeros(),
                vout: seed,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs,
    }
}

pub fn confirmed() -> UtxoStatus {
    UtxoStatus {
        confirmed: true,
        block_height: Some(0),
        block_hash: None,
        block_time: Some(0),
    }
}

/// The inscription UTXO: output 0 of a synthetic genesis transaction, owned by `owner`.
pub fn inscription_utxo(owner: &Address) -> Utxo {
    let tx = funding_transaction(
        1,
        vec![TxOut {
            value: Amount::from_sat(INSCRIPTION_OUTPUT_VALUE),
            script_pubkey: owner.script_pubkey(),
        }],
    );
    Utxo::new(tx.txid(), 0, owner.clone(), confirmed(), tx).unwrap()
}

/// Inscription record as served by the indexer, located at `utxo`.
pub fn inscription_fixture(utxo: &Utxo) -> Inscription {
    let id = InscriptionId {
        txid: utxo.txid(),
        index: 0,
    };
    Inscription {
        id,
        content_uri: format!("https://ordinals.com/content/{id}"),
        content_type: "text/plain;charset=utf-8".to_string(),
        genesis_transaction: utxo.txid(),
        inscription_number: 528,
        location: SatPoint {
            outpoint: utxo.outpoint(),
            offset: 0,
        },
        output: utxo.outpoint(),
        output_value: INSCRIPTION_OUTPUT_VALUE,
        owner: utxo.address().to_string(),
    }
}

/// Buyer funding: dummy at vout 2 and payment at vout 3 of one transaction.
pub fn buyer_utxos(owner: &Address, dummy_value: u64, payment_value: u64) -> (Utxo, Utxo) {
    let filler = TxOut {
        value: Amount::from_sat(50_000),
        script_pubkey: ScriptBuf::from_hex("0014751e76e8199196d454941c45d1b3a323f1433bd6").unwrap(),
    };
    let tx = funding_transaction(
        2,
        vec![
            filler.clone(),
            filler,
            TxOut {
                value: Amount::from_sat(dummy_value),
                script_pubkey: owner.script_pubkey(),
            },
            TxOut {
                value: Amount::from_sat(payment_value),
                script_pubkey: owner.script_pubkey(),
            },
        ],
    );
    let txid = tx.txid();
    (
        Utxo::new(txid, 2, owner.clone(), confirmed(), tx.clone()).unwrap(),
        Utxo::new(txid, 3, owner.clone(), confirmed(), tx).unwrap(),
    )
}

/// An unsigned listing of the fixture inscription at `price`, owned by `seller`.
pub fn listing_fixture(
    secp: &Secp256k1<All>,
    config: &SwapConfig,
    seller: &PrivateKey,
    seller_address: &Address,
    price: u64,
) -> ListingState {
    listing_fixture_at_offset(secp, config, seller, seller_address, price, 0)
}

/// Same as [`listing_fixture`], the inscribed sat sitting at `offset` of its output.
pub fn listing_fixture_at_offset(
    secp: &Secp256k1<All>,
    config: &SwapConfig,
    seller: &PrivateKey,
    seller_address: &Address,
    price: u64,
    offset: u64,
) -> ListingState {
    let utxo = inscription_utxo(seller_address);
    let mut inscription = inscription_fixture(&utxo);
    inscription.location.offset = offset;
    let tap_internal_key = seller_address
        .script_pubkey()
        .is_p2tr()
        .then(|| seller.inner.x_only_public_key(secp).0);

    let mut listing = ListingState::new(
        ListingArgs {
            maker_fee_bp: 1,
            seller_ord_address: seller_address.to_string(),
            price: Amount::from_sat(price),
            inscription,
            seller_receive_address: seller_address.to_string(),
            tap_internal_key,
        },
        config,
    )
    .unwrap();
    listing.set_inscription_utxo(utxo).unwrap();
    listing
}

pub fn offer_fixture(
    config: &SwapConfig,
    buyer_address: &Address,
    dummy: Utxo,
    payment: Utxo,
    fee_rate: u64,
) -> OfferState {
    OfferState::new(
        OfferArgs {
            buyer_address: buyer_address.to_string(),
            buyer_receive_address: buyer_address.to_string(),
            dummy_utxo: dummy,
            payment_utxos: vec![payment],
            fee_rate_sat_per_vb: fee_rate,
        },
        config,
    )
    .unwrap()
}

pub fn txid(hex: &str) -> Txid {
    Txid::from_str(hex).unwrap()
}
