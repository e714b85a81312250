use bitcoin::psbt::Input;
use bitcoin::{
    Address, Amount, BlockHash, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use serde::{Deserialize, Serialize};

use crate::address::ScriptType;
use crate::{SwapError, SwapResult};

/// Confirmation status of the transaction holding an output.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
    pub block_height: Option<u32>,
    pub block_hash: Option<BlockHash>,
    pub block_time: Option<u64>,
}

/// Unspent transaction output to be used as input of a swap transaction,
/// along with the transaction that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    txid: Txid,
    vout: u32,
    address: Address,
    value: Amount,
    script_type: ScriptType,
    status: UtxoStatus,
    backing_tx: Transaction,
}

impl Utxo {
    /// Creates a new `Utxo`, checking it against its backing transaction.
    ///
    /// The value is taken from `backing_tx.output[vout]`, which must pay `address`.
    pub fn new(
        txid: Txid,
        vout: u32,
        address: Address,
        status: UtxoStatus,
        backing_tx: Transaction,
    ) -> SwapResult<Self> {
        let backing_txid = backing_tx.txid();
        if backing_txid != txid {
            return Err(SwapError::InvalidInput(format!(
                "backing transaction {backing_txid} does not match utxo {txid}:{vout}"
            )));
        }

        let output = backing_tx.output.get(vout as usize).ok_or_else(|| {
            SwapError::InvalidInput(format!("transaction {txid} has no output {vout}"))
        })?;

        if output.script_pubkey != address.script_pubkey() {
            return Err(SwapError::InvalidInput(format!(
                "output {txid}:{vout} is not owned by {address}"
            )));
        }
        let script_type = ScriptType::from_script(&output.script_pubkey)?;

        Ok(Self {
            txid,
            vout,
            address,
            value: output.value,
            script_type,
            status,
            backing_tx,
        })
    }

    pub fn txid(&self) -> Txid {
        self.txid
    }

    pub fn vout(&self) -> u32 {
        self.vout
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    pub fn status(&self) -> &UtxoStatus {
        &self.status
    }

    pub fn backing_transaction(&self) -> &Transaction {
        &self.backing_tx
    }

    /// The output being spent.
    pub fn tx_out(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.address.script_pubkey(),
        }
    }

    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    /// Unsigned transaction input spending this output.
    pub(crate) fn tx_in(&self) -> TxIn {
        TxIn {
            previous_output: self.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }
    }

    /// PSBT input map describing the spent output.
    ///
    /// The full backing transaction is always attached; segwit and taproot
    /// inputs also carry the witness UTXO their sighash commits to.
    pub(crate) fn psbt_input(&self) -> Input {
        let witness_utxo = self.script_type().is_segwit().then(|| self.tx_out());
        Input {
            non_witness_utxo: Some(self.backing_tx.clone()),
            witness_utxo,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use bitcoin::secp256k1::Secp256k1;
    use bitcoin::Network;

    use super::*;
    use crate::utils::test_utils::{
        confirmed, funding_transaction, legacy_address, private_key, taproot_address,
    };

    fn funding(address: &Address, value: u64) -> Transaction {
        funding_transaction(
            7,
            vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey: address.script_pubkey(),
            }],
        )
    }

    #[test]
    fn test_should_take_value_from_backing_transaction() {
        let secp = Secp256k1::new();
        let address = taproot_address(&secp, &private_key(1), Network::Testnet);
        let tx = funding(&address, 12_345);

        let utxo = Utxo::new(tx.txid(), 0, address.clone(), confirmed(), tx.clone()).unwrap();

        assert_eq!(utxo.value(), Amount::from_sat(12_345));
        assert_eq!(utxo.outpoint(), OutPoint::new(tx.txid(), 0));
        assert_eq!(utxo.script_type(), ScriptType::P2TR);
        assert!(utxo.status().confirmed);
    }

    #[test]
    fn test_should_reject_foreign_backing_transaction() {
        let secp = Secp256k1::new();
        let address = taproot_address(&secp, &private_key(1), Network::Testnet);
        let tx = funding(&address, 12_345);
        let other = funding(&address, 54_321);

        assert!(matches!(
            Utxo::new(other.txid(), 0, address, confirmed(), tx),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_should_reject_missing_output_and_wrong_owner() {
        let secp = Secp256k1::new();
        let owner = taproot_address(&secp, &private_key(1), Network::Testnet);
        let stranger = taproot_address(&secp, &private_key(2), Network::Testnet);
        let tx = funding(&owner, 12_345);

        assert!(matches!(
            Utxo::new(tx.txid(), 1, owner, confirmed(), tx.clone()),
            Err(SwapError::InvalidInput(_))
        ));
        assert!(matches!(
            Utxo::new(tx.txid(), 0, stranger, confirmed(), tx),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_psbt_input_depends_on_script_type() {
        let secp = Secp256k1::new();
        let key = private_key(1);

        let taproot = taproot_address(&secp, &key, Network::Testnet);
        let tx = funding(&taproot, 5_000);
        let input = Utxo::new(tx.txid(), 0, taproot, confirmed(), tx.clone())
            .unwrap()
            .psbt_input();
        assert_eq!(input.witness_utxo.unwrap().value, Amount::from_sat(5_000));
        assert_eq!(input.non_witness_utxo, Some(tx));

        let legacy = legacy_address(&secp, &key, Network::Testnet);
        let tx = funding(&legacy, 5_000);
        let input = Utxo::new(tx.txid(), 0, legacy, confirmed(), tx.clone())
            .unwrap()
            .psbt_input();
        assert!(input.witness_utxo.is_none());
        assert_eq!(input.non_witness_utxo, Some(tx));
    }
}
