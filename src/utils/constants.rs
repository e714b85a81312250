/// Value of the output returning the dummy UTXO to the buyer.
pub const DUMMY_REPLACEMENT_VALUE: u64 = 1_000;
/// Maximum value a dummy UTXO may carry.
pub const MAX_DUMMY_VALUE: u64 = 10_000;
/// Minimum relayable value of a change output.
pub const DUST_THRESHOLD: u64 = 546;
/// Basis points in 100%.
pub const BASIS_POINTS: u64 = 10_000;
