//! Wire-level transaction structures.
//!
//! [`Tx`] is the plain serializable view of a transaction. Signature hashes are computed
//! over it rather than over the richer [`Transaction`](crate::transaction::Transaction).

mod out_point;
mod tx;
mod tx_in;

pub use self::out_point::{OutPoint, COINBASE_OUTPOINT_HASH, COINBASE_OUTPOINT_INDEX};
pub use self::tx::Tx;
pub use self::tx_in::{TxIn, MAX_UNLOCK_SCRIPT_LEN};
