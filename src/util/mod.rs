//! Miscellaneous helpers shared across the crate.

pub mod hash160;
mod hash256;
mod result;
mod serdes;
pub mod var_int;

pub use self::hash160::{hash160, Hash160};
pub use self::hash256::{sha256d, Hash256};
pub use self::result::{Error, Result};
pub use self::serdes::Serializable;

/// Largest integer a double can hold exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 0x1f_ffff_ffff_ffff;
