//! Hash160 computation (SHA256 then RIPEMD160).

use crate::util::{Error, Result};
use bitcoin_hashes::{hash160 as bh_hash160, Hash as BHHash};
use std::fmt;

/// 160-bit hash used for public key hashes and script hashes.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash160(pub [u8; 20]);

impl Hash160 {
    /// Hex encoding in natural byte order.
    #[must_use]
    #[inline]
    pub fn encode(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses 40 hex characters.
    ///
    /// # Errors
    /// `Error::FromHexError` for bad hex, `Error::BadArgument` for a wrong length.
    pub fn decode(s: &str) -> Result<Hash160> {
        let bytes = hex::decode(s)?;
        Hash160::from_slice(&bytes)
    }

    /// Copies a 20-byte slice.
    ///
    /// # Errors
    /// `Error::BadArgument` if the slice is not 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Hash160> {
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| Error::BadArgument(format!("Hash160 length {}", bytes.len())))?;
        Ok(Hash160(array))
    }
}

/// Computes Hash160 (RIPEMD160(SHA256(data))).
#[must_use]
#[inline]
pub fn hash160(data: &[u8]) -> Hash160 {
    Hash160(bh_hash160::Hash::hash(data).to_byte_array())
}

impl From<[u8; 20]> for Hash160 {
    fn from(bytes: [u8; 20]) -> Self {
        Hash160(bytes)
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
