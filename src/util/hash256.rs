//! 256-bit hash for transactions and signature digests.
//
/// It is interpreted as a single little-endian number for display.
use crate::util::{Error, Result, Serializable};
use bitcoin_hashes::{sha256d as bh_sha256d, Hash as BHHash};
use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::io::{Read, Write};

/// 256-bit hash for transactions and sighash digests.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Converts the hash into a hex string in display (reversed) order.
    #[must_use]
    #[inline]
    pub fn encode(&self) -> String {
        let mut r = self.0;
        r.reverse();
        hex::encode(r)
    }

    /// Converts a string of 64 hex characters in display order into a hash.
    ///
    /// # Errors
    /// `Error::FromHexError` for bad hex, `Error::BadArgument` for a wrong length.
    pub fn decode(s: &str) -> Result<Hash256> {
        let decoded_bytes = hex::decode(s)?;
        if decoded_bytes.len() != 32 {
            return Err(Error::BadArgument(format!(
                "Length {} of decoded bytes",
                decoded_bytes.len()
            )));
        }
        let mut hash_bytes = [0; 32];
        hash_bytes.copy_from_slice(&decoded_bytes);
        hash_bytes.reverse();
        Ok(Hash256(hash_bytes))
    }

    /// Returns true if every byte is zero.
    #[must_use]
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Serializable<Hash256> for Hash256 {
    fn read(reader: &mut dyn Read) -> Result<Hash256> {
        let mut bytes = [0; 32];
        reader.read_exact(&mut bytes)?;
        Ok(Hash256(bytes))
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

/// Hashes a data array twice using SHA256.
#[must_use]
#[inline]
pub fn sha256d(data: &[u8]) -> Hash256 {
    Hash256(bh_sha256d::Hash::hash(data).to_byte_array())
}

impl Ord for Hash256 {
    fn cmp(&self, other: &Hash256) -> Ordering {
        for i in (0..32).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Hash256) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
