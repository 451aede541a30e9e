//! Reference to a previous transaction output.

use crate::util::{Hash256, Result, Serializable};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::{Read, Write};

/// The previous output hash of a coinbase input (all zeros).
pub const COINBASE_OUTPOINT_HASH: Hash256 = Hash256([0; 32]);
/// The previous output index of a coinbase input.
pub const COINBASE_OUTPOINT_INDEX: u32 = 0xffffffff;

/// Reference to a transaction output.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct OutPoint {
    /// Hash of the referenced transaction, in wire order.
    pub hash: Hash256,
    /// Index of the output in the transaction, zero-indexed.
    pub index: u32,
}

impl OutPoint {
    /// Size of the out point in bytes (32 + 4 = 36).
    pub const SIZE: usize = 36;

    /// Returns the size of the out point in bytes.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        Self::SIZE
    }

    /// Whether this is the null out point spent by coinbase inputs.
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        self.hash == COINBASE_OUTPOINT_HASH && self.index == COINBASE_OUTPOINT_INDEX
    }
}

impl Serializable<OutPoint> for OutPoint {
    fn read(reader: &mut dyn Read) -> Result<OutPoint> {
        let hash = Hash256::read(reader)?;
        let index = reader.read_u32::<LittleEndian>()?;
        Ok(OutPoint { hash, index })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.hash.write(writer)?;
        writer.write_u32::<LittleEndian>(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn write_read() {
        let mut v = Vec::new();
        let t = OutPoint {
            hash: Hash256::decode(
                "123412345678567890ab90abcdefcdef123412345678567890ab90abcdefcdef",
            )
            .unwrap(),
            index: 7,
        };
        t.write(&mut v).unwrap();
        assert_eq!(v.len(), t.size());
        assert_eq!(&v[32..], &[7, 0, 0, 0]);
        assert_eq!(OutPoint::read(&mut Cursor::new(&v)).unwrap(), t);
        assert!(!t.is_null());
    }

    #[test]
    fn coinbase() {
        let t = OutPoint {
            hash: COINBASE_OUTPOINT_HASH,
            index: COINBASE_OUTPOINT_INDEX,
        };
        assert_eq!(OutPoint::from_bytes(&t.to_bytes()).unwrap(), t);
        assert!(t.is_null());
    }
}
