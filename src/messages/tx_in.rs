//! Wire form of a transaction input.

use crate::messages::out_point::OutPoint;
use crate::script::Script;
use crate::util::{var_int, Result, Serializable};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::{Read, Write};

/// Maximum unlock script length accepted when parsing, the largest block size.
pub const MAX_UNLOCK_SCRIPT_LEN: usize = 32_000_000;

/// Transaction input.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone)]
pub struct TxIn {
    /// The previous output transaction reference.
    pub prev_output: OutPoint,
    /// Script satisfying the spent output's locking script.
    pub unlock_script: Script,
    /// Sequence number, used for relative lock times and replacement.
    pub sequence: u32,
}

impl TxIn {
    /// Returns the size of the transaction input in bytes.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        OutPoint::SIZE
            + var_int::size(self.unlock_script.0.len() as u64)
            + self.unlock_script.0.len()
            + 4
    }
}

impl Serializable<TxIn> for TxIn {
    fn read(reader: &mut dyn Read) -> Result<TxIn> {
        let prev_output = OutPoint::read(reader)?;
        let unlock_script = Script(var_int::read_bytes(reader, MAX_UNLOCK_SCRIPT_LEN)?);
        let sequence = reader.read_u32::<LittleEndian>()?;
        Ok(TxIn {
            prev_output,
            unlock_script,
            sequence,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.prev_output.write(writer)?;
        var_int::write_bytes(&self.unlock_script.0, writer)?;
        writer.write_u32::<LittleEndian>(self.sequence)
    }
}
