//! Wire form of a transaction, used as the signing view.

use crate::messages::TxIn;
use crate::transaction::output::Output;
use crate::util::{sha256d, var_int, Error, Hash256, Result, Serializable};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io;
use std::io::{Read, Write};

/// Maximum number of inputs or outputs accepted when parsing.
const MAX_ITEMS: u64 = 1_000_000;

/// A transaction holding only the fields that are serialized.
#[derive(Default, PartialEq, Eq, Hash, Clone)]
pub struct Tx {
    /// Transaction version.
    pub version: i32,
    /// Transaction inputs.
    pub inputs: Vec<TxIn>,
    /// Transaction outputs.
    pub outputs: Vec<Output>,
    /// The block number or timestamp at which this transaction is unlocked.
    pub lock_time: u32,
}

impl Tx {
    /// Double SHA-256 of the serialized transaction, in wire order.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.to_bytes())
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        8 + var_int::size(self.inputs.len() as u64)
            + self.inputs.iter().map(TxIn::size).sum::<usize>()
            + var_int::size(self.outputs.len() as u64)
            + self.outputs.iter().map(Output::size).sum::<usize>()
    }

    /// Returns whether the transaction is the block reward (coinbase).
    #[must_use]
    #[inline]
    pub fn coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_output.is_null()
    }
}

fn read_count(reader: &mut dyn Read, what: &str) -> Result<u64> {
    let n = var_int::read(reader)?;
    if n > MAX_ITEMS {
        return Err(Error::BadData(format!("Too many {}: {}", what, n)));
    }
    Ok(n)
}

impl Serializable<Tx> for Tx {
    fn read(reader: &mut dyn Read) -> Result<Tx> {
        let version = reader.read_i32::<LittleEndian>()?;
        let n_inputs = read_count(reader, "inputs")?;
        let mut inputs = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            inputs.push(TxIn::read(reader)?);
        }
        let n_outputs = read_count(reader, "outputs")?;
        let mut outputs = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            outputs.push(Output::read(reader)?);
        }
        let lock_time = reader.read_u32::<LittleEndian>()?;
        Ok(Tx {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_i32::<LittleEndian>(self.version)?;
        var_int::write(self.inputs.len() as u64, writer)?;
        for tx_in in &self.inputs {
            tx_in.write(writer)?;
        }
        var_int::write(self.outputs.len() as u64, writer)?;
        for output in &self.outputs {
            output.write(writer)?;
        }
        writer.write_u32::<LittleEndian>(self.lock_time)
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inputs_str = format!("[<{} inputs>]", self.inputs.len());
        let outputs_str = format!("[<{} outputs>]", self.outputs.len());
        f.debug_struct("Tx")
            .field("version", &self.version)
            .field("inputs", if self.inputs.len() <= 3 { &self.inputs } else { &inputs_str })
            .field("outputs", if self.outputs.len() <= 3 { &self.outputs } else { &outputs_str })
            .field("lock_time", &self.lock_time)
            .finish()
    }
}
