//! Binary serialization/deserialization trait for wire objects.
use crate::util::Result;
use std::io;
use std::io::{Cursor, Read, Write};

/// An object that may be serialized and deserialized.
pub trait Serializable<T> {
    /// Reads the object from serialized form.
    ///
    /// # Errors
    /// Propagates IO errors or invalid data.
    fn read(reader: &mut dyn Read) -> Result<T>
    where
        Self: Sized;

    /// Writes the object to serialized form.
    ///
    /// # Errors
    /// IO errors.
    fn write(&self, writer: &mut dyn Write) -> io::Result<()>;

    /// Serializes into a new byte vector.
    fn to_bytes(&self) -> Vec<u8> {
        let mut v = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut v);
        v
    }

    /// Reads the object from a byte slice, ignoring any trailing bytes.
    ///
    /// # Errors
    /// Propagates read errors.
    fn from_bytes(bytes: &[u8]) -> Result<T>
    where
        Self: Sized,
    {
        Self::read(&mut Cursor::new(bytes))
    }
}
