//! Variable length integer (varint) ser/des for the transaction wire format.

use crate::util::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::{Read, Write};

/// Returns the number of bytes required for the varint.
#[must_use]
#[inline]
pub fn size(n: u64) -> usize {
    if n <= 252 {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffffffff {
        5
    } else {
        9
    }
}

/// Writes the var int to bytes.
#[inline]
pub fn write(n: u64, writer: &mut dyn Write) -> io::Result<()> {
    if n <= 252 {
        writer.write_u8(n as u8)
    } else if n <= 0xffff {
        writer.write_u8(0xfd)?;
        writer.write_u16::<LittleEndian>(n as u16)
    } else if n <= 0xffffffff {
        writer.write_u8(0xfe)?;
        writer.write_u32::<LittleEndian>(n as u32)
    } else {
        writer.write_u8(0xff)?;
        writer.write_u64::<LittleEndian>(n)
    }
}

/// Reads a var int from bytes.
#[inline]
pub fn read(reader: &mut dyn Read) -> io::Result<u64> {
    let n0 = reader.read_u8()?;
    match n0 {
        0xff => reader.read_u64::<LittleEndian>(),
        0xfe => reader.read_u32::<LittleEndian>().map(u64::from),
        0xfd => reader.read_u16::<LittleEndian>().map(u64::from),
        _ => Ok(n0 as u64),
    }
}

/// Writes a varint length prefix followed by the bytes.
#[inline]
pub fn write_bytes(data: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    write(data.len() as u64, writer)?;
    writer.write_all(data)
}

/// Reads a varint length prefix and that many bytes, refusing lengths above `max`.
///
/// # Errors
/// `Error::BadData` if the length exceeds `max` or the input is shorter than it.
pub fn read_bytes(reader: &mut dyn Read, max: usize) -> Result<Vec<u8>> {
    let len = read(reader)?;
    if len > max as u64 {
        return Err(Error::BadData(format!("Length {} exceeds {}", len, max)));
    }
    // Grows with the input so a lying prefix cannot force a large allocation
    let mut data = Vec::new();
    (&mut *reader).take(len).read_to_end(&mut data)?;
    if data.len() as u64 != len {
        return Err(Error::BadData(format!("Expected {} bytes, got {}", len, data.len())));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use pretty_assertions::assert_eq;

    #[test]
    fn size() {
        assert_eq!(super::size(0), 1);
        assert_eq!(super::size(253), 3);
        assert_eq!(super::size(u16::MAX as u64), 3);
        assert_eq!(super::size(u32::MAX as u64), 5);
        assert_eq!(super::size(u64::MAX), 9);
    }

    #[test]
    fn write_read() {
        write_read_value(0);
        write_read_value(253);
        write_read_value(u16::MAX as u64);
        write_read_value(u32::MAX as u64);
        write_read_value(u64::MAX);
    }

    fn write_read_value(n: u64) {
        let mut v = Vec::new();
        write(n, &mut v).unwrap();
        assert_eq!(v.len(), super::size(n));
        assert_eq!(read(&mut Cursor::new(&v)).unwrap(), n);
    }

    #[test]
    fn boundaries() {
        let mut v = Vec::new();
        write(252, &mut v).unwrap();
        write(253, &mut v).unwrap();
        assert_eq!(v, vec![0xfc, 0xfd, 0xfd, 0x00]);
    }

    #[test]
    fn bytes_with_limit() {
        let mut v = Vec::new();
        write_bytes(&[7; 300], &mut v).unwrap();
        assert_eq!(v.len(), 303);
        assert_eq!(read_bytes(&mut Cursor::new(&v), 300).unwrap(), vec![7; 300]);
        assert!(read_bytes(&mut Cursor::new(&v), 299).is_err());
    }

    #[test]
    fn truncated_bytes() {
        let mut v = Vec::new();
        write(1_000_000, &mut v).unwrap();
        v.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            read_bytes(&mut Cursor::new(&v), usize::MAX).unwrap_err().to_string(),
            "Bad data: Expected 1000000 bytes, got 3"
        );
    }

    #[test]
    fn short_read() {
        assert!(read(&mut Cursor::new(vec![0xfe, 1, 2])).is_err());
    }
}
