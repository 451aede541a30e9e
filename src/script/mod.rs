//! Script construction and shape recognition.
//!
//! Scripts are built and inspected here but never executed.
//!
//! # Examples
//!
//! ```
//! use utxo_sign::script::op_codes::*;
//! use utxo_sign::script::Script;
//!
//! let mut script = Script::new();
//! script.append(OP_DUP);
//! script.append(OP_HASH160);
//! script.append_data(&[0x11; 20]);
//! script.append(OP_EQUALVERIFY);
//! script.append(OP_CHECKSIG);
//! assert!(script.is_public_key_hash_out());
//! assert!(script.to_string().starts_with("OP_DUP OP_HASH160 20 0x1111"));
//! ```

pub mod escrow;
pub mod op_codes;
mod standard;

use crate::script::op_codes::*;
use crate::util::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Raw script bytes.
#[derive(Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Script(pub Vec<u8>);

/// One parsed script element: an opcode and, for pushes, its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub opcode: u8,
    pub data: Option<Vec<u8>>,
}

impl Chunk {
    /// Whether this chunk only pushes data (including small integers).
    #[must_use]
    pub fn is_push_only(&self) -> bool {
        self.opcode <= OP_16
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.data {
            None => match op_name(self.opcode) {
                Some(name) => f.write_str(name),
                None => write!(f, "0x{:02x}", self.opcode),
            },
            Some(data) => {
                let mut parts = Vec::with_capacity(3);
                if self.opcode >= OP_PUSHDATA1 {
                    parts.push(op_name(self.opcode).unwrap_or("OP_PUSHDATA").to_string());
                }
                if !data.is_empty() {
                    parts.push(data.len().to_string());
                    parts.push(format!("0x{}", hex::encode(data)));
                }
                f.write_str(&parts.join(" "))
            }
        }
    }
}

impl Script {
    /// Creates an empty script.
    #[must_use]
    #[inline]
    pub fn new() -> Script {
        Script(Vec::new())
    }

    /// Appends a single opcode.
    #[inline]
    pub fn append(&mut self, byte: u8) {
        self.0.push(byte);
    }

    /// Appends raw bytes without a length prefix.
    #[inline]
    pub fn append_slice(&mut self, slice: &[u8]) {
        self.0.extend_from_slice(slice);
    }

    /// Appends a data push using the shortest length prefix.
    pub fn append_data(&mut self, data: &[u8]) {
        let len = data.len();
        match len {
            0..=75 => self.0.push(len as u8),
            76..=0xff => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(len as u8);
            }
            0x100..=0xffff => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(len as u16).to_le_bytes());
            }
            _ => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(len as u32).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
    }

    /// Appends `OP_0` through `OP_16`.
    ///
    /// # Errors
    /// `Error::BadArgument` for values above 16.
    pub fn append_num(&mut self, n: usize) -> Result<()> {
        let op = u8::try_from(n)
            .ok()
            .and_then(small_int)
            .ok_or_else(|| Error::BadArgument(format!("Invalid small integer {}", n)))?;
        self.0.push(op);
        Ok(())
    }

    /// Appends another script's bytes.
    #[inline]
    pub fn append_script(&mut self, other: &Script) {
        self.0.extend_from_slice(&other.0);
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses hex script bytes.
    ///
    /// # Errors
    /// `Error::FromHexError` for invalid hex.
    pub fn from_hex(s: &str) -> Result<Script> {
        Ok(Script(hex::decode(s)?))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Splits the script into opcodes and pushes.
    ///
    /// # Errors
    /// `Error::ScriptError` if a push runs past the end of the script.
    pub fn chunks(&self) -> Result<Vec<Chunk>> {
        let script = &self.0;
        let mut chunks = Vec::new();
        let mut i = 0;
        while i < script.len() {
            let opcode = script[i];
            let (start, len) = match opcode {
                len @ 1..=75 => (i + 1, len as usize),
                OP_PUSHDATA1 => {
                    let b = push_len(script, i, 1)?;
                    (i + 2, b[0] as usize)
                }
                OP_PUSHDATA2 => {
                    let b = push_len(script, i, 2)?;
                    (i + 3, u16::from_le_bytes([b[0], b[1]]) as usize)
                }
                OP_PUSHDATA4 => {
                    let b = push_len(script, i, 4)?;
                    (i + 5, u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
                }
                _ => {
                    chunks.push(Chunk { opcode, data: None });
                    i += 1;
                    continue;
                }
            };
            let end = start + len;
            if end > script.len() {
                return Err(Error::ScriptError(format!(
                    "Push of {} bytes at {} exceeds script length",
                    len, i
                )));
            }
            chunks.push(Chunk {
                opcode,
                data: Some(script[start..end].to_vec()),
            });
            i = end;
        }
        Ok(chunks)
    }

    /// Copy of the script without any `OP_CODESEPARATOR`.
    #[must_use]
    pub fn remove_codeseparators(&self) -> Script {
        let mut out = Vec::with_capacity(self.0.len());
        let mut i = 0;
        while i < self.0.len() {
            let next = next_op(i, &self.0).min(self.0.len());
            if self.0[i] != OP_CODESEPARATOR {
                out.extend_from_slice(&self.0[i..next]);
            }
            i = next;
        }
        Script(out)
    }

    /// Parses the space separated form produced by `Display`.
    ///
    /// # Errors
    /// `Error::ScriptError` for unknown tokens or push lengths that do not match their data.
    pub fn from_asm(s: &str) -> Result<Script> {
        let mut script = Script::new();
        let mut tokens = s.split_whitespace();
        while let Some(token) = tokens.next() {
            if let Some(op) = op_from_name(token) {
                if (OP_PUSHDATA1..=OP_PUSHDATA4).contains(&op) {
                    let len = tokens.next().map(parse_push_len).transpose()?.unwrap_or(0);
                    let data = match tokens.next() {
                        Some(d) if len > 0 => parse_push_data(d, len)?,
                        _ => Vec::new(),
                    };
                    script.append(op);
                    match op {
                        OP_PUSHDATA1 => script.append(len as u8),
                        OP_PUSHDATA2 => script.append_slice(&(len as u16).to_le_bytes()),
                        _ => script.append_slice(&(len as u32).to_le_bytes()),
                    }
                    script.append_slice(&data);
                } else {
                    script.append(op);
                }
            } else if let Some(raw) = token.strip_prefix("0x") {
                script.append_slice(&hex::decode(raw)?);
            } else {
                let len = parse_push_len(token)?;
                if len == 0 || len >= OP_PUSHDATA1 as usize {
                    return Err(Error::ScriptError(format!("Invalid script token {}", token)));
                }
                let data = tokens
                    .next()
                    .ok_or_else(|| Error::ScriptError(format!("Missing data for push {}", len)))?;
                script.append(len as u8);
                script.append_slice(&parse_push_data(data, len)?);
            }
        }
        Ok(script)
    }
}

fn push_len(script: &[u8], i: usize, width: usize) -> Result<&[u8]> {
    script
        .get(i + 1..i + 1 + width)
        .ok_or_else(|| Error::ScriptError(format!("Truncated push length at {}", i)))
}

fn parse_push_len(token: &str) -> Result<usize> {
    token
        .parse::<usize>()
        .map_err(|_| Error::ScriptError(format!("Invalid script token {}", token)))
}

fn parse_push_data(token: &str, len: usize) -> Result<Vec<u8>> {
    let raw = token
        .strip_prefix("0x")
        .ok_or_else(|| Error::ScriptError(format!("Expected 0x data, found {}", token)))?;
    let data = hex::decode(raw)?;
    if data.len() != len {
        return Err(Error::ScriptError(format!(
            "Push length {} does not match {} data bytes",
            len,
            data.len()
        )));
    }
    Ok(data)
}

/// Index of the opcode following the one at `i`, skipping push data.
#[must_use]
pub fn next_op(i: usize, script: &[u8]) -> usize {
    if i >= script.len() {
        return script.len();
    }
    match script[i] {
        len @ 1..=75 => i + 1 + len as usize,
        OP_PUSHDATA1 => {
            if i + 2 > script.len() {
                script.len()
            } else {
                i + 2 + script[i + 1] as usize
            }
        }
        OP_PUSHDATA2 => {
            if i + 3 > script.len() {
                script.len()
            } else {
                i + 3 + u16::from_le_bytes([script[i + 1], script[i + 2]]) as usize
            }
        }
        OP_PUSHDATA4 => {
            if i + 5 > script.len() {
                script.len()
            } else {
                let len = u32::from_le_bytes([
                    script[i + 1],
                    script[i + 2],
                    script[i + 3],
                    script[i + 4],
                ]);
                i + 5 + len as usize
            }
        }
        _ => i + 1,
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.chunks() {
            Ok(chunks) => {
                let parts: Vec<String> = chunks.iter().map(Chunk::to_string).collect();
                f.write_str(&parts.join(" "))
            }
            Err(_) => write!(f, "<invalid script 0x{}>", self.to_hex()),
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Script({})", self)
    }
}

impl FromStr for Script {
    type Err = Error;

    fn from_str(s: &str) -> Result<Script> {
        Script::from_asm(s)
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Script {
        Script(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
