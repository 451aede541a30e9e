//! Transaction outputs, including the CashTokens prefix.
//!
//! On the wire an output is `satoshis (u64 LE) | varint len | blob`. When token data is
//! attached the blob starts with the token prefix and the locking script follows it:
//!
//! ```text
//! 0xef | category (32 bytes, reversed) | bitfield | [varint len | commitment] | [varint amount] | script
//! ```

use crate::script::Script;
use crate::util::{var_int, Error, Result, Serializable, MAX_SAFE_INTEGER};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io;
use std::io::{Cursor, Read, Write};

/// First byte of an output blob that carries token data.
pub const PREFIX_TOKEN: u8 = 0xef;
/// Bitfield flag: a fungible amount follows.
pub const HAS_AMOUNT: u8 = 0x10;
/// Bitfield flag: the output holds an NFT.
pub const HAS_NFT: u8 = 0x20;
/// Bitfield flag: a commitment length and commitment follow.
pub const HAS_COMMITMENT_LENGTH: u8 = 0x40;
/// Bitfield flag that must never be set.
pub const RESERVED_BIT: u8 = 0x80;
/// Largest fungible token amount (2^63 - 1).
pub const MAX_TOKEN_AMOUNT: u64 = 9_223_372_036_854_775_807;
/// Largest NFT commitment.
pub const MAX_COMMITMENT_LENGTH: usize = 40;
/// Maximum locking script length accepted when parsing. A script cannot outgrow the
/// largest block.
pub const MAX_LOCK_SCRIPT_LEN: usize = 32_000_000;

const CATEGORY_LENGTH: usize = 32;
const CAPABILITY_MASK: u8 = 0x0f;
const FORMAT_MASK: u8 = 0xf0;

/// NFT capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Capability {
    #[default]
    None = 0,
    Mutable = 1,
    Minting = 2,
}

impl Capability {
    fn from_u8(n: u8) -> Option<Capability> {
        match n {
            0 => Some(Capability::None),
            1 => Some(Capability::Mutable),
            2 => Some(Capability::Minting),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Capability::None => "none",
            Capability::Mutable => "mutable",
            Capability::Minting => "minting",
        }
    }

    /// Parses `"none"`, `"mutable"` or `"minting"`.
    ///
    /// # Errors
    /// `Error::BadData` for any other label.
    pub fn from_label(label: &str) -> Result<Capability> {
        match label {
            "none" => Ok(Capability::None),
            "mutable" => Ok(Capability::Mutable),
            "minting" => Ok(Capability::Minting),
            _ => Err(Error::BadData(
                "nft capability must be \"none\", \"mutable\", or \"minting\".".to_string(),
            )),
        }
    }
}

/// Non-fungible part of a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Nft {
    pub capability: Capability,
    pub commitment: Vec<u8>,
}

/// Token data carried by an output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenData {
    /// Category id in display order (reversed on the wire).
    pub category: [u8; 32],
    pub amount: u64,
    pub nft: Option<Nft>,
}

impl TokenData {
    /// Validated token data.
    ///
    /// # Errors
    /// `Error::BadData` for an amount above 2^63 - 1, a commitment over 40 bytes,
    /// or a fungible-only token with a zero amount.
    pub fn new(category: [u8; 32], amount: u64, nft: Option<Nft>) -> Result<TokenData> {
        if amount > MAX_TOKEN_AMOUNT {
            return Err(Error::BadData(
                "tokenData amount must be less than or equal to 9223372036854775807.".to_string(),
            ));
        }
        match &nft {
            Some(nft) if nft.commitment.len() > MAX_COMMITMENT_LENGTH => {
                return Err(Error::BadData(
                    "nft commitment length must be less than or equal to 40 bytes.".to_string(),
                ));
            }
            None if amount == 0 => {
                return Err(Error::BadData(
                    "tokenData must encode at least one token".to_string(),
                ));
            }
            _ => {}
        }
        Ok(TokenData {
            category,
            amount,
            nft,
        })
    }

    fn bitfield(&self) -> u8 {
        let mut bits = 0;
        if let Some(nft) = &self.nft {
            bits |= HAS_NFT | nft.capability as u8;
            if !nft.commitment.is_empty() {
                bits |= HAS_COMMITMENT_LENGTH;
            }
        }
        if self.amount > 0 {
            bits |= HAS_AMOUNT;
        }
        bits
    }

    /// Serialized token prefix, marker byte included.
    #[must_use]
    pub fn to_prefix(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(CATEGORY_LENGTH + 2);
        v.push(PREFIX_TOKEN);
        v.extend(self.category.iter().rev());
        let bits = self.bitfield();
        v.push(bits);
        // Writing into a Vec cannot fail.
        if let Some(nft) = self.nft.as_ref().filter(|_| bits & HAS_COMMITMENT_LENGTH != 0) {
            let _ = var_int::write_bytes(&nft.commitment, &mut v);
        }
        if bits & HAS_AMOUNT != 0 {
            let _ = var_int::write(self.amount, &mut v);
        }
        v
    }

    /// Parses a token prefix, marker byte included, returning the token data and the
    /// remaining locking script bytes.
    ///
    /// # Errors
    /// `Error::BadData` for every malformed prefix.
    pub fn from_prefix(slot: &[u8]) -> Result<(TokenData, Vec<u8>)> {
        if slot.len() < CATEGORY_LENGTH + 2 {
            return Err(bad_prefix("insufficient length."));
        }
        let mut category = [0u8; 32];
        category.copy_from_slice(&slot[1..1 + CATEGORY_LENGTH]);
        category.reverse();
        let bits = slot[1 + CATEGORY_LENGTH];
        let structure = bits & FORMAT_MASK;
        if structure & RESERVED_BIT != 0 {
            return Err(bad_prefix("reserved bit is set."));
        }
        let capability_bits = bits & CAPABILITY_MASK;
        let capability = Capability::from_u8(capability_bits).ok_or_else(|| {
            bad_prefix(&format!(
                "capability must be none (0), mutable (1), or minting (2). Capability value: {}",
                capability_bits
            ))
        })?;
        let has_nft = structure & HAS_NFT != 0;
        let has_commitment = structure & HAS_COMMITMENT_LENGTH != 0;
        let has_amount = structure & HAS_AMOUNT != 0;
        if has_commitment && !has_nft {
            return Err(bad_prefix("commitment requires an NFT."));
        }

        let mut rest = Cursor::new(&slot[CATEGORY_LENGTH + 2..]);
        let nft = if has_nft {
            let commitment = if has_commitment {
                let len = var_int::read(&mut rest)?;
                if len == 0 {
                    return Err(bad_prefix(
                        "if encoded, commitment length must be greater than 0.",
                    ));
                }
                if len > MAX_COMMITMENT_LENGTH as u64 {
                    return Err(bad_prefix("commitment length exceeds 40 bytes."));
                }
                let mut commitment = vec![0; len as usize];
                rest.read_exact(&mut commitment)?;
                commitment
            } else {
                Vec::new()
            };
            Some(Nft {
                capability,
                commitment,
            })
        } else {
            if capability != Capability::None {
                return Err(bad_prefix("capability requires an NFT."));
            }
            if !has_amount {
                return Err(bad_prefix("must encode at least one token."));
            }
            None
        };
        let amount = if has_amount { var_int::read(&mut rest)? } else { 0 };
        let mut script = Vec::new();
        rest.read_to_end(&mut script)?;
        Ok((TokenData::new(category, amount, nft)?, script))
    }

    #[must_use]
    pub fn to_object(&self) -> TokenDataObject {
        TokenDataObject {
            category: hex::encode(self.category),
            amount: self.amount.to_string(),
            nft: self.nft.as_ref().map(|nft| NftObject {
                capability: nft.capability.label().to_string(),
                commitment: hex::encode(&nft.commitment),
            }),
        }
    }

    /// Builds token data from its object form.
    ///
    /// # Errors
    /// Bad hex, a category that is not 32 bytes, or the checks of [`TokenData::new`].
    pub fn from_object(obj: &TokenDataObject) -> Result<TokenData> {
        let category = parse_category(&obj.category)?;
        let amount = parse_token_amount_str(&obj.amount)?;
        let nft = match &obj.nft {
            Some(nft) => Some(Nft {
                capability: Capability::from_label(&nft.capability)?,
                commitment: hex::decode(&nft.commitment)?,
            }),
            None => None,
        };
        TokenData::new(category, amount, nft)
    }

    /// Builds token data from untyped JSON. Amounts above 2^53 - 1 must be strings.
    ///
    /// # Errors
    /// Missing fields, malformed values or the checks of [`TokenData::new`].
    pub fn from_json(value: &Value) -> Result<TokenData> {
        let category = match value.get("category") {
            Some(Value::String(s)) => parse_category(s)?,
            _ => {
                return Err(Error::BadData(
                    "tokenData must have a category (a hex-encoded string or buffer)".to_string(),
                ))
            }
        };
        let amount = match value.get("amount") {
            Some(Value::Number(n)) => {
                let amount = n.as_u64().ok_or_else(|| {
                    Error::BadData(
                        "tokenData amount must be greater than or equal to 0".to_string(),
                    )
                })?;
                if amount > MAX_SAFE_INTEGER {
                    return Err(Error::BadData("to avoid precision loss, tokenData amount must provided as a string for values greater than 9007199254740991.".to_string()));
                }
                amount
            }
            Some(Value::String(s)) => parse_token_amount_str(s)?,
            _ => {
                return Err(Error::BadData(
                    "tokenData must have an amount (from 0 to 9223372036854775807)".to_string(),
                ))
            }
        };
        let nft = match value.get("nft") {
            Some(nft @ Value::Object(_)) => {
                let capability = match nft.get("capability") {
                    None | Some(Value::Null) => Capability::None,
                    Some(Value::String(s)) => Capability::from_label(s)?,
                    Some(other) => Capability::from_label(&other.to_string())?,
                };
                let commitment = match nft.get("commitment") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::String(s)) => hex::decode(s)?,
                    Some(_) => {
                        return Err(Error::BadData("nft commitment must be hex".to_string()))
                    }
                };
                Some(Nft {
                    capability,
                    commitment,
                })
            }
            _ => None,
        };
        TokenData::new(category, amount, nft)
    }
}

impl fmt::Display for TokenData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(token category: {}; amount: {}",
            hex::encode(self.category),
            self.amount
        )?;
        if let Some(nft) = &self.nft {
            write!(
                f,
                "; nft [capability: {}; commitment: {}]",
                nft.capability.label(),
                hex::encode(&nft.commitment)
            )?;
        }
        f.write_str(" )")
    }
}

fn bad_prefix(msg: &str) -> Error {
    Error::BadData(format!("Invalid token prefix: {}", msg))
}

fn parse_category(s: &str) -> Result<[u8; 32]> {
    hex::decode(s)?
        .try_into()
        .map_err(|_| Error::BadData("tokenData must have a 32-byte category".to_string()))
}

fn parse_token_amount_str(s: &str) -> Result<u64> {
    if s.starts_with('-') {
        return Err(Error::BadData(
            "tokenData amount must be greater than or equal to 0".to_string(),
        ));
    }
    let amount = s.parse::<BigUint>().map_err(|_| {
        Error::BadData(format!("tokenData amount {} is not an integer", s))
    })?;
    u64::try_from(amount).map_err(|_| {
        Error::BadData(
            "tokenData amount must be less than or equal to 9223372036854775807.".to_string(),
        )
    })
}

/// Parses a satoshi amount given as a JSON number or a decimal string.
///
/// # Errors
/// `Error::BadArgument` for negative, fractional or non-numeric values.
pub fn parse_satoshis(value: &Value) -> Result<u64> {
    let not_natural = || Error::BadArgument("Output satoshis is not a natural number".to_string());
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(not_natural),
        Value::String(s) => {
            let n = s.trim().parse::<BigUint>().map_err(|_| not_natural())?;
            u64::try_from(n).map_err(|_| not_natural())
        }
        _ => Err(not_natural()),
    }
}

/// A transaction output.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Output {
    /// Value in satoshis.
    pub satoshis: u64,
    /// Locking script, excluding any token prefix.
    pub script: Script,
    pub token_data: Option<TokenData>,
}

impl Output {
    #[must_use]
    pub fn new(satoshis: u64, script: Script) -> Output {
        Output {
            satoshis,
            script,
            token_data: None,
        }
    }

    /// Output carrying token data.
    ///
    /// # Errors
    /// `Error::BadData` if the script begins with the token prefix byte.
    pub fn with_token_data(satoshis: u64, script: Script, token_data: TokenData) -> Result<Output> {
        check_script(&script)?;
        Ok(Output {
            satoshis,
            script,
            token_data: Some(token_data),
        })
    }

    /// Replaces the locking script.
    ///
    /// # Errors
    /// `Error::BadData` if the script begins with the token prefix byte.
    pub fn set_script(&mut self, script: Script) -> Result<()> {
        check_script(&script)?;
        self.script = script;
        Ok(())
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        let blob = self.blob_len();
        8 + var_int::size(blob as u64) + blob
    }

    fn blob_len(&self) -> usize {
        self.token_data.as_ref().map_or(0, |t| t.to_prefix().len()) + self.script.len()
    }

    #[must_use]
    pub fn satoshis_bn(&self) -> BigUint {
        BigUint::from(self.satoshis)
    }

    /// Why the amount cannot be serialized safely, if it cannot.
    #[must_use]
    pub fn invalid_satoshis(&self) -> Option<&'static str> {
        if self.satoshis > MAX_SAFE_INTEGER {
            Some("transaction txout satoshis greater than max safe integer")
        } else {
            None
        }
    }

    #[must_use]
    pub fn to_object(&self) -> OutputObject {
        OutputObject {
            satoshis: self.satoshis,
            script: self.script.to_hex(),
            token_data: self.token_data.as_ref().map(TokenData::to_object),
        }
    }

    /// Builds an output from its object form.
    ///
    /// # Errors
    /// Bad hex, a script starting with the token prefix or invalid token data.
    pub fn from_object(obj: &OutputObject) -> Result<Output> {
        let script = Script::from_hex(&obj.script)?;
        check_script(&script)?;
        let token_data = obj.token_data.as_ref().map(TokenData::from_object).transpose()?;
        Ok(Output {
            satoshis: obj.satoshis,
            script,
            token_data,
        })
    }

    /// Builds an output from untyped JSON.
    ///
    /// `satoshis` may be a number or a decimal string. `script` may be hex or ASM.
    ///
    /// # Errors
    /// `Error::BadArgument` if the value is not an object or lacks a usable amount or script.
    pub fn from_json(value: &Value) -> Result<Output> {
        if !value.is_object() {
            return Err(Error::BadArgument("Unrecognized argument for Output".to_string()));
        }
        let satoshis = parse_satoshis(value.get("satoshis").unwrap_or(&Value::Null))?;
        let script = match value.get("script") {
            Some(Value::String(s)) => match Script::from_hex(s) {
                Ok(script) => script,
                Err(_) => Script::from_asm(s)?,
            },
            _ => return Err(Error::BadArgument("Invalid argument type: script".to_string())),
        };
        check_script(&script)?;
        let token_data = match value.get("tokenData") {
            Some(t @ Value::Object(_)) => Some(TokenData::from_json(t)?),
            _ => None,
        };
        Ok(Output {
            satoshis,
            script,
            token_data,
        })
    }
}

fn check_script(script: &Script) -> Result<()> {
    if script.0.first() == Some(&PREFIX_TOKEN) {
        return Err(Error::BadData(
            "Invalid output script: output script may not begin with PREFIX_TOKEN (239)."
                .to_string(),
        ));
    }
    Ok(())
}

impl Serializable<Output> for Output {
    fn read(reader: &mut dyn Read) -> Result<Output> {
        let satoshis = reader.read_u64::<LittleEndian>()?;
        let slot = var_int::read_bytes(reader, MAX_LOCK_SCRIPT_LEN)?;
        if slot.first() == Some(&PREFIX_TOKEN) {
            let (token_data, script) = TokenData::from_prefix(&slot)?;
            Ok(Output {
                satoshis,
                script: Script(script),
                token_data: Some(token_data),
            })
        } else {
            Ok(Output::new(satoshis, Script(slot)))
        }
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.satoshis)?;
        match &self.token_data {
            Some(token_data) => {
                let prefix = token_data.to_prefix();
                var_int::write((prefix.len() + self.script.len()) as u64, writer)?;
                writer.write_all(&prefix)?;
                writer.write_all(&self.script.0)
            }
            None => var_int::write_bytes(&self.script.0, writer),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Output ({} sats) ", self.satoshis)?;
        if let Some(token_data) = &self.token_data {
            write!(f, "{} ", token_data)?;
        }
        write!(f, "<Script: {}>>", self.script)
    }
}

/// Plain object form of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputObject {
    pub satoshis: u64,
    pub script: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_data: Option<TokenDataObject>,
}

/// Plain object form of token data. The amount is a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDataObject {
    pub category: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nft: Option<NftObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftObject {
    pub capability: String,
    pub commitment: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const CATEGORY: [u8; 32] =
        hex!("0102030405060708091011121314151617181920212223242526272829303132");

    fn p2pkh() -> Script {
        Script::from_hex("76a914000102030405060708090a0b0c0d0e0f1011121388ac").unwrap()
    }

    #[test]
    fn plain_output_wire() -> Result<()> {
        let output = Output::new(1000, p2pkh());
        let bytes = output.to_bytes();
        assert_eq!(&bytes[..8], &hex!("e803000000000000"));
        assert_eq!(bytes[8], 25);
        assert_eq!(bytes.len(), output.size());
        assert_eq!(Output::from_bytes(&bytes)?, output);
        assert_eq!(Output::from_bytes(&Output::new(5, Script::new()).to_bytes())?.script, Script::new());
        Ok(())
    }

    #[test]
    fn long_script_wire() -> Result<()> {
        let mut script = Script::new();
        script.append_data(&[0x42; 12_000]);
        let output = Output::new(0, script);
        let bytes = output.to_bytes();
        assert_eq!(bytes.len(), output.size());
        assert_eq!(Output::from_bytes(&bytes)?, output);
        Ok(())
    }

    #[test]
    fn fungible_token_wire() -> Result<()> {
        let token = TokenData::new(CATEGORY, 1000, None)?;
        let output = Output::with_token_data(800, p2pkh(), token.clone())?;
        let bytes = output.to_bytes();
        let blob = &bytes[9..];
        assert_eq!(bytes[8] as usize, blob.len());
        assert_eq!(blob[0], PREFIX_TOKEN);
        assert_eq!(blob[1], 0x32);
        assert_eq!(blob[32], 0x01);
        assert_eq!(blob[33], HAS_AMOUNT);
        assert_eq!(&blob[34..37], &[0xfd, 0xe8, 0x03]);
        assert_eq!(&blob[37..], &p2pkh().0[..]);
        let parsed = Output::from_bytes(&bytes)?;
        assert_eq!(parsed.token_data, Some(token));
        assert_eq!(parsed.script, p2pkh());
        assert_eq!(parsed.size(), bytes.len());
        Ok(())
    }

    #[test]
    fn nft_token_wire() -> Result<()> {
        let nft = Nft {
            capability: Capability::Minting,
            commitment: vec![0xaa, 0xbb],
        };
        let token = TokenData::new(CATEGORY, 0, Some(nft))?;
        assert_eq!(token.bitfield(), HAS_NFT | HAS_COMMITMENT_LENGTH | 2);
        let output = Output::with_token_data(1000, p2pkh(), token.clone())?;
        let parsed = Output::from_bytes(&output.to_bytes())?;
        assert_eq!(parsed, output);

        let bare = TokenData::new(CATEGORY, 5, Some(Nft::default()))?;
        assert_eq!(bare.bitfield(), HAS_NFT | HAS_AMOUNT);
        let (back, script) = TokenData::from_prefix(&bare.to_prefix())?;
        assert_eq!(back, bare);
        assert!(script.is_empty());
        Ok(())
    }

    fn prefix_with(bits: u8, tail: &[u8]) -> Vec<u8> {
        let mut v = vec![PREFIX_TOKEN];
        v.extend_from_slice(&CATEGORY);
        v.push(bits);
        v.extend_from_slice(tail);
        v
    }

    #[test]
    fn malformed_prefixes() {
        let err = |bits: u8, tail: &[u8]| {
            TokenData::from_prefix(&prefix_with(bits, tail))
                .unwrap_err()
                .to_string()
        };
        assert_eq!(err(RESERVED_BIT | HAS_AMOUNT, &[1]), "Bad data: Invalid token prefix: reserved bit is set.");
        assert_eq!(
            err(HAS_NFT | 3, &[]),
            "Bad data: Invalid token prefix: capability must be none (0), mutable (1), or minting (2). Capability value: 3"
        );
        assert_eq!(err(HAS_COMMITMENT_LENGTH | HAS_AMOUNT, &[1, 1, 1]), "Bad data: Invalid token prefix: commitment requires an NFT.");
        assert_eq!(err(HAS_AMOUNT | 1, &[1]), "Bad data: Invalid token prefix: capability requires an NFT.");
        assert_eq!(err(0, &[]), "Bad data: Invalid token prefix: must encode at least one token.");
        assert_eq!(
            err(HAS_NFT | HAS_COMMITMENT_LENGTH, &[0]),
            "Bad data: Invalid token prefix: if encoded, commitment length must be greater than 0."
        );
        assert_eq!(
            TokenData::from_prefix(&[PREFIX_TOKEN; 20]).unwrap_err().to_string(),
            "Bad data: Invalid token prefix: insufficient length."
        );
    }

    #[test]
    fn token_data_limits() {
        assert!(TokenData::new(CATEGORY, MAX_TOKEN_AMOUNT, None).is_ok());
        assert!(TokenData::new(CATEGORY, MAX_TOKEN_AMOUNT + 1, None).is_err());
        assert!(TokenData::new(CATEGORY, 0, None).is_err());
        let long = Nft {
            capability: Capability::Mutable,
            commitment: vec![0; 41],
        };
        assert!(TokenData::new(CATEGORY, 0, Some(long)).is_err());
    }

    #[test]
    fn script_may_not_start_with_prefix() {
        let script = Script(vec![PREFIX_TOKEN, 1]);
        let token = TokenData::new(CATEGORY, 1, None).unwrap();
        assert_eq!(
            Output::with_token_data(1, script.clone(), token).unwrap_err().to_string(),
            "Bad data: Invalid output script: output script may not begin with PREFIX_TOKEN (239)."
        );
        let mut output = Output::new(1, Script::new());
        assert!(output.set_script(script).is_err());
        assert!(output.set_script(p2pkh()).is_ok());
    }

    #[test]
    fn object_round_trip() -> Result<()> {
        let nft = Nft {
            capability: Capability::Mutable,
            commitment: vec![1, 2, 3],
        };
        let output = Output::with_token_data(
            42,
            p2pkh(),
            TokenData::new(CATEGORY, 9_007_199_254_740_993, Some(nft))?,
        )?;
        let obj = output.to_object();
        let json = serde_json::to_value(&obj)?;
        assert_eq!(json["tokenData"]["amount"], json!("9007199254740993"));
        assert_eq!(json["tokenData"]["nft"]["capability"], json!("mutable"));
        assert_eq!(Output::from_object(&obj)?, output);
        assert_eq!(Output::from_json(&json)?, output);
        let plain = serde_json::to_value(Output::new(1, Script::new()).to_object())?;
        assert!(plain.get("tokenData").is_none());
        Ok(())
    }

    #[test]
    fn json_amounts() -> Result<()> {
        let category = hex::encode(CATEGORY);
        let too_big = json!({"satoshis": 1, "script": "", "tokenData": {"category": category, "amount": 9007199254740992u64}});
        assert!(Output::from_json(&too_big).is_err());
        let as_string = json!({"satoshis": "1000", "script": "OP_RETURN", "tokenData": {"category": category, "amount": "9007199254740992"}});
        let output = Output::from_json(&as_string)?;
        assert_eq!(output.satoshis, 1000);
        assert_eq!(output.script.0, vec![0x6a]);
        assert_eq!(output.token_data.unwrap().amount, 9_007_199_254_740_992);
        assert!(Output::from_json(&json!({"satoshis": -1, "script": ""})).is_err());
        assert!(Output::from_json(&json!({"satoshis": 1.5, "script": ""})).is_err());
        assert!(Output::from_json(&json!("nope")).is_err());
        Ok(())
    }

    #[test]
    fn satoshi_limits() {
        assert_eq!(Output::new(MAX_SAFE_INTEGER, Script::new()).invalid_satoshis(), None);
        assert_eq!(
            Output::new(MAX_SAFE_INTEGER + 1, Script::new()).invalid_satoshis(),
            Some("transaction txout satoshis greater than max safe integer")
        );
        assert_eq!(Output::new(7, Script::new()).satoshis_bn(), BigUint::from(7u32));
    }

    #[test]
    fn display() -> Result<()> {
        let output = Output::new(1000, Script::build_data_out(b"hi"));
        assert_eq!(output.to_string(), "<Output (1000 sats) <Script: OP_RETURN 2 0x6869>>");
        let token = TokenData::new([0; 32], 1, None)?;
        let output = Output::with_token_data(5, Script::new(), token)?;
        assert_eq!(
            output.to_string(),
            format!("<Output (5 sats) (token category: {}; amount: 1 ) <Script: >>", "00".repeat(32))
        );
        Ok(())
    }
}
