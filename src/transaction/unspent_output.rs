//! Spendable outputs as reported by wallets and block explorers.

use crate::address::Address;
use crate::script::Script;
use crate::transaction::output::{parse_satoshis, Output};
use crate::util::{Error, Hash256, Result, MAX_SAFE_INTEGER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Satoshis per coin, for explorer amounts.
const SATOSHIS_PER_COIN: f64 = 1e8;

/// An output available to be spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub address: Option<Address>,
    /// Id of the transaction holding the output, in wire order.
    pub tx_id: Hash256,
    pub output_index: u32,
    pub script: Script,
    pub satoshis: u64,
    pub sequence_number: Option<u32>,
}

impl UnspentOutput {
    #[must_use]
    pub fn new(tx_id: Hash256, output_index: u32, script: Script, satoshis: u64) -> UnspentOutput {
        UnspentOutput {
            address: None,
            tx_id,
            output_index,
            script,
            satoshis,
            sequence_number: None,
        }
    }

    /// Parses `{txId, outputIndex, satoshis, script | address}`.
    ///
    /// # Errors
    /// `Error::BadArgument` for missing or malformed fields.
    pub fn from_canonical(value: &Value) -> Result<UnspentOutput> {
        let tx_id = parse_tx_id(field(value, "txId")?)?;
        let output_index = parse_index(field(value, "outputIndex")?)?;
        let satoshis = parse_satoshis(field(value, "satoshis")?)?;
        let address = parse_address(value.get("address"))?;
        let script = parse_script(value.get("script"), address.as_ref())?;
        Ok(UnspentOutput {
            address,
            tx_id,
            output_index,
            script,
            satoshis,
            sequence_number: parse_sequence(value.get("sequenceNumber"))?,
        })
    }

    /// Parses `{txid, vout, amount | satoshis, scriptPubKey | address}`.
    ///
    /// `amount` is in coins and is rounded to the nearest satoshi. `satoshis` wins if both
    /// are present.
    ///
    /// # Errors
    /// `Error::BadArgument` for missing or malformed fields.
    pub fn from_explorer_json(value: &Value) -> Result<UnspentOutput> {
        let tx_id = parse_tx_id(field(value, "txid")?)?;
        let output_index = parse_index(field(value, "vout")?)?;
        let satoshis = match (value.get("satoshis"), value.get("amount")) {
            (Some(sats), _) => parse_satoshis(sats)?,
            (None, Some(amount)) => parse_amount(amount)?,
            (None, None) => {
                return Err(Error::BadArgument(
                    "Must provide an amount for the output".to_string(),
                ))
            }
        };
        let address = parse_address(value.get("address"))?;
        let script = parse_script(value.get("scriptPubKey"), address.as_ref())?;
        Ok(UnspentOutput {
            address,
            tx_id,
            output_index,
            script,
            satoshis,
            sequence_number: parse_sequence(value.get("sequenceNumber"))?,
        })
    }

    /// Parses either shape. The shape is chosen by the id and index field names.
    ///
    /// # Errors
    /// `Error::BadArgument("Unrecognized UTXO format")` when the value matches neither shape
    /// or both, plus the errors of the chosen parser.
    pub fn from_json(value: &Value) -> Result<UnspentOutput> {
        let canonical = value.get("txId").is_some() && value.get("outputIndex").is_some();
        let explorer = value.get("txid").is_some() && value.get("vout").is_some();
        match (canonical, explorer) {
            (true, false) => UnspentOutput::from_canonical(value),
            (false, true) => UnspentOutput::from_explorer_json(value),
            _ => Err(Error::BadArgument("Unrecognized UTXO format".to_string())),
        }
    }

    /// The output being spent.
    #[must_use]
    pub fn to_output(&self) -> Output {
        Output::new(self.satoshis, self.script.clone())
    }

    #[must_use]
    pub fn to_object(&self) -> UnspentOutputObject {
        UnspentOutputObject {
            address: self.address.map(|a| a.to_string()),
            tx_id: self.tx_id.encode(),
            output_index: self.output_index,
            script: self.script.to_hex(),
            satoshis: self.satoshis,
            sequence_number: self.sequence_number,
        }
    }
}

impl fmt::Display for UnspentOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<UnspentOutput: {}:{}, satoshis: {}, address: ",
            self.tx_id.encode(),
            self.output_index,
            self.satoshis
        )?;
        match &self.address {
            Some(a) => write!(f, "{}>", a),
            None => f.write_str("undefined>"),
        }
    }
}

/// Canonical object form of an [`UnspentOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentOutputObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub tx_id: String,
    pub output_index: u32,
    pub script: String,
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value> {
    value
        .get(name)
        .ok_or_else(|| Error::BadArgument(format!("Missing field {}", name)))
}

fn parse_tx_id(value: &Value) -> Result<Hash256> {
    match value {
        Value::String(s) if s.len() == 64 => Hash256::decode(s),
        _ => Err(Error::BadArgument(
            "Invalid TXID in object: expected 64 hex characters".to_string(),
        )),
    }
}

fn parse_index(value: &Value) -> Result<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::BadArgument("Invalid outputIndex, received a non-integer".to_string()))
}

fn parse_sequence(value: Option<&Value>) -> Result<Option<u32>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| Error::BadArgument("Invalid sequenceNumber".to_string())),
    }
}

// Coins to satoshis, rounded
fn parse_amount(value: &Value) -> Result<u64> {
    let coins = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let sats = coins
        .map(|c| (c * SATOSHIS_PER_COIN).round())
        .filter(|s| s.is_finite() && *s >= 0.0 && *s <= MAX_SAFE_INTEGER as f64)
        .ok_or_else(|| Error::BadArgument("Amount must be a number".to_string()))?;
    Ok(sats as u64)
}

fn parse_address(value: Option<&Value>) -> Result<Option<Address>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(Address::from_base58(s)?)),
        Some(_) => Err(Error::BadArgument("Invalid address".to_string())),
    }
}

// Hex or ASM script, else the address's locking script
fn parse_script(value: Option<&Value>, address: Option<&Address>) -> Result<Script> {
    match (value, address) {
        (Some(Value::String(s)), _) => match Script::from_hex(s) {
            Ok(script) => Ok(script),
            Err(_) => Script::from_asm(s),
        },
        (None, Some(address)) | (Some(Value::Null), Some(address)) => Ok(address.to_script()),
        _ => Err(Error::BadArgument(
            "Must provide the scriptPubKey for that output!".to_string(),
        )),
    }
}
