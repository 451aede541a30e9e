//! Transaction building, signing and checking.
//!
//! A [`Transaction`] holds typed inputs that know the outputs they spend, so it can compute
//! fees and change, produce signatures for each input kind, and refuse to serialize when the
//! result would be rejected or wasteful.
//!
//! # Examples
//!
//! Spend a P2PKH output, sending half to an address and the rest back as change:
//! ```
//! use utxo_sign::address::Address;
//! use utxo_sign::crypto::{PrivateKey, SigningMethod};
//! use utxo_sign::network::Network;
//! use utxo_sign::transaction::{SerializationOptions, Transaction, UnspentOutput};
//! use utxo_sign::util::Hash256;
//!
//! let key = PrivateKey::new(&[1; 32]).unwrap();
//! let address = Address::from_public_key(&key.public_key(), Network::Testnet);
//! let utxo = UnspentOutput::new(Hash256([7; 32]), 0, address.to_script(), 100_000);
//!
//! let mut tx = Transaction::new();
//! tx.from_utxo(&utxo).unwrap()
//!     .to(&address, 50_000).unwrap()
//!     .change(&address).unwrap()
//!     .sign(&[key], None, SigningMethod::Ecdsa).unwrap();
//! assert!(tx.is_fully_signed().unwrap());
//! let raw = tx.serialize(&SerializationOptions::default()).unwrap();
//! assert_eq!(Transaction::from_hex(&raw).unwrap().id(), tx.id());
//! ```

pub mod input;
pub mod output;
pub mod sighash;
pub mod signature;
pub mod unspent_output;

pub use self::input::{Input, InputBase, InputObject, Signable};
pub use self::output::{Output, OutputObject};
pub use self::signature::TransactionSignature;
pub use self::unspent_output::UnspentOutput;

use self::input::{
    EscrowInput, MultiSigInput, MultiSigScriptHashInput, PublicKeyHashInput, PublicKeyInput,
    DEFAULT_LOCKTIME_SEQNUMBER, DEFAULT_RBF_SEQNUMBER, DEFAULT_SEQNUMBER,
};
use self::output::PREFIX_TOKEN;
use self::sighash::{DEFAULT_SIGN_FLAGS, SCRIPT_ENABLE_SIGHASH_FORKID, SIGHASH_ALL, SIGHASH_FORKID};
use crate::address::Address;
use crate::crypto::{PrivateKey, PublicKey, Signature, SigningMethod};
use crate::messages::{OutPoint, Tx};
use crate::network::Chain;
use crate::script::Script;
use crate::util::{Error, Hash256, Result, Serializable};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::io::{Cursor, Read, Write};

/// Smallest non-data output value accepted.
pub const DUST_AMOUNT: u64 = 546;
/// Factor by which the fee may exceed or fall short of the estimate.
pub const FEE_SECURITY_MARGIN: i64 = 150;
pub const MAX_MONEY: u64 = 2_100_000_000_000_000;
/// Lock times below this are block heights, at or above it timestamps.
pub const NLOCKTIME_BLOCKHEIGHT_LIMIT: u32 = 500_000_000;
pub const NLOCKTIME_MAX_VALUE: u32 = u32::MAX;
/// Default fee rate in satoshis per kilobyte.
pub const FEE_PER_KB: u64 = 100_000;
/// Size of a P2PKH change output plus slack.
pub const CHANGE_OUTPUT_MAX_SIZE: usize = 62;
/// Version, lock time and the two counts.
pub const MAXIMUM_EXTRA_SIZE: usize = 4 + 9 + 9 + 4;
pub const DEFAULT_VERSION: i32 = 1;
pub const CURRENT_VERSION: i32 = 2;
pub const MAX_BLOCK_SIZE: usize = 32_000_000;

const UNRECOGNIZED_INPUT: &str = "Unrecognized script kind, or not enough information to \
    execute script. This usually happens when creating a transaction from a serialized \
    transaction";

/// Checks skipped by [`Transaction::serialize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializationOptions {
    pub disable_all: bool,
    pub disable_dust_outputs: bool,
    pub disable_is_fully_signed: bool,
    pub disable_large_fees: bool,
    pub disable_small_fees: bool,
    pub disable_more_output_than_input: bool,
}

/// Absolute lock time of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTime {
    BlockHeight(u32),
    /// Unix time in seconds.
    Timestamp(u32),
}

/// A transaction under construction, with the spent outputs of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub n_lock_time: u32,
    change_script: Option<Script>,
    change_index: Option<usize>,
    fee: Option<i64>,
    fee_per_kb: Option<u64>,
    fee_per_byte: Option<u64>,
    sign_flags: u32,
}

impl Default for Transaction {
    fn default() -> Transaction {
        Transaction::new()
    }
}

#[allow(clippy::wrong_self_convention)]
impl Transaction {
    /// Empty transaction signing with the fork-id algorithm.
    #[must_use]
    pub fn new() -> Transaction {
        Transaction {
            version: DEFAULT_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            n_lock_time: 0,
            change_script: None,
            change_index: None,
            fee: None,
            fee_per_kb: None,
            fee_per_byte: None,
            sign_flags: DEFAULT_SIGN_FLAGS,
        }
    }

    /// Empty transaction using the signing rules of `chain`.
    #[must_use]
    pub fn for_chain(chain: Chain) -> Transaction {
        let mut tx = Transaction::new();
        tx.sign_flags = chain.sign_flags();
        tx
    }

    /// Parses a serialized transaction. Its inputs are generic until associated with UTXOs.
    /// [`Serializable::from_bytes`] does the same on raw bytes.
    ///
    /// # Errors
    /// Bad hex or wire data, or trailing bytes.
    pub fn from_hex(s: &str) -> Result<Transaction> {
        Transaction::from_bytes(&hex::decode(s)?)
    }

    #[must_use]
    pub fn sign_flags(&self) -> u32 {
        self.sign_flags
    }

    pub fn set_sign_flags(&mut self, flags: u32) -> &mut Self {
        self.sign_flags = flags;
        self
    }

    /// `ALL|FORKID` when the fork-id algorithm is enabled, otherwise `ALL`.
    #[must_use]
    pub fn default_sighash_type(&self) -> u32 {
        if self.sign_flags & SCRIPT_ENABLE_SIGHASH_FORKID != 0 {
            SIGHASH_ALL | SIGHASH_FORKID
        } else {
            SIGHASH_ALL
        }
    }

    /// Plain wire view used for hashing and signing.
    #[must_use]
    pub fn to_tx(&self) -> Tx {
        Tx {
            version: self.version,
            inputs: self.inputs.iter().map(|i| i.base().to_tx_in()).collect(),
            outputs: self.outputs.clone(),
            lock_time: self.n_lock_time,
        }
    }

    /// Transaction hash in wire order.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        self.to_tx().hash()
    }

    /// Transaction id as displayed by explorers.
    #[must_use]
    pub fn id(&self) -> String {
        self.hash().encode()
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].base().is_null()
    }

    // Inputs

    /// Adds an input spending `utxo`, typed by its locking script. Already spent outpoints
    /// are skipped.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn from_utxo(&mut self, utxo: &UnspentOutput) -> Result<&mut Self> {
        if self.spends(utxo) {
            return Ok(self);
        }
        let input = input_from_utxo(utxo)?;
        self.unchecked_add_input(input)
    }

    /// [`Transaction::from_utxo`] for each UTXO.
    ///
    /// # Errors
    /// The first failure of [`Transaction::from_utxo`].
    pub fn from_utxos(&mut self, utxos: &[UnspentOutput]) -> Result<&mut Self> {
        for utxo in utxos {
            self.from_utxo(utxo)?;
        }
        Ok(self)
    }

    /// Adds an input spending a bare or P2SH multisig UTXO.
    ///
    /// # Errors
    /// A threshold above the key count, a script that is not multisig or P2SH, or keys that
    /// do not match the script.
    pub fn from_multisig_utxo(
        &mut self,
        utxo: &UnspentOutput,
        public_keys: &[PublicKey],
        threshold: usize,
        no_sorting: bool,
    ) -> Result<&mut Self> {
        if self.spends(utxo) {
            return Ok(self);
        }
        let input = multisig_input_from_utxo(utxo, public_keys, threshold, no_sorting)?;
        self.unchecked_add_input(input)
    }

    /// Adds an input spending an escrow UTXO through its reclaim branch.
    ///
    /// # Errors
    /// Keys that do not hash to the UTXO script.
    pub fn from_escrow_utxo(
        &mut self,
        utxo: &UnspentOutput,
        input_public_keys: &[PublicKey],
        reclaim_public_key: PublicKey,
    ) -> Result<&mut Self> {
        if self.spends(utxo) {
            return Ok(self);
        }
        let input = EscrowInput::new(base_from_utxo(utxo), input_public_keys, reclaim_public_key)?;
        self.unchecked_add_input(Input::Escrow(input))
    }

    /// Adds an input whose spent output is known.
    ///
    /// # Errors
    /// `Error::BadArgument` if the input has no spent output.
    pub fn add_input(&mut self, input: Input) -> Result<&mut Self> {
        if input.base().output.is_none() {
            return Err(Error::BadArgument(
                "Need information about the UTXO script and satoshis".to_string(),
            ));
        }
        self.unchecked_add_input(input)
    }

    /// Adds an input after attaching the output it spends.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn add_input_with_output(&mut self, mut input: Input, output: Output) -> Result<&mut Self> {
        input.base_mut().output = Some(output);
        self.unchecked_add_input(input)
    }

    /// Adds an input without checking for its spent output.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn unchecked_add_input(&mut self, input: Input) -> Result<&mut Self> {
        debug!(
            "Adding input {}:{}",
            input.base().prev_tx_id.encode(),
            input.base().output_index
        );
        self.inputs.push(input);
        self.update_change_output()?;
        Ok(self)
    }

    /// # Errors
    /// `Error::BadArgument` for an index out of range.
    pub fn remove_input(&mut self, index: usize) -> Result<&mut Self> {
        if index >= self.inputs.len() {
            return Err(Error::BadArgument(format!("Invalid input index {}", index)));
        }
        self.inputs.remove(index);
        self.update_change_output()?;
        Ok(self)
    }

    /// Removes the input spending `tx_id:output_index`.
    ///
    /// # Errors
    /// `Error::BadArgument` if no input spends it.
    pub fn remove_input_by_outpoint(&mut self, tx_id: &Hash256, output_index: u32) -> Result<&mut Self> {
        let index = self
            .inputs
            .iter()
            .position(|i| i.base().prev_tx_id == *tx_id && i.base().output_index == output_index)
            .ok_or_else(|| {
                Error::BadArgument(format!("No input spends {}:{}", tx_id.encode(), output_index))
            })?;
        self.remove_input(index)
    }

    /// Whether every input knows the output it spends.
    #[must_use]
    pub fn has_all_utxo_info(&self) -> bool {
        self.inputs.iter().all(|i| i.base().output.is_some())
    }

    /// Replaces inputs spending the given UTXOs with typed inputs. Sequence numbers of the
    /// replaced inputs are kept unless the UTXO carries one. Returns, per UTXO, the index
    /// of the matching input.
    ///
    /// `public_keys` and `threshold` select multisig inputs when `public_keys` is not empty.
    ///
    /// # Errors
    /// Failures building a typed input.
    pub fn associate_inputs(
        &mut self,
        utxos: &[UnspentOutput],
        public_keys: &[PublicKey],
        threshold: usize,
    ) -> Result<Vec<Option<usize>>> {
        let mut indexes = Vec::with_capacity(utxos.len());
        for utxo in utxos {
            let index = self.inputs.iter().position(|i| {
                i.base().prev_tx_id == utxo.tx_id && i.base().output_index == utxo.output_index
            });
            if let Some(index) = index {
                let mut input = if public_keys.is_empty() {
                    input_from_utxo(utxo)?
                } else {
                    multisig_input_from_utxo(utxo, public_keys, threshold, false)?
                };
                if utxo.sequence_number.is_none() {
                    input.base_mut().sequence_number = self.inputs[index].base().sequence_number;
                }
                self.inputs[index] = input;
            }
            indexes.push(index);
        }
        Ok(indexes)
    }

    fn spends(&self, utxo: &UnspentOutput) -> bool {
        self.inputs
            .iter()
            .any(|i| i.base().prev_tx_id == utxo.tx_id && i.base().output_index == utxo.output_index)
    }

    // Outputs

    /// Pays `amount` satoshis to `address`.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn to(&mut self, address: &Address, amount: u64) -> Result<&mut Self> {
        self.add_output(Output::new(amount, address.to_script()))
    }

    /// [`Transaction::to`] for each pair.
    ///
    /// # Errors
    /// The first failure of [`Transaction::to`].
    pub fn to_many(&mut self, payments: &[(Address, u64)]) -> Result<&mut Self> {
        for (address, amount) in payments {
            self.to(address, *amount)?;
        }
        Ok(self)
    }

    /// Adds a zero-value `OP_RETURN` output carrying `data`.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn add_data(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.add_output(Output::new(0, Script::build_data_out(data)))
    }

    /// # Errors
    /// A plain output whose script starts with the token prefix, or change recomputation
    /// failures.
    pub fn add_output(&mut self, output: Output) -> Result<&mut Self> {
        if output.token_data.is_none() && output.script.0.first() == Some(&PREFIX_TOKEN) {
            return Err(Error::BadData(
                "Invalid output script: output script may not begin with PREFIX_TOKEN (239)."
                    .to_string(),
            ));
        }
        debug!("Adding output of {} satoshis", output.satoshis);
        self.outputs.push(output);
        self.update_change_output()?;
        Ok(self)
    }

    /// Removes every output, including change.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn clear_outputs(&mut self) -> Result<&mut Self> {
        self.outputs.clear();
        self.change_index = None;
        self.update_change_output()?;
        Ok(self)
    }

    /// # Errors
    /// `Error::BadArgument` for an index out of range.
    pub fn remove_output(&mut self, index: usize) -> Result<&mut Self> {
        if index >= self.outputs.len() {
            return Err(Error::BadArgument(format!("Invalid output index {}", index)));
        }
        self.remove_output_at(index);
        self.update_change_output()?;
        Ok(self)
    }

    fn remove_output_at(&mut self, index: usize) {
        self.outputs.remove(index);
        self.change_index = match self.change_index {
            Some(i) if i == index => None,
            Some(i) if i > index => Some(i - 1),
            other => other,
        };
    }

    // Fees and change

    /// Fixes the fee, overriding any estimate.
    ///
    /// # Errors
    /// `Error::BadArgument` for amounts beyond `i64`, or change recomputation failures.
    pub fn fee(&mut self, amount: u64) -> Result<&mut Self> {
        let amount = i64::try_from(amount)
            .map_err(|_| Error::BadArgument("Fee amount is too large".to_string()))?;
        self.fee = Some(amount);
        self.update_change_output()?;
        Ok(self)
    }

    /// Sets the estimate rate in satoshis per kilobyte.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn fee_per_kb(&mut self, amount: u64) -> Result<&mut Self> {
        self.fee_per_kb = Some(amount);
        self.update_change_output()?;
        Ok(self)
    }

    /// Sets the estimate rate in satoshis per byte. Takes precedence over the kilobyte rate.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn fee_per_byte(&mut self, amount: u64) -> Result<&mut Self> {
        self.fee_per_byte = Some(amount);
        self.update_change_output()?;
        Ok(self)
    }

    /// Sends whatever is left after the fee to `address`.
    ///
    /// # Errors
    /// Change recomputation failures.
    pub fn change(&mut self, address: &Address) -> Result<&mut Self> {
        self.change_script = Some(address.to_script());
        self.update_change_output()?;
        Ok(self)
    }

    #[must_use]
    pub fn get_change_output(&self) -> Option<&Output> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    #[must_use]
    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    /// Sum of the spent outputs.
    ///
    /// # Errors
    /// `Error::IllegalState` if an input lacks its spent output.
    pub fn input_amount(&self) -> Result<u64> {
        self.inputs.iter().try_fold(0u64, |total, input| {
            let output = input.base().output.as_ref().ok_or_else(|| {
                Error::IllegalState("No previous output information.".to_string())
            })?;
            total
                .checked_add(output.satoshis)
                .ok_or_else(|| Error::BadData("Input amount overflows".to_string()))
        })
    }

    #[must_use]
    pub fn output_amount(&self) -> u64 {
        self.outputs.iter().fold(0u64, |total, o| total.saturating_add(o.satoshis))
    }

    /// Inputs minus outputs. Negative when outputs exceed inputs.
    ///
    /// # Errors
    /// Missing spent outputs, or totals beyond `i64`.
    pub fn unspent_value(&self) -> Result<i64> {
        let diff = i128::from(self.input_amount()?) - i128::from(self.output_amount());
        i64::try_from(diff).map_err(|_| Error::BadData("Unspent value out of range".to_string()))
    }

    /// The fee paid: zero for coinbase, the fixed fee if set, all unspent value without a
    /// change output (no change address, or change below dust), otherwise the estimate.
    ///
    /// # Errors
    /// Missing spent outputs.
    pub fn get_fee(&self) -> Result<i64> {
        if self.fee.is_none()
            && !self.is_coinbase()
            && self.change_script.is_some()
            && self.change_index.is_none()
        {
            // Change below dust went to the miner
            return self.unspent_value();
        }
        self.target_fee()
    }

    // Fee the change output is sized against
    fn target_fee(&self) -> Result<i64> {
        if self.is_coinbase() {
            return Ok(0);
        }
        if let Some(fee) = self.fee {
            return Ok(fee);
        }
        if self.change_script.is_none() {
            return self.unspent_value();
        }
        self.estimate_fee()
    }

    /// Fee for the estimated size, including room for a change output when there is
    /// enough value left to create one.
    ///
    /// # Errors
    /// Missing spent outputs.
    pub fn estimate_fee(&self) -> Result<i64> {
        let size = self.estimate_size() as f64;
        let available = self.unspent_value()?;
        let rate = self.fee_rate();
        let fee = (size * rate).ceil() as i64;
        let fee_with_change = (size * rate + CHANGE_OUTPUT_MAX_SIZE as f64 * rate).ceil() as i64;
        if self.change_script.is_none() || available <= fee_with_change {
            Ok(fee)
        } else {
            Ok(fee_with_change)
        }
    }

    /// Upper bound on the serialized size once fully signed.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        MAXIMUM_EXTRA_SIZE
            + self
                .inputs
                .iter()
                .map(|i| OutPoint::SIZE + i.estimate_size())
                .sum::<usize>()
            + self.outputs.iter().map(Output::size).sum::<usize>()
    }

    // Satoshis per byte
    fn fee_rate(&self) -> f64 {
        match self.fee_per_byte {
            Some(rate) => rate as f64,
            None => self.fee_per_kb.unwrap_or(FEE_PER_KB) as f64 / 1000.0,
        }
    }

    fn update_change_output(&mut self) -> Result<()> {
        let change_script = match &self.change_script {
            Some(script) => script.clone(),
            None => return Ok(()),
        };
        self.clear_signatures();
        if let Some(index) = self.change_index {
            if index < self.outputs.len() {
                self.remove_output_at(index);
            }
            self.change_index = None;
        }
        let available = self.unspent_value()?;
        let fee = self.target_fee()?;
        let change = available - fee;
        if change >= DUST_AMOUNT as i64 {
            debug!("Change output of {} satoshis after a fee of {}", change, fee);
            self.change_index = Some(self.outputs.len());
            self.outputs.push(Output::new(change as u64, change_script));
        } else {
            debug!("No change output, {} satoshis left after a fee of {}", change, fee);
        }
        Ok(())
    }

    // Serialization

    /// Wire bytes without any checks.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Wire hex after the checks not disabled by `opts`.
    ///
    /// # Errors
    /// The first failed check, see [`Transaction::get_serialization_error`].
    pub fn serialize(&self, opts: &SerializationOptions) -> Result<String> {
        match self.get_serialization_error(opts) {
            Some(e) => Err(e),
            None => Ok(self.to_hex()),
        }
    }

    /// First problem that would make the transaction invalid or wasteful, in order:
    /// invalid amounts, outputs above inputs, fee out of bounds, dust, missing signatures.
    #[must_use]
    pub fn get_serialization_error(&self, opts: &SerializationOptions) -> Option<Error> {
        if opts.disable_all {
            return None;
        }
        if let Some(reason) = self.outputs.iter().find_map(Output::invalid_satoshis) {
            return Some(Error::BadData(format!("Output satoshis are invalid: {}", reason)));
        }
        let unspent = match self.unspent_value() {
            Ok(v) => v,
            Err(e) => return Some(e),
        };
        if unspent < 0 {
            if !opts.disable_more_output_than_input {
                return Some(Error::BadData(format!(
                    "{} was attempted to be spent out of {} provided",
                    self.output_amount(),
                    self.input_amount().unwrap_or_default()
                )));
            }
        } else if let Some(e) = self.fee_error(opts, unspent) {
            return Some(e);
        }
        if !opts.disable_dust_outputs && self.has_dust_outputs() {
            return Some(Error::BadData("Dust amount detected in one output".to_string()));
        }
        if !opts.disable_is_fully_signed {
            match self.is_fully_signed() {
                Ok(true) => {}
                Ok(false) => {
                    return Some(Error::IllegalState(
                        "Some inputs have not been fully signed".to_string(),
                    ))
                }
                Err(e) => return Some(e),
            }
        }
        None
    }

    fn fee_error(&self, opts: &SerializationOptions, unspent: i64) -> Option<Error> {
        if let Some(fee) = self.fee {
            if fee != unspent {
                return Some(Error::BadData(format!(
                    "Unspent value is {} but specified fee is {}",
                    unspent, fee
                )));
            }
        }
        let estimate = match self.estimate_fee() {
            Ok(v) => v,
            Err(e) => return Some(e),
        };
        if !opts.disable_large_fees {
            let maximum = FEE_SECURITY_MARGIN * estimate;
            if unspent > maximum {
                if self.change_script.is_none() {
                    return Some(Error::BadData(
                        "Fee is too large and no change address was provided".to_string(),
                    ));
                }
                return Some(Error::BadData(format!(
                    "Fee is too large: expected less than {} but got {}",
                    maximum, unspent
                )));
            }
        }
        if !opts.disable_small_fees {
            let minimum = (estimate as f64 / FEE_SECURITY_MARGIN as f64).ceil() as i64;
            if unspent < minimum {
                return Some(Error::BadData(format!(
                    "Fee is too small: expected more than {} but got {}",
                    minimum, unspent
                )));
            }
        }
        None
    }

    fn has_dust_outputs(&self) -> bool {
        self.outputs
            .iter()
            .any(|o| o.satoshis < DUST_AMOUNT && !o.script.is_data_out())
    }

    /// Whether any output amount cannot be represented safely.
    #[must_use]
    pub fn invalid_satoshis(&self) -> bool {
        self.outputs.iter().any(|o| o.invalid_satoshis().is_some())
    }

    // Signing

    /// Signs every input `keys` can sign. `sigtype` defaults to
    /// [`Transaction::default_sighash_type`].
    ///
    /// # Errors
    /// `Error::IllegalState` if any input lacks its spent output, plus signing failures.
    pub fn sign(
        &mut self,
        keys: &[PrivateKey],
        sigtype: Option<u32>,
        method: SigningMethod,
    ) -> Result<&mut Self> {
        if !self.has_all_utxo_info() {
            return Err(Error::IllegalState(
                "Not all utxo information is available to sign the transaction.".to_string(),
            ));
        }
        let sigtype = sigtype.unwrap_or_else(|| self.default_sighash_type());
        for key in keys {
            for signature in self.get_signatures(key, Some(sigtype), method)? {
                self.apply_signature(signature)?;
            }
        }
        Ok(self)
    }

    /// Signatures `key` can contribute, across all inputs.
    ///
    /// # Errors
    /// Generic inputs, or signing failures.
    pub fn get_signatures(
        &self,
        key: &PrivateKey,
        sigtype: Option<u32>,
        method: SigningMethod,
    ) -> Result<Vec<TransactionSignature>> {
        let sigtype = sigtype.unwrap_or_else(|| self.default_sighash_type());
        let tx = self.to_tx();
        let mut signatures = Vec::new();
        for (index, input) in self.inputs.iter().enumerate() {
            let signable = input
                .signable()
                .ok_or_else(|| Error::Unsupported(UNRECOGNIZED_INPUT.to_string()))?;
            signatures.extend(signable.get_signatures(
                &tx,
                key,
                index,
                sigtype,
                self.sign_flags,
                method,
            )?);
        }
        Ok(signatures)
    }

    /// Adds a signature to the input it names.
    ///
    /// # Errors
    /// A bad input index, a generic input, or the input's own checks.
    pub fn apply_signature(&mut self, signature: TransactionSignature) -> Result<&mut Self> {
        let tx = self.to_tx();
        let index = signature.input_index;
        let flags = self.sign_flags;
        let input = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| Error::BadArgument(format!("Invalid input index {}", index)))?;
        let signable = input
            .signable_mut()
            .ok_or_else(|| Error::Unsupported(UNRECOGNIZED_INPUT.to_string()))?;
        signable.add_signature(&tx, signature, flags)?;
        debug!("Applied signature to input {}", index);
        Ok(self)
    }

    /// # Errors
    /// `Error::Unsupported` if any input is generic.
    pub fn is_fully_signed(&self) -> Result<bool> {
        let mut signed = true;
        for input in &self.inputs {
            let signable = input
                .signable()
                .ok_or_else(|| Error::Unsupported(UNRECOGNIZED_INPUT.to_string()))?;
            signed &= signable.is_fully_signed();
        }
        Ok(signed)
    }

    /// # Errors
    /// A bad input index or a generic input.
    pub fn is_valid_signature(&self, signature: &TransactionSignature) -> Result<bool> {
        let input = self.inputs.get(signature.input_index).ok_or_else(|| {
            Error::BadArgument(format!("Invalid input index {}", signature.input_index))
        })?;
        let signable = input
            .signable()
            .ok_or_else(|| Error::Unsupported(UNRECOGNIZED_INPUT.to_string()))?;
        Ok(signable.is_valid_signature(&self.to_tx(), signature, self.sign_flags))
    }

    /// Checks a raw signature over input `n_input` with the transaction's sign flags.
    #[must_use]
    pub fn verify_signature(
        &self,
        signature: &Signature,
        sigtype: u32,
        public_key: &PublicKey,
        n_input: usize,
        subscript: &Script,
        satoshis: Option<u64>,
    ) -> bool {
        sighash::verify(
            &self.to_tx(),
            signature,
            sigtype,
            public_key,
            n_input,
            subscript,
            satoshis,
            self.sign_flags,
        )
    }

    fn clear_signatures(&mut self) {
        for input in &mut self.inputs {
            input.clear_signatures();
        }
    }

    /// Context-free sanity checks as done by nodes before accepting a transaction.
    ///
    /// # Errors
    /// `Error::BadData` describing the first failed check.
    pub fn verify(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::BadData(msg));
        if self.inputs.is_empty() {
            return fail("transaction txins empty".to_string());
        }
        if self.outputs.is_empty() {
            return fail("transaction txouts empty".to_string());
        }
        let mut total: u64 = 0;
        for (i, output) in self.outputs.iter().enumerate() {
            if output.invalid_satoshis().is_some() {
                return fail(format!("transaction txout {} satoshis is invalid", i));
            }
            if output.satoshis > MAX_MONEY {
                return fail(format!("transaction txout {} greater than MAX_MONEY", i));
            }
            total += output.satoshis;
            if total > MAX_MONEY {
                return fail(format!(
                    "transaction txout {} total output greater than MAX_MONEY",
                    i
                ));
            }
        }
        if self.to_tx().size() > MAX_BLOCK_SIZE {
            return fail("transaction over the maximum block size".to_string());
        }
        let mut seen = HashSet::new();
        for (i, input) in self.inputs.iter().enumerate() {
            if !seen.insert(input.base().outpoint()) {
                return fail(format!("transaction input {} duplicate input", i));
            }
        }
        if self.is_coinbase() {
            let len = self.inputs[0].base().script.len();
            if !(2..=100).contains(&len) {
                return fail("coinbase transaction script size invalid".to_string());
            }
        } else {
            for (i, input) in self.inputs.iter().enumerate() {
                if input.base().is_null() {
                    return fail(format!("transaction input {} has null input", i));
                }
            }
        }
        Ok(())
    }

    // Lock time and replacement

    /// Locks the transaction until a unix time.
    ///
    /// # Errors
    /// `Error::BadArgument` for values that would read as block heights.
    pub fn lock_until_date(&mut self, time: u32) -> Result<&mut Self> {
        if time < NLOCKTIME_BLOCKHEIGHT_LIMIT {
            return Err(Error::BadArgument("Lock time too early".to_string()));
        }
        self.enable_lock_time();
        self.n_lock_time = time;
        Ok(self)
    }

    /// Locks the transaction until a block height.
    ///
    /// # Errors
    /// `Error::BadArgument` for heights that would read as timestamps.
    pub fn lock_until_block_height(&mut self, height: u32) -> Result<&mut Self> {
        if height >= NLOCKTIME_BLOCKHEIGHT_LIMIT {
            return Err(Error::BadArgument("Block height too high".to_string()));
        }
        self.enable_lock_time();
        self.n_lock_time = height;
        Ok(self)
    }

    // Final sequence numbers disable the lock time
    fn enable_lock_time(&mut self) {
        for input in &mut self.inputs {
            let base = input.base_mut();
            if base.sequence_number == DEFAULT_SEQNUMBER {
                base.sequence_number = DEFAULT_LOCKTIME_SEQNUMBER;
            }
        }
    }

    #[must_use]
    pub fn get_lock_time(&self) -> Option<LockTime> {
        match self.n_lock_time {
            0 => None,
            t if t < NLOCKTIME_BLOCKHEIGHT_LIMIT => Some(LockTime::BlockHeight(t)),
            t => Some(LockTime::Timestamp(t)),
        }
    }

    /// Whether any input signals replace-by-fee.
    #[must_use]
    pub fn is_rbf(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| i.base().sequence_number < DEFAULT_LOCKTIME_SEQNUMBER)
    }

    pub fn enable_rbf(&mut self) -> &mut Self {
        for input in &mut self.inputs {
            let base = input.base_mut();
            if base.sequence_number >= DEFAULT_LOCKTIME_SEQNUMBER {
                base.sequence_number = DEFAULT_RBF_SEQNUMBER;
            }
        }
        self
    }

    /// # Errors
    /// `Error::BadArgument` outside `0..=CURRENT_VERSION`.
    pub fn set_version(&mut self, version: i32) -> Result<&mut Self> {
        if !(0..=CURRENT_VERSION).contains(&version) {
            return Err(Error::BadArgument("Wrong version number".to_string()));
        }
        self.version = version;
        Ok(self)
    }

    // Ordering

    /// BIP69 order: inputs by id then index, outputs by amount then script.
    pub fn sort(&mut self) -> &mut Self {
        self.sort_inputs(|a, b| {
            let (a, b) = (a.base(), b.base());
            let mut a_id = a.prev_tx_id.0;
            let mut b_id = b.prev_tx_id.0;
            a_id.reverse();
            b_id.reverse();
            a_id.cmp(&b_id).then(a.output_index.cmp(&b.output_index))
        });
        self.sort_outputs(|a, b| a.satoshis.cmp(&b.satoshis).then_with(|| a.script.0.cmp(&b.script.0)));
        self
    }

    /// Stable sort of the inputs. Signatures are cleared.
    pub fn sort_inputs<F>(&mut self, compare: F) -> &mut Self
    where
        F: FnMut(&Input, &Input) -> Ordering,
    {
        self.inputs.sort_by(compare);
        self.clear_signatures();
        self
    }

    /// Stable sort of the outputs, keeping track of the change output. Signatures are cleared.
    pub fn sort_outputs<F>(&mut self, mut compare: F) -> &mut Self
    where
        F: FnMut(&Output, &Output) -> Ordering,
    {
        let mut indexed: Vec<(usize, Output)> =
            std::mem::take(&mut self.outputs).into_iter().enumerate().collect();
        indexed.sort_by(|a, b| compare(&a.1, &b.1));
        self.change_index = self
            .change_index
            .and_then(|old| indexed.iter().position(|(i, _)| *i == old));
        self.outputs = indexed.into_iter().map(|(_, o)| o).collect();
        self.clear_signatures();
        self
    }

    // Object form

    #[must_use]
    pub fn to_object(&self) -> TransactionObject {
        TransactionObject {
            hash: self.id(),
            version: self.version,
            inputs: self.inputs.iter().map(Input::to_object).collect(),
            outputs: self.outputs.iter().map(Output::to_object).collect(),
            n_lock_time: self.n_lock_time,
            change_script: self.change_script.as_ref().map(Script::to_hex),
            change_index: self.change_index,
            fee: self.fee,
        }
    }

    /// Rebuilds a transaction, checking the change output and hash against the object.
    ///
    /// # Errors
    /// Malformed inputs or outputs, or an inconsistent change output or hash.
    pub fn from_object(obj: &TransactionObject) -> Result<Transaction> {
        let mut tx = Transaction::new();
        tx.version = obj.version;
        tx.n_lock_time = obj.n_lock_time;
        for input in &obj.inputs {
            tx.inputs.push(Input::from_object(input)?);
        }
        for output in &obj.outputs {
            tx.outputs.push(Output::from_object(output)?);
        }
        tx.change_script = obj.change_script.as_deref().map(Script::from_hex).transpose()?;
        tx.change_index = obj.change_index;
        tx.fee = obj.fee;
        if let Some(index) = tx.change_index {
            let change_script = tx
                .change_script
                .as_ref()
                .ok_or_else(|| Error::IllegalState("Change script is expected.".to_string()))?;
            let output = tx.outputs.get(index).ok_or_else(|| {
                Error::IllegalState("Change index points to undefined output.".to_string())
            })?;
            if output.script != *change_script {
                return Err(Error::IllegalState(
                    "Change output has an unexpected script.".to_string(),
                ));
            }
        }
        if !obj.hash.is_empty() && obj.hash != tx.id() {
            return Err(Error::IllegalState(
                "Hash in object does not match transaction hash.".to_string(),
            ));
        }
        Ok(tx)
    }

    /// # Errors
    /// Bad JSON, plus [`Transaction::from_object`] failures.
    pub fn from_json(json: &str) -> Result<Transaction> {
        Transaction::from_object(&serde_json::from_str(json)?)
    }

    /// # Errors
    /// JSON encoding failures.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_object())?)
    }
}

fn base_from_utxo(utxo: &UnspentOutput) -> InputBase {
    let mut base = InputBase::new(utxo.tx_id, utxo.output_index, Some(utxo.to_output()));
    if let Some(sequence) = utxo.sequence_number {
        base.sequence_number = sequence;
    }
    base
}

fn input_from_utxo(utxo: &UnspentOutput) -> Result<Input> {
    let base = base_from_utxo(utxo);
    if utxo.script.is_public_key_hash_out() {
        Ok(Input::PublicKeyHash(PublicKeyHashInput::new(base)?))
    } else if utxo.script.is_public_key_out() {
        Ok(Input::PublicKey(PublicKeyInput::new(base)?))
    } else {
        Ok(Input::Generic(base))
    }
}

fn multisig_input_from_utxo(
    utxo: &UnspentOutput,
    public_keys: &[PublicKey],
    threshold: usize,
    no_sorting: bool,
) -> Result<Input> {
    if threshold > public_keys.len() {
        return Err(Error::BadArgument(
            "Number of required signatures must be greater than the number of public keys"
                .to_string(),
        ));
    }
    let base = base_from_utxo(utxo);
    if utxo.script.is_multisig_out() {
        let input = MultiSigInput::new(base, public_keys, threshold, no_sorting)?;
        Ok(Input::MultiSig(input))
    } else if utxo.script.is_script_hash_out() {
        let input = MultiSigScriptHashInput::new(base, public_keys, threshold, no_sorting)?;
        Ok(Input::MultiSigScriptHash(input))
    } else {
        Err(Error::BadArgument(
            "UTXO script is neither multisig nor pay-to-script-hash".to_string(),
        ))
    }
}

impl Serializable<Transaction> for Transaction {
    fn read(reader: &mut dyn Read) -> Result<Transaction> {
        let tx = Tx::read(reader)?;
        let mut result = Transaction::new();
        result.version = tx.version;
        result.n_lock_time = tx.lock_time;
        result.inputs = tx
            .inputs
            .iter()
            .map(|i| Input::Generic(InputBase::from_tx_in(i)))
            .collect();
        result.outputs = tx.outputs;
        Ok(result)
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.to_tx().write(writer)
    }

    // Unlike other wire types, trailing bytes are an error
    fn from_bytes(bytes: &[u8]) -> Result<Transaction> {
        let mut cursor = Cursor::new(bytes);
        let tx = Transaction::read(&mut cursor)?;
        if cursor.position() as usize != bytes.len() {
            return Err(Error::BadData("Transaction has trailing data".to_string()));
        }
        Ok(tx)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Transaction: {}>", self.to_hex())
    }
}

/// Plain object form of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionObject {
    #[serde(default)]
    pub hash: String,
    pub version: i32,
    pub inputs: Vec<InputObject>,
    pub outputs: Vec<OutputObject>,
    pub n_lock_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::transaction::sighash::SIGHASH_NONE;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BLOCK_1_COINBASE: [u8; 134] = hex!(
        "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff07"
        "04ffff001d0104ffffffff0100f2052a0100000043410496b538e853519c726a2c91e61ec11600ae1390"
        "813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342"
        "c858eeac00000000"
    );

    fn key(n: u8) -> PrivateKey {
        PrivateKey::new(&[n; 32]).unwrap()
    }

    fn address(key: &PrivateKey) -> Address {
        Address::from_public_key(&key.public_key(), Network::Testnet)
    }

    fn utxo(key: &PrivateKey, id: u8, satoshis: u64) -> UnspentOutput {
        UnspentOutput::new(Hash256([id; 32]), 0, address(key).to_script(), satoshis)
    }

    #[test]
    fn p2pkh_end_to_end() -> Result<()> {
        let owner = key(1);
        let utxo = UnspentOutput::from_json(&json!({
            "txId": Hash256([0xab; 32]).encode(),
            "outputIndex": 0,
            "address": address(&owner).to_string(),
            "satoshis": 100_000,
        }))?;
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo)?.to(&address(&key(2)), 90_000)?;
        assert!(!tx.is_fully_signed()?);
        tx.sign(&[owner], None, SigningMethod::Ecdsa)?;
        assert!(tx.is_fully_signed()?);
        assert_eq!(tx.unspent_value()?, 10_000);
        assert_eq!(tx.get_fee()?, 10_000);
        tx.verify()?;
        let raw = tx.serialize(&SerializationOptions::default())?;
        let parsed = Transaction::from_hex(&raw)?;
        assert_eq!(parsed.id(), tx.id());
        assert_eq!(parsed.to_hex(), raw);
        let pushes = parsed.inputs[0].base().script.pushes()?;
        assert_eq!(*pushes[0].last().unwrap(), (SIGHASH_ALL | SIGHASH_FORKID) as u8);
        Ok(())
    }

    #[test]
    fn change_output_and_fee_estimate() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 1_000_000))?
            .to(&address(&key(2)), 500_000)?
            .change(&address(&owner))?;
        // 26 + (36 + 107) + 34 bytes at 100 sat/B, plus room for change
        assert_eq!(tx.change_index(), Some(1));
        assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(473_500));
        assert_eq!(tx.unspent_value()?, 26_500);
        assert_eq!(tx.estimate_size(), 237);

        tx.fee(10_000)?;
        assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(490_000));
        tx.sign(&[owner], None, SigningMethod::Ecdsa)?;
        tx.serialize(&SerializationOptions::default())?;

        tx.remove_output(1)?;
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.change_index(), Some(1));
        assert!(!tx.is_fully_signed()?);
        Ok(())
    }

    #[test]
    fn change_below_dust_becomes_fee() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.fee_per_byte(1)?
            .from_utxo(&utxo(&owner, 1, 10_000))?
            .to(&address(&key(2)), 9_500)?
            .change(&address(&owner))?;
        assert_eq!(tx.get_change_output(), None);
        assert_eq!(tx.get_fee()?, 500);
        assert_eq!(tx.outputs.len(), 1);

        tx.fee(200)?;
        assert_eq!(tx.get_change_output(), None);
        assert_eq!(tx.get_fee()?, 200);
        tx.from_utxo(&utxo(&owner, 2, 1_000))?;
        assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(1_300));
        assert_eq!(tx.get_fee()?, 200);
        assert_eq!(tx.unspent_value()?, 200);
        Ok(())
    }

    #[test]
    fn change_address_before_inputs() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.change(&address(&owner))?;
        assert_eq!(tx.get_fee()?, 0);
        tx.from_utxo(&utxo(&owner, 1, 100_000))?
            .to(&address(&key(2)), 50_000)?;
        assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(23_500));
        assert_eq!(tx.unspent_value()?, 26_500);
        tx.sign(&[owner], None, SigningMethod::Ecdsa)?;
        tx.serialize(&SerializationOptions::default())?;
        Ok(())
    }

    #[test]
    fn change_recovers_after_overspend() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 1_000))?
            .to(&address(&key(2)), 5_000)?
            .change(&address(&owner))?;
        assert_eq!(tx.get_change_output(), None);
        assert_eq!(tx.unspent_value()?, -4_000);

        // 26 + 2 * (36 + 107) + 34 bytes at 100 sat/B, plus room for change
        tx.from_utxo(&utxo(&owner, 2, 100_000))?;
        assert_eq!(tx.get_change_output().map(|o| o.satoshis), Some(55_200));
        assert_eq!(tx.unspent_value()?, 40_800);
        assert!(tx.output_amount() <= tx.input_amount()?);
        tx.sign(&[owner], None, SigningMethod::Ecdsa)?;
        tx.serialize(&SerializationOptions::default())?;
        Ok(())
    }

    #[test]
    fn serialization_checks() -> Result<()> {
        let owner = key(1);
        let dest = address(&key(2));
        let check = |tx: &Transaction| {
            tx.serialize(&SerializationOptions::default())
                .unwrap_err()
                .to_string()
        };

        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?.to(&dest, 100)?;
        assert_eq!(check(&tx), "Bad data: Dust amount detected in one output");

        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?.to(&dest, 200_000)?;
        assert_eq!(check(&tx), "Bad data: 200000 was attempted to be spent out of 100000 provided");

        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000_000))?.to(&dest, 1_000)?;
        assert_eq!(check(&tx), "Bad data: Fee is too large and no change address was provided");

        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?.to(&dest, 99_950)?;
        assert_eq!(check(&tx), "Bad data: Fee is too small: expected more than 136 but got 50");

        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?.to(&dest, 90_000)?.fee(5_000)?;
        assert_eq!(check(&tx), "Bad data: Unspent value is 10000 but specified fee is 5000");

        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?.to(&dest, 90_000)?;
        assert_eq!(check(&tx), "Illegal state: Some inputs have not been fully signed");
        let opts = SerializationOptions {
            disable_is_fully_signed: true,
            ..SerializationOptions::default()
        };
        tx.serialize(&opts)?;
        let opts = SerializationOptions {
            disable_all: true,
            ..SerializationOptions::default()
        };
        tx.to(&dest, 100)?;
        tx.serialize(&opts)?;
        Ok(())
    }

    #[test]
    fn data_outputs_are_not_dust() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?
            .to(&address(&key(2)), 90_000)?
            .add_data(b"hello")?
            .sign(&[owner], None, SigningMethod::Schnorr)?;
        assert!(tx.outputs[1].script.is_data_out());
        tx.serialize(&SerializationOptions::default())?;
        assert!(tx.add_output(Output::new(1, Script(vec![PREFIX_TOKEN, 0]))).is_err());
        Ok(())
    }

    #[test]
    fn signing_requires_utxo_info() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?.to(&address(&owner), 90_000)?;
        let parsed_hex = tx.to_hex();
        let mut parsed = Transaction::from_hex(&parsed_hex)?;
        let err = parsed.sign(&[owner.clone()], None, SigningMethod::Ecdsa).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal state: Not all utxo information is available to sign the transaction."
        );
        assert!(matches!(parsed.is_fully_signed(), Err(Error::Unsupported(_))));
        let input = Input::Generic(InputBase::new(Hash256([3; 32]), 0, None));
        let err = parsed.add_input(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad argument: Need information about the UTXO script and satoshis"
        );

        let indexes =
            parsed.associate_inputs(&[utxo(&owner, 1, 100_000), utxo(&owner, 9, 1)], &[], 0)?;
        assert_eq!(indexes, vec![Some(0), None]);
        parsed.sign(&[owner], None, SigningMethod::Ecdsa)?;
        assert!(parsed.is_fully_signed()?);
        Ok(())
    }

    #[test]
    fn duplicate_utxos_are_skipped() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        let u = utxo(&owner, 1, 5_000);
        tx.from_utxos(&[u.clone(), u.clone()])?;
        assert_eq!(tx.inputs.len(), 1);
        tx.remove_input_by_outpoint(&u.tx_id, 0)?;
        assert!(tx.inputs.is_empty());
        assert!(tx.remove_input(0).is_err());
        Ok(())
    }

    #[test]
    fn p2sh_multisig_end_to_end() -> Result<()> {
        let keys: Vec<PrivateKey> = (1..=3).map(key).collect();
        let public_keys: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        let redeem = Script::build_multisig_out(&public_keys, 2, false)?;
        let lock = Address::from_script(&redeem, Network::Testnet).to_script();
        let utxo = UnspentOutput::new(Hash256([5; 32]), 1, lock, 200_000);
        let mut tx = Transaction::new();
        assert!(tx.from_multisig_utxo(&utxo, &public_keys, 4, false).is_err());
        tx.from_multisig_utxo(&utxo, &public_keys, 2, false)?
            .to(&address(&keys[0]), 150_000)?;
        tx.sign(&keys[..1], None, SigningMethod::Ecdsa)?;
        assert!(!tx.is_fully_signed()?);
        tx.sign(&keys[2..], None, SigningMethod::Ecdsa)?;
        assert!(tx.is_fully_signed()?);
        tx.serialize(&SerializationOptions::default())?;

        let restored = Transaction::from_json(&tx.to_json()?)?;
        assert_eq!(restored.id(), tx.id());
        assert!(restored.is_fully_signed()?);
        match &restored.inputs[0] {
            Input::MultiSigScriptHash(input) => assert_eq!(input.count_signatures(), 2),
            other => panic!("unexpected input {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn bare_multisig_signs_with_schnorr() -> Result<()> {
        let keys: Vec<PrivateKey> = (1..=2).map(key).collect();
        let public_keys: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        let lock = Script::build_multisig_out(&public_keys, 1, false)?;
        let utxo = UnspentOutput::new(Hash256([6; 32]), 0, lock, 50_000);
        let mut tx = Transaction::new();
        tx.from_multisig_utxo(&utxo, &public_keys, 1, false)?
            .to(&address(&keys[0]), 40_000)?
            .sign(&keys[1..], None, SigningMethod::Schnorr)?;
        assert!(tx.is_fully_signed()?);
        let sigs = tx.get_signatures(&keys[0], None, SigningMethod::Schnorr)?;
        let err = tx.apply_signature(sigs[0].clone()).unwrap_err();
        assert_eq!(err.to_string(), "Illegal state: All needed signatures have already been added");
        Ok(())
    }

    #[test]
    fn legacy_chain_uses_plain_sighash() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::for_chain(Chain::Btc);
        assert_eq!(tx.default_sighash_type(), SIGHASH_ALL);
        tx.from_utxo(&utxo(&owner, 1, 100_000))?
            .to(&address(&owner), 90_000)?
            .sign(&[owner.clone()], None, SigningMethod::Ecdsa)?;
        let pushes = tx.inputs[0].base().script.pushes()?;
        assert_eq!(*pushes[0].last().unwrap(), SIGHASH_ALL as u8);
        let sig = tx.get_signatures(&owner, Some(SIGHASH_NONE), SigningMethod::Ecdsa)?.remove(0);
        assert!(tx.is_valid_signature(&sig)?);
        let subscript = address(&owner).to_script();
        assert!(tx.verify_signature(&sig.signature, SIGHASH_NONE, &owner.public_key(), 0, &subscript, None));
        assert!(!tx.verify_signature(&sig.signature, SIGHASH_ALL, &owner.public_key(), 0, &subscript, None));
        Ok(())
    }

    #[test]
    fn long_scripts_round_trip() -> Result<()> {
        let owner = key(1);
        let mut lock = Script::new();
        lock.append_data(&[0xab; 11_000]);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?
            .add_output(Output::new(90_000, lock))?;
        tx.inputs[0].base_mut().script = Script(vec![0x51; 10_500]);
        let bytes = tx.to_bytes();
        let parsed = Transaction::from_bytes(&bytes)?;
        assert_eq!(parsed.to_bytes(), bytes);
        assert_eq!(parsed.id(), tx.id());
        Ok(())
    }

    #[test]
    fn block_1_coinbase() -> Result<()> {
        let tx = Transaction::from_bytes(&BLOCK_1_COINBASE)?;
        assert_eq!(
            tx.id(),
            "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098"
        );
        assert!(tx.is_coinbase());
        assert_eq!(tx.get_fee()?, 0);
        tx.verify()?;
        assert_eq!(tx.to_bytes(), BLOCK_1_COINBASE.to_vec());
        let mut trailing = BLOCK_1_COINBASE.to_vec();
        trailing.push(0);
        assert!(Transaction::from_bytes(&trailing).is_err());
        Ok(())
    }

    #[test]
    fn sanity_checks() -> Result<()> {
        let owner = key(1);
        let dest = address(&owner);
        let mut tx = Transaction::new();
        assert_eq!(tx.verify().unwrap_err().to_string(), "Bad data: transaction txins empty");
        tx.from_utxo(&utxo(&owner, 1, 100))?;
        assert_eq!(tx.verify().unwrap_err().to_string(), "Bad data: transaction txouts empty");
        tx.to(&dest, MAX_MONEY + 1)?;
        assert_eq!(
            tx.verify().unwrap_err().to_string(),
            "Bad data: transaction txout 0 greater than MAX_MONEY"
        );
        tx.clear_outputs()?.to(&dest, MAX_MONEY)?.to(&dest, 1)?;
        assert_eq!(
            tx.verify().unwrap_err().to_string(),
            "Bad data: transaction txout 1 total output greater than MAX_MONEY"
        );
        tx.clear_outputs()?.to(&dest, 1)?;
        tx.inputs.push(tx.inputs[0].clone());
        assert_eq!(
            tx.verify().unwrap_err().to_string(),
            "Bad data: transaction input 1 duplicate input"
        );
        tx.inputs[1] = Input::Generic(InputBase::new(Hash256::default(), u32::MAX, None));
        assert_eq!(
            tx.verify().unwrap_err().to_string(),
            "Bad data: transaction input 1 has null input"
        );
        let mut coinbase = Transaction::from_bytes(&BLOCK_1_COINBASE)?;
        coinbase.inputs[0].base_mut().script = Script(vec![0x51]);
        assert_eq!(
            coinbase.verify().unwrap_err().to_string(),
            "Bad data: coinbase transaction script size invalid"
        );
        Ok(())
    }

    #[test]
    fn lock_time_and_rbf() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 100_000))?;
        assert_eq!(tx.get_lock_time(), None);
        assert!(!tx.is_rbf());
        tx.lock_until_date(1_600_000_000)?;
        assert_eq!(tx.get_lock_time(), Some(LockTime::Timestamp(1_600_000_000)));
        assert_eq!(tx.inputs[0].base().sequence_number, DEFAULT_LOCKTIME_SEQNUMBER);
        assert!(tx.lock_until_date(499_999_999).is_err());
        tx.lock_until_block_height(650_000)?;
        assert_eq!(tx.get_lock_time(), Some(LockTime::BlockHeight(650_000)));
        assert!(tx.lock_until_block_height(NLOCKTIME_BLOCKHEIGHT_LIMIT).is_err());
        tx.enable_rbf();
        assert!(tx.is_rbf());
        assert_eq!(tx.inputs[0].base().sequence_number, DEFAULT_RBF_SEQNUMBER);
        assert!(tx.set_version(3).is_err());
        tx.set_version(2)?;
        assert_eq!(tx.version, 2);
        Ok(())
    }

    #[test]
    fn bip69_sort_tracks_change() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        let mut high = utxo(&owner, 1, 300_000);
        high.tx_id = Hash256::decode(&format!("ff{}", "00".repeat(31)))?;
        let mut low = utxo(&owner, 1, 300_000);
        low.tx_id = Hash256::decode(&format!("00{}", "ff".repeat(31)))?;
        let mut low_second = low.clone();
        low_second.output_index = 1;
        tx.from_utxos(&[high, low_second, low])?
            .to(&address(&key(2)), 600_000)?
            .to(&address(&key(3)), 1_000)?
            .change(&address(&owner))?;
        let change = tx.get_change_output().cloned();
        assert_eq!(tx.change_index(), Some(2));
        tx.sort();
        let order: Vec<(String, u32)> = tx
            .inputs
            .iter()
            .map(|i| (i.base().prev_tx_id.encode()[..2].to_string(), i.base().output_index))
            .collect();
        assert_eq!(
            order,
            vec![("00".to_string(), 0), ("00".to_string(), 1), ("ff".to_string(), 0)]
        );
        let amounts: Vec<u64> = tx.outputs.iter().map(|o| o.satoshis).collect();
        let mut sorted = amounts.clone();
        sorted.sort_unstable();
        assert_eq!(amounts, sorted);
        assert_eq!(tx.get_change_output().cloned(), change);
        Ok(())
    }

    #[test]
    fn object_consistency() -> Result<()> {
        let owner = key(1);
        let mut tx = Transaction::new();
        tx.from_utxo(&utxo(&owner, 1, 1_000_000))?
            .to(&address(&key(2)), 500_000)?
            .change(&address(&owner))?;
        let obj = tx.to_object();
        let json = serde_json::to_value(&obj)?;
        assert_eq!(json["nLockTime"], 0);
        assert_eq!(json["changeIndex"], 1);
        let restored = Transaction::from_object(&obj)?;
        assert_eq!(restored, tx);

        let mut bad = obj.clone();
        bad.change_index = Some(5);
        assert_eq!(
            Transaction::from_object(&bad).unwrap_err().to_string(),
            "Illegal state: Change index points to undefined output."
        );
        let mut bad = obj;
        bad.hash = Hash256([1; 32]).encode();
        assert_eq!(
            Transaction::from_object(&bad).unwrap_err().to_string(),
            "Illegal state: Hash in object does not match transaction hash."
        );
        assert!(tx.to_string().starts_with("<Transaction: 01000000"));
        Ok(())
    }
}
