//! Transaction inputs and the signing strategies for each kind of spent output.
//!
//! Every input carries an [`InputBase`]: the out point, the sequence number, the current
//! unlocking script and, when known, the [`Output`] being spent. The signing variants wrap
//! the base and implement [`Signable`]. [`Input`] is the closed set of all of them.

mod escrow;
mod multisig;
mod multisig_script_hash;
mod public_key;
mod public_key_hash;

pub use self::escrow::EscrowInput;
pub use self::multisig::{normalize_signatures, MultiSigInput};
pub use self::multisig_script_hash::MultiSigScriptHashInput;
pub use self::public_key::PublicKeyInput;
pub use self::public_key_hash::PublicKeyHashInput;

use crate::crypto::{PrivateKey, PublicKey, SigningMethod};
use crate::messages::{OutPoint, Tx, TxIn};
use crate::script::Script;
use crate::transaction::output::{Output, OutputObject};
use crate::transaction::sighash;
use crate::transaction::signature::{TransactionSignature, TransactionSignatureObject};
use crate::util::{var_int, Error, Hash256, Result, Serializable};
use serde::{Deserialize, Serialize};
use std::io;
use std::io::{Read, Write};

pub const MAXINT: u32 = 0xffff_ffff;
/// Final sequence number.
pub const DEFAULT_SEQNUMBER: u32 = MAXINT;
/// Sequence number that enables the transaction lock time.
pub const DEFAULT_LOCKTIME_SEQNUMBER: u32 = MAXINT - 1;
/// Sequence number that signals replace-by-fee.
pub const DEFAULT_RBF_SEQNUMBER: u32 = MAXINT - 2;
/// Relative lock time is ignored when this bit is set.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;
/// Relative lock time counts seconds instead of blocks when this bit is set.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0xffff;
/// Seconds per unit of a time-based relative lock.
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 512;
pub const SEQUENCE_BLOCKDIFF_LIMIT: u32 = 0xffff;

/// Relative lock time encoded in a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeLockTime {
    Blocks(u32),
    Seconds(u32),
}

/// Fields shared by every input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBase {
    /// Spent transaction id, in wire order.
    pub prev_tx_id: Hash256,
    pub output_index: u32,
    pub sequence_number: u32,
    /// Unlocking script.
    pub script: Script,
    /// The output being spent, needed to sign.
    pub output: Option<Output>,
}

impl InputBase {
    /// Input spending `prev_tx_id:output_index` with an empty script and a final sequence.
    #[must_use]
    pub fn new(prev_tx_id: Hash256, output_index: u32, output: Option<Output>) -> InputBase {
        InputBase {
            prev_tx_id,
            output_index,
            sequence_number: DEFAULT_SEQNUMBER,
            script: Script::new(),
            output,
        }
    }

    #[must_use]
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            hash: self.prev_tx_id,
            index: self.output_index,
        }
    }

    /// Whether this spends the null out point, as coinbase inputs do.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.outpoint().is_null()
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        self.sequence_number == MAXINT
    }

    /// Sets a time-based relative lock, rounded down to 512-second units.
    ///
    /// # Errors
    /// `Error::BadArgument` if `seconds` is at or above `512 * 0xffff`.
    pub fn lock_for_seconds(&mut self, seconds: u32) -> Result<()> {
        if seconds >= SEQUENCE_LOCKTIME_GRANULARITY * SEQUENCE_LOCKTIME_MASK {
            return Err(Error::BadArgument(format!(
                "Lock time range is 0 to {} seconds",
                SEQUENCE_LOCKTIME_GRANULARITY * SEQUENCE_LOCKTIME_MASK - 1
            )));
        }
        self.sequence_number =
            (seconds / SEQUENCE_LOCKTIME_GRANULARITY) | SEQUENCE_LOCKTIME_TYPE_FLAG;
        Ok(())
    }

    /// Sets a block-based relative lock.
    ///
    /// # Errors
    /// `Error::BadArgument` if `height_diff` is at or above `0xffff`.
    pub fn lock_until_block_height(&mut self, height_diff: u32) -> Result<()> {
        if height_diff >= SEQUENCE_BLOCKDIFF_LIMIT {
            return Err(Error::BadArgument(format!(
                "Block height diff range is 0 to {}",
                SEQUENCE_BLOCKDIFF_LIMIT - 1
            )));
        }
        self.sequence_number = height_diff;
        Ok(())
    }

    /// Relative lock encoded in the sequence number, if enabled.
    #[must_use]
    pub fn get_lock_time(&self) -> Option<RelativeLockTime> {
        if self.sequence_number & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return None;
        }
        let value = self.sequence_number & SEQUENCE_LOCKTIME_MASK;
        if self.sequence_number & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
            Some(RelativeLockTime::Seconds(SEQUENCE_LOCKTIME_GRANULARITY * value))
        } else {
            Some(RelativeLockTime::Blocks(value))
        }
    }

    #[must_use]
    pub fn to_tx_in(&self) -> TxIn {
        TxIn {
            prev_output: self.outpoint(),
            unlock_script: self.script.clone(),
            sequence: self.sequence_number,
        }
    }

    #[must_use]
    pub fn from_tx_in(tx_in: &TxIn) -> InputBase {
        InputBase {
            prev_tx_id: tx_in.prev_output.hash,
            output_index: tx_in.prev_output.index,
            sequence_number: tx_in.sequence,
            script: tx_in.unlock_script.clone(),
            output: None,
        }
    }

    /// Serialized size of the input as it currently stands.
    #[must_use]
    pub fn size(&self) -> usize {
        OutPoint::SIZE + var_int::size(self.script.len() as u64) + self.script.len() + 4
    }

    #[must_use]
    pub fn to_object(&self) -> InputObject {
        InputObject {
            prev_tx_id: self.prev_tx_id.encode(),
            output_index: self.output_index,
            sequence_number: self.sequence_number,
            script: self.script.to_hex(),
            script_string: Some(self.script.to_string()),
            output: self.output.as_ref().map(Output::to_object),
            ..InputObject::default()
        }
    }

    /// # Errors
    /// Bad hex in the id or script, or an invalid output.
    pub fn from_object(obj: &InputObject) -> Result<InputBase> {
        let output = match &obj.output {
            Some(o) => Some(Output::from_object(o)?),
            None => None,
        };
        Ok(InputBase {
            prev_tx_id: Hash256::decode(&obj.prev_tx_id)?,
            output_index: obj.output_index,
            sequence_number: obj.sequence_number,
            script: Script::from_hex(&obj.script)?,
            output,
        })
    }

    fn satoshis(&self) -> Option<u64> {
        self.output.as_ref().map(|o| o.satoshis)
    }

    // Output being spent, required for signing
    fn spent_output(&self) -> Result<&Output> {
        self.output.as_ref().ok_or_else(|| {
            Error::BadArgument("Need information about the UTXO script and satoshis".to_string())
        })
    }

    // Signs with one key over `subscript` and binds the result to this input
    #[allow(clippy::too_many_arguments)]
    fn create_signature(
        &self,
        tx: &Tx,
        private_key: &PrivateKey,
        index: usize,
        sigtype: u32,
        subscript: &Script,
        flags: u32,
        method: SigningMethod,
    ) -> Result<TransactionSignature> {
        let signature = sighash::sign(
            tx,
            private_key,
            sigtype,
            index,
            subscript,
            self.satoshis(),
            flags,
            method,
        )?;
        Ok(TransactionSignature {
            public_key: private_key.public_key(),
            prev_tx_id: self.prev_tx_id,
            output_index: self.output_index,
            input_index: index,
            signature,
            sigtype,
        })
    }
}

impl Serializable<InputBase> for InputBase {
    fn read(reader: &mut dyn Read) -> Result<InputBase> {
        Ok(InputBase::from_tx_in(&TxIn::read(reader)?))
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.to_tx_in().write(writer)
    }
}

/// Plain object form of an input. Variant fields are present only for the variants that use them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputObject {
    pub prev_tx_id: String,
    pub output_index: u32,
    pub sequence_number: u32,
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<Option<TransactionSignatureObject>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_public_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_public_key: Option<String>,
}

/// Signing protocol of an input kind.
pub trait Signable {
    fn base(&self) -> &InputBase;

    fn base_mut(&mut self) -> &mut InputBase;

    /// Script committed to by the signature hash.
    fn subscript(&self) -> Script;

    /// Signatures `private_key` can contribute to this input, possibly none.
    ///
    /// # Errors
    /// Missing output information or signing failures.
    #[allow(clippy::too_many_arguments)]
    fn get_signatures(
        &self,
        tx: &Tx,
        private_key: &PrivateKey,
        index: usize,
        sigtype: u32,
        flags: u32,
        method: SigningMethod,
    ) -> Result<Vec<TransactionSignature>>;

    /// Checks a signature and places it into the unlocking script.
    ///
    /// # Errors
    /// Invalid or unexpected signatures, or an input that needs no more.
    fn add_signature(&mut self, tx: &Tx, signature: TransactionSignature, flags: u32)
        -> Result<()>;

    fn clear_signatures(&mut self);

    fn is_fully_signed(&self) -> bool;

    /// Upper bound on the unlocking script size once fully signed.
    fn estimate_size(&self) -> usize;

    fn is_valid_signature(&self, tx: &Tx, signature: &TransactionSignature, flags: u32) -> bool {
        sighash::verify(
            tx,
            &signature.signature,
            signature.sigtype,
            &signature.public_key,
            signature.input_index,
            &self.subscript(),
            self.base().satoshis(),
            flags,
        )
    }
}

/// Any transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Input whose spent output is unknown or of no supported kind. It cannot be signed.
    Generic(InputBase),
    PublicKey(PublicKeyInput),
    PublicKeyHash(PublicKeyHashInput),
    MultiSig(MultiSigInput),
    MultiSigScriptHash(MultiSigScriptHashInput),
    Escrow(EscrowInput),
}

impl Input {
    #[must_use]
    pub fn base(&self) -> &InputBase {
        match self {
            Input::Generic(base) => base,
            Input::PublicKey(i) => i.base(),
            Input::PublicKeyHash(i) => i.base(),
            Input::MultiSig(i) => i.base(),
            Input::MultiSigScriptHash(i) => i.base(),
            Input::Escrow(i) => i.base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut InputBase {
        match self {
            Input::Generic(base) => base,
            Input::PublicKey(i) => i.base_mut(),
            Input::PublicKeyHash(i) => i.base_mut(),
            Input::MultiSig(i) => i.base_mut(),
            Input::MultiSigScriptHash(i) => i.base_mut(),
            Input::Escrow(i) => i.base_mut(),
        }
    }

    /// Signing protocol, or `None` for a generic input.
    #[must_use]
    pub fn signable(&self) -> Option<&dyn Signable> {
        match self {
            Input::Generic(_) => None,
            Input::PublicKey(i) => Some(i),
            Input::PublicKeyHash(i) => Some(i),
            Input::MultiSig(i) => Some(i),
            Input::MultiSigScriptHash(i) => Some(i),
            Input::Escrow(i) => Some(i),
        }
    }

    pub fn signable_mut(&mut self) -> Option<&mut dyn Signable> {
        match self {
            Input::Generic(_) => None,
            Input::PublicKey(i) => Some(i),
            Input::PublicKeyHash(i) => Some(i),
            Input::MultiSig(i) => Some(i),
            Input::MultiSigScriptHash(i) => Some(i),
            Input::Escrow(i) => Some(i),
        }
    }

    /// Unlocking script size estimate. Generic inputs count their current script.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        match self.signable() {
            Some(s) => s.estimate_size(),
            None => {
                let len = self.base().script.len();
                var_int::size(len as u64) + len + 4
            }
        }
    }

    pub fn clear_signatures(&mut self) {
        if let Some(s) = self.signable_mut() {
            s.clear_signatures();
        }
    }

    #[must_use]
    pub fn to_object(&self) -> InputObject {
        match self {
            Input::MultiSig(i) => i.to_object(),
            Input::MultiSigScriptHash(i) => i.to_object(),
            Input::Escrow(i) => i.to_object(),
            _ => self.base().to_object(),
        }
    }

    /// Rebuilds an input, choosing its variant from the spent output script and the
    /// variant fields present.
    ///
    /// # Errors
    /// Malformed fields, or a spent output script no variant supports.
    pub fn from_object(obj: &InputObject) -> Result<Input> {
        let base = InputBase::from_object(obj)?;
        let script = match &base.output {
            Some(output) => output.script.clone(),
            None => return Ok(Input::Generic(base)),
        };
        if script.is_public_key_hash_out() {
            return Ok(Input::PublicKeyHash(PublicKeyHashInput::new(base)?));
        }
        if script.is_public_key_out() {
            return Ok(Input::PublicKey(PublicKeyInput::new(base)?));
        }
        if let (Some(keys), Some(threshold)) = (&obj.public_keys, obj.threshold) {
            let public_keys = parse_public_keys(keys)?;
            let signatures = parse_signatures(obj.signatures.as_deref())?;
            if script.is_multisig_out() {
                let input = MultiSigInput::new(base, &public_keys, threshold, true)?;
                return Ok(Input::MultiSig(input.with_signatures(signatures)?));
            }
            if script.is_script_hash_out() {
                let input = MultiSigScriptHashInput::new(base, &public_keys, threshold, true)?;
                return Ok(Input::MultiSigScriptHash(input.with_signatures(signatures)?));
            }
        }
        if let (Some(keys), Some(reclaim)) = (&obj.input_public_keys, &obj.reclaim_public_key) {
            let input_public_keys = parse_public_keys(keys)?;
            let reclaim = PublicKey::from_hex(reclaim)?;
            return Ok(Input::Escrow(EscrowInput::new(base, &input_public_keys, reclaim)?));
        }
        Err(Error::Unsupported(format!(
            "Unsupported input script type: {}",
            script.to_hex()
        )))
    }
}

fn parse_public_keys(keys: &[String]) -> Result<Vec<PublicKey>> {
    keys.iter().map(|k| PublicKey::from_hex(k)).collect()
}

fn parse_signatures(
    signatures: Option<&[Option<TransactionSignatureObject>]>,
) -> Result<Option<Vec<Option<TransactionSignature>>>> {
    match signatures {
        Some(sigs) => sigs
            .iter()
            .map(|s| s.as_ref().map(TransactionSignature::from_object).transpose())
            .collect::<Result<Vec<_>>>()
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::util::Hash160;
    use pretty_assertions::assert_eq;

    fn base() -> InputBase {
        InputBase::new(Hash256([7; 32]), 1, None)
    }

    #[test]
    fn sequence_defaults() {
        let input = base();
        assert!(input.is_final());
        assert!(!input.is_null());
        assert_eq!(input.get_lock_time(), None);
        let null = InputBase::new(Hash256::default(), MAXINT, None);
        assert!(null.is_null());
    }

    #[test]
    fn relative_locks() -> Result<()> {
        let mut input = base();
        input.lock_for_seconds(1024 + 100)?;
        assert_eq!(input.sequence_number, 2 | SEQUENCE_LOCKTIME_TYPE_FLAG);
        assert_eq!(input.get_lock_time(), Some(RelativeLockTime::Seconds(1024)));
        assert!(!input.is_final());
        input.lock_until_block_height(144)?;
        assert_eq!(input.sequence_number, 144);
        assert_eq!(input.get_lock_time(), Some(RelativeLockTime::Blocks(144)));
        assert!(input.lock_for_seconds(512 * 0xffff).is_err());
        assert!(input.lock_until_block_height(0xffff).is_err());
        input.lock_for_seconds(512 * 0xffff - 1)?;
        assert_eq!(input.get_lock_time(), Some(RelativeLockTime::Seconds(512 * 0xfffe)));
        Ok(())
    }

    #[test]
    fn wire_round_trip() -> Result<()> {
        let mut input = base();
        input.script = Script(vec![0x51]);
        input.sequence_number = 5;
        let bytes = input.to_bytes();
        assert_eq!(bytes.len(), input.size());
        assert_eq!(&bytes[..32], &[7; 32]);
        assert_eq!(&bytes[32..36], &[1, 0, 0, 0]);
        assert_eq!(InputBase::from_bytes(&bytes)?, input);
        Ok(())
    }

    #[test]
    fn object_dispatch() -> Result<()> {
        let mut obj = base().to_object();
        assert_eq!(obj.prev_tx_id, "07".repeat(32));
        assert!(matches!(Input::from_object(&obj)?, Input::Generic(_)));

        let pkh = Script::build_public_key_hash_out(&Hash160([1; 20]));
        obj.output = Some(Output::new(1000, pkh).to_object());
        let input = Input::from_object(&obj)?;
        assert!(matches!(input, Input::PublicKeyHash(_)));
        assert_eq!(input.to_object(), obj);

        obj.output = Some(Output::new(1000, Script(vec![0x51])).to_object());
        assert!(matches!(Input::from_object(&obj), Err(Error::Unsupported(_))));
        Ok(())
    }

    #[test]
    fn object_json_names() -> Result<()> {
        let json = serde_json::to_value(base().to_object())?;
        assert_eq!(json["outputIndex"], 1);
        assert_eq!(json["sequenceNumber"], MAXINT);
        assert_eq!(json["script"], "");
        assert!(json.get("publicKeys").is_none());
        Ok(())
    }
}
