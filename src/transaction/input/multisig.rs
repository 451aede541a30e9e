use super::{InputBase, InputObject, Signable};
use crate::crypto::{PrivateKey, PublicKey, Signature, SigningMethod};
use crate::messages::Tx;
use crate::script::Script;
use crate::transaction::sighash;
use crate::transaction::signature::TransactionSignature;
use crate::util::{Error, Result};
use log::warn;

/// Keys, threshold and collected signatures of an m-of-n input.
///
/// Signatures are stored by key position so the unlocking script lists them in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Cosigners {
    pub(super) public_keys: Vec<PublicKey>,
    pub(super) threshold: usize,
    pub(super) signatures: Vec<Option<TransactionSignature>>,
}

impl Cosigners {
    pub(super) fn new(public_keys: &[PublicKey], threshold: usize, no_sorting: bool) -> Result<Cosigners> {
        if threshold == 0 || threshold > public_keys.len() {
            return Err(Error::BadArgument(format!(
                "Threshold {} is not within 1 and {}",
                threshold,
                public_keys.len()
            )));
        }
        let mut public_keys = public_keys.to_vec();
        if !no_sorting {
            public_keys.sort();
        }
        Ok(Cosigners {
            signatures: vec![None; public_keys.len()],
            public_keys,
            threshold,
        })
    }

    // Redeem script built from the keys in their stored order
    pub(super) fn redeem_script(&self) -> Result<Script> {
        Script::build_multisig_out(&self.public_keys, self.threshold, true)
    }

    pub(super) fn set_signatures(
        &mut self,
        signatures: Option<Vec<Option<TransactionSignature>>>,
    ) -> Result<()> {
        if let Some(signatures) = signatures {
            if signatures.len() != self.public_keys.len() {
                return Err(Error::BadData(format!(
                    "Expected {} signature slots, found {}",
                    self.public_keys.len(),
                    signatures.len()
                )));
            }
            self.signatures = signatures;
        }
        Ok(())
    }

    fn index_of(&self, public_key: &PublicKey) -> Option<usize> {
        self.public_keys.iter().position(|k| k == public_key)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn get_signatures(
        &self,
        base: &InputBase,
        tx: &Tx,
        private_key: &PrivateKey,
        index: usize,
        sigtype: u32,
        subscript: &Script,
        flags: u32,
        method: SigningMethod,
    ) -> Result<Vec<TransactionSignature>> {
        base.spent_output()?;
        let public_key = private_key.public_key();
        self.public_keys
            .iter()
            .filter(|k| **k == public_key)
            .map(|_| base.create_signature(tx, private_key, index, sigtype, subscript, flags, method))
            .collect()
    }

    /// Checks and stores a signature. The caller rebuilds the script afterwards.
    pub(super) fn add_signature(
        &mut self,
        signable: &dyn Signable,
        tx: &Tx,
        signature: TransactionSignature,
        flags: u32,
    ) -> Result<()> {
        if self.is_fully_signed() {
            return Err(Error::IllegalState(
                "All needed signatures have already been added".to_string(),
            ));
        }
        let position = self.index_of(&signature.public_key).ok_or_else(|| {
            Error::BadArgument("Signature has no matching public key".to_string())
        })?;
        if !signable.is_valid_signature(tx, &signature, flags) {
            return Err(Error::IllegalState("Signature is invalid".to_string()));
        }
        self.signatures[position] = Some(signature);
        Ok(())
    }

    /// Signatures in key order, plus the check-bits field when they are Schnorr.
    pub(super) fn unlocking_parts(&self) -> (Vec<Vec<u8>>, Option<Vec<bool>>) {
        let present: Vec<&TransactionSignature> = self.signatures.iter().flatten().collect();
        let blobs = present.iter().map(|s| s.to_tx_format()).collect();
        let schnorr = present.iter().any(|s| s.signature.method() == SigningMethod::Schnorr);
        let check_bits = schnorr.then(|| self.signatures.iter().map(Option::is_some).collect());
        (blobs, check_bits)
    }

    pub(super) fn clear(&mut self) {
        self.signatures = vec![None; self.public_keys.len()];
    }

    pub(super) fn count_signatures(&self) -> usize {
        self.signatures.iter().flatten().count()
    }

    pub(super) fn is_fully_signed(&self) -> bool {
        self.count_signatures() == self.threshold
    }

    pub(super) fn count_missing_signatures(&self) -> usize {
        self.threshold.saturating_sub(self.count_signatures())
    }

    pub(super) fn public_keys_without_signature(&self) -> Vec<PublicKey> {
        self.public_keys
            .iter()
            .zip(&self.signatures)
            .filter(|(_, s)| s.is_none())
            .map(|(k, _)| *k)
            .collect()
    }

    pub(super) fn fill_object(&self, obj: &mut InputObject) {
        obj.public_keys = Some(self.public_keys.iter().map(PublicKey::to_hex).collect());
        obj.threshold = Some(self.threshold);
        obj.signatures = Some(
            self.signatures
                .iter()
                .map(|s| s.as_ref().map(TransactionSignature::to_object))
                .collect(),
        );
    }
}

/// Matches raw `signature+sigtype` blobs to `public_keys` for an input.
///
/// Each key takes the first remaining blob that verifies against it under the blob's own
/// sighash type. Keys without a match get `None`. Unmatched blobs are dropped.
#[must_use]
pub fn normalize_signatures(
    tx: &Tx,
    input: &dyn Signable,
    input_index: usize,
    signatures: &[Vec<u8>],
    public_keys: &[PublicKey],
    flags: u32,
) -> Vec<Option<TransactionSignature>> {
    let base = input.base();
    let subscript = input.subscript();
    let satoshis = base.satoshis();
    let mut remaining: Vec<(Signature, u8)> = signatures
        .iter()
        .filter_map(|blob| match Signature::from_tx_format(blob) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Ignoring unparseable signature for input {}: {}", input_index, e);
                None
            }
        })
        .collect();
    let matched = public_keys
        .iter()
        .map(|public_key| {
            let position = remaining.iter().position(|(signature, sigtype)| {
                sighash::verify(
                    tx,
                    signature,
                    u32::from(*sigtype),
                    public_key,
                    input_index,
                    &subscript,
                    satoshis,
                    flags,
                )
            })?;
            let (signature, sigtype) = remaining.remove(position);
            Some(TransactionSignature {
                public_key: *public_key,
                prev_tx_id: base.prev_tx_id,
                output_index: base.output_index,
                input_index,
                signature,
                sigtype: u32::from(sigtype),
            })
        })
        .collect();
    if !remaining.is_empty() {
        warn!("{} signatures for input {} match no public key", remaining.len(), input_index);
    }
    matched
}

/// Spends a bare `OP_CHECKMULTISIG` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSigInput {
    base: InputBase,
    cosigners: Cosigners,
}

impl MultiSigInput {
    /// Leading `OP_0`.
    pub const OPCODES_SIZE: usize = 1;
    /// Push length plus DER signature and sighash byte.
    pub const SIGNATURE_SIZE: usize = 73;

    /// Keys are sorted by their hex form unless `no_sorting` is set.
    ///
    /// # Errors
    /// A missing spent output, a bad threshold, or keys that do not rebuild the spent script.
    pub fn new(
        base: InputBase,
        public_keys: &[PublicKey],
        threshold: usize,
        no_sorting: bool,
    ) -> Result<MultiSigInput> {
        let cosigners = Cosigners::new(public_keys, threshold, no_sorting)?;
        if cosigners.redeem_script()? != base.spent_output()?.script {
            return Err(Error::IllegalState(
                "Provided public keys don't match to the provided output script".to_string(),
            ));
        }
        Ok(MultiSigInput { base, cosigners })
    }

    /// Restores previously collected signatures, one slot per key.
    ///
    /// # Errors
    /// `Error::BadData` if the slot count differs from the key count.
    pub fn with_signatures(
        mut self,
        signatures: Option<Vec<Option<TransactionSignature>>>,
    ) -> Result<MultiSigInput> {
        self.cosigners.set_signatures(signatures)?;
        Ok(self)
    }

    #[must_use]
    pub fn public_keys(&self) -> &[PublicKey] {
        &self.cosigners.public_keys
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.cosigners.threshold
    }

    #[must_use]
    pub fn signatures(&self) -> &[Option<TransactionSignature>] {
        &self.cosigners.signatures
    }

    #[must_use]
    pub fn count_signatures(&self) -> usize {
        self.cosigners.count_signatures()
    }

    #[must_use]
    pub fn count_missing_signatures(&self) -> usize {
        self.cosigners.count_missing_signatures()
    }

    #[must_use]
    pub fn public_keys_without_signature(&self) -> Vec<PublicKey> {
        self.cosigners.public_keys_without_signature()
    }

    #[must_use]
    pub fn to_object(&self) -> InputObject {
        let mut obj = self.base.to_object();
        self.cosigners.fill_object(&mut obj);
        obj
    }

    fn update_script(&mut self) {
        let (signatures, check_bits) = self.cosigners.unlocking_parts();
        self.base.script = Script::build_multisig_in(&signatures, check_bits.as_deref());
    }
}

impl Signable for MultiSigInput {
    fn base(&self) -> &InputBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut InputBase {
        &mut self.base
    }

    fn subscript(&self) -> Script {
        self.base.output.as_ref().map(|o| o.script.clone()).unwrap_or_default()
    }

    fn get_signatures(
        &self,
        tx: &Tx,
        private_key: &PrivateKey,
        index: usize,
        sigtype: u32,
        flags: u32,
        method: SigningMethod,
    ) -> Result<Vec<TransactionSignature>> {
        let subscript = self.subscript();
        self.cosigners
            .get_signatures(&self.base, tx, private_key, index, sigtype, &subscript, flags, method)
    }

    fn add_signature(
        &mut self,
        tx: &Tx,
        signature: TransactionSignature,
        flags: u32,
    ) -> Result<()> {
        let mut cosigners = self.cosigners.clone();
        cosigners.add_signature(&*self, tx, signature, flags)?;
        self.cosigners = cosigners;
        self.update_script();
        Ok(())
    }

    fn clear_signatures(&mut self) {
        self.cosigners.clear();
        self.update_script();
    }

    fn is_fully_signed(&self) -> bool {
        self.cosigners.is_fully_signed()
    }

    fn estimate_size(&self) -> usize {
        Self::OPCODES_SIZE + self.cosigners.threshold * Self::SIGNATURE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::output::Output;
    use crate::transaction::sighash::{
        DEFAULT_SIGN_FLAGS, SIGHASH_ALL, SIGHASH_FORKID, SIGHASH_NONE,
    };
    use crate::util::Hash256;
    use pretty_assertions::assert_eq;

    fn keys() -> Vec<PrivateKey> {
        (1..=3u8).map(|i| PrivateKey::new(&[i; 32]).unwrap()).collect()
    }

    fn setup(threshold: usize) -> (Vec<PrivateKey>, MultiSigInput, Tx) {
        let keys = keys();
        let public_keys: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        let lock = Script::build_multisig_out(&public_keys, threshold, false).unwrap();
        let base = InputBase::new(Hash256([8; 32]), 0, Some(Output::new(100_000, lock)));
        let input = MultiSigInput::new(base, &public_keys, threshold, false).unwrap();
        let tx = Tx {
            version: 1,
            inputs: vec![input.base().to_tx_in()],
            outputs: vec![Output::new(90_000, Script(vec![0x51]))],
            lock_time: 0,
        };
        (keys, input, tx)
    }

    const SIGTYPE: u32 = SIGHASH_ALL | SIGHASH_FORKID;

    #[test]
    fn collects_signatures_in_key_order() -> Result<()> {
        let (keys, mut input, tx) = setup(2);
        assert_eq!(input.count_missing_signatures(), 2);
        for key in keys.iter().rev().take(2) {
            let sigs = input.get_signatures(
                &tx,
                key,
                0,
                SIGTYPE,
                DEFAULT_SIGN_FLAGS,
                SigningMethod::Ecdsa,
            )?;
            assert_eq!(sigs.len(), 1);
            input.add_signature(&tx, sigs[0].clone(), DEFAULT_SIGN_FLAGS)?;
        }
        assert!(input.is_fully_signed());
        assert_eq!(input.count_signatures(), 2);
        assert_eq!(input.public_keys_without_signature(), vec![keys[0].public_key()]);

        let pushes = input.base().script.pushes()?;
        assert_eq!(pushes.len(), 3);
        assert!(pushes[0].is_empty());
        let expected: Vec<Vec<u8>> = input.signatures().iter().flatten().map(|s| s.to_tx_format()).collect();
        assert_eq!(pushes[1..].to_vec(), expected);

        let extra = input.get_signatures(
            &tx,
            &keys[0],
            0,
            SIGTYPE,
            DEFAULT_SIGN_FLAGS,
            SigningMethod::Ecdsa,
        )?;
        let err = input.add_signature(&tx, extra[0].clone(), DEFAULT_SIGN_FLAGS).unwrap_err();
        assert_eq!(err.to_string(), "Illegal state: All needed signatures have already been added");

        input.clear_signatures();
        assert_eq!(input.count_signatures(), 0);
        assert_eq!(input.base().script, Script(vec![0x00]));
        Ok(())
    }

    #[test]
    fn rejects_unknown_and_invalid_signatures() -> Result<()> {
        let (keys, mut input, tx) = setup(2);
        let stranger = PrivateKey::new(&[9; 32])?;
        let mut sig = input
            .get_signatures(&tx, &keys[0], 0, SIGTYPE, DEFAULT_SIGN_FLAGS, SigningMethod::Ecdsa)?
            .remove(0);
        sig.public_key = stranger.public_key();
        let err = input.add_signature(&tx, sig.clone(), DEFAULT_SIGN_FLAGS).unwrap_err();
        assert_eq!(err.to_string(), "Bad argument: Signature has no matching public key");
        sig.public_key = keys[1].public_key();
        let err = input.add_signature(&tx, sig, DEFAULT_SIGN_FLAGS).unwrap_err();
        assert_eq!(err.to_string(), "Illegal state: Signature is invalid");
        assert_eq!(input.count_signatures(), 0);
        Ok(())
    }

    #[test]
    fn schnorr_uses_check_bits() -> Result<()> {
        let (keys, mut input, tx) = setup(1);
        let sig = input
            .get_signatures(&tx, &keys[2], 0, SIGTYPE, DEFAULT_SIGN_FLAGS, SigningMethod::Schnorr)?
            .remove(0);
        input.add_signature(&tx, sig, DEFAULT_SIGN_FLAGS)?;
        let position = input
            .public_keys()
            .iter()
            .position(|k| *k == keys[2].public_key())
            .unwrap();
        let chunks = input.base().script.chunks()?;
        assert_eq!(chunks.len(), 2);
        // Single set bit encodes as a small integer opcode.
        assert_eq!(chunks[0].opcode, 0x50 + (1u8 << position));
        assert_eq!(chunks[1].data.as_ref().map(Vec::len), Some(65));
        Ok(())
    }

    #[test]
    fn mismatched_script() {
        let keys = keys();
        let public_keys: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        let lock = Script::build_multisig_out(&public_keys, 2, false).unwrap();
        let base = InputBase::new(Hash256([8; 32]), 0, Some(Output::new(1, lock)));
        let err = MultiSigInput::new(base.clone(), &public_keys, 1, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal state: Provided public keys don't match to the provided output script"
        );
        assert!(MultiSigInput::new(base, &public_keys, 4, false).is_err());
    }

    #[test]
    fn normalizes_raw_signatures() -> Result<()> {
        let (keys, input, tx) = setup(2);
        let sign = |key: &PrivateKey, sigtype: u32| {
            input
                .get_signatures(&tx, key, 0, sigtype, DEFAULT_SIGN_FLAGS, SigningMethod::Ecdsa)
                .unwrap()
                .remove(0)
                .to_tx_format()
        };
        let a = sign(&keys[0], SIGTYPE);
        let c = sign(&keys[2], SIGHASH_NONE | SIGHASH_FORKID);
        let blobs = vec![c, a, vec![0x30, 0x01]];
        let order: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        let normalized = normalize_signatures(&tx, &input, 0, &blobs, &order, DEFAULT_SIGN_FLAGS);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].as_ref().map(|s| s.sigtype), Some(SIGTYPE));
        assert!(normalized[1].is_none());
        let third = normalized[2].as_ref().unwrap();
        assert_eq!(third.sigtype, SIGHASH_NONE | SIGHASH_FORKID);
        assert_eq!(third.public_key, keys[2].public_key());
        assert_eq!(third.prev_tx_id, Hash256([8; 32]));
        Ok(())
    }
}
