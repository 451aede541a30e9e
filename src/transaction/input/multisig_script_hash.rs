use super::multisig::{self, Cosigners};
use super::{InputBase, InputObject, Signable};
use crate::crypto::{PrivateKey, PublicKey, SigningMethod};
use crate::messages::Tx;
use crate::script::Script;
use crate::transaction::signature::TransactionSignature;
use crate::util::{Error, Result};

/// Spends a P2SH output whose redeem script is an m-of-n multisig.
///
/// Schnorr check bits are not stored; they are rebuilt from the signature slots each time
/// the unlocking script is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSigScriptHashInput {
    base: InputBase,
    cosigners: Cosigners,
    redeem_script: Script,
}

impl MultiSigScriptHashInput {
    /// `OP_0`, the redeem script push prefix and its `OP_m`, `OP_n` and `OP_CHECKMULTISIG`.
    pub const OPCODES_SIZE: usize = 7;
    /// Push length, DER signature and sighash byte.
    pub const SIGNATURE_SIZE: usize = 74;
    /// Push length and compressed key.
    pub const PUBKEY_SIZE: usize = 34;

    /// Keys are sorted by their hex form unless `no_sorting` is set.
    ///
    /// # Errors
    /// A missing spent output, a bad threshold, or a redeem script that does not hash to
    /// the spent script.
    pub fn new(
        base: InputBase,
        public_keys: &[PublicKey],
        threshold: usize,
        no_sorting: bool,
    ) -> Result<MultiSigScriptHashInput> {
        let cosigners = Cosigners::new(public_keys, threshold, no_sorting)?;
        let redeem_script = cosigners.redeem_script()?;
        if Script::build_script_hash_out(&redeem_script) != base.spent_output()?.script {
            return Err(Error::BadArgument(
                "Provided public keys don't hash to the provided output".to_string(),
            ));
        }
        Ok(MultiSigScriptHashInput {
            base,
            cosigners,
            redeem_script,
        })
    }

    /// Restores previously collected signatures, one slot per key.
    ///
    /// # Errors
    /// `Error::BadData` if the slot count differs from the key count.
    pub fn with_signatures(
        mut self,
        signatures: Option<Vec<Option<TransactionSignature>>>,
    ) -> Result<MultiSigScriptHashInput> {
        self.cosigners.set_signatures(signatures)?;
        Ok(self)
    }

    #[must_use]
    pub fn redeem_script(&self) -> &Script {
        &self.redeem_script
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

    /// See [`normalize_signatures`](super::normalize_signatures).
    #[must_use]
    pub fn normalize_signatures(
        tx: &Tx,
        input: &dyn Signable,
        input_index: usize,
        signatures: &[Vec<u8>],
        public_keys: &[PublicKey],
        flags: u32,
    ) -> Vec<Option<TransactionSignature>> {
        multisig::normalize_signatures(tx, input, input_index, signatures, public_keys, flags)
    }

    #[must_use]
    pub fn to_object(&self) -> InputObject {
        let mut obj = self.base.to_object();
        self.cosigners.fill_object(&mut obj);
        obj
    }

    fn update_script(&mut self) {
        let (signatures, check_bits) = self.cosigners.unlocking_parts();
        self.base.script =
            Script::build_p2sh_multisig_in(&signatures, &self.redeem_script, check_bits.as_deref());
    }
}

impl Signable for MultiSigScriptHashInput {
    fn base(&self) -> &InputBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut InputBase {
        &mut self.base
    }

    fn subscript(&self) -> Script {
        self.redeem_script.clone()
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
        self.cosigners.get_signatures(
            &self.base,
            tx,
            private_key,
            index,
            sigtype,
            &self.redeem_script,
            flags,
            method,
        )
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
        Self::OPCODES_SIZE
            + self.cosigners.threshold * Self::SIGNATURE_SIZE
            + self.cosigners.public_keys.len() * Self::PUBKEY_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::output::Output;
    use crate::transaction::sighash::{DEFAULT_SIGN_FLAGS, SIGHASH_ALL, SIGHASH_FORKID};
    use crate::util::Hash256;
    use pretty_assertions::assert_eq;

    const SIGTYPE: u32 = SIGHASH_ALL | SIGHASH_FORKID;

    fn setup() -> (Vec<PrivateKey>, MultiSigScriptHashInput, Tx) {
        let keys: Vec<PrivateKey> = (4..=6u8).map(|i| PrivateKey::new(&[i; 32]).unwrap()).collect();
        let public_keys: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        let redeem = Script::build_multisig_out(&public_keys, 2, false).unwrap();
        let lock = Script::build_script_hash_out(&redeem);
        let base = InputBase::new(Hash256([6; 32]), 1, Some(Output::new(70_000, lock)));
        let input = MultiSigScriptHashInput::new(base, &public_keys, 2, false).unwrap();
        let tx = Tx {
            version: 1,
            inputs: vec![input.base().to_tx_in()],
            outputs: vec![Output::new(60_000, Script(vec![0x51]))],
            lock_time: 0,
        };
        (keys, input, tx)
    }

    #[test]
    fn signs_against_redeem_script() -> Result<()> {
        let (keys, mut input, tx) = setup();
        assert_eq!(input.estimate_size(), 7 + 2 * 74 + 3 * 34);
        for key in &keys[..2] {
            for sig in
                input.get_signatures(&tx, key, 0, SIGTYPE, DEFAULT_SIGN_FLAGS, SigningMethod::Ecdsa)?
            {
                input.add_signature(&tx, sig, DEFAULT_SIGN_FLAGS)?;
            }
        }
        assert!(input.is_fully_signed());
        let pushes = input.base().script.pushes()?;
        assert_eq!(pushes.len(), 4);
        assert!(pushes[0].is_empty());
        assert_eq!(pushes[3], input.redeem_script().0);

        let obj = input.to_object();
        assert_eq!(obj.threshold, Some(2));
        assert_eq!(obj.signatures.as_ref().map(|s| s.iter().flatten().count()), Some(2));

        input.clear_signatures();
        assert_eq!(input.count_missing_signatures(), 2);
        assert_eq!(input.base().script.pushes()?.len(), 2);
        Ok(())
    }

    #[test]
    fn rejects_wrong_keys() {
        let (keys, input, _) = setup();
        let mut public_keys = input.public_keys().to_vec();
        public_keys[0] = PrivateKey::new(&[9; 32]).unwrap().public_key();
        let err =
            MultiSigScriptHashInput::new(input.base().clone(), &public_keys, 2, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad argument: Provided public keys don't hash to the provided output"
        );
        let all: Vec<PublicKey> = keys.iter().map(PrivateKey::public_key).collect();
        assert!(MultiSigScriptHashInput::new(input.base().clone(), &all, 3, false).is_err());
    }

    #[test]
    fn normalizes_against_redeem_script() -> Result<()> {
        let (keys, input, tx) = setup();
        let blob = input
            .get_signatures(&tx, &keys[1], 0, SIGTYPE, DEFAULT_SIGN_FLAGS, SigningMethod::Ecdsa)?
            .remove(0)
            .to_tx_format();
        let normalized = MultiSigScriptHashInput::normalize_signatures(
            &tx,
            &input,
            0,
            &[blob],
            input.public_keys(),
            DEFAULT_SIGN_FLAGS,
        );
        assert_eq!(normalized.iter().flatten().count(), 1);
        let position = input.public_keys().iter().position(|k| *k == keys[1].public_key());
        assert!(position.is_some_and(|p| normalized[p].is_some()));
        Ok(())
    }
}
