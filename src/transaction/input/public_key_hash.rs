use super::{InputBase, Signable};
use crate::crypto::{PrivateKey, SigningMethod};
use crate::messages::Tx;
use crate::script::Script;
use crate::transaction::signature::TransactionSignature;
use crate::util::{Error, Result};

/// Spends a pay-to-public-key-hash output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyHashInput {
    base: InputBase,
}

impl PublicKeyHashInput {
    /// Signature push plus an uncompressed-size key push (73 + 34).
    pub const SCRIPT_MAX_SIZE: usize = 107;

    /// # Errors
    /// `Error::BadArgument` if the spent output is missing or not pay-to-public-key-hash.
    pub fn new(base: InputBase) -> Result<PublicKeyHashInput> {
        if !base.spent_output()?.script.is_public_key_hash_out() {
            return Err(Error::BadArgument(
                "Spent output is not a pay-to-public-key-hash script".to_string(),
            ));
        }
        Ok(PublicKeyHashInput { base })
    }
}

impl Signable for PublicKeyHashInput {
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
        let script = &self.base.spent_output()?.script;
        if script.public_key_hash() != Some(private_key.public_key().hash160()) {
            return Ok(Vec::new());
        }
        let signature =
            self.base.create_signature(tx, private_key, index, sigtype, script, flags, method)?;
        Ok(vec![signature])
    }

    fn add_signature(
        &mut self,
        tx: &Tx,
        signature: TransactionSignature,
        flags: u32,
    ) -> Result<()> {
        let script = &self.base.spent_output()?.script;
        if script.public_key_hash() != Some(signature.public_key.hash160()) {
            return Err(Error::BadArgument(
                "Signature has no matching public key".to_string(),
            ));
        }
        if !self.is_valid_signature(tx, &signature, flags) {
            return Err(Error::IllegalState("Signature is invalid".to_string()));
        }
        self.base.script =
            Script::build_public_key_hash_in(&signature.to_tx_format(), &signature.public_key);
        Ok(())
    }

    fn clear_signatures(&mut self) {
        self.base.script = Script::new();
    }

    fn is_fully_signed(&self) -> bool {
        self.base.script.is_public_key_hash_in()
    }

    fn estimate_size(&self) -> usize {
        Self::SCRIPT_MAX_SIZE
    }
}
