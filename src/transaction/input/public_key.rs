use super::{InputBase, Signable};
use crate::crypto::{PrivateKey, SigningMethod};
use crate::messages::Tx;
use crate::script::Script;
use crate::transaction::signature::TransactionSignature;
use crate::util::{Error, Result};

/// Spends a pay-to-public-key output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInput {
    base: InputBase,
}

impl PublicKeyInput {
    /// Largest DER signature plus sighash byte and push opcode.
    pub const SCRIPT_MAX_SIZE: usize = 73;

    /// # Errors
    /// `Error::BadArgument` if the spent output is missing or not pay-to-public-key.
    pub fn new(base: InputBase) -> Result<PublicKeyInput> {
        if !base.spent_output()?.script.is_public_key_out() {
            return Err(Error::BadArgument(
                "Spent output is not a pay-to-public-key script".to_string(),
            ));
        }
        Ok(PublicKeyInput { base })
    }
}

impl Signable for PublicKeyInput {
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
        if script.public_key() != Some(private_key.public_key()) {
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
        if script.public_key() != Some(signature.public_key) {
            return Err(Error::BadArgument(
                "Signature has no matching public key".to_string(),
            ));
        }
        if !self.is_valid_signature(tx, &signature, flags) {
            return Err(Error::IllegalState("Signature is invalid".to_string()));
        }
        self.base.script = Script::build_public_key_in(&signature.to_tx_format());
        Ok(())
    }

    fn clear_signatures(&mut self) {
        self.base.script = Script::new();
    }

    fn is_fully_signed(&self) -> bool {
        self.base.script.is_public_key_in()
    }

    fn estimate_size(&self) -> usize {
        Self::SCRIPT_MAX_SIZE
    }
}
