use super::{InputBase, InputObject, Signable};
use crate::crypto::{PrivateKey, PublicKey, SigningMethod};
use crate::messages::Tx;
use crate::script::op_codes::OP_PUSHDATA1;
use crate::script::Script;
use crate::transaction::sighash::{self, SigHashCache};
use crate::transaction::signature::TransactionSignature;
use crate::util::{Error, Hash256, Result};

/// Spends an escrow P2SH output through its reclaim branch.
///
/// The cooperative branch checks data signatures made outside the transaction, so only the
/// reclaim key signs here, and always with Schnorr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowInput {
    base: InputBase,
    input_public_keys: Vec<PublicKey>,
    reclaim_public_key: PublicKey,
    redeem_script: Script,
}

impl EscrowInput {
    /// Schnorr signature push with its sighash byte.
    pub const SIGNATURE_SIZE: usize = 66;
    /// Compressed key push.
    pub const PUBKEY_SIZE: usize = 34;

    /// # Errors
    /// A missing spent output, an unsupported key set, or a redeem script that does not hash
    /// to the spent script.
    pub fn new(
        base: InputBase,
        input_public_keys: &[PublicKey],
        reclaim_public_key: PublicKey,
    ) -> Result<EscrowInput> {
        let redeem_script = Script::build_escrow_out(input_public_keys, &reclaim_public_key)?;
        if Script::build_script_hash_out(&redeem_script) != base.spent_output()?.script {
            return Err(Error::BadArgument(
                "Provided public keys don't hash to the provided output".to_string(),
            ));
        }
        Ok(EscrowInput {
            base,
            input_public_keys: input_public_keys.to_vec(),
            reclaim_public_key,
            redeem_script,
        })
    }

    #[must_use]
    pub fn redeem_script(&self) -> &Script {
        &self.redeem_script
    }

    #[must_use]
    pub fn reclaim_public_key(&self) -> &PublicKey {
        &self.reclaim_public_key
    }

    #[must_use]
    pub fn input_public_keys(&self) -> &[PublicKey] {
        &self.input_public_keys
    }

    /// Digest the reclaim key signs for this input, in the byte order it is signed.
    ///
    /// # Errors
    /// `Error::BadArgument` for any key other than the reclaim key, plus [`sighash::sighash`]
    /// failures.
    pub fn get_sighash(
        &self,
        tx: &Tx,
        public_key: &PublicKey,
        index: usize,
        sigtype: u32,
        flags: u32,
    ) -> Result<Hash256> {
        self.check_reclaim_key(public_key)?;
        let mut cache = SigHashCache::new();
        sighash::sighash(
            tx,
            index,
            &self.redeem_script,
            self.base.satoshis(),
            sigtype,
            flags,
            &mut cache,
        )
    }

    #[must_use]
    pub fn to_object(&self) -> InputObject {
        let mut obj = self.base.to_object();
        obj.input_public_keys = Some(self.input_public_keys.iter().map(PublicKey::to_hex).collect());
        obj.reclaim_public_key = Some(self.reclaim_public_key.to_hex());
        obj
    }

    fn check_reclaim_key(&self, public_key: &PublicKey) -> Result<()> {
        if *public_key != self.reclaim_public_key {
            return Err(Error::BadArgument(
                "Only the reclaim key can sign an escrow input".to_string(),
            ));
        }
        Ok(())
    }

    fn redeem_push_size(&self) -> usize {
        let len = self.redeem_script.len();
        let prefix = if len < OP_PUSHDATA1 as usize {
            1
        } else if len <= 0xff {
            2
        } else if len <= 0xffff {
            3
        } else {
            5
        };
        prefix + len
    }
}

impl Signable for EscrowInput {
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
        _method: SigningMethod,
    ) -> Result<Vec<TransactionSignature>> {
        self.base.spent_output()?;
        if private_key.public_key() != self.reclaim_public_key {
            return Ok(Vec::new());
        }
        let signature = self.base.create_signature(
            tx,
            private_key,
            index,
            sigtype,
            &self.redeem_script,
            flags,
            SigningMethod::Schnorr,
        )?;
        Ok(vec![signature])
    }

    fn add_signature(
        &mut self,
        tx: &Tx,
        signature: TransactionSignature,
        flags: u32,
    ) -> Result<()> {
        self.check_reclaim_key(&signature.public_key)?;
        if signature.signature.method() != SigningMethod::Schnorr {
            return Err(Error::BadArgument(
                "Escrow inputs require Schnorr signatures".to_string(),
            ));
        }
        if !self.is_valid_signature(tx, &signature, flags) {
            return Err(Error::IllegalState("Signature is invalid".to_string()));
        }
        self.base.script = Script::build_escrow_in(
            &self.reclaim_public_key,
            &signature.to_tx_format(),
            &self.redeem_script,
        );
        Ok(())
    }

    fn clear_signatures(&mut self) {
        self.base.script = Script::new();
    }

    fn is_fully_signed(&self) -> bool {
        match self.base.script.pushes() {
            Ok(pushes) => {
                pushes.len() == 3
                    && pushes[0].len() == Self::SIGNATURE_SIZE - 1
                    && pushes[1] == self.reclaim_public_key.to_bytes()
                    && pushes[2] == self.redeem_script.0
            }
            Err(_) => false,
        }
    }

    fn estimate_size(&self) -> usize {
        Self::SIGNATURE_SIZE + Self::PUBKEY_SIZE + self.redeem_push_size()
    }
}
