//! Standard locking and unlocking script templates.
//!
//! Builders return fresh scripts; recognizers check a script's shape without executing it.

use crate::crypto::PublicKey;
use crate::script::op_codes::*;
use crate::script::{Chunk, Script};
use crate::util::{hash160, Error, Hash160, Result};

/// Largest standard data-carrier output, opcode and pushes included.
pub const MAX_DATA_OUT_SIZE: usize = 223;

fn is_public_key_bytes(b: &[u8]) -> bool {
    match b.first() {
        Some(0x02) | Some(0x03) => b.len() == 33,
        Some(0x04) => b.len() == 65,
        _ => false,
    }
}

// DER ECDSA (leading 0x30) or 64-byte Schnorr, each followed by a sighash type byte
fn is_tx_signature_bytes(b: &[u8]) -> bool {
    !b.is_empty() && (b[0] == 0x30 || b.len() == 65)
}

fn single_push(chunk: &Chunk) -> Option<&[u8]> {
    match &chunk.data {
        Some(data) if !data.is_empty() => Some(data.as_slice()),
        _ => None,
    }
}

impl Script {
    /// `<pubkey> OP_CHECKSIG`
    #[must_use]
    pub fn build_public_key_out(public_key: &PublicKey) -> Script {
        let mut script = Script::new();
        script.append_data(&public_key.to_bytes());
        script.append(OP_CHECKSIG);
        script
    }

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    #[must_use]
    pub fn build_public_key_hash_out(hash: &Hash160) -> Script {
        let mut script = Script::new();
        script.append(OP_DUP);
        script.append(OP_HASH160);
        script.append(OP_PUSH + 20);
        script.append_slice(&hash.0);
        script.append(OP_EQUALVERIFY);
        script.append(OP_CHECKSIG);
        script
    }

    /// `OP_HASH160 <hash160(redeem_script)> OP_EQUAL`
    #[must_use]
    pub fn build_script_hash_out(redeem_script: &Script) -> Script {
        Script::build_script_hash_out_from_hash(&hash160(&redeem_script.0))
    }

    /// `OP_HASH160 <hash> OP_EQUAL`
    #[must_use]
    pub fn build_script_hash_out_from_hash(hash: &Hash160) -> Script {
        let mut script = Script::new();
        script.append(OP_HASH160);
        script.append(OP_PUSH + 20);
        script.append_slice(&hash.0);
        script.append(OP_EQUAL);
        script
    }

    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`, keys sorted by hex unless `no_sorting`.
    ///
    /// # Errors
    /// `Error::BadArgument` if the threshold or the key count does not fit a small integer.
    pub fn build_multisig_out(
        public_keys: &[PublicKey],
        threshold: usize,
        no_sorting: bool,
    ) -> Result<Script> {
        let mut keys = public_keys.to_vec();
        if !no_sorting {
            keys.sort();
        }
        let mut script = Script::new();
        script.append_num(threshold)?;
        for key in &keys {
            script.append_data(&key.to_bytes());
        }
        script.append_num(keys.len())?;
        script.append(OP_CHECKMULTISIG);
        Ok(script)
    }

    /// `OP_RETURN <data>`
    #[must_use]
    pub fn build_data_out(data: &[u8]) -> Script {
        let mut script = Script::new();
        script.append(OP_RETURN);
        if !data.is_empty() {
            script.append_data(data);
        }
        script
    }

    /// `<signature+sigtype>`
    #[must_use]
    pub fn build_public_key_in(signature: &[u8]) -> Script {
        let mut script = Script::new();
        script.append_data(signature);
        script
    }

    /// `<signature+sigtype> <pubkey>`
    #[must_use]
    pub fn build_public_key_hash_in(signature: &[u8], public_key: &PublicKey) -> Script {
        let mut script = Script::new();
        script.append_data(signature);
        script.append_data(&public_key.to_bytes());
        script
    }

    /// `<dummy> <signature+sigtype>...`
    ///
    /// The dummy is `OP_0` for ECDSA. Schnorr multisig replaces it with the check-bits field.
    #[must_use]
    pub fn build_multisig_in(signatures: &[Vec<u8>], check_bits: Option<&[bool]>) -> Script {
        let mut script = Script::new();
        match check_bits {
            Some(bits) => script.append_check_bits(bits),
            None => script.append(OP_0),
        }
        for signature in signatures {
            script.append_data(signature);
        }
        script
    }

    /// Same as [`Script::build_multisig_in`] followed by a push of the redeem script.
    #[must_use]
    pub fn build_p2sh_multisig_in(
        signatures: &[Vec<u8>],
        redeem_script: &Script,
        check_bits: Option<&[bool]>,
    ) -> Script {
        let mut script = Script::build_multisig_in(signatures, check_bits);
        script.append_data(&redeem_script.0);
        script
    }

    // Bit i set means key i is checked. Little-endian, ceil(n/8) bytes, minimally pushed.
    fn append_check_bits(&mut self, bits: &[bool]) {
        let mut field = vec![0u8; bits.len().div_ceil(8).max(1)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                field[i / 8] |= 1 << (i % 8);
            }
        }
        match field.as_slice() {
            [0] => self.append(OP_0),
            [n @ 1..=16] => self.append(OP_1 + n - 1),
            [0x81] => self.append(OP_1NEGATE),
            _ => self.append_data(&field),
        }
    }

    /// Whether this is `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    #[must_use]
    pub fn is_public_key_hash_out(&self) -> bool {
        let s = &self.0;
        s.len() == 25
            && s[0] == OP_DUP
            && s[1] == OP_HASH160
            && s[2] == OP_PUSH + 20
            && s[23] == OP_EQUALVERIFY
            && s[24] == OP_CHECKSIG
    }

    /// Whether this is `OP_HASH160 <20 bytes> OP_EQUAL`.
    #[must_use]
    pub fn is_script_hash_out(&self) -> bool {
        let s = &self.0;
        s.len() == 23 && s[0] == OP_HASH160 && s[1] == OP_PUSH + 20 && s[22] == OP_EQUAL
    }

    /// Whether this is `<valid pubkey> OP_CHECKSIG`.
    #[must_use]
    pub fn is_public_key_out(&self) -> bool {
        self.public_key().is_some()
    }

    /// Whether this is `OP_m <data>... OP_n OP_CHECKMULTISIG`.
    #[must_use]
    pub fn is_multisig_out(&self) -> bool {
        let chunks = match self.chunks() {
            Ok(c) => c,
            Err(_) => return false,
        };
        let n = chunks.len();
        n > 3
            && decode_small_int(chunks[0].opcode).is_some()
            && chunks[1..n - 2].iter().all(|c| c.data.is_some())
            && decode_small_int(chunks[n - 2].opcode).is_some()
            && chunks[n - 1].opcode == OP_CHECKMULTISIG
    }

    /// Whether this is `OP_RETURN` followed only by pushes, within the standard size.
    #[must_use]
    pub fn is_data_out(&self) -> bool {
        if self.0.first() != Some(&OP_RETURN) || self.0.len() > MAX_DATA_OUT_SIZE {
            return false;
        }
        match self.chunks() {
            Ok(chunks) => chunks[1..].iter().all(Chunk::is_push_only),
            Err(_) => false,
        }
    }

    /// Whether this is a lone `<signature+sigtype>` push.
    #[must_use]
    pub fn is_public_key_in(&self) -> bool {
        match self.chunks() {
            Ok(chunks) => {
                chunks.len() == 1 && single_push(&chunks[0]).is_some_and(is_tx_signature_bytes)
            }
            Err(_) => false,
        }
    }

    /// Whether this is `<signature+sigtype> <pubkey>`.
    #[must_use]
    pub fn is_public_key_hash_in(&self) -> bool {
        match self.chunks() {
            Ok(chunks) => {
                chunks.len() == 2
                    && single_push(&chunks[0]).is_some_and(is_tx_signature_bytes)
                    && single_push(&chunks[1]).is_some_and(is_public_key_bytes)
            }
            Err(_) => false,
        }
    }

    /// Hash committed to by a P2PKH locking script.
    #[must_use]
    pub fn public_key_hash(&self) -> Option<Hash160> {
        if self.is_public_key_hash_out() {
            Hash160::from_slice(&self.0[3..23]).ok()
        } else {
            None
        }
    }

    /// Hash committed to by a P2SH locking script.
    #[must_use]
    pub fn script_hash(&self) -> Option<Hash160> {
        if self.is_script_hash_out() {
            Hash160::from_slice(&self.0[2..22]).ok()
        } else {
            None
        }
    }

    /// Key locked by a P2PK script.
    #[must_use]
    pub fn public_key(&self) -> Option<PublicKey> {
        let chunks = self.chunks().ok()?;
        if chunks.len() != 2 || chunks[1].opcode != OP_CHECKSIG {
            return None;
        }
        let key = single_push(&chunks[0]).filter(|b| is_public_key_bytes(b))?;
        PublicKey::from_slice(key).ok()
    }

    /// Data pushes of the script in order, failing on any non-push opcode.
    ///
    /// # Errors
    /// `Error::ScriptError` for unparseable scripts or non-push opcodes.
    pub fn pushes(&self) -> Result<Vec<Vec<u8>>> {
        self.chunks()?
            .into_iter()
            .map(|c| match c.data {
                Some(data) => Ok(data),
                None if c.opcode == OP_0 => Ok(Vec::new()),
                None => Err(Error::ScriptError(format!(
                    "Expected push, found opcode {}",
                    c.opcode
                ))),
            })
            .collect()
    }
}
