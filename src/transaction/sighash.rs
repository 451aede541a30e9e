//! Signature hash computation.
//!
//! Two algorithms coexist. The legacy algorithm hashes a modified copy of the transaction.
//! The fork-id algorithm (BIP143 style) hashes a fixed-layout preimage that commits to the
//! amount being spent. Which one runs depends on the sighash type and the script flags.
//!
//! Digests are returned in the byte order `sha256d` produces, which is the order that gets
//! signed. [`Hash256::encode`] shows the reversed form other tools print.

use crate::crypto::{self, PrivateKey, PublicKey, Signature, SigningMethod};
use crate::messages::{Tx, TxIn};
use crate::script::Script;
use crate::transaction::output::Output;
use crate::util::{sha256d, var_int, Error, Hash256, Result, Serializable};
use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, trace, warn};

/// Signs all outputs.
pub const SIGHASH_ALL: u32 = 0x01;
/// Signs no outputs.
pub const SIGHASH_NONE: u32 = 0x02;
/// Signs only the output at the same index as the input.
pub const SIGHASH_SINGLE: u32 = 0x03;
/// Selects the fork-id digest algorithm.
pub const SIGHASH_FORKID: u32 = 0x40;
/// Signs only the input being spent.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;
/// Mask selecting the base type (ALL, NONE or SINGLE).
pub const SIGHASH_BASE_MASK: u32 = 0x1f;

/// Script flag allowing the fork-id algorithm.
pub const SCRIPT_ENABLE_SIGHASH_FORKID: u32 = 1 << 16;
/// Script flag rewriting the sighash type's upper bytes for replay protection.
pub const SCRIPT_ENABLE_REPLAY_PROTECTION: u32 = 1 << 17;
/// Flags used for signing unless the caller picks others.
pub const DEFAULT_SIGN_FLAGS: u32 = SCRIPT_ENABLE_SIGHASH_FORKID;

/// Digest returned by legacy SINGLE when the input has no matching output.
pub const SIGHASH_SINGLE_BUG: Hash256 = Hash256([
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
]);

/// Cache for the fork-id component hashes.
///
/// The three hashes only depend on the transaction, so one cache may be shared between
/// all inputs of the same transaction. Never reuse it across transactions.
#[derive(Default, Debug)]
pub struct SigHashCache {
    hash_prevouts: Option<Hash256>,
    hash_sequence: Option<Hash256>,
    hash_outputs: Option<Hash256>,
}

impl SigHashCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_prevouts(&mut self, tx: &Tx) -> Result<Hash256> {
        if let Some(hash) = self.hash_prevouts {
            return Ok(hash);
        }
        let mut prevouts = Vec::with_capacity(36 * tx.inputs.len());
        for input in &tx.inputs {
            input.prev_output.write(&mut prevouts)?;
        }
        let hash = sha256d(&prevouts);
        self.hash_prevouts = Some(hash);
        Ok(hash)
    }

    fn hash_sequence(&mut self, tx: &Tx) -> Result<Hash256> {
        if let Some(hash) = self.hash_sequence {
            return Ok(hash);
        }
        let mut sequences = Vec::with_capacity(4 * tx.inputs.len());
        for input in &tx.inputs {
            sequences.write_u32::<LittleEndian>(input.sequence)?;
        }
        let hash = sha256d(&sequences);
        self.hash_sequence = Some(hash);
        Ok(hash)
    }

    fn hash_outputs(&mut self, tx: &Tx) -> Result<Hash256> {
        if let Some(hash) = self.hash_outputs {
            return Ok(hash);
        }
        let size = tx.outputs.iter().map(Output::size).sum();
        let mut outputs = Vec::with_capacity(size);
        for output in &tx.outputs {
            output.write(&mut outputs)?;
        }
        let hash = sha256d(&outputs);
        self.hash_outputs = Some(hash);
        Ok(hash)
    }
}

/// Applies replay protection to a sighash type: the fork value in the upper 24 bits is
/// xored with `0xdead` and forced to the form `0xffxxxx`.
#[must_use]
pub fn replay_protect(sighash_type: u32) -> u32 {
    let fork_value = sighash_type >> 8;
    let new_fork_value = 0x00ff_0000 | (fork_value ^ 0xdead);
    (new_fork_value << 8) | (sighash_type & 0xff)
}

/// Computes the digest signed for input `n_input`.
///
/// Replay protection, when enabled by `flags`, rewrites the sighash type first. The fork-id
/// algorithm then runs if both the type and the flags select it; otherwise the legacy one does.
///
/// # Errors
/// `Error::BadArgument` if the input index is out of range, or if the fork-id algorithm is
/// selected and `satoshis` is `None`.
pub fn sighash(
    tx: &Tx,
    n_input: usize,
    subscript: &Script,
    satoshis: Option<u64>,
    sighash_type: u32,
    flags: u32,
    cache: &mut SigHashCache,
) -> Result<Hash256> {
    if n_input >= tx.inputs.len() {
        return Err(Error::BadArgument(format!(
            "Input index {} out of range for {} inputs",
            n_input,
            tx.inputs.len()
        )));
    }
    let mut sighash_type = sighash_type;
    if flags & SCRIPT_ENABLE_REPLAY_PROTECTION != 0 {
        sighash_type = replay_protect(sighash_type);
        trace!("Replay protected sighash type {:#x}", sighash_type);
    }
    let hash = if sighash_type & SIGHASH_FORKID != 0 && flags & SCRIPT_ENABLE_SIGHASH_FORKID != 0 {
        let satoshis = satoshis.ok_or_else(|| {
            Error::BadArgument(
                "For ForkId=0 signatures, satoshis or complete input must be provided".to_string(),
            )
        })?;
        bip143_sighash(tx, n_input, subscript, satoshis, sighash_type, cache)?
    } else {
        legacy_sighash(tx, n_input, subscript, sighash_type)?
    };
    trace!(
        "Sighash input {} type {:#x} flags {:#x}: {}",
        n_input,
        sighash_type,
        flags,
        hash.encode()
    );
    Ok(hash)
}

/// Fork-id preimage:
/// version | hashPrevouts | hashSequence | outpoint | subscript | value | sequence |
/// hashOutputs | lock_time | sighash type.
fn bip143_sighash(
    tx: &Tx,
    n_input: usize,
    subscript: &Script,
    satoshis: u64,
    sighash_type: u32,
    cache: &mut SigHashCache,
) -> Result<Hash256> {
    let base_type = sighash_type & SIGHASH_BASE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    let input = &tx.inputs[n_input];

    let hash_prevouts = if anyone_can_pay {
        Hash256::default()
    } else {
        cache.hash_prevouts(tx)?
    };
    let hash_sequence =
        if anyone_can_pay || base_type == SIGHASH_SINGLE || base_type == SIGHASH_NONE {
            Hash256::default()
        } else {
            cache.hash_sequence(tx)?
        };
    let hash_outputs = if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        cache.hash_outputs(tx)?
    } else if base_type == SIGHASH_SINGLE && n_input < tx.outputs.len() {
        sha256d(&tx.outputs[n_input].to_bytes())
    } else {
        Hash256::default()
    };

    let mut s = Vec::with_capacity(160 + subscript.len());
    s.write_i32::<LittleEndian>(tx.version)?;
    s.extend_from_slice(&hash_prevouts.0);
    s.extend_from_slice(&hash_sequence.0);
    input.prev_output.write(&mut s)?;
    var_int::write_bytes(&subscript.0, &mut s)?;
    s.write_u64::<LittleEndian>(satoshis)?;
    s.write_u32::<LittleEndian>(input.sequence)?;
    s.extend_from_slice(&hash_outputs.0);
    s.write_u32::<LittleEndian>(tx.lock_time)?;
    s.write_u32::<LittleEndian>(sighash_type)?;
    Ok(sha256d(&s))
}

/// Legacy digest over a modified copy of the transaction.
fn legacy_sighash(tx: &Tx, n_input: usize, subscript: &Script, sighash_type: u32) -> Result<Hash256> {
    let base_type = sighash_type & SIGHASH_BASE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    let blank_sequences = base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE;
    let sub_script = subscript.remove_codeseparators();

    let outputs = match base_type {
        SIGHASH_NONE => Vec::new(),
        SIGHASH_SINGLE => {
            if n_input >= tx.outputs.len() {
                warn!(
                    "SIGHASH_SINGLE on input {} with only {} outputs",
                    n_input,
                    tx.outputs.len()
                );
                return Ok(SIGHASH_SINGLE_BUG);
            }
            let mut outputs = vec![Output::new(u64::MAX, Script::new()); n_input];
            outputs.push(tx.outputs[n_input].clone());
            outputs
        }
        _ => tx.outputs.clone(),
    };

    let inputs = tx
        .inputs
        .iter()
        .enumerate()
        .filter(|(i, _)| !anyone_can_pay || *i == n_input)
        .map(|(i, input)| {
            if i == n_input {
                TxIn {
                    prev_output: input.prev_output,
                    unlock_script: sub_script.clone(),
                    sequence: input.sequence,
                }
            } else {
                TxIn {
                    prev_output: input.prev_output,
                    unlock_script: Script::new(),
                    sequence: if blank_sequences { 0 } else { input.sequence },
                }
            }
        })
        .collect();

    let copy = Tx {
        version: tx.version,
        inputs,
        outputs,
        lock_time: tx.lock_time,
    };
    let mut s = Vec::with_capacity(copy.size() + 4);
    copy.write(&mut s)?;
    s.write_u32::<LittleEndian>(sighash_type)?;
    Ok(sha256d(&s))
}

/// Computes the digest for an input and signs it.
///
/// # Errors
/// Propagates [`sighash`] and signer errors.
#[allow(clippy::too_many_arguments)]
pub fn sign(
    tx: &Tx,
    private_key: &PrivateKey,
    sighash_type: u32,
    n_input: usize,
    subscript: &Script,
    satoshis: Option<u64>,
    flags: u32,
    method: SigningMethod,
) -> Result<Signature> {
    let mut cache = SigHashCache::new();
    let digest = sighash(tx, n_input, subscript, satoshis, sighash_type, flags, &mut cache)?;
    crypto::sign(&digest, private_key, method)
}

/// Recomputes the digest with `sighash_type` and checks the signature against it.
///
/// The scheme follows the signature itself. Returns false when the digest cannot be
/// computed.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn verify(
    tx: &Tx,
    signature: &Signature,
    sighash_type: u32,
    public_key: &PublicKey,
    n_input: usize,
    subscript: &Script,
    satoshis: Option<u64>,
    flags: u32,
) -> bool {
    let mut cache = SigHashCache::new();
    match sighash(tx, n_input, subscript, satoshis, sighash_type, flags, &mut cache) {
        Ok(digest) => crypto::verify(&digest, signature, public_key),
        Err(e) => {
            debug!("Cannot verify signature for input {}: {}", n_input, e);
            false
        }
    }
}
