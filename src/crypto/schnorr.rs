//! Bitcoin Cash Schnorr signatures over secp256k1.
//!
//! A signature is `r || s`, 32 bytes each. The challenge is
//! `e = sha256(R.x || compressed P || m)` and R is chosen so its y coordinate is a quadratic
//! residue. Point arithmetic goes through `secp256k1`, scalar and field arithmetic through
//! `num-bigint`.

use crate::crypto::{PrivateKey, PublicKey};
use crate::util::{Error, Result};
use bitcoin_hashes::{hmac, sha256, Hash, HashEngine};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use secp256k1::constants::{CURVE_ORDER, FIELD_SIZE};
use secp256k1::{Scalar, Secp256k1, SecretKey};

const NONCE_TAG: &[u8; 16] = b"Schnorr+SHA256  ";

fn order() -> BigUint {
    BigUint::from_bytes_be(&CURVE_ORDER)
}

fn field() -> BigUint {
    BigUint::from_bytes_be(&FIELD_SIZE)
}

fn to_32(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut out = [0; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut engine = hmac::HmacEngine::<sha256::Hash>::new(key);
    for part in parts {
        engine.input(part);
    }
    hmac::Hmac::<sha256::Hash>::from_engine(engine).to_byte_array()
}

/// Whether `y` is a quadratic residue mod p (Jacobi symbol 1).
fn is_square(y: &BigUint) -> bool {
    let p = field();
    let exp = (&p - BigUint::one()) >> 1;
    y.modpow(&exp, &p).is_one()
}

fn challenge(r: &[u8], key: &PublicKey, msg: &[u8; 32]) -> BigUint {
    let mut data = Vec::with_capacity(97);
    data.extend_from_slice(r);
    data.extend_from_slice(&key.to_compressed_bytes());
    data.extend_from_slice(msg);
    let e = sha256::Hash::hash(&data).to_byte_array();
    BigUint::from_bytes_be(&e) % order()
}

/// Deterministic nonce: RFC 6979 HMAC-DRBG seeded with `d || m || "Schnorr+SHA256  "`.
#[must_use]
pub fn nonce(secret: &[u8; 32], msg: &[u8; 32]) -> BigUint {
    let mut blob = Vec::with_capacity(80);
    blob.extend_from_slice(secret);
    blob.extend_from_slice(msg);
    blob.extend_from_slice(NONCE_TAG);

    let mut v = [0x01; 32];
    let mut k = [0x00; 32];
    k = hmac_sha256(&k, &[&v, &[0x00], &blob]);
    v = hmac_sha256(&k, &[&v]);
    k = hmac_sha256(&k, &[&v, &[0x01], &blob]);
    v = hmac_sha256(&k, &[&v]);

    let n = order();
    loop {
        v = hmac_sha256(&k, &[&v]);
        let t = BigUint::from_bytes_be(&v);
        if !t.is_zero() && t < n {
            return t;
        }
        k = hmac_sha256(&k, &[&v, &[0x00]]);
        v = hmac_sha256(&k, &[&v]);
    }
}

/// Signs a 32-byte message.
///
/// # Errors
/// `Error::IllegalState` if the nonce produces an invalid point.
pub fn sign(msg: &[u8; 32], key: &PrivateKey) -> Result<[u8; 64]> {
    let secp = Secp256k1::signing_only();
    let n = order();
    let secret = key.secret_bytes();
    let d = BigUint::from_bytes_be(&secret);
    let mut k = nonce(&secret, msg);

    let nonce_key = SecretKey::from_slice(&to_32(&k))
        .map_err(|_| Error::IllegalState("Schnorr nonce out of range".to_string()))?;
    let r_point = secp256k1::PublicKey::from_secret_key(&secp, &nonce_key).serialize_uncompressed();
    let (rx, ry) = (&r_point[1..33], &r_point[33..65]);
    if !is_square(&BigUint::from_bytes_be(ry)) {
        k = &n - k;
    }

    let e = challenge(rx, &key.public_key(), msg);
    let s = (e * d + k) % &n;

    let mut sig = [0; 64];
    sig[..32].copy_from_slice(rx);
    sig[32..].copy_from_slice(&to_32(&s));
    Ok(sig)
}

/// Verifies a signature, returning false on any malformed component.
#[must_use]
pub fn verify(msg: &[u8; 32], sig: &[u8; 64], key: &PublicKey) -> bool {
    let secp = Secp256k1::new();
    let n = order();
    let r = BigUint::from_bytes_be(&sig[..32]);
    let s = BigUint::from_bytes_be(&sig[32..]);
    if r >= field() || s >= n {
        return false;
    }
    let e = challenge(&sig[..32], key, msg);

    // R = sG + (n - e)P, each term dropped when it is the point at infinity
    let mut terms = Vec::with_capacity(2);
    if !s.is_zero() {
        match SecretKey::from_slice(&to_32(&s)) {
            Ok(sk) => terms.push(secp256k1::PublicKey::from_secret_key(&secp, &sk)),
            Err(_) => return false,
        }
    }
    if !e.is_zero() {
        let tweak = match Scalar::from_be_bytes(to_32(&(&n - &e))) {
            Ok(t) => t,
            Err(_) => return false,
        };
        match key.inner().mul_tweak(&secp, &tweak) {
            Ok(p) => terms.push(p),
            Err(_) => return false,
        }
    }
    let r_point = match terms.as_slice() {
        [] => return false,
        [a] => *a,
        [a, b] => match a.combine(b) {
            Ok(p) => p,
            Err(_) => return false,
        },
        _ => return false,
    };

    let bytes = r_point.serialize_uncompressed();
    is_square(&BigUint::from_bytes_be(&bytes[33..65])) && bytes[1..33] == sig[..32]
}
