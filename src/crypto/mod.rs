//! Keys and signatures.
//!
//! ECDSA goes straight through `secp256k1`. Schnorr follows the Bitcoin Cash 2019
//! construction in [`schnorr`]. Digests are signed in the byte order `sha256d` produces.

pub mod schnorr;

use crate::util::{hash160, Error, Hash160, Hash256, Result};
use secp256k1::{ecdsa, Message, Secp256k1, SecretKey};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Signature scheme used for a transaction signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningMethod {
    /// DER-encoded ECDSA.
    #[default]
    Ecdsa,
    /// 64-byte Bitcoin Cash Schnorr.
    Schnorr,
}

impl fmt::Display for SigningMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SigningMethod::Ecdsa => f.write_str("ecdsa"),
            SigningMethod::Schnorr => f.write_str("schnorr"),
        }
    }
}

impl FromStr for SigningMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<SigningMethod> {
        match s {
            "ecdsa" => Ok(SigningMethod::Ecdsa),
            "schnorr" => Ok(SigningMethod::Schnorr),
            _ => Err(Error::BadArgument(format!("Unknown signing method {}", s))),
        }
    }
}

/// A secp256k1 public key that remembers whether it is shown compressed.
#[derive(Clone, Copy, Debug)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
    compressed: bool,
}

impl PublicKey {
    /// Parses a 33-byte compressed or 65-byte uncompressed key.
    ///
    /// # Errors
    /// `Error::BadArgument` if the bytes are not a valid point.
    pub fn from_slice(bytes: &[u8]) -> Result<PublicKey> {
        let inner = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|_| Error::BadArgument("Invalid public key".to_string()))?;
        Ok(PublicKey {
            inner,
            compressed: bytes.len() == 33,
        })
    }

    /// Parses a hex encoded key.
    ///
    /// # Errors
    /// Bad hex or an invalid point.
    pub fn from_hex(s: &str) -> Result<PublicKey> {
        PublicKey::from_slice(&hex::decode(s)?)
    }

    /// Derives the public key of a private key, keeping its compression flag.
    #[must_use]
    pub fn from_private_key(key: &PrivateKey) -> PublicKey {
        let secp = Secp256k1::signing_only();
        PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(&secp, &key.secret),
            compressed: key.compressed,
        }
    }

    /// Serialized form honoring the compression flag.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.inner.serialize().to_vec()
        } else {
            self.inner.serialize_uncompressed().to_vec()
        }
    }

    /// 33-byte compressed encoding regardless of flag.
    #[must_use]
    #[inline]
    pub fn to_compressed_bytes(&self) -> [u8; 33] {
        self.inner.serialize()
    }

    /// 65-byte uncompressed encoding regardless of flag.
    #[must_use]
    #[inline]
    pub fn to_uncompressed_bytes(&self) -> [u8; 65] {
        self.inner.serialize_uncompressed()
    }

    /// Hex of [`PublicKey::to_bytes`].
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// HASH160 of the serialized key.
    #[must_use]
    pub fn hash160(&self) -> Hash160 {
        hash160(&self.to_bytes())
    }

    #[must_use]
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Underlying secp256k1 key.
    #[must_use]
    #[inline]
    pub fn inner(&self) -> &secp256k1::PublicKey {
        &self.inner
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &PublicKey) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

// Ordered by hex encoding, the order multisig scripts use.
impl Ord for PublicKey {
    fn cmp(&self, other: &PublicKey) -> Ordering {
        self.to_hex().cmp(&other.to_hex())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &PublicKey) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<PublicKey> {
        PublicKey::from_hex(s)
    }
}

/// A secp256k1 secret key plus the compression flag of its public key.
#[derive(Clone)]
pub struct PrivateKey {
    secret: SecretKey,
    compressed: bool,
}

impl PrivateKey {
    /// Wraps 32 secret bytes; the public key will be compressed.
    ///
    /// # Errors
    /// `Error::BadArgument` if the scalar is zero or not below the curve order.
    pub fn new(bytes: &[u8; 32]) -> Result<PrivateKey> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| Error::BadArgument("Invalid private key".to_string()))?;
        Ok(PrivateKey {
            secret,
            compressed: true,
        })
    }

    /// Parses 64 hex characters.
    ///
    /// # Errors
    /// Bad hex, wrong length or an out of range scalar.
    pub fn from_hex(s: &str) -> Result<PrivateKey> {
        let bytes: [u8; 32] = hex::decode(s)?
            .try_into()
            .map_err(|_| Error::BadArgument("Private key must be 32 bytes".to_string()))?;
        PrivateKey::new(&bytes)
    }

    /// Sets whether the derived public key is serialized compressed.
    #[must_use]
    pub fn with_compressed(mut self, compressed: bool) -> PrivateKey {
        self.compressed = compressed;
        self
    }

    #[must_use]
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// The 32 secret bytes.
    #[must_use]
    #[inline]
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    #[must_use]
    #[inline]
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_private_key(self)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key())
    }
}

/// A signature without its sighash type byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signature {
    /// ECDSA signature, DER encoded on the wire.
    Ecdsa(ecdsa::Signature),
    /// Schnorr signature `r || s`.
    Schnorr([u8; 64]),
}

impl Signature {
    /// Parses a signature: 64 bytes is Schnorr, anything else must be DER.
    ///
    /// # Errors
    /// `Error::BadData` if the bytes are neither.
    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() == 64 {
            let mut sig = [0; 64];
            sig.copy_from_slice(bytes);
            return Ok(Signature::Schnorr(sig));
        }
        let sig = ecdsa::Signature::from_der(bytes)
            .map_err(|_| Error::BadData("Invalid DER signature".to_string()))?;
        Ok(Signature::Ecdsa(sig))
    }

    /// Parses a signature followed by its sighash type byte.
    ///
    /// # Errors
    /// `Error::BadData` for an empty blob or a bad signature.
    pub fn from_tx_format(blob: &[u8]) -> Result<(Signature, u8)> {
        match blob.split_last() {
            Some((sigtype, sig)) => Ok((Signature::from_bytes(sig)?, *sigtype)),
            None => Err(Error::BadData("Empty signature".to_string())),
        }
    }

    /// DER or raw 64-byte encoding.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Signature::Ecdsa(sig) => sig.serialize_der().to_vec(),
            Signature::Schnorr(sig) => sig.to_vec(),
        }
    }

    #[must_use]
    pub fn method(&self) -> SigningMethod {
        match self {
            Signature::Ecdsa(_) => SigningMethod::Ecdsa,
            Signature::Schnorr(_) => SigningMethod::Schnorr,
        }
    }
}

/// Signs a 32-byte digest.
///
/// # Errors
/// Propagates Schnorr nonce or arithmetic failures.
pub fn sign(digest: &Hash256, key: &PrivateKey, method: SigningMethod) -> Result<Signature> {
    match method {
        SigningMethod::Ecdsa => {
            let secp = Secp256k1::signing_only();
            let message = Message::from_digest(digest.0);
            let mut signature = secp.sign_ecdsa(&message, &key.secret);
            signature.normalize_s();
            Ok(Signature::Ecdsa(signature))
        }
        SigningMethod::Schnorr => Ok(Signature::Schnorr(schnorr::sign(&digest.0, key)?)),
    }
}

/// Verifies a signature over a 32-byte digest.
#[must_use]
pub fn verify(digest: &Hash256, signature: &Signature, key: &PublicKey) -> bool {
    match signature {
        Signature::Ecdsa(sig) => {
            let secp = Secp256k1::verification_only();
            let message = Message::from_digest(digest.0);
            let mut sig = *sig;
            sig.normalize_s();
            secp.verify_ecdsa(&message, &sig, &key.inner).is_ok()
        }
        Signature::Schnorr(sig) => schnorr::verify(&digest.0, sig, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::sha256d;
    use pretty_assertions::assert_eq;

    fn key() -> PrivateKey {
        PrivateKey::from_hex("b7e151628aed2a6abf7158809cf4f3c762e7160f38b4da56a784d9045190cfef")
            .unwrap()
    }

    #[test]
    fn public_key_encodings() -> Result<()> {
        let g = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let pk = PublicKey::from_hex(g)?;
        assert!(pk.is_compressed());
        assert_eq!(pk.to_hex(), g);
        let full = hex::encode(pk.to_uncompressed_bytes());
        let upk = PublicKey::from_hex(&full)?;
        assert!(!upk.is_compressed());
        assert_eq!(upk.to_bytes().len(), 65);
        assert!(pk != upk);
        assert_eq!(pk.inner(), upk.inner());
        assert!(PublicKey::from_hex("02abcd").is_err());
        Ok(())
    }

    #[test]
    fn private_key_range() {
        assert!(PrivateKey::new(&[0; 32]).is_err());
        assert!(PrivateKey::new(&[0xff; 32]).is_err());
        assert!(PrivateKey::new(&[1; 32]).is_ok());
        assert!(PrivateKey::from_hex("0101").is_err());
    }

    #[test]
    fn ecdsa_sign_verify() -> Result<()> {
        let key = key();
        let digest = sha256d(b"message");
        let sig = sign(&digest, &key, SigningMethod::Ecdsa)?;
        assert_eq!(sig.method(), SigningMethod::Ecdsa);
        assert!(verify(&digest, &sig, &key.public_key()));
        assert!(!verify(&sha256d(b"other"), &sig, &key.public_key()));
        let parsed = Signature::from_bytes(&sig.to_bytes())?;
        assert_eq!(parsed, sig);
        Ok(())
    }

    #[test]
    fn schnorr_sign_verify() -> Result<()> {
        let key = key();
        let digest = sha256d(b"message");
        let sig = sign(&digest, &key, SigningMethod::Schnorr)?;
        assert_eq!(sig.to_bytes().len(), 64);
        assert!(verify(&digest, &sig, &key.public_key()));
        let mut blob = sig.to_bytes();
        blob.push(0x41);
        let (parsed, sigtype) = Signature::from_tx_format(&blob)?;
        assert_eq!(sigtype, 0x41);
        assert_eq!(parsed.method(), SigningMethod::Schnorr);
        Ok(())
    }

    #[test]
    fn bad_signature_bytes() {
        assert!(Signature::from_bytes(&[0x30, 0x01]).is_err());
        assert!(Signature::from_tx_format(&[]).is_err());
        assert!("rsa".parse::<SigningMethod>().is_err());
    }
}
