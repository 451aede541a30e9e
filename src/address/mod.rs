//! Base58Check addresses and WIF private keys.
//!
//! Only legacy P2PKH and P2SH addresses are handled. The payload is always a 20-byte hash.

use crate::crypto::{PrivateKey, PublicKey};
use crate::network::Network;
use crate::script::Script;
use crate::util::{hash160, sha256d, Error, Hash160, Result};
use base58::{FromBase58, ToBase58};
use std::fmt;
use std::str::FromStr;

/// Encodes a base58check address from a version byte and 20-byte payload.
///
/// # Errors
/// `Error::BadArgument` if the payload is not exactly 20 bytes.
///
/// # Examples
/// ```
/// use utxo_sign::address::encode_address;
/// let payload = hex::decode("62e907b15cbf27d5425399ebf6f0fb50ebb88f18").unwrap();
/// assert_eq!(encode_address(0x00, &payload).unwrap(), "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
/// ```
pub fn encode_address(version: u8, payload: &[u8]) -> Result<String> {
    if payload.len() != 20 {
        return Err(Error::BadArgument("Payload must be 20 bytes".to_string()));
    }
    let mut v = [0u8; 25];
    v[0] = version;
    v[1..21].copy_from_slice(payload);
    let checksum = sha256d(&v[..21]);
    v[21..25].copy_from_slice(&checksum.0[..4]);
    Ok(v.to_base58())
}

/// Decodes a base58check address into its version byte and payload.
///
/// # Errors
/// `Error::FromBase58Error` on bad characters, `Error::BadData` on bad length or checksum.
pub fn decode_address(input: &str) -> Result<(u8, Vec<u8>)> {
    let bytes = decode_check(input)?;
    if bytes.len() != 21 {
        return Err(Error::BadData("Invalid address length".to_string()));
    }
    Ok((bytes[0], bytes[1..].to_vec()))
}

// Base58 decode and strip a verified 4-byte checksum
fn decode_check(input: &str) -> Result<Vec<u8>> {
    let bytes = input.from_base58().map_err(Error::FromBase58Error)?;
    if bytes.len() < 5 {
        return Err(Error::BadData("Base58 payload too short".to_string()));
    }
    let (data, checksum) = bytes.split_at(bytes.len() - 4);
    if sha256d(data).0[..4] != *checksum {
        return Err(Error::BadData("Invalid checksum".to_string()));
    }
    Ok(data.to_vec())
}

fn encode_check(data: &[u8]) -> String {
    let mut v = data.to_vec();
    v.extend_from_slice(&sha256d(data).0[..4]);
    v.to_base58()
}

/// What an address pays to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    PubKeyHash,
    ScriptHash,
}

/// A legacy address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub network: Network,
    pub kind: AddressKind,
    pub hash: Hash160,
}

impl Address {
    /// P2PKH address of a public key.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Address {
        Address {
            network,
            kind: AddressKind::PubKeyHash,
            hash: public_key.hash160(),
        }
    }

    /// P2SH address of a redeem script.
    #[must_use]
    pub fn from_script(redeem_script: &Script, network: Network) -> Address {
        Address {
            network,
            kind: AddressKind::ScriptHash,
            hash: hash160(&redeem_script.0),
        }
    }

    /// Address paid to by a P2PKH or P2SH locking script.
    #[must_use]
    pub fn from_locking_script(script: &Script, network: Network) -> Option<Address> {
        if let Some(hash) = script.public_key_hash() {
            Some(Address {
                network,
                kind: AddressKind::PubKeyHash,
                hash,
            })
        } else {
            script.script_hash().map(|hash| Address {
                network,
                kind: AddressKind::ScriptHash,
                hash,
            })
        }
    }

    /// Parses a base58check address, inferring network and kind from the version byte.
    ///
    /// # Errors
    /// Decoding failures or an unknown version byte.
    pub fn from_base58(s: &str) -> Result<Address> {
        let (version, payload) = decode_address(s)?;
        let network = Network::from_address_version(version)
            .ok_or_else(|| Error::BadData(format!("Unknown address version {}", version)))?;
        let kind = if version == network.p2pkh_version() {
            AddressKind::PubKeyHash
        } else {
            AddressKind::ScriptHash
        };
        Ok(Address {
            network,
            kind,
            hash: Hash160::from_slice(&payload)?,
        })
    }

    #[must_use]
    pub fn to_base58(&self) -> String {
        let version = match self.kind {
            AddressKind::PubKeyHash => self.network.p2pkh_version(),
            AddressKind::ScriptHash => self.network.p2sh_version(),
        };
        let mut v = [0u8; 21];
        v[0] = version;
        v[1..].copy_from_slice(&self.hash.0);
        encode_check(&v)
    }

    /// Locking script paying to this address.
    #[must_use]
    pub fn to_script(&self) -> Script {
        match self.kind {
            AddressKind::PubKeyHash => Script::build_public_key_hash_out(&self.hash),
            AddressKind::ScriptHash => Script::build_script_hash_out_from_hash(&self.hash),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Address> {
        Address::from_base58(s)
    }
}

impl PrivateKey {
    /// Parses a WIF key, returning the key and its network.
    ///
    /// # Errors
    /// Decoding failures, an unknown version byte or a bad compression marker.
    pub fn from_wif(wif: &str) -> Result<(PrivateKey, Network)> {
        let data = decode_check(wif)?;
        let network = match data[0] {
            0x80 => Network::Mainnet,
            0xef => Network::Testnet,
            v => return Err(Error::BadData(format!("Unknown WIF version {}", v))),
        };
        let compressed = match data.len() {
            33 => false,
            34 if data[33] == 0x01 => true,
            _ => return Err(Error::BadData("Invalid WIF length".to_string())),
        };
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&data[1..33]);
        Ok((PrivateKey::new(&secret)?.with_compressed(compressed), network))
    }

    /// Encodes the key as WIF.
    #[must_use]
    pub fn to_wif(&self, network: Network) -> String {
        let mut data = Vec::with_capacity(34);
        data.push(network.wif_version());
        data.extend_from_slice(&self.secret_bytes());
        if self.is_compressed() {
            data.push(0x01);
        }
        encode_check(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GENESIS_HASH: &str = "62e907b15cbf27d5425399ebf6f0fb50ebb88f18";

    #[test]
    fn encode_decode_p2pkh() -> Result<()> {
        let hash = Hash160::decode(GENESIS_HASH)?;
        let address = Address {
            network: Network::Mainnet,
            kind: AddressKind::PubKeyHash,
            hash,
        };
        assert_eq!(address.to_string(), "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
        assert_eq!("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".parse::<Address>()?, address);
        let (version, payload) = decode_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa")?;
        assert_eq!(version, 0x00);
        assert_eq!(payload, hash.0.to_vec());
        Ok(())
    }

    #[test]
    fn testnet_and_p2sh() -> Result<()> {
        let hash = Hash160::decode(GENESIS_HASH)?;
        let testnet = Address::from_base58("mpXwg4jMtRhuSpVq4xS3HFHmCmWp9NyGKt")?;
        assert_eq!(testnet.network, Network::Testnet);
        assert_eq!(testnet.hash, hash);
        let p2sh = Address::from_base58("3Ai1JZ8pdJb2ksieUV8FsxSNVJCpoPi8W6")?;
        assert_eq!(p2sh.kind, AddressKind::ScriptHash);
        assert!(p2sh.to_script().is_script_hash_out());
        assert_eq!(Address::from_locking_script(&p2sh.to_script(), Network::Mainnet), Some(p2sh));
        Ok(())
    }

    #[test]
    fn bad_addresses() {
        assert!(Address::from_base58("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb").is_err());
        assert!(Address::from_base58("0OIl").is_err());
        assert!(encode_address(0, &[0; 19]).is_err());
    }

    #[test]
    fn address_of_key() -> Result<()> {
        let mut one = [0u8; 32];
        one[31] = 1;
        let key = PrivateKey::new(&one)?;
        let address = Address::from_public_key(&key.public_key(), Network::Mainnet);
        assert_eq!(address.to_string(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        let script = address.to_script();
        assert!(script.is_public_key_hash_out());
        let uncompressed = key.clone().with_compressed(false);
        let address = Address::from_public_key(&uncompressed.public_key(), Network::Mainnet);
        assert_eq!(address.to_string(), "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm");
        Ok(())
    }

    #[test]
    fn wif() -> Result<()> {
        let (key, network) =
            PrivateKey::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn")?;
        assert_eq!(network, Network::Mainnet);
        assert!(key.is_compressed());
        assert_eq!(key.secret_bytes()[31], 1);
        let (plain, _) = PrivateKey::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf")?;
        assert!(!plain.is_compressed());
        assert_eq!(
            key.to_wif(Network::Testnet),
            "cMahea7zqjxrtgAbB7LSGbcQUr1uX1ojuat9jZodMN87JcbXMTcA"
        );
        Ok(())
    }
}
