//! Network and chain configuration.
//!
//! `Network` selects Base58 version bytes. `Chain` selects the consensus knobs
//! that drive signing: which sighash algorithm is enabled and the default sighash type.

use crate::crypto::SigningMethod;
use crate::transaction::sighash::{DEFAULT_SIGN_FLAGS, SIGHASH_ALL, SIGHASH_FORKID};
use crate::util::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Network type for address and key encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    /// Main network.
    #[default]
    Mainnet,
    /// Test network (also used for regtest).
    Testnet,
}

impl Network {
    /// Version byte of pay-to-public-key-hash addresses.
    #[must_use]
    #[inline]
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    /// Version byte of pay-to-script-hash addresses.
    #[must_use]
    #[inline]
    pub fn p2sh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet => 0xc4,
        }
    }

    /// Version byte of WIF private keys.
    #[must_use]
    #[inline]
    pub fn wif_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xef,
        }
    }

    /// Looks up the network owning an address version byte.
    #[must_use]
    pub fn from_address_version(version: u8) -> Option<Network> {
        match version {
            0x00 | 0x05 => Some(Network::Mainnet),
            0x6f | 0xc4 => Some(Network::Testnet),
            _ => None,
        }
    }
}

/// Bitcoin-family chain whose signing rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Bitcoin, legacy sighash only.
    Btc,
    /// Bitcoin Cash.
    Bch,
    /// eCash.
    Xec,
    /// Lotus.
    Xpi,
}

impl Chain {
    /// Script flags used when computing signature hashes.
    #[must_use]
    pub fn sign_flags(&self) -> u32 {
        match self {
            Chain::Btc => 0,
            Chain::Bch | Chain::Xec | Chain::Xpi => DEFAULT_SIGN_FLAGS,
        }
    }

    /// Sighash type used when the caller does not pick one.
    #[must_use]
    pub fn default_sighash_type(&self) -> u32 {
        match self {
            Chain::Btc => SIGHASH_ALL,
            Chain::Bch | Chain::Xec | Chain::Xpi => SIGHASH_ALL | SIGHASH_FORKID,
        }
    }

    /// Signature scheme used when the caller does not pick one.
    #[must_use]
    pub fn default_signing_method(&self) -> SigningMethod {
        SigningMethod::Ecdsa
    }

    /// Smallest non-data output value relayed by default.
    #[must_use]
    pub fn dust_amount(&self) -> u64 {
        546
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Chain::Btc => "BTC",
            Chain::Bch => "BCH",
            Chain::Xec => "XEC",
            Chain::Xpi => "XPI",
        };
        f.write_str(s)
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Chain> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(Chain::Btc),
            "BCH" => Ok(Chain::Bch),
            "XEC" => Ok(Chain::Xec),
            "XPI" => Ok(Chain::Xpi),
            _ => Err(Error::BadArgument(format!("Unknown chain {}", s))),
        }
    }
}
