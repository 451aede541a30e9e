//! A signature bound to the input it signs.

use crate::crypto::{PublicKey, Signature};
use crate::util::{Error, Hash256, Result};
use serde::{Deserialize, Serialize};

/// Signature for one input, with everything needed to check and place it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSignature {
    pub public_key: PublicKey,
    /// Spent transaction id, in wire order.
    pub prev_tx_id: Hash256,
    pub output_index: u32,
    pub input_index: usize,
    pub signature: Signature,
    pub sigtype: u32,
}

impl TransactionSignature {
    /// Signature bytes followed by the sighash type byte, as pushed in unlocking scripts.
    #[must_use]
    pub fn to_tx_format(&self) -> Vec<u8> {
        let mut v = self.signature.to_bytes();
        v.push(self.sigtype as u8);
        v
    }

    #[must_use]
    pub fn to_object(&self) -> TransactionSignatureObject {
        TransactionSignatureObject {
            public_key: self.public_key.to_hex(),
            prev_tx_id: self.prev_tx_id.encode(),
            output_index: self.output_index,
            input_index: self.input_index,
            signature: hex::encode(self.signature.to_bytes()),
            sigtype: self.sigtype,
        }
    }

    /// # Errors
    /// Bad hex, keys or signatures.
    pub fn from_object(obj: &TransactionSignatureObject) -> Result<TransactionSignature> {
        let signature = Signature::from_bytes(&hex::decode(&obj.signature)?)
            .map_err(|e| Error::BadArgument(format!("Invalid signature in object: {}", e)))?;
        Ok(TransactionSignature {
            public_key: PublicKey::from_hex(&obj.public_key)?,
            prev_tx_id: Hash256::decode(&obj.prev_tx_id)?,
            output_index: obj.output_index,
            input_index: obj.input_index,
            signature,
            sigtype: obj.sigtype,
        })
    }
}

/// Plain object form of a [`TransactionSignature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignatureObject {
    pub public_key: String,
    pub prev_tx_id: String,
    pub output_index: u32,
    pub input_index: usize,
    pub signature: String,
    pub sigtype: u32,
}
