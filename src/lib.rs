#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*! # utxo-sign

Builds, signs and checks transactions for UTXO chains that share Bitcoin's transaction
format: BTC, BCH, XEC and XPI. Covers CashTokens outputs, legacy and fork-id signature
hashes, ECDSA and Schnorr signatures, and the standard input kinds (P2PK, P2PKH, bare and
P2SH multisig, escrow).

## Usage
```
use utxo_sign::address::Address;
use utxo_sign::network::Network;
use utxo_sign::util::Hash160;

let addr = Address::from_locking_script(
    &utxo_sign::script::Script::build_public_key_hash_out(&Hash160([0; 20])),
    Network::Mainnet,
).unwrap();
assert_eq!(addr.to_string(), "1111111111111111111114oLvT2");
```

Spending and signing is shown in [`transaction`].

## Chains
Signing rules per chain live in [`network::Chain`]. Transactions default to the fork-id
signature hash used by BCH, XEC and XPI; see [`transaction::Transaction::for_chain`].

## Security
Not a consensus implementation. Scripts are built and recognized, never executed.
*/

pub mod address;
pub mod crypto;
pub mod messages;
pub mod network;
pub mod script;
pub mod transaction;
pub mod util;
