//! Escrow redeem scripts.
//!
//! An escrow output can be spent two ways: by the reclaim key with a normal transaction
//! signature, or by any of the input keys with a data signature. Membership of the input key
//! is proven inside the script against the root of a small Merkle tree of key hashes.
//! Leaves are the HASH160 of each key, sorted by hex encoding and padded with HASH160 of
//! the empty string up to the next power of two.

use crate::crypto::PublicKey;
use crate::script::op_codes::*;
use crate::script::Script;
use crate::util::{hash160, Error, Hash160, Result};

fn empty_leaf() -> Hash160 {
    hash160(&[])
}

/// Folds leaf hashes pairwise with HASH160 until one remains.
///
/// A missing right sibling is filled with HASH160 of the empty string.
#[must_use]
pub fn get_merkle_root(hashes: &[Hash160]) -> Hash160 {
    match hashes.len() {
        0 => empty_leaf(),
        1 => hashes[0],
        _ => {
            let level: Vec<Hash160> = hashes
                .chunks(2)
                .map(|pair| {
                    let right = pair.get(1).copied().unwrap_or_else(empty_leaf);
                    let mut buf = [0u8; 40];
                    buf[..20].copy_from_slice(&pair[0].0);
                    buf[20..].copy_from_slice(&right.0);
                    hash160(&buf)
                })
                .collect();
            get_merkle_root(&level)
        }
    }
}

/// Merkle root over the sorted, padded hashes of the given keys.
#[must_use]
pub fn generate_merkle_root_from_public_keys(public_keys: &[PublicKey]) -> Hash160 {
    let mut keys = public_keys.to_vec();
    keys.sort();
    let mut leaves: Vec<Hash160> = keys.iter().map(PublicKey::hash160).collect();
    let width = leaves.len().next_power_of_two();
    leaves.resize(width, empty_leaf());
    get_merkle_root(&leaves)
}

fn tree_depth(key_count: usize) -> usize {
    key_count.next_power_of_two().trailing_zeros() as usize
}

/// Operations that check the public key on top of the stack belongs to the tree.
///
/// The spender supplies one direction bit per level beneath the key and the sibling hashes.
///
/// # Errors
/// `Error::BadArgument` when no keys are given or the tree is deeper than 16 levels.
pub fn generate_input_public_key_validation_operations(public_keys: &[PublicKey]) -> Result<Script> {
    if public_keys.is_empty() {
        return Err(Error::BadArgument("Escrow requires at least one input public key".to_string()));
    }
    let root = generate_merkle_root_from_public_keys(public_keys);
    let depth = tree_depth(public_keys.len());
    let mut script = Script::new();
    if depth == 0 {
        script.append(OP_DUP);
        script.append(OP_HASH160);
    } else {
        for _ in 0..depth {
            script.append(OP_TOALTSTACK);
        }
        script.append_num(depth)?;
        script.append(OP_PICK);
        script.append(OP_HASH160);
        for _ in 0..depth {
            script.append(OP_FROMALTSTACK);
            script.append(OP_IF);
            script.append(OP_SWAP);
            script.append(OP_ENDIF);
            script.append(OP_CAT);
            script.append(OP_HASH160);
        }
    }
    script.append_data(&root.0);
    script.append(OP_EQUALVERIFY);
    Ok(script)
}

/// Full escrow redeem script.
///
/// # Errors
/// Same as [`generate_input_public_key_validation_operations`].
pub fn generate_redeem_script_operations(
    input_public_keys: &[PublicKey],
    reclaim_public_key: &PublicKey,
) -> Result<Script> {
    let mut script = Script::new();
    script.append(OP_DUP);
    script.append(OP_HASH160);
    script.append_data(&reclaim_public_key.hash160().0);
    script.append(OP_EQUAL);
    script.append(OP_IF);
    script.append(OP_CHECKSIG);
    script.append(OP_ELSE);
    script.append_script(&generate_input_public_key_validation_operations(input_public_keys)?);
    script.append(OP_OVER);
    script.append(OP_4);
    script.append(OP_PICK);
    script.append(OP_EQUAL);
    script.append(OP_NOT);
    script.append(OP_VERIFY);
    script.append(OP_DUP);
    script.append(OP_TOALTSTACK);
    script.append(OP_CHECKDATASIGVERIFY);
    script.append(OP_FROMALTSTACK);
    script.append(OP_CHECKDATASIG);
    script.append(OP_ENDIF);
    Ok(script)
}

impl Script {
    /// Escrow redeem script; lock funds to it with [`Script::build_script_hash_out`].
    ///
    /// # Errors
    /// `Error::BadArgument` for an empty or oversized key set.
    pub fn build_escrow_out(
        input_public_keys: &[PublicKey],
        reclaim_public_key: &PublicKey,
    ) -> Result<Script> {
        generate_redeem_script_operations(input_public_keys, reclaim_public_key)
    }

    /// Reclaim path unlocking script: `<signature+sigtype> <reclaim pubkey> <redeem script>`.
    #[must_use]
    pub fn build_escrow_in(
        reclaim_public_key: &PublicKey,
        signature: &[u8],
        redeem_script: &Script,
    ) -> Script {
        let mut script = Script::new();
        script.append_data(signature);
        script.append_data(&reclaim_public_key.to_bytes());
        script.append_data(&redeem_script.0);
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(hexes: &[&str]) -> Vec<PublicKey> {
        hexes.iter().map(|h| PublicKey::from_hex(h).unwrap()).collect()
    }

    const THREE: [&str; 3] = [
        "03fb0ed01700a2e9303f76ec93c61114507d9ea9bb3704c873fa8c1c7f4fad0a49",
        "02cc0cbe9725cea57e475b8cf8fef5556df5c4a73a912a167ee3e170fa1172725a",
        "0312e866a0b1dd1221a79729907f45672ad0ee426f1234f5f44c447000daa42341",
    ];

    const FIVE: [&str; 5] = [
        "033c7364c06498e9d31ac5ba32c5071080a25c481ba3222df32a1839cdc57c1036",
        "034c6f4984b35e4260e441c6eccb90f382e02c497aa1d2dc20029887272a37d2c4",
        "0284f6810dc878d9fda1843f05404f22dbc1d1837bba80efb011ebca832bbe728a",
        "0379116c71638ad1264d1c54faebb6a1c00f1bd187faf32707d02ae2252d706971",
        "03e62689382e81452f0b95220fff4443521dc4248938168280d76b79984876e61d",
    ];

    const RECLAIM: &str = "03e1d90a373b55b97fb633868698b2368b343a96b595fdb7ec270be2d3978c754a";

    fn tree_ops(depth: usize, root: &str) -> String {
        let mut ops = vec!["OP_TOALTSTACK"; depth];
        let pick = format!("OP_{}", depth);
        ops.push(pick.as_str());
        ops.extend(["OP_PICK", "OP_HASH160"]);
        for _ in 0..depth {
            ops.extend(["OP_FROMALTSTACK", "OP_IF", "OP_SWAP", "OP_ENDIF", "OP_CAT", "OP_HASH160"]);
        }
        format!("{} 20 0x{} OP_EQUALVERIFY", ops.join(" "), root)
    }

    #[test]
    fn root_of_empty_leaves() {
        let zero = hash160(&[]);
        assert_eq!(zero.encode(), "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb");
        assert_eq!(
            get_merkle_root(&[zero; 4]).encode(),
            "bcd72713b594ea45d44512ca7912c625f7e69092"
        );
    }

    #[test]
    fn odd_levels_pad_with_empty_hash() {
        let zero = hash160(&[]);
        let a = Hash160([1; 20]);
        let b = Hash160([2; 20]);
        let c = Hash160([3; 20]);
        assert_eq!(get_merkle_root(&[a, b, c]), get_merkle_root(&[a, b, c, zero]));
        assert!(get_merkle_root(&[a, b, c]) != get_merkle_root(&[a, b, c, c]));
    }

    #[test]
    fn root_from_three_keys() {
        let root = generate_merkle_root_from_public_keys(&keys(&THREE));
        assert_eq!(root.encode(), "8001321ef1822edc229a5387b181d6f8d18515cc");
    }

    #[test]
    fn five_keys_fill_with_empty_hash() {
        let mut hexes = FIVE.to_vec();
        hexes.sort();
        let mut leaves: Vec<Hash160> = keys(&hexes).iter().map(PublicKey::hash160).collect();
        leaves.extend([hash160(&[]); 3]);
        assert_eq!(
            get_merkle_root(&leaves),
            generate_merkle_root_from_public_keys(&keys(&FIVE))
        );
    }

    #[test]
    fn validation_single_key() -> Result<()> {
        let script = generate_input_public_key_validation_operations(&keys(&THREE[..1]))?;
        assert_eq!(
            script.to_string(),
            "OP_DUP OP_HASH160 20 0x2a42558df3ea6f2a438251374d7bd61c81f09f96 OP_EQUALVERIFY"
        );
        Ok(())
    }

    #[test]
    fn validation_two_and_three_keys() -> Result<()> {
        let two = generate_input_public_key_validation_operations(&keys(&THREE[1..]))?;
        assert_eq!(two.to_string(), tree_ops(1, "39a9d954ed1db3c2adbc413995f4e0589d39827e"));
        let three = generate_input_public_key_validation_operations(&keys(&THREE))?;
        assert_eq!(three.to_string(), tree_ops(2, "8001321ef1822edc229a5387b181d6f8d18515cc"));
        Ok(())
    }

    #[test]
    fn validation_four_five_nine_keys() -> Result<()> {
        let four = keys(&[
            "02bc1d5f978c6147dc70db39d88e33026f8e2d5cdb99b925944a06a1cce1be87c0",
            "03ebc008265ae249a805f647bf9623d74071ce66dbb3a8674cd1f99e1dfa81f550",
            "0269419378d0a7e5860495e95038da9b02203cb772ab5618c29d82ec8eae6a0781",
            "02f50aa80526676b0c6058c0daed0b6bbacfac17cf7879cd45130dc8dc3a3be873",
        ]);
        assert_eq!(
            generate_input_public_key_validation_operations(&four)?.to_string(),
            tree_ops(2, "13b0df96f790ce4188d3d6c30e75518e646d9d23")
        );
        assert_eq!(
            generate_input_public_key_validation_operations(&keys(&FIVE))?.to_string(),
            tree_ops(3, "82a74acda5701d011090ad0039f2aa25a8724c85")
        );
        let nine = keys(&[
            RECLAIM,
            "03907a5e9d51332a6f0c2b24b3bffff2ab099a3f332aa8f578d1ff64305b44c8de",
            "03fe269d30823cc4cc54c1e6b4366ecef3a51085de9a81c69baa1889dd8433883f",
            "0276ae3947cab8b51e9e80d93fd8339af04ccc1731c917e75887d958bbfd3b9af7",
            "02270f250ad4680e3c12846d50e87cd940a0a054bbb1e396d2791f29ea26547b19",
            "02ea05929efe64d41ce0b12d65525ca9b56e477d948c9a3580dfa9ec37b6af6cdc",
            "0360971cda4738b25af57b8a7b50536df280c9ed1336c294ea9d60b44b49d982c9",
            "025d273be791dcd72f5bc81d15599fb54bb107c8a784d96bb3d2751d70d12c5d5d",
            "0301ce14bcadae1c49beec6575c00969888351c3cd20d0e6cb7713668ce8cc37d9",
        ]);
        assert_eq!(
            generate_input_public_key_validation_operations(&nine)?.to_string(),
            tree_ops(4, "a047442c13494553dbf18c98132605b0b708c71d")
        );
        Ok(())
    }

    #[test]
    fn redeem_script_single_key() -> Result<()> {
        let reclaim = PublicKey::from_hex(RECLAIM)?;
        let script = Script::build_escrow_out(&keys(&THREE[..1]), &reclaim)?;
        assert_eq!(
            script.to_string(),
            "OP_DUP OP_HASH160 20 0x98c24d8118bbb6b0baaa5926f441978fca0aea36 OP_EQUAL OP_IF \
             OP_CHECKSIG OP_ELSE OP_DUP OP_HASH160 20 0x2a42558df3ea6f2a438251374d7bd61c81f09f96 \
             OP_EQUALVERIFY OP_OVER OP_4 OP_PICK OP_EQUAL OP_NOT OP_VERIFY OP_DUP OP_TOALTSTACK \
             OP_CHECKDATASIGVERIFY OP_FROMALTSTACK OP_CHECKDATASIG OP_ENDIF"
        );
        Ok(())
    }

    #[test]
    fn escrow_in_layout() -> Result<()> {
        let reclaim = PublicKey::from_hex(RECLAIM)?;
        let redeem = Script::build_escrow_out(&keys(&THREE), &reclaim)?;
        let script = Script::build_escrow_in(&reclaim, &[9; 65], &redeem);
        let chunks = script.chunks()?;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].data, Some(reclaim.to_bytes()));
        assert_eq!(chunks[2].data, Some(redeem.0.clone()));
        assert!(generate_input_public_key_validation_operations(&[]).is_err());
        Ok(())
    }
}
