//! Script opcodes used for building and recognizing locking and unlocking scripts.
//!
//! Includes the Bitcoin Cash data-signature opcodes used by escrow redeem scripts.
//!
//! # Examples
//! ```
//! use utxo_sign::script::op_codes::*;
//! assert_eq!(OP_CHECKDATASIG, 0xba);
//! assert_eq!(op_name(OP_HASH160), Some("OP_HASH160"));
//! ```

// Pushdata and constants
/// Pushes an empty array (0/false) onto the stack.
pub const OP_0: u8 = 0;
/// Alias of `OP_0`.
pub const OP_FALSE: u8 = 0;
/// Base for direct pushes: `OP_PUSH + n` pushes the next n bytes (n: 1-75).
pub const OP_PUSH: u8 = 0;
/// Next byte is push length (up to 255 bytes).
pub const OP_PUSHDATA1: u8 = 76;
/// Next two bytes are push length (up to 65535 bytes).
pub const OP_PUSHDATA2: u8 = 77;
/// Next four bytes are push length.
pub const OP_PUSHDATA4: u8 = 78;
/// Pushes -1 onto the stack.
pub const OP_1NEGATE: u8 = 79;
/// Reserved.
pub const OP_RESERVED: u8 = 80;
/// Pushes 1 (true) onto the stack.
pub const OP_1: u8 = 81;
/// Alias of `OP_1`.
pub const OP_TRUE: u8 = 81;
pub const OP_2: u8 = 82;
pub const OP_3: u8 = 83;
pub const OP_4: u8 = 84;
pub const OP_5: u8 = 85;
pub const OP_6: u8 = 86;
pub const OP_7: u8 = 87;
pub const OP_8: u8 = 88;
pub const OP_9: u8 = 89;
pub const OP_10: u8 = 90;
pub const OP_11: u8 = 91;
pub const OP_12: u8 = 92;
pub const OP_13: u8 = 93;
pub const OP_14: u8 = 94;
pub const OP_15: u8 = 95;
/// Pushes 16 onto the stack.
pub const OP_16: u8 = 96;

// Flow control
/// Does nothing.
pub const OP_NOP: u8 = 97;
pub const OP_VER: u8 = 98;
/// If top stack is true, execute block.
pub const OP_IF: u8 = 99;
/// If top stack is false, execute block.
pub const OP_NOTIF: u8 = 100;
pub const OP_VERIF: u8 = 101;
pub const OP_VERNOTIF: u8 = 102;
/// Inverts preceding IF/NOTIF execution.
pub const OP_ELSE: u8 = 103;
/// Ends IF/ELSE block.
pub const OP_ENDIF: u8 = 104;
/// Fails if top stack false.
pub const OP_VERIFY: u8 = 105;
/// Marks the output unspendable; used for data carrier outputs.
pub const OP_RETURN: u8 = 106;

// Stack
/// Moves top item to alt stack.
pub const OP_TOALTSTACK: u8 = 107;
/// Moves top alt stack item to main stack.
pub const OP_FROMALTSTACK: u8 = 108;
pub const OP_2DROP: u8 = 109;
pub const OP_2DUP: u8 = 110;
pub const OP_3DUP: u8 = 111;
pub const OP_2OVER: u8 = 112;
pub const OP_2ROT: u8 = 113;
pub const OP_2SWAP: u8 = 114;
pub const OP_IFDUP: u8 = 115;
pub const OP_DEPTH: u8 = 116;
pub const OP_DROP: u8 = 117;
/// Duplicates top.
pub const OP_DUP: u8 = 118;
pub const OP_NIP: u8 = 119;
/// Copies second-top to top.
pub const OP_OVER: u8 = 120;
/// Copies nth item to top.
pub const OP_PICK: u8 = 121;
pub const OP_ROLL: u8 = 122;
pub const OP_ROT: u8 = 123;
/// Swaps top two.
pub const OP_SWAP: u8 = 124;
pub const OP_TUCK: u8 = 125;

// Splice
/// Concatenates top two.
pub const OP_CAT: u8 = 126;
pub const OP_SPLIT: u8 = 127;
pub const OP_NUM2BIN: u8 = 128;
pub const OP_BIN2NUM: u8 = 129;
pub const OP_SIZE: u8 = 130;

// Bitwise logic
pub const OP_INVERT: u8 = 131;
pub const OP_AND: u8 = 132;
pub const OP_OR: u8 = 133;
pub const OP_XOR: u8 = 134;
/// Equals top two (bytes).
pub const OP_EQUAL: u8 = 135;
/// Equals + VERIFY.
pub const OP_EQUALVERIFY: u8 = 136;
pub const OP_RESERVED1: u8 = 137;
pub const OP_RESERVED2: u8 = 138;

// Arithmetic
pub const OP_1ADD: u8 = 139;
pub const OP_1SUB: u8 = 140;
pub const OP_2MUL: u8 = 141;
pub const OP_2DIV: u8 = 142;
pub const OP_NEGATE: u8 = 143;
pub const OP_ABS: u8 = 144;
/// Logical NOT top.
pub const OP_NOT: u8 = 145;
pub const OP_0NOTEQUAL: u8 = 146;
pub const OP_ADD: u8 = 147;
pub const OP_SUB: u8 = 148;
pub const OP_MUL: u8 = 149;
pub const OP_DIV: u8 = 150;
pub const OP_MOD: u8 = 151;
pub const OP_LSHIFT: u8 = 152;
pub const OP_RSHIFT: u8 = 153;
pub const OP_BOOLAND: u8 = 154;
pub const OP_BOOLOR: u8 = 155;
pub const OP_NUMEQUAL: u8 = 156;
pub const OP_NUMEQUALVERIFY: u8 = 157;
pub const OP_NUMNOTEQUAL: u8 = 158;
pub const OP_LESSTHAN: u8 = 159;
pub const OP_GREATERTHAN: u8 = 160;
pub const OP_LESSTHANOREQUAL: u8 = 161;
pub const OP_GREATERTHANOREQUAL: u8 = 162;
pub const OP_MIN: u8 = 163;
pub const OP_MAX: u8 = 164;
pub const OP_WITHIN: u8 = 165;

// Cryptography
pub const OP_RIPEMD160: u8 = 166;
pub const OP_SHA1: u8 = 167;
pub const OP_SHA256: u8 = 168;
/// RIPEMD160(SHA256(top)).
pub const OP_HASH160: u8 = 169;
pub const OP_HASH256: u8 = 170;
/// Signature hashing only covers the script after the last executed separator.
pub const OP_CODESEPARATOR: u8 = 171;
/// Verifies a transaction signature against a public key.
pub const OP_CHECKSIG: u8 = 172;
pub const OP_CHECKSIGVERIFY: u8 = 173;
/// m-of-n signature check.
pub const OP_CHECKMULTISIG: u8 = 174;
pub const OP_CHECKMULTISIGVERIFY: u8 = 175;

// Locktime and expansion
pub const OP_NOP1: u8 = 176;
/// Fails if locktime > tx.lock_time (BIP-65).
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 177;
/// Fails if the relative locktime is not satisfied (BIP-112).
pub const OP_CHECKSEQUENCEVERIFY: u8 = 178;
pub const OP_NOP4: u8 = 179;
pub const OP_NOP5: u8 = 180;
pub const OP_NOP6: u8 = 181;
pub const OP_NOP7: u8 = 182;
pub const OP_NOP8: u8 = 183;
pub const OP_NOP9: u8 = 184;
pub const OP_NOP10: u8 = 185;

// Bitcoin Cash
/// Verifies a signature over arbitrary data: `<sig> <msg> <pubkey>`.
pub const OP_CHECKDATASIG: u8 = 186;
/// CHECKDATASIG + VERIFY.
pub const OP_CHECKDATASIGVERIFY: u8 = 187;
pub const OP_REVERSEBYTES: u8 = 188;

/// Marks an invalid opcode.
pub const OP_INVALIDOPCODE: u8 = 255;

const NAMES: [(u8, &str); 114] = [
    (OP_0, "OP_0"),
    (OP_PUSHDATA1, "OP_PUSHDATA1"),
    (OP_PUSHDATA2, "OP_PUSHDATA2"),
    (OP_PUSHDATA4, "OP_PUSHDATA4"),
    (OP_1NEGATE, "OP_1NEGATE"),
    (OP_RESERVED, "OP_RESERVED"),
    (OP_1, "OP_1"),
    (OP_2, "OP_2"),
    (OP_3, "OP_3"),
    (OP_4, "OP_4"),
    (OP_5, "OP_5"),
    (OP_6, "OP_6"),
    (OP_7, "OP_7"),
    (OP_8, "OP_8"),
    (OP_9, "OP_9"),
    (OP_10, "OP_10"),
    (OP_11, "OP_11"),
    (OP_12, "OP_12"),
    (OP_13, "OP_13"),
    (OP_14, "OP_14"),
    (OP_15, "OP_15"),
    (OP_16, "OP_16"),
    (OP_NOP, "OP_NOP"),
    (OP_VER, "OP_VER"),
    (OP_IF, "OP_IF"),
    (OP_NOTIF, "OP_NOTIF"),
    (OP_VERIF, "OP_VERIF"),
    (OP_VERNOTIF, "OP_VERNOTIF"),
    (OP_ELSE, "OP_ELSE"),
    (OP_ENDIF, "OP_ENDIF"),
    (OP_VERIFY, "OP_VERIFY"),
    (OP_RETURN, "OP_RETURN"),
    (OP_TOALTSTACK, "OP_TOALTSTACK"),
    (OP_FROMALTSTACK, "OP_FROMALTSTACK"),
    (OP_2DROP, "OP_2DROP"),
    (OP_2DUP, "OP_2DUP"),
    (OP_3DUP, "OP_3DUP"),
    (OP_2OVER, "OP_2OVER"),
    (OP_2ROT, "OP_2ROT"),
    (OP_2SWAP, "OP_2SWAP"),
    (OP_IFDUP, "OP_IFDUP"),
    (OP_DEPTH, "OP_DEPTH"),
    (OP_DROP, "OP_DROP"),
    (OP_DUP, "OP_DUP"),
    (OP_NIP, "OP_NIP"),
    (OP_OVER, "OP_OVER"),
    (OP_PICK, "OP_PICK"),
    (OP_ROLL, "OP_ROLL"),
    (OP_ROT, "OP_ROT"),
    (OP_SWAP, "OP_SWAP"),
    (OP_TUCK, "OP_TUCK"),
    (OP_CAT, "OP_CAT"),
    (OP_SPLIT, "OP_SPLIT"),
    (OP_NUM2BIN, "OP_NUM2BIN"),
    (OP_BIN2NUM, "OP_BIN2NUM"),
    (OP_SIZE, "OP_SIZE"),
    (OP_INVERT, "OP_INVERT"),
    (OP_AND, "OP_AND"),
    (OP_OR, "OP_OR"),
    (OP_XOR, "OP_XOR"),
    (OP_EQUAL, "OP_EQUAL"),
    (OP_EQUALVERIFY, "OP_EQUALVERIFY"),
    (OP_RESERVED1, "OP_RESERVED1"),
    (OP_RESERVED2, "OP_RESERVED2"),
    (OP_1ADD, "OP_1ADD"),
    (OP_1SUB, "OP_1SUB"),
    (OP_2MUL, "OP_2MUL"),
    (OP_2DIV, "OP_2DIV"),
    (OP_NEGATE, "OP_NEGATE"),
    (OP_ABS, "OP_ABS"),
    (OP_NOT, "OP_NOT"),
    (OP_0NOTEQUAL, "OP_0NOTEQUAL"),
    (OP_ADD, "OP_ADD"),
    (OP_SUB, "OP_SUB"),
    (OP_MUL, "OP_MUL"),
    (OP_DIV, "OP_DIV"),
    (OP_MOD, "OP_MOD"),
    (OP_LSHIFT, "OP_LSHIFT"),
    (OP_RSHIFT, "OP_RSHIFT"),
    (OP_BOOLAND, "OP_BOOLAND"),
    (OP_BOOLOR, "OP_BOOLOR"),
    (OP_NUMEQUAL, "OP_NUMEQUAL"),
    (OP_NUMEQUALVERIFY, "OP_NUMEQUALVERIFY"),
    (OP_NUMNOTEQUAL, "OP_NUMNOTEQUAL"),
    (OP_LESSTHAN, "OP_LESSTHAN"),
    (OP_GREATERTHAN, "OP_GREATERTHAN"),
    (OP_LESSTHANOREQUAL, "OP_LESSTHANOREQUAL"),
    (OP_GREATERTHANOREQUAL, "OP_GREATERTHANOREQUAL"),
    (OP_MIN, "OP_MIN"),
    (OP_MAX, "OP_MAX"),
    (OP_WITHIN, "OP_WITHIN"),
    (OP_RIPEMD160, "OP_RIPEMD160"),
    (OP_SHA1, "OP_SHA1"),
    (OP_SHA256, "OP_SHA256"),
    (OP_HASH160, "OP_HASH160"),
    (OP_HASH256, "OP_HASH256"),
    (OP_CODESEPARATOR, "OP_CODESEPARATOR"),
    (OP_CHECKSIG, "OP_CHECKSIG"),
    (OP_CHECKSIGVERIFY, "OP_CHECKSIGVERIFY"),
    (OP_CHECKMULTISIG, "OP_CHECKMULTISIG"),
    (OP_CHECKMULTISIGVERIFY, "OP_CHECKMULTISIGVERIFY"),
    (OP_NOP1, "OP_NOP1"),
    (OP_CHECKLOCKTIMEVERIFY, "OP_CHECKLOCKTIMEVERIFY"),
    (OP_CHECKSEQUENCEVERIFY, "OP_CHECKSEQUENCEVERIFY"),
    (OP_NOP4, "OP_NOP4"),
    (OP_NOP5, "OP_NOP5"),
    (OP_NOP6, "OP_NOP6"),
    (OP_NOP7, "OP_NOP7"),
    (OP_NOP8, "OP_NOP8"),
    (OP_NOP9, "OP_NOP9"),
    (OP_NOP10, "OP_NOP10"),
    (OP_CHECKDATASIG, "OP_CHECKDATASIG"),
    (OP_CHECKDATASIGVERIFY, "OP_CHECKDATASIGVERIFY"),
    (OP_REVERSEBYTES, "OP_REVERSEBYTES"),
];

/// Returns the canonical name of an opcode, if it has one.
#[must_use]
pub fn op_name(op: u8) -> Option<&'static str> {
    if op == OP_INVALIDOPCODE {
        return Some("OP_INVALIDOPCODE");
    }
    NAMES.iter().find(|(code, _)| *code == op).map(|(_, name)| *name)
}

/// Looks up an opcode by name. Accepts the aliases `OP_FALSE`, `OP_TRUE`,
/// `OP_CHECKLOCKTIMEVERIFY`'s old name `OP_NOP2` and `OP_NOP3`.
#[must_use]
pub fn op_from_name(name: &str) -> Option<u8> {
    match name {
        "OP_FALSE" => return Some(OP_FALSE),
        "OP_TRUE" => return Some(OP_TRUE),
        "OP_NOP2" => return Some(OP_CHECKLOCKTIMEVERIFY),
        "OP_NOP3" => return Some(OP_CHECKSEQUENCEVERIFY),
        "OP_INVALIDOPCODE" => return Some(OP_INVALIDOPCODE),
        _ => {}
    }
    NAMES.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

/// Returns `OP_0`..`OP_16` for small integers.
#[must_use]
#[inline]
pub fn small_int(n: u8) -> Option<u8> {
    match n {
        0 => Some(OP_0),
        1..=16 => Some(OP_1 + n - 1),
        _ => None,
    }
}

/// Decodes `OP_0`..`OP_16` back to its integer.
#[must_use]
#[inline]
pub fn decode_small_int(op: u8) -> Option<u8> {
    match op {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some(op - OP_1 + 1),
        _ => None,
    }
}
