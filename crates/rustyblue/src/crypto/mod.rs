//! Cryptographic toolbox for LE Security Manager pairing.
//!
//! Every function here is pure (no internal state) and operates on fixed
//! size byte arrays so call sites can't pass mismatched lengths. Vol 3
//! Part H, Section 2.2 of the Core Spec is the reference for the function
//! definitions; endianness conventions are spelled out on each function
//! since SMP mixes little-endian PDU fields with the big-endian AES
//! primitive.

mod ecdh;

pub use ecdh::{dhkey, generate_keypair, keypair_from_scalar, KeyPair};

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};
use rand::RngCore;

/// A fresh 128-bit random value (nonce or legacy TK), drawn from the OS RNG.
pub fn random_128() -> [u8; 16] {
    let mut out = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}

/// A fresh passkey in the displayable range `0..=999999`.
pub fn random_passkey() -> u32 {
    rand::random::<u32>() % 1_000_000
}

/// Raw big-endian AES-128 single block encryption. This is the primitive
/// AES-CMAC is built on; callers working in SMP's little-endian PDU order
/// should go through [`aes128_le`] instead.
pub fn aes128_be(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut data = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&data);
    out
}

/// AES-128 as used directly by SMP's c1/s1: both the key and the block are
/// byte-reversed before and after the underlying big-endian cipher, so
/// callers can pass and receive values in SMP's little-endian byte order.
pub fn aes128_le(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let mut rev_key = *key;
    rev_key.reverse();
    let mut rev_block = *block;
    rev_block.reverse();
    let mut out = aes128_be(&rev_key, &rev_block);
    out.reverse();
    out
}

/// AES-CMAC per RFC 4493, over the big-endian AES-128 primitive.
pub fn aes_cmac(key: &[u8; 16], msg: &[u8]) -> [u8; 16] {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key).expect("key is 16 bytes");
    mac.update(msg);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result);
    out
}

/// Legacy pairing confirm value function c1 (Vol 3 Part H, 2.2.3).
///
/// `p1 = iat || rat || preq || pres` (16 bytes, `iat` at byte 0);
/// `p2 = ra || ia || 0x00000000`.
pub fn c1(
    k: &[u8; 16],
    r: &[u8; 16],
    preq: &[u8; 7],
    pres: &[u8; 7],
    iat: u8,
    rat: u8,
    ia: &[u8; 6],
    ra: &[u8; 6],
) -> [u8; 16] {
    let mut p1 = [0u8; 16];
    p1[0] = iat;
    p1[1] = rat;
    p1[2..9].copy_from_slice(preq);
    p1[9..16].copy_from_slice(pres);

    let mut p2 = [0u8; 16];
    p2[0..6].copy_from_slice(ra);
    p2[6..12].copy_from_slice(ia);

    let mut step1 = [0u8; 16];
    for i in 0..16 {
        step1[i] = r[i] ^ p1[i];
    }
    let mut step2 = aes128_le(k, &step1);
    for i in 0..16 {
        step2[i] ^= p2[i];
    }
    aes128_le(k, &step2)
}

/// Legacy pairing STK derivation function s1 (Vol 3 Part H, 2.2.4).
/// `r` is the 16-byte concatenation `Srand[0..8] || Mrand[0..8]`.
pub fn s1(k: &[u8; 16], r: &[u8; 16]) -> [u8; 16] {
    aes128_le(k, r)
}

/// Assembles the `r` input to [`s1`] from the two random halves.
pub fn s1_input(srand: &[u8; 16], mrand: &[u8; 16]) -> [u8; 16] {
    let mut r = [0u8; 16];
    r[0..8].copy_from_slice(&srand[0..8]);
    r[8..16].copy_from_slice(&mrand[0..8]);
    r
}

/// Secure Connections confirm value function f4 (Vol 3 Part H, 2.2.6).
/// `z` is `0x00` for Numeric Comparison / Just Works, `0x80 | bit` for a
/// passkey-entry round.
pub fn f4(u: &[u8; 32], v: &[u8; 32], x: &[u8; 16], z: u8) -> [u8; 16] {
    let mut msg = Vec::with_capacity(65);
    msg.extend_from_slice(u);
    msg.extend_from_slice(v);
    msg.push(z);
    aes_cmac(x, &msg)
}

/// Secure Connections key derivation function f5 (Vol 3 Part H, 2.2.7).
/// Returns `(MacKey, LTK)`.
pub fn f5(
    w: &[u8; 32],
    n1: &[u8; 16],
    n2: &[u8; 16],
    a1: &[u8; 7],
    a2: &[u8; 7],
) -> ([u8; 16], [u8; 16]) {
    const SALT: [u8; 16] = [
        0x6C, 0x88, 0x83, 0x91, 0xAA, 0xF5, 0xA5, 0x38, 0x60, 0x37, 0x0B, 0xDB, 0x5A, 0x60, 0x83,
        0xBE,
    ];
    let t = aes_cmac(&SALT, w);

    let counter_msg = |counter: u8| -> Vec<u8> {
        let mut m = Vec::with_capacity(53);
        m.push(counter);
        m.extend_from_slice(b"btle");
        m.extend_from_slice(n1);
        m.extend_from_slice(n2);
        m.extend_from_slice(a1);
        m.extend_from_slice(a2);
        m.extend_from_slice(&256u16.to_be_bytes());
        m
    };

    let mac_key = aes_cmac(&t, &counter_msg(0));
    let ltk = aes_cmac(&t, &counter_msg(1));
    (mac_key, ltk)
}

/// Secure Connections DHKey check function f6 (Vol 3 Part H, 2.2.8).
pub fn f6(
    w: &[u8; 16],
    n1: &[u8; 16],
    n2: &[u8; 16],
    r: &[u8; 16],
    io_cap: &[u8; 3],
    a1: &[u8; 7],
    a2: &[u8; 7],
) -> [u8; 16] {
    let mut msg = Vec::with_capacity(65);
    msg.extend_from_slice(n1);
    msg.extend_from_slice(n2);
    msg.extend_from_slice(r);
    msg.extend_from_slice(io_cap);
    msg.extend_from_slice(a1);
    msg.extend_from_slice(a2);
    aes_cmac(w, &msg)
}

/// Numeric comparison value function g2 (Vol 3 Part H, 2.2.9). Returns a
/// value in `[0, 999999]`.
pub fn g2(u: &[u8; 32], v: &[u8; 32], x: &[u8; 16], y: &[u8; 16]) -> u32 {
    let mut msg = Vec::with_capacity(80);
    msg.extend_from_slice(u);
    msg.extend_from_slice(v);
    msg.extend_from_slice(y);
    let mac = aes_cmac(x, &msg);
    let value = u32::from_be_bytes([mac[12], mac[13], mac[14], mac[15]]);
    value % 1_000_000
}

/// Data signing algorithm (Vol 3 Part H, 2.4.5): the signature is the 8
/// least significant octets of `AES-CMAC(csrk, message || counter)`.
pub fn sign(csrk: &[u8; 16], message: &[u8], counter: u32) -> [u8; 8] {
    let mut data = Vec::with_capacity(message.len() + 4);
    data.extend_from_slice(message);
    data.extend_from_slice(&counter.to_le_bytes());
    let mac = aes_cmac(csrk, &data);
    let mut sig = [0u8; 8];
    sig.copy_from_slice(&mac[8..16]);
    sig
}

/// Key derivation function h6 (Vol 3 Part H, 2.2.10), used for CTKD.
pub fn h6(w: &[u8; 16], key_id: &[u8; 4]) -> [u8; 16] {
    aes_cmac(w, key_id)
}

/// Derives a BR/EDR link key from an LE LTK (Cross-Transport Key
/// Derivation). `to_br_edr` selects the LE->BR/EDR direction
/// (`"tmp1"`/`"lebr"`); the reverse direction uses `"tmp2"`/`"brle"`.
pub fn ctkd_link_key(ltk: &[u8; 16], to_br_edr: bool) -> [u8; 16] {
    if to_br_edr {
        let ilk = h6(ltk, b"tmp1");
        h6(&ilk, b"lebr")
    } else {
        let ilk = h6(ltk, b"tmp2");
        h6(&ilk, b"brle")
    }
}

/// Legacy/SC-shared address hash function ah (Vol 3 Part H, 2.2.2), used to
/// generate and resolve Resolvable Private Addresses.
pub fn ah(irk: &[u8; 16], prand: [u8; 3]) -> [u8; 3] {
    let mut block = [0u8; 16];
    block[0..3].copy_from_slice(&prand);
    let hash = aes128_le(irk, &block);
    [hash[0], hash[1], hash[2]]
}

/// Generates a Resolvable Private Address from an IRK and a random 24-bit
/// `prand` whose top two bits are forced to `01`.
pub fn generate_rpa(irk: &[u8; 16], mut prand: [u8; 3]) -> [u8; 6] {
    prand[2] = (prand[2] & 0x3F) | 0x40;
    let hash = ah(irk, prand);
    let mut addr = [0u8; 6];
    addr[0..3].copy_from_slice(&hash);
    addr[3..6].copy_from_slice(&prand);
    addr
}

/// Returns true if `addr` is a Resolvable Private Address generated from
/// `irk`.
pub fn resolve_rpa(addr: [u8; 6], irk: &[u8; 16]) -> bool {
    if addr[5] & 0xC0 != 0x40 {
        return false;
    }
    let prand = [addr[3], addr[4], addr[5]];
    let hash = ah(irk, prand);
    hash == [addr[0], addr[1], addr[2]]
}

#[cfg(test)]
mod tests;
