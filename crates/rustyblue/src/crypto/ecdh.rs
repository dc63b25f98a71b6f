//! P-256 ECDH keypair generation and shared secret derivation for LE
//! Secure Connections.
//!
//! Coordinates here are SEC1 big-endian, matching the `p256` crate's
//! native representation. SMP's `Pairing Public Key` PDU carries X and Y
//! as little-endian 32-byte fields; converting between the two is the
//! smp module's job, not this one's, so this boundary stays a single
//! reversal rather than leaking endianness flags through the crypto API.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{ecdh::diffie_hellman, NonZeroScalar, PublicKey, SecretKey};
use rand::rngs::OsRng;

/// A local P-256 keypair used for one pairing session's DHKey exchange.
pub struct KeyPair {
    secret: SecretKey,
    /// Public key X coordinate, SEC1 big-endian.
    pub public_x: [u8; 32],
    /// Public key Y coordinate, SEC1 big-endian.
    pub public_y: [u8; 32],
}

impl KeyPair {
    /// The raw 32-byte private scalar, for session state that needs to
    /// persist a keypair across message handling without holding onto
    /// the `KeyPair` itself (e.g. a cloned pairing session record).
    pub fn private_scalar(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        let encoded = public.to_encoded_point(false);
        let x = encoded.x().expect("uncompressed point has x");
        let y = encoded.y().expect("uncompressed point has y");
        let mut public_x = [0u8; 32];
        let mut public_y = [0u8; 32];
        public_x.copy_from_slice(x);
        public_y.copy_from_slice(y);
        KeyPair {
            secret,
            public_x,
            public_y,
        }
    }
}

/// Generates a fresh random P-256 keypair.
pub fn generate_keypair() -> KeyPair {
    let secret = SecretKey::random(&mut OsRng);
    KeyPair::from_secret(secret)
}

/// Rebuilds a keypair from a known scalar, for deterministic debug keys
/// (Core Spec Vol 3 Part H, 2.3.5.6.1 "debug mode" key pair).
pub fn keypair_from_scalar(scalar: &[u8; 32]) -> Option<KeyPair> {
    let nz = NonZeroScalar::try_from(scalar.as_slice()).ok()?;
    Some(KeyPair::from_secret(SecretKey::from(nz)))
}

/// Derives the 32-byte DHKey shared secret from the local secret and the
/// peer's public key coordinates (SEC1 big-endian, as produced by
/// [`KeyPair::public_x`]/[`KeyPair::public_y`]).
pub fn dhkey(local: &KeyPair, peer_x: &[u8; 32], peer_y: &[u8; 32]) -> Option<[u8; 32]> {
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..33].copy_from_slice(peer_x);
    sec1[33..65].copy_from_slice(peer_y);
    let peer_public = PublicKey::from_sec1_bytes(&sec1).ok()?;

    let shared = diffie_hellman(local.secret.to_nonzero_scalar(), peer_public.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dhkey_agrees_both_directions() {
        let a = generate_keypair();
        let b = generate_keypair();

        let shared_a = dhkey(&a, &b.public_x, &b.public_y).expect("valid peer key");
        let shared_b = dhkey(&b, &a.public_x, &a.public_y).expect("valid peer key");

        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn rejects_garbage_peer_point() {
        let a = generate_keypair();
        let bogus_x = [0xFFu8; 32];
        let bogus_y = [0xFFu8; 32];
        assert!(dhkey(&a, &bogus_x, &bogus_y).is_none());
    }
}
