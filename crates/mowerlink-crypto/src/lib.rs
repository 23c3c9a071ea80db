//! Toy Diffie-Hellman and keyed-hash primitives for the mower fleet
//! handshake.
//!
//! # Security
//!
//! **None of this is cryptographically secure.** The modulus is 32 bits, the
//! "MAC" is an unkeyed multiplicative hash XORed with a key, and the
//! pre-shared key is a fixed constant baked into the binary. This is
//! intentional: the protocol being reproduced here used exactly these
//! parameters, and the spec this crate implements requires bit-identical
//! behavior, not a stronger replacement. Do not import this crate expecting
//! any confidentiality or forgery resistance; it exists to authenticate a
//! device to its own fleet backend over a network the fleet already
//! controls, not to resist an adversary.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Diffie-Hellman generator.
pub const DH_GENERATOR: u64 = 5;

/// Diffie-Hellman modulus: `4_294_967_291`, a prime just below `2^32`.
pub const DH_MODULUS: u64 = 0xFFFF_FFFB;

/// Pre-shared 32-bit key used as the MAC key for handshake authenticators.
pub const PSK: u32 = 0xFEED_5EED;

/// Modular exponentiation `base^exp mod modulus`, via square-and-multiply
/// with 64-bit intermediates so partial products never overflow before the
/// modular reduction.
#[must_use]
pub fn modexp(base: u64, exp: u32, modulus: u64) -> u32 {
    let mut result: u64 = 1;
    let mut base = base % modulus;
    let mut exp = exp;

    while exp > 0 {
        if exp & 1 == 1 {
            result = (result * base) % modulus;
        }
        exp >>= 1;
        base = (base * base) % modulus;
    }

    result as u32
}

/// Derive a Diffie-Hellman public key from a private secret:
/// `5^secret mod 0xFFFFFFFB`.
#[must_use]
pub fn dh_public(secret: u16) -> u32 {
    modexp(DH_GENERATOR, u32::from(secret), DH_MODULUS)
}

/// Derive the shared secret from the peer's public key and our private
/// secret: `peer_public^our_secret mod 0xFFFFFFFB`.
#[must_use]
pub fn dh_shared(peer_public: u32, our_secret: u16) -> u32 {
    modexp(u64::from(peer_public), u32::from(our_secret), DH_MODULUS)
}

/// Non-cryptographic polynomial hash: `fold(bytes, 0, |acc, b| 31*acc + b)`,
/// wrapping at 32 bits.
#[must_use]
pub fn hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(u32::from(b)))
}

/// Keyed MAC: `hash(bytes) XOR key`.
#[must_use]
pub fn mac(key: u32, bytes: &[u8]) -> u32 {
    hash(bytes) ^ key
}

/// Build the 16-byte handshake authenticator block and MAC it with
/// [`PSK`].
///
/// `pub_first` is the public key of whichever side is computing this tag
/// (the sender); `pub_second` is the peer's public key. Order matters: the
/// server computes `auth_tag(server_pub, client_pub, nonce)` and the client
/// computes `auth_tag(client_pub, server_pub, nonce)`.
#[must_use]
pub fn auth_tag(pub_first: u32, pub_second: u32, nonce: u64) -> u32 {
    let mut block = [0u8; 16];
    block[0..4].copy_from_slice(&pub_first.to_be_bytes());
    block[4..8].copy_from_slice(&pub_second.to_be_bytes());
    block[8..16].copy_from_slice(&nonce.to_be_bytes());
    mac(PSK, &block)
}

/// Authenticated HMAC over post-handshake presentation bytes, keyed by the
/// connection's Diffie-Hellman shared secret.
#[must_use]
pub fn authenticated_hmac(shared_secret: u32, presentation_bytes: &[u8]) -> u32 {
    mac(shared_secret, presentation_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_sanity_vectors() {
        assert_eq!(hash(&[0x01]), 1);
        assert_eq!(hash(&[0x01, 0x02]), 33);
    }

    #[test]
    fn mac_sanity_vector() {
        let zeros = [0u8; 16];
        assert_eq!(mac(PSK, &zeros), PSK);
    }

    #[test]
    fn modexp_matches_naive_for_small_exponents() {
        for exp in 0u32..20 {
            let expected = (0..exp).fold(1u64, |acc, _| (acc * 3) % 97) as u32;
            assert_eq!(modexp(3, exp, 97), expected);
        }
    }

    #[test]
    fn dh_shared_secret_is_commutative() {
        let secret_a: u16 = 0x1234;
        let secret_b: u16 = 0x5678;

        let pub_a = dh_public(secret_a);
        let pub_b = dh_public(secret_b);

        assert_eq!(dh_shared(pub_a, secret_b), dh_shared(pub_b, secret_a));
    }

    #[test]
    fn auth_tag_is_order_sensitive() {
        let nonce = 0x0102_0304_0506_0708;
        let a = auth_tag(1, 2, nonce);
        let b = auth_tag(2, 1, nonce);
        assert_ne!(a, b);
    }

    proptest::proptest! {
        #[test]
        fn dh_shared_commutes_for_arbitrary_secrets(
            secret_a in 1u16..=0xFFFF,
            secret_b in 1u16..=0xFFFF,
        ) {
            let pub_a = dh_public(secret_a);
            let pub_b = dh_public(secret_b);
            proptest::prop_assert_eq!(dh_shared(pub_a, secret_b), dh_shared(pub_b, secret_a));
        }

        #[test]
        fn modexp_result_fits_in_modulus(base in 0u64..DH_MODULUS, exp in 0u32..0xFFFF) {
            let result = modexp(base, exp, DH_MODULUS);
            proptest::prop_assert!(u64::from(result) < DH_MODULUS);
        }
    }
}
