//! # Deterministic Nonces (RFC 6979)
//!
//! ECDSA leaks the private key if two signatures share a nonce, and leaks it
//! slowly if the nonces are merely biased. Instead of trusting an RNG at
//! signing time we derive the nonce from the message hash and the key with
//! an HMAC-SHA256 DRBG, exactly as RFC 6979 section 3.2 lays out.
//!
//! ## Session model
//!
//! A [`NonceGenerator`] is bound to one `(hash, key)` pair by
//! [`init`](NonceGenerator::init) and then yields as many candidates as the
//! signer asks for via [`generate`](NonceGenerator::generate). The signer
//! calls `generate` again when a candidate produces `r == 0` or `s == 0`.
//! Re-binding to a different message requires another `init`; nothing is
//! reset implicitly.
//!
//! ## Extra entropy
//!
//! The optional extra-entropy input is mixed into both keying steps of
//! `init`. A fixed entropy value still gives a reproducible sequence, which
//! is what signature grinding needs: try counter 1, 2, 3... until the
//! signature has the desired shape, with no RNG involved.

use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::hash::{hmac_sha256, hmac_sha256_multi};
use crate::config::{KEY_SIZE, P256_ORDER, SECP256K1_ORDER};
use crate::error::{CoreError, Result};

/// A 256-bit group order, big-endian.
///
/// Only full-width orders (top bit set) are accepted. That keeps `qlen` at
/// exactly 256 so `bits2int` never has to shift, and it means any 256-bit
/// hash is below `2n`, so one conditional subtraction reduces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveOrder([u8; 32]);

impl CurveOrder {
    /// secp256k1's `n`.
    pub const SECP256K1: CurveOrder = CurveOrder(SECP256K1_ORDER);

    /// NIST P-256's `n`.
    pub const P256: CurveOrder = CurveOrder(P256_ORDER);

    /// Wrap an arbitrary full-width order.
    pub fn new(bytes: [u8; 32]) -> Result<Self> {
        if bytes[0] & 0x80 == 0 {
            return Err(CoreError::validation("curve order must be exactly 256 bits wide"));
        }
        Ok(Self(bytes))
    }

    /// Big-endian bytes of the order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `true` iff `1 <= candidate <= n - 1`.
    ///
    /// Big-endian byte arrays of equal length compare lexicographically in
    /// the same order as the integers they encode.
    pub fn contains(&self, candidate: &[u8; 32]) -> bool {
        candidate.iter().any(|&b| b != 0) && candidate < &self.0
    }

    /// `value mod n`.
    pub fn reduce(&self, value: &[u8; 32]) -> [u8; 32] {
        if value < &self.0 {
            return *value;
        }
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = value[i] as i16 - self.0[i] as i16 - borrow;
            borrow = if diff < 0 {
                diff += 256;
                1
            } else {
                0
            };
            out[i] = diff as u8;
        }
        out
    }

    /// RFC 6979 `bits2octets`: take the leftmost 256 bits of the hash
    /// (left-padding shorter inputs) and reduce modulo `n`.
    fn bits2octets(&self, hash: &[u8]) -> [u8; 32] {
        let mut buf = [0u8; 32];
        if hash.len() >= 32 {
            buf.copy_from_slice(&hash[..32]);
        } else {
            buf[32 - hash.len()..].copy_from_slice(hash);
        }
        self.reduce(&buf)
    }
}

/// HMAC-DRBG state for one signing session.
///
/// `K` and `V` are wiped on drop. They're derived from the secret key, and
/// anyone holding them can replay the nonce sequence.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct NonceGenerator {
    #[zeroize(skip)]
    order: CurveOrder,
    k: [u8; 32],
    v: [u8; 32],
    ready: bool,
}

impl NonceGenerator {
    /// A generator for the given group order. Call [`init`](Self::init)
    /// before the first [`generate`](Self::generate).
    pub fn new(order: CurveOrder) -> Self {
        Self {
            order,
            k: [0x00; 32],
            v: [0x01; 32],
            ready: false,
        }
    }

    /// A generator for secp256k1, the curve the rest of the crate signs on.
    pub fn secp256k1() -> Self {
        Self::new(CurveOrder::SECP256K1)
    }

    /// Bind the generator to a message hash and secret key.
    ///
    /// `extra_entropy` of `None` and `Some(&[])` are equivalent.
    pub fn init(&mut self, hash: &[u8], secret_key: &[u8; KEY_SIZE], extra_entropy: Option<&[u8]>) {
        let data = Zeroizing::new(self.order.bits2octets(hash));
        let extra = extra_entropy.unwrap_or(&[]);

        self.v = [0x01; 32];
        self.k = [0x00; 32];

        self.k = hmac_sha256_multi(&self.k, &[&self.v, &[0x00], secret_key, &data[..], extra]);
        self.v = hmac_sha256(&self.k, &self.v);
        self.k = hmac_sha256_multi(&self.k, &[&self.v, &[0x01], secret_key, &data[..], extra]);
        self.v = hmac_sha256(&self.k, &self.v);

        self.ready = true;
    }

    /// Next nonce candidate in `[1, n-1]`, big-endian.
    ///
    /// Out-of-range draws are rerolled internally; the loop terminates with
    /// overwhelming probability after one pass (for secp256k1 the chance of
    /// a reroll is about 2^-128).
    pub fn generate(&mut self) -> Result<Zeroizing<[u8; 32]>> {
        if !self.ready {
            return Err(CoreError::validation("nonce generator used before init"));
        }

        let mut rerolls = 0u32;
        loop {
            self.v = hmac_sha256(&self.k, &self.v);
            // qlen == 256 == hlen, so bits2int is the identity here.
            if self.order.contains(&self.v) {
                if rerolls > 0 {
                    trace!(rerolls, "nonce accepted after rerolls");
                }
                return Ok(Zeroizing::new(self.v));
            }

            rerolls += 1;
            trace!(rerolls, "nonce candidate out of range");
            self.k = hmac_sha256_multi(&self.k, &[&self.v, &[0x00]]);
            self.v = hmac_sha256(&self.k, &self.v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode32(s: &str) -> [u8; 32] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    // RFC 6979 A.2.5, P-256 with SHA-256, message "sample".
    const SAMPLE_HASH: &str = "AF2BDBE1AA9B6EC1E2ADE1D694F41FC71A831D0268E9891562113D8A62ADD1BF";
    const SAMPLE_KEY: &str = "C9AFA9D845BA75166B5C215767B1D6934E50C3DB36E89B127B8A622B120F6721";

    #[test]
    fn test_rfc6979_p256_sample_vector() {
        let mut gen = NonceGenerator::new(CurveOrder::P256);
        gen.init(&decode32(SAMPLE_HASH), &decode32(SAMPLE_KEY), None);
        let k = gen.generate().unwrap();
        assert_eq!(
            hex::encode_upper(*k),
            "A6E3C57DD01ABE90086538398355DD4C3B17AA873382B0F24D6129493D8AAD60"
        );
    }

    #[test]
    fn test_second_generate_continues_chain() {
        let mut gen = NonceGenerator::new(CurveOrder::P256);
        gen.init(&decode32(SAMPLE_HASH), &decode32(SAMPLE_KEY), None);
        let first = gen.generate().unwrap();
        let second = gen.generate().unwrap();
        assert_ne!(*first, *second);
        assert_eq!(
            hex::encode(*second),
            "4ea44075f202fb7840f20d0cb37b780c2188791b44a6a4a8bcdaaeb5dd898873"
        );
    }

    #[test]
    fn test_independent_generators_agree() {
        let hash = [0x42u8; 32];
        let key = [0x07u8; 32];

        let mut a = NonceGenerator::secp256k1();
        let mut b = NonceGenerator::secp256k1();
        a.init(&hash, &key, None);
        b.init(&hash, &key, None);
        assert_eq!(*a.generate().unwrap(), *b.generate().unwrap());
    }

    #[test]
    fn test_single_byte_change_changes_nonce() {
        let hash = [0x42u8; 32];
        let key = [0x07u8; 32];
        let mut gen = NonceGenerator::secp256k1();
        gen.init(&hash, &key, None);
        let base = gen.generate().unwrap();

        for i in [0usize, 15, 31] {
            let mut h = hash;
            h[i] ^= 0x01;
            gen.init(&h, &key, None);
            assert_ne!(*gen.generate().unwrap(), *base, "hash byte {i}");

            let mut k = key;
            k[i] ^= 0x01;
            gen.init(&hash, &k, None);
            assert_ne!(*gen.generate().unwrap(), *base, "key byte {i}");
        }
    }

    #[test]
    fn test_reinit_restarts_sequence() {
        let mut gen = NonceGenerator::secp256k1();
        gen.init(&[1u8; 32], &[2u8; 32], None);
        let first = *gen.generate().unwrap();
        let _ = gen.generate().unwrap();

        gen.init(&[1u8; 32], &[2u8; 32], None);
        assert_eq!(*gen.generate().unwrap(), first);
    }

    #[test]
    fn test_extra_entropy_is_reproducible_and_distinct() {
        let hash = [0x11u8; 32];
        let key = [0x22u8; 32];
        let mut gen = NonceGenerator::secp256k1();

        gen.init(&hash, &key, None);
        let plain = *gen.generate().unwrap();

        gen.init(&hash, &key, Some(&[]));
        assert_eq!(*gen.generate().unwrap(), plain);

        gen.init(&hash, &key, Some(&[1, 0, 0, 0]));
        let ground = *gen.generate().unwrap();
        assert_ne!(ground, plain);

        gen.init(&hash, &key, Some(&[1, 0, 0, 0]));
        assert_eq!(*gen.generate().unwrap(), ground);
    }

    #[test]
    fn test_generate_before_init_fails() {
        let mut gen = NonceGenerator::secp256k1();
        assert!(matches!(gen.generate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_curve_order_contains() {
        let n = CurveOrder::SECP256K1;
        assert!(!n.contains(&[0u8; 32]));
        assert!(!n.contains(n.as_bytes()));

        let mut one = [0u8; 32];
        one[31] = 1;
        assert!(n.contains(&one));

        let mut n_minus_one = *n.as_bytes();
        n_minus_one[31] -= 1;
        assert!(n.contains(&n_minus_one));
    }

    #[test]
    fn test_reduce_above_order() {
        let reduced = CurveOrder::SECP256K1.reduce(&[0xFF; 32]);
        assert_eq!(
            hex::encode(reduced),
            "000000000000000000000000000000014551231950b75fc4402da1732fc9bebe"
        );
        assert_eq!(CurveOrder::SECP256K1.reduce(CurveOrder::SECP256K1.as_bytes()), [0u8; 32]);
    }

    #[test]
    fn test_bits2octets_pads_and_truncates() {
        let n = CurveOrder::SECP256K1;
        let mut expected = [0u8; 32];
        expected[30] = 0xAB;
        expected[31] = 0xCD;
        assert_eq!(n.bits2octets(&[0xAB, 0xCD]), expected);

        let long = [0x01u8; 64];
        assert_eq!(n.bits2octets(&long), [0x01u8; 32]);
    }

    #[test]
    fn test_curve_order_rejects_narrow() {
        let mut narrow = [0xFFu8; 32];
        narrow[0] = 0x7F;
        assert!(CurveOrder::new(narrow).is_err());
        assert!(CurveOrder::new(P256_ORDER).is_ok());
    }
}
