//! # Hashing Utilities
//!
//! The hash primitives everything else in the crate is built from. All of
//! them are thin wrappers over the RustCrypto `sha2`/`hmac`/`pbkdf2` crates;
//! the wrappers exist so call sites get fixed-size arrays instead of
//! `GenericArray`, and so there is exactly one place to audit.
//!
//! - **SHA-256 / double-SHA-256** for message digests (Bitcoin convention).
//! - **SHA-512** for ECIES key expansion.
//! - **HMAC-SHA256** for the RFC 6979 chain and the ECIES MAC.
//! - **PBKDF2-HMAC-SHA256** for scrypt's outer layers.

use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use keystone_core::crypto::sha256;
///
/// let hash = sha256(b"abc");
/// assert_eq!(hash[0], 0xba);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// This is the digest Bitcoin-family chains sign. Message signatures in this
/// crate hash their domain-separated buffer with it.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute the SHA-512 hash of the input data.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    Sha512::digest(data).into()
}

/// HMAC-SHA256 over a single buffer.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    hmac_sha256_multi(key, &[data])
}

/// HMAC-SHA256 over several byte slices, fed in order.
///
/// Same result as concatenating `parts` first, minus the temporary buffer.
/// That matters for the nonce chain, where the concatenation would contain
/// the secret key and need its own wiping.
pub fn hmac_sha256_multi(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Check an HMAC-SHA256 tag in constant time.
///
/// Goes through `hmac`'s own `verify_slice`, which compares with `subtle`.
/// Returns `false` for a tag of the wrong length too.
pub fn hmac_sha256_verify(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> bool {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(tag).is_ok()
}

/// PBKDF2 with HMAC-SHA256, filling `out` completely.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, rounds, out);
}

/// HMAC state keyed with a full block. Keys longer than the block are
/// hashed first and shorter ones are zero-padded, which is exactly what
/// HMAC itself does, so every key length is accepted.
fn keyed(key: &[u8]) -> HmacSha256 {
    let mut block = Key::<HmacSha256>::default();
    if key.len() > block.len() {
        let mut digest = sha256(key);
        block[..digest.len()].copy_from_slice(&digest);
        digest.zeroize();
    } else {
        block[..key.len()].copy_from_slice(key);
    }
    let mac = <HmacSha256 as KeyInit>::new(&block);
    block.as_mut_slice().zeroize();
    mac
}
