//! # Cryptographic Core
//!
//! Everything keystone does with secrets happens under this module.
//!
//! - **hash**: SHA-256/512, HMAC-SHA256 and PBKDF2 wrappers.
//! - **nonce**: RFC 6979 deterministic nonces.
//! - **scrypt**: the memory-hard password KDF (RFC 7914).
//! - **keys**: private/public keys, WIF, signing and decryption entry points.
//! - **signatures**: the ECDSA signer, verification and key recovery.
//! - **ecies**: the "BIE1" authenticated encryption envelope.
//!
//! ## A note on "rolling your own crypto"
//!
//! The field and group arithmetic is k256's, the block cipher is `aes`, the
//! hashes are `sha2`. What lives here is the glue that has to be exactly
//! right: nonce derivation, the scrypt memory pattern, and the envelope's
//! MAC-before-decrypt order. Change those only with test vectors in hand.

pub mod ecies;
pub mod hash;
pub mod keys;
pub mod nonce;
pub mod scrypt;
pub mod signatures;

pub use hash::{double_sha256, hmac_sha256, pbkdf2_sha256, sha256, sha512};
pub use keys::{DecodedWif, PrivateKey, PublicKey};
pub use nonce::{CurveOrder, NonceGenerator};
pub use scrypt::{Scrypt, ScryptParams};
pub use signatures::{message_hash, recover_message_signer, Signature, Signer};
