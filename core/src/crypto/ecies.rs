//! # ECIES Envelopes
//!
//! Encrypt a message to a secp256k1 public key, in the Electrum/Bitcore
//! "BIE1" format:
//!
//! ```text
//! base64( magic || ephemeral_pubkey[33] || AES-128-CBC(msg) || HMAC-SHA256[32] )
//! ```
//!
//! The sender makes a throwaway key pair, does ECDH against the recipient,
//! and hashes the compressed shared point with SHA-512. The 64-byte digest
//! splits into the IV (`[0..16]`), the AES key (`[16..32]`) and the MAC key
//! (`[32..64]`). The MAC covers everything before it, magic included.
//!
//! ## Decryption order
//!
//! The MAC is checked (in constant time) before a single byte is decrypted.
//! Decrypting first would let an attacker learn whether the PKCS7 padding
//! of a forged ciphertext was valid, which is enough to decrypt anything
//! one byte at a time. Every rejection is the same error class and the
//! message doesn't say which check failed beyond the broad category.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, PublicKey as K256PublicKey};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::hash::{hmac_sha256_multi, hmac_sha256_verify, sha512};
use super::keys::{PrivateKey, PublicKey};
use crate::config::{
    COMPRESSED_PUBLIC_KEY_LENGTH, ECIES_CIPHER_KEY_LENGTH, ECIES_IV_LENGTH, ECIES_MAC_LENGTH,
    ECIES_MIN_ENVELOPE_LENGTH,
};
use crate::error::{CoreError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Symmetric keys derived from one ECDH exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
struct EnvelopeKeys {
    iv: [u8; ECIES_IV_LENGTH],
    cipher: [u8; ECIES_CIPHER_KEY_LENGTH],
    mac: [u8; ECIES_MAC_LENGTH],
}

impl EnvelopeKeys {
    /// ECDH with `scalar` against `point`, then SHA-512 of the compressed
    /// shared point.
    fn derive(scalar: &PrivateKey, point: &K256PublicKey) -> Result<Self> {
        let secret = Zeroizing::new(
            NonZeroScalar::try_from(&scalar.secret()?[..])
                .map_err(|_| CoreError::validation("private key outside [1, n-1]"))?,
        );
        let shared = (point.to_projective() * **secret).to_affine();

        let mut digest = sha512(shared.to_encoded_point(true).as_bytes());
        let mut keys = Self {
            iv: [0u8; ECIES_IV_LENGTH],
            cipher: [0u8; ECIES_CIPHER_KEY_LENGTH],
            mac: [0u8; ECIES_MAC_LENGTH],
        };
        keys.iv.copy_from_slice(&digest[..16]);
        keys.cipher.copy_from_slice(&digest[16..32]);
        keys.mac.copy_from_slice(&digest[32..]);
        digest.zeroize();
        Ok(keys)
    }
}

/// Encrypt `message` to `recipient` with a fresh ephemeral key.
pub fn encrypt(recipient: &PublicKey, message: &str, magic: &str) -> Result<String> {
    let ephemeral = PrivateKey::generate()?;
    encrypt_with_ephemeral(recipient, message, magic, &ephemeral)
}

/// Encrypt with a caller-chosen ephemeral key.
///
/// Reusing an ephemeral key across messages reuses the IV and keys too.
/// Only tests and vector generation should call this directly.
pub fn encrypt_with_ephemeral(
    recipient: &PublicKey,
    message: &str,
    magic: &str,
    ephemeral: &PrivateKey,
) -> Result<String> {
    let keys = EnvelopeKeys::derive(ephemeral, recipient.as_k256())?;
    let ephemeral_public = ephemeral.public_key()?.to_bytes(true);

    let ciphertext = Aes128CbcEnc::new_from_slices(&keys.cipher, &keys.iv)
        .map_err(|_| CoreError::validation("bad AES key or IV length"))?
        .encrypt_padded_vec_mut::<Pkcs7>(message.as_bytes());
    let tag = hmac_sha256_multi(&keys.mac, &[magic.as_bytes(), &ephemeral_public, &ciphertext]);

    let mut envelope =
        Vec::with_capacity(magic.len() + ephemeral_public.len() + ciphertext.len() + tag.len());
    envelope.extend_from_slice(magic.as_bytes());
    envelope.extend_from_slice(&ephemeral_public);
    envelope.extend_from_slice(&ciphertext);
    envelope.extend_from_slice(&tag);
    Ok(STANDARD.encode(envelope))
}

/// Open a base64 envelope addressed to `recipient`.
///
/// Every failure after the disposal check is [`CoreError::Format`].
pub fn decrypt(recipient: &PrivateKey, envelope: &str, magic: &str) -> Result<String> {
    recipient.secret()?;

    let raw = STANDARD
        .decode(envelope.trim())
        .map_err(|_| reject("envelope is not valid base64"))?;
    let magic = magic.as_bytes();
    if raw.len() < ECIES_MIN_ENVELOPE_LENGTH + magic.len() {
        return Err(reject("envelope too short"));
    }

    let (found_magic, rest) = raw.split_at(magic.len());
    let (ephemeral_bytes, rest) = rest.split_at(COMPRESSED_PUBLIC_KEY_LENGTH);
    let (ciphertext, tag) = rest.split_at(rest.len() - ECIES_MAC_LENGTH);

    if found_magic != magic {
        return Err(reject("envelope magic mismatch"));
    }
    let ephemeral = K256PublicKey::from_sec1_bytes(ephemeral_bytes)
        .map_err(|_| reject("ephemeral key is not a point on secp256k1"))?;

    let keys = EnvelopeKeys::derive(recipient, &ephemeral)?;
    if !hmac_sha256_verify(&keys.mac, &[found_magic, ephemeral_bytes, ciphertext], tag) {
        return Err(reject("envelope authentication failed"));
    }

    let plaintext = Aes128CbcDec::new_from_slices(&keys.cipher, &keys.iv)
        .map_err(|_| CoreError::validation("bad AES key or IV length"))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| reject("envelope padding invalid"))?;
    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        reject("plaintext is not UTF-8")
    })
}

fn reject(reason: &'static str) -> CoreError {
    debug!(reason, "rejecting ECIES envelope");
    CoreError::format(reason)
}
