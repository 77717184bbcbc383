//! # Key Material
//!
//! secp256k1 private and public keys, and everything you can do with them:
//! WIF import/export, message and digest signing, ECIES decryption.
//!
//! ## Lifetime of a secret
//!
//! A [`PrivateKey`] owns exactly one copy of its 32-byte scalar. The scalar
//! is wiped when the key is dropped, and [`PrivateKey::dispose`] wipes it
//! early. After disposal every operation returns [`CoreError::Disposed`]
//! instead of working on stale bytes. Anything that needs the scalar for a
//! moment (the signer, the ECIES decryptor) gets a borrow or a `Zeroizing`
//! copy, never a long-lived alias.
//!
//! ## Validation
//!
//! Every constructor checks `1 <= scalar <= n - 1` before returning. There is
//! no way to hold a `PrivateKey` with an out-of-range scalar, so the signing
//! and decryption paths don't re-check.
//!
//! Key bytes never appear in logs or `Debug` output. If you add logging to
//! this module, log the public key.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::FieldBytes;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::ecies;
use super::nonce::CurveOrder;
use super::signatures::{self, message_hash, Signature, Signer};
use crate::config::{
    Network, COMPRESSED_PUBLIC_KEY_LENGTH, ECIES_DEFAULT_MAGIC, KEY_SIZE, MAX_RNG_ATTEMPTS,
    UNCOMPRESSED_PUBLIC_KEY_LENGTH, WIF_COMPRESSION_MARKER,
};
use crate::error::{CoreError, Result};

/// The raw scalar. Only ever lives inside a `PrivateKey`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecretScalar([u8; KEY_SIZE]);

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A secp256k1 private key.
///
/// Cloning is allowed but every clone is another copy of the secret to
/// protect. Each copy is wiped independently on drop.
#[derive(Clone)]
pub struct PrivateKey {
    secret: Option<SecretScalar>,
}

/// Result of [`PrivateKey::from_wif`].
#[derive(Debug)]
pub struct DecodedWif {
    pub key: PrivateKey,
    /// Whether the WIF carried the compressed-pubkey marker.
    pub compressed: bool,
    pub network: Network,
}

impl PrivateKey {
    /// Generate a fresh key from the operating system's RNG.
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a fresh key from a cryptographic `rng`.
    ///
    /// Asks the RNG for 32 bytes at most [`MAX_RNG_ATTEMPTS`] times. A failed
    /// fill and a draw outside `[1, n-1]` both use up an attempt. Running out
    /// of attempts gives [`CoreError::ExhaustedRetry`].
    pub fn generate_with_rng<R: CryptoRng + RngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        let order = CurveOrder::SECP256K1;
        for attempt in 1..=MAX_RNG_ATTEMPTS {
            let mut candidate = Zeroizing::new([0u8; KEY_SIZE]);
            if let Err(e) = rng.try_fill_bytes(&mut candidate[..]) {
                warn!(attempt, error = %e, "random source failed during key generation");
                continue;
            }
            if !order.contains(&candidate) {
                debug!(attempt, "random draw outside the scalar range, retrying");
                continue;
            }
            if attempt > 1 {
                debug!(attempt, "key generated after retries");
            }
            return Ok(Self::from_validated(*candidate));
        }
        Err(CoreError::ExhaustedRetry {
            attempts: MAX_RNG_ATTEMPTS,
        })
    }

    /// Build a key from big-endian bytes.
    ///
    /// Leading zero bytes are ignored, so a 40-byte buffer that is mostly
    /// padding is fine. After stripping, the value must fit in 32 bytes and
    /// lie in `[1, n-1]`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        let significant = &bytes[start..];
        if significant.len() > KEY_SIZE {
            return Err(CoreError::validation(format!(
                "private key is {} significant bytes, at most {KEY_SIZE} allowed",
                significant.len()
            )));
        }

        let mut scalar = Zeroizing::new([0u8; KEY_SIZE]);
        scalar[KEY_SIZE - significant.len()..].copy_from_slice(significant);
        if !CurveOrder::SECP256K1.contains(&scalar) {
            return Err(CoreError::validation("private key outside [1, n-1]"));
        }
        Ok(Self::from_validated(*scalar))
    }

    /// Build a key from a small integer. Mostly useful in tests.
    pub fn from_u64(value: u64) -> Result<Self> {
        Self::from_bytes(&value.to_be_bytes())
    }

    /// Build a key from a hex string (big-endian).
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|_| CoreError::format("private key is not valid hex"))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Decode a WIF string for `network`.
    ///
    /// Base58Check failures, a version byte that doesn't match `network`, a
    /// payload of the wrong length, and a bad compression marker are all
    /// [`CoreError::Format`]. An out-of-range scalar is
    /// [`CoreError::Validation`], like every other constructor.
    pub fn from_wif(wif: &str, network: Network) -> Result<DecodedWif> {
        let payload = Zeroizing::new(
            bs58::decode(wif.trim())
                .with_check(None)
                .into_vec()
                .map_err(|_| CoreError::format("WIF is not valid Base58Check"))?,
        );

        let compressed = match payload.len() {
            len if len == KEY_SIZE + 1 => false,
            len if len == KEY_SIZE + 2 => {
                if payload[KEY_SIZE + 1] != WIF_COMPRESSION_MARKER {
                    return Err(CoreError::format("WIF compression marker must be 0x01"));
                }
                true
            }
            len => {
                return Err(CoreError::format(format!(
                    "WIF payload is {len} bytes, expected {} or {}",
                    KEY_SIZE + 1,
                    KEY_SIZE + 2
                )))
            }
        };

        if payload[0] != network.wif_version() {
            return Err(CoreError::format(format!(
                "WIF version byte does not match {network}"
            )));
        }

        let key = Self::from_bytes(&payload[1..=KEY_SIZE])?;
        Ok(DecodedWif {
            key,
            compressed,
            network,
        })
    }

    fn from_validated(scalar: [u8; KEY_SIZE]) -> Self {
        Self {
            secret: Some(SecretScalar(scalar)),
        }
    }

    /// Borrow the scalar, or fail if the key was disposed.
    pub(crate) fn secret(&self) -> Result<&[u8; KEY_SIZE]> {
        self.secret
            .as_ref()
            .map(|s| &s.0)
            .ok_or(CoreError::Disposed)
    }

    /// Encode as WIF: `Base58Check(version || scalar || [0x01])`.
    pub fn to_wif(&self, compressed: bool, network: Network) -> Result<String> {
        let secret = self.secret()?;
        let mut payload = Zeroizing::new(Vec::with_capacity(KEY_SIZE + 2));
        payload.push(network.wif_version());
        payload.extend_from_slice(secret);
        if compressed {
            payload.push(WIF_COMPRESSION_MARKER);
        }
        Ok(bs58::encode(&payload[..]).with_check().into_string())
    }

    /// A wiping copy of the big-endian scalar.
    pub fn to_bytes(&self) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        Ok(Zeroizing::new(*self.secret()?))
    }

    /// `scalar * G`. Recomputed on every call.
    pub fn public_key(&self) -> Result<PublicKey> {
        let secret = k256::SecretKey::from_bytes(FieldBytes::from_slice(self.secret()?))
            .map_err(|_| CoreError::validation("private key outside [1, n-1]"))?;
        Ok(PublicKey::from_k256(secret.public_key()))
    }

    /// Sign a text message Bitcoin-style.
    ///
    /// Empty messages are rejected. Use [`Signature::to_message_base64`] for
    /// the portable encoding.
    pub fn sign_message(&self, message: &str) -> Result<Signature> {
        let secret = self.secret()?;
        if message.is_empty() {
            return Err(CoreError::validation("refusing to sign an empty message"));
        }
        Signer::new().sign(&message_hash(message), secret, None)
    }

    /// Sign a caller-computed 32-byte digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature> {
        Signer::new().sign(digest, self.secret()?, None)
    }

    /// Sign a digest with extra entropy mixed into the nonce derivation.
    /// The result is still deterministic for a fixed `entropy`.
    pub fn sign_digest_with_entropy(&self, digest: &[u8; 32], entropy: &[u8]) -> Result<Signature> {
        Signer::new().sign(digest, self.secret()?, Some(entropy))
    }

    /// Decrypt a base64 ECIES envelope that uses the default `"BIE1"` magic.
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        self.decrypt_with_magic(envelope, ECIES_DEFAULT_MAGIC)
    }

    /// Decrypt a base64 ECIES envelope with a custom magic prefix.
    pub fn decrypt_with_magic(&self, envelope: &str, magic: &str) -> Result<String> {
        ecies::decrypt(self, envelope, magic)
    }

    /// Wipe the scalar now. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.secret.take().is_some() {
            debug!("private key disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.secret.is_none()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Public key only. A partial scalar is still a leak.
        match self.public_key() {
            Ok(public) => write!(f, "PrivateKey(pub={})", public.to_hex(true)),
            Err(_) => f.write_str("PrivateKey(<disposed>)"),
        }
    }
}

impl PartialEq for PrivateKey {
    /// Constant-time scalar comparison. Two disposed keys compare equal.
    fn eq(&self, other: &Self) -> bool {
        match (&self.secret, &other.secret) {
            (Some(a), Some(b)) => a.0[..].ct_eq(&b.0[..]).into(),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for PrivateKey {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A validated secp256k1 point (never the identity).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: k256::PublicKey,
}

impl PublicKey {
    /// Parse a 33-byte compressed or 65-byte uncompressed SEC1 encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMPRESSED_PUBLIC_KEY_LENGTH
            && bytes.len() != UNCOMPRESSED_PUBLIC_KEY_LENGTH
        {
            return Err(CoreError::format(format!(
                "public key must be {COMPRESSED_PUBLIC_KEY_LENGTH} or \
                 {UNCOMPRESSED_PUBLIC_KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let inner = k256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| CoreError::format("public key is not a point on secp256k1"))?;
        Ok(Self { inner })
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|_| CoreError::format("public key is not valid hex"))?;
        Self::from_bytes(&bytes)
    }

    /// SEC1 encoding, 33 or 65 bytes.
    pub fn to_bytes(&self, compressed: bool) -> Vec<u8> {
        self.inner.to_encoded_point(compressed).as_bytes().to_vec()
    }

    pub fn to_hex(&self, compressed: bool) -> String {
        hex::encode(self.to_bytes(compressed))
    }

    /// Verify a signature over a prehashed digest.
    pub fn verify_digest(&self, digest: &[u8; 32], signature: &Signature) -> bool {
        signatures::verify_digest(self, digest, signature)
    }

    /// Verify a text-message signature produced by
    /// [`PrivateKey::sign_message`] or any compatible wallet.
    pub fn verify_message(&self, message: &str, signature: &Signature) -> bool {
        signatures::verify_message(self, message, signature)
    }

    /// Encrypt `message` to this key as a base64 ECIES envelope.
    pub fn encrypt(&self, message: &str, magic: &str) -> Result<String> {
        ecies::encrypt(self, message, magic)
    }

    pub(crate) fn from_k256(inner: k256::PublicKey) -> Self {
        Self { inner }
    }

    pub(crate) fn as_k256(&self) -> &k256::PublicKey {
        &self.inner
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes(true).hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex(true))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex(true)[..18])
    }
}
