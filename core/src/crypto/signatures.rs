//! # ECDSA Signatures
//!
//! secp256k1 ECDSA signing, verification and public-key recovery.
//!
//! Signing is done here rather than through `k256::ecdsa::SigningKey` so that
//! the nonce comes from our own [`NonceGenerator`]. That gives one place to
//! audit the RFC 6979 chain, and it's the only way to feed it extra entropy
//! for grinding. The curve arithmetic itself (scalar inversion, `k·G`) is
//! still k256's.
//!
//! ## Canonical form
//!
//! Every signature this module produces is low-S: if `s > n/2` it is replaced
//! by `n - s` and the recovery id's parity bit flipped to match. Verification
//! goes through k256, which rejects high-S signatures outright, so a
//! malleated copy of a valid signature does not verify.
//!
//! ## Message signatures
//!
//! Text messages are hashed Bitcoin-style before signing (see
//! [`message_hash`]). The portable encoding is base64 of a 65-byte blob: one
//! header byte `27 + recid (+4 if the signer's key is compressed)` followed
//! by `r || s`. Any wallet that implements "signmessage" can verify it.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::ff::PrimeField;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::scalar::IsHigh;
use k256::{FieldBytes, ProjectivePoint, Scalar};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::hash::double_sha256;
use super::keys::PublicKey;
use super::nonce::{CurveOrder, NonceGenerator};
use crate::config::{
    COMPACT_SIGNATURE_LENGTH, KEY_SIZE, MESSAGE_MAGIC, MESSAGE_SIGNATURE_HEADER_BASE,
};
use crate::error::{CoreError, Result};

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A low-S secp256k1 ECDSA signature together with its recovery id.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    inner: EcdsaSignature,
    recovery_id: RecoveryId,
}

impl Signature {
    /// Big-endian `r`.
    pub fn r(&self) -> [u8; 32] {
        let (r, _) = self.inner.split_bytes();
        to_array(&r)
    }

    /// Big-endian `s`.
    pub fn s(&self) -> [u8; 32] {
        let (_, s) = self.inner.split_bytes();
        to_array(&s)
    }

    /// Recovery id in `0..=3`: bit 0 is the parity of `R.y`, bit 1 is set
    /// when `R.x` overflowed the group order.
    pub fn recovery_id(&self) -> u8 {
        self.recovery_id.to_byte()
    }

    /// `r || s`, 64 bytes.
    pub fn to_compact(&self) -> [u8; COMPACT_SIGNATURE_LENGTH] {
        let mut out = [0u8; COMPACT_SIGNATURE_LENGTH];
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    /// Parse `r || s` plus a recovery id.
    ///
    /// Zero components and a recovery id above 3 are rejected. A high-S
    /// signature parses but will not verify.
    pub fn from_compact(bytes: &[u8], recovery_id: u8) -> Result<Self> {
        if bytes.len() != COMPACT_SIGNATURE_LENGTH {
            return Err(CoreError::format(format!(
                "compact signature must be {COMPACT_SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let inner = EcdsaSignature::from_slice(bytes)
            .map_err(|_| CoreError::format("signature component out of range"))?;
        let recovery_id = RecoveryId::from_byte(recovery_id)
            .ok_or_else(|| CoreError::format("recovery id must be in 0..=3"))?;
        Ok(Self { inner, recovery_id })
    }

    /// Strict DER encoding, as used in transaction scripts.
    pub fn to_der(&self) -> Vec<u8> {
        self.inner.to_der().as_bytes().to_vec()
    }

    /// `true` when `r < 2^255`, which saves a byte in DER.
    pub fn is_low_r(&self) -> bool {
        self.r()[0] < 0x80
    }

    /// Base64 "signmessage" encoding.
    pub fn to_message_base64(&self, compressed: bool) -> String {
        let mut blob = [0u8; 1 + COMPACT_SIGNATURE_LENGTH];
        blob[0] = MESSAGE_SIGNATURE_HEADER_BASE
            + self.recovery_id.to_byte()
            + if compressed { 4 } else { 0 };
        blob[1..].copy_from_slice(&self.to_compact());
        STANDARD.encode(blob)
    }

    /// Parse a base64 "signmessage" blob. Returns the signature and whether
    /// the header marks the signer's key as compressed.
    pub fn from_message_base64(encoded: &str) -> Result<(Self, bool)> {
        let blob = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CoreError::format("message signature is not valid base64"))?;
        if blob.len() != 1 + COMPACT_SIGNATURE_LENGTH {
            return Err(CoreError::format(format!(
                "message signature must decode to {} bytes, got {}",
                1 + COMPACT_SIGNATURE_LENGTH,
                blob.len()
            )));
        }

        let header = blob[0];
        let first = MESSAGE_SIGNATURE_HEADER_BASE;
        if !(first..first + 8).contains(&header) {
            return Err(CoreError::format("message signature header out of range"));
        }
        let offset = header - first;
        let signature = Self::from_compact(&blob[1..], offset & 0x03)?;
        Ok((signature, offset >= 4))
    }

    pub(crate) fn as_ecdsa(&self) -> &EcdsaSignature {
        &self.inner
    }

    pub(crate) fn ecdsa_recovery_id(&self) -> RecoveryId {
        self.recovery_id
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("r", &hex::encode(self.r()))
            .field("s", &hex::encode(self.s()))
            .field("recovery_id", &self.recovery_id())
            .finish()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_compact()))
    }
}

// ---------------------------------------------------------------------------
// Message hashing
// ---------------------------------------------------------------------------

/// Double-SHA-256 of the domain-separated message buffer:
/// `varint(len(magic)) || magic || varint(len(msg)) || msg`.
pub fn message_hash(message: &str) -> [u8; 32] {
    let magic = MESSAGE_MAGIC.as_bytes();
    let body = message.as_bytes();

    let mut buf = Vec::with_capacity(magic.len() + body.len() + 10);
    write_compact_size(&mut buf, magic.len() as u64);
    buf.extend_from_slice(magic);
    write_compact_size(&mut buf, body.len() as u64);
    buf.extend_from_slice(body);
    double_sha256(&buf)
}

/// Bitcoin's CompactSize length prefix.
fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => buf.push(n as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Deterministic ECDSA signer over secp256k1.
///
/// Owns its nonce generator, so one `Signer` must not be shared between
/// threads without a lock around the whole `sign` call.
pub struct Signer {
    nonces: NonceGenerator,
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer {
    pub fn new() -> Self {
        Self {
            nonces: NonceGenerator::secp256k1(),
        }
    }

    /// Sign a 32-byte digest with `secret`.
    ///
    /// The nonce is RFC 6979 over `(digest, secret, extra_entropy)`, so the
    /// same inputs always give the same signature. Candidates that produce
    /// `r == 0` or `s == 0` are skipped by asking the generator for the next
    /// nonce in the chain.
    pub fn sign(
        &mut self,
        digest: &[u8; 32],
        secret: &[u8; KEY_SIZE],
        extra_entropy: Option<&[u8]>,
    ) -> Result<Signature> {
        let order = CurveOrder::SECP256K1;
        if !order.contains(secret) {
            return Err(CoreError::validation("secret scalar out of range"));
        }
        let d = Zeroizing::new(scalar_from_bytes(secret)?);
        let z = scalar_from_bytes(&order.reduce(digest))?;

        self.nonces.init(digest, secret, extra_entropy);

        let mut candidates = 0u32;
        loop {
            candidates += 1;
            let k_bytes = self.nonces.generate()?;
            let k = Zeroizing::new(scalar_from_bytes(&k_bytes)?);

            let big_r = (ProjectivePoint::GENERATOR * *k).to_affine();
            let x = to_array(&big_r.x());
            let r_bytes = order.reduce(&x);
            let x_reduced = r_bytes != x;
            let r = scalar_from_bytes(&r_bytes)?;
            if bool::from(r.is_zero()) {
                trace!(candidates, "nonce gave r = 0, drawing another");
                continue;
            }

            let k_inv = match Option::<Scalar>::from(k.invert()) {
                Some(inv) => Zeroizing::new(inv),
                None => continue,
            };
            let mut s = *k_inv * (z + r * *d);
            if bool::from(s.is_zero()) {
                trace!(candidates, "nonce gave s = 0, drawing another");
                continue;
            }

            let mut y_odd = bool::from(big_r.y_is_odd());
            if bool::from(s.is_high()) {
                s = -s;
                y_odd = !y_odd;
            }

            let inner = EcdsaSignature::from_scalars(r, s)
                .map_err(|_| CoreError::validation("signature component out of range"))?;
            return Ok(Signature {
                inner,
                recovery_id: RecoveryId::new(y_odd, x_reduced),
            });
        }
    }

    /// Sign, grinding the extra entropy until `r < 2^255`.
    ///
    /// The first attempt uses no extra entropy; attempt `i` uses a 32-byte
    /// buffer holding `i` as a little-endian counter. Each attempt succeeds
    /// with probability about one half.
    pub fn sign_low_r(&mut self, digest: &[u8; 32], secret: &[u8; KEY_SIZE]) -> Result<Signature> {
        let mut signature = self.sign(digest, secret, None)?;
        let mut counter = 0u32;
        while !signature.is_low_r() {
            counter += 1;
            let mut entropy = [0u8; 32];
            entropy[..4].copy_from_slice(&counter.to_le_bytes());
            signature = self.sign(digest, secret, Some(&entropy))?;
        }
        if counter > 0 {
            debug!(attempts = counter + 1, "ground signature to low r");
        }
        Ok(signature)
    }
}

// ---------------------------------------------------------------------------
// Verification & recovery
// ---------------------------------------------------------------------------

/// Verify `signature` over a prehashed digest.
///
/// Returns `false` for a wrong key, a wrong digest, or a high-S signature.
pub fn verify_digest(public_key: &PublicKey, digest: &[u8; 32], signature: &Signature) -> bool {
    let verifying_key = VerifyingKey::from(public_key.as_k256());
    verifying_key
        .verify_prehash(digest, signature.as_ecdsa())
        .is_ok()
}

/// Verify a text-message signature.
pub fn verify_message(public_key: &PublicKey, message: &str, signature: &Signature) -> bool {
    verify_digest(public_key, &message_hash(message), signature)
}

/// Recover the key that signed `digest`.
pub fn recover_digest_signer(digest: &[u8; 32], signature: &Signature) -> Result<PublicKey> {
    let verifying_key = VerifyingKey::recover_from_prehash(
        digest,
        signature.as_ecdsa(),
        signature.ecdsa_recovery_id(),
    )
    .map_err(|_| CoreError::format("no public key recovers from this signature"))?;
    Ok(PublicKey::from_k256(verifying_key.into()))
}

/// Recover the signer of a base64 message signature. The returned flag is
/// the compression bit from the signature header.
pub fn recover_message_signer(message: &str, encoded: &str) -> Result<(PublicKey, bool)> {
    let (signature, compressed) = Signature::from_message_base64(encoded)?;
    let public_key = recover_digest_signer(&message_hash(message), &signature)?;
    Ok((public_key, compressed))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_array(bytes: &FieldBytes) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    out
}

/// Parse a canonical (already reduced) big-endian scalar.
fn scalar_from_bytes(bytes: &[u8; 32]) -> Result<Scalar> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
        .ok_or_else(|| CoreError::validation("scalar not reduced modulo the group order"))
}
