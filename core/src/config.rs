//! # Constants & Network Parameters
//!
//! Every magic number in keystone lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong.
//!
//! Most of these are fixed by external formats (WIF, SEC1, the BIE1 envelope)
//! and changing them breaks interoperability with every other wallet that
//! speaks the same formats. Treat them as read-only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Key Material
// ---------------------------------------------------------------------------

/// Secret scalar length in bytes. secp256k1 scalars are 256-bit.
pub const KEY_SIZE: usize = 32;

/// SEC1 compressed public key: prefix byte (0x02/0x03) + x-coordinate.
pub const COMPRESSED_PUBLIC_KEY_LENGTH: usize = 33;

/// SEC1 uncompressed public key: 0x04 + x-coordinate + y-coordinate.
pub const UNCOMPRESSED_PUBLIC_KEY_LENGTH: usize = 65;

/// Trailing byte in a WIF payload marking the key as "use compressed pubkey".
pub const WIF_COMPRESSION_MARKER: u8 = 0x01;

/// WIF version byte for MainNet keys.
pub const WIF_VERSION_MAINNET: u8 = 128;

/// WIF version byte for TestNet keys.
pub const WIF_VERSION_TESTNET: u8 = 239;

/// WIF version byte for RegTest keys. Shared with TestNet, so the network
/// can't be inferred from a WIF string alone; callers must say which one
/// they expect.
pub const WIF_VERSION_REGTEST: u8 = 239;

/// How many times key generation asks the random source for bytes before
/// giving up. Both transport failures and out-of-range draws count.
pub const MAX_RNG_ATTEMPTS: usize = 10;

// ---------------------------------------------------------------------------
// Curve Orders
// ---------------------------------------------------------------------------

/// Order `n` of the secp256k1 base point, big-endian.
pub const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, //
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, //
    0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Order `n` of the NIST P-256 base point, big-endian. Only the nonce
/// generator uses it (the RFC 6979 appendix vectors are defined over P-256).
pub const P256_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, //
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    0xBC, 0xE6, 0xFA, 0xAD, 0xA7, 0x17, 0x9E, 0x84, //
    0xF3, 0xB9, 0xCA, 0xC2, 0xFC, 0x63, 0x25, 0x51,
];

// ---------------------------------------------------------------------------
// Message Signing
// ---------------------------------------------------------------------------

/// Domain-separation prefix for signed text messages. Shared with every
/// Bitcoin-family wallet, which is the whole point: a signature produced here
/// verifies anywhere else that speaks "signmessage".
pub const MESSAGE_MAGIC: &str = "Bitcoin Signed Message:\n";

/// Header byte base for base64 message signatures (`27 + recid`, `+4` when
/// the signer's key is compressed).
pub const MESSAGE_SIGNATURE_HEADER_BASE: u8 = 27;

/// Compact signature length: `r || s`.
pub const COMPACT_SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// ECIES Envelope
// ---------------------------------------------------------------------------

/// Default envelope magic (Electrum/Bitcore "BIE1").
pub const ECIES_DEFAULT_MAGIC: &str = "BIE1";

/// AES-128-CBC initialisation vector length.
pub const ECIES_IV_LENGTH: usize = 16;

/// AES-128 key length.
pub const ECIES_CIPHER_KEY_LENGTH: usize = 16;

/// HMAC-SHA256 tag length.
pub const ECIES_MAC_LENGTH: usize = 32;

/// AES block size. Every PKCS7-padded ciphertext is a multiple of this and
/// at least one block long, even for the empty message.
pub const AES_BLOCK_LENGTH: usize = 16;

/// Smallest possible envelope, excluding the magic:
/// ephemeral key (33) + one cipher block (16) + MAC (32).
pub const ECIES_MIN_ENVELOPE_LENGTH: usize =
    COMPRESSED_PUBLIC_KEY_LENGTH + AES_BLOCK_LENGTH + ECIES_MAC_LENGTH;

// ---------------------------------------------------------------------------
// Scrypt
// ---------------------------------------------------------------------------

/// Default scrypt cost, as `log2(N)`. 2^14 with r=8, p=8 is the BIP38
/// parameter set: ~16 MiB and a noticeable pause on a laptop.
pub const SCRYPT_DEFAULT_LOG_N: u8 = 14;

/// Default scrypt block-size factor.
pub const SCRYPT_DEFAULT_R: u32 = 8;

/// Default scrypt parallelism factor.
pub const SCRYPT_DEFAULT_P: u32 = 8;

/// Upper bound on `p * r` (RFC 7914: `p <= (2^32 - 1) * 32 / (128 * r)`,
/// tightened the way most implementations do).
pub const SCRYPT_MAX_PR: u64 = 1 << 30;

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// The chain a key belongs to. Only affects the WIF version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production chain.
    MainNet,
    /// Public test chain.
    TestNet,
    /// Local regression-test chain.
    RegTest,
}

impl Network {
    /// All supported networks, mostly for tests and CLI help.
    pub const ALL: [Network; 3] = [Network::MainNet, Network::TestNet, Network::RegTest];

    /// Leading version byte of a WIF payload for this network.
    pub fn wif_version(self) -> u8 {
        match self {
            Network::MainNet => WIF_VERSION_MAINNET,
            Network::TestNet => WIF_VERSION_TESTNET,
            Network::RegTest => WIF_VERSION_REGTEST,
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Network::MainNet => "mainnet",
            Network::TestNet => "testnet",
            Network::RegTest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::MainNet),
            "testnet" | "test" => Ok(Network::TestNet),
            "regtest" => Ok(Network::RegTest),
            other => Err(CoreError::Validation(format!("unknown network '{other}'"))),
        }
    }
}
