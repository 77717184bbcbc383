//! # CLI Interface
//!
//! Defines the command-line argument structure for `keystone` using `clap`
//! derive. Every subcommand prints a single JSON object to stdout.

use clap::{Parser, Subcommand};
use keystone_core::config::{
    Network, ECIES_DEFAULT_MAGIC, SCRYPT_DEFAULT_LOG_N, SCRYPT_DEFAULT_P, SCRYPT_DEFAULT_R,
};

use crate::logging::LogFormat;

/// Key management for secp256k1 wallets.
///
/// Generates and inspects WIF keys, signs and verifies Bitcoin-style
/// messages, encrypts to public keys with BIE1 envelopes, and runs scrypt.
#[derive(Parser, Debug)]
#[command(
    name = "keystone",
    about = "secp256k1 key management toolkit",
    version,
    propagate_version = true
)]
pub struct KeystoneCli {
    /// Log output format (logs go to stderr).
    #[arg(
        long,
        global = true,
        value_enum,
        env = "KEYSTONE_LOG_FORMAT",
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new private key.
    Keygen(KeygenArgs),
    /// Show the public key and flags of a WIF private key.
    Inspect(InspectArgs),
    /// Sign a text message.
    Sign(SignArgs),
    /// Verify a base64 message signature against a public key.
    Verify(VerifyArgs),
    /// Encrypt a message to a public key.
    Encrypt(EncryptArgs),
    /// Decrypt an envelope with a WIF private key.
    Decrypt(DecryptArgs),
    /// Derive a key from a password with scrypt.
    Scrypt(ScryptArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Network whose WIF version byte to use.
    #[arg(long, env = "KEYSTONE_NETWORK", default_value = "mainnet")]
    pub network: Network,

    /// Export for an uncompressed public key (legacy wallets).
    #[arg(long)]
    pub uncompressed: bool,
}

/// Arguments for the `inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// WIF-encoded private key.
    ///
    /// **Avoid passing keys on the command line** on shared machines; the
    /// `KEYSTONE_WIF` environment variable keeps it out of `ps` output.
    #[arg(env = "KEYSTONE_WIF", hide_env_values = true)]
    pub wif: String,

    #[arg(long, env = "KEYSTONE_NETWORK", default_value = "mainnet")]
    pub network: Network,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Message to sign (UTF-8, must not be empty).
    pub message: String,

    /// WIF-encoded private key.
    #[arg(long, env = "KEYSTONE_WIF", hide_env_values = true)]
    pub wif: String,

    #[arg(long, env = "KEYSTONE_NETWORK", default_value = "mainnet")]
    pub network: Network,
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Signer's public key, hex SEC1 (33 or 65 bytes).
    pub public_key: String,

    /// The message that was signed.
    pub message: String,

    /// Base64 message signature.
    pub signature: String,
}

/// Arguments for the `encrypt` subcommand.
#[derive(Parser, Debug)]
pub struct EncryptArgs {
    /// Recipient public key, hex SEC1.
    pub public_key: String,

    /// Plaintext message.
    pub message: String,

    /// Envelope magic prefix.
    #[arg(long, default_value = ECIES_DEFAULT_MAGIC)]
    pub magic: String,
}

/// Arguments for the `decrypt` subcommand.
#[derive(Parser, Debug)]
pub struct DecryptArgs {
    /// Base64 envelope.
    pub envelope: String,

    /// WIF-encoded private key of the recipient.
    #[arg(long, env = "KEYSTONE_WIF", hide_env_values = true)]
    pub wif: String,

    #[arg(long, env = "KEYSTONE_NETWORK", default_value = "mainnet")]
    pub network: Network,

    /// Envelope magic prefix.
    #[arg(long, default_value = ECIES_DEFAULT_MAGIC)]
    pub magic: String,
}

/// Arguments for the `scrypt` subcommand.
#[derive(Parser, Debug)]
pub struct ScryptArgs {
    /// Password (UTF-8).
    pub password: String,

    /// Salt, hex-encoded.
    pub salt: String,

    /// Cost parameter as log2(N).
    #[arg(long, default_value_t = SCRYPT_DEFAULT_LOG_N)]
    pub log_n: u8,

    /// Block size factor.
    #[arg(short = 'r', long, default_value_t = SCRYPT_DEFAULT_R)]
    pub block_size: u32,

    /// Parallelism factor.
    #[arg(short = 'p', long, default_value_t = SCRYPT_DEFAULT_P)]
    pub parallelism: u32,

    /// Output length in bytes.
    #[arg(long, default_value_t = 32)]
    pub length: usize,
}
