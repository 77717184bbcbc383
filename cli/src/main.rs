// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Keystone CLI
//!
//! Entry point for the `keystone` binary. Parses CLI arguments, initializes
//! logging, runs one key operation and prints its result as JSON.
//!
//! - `keygen`  : generate a key, print WIF + public key
//! - `inspect` : decode a WIF key
//! - `sign`    : Bitcoin-style message signature
//! - `verify`  : check a message signature
//! - `encrypt` : BIE1 envelope to a public key
//! - `decrypt` : open a BIE1 envelope
//! - `scrypt`  : password stretching
//! - `version` : print build version information

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use keystone_core::config::Network;
use keystone_core::crypto::keys::{PrivateKey, PublicKey};
use keystone_core::crypto::scrypt::{Scrypt, ScryptParams};
use keystone_core::crypto::signatures::{recover_message_signer, Signature};

use cli::{Commands, KeystoneCli};

#[derive(Debug, Serialize)]
struct KeyReport {
    network: Network,
    compressed: bool,
    wif: Option<String>,
    public_key: String,
}

#[derive(Debug, Serialize)]
struct SignReport {
    public_key: String,
    signature: String,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    valid: bool,
    recovered_public_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnvelopeReport {
    magic: String,
    envelope: String,
}

#[derive(Debug, Serialize)]
struct PlaintextReport {
    message: String,
}

#[derive(Debug, Serialize)]
struct ScryptReport {
    params: ScryptParams,
    key: String,
}

fn main() -> Result<()> {
    let cli = KeystoneCli::parse();
    logging::init_logging("keystone=info,keystone_core=warn", cli.log_format);

    match cli.command {
        Commands::Keygen(args) => emit(&keygen(args)?),
        Commands::Inspect(args) => emit(&inspect(args)?),
        Commands::Sign(args) => emit(&sign(args)?),
        Commands::Verify(args) => emit(&verify(args)?),
        Commands::Encrypt(args) => emit(&encrypt(args)?),
        Commands::Decrypt(args) => emit(&decrypt(args)?),
        Commands::Scrypt(args) => emit(&scrypt(args)?),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn emit<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn load_key(wif: &str, network: Network) -> Result<(PrivateKey, bool)> {
    let decoded = PrivateKey::from_wif(wif, network)
        .with_context(|| format!("failed to decode WIF for {network}"))?;
    Ok((decoded.key, decoded.compressed))
}

fn keygen(args: cli::KeygenArgs) -> Result<KeyReport> {
    let compressed = !args.uncompressed;
    let key = PrivateKey::generate().context("failed to generate private key")?;
    let public_key = key.public_key()?.to_hex(compressed);

    tracing::info!(network = %args.network, compressed, public_key = %public_key, "generated key");

    Ok(KeyReport {
        network: args.network,
        compressed,
        wif: Some(key.to_wif(compressed, args.network)?),
        public_key,
    })
}

fn inspect(args: cli::InspectArgs) -> Result<KeyReport> {
    let (key, compressed) = load_key(&args.wif, args.network)?;
    Ok(KeyReport {
        network: args.network,
        compressed,
        wif: None,
        public_key: key.public_key()?.to_hex(compressed),
    })
}

fn sign(args: cli::SignArgs) -> Result<SignReport> {
    let (key, compressed) = load_key(&args.wif, args.network)?;
    let signature = key
        .sign_message(&args.message)
        .context("failed to sign message")?;

    Ok(SignReport {
        public_key: key.public_key()?.to_hex(compressed),
        signature: signature.to_message_base64(compressed),
    })
}

fn verify(args: cli::VerifyArgs) -> Result<VerifyReport> {
    let public_key = PublicKey::from_hex(&args.public_key).context("invalid public key")?;
    let (signature, _) =
        Signature::from_message_base64(&args.signature).context("invalid signature encoding")?;

    let valid = public_key.verify_message(&args.message, &signature);
    let recovered_public_key = recover_message_signer(&args.message, &args.signature)
        .ok()
        .map(|(key, compressed)| key.to_hex(compressed));

    tracing::info!(valid, "verified message signature");
    Ok(VerifyReport {
        valid,
        recovered_public_key,
    })
}

fn encrypt(args: cli::EncryptArgs) -> Result<EnvelopeReport> {
    let public_key = PublicKey::from_hex(&args.public_key).context("invalid public key")?;
    let envelope = public_key
        .encrypt(&args.message, &args.magic)
        .context("failed to encrypt message")?;
    Ok(EnvelopeReport {
        magic: args.magic,
        envelope,
    })
}

fn decrypt(args: cli::DecryptArgs) -> Result<PlaintextReport> {
    let (mut key, _) = load_key(&args.wif, args.network)?;
    let message = key
        .decrypt_with_magic(&args.envelope, &args.magic)
        .context("failed to decrypt envelope")?;
    key.dispose();
    Ok(PlaintextReport { message })
}

fn scrypt(args: cli::ScryptArgs) -> Result<ScryptReport> {
    let params = ScryptParams::from_log_n(args.log_n, args.block_size, args.parallelism)
        .context("invalid scrypt parameters")?;
    let salt = hex::decode(args.salt.trim()).context("salt must be hex")?;

    tracing::info!(params = %params, memory_bytes = params.memory_bytes(), "deriving key");
    let key = Scrypt::new(params)
        .derive(args.password.as_bytes(), &salt, args.length)
        .context("scrypt derivation failed")?;

    Ok(ScryptReport {
        params,
        key: hex::encode(&key[..]),
    })
}

/// Prints version information to stdout.
fn print_version() {
    println!("keystone {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIF_UNCOMPRESSED: &str = "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ";
    const WIF_COMPRESSED: &str = "KwdMAjGmerYanjeui5SHS7JkmpZvVipYvB2LJGU1ZxJwYvP98617";
    const PUBLIC_UNCOMPRESSED: &str = "04d0de0aaeaefad02b8bdc8a01a1b8b11c696bd3d66a2c5f10780d95b7df42645c\
                                       d85228a6fb29940e858e7e55842ae2bd115d1ed7cc0e82d934e929c97648cb0a";

    fn command(argv: &[&str]) -> Commands {
        let mut full = vec!["keystone"];
        full.extend_from_slice(argv);
        KeystoneCli::try_parse_from(full).unwrap().command
    }

    fn public_hex(wif: &str) -> String {
        match command(&["inspect", wif]) {
            Commands::Inspect(args) => inspect(args).unwrap().public_key,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn inspect_reports_known_key() {
        let report = match command(&["inspect", WIF_UNCOMPRESSED]) {
            Commands::Inspect(args) => inspect(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert!(!report.compressed);
        assert!(report.wif.is_none());
        assert_eq!(report.public_key, PUBLIC_UNCOMPRESSED);
    }

    #[test]
    fn inspect_rejects_wrong_network() {
        match command(&["inspect", WIF_COMPRESSED, "--network", "testnet"]) {
            Commands::Inspect(args) => assert!(inspect(args).is_err()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn keygen_report_reimports() {
        let report = match command(&["keygen", "--network", "regtest"]) {
            Commands::Keygen(args) => keygen(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert!(report.compressed);
        let wif = report.wif.unwrap();
        let decoded = PrivateKey::from_wif(&wif, Network::RegTest).unwrap();
        assert_eq!(decoded.key.public_key().unwrap().to_hex(true), report.public_key);
    }

    #[test]
    fn sign_then_verify() {
        let signed = match command(&["sign", "Hello, keystone", "--wif", WIF_COMPRESSED]) {
            Commands::Sign(args) => sign(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert_eq!(
            signed.signature,
            "H1iV+ay2mCz9WqG4WnxnO6XKWuJudX4s680Q7qvJqVkSZaRDb9/QcwzswTGEjagDB8fZPLIvbq1E6F4M2zJHHRw="
        );

        let verdict = match command(&["verify", signed.public_key.as_str(), "Hello, keystone", signed.signature.as_str()]) {
            Commands::Verify(args) => verify(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert!(verdict.valid);
        assert_eq!(verdict.recovered_public_key.as_deref(), Some(signed.public_key.as_str()));

        let tampered = match command(&["verify", signed.public_key.as_str(), "Hello, keyst0ne", signed.signature.as_str()]) {
            Commands::Verify(args) => verify(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert!(!tampered.valid);
    }

    #[test]
    fn sign_rejects_empty_message() {
        match command(&["sign", "", "--wif", WIF_COMPRESSED]) {
            Commands::Sign(args) => assert!(sign(args).is_err()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn encrypt_then_decrypt() {
        let public_key = public_hex(WIF_COMPRESSED);
        let sealed = match command(&["encrypt", public_key.as_str(), "meet at noon", "--magic", "KEY7"]) {
            Commands::Encrypt(args) => encrypt(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert_eq!(sealed.magic, "KEY7");

        let opened = match command(&["decrypt", sealed.envelope.as_str(), "--wif", WIF_COMPRESSED, "--magic", "KEY7"]) {
            Commands::Decrypt(args) => decrypt(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert_eq!(opened.message, "meet at noon");

        match command(&["decrypt", sealed.envelope.as_str(), "--wif", WIF_COMPRESSED]) {
            Commands::Decrypt(args) => assert!(decrypt(args).is_err()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn scrypt_matches_rfc7914_vector() {
        let report = match command(&["scrypt", "", "", "--log-n", "4", "-r", "1", "-p", "1", "--length", "64"]) {
            Commands::Scrypt(args) => scrypt(args).unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        assert!(report.key.starts_with("77d6576238657b203b19ca42c18a0497"));
        assert_eq!(report.params.n(), 16);
    }

    #[test]
    fn scrypt_reports_unallocatable_parameters() {
        match command(&["scrypt", "pw", "00", "--log-n", "40", "-r", "4", "-p", "1"]) {
            Commands::Scrypt(args) => assert!(scrypt(args).is_err()),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
