// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Keystone: Key Material Core
//!
//! The part of a cryptocurrency wallet that actually touches secrets: it
//! turns a 32-byte scalar into signatures, keeps that scalar from lingering
//! in memory, and encrypts messages to public keys.
//!
//! Curve: secp256k1. Formats: WIF for private keys, SEC1 for public keys,
//! Bitcoin "signmessage" for text signatures, and the Electrum/Bitcore
//! "BIE1" ECIES envelope for encryption.
//!
//! ## Architecture
//!
//! - **config**: Every constant and the [`Network`](config::Network) enum.
//! - **error**: The four-variant [`CoreError`](error::CoreError) taxonomy.
//! - **crypto**: Keys, signing, nonces, scrypt, ECIES.
//!
//! ## Quick start
//!
//! ```
//! use keystone_core::config::Network;
//! use keystone_core::crypto::PrivateKey;
//!
//! let key = PrivateKey::generate().unwrap();
//! let wif = key.to_wif(true, Network::MainNet).unwrap();
//! let sig = key.sign_message("hello").unwrap();
//!
//! let restored = PrivateKey::from_wif(&wif, Network::MainNet).unwrap();
//! assert!(restored.key.public_key().unwrap().verify_message("hello", &sig));
//! ```
//!
//! ## Design Philosophy
//!
//! 1. Secrets are wiped on drop, and every exit path is a drop.
//! 2. Validate first, compute second. No half-finished results.
//! 3. Deterministic signing. The RNG is only consulted for new keys and
//!    ECIES ephemerals.
//! 4. No `unsafe`.

pub mod config;
pub mod crypto;
pub mod error;

pub use error::{CoreError, Result};
