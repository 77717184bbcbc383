//! # Scrypt (RFC 7914)
//!
//! Memory-hard password stretching. Used wherever a human-chosen password
//! has to become key material.
//!
//! ```text
//! B  = PBKDF2-HMAC-SHA256(password, salt, 1, p * 128r)
//! Bi = ROMix(Bi)                  for each of the p blocks
//! DK = PBKDF2-HMAC-SHA256(password, B, 1, dkLen)
//! ```
//!
//! ROMix fills a table of `N` blocks where each entry is BlockMix of the
//! previous one, then walks it `N` times at data-dependent indices. The
//! sequential fill is what makes the function memory-hard: skipping the
//! table means recomputing chains of BlockMix on every lookup.
//!
//! ## Memory
//!
//! One derivation allocates `128 * r * N` bytes of scratch (16 MiB with the
//! defaults). The scratch table, the working blocks and the Salsa
//! accumulator all hold password-derived data, so they live in a
//! `RoMix` that wipes itself on drop, on the error path as well as the
//! happy one.
//!
//! Every buffer is reserved fallibly. Parameters whose table the allocator
//! refuses come back as `Validation` instead of aborting the process.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::hash::pbkdf2_sha256;
use crate::config::{SCRYPT_DEFAULT_LOG_N, SCRYPT_DEFAULT_P, SCRYPT_DEFAULT_R, SCRYPT_MAX_PR};
use crate::error::{CoreError, Result};

/// Largest output PBKDF2-HMAC-SHA256 can produce: `(2^32 - 1) * 32` bytes.
const MAX_DK_LEN: u64 = ((1u64 << 32) - 1) * 32;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Validated scrypt cost parameters.
///
/// Deserialisation goes through the same validation as
/// [`ScryptParams::new`], so a config file can't smuggle in `N = 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScryptParams", into = "RawScryptParams")]
pub struct ScryptParams {
    log_n: u8,
    r: u32,
    p: u32,
}

#[derive(Serialize, Deserialize)]
struct RawScryptParams {
    n: u64,
    r: u32,
    p: u32,
}

impl ScryptParams {
    /// Parameters from the cost `N` directly. `N` must be a power of two
    /// greater than one.
    pub fn new(n: u64, r: u32, p: u32) -> Result<Self> {
        if n <= 1 || !n.is_power_of_two() {
            return Err(CoreError::validation(format!(
                "scrypt cost N must be a power of two greater than 1, got {n}"
            )));
        }
        Self::from_log_n(n.trailing_zeros() as u8, r, p)
    }

    /// Parameters from `log2(N)`.
    pub fn from_log_n(log_n: u8, r: u32, p: u32) -> Result<Self> {
        if log_n == 0 || log_n >= 64 {
            return Err(CoreError::validation(format!(
                "scrypt log2(N) must be in 1..=63, got {log_n}"
            )));
        }
        if r == 0 {
            return Err(CoreError::validation("scrypt block size r must be positive"));
        }
        if p == 0 {
            return Err(CoreError::validation("scrypt parallelism p must be positive"));
        }
        if u64::from(r) * u64::from(p) >= SCRYPT_MAX_PR {
            return Err(CoreError::validation("scrypt p * r must be below 2^30"));
        }
        // RFC 7914: N < 2^(128 * r / 8).
        let r_bits = 16u64.saturating_mul(u64::from(r));
        if u64::from(log_n) >= r_bits {
            return Err(CoreError::validation(format!(
                "scrypt N = 2^{log_n} is too large for r = {r}"
            )));
        }

        let params = Self { log_n, r, p };
        params.scratch()?;
        Ok(params)
    }

    /// Cost `N`.
    pub fn n(&self) -> u64 {
        1u64 << self.log_n
    }

    /// `log2(N)`.
    pub fn log_n(&self) -> u8 {
        self.log_n
    }

    /// Block-size factor.
    pub fn r(&self) -> u32 {
        self.r
    }

    /// Parallelism factor.
    pub fn p(&self) -> u32 {
        self.p
    }

    /// Approximate scratch memory of one derivation, in bytes.
    pub fn memory_bytes(&self) -> u64 {
        128 * u64::from(self.r) * self.n()
    }

    /// Buffer sizes of one derivation, checked against the address space.
    fn scratch(&self) -> Result<Scratch> {
        let too_big = || CoreError::validation("scrypt parameters need more memory than is addressable");
        let r = usize::try_from(self.r).map_err(|_| too_big())?;
        let block_words = r.checked_mul(32).ok_or_else(too_big)?;
        let block_bytes = block_words.checked_mul(4).ok_or_else(too_big)?;
        let n = usize::try_from(self.n()).map_err(|_| too_big())?;
        let table_words = block_words.checked_mul(n).ok_or_else(too_big)?;
        table_words.checked_mul(4).ok_or_else(too_big)?;
        let lane_bytes = usize::try_from(self.p)
            .ok()
            .and_then(|p| p.checked_mul(block_bytes))
            .ok_or_else(too_big)?;
        Ok(Scratch {
            r,
            n,
            block_words,
            block_bytes,
            table_words,
            lane_bytes,
        })
    }
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self {
            log_n: SCRYPT_DEFAULT_LOG_N,
            r: SCRYPT_DEFAULT_R,
            p: SCRYPT_DEFAULT_P,
        }
    }
}

impl fmt::Display for ScryptParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N=2^{}, r={}, p={}", self.log_n, self.r, self.p)
    }
}

impl TryFrom<RawScryptParams> for ScryptParams {
    type Error = CoreError;

    fn try_from(raw: RawScryptParams) -> Result<Self> {
        ScryptParams::new(raw.n, raw.r, raw.p)
    }
}

impl From<ScryptParams> for RawScryptParams {
    fn from(params: ScryptParams) -> Self {
        RawScryptParams {
            n: params.n(),
            r: params.r,
            p: params.p,
        }
    }
}

// ---------------------------------------------------------------------------
// KDF
// ---------------------------------------------------------------------------

/// The scrypt key derivation function for one parameter set.
///
/// Holds no secret state between calls; every [`derive`](Self::derive)
/// allocates and wipes its own scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scrypt {
    params: ScryptParams,
}

impl Scrypt {
    /// A KDF for already-validated parameters.
    pub fn new(params: ScryptParams) -> Self {
        Self { params }
    }

    /// Shorthand for `Scrypt::new(ScryptParams::new(n, r, p)?)`.
    pub fn with_cost(n: u64, r: u32, p: u32) -> Result<Self> {
        Ok(Self::new(ScryptParams::new(n, r, p)?))
    }

    /// The parameters this instance derives with.
    pub fn params(&self) -> &ScryptParams {
        &self.params
    }

    /// Derive `dk_len` bytes from `password` and `salt`.
    ///
    /// # Example
    ///
    /// ```
    /// use keystone_core::crypto::Scrypt;
    ///
    /// let kdf = Scrypt::with_cost(16, 1, 1).unwrap();
    /// let key = kdf.derive(b"", b"", 64).unwrap();
    /// assert_eq!(&key[..4], &[0x77, 0xd6, 0x57, 0x62]);
    /// ```
    pub fn derive(&self, password: &[u8], salt: &[u8], dk_len: usize) -> Result<Zeroizing<Vec<u8>>> {
        if dk_len == 0 || dk_len as u64 > MAX_DK_LEN {
            return Err(CoreError::validation(format!(
                "scrypt output length must be in 1..={MAX_DK_LEN}, got {dk_len}"
            )));
        }

        let scratch = self.params.scratch()?;

        debug!(params = %self.params, dk_len, "running scrypt");

        let mut b = Zeroizing::new(zeroed::<u8>(scratch.lane_bytes)?);
        pbkdf2_sha256(password, salt, 1, &mut b);

        let mut romix = RoMix::new(&scratch)?;
        for lane in b.chunks_exact_mut(scratch.block_bytes) {
            romix.mix(lane);
        }
        drop(romix);

        let mut out = Zeroizing::new(zeroed::<u8>(dk_len)?);
        pbkdf2_sha256(password, &b, 1, &mut out);
        Ok(out)
    }

    /// Same as [`derive`](Self::derive) with the output in a fixed array.
    pub fn derive_array<const L: usize>(&self, password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; L]>> {
        let derived = self.derive(password, salt, L)?;
        let mut out = Zeroizing::new([0u8; L]);
        out.copy_from_slice(&derived);
        Ok(out)
    }
}

impl Default for Scrypt {
    fn default() -> Self {
        Self::new(ScryptParams::default())
    }
}

// ---------------------------------------------------------------------------
// ROMix / BlockMix / Salsa20/8
// ---------------------------------------------------------------------------

/// Sizes derived from one parameter set. `table_words * 4` is known not to
/// overflow.
#[derive(Debug, Clone, Copy)]
struct Scratch {
    r: usize,
    n: usize,
    block_words: usize,
    block_bytes: usize,
    table_words: usize,
    /// `p * 128r`: the PBKDF2 output split into lanes.
    lane_bytes: usize,
}

/// A zero-filled buffer, or `Validation` if the allocator refuses it.
fn zeroed<T: Copy + Default>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| {
        CoreError::validation("scrypt parameters need more memory than is available")
    })?;
    buf.resize(len, T::default());
    Ok(buf)
}

/// Working memory for ROMix. Everything in here is password-derived.
#[derive(Zeroize, ZeroizeOnDrop)]
struct RoMix {
    #[zeroize(skip)]
    r: usize,
    #[zeroize(skip)]
    n: usize,
    /// The `V` table: `N` consecutive blocks of `32r` words.
    table: Vec<u32>,
    x: Vec<u32>,
    y: Vec<u32>,
    /// BlockMix accumulator.
    t: [u32; 16],
}

impl RoMix {
    fn new(scratch: &Scratch) -> Result<Self> {
        Ok(Self {
            r: scratch.r,
            n: scratch.n,
            table: zeroed(scratch.table_words)?,
            x: zeroed(scratch.block_words)?,
            y: zeroed(scratch.block_words)?,
            t: [0u32; 16],
        })
    }

    /// Mix one `128r`-byte block in place.
    fn mix(&mut self, block: &mut [u8]) {
        let w = self.x.len();

        for (word, bytes) in self.x.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        // V[i] = X; X = BlockMix(X). After the loop X = BlockMix(V[N-1]).
        for i in 0..self.n {
            self.table[i * w..(i + 1) * w].copy_from_slice(&self.x);
            block_mix(&self.x, &mut self.y, &mut self.t, self.r);
            std::mem::swap(&mut self.x, &mut self.y);
        }

        for _ in 0..self.n {
            let j = self.integerify() & (self.n - 1);
            for (xk, vk) in self.x.iter_mut().zip(&self.table[j * w..(j + 1) * w]) {
                *xk ^= vk;
            }
            block_mix(&self.x, &mut self.y, &mut self.t, self.r);
            std::mem::swap(&mut self.x, &mut self.y);
        }

        for (bytes, word) in block.chunks_exact_mut(4).zip(&self.x) {
            bytes.copy_from_slice(&word.to_le_bytes());
        }
    }

    /// Low 64 bits of the last 64-byte chunk of X, little-endian, truncated
    /// to `usize`. Only the bits below `N` are used and `N` fits `usize`.
    fn integerify(&self) -> usize {
        let last = (2 * self.r - 1) * 16;
        let lo = u64::from(self.x[last]);
        let hi = u64::from(self.x[last + 1]);
        (lo | (hi << 32)) as usize
    }
}

/// BlockMix with Salsa20/8 over `2r` 64-byte chunks.
///
/// Even-indexed results land in the first half of `output`, odd-indexed in
/// the second half.
fn block_mix(input: &[u32], output: &mut [u32], t: &mut [u32; 16], r: usize) {
    t.copy_from_slice(&input[(2 * r - 1) * 16..2 * r * 16]);

    for i in 0..2 * r {
        for (tk, bk) in t.iter_mut().zip(&input[i * 16..(i + 1) * 16]) {
            *tk ^= bk;
        }
        salsa20_8(t);

        let dest = if i % 2 == 0 { i / 2 } else { r + i / 2 };
        output[dest * 16..(dest + 1) * 16].copy_from_slice(t);
    }
}

/// Salsa20 core, 8 rounds, with feed-forward.
fn salsa20_8(b: &mut [u32; 16]) {
    let mut x = *b;

    for _ in 0..4 {
        // Columns.
        quarter_round(&mut x, 0, 4, 8, 12);
        quarter_round(&mut x, 5, 9, 13, 1);
        quarter_round(&mut x, 10, 14, 2, 6);
        quarter_round(&mut x, 15, 3, 7, 11);
        // Rows.
        quarter_round(&mut x, 0, 1, 2, 3);
        quarter_round(&mut x, 5, 6, 7, 4);
        quarter_round(&mut x, 10, 11, 8, 9);
        quarter_round(&mut x, 15, 12, 13, 14);
    }

    for (bi, xi) in b.iter_mut().zip(&x) {
        *bi = bi.wrapping_add(*xi);
    }
    x.zeroize();
}

#[inline(always)]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7914_vector_empty() {
        let kdf = Scrypt::with_cost(16, 1, 1).unwrap();
        let out = kdf.derive(b"", b"", 64).unwrap();
        assert_eq!(
            hex::encode(&*out),
            "77d6576238657b203b19ca42c18a0497f16b4844e3074ae8dfdffa3fede21442\
             fcd0069ded0948f8326a753a0fc81f17e8d3e0fb2e0d3628cf35e20c38d18906"
        );
    }

    #[test]
    fn test_rfc7914_vector_password_nacl() {
        let kdf = Scrypt::with_cost(1024, 8, 16).unwrap();
        let out = kdf.derive(b"password", b"NaCl", 64).unwrap();
        assert_eq!(
            hex::encode(&*out),
            "fdbabe1c9d3472007856e7190d01e9fe7c6ad7cbc8237830e77376634b373162\
             2eaf30d92e22a3886ff109279d9830dac727afb94a83ee6d8360cbdfa2cc0640"
        );
    }

    #[test]
    fn test_salsa20_8_rfc7914_vector() {
        let input = hex::decode(
            "7e879a214f3ec9867ca940e641718f26baee555b8c61c1b50df846116dcd3b1d\
             ee24f319df9b3d8514121e4b5ac5aa3276021d2909c74829edebc68db8b8c25e",
        )
        .unwrap();
        let mut words = [0u32; 16];
        for (w, chunk) in words.iter_mut().zip(input.chunks_exact(4)) {
            *w = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        salsa20_8(&mut words);
        let out: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert_eq!(
            hex::encode(out),
            "a41f859c6608cc993b81cacb020cef05044b2181a2fd337dfd7b1c6396682f29\
             b4393168e3c9e6bcfe6bc5b7a06d96bae424cc102c91745c24ad673dc7618f81"
        );
    }

    #[test]
    fn test_short_output_is_prefix_of_long() {
        // PBKDF2's final pass makes a 16-byte output a prefix of the 64-byte one.
        let kdf = Scrypt::with_cost(16, 1, 1).unwrap();
        let short = kdf.derive(b"keystone", b"salt", 16).unwrap();
        assert_eq!(hex::encode(&*short), "d675e8907b55c1cc67f43cc899c1438a");
        let long = kdf.derive(b"keystone", b"salt", 64).unwrap();
        assert_eq!(&long[..16], &short[..]);
    }

    #[test]
    fn test_derive_array() {
        let kdf = Scrypt::with_cost(16, 1, 1).unwrap();
        let arr: Zeroizing<[u8; 16]> = kdf.derive_array(b"keystone", b"salt").unwrap();
        assert_eq!(hex::encode(*arr), "d675e8907b55c1cc67f43cc899c1438a");
    }

    #[test]
    fn test_rejects_bad_cost() {
        for n in [0u64, 1, 3, 1000, 1023] {
            assert!(matches!(ScryptParams::new(n, 1, 1), Err(CoreError::Validation(_))), "N={n}");
        }
        assert!(ScryptParams::new(2, 1, 1).is_ok());
    }

    #[test]
    fn test_rejects_zero_r_and_p() {
        assert!(matches!(ScryptParams::new(16, 0, 1), Err(CoreError::Validation(_))));
        assert!(matches!(ScryptParams::new(16, 1, 0), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_rejects_oversized_parameters() {
        // p * r must stay below 2^30.
        assert!(ScryptParams::new(16, 1 << 15, 1 << 15).is_err());
        // N must be below 2^(16r).
        assert!(ScryptParams::from_log_n(16, 1, 1).is_err());
        assert!(ScryptParams::from_log_n(15, 1, 1).is_ok());
    }

    #[test]
    fn test_rejects_unaddressable_table() {
        // 128 * r * N overflows the address space even though N < 2^(16r).
        match ScryptParams::from_log_n(63, 4, 1) {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("addressable"), "{msg}"),
            other => panic!("expected an addressability error, got {other:?}"),
        }
    }

    #[test]
    fn test_unallocatable_table_is_an_error() {
        // 2^49 bytes of table: addressable, but no allocator will hand it out.
        let params = ScryptParams::from_log_n(40, 4, 1).unwrap();
        let result = Scrypt::new(params).derive(b"pw", b"salt", 32);
        match result {
            Err(CoreError::Validation(msg)) => assert!(msg.contains("available"), "{msg}"),
            other => panic!("expected an allocation error, got {other:?}"),
        }
    }

    #[test]
    fn test_scratch_sizes() {
        let scratch = ScryptParams::new(1024, 8, 16).unwrap().scratch().unwrap();
        assert_eq!(scratch.block_words, 256);
        assert_eq!(scratch.block_bytes, 1024);
        assert_eq!(scratch.table_words, 256 * 1024);
        assert_eq!(scratch.lane_bytes, 16 * 1024);
    }

    #[test]
    fn test_rejects_zero_length_output() {
        let kdf = Scrypt::with_cost(16, 1, 1).unwrap();
        assert!(matches!(kdf.derive(b"pw", b"salt", 0), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_default_params() {
        let params = ScryptParams::default();
        assert_eq!(params.n(), 16384);
        assert_eq!(params.r(), 8);
        assert_eq!(params.p(), 8);
        assert_eq!(params.memory_bytes(), 16 * 1024 * 1024);
        assert_eq!(params.to_string(), "N=2^14, r=8, p=8");
    }

    #[test]
    fn test_params_serde_validates() {
        let params = ScryptParams::new(1024, 8, 16).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"n":1024,"r":8,"p":16}"#);
        let back: ScryptParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);

        let bad = serde_json::from_str::<ScryptParams>(r#"{"n":1000,"r":8,"p":1}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_salt_and_password_matter() {
        let kdf = Scrypt::with_cost(16, 2, 1).unwrap();
        let base = kdf.derive(b"pw", b"salt", 32).unwrap();
        assert_ne!(*kdf.derive(b"pw", b"salT", 32).unwrap(), *base);
        assert_ne!(*kdf.derive(b"pW", b"salt", 32).unwrap(), *base);
        assert_eq!(*kdf.derive(b"pw", b"salt", 32).unwrap(), *base);
    }
}
