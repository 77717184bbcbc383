//! # Error Taxonomy
//!
//! Every fallible operation in the crate returns [`CoreError`]. There are
//! exactly four classes of failure and callers are expected to match on the
//! class, not the message.
//!
//! Messages describe *what* was wrong in general terms (a length, a version
//! byte, a parameter name). They never include key bytes, plaintext, nonces,
//! or MAC values. A MAC mismatch and a magic mismatch are both `Format`, and
//! the message doesn't say which byte differed.

use thiserror::Error;

/// The crate-wide error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Input is structurally fine but semantically unacceptable: a scalar
    /// outside `[1, n-1]`, a bad length, invalid scrypt parameters.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Input doesn't parse: WIF version/marker mismatch, envelope magic or
    /// MAC mismatch, truncated envelope, off-curve point, bad encoding.
    #[error("malformed input: {0}")]
    Format(String),

    /// The object was explicitly disposed and its secret wiped.
    #[error("key material has been disposed")]
    Disposed,

    /// The random source failed to produce a usable key within the bound.
    #[error("random source exhausted after {attempts} attempts")]
    ExhaustedRetry {
        /// Number of attempts made before giving up.
        attempts: usize,
    },
}

impl CoreError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        CoreError::Validation(reason.into())
    }

    pub(crate) fn format(reason: impl Into<String>) -> Self {
        CoreError::Format(reason.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;
