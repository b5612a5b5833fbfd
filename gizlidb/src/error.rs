//! Error types for `GizliDB` operations.

use std::fmt;

/// Main error type for `GizliDB` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Options were rejected when attached to a codec or pipeline
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Field encryption or decryption failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Bulk insert was called with an empty or non-array payload
    #[error("bulk insert expects a non-empty array of documents")]
    InvalidBatch,

    /// A batch element could not be encoded, so the whole batch was rejected
    #[error("bulk insert failed: document at index {index} could not be encoded")]
    BatchEncoding {
        /// Position of the offending document in the batch
        index: usize,
        /// The underlying encoding failure
        #[source]
        source: Box<Error>,
    },
}

/// Configuration violations detected when options are attached.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No fields were declared for encryption
    #[error("fields must be a non-empty list of field names")]
    EmptyFields,

    /// The shared key material is too short to form a cipher key
    #[error("salt must be at least {minimum} bytes (got {actual})")]
    SaltTooShort {
        /// Smallest accepted salt length in bytes
        minimum: usize,
        /// Length of the salt that was supplied
        actual: usize,
    },

    /// The algorithm identifier is not a supported cipher
    #[error("unsupported algorithm: {0} (supported: aes-256-ctr, aes-256-cbc)")]
    UnsupportedAlgorithm(String),
}

/// Errors specific to the cipher layer.
#[derive(Debug)]
pub enum CryptoError {
    /// Key length does not match the cipher's requirement
    InvalidKeyLength {
        /// Required key length in bytes
        expected: usize,
        /// Length of the key that was supplied
        actual: usize,
    },

    /// IV length does not match the cipher block size
    InvalidIvLength {
        /// Required IV length in bytes
        expected: usize,
        /// Length of the IV that was supplied
        actual: usize,
    },

    /// A stored IV entry is not valid hex
    MalformedIv(String),

    /// Stored ciphertext is not valid hex or fails unpadding
    MalformedCiphertext(String),

    /// Decrypted bytes are not valid UTF-8
    NotUtf8,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength { expected, actual } => {
                write!(f, "invalid key length: expected {expected} bytes, got {actual}")
            }
            Self::InvalidIvLength { expected, actual } => {
                write!(f, "invalid IV length: expected {expected} bytes, got {actual}")
            }
            Self::MalformedIv(msg) => write!(f, "malformed IV: {msg}"),
            Self::MalformedCiphertext(msg) => write!(f, "malformed ciphertext: {msg}"),
            Self::NotUtf8 => write!(f, "decrypted bytes are not valid UTF-8"),
        }
    }
}

impl std::error::Error for CryptoError {}
