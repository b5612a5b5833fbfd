//! AES field ciphers with a fresh random IV per encryption.
//!
//! Two modes are supported, matching the two accepted configuration
//! identifiers: AES-256-CTR (streaming, the default) and AES-256-CBC with
//! PKCS#7 padding. Both use a 32-byte key and a 16-byte IV, and both are
//! deliberately unauthenticated so that ciphertext length stays predictable
//! for the stored document layout.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, CryptoError};

/// IV size in bytes; both modes use a full AES block.
pub const IV_SIZE: usize = 16;

/// Key size in bytes for AES-256.
pub const KEY_SIZE: usize = 32;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Cipher algorithm for field encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum Algorithm {
    /// AES-256 in counter mode (default).
    #[serde(rename = "aes-256-ctr")]
    Aes256Ctr,

    /// AES-256 in cipher block chaining mode with PKCS#7 padding.
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
}

impl Algorithm {
    /// Returns the configuration identifier for this algorithm.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Aes256Ctr => "aes-256-ctr",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Aes256Ctr
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-256-ctr" => Ok(Self::Aes256Ctr),
            "aes-256-cbc" => Ok(Self::Aes256Cbc),
            other => Err(ConfigError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Encrypts a plaintext string under a fresh random IV.
///
/// # Arguments
///
/// * `plaintext` - Field value to encrypt
/// * `key` - Cipher key (must be [`KEY_SIZE`] bytes)
/// * `algorithm` - Cipher mode to use
///
/// # Returns
///
/// The generated IV and the raw ciphertext bytes. The IV is new on every
/// call, so encrypting the same value twice never yields the same output.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyLength`] if the key is not 32 bytes.
pub fn encrypt(
    plaintext: &str,
    key: &[u8],
    algorithm: Algorithm,
) -> Result<([u8; IV_SIZE], Vec<u8>), CryptoError> {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = match algorithm {
        Algorithm::Aes256Ctr => {
            let mut cipher =
                Aes256Ctr::new_from_slices(key, &iv).map_err(|_| key_length_error(key))?;
            let mut buffer = plaintext.as_bytes().to_vec();
            cipher.apply_keystream(&mut buffer);
            buffer
        }
        Algorithm::Aes256Cbc => {
            let cipher =
                Aes256CbcEnc::new_from_slices(key, &iv).map_err(|_| key_length_error(key))?;
            cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes())
        }
    };

    Ok((iv, ciphertext))
}

/// Decrypts ciphertext using the IV recorded at encryption time.
///
/// # Arguments
///
/// * `iv` - IV stored alongside the ciphertext (must be [`IV_SIZE`] bytes)
/// * `ciphertext` - Raw ciphertext bytes
/// * `key` - Cipher key (must be [`KEY_SIZE`] bytes)
/// * `algorithm` - Cipher mode the value was encrypted with
///
/// # Errors
///
/// Returns error if:
/// - The IV or key has the wrong length
/// - CBC unpadding fails (wrong key or corrupted ciphertext)
/// - The decrypted bytes are not valid UTF-8
pub fn decrypt(
    iv: &[u8],
    ciphertext: &[u8],
    key: &[u8],
    algorithm: Algorithm,
) -> Result<String, CryptoError> {
    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidIvLength { expected: IV_SIZE, actual: iv.len() });
    }

    let plaintext = match algorithm {
        Algorithm::Aes256Ctr => {
            let mut cipher =
                Aes256Ctr::new_from_slices(key, iv).map_err(|_| key_length_error(key))?;
            let mut buffer = ciphertext.to_vec();
            cipher.apply_keystream(&mut buffer);
            buffer
        }
        Algorithm::Aes256Cbc => {
            let cipher =
                Aes256CbcDec::new_from_slices(key, iv).map_err(|_| key_length_error(key))?;
            cipher
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| CryptoError::MalformedCiphertext("bad PKCS#7 padding".to_string()))?
        }
    };

    String::from_utf8(plaintext).map_err(|_| CryptoError::NotUtf8)
}

// new_from_slices only fails on length, and the IV length is checked before
// the call, so any remaining failure is the key.
fn key_length_error(key: &[u8]) -> CryptoError {
    CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: key.len() }
}
