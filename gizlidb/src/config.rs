//! Configuration for one encrypted field set.
//!
//! One [`EncryptionOptions`] value configures one codec; there is no
//! process-wide state, so collections with different field sets or keys can
//! coexist in the same process. Validation runs when the options are
//! attached to a codec or pipeline, before any document is processed.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::cipher::{Algorithm, KEY_SIZE};
use crate::error::ConfigError;

/// Minimum accepted salt length in bytes.
pub const MIN_SALT_LEN: usize = 32;

fn default_hash_field() -> String {
    "hashField".to_string()
}

fn default_iv_field() -> String {
    "ivField".to_string()
}

const fn default_hide_iv() -> bool {
    true
}

/// Options for transparent field encryption.
///
/// Deserializable from the host application's configuration; field names
/// follow the conventional wire spelling (`hashField`, `ivField`, `hideIV`).
///
/// # Example
///
/// ```
/// use gizlidb::cipher::Algorithm;
/// use gizlidb::config::EncryptionOptions;
///
/// let options = EncryptionOptions::new(["email", "phone"], "vZYt@CAkuMKB9Z#SHZF4d7puRt!MhCiK")
///     .with_algorithm(Algorithm::Aes256Cbc)
///     .with_hide_iv(false);
///
/// assert!(options.validate().is_ok());
/// assert!(options.is_encrypted_field("email"));
/// ```
#[derive(Deserialize)]
pub struct EncryptionOptions {
    /// Field names to encrypt, in declaration order.
    fields: Vec<String>,

    /// Shared key material; the first 32 bytes form the cipher key.
    salt: SecretString,

    #[serde(default)]
    algorithm: Algorithm,

    #[serde(default = "default_hash_field", rename = "hashField")]
    hash_field: String,

    #[serde(default = "default_iv_field", rename = "ivField")]
    iv_field: String,

    #[serde(default = "default_hide_iv", rename = "hideIV")]
    hide_iv: bool,

    /// Sub-document fields that may carry their own sidecar maps.
    #[serde(default)]
    nested: Vec<String>,
}

impl EncryptionOptions {
    /// Creates options with defaults for everything but the field list and
    /// salt: AES-256-CTR, sidecar maps named `hashField` and `ivField`, IVs
    /// hidden from outward views.
    #[must_use]
    pub fn new<I, S>(fields: I, salt: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            salt: SecretString::new(salt.into()),
            algorithm: Algorithm::default(),
            hash_field: default_hash_field(),
            iv_field: default_iv_field(),
            hide_iv: default_hide_iv(),
            nested: Vec::new(),
        }
    }

    /// Sets the cipher algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Overrides the name of the hash sidecar map.
    #[must_use]
    pub fn with_hash_field(mut self, name: impl Into<String>) -> Self {
        self.hash_field = name.into();
        self
    }

    /// Overrides the name of the IV sidecar map.
    #[must_use]
    pub fn with_iv_field(mut self, name: impl Into<String>) -> Self {
        self.iv_field = name.into();
        self
    }

    /// Controls whether the IV sidecar is stripped from outward views.
    /// The hash sidecar is always stripped.
    #[must_use]
    pub const fn with_hide_iv(mut self, hide: bool) -> Self {
        self.hide_iv = hide;
        self
    }

    /// Declares sub-document fields that may carry their own sidecar maps,
    /// for example joined or embedded records inside aggregation rows.
    #[must_use]
    pub fn with_nested<I, S>(mut self, nested: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nested = nested.into_iter().map(Into::into).collect();
        self
    }

    /// Field names declared for encryption.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns true if `name` is declared for encryption.
    #[must_use]
    pub fn is_encrypted_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field == name)
    }

    /// The configured cipher algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Name of the hash sidecar map.
    #[must_use]
    pub fn hash_field(&self) -> &str {
        &self.hash_field
    }

    /// Name of the IV sidecar map.
    #[must_use]
    pub fn iv_field(&self) -> &str {
        &self.iv_field
    }

    /// Whether the IV sidecar is stripped from outward views.
    #[must_use]
    pub const fn hide_iv(&self) -> bool {
        self.hide_iv
    }

    /// Declared nested sub-document fields.
    #[must_use]
    pub fn nested(&self) -> &[String] {
        &self.nested
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The field list is empty
    /// - The salt is shorter than [`MIN_SALT_LEN`] bytes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::EmptyFields);
        }
        let salt_len = self.salt.expose_secret().len();
        if salt_len < MIN_SALT_LEN {
            return Err(ConfigError::SaltTooShort { minimum: MIN_SALT_LEN, actual: salt_len });
        }
        Ok(())
    }

    /// Returns the cipher key derived from the salt, zeroized on drop.
    ///
    /// Unvalidated options with a short salt yield a short key here, which
    /// the cipher layer rejects as [`crate::error::CryptoError::InvalidKeyLength`].
    #[must_use]
    pub fn cipher_key(&self) -> Zeroizing<Vec<u8>> {
        let salt = self.salt.expose_secret().as_bytes();
        let len = salt.len().min(KEY_SIZE);
        Zeroizing::new(salt[..len].to_vec())
    }
}

impl Clone for EncryptionOptions {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            salt: SecretString::new(self.salt.expose_secret().clone()),
            algorithm: self.algorithm,
            hash_field: self.hash_field.clone(),
            iv_field: self.iv_field.clone(),
            hide_iv: self.hide_iv,
            nested: self.nested.clone(),
        }
    }
}
