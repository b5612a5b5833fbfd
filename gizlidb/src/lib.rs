//! # `GizliDB`
//!
//! Transparent field-level encryption for document databases. Configured
//! fields are persisted as ciphertext, stay searchable by exact equality
//! through deterministic hashes, and come back as plaintext wherever
//! application code reads them.
//!
//! ## Features
//!
//! - AES-256-CTR and AES-256-CBC field ciphers with a fresh IV per write
//! - Deterministic searchable hashes for equality filters
//! - Lifecycle pipeline with named stages for storage drivers to invoke
//! - Equality filter rewriting, including `$or`/`$and` combinators
//! - Sidecar bookkeeping stripped from every outward representation
//! - Graceful pass-through for records written before encryption was enabled
//!
//! ## Example
//!
//! ```rust,ignore
//! use gizlidb::prelude::*;
//!
//! let options = EncryptionOptions::new(["email"], "vZYt@CAkuMKB9Z#SHZF4d7puRt!MhCiK");
//! let pipeline = EncryptionPipeline::new(options)?;
//!
//! let mut doc: Document = serde_json::from_value(serde_json::json!({
//!     "name": "Alice",
//!     "email": "alice@example.com",
//! }))?;
//!
//! pipeline.before_create(&mut doc)?;   // ciphertext + sidecar maps
//! pipeline.after_load(&mut doc)?;      // plaintext again
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cipher;
pub mod codec;
pub mod config;
pub mod digest;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod sidecar;
pub mod view;

/// In-memory document representation: field name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::cipher::Algorithm;
    pub use crate::codec::{EncodedField, FieldCodec};
    pub use crate::config::EncryptionOptions;
    pub use crate::digest::searchable_digest;
    pub use crate::error::{ConfigError, CryptoError, Error};
    pub use crate::pipeline::{EncryptionPipeline, Stage};
    pub use crate::sidecar::SidecarPresence;
    pub use crate::Document;
}
