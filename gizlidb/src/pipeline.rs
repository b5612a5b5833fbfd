//! Lifecycle pipeline: named stages a storage collaborator invokes around
//! its own operations.
//!
//! The core depends on no host event system. A driver holds an
//! [`EncryptionPipeline`] and calls the stage matching each operation kind:
//! encode stages before writes, decode stages after reads, the query stage
//! before finds. Held to that contract, documents never reach storage with
//! plaintext in a configured field and never reach the application with
//! ciphertext in one.

use serde_json::Value;
use std::fmt;
use tracing::{debug, error};

use crate::codec::FieldCodec;
use crate::config::EncryptionOptions;
use crate::error::Error;
use crate::query;
use crate::sidecar::SidecarPresence;
use crate::view;
use crate::Document;

/// Operation kinds at which the pipeline intercepts the document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Single-document create, before persistence.
    BeforeCreate,

    /// Single-document create, after persistence.
    AfterCreate,

    /// Update by filter, before persistence.
    BeforeUpdate,

    /// Find, before the filter reaches storage.
    BeforeQuery,

    /// Bulk insert, before persistence.
    BeforeBulkInsert,

    /// Bulk insert, after persistence.
    AfterBulkInsert,

    /// Multi-row aggregation read, after rows come back.
    AfterAggregate,

    /// Reconstitution of one persisted record.
    AfterLoad,
}

impl Stage {
    /// Every stage, in invocation order across a document's lifecycle.
    pub const ALL: [Self; 8] = [
        Self::BeforeCreate,
        Self::AfterCreate,
        Self::BeforeUpdate,
        Self::BeforeQuery,
        Self::BeforeBulkInsert,
        Self::AfterBulkInsert,
        Self::AfterAggregate,
        Self::AfterLoad,
    ];

    /// The stage's registration name, as a driver would spell it.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeCreate => "before_create",
            Self::AfterCreate => "after_create",
            Self::BeforeUpdate => "before_update",
            Self::BeforeQuery => "before_query",
            Self::BeforeBulkInsert => "before_bulk_insert",
            Self::AfterBulkInsert => "after_bulk_insert",
            Self::AfterAggregate => "after_aggregate",
            Self::AfterLoad => "after_load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drives the field codec at every lifecycle stage.
///
/// # Example
///
/// ```ignore
/// use gizlidb::config::EncryptionOptions;
/// use gizlidb::pipeline::EncryptionPipeline;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = EncryptionOptions::new(["email"], "vZYt@CAkuMKB9Z#SHZF4d7puRt!MhCiK");
/// let pipeline = EncryptionPipeline::new(options)?;
///
/// let mut doc = serde_json::from_value(serde_json::json!({
///     "name": "Alice",
///     "email": "alice@example.com",
/// }))?;
///
/// pipeline.before_create(&mut doc)?;   // driver persists doc here
/// pipeline.after_create(&mut doc)?;    // doc is plaintext again
/// # Ok(())
/// # }
/// ```
pub struct EncryptionPipeline {
    codec: FieldCodec,
}

impl EncryptionPipeline {
    /// Creates a pipeline, validating the options at attach time.
    ///
    /// # Errors
    ///
    /// Returns error if the field list is empty or the salt is shorter than
    /// 32 bytes.
    pub fn new(options: EncryptionOptions) -> Result<Self, Error> {
        Ok(Self { codec: FieldCodec::new(options)? })
    }

    /// The underlying field codec.
    #[must_use]
    pub const fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    /// The attached options.
    #[must_use]
    pub const fn options(&self) -> &EncryptionOptions {
        self.codec.options()
    }

    /// Encodes a document about to be created: installs fresh sidecar maps
    /// and encrypts every configured field.
    ///
    /// # Errors
    ///
    /// Returns error if any field fails to encrypt.
    pub fn before_create(&self, doc: &mut Document) -> Result<(), Error> {
        self.codec.encode_document(doc)
    }

    /// Decodes a just-persisted document so the caller keeps seeing the
    /// plaintext it supplied.
    ///
    /// # Errors
    ///
    /// Returns error if any stored value fails to decrypt.
    pub fn after_create(&self, doc: &mut Document) -> Result<(), Error> {
        self.codec.decode_document(doc)
    }

    /// Encodes configured field assignments inside an update payload.
    ///
    /// Applies to single and bulk updates alike; the filter of the update is
    /// not rewritten, only the payload.
    ///
    /// # Errors
    ///
    /// Returns error if any assigned field fails to encrypt.
    pub fn before_update(&self, update: &mut Document) -> Result<(), Error> {
        self.codec.encode_update(update)
    }

    /// Prepares a find: rewrites equality predicates on encrypted fields to
    /// hash sidecar predicates and, when an explicit projection is supplied,
    /// force-includes the sidecar maps in it.
    pub fn before_query(&self, filter: &mut Document, projection: Option<&mut Document>) {
        if let Some(projection) = projection {
            view::augment_projection(projection, self.options());
        }
        query::rewrite_filter(filter, self.options());
    }

    /// Encodes a batch for bulk insert.
    ///
    /// Atomic per batch: every element encodes or the whole payload is
    /// rejected without reaching storage. The position of a failing element
    /// is logged and carried in the returned error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBatch`] for empty or non-array payloads and
    /// [`Error::BatchEncoding`] when an element cannot be encoded.
    pub fn before_bulk_insert(&self, batch: Value) -> Result<Vec<Document>, Error> {
        let Value::Array(items) = batch else {
            return Err(Error::InvalidBatch);
        };
        if items.is_empty() {
            return Err(Error::InvalidBatch);
        }

        let mut encoded = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(mut doc) = item else {
                return Err(batch_failure(index, Error::InvalidBatch));
            };
            if let Err(cause) = self.codec.encode_document(&mut doc) {
                return Err(batch_failure(index, cause));
            }
            encoded.push(doc);
        }

        debug!(stage = %Stage::BeforeBulkInsert, documents = encoded.len(), "batch encoded");
        Ok(encoded)
    }

    /// Decodes a just-persisted batch back to plaintext for the caller.
    ///
    /// # Errors
    ///
    /// Returns error if any stored value fails to decrypt.
    pub fn after_bulk_insert(&self, docs: &mut [Document]) -> Result<(), Error> {
        for doc in docs.iter_mut() {
            self.codec.decode_document(doc)?;
        }
        Ok(())
    }

    /// Decodes aggregation output rows.
    ///
    /// Each row names its encrypted fields through its own hash sidecar, so
    /// projected and joined shapes decode correctly. A row carrying sidecar
    /// maps at its top level is handled there; otherwise the declared nested
    /// sub-documents are decoded. Rows without sidecars pass through.
    ///
    /// # Errors
    ///
    /// Returns error if any named field fails to decrypt.
    pub fn after_aggregate(&self, rows: &mut [Document]) -> Result<(), Error> {
        for row in rows.iter_mut() {
            let presence = SidecarPresence::detect(row, self.options());
            if presence.direct() {
                self.codec.decode_sidecar_fields(row)?;
            } else {
                for name in presence.nested() {
                    if let Some(Value::Object(child)) = row.get_mut(name.as_str()) {
                        self.codec.decode_sidecar_fields(child)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Decodes one persisted record on load.
    ///
    /// # Errors
    ///
    /// Returns error if any stored value fails to decrypt.
    pub fn after_load(&self, doc: &mut Document) -> Result<(), Error> {
        self.codec.decode_document(doc)
    }

    /// Builds the outward representation of a document, with sidecar maps
    /// stripped per the options.
    #[must_use]
    pub fn external_view(&self, doc: &Document) -> Document {
        view::external_view(doc, self.options())
    }
}

fn batch_failure(index: usize, cause: Error) -> Error {
    error!(stage = %Stage::BeforeBulkInsert, index, error = %cause, "bulk insert encoding failed");
    Error::BatchEncoding { index, source: Box::new(cause) }
}
