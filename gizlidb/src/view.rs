//! Read projections and the outward document representation.

use serde_json::{json, Value};

use crate::config::EncryptionOptions;
use crate::sidecar::SidecarPresence;
use crate::Document;

/// Force-includes the sidecar maps in an explicit projection.
///
/// Decryption needs the IV sidecar, so a caller selecting only some fields
/// must still fetch both maps. Entries the caller already wrote are
/// respected.
pub fn augment_projection(projection: &mut Document, options: &EncryptionOptions) {
    if !projection.contains_key(options.hash_field()) {
        projection.insert(options.hash_field().to_owned(), json!(1));
    }
    if !projection.contains_key(options.iv_field()) {
        projection.insert(options.iv_field().to_owned(), json!(1));
    }
}

/// Builds the outward representation of a document.
///
/// The hash sidecar is always removed. It is bookkeeping, never data. The
/// IV sidecar is removed unless the options opt out of hiding it. Both
/// rules apply at the top level and inside declared nested sub-documents
/// that carry their own sidecar.
#[must_use]
pub fn external_view(doc: &Document, options: &EncryptionOptions) -> Document {
    let presence = SidecarPresence::detect(doc, options);
    let mut view = doc.clone();

    strip(&mut view, options);
    for name in presence.nested() {
        if let Some(Value::Object(child)) = view.get_mut(name.as_str()) {
            strip(child, options);
        }
    }
    view
}

fn strip(doc: &mut Document, options: &EncryptionOptions) {
    doc.remove(options.hash_field());
    if options.hide_iv() {
        doc.remove(options.iv_field());
    }
}
