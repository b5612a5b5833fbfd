//! Equality filter rewriting.
//!
//! Applications query encrypted fields by plaintext. Since ciphertext is
//! randomized per write, those predicates can never match stored values, so
//! they are rewritten to target the hash sidecar instead: the plaintext is
//! digested and the predicate moved to the dotted sidecar path. Only exact
//! equality shapes are rewritten; range operators, regex, and nested
//! combinators pass through unchanged and simply match nothing useful
//! against ciphertext.

use serde_json::{json, Map, Value};
use tracing::trace;

use crate::config::EncryptionOptions;
use crate::digest::searchable_digest;
use crate::Document;

/// Rewrites equality predicates referencing encrypted fields, in place.
///
/// At most one top-level combinator is handled per filter; `$or` takes
/// precedence and an accompanying `$and` is left untouched. When neither is
/// present, every direct `{field: "plaintext"}` entry on a declared field is
/// moved to the hash sidecar path. Filters that reference no encrypted
/// field come back unchanged.
pub fn rewrite_filter(filter: &mut Document, options: &EncryptionOptions) {
    if matches!(filter.get("$or"), Some(Value::Array(_))) {
        rewrite_combinator(filter, "$or", options);
        return;
    }
    if matches!(filter.get("$and"), Some(Value::Array(_))) {
        rewrite_combinator(filter, "$and", options);
        return;
    }

    for field in options.fields() {
        let Some(Value::String(plaintext)) = filter.get(field.as_str()) else {
            continue;
        };
        let digest = searchable_digest(plaintext);

        filter.remove(field.as_str());
        filter.insert(format!("{}.{field}", options.hash_field()), Value::String(digest));
        trace!(field = field.as_str(), "rewrote equality predicate to hash sidecar");
    }
}

fn rewrite_combinator(filter: &mut Document, combinator: &str, options: &EncryptionOptions) {
    let Some(Value::Array(clauses)) = filter.get_mut(combinator) else {
        return;
    };

    for clause in clauses.iter_mut() {
        if let Some(rewritten) = rewrite_clause(clause, options) {
            *clause = rewritten;
        }
    }
}

/// Rewrites one combinator clause when it is a single-key `$eq` test on an
/// encrypted field. Every other shape returns `None` and survives as-is.
fn rewrite_clause(clause: &Value, options: &EncryptionOptions) -> Option<Value> {
    let Value::Object(entry) = clause else {
        return None;
    };
    if entry.len() != 1 {
        return None;
    }

    let (field, test) = entry.iter().next()?;
    if !options.is_encrypted_field(field) {
        return None;
    }
    let Value::Object(test) = test else {
        return None;
    };
    let Some(Value::String(plaintext)) = test.get("$eq") else {
        return None;
    };

    let mut rewritten = Map::new();
    rewritten.insert(
        format!("{}.{field}", options.hash_field()),
        json!({ "$eq": searchable_digest(plaintext) }),
    );
    Some(Value::Object(rewritten))
}
