//! In-memory document collection for `GizliDB`.
//!
//! [`MemoryCollection`] plays the storage collaborator role: it owns raw
//! rows and invokes the encryption pipeline's stages around its own insert,
//! find, update, and aggregate operations, in the same order a real driver
//! would. Rows are held under a [`parking_lot::RwLock`], so a collection
//! can be shared across threads. Intended for development and tests, not as
//! a database.

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use gizlidb::config::EncryptionOptions;
use gizlidb::error::Error;
use gizlidb::pipeline::EncryptionPipeline;
use gizlidb::Document;
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// In-memory document collection driving an encryption pipeline.
///
/// Writes go through the encode stages before touching the row store, reads
/// go through the decode stages before reaching the caller. The raw rows,
/// exposed through [`Self::raw_rows`], therefore always hold ciphertext in
/// the configured fields.
pub struct MemoryCollection {
    pipeline: EncryptionPipeline,
    rows: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    /// Creates an empty collection with the given encryption options.
    ///
    /// # Errors
    ///
    /// Returns error if the options fail validation.
    pub fn new(options: EncryptionOptions) -> Result<Self, Error> {
        Ok(Self { pipeline: EncryptionPipeline::new(options)?, rows: RwLock::new(Vec::new()) })
    }

    /// The encryption pipeline attached to this collection.
    #[must_use]
    pub const fn pipeline(&self) -> &EncryptionPipeline {
        &self.pipeline
    }

    /// Inserts one document and returns it as the caller sees it, with
    /// plaintext fields and sidecar maps present.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the post-insert decode fails.
    pub fn insert_one(&self, mut doc: Document) -> Result<Document, Error> {
        self.pipeline.before_create(&mut doc)?;
        self.rows.write().push(doc.clone());
        self.pipeline.after_create(&mut doc)?;
        Ok(doc)
    }

    /// Inserts a batch atomically: nothing persists unless every element
    /// encodes.
    ///
    /// # Errors
    ///
    /// Returns error for empty or non-array payloads and when any element
    /// cannot be encoded.
    pub fn insert_many(&self, batch: Value) -> Result<Vec<Document>, Error> {
        let mut docs = self.pipeline.before_bulk_insert(batch)?;
        self.rows.write().extend(docs.iter().cloned());
        self.pipeline.after_bulk_insert(&mut docs)?;
        Ok(docs)
    }

    /// Finds every document matching `filter`, decrypted for the caller.
    ///
    /// The filter may reference encrypted fields by plaintext; it is
    /// rewritten to hash predicates before matching. An inclusion projection
    /// may be supplied and is augmented with the sidecar maps so selected
    /// fields still decrypt.
    ///
    /// # Errors
    ///
    /// Returns error if a matched row fails to decode.
    pub fn find(
        &self,
        mut filter: Document,
        mut projection: Option<Document>,
    ) -> Result<Vec<Document>, Error> {
        self.pipeline.before_query(&mut filter, projection.as_mut());

        let rows = self.rows.read();
        let mut found = Vec::new();
        for row in rows.iter() {
            if !matches_filter(row, &filter) {
                continue;
            }
            let mut doc = apply_projection(row, projection.as_ref());
            self.pipeline.after_load(&mut doc)?;
            found.push(doc);
        }
        Ok(found)
    }

    /// Finds the first document matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the matched row fails to decode.
    pub fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>, Error> {
        Ok(self.find(filter, projection)?.into_iter().next())
    }

    /// Applies an update payload to the first row matching `filter`.
    ///
    /// Returns the number of rows updated (0 or 1). The payload's configured
    /// field assignments are encrypted before application; the filter is
    /// matched against raw rows as given.
    ///
    /// # Errors
    ///
    /// Returns error if the payload fails to encode.
    pub fn update_one(&self, filter: &Document, update: Document) -> Result<usize, Error> {
        self.apply_update(filter, update, true)
    }

    /// Applies an update payload to every row matching `filter`; returns the
    /// number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns error if the payload fails to encode.
    pub fn update_many(&self, filter: &Document, update: Document) -> Result<usize, Error> {
        self.apply_update(filter, update, false)
    }

    fn apply_update(
        &self,
        filter: &Document,
        mut update: Document,
        single: bool,
    ) -> Result<usize, Error> {
        self.pipeline.before_update(&mut update)?;

        let mut rows = self.rows.write();
        let mut updated = 0;
        for row in rows.iter_mut() {
            if !matches_filter(row, filter) {
                continue;
            }
            apply_update_payload(row, &update);
            updated += 1;
            if single {
                break;
            }
        }
        Ok(updated)
    }

    /// Runs a pass-through aggregation: every raw row, decoded by the
    /// post-aggregate stage with sidecar maps removed.
    ///
    /// # Errors
    ///
    /// Returns error if any row fails to decode.
    pub fn aggregate(&self) -> Result<Vec<Document>, Error> {
        let mut rows: Vec<Document> = self.rows.read().clone();
        self.pipeline.after_aggregate(&mut rows)?;
        Ok(rows)
    }

    /// Seeds a raw row, bypassing the pipeline. This is the shape a record
    /// written before encryption was enabled, or restored from a dump, would
    /// have.
    pub fn seed_raw(&self, doc: Document) {
        self.rows.write().push(doc);
    }

    /// A snapshot of the raw stored rows, ciphertext and sidecars included.
    #[must_use]
    pub fn raw_rows(&self) -> Vec<Document> {
        self.rows.read().clone()
    }

    /// Builds the outward representation of a document through the attached
    /// pipeline.
    #[must_use]
    pub fn external(&self, doc: &Document) -> Document {
        self.pipeline.external_view(doc)
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// True when the collection holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

/// Tests a raw row against a filter document.
///
/// Supports direct equality, `$eq` operator objects, `$or` and `$and`
/// combinators, and dotted paths into nested objects. An empty filter
/// matches everything.
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match key.as_str() {
        "$or" => match expected {
            Value::Array(clauses) => clauses.iter().any(|clause| clause_matches(doc, clause)),
            _ => false,
        },
        "$and" => match expected {
            Value::Array(clauses) => clauses.iter().all(|clause| clause_matches(doc, clause)),
            _ => false,
        },
        path => value_matches(lookup_path(doc, path), expected),
    })
}

fn clause_matches(doc: &Document, clause: &Value) -> bool {
    match clause {
        Value::Object(clause) => matches_filter(doc, clause),
        _ => false,
    }
}

fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match expected {
        Value::Object(test) if test.contains_key("$eq") => actual == test.get("$eq"),
        _ => actual == Some(expected),
    }
}

/// Resolves a possibly dotted path against nested objects.
fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((head, rest)) => match doc.get(head) {
            Some(Value::Object(child)) => lookup_path(child, rest),
            _ => None,
        },
    }
}

/// Applies `$set` entries and bare top-level assignments, both with dotted
/// path semantics. Other update operators are not interpreted.
fn apply_update_payload(doc: &mut Document, update: &Document) {
    for (key, value) in update {
        if key == "$set" {
            if let Value::Object(set) = value {
                for (path, entry) in set {
                    set_path(doc, path, entry.clone());
                }
            }
        } else if !key.starts_with('$') {
            set_path(doc, key, value.clone());
        }
    }
}

/// Sets a possibly dotted path, creating or replacing intermediate objects
/// as needed.
fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            let child = doc.entry(head.to_owned()).or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                set_path(child, rest, value);
            }
        }
    }
}

/// Applies an inclusion projection; `None` selects the whole row.
fn apply_projection(row: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection else {
        return row.clone();
    };

    let mut doc = Map::new();
    for (key, include) in projection {
        if !truthy(include) {
            continue;
        }
        if let Some(value) = row.get(key) {
            doc.insert(key.clone(), value.clone());
        }
    }
    doc
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_matches_direct_equality() {
        let row = doc(json!({ "name": "Alice", "age": 30 }));

        assert!(matches_filter(&row, &doc(json!({ "name": "Alice" }))));
        assert!(matches_filter(&row, &doc(json!({ "name": "Alice", "age": 30 }))));
        assert!(!matches_filter(&row, &doc(json!({ "name": "Bob" }))));
        assert!(!matches_filter(&row, &doc(json!({ "missing": "x" }))));
    }

    #[test]
    fn test_matches_empty_filter() {
        let row = doc(json!({ "name": "Alice" }));
        assert!(matches_filter(&row, &Map::new()));
    }

    #[test]
    fn test_matches_eq_operator() {
        let row = doc(json!({ "age": 30 }));

        assert!(matches_filter(&row, &doc(json!({ "age": { "$eq": 30 } }))));
        assert!(!matches_filter(&row, &doc(json!({ "age": { "$eq": 31 } }))));
    }

    #[test]
    fn test_matches_dotted_path() {
        let row = doc(json!({ "hashField": { "email": "digest" } }));

        assert!(matches_filter(&row, &doc(json!({ "hashField.email": "digest" }))));
        assert!(!matches_filter(&row, &doc(json!({ "hashField.phone": "digest" }))));
    }

    #[test]
    fn test_matches_or_combinator() {
        let row = doc(json!({ "age": 30 }));
        let filter = doc(json!({ "$or": [{ "age": { "$eq": 29 } }, { "age": { "$eq": 30 } }] }));

        assert!(matches_filter(&row, &filter));
    }

    #[test]
    fn test_matches_and_combinator() {
        let row = doc(json!({ "age": 30, "name": "Alice" }));

        let both = doc(json!({ "$and": [{ "age": 30 }, { "name": "Alice" }] }));
        assert!(matches_filter(&row, &both));

        let one = doc(json!({ "$and": [{ "age": 30 }, { "name": "Bob" }] }));
        assert!(!matches_filter(&row, &one));
    }

    #[test]
    fn test_set_path_creates_nested_objects() {
        let mut row = Map::new();
        set_path(&mut row, "hashField.email", json!("digest"));

        assert_eq!(row["hashField"]["email"], "digest");
    }

    #[test]
    fn test_set_path_replaces_scalar_parent() {
        let mut row = doc(json!({ "hashField": "not an object" }));
        set_path(&mut row, "hashField.email", json!("digest"));

        assert_eq!(row["hashField"]["email"], "digest");
    }

    #[test]
    fn test_apply_update_payload() {
        let mut row = doc(json!({ "name": "Alice", "age": 30 }));
        let update = doc(json!({
            "name": "Alicia",
            "$set": { "age": 31, "address.city": "Ankara" },
            "$inc": { "visits": 1 },
        }));

        apply_update_payload(&mut row, &update);

        assert_eq!(row["name"], "Alicia");
        assert_eq!(row["age"], 31);
        assert_eq!(row["address"]["city"], "Ankara");
        // Uninterpreted operators change nothing
        assert!(row.get("visits").is_none());
        assert!(row.get("$inc").is_none());
    }

    #[test]
    fn test_apply_projection_selects_fields() {
        let row = doc(json!({ "a": 1, "b": 2, "c": 3 }));
        let projection = doc(json!({ "a": 1, "c": true, "b": 0 }));

        let selected = apply_projection(&row, Some(&projection));
        assert_eq!(selected, doc(json!({ "a": 1, "c": 3 })));
    }

    #[test]
    fn test_truthy_values() {
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("x")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!("")));
    }
}
