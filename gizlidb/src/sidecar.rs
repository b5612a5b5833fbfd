//! Sidecar map layout and presence detection.
//!
//! A document that went through encryption carries two sidecar maps, named
//! by configuration. One maps encrypted field name to searchable hash, the
//! other maps encrypted field name to IV. They are bookkeeping: written by
//! the encode stages, read by the decode stages, stripped from every
//! outward representation.

use serde_json::{Map, Value};

use crate::config::EncryptionOptions;
use crate::Document;

/// Where a record keeps its sidecar maps, computed once per record.
///
/// Read paths dispatch on this instead of re-inspecting value shapes at
/// every access. Both facts are computed up front; aggregation uses the
/// direct flag first and falls back to the nested list, outward views use
/// both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarPresence {
    direct: bool,
    nested: Vec<String>,
}

impl SidecarPresence {
    /// Detects where `doc` carries sidecar maps.
    ///
    /// Only the top level and the sub-document fields declared in the
    /// options' `nested` list are inspected. Undeclared sub-documents are
    /// never scanned, so detection is bounded to one declared level.
    #[must_use]
    pub fn detect(doc: &Document, options: &EncryptionOptions) -> Self {
        let direct = doc.contains_key(options.hash_field());
        let nested = options
            .nested()
            .iter()
            .filter(|name| {
                matches!(
                    doc.get(name.as_str()),
                    Some(Value::Object(child)) if child.contains_key(options.hash_field())
                )
            })
            .cloned()
            .collect();

        Self { direct, nested }
    }

    /// True when the sidecar maps sit at the document's top level.
    #[must_use]
    pub const fn direct(&self) -> bool {
        self.direct
    }

    /// Declared sub-document fields that carry their own sidecar maps.
    #[must_use]
    pub fn nested(&self) -> &[String] {
        &self.nested
    }

    /// True when no sidecar maps were found anywhere the options declare.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        !self.direct && self.nested.is_empty()
    }
}

/// Writes a sidecar entry, creating the map if it is missing.
pub(crate) fn insert_entry(doc: &mut Document, map_name: &str, field: &str, value: String) {
    let map = doc.entry(map_name.to_owned()).or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = map {
        map.insert(field.to_owned(), Value::String(value));
    }
}

/// Reads a sidecar entry as a string, if the map and entry exist.
pub(crate) fn entry<'a>(doc: &'a Document, map_name: &str, field: &str) -> Option<&'a str> {
    doc.get(map_name)?.get(field)?.as_str()
}

/// Field names recorded in a sidecar map.
pub(crate) fn entry_names(doc: &Document, map_name: &str) -> Vec<String> {
    match doc.get(map_name) {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SALT: &str = "vZYt@CAkuMKB9Z#SHZF4d7puRt!MhCiK";

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_detect_direct() {
        let options = EncryptionOptions::new(["email"], SALT);
        let record = doc(json!({
            "email": "abc123",
            "hashField": { "email": "digest" },
            "ivField": { "email": "0011" },
        }));

        let presence = SidecarPresence::detect(&record, &options);
        assert!(presence.direct());
        assert!(presence.nested().is_empty());
        assert!(!presence.is_absent());
    }

    #[test]
    fn test_detect_nested_declared_only() {
        let options = EncryptionOptions::new(["email"], SALT).with_nested(["owner"]);
        let record = doc(json!({
            "owner": { "email": "abc123", "hashField": { "email": "digest" } },
            "stray": { "hashField": { "email": "digest" } },
        }));

        let presence = SidecarPresence::detect(&record, &options);
        assert!(!presence.direct());
        // "stray" carries a sidecar but is not declared, so it is not reported
        assert_eq!(presence.nested(), ["owner"]);
    }

    #[test]
    fn test_detect_direct_and_nested() {
        let options = EncryptionOptions::new(["email"], SALT).with_nested(["owner"]);
        let record = doc(json!({
            "hashField": { "email": "digest" },
            "owner": { "hashField": { "email": "digest" } },
        }));

        let presence = SidecarPresence::detect(&record, &options);
        assert!(presence.direct());
        assert_eq!(presence.nested(), ["owner"]);
    }

    #[test]
    fn test_detect_absent() {
        let options = EncryptionOptions::new(["email"], SALT).with_nested(["owner"]);
        let record = doc(json!({
            "email": "plain@example.com",
            "owner": { "name": "no sidecar here" },
        }));

        let presence = SidecarPresence::detect(&record, &options);
        assert!(presence.is_absent());
    }

    #[test]
    fn test_detect_ignores_non_object_nested() {
        let options = EncryptionOptions::new(["email"], SALT).with_nested(["owner"]);
        let record = doc(json!({ "owner": "just a string" }));

        let presence = SidecarPresence::detect(&record, &options);
        assert!(presence.is_absent());
    }

    #[test]
    fn test_insert_entry_creates_map() {
        let mut record = doc(json!({}));
        insert_entry(&mut record, "hashField", "email", "digest".to_string());

        assert_eq!(record["hashField"]["email"], "digest");
    }

    #[test]
    fn test_entry_lookup() {
        let record = doc(json!({ "ivField": { "email": "00ff" } }));

        assert_eq!(entry(&record, "ivField", "email"), Some("00ff"));
        assert_eq!(entry(&record, "ivField", "phone"), None);
        assert_eq!(entry(&record, "missing", "email"), None);
    }

    #[test]
    fn test_entry_names() {
        let record = doc(json!({ "hashField": { "email": "a", "phone": "b" } }));

        let mut names = entry_names(&record, "hashField");
        names.sort();
        assert_eq!(names, ["email", "phone"]);
    }
}
