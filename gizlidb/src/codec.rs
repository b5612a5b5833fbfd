//! Field codec: translates between plaintext documents and their stored
//! encrypted layout.
//!
//! The codec owns one immutable [`EncryptionOptions`] and performs every
//! per-field transformation: encrypting values into ciphertext plus sidecar
//! entries, and decrypting stored values back using their recorded IVs. All
//! operations are pure transformations on in-memory documents; persistence
//! belongs to the storage collaborator.

use serde_json::{Map, Value};

use crate::cipher::{self, IV_SIZE};
use crate::config::EncryptionOptions;
use crate::digest::searchable_digest;
use crate::error::{CryptoError, Error};
use crate::sidecar;
use crate::Document;

/// Minimum hex length of a usable IV entry. Shorter entries are treated as
/// absent and the stored value passes through undecrypted.
pub const MIN_IV_HEX_LEN: usize = IV_SIZE * 2;

/// One encrypted field value: the ciphertext that goes in the field's own
/// slot plus the two sidecar entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedField {
    /// Hex-encoded ciphertext stored in the field's own slot.
    pub ciphertext: String,

    /// Hex-encoded 16-byte IV for the IV sidecar.
    pub iv: String,

    /// Base64 searchable digest for the hash sidecar.
    pub hash: String,
}

/// Encodes and decodes the configured field set of a document.
pub struct FieldCodec {
    options: EncryptionOptions,
}

impl FieldCodec {
    /// Creates a codec, validating the options first.
    ///
    /// # Errors
    ///
    /// Returns error if the field list is empty or the salt is shorter than
    /// 32 bytes.
    pub fn new(options: EncryptionOptions) -> Result<Self, Error> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The codec's configuration.
    #[must_use]
    pub const fn options(&self) -> &EncryptionOptions {
        &self.options
    }

    /// Encodes one plaintext value into its stored triple.
    ///
    /// Empty values are not encrypted and produce no sidecar entries;
    /// `None` is returned for them.
    ///
    /// # Errors
    ///
    /// Returns error if the cipher key derived from the salt is invalid.
    pub fn encode_value(&self, plaintext: &str) -> Result<Option<EncodedField>, Error> {
        if plaintext.is_empty() {
            return Ok(None);
        }

        let key = self.options.cipher_key();
        let (iv, ciphertext) = cipher::encrypt(plaintext, &key, self.options.algorithm())?;

        Ok(Some(EncodedField {
            ciphertext: hex::encode(ciphertext),
            iv: hex::encode(iv),
            hash: searchable_digest(plaintext),
        }))
    }

    /// Decodes one stored value using its recorded IV.
    ///
    /// Pass-through rules (the stored value comes back unchanged): the value
    /// is not a string, the IV is absent, or the IV is shorter than
    /// [`MIN_IV_HEX_LEN`] hex characters. These guard records written before
    /// encryption was enabled and records with missing sidecars.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The IV or ciphertext is not valid hex
    /// - The decoded IV has the wrong length
    /// - CBC unpadding fails
    /// - The decrypted bytes are not valid UTF-8
    pub fn decode_value(&self, stored: &Value, iv: Option<&str>) -> Result<Value, Error> {
        let Value::String(ciphertext) = stored else {
            return Ok(stored.clone());
        };
        let Some(iv) = iv else {
            return Ok(stored.clone());
        };
        if iv.len() < MIN_IV_HEX_LEN {
            return Ok(stored.clone());
        }

        let iv = hex::decode(iv).map_err(|e| CryptoError::MalformedIv(e.to_string()))?;
        let ciphertext =
            hex::decode(ciphertext).map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))?;

        let key = self.options.cipher_key();
        let plaintext = cipher::decrypt(&iv, &ciphertext, &key, self.options.algorithm())?;
        Ok(Value::String(plaintext))
    }

    /// Encodes every configured field of a document for the create path.
    ///
    /// Fresh empty sidecar maps are installed first, replacing whatever the
    /// caller may have put there, so the stored layout always carries both
    /// maps. Each non-empty string field is then encrypted in declaration
    /// order; non-string and absent fields are left alone and get no sidecar
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns error if any field fails to encrypt.
    pub fn encode_document(&self, doc: &mut Document) -> Result<(), Error> {
        doc.insert(self.options.hash_field().to_owned(), Value::Object(Map::new()));
        doc.insert(self.options.iv_field().to_owned(), Value::Object(Map::new()));

        for field in self.options.fields() {
            let plaintext = match doc.get(field.as_str()) {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                _ => continue,
            };

            if let Some(encoded) = self.encode_value(&plaintext)? {
                sidecar::insert_entry(doc, self.options.hash_field(), field, encoded.hash);
                sidecar::insert_entry(doc, self.options.iv_field(), field, encoded.iv);
                doc.insert(field.clone(), Value::String(encoded.ciphertext));
            }
        }
        Ok(())
    }

    /// Encodes configured fields inside an update payload.
    ///
    /// Direct assignments and assignments under the `$set` operator are
    /// rewritten in place. Sidecar entries are written as dotted paths
    /// (`hashField.email`) next to the assignment, so the write engine
    /// updates the stored maps member-wise instead of replacing them.
    /// Fields absent from the payload are never touched.
    ///
    /// # Errors
    ///
    /// Returns error if any assigned field fails to encrypt.
    pub fn encode_update(&self, update: &mut Document) -> Result<(), Error> {
        for field in self.options.fields() {
            let hash_path = format!("{}.{field}", self.options.hash_field());
            let iv_path = format!("{}.{field}", self.options.iv_field());

            // Direct assignment at the payload's top level
            if let Some(Value::String(plaintext)) = update.get(field.as_str()) {
                if !plaintext.is_empty() {
                    let plaintext = plaintext.clone();
                    if let Some(encoded) = self.encode_value(&plaintext)? {
                        update.insert(hash_path, Value::String(encoded.hash));
                        update.insert(iv_path, Value::String(encoded.iv));
                        update.insert(field.clone(), Value::String(encoded.ciphertext));
                    }
                    continue;
                }
            }

            // Assignment through the $set operator
            let encoded = match update.get("$set") {
                Some(Value::Object(set)) => match set.get(field.as_str()) {
                    Some(Value::String(plaintext)) if !plaintext.is_empty() => {
                        self.encode_value(&plaintext.clone())?
                    }
                    _ => None,
                },
                _ => None,
            };

            if let Some(encoded) = encoded {
                if let Some(Value::Object(set)) = update.get_mut("$set") {
                    set.insert(hash_path, Value::String(encoded.hash));
                    set.insert(iv_path, Value::String(encoded.iv));
                    set.insert(field.clone(), Value::String(encoded.ciphertext));
                }
            }
        }
        Ok(())
    }

    /// Decodes every configured field of a document in place.
    ///
    /// Absent, null, and empty-string fields are skipped. Everything else
    /// goes through the pass-through rules of [`Self::decode_value`].
    ///
    /// # Errors
    ///
    /// Returns error if any stored value fails to decrypt.
    pub fn decode_document(&self, doc: &mut Document) -> Result<(), Error> {
        for field in self.options.fields() {
            let stored = match doc.get(field.as_str()) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) if s.is_empty() => continue,
                Some(value) => value.clone(),
            };

            let iv = sidecar::entry(doc, self.options.iv_field(), field).map(str::to_owned);
            let decoded = self.decode_value(&stored, iv.as_deref())?;
            doc.insert(field.clone(), decoded);
        }
        Ok(())
    }

    /// Decodes the fields named by a record's own hash sidecar, then removes
    /// both sidecar maps.
    ///
    /// Aggregation rows name their fields this way because a row may be a
    /// projection or join whose shape differs from the configured field set.
    ///
    /// # Errors
    ///
    /// Returns error if any named field fails to decrypt.
    pub fn decode_sidecar_fields(&self, doc: &mut Document) -> Result<(), Error> {
        for field in sidecar::entry_names(doc, self.options.hash_field()) {
            let Some(stored) = doc.get(field.as_str()).cloned() else {
                continue;
            };

            let iv = sidecar::entry(doc, self.options.iv_field(), &field).map(str::to_owned);
            let decoded = self.decode_value(&stored, iv.as_deref())?;
            doc.insert(field, decoded);
        }

        doc.remove(self.options.hash_field());
        doc.remove(self.options.iv_field());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::Algorithm;
    use proptest::prelude::*;
    use serde_json::json;

    const SALT: &str = "vZYt@CAkuMKB9Z#SHZF4d7puRt!MhCiK";

    fn codec() -> FieldCodec {
        FieldCodec::new(EncryptionOptions::new(["email", "phone"], SALT)).unwrap()
    }

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_codec_rejects_invalid_options() {
        let result = FieldCodec::new(EncryptionOptions::new(["email"], "short"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_encode_value_produces_triple() {
        let codec = codec();
        let encoded = codec.encode_value("alice@example.com").unwrap().unwrap();

        // 16-byte IV as 32 hex characters
        assert_eq!(encoded.iv.len(), 32);
        assert!(hex::decode(&encoded.iv).is_ok());
        assert!(hex::decode(&encoded.ciphertext).is_ok());
        assert_eq!(encoded.hash, searchable_digest("alice@example.com"));
    }

    #[test]
    fn test_encode_value_empty_is_none() {
        let codec = codec();
        assert!(codec.encode_value("").unwrap().is_none());
    }

    #[test]
    fn test_encode_value_randomizes_ciphertext_not_hash() {
        let codec = codec();
        let first = codec.encode_value("same").unwrap().unwrap();
        let second = codec.encode_value("same").unwrap().unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn test_decode_value_round_trip() {
        let codec = codec();
        let encoded = codec.encode_value("alice@example.com").unwrap().unwrap();

        let decoded = codec
            .decode_value(&Value::String(encoded.ciphertext), Some(&encoded.iv))
            .unwrap();
        assert_eq!(decoded, Value::String("alice@example.com".to_string()));
    }

    #[test]
    fn test_decode_value_passes_through_non_string() {
        let codec = codec();
        let stored = json!(42);
        assert_eq!(codec.decode_value(&stored, Some("00".repeat(16).as_str())).unwrap(), stored);
    }

    #[test]
    fn test_decode_value_passes_through_missing_iv() {
        let codec = codec();
        let stored = Value::String("not actually encrypted".to_string());
        assert_eq!(codec.decode_value(&stored, None).unwrap(), stored);
    }

    #[test]
    fn test_decode_value_passes_through_short_iv() {
        let codec = codec();
        let stored = Value::String("deadbeef".to_string());
        assert_eq!(codec.decode_value(&stored, Some("00ff")).unwrap(), stored);
    }

    #[test]
    fn test_decode_value_rejects_malformed_iv_hex() {
        let codec = codec();
        let stored = Value::String("deadbeef".to_string());
        let bad_iv = "zz".repeat(16);

        let result = codec.decode_value(&stored, Some(&bad_iv));
        assert!(matches!(result, Err(Error::Crypto(CryptoError::MalformedIv(_)))));
    }

    #[test]
    fn test_decode_value_rejects_malformed_ciphertext_hex() {
        let codec = codec();
        let stored = Value::String("not hex at all!".to_string());
        let iv = "00".repeat(16);

        let result = codec.decode_value(&stored, Some(&iv));
        assert!(matches!(result, Err(Error::Crypto(CryptoError::MalformedCiphertext(_)))));
    }

    #[test]
    fn test_encode_document_installs_sidecars() {
        let codec = codec();
        let mut record = doc(json!({ "name": "Alice", "email": "alice@example.com" }));
        codec.encode_document(&mut record).unwrap();

        // Field replaced with hex ciphertext
        let stored = record["email"].as_str().unwrap();
        assert_ne!(stored, "alice@example.com");
        assert!(hex::decode(stored).is_ok());

        // Sidecar entries for the encrypted field only
        assert_eq!(
            record["hashField"]["email"],
            Value::String(searchable_digest("alice@example.com"))
        );
        assert_eq!(record["ivField"]["email"].as_str().unwrap().len(), 32);
        assert!(record["hashField"].get("phone").is_none());

        // Undeclared field untouched
        assert_eq!(record["name"], "Alice");
    }

    #[test]
    fn test_encode_document_always_installs_empty_maps() {
        let codec = codec();
        let mut record = doc(json!({ "name": "nothing to encrypt" }));
        codec.encode_document(&mut record).unwrap();

        assert_eq!(record["hashField"], json!({}));
        assert_eq!(record["ivField"], json!({}));
    }

    #[test]
    fn test_encode_document_replaces_caller_sidecars() {
        let codec = codec();
        let mut record = doc(json!({ "hashField": { "email": "forged" } }));
        codec.encode_document(&mut record).unwrap();

        assert_eq!(record["hashField"], json!({}));
    }

    #[test]
    fn test_encode_document_skips_non_string_field() {
        let codec = codec();
        let mut record = doc(json!({ "email": 123 }));
        codec.encode_document(&mut record).unwrap();

        assert_eq!(record["email"], 123);
        assert_eq!(record["hashField"], json!({}));
        assert_eq!(record["ivField"], json!({}));
    }

    #[test]
    fn test_encode_decode_document_round_trip() {
        let codec = codec();
        let mut record =
            doc(json!({ "email": "alice@example.com", "phone": "555-0100", "age": 30 }));

        codec.encode_document(&mut record).unwrap();
        codec.decode_document(&mut record).unwrap();

        assert_eq!(record["email"], "alice@example.com");
        assert_eq!(record["phone"], "555-0100");
        assert_eq!(record["age"], 30);
    }

    #[test]
    fn test_decode_document_passes_through_unencrypted_record() {
        let codec = codec();
        let mut record = doc(json!({ "email": "written@before.encryption" }));
        codec.decode_document(&mut record).unwrap();

        assert_eq!(record["email"], "written@before.encryption");
    }

    #[test]
    fn test_decode_document_skips_null_and_empty() {
        let codec = codec();
        let mut record = doc(json!({ "email": null, "phone": "" }));
        codec.decode_document(&mut record).unwrap();

        assert_eq!(record["email"], Value::Null);
        assert_eq!(record["phone"], "");
    }

    #[test]
    fn test_encode_update_direct_assignment() {
        let codec = codec();
        let mut update = doc(json!({ "email": "new@example.com" }));
        codec.encode_update(&mut update).unwrap();

        let stored = update["email"].as_str().unwrap();
        assert_ne!(stored, "new@example.com");
        assert_eq!(
            update["hashField.email"],
            Value::String(searchable_digest("new@example.com"))
        );
        assert_eq!(update["ivField.email"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn test_encode_update_set_operator() {
        let codec = codec();
        let mut update = doc(json!({ "$set": { "email": "new@example.com", "age": 31 } }));
        codec.encode_update(&mut update).unwrap();

        let set = update["$set"].as_object().unwrap();
        assert_ne!(set["email"], "new@example.com");
        assert_eq!(
            set["hashField.email"],
            Value::String(searchable_digest("new@example.com"))
        );
        assert_eq!(set["ivField.email"].as_str().unwrap().len(), 32);

        // Untouched members of the same $set survive
        assert_eq!(set["age"], 31);

        // Nothing leaked to the payload's top level
        assert!(update.get("email").is_none());
        assert!(update.get("hashField.email").is_none());
    }

    #[test]
    fn test_encode_update_ignores_unrelated_payload() {
        let codec = codec();
        let mut update = doc(json!({ "name": "Alice", "$inc": { "age": 1 } }));
        let before = update.clone();
        codec.encode_update(&mut update).unwrap();

        assert_eq!(update, before);
    }

    #[test]
    fn test_encode_update_skips_empty_assignment() {
        let codec = codec();
        let mut update = doc(json!({ "email": "" }));
        let before = update.clone();
        codec.encode_update(&mut update).unwrap();

        assert_eq!(update, before);
    }

    #[test]
    fn test_decode_sidecar_fields_strips_maps() {
        let codec = codec();
        let mut record = doc(json!({ "email": "alice@example.com", "age": 30 }));
        codec.encode_document(&mut record).unwrap();

        codec.decode_sidecar_fields(&mut record).unwrap();

        assert_eq!(record["email"], "alice@example.com");
        assert_eq!(record["age"], 30);
        assert!(record.get("hashField").is_none());
        assert!(record.get("ivField").is_none());
    }

    #[test]
    fn test_decode_sidecar_fields_ignores_missing_field() {
        let codec = codec();
        let mut record = doc(json!({
            // Sidecar names a field the projection dropped
            "hashField": { "email": "digest" },
            "ivField": { "email": "00".repeat(16) },
            "age": 30,
        }));

        codec.decode_sidecar_fields(&mut record).unwrap();

        assert_eq!(record["age"], 30);
        assert!(record.get("hashField").is_none());
    }

    #[test]
    fn test_cbc_codec_round_trip() {
        let codec = FieldCodec::new(
            EncryptionOptions::new(["email"], SALT).with_algorithm(Algorithm::Aes256Cbc),
        )
        .unwrap();

        let mut record = doc(json!({ "email": "alice@example.com" }));
        codec.encode_document(&mut record).unwrap();
        codec.decode_document(&mut record).unwrap();

        assert_eq!(record["email"], "alice@example.com");
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(plaintext in ".{1,64}") {
            let codec = codec();
            let encoded = codec.encode_value(&plaintext).unwrap().unwrap();
            let decoded = codec
                .decode_value(&Value::String(encoded.ciphertext), Some(&encoded.iv))
                .unwrap();
            prop_assert_eq!(decoded, Value::String(plaintext));
        }
    }
}
