//! Basic usage example for `GizliDB`.

use gizlidb::prelude::*;
use gizlidb_memstore::MemoryCollection;
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("GizliDB Basic Usage Example");
    println!("============================\n");

    // Configure the encrypted field set
    let options = EncryptionOptions::new(["email", "phone"], "vZYt@CAkuMKB9Z#SHZF4d7puRt!MhCiK");
    println!("Encrypted fields: {:?}", options.fields());
    println!("Algorithm: {}\n", options.algorithm());

    // Create an in-memory collection driving the encryption pipeline
    let users = MemoryCollection::new(options)?;
    println!("✓ Collection created\n");

    // Insert a document; the caller keeps seeing plaintext
    let alice: Document = serde_json::from_value(json!({
        "name": "Alice",
        "email": "alice@example.com",
        "phone": "555-0100",
    }))?;
    let created = users.insert_one(alice)?;
    println!("Inserted: {}", serde_json::to_string(&created)?);

    // The stored row holds ciphertext plus the sidecar maps
    let raw = &users.raw_rows()[0];
    println!("Stored email field: {}", raw["email"]);
    println!("Stored hash sidecar: {}\n", raw["hashField"]);

    // Query by plaintext equality; the filter is rewritten to the hash sidecar
    let filter: Document = serde_json::from_value(json!({ "email": "alice@example.com" }))?;
    let found = users.find(filter, None)?;
    println!("✓ Found {} document(s) by encrypted equality", found.len());
    println!("Decrypted email: {}\n", found[0]["email"]);

    // The outward representation hides the bookkeeping
    let view = users.external(&created);
    println!("Outward view: {}", serde_json::to_string(&view)?);
    assert!(view.get("hashField").is_none());
    assert!(view.get("ivField").is_none());
    println!("✓ Sidecar maps stripped from the outward view\n");

    // Deterministic digests make repeated writes of a value findable
    let digest1 = searchable_digest("alice@example.com");
    let digest2 = searchable_digest("alice@example.com");
    assert_eq!(digest1, digest2);
    println!("Searchable digest: {digest1}");
    println!("✓ Deterministic digest verified\n");

    println!("============================");
    println!("All operations successful! 🎉");

    Ok(())
}
