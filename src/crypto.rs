//! Hashing primitives for RageChain
//!
//! Blocks are fingerprinted over a canonical JSON form: compact separators and
//! object keys emitted in lexicographic order at every nesting level. The
//! ordering is enforced by [`Canonical`] itself, so the digest does not depend
//! on struct field order or on `serde_json`'s `preserve_order` feature.

use crate::error::ChainError;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    hex::encode(hasher.finalize())
}

/// Hash of reported content. Content is never stored in plaintext on chain.
pub fn content_hash(content: &str) -> String {
    sha256_hex(content.as_bytes())
}

/// Serializes any value to its canonical JSON string.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ChainError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&Canonical(&value))?)
}

/// SHA-256 over the canonical JSON form of `value`.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<String, ChainError> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Serializes a JSON value with object keys sorted.
pub struct Canonical<'a>(pub &'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [ {"y": 2, "x": 1} ], "c": null}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":{"c":null,"z":[{"x":1,"y":2}]},"b":1}"#
        );
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("index".into(), json!(2));
        first.insert("proof".into(), json!(35293));
        let mut second = serde_json::Map::new();
        second.insert("proof".into(), json!(35293));
        second.insert("index".into(), json!(2));

        assert_eq!(
            hash_canonical(&Value::Object(first)).unwrap(),
            hash_canonical(&Value::Object(second)).unwrap()
        );
    }
}
