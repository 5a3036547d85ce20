//! Content hashing: response identity and weak validators.

use sha2::{Digest, Sha256};

use crate::domain::data::DataValue;

/// Streaming, order-sensitive hash accumulator.
///
/// Every chunk is length-prefixed, so `update("ab").update("c")` and
/// `update("a").update("bc")` produce different digests.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        let bytes = chunk.as_ref();
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Lowercase hex digest, stable across processes and URL-safe.
    pub fn digest(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

enum Frame<'a> {
    Visit(&'a DataValue),
    Key(&'a str),
    Close(&'static str),
}

/// Hash a data value structurally.
///
/// Record keys are visited in sorted order and every value is tagged with its kind.
/// Shared references are tracked by identity: a reference seen before emits a
/// back-reference to its first-visit index instead of being walked again, which
/// keeps cyclic data finite. The walk uses an explicit stack.
pub fn hash_data(value: &DataValue) -> String {
    let mut hasher = ContentHasher::new();
    let mut seen: Vec<usize> = Vec::new();
    let mut stack = vec![Frame::Visit(value)];

    while let Some(frame) = stack.pop() {
        let current = match frame {
            Frame::Close(marker) => {
                hasher.update(marker);
                continue;
            }
            Frame::Key(key) => {
                hasher.update("key").update(key);
                continue;
            }
            Frame::Visit(current) => current,
        };

        hasher.update(current.kind());
        match current {
            DataValue::Null => {}
            DataValue::Bool(flag) => {
                hasher.update(if *flag { "true" } else { "false" });
            }
            DataValue::Int(number) => {
                hasher.update(number.to_string());
            }
            DataValue::Float(number) => {
                hasher.update(number.to_string());
            }
            DataValue::String(text) => {
                hasher.update(text);
            }
            DataValue::Date(date) => {
                hasher.update(date.unix_timestamp_nanos().to_string());
            }
            DataValue::List(items) => {
                hasher.update("[");
                stack.push(Frame::Close("]"));
                stack.extend(items.iter().rev().map(Frame::Visit));
            }
            DataValue::Record(fields) => {
                hasher.update("{");
                stack.push(Frame::Close("}"));
                // BTreeMap iterates in key order; pushed reversed so keys pop ascending.
                for (key, field) in fields.iter().rev() {
                    stack.push(Frame::Visit(field));
                    stack.push(Frame::Key(key));
                }
            }
            DataValue::Shared(shared) => {
                let identity = shared.identity();
                if let Some(index) = seen.iter().position(|id| *id == identity) {
                    hasher.update("backref").update(index.to_string());
                } else {
                    seen.push(identity);
                    match shared.get() {
                        Some(inner) => stack.push(Frame::Visit(inner)),
                        None => {
                            hasher.update("unset");
                        }
                    }
                }
            }
        }
    }

    hasher.digest()
}

/// Identity of a materialized response. Wall-clock time never participates.
pub fn content_hash(
    data_hash: &str,
    path: &str,
    module_id: &str,
    build_config_id: &str,
) -> String {
    let mut hasher = ContentHasher::new();
    hasher
        .update(data_hash)
        .update(path)
        .update(module_id)
        .update(build_config_id);
    hasher.digest()
}

/// Weak `ETag` value for a response body.
pub fn weak_etag(body: impl AsRef<[u8]>) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(body);
    let digest = hasher.digest();
    format!("W/\"{}\"", &digest[..32])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::domain::data::SharedValue;

    #[test]
    fn update_is_order_sensitive() {
        let mut ab = ContentHasher::new();
        ab.update("a").update("b");
        let mut ba = ContentHasher::new();
        ba.update("b").update("a");
        assert_ne!(ab.digest(), ba.digest());
    }

    #[test]
    fn chunk_boundaries_are_part_of_the_digest() {
        let mut left = ContentHasher::new();
        left.update("ab").update("c");
        let mut right = ContentHasher::new();
        right.update("a").update("bc");
        assert_ne!(left.digest(), right.digest());
    }

    #[test]
    fn digest_is_url_safe() {
        let mut hasher = ContentHasher::new();
        hasher.update("anything");
        let digest = hasher.digest();
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn equal_structures_hash_equally_regardless_of_insertion_order() {
        let mut first = BTreeMap::new();
        first.insert("b".to_string(), DataValue::Int(2));
        first.insert("a".to_string(), DataValue::Int(1));
        let mut second = BTreeMap::new();
        second.insert("a".to_string(), DataValue::Int(1));
        second.insert("b".to_string(), DataValue::Int(2));
        assert_eq!(
            hash_data(&DataValue::Record(first)),
            hash_data(&DataValue::Record(second))
        );
    }

    #[test]
    fn kind_tags_separate_lookalike_values() {
        assert_ne!(
            hash_data(&DataValue::from("1")),
            hash_data(&DataValue::Int(1))
        );
        assert_ne!(
            hash_data(&DataValue::from(json!([["a"], "b"]))),
            hash_data(&DataValue::from(json!([["a", "b"]])))
        );
        assert_ne!(
            hash_data(&DataValue::from(json!({"a": {"b": 1}}))),
            hash_data(&DataValue::from(json!({"a": {}, "b": 1})))
        );
    }

    fn cyclic(label: &str) -> DataValue {
        let slot = SharedValue::empty();
        let node = DataValue::record([
            ("label", DataValue::from(label)),
            ("self", DataValue::Shared(slot.clone())),
        ]);
        slot.set(node).expect("slot starts empty");
        DataValue::Shared(slot)
    }

    #[test]
    fn cyclic_values_terminate_and_hash_by_structure() {
        assert_eq!(hash_data(&cyclic("x")), hash_data(&cyclic("x")));
        assert_ne!(hash_data(&cyclic("x")), hash_data(&cyclic("y")));
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut value = DataValue::Null;
        for _ in 0..100_000 {
            value = DataValue::List(vec![value]);
        }
        let digest = hash_data(&value);
        assert_eq!(digest.len(), 64);
        // Dropping a 100k-deep Vec chain recurses; unwind it iteratively.
        while let DataValue::List(mut items) = value {
            value = items.pop().unwrap_or_default();
        }
    }

    #[test]
    fn content_hash_is_sensitive_to_every_input() {
        let base = content_hash("data", "/x", "module", "config");
        assert_eq!(base, content_hash("data", "/x", "module", "config"));
        assert_ne!(base, content_hash("data", "/y", "module", "config"));
        assert_ne!(base, content_hash("data", "/x", "other", "config"));
        assert_ne!(base, content_hash("data", "/x", "module", "other"));
        assert_ne!(base, content_hash("other", "/x", "module", "config"));
    }

    #[test]
    fn weak_etag_format() {
        let etag = weak_etag("<p>x</p>");
        assert!(etag.starts_with("W/\""));
        assert!(etag.ends_with('"'));
        assert_eq!(etag, weak_etag("<p>x</p>"));
        assert_ne!(etag, weak_etag("<p>y</p>"));
    }
}
