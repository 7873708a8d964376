//! Embedded tag tables.
//!
//! Every image yields one [`MetadataMap`]: tag name (`"DateTime"`, `"Make"`,
//! `"Model"`, ...) to [`TagValue`]. The map is produced once by the backend's
//! `read_metadata` and never mutated afterwards. Jobs that need to add derived
//! variables (the resolved `DateTime`) work on a clone.
//!
//! ## Value coercion
//!
//! Templates only ever see strings, so every value has a [`Display`](fmt::Display)
//! form:
//!
//! | Variant | Rendered as |
//! |---|---|
//! | `Text` | the string itself |
//! | `Integer` | decimal |
//! | `Bytes` | the bytes as text when they are printable ASCII, otherwise `<N bytes>` |

use std::collections::BTreeMap;
use std::fmt;

/// A single tag value as read from the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Bytes(Vec<u8>),
}

impl TagValue {
    /// The value when it is textual, `None` for integers and raw bytes.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Text(s) => f.write_str(s),
            TagValue::Integer(n) => write!(f, "{n}"),
            TagValue::Bytes(bytes) => {
                let trimmed = trim_trailing_nuls(bytes);
                if !trimmed.is_empty() && trimmed.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
                {
                    // Printable ASCII is valid UTF-8
                    f.write_str(&String::from_utf8_lossy(trimmed))
                } else {
                    write!(f, "<{} bytes>", bytes.len())
                }
            }
        }
    }
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    &bytes[..end]
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Integer(value)
    }
}

impl From<Vec<u8>> for TagValue {
    fn from(value: Vec<u8>) -> Self {
        TagValue::Bytes(value)
    }
}

/// Tag name → value for one image.
///
/// Backed by a `BTreeMap` so dumps list tags in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    tags: BTreeMap<String, TagValue>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.tags.get(name)
    }

    /// Textual value of a tag, `None` when absent or not text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(TagValue::as_text)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Set a tag, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TagValue>) {
        self.tags.insert(name.into(), value.into());
    }

    /// Set a tag only if it is not present yet. Returns whether it was inserted.
    ///
    /// Extraction walks IFDs in file order; the first occurrence of a tag wins.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<TagValue>) -> bool {
        let name = name.into();
        if self.tags.contains_key(&name) {
            return false;
        }
        self.tags.insert(name, value.into());
        true
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<TagValue>> FromIterator<(K, V)> for MetadataMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MetadataMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// `{Make: Canon, Model: EOS 5D}`
impl fmt::Display for MetadataMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // TagValue display
    // =========================================================================

    #[test]
    fn text_displays_verbatim() {
        assert_eq!(TagValue::from("Canon").to_string(), "Canon");
    }

    #[test]
    fn integer_displays_decimal() {
        assert_eq!(TagValue::Integer(72).to_string(), "72");
        assert_eq!(TagValue::Integer(-3).to_string(), "-3");
    }

    #[test]
    fn printable_bytes_display_as_text() {
        assert_eq!(TagValue::Bytes(b"0230".to_vec()).to_string(), "0230");
    }

    #[test]
    fn trailing_nuls_are_ignored() {
        assert_eq!(TagValue::Bytes(b"ASCII\0\0".to_vec()).to_string(), "ASCII");
    }

    #[test]
    fn binary_bytes_display_as_length() {
        assert_eq!(
            TagValue::Bytes(vec![0x01, 0xff, 0x00]).to_string(),
            "<3 bytes>"
        );
        assert_eq!(TagValue::Bytes(Vec::new()).to_string(), "<0 bytes>");
    }

    // =========================================================================
    // MetadataMap
    // =========================================================================

    #[test]
    fn text_lookup_ignores_non_text_values() {
        let map: MetadataMap = [
            ("Make", TagValue::from("Canon")),
            ("XResolution", TagValue::Integer(72)),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.text("Make"), Some("Canon"));
        assert_eq!(map.text("XResolution"), None);
        assert_eq!(map.text("Missing"), None);
    }

    #[test]
    fn insert_if_absent_keeps_first_value() {
        let mut map = MetadataMap::new();
        assert!(map.insert_if_absent("DateTime", "2019:01:16 11:11:15"));
        assert!(!map.insert_if_absent("DateTime", "2020:01:01 00:00:00"));
        assert_eq!(map.text("DateTime"), Some("2019:01:16 11:11:15"));
    }

    #[test]
    fn insert_replaces_value() {
        let mut map = MetadataMap::new();
        map.insert("DateTime", "2019:01:16 11:11:15");
        map.insert("DateTime", "");
        assert_eq!(map.text("DateTime"), Some(""));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn display_lists_tags_sorted() {
        let map: MetadataMap = [("Model", "EOS 5D"), ("Make", "Canon")]
            .into_iter()
            .collect();
        assert_eq!(map.to_string(), "{Make: Canon, Model: EOS 5D}");
    }

    #[test]
    fn display_empty_map() {
        assert_eq!(MetadataMap::new().to_string(), "{}");
        assert!(MetadataMap::new().is_empty());
    }
}
