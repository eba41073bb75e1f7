//! JSON header schema for the control sub-protocol.
//!
//! Counters cross the wire as decimal strings because JSON gives no 64-bit
//! integer guarantee; peers on the other side may round anything past 2^53.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// First packet of every transfer, sender to receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferHeader {
    /// Sending device's self-reported name. May be empty.
    #[serde(default)]
    pub name: String,
    /// Number of items in the bundle.
    #[serde(with = "u64_string")]
    pub count: u64,
    /// Sum of all item sizes in bytes.
    #[serde(with = "u64_string")]
    pub size: u64,
}

/// Serde adapter encoding a `u64` as a decimal string.
///
/// Decoding also accepts a bare JSON number for tolerance with peers that
/// never grew past 32-bit sizes.
pub mod u64_string {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        value.to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Number(u64),
        }

        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}

/// Derives the item type tag from an item-header object.
///
/// Legacy peers omit `type`; for those headers the presence of a `directory`
/// key means `"directory"`, anything else means `"file"`. This is the only
/// backward-compatibility concession in the protocol.
pub fn derive_item_type(properties: &Map<String, Value>) -> String {
    match properties.get("type").and_then(Value::as_str) {
        Some(t) => t.to_string(),
        None => {
            if properties.contains_key("directory") {
                "directory".to_string()
            } else {
                "file".to_string()
            }
        }
    }
}

/// Reads a `u64` field that may be encoded as a decimal string or a number.
pub fn u64_field(properties: &Map<String, Value>, key: &str) -> Option<u64> {
    match properties.get(key)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Reads a string field from an item-header object.
pub fn str_field<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    properties.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_header_counters_serialize_as_strings() {
        let header = TransferHeader {
            name: "laptop".into(),
            count: 3,
            size: 1024,
        };
        let json = serde_json::to_string(&header).unwrap();
        assert!(json.contains("\"count\":\"3\""));
        assert!(json.contains("\"size\":\"1024\""));
    }

    #[test]
    fn transfer_header_roundtrip() {
        let header = TransferHeader {
            name: "desktop".into(),
            count: 2,
            size: 9_000_000_000,
        };
        let json = serde_json::to_string(&header).unwrap();
        let parsed: TransferHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn transfer_header_survives_64_bit_sizes() {
        // Past 2^53, a JSON number would lose precision.
        let size = (1u64 << 53) + 7;
        let json = format!(r#"{{"name":"","count":"1","size":"{size}"}}"#);
        let parsed: TransferHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.size, size);
    }

    #[test]
    fn transfer_header_accepts_numeric_counters() {
        let json = r#"{"name":"old peer","count":2,"size":300}"#;
        let parsed: TransferHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.count, 2);
        assert_eq!(parsed.size, 300);
    }

    #[test]
    fn transfer_header_missing_name_defaults_empty() {
        let json = r#"{"count":"0","size":"0"}"#;
        let parsed: TransferHeader = serde_json::from_str(&json).unwrap();
        assert!(parsed.name.is_empty());
    }

    #[test]
    fn transfer_header_rejects_non_numeric_count() {
        let json = r#"{"name":"x","count":"many","size":"0"}"#;
        assert!(serde_json::from_str::<TransferHeader>(json).is_err());
    }

    fn props(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn derive_type_uses_explicit_tag() {
        let p = props(r#"{"type":"widget","name":"w"}"#);
        assert_eq!(derive_item_type(&p), "widget");
    }

    #[test]
    fn derive_type_legacy_directory() {
        let p = props(r#"{"name":"d","directory":true}"#);
        assert_eq!(derive_item_type(&p), "directory");
    }

    #[test]
    fn derive_type_legacy_file() {
        let p = props(r#"{"name":"f","size":"10"}"#);
        assert_eq!(derive_item_type(&p), "file");
    }

    #[test]
    fn u64_field_reads_string_and_number() {
        let p = props(r#"{"a":"42","b":42,"c":"x","d":true}"#);
        assert_eq!(u64_field(&p, "a"), Some(42));
        assert_eq!(u64_field(&p, "b"), Some(42));
        assert_eq!(u64_field(&p, "c"), None);
        assert_eq!(u64_field(&p, "d"), None);
        assert_eq!(u64_field(&p, "missing"), None);
    }

    #[test]
    fn str_field_reads_strings_only() {
        let p = props(r#"{"name":"a.txt","size":5}"#);
        assert_eq!(str_field(&p, "name"), Some("a.txt"));
        assert_eq!(str_field(&p, "size"), None);
    }
}
