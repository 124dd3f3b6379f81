//! Opaque filament metadata.
//!
//! Clients attach a JSON object to each spool (colour, material, vendor,
//! remaining length...). The registry never validates it; it stores the
//! text verbatim and only parses it when a lookup asks for a field.

use alloc::string::{String, ToString};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-encoded metadata attached to a filament record.
///
/// Serializes as a plain JSON string, so a record round-trips as
/// `{"id":1,"motor_id":3,"metadata":"{\"color\":\"red\"}"}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(String);

impl Metadata {
    /// Wrap raw metadata text without validating it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw text as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no metadata text is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the text into a JSON value. `None` if it is not valid JSON.
    pub fn value(&self) -> Option<Value> {
        serde_json::from_str(&self.0).ok()
    }

    /// Look up a top-level field and render it as text.
    ///
    /// Strings are returned verbatim, numbers in their shortest decimal form
    /// and booleans as `"true"`/`"false"`. Any other shape, a missing key, or
    /// metadata that is not a JSON object yields `None`.
    ///
    /// ```rust
    /// use top_ams::Metadata;
    ///
    /// let meta = Metadata::new(r#"{"color":"red","temp":215,"dry":true}"#);
    /// assert_eq!(meta.field("color").as_deref(), Some("red"));
    /// assert_eq!(meta.field("temp").as_deref(), Some("215"));
    /// assert_eq!(meta.field("dry").as_deref(), Some("true"));
    /// assert_eq!(meta.field("vendor"), None);
    /// ```
    pub fn field(&self, key: &str) -> Option<String> {
        match self.value()?.get(key)? {
            Value::String(s) => Some(s.clone()),
            // Shortest JSON form ("210", "1.75"), not fixed six-decimal text
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Return a copy with `key` set to `value`.
    ///
    /// Text that is not a JSON object is replaced by a fresh object.
    pub fn with_field(&self, key: &str, value: Value) -> Self {
        let mut object = match self.value() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        object.insert(key.to_string(), value);
        Self(Value::Object(object).to_string())
    }
}

impl From<&str> for Metadata {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Metadata {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl core::fmt::Display for Metadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_renders_scalars() {
        let meta = Metadata::new(r#"{"color":"red","len":1.5,"n":-3,"dry":false}"#);
        assert_eq!(meta.field("color").as_deref(), Some("red"));
        assert_eq!(meta.field("len").as_deref(), Some("1.5"));
        assert_eq!(meta.field("n").as_deref(), Some("-3"));
        assert_eq!(meta.field("dry").as_deref(), Some("false"));
    }

    #[test]
    fn field_skips_nested_and_null() {
        let meta = Metadata::new(r#"{"a":{"b":1},"c":[1],"d":null}"#);
        assert_eq!(meta.field("a"), None);
        assert_eq!(meta.field("c"), None);
        assert_eq!(meta.field("d"), None);
    }

    #[test]
    fn unparsable_metadata_has_no_fields() {
        let meta = Metadata::new("not json");
        assert_eq!(meta.value(), None);
        assert_eq!(meta.field("color"), None);

        // Valid JSON but not an object
        assert_eq!(Metadata::new("[1,2]").field("0"), None);
    }

    #[test]
    fn with_field_keeps_existing_keys() {
        let meta = Metadata::new(r#"{"color":"red"}"#).with_field("type", json!("PLA"));
        assert_eq!(meta.field("color").as_deref(), Some("red"));
        assert_eq!(meta.field("type").as_deref(), Some("PLA"));
    }

    #[test]
    fn with_field_replaces_garbage() {
        let meta = Metadata::new("garbage").with_field("color", json!("blue"));
        assert_eq!(meta.value(), Some(json!({"color": "blue"})));
    }

    #[test]
    fn serializes_as_plain_string() {
        let meta = Metadata::new(r#"{"color":"red"}"#);
        let encoded = serde_json::to_string(&meta).unwrap();
        assert_eq!(encoded, r#""{\"color\":\"red\"}""#);
    }

    #[test]
    fn numbers_render_in_shortest_form() {
        let meta = Metadata::new(r#"{"temp":210,"diameter":1.75,"offset":-2}"#);
        assert_eq!(meta.field("temp").as_deref(), Some("210"));
        assert_eq!(meta.field("diameter").as_deref(), Some("1.75"));
        assert_eq!(meta.field("offset").as_deref(), Some("-2"));
        assert_ne!(meta.field("temp").as_deref(), Some("210.000000"));
    }
}
