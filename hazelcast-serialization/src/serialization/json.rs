//! JSON document values.

use std::fmt;

use crate::error::Result;

use super::{DataInput, DataOutput, Deserializable, Serializable};

/// Type ID of JSON values.
pub const JSON_TYPE_ID: i32 = -130;

/// A JSON document carried as its string form.
///
/// The payload is the UTF-8 string itself; the cluster can query into it
/// without a schema. The text is not validated on construction. A null
/// string on the wire decodes as an empty document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HazelcastJsonValue {
    text: String,
}

impl HazelcastJsonValue {
    /// Wraps JSON text as-is.
    pub fn from_string(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The JSON text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Unwraps the JSON text.
    pub fn into_string(self) -> String {
        self.text
    }

    /// True for the empty document a null string decodes to.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(feature = "json")]
impl HazelcastJsonValue {
    /// Renders a `serde_json` value in its compact form.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::to_string(value)
            .map(Self::from_string)
            .map_err(|e| {
                crate::error::HazelcastError::Serialization(format!("invalid JSON value: {e}"))
            })
    }

    /// Parses the text into a `serde_json` value.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.text).map_err(|e| {
            crate::error::HazelcastError::Serialization(format!("malformed JSON document: {e}"))
        })
    }
}

impl fmt::Display for HazelcastJsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for HazelcastJsonValue {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl From<String> for HazelcastJsonValue {
    fn from(text: String) -> Self {
        Self::from_string(text)
    }
}

impl From<&str> for HazelcastJsonValue {
    fn from(text: &str) -> Self {
        Self::from_string(text)
    }
}

impl Serializable for HazelcastJsonValue {
    fn serialize<W: DataOutput + ?Sized>(&self, output: &mut W) -> Result<()> {
        output.write_string(Some(self.text.as_str()))
    }
}

impl Deserializable for HazelcastJsonValue {
    fn deserialize<R: DataInput + ?Sized>(input: &mut R) -> Result<Self> {
        Ok(Self {
            text: input.read_string()?.unwrap_or_default(),
        })
    }
}
