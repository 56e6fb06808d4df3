//! Message payloads.
//!
//! `Content` is a tagged union instead of an opaque "any" so the JSON codec
//! is only applied at explicit boundaries: `to_bytes` on the way out,
//! `decode` on the way in.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::types::Result;

/// Payload carried by a [`Message`](super::Message).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Content {
    /// No payload; `null` on the wire.
    #[default]
    Empty,
    /// Opaque bytes, passed through unchanged by `to_bytes`.
    Raw(Bytes),
    /// Plain text, used by error messages and simple acknowledgements.
    Text(String),
    /// Structured payload (resource objects, lists, status documents).
    Json(Value),
}

impl Content {
    /// Encode any serializable value as content.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::from(serde_json::to_value(value)?))
    }

    /// Bytes for transport: raw content unchanged, everything else JSON-encoded.
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Content::Raw(bytes) => Ok(bytes.clone()),
            Content::Empty => Ok(Bytes::from_static(b"null")),
            Content::Text(text) => Ok(Bytes::from(serde_json::to_vec(text)?)),
            Content::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let decoded: T = match self {
            Content::Raw(bytes) => serde_json::from_slice(bytes)?,
            Content::Empty => T::deserialize(Value::Null)?,
            Content::Text(text) => T::deserialize(Value::String(text.clone()))?,
            Content::Json(value) => T::deserialize(value)?,
        };
        Ok(decoded)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            Content::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Content::Empty,
            Value::String(text) => Content::Text(text),
            other => Content::Json(other),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Raw(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Raw(Bytes::from(bytes))
    }
}

// Raw bytes travel as base64 strings, so they decode back as `Text`.
impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Content::Empty => serializer.serialize_unit(),
            Content::Raw(bytes) => serializer.serialize_str(&BASE64_STANDARD.encode(bytes)),
            Content::Text(text) => serializer.serialize_str(text),
            Content::Json(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Content::from)
    }
}
