//! Opaque payloads and their textual encoding.
//!
//! Credentials, key material and outbound message contents are owned by the
//! transport; satu only needs to store and forward them. A [`Payload`] is an
//! uninterpreted JSON value. Binary fields are embedded through the
//! [`buffer`] serde helper as `{"type": "Buffer", "data": "<base64>"}`, so a
//! payload always fits a text column and decodes back to the exact value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Errors from converting payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// A value could not be converted into a payload.
    Serialize { reason: String },
    /// A payload did not match the requested type or text was not valid.
    Deserialize { reason: String },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize { reason } => write!(f, "payload serialization failed: {reason}"),
            Self::Deserialize { reason } => {
                write!(f, "payload deserialization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for PayloadError {}

/// An opaque, serializable value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(JsonValue);

impl Payload {
    /// Wraps a JSON value.
    #[must_use]
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// A plain text message body, `{"text": body}`.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self(serde_json::json!({ "text": body.into() }))
    }

    /// Returns the text body if this payload is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.0.get("text").and_then(JsonValue::as_str)
    }

    /// Converts any serializable value into a payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| PayloadError::Serialize {
                reason: e.to_string(),
            })
    }

    /// Converts the payload back into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        serde_json::from_value(self.0.clone()).map_err(|e| PayloadError::Deserialize {
            reason: e.to_string(),
        })
    }

    /// Encodes the payload for a text storage column.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn encode(&self) -> Result<String, PayloadError> {
        serde_json::to_string(&self.0).map_err(|e| PayloadError::Serialize {
            reason: e.to_string(),
        })
    }

    /// Decodes text produced by [`Payload::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON.
    pub fn decode(text: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| PayloadError::Deserialize {
                reason: e.to_string(),
            })
    }

    /// Returns the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &JsonValue {
        &self.0
    }

    /// Consumes the payload, returning the JSON value.
    #[must_use]
    pub fn into_value(self) -> JsonValue {
        self.0
    }
}

impl From<JsonValue> for Payload {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

/// Owned bytes that serialize through [`buffer`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Buffer(#[serde(with = "buffer")] pub Vec<u8>);

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Serde helper embedding bytes as a tagged base64 object.
///
/// Use with `#[serde(with = "satu_core::buffer")]` on `Vec<u8>` fields.
pub mod buffer {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const BUFFER_TAG: &str = "Buffer";

    #[derive(Serialize, Deserialize)]
    struct Tagged {
        #[serde(rename = "type")]
        kind: String,
        data: String,
    }

    /// Serializes bytes as `{"type": "Buffer", "data": "<base64>"}`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        Tagged {
            kind: BUFFER_TAG.to_string(),
            data: STANDARD.encode(bytes.as_ref()),
        }
        .serialize(serializer)
    }

    /// Deserializes bytes written by [`serialize`].
    ///
    /// # Errors
    ///
    /// Fails if the tag is not `Buffer` or the data is not valid base64.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tagged = Tagged::deserialize(deserializer)?;
        if tagged.kind != BUFFER_TAG {
            return Err(D::Error::custom(format!(
                "expected type '{BUFFER_TAG}', found '{}'",
                tagged.kind
            )));
        }
        STANDARD.decode(tagged.data).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct KeyPair {
        #[serde(with = "buffer")]
        public: Vec<u8>,
        private: Buffer,
        label: String,
    }

    fn key_pair() -> KeyPair {
        KeyPair {
            public: vec![0, 1, 2, 254, 255],
            private: Buffer(vec![9; 32]),
            label: "noise".to_string(),
        }
    }

    #[test]
    fn binary_fields_are_tagged_base64() {
        let payload = Payload::from_serialize(&key_pair()).expect("serialize");
        let public = &payload.as_value()["public"];
        assert_eq!(public["type"], "Buffer");
        assert_eq!(public["data"], "AAEC/v8=");
    }

    #[test]
    fn encode_decode_is_exact_inverse() {
        let payload = Payload::from_serialize(&key_pair()).expect("serialize");
        let text = payload.encode().expect("encode");
        let decoded = Payload::decode(&text).expect("decode");
        assert_eq!(decoded, payload);

        let restored: KeyPair = decoded.deserialize().expect("deserialize");
        assert_eq!(restored, key_pair());
    }

    #[test]
    fn rejects_wrong_buffer_tag() {
        let payload = Payload::new(serde_json::json!({
            "public": {"type": "Blob", "data": ""},
            "private": {"type": "Buffer", "data": ""},
            "label": "x"
        }));
        let err = payload.deserialize::<KeyPair>().unwrap_err();
        assert!(err.to_string().contains("expected type 'Buffer'"));
    }

    #[test]
    fn decode_rejects_invalid_text() {
        assert!(Payload::decode("{not json").is_err());
    }

    #[test]
    fn text_payload() {
        let payload = Payload::text("hello");
        assert_eq!(payload.as_text(), Some("hello"));
        assert_eq!(Payload::default().as_text(), None);
    }
}
