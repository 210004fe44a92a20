//! Application objects carried in the envelope body.
//!
//! The body is opaque to the envelope layer. Applications built on sealpost
//! put an [`AppObject`] there: a type tag plus an optional JSON document, an
//! optional raw attachment and an optional integer key.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Typed application payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppObject {
    /// Object type, e.g. `"text"` or `"picture"`
    #[serde(rename = "t")]
    pub kind: String,
    /// JSON document
    #[serde(rename = "j", default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    /// Raw attachment bytes
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub raw: Option<Vec<u8>>,
    /// Application-defined integer key
    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub int_key: Option<i32>,
}

impl AppObject {
    /// Object with only a type tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), json: None, raw: None, int_key: None }
    }

    /// Attach a JSON document.
    #[must_use]
    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    /// Attach raw bytes.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Attach an integer key.
    #[must_use]
    pub fn with_int_key(mut self, int_key: i32) -> Self {
        self.int_key = Some(int_key);
        self
    }

    /// Encode to CBOR.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(out)
    }

    /// Decode from CBOR.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if the bytes are not an object
    /// - `ProtocolError::InvalidField` if the type tag is empty
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let object: Self =
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))?;

        if object.kind.is_empty() {
            return Err(ProtocolError::InvalidField {
                field: "t",
                reason: "empty object type".to_string(),
            });
        }

        Ok(object)
    }
}
