//! Payload encoding for blob objects and queue messages.

use crate::backend::traits::StorageResult;
use serde::{Serialize, de::DeserializeOwned};

/// Text codec used for object and message payloads.
pub trait Codec: Send + Sync {
    /// MIME type recorded on uploaded blobs.
    fn content_type(&self) -> &str;

    /// Serialize a value to text.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the value cannot be encoded
    fn encode<T: Serialize>(&self, value: &T) -> StorageResult<String>;

    /// Deserialize a value from text.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the text does not decode into `T`
    fn decode<T: DeserializeOwned>(&self, text: &str) -> StorageResult<T>;
}

/// Compact JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> StorageResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> StorageResult<T> {
        Ok(serde_json::from_str(text)?)
    }
}
