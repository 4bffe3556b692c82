//! Payload conversion.
//!
//! A [`Converter`] maps between wire bytes and a self-describing
//! [`serde_json::Value`] tree, which keeps the trait object-safe so an
//! endpoint can hold it as `Arc<dyn Converter>`. Typed values cross the
//! boundary through `serde` ([`encode`]) and [`FromBody`].

use crate::error::ConversionError;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Content type produced by [`JsonConverter`].
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Serialization engine attached to an endpoint.
pub trait Converter: Send + Sync {
    /// Value of the `Content-Type` header for bodies produced by [`Converter::serialize`].
    fn content_type(&self) -> &str;

    /// Encode a value tree into a request body.
    ///
    /// # Errors
    /// Returns [`ConversionError`] if the value cannot be encoded.
    fn serialize(&self, value: &Value) -> Result<Bytes, ConversionError>;

    /// Decode a response body into a value tree.
    ///
    /// # Errors
    /// Returns [`ConversionError`] on malformed input.
    fn deserialize(&self, body: &[u8]) -> Result<Value, ConversionError>;
}

/// Default converter: JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl Converter for JsonConverter {
    fn content_type(&self) -> &str {
        JSON_CONTENT_TYPE
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, ConversionError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn deserialize(&self, body: &[u8]) -> Result<Value, ConversionError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Serialize any `Serialize` value through `converter`.
///
/// # Errors
/// Returns [`ConversionError`] if the value cannot be represented or encoded.
pub fn encode<T: Serialize + ?Sized>(
    converter: &dyn Converter,
    value: &T,
) -> Result<Bytes, ConversionError> {
    let tree = serde_json::to_value(value)?;
    converter.serialize(&tree)
}

/// Response payload type of a call.
///
/// `String` is the default and bypasses the converter entirely.
pub trait FromBody: Sized {
    /// Build the payload from the response body.
    ///
    /// # Errors
    /// Returns [`ConversionError`] if the body cannot be converted.
    fn from_body(body: &Bytes, converter: &dyn Converter) -> Result<Self, ConversionError>;
}

impl FromBody for String {
    fn from_body(body: &Bytes, _converter: &dyn Converter) -> Result<Self, ConversionError> {
        String::from_utf8(body.to_vec())
            .map_err(|e| ConversionError::with_source("response body is not valid UTF-8", e))
    }
}

impl FromBody for Bytes {
    fn from_body(body: &Bytes, _converter: &dyn Converter) -> Result<Self, ConversionError> {
        Ok(body.clone())
    }
}

impl FromBody for Value {
    fn from_body(body: &Bytes, converter: &dyn Converter) -> Result<Self, ConversionError> {
        converter.deserialize(body)
    }
}

impl FromBody for () {
    fn from_body(_body: &Bytes, _converter: &dyn Converter) -> Result<Self, ConversionError> {
        Ok(())
    }
}

/// Typed payload decoded through the endpoint's converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> FromBody for Json<T> {
    fn from_body(body: &Bytes, converter: &dyn Converter) -> Result<Self, ConversionError> {
        let tree = converter.deserialize(body)?;
        Ok(Json(serde_json::from_value(tree)?))
    }
}
