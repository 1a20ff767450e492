//! Serde bridges between Rust values and BSON.

use bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::OdmError;

/// # Errors
/// Returns an error when the value cannot be represented as BSON.
pub fn to_bson<V: Serialize + ?Sized>(value: &V) -> Result<Bson, OdmError> {
    Ok(bson::serialize_to_bson(value)?)
}

/// # Errors
/// Returns an error when the value does not serialize to a BSON document.
pub fn to_document<V: Serialize + ?Sized>(value: &V) -> Result<Document, OdmError> {
    Ok(bson::serialize_to_document(value)?)
}

/// # Errors
/// Returns an error when the document does not deserialize into `T`.
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, OdmError> {
    Ok(bson::deserialize_from_document(document)?)
}

/// # Errors
/// Returns an error when the value does not deserialize into `T`.
pub fn from_bson<T: DeserializeOwned>(value: Bson) -> Result<T, OdmError> {
    Ok(bson::deserialize_from_bson(value)?)
}
