//! Error types for pattern compilation, field-path resolution, and routing.

use crate::pattern::{FieldPath, PatternError};

/// Failure while writing or validating a value against a field path.
#[derive(Debug, thiserror::Error)]
pub enum FieldPathError {
    /// An intermediate segment named a field that doesn't exist on the
    /// message (by direct name or oneof member).
    #[error("field '{0}' not found")]
    UnknownField(String),
    /// An intermediate segment resolved to something other than a
    /// non-repeated message field.
    #[error("field '{0}' is not a singular message and cannot be descended into")]
    NotDescendable(String),
    /// The terminal field is a map or group, neither of which this operator
    /// supports.
    #[error("field '{0}' has an unsupported kind (map or group)")]
    UnsupportedFieldType(String),
    /// The textual value couldn't be parsed into the terminal field's kind.
    #[error("value '{value}' is not valid for field '{field}'")]
    ValueParse {
        /// Field path segment the value targeted.
        field: String,
        /// The raw textual value that failed to parse.
        value: String,
    },
    /// A JSON-encoded message value failed to decode.
    #[error("message value for field '{0}' failed to decode: {1}")]
    MessageDecode(String, #[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure while JSON-encoding or decoding a dynamic message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The request body was not valid JSON, or didn't match the message
    /// shape (unknown field, wrong type, etc).
    #[error("request body is not valid JSON for this message: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The response message failed to serialize to JSON.
    #[error("response message failed to encode as JSON: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure while registering a [`crate::route::Route`] into a
/// [`crate::table::RouteTable`].
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The route's template failed to parse.
    #[error("invalid pattern '{0}': {1}")]
    PatternInvalid(String, #[source] PatternError),
    /// The route carried no request descriptor.
    #[error("route has no request descriptor")]
    MissingRequestDescriptor,
    /// A capture or body field path is incompatible with the request schema.
    #[error("field path '{0}' invalid for request schema: {1}")]
    FieldPathInvalid(FieldPath, #[source] FieldPathError),
    /// Another route already registered the same method and template.
    #[error("duplicate route for {0} '{1}'")]
    Duplicate(String, String),
}
