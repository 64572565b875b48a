//! HTTP-binding annotation extraction for the restbridge transcoding proxy.
//!
//! Schema descriptors carry their REST mapping in the `google.api.http`
//! method option (extension field 72295728). The standard generated
//! `prost_types::MethodOptions` silently drops unknown extension fields
//! during decode, so this crate re-decodes the same raw `MethodOptions`
//! bytes against a minimal hand-rolled [`prost::Message`] tree that knows
//! about that one field. Everything else about the schema (message layout,
//! field kinds, nested types) is resolved separately through
//! `prost-reflect`, which this crate does not need to know about.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod annotation;

pub use annotation::{
    encode_http_option, extract_bindings, raw_method_options, HttpBinding, HttpMethod,
    RawMethodOptions,
};
