//! Descriptor acquisition and schema parsing for the restbridge transcoding
//! proxy.
//!
//! This crate bridges `restbridge-core`'s byte-level `google.api.http`
//! extraction with `restbridge-runtime`'s routing and field-path machinery:
//! [`source`] fetches a raw `FileDescriptorSet` from a local directory or a
//! remote reflection service, [`parser`] turns it into a live
//! [`prost_reflect::DescriptorPool`] plus a flat route list, and [`sort`]
//! provides the dependency ordering the parser needs to register files one
//! at a time.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod parser;
pub mod sort;
pub mod source;

pub use parser::{build_table, parse, ParseError, ParseResult};
pub use source::{DescriptorSource, DescriptorSourceError, LocalSource, RemoteSource};
