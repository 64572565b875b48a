//! Dynamic REST-to-gRPC transcoding engine.
//!
//! This crate has no knowledge of any particular `.proto` file: routes,
//! request/response shapes, and field layouts are all resolved at runtime
//! against [`prost_reflect`] descriptors supplied by the schema crate. It
//! provides:
//!
//! - [`pattern`] — URL template parsing and matching
//! - [`fieldpath`] — writing captured/query values into a dynamic message
//! - [`route`] / [`table`] — the [`Route`](route::Route) type and the
//!   lock-free [`ReloadableTable`](table::ReloadableTable)
//! - [`status`] — gRPC → HTTP status translation and the JSON error envelope
//! - [`codec`] — JSON (de)serialization of dynamic messages
//! - [`grpc`] — a unary gRPC client that dispatches by RPC path
//! - [`gateway`] — the Axum router tying all of the above together

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod error;
pub mod fieldpath;
pub mod gateway;
pub mod grpc;
pub mod metadata;
pub mod pattern;
pub mod route;
pub mod status;
pub mod table;

pub use gateway::{router, GatewayState};
pub use grpc::GrpcGateway;
pub use route::{BodyRule, MethodKind, Route, RpcSpec};
pub use table::{ReloadableTable, RouteTable};
