//! Route, RPC spec, and body-rule types shared between the schema parser and
//! the routing table.

use std::fmt;

use prost_reflect::MessageDescriptor;

/// An HTTP method as matched by the routing table.
///
/// `UnknownMethod` represents any method string the parser doesn't
/// recognize; it is never stored in a [`crate::table::RouteTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// `CONNECT`
    Connect,
    /// `DELETE`
    Delete,
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `PATCH`
    Patch,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `TRACE`
    Trace,
    /// A method string that doesn't match any of the above.
    UnknownMethod,
}

impl MethodKind {
    /// Parse an HTTP method string case-insensitively.
    #[must_use]
    pub fn from_str_lenient(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CONNECT" => Self::Connect,
            "DELETE" => Self::Delete,
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "TRACE" => Self::Trace,
            _ => Self::UnknownMethod,
        }
    }

    /// The canonical upper-case spelling, or `None` for `UnknownMethod`.
    #[must_use]
    pub fn as_canonical_str(self) -> Option<&'static str> {
        Some(match self {
            Self::Connect => "CONNECT",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Trace => "TRACE",
            Self::UnknownMethod => return None,
        })
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_canonical_str().unwrap_or("UNKNOWN"))
    }
}

/// How the HTTP request body maps onto the request message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyRule {
    /// `body: ""` — the body must not be parsed.
    NoBody,
    /// `body: "*"` — the body is decoded directly into the request message.
    MapRoot,
    /// `body: "<path>"` — the raw body is a single string value for that
    /// field path.
    FieldPath(crate::pattern::FieldPath),
}

impl BodyRule {
    /// Interpret an HTTP-binding `body` selector string.
    #[must_use]
    pub fn from_selector(selector: &str) -> Self {
        match selector {
            "" => Self::NoBody,
            "*" => Self::MapRoot,
            path => Self::FieldPath(crate::pattern::FieldPath(
                path.split('.').map(str::to_string).collect(),
            )),
        }
    }
}

/// The RPC a route invokes: fully-qualified service, method name, and the
/// request/response message shapes.
#[derive(Clone, Debug)]
pub struct RpcSpec {
    /// Fully-qualified service name with a leading `/`, e.g. `/pkg.Rules`.
    pub service: String,
    /// Bare method name, e.g. `GetRule`.
    pub method: String,
    /// Request message descriptor.
    pub request: MessageDescriptor,
    /// Response message descriptor.
    pub response: MessageDescriptor,
}

impl RpcSpec {
    /// `service` and `method` joined as tonic expects: `/pkg.Service/Method`.
    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.service, self.method)
    }
}

/// One HTTP-to-RPC binding: immutable after construction.
#[derive(Clone, Debug)]
pub struct Route {
    /// The original template string, unparsed.
    pub pattern: String,
    /// The HTTP method this binding answers to.
    pub method: MethodKind,
    /// How the request body maps onto the request message.
    pub body: String,
    /// The bound RPC.
    pub rpc: RpcSpec,
}
