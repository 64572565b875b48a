//! HTTP header ↔ gRPC metadata translation.
//!
//! The inbound and outbound filters are structurally identical except that
//! `content-length` is dropped on the inbound side only — the HTTP layer
//! recomputes it for the outbound response.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tonic::metadata::MetadataMap;

/// Headers that are connection-specific per RFC 9113 §8.2.2 and must not be
/// forwarded across an HTTP/2+ hop.
const CONNECTION_SPECIFIC: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
];

/// Translate inbound HTTP request headers into outgoing gRPC metadata.
///
/// Lower-cases every header name, always drops `content-length`, drops the
/// connection-specific set when `http_major > 1`, and forces `accept` /
/// `content-type` to `application/protobuf`.
#[must_use]
pub fn to_grpc_metadata(headers: &HeaderMap, http_major: u8) -> MetadataMap {
    let mut out = MetadataMap::new();
    for (name, value) in headers {
        let lower = name.as_str().to_ascii_lowercase();
        if lower == "content-length" {
            continue;
        }
        if http_major > 1 && CONNECTION_SPECIFIC.contains(&lower.as_str()) {
            continue;
        }
        if lower == "accept" || lower == "content-type" {
            continue;
        }
        if let (Ok(key), Ok(val)) = (
            tonic::metadata::MetadataKey::from_bytes(lower.as_bytes()),
            tonic::metadata::MetadataValue::try_from(value.as_bytes()),
        ) {
            out.insert(key, val);
        }
    }
    out.insert(
        "accept",
        tonic::metadata::MetadataValue::from_static("application/protobuf"),
    );
    out.insert(
        "content-type",
        tonic::metadata::MetadataValue::from_static("application/protobuf"),
    );
    out
}

/// Translate gRPC response metadata into outbound HTTP response headers,
/// applying the same connection-specific filter in reverse.
#[must_use]
pub fn to_http_headers(metadata: &MetadataMap, http_major: u8) -> HeaderMap {
    let mut out = HeaderMap::new();
    for key_and_value in metadata.iter() {
        let tonic::metadata::KeyAndValueRef::Ascii(key, value) = key_and_value else {
            continue;
        };
        let lower = key.as_str().to_ascii_lowercase();
        if http_major > 1 && CONNECTION_SPECIFIC.contains(&lower.as_str()) {
            continue;
        }
        let (Ok(name), Ok(val)) = (
            HeaderName::from_bytes(lower.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) else {
            continue;
        };
        out.insert(name, val);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_always_dropped_inbound() {
        let mut headers = HeaderMap::new();
        headers.insert("content-length", "42".parse().unwrap());
        let md = to_grpc_metadata(&headers, 1);
        assert!(md.get("content-length").is_none());
    }

    #[test]
    fn connection_specific_dropped_only_above_http1() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        let http1 = to_grpc_metadata(&headers, 1);
        assert!(http1.get("connection").is_some());
        let http2 = to_grpc_metadata(&headers, 2);
        assert!(http2.get("connection").is_none());
    }

    #[test]
    fn accept_and_content_type_forced_to_protobuf() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", "application/json".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        let md = to_grpc_metadata(&headers, 1);
        assert_eq!(md.get("accept").unwrap(), "application/protobuf");
        assert_eq!(md.get("content-type").unwrap(), "application/protobuf");
    }
}
