//! gRPC status code → HTTP status code translation and the JSON error
//! envelope shape.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tonic::{Code, Status};

/// Canonical `SCREAMING_SNAKE_CASE` name for a gRPC status code.
#[must_use]
pub fn grpc_code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}

/// Map a gRPC status code to its HTTP status code.
///
/// `Cancelled` maps to `499` (a non-standard but widely used "client closed
/// request" code), not `408`, matching the documented table.
#[must_use]
pub fn grpc_to_http_status(code: Code) -> u16 {
    match code {
        Code::Ok => 200,
        Code::Cancelled => 499,
        Code::Unknown | Code::Internal | Code::DataLoss => 500,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => 400,
        Code::DeadlineExceeded => 504,
        Code::NotFound => 404,
        Code::AlreadyExists | Code::Aborted => 409,
        Code::PermissionDenied => 403,
        Code::Unauthenticated => 401,
        Code::ResourceExhausted => 429,
        Code::Unimplemented => 501,
        Code::Unavailable => 503,
    }
}

/// The HTTP reason phrase for a status code, used as the error envelope
/// message when the RPC status carried no message.
fn reason_phrase(http_status: u16) -> &'static str {
    match http_status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        429 => "Too Many Requests",
        499 => "Client Closed Request",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

/// Build the `{"code", "message", "details"}` JSON error envelope for a gRPC
/// [`Status`].
#[must_use]
pub fn error_envelope(status: &Status) -> serde_json::Value {
    let http_status = grpc_to_http_status(status.code());
    let message = if status.message().is_empty() {
        reason_phrase(http_status).to_string()
    } else {
        status.message().to_string()
    };
    serde_json::json!({
        "code": http_status,
        "message": message,
        "details": status_details(status),
    })
}

/// Build the envelope for a request-time failure that never reached the
/// backend (body read, route miss, encode failure, etc).
#[must_use]
pub fn plain_envelope(http_status: u16, message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "code": http_status,
        "message": message.into(),
        "details": Vec::<serde_json::Value>::new(),
    })
}

/// Extract the structured `details` from a status's binary `grpc-status-details-bin`
/// metadata, if present, as opaque base64 `Any`-shaped JSON objects.
///
/// Tonic's [`Status`] doesn't parse `google.rpc.Status.details` for us; we
/// surface them as `{"type_url": ..., "value": <base64>}` pairs, which is
/// the canonical JSON-proto encoding of `google.protobuf.Any` for an
/// unresolvable type.
fn status_details(status: &Status) -> Vec<serde_json::Value> {
    let bytes = status.details();
    if bytes.is_empty() {
        return Vec::new();
    }
    vec![serde_json::json!({
        "type_url": "type.googleapis.com/google.rpc.Status",
        "value": BASE64.encode(bytes),
    })]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustive_grpc_to_http_mapping() {
        let cases: &[(Code, u16)] = &[
            (Code::Ok, 200),
            (Code::Cancelled, 499),
            (Code::Unknown, 500),
            (Code::InvalidArgument, 400),
            (Code::DeadlineExceeded, 504),
            (Code::NotFound, 404),
            (Code::AlreadyExists, 409),
            (Code::PermissionDenied, 403),
            (Code::ResourceExhausted, 429),
            (Code::FailedPrecondition, 400),
            (Code::Aborted, 409),
            (Code::OutOfRange, 400),
            (Code::Unimplemented, 501),
            (Code::Internal, 500),
            (Code::Unavailable, 503),
            (Code::DataLoss, 500),
            (Code::Unauthenticated, 401),
        ];
        for (code, expected) in cases {
            assert_eq!(grpc_to_http_status(*code), *expected, "{code:?}");
        }
        assert_eq!(cases.len(), 17);
    }

    #[test]
    fn not_found_envelope() {
        let status = Status::not_found("x");
        let env = error_envelope(&status);
        assert_eq!(env["code"], 404);
        assert_eq!(env["message"], "x");
        assert_eq!(env["details"], serde_json::json!([]));
    }

    #[test]
    fn empty_message_falls_back_to_reason_phrase() {
        let status = Status::invalid_argument("");
        let env = error_envelope(&status);
        assert_eq!(env["code"], 400);
        assert_eq!(env["message"], "Bad Request");
    }
}
