//! The Axum HTTP surface: `GET /status` and the dynamic transcoding
//! fallback that implements the routing-table lookup, request/response
//! translation, and backend RPC invocation.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use http_body_util::BodyExt;
use prost_reflect::{DynamicMessage, ReflectMessage};

use crate::codec::JsonCodec;
use crate::fieldpath;
use crate::grpc::GrpcGateway;
use crate::metadata;
use crate::pattern::Variable;
use crate::route::{BodyRule, MethodKind};
use crate::status::{error_envelope, plain_envelope};
use crate::table::ReloadableTable;

/// Everything the gateway handler needs to service a request.
#[derive(Clone)]
pub struct GatewayState {
    /// The live routing table.
    pub table: Arc<ReloadableTable>,
    /// The backend gRPC channel.
    pub grpc: GrpcGateway,
    /// JSON encode/decode configuration.
    pub codec: JsonCodec,
    /// Per-request RPC timeout (must exceed 100ms, enforced at config load).
    pub request_timeout: Duration,
}

/// Build the Axum router: `GET /status` ahead of table lookup, everything
/// else through [`transcode`].
pub fn router(state: GatewayState) -> axum::Router {
    axum::Router::new()
        .route("/status", get(status))
        .fallback(transcode)
        .with_state(state)
}

async fn status() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "OK"})))
}

async fn transcode(State(state): State<GatewayState>, req: Request) -> Response {
    let method_kind = MethodKind::from_str_lenient(req.method().as_str());
    if method_kind == MethodKind::UnknownMethod {
        return json_error(405, plain_envelope(405, "Method Not Allowed"));
    }

    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let http_major = match req.version() {
        axum::http::Version::HTTP_09 | axum::http::Version::HTTP_10 | axum::http::Version::HTTP_11 => 1,
        _ => 2,
    };
    let headers = req.headers().clone();

    let snapshot = state.table.load();
    let Some(found) = snapshot.find(method_kind, &path) else {
        return json_error(404, plain_envelope(404, "Not Found"));
    };
    // Drop the snapshot reference explicitly where it's no longer needed;
    // `found` owns everything else this handler uses.
    drop(snapshot);

    let body_bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            return json_error(400, plain_envelope(400, "Bad Request"));
        }
    };

    let mut variables: Vec<Variable> = found.captures;
    for (name, value) in parse_query(&query) {
        variables.push(Variable {
            path: crate::pattern::FieldPath(name.split('.').map(str::to_string).collect()),
            value,
        });
    }

    let mut message = DynamicMessage::new(found.rpc.request.clone());
    if let Err(e) = apply_body(&mut message, &found.body_rule, &body_bytes, &state.codec) {
        tracing::warn!(error = %e, path, "failed to apply request body");
        return json_error(400, plain_envelope(400, "Bad Request"));
    }
    for var in &variables {
        if let Err(e) = fieldpath::write(&mut message, &var.path, &var.value) {
            tracing::warn!(error = %e, field = %var.path, "failed to write path/query variable");
            return json_error(400, plain_envelope(400, "Bad Request"));
        }
    }

    let grpc_metadata = metadata::to_grpc_metadata(&headers, http_major);
    let mut request = tonic::Request::new(message);
    *request.metadata_mut() = grpc_metadata;
    request.set_timeout(state.request_timeout);

    let response = tokio::time::timeout(
        state.request_timeout,
        state
            .grpc
            .unary(&found.rpc.full_path(), found.rpc.response.clone(), request),
    )
    .await;

    let response = match response {
        Ok(r) => r,
        Err(_) => Err(tonic::Status::deadline_exceeded("request timed out")),
    };

    match response {
        Ok(resp) => {
            let mut out_headers = metadata::to_http_headers(resp.metadata(), http_major);
            out_headers.insert(
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderValue::from_static("application/json"),
            );
            let body = match state.codec.encode(resp.get_ref()) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode response");
                    return json_error(500, plain_envelope(500, "Internal Server Error"));
                }
            };
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = StatusCode::OK;
            *response.headers_mut() = out_headers;
            response
        }
        Err(status) => {
            let http_status = crate::status::grpc_to_http_status(status.code());
            json_error(http_status, error_envelope(&status))
        }
    }
}

fn apply_body(
    message: &mut DynamicMessage,
    rule: &BodyRule,
    body: &[u8],
    codec: &JsonCodec,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match rule {
        BodyRule::NoBody => Ok(()),
        BodyRule::MapRoot => {
            let decoded = codec.decode(message.descriptor(), body)?;
            *message = decoded;
            Ok(())
        }
        BodyRule::FieldPath(path) => {
            let text = std::str::from_utf8(body)?;
            fieldpath::write(message, path, text)?;
            Ok(())
        }
    }
}

fn json_error(http_status: u16, envelope: serde_json::Value) -> Response {
    let status = StatusCode::from_u16(http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

/// Split a raw query string into `(name, value)` pairs, percent-decoding
/// both. Unlike [`axum::extract::Query`] this doesn't deserialize into a
/// fixed struct — the field path a query parameter targets is only known
/// once the route's request schema is resolved.
fn parse_query(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_query() {
        let pairs = parse_query("username=John&country=USA");
        assert_eq!(
            pairs,
            vec![
                ("username".to_string(), "John".to_string()),
                ("country".to_string(), "USA".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_percent_and_plus() {
        let pairs = parse_query("q=a+b%2Fc");
        assert_eq!(pairs, vec![("q".to_string(), "a b/c".to_string())]);
    }

    #[test]
    fn empty_query_yields_no_pairs() {
        assert!(parse_query("").is_empty());
    }
}
