//! Remote descriptor source: a gRPC server reflection client.
//!
//! Negotiates between the `v1` and `v1alpha` reflection services (some
//! servers still only implement the older one) and caches the result for
//! the lifetime of the source so later reloads don't renegotiate.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::Grpc;
use tonic_prost::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::Request;

const DEFAULT_REFLECTION_METHOD: &str = "/grpc.reflection.v1.ServerReflection/ServerReflectionInfo";
const DEFAULT_REFLECTION_METHOD_V1ALPHA: &str =
    "/grpc.reflection.v1alpha.ServerReflection/ServerReflectionInfo";

const UNNEGOTIATED: u8 = 0;
const V1: u8 = 1;
const V1_ALPHA: u8 = 2;

/// Which reflection protocol version a server answered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReflectionVersion {
    /// `grpc.reflection.v1.ServerReflection`.
    V1,
    /// `grpc.reflection.v1alpha.ServerReflection`, tried only after `v1`
    /// responds `Unimplemented`.
    V1Alpha,
}

/// Errors exchanging reflection RPCs with a remote server.
#[derive(Debug, thiserror::Error)]
pub enum RemoteSourceError {
    /// Neither reflection version is implemented by the server.
    #[error("server implements neither v1 nor v1alpha reflection")]
    Unimplemented,
    /// The reflection exchange did not complete within the configured
    /// timeout.
    #[error("reflection fetch timed out after {0:?}")]
    Timeout(Duration),
    /// A reflection RPC call failed.
    #[error("reflection RPC failed: {0}")]
    Rpc(#[from] tonic::Status),
    /// The server reported an application-level reflection error.
    #[error("reflection server error {code}: {message}")]
    ServerError {
        /// The gRPC status code the server reported in-band.
        code: i32,
        /// The server's error message.
        message: String,
    },
    /// The aggregate fetch produced no files at all.
    #[error("no file descriptors returned by reflection")]
    FileDescriptorsNotFound,
}

/// Configuration and cached negotiation state for a remote reflection
/// source.
pub struct RemoteSource {
    channel: Channel,
    method: String,
    exclude: Vec<String>,
    timeout: Duration,
    negotiated: AtomicU8,
}

impl Clone for RemoteSource {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            method: self.method.clone(),
            exclude: self.exclude.clone(),
            timeout: self.timeout,
            negotiated: AtomicU8::new(self.negotiated.load(Ordering::Relaxed)),
        }
    }
}

impl RemoteSource {
    /// Build a source against an already-connected channel.
    ///
    /// `method` is the fully-qualified reflection RPC path; a missing
    /// leading `/` is added automatically. Defaults to
    /// [`DEFAULT_REFLECTION_METHOD`] when empty.
    #[must_use]
    pub fn new(channel: Channel, method: impl Into<String>, exclude: Vec<String>, timeout: Duration) -> Self {
        let mut method = method.into();
        if method.is_empty() {
            method = DEFAULT_REFLECTION_METHOD.to_string();
        } else if !method.starts_with('/') {
            method.insert(0, '/');
        }
        Self {
            channel,
            method,
            exclude,
            timeout,
            negotiated: AtomicU8::new(UNNEGOTIATED),
        }
    }

    /// Exclude reflection and health services by default, per the
    /// documented configuration default.
    #[must_use]
    pub fn default_exclude() -> Vec<String> {
        vec![
            "grpc.health.v1.Health".to_string(),
            "grpc.reflection.v1.ServerReflection".to_string(),
        ]
    }

    /// Run the full `ListServices` → `FileContainingSymbol` exchange,
    /// bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteSourceError`] on timeout, RPC failure, or an empty
    /// result set.
    ///
    /// The returned bytes are a raw, concatenated `FileDescriptorSet`
    /// encoding: each `file_descriptor_proto` the server returns is wrapped
    /// as one `file` entry rather than decoded into a typed
    /// `FileDescriptorProto`, so extensions on nested `MethodOptions` (like
    /// `google.api.http`) survive for `restbridge_core::raw_method_options`
    /// to read later.
    pub async fn fetch(&self) -> Result<Vec<u8>, RemoteSourceError> {
        tokio::time::timeout(self.timeout, self.fetch_inner())
            .await
            .map_err(|_| RemoteSourceError::Timeout(self.timeout))?
    }

    async fn fetch_inner(&self) -> Result<Vec<u8>, RemoteSourceError> {
        let version = match self.negotiated.load(Ordering::Relaxed) {
            V1 => ReflectionVersion::V1,
            V1_ALPHA => ReflectionVersion::V1Alpha,
            _ => {
                match self.fetch_v1().await {
                    Ok(set) => {
                        self.negotiated.store(V1, Ordering::Relaxed);
                        return Ok(set);
                    }
                    Err(RemoteSourceError::Rpc(status))
                        if status.code() == tonic::Code::Unimplemented =>
                    {
                        self.negotiated.store(V1_ALPHA, Ordering::Relaxed);
                        ReflectionVersion::V1Alpha
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match version {
            ReflectionVersion::V1 => self.fetch_v1().await,
            ReflectionVersion::V1Alpha => self.fetch_v1alpha().await,
        }
    }

    async fn fetch_v1(&self) -> Result<Vec<u8>, RemoteSourceError> {
        use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
        use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
        use tonic_reflection::pb::v1::{ServerReflectionRequest, ServerReflectionResponse};

        let mut client = Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| RemoteSourceError::ServerError {
                code: tonic::Code::Unavailable as i32,
                message: e.to_string(),
            })?;
        let path = PathAndQuery::try_from(self.method.as_str())
            .unwrap_or_else(|_| PathAndQuery::try_from(DEFAULT_REFLECTION_METHOD).unwrap());

        let (tx, rx) = mpsc::channel(8);
        let request = Request::new(ReceiverStream::new(rx));
        let codec = ProstCodec::<ServerReflectionRequest, ServerReflectionResponse>::default();
        let mut responses = client.streaming(request, path, codec).await?.into_inner();

        tx.send(ServerReflectionRequest {
            host: String::new(),
            message_request: Some(MessageRequest::ListServices(String::new())),
        })
        .await
        .map_err(|_| RemoteSourceError::Unimplemented)?;

        let services = match responses.next().await {
            Some(Ok(resp)) => match resp.message_response {
                Some(MessageResponse::ListServicesResponse(list)) => {
                    list.service.into_iter().map(|s| s.name).collect::<Vec<_>>()
                }
                Some(MessageResponse::ErrorResponse(e)) => {
                    return Err(RemoteSourceError::ServerError {
                        code: e.error_code,
                        message: e.error_message,
                    })
                }
                _ => Vec::new(),
            },
            Some(Err(status)) => return Err(RemoteSourceError::Rpc(status)),
            None => Vec::new(),
        };

        let mut files = Vec::new();
        for service in services {
            if self.exclude.contains(&service) {
                continue;
            }
            tx.send(ServerReflectionRequest {
                host: String::new(),
                message_request: Some(MessageRequest::FileContainingSymbol(service.clone())),
            })
            .await
            .map_err(|_| RemoteSourceError::Unimplemented)?;

            match responses.next().await {
                Some(Ok(resp)) => match resp.message_response {
                    Some(MessageResponse::FileDescriptorResponse(fdr)) => {
                        files.extend(fdr.file_descriptor_proto);
                    }
                    Some(MessageResponse::ErrorResponse(e)) => {
                        tracing::warn!(service, code = e.error_code, message = %e.error_message, "reflection error for service");
                    }
                    _ => {}
                },
                Some(Err(status)) => return Err(RemoteSourceError::Rpc(status)),
                None => break,
            }
        }
        drop(tx);

        if files.is_empty() {
            return Err(RemoteSourceError::FileDescriptorsNotFound);
        }
        Ok(wrap_as_file_descriptor_set(&files))
    }

    async fn fetch_v1alpha(&self) -> Result<Vec<u8>, RemoteSourceError> {
        use tonic_reflection::pb::v1alpha::server_reflection_request::MessageRequest;
        use tonic_reflection::pb::v1alpha::server_reflection_response::MessageResponse;
        use tonic_reflection::pb::v1alpha::{ServerReflectionRequest, ServerReflectionResponse};

        let mut client = Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| RemoteSourceError::ServerError {
                code: tonic::Code::Unavailable as i32,
                message: e.to_string(),
            })?;
        let path = PathAndQuery::try_from(DEFAULT_REFLECTION_METHOD_V1ALPHA).unwrap();

        let (tx, rx) = mpsc::channel(8);
        let request = Request::new(ReceiverStream::new(rx));
        let codec = ProstCodec::<ServerReflectionRequest, ServerReflectionResponse>::default();
        let mut responses = client.streaming(request, path, codec).await?.into_inner();

        tx.send(ServerReflectionRequest {
            host: String::new(),
            message_request: Some(MessageRequest::ListServices(String::new())),
        })
        .await
        .map_err(|_| RemoteSourceError::Unimplemented)?;

        let services = match responses.next().await {
            Some(Ok(resp)) => match resp.message_response {
                Some(MessageResponse::ListServicesResponse(list)) => {
                    list.service.into_iter().map(|s| s.name).collect::<Vec<_>>()
                }
                Some(MessageResponse::ErrorResponse(e)) => {
                    return Err(RemoteSourceError::ServerError {
                        code: e.error_code,
                        message: e.error_message,
                    })
                }
                _ => Vec::new(),
            },
            Some(Err(status)) => return Err(RemoteSourceError::Rpc(status)),
            None => Vec::new(),
        };

        let mut files = Vec::new();
        for service in services {
            if self.exclude.contains(&service) {
                continue;
            }
            tx.send(ServerReflectionRequest {
                host: String::new(),
                message_request: Some(MessageRequest::FileContainingSymbol(service.clone())),
            })
            .await
            .map_err(|_| RemoteSourceError::Unimplemented)?;

            match responses.next().await {
                Some(Ok(resp)) => match resp.message_response {
                    Some(MessageResponse::FileDescriptorResponse(fdr)) => {
                        files.extend(fdr.file_descriptor_proto);
                    }
                    Some(MessageResponse::ErrorResponse(e)) => {
                        tracing::warn!(service, code = e.error_code, message = %e.error_message, "reflection error for service");
                    }
                    _ => {}
                },
                Some(Err(status)) => return Err(RemoteSourceError::Rpc(status)),
                None => break,
            }
        }
        drop(tx);

        if files.is_empty() {
            return Err(RemoteSourceError::FileDescriptorsNotFound);
        }
        Ok(wrap_as_file_descriptor_set(&files))
    }
}

/// Wrap each raw `FileDescriptorProto` encoding as one `file` entry (field
/// 1, length-delimited) of a `FileDescriptorSet`, without decoding any of
/// them. Concatenating these tag-prefixed blobs is itself a valid
/// `FileDescriptorSet` encoding, since repeated fields merge by
/// concatenation in the protobuf wire format.
fn wrap_as_file_descriptor_set(protos: &[Vec<u8>]) -> Vec<u8> {
    const FILE_FIELD_TAG: u8 = (1 << 3) | 2; // field 1, wire type 2 (length-delimited)
    let mut out = Vec::new();
    for proto in protos {
        out.push(FILE_FIELD_TAG);
        write_varint(proto.len() as u64, &mut out);
        out.extend_from_slice(proto);
    }
    out
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use prost_types::{FileDescriptorProto, FileDescriptorSet};

    #[test]
    fn wrapped_protos_decode_as_one_file_descriptor_set() {
        let a = FileDescriptorProto {
            name: Some("a.proto".to_string()),
            ..Default::default()
        };
        let b = FileDescriptorProto {
            name: Some("b.proto".to_string()),
            ..Default::default()
        };
        let raw = wrap_as_file_descriptor_set(&[a.encode_to_vec(), b.encode_to_vec()]);
        let set = FileDescriptorSet::decode(raw.as_slice()).unwrap();
        let names: Vec<&str> = set.file.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.proto", "b.proto"]);
    }
}
