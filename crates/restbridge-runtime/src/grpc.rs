//! A unary gRPC client that invokes RPCs by fully-qualified path against
//! dynamic request/response messages, without compile-time-generated stubs.

use bytes::Buf;
use prost_reflect::prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

#[derive(Clone)]
struct DynamicCodec {
    response_desc: MessageDescriptor,
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            desc: self.response_desc.clone(),
        }
    }
}

struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("failed to encode request: {e}")))
    }
}

struct DynamicDecoder {
    desc: MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        if !src.has_remaining() {
            return Ok(None);
        }
        DynamicMessage::decode(self.desc.clone(), src)
            .map(Some)
            .map_err(|e| Status::internal(format!("failed to decode response: {e}")))
    }
}

/// A handle to the single long-lived channel shared by every transcoded
/// request. Tonic's [`Channel`] multiplexes internally, so this is cheap to
/// clone and safe to share across request tasks.
#[derive(Clone)]
pub struct GrpcGateway {
    channel: Channel,
}

impl GrpcGateway {
    /// Wrap an already-connected channel.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Invoke a unary RPC at `full_path` (e.g. `/pkg.Service/Method`).
    ///
    /// # Errors
    ///
    /// Returns the [`Status`] the backend responded with, or a
    /// locally-synthesized one if the call never reached it (connection
    /// failure, timeout, deadline).
    pub async fn unary(
        &self,
        full_path: &str,
        response_desc: MessageDescriptor,
        request: Request<DynamicMessage>,
    ) -> Result<Response<DynamicMessage>, Status> {
        let mut client = Grpc::new(self.channel.clone());
        client.ready().await.map_err(|e| {
            Status::unavailable(format!("backend channel not ready: {e}"))
        })?;
        let path = tonic::codegen::http::uri::PathAndQuery::try_from(full_path)
            .map_err(|e| Status::internal(format!("invalid RPC path '{full_path}': {e}")))?;
        client
            .unary(request, path, DynamicCodec { response_desc })
            .await
    }
}
