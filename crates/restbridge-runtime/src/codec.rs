//! JSON encoding/decoding of dynamic messages.
//!
//! This wraps `prost-reflect`'s own serde integration rather than
//! hand-rolling a marshaller: `DynamicMessage` already knows how to
//! (de)serialize itself against its descriptor, including expanding
//! `google.protobuf.Any` payloads when the enclosing pool has the
//! referenced type registered.

use prost_reflect::{DynamicMessage, MessageDescriptor, SerializeOptions};

use crate::error::CodecError;

/// JSON encoder/decoder configuration.
///
/// Mirrors the original proxy's `emitUnpopulated`/`emitDefaultValues`
/// toggles: whether the success-path encoder writes fields that are at
/// their default/unpopulated value.
#[derive(Clone, Copy, Debug)]
pub struct JsonCodec {
    /// When `true`, unpopulated fields are emitted at their default value.
    /// When `false` (the default), they are omitted, matching standard
    /// proto3 JSON mapping.
    pub emit_unpopulated: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self {
            emit_unpopulated: false,
        }
    }
}

impl JsonCodec {
    /// Encode `message` to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn encode(&self, message: &DynamicMessage) -> Result<String, CodecError> {
        let options = SerializeOptions::new().skip_default_fields(!self.emit_unpopulated);
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut out);
        message
            .serialize_with_options(&mut serializer, &options)
            .map_err(|e| CodecError::Encode(Box::new(e)))?;
        Ok(String::from_utf8(out).expect("serde_json always emits valid UTF-8"))
    }

    /// Decode a JSON request body into a dynamic message of shape `desc`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] when the body is not valid JSON or
    /// doesn't match `desc`.
    pub fn decode(&self, desc: MessageDescriptor, body: &[u8]) -> Result<DynamicMessage, CodecError> {
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        DynamicMessage::deserialize(desc, &mut deserializer)
            .map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};

    fn test_message() -> MessageDescriptor {
        let field = FieldDescriptorProto {
            name: Some("name".to_string()),
            number: Some(1),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::String as i32),
            json_name: Some("name".to_string()),
            ..Default::default()
        };
        let message = DescriptorProto {
            name: Some("Greeting".to_string()),
            field: vec![field],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("greeting.proto".to_string()),
            package: Some("pkg".to_string()),
            message_type: vec![message],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };
        let set = prost_types::FileDescriptorSet { file: vec![file] };
        DescriptorPool::decode(set.encode_to_vec().as_slice())
            .unwrap()
            .get_message_by_name("pkg.Greeting")
            .unwrap()
    }

    #[test]
    fn round_trips_through_json() {
        let desc = test_message();
        let codec = JsonCodec::default();
        let decoded = codec.decode(desc, br#"{"name":"hi"}"#).unwrap();
        let encoded = codec.encode(&decoded).unwrap();
        assert_eq!(encoded, r#"{"name":"hi"}"#);
    }

    #[test]
    fn default_codec_omits_unpopulated_fields() {
        let desc = test_message();
        let codec = JsonCodec::default();
        let decoded = codec.decode(desc, b"{}").unwrap();
        assert_eq!(codec.encode(&decoded).unwrap(), "{}");
    }

    #[test]
    fn emit_unpopulated_includes_defaults() {
        let desc = test_message();
        let codec = JsonCodec {
            emit_unpopulated: true,
        };
        let decoded = codec.decode(desc, b"{}").unwrap();
        assert_eq!(codec.encode(&decoded).unwrap(), r#"{"name":""}"#);
    }
}
