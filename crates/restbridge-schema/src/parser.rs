//! Turns a raw `FileDescriptorSet` into a live descriptor pool and a flat
//! list of routes, by correlating `prost-reflect`'s structural view of the
//! schema with `restbridge-core`'s byte-level extraction of the
//! `google.api.http` extension.

use std::collections::HashMap;

use prost::Message as _;
use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use restbridge_core::{HttpMethod as CoreHttpMethod, RawMethodOptions};
use restbridge_runtime::error::RouteError;
use restbridge_runtime::{MethodKind, Route, RouteTable, RpcSpec};

use crate::sort::order_by_dependencies;

/// One failure encountered while parsing a descriptor set. Parsing never
/// stops at the first error; every one collected here is reported together.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The top-level bytes didn't decode as a `FileDescriptorSet` at all;
    /// nothing else in the set could be processed.
    #[error("failed to decode descriptor set: {0}")]
    InvalidDescriptorSet(#[source] prost::DecodeError),
    /// A single file failed to register against the live pool (e.g. an
    /// unresolvable dependency, or a name collision).
    #[error("file '{file}' failed to register: {source}")]
    FileRegistration {
        /// The file that failed.
        file: String,
        /// Why `prost-reflect` rejected it.
        #[source]
        source: prost_reflect::DescriptorError,
    },
    /// The `google.api.http` extension bytes on a method failed to decode.
    #[error("method '{service}/{method}' has a malformed http rule: {source}")]
    MalformedHttpRule {
        /// Fully-qualified service name.
        service: String,
        /// Bare method name.
        method: String,
        /// The underlying decode failure.
        #[source]
        source: prost::DecodeError,
    },
    /// A binding used the `custom` pattern variant or an otherwise
    /// unrecognized kind, which this proxy cannot route on.
    #[error("method '{service}/{method}' has an unsupported http pattern")]
    UnsupportedPattern {
        /// Fully-qualified service name.
        service: String,
        /// Bare method name.
        method: String,
    },
    /// A route failed registration into the routing table (bad pattern,
    /// incompatible field path, or a duplicate).
    #[error("route for '{service}/{method}' failed: {source}")]
    RouteInvalid {
        /// Fully-qualified service name.
        service: String,
        /// Bare method name.
        method: String,
        /// Why the routing table rejected it.
        #[source]
        source: RouteError,
    },
}

/// The outcome of parsing one descriptor set.
pub struct ParseResult {
    /// The live descriptor pool backing every route's request/response
    /// types. Also serves as the type resolver for `Any` expansion during
    /// JSON encoding.
    pub pool: DescriptorPool,
    /// Every route successfully extracted, in declaration order.
    pub routes: Vec<Route>,
    /// Every failure encountered along the way.
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// A parse is only usable for a reload when nothing failed.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse raw `FileDescriptorSet` bytes into a pool and a route list.
///
/// This never returns `Err`: decode/registration/extraction failures are
/// all collected into [`ParseResult::errors`] instead, so the caller sees
/// everything wrong with one reload attempt at once. Check
/// [`ParseResult::ok`] before trusting the result for anything but
/// diagnostics.
#[must_use]
pub fn parse(raw_descriptor_set: &[u8]) -> ParseResult {
    let mut errors = Vec::new();

    let typed = match prost_types::FileDescriptorSet::decode(raw_descriptor_set) {
        Ok(set) => set,
        Err(e) => {
            errors.push(ParseError::InvalidDescriptorSet(e));
            return ParseResult {
                pool: DescriptorPool::new(),
                routes: Vec::new(),
                errors,
            };
        }
    };

    let raw_options = match restbridge_core::raw_method_options(raw_descriptor_set) {
        Ok(opts) => opts,
        Err(e) => {
            errors.push(ParseError::InvalidDescriptorSet(e));
            Vec::new()
        }
    };
    let raw_options: HashMap<(String, String), RawMethodOptions> = raw_options
        .into_iter()
        .map(|o| ((o.service.clone(), o.method.clone()), o))
        .collect();

    let mut pool = DescriptorPool::new();
    for well_known in well_known_files() {
        // These are hand-authored and known-good; a failure here is a bug
        // in this crate, not a malformed input.
        pool.add_file_descriptor_proto(well_known)
            .expect("well-known descriptor is valid");
    }

    for file in order_by_dependencies(typed.file) {
        let name = file.name().to_string();
        if let Err(source) = pool.add_file_descriptor_proto(file) {
            errors.push(ParseError::FileRegistration { file: name, source });
        }
    }

    let mut routes = Vec::new();
    for service in pool.services() {
        for method in service.methods() {
            let key = (service.full_name().to_string(), method.name().to_string());
            let Some(raw) = raw_options.get(&key) else {
                continue;
            };
            if raw.options.is_empty() {
                continue;
            }

            let bindings = match restbridge_core::extract_bindings(&raw.options) {
                Ok(b) => b,
                Err(source) => {
                    errors.push(ParseError::MalformedHttpRule {
                        service: key.0.clone(),
                        method: key.1.clone(),
                        source,
                    });
                    continue;
                }
            };

            for binding in bindings {
                let Some((core_method, template)) = binding.pattern else {
                    errors.push(ParseError::UnsupportedPattern {
                        service: key.0.clone(),
                        method: key.1.clone(),
                    });
                    continue;
                };
                routes.push(Route {
                    pattern: template,
                    method: to_method_kind(core_method),
                    body: binding.body,
                    rpc: RpcSpec {
                        service: format!("/{}", service.full_name()),
                        method: method.name().to_string(),
                        request: method.input(),
                        response: method.output(),
                    },
                });
            }
        }
    }

    ParseResult {
        pool,
        routes,
        errors,
    }
}

/// Build a [`RouteTable`] from a successful parse.
///
/// # Errors
///
/// Returns every [`RouteError`] encountered, wrapped as [`ParseError`];
/// registration order matches `result.routes`.
pub fn build_table(routes: Vec<Route>) -> Result<RouteTable, Vec<ParseError>> {
    let mut table = RouteTable::new();
    let mut errors = Vec::new();
    for route in routes {
        let service = route.rpc.service.clone();
        let method = route.rpc.method.clone();
        if let Err(source) = table.push(route) {
            errors.push(ParseError::RouteInvalid {
                service,
                method,
                source,
            });
        }
    }
    if errors.is_empty() {
        Ok(table)
    } else {
        Err(errors)
    }
}

fn to_method_kind(method: CoreHttpMethod) -> MethodKind {
    match method {
        CoreHttpMethod::Get => MethodKind::Get,
        CoreHttpMethod::Put => MethodKind::Put,
        CoreHttpMethod::Post => MethodKind::Post,
        CoreHttpMethod::Delete => MethodKind::Delete,
        CoreHttpMethod::Patch => MethodKind::Patch,
    }
}

fn well_known_files() -> Vec<FileDescriptorProto> {
    let any = FileDescriptorProto {
        name: Some("google/protobuf/any.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Any".to_string()),
            field: vec![
                scalar_field("type_url", 1, Type::String),
                scalar_field("value", 2, Type::Bytes),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };
    let timestamp = FileDescriptorProto {
        name: Some("google/protobuf/timestamp.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("Timestamp".to_string()),
            field: vec![
                scalar_field("seconds", 1, Type::Int64),
                scalar_field("nanos", 2, Type::Int32),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };
    vec![any, timestamp]
}

fn scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restbridge_core::HttpMethod;

    // Building a descriptor set that genuinely carries the `google.api.http`
    // extension, without a real `.proto` toolchain, means staying off the
    // typed `prost_types::MethodOptions` path entirely for the options
    // field. This exploits the same protobuf property `source::remote`
    // relies on: encodings of disjoint field sets for the same message type
    // merge by concatenation. The typed encode below supplies `name`,
    // `package`, and `message_type`; a hand-assembled `service` field
    // (tag 6) is concatenated on afterward, carrying real http-option bytes
    // produced by `restbridge_core::encode_http_option`.

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

    fn len_delimited(field_number: u32, payload: &[u8], out: &mut Vec<u8>) {
        out.push(((field_number << 3) | 2) as u8);
        write_varint(payload.len() as u64, out);
        out.extend_from_slice(payload);
    }

    fn string_field(field_number: u32, value: &str, out: &mut Vec<u8>) {
        len_delimited(field_number, value.as_bytes(), out);
    }

    fn method_descriptor_proto_bytes(
        name: &str,
        input_type: &str,
        output_type: &str,
        options: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        string_field(1, name, &mut out); // MethodDescriptorProto.name
        string_field(2, input_type, &mut out); // MethodDescriptorProto.input_type
        string_field(3, output_type, &mut out); // MethodDescriptorProto.output_type
        len_delimited(4, options, &mut out); // MethodDescriptorProto.options
        out
    }

    fn service_descriptor_proto_bytes(name: &str, methods: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        string_field(1, name, &mut out); // ServiceDescriptorProto.name
        for method in methods {
            len_delimited(2, method, &mut out); // ServiceDescriptorProto.method
        }
        out
    }

    /// Build a one-file descriptor set: `message_type` via the typed
    /// encoder, `service`/`method`/`options` via raw wire assembly so the
    /// `google.api.http` extension survives.
    fn build_descriptor_set_with_http_route(
        service_name: &str,
        method_name: &str,
        http_method: HttpMethod,
        template: &str,
        body: &str,
    ) -> Vec<u8> {
        let skeleton = FileDescriptorProto {
            name: Some("rules.proto".to_string()),
            package: Some("pkg".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![
                DescriptorProto {
                    name: Some("GetRuleRequest".to_string()),
                    field: vec![scalar_field("id", 1, Type::String)],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Rule".to_string()),
                    field: vec![scalar_field("id", 1, Type::String)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut file_bytes = skeleton.encode_to_vec();

        let options = restbridge_core::encode_http_option(http_method, template, body);
        let method_bytes = method_descriptor_proto_bytes(
            method_name,
            ".pkg.GetRuleRequest",
            ".pkg.Rule",
            &options,
        );
        let service_bytes = service_descriptor_proto_bytes(service_name, &[method_bytes]);
        len_delimited(6, &service_bytes, &mut file_bytes); // FileDescriptorProto.service

        let mut set_bytes = Vec::new();
        len_delimited(1, &file_bytes, &mut set_bytes); // FileDescriptorSet.file
        set_bytes
    }

    #[test]
    fn extracts_a_route_from_a_realistic_descriptor_set() {
        let bytes =
            build_descriptor_set_with_http_route("Rules", "GetRule", HttpMethod::Get, "/v1/rules/{id}", "");
        let result = parse(&bytes);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:?}",
            result
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );
        assert_eq!(result.routes.len(), 1);
        let route = &result.routes[0];
        assert_eq!(route.pattern, "/v1/rules/{id}");
        assert_eq!(route.method, MethodKind::Get);
        assert_eq!(route.rpc.service, "/pkg.Rules");
        assert_eq!(route.rpc.method, "GetRule");
    }

    #[test]
    fn methods_without_http_options_produce_no_routes() {
        let skeleton = FileDescriptorProto {
            name: Some("plain.proto".to_string()),
            package: Some("pkg".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Empty".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut file_bytes = skeleton.encode_to_vec();
        let method_bytes =
            method_descriptor_proto_bytes("Ping", ".pkg.Empty", ".pkg.Empty", &[]);
        let service_bytes = service_descriptor_proto_bytes("Plain", &[method_bytes]);
        len_delimited(6, &service_bytes, &mut file_bytes);
        let mut set_bytes = Vec::new();
        len_delimited(1, &file_bytes, &mut set_bytes);

        let result = parse(&set_bytes);
        assert!(result.errors.is_empty());
        assert!(result.routes.is_empty());
    }

    #[test]
    fn invalid_top_level_bytes_produce_one_error_and_an_empty_pool() {
        let result = parse(b"not a descriptor set \xff\xff");
        assert!(!result.errors.is_empty());
        assert!(result.routes.is_empty());
    }

    #[test]
    fn build_table_surfaces_route_errors() {
        let bytes = build_descriptor_set_with_http_route(
            "Rules",
            "GetRule",
            HttpMethod::Get,
            "/v1/rules/{id}",
            "",
        );
        let result = parse(&bytes);
        assert!(result.errors.is_empty());
        let mut routes = result.routes;
        routes.push(routes[0].clone());
        let err = build_table(routes).unwrap_err();
        assert_eq!(err.len(), 1);
    }
}

