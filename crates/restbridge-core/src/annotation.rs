//! Minimal protobuf types for extracting `google.api.http` from `MethodOptions`.
//!
//! Standard [`prost_types::MethodOptions`] drops the `google.api.http`
//! extension (field 72295728) during decoding because prost doesn't retain
//! unknown fields. These types preserve it by declaring the field directly.

use prost::Message as _;

#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod wire {
    use prost::Message;

    /// `google.protobuf.MethodOptions` with the `google.api.http` extension.
    #[derive(Clone, PartialEq, Message)]
    pub struct MethodOptions {
        #[prost(message, optional, tag = "72295728")]
        pub http: Option<HttpRule>,
    }

    /// `google.api.HttpRule` — the REST mapping for one RPC method.
    #[derive(Clone, PartialEq, Message)]
    pub struct HttpRule {
        #[prost(oneof = "HttpPattern", tags = "2, 3, 4, 5, 6, 8")]
        pub pattern: Option<HttpPattern>,
        #[prost(string, tag = "7")]
        pub body: String,
        #[prost(message, repeated, tag = "11")]
        pub additional_bindings: Vec<HttpRule>,
    }

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum HttpPattern {
        #[prost(string, tag = "2")]
        Get(String),
        #[prost(string, tag = "3")]
        Put(String),
        #[prost(string, tag = "4")]
        Post(String),
        #[prost(string, tag = "5")]
        Delete(String),
        #[prost(string, tag = "6")]
        Patch(String),
        /// `CustomHttpPattern` — contents unused, only its presence matters.
        #[prost(message, tag = "8")]
        Custom(CustomHttpPattern),
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct CustomHttpPattern {
        #[prost(string, optional, tag = "1")]
        pub kind: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub path: Option<String>,
    }

    /// A structural walk down to per-method `MethodOptions`, keeping the
    /// `options` submessage as raw bytes instead of decoding it into
    /// `google.protobuf.MethodOptions` (which would drop the extension all
    /// over again at this level).
    #[derive(Clone, PartialEq, Message)]
    pub struct FileDescriptorSet {
        #[prost(message, repeated, tag = "1")]
        pub file: Vec<FileDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct FileDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub package: Option<String>,
        #[prost(message, repeated, tag = "6")]
        pub service: Vec<ServiceDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct ServiceDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(message, repeated, tag = "2")]
        pub method: Vec<MethodDescriptorProto>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MethodDescriptorProto {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(bytes = "vec", tag = "4")]
        pub options: Vec<u8>,
    }
}

/// The five HTTP methods an `HttpRule` pattern can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
}

/// One flattened HTTP binding extracted from a method's `google.api.http`
/// option, including those reached transitively through `additional_bindings`.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpBinding {
    /// `Some((method, template))` for a standard pattern, `None` for the
    /// `custom` oneof variant, which this crate cannot interpret further.
    pub pattern: Option<(HttpMethod, String)>,
    /// The raw `body` selector string (`""`, `"*"`, or a field path).
    pub body: String,
}

/// Extract every HTTP binding (primary plus transitive `additional_bindings`)
/// from a method's raw, serialized `MethodOptions` bytes.
///
/// Returns an empty list when the method carries no `google.api.http` option.
/// Bindings are returned breadth-first: the primary rule first, then each
/// direct `additional_binding`, then bindings nested inside those.
pub fn extract_bindings(method_options: &[u8]) -> Result<Vec<HttpBinding>, prost::DecodeError> {
    let options = wire::MethodOptions::decode(method_options)?;
    let Some(primary) = options.http else {
        return Ok(Vec::new());
    };

    let mut out = vec![to_binding(&primary)];
    let mut queue: std::collections::VecDeque<&wire::HttpRule> =
        primary.additional_bindings.iter().collect();
    while let Some(rule) = queue.pop_front() {
        out.push(to_binding(rule));
        queue.extend(rule.additional_bindings.iter());
    }
    Ok(out)
}

/// The raw, still-encoded `MethodOptions` bytes for one method, located by
/// walking a serialized `FileDescriptorSet` structurally rather than through
/// a fully-typed decode (which would drop the extension before this crate
/// ever sees it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMethodOptions {
    /// The file this method's service is declared in.
    pub file: String,
    /// Fully-qualified service name, e.g. `pkg.Rules`.
    pub service: String,
    /// Bare method name, e.g. `GetRule`.
    pub method: String,
    /// The method's raw `MethodOptions` bytes, empty when the method
    /// declares no options at all.
    pub options: Vec<u8>,
}

/// Walk a serialized `FileDescriptorSet` and collect every method's raw
/// `MethodOptions` bytes, preserving unknown extension fields for
/// [`extract_bindings`] to decode.
pub fn raw_method_options(descriptor_set: &[u8]) -> Result<Vec<RawMethodOptions>, prost::DecodeError> {
    let set = wire::FileDescriptorSet::decode(descriptor_set)?;
    let mut out = Vec::new();
    for file in &set.file {
        let file_name = file.name.clone().unwrap_or_default();
        let package = file.package.clone().unwrap_or_default();
        for service in &file.service {
            let service_name = service.name.clone().unwrap_or_default();
            let full_service = if package.is_empty() {
                service_name.clone()
            } else {
                format!("{package}.{service_name}")
            };
            for method in &service.method {
                out.push(RawMethodOptions {
                    file: file_name.clone(),
                    service: full_service.clone(),
                    method: method.name.clone().unwrap_or_default(),
                    options: method.options.clone(),
                });
            }
        }
    }
    Ok(out)
}

/// Encode a single-pattern `google.api.http` option as raw `MethodOptions`
/// bytes — the inverse of [`extract_bindings`]. Useful for building
/// synthetic descriptor sets (tests, fixtures, schema-generation tools)
/// without round-tripping through a full `.proto` toolchain.
#[must_use]
pub fn encode_http_option(method: HttpMethod, template: &str, body: &str) -> Vec<u8> {
    let pattern = match method {
        HttpMethod::Get => wire::HttpPattern::Get(template.to_string()),
        HttpMethod::Put => wire::HttpPattern::Put(template.to_string()),
        HttpMethod::Post => wire::HttpPattern::Post(template.to_string()),
        HttpMethod::Delete => wire::HttpPattern::Delete(template.to_string()),
        HttpMethod::Patch => wire::HttpPattern::Patch(template.to_string()),
    };
    let options = wire::MethodOptions {
        http: Some(wire::HttpRule {
            pattern: Some(pattern),
            body: body.to_string(),
            additional_bindings: Vec::new(),
        }),
    };
    options.encode_to_vec()
}

fn to_binding(rule: &wire::HttpRule) -> HttpBinding {
    let pattern = rule.pattern.as_ref().and_then(|p| match p {
        wire::HttpPattern::Get(path) => Some((HttpMethod::Get, path.clone())),
        wire::HttpPattern::Put(path) => Some((HttpMethod::Put, path.clone())),
        wire::HttpPattern::Post(path) => Some((HttpMethod::Post, path.clone())),
        wire::HttpPattern::Delete(path) => Some((HttpMethod::Delete, path.clone())),
        wire::HttpPattern::Patch(path) => Some((HttpMethod::Patch, path.clone())),
        wire::HttpPattern::Custom(_) => None,
    });
    HttpBinding {
        pattern,
        body: rule.body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::wire::{CustomHttpPattern, HttpPattern, HttpRule, MethodOptions};
    use super::*;

    fn encode(options: &MethodOptions) -> Vec<u8> {
        options.encode_to_vec()
    }

    #[test]
    fn no_options_yields_empty() {
        let options = MethodOptions { http: None };
        assert_eq!(extract_bindings(&encode(&options)).unwrap(), Vec::new());
    }

    #[test]
    fn single_get_binding() {
        let options = MethodOptions {
            http: Some(HttpRule {
                pattern: Some(HttpPattern::Get("/v1/items".into())),
                body: String::new(),
                additional_bindings: vec![],
            }),
        };
        let bindings = extract_bindings(&encode(&options)).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(
            bindings[0].pattern,
            Some((HttpMethod::Get, "/v1/items".to_string()))
        );
        assert_eq!(bindings[0].body, "");
    }

    #[test]
    fn post_with_body() {
        let options = MethodOptions {
            http: Some(HttpRule {
                pattern: Some(HttpPattern::Post("/v1/items".into())),
                body: "*".into(),
                additional_bindings: vec![],
            }),
        };
        let bindings = extract_bindings(&encode(&options)).unwrap();
        assert_eq!(bindings[0].body, "*");
    }

    #[test]
    fn custom_pattern_has_no_method() {
        let options = MethodOptions {
            http: Some(HttpRule {
                pattern: Some(HttpPattern::Custom(CustomHttpPattern {
                    kind: Some("HEAD".into()),
                    path: Some("/v1/items".into()),
                })),
                body: String::new(),
                additional_bindings: vec![],
            }),
        };
        let bindings = extract_bindings(&encode(&options)).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].pattern, None);
    }

    #[test]
    fn additional_bindings_flattened_breadth_first() {
        let options = MethodOptions {
            http: Some(HttpRule {
                pattern: Some(HttpPattern::Get("/v1/items".into())),
                body: String::new(),
                additional_bindings: vec![
                    HttpRule {
                        pattern: Some(HttpPattern::Get("/v2/items".into())),
                        body: String::new(),
                        additional_bindings: vec![HttpRule {
                            pattern: Some(HttpPattern::Get("/v3/items".into())),
                            body: String::new(),
                            additional_bindings: vec![],
                        }],
                    },
                    HttpRule {
                        pattern: Some(HttpPattern::Put("/v2/items/{id}".into())),
                        body: String::new(),
                        additional_bindings: vec![],
                    },
                ],
            }),
        };
        let bindings = extract_bindings(&encode(&options)).unwrap();
        let templates: Vec<_> = bindings
            .iter()
            .map(|b| b.pattern.clone().unwrap().1)
            .collect();
        assert_eq!(
            templates,
            vec!["/v1/items", "/v2/items", "/v2/items/{id}", "/v3/items"]
        );
    }

    #[test]
    fn raw_method_options_survives_a_full_descriptor_set_round_trip() {
        let http_options = MethodOptions {
            http: Some(HttpRule {
                pattern: Some(HttpPattern::Get("/v1/items/{id}".into())),
                body: String::new(),
                additional_bindings: vec![],
            }),
        };
        let set = super::wire::FileDescriptorSet {
            file: vec![super::wire::FileDescriptorProto {
                name: Some("rules.proto".into()),
                package: Some("pkg".into()),
                service: vec![super::wire::ServiceDescriptorProto {
                    name: Some("Rules".into()),
                    method: vec![
                        super::wire::MethodDescriptorProto {
                            name: Some("GetRule".into()),
                            options: encode(&http_options),
                        },
                        super::wire::MethodDescriptorProto {
                            name: Some("PlainRpc".into()),
                            options: Vec::new(),
                        },
                    ],
                }],
            }],
        };
        let methods = raw_method_options(&set.encode_to_vec()).unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].file, "rules.proto");
        assert_eq!(methods[0].service, "pkg.Rules");
        assert_eq!(methods[0].method, "GetRule");
        let bindings = extract_bindings(&methods[0].options).unwrap();
        assert_eq!(
            bindings[0].pattern,
            Some((HttpMethod::Get, "/v1/items/{id}".to_string()))
        );
        assert!(methods[1].options.is_empty());
    }
}
