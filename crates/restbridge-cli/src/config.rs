//! Layered application configuration.
//!
//! Three layers, lowest to highest precedence: compiled-in defaults (the
//! [`Default`] impls below, via each field's `#[serde(default)]`), the YAML
//! file named by `--config`, then environment variables prefixed `APP_`
//! with `__` as the nesting separator (e.g. `APP_TRANSPORT__HTTP__ADDR`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;

use crate::error::BootstrapError;

const ENV_PREFIX: &str = "APP_";
const ENV_SPLIT: &str = "__";

/// Minimum per-request RPC timeout, enforced at validation (per the
/// concurrency model: cancellation must have somewhere meaningful to land).
const MIN_RPC_TIMEOUT: Duration = Duration::from_millis(100);

/// Root configuration structure, layered and validated once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP transport (listener + server timeouts).
    pub transport: TransportConfig,
    /// Where to fetch the schema's `FileDescriptorSet` from.
    pub descriptors: DescriptorsConfig,
    /// Outbound RPC gateways.
    pub gateways: GatewaysConfig,
    /// Logging backend configuration.
    pub logging: LoggingConfig,
}

/// `transport.*`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `transport.http`.
    pub http: HttpConfig,
}

/// `transport.http.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub addr: String,
    /// Maximum accepted request body size, in KiB.
    pub max_request_size_kb: u64,
    /// Per-request timeout covering the whole transcode-and-invoke path.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// `transport.http.server`.
    pub server: HttpServerConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            max_request_size_kb: 4096,
            request_timeout: Duration::from_secs(10),
            server: HttpServerConfig::default(),
        }
    }
}

/// `transport.http.server.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// How long in-flight requests get to finish after a shutdown signal.
    #[serde(with = "humantime_serde")]
    pub graceful_timeout: Duration,
    /// Time limit for reading a full request body.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Time limit for reading request headers.
    #[serde(with = "humantime_serde")]
    pub read_header_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            read_header_timeout: Duration::from_secs(5),
        }
    }
}

/// Which kind of schema descriptor source is active, and its sub-config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DescriptorsConfig {
    /// Selects which of `local`/`remote` below is consulted.
    pub kind: DescriptorKind,
    /// Present when `kind == local`.
    pub local: Option<LocalDescriptorConfig>,
    /// Present when `kind == remote`.
    pub remote: Option<RemoteDescriptorConfig>,
}

impl Default for DescriptorsConfig {
    fn default() -> Self {
        Self {
            kind: DescriptorKind::Local,
            local: Some(LocalDescriptorConfig::default()),
            remote: None,
        }
    }
}

/// `descriptors.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    /// Scan a local directory of `.desc` files.
    Local,
    /// Query the backend's reflection service.
    Remote,
}

/// `descriptors.local.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalDescriptorConfig {
    /// Directory to scan recursively for `.desc` files.
    pub dir: PathBuf,
}

impl Default for LocalDescriptorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("descriptors"),
        }
    }
}

/// `descriptors.remote.*`. The reflection stream runs over the same
/// backend channel configured under `gateways.grpc.client`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteDescriptorConfig {
    /// Bound on the whole `ListServices` → `FileContainingSymbol*` exchange.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Fully-qualified reflection RPC path. Empty selects the built-in
    /// `v1` default.
    pub reflection_service_name: String,
    /// Fully-qualified service names to never ask reflection about.
    pub exclude: Vec<String>,
}

impl Default for RemoteDescriptorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            reflection_service_name: String::new(),
            exclude: restbridge_schema::RemoteSource::default_exclude(),
        }
    }
}

/// `gateways.*`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewaysConfig {
    /// `gateways.grpc`.
    pub grpc: GrpcGatewayConfig,
}

/// `gateways.grpc.*`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GrpcGatewayConfig {
    /// `gateways.grpc.client`.
    pub client: GrpcClientConfig,
}

/// `gateways.grpc.client.*`: the single backend channel shared by every
/// transcoded request and, when `descriptors.kind == remote`, the
/// reflection exchange too.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrpcClientConfig {
    /// Backend address, e.g. `https://backend.internal:9090`.
    pub target_addr: String,
    /// Per-RPC timeout. Must exceed [`MIN_RPC_TIMEOUT`].
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Dial over TLS.
    pub tls: bool,
    /// Skip server certificate verification. Only meaningful when `tls` is set.
    pub tls_skip_verify: bool,
}

impl Default for GrpcClientConfig {
    fn default() -> Self {
        Self {
            target_addr: "http://127.0.0.1:9090".to_string(),
            request_timeout: Duration::from_secs(5),
            tls: false,
            tls_skip_verify: false,
        }
    }
}

/// `logging.*`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `"trace"` | `"debug"` | `"info"` | `"warn"` | `"error"`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// `logging.format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, ANSI-colored output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl AppConfig {
    /// Layer compiled defaults, `config_path`, then `APP_`-prefixed
    /// environment variables, and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::ConfigInvalid`] if the file can't be
    /// parsed, required fields are missing, or validation fails.
    pub fn load(config_path: &Path) -> Result<Self, BootstrapError> {
        let config: Self = Self::figment(config_path)
            .extract()
            .map_err(|e| BootstrapError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_path: &Path) -> Figment {
        // `AppConfig::default()` plus every sub-struct's `#[serde(default)]`
        // is the compiled-defaults layer; Figment only needs to know about
        // the file and environment on top of it.
        Figment::new()
            .merge(Yaml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SPLIT))
    }

    /// Validate cross-field invariants the type system can't express.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::ConfigInvalid`] when the selected
    /// descriptor kind has no matching sub-config, or the per-request RPC
    /// timeout doesn't exceed [`MIN_RPC_TIMEOUT`].
    pub fn validate(&self) -> Result<(), BootstrapError> {
        match self.descriptors.kind {
            DescriptorKind::Local if self.descriptors.local.is_none() => {
                return Err(BootstrapError::ConfigInvalid(
                    "descriptors.kind is 'local' but descriptors.local is not set".to_string(),
                ));
            }
            DescriptorKind::Remote if self.descriptors.remote.is_none() => {
                return Err(BootstrapError::ConfigInvalid(
                    "descriptors.kind is 'remote' but descriptors.remote is not set".to_string(),
                ));
            }
            DescriptorKind::Local | DescriptorKind::Remote => {}
        }

        if self.gateways.grpc.client.request_timeout <= MIN_RPC_TIMEOUT {
            return Err(BootstrapError::ConfigInvalid(format!(
                "gateways.grpc.client.request_timeout ({:?}) must exceed {MIN_RPC_TIMEOUT:?}",
                self.gateways.grpc.client.request_timeout
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_yaml(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("restbridge_cli_test_{name}.yaml"));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn loads_minimal_yaml_over_defaults() {
        let path = write_yaml(
            "minimal",
            "transport:\n  http:\n    addr: \"0.0.0.0:9999\"\n",
        );
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.transport.http.addr, "0.0.0.0:9999");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn remote_kind_without_subconfig_fails_validation() {
        let path = write_yaml("remote-missing", "descriptors:\n  kind: remote\n");
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, BootstrapError::ConfigInvalid(_)));
    }

    #[test]
    fn rpc_timeout_at_or_below_minimum_fails_validation() {
        let path = write_yaml(
            "short-timeout",
            "gateways:\n  grpc:\n    client:\n      request_timeout: \"50ms\"\n",
        );
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, BootstrapError::ConfigInvalid(_)));
    }

    #[test]
    fn env_override_takes_precedence_over_yaml() {
        let path = write_yaml(
            "env-override",
            "transport:\n  http:\n    addr: \"1.2.3.4:1\"\n",
        );
        std::env::set_var("APP_TRANSPORT__HTTP__ADDR", "9.9.9.9:9");
        let config = AppConfig::load(&path);
        std::env::remove_var("APP_TRANSPORT__HTTP__ADDR");
        assert_eq!(config.unwrap().transport.http.addr, "9.9.9.9:9");
    }
}
