//! Process-level errors produced while bootstrapping or reloading the
//! gateway.
//!
//! Everything here is fatal to either the whole process (startup) or one
//! reload attempt — request-time errors live in `restbridge-runtime`
//! instead and never reach this type.

/// Errors surfaced by bootstrap and by the reload-signal handler.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Configuration failed to load or didn't pass validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The descriptor source could not produce a `FileDescriptorSet`.
    #[error("descriptor source unavailable: {0}")]
    DescriptorUnavailable(#[source] restbridge_schema::DescriptorSourceError),

    /// Descriptor parsing, type registration, or binding extraction
    /// failed for one or more methods.
    #[error("schema invalid: {count} error(s) parsing descriptors")]
    SchemaInvalid {
        /// Number of accumulated parse errors.
        count: usize,
    },

    /// Failed to build the routing table from an otherwise-valid route
    /// list (duplicate template, bad field path).
    #[error("failed to build routing table: {0}")]
    TableInvalid(String),

    /// The backend gRPC channel could not be constructed.
    #[error("failed to configure backend channel: {0}")]
    ChannelInvalid(String),

    /// The HTTP listener could not bind to the configured address.
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    ListenerBindFailed {
        /// The address that failed to bind.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
