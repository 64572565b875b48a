//! Descriptor sources: where a `FileDescriptorSet` comes from.

mod local;
mod remote;

pub use local::{LocalSource, LocalSourceError};
pub use remote::{ReflectionVersion, RemoteSource, RemoteSourceError};

/// Fetch fresh descriptor bytes, either from a local directory or a remote
/// reflection service.
///
/// The returned bytes are a raw, not-yet-decoded `FileDescriptorSet`
/// encoding. They are deliberately not decoded here: a typed
/// `prost_types::FileDescriptorSet` decode would silently drop the
/// `google.api.http` extension on nested `MethodOptions` before the schema
/// parser ever gets a chance to read it with
/// `restbridge_core::raw_method_options`.
#[derive(Clone)]
pub enum DescriptorSource {
    /// Scan a local directory for `.desc` files.
    Local(LocalSource),
    /// Query a remote gRPC reflection service.
    Remote(RemoteSource),
}

/// Error fetching descriptors, regardless of source kind.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorSourceError {
    /// Local filesystem scan failed.
    #[error(transparent)]
    Local(#[from] LocalSourceError),
    /// Remote reflection exchange failed.
    #[error(transparent)]
    Remote(#[from] RemoteSourceError),
}

impl DescriptorSource {
    /// Fetch the current raw `FileDescriptorSet` bytes from this source.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorSourceError`] when the directory is missing/not a
    /// directory, no descriptor files are found, or the reflection exchange
    /// fails or times out.
    pub async fn fetch(&self) -> Result<Vec<u8>, DescriptorSourceError> {
        match self {
            Self::Local(s) => Ok(s.fetch()?),
            Self::Remote(s) => Ok(s.fetch().await?),
        }
    }
}
