//! Backend gRPC channel construction: plaintext, standard TLS (native root
//! store), or TLS with certificate verification disabled.

use std::sync::Arc;

use hyper_util::rt::TokioIo;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tower::service_fn;

use crate::config::GrpcClientConfig;
use crate::error::BootstrapError;

/// Build the single long-lived channel shared by every transcoded request
/// (and, when descriptors are sourced remotely, the reflection stream).
///
/// # Errors
///
/// Returns [`BootstrapError::ChannelInvalid`] if `target_addr` doesn't
/// parse as a URI, TLS configuration fails, or the initial connection
/// attempt fails.
pub async fn connect(config: &GrpcClientConfig) -> Result<Channel, BootstrapError> {
    let endpoint = Endpoint::from_shared(config.target_addr.clone())
        .map_err(|e| BootstrapError::ChannelInvalid(format!("invalid target_addr: {e}")))?
        .timeout(config.request_timeout);

    if !config.tls {
        return endpoint
            .connect()
            .await
            .map_err(|e| BootstrapError::ChannelInvalid(e.to_string()));
    }

    if config.tls_skip_verify {
        return connect_insecure(endpoint).await;
    }

    let tls = ClientTlsConfig::new().with_native_roots();
    endpoint
        .tls_config(tls)
        .map_err(|e| BootstrapError::ChannelInvalid(format!("TLS configuration: {e}")))?
        .connect()
        .await
        .map_err(|e| BootstrapError::ChannelInvalid(e.to_string()))
}

/// Dial with TLS but accept any server certificate. Tonic's
/// [`ClientTlsConfig`] has no "skip verify" knob, so this drops to a raw
/// rustls `ClientConfig` behind a custom connector instead.
async fn connect_insecure(endpoint: Endpoint) -> Result<Channel, BootstrapError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let rustls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| BootstrapError::ChannelInvalid(format!("TLS configuration: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth();
    let connector = tokio_rustls::TlsConnector::from(Arc::new(rustls_config));

    let uri = endpoint.uri().clone();
    let host = uri.host().unwrap_or("localhost").to_string();
    let authority = uri.authority().cloned().ok_or_else(|| {
        BootstrapError::ChannelInvalid("target_addr has no host:port authority".to_string())
    })?;

    endpoint
        .connect_with_connector(service_fn(move |_: http::Uri| {
            let connector = connector.clone();
            let host = host.clone();
            let authority = authority.clone();
            async move {
                let tcp = tokio::net::TcpStream::connect(authority.as_str()).await?;
                let server_name = rustls::pki_types::ServerName::try_from(host)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
                let tls_stream = connector.connect(server_name, tcp).await?;
                Ok::<_, std::io::Error>(TokioIo::new(tls_stream))
            }
        }))
        .await
        .map_err(|e| BootstrapError::ChannelInvalid(e.to_string()))
}

/// Accepts any server certificate. Used only when `tls_skip_verify` is
/// explicitly set.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
