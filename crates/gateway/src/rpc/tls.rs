// Endpoint resolution and the opt-in TLS connector that skips certificate
// verification.
//
// Endpoints without a scheme are dialed over TLS, `http://` endpoints in
// plaintext. Certificates are verified against the webpki roots unless the
// operator sets `GITGATE_GIT_INSECURE_SKIP_VERIFY`.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use hyper_util::rt::TokioIo;
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};
use tonic::transport::Uri;
use tower::Service;

use super::GitRpcError;

const HTTP2_ALPN: &[u8] = b"h2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSecurity {
    Plaintext,
    Verified,
    Unverified,
}

/// A git service endpoint ready to be dialed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// Origin presented on every request (`scheme://host:port`).
    pub origin: String,
    /// Host without IPv6 brackets, used for DNS and SNI.
    pub host: String,
    pub port: u16,
    pub security: TransportSecurity,
}

impl ResolvedEndpoint {
    /// Plaintext URI handed to tonic when the TLS handshake happens in our
    /// own connector.
    pub fn dial_uri(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

pub fn resolve_endpoint(
    raw: &str,
    insecure_skip_verify: bool,
) -> Result<ResolvedEndpoint, GitRpcError> {
    let trimmed = raw.trim();
    let with_scheme =
        if trimmed.contains("://") { trimmed.to_owned() } else { format!("https://{trimmed}") };

    let invalid = |reason: &str| GitRpcError::InvalidEndpoint {
        endpoint: trimmed.to_owned(),
        reason: reason.to_owned(),
    };

    let uri: Uri = with_scheme.parse().map_err(|_| invalid("not a valid URI"))?;
    let security = match uri.scheme_str() {
        Some("http") => TransportSecurity::Plaintext,
        Some("https") if insecure_skip_verify => TransportSecurity::Unverified,
        Some("https") => TransportSecurity::Verified,
        _ => return Err(invalid("scheme must be http or https")),
    };

    let host = uri
        .host()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_owned())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    let port = uri.port_u16().unwrap_or(match security {
        TransportSecurity::Plaintext => 80,
        TransportSecurity::Verified | TransportSecurity::Unverified => 443,
    });
    let scheme = if security == TransportSecurity::Plaintext { "http" } else { "https" };
    let authority =
        if host.contains(':') { format!("[{host}]:{port}") } else { format!("{host}:{port}") };

    Ok(ResolvedEndpoint { origin: format!("{scheme}://{authority}"), host, port, security })
}

/// Dials TCP and completes a TLS handshake that accepts any server
/// certificate. Handshake signatures are still checked.
#[derive(Clone)]
pub struct UnverifiedTlsConnector {
    config: Arc<ClientConfig>,
    host: String,
    port: u16,
}

impl UnverifiedTlsConnector {
    pub fn new(endpoint: &ResolvedEndpoint) -> Result<Self, GitRpcError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|error| GitRpcError::Tls(error.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
            .with_no_client_auth();
        config.alpn_protocols = vec![HTTP2_ALPN.to_vec()];

        Ok(Self { config: Arc::new(config), host: endpoint.host.clone(), port: endpoint.port })
    }
}

impl Service<Uri> for UnverifiedTlsConnector {
    type Response = TokioIo<TlsStream<TcpStream>>;
    type Error = std::io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let connector = TlsConnector::from(Arc::clone(&self.config));
        let host = self.host.clone();
        let port = self.port;

        Box::pin(async move {
            let server_name = ServerName::try_from(host.clone())
                .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidInput, error))?;
            let tcp = TcpStream::connect((host.as_str(), port)).await?;
            tcp.set_nodelay(true)?;
            let tls = connector.connect(server_name, tcp).await?;
            Ok(TokioIo::new(tls))
        })
    }
}

#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
