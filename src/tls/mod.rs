//! TLS/SSL certificate inspection.
//!
//! This module connects to HTTPS endpoints, captures the leaf certificate and
//! judges it on two points only:
//! - expiry (`notAfter` in the past)
//! - hostname coverage (CN/SAN, wildcard and IDN aware)
//!
//! Chain trust is deliberately not evaluated: the handshake uses a verifier
//! that accepts any chain but still checks handshake signatures, so expired or
//! self-issued certificates can be inspected instead of aborting the
//! connection. Uses `tokio-rustls` for the connection and `x509-parser` for
//! parsing.

mod extract;
mod hostname;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::DateTime;
use log::{debug, warn};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::{TCP_CONNECT_TIMEOUT_SECS, TLS_HANDSHAKE_TIMEOUT_SECS};
use crate::error_handling::CheckErrorKind;
use crate::time_utils::Timestamp;

use extract::{extract_certificate_sans, extract_common_name, extract_not_after};
pub use hostname::{hostname_matches, to_ascii_hostname};

/// Outcome of a certificate inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SslCheckResult {
    pub valid: bool,
    pub error: Option<String>,
    pub error_kind: Option<CheckErrorKind>,
    pub expires_at: Option<Timestamp>,
    pub days_until_expiry: Option<i64>,
    pub subject_cn: Option<String>,
    pub san_list: Vec<String>,
}

impl SslCheckResult {
    fn failure(kind: CheckErrorKind, error: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
            error_kind: Some(kind),
            ..Default::default()
        }
    }
}

/// Connection-level failures of the certificate probe.
#[derive(Error, Debug)]
enum TlsProbeError {
    #[error("DNS resolution error: {0}")]
    Resolve(String),
    #[error("SSL connection timeout")]
    Timeout,
    #[error("SSL error: {0}")]
    Connection(String),
    #[error("SSL error: server presented no certificate")]
    NoCertificate,
}

impl TlsProbeError {
    fn kind(&self) -> CheckErrorKind {
        match self {
            TlsProbeError::Resolve(_) => CheckErrorKind::SslMismatch,
            _ => CheckErrorKind::SslExpired,
        }
    }
}

/// Inspects the certificate served by `hostname:port`.
///
/// Never fails: connection problems are reported as an invalid result with
/// the matching error kind.
pub async fn check_ssl(hostname: &str, port: u16, now: Timestamp) -> SslCheckResult {
    match fetch_leaf_certificate(hostname, port).await {
        Ok(der) => evaluate_certificate(der.as_ref(), hostname, now),
        Err(e) => {
            warn!("Certificate probe for {hostname}:{port} failed: {e}");
            SslCheckResult::failure(e.kind(), e.to_string())
        }
    }
}

/// Judges a DER-encoded leaf certificate against `hostname` at `now`.
pub fn evaluate_certificate(der: &[u8], hostname: &str, now: Timestamp) -> SslCheckResult {
    let cert = match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => cert,
        Err(e) => {
            return SslCheckResult::failure(
                CheckErrorKind::SslExpired,
                format!("SSL check error: {e}"),
            )
        }
    };

    let Some(expires_at) = DateTime::from_timestamp(extract_not_after(&cert), 0) else {
        return SslCheckResult::failure(
            CheckErrorKind::SslExpired,
            "SSL certificate has no expiry date".to_string(),
        );
    };
    let expires_at = expires_at.with_timezone(&now.timezone());
    let subject_cn = extract_common_name(&cert);
    let san_list = extract_certificate_sans(&cert);

    let verdict = judge_certificate(hostname, expires_at, subject_cn.as_deref(), &san_list, now);
    SslCheckResult {
        expires_at: Some(expires_at),
        subject_cn,
        san_list,
        ..verdict
    }
}

/// Expiry first, then hostname coverage.
fn judge_certificate(
    hostname: &str,
    expires_at: Timestamp,
    subject_cn: Option<&str>,
    san_list: &[String],
    now: Timestamp,
) -> SslCheckResult {
    let remaining = expires_at - now;
    if remaining.num_seconds() < 0 {
        let overdue_days = (-remaining.num_seconds() + 86_399) / 86_400;
        return SslCheckResult {
            days_until_expiry: Some(-overdue_days),
            ..SslCheckResult::failure(
                CheckErrorKind::SslExpired,
                format!("SSL certificate expired {overdue_days} days ago"),
            )
        };
    }
    let days_until_expiry = Some(remaining.num_days());

    if !hostname_matches(hostname, subject_cn, san_list) {
        return SslCheckResult {
            days_until_expiry,
            ..SslCheckResult::failure(
                CheckErrorKind::SslMismatch,
                format!(
                    "SSL certificate CN/SAN mismatch. Hostname: {hostname}, CN: {}, SAN: {:?}",
                    subject_cn.unwrap_or("None"),
                    san_list
                ),
            )
        };
    }

    SslCheckResult {
        valid: true,
        days_until_expiry,
        ..Default::default()
    }
}

/// Performs a TLS handshake and returns the peer's leaf certificate.
async fn fetch_leaf_certificate(
    hostname: &str,
    port: u16,
) -> Result<CertificateDer<'static>, TlsProbeError> {
    let ascii_host = to_ascii_hostname(hostname);
    debug!("Fetching certificate for {ascii_host}:{port}");

    let addrs: Vec<_> = tokio::net::lookup_host((ascii_host.as_str(), port))
        .await
        .map_err(|e| TlsProbeError::Resolve(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(TlsProbeError::Resolve(format!(
            "no addresses for {ascii_host}"
        )));
    }

    let server_name = ServerName::try_from(ascii_host.clone())
        .map_err(|e| TlsProbeError::Resolve(format!("invalid server name: {e}")))?;
    let config = inspection_client_config().map_err(|e| TlsProbeError::Connection(e.to_string()))?;

    let sock = match tokio::time::timeout(
        Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
        TcpStream::connect(addrs.as_slice()),
    )
    .await
    {
        Ok(Ok(sock)) => sock,
        Ok(Err(e)) => {
            return Err(TlsProbeError::Connection(format!(
                "failed to connect to {ascii_host}:{port}: {e}"
            )))
        }
        Err(_) => return Err(TlsProbeError::Timeout),
    };

    let connector = TlsConnector::from(Arc::new(config));
    let tls_stream = match tokio::time::timeout(
        Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
        connector.connect(server_name, sock),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(TlsProbeError::Connection(format!(
                "handshake with {ascii_host} failed: {e}"
            )))
        }
        Err(_) => return Err(TlsProbeError::Timeout),
    };

    tls_stream
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|cert| cert.clone().into_owned())
        .ok_or(TlsProbeError::NoCertificate)
}

fn inspection_client_config() -> Result<ClientConfig> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| anyhow!("unsupported TLS protocol versions: {e}"))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InspectOnlyVerifier { provider }))
        .with_no_client_auth();
    Ok(config)
}

/// Accepts any certificate chain; handshake signatures are still verified.
#[derive(Debug)]
struct InspectOnlyVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InspectOnlyVerifier {
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
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
