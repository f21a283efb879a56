//! TLS configuration and certificate provisioning.
//!
//! # Responsibilities
//! - Make sure a TLS instance has a cert/key pair on disk before it binds
//! - Generate a self-signed P-384 certificate when either file is missing
//! - Load the pair into a rustls server config
//! - Build the client config used toward the backend
//!
//! # Design Decisions
//! - Existence is the only check: an expired or mismatched pair on disk is
//!   used as-is and never regenerated
//! - The backend link is trusted; its certificate is not verified
//! - Keys are written as PKCS#8 ("BEGIN PRIVATE KEY"), not SEC1
//!   ("BEGIN EC PRIVATE KEY"); rustls loads either form

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rand::RngCore;
use rcgen::{
    CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
    SerialNumber, PKCS_ECDSA_P384_SHA384,
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;

/// Organization placed in the subject of generated certificates.
pub const CERT_ORGANIZATION: &str = "Mythic C2";

/// Validity of generated certificates.
pub const CERT_VALIDITY_DAYS: i64 = 365;

/// Error type for TLS provisioning and loading.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),
    #[error("failed to load TLS material from {cert} / {key}: {source}")]
    Load {
        cert: PathBuf,
        key: PathBuf,
        source: std::io::Error,
    },
    #[error("TLS client setup failed: {0}")]
    Client(#[from] rustls::Error),
}

/// A freshly generated certificate and private key, both PEM.
pub struct SelfSignedCert {
    pub cert_pem: String,
    pub key_pem: String,
}

impl SelfSignedCert {
    /// Generate a self-signed server certificate on a new P-384 key.
    pub fn generate() -> Result<Self, TlsError> {
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384)?;

        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::OrganizationName, CERT_ORGANIZATION);
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.serial_number = Some(random_serial());
        params.not_before = time::OffsetDateTime::now_utc();
        params.not_after = params.not_before + time::Duration::days(CERT_VALIDITY_DAYS);

        let cert = params.self_signed(&key_pair)?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    /// Write the certificate, then the key with owner-only permissions.
    pub fn save(&self, cert_path: &Path, key_path: &Path) -> Result<(), TlsError> {
        fs::write(cert_path, &self.cert_pem).map_err(|source| TlsError::Write {
            path: cert_path.to_path_buf(),
            source,
        })?;
        write_private(key_path, self.key_pem.as_bytes()).map_err(|source| TlsError::Write {
            path: key_path.to_path_buf(),
            source,
        })
    }
}

/// 128 random bits.
fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    SerialNumber::from_slice(&bytes)
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;

    // mode() only applies on creation; tighten a pre-existing file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Ensure a cert/key pair exists at the given paths.
///
/// Returns `true` when new material was generated.
pub fn ensure_certificate(cert_path: &Path, key_path: &Path) -> Result<bool, TlsError> {
    if cert_path.exists() && key_path.exists() {
        tracing::debug!(cert = %cert_path.display(), key = %key_path.display(), "Using existing TLS material");
        return Ok(false);
    }

    tracing::info!(cert = %cert_path.display(), key = %key_path.display(), "Generating self-signed certificate");
    let generated = SelfSignedCert::generate()?;
    generated.save(cert_path, key_path)?;
    tracing::info!("Successfully generated new SSL certs");
    Ok(true)
}

/// Install the process-wide rustls provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    install_crypto_provider();
    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|source| TlsError::Load {
            cert: cert_path.to_path_buf(),
            key: key_path.to_path_buf(),
            source,
        })
}

/// Client config for the backend link: any server certificate is accepted.
pub fn backend_client_config() -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
        .with_no_client_auth();
    Ok(config)
}

/// Skips chain and name checks; signatures are still checked so the
/// handshake itself stays well-formed.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<rustls::crypto::CryptoProvider>,
}

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
        rustls::crypto::verify_tls12_signature(
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
        rustls::crypto::verify_tls13_signature(
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
