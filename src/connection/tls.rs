//! TLS configuration for the gateway connection.
//!
//! The gateway requires mutual TLS: the server is verified against trust roots
//! and this client presents the certificate from its [`Credentials`]. The
//! resulting rustls `ClientConfig` is built once and shared by every reconnect.

use super::credentials::Credentials;
use crate::{Error, Result};
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pki_types::ServerName;
use rustls_pemfile::Item;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// TLS configuration for gateway connections.
///
/// # Examples
///
/// ```ignore
/// use pushlink::connection::{Credentials, TlsConfig};
///
/// // With system root certificates (production)
/// let tls = TlsConfig::builder(Credentials::load("/etc/push/apns.pem")?).build()?;
///
/// // With a custom CA certificate
/// let tls = TlsConfig::builder(Credentials::load("/etc/push/apns.pem")?)
///     .ca_cert_path("/path/to/ca.pem")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA certificate file (None = use system roots)
    ca_cert_path: Option<PathBuf>,
    /// SHA-256 fingerprint of the client certificate
    fingerprint: String,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder around the client credentials.
    pub fn builder(credentials: Credentials) -> TlsConfigBuilder {
        TlsConfigBuilder {
            credentials,
            ca_cert_path: None,
        }
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Fingerprint of the client certificate presented to the gateway.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("fingerprint", &self.fingerprint)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    credentials: Credentials,
    ca_cert_path: Option<PathBuf>,
}

impl TlsConfigBuilder {
    /// Set the path to a custom CA certificate file (PEM format).
    ///
    /// If not set, system root certificates will be used.
    pub fn ca_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - CA certificate file cannot be read
    /// - CA certificate is invalid PEM
    /// - the private key does not fit the client certificate
    pub fn build(self) -> Result<TlsConfig> {
        let root_store = match &self.ca_cert_path {
            Some(ca_path) => load_custom_ca(ca_path)?,
            None => load_system_roots(),
        };

        let fingerprint = self.credentials.fingerprint();
        let credentials_path = self.credentials.path().to_path_buf();
        let (chain, key) = self.credentials.into_parts();

        let client_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_client_auth_cert(chain, key)
            .map_err(|e| Error::credentials(credentials_path, e.to_string()))?;

        tracing::debug!(fingerprint = %fingerprint, "TLS client context built");

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            fingerprint,
            client_config: Arc::new(client_config),
        })
    }
}

/// Native roots, falling back to the bundled Mozilla roots when the platform
/// store is unavailable or empty.
fn load_system_roots() -> RootCertStore {
    let result = rustls_native_certs::load_native_certs();

    let mut store = RootCertStore::empty();
    for cert in result.certs {
        let _ = store.add_parsable_certificates(std::iter::once(cert));
    }

    if store.is_empty() {
        tracing::debug!(
            errors = result.errors.len(),
            "no native root certificates, using bundled roots"
        );
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    store
}

/// Load a custom CA certificate from a PEM file.
fn load_custom_ca(ca_path: &Path) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read CA certificate file '{}': {}",
            ca_path.display(),
            e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += 1;
            }
            Ok(Some(_)) => {
                // Skip non-certificate items (private keys, etc.)
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Config(format!(
                    "Failed to parse CA certificate from '{}'",
                    ca_path.display()
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Config(format!(
            "No valid certificates found in '{}'",
            ca_path.display()
        )));
    }

    Ok(root_store)
}

/// Server name presented for SNI and checked against the gateway certificate.
///
/// Accepts DNS names and IP literals; a trailing dot is dropped.
pub fn parse_server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.trim_end_matches('.').to_string())
        .map_err(|e| Error::Config(format!("Invalid hostname for TLS '{}': {}", host, e)))
}
