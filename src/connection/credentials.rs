//! Client credential material
//!
//! The gateway authenticates this client with a certificate. Credentials are
//! shipped as a single PEM file holding the certificate chain and the matching
//! private key, so the same blob is scanned twice: once for certificates and
//! once for the key.

use crate::{Error, Result};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use sha2::Digest;
use std::fs;
use std::path::{Path, PathBuf};

/// Client certificate chain and private key loaded from one PEM file
pub struct Credentials {
    path: PathBuf,
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Credentials {
    /// Read and parse a combined certificate + key PEM file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the file cannot be read, contains no
    /// certificate, or contains no private key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = fs::read(path)
            .map_err(|e| Error::credentials(path, format!("failed to read file: {}", e)))?;
        Self::from_pem(path, &pem)
    }

    /// Parse credentials from an in-memory PEM blob.
    ///
    /// `path` is only used for error reporting.
    pub fn from_pem(path: impl Into<PathBuf>, pem: &[u8]) -> Result<Self> {
        let path = path.into();

        let chain = rustls_pemfile::certs(&mut std::io::Cursor::new(pem))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::credentials(&path, format!("malformed certificate: {}", e)))?;
        if chain.is_empty() {
            return Err(Error::credentials(&path, "no certificate found"));
        }

        let key = rustls_pemfile::private_key(&mut std::io::Cursor::new(pem))
            .map_err(|e| Error::credentials(&path, format!("malformed private key: {}", e)))?
            .ok_or_else(|| Error::credentials(&path, "no private key found"))?;

        Ok(Self { path, chain, key })
    }

    /// Path the credentials were loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Certificate chain, leaf first
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Colon-separated SHA-256 fingerprint of the leaf certificate
    pub fn fingerprint(&self) -> String {
        let digest = sha2::Sha256::digest(self.chain[0].as_ref());
        digest
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Split into the chain and key for a TLS client configuration
    pub(crate) fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.chain, self.key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("path", &self.path)
            .field("certificates", &self.chain.len())
            .field("key", &"<redacted>")
            .finish()
    }
}
