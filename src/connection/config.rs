//! Connection configuration

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Production push gateway host
pub const DEFAULT_HOST: &str = "gateway.push.apple.com";

/// Production push gateway port
pub const DEFAULT_PORT: u16 = 2195;

/// Attempts allotted to a single read or write
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Connection configuration
///
/// `certificate` is the only required setting: a PEM file holding the client
/// certificate and its private key. Everything else defaults to the production
/// gateway. Deserializes from any serde format with the same field names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Gateway host name
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// Combined certificate + private key PEM file
    pub certificate: Option<PathBuf>,
    /// CA bundle used to verify the gateway (None = system roots)
    pub ca_cert: Option<PathBuf>,
    /// TCP keepalive idle interval (None = OS default)
    pub keepalive_idle: Option<Duration>,
    /// Attempts per operation before giving up
    pub retry_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            certificate: None,
            ca_cert: None,
            keepalive_idle: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl ConnectionConfig {
    /// Create configuration for the default gateway with the given credentials
    pub fn new(certificate: impl Into<PathBuf>) -> Self {
        Self {
            certificate: Some(certificate.into()),
            ..Self::default()
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder()
    ///     .certificate("/etc/push/apns.pem")
    ///     .host("gateway.sandbox.push.apple.com")
    ///     .keepalive_idle(Duration::from_secs(60))
    ///     .build()?;
    /// ```
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check that the configuration can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - no certificate path is set
    /// - the host is empty or the port is zero
    /// - the retry budget is zero
    pub fn validate(&self) -> Result<()> {
        if self.certificate.is_none() {
            return Err(Error::Config(
                "missing required setting: certificate".into(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must not be zero".into()));
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config(
                "retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The credential path, or a configuration error if unset
    pub(crate) fn certificate_path(&self) -> Result<&PathBuf> {
        self.certificate
            .as_ref()
            .ok_or_else(|| Error::Config("missing required setting: certificate".into()))
    }
}

/// Builder for creating a validated `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the combined certificate + key file (required)
    pub fn certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.certificate = Some(path.into());
        self
    }

    /// Set the gateway host
    ///
    /// Default: `gateway.push.apple.com`
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the gateway port
    ///
    /// Default: 2195
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Verify the gateway against a custom CA bundle (PEM) instead of system roots
    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_cert = Some(path.into());
        self
    }

    /// Set TCP keepalive idle interval
    ///
    /// Default: None (OS default)
    pub fn keepalive_idle(mut self, duration: Duration) -> Self {
        self.config.keepalive_idle = Some(duration);
        self
    }

    /// Set the number of attempts per read or write
    ///
    /// Default: 3
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ConnectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
