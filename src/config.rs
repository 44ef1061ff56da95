//! Codec and server configuration.
//!
//! Configuration is an immutable value built once at startup and handed to
//! the quantizer, header writer and server. It can come from defaults, a YAML
//! file, environment variables, or builder calls, in that order of
//! precedence (later wins).
//!
//! # Example Config (YAML)
//!
//! ```yaml
//! codec:
//!   threshold: 128
//!   array_name: my_image
//!
//! server:
//!   host: "0.0.0.0"
//!   port: 8122
//!   source: /var/lib/inkcal/compressed_image.bin
//!   chunk_size: 1024
//!   backlog: 1
//!   # write_timeout_ms: 30000   # unset = wait forever
//! ```
//!
//! # Environment
//!
//! - `INKCAL_HOST`, `INKCAL_PORT`, `INKCAL_SOURCE` override the server section
//! - `INKCAL_THRESHOLD` overrides the codec threshold

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::palette::Quantizer;
use crate::{DEFAULT_BACKLOG, DEFAULT_CHUNK_SIZE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_THRESHOLD};

/// Default packed buffer path served by the delivery server.
pub const DEFAULT_SOURCE: &str = "compressed_image.bin";

/// Default C array name for header output.
pub const DEFAULT_ARRAY_NAME: &str = "my_image";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Quantizer and header settings
    pub codec: CodecConfig,
    /// Delivery server settings
    pub server: ServerConfig,
}

/// Quantizer and header settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Luminance at or above which non-palette pixels become white (default: 128)
    pub threshold: u8,
    /// C array name used by header output (default: "my_image")
    pub array_name: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            array_name: DEFAULT_ARRAY_NAME.to_string(),
        }
    }
}

impl CodecConfig {
    /// Quantizer for these settings.
    pub fn quantizer(&self) -> Quantizer {
        Quantizer::new(self.threshold)
    }
}

/// Delivery server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to listen on (default: "0.0.0.0")
    pub host: String,
    /// TCP port (default: 8122)
    pub port: u16,
    /// Packed buffer file to serve (default: "compressed_image.bin")
    pub source: PathBuf,
    /// Bytes per write (default: 1024)
    pub chunk_size: usize,
    /// Pending connection queue depth (default: 1)
    pub backlog: u32,
    /// Per-chunk write timeout in milliseconds. `None` waits forever (default).
    pub write_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            source: PathBuf::from(DEFAULT_SOURCE),
            chunk_size: DEFAULT_CHUNK_SIZE,
            backlog: DEFAULT_BACKLOG,
            write_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    /// Set the listen host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the packed buffer file.
    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = path.into();
        self
    }

    /// Set bytes per write.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the per-chunk write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Per-chunk write timeout, if any.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// `host:port` as given.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        if self.backlog == 0 {
            return Err(Error::Config("backlog must be at least 1".to_string()));
        }
        if self.write_timeout_ms == Some(0) {
            return Err(Error::Config(
                "write_timeout_ms must be at least 1, or unset to wait forever".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("inkcal.yaml")?.apply_env()?;
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// ```
    /// use inkcal::Config;
    ///
    /// let config = Config::from_yaml("server:\n  port: 9000\n").unwrap();
    /// assert_eq!(config.server.port, 9000);
    /// assert_eq!(config.codec.threshold, 128);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `INKCAL_*` environment overrides.
    pub fn apply_env(self) -> Result<Self, Error> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        if let Some(host) = var("INKCAL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("INKCAL_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("INKCAL_PORT is not a port: '{}'", port)))?;
        }
        if let Some(source) = var("INKCAL_SOURCE") {
            self.server.source = PathBuf::from(source);
        }
        if let Some(threshold) = var("INKCAL_THRESHOLD") {
            self.codec.threshold = threshold.parse().map_err(|_| {
                Error::Config(format!(
                    "INKCAL_THRESHOLD must be 0-255, got '{}'",
                    threshold
                ))
            })?;
        }
        Ok(self)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), Error> {
        self.server.validate()?;
        if !crate::header::is_valid_array_name(&self.codec.array_name) {
            return Err(Error::Config(format!(
                "'{}' is not a valid C array name",
                self.codec.array_name
            )));
        }
        Ok(())
    }
}
