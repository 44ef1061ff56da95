//! Error types for the inkcal codec and delivery server.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while encoding, writing or serving a packed frame.
///
/// Per-connection transport failures are not represented here: the server
/// logs them and moves on to the next client.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a file failed
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// File that could not be read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Image decoding or encoding failed
    #[error("image error: {0}")]
    Image(String),

    /// Invalid configuration value or unreadable config file
    #[error("configuration error: {0}")]
    Config(String),

    /// The packed buffer to serve does not exist
    #[error("source buffer '{}' does not exist", .0.display())]
    SourceMissing(PathBuf),

    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to listen on
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Packed buffer length does not match the declared dimensions
    #[error("packed buffer for {width}x{height} must be {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Byte count implied by the dimensions
        expected: usize,
        /// Byte count actually present
        actual: usize,
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
    },

    /// Zero width or height handed to the codec
    #[error("image dimensions must be positive, got {width}x{height}")]
    Dimension {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "image")]
impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(format!("invalid YAML: {}", err))
    }
}
