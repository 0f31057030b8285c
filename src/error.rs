//! Unified error type for the pixeldrop application.
//!
//! All modules funnel their failures into [`Error`], which carries enough
//! context for API handlers to derive an HTTP status code via
//! [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in pixeldrop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The payload's detected content type is not a supported raster format.
    #[error("unsupported image format: {content_type}")]
    UnsupportedFormat {
        /// The content type detected from the payload's magic bytes.
        content_type: String,
    },

    /// A payload of a supported format could not be decoded.
    #[error("failed to decode {content_type} image: {source}")]
    Decode {
        /// The content type the payload was detected as.
        content_type: String,
        /// The underlying decoder error.
        source: image::ImageError,
    },

    /// An image could not be re-encoded to its original format.
    #[error("failed to encode image as {content_type}: {source}")]
    Encode {
        /// The target content type.
        content_type: String,
        /// The underlying encoder error.
        source: image::ImageError,
    },

    /// A storage read or write failed.
    #[error("storage error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The requested image variant does not exist in the store.
    #[error("image variant not found: {image_id}/{level}")]
    NotFound {
        /// The image identifier that was looked up.
        image_id: String,
        /// The quality level that was looked up.
        level: String,
    },

    /// Publishing a message to the broker failed.
    #[error("failed to publish message: {0}")]
    Publish(String),

    /// Broker connection setup failed.
    #[error("broker setup failed during {stage}: {message}")]
    Connection {
        /// Which setup step failed: "connect", "open-channel",
        /// "declare-queue" or "consume".
        stage: &'static str,
        /// Human-readable error description.
        message: String,
    },

    /// The broker's consume stream terminated.
    #[error("broker channel closed")]
    ChannelClosed,

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration is invalid or incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnsupportedFormat { .. } => 400,
            Error::Decode { .. } => 422,
            Error::Encode { .. } => 500,
            Error::Io { .. } => 500,
            Error::NotFound { .. } => 404,
            Error::Publish(_) => 502,
            Error::Connection { .. } => 502,
            Error::ChannelClosed => 502,
            Error::Validation(_) => 400,
            Error::Config(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(image_id: impl Into<String>, level: impl fmt::Display) -> Self {
        Error::NotFound {
            image_id: image_id.into(),
            level: level.to_string(),
        }
    }

    /// Convenience constructor for [`Error::UnsupportedFormat`].
    pub fn unsupported(content_type: impl Into<String>) -> Self {
        Error::UnsupportedFormat {
            content_type: content_type.into(),
        }
    }

    /// Convenience constructor for [`Error::Connection`].
    pub fn connection(stage: &'static str, source: impl fmt::Display) -> Self {
        Error::Connection {
            stage,
            message: source.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
