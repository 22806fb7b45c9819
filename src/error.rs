//! The error taxonomy of the loading pipeline.
//!
//! [`LoadError::InvalidArgument`] is raised synchronously, before any work
//! begins.  [`LoadError::SourceUnavailable`] and [`LoadError::Codec`] travel
//! through a request's result stream and are recovered by fallback delegation
//! when a fallback loader is configured.  Stale cache entries and failed
//! best-effort deletions never surface as errors at all.

/// A codec could not process image bytes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed image data: {0}")]
    Decode(String),
    #[error("could not encode image: {0}")]
    Encode(String),
}

/// An image request failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The request was rejected before any work began.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A source could not produce the image.
    #[error("could not load image at '{locator}'")]
    SourceUnavailable {
        locator: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The codec could not process bytes for the image.
    #[error("could not process image at '{locator}'")]
    Codec {
        locator: String,
        #[source]
        source: CodecError,
    },
}
