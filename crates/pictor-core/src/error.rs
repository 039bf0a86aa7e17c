//! Error types for the request facade.

use thiserror::Error;

use crate::task::ImageResponse;

/// Failure raised while turning a source locator into a request descriptor.
///
/// This is the only error the builder layer ever returns directly; every
/// later failure travels through the channel the caller subscribed on.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The textual locator could not be parsed into a URL.
    #[error("invalid image source url")]
    InvalidUrl {
        /// Raw text that failed to parse.
        url: String,
        /// Underlying parser failure.
        #[source]
        source: url::ParseError,
    },
}

/// Failure reported by the pipeline for an in-flight load.
///
/// Variants carry owned messages and are cloneable so a single outcome can
/// be fanned out to every subscribed channel (callback, stream, awaited
/// future).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// Transport-level failure while fetching the source.
    #[error("network request failed")]
    Network {
        /// Human-readable failure description.
        message: String,
    },
    /// The fetched payload could not be decoded into an image.
    #[error("image decoding failed")]
    Decode {
        /// Human-readable failure description.
        message: String,
    },
    /// A processor rejected the decoded image.
    #[error("image processor failed")]
    Processing {
        /// Identity of the failing processor.
        processor: String,
        /// Human-readable failure description.
        message: String,
    },
    /// The task was cancelled before a terminal outcome was produced.
    #[error("image load cancelled")]
    Cancelled,
}

/// Convenience alias for load outcomes.
pub type LoadResult = Result<ImageResponse, LoadError>;
