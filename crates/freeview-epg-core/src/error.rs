//! Error taxonomy for fetching and normalizing upstream schedule data.

use thiserror::Error;

/// Errors raised while fetching or normalizing upstream data.
///
/// Adapters recover from every variant except [`FetchError::Configuration`]
/// by skipping the affected window, request, or item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Response body is not the expected JSON shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A single item is unusable (missing start, bad duration, empty title).
    #[error("invalid item: {0}")]
    Validation(String),

    /// The channel descriptor cannot be served by its adapter.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FetchError {
    /// Shorthand for [`FetchError::Validation`].
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`FetchError::MalformedPayload`].
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}
