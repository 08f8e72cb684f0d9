//! Embed pipeline errors.
//!
//! Every failure is classified into one of five [`ErrorKind`]s and delivered
//! through the invocation's error hook — the pipeline never raises across
//! the public [`embed`](crate::Embedder::embed) call, since the dominant
//! failure points are asynchronous.

use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced by the embed pipeline
#[derive(Error, Debug)]
pub enum EmbedError {
    /// No explicit URL was supplied and the target carries no link.
    #[error("URL not found: no resource URL was supplied and the target carries no link")]
    UrlNotFound,

    /// No registered (or allow-listed) provider matched the URL.
    #[error("provider not authorized: no provider matches {url}")]
    ProviderNotAuthorized {
        /// The resource URL that failed to match.
        url: String,
    },

    /// The network round trip failed.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The outbound request URL.
        url: String,
        #[source]
        source: TransportError,
    },

    /// The response body could not be parsed as JSON.
    #[error("response body is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    /// The legacy query service returned zero records.
    #[error("query service returned an empty result")]
    EmptyResult,

    /// The payload has no `html` field and no code builder was configured.
    #[error("unrecognized response shape: no html field and no code builder configured")]
    UnrecognizedResponse,
}

impl EmbedError {
    /// Classify this error into its [`ErrorKind`].
    ///
    /// Parse failures count as transport failures: they are failures of the
    /// fetch round trip, before any response interpretation happened.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UrlNotFound => ErrorKind::UrlNotFound,
            Self::ProviderNotAuthorized { .. } => ErrorKind::ProviderNotAuthorized,
            Self::Transport { .. } | Self::Payload(_) => ErrorKind::Transport,
            Self::EmptyResult => ErrorKind::EmptyResult,
            Self::UnrecognizedResponse => ErrorKind::UnrecognizedResponse,
        }
    }
}

/// Stable classification of an [`EmbedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UrlNotFound,
    ProviderNotAuthorized,
    Transport,
    EmptyResult,
    UnrecognizedResponse,
}

impl ErrorKind {
    /// Kebab-case identifier for logs and host-side dispatch.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UrlNotFound => "url-not-found",
            Self::ProviderNotAuthorized => "provider-not-authorized",
            Self::Transport => "transport-error",
            Self::EmptyResult => "empty-result",
            Self::UnrecognizedResponse => "unrecognized-response-shape",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
