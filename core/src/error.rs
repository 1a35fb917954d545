//! Error types for the REST client.
//!
//! # Design
//! Every failure the client can surface is a `RestError` variant. Nothing is
//! recovered locally: format resolution and decode failures are fatal to the
//! call that hit them. Variants that need diagnostics carry the parsed header
//! chain or the whole per-call context so the caller can inspect the status,
//! headers and raw body even when decoding failed.

use crate::context::RequestContext;
use crate::headers::HeaderChain;

/// A decoder rejected the body it was given.
///
/// `Clone` so a failed decode can be cached on the context and reported
/// again without re-running the decoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{format} decode failed: {message}")]
pub struct DecodeError {
    pub format: String,
    pub message: String,
}

impl DecodeError {
    pub fn new(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by `RestClient` and `RequestContext`.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Format or decoding was requested before a response was parsed.
    #[error("a response must exist before it can be decoded")]
    ResponseMissing,

    /// No explicit format is configured and the content type did not match
    /// the format pattern.
    #[error(
        "response format could not be determined from headers (status line {:?}, content type {:?})",
        .headers.http_code(),
        .headers.content_type().unwrap_or("")
    )]
    FormatUndetermined { headers: Box<HeaderChain> },

    /// The resolved format has no registered decoder.
    #[error("'{format}' is not a supported format, register a decoder to handle this response")]
    UnsupportedFormat { format: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Decoded response data is read-only.
    #[error("decoded response data is immutable")]
    ImmutableData,

    /// The server answered with a status other than 200.
    #[error("{status_line}. {message}")]
    HttpStatus {
        code: u16,
        status_line: String,
        message: String,
        response: Box<RequestContext>,
    },

    /// A 200 response whose format could not be resolved or whose body did
    /// not decode. `source` is the underlying error; `response` keeps the
    /// headers, status and raw body for inspection.
    #[error("{source}")]
    Undecodable {
        source: Box<RestError>,
        response: Box<RequestContext>,
    },

    /// The transport failed before any response bytes arrived.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The configured format pattern does not compile or lacks a subtype group.
    #[error("invalid format pattern: {0}")]
    InvalidFormatRegex(String),
}

impl From<regex::Error> for RestError {
    fn from(e: regex::Error) -> Self {
        RestError::InvalidFormatRegex(e.to_string())
    }
}

impl RestError {
    /// The per-call context carried by `HttpStatus` and `Undecodable`.
    pub fn response(&self) -> Option<&RequestContext> {
        match self {
            RestError::HttpStatus { response, .. } | RestError::Undecodable { response, .. } => {
                Some(response.as_ref())
            }
            _ => None,
        }
    }

    /// The error beneath an `Undecodable` wrapper, or `self`.
    pub fn root(&self) -> &RestError {
        match self {
            RestError::Undecodable { source, .. } => source.as_ref(),
            other => other,
        }
    }
}
