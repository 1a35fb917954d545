//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! The client builds `HttpRequest` values and parses `RawResponse` values; it
//! never opens a socket itself. A host either executes requests on its own
//! and feeds the results to `RestClient::parse_response`, or implements
//! `Transport` and lets `RestClient::execute` drive the round-trip.
//!
//! `RawResponse::raw` is the complete buffer as a header-including transport
//! returns it: one header block per hop when redirects were followed, then
//! the final body.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether parameters travel in the body rather than the query string.
    pub fn sends_body(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Everything the transport reports back for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// Status lines, headers and body exactly as received.
    pub raw: String,
    /// Status code of the final response; 0 when nothing was received.
    pub status: u16,
    /// URL of the final response after any redirects.
    pub effective_url: String,
    /// Target of an unfollowed redirect, if the final response was one.
    pub redirect_url: Option<String>,
    /// Transport error description; empty on success.
    pub error: String,
}

/// Transport metadata kept on the request context after the round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportInfo {
    pub status: u16,
    pub effective_url: String,
    pub redirect_url: Option<String>,
    pub error: String,
}

impl From<&RawResponse> for TransportInfo {
    fn from(raw: &RawResponse) -> Self {
        Self {
            status: raw.status,
            effective_url: raw.effective_url.clone(),
            redirect_url: raw.redirect_url.clone(),
            error: raw.error.clone(),
        }
    }
}

/// A source of connections. One connection is opened per call and dropped
/// when the call finishes, whether it succeeded or not.
pub trait Transport {
    type Connection: Connection;

    fn open(&self) -> Result<Self::Connection, crate::RestError>;
}

/// One open transport handle. Closing happens on drop.
pub trait Connection {
    /// Perform the round-trip. Failures are reported through
    /// `RawResponse::error`, not as an `Err`.
    fn perform(&mut self, request: &HttpRequest) -> RawResponse;
}
