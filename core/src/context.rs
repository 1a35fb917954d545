//! Per-call state: the parsed headers, body and cached decoded value of one
//! request/response cycle.
//!
//! # Design
//! A `RequestContext` is created fresh for every call from a snapshot of the
//! client's options. Everything the call produces lives on the context and
//! nowhere else, so two calls never observe each other's responses and later
//! changes to the client never reach an existing context.
//!
//! Decoding is lazy and memoized through `DecodeState`: the decoder runs on
//! first access and its result, success or failure, is reused afterwards.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::config::ClientOptions;
use crate::error::RestError;
use crate::format::resolve_format;
use crate::headers::HeaderChain;
use crate::http::TransportInfo;
use crate::parser::parse_response;
use crate::view::{DecodeState, DecodedView, Entries, Key};

#[derive(Debug, Clone)]
pub struct RequestContext {
    options: Arc<ClientOptions>,
    url: String,
    headers: HeaderChain,
    body: Option<String>,
    info: TransportInfo,
    decoded: DecodeState,
}

impl RequestContext {
    pub fn new(options: Arc<ClientOptions>, url: impl Into<String>) -> Self {
        Self {
            options,
            url: url.into(),
            headers: HeaderChain::default(),
            body: None,
            info: TransportInfo::default(),
            decoded: DecodeState::NotDecoded,
        }
    }

    /// Split `raw` into headers and body, replacing any earlier response and
    /// discarding its decoded value.
    pub fn parse_response(&mut self, raw: &str) {
        let parsed = parse_response(raw);
        debug!(
            "parsed response: {:?}, {} earlier header block(s), {} byte body",
            parsed.headers.http_code(),
            parsed.headers.previous.len(),
            parsed.body.len()
        );
        self.headers = parsed.headers;
        self.body = Some(parsed.body);
        self.decoded = DecodeState::NotDecoded;
    }

    pub(crate) fn set_transport_info(&mut self, info: TransportInfo) {
        self.info = info;
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The request URL as built for this call.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderChain {
        &self.headers
    }

    /// The raw body; `None` until a response has been parsed.
    pub fn response(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn info(&self) -> &TransportInfo {
        &self.info
    }

    pub fn status(&self) -> u16 {
        self.info.status
    }

    pub fn decode_state(&self) -> &DecodeState {
        &self.decoded
    }

    /// The decoded value if decoding already happened.
    pub fn decoded_response(&self) -> Option<&Value> {
        match &self.decoded {
            DecodeState::Decoded(value) => Some(value),
            _ => None,
        }
    }

    /// Format identifier for the parsed response.
    pub fn response_format(&self) -> Result<String, RestError> {
        resolve_format(
            &self.headers,
            self.body.as_deref(),
            self.options.format.as_deref(),
            &self.options.format_regex,
        )
    }

    /// Decode the body on first call; later calls return the cached outcome.
    pub fn decode_response(&mut self) -> Result<&Value, RestError> {
        if matches!(self.decoded, DecodeState::NotDecoded) {
            self.decoded = self.run_decoder()?;
        }
        match &self.decoded {
            DecodeState::Decoded(value) => Ok(value),
            DecodeState::Failed(err) => Err(err.clone().into()),
            DecodeState::NotDecoded => Err(RestError::ResponseMissing),
        }
    }

    fn run_decoder(&self) -> Result<DecodeState, RestError> {
        let format = self.response_format()?;
        let decoder = self.options.decoders.lookup(&format)?;
        let body = self.body.as_deref().unwrap_or_default();
        debug!("decoding {} byte body as {format:?}", body.len());
        Ok(match decoder.decode(body) {
            Ok(value) => DecodeState::Decoded(value),
            Err(err) => {
                debug!("decode failed: {err}");
                DecodeState::Failed(err)
            }
        })
    }

    /// Read-only view over the decoded value, decoding first if needed.
    pub fn view(&mut self) -> Result<DecodedView<'_>, RestError> {
        self.decode_response().map(DecodedView::new)
    }

    pub fn has(&mut self, key: impl Into<Key>) -> Result<bool, RestError> {
        Ok(self.view()?.has(key))
    }

    pub fn get(&mut self, key: impl Into<Key>) -> Result<Option<&Value>, RestError> {
        Ok(self.view()?.get(key))
    }

    /// Iterate the decoded value from its first entry.
    pub fn iter(&mut self) -> Result<Entries<'_>, RestError> {
        Ok(self.view()?.iter())
    }

    /// Always fails: decoded data is read-only.
    pub fn set(&mut self, _key: impl Into<Key>, _value: Value) -> Result<(), RestError> {
        Err(RestError::ImmutableData)
    }

    /// Always fails: decoded data is read-only.
    pub fn remove(&mut self, _key: impl Into<Key>) -> Result<(), RestError> {
        Err(RestError::ImmutableData)
    }
}
