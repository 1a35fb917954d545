//! Generic synchronous REST client core.
//!
//! # Overview
//! Builds `HttpRequest` values from a base configuration and per-call
//! arguments, and turns raw transport output into a `RequestContext`: the
//! parsed header chain (including the blocks of any followed redirects), the
//! body, and a lazily decoded, read-only view of that body.
//!
//! # Design
//! - Host-does-IO: the core never opens a connection. Hosts either execute
//!   `HttpRequest`s themselves and call `RestClient::parse_response`, or
//!   implement `Transport` and use `RestClient::execute` / the verb helpers.
//! - Bodies are decoded by format. The format is configured explicitly or
//!   taken from the content type; decoders are looked up in a
//!   `DecoderRegistry` that ships with `json` and `php` and accepts more.
//! - Decoded values are `serde_json::Value`s with insertion-ordered maps.
//!
//! ```
//! use restclient_core::{ClientOptions, HttpMethod, Parameters, RawResponse, RestClient, Value};
//!
//! let client = RestClient::new(ClientOptions::default().with_base_url("http://localhost:3000"));
//! let request = client.build_request("/items", HttpMethod::Get, Parameters::none(), &[]);
//! let raw = RawResponse {
//!     raw: "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"a\":1}".to_string(),
//!     status: 200,
//!     ..RawResponse::default()
//! };
//! let mut response = client.parse_response(&request, raw).unwrap();
//! assert_eq!(response.get("a").unwrap(), Some(&Value::from(1)));
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod decoder;
pub mod error;
pub mod format;
pub mod headers;
pub mod http;
pub mod parser;
pub mod php;
pub mod view;

pub use client::{Parameters, RestClient};
pub use config::ClientOptions;
pub use context::RequestContext;
pub use decoder::{Decoder, DecoderRegistry, JsonDecoder};
pub use error::{DecodeError, RestError};
pub use headers::{HeaderBlock, HeaderChain, HeaderValue};
pub use http::{Connection, HttpMethod, HttpRequest, RawResponse, Transport, TransportInfo};
pub use parser::{parse_response, ParsedResponse};
pub use php::PhpDecoder;
pub use serde_json::Value;
pub use view::{DecodeState, DecodedView, Entries, Key};
