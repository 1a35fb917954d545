//! Request builder, response handler and executor.
//!
//! # Design
//! `RestClient` holds only its base options, behind an `Arc`. Each call is
//! split the same way as the I/O boundary: `build_request` produces an
//! `HttpRequest`, the host (or a `Transport`) executes it, and
//! `parse_response` turns the `RawResponse` into a fresh `RequestContext`.
//! `execute` and the verb helpers run all three steps.
//!
//! Options are copy-on-write: changing them after a call (for example
//! registering a decoder) never affects contexts that already exist.

use std::sync::Arc;

use base64ct::{Base64, Encoding};
use log::debug;
use serde_json::Value;
use url::form_urlencoded;

use crate::config::ClientOptions;
use crate::context::RequestContext;
use crate::decoder::Decoder;
use crate::error::RestError;
use crate::http::{Connection, HttpMethod, HttpRequest, RawResponse, Transport, TransportInfo};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Parameters for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameters {
    /// Key/value pairs, merged over the base parameters and form-encoded.
    Pairs(Vec<(String, String)>),
    /// An already-encoded string, appended after the encoded base parameters.
    Raw(String),
}

impl Parameters {
    pub fn none() -> Self {
        Parameters::Pairs(Vec::new())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&str> for Parameters {
    fn from(raw: &str) -> Self {
        Parameters::Raw(raw.to_string())
    }
}

impl From<String> for Parameters {
    fn from(raw: String) -> Self {
        Parameters::Raw(raw)
    }
}

impl From<Vec<(String, String)>> for Parameters {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Parameters::Pairs(pairs)
    }
}

impl From<&[(&str, &str)]> for Parameters {
    fn from(pairs: &[(&str, &str)]) -> Self {
        Parameters::Pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Parameters {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Parameters::from(&pairs[..])
    }
}

/// Generic REST client.
#[derive(Debug, Clone, Default)]
pub struct RestClient {
    options: Arc<ClientOptions>,
}

impl RestClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Mutable access to the base options for subsequent calls.
    pub fn options_mut(&mut self) -> &mut ClientOptions {
        Arc::make_mut(&mut self.options)
    }

    /// Register `decoder` for `format`, replacing any existing decoder.
    pub fn register_decoder(&mut self, format: impl Into<String>, decoder: impl Decoder + 'static) {
        self.options_mut().decoders.register(format, decoder);
    }

    pub fn build_request(
        &self,
        url: &str,
        method: HttpMethod,
        parameters: Parameters,
        headers: &[(&str, &str)],
    ) -> HttpRequest {
        let options = &self.options;

        let mut request_headers = options.headers.clone();
        for (name, value) in headers {
            set_header(&mut request_headers, name, value);
        }
        if let Some((user, pass)) = options.credentials() {
            if !has_header(&request_headers, "Authorization") {
                let token = Base64::encode_string(format!("{user}:{pass}").as_bytes());
                request_headers.push(("Authorization".to_string(), format!("Basic {token}")));
            }
        }

        let mut target = url.to_string();
        if let Some(format) = options.format.as_deref().filter(|f| !f.is_empty()) {
            target.push('.');
            target.push_str(format);
        }

        let query = encode_parameters(&options.parameters, parameters);
        let body = if method.sends_body() {
            if !query.is_empty() && !has_header(&request_headers, "Content-Type") {
                request_headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
            }
            Some(query)
        } else {
            if !query.is_empty() {
                target.push(if target.contains('?') { '&' } else { '?' });
                target.push_str(&query);
            }
            None
        };

        if let Some(base) = options.base_url.as_deref().filter(|b| !b.is_empty()) {
            target = format!("{}/{}", base.trim_end_matches('/'), target.trim_start_matches('/'));
        }

        HttpRequest {
            method,
            url: target,
            user_agent: options.user_agent.clone(),
            headers: request_headers,
            body,
        }
    }

    /// Turn the transport's output for `request` into a request context.
    ///
    /// A 200 response with a body is decoded immediately so malformed bodies
    /// fail the call with `RestError::Undecodable`. Any other status becomes
    /// `RestError::HttpStatus`. Both carry the context for inspection.
    pub fn parse_response(&self, request: &HttpRequest, raw: RawResponse) -> Result<RequestContext, RestError> {
        if raw.raw.is_empty() && !raw.error.is_empty() {
            return Err(RestError::Transport { message: raw.error });
        }

        let mut context = RequestContext::new(self.options.clone(), request.url.as_str());
        context.parse_response(&raw.raw);
        context.set_transport_info(TransportInfo::from(&raw));
        debug!("{} {} answered {}", request.method, request.url, raw.status);

        if raw.status != 200 {
            return Err(status_error(context));
        }
        if context.response().is_some_and(|body| !body.is_empty()) {
            if let Err(err) = context.decode_response().map(|_| ()) {
                return Err(RestError::Undecodable {
                    source: Box::new(err),
                    response: Box::new(context),
                });
            }
        }
        Ok(context)
    }

    /// Build, send and parse one request. The connection is closed before
    /// this returns, on every path.
    pub fn execute<T: Transport>(
        &self,
        transport: &T,
        url: &str,
        method: HttpMethod,
        parameters: Parameters,
        headers: &[(&str, &str)],
    ) -> Result<RequestContext, RestError> {
        let request = self.build_request(url, method, parameters, headers);
        debug!("executing {} {}", request.method, request.url);
        let raw = {
            let mut connection = transport.open()?;
            connection.perform(&request)
        };
        self.parse_response(&request, raw)
    }

    pub fn get<T: Transport>(
        &self,
        transport: &T,
        url: &str,
        parameters: impl Into<Parameters>,
        headers: &[(&str, &str)],
    ) -> Result<RequestContext, RestError> {
        self.execute(transport, url, HttpMethod::Get, parameters.into(), headers)
    }

    pub fn post<T: Transport>(
        &self,
        transport: &T,
        url: &str,
        parameters: impl Into<Parameters>,
        headers: &[(&str, &str)],
    ) -> Result<RequestContext, RestError> {
        self.execute(transport, url, HttpMethod::Post, parameters.into(), headers)
    }

    pub fn put<T: Transport>(
        &self,
        transport: &T,
        url: &str,
        parameters: impl Into<Parameters>,
        headers: &[(&str, &str)],
    ) -> Result<RequestContext, RestError> {
        self.execute(transport, url, HttpMethod::Put, parameters.into(), headers)
    }

    pub fn delete<T: Transport>(
        &self,
        transport: &T,
        url: &str,
        parameters: impl Into<Parameters>,
        headers: &[(&str, &str)],
    ) -> Result<RequestContext, RestError> {
        self.execute(transport, url, HttpMethod::Delete, parameters.into(), headers)
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
}

/// Replace the first header called `name` (case-insensitive) or append it.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Form-encode the base parameters merged with the per-call ones.
pub fn encode_parameters(base: &[(String, String)], parameters: Parameters) -> String {
    match parameters {
        Parameters::Pairs(pairs) => {
            let mut merged = base.to_vec();
            for (key, value) in pairs {
                match merged.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => merged.push((key, value)),
                }
            }
            format_query(&merged)
        }
        Parameters::Raw(raw) => {
            let encoded = format_query(base);
            match (encoded.is_empty(), raw.is_empty()) {
                (_, true) => encoded,
                (true, false) => raw,
                (false, false) => format!("{encoded}&{raw}"),
            }
        }
    }
}

/// `application/x-www-form-urlencoded` serialization of `pairs`.
pub fn format_query(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the error for a non-200 response. Only 302 and 400 get a detailed
/// message; the detail lookups never fail the conversion.
fn status_error(mut context: RequestContext) -> RestError {
    let code = context.status();
    let (status_line, message) = match code {
        302 => {
            let target = context
                .info()
                .redirect_url
                .clone()
                .or_else(|| context.headers().get("location").map(|v| v.first().to_string()))
                .unwrap_or_default();
            ("HTTP/1.1 302 Found".to_string(), format!("Redirected to: {target}"))
        }
        400 => {
            let detail = match context.get("message") {
                Ok(Some(value)) => value_text(value),
                _ => String::new(),
            };
            ("HTTP/1.1 400 Bad Request".to_string(), format!("Response: {detail}"))
        }
        _ => (format!("HTTP/1.1 {code} Unknown"), String::new()),
    };
    debug!("request failed: {status_line}. {message}");
    RestError::HttpStatus {
        code,
        status_line,
        message,
        response: Box::new(context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use serde_json::json;

    use crate::view::DecodeState;

    fn client() -> RestClient {
        RestClient::new(ClientOptions::default().with_base_url("http://localhost:3000"))
    }

    fn raw(status: u16, response: &str) -> RawResponse {
        RawResponse {
            raw: response.to_string(),
            status,
            effective_url: "http://localhost:3000/items".to_string(),
            redirect_url: None,
            error: String::new(),
        }
    }

    /// Replays one canned response and records what it was asked to send.
    struct FakeTransport {
        response: RawResponse,
        sent: Rc<RefCell<Vec<HttpRequest>>>,
        closed: Rc<Cell<usize>>,
    }

    struct FakeConnection {
        response: RawResponse,
        sent: Rc<RefCell<Vec<HttpRequest>>>,
        closed: Rc<Cell<usize>>,
    }

    impl Drop for FakeConnection {
        fn drop(&mut self) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    impl Connection for FakeConnection {
        fn perform(&mut self, request: &HttpRequest) -> RawResponse {
            self.sent.borrow_mut().push(request.clone());
            self.response.clone()
        }
    }

    impl Transport for FakeTransport {
        type Connection = FakeConnection;

        fn open(&self) -> Result<Self::Connection, RestError> {
            Ok(FakeConnection {
                response: self.response.clone(),
                sent: self.sent.clone(),
                closed: self.closed.clone(),
            })
        }
    }

    fn fake(response: RawResponse) -> FakeTransport {
        FakeTransport {
            response,
            sent: Rc::new(RefCell::new(Vec::new())),
            closed: Rc::new(Cell::new(0)),
        }
    }

    #[test]
    fn get_puts_parameters_in_query() {
        let req = client().build_request("items", HttpMethod::Get, [("q", "a b"), ("page", "2")].into(), &[]);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/items?q=a+b&page=2");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn get_appends_to_existing_query() {
        let req = client().build_request("/items?sort=asc", HttpMethod::Get, [("page", "2")].into(), &[]);
        assert_eq!(req.url, "http://localhost:3000/items?sort=asc&page=2");
    }

    #[test]
    fn post_sends_form_body() {
        let req = client().build_request("/items", HttpMethod::Post, [("name", "milk & eggs")].into(), &[]);
        assert_eq!(req.url, "http://localhost:3000/items");
        assert_eq!(req.body.as_deref(), Some("name=milk+%26+eggs"));
        assert_eq!(
            req.headers,
            vec![("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())]
        );
    }

    #[test]
    fn delete_and_put_send_bodies() {
        for method in [HttpMethod::Put, HttpMethod::Delete] {
            let req = client().build_request("/items/1", method, Parameters::none(), &[]);
            assert_eq!(req.body.as_deref(), Some(""));
            assert!(req.headers.is_empty());
        }
    }

    #[test]
    fn base_url_joins_with_single_slash() {
        let client = RestClient::new(ClientOptions::default().with_base_url("http://localhost:3000/api/"));
        for url in ["items", "/items"] {
            let req = client.build_request(url, HttpMethod::Get, Parameters::none(), &[]);
            assert_eq!(req.url, "http://localhost:3000/api/items");
        }
    }

    #[test]
    fn explicit_format_is_appended_to_url() {
        let client = RestClient::new(ClientOptions::default().with_format("json"));
        let req = client.build_request("/items", HttpMethod::Get, [("id", "1")].into(), &[]);
        assert_eq!(req.url, "/items.json?id=1");
    }

    #[test]
    fn headers_and_parameters_merge_over_base() {
        let client = RestClient::new(
            ClientOptions::default()
                .with_header("Accept", "text/plain")
                .with_header("X-Client", "base")
                .with_parameter("token", "abc")
                .with_parameter("lang", "en"),
        );
        let req = client.build_request(
            "/items",
            HttpMethod::Get,
            [("lang", "fr")].into(),
            &[("accept", "application/json")],
        );
        assert_eq!(req.url, "/items?token=abc&lang=fr");
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Client".to_string(), "base".to_string()),
            ]
        );
    }

    #[test]
    fn raw_parameters_follow_base_parameters() {
        let base = vec![("token".to_string(), "abc".to_string())];
        assert_eq!(encode_parameters(&base, "x=1&y=2".into()), "token=abc&x=1&y=2");
        assert_eq!(encode_parameters(&[], "x=1".into()), "x=1");
        assert_eq!(encode_parameters(&base, "".into()), "token=abc");
    }

    #[test]
    fn basic_credentials_become_authorization_header() {
        let client = RestClient::new(ClientOptions::default().with_credentials("user", "pass"));
        let req = client.build_request("/", HttpMethod::Get, Parameters::none(), &[]);
        assert_eq!(
            req.headers,
            vec![("Authorization".to_string(), "Basic dXNlcjpwYXNz".to_string())]
        );
    }

    #[test]
    fn user_agent_comes_from_options() {
        let client = RestClient::new(ClientOptions::default().with_user_agent("agent/1"));
        let req = client.build_request("/", HttpMethod::Get, Parameters::none(), &[]);
        assert_eq!(req.user_agent, "agent/1");
    }

    #[test]
    fn parse_success_decodes_eagerly() {
        let c = client();
        let req = c.build_request("/items", HttpMethod::Get, Parameters::none(), &[]);
        let mut ctx = c
            .parse_response(
                &req,
                raw(200, "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"a\":1}"),
            )
            .unwrap();
        assert_eq!(ctx.decoded_response(), Some(&json!({"a": 1})));
        assert_eq!(ctx.status(), 200);
        assert_eq!(ctx.url(), "http://localhost:3000/items");
        assert_eq!(ctx.get("a").unwrap(), Some(&json!(1)));
    }

    #[test]
    fn parse_success_with_malformed_body_fails() {
        let c = client();
        let req = c.build_request("/items", HttpMethod::Get, Parameters::none(), &[]);
        let err = c
            .parse_response(&req, raw(200, "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{oops"))
            .unwrap_err();
        assert!(matches!(err.root(), RestError::Decode(_)));
        let ctx = err.response().unwrap();
        assert_eq!(ctx.status(), 200);
        assert_eq!(ctx.response(), Some("{oops"));
        assert_eq!(ctx.headers().content_type(), Some("application/json"));
        assert!(matches!(ctx.decode_state(), DecodeState::Failed(_)));
    }

    #[test]
    fn unresolvable_format_keeps_the_response() {
        let c = client();
        let req = c.build_request("/items", HttpMethod::Get, Parameters::none(), &[]);
        let err = c
            .parse_response(&req, raw(200, "HTTP/1.1 200 OK\r\nServer: x\r\n\r\nplain words"))
            .unwrap_err();
        match err {
            RestError::Undecodable { source, response } => {
                assert!(matches!(*source, RestError::FormatUndetermined { .. }));
                assert_eq!(response.response(), Some("plain words"));
                assert_eq!(response.headers().http_code(), "HTTP/1.1 200 OK");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_success_with_empty_body_defers_decoding() {
        let c = client();
        let req = c.build_request("/items/1", HttpMethod::Delete, Parameters::none(), &[]);
        let ctx = c.parse_response(&req, raw(200, "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")).unwrap();
        assert_eq!(ctx.response(), Some(""));
        assert!(ctx.decoded_response().is_none());
    }

    #[test]
    fn bad_request_extracts_message() {
        let c = client();
        let req = c.build_request("/items", HttpMethod::Post, Parameters::none(), &[]);
        let err = c
            .parse_response(
                &req,
                raw(400, "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\n\r\n{\"message\":\"name is required\"}"),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP/1.1 400 Bad Request. Response: name is required");
        match err {
            RestError::HttpStatus { code, response, .. } => {
                assert_eq!(code, 400);
                assert_eq!(response.response(), Some("{\"message\":\"name is required\"}"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_request_without_message_does_not_crash() {
        let c = client();
        let req = c.build_request("/items", HttpMethod::Post, Parameters::none(), &[]);
        for body in [
            "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\n\r\n{\"error\":true}",
            "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n<h1>bad</h1>",
            "HTTP/1.1 400 Bad Request\r\n\r\n",
        ] {
            let err = c.parse_response(&req, raw(400, body)).unwrap_err();
            assert_eq!(err.to_string(), "HTTP/1.1 400 Bad Request. Response: ");
        }
    }

    #[test]
    fn redirect_reports_target() {
        let c = client();
        let req = c.build_request("/old", HttpMethod::Get, Parameters::none(), &[]);
        let mut response = raw(302, "HTTP/1.1 302 Found\r\nLocation: /new\r\n\r\n");
        let err = c.parse_response(&req, response.clone()).unwrap_err();
        assert_eq!(err.to_string(), "HTTP/1.1 302 Found. Redirected to: /new");

        response.redirect_url = Some("http://localhost:3000/new".to_string());
        let err = c.parse_response(&req, response).unwrap_err();
        assert_eq!(err.to_string(), "HTTP/1.1 302 Found. Redirected to: http://localhost:3000/new");
    }

    #[test]
    fn other_statuses_are_unknown() {
        let c = client();
        let req = c.build_request("/items/9", HttpMethod::Get, Parameters::none(), &[]);
        let err = c
            .parse_response(&req, raw(404, "HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\n\r\nnope"))
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP/1.1 404 Unknown. ");
        assert!(matches!(err, RestError::HttpStatus { code: 404, .. }));
    }

    #[test]
    fn transport_error_without_buffer() {
        let c = client();
        let req = c.build_request("/items", HttpMethod::Get, Parameters::none(), &[]);
        let response = RawResponse {
            error: "connection refused".to_string(),
            ..RawResponse::default()
        };
        let err = c.parse_response(&req, response).unwrap_err();
        assert!(matches!(err, RestError::Transport { ref message } if message == "connection refused"));
    }

    #[test]
    fn execute_sends_request_and_closes_connection() {
        let transport = fake(raw(200, "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n[1,2,3]"));
        let mut ctx = client().get(&transport, "/items", [("page", "1")], &[]).unwrap();
        assert_eq!(ctx.iter().unwrap().count(), 3);
        assert_eq!(transport.sent.borrow()[0].url, "http://localhost:3000/items?page=1");
        assert_eq!(transport.closed.get(), 1);
    }

    #[test]
    fn connection_is_closed_on_error() {
        let transport = fake(raw(500, "HTTP/1.1 500 Internal Server Error\r\n\r\n"));
        let err = client().delete(&transport, "/items/1", Parameters::none(), &[]).unwrap_err();
        assert!(matches!(err, RestError::HttpStatus { code: 500, .. }));
        assert_eq!(transport.closed.get(), 1);
        assert_eq!(transport.sent.borrow()[0].method, HttpMethod::Delete);
    }

    #[test]
    fn registered_decoder_applies_to_later_calls_only() {
        let transport = fake(raw(200, "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\n\r\na,b"));
        let mut c = client();
        let err = c.get(&transport, "/report", Parameters::none(), &[]).unwrap_err();
        assert!(matches!(err.root(), RestError::UnsupportedFormat { .. }));

        c.register_decoder("csv", |body: &str| -> Result<Value, crate::DecodeError> {
            Ok(Value::Array(body.split(',').map(|s| json!(s)).collect()))
        });
        let mut ctx = c.get(&transport, "/report", Parameters::none(), &[]).unwrap();
        assert_eq!(ctx.get(1usize).unwrap(), Some(&json!("b")));
    }

    #[test]
    fn contexts_are_isolated_from_later_option_changes() {
        let transport = fake(raw(200, "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{}"));
        let mut c = client();
        let ctx = c.get(&transport, "/items", Parameters::none(), &[]).unwrap();
        c.options_mut().format = Some("php".to_string());
        assert!(ctx.options().format.is_none());
        assert_eq!(c.options().format.as_deref(), Some("php"));
    }
}
