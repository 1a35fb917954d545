//! Base configuration shared by every call a client makes.

use regex::Regex;

use crate::decoder::{Decoder, DecoderRegistry};
use crate::error::RestError;
use crate::format::{compile_format_regex, DEFAULT_FORMAT_PATTERN};

/// Options applied to every request issued by a `RestClient`.
///
/// Built with `Default` plus the `with_*` setters:
///
/// ```
/// use restclient_core::ClientOptions;
///
/// let options = ClientOptions::default()
///     .with_base_url("https://api.example.com")
///     .with_header("Accept", "application/json")
///     .with_credentials("user", "secret");
/// assert_eq!(options.base_url.as_deref(), Some("https://api.example.com"));
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sent with every request; per-call headers with the same name win.
    pub headers: Vec<(String, String)>,
    /// Merged into every request's parameters; per-call values win.
    pub parameters: Vec<(String, String)>,
    pub user_agent: String,
    pub base_url: Option<String>,
    /// Forces the response format and is appended to the URL as `.format`.
    pub format: Option<String>,
    /// Content-type pattern whose second group is the format.
    pub format_regex: Regex,
    pub decoders: DecoderRegistry,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            parameters: Vec::new(),
            user_agent: concat!("restclient/", env!("CARGO_PKG_VERSION")).to_string(),
            base_url: None,
            format: None,
            format_regex: Regex::new(DEFAULT_FORMAT_PATTERN).expect("default format pattern is valid"),
            decoders: DecoderRegistry::default(),
            username: None,
            password: None,
        }
    }
}

impl ClientOptions {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Replace the content-type pattern. Fails if it does not compile or has
    /// fewer than two capture groups.
    pub fn with_format_regex(mut self, pattern: &str) -> Result<Self, RestError> {
        self.format_regex = compile_format_regex(pattern)?;
        Ok(self)
    }

    pub fn with_decoder(mut self, format: impl Into<String>, decoder: impl Decoder + 'static) -> Self {
        self.decoders.register(format, decoder);
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Basic credentials, only when both halves are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}
