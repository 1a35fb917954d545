//! Body decoders keyed by format identifier.
//!
//! # Design
//! A decoder is anything implementing `Decoder`, including plain closures
//! `Fn(&str) -> Result<Value, DecodeError>`. The registry stores them behind
//! `Arc` so cloning the client options (one snapshot per call) shares the
//! decoders instead of copying them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{DecodeError, RestError};
use crate::php::PhpDecoder;

/// Converts a response body into a decoded value.
pub trait Decoder: Send + Sync {
    fn decode(&self, body: &str) -> Result<Value, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&str) -> Result<Value, DecodeError> + Send + Sync,
{
    fn decode(&self, body: &str) -> Result<Value, DecodeError> {
        self(body)
    }
}

/// Decodes `application/json` bodies with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, body: &str) -> Result<Value, DecodeError> {
        serde_json::from_str(body).map_err(|e| DecodeError::new("json", e.to_string()))
    }
}

/// Mapping from format identifier to decoder.
///
/// `Default` pre-registers `json` and `php`; both may be overridden.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    /// A registry with no decoders at all.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `decoder` for `format`, replacing any previous entry.
    pub fn register(&mut self, format: impl Into<String>, decoder: impl Decoder + 'static) {
        self.decoders.insert(format.into(), Arc::new(decoder));
    }

    pub fn lookup(&self, format: &str) -> Result<Arc<dyn Decoder>, RestError> {
        self.decoders
            .get(format)
            .cloned()
            .ok_or_else(|| RestError::UnsupportedFormat {
                format: format.to_string(),
            })
    }

    pub fn contains(&self, format: &str) -> bool {
        self.decoders.contains_key(format)
    }

    /// Registered format identifiers, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("json", JsonDecoder);
        registry.register("php", PhpDecoder);
        registry
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}
