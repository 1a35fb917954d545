//! Parsed response header blocks.
//!
//! # Design
//! A raw response may carry several header blocks when the transport followed
//! redirects. Each block is a `HeaderBlock`; the `HeaderChain` holds the final
//! block as `current` and every earlier one in `previous`, in the order they
//! appeared on the wire.
//!
//! Names are normalized on insert and on lookup (trimmed, lowercased, `-`
//! replaced by `_`), so `Content-Type`, `content-type` and `CONTENT_TYPE` all
//! address the same entry. Repeated names accumulate in order.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Normalize a header name: trim, lowercase, hyphens to underscores.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

/// The value(s) recorded for one header name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// The first value seen for this name.
    pub fn first(&self) -> &str {
        match self {
            HeaderValue::Single(v) => v,
            HeaderValue::Multiple(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All values in order of appearance.
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(v) => vec![v.as_str()],
            HeaderValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(prior) => {
                let prior = std::mem::take(prior);
                *self = HeaderValue::Multiple(vec![prior, value]);
            }
            HeaderValue::Multiple(vs) => vs.push(value),
        }
    }
}

/// One status line plus its header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    http_code: String,
    fields: Vec<(String, HeaderValue)>,
}

impl HeaderBlock {
    pub fn new(status_line: &str) -> Self {
        Self {
            http_code: status_line.trim().to_string(),
            fields: Vec::new(),
        }
    }

    /// The raw status line, e.g. `HTTP/1.1 200 OK`. Empty when the response
    /// carried no header block at all.
    pub fn http_code(&self) -> &str {
        &self.http_code
    }

    /// Record a header. A repeated name turns into a `Multiple` value, except
    /// that an empty earlier value is replaced.
    pub fn insert(&mut self, name: &str, value: &str) {
        let name = normalize_name(name);
        let value = value.trim().to_string();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) if matches!(&*existing, HeaderValue::Single(v) if v.is_empty()) => {
                *existing = HeaderValue::Single(value)
            }
            Some((_, existing)) => existing.push(value),
            None => self.fields.push((name, HeaderValue::Single(value))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let name = normalize_name(name);
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Shorthand for the `content_type` field.
    pub fn content_type(&self) -> Option<&str> {
        self.get("content_type").map(HeaderValue::first)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.http_code.is_empty() && self.fields.is_empty()
    }

    /// Fields in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Serialize for HeaderBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("http_code", &self.http_code)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The final header block plus the redirect history that preceded it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct HeaderChain {
    pub current: HeaderBlock,
    pub previous: Vec<HeaderBlock>,
}

impl HeaderChain {
    /// Start a new block, demoting the current one (if any) into `previous`.
    pub(crate) fn begin_block(&mut self, status_line: &str) -> &mut HeaderBlock {
        let prior = std::mem::replace(&mut self.current, HeaderBlock::new(status_line));
        if !prior.is_empty() {
            self.previous.push(prior);
        }
        &mut self.current
    }

    pub fn http_code(&self) -> &str {
        self.current.http_code()
    }

    /// Look up a header on the current block.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.current.get(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.current.content_type()
    }

    pub fn has_previous(&self) -> bool {
        !self.previous.is_empty()
    }
}
