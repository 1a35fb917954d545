//! Read-only access to a decoded response body.
//!
//! # Design
//! Decoded values are `serde_json::Value`s built with ordered maps, so the
//! decoded shape is one of null, scalar, sequence or ordered map. Lookup and
//! iteration are pattern matches over that shape: scalars iterate as empty
//! and miss every key instead of raising a type error.
//!
//! The view never hands out mutable access. `set` and `remove` exist so that
//! callers written against a map-like API get an explicit `ImmutableData`
//! error rather than silently editing a cached artifact.

use std::fmt;

use serde_json::Value;

use crate::error::{DecodeError, RestError};

/// Key into a decoded container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

/// Where a context is in its decode lifecycle.
///
/// A failure is cached like a success, so a decoder runs at most once per
/// response even when it rejects the body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DecodeState {
    #[default]
    NotDecoded,
    Decoded(Value),
    Failed(DecodeError),
}

/// Look up `key` in `value`. Index keys on a map use their decimal form and
/// numeric names on a sequence are parsed as indices.
pub fn lookup<'v>(value: &'v Value, key: &Key) -> Option<&'v Value> {
    match (value, key) {
        (Value::Array(items), Key::Index(i)) => items.get(*i),
        (Value::Array(items), Key::Name(name)) => {
            name.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        (Value::Object(map), Key::Name(name)) => map.get(name),
        (Value::Object(map), Key::Index(i)) => map.get(&i.to_string()),
        _ => None,
    }
}

/// Borrowed, read-only view of a decoded value.
#[derive(Debug, Clone, Copy)]
pub struct DecodedView<'a> {
    value: &'a Value,
}

impl<'a> DecodedView<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// The underlying decoded value.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.get(key).is_some()
    }

    /// `None` is the missing-key sentinel; a present `null` is `Some(Null)`.
    pub fn get(&self, key: impl Into<Key>) -> Option<&'a Value> {
        lookup(self.value, &key.into())
    }

    /// Number of entries; zero for scalars.
    pub fn len(&self) -> usize {
        match self.value {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in the decoded value's own order. Each call starts over from
    /// the first entry.
    pub fn iter(&self) -> Entries<'a> {
        let inner = match self.value {
            Value::Array(items) => EntriesInner::Sequence(items.iter().enumerate()),
            Value::Object(map) => EntriesInner::Map(map.iter()),
            _ => EntriesInner::Empty,
        };
        Entries { inner }
    }

    /// Always fails: decoded data is read-only.
    pub fn set(&self, _key: impl Into<Key>, _value: Value) -> Result<(), RestError> {
        Err(RestError::ImmutableData)
    }

    /// Always fails: decoded data is read-only.
    pub fn remove(&self, _key: impl Into<Key>) -> Result<(), RestError> {
        Err(RestError::ImmutableData)
    }
}

impl<'a> IntoIterator for DecodedView<'a> {
    type Item = (Key, &'a Value);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &DecodedView<'a> {
    type Item = (Key, &'a Value);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over `(key, value)` pairs of a decoded container.
pub struct Entries<'a> {
    inner: EntriesInner<'a>,
}

enum EntriesInner<'a> {
    Empty,
    Sequence(std::iter::Enumerate<std::slice::Iter<'a, Value>>),
    Map(serde_json::map::Iter<'a>),
}

impl<'a> Iterator for Entries<'a> {
    type Item = (Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            EntriesInner::Empty => None,
            EntriesInner::Sequence(it) => it.next().map(|(i, v)| (Key::Index(i), v)),
            EntriesInner::Map(it) => it.next().map(|(k, v)| (Key::Name(k.clone()), v)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            EntriesInner::Empty => (0, Some(0)),
            EntriesInner::Sequence(it) => it.size_hint(),
            EntriesInner::Map(it) => it.size_hint(),
        }
    }
}
