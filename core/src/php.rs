//! Decoder for PHP's native `serialize()` text format.
//!
//! Supported tokens:
//!
//! | token                         | decoded as                         |
//! |-------------------------------|------------------------------------|
//! | `N;`                          | `null`                             |
//! | `b:0;` / `b:1;`               | bool                               |
//! | `i:-42;`                      | integer                            |
//! | `d:0.5;`                      | float (`INF`, `-INF`, `NAN` → null)|
//! | `s:5:"hello";`                | string, length counted in bytes    |
//! | `a:2:{i:0;s:1:"x";i:1;N;}`    | sequence or ordered map            |
//! | `O:8:"stdClass":1:{...}`      | ordered map of the properties      |
//!
//! An array whose keys are exactly `0..n` in order decodes to a sequence; any
//! other array decodes to a map with stringified keys. References (`r:`,
//! `R:`) and custom-serialized objects (`C:`) are rejected.
//! Arrays and objects nested deeper than `MAX_DEPTH` are rejected.

use serde_json::{Map, Number, Value};

use crate::decoder::Decoder;
use crate::error::DecodeError;

/// Deepest array/object nesting accepted before decoding is abandoned.
pub const MAX_DEPTH: usize = 256;

/// Registered as the `php` format by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhpDecoder;

impl Decoder for PhpDecoder {
    fn decode(&self, body: &str) -> Result<Value, DecodeError> {
        unserialize(body)
    }
}

/// Decode one serialized value; trailing input is an error.
pub fn unserialize(input: &str) -> Result<Value, DecodeError> {
    let mut reader = Reader {
        input: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = reader.value()?;
    if reader.pos != reader.input.len() {
        return Err(reader.error("unexpected trailing data"));
    }
    Ok(value)
}

enum ArrayKey {
    Int(i64),
    Str(String),
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, message: &str) -> DecodeError {
        DecodeError::new("php", format!("{message} at offset {}", self.pos))
    }

    fn next(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), DecodeError> {
        let start = self.pos;
        let byte = self.next()?;
        if byte != expected {
            self.pos = start;
            return Err(self.error(&format!("expected '{}'", expected as char)));
        }
        Ok(())
    }

    /// Read up to `delim` and consume it.
    fn until(&mut self, delim: u8) -> Result<&'a str, DecodeError> {
        let input = self.input;
        let rest = &input[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == delim)
            .ok_or_else(|| self.error(&format!("missing '{}'", delim as char)))?;
        let token = std::str::from_utf8(&rest[..len]).map_err(|_| self.error("invalid utf-8"))?;
        self.pos += len + 1;
        Ok(token)
    }

    fn integer(&mut self, delim: u8) -> Result<i64, DecodeError> {
        let start = self.pos;
        let token = self.until(delim)?;
        token.parse().map_err(|_| {
            self.pos = start;
            self.error(&format!("invalid integer {token:?}"))
        })
    }

    fn count(&mut self) -> Result<usize, DecodeError> {
        let start = self.pos;
        let n = self.integer(b':')?;
        usize::try_from(n).map_err(|_| {
            self.pos = start;
            self.error("negative element count")
        })
    }

    /// `<len>:"<bytes>"`, without the trailing terminator.
    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.count()?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("string length exceeds input"))?;
        let text = std::str::from_utf8(&self.input[self.pos..end])
            .map_err(|_| self.error("invalid utf-8 in string"))?
            .to_string();
        self.pos = end;
        self.expect(b'"')?;
        Ok(text)
    }

    fn value(&mut self) -> Result<Value, DecodeError> {
        let tag_pos = self.pos;
        match self.next()? {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.until(b';')? {
                    "0" => Ok(Value::Bool(false)),
                    "1" => Ok(Value::Bool(true)),
                    _ => Err(self.error("invalid boolean")),
                }
            }
            b'i' => {
                self.expect(b':')?;
                Ok(Value::from(self.integer(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                self.float()
            }
            b's' => {
                self.expect(b':')?;
                let text = self.string()?;
                self.expect(b';')?;
                Ok(Value::String(text))
            }
            b'a' => {
                self.expect(b':')?;
                let entries = self.entries()?;
                Ok(array_value(entries))
            }
            b'O' => {
                self.expect(b':')?;
                self.string()?;
                self.expect(b':')?;
                let entries = self.entries()?;
                Ok(Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (property_name(key), value))
                        .collect(),
                ))
            }
            other => {
                self.pos = tag_pos;
                Err(self.error(&format!("unsupported token '{}'", other as char)))
            }
        }
    }

    fn float(&mut self) -> Result<Value, DecodeError> {
        let start = self.pos;
        let token = self.until(b';')?;
        let number: f64 = match token {
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NAN" => f64::NAN,
            _ => token.parse().map_err(|_| {
                self.pos = start;
                self.error(&format!("invalid float {token:?}"))
            })?,
        };
        Ok(Number::from_f64(number).map_or(Value::Null, Value::Number))
    }

    /// `<n>:{<key><value>...}`
    fn entries(&mut self) -> Result<Vec<(ArrayKey, Value)>, DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let n = self.count()?;
        self.expect(b'{')?;
        self.depth += 1;
        let mut entries = Vec::with_capacity(n.min(1024));
        for _ in 0..n {
            let key = self.key()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect(b'}')?;
        self.depth -= 1;
        Ok(entries)
    }

    fn key(&mut self) -> Result<ArrayKey, DecodeError> {
        let tag_pos = self.pos;
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                Ok(ArrayKey::Int(self.integer(b';')?))
            }
            b's' => {
                self.expect(b':')?;
                let key = self.string()?;
                self.expect(b';')?;
                Ok(ArrayKey::Str(key))
            }
            _ => {
                self.pos = tag_pos;
                Err(self.error("array key must be an integer or string"))
            }
        }
    }
}

fn array_value(entries: Vec<(ArrayKey, Value)>) -> Value {
    let is_list = entries
        .iter()
        .enumerate()
        .all(|(i, (key, _))| matches!(key, ArrayKey::Int(k) if usize::try_from(*k) == Ok(i)));
    if is_list {
        return Value::Array(entries.into_iter().map(|(_, value)| value).collect());
    }
    let map: Map<String, Value> = entries
        .into_iter()
        .map(|(key, value)| (key_string(key), value))
        .collect();
    Value::Object(map)
}

fn key_string(key: ArrayKey) -> String {
    match key {
        ArrayKey::Int(k) => k.to_string(),
        ArrayKey::Str(s) => s,
    }
}

/// Protected and private properties are serialized as `\0*\0name` and
/// `\0Class\0name`; keep only the name.
fn property_name(key: ArrayKey) -> String {
    let name = key_string(key);
    match name.rfind('\0') {
        Some(pos) => name[pos + 1..].to_string(),
        None => name,
    }
}
