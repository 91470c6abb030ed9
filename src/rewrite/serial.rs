//! PHP `serialize()` text format.
//!
//! CMS content frequently stores option blobs and widget settings through
//! PHP's `serialize()`. Strings in that format carry a byte-length prefix
//! (`s:5:"hello";`), so a plain text replacement inside one corrupts the
//! whole value. This module decodes the format into a [`SerialValue`] tree
//! and encodes it back, recomputing every length.
//!
//! Supported tags:
//!
//! | Tag | Example | Variant |
//! |-----|---------|---------|
//! | `N` | `N;` | [`SerialValue::Null`] |
//! | `b` | `b:1;` | [`SerialValue::Bool`] |
//! | `i` | `i:42;` | [`SerialValue::Int`] |
//! | `d` | `d:0.5;` | [`SerialValue::Float`] (raw text kept) |
//! | `s` | `s:3:"abc";` | [`SerialValue::Str`] |
//! | `a` | `a:1:{i:0;s:1:"x";}` | [`SerialValue::Array`] |
//! | `O` | `O:8:"stdClass":0:{}` | [`SerialValue::Object`] |
//! | `C` | `C:11:"ArrayObject":4:{x:i0}` | [`SerialValue::Custom`] (payload kept opaque) |
//! | `r`/`R` | `R:2;` | [`SerialValue::Reference`] |

use std::fmt;

use thiserror::Error;

/// Nesting limit for arrays and objects.
const MAX_DEPTH: usize = 512;

/// Array or object member key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialKey {
    Int(i64),
    Str(String),
}

/// Decoded serialized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Float in its original textual form so that encoding is lossless.
    Float(String),
    Str(String),
    /// Ordered key/value container (PHP array).
    Array(Vec<(SerialKey, SerialValue)>),
    /// Class instance. Decoded so that it can be recognized, never rewritten.
    Object {
        class: String,
        members: Vec<(SerialKey, SerialValue)>,
    },
    /// Object written by a class's own `serialize()` method. The payload
    /// format belongs to the class, so it is kept as raw text.
    Custom { class: String, data: String },
    /// Back-reference to an earlier value (`r:` when `strong` is false, `R:` otherwise).
    Reference { strong: bool, index: u64 },
}

/// Input is not a well-formed serialized value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed serialized data at byte {offset}: {reason}")]
pub struct DecodeError {
    pub offset: usize,
    pub reason: String,
}

/// Decode a complete serialized value.
///
/// The whole input must be consumed. Trailing ASCII whitespace is allowed,
/// as PHP's `unserialize()` allows it; any other trailing byte is an error.
pub fn decode(input: &str) -> Result<SerialValue, DecodeError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    if !input.as_bytes()[parser.pos..]
        .iter()
        .all(u8::is_ascii_whitespace)
    {
        return Err(parser.error("trailing data after value"));
    }
    Ok(value)
}

/// Whether `input` opens like a serialized array or object
/// (`a:<n>:{`, `O:<n>:"`, `C:<n>:"`), whether or not the rest is valid.
pub fn looks_like_container(input: &str) -> bool {
    let bytes = input.as_bytes();
    let (open, rest) = match bytes {
        [b'a', b':', rest @ ..] => (b'{', rest),
        [b'O' | b'C', b':', rest @ ..] => (b'"', rest),
        _ => return false,
    };
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    digits > 0 && rest.get(digits) == Some(&b':') && rest.get(digits + 1) == Some(&open)
}

impl SerialValue {
    /// Encode back to serialized text.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// True for arrays and objects of either kind.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SerialValue::Array(_) | SerialValue::Object { .. } | SerialValue::Custom { .. }
        )
    }
}

impl fmt::Display for SerialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialKey::Int(i) => write!(f, "i:{};", i),
            SerialKey::Str(s) => write!(f, "s:{}:\"{}\";", s.len(), s),
        }
    }
}

impl fmt::Display for SerialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialValue::Null => write!(f, "N;"),
            SerialValue::Bool(b) => write!(f, "b:{};", u8::from(*b)),
            SerialValue::Int(i) => write!(f, "i:{};", i),
            SerialValue::Float(raw) => write!(f, "d:{};", raw),
            SerialValue::Str(s) => write!(f, "s:{}:\"{}\";", s.len(), s),
            SerialValue::Array(members) => {
                write!(f, "a:{}:{{", members.len())?;
                write_members(f, members)?;
                write!(f, "}}")
            }
            SerialValue::Object { class, members } => {
                write!(f, "O:{}:\"{}\":{}:{{", class.len(), class, members.len())?;
                write_members(f, members)?;
                write!(f, "}}")
            }
            SerialValue::Custom { class, data } => {
                write!(f, "C:{}:\"{}\":{}:{{{}}}", class.len(), class, data.len(), data)
            }
            SerialValue::Reference { strong, index } => {
                write!(f, "{}:{};", if *strong { 'R' } else { 'r' }, index)
            }
        }
    }
}

fn write_members(f: &mut fmt::Formatter<'_>, members: &[(SerialKey, SerialValue)]) -> fmt::Result {
    for (key, value) in members {
        write!(f, "{}{}", key, value)?;
    }
    Ok(())
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> DecodeError {
        DecodeError {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn next_byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .input
            .as_bytes()
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect(&mut self, want: u8) -> Result<(), DecodeError> {
        let got = self.next_byte()?;
        if got != want {
            self.pos -= 1;
            return Err(self.error(&format!("expected '{}'", want as char)));
        }
        Ok(())
    }

    /// Read up to (and consume) `delim`, returning the text before it.
    fn read_until(&mut self, delim: u8) -> Result<&'a str, DecodeError> {
        let rest = &self.input.as_bytes()[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == delim)
            .ok_or_else(|| self.error(&format!("missing '{}'", delim as char)))?;
        // `delim` is ASCII, so both ends fall on char boundaries.
        let text = &self.input[self.pos..self.pos + len];
        self.pos += len + 1;
        Ok(text)
    }

    fn read_number<T: std::str::FromStr>(&mut self, delim: u8) -> Result<T, DecodeError> {
        let start = self.pos;
        let text = self.read_until(delim)?;
        text.parse().map_err(|_| DecodeError {
            offset: start,
            reason: format!("invalid number '{}'", text),
        })
    }

    fn read_quoted(&mut self, len: usize) -> Result<&'a str, DecodeError> {
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| self.error("string length overflow"))?;
        let text = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| self.error("string length does not match content"))?;
        self.pos = end;
        self.expect(b'"')?;
        Ok(text)
    }

    fn value(&mut self, depth: usize) -> Result<SerialValue, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let tag = self.next_byte()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(SerialValue::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.read_until(b';')? {
                    "0" => Ok(SerialValue::Bool(false)),
                    "1" => Ok(SerialValue::Bool(true)),
                    _ => Err(self.error("invalid boolean")),
                }
            }
            b'i' => {
                self.expect(b':')?;
                Ok(SerialValue::Int(self.read_number(b';')?))
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.read_until(b';')?;
                let valid = matches!(raw, "INF" | "-INF" | "NAN") || raw.parse::<f64>().is_ok();
                if !valid {
                    return Err(self.error("invalid float"));
                }
                Ok(SerialValue::Float(raw.to_string()))
            }
            b's' => {
                self.expect(b':')?;
                let len: usize = self.read_number(b':')?;
                let text = self.read_quoted(len)?;
                self.expect(b';')?;
                Ok(SerialValue::Str(text.to_string()))
            }
            b'a' => {
                self.expect(b':')?;
                let count: usize = self.read_number(b':')?;
                let members = self.members(count, depth)?;
                Ok(SerialValue::Array(members))
            }
            b'O' => {
                self.expect(b':')?;
                let len: usize = self.read_number(b':')?;
                let class = self.read_quoted(len)?.to_string();
                self.expect(b':')?;
                let count: usize = self.read_number(b':')?;
                let members = self.members(count, depth)?;
                Ok(SerialValue::Object { class, members })
            }
            b'C' => {
                self.expect(b':')?;
                let len: usize = self.read_number(b':')?;
                let class = self.read_quoted(len)?.to_string();
                self.expect(b':')?;
                let data_len: usize = self.read_number(b':')?;
                self.expect(b'{')?;
                let end = self
                    .pos
                    .checked_add(data_len)
                    .ok_or_else(|| self.error("payload length overflow"))?;
                let data = self
                    .input
                    .get(self.pos..end)
                    .ok_or_else(|| self.error("payload length does not match content"))?
                    .to_string();
                self.pos = end;
                self.expect(b'}')?;
                Ok(SerialValue::Custom { class, data })
            }
            b'r' | b'R' => {
                self.expect(b':')?;
                let index = self.read_number(b';')?;
                Ok(SerialValue::Reference {
                    strong: tag == b'R',
                    index,
                })
            }
            _ => {
                self.pos -= 1;
                Err(self.error("unknown type tag"))
            }
        }
    }

    fn members(
        &mut self,
        count: usize,
        depth: usize,
    ) -> Result<Vec<(SerialKey, SerialValue)>, DecodeError> {
        self.expect(b'{')?;
        let mut members = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key_offset = self.pos;
            let key = match self.value(depth + 1)? {
                SerialValue::Int(i) => SerialKey::Int(i),
                SerialValue::Str(s) => SerialKey::Str(s),
                _ => {
                    return Err(DecodeError {
                        offset: key_offset,
                        reason: "member key must be an integer or string".to_string(),
                    })
                }
            };
            let value = self.value(depth + 1)?;
            members.push((key, value));
        }
        self.expect(b'}')?;
        Ok(members)
    }
}
