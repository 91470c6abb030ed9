//! Rewriting a single column value.
//!
//! Plain text and HTML get the [`RewriteRule`] applied to the whole string.
//! Values that decode as PHP serialized data are rewritten structurally:
//! every string leaf of the decoded array is rewritten, every nested array
//! is descended into, and the tree is encoded again so that string lengths
//! stay correct.

use thiserror::Error;

use crate::rewrite::pattern::RewriteRule;
use crate::rewrite::serial::{self, DecodeError, SerialKey, SerialValue};

/// Outcome of rewriting one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub content: String,
    pub match_count: usize,
    pub serialized: bool,
}

/// Serialized value that cannot be rewritten safely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("cannot rewrite: unsupported serialized shape (root is a {0}, not an array)")]
    NonArrayRoot(&'static str),

    #[error("cannot rewrite: unsupported serialized shape (object of class {class} at {path})")]
    NestedObject { class: String, path: String },

    #[error("cannot rewrite: unsupported serialized shape (URL only appears in array keys)")]
    KeysOnly,

    #[error("cannot rewrite: unsupported serialized shape (re-encoded data is invalid: {0})")]
    Reencode(DecodeError),

    #[error("cannot rewrite: unsupported serialized shape (looks serialized but does not decode: {0})")]
    Malformed(DecodeError),
}

/// Decode `content` if it is serialized data. Plain text yields `None`.
pub fn detect(content: &str) -> Option<SerialValue> {
    serial::decode(content).ok()
}

/// Rewrite `content`, choosing plain or structural replacement.
///
/// Text that opens like a serialized array or object but does not decode is
/// refused rather than rewritten as plain text, since a plain replacement
/// would leave its length prefixes wrong.
///
/// Callers are expected to have checked [`RewriteRule::is_match`] first.
pub fn rewrite_content(rule: &RewriteRule, content: &str) -> Result<Rewritten, ShapeError> {
    let decoded = match serial::decode(content) {
        Ok(decoded) => decoded,
        Err(e) if serial::looks_like_container(content) => return Err(ShapeError::Malformed(e)),
        Err(_) => {
            let (replaced, match_count) = rule.rewrite(content);
            return Ok(Rewritten {
                content: replaced.into_owned(),
                match_count,
                serialized: false,
            });
        }
    };
    // Trailing whitespace accepted by the decoder is carried over as is.
    let tail = &content[content.trim_end_matches(|c: char| c.is_ascii_whitespace()).len()..];

    let members = match decoded {
        SerialValue::Array(members) => members,
        other => return Err(ShapeError::NonArrayRoot(kind_name(&other))),
    };

    let mut match_count = 0;
    let rewritten = SerialValue::Array(rewrite_members(rule, members, "", &mut match_count)?);
    if match_count == 0 {
        return Err(ShapeError::KeysOnly);
    }

    let encoded = rewritten.encode();
    match serial::decode(&encoded) {
        Ok(check) if check == rewritten => {}
        Ok(_) => {
            return Err(ShapeError::Reencode(DecodeError {
                offset: 0,
                reason: "decoded structure differs from the rewritten one".to_string(),
            }))
        }
        Err(e) => return Err(ShapeError::Reencode(e)),
    }

    Ok(Rewritten {
        content: encoded + tail,
        match_count,
        serialized: true,
    })
}

/// Rewrite every member of an array. All nested arrays are visited, not
/// just the first one found at a level.
fn rewrite_members(
    rule: &RewriteRule,
    members: Vec<(SerialKey, SerialValue)>,
    path: &str,
    count: &mut usize,
) -> Result<Vec<(SerialKey, SerialValue)>, ShapeError> {
    members
        .into_iter()
        .map(|(key, value)| {
            let member_path = format!("{}[{}]", path, key_label(&key));
            let value = rewrite_value(rule, value, &member_path, count)?;
            Ok((key, value))
        })
        .collect()
}

fn rewrite_value(
    rule: &RewriteRule,
    value: SerialValue,
    path: &str,
    count: &mut usize,
) -> Result<SerialValue, ShapeError> {
    match value {
        SerialValue::Str(s) => {
            let (replaced, n) = rule.rewrite(&s);
            *count += n;
            Ok(SerialValue::Str(replaced.into_owned()))
        }
        SerialValue::Array(members) => {
            Ok(SerialValue::Array(rewrite_members(rule, members, path, count)?))
        }
        SerialValue::Object { class, .. } | SerialValue::Custom { class, .. } => {
            Err(ShapeError::NestedObject {
                class,
                path: path.to_string(),
            })
        }
        scalar => Ok(scalar),
    }
}

fn key_label(key: &SerialKey) -> String {
    match key {
        SerialKey::Int(i) => i.to_string(),
        SerialKey::Str(s) => s.clone(),
    }
}

fn kind_name(value: &SerialValue) -> &'static str {
    match value {
        SerialValue::Null => "null",
        SerialValue::Bool(_) => "boolean",
        SerialValue::Int(_) => "integer",
        SerialValue::Float(_) => "float",
        SerialValue::Str(_) => "string",
        SerialValue::Array(_) => "array",
        SerialValue::Object { .. } | SerialValue::Custom { .. } => "object",
        SerialValue::Reference { .. } => "reference",
    }
}
