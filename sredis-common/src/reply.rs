//! # Reply Values
//!
//! Purpose: Represent server replies as an owned tree and provide the small
//! set of helpers callers need to inspect them.
//!
//! ## Design Principles
//! 1. **Single Owner**: A top-level `Reply` is owned by the caller and released
//!    by dropping it; nested elements go with it.
//! 2. **Borrowed Children**: Nested elements are only handed out as `&Reply`,
//!    so a child can never outlive or be released apart from its root.
//! 3. **Errors Are Values**: Client-side failures become `Reply::Error` so a
//!    single predicate (`is_error`) covers both server and client failures.

use std::fmt::{self, Write as _};

use crate::error::{ClientError, IntegerError};

/// Reply tag, mirroring the RESP2 reply types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Status,
    Error,
    Integer,
    String,
    Nil,
    Array,
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyKind::Status => "STATUS",
            ReplyKind::Error => "ERROR",
            ReplyKind::Integer => "INTEGER",
            ReplyKind::String => "STRING",
            ReplyKind::Nil => "NIL",
            ReplyKind::Array => "ARRAY",
        };
        f.write_str(name)
    }
}

/// A reply from the server, or a client-side failure folded into an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` / `+QUEUED` style replies.
    Status(Vec<u8>),
    /// `-ERR ...` replies and client-side failures.
    Error(Vec<u8>),
    /// `:123` replies.
    Integer(i64),
    /// Non-null bulk strings.
    String(Vec<u8>),
    /// Null bulk string or null array (e.g. an aborted EXEC).
    Nil,
    /// Arrays, including the combined reply of a drained pipeline.
    Array(Vec<Reply>),
}

impl Reply {
    /// Builds an error-tagged reply from a message.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into().into_bytes())
    }

    /// Returns the tag of this reply.
    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Status(_) => ReplyKind::Status,
            Reply::Error(_) => ReplyKind::Error,
            Reply::Integer(_) => ReplyKind::Integer,
            Reply::String(_) => ReplyKind::String,
            Reply::Nil => ReplyKind::Nil,
            Reply::Array(_) => ReplyKind::Array,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Returns the payload of status, error and string replies.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Status(data) | Reply::Error(data) | Reply::String(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the elements of an array reply.
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrows the `index`-th element of an array reply.
    pub fn get(&self, index: usize) -> Option<&Reply> {
        self.as_array().and_then(|items| items.get(index))
    }

    /// Number of elements for arrays, zero for every other tag.
    pub fn len(&self) -> usize {
        self.as_array().map_or(0, <[Reply]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort integer coercion.
    ///
    /// Integer replies are returned as-is. Status and string replies are
    /// parsed: a bare integer (`[+-]?[0-9]+`) must fit in `i64`, anything else
    /// is parsed as floating point and truncated toward zero.
    ///
    /// # Errors
    /// - `IntegerError::InvalidArgument` for other tags or non-numeric text.
    /// - `IntegerError::OutOfRange` when the number does not fit in `i64`.
    pub fn integer_value(&self) -> Result<i64, IntegerError> {
        match self {
            Reply::Integer(value) => Ok(*value),
            Reply::Status(data) | Reply::String(data) => parse_integer(data),
            _ => Err(IntegerError::InvalidArgument),
        }
    }

    /// Like [`Reply::integer_value`] but yields zero alongside the error kind.
    pub fn integer_value_or_zero(&self) -> (i64, Option<IntegerError>) {
        match self.integer_value() {
            Ok(value) => (value, None),
            Err(err) => (0, Some(err)),
        }
    }

    /// Renders the reply tree for debugging.
    ///
    /// Every line starts with `prefix` followed by `indent` spaces; nested
    /// array elements are indented by two more spaces per level.
    pub fn dump(&self, prefix: &str, indent: usize) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_dump(&mut out, prefix, indent, None);
        out
    }

    fn write_dump<W: fmt::Write>(
        &self,
        out: &mut W,
        prefix: &str,
        indent: usize,
        position: Option<usize>,
    ) -> fmt::Result {
        write!(out, "{}{:indent$}", prefix, "", indent = indent)?;
        if let Some(position) = position {
            write!(out, "[{}] ", position)?;
        }
        match self {
            Reply::Status(data) | Reply::Error(data) | Reply::String(data) => {
                writeln!(out, "{} {:?}", self.kind(), String::from_utf8_lossy(data))
            }
            Reply::Integer(value) => writeln!(out, "{} {}", self.kind(), value),
            Reply::Nil => writeln!(out, "{}", self.kind()),
            Reply::Array(items) => {
                writeln!(out, "{}({})", self.kind(), items.len())?;
                for (idx, item) in items.iter().enumerate() {
                    item.write_dump(out, prefix, indent + 2, Some(idx))?;
                }
                Ok(())
            }
        }
    }
}

impl From<ClientError> for Reply {
    fn from(err: ClientError) -> Self {
        Reply::error(err.to_string())
    }
}

/// Returns true for a missing reply or an error-tagged one.
#[inline]
pub fn is_error(reply: Option<&Reply>) -> bool {
    reply.map_or(true, Reply::is_error)
}

fn parse_integer(raw: &[u8]) -> Result<i64, IntegerError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| IntegerError::InvalidArgument)?
        .trim_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() {
        return Err(IntegerError::InvalidArgument);
    }

    if is_integer_literal(text) {
        // Grammar already checked, so the only failure left is overflow.
        return text.parse::<i64>().map_err(|_| IntegerError::OutOfRange);
    }

    let value: f64 = text.parse().map_err(|_| IntegerError::InvalidArgument)?;
    if value.is_nan() {
        return Err(IntegerError::InvalidArgument);
    }
    // i64::MAX is not representable as f64; 2^63 is the first value past it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !value.is_finite() || value >= LIMIT || value < -LIMIT {
        return Err(IntegerError::OutOfRange);
    }
    Ok(value.trunc() as i64)
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
