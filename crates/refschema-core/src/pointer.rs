//! # JSON Pointer (RFC 6901)
//!
//! A [`JsonPointer`] is an ordered list of unescaped reference tokens. The
//! same type addresses two different trees in the engine:
//!
//! - the instance being validated, where the pointer becomes the
//!   `property_path` of a reported error;
//! - a schema document, where the fragment of a `$ref` URI such as
//!   `other.json#/$defs/foo` is parsed into `["$defs", "foo"]` and handed to
//!   keyword resolution one token at a time.
//!
//! Fragments taken from URIs are percent-encoded, so [`JsonPointer::from_fragment`]
//! decodes `%XX` sequences before applying the `~0`/`~1` unescaping.

use std::fmt;

use serde_json::Value;

use crate::error::PointerError;

/// A parsed JSON Pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer(Vec<String>);

impl JsonPointer {
    /// The empty pointer, addressing the whole document.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse the RFC 6901 string form.
    ///
    /// # Errors
    ///
    /// Returns [`PointerError::MissingLeadingSlash`] for a non-empty pointer
    /// that does not start with `/`, and [`PointerError::InvalidEscape`] for a
    /// `~` not followed by `0` or `1`.
    pub fn parse(pointer: &str) -> Result<Self, PointerError> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let rest = pointer
            .strip_prefix('/')
            .ok_or_else(|| PointerError::MissingLeadingSlash(pointer.to_string()))?;

        let mut tokens = Vec::new();
        let mut offset = 1;
        for raw in rest.split('/') {
            tokens.push(unescape(raw, pointer, offset)?);
            offset += raw.len() + 1;
        }
        Ok(Self(tokens))
    }

    /// Parse the fragment part of a URI (without the leading `#`).
    ///
    /// The fragment is percent-decoded first, then parsed as a pointer.
    pub fn from_fragment(fragment: &str) -> Result<Self, PointerError> {
        let decoded = percent_decode(fragment)?;
        Self::parse(&decoded)
    }

    /// Build a pointer from already-unescaped tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// The unescaped reference tokens.
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// True for the empty pointer.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reference tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`is_root`](Self::is_root).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a token in place.
    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    /// Remove the last token, returning it.
    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    /// A new pointer one level deeper.
    pub fn child(&self, token: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push(token);
        next
    }

    /// Descend into a value. Objects are indexed by key, arrays by a
    /// decimal index without leading zeros.
    pub fn get<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(value, |current, token| match current {
            Value::Object(map) => map.get(token),
            Value::Array(items) => parse_index(token).and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            f.write_str("/")?;
            f.write_str(&token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

/// Parse an array index token. Leading zeros are rejected per RFC 6901.
pub fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn unescape(raw: &str, pointer: &str, offset: usize) -> Result<String, PointerError> {
    if !raw.contains('~') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '0')) => out.push('~'),
            Some((_, '1')) => out.push('/'),
            _ => {
                return Err(PointerError::InvalidEscape {
                    pointer: pointer.to_string(),
                    offset: offset + i,
                })
            }
        }
    }
    Ok(out)
}

fn percent_decode(fragment: &str) -> Result<String, PointerError> {
    if !fragment.contains('%') {
        return Ok(fragment.to_string());
    }
    let invalid = || PointerError::InvalidPercentEncoding(fragment.to_string());
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = fragment.get(i + 1..i + 3).ok_or_else(invalid)?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| invalid())?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| invalid())
}
