//! Attribute values and token quoting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The value of an attribute: an ordered list of tokens.
///
/// A value with exactly one token is a scalar (`set status up`); any other
/// length is a list (`set allowaccess ping https ssh`). A value with no tokens
/// is an explicit empty list, which is distinct from the attribute being
/// absent. Tokens are stored unquoted and compared exactly, element by
/// element and in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrValue(Vec<String>);

impl AttrValue {
    /// A single-token value.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    /// A multi-token value.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// An explicit empty list.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns the token if this value is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self.0.as_slice() {
            [single] => Some(single.as_str()),
            _ => None,
        }
    }

    /// True when the value holds exactly one token.
    pub fn is_scalar(&self) -> bool {
        self.0.len() == 1
    }

    /// All tokens in order.
    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the explicit empty list.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tokens rendered for a `set` line, quoting where required.
    pub fn to_tokens(&self) -> String {
        self.0
            .iter()
            .map(|token| quote_token(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tokens())
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::scalar(value)
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl From<Vec<&str>> for AttrValue {
    fn from(values: Vec<&str>) -> Self {
        Self::list(values)
    }
}

/// True if a token cannot be written bare on a configuration line.
pub fn needs_quotes(token: &str) -> bool {
    token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\' || c == '\'')
}

/// Render a token, quoting and escaping it when necessary.
pub fn quote_token(token: &str) -> String {
    if needs_quotes(token) {
        force_quote(token)
    } else {
        token.to_string()
    }
}

/// Render an entry key the way the device shows it: numeric keys bare,
/// everything else quoted.
pub fn quote_key(key: &str) -> String {
    if is_numeric_key(key) {
        key.to_string()
    } else {
        force_quote(key)
    }
}

/// Render a `config` block or table name. Multi-word names are written bare
/// (`config firewall policy`) unless rejoining their words with single
/// spaces would change them, in which case the whole name is quoted.
pub fn quote_name(name: &str) -> String {
    if name.split(' ').all(|word| !needs_quotes(word)) {
        name.to_string()
    } else {
        force_quote(name)
    }
}

/// True if the key is an unsigned integer (a positional entry id).
pub fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

fn force_quote(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
