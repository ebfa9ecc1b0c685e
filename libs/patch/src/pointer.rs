//! JSON Pointer (RFC 6901) parsing and resolution.
//!
//! A pointer is a sequence of reference tokens. `~1` decodes to `/` and `~0` decodes to `~`,
//! in that order, so `~01` is the literal token `~1`.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::{PatchError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pointer {
    tokens: Vec<String>,
}

/// Position addressed by a reference token inside an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayPosition {
    /// The `-` token: one past the last element.
    End,
    Index(usize),
}

impl Pointer {
    pub fn root() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PatchError::InvalidPointer {
                pointer: raw.to_string(),
                reason: "pointer must be empty or start with '/'".to_string(),
            });
        };

        let tokens = rest
            .split('/')
            .map(|token| unescape_token(token, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Splits the pointer into its parent and last token. `None` for the root pointer.
    pub fn split_last(&self) -> Option<(Pointer, &str)> {
        let (last, parent) = self.tokens.split_last()?;
        Some((
            Pointer {
                tokens: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// True when `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &Pointer) -> bool {
        other.tokens.len() >= self.tokens.len()
            && self.tokens.iter().zip(&other.tokens).all(|(a, b)| a == b)
    }

    pub fn resolve<'a>(&self, document: &'a JsonValue) -> Option<&'a JsonValue> {
        self.tokens
            .iter()
            .try_fold(document, |node, token| match node {
                JsonValue::Object(map) => map.get(token),
                JsonValue::Array(items) => match parse_array_token(token)? {
                    ArrayPosition::Index(i) => items.get(i),
                    ArrayPosition::End => None,
                },
                _ => None,
            })
    }

    pub fn resolve_mut<'a>(&self, document: &'a mut JsonValue) -> Option<&'a mut JsonValue> {
        let mut node = document;
        for token in &self.tokens {
            node = match node {
                JsonValue::Object(map) => map.get_mut(token)?,
                JsonValue::Array(items) => match parse_array_token(token)? {
                    ArrayPosition::Index(i) => items.get_mut(i)?,
                    ArrayPosition::End => return None,
                },
                _ => return None,
            };
        }
        Some(node)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape_token(token))?;
        }
        Ok(())
    }
}

pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Interprets a reference token as an array position.
///
/// Returns `None` for anything that is not `-` or a canonical non-negative integer
/// (leading zeros are not allowed by RFC 6901).
pub fn parse_array_token(token: &str) -> Option<ArrayPosition> {
    if token == "-" {
        return Some(ArrayPosition::End);
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok().map(ArrayPosition::Index)
}

fn unescape_token(token: &str, raw: &str) -> Result<String> {
    if !token.contains('~') {
        return Ok(token.to_string());
    }

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            Some(other) => {
                return Err(PatchError::InvalidPointer {
                    pointer: raw.to_string(),
                    reason: format!("invalid escape sequence '~{}'", other),
                })
            }
            None => {
                return Err(PatchError::InvalidPointer {
                    pointer: raw.to_string(),
                    reason: "dangling '~' at end of token".to_string(),
                })
            }
        }
    }
    Ok(out)
}
