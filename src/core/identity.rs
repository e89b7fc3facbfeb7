//! Identity types - part numbers, link ids and revision letters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::PlmError;

/// Workspace-scoped identity of a part master (its part number)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartKey(String);

impl PartKey {
    pub fn new(number: impl Into<String>) -> Result<Self, PlmError> {
        let number = number.into();
        if number.is_empty() {
            return Err(PlmError::invalid_argument("part number must not be empty"));
        }
        if number.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(PlmError::invalid_argument(format!(
                "part number '{}' must not contain whitespace or '/'",
                number
            )));
        }
        Ok(Self(number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PartKey {
    type Err = PlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartKey::new(s)
    }
}

/// Identity of a usage or substitute link in the link arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of link as it appears in an encoded path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkCode {
    Usage,
    Substitute,
}

impl LinkCode {
    pub fn as_char(&self) -> char {
        match self {
            LinkCode::Usage => 'u',
            LinkCode::Substitute => 's',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'u' => Some(LinkCode::Usage),
            's' => Some(LinkCode::Substitute),
            _ => None,
        }
    }
}

impl fmt::Display for LinkCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkCode::Usage => write!(f, "usage"),
            LinkCode::Substitute => write!(f, "substitute"),
        }
    }
}

/// Points at one iteration of one revision of a master
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IterationRef {
    pub version: String,
    pub iteration: u32,
}

impl IterationRef {
    pub fn new(version: impl Into<String>, iteration: u32) -> Self {
        Self {
            version: version.into(),
            iteration,
        }
    }
}

impl fmt::Display for IterationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.version, self.iteration)
    }
}

/// First revision letter of every master
pub const FIRST_VERSION: &str = "A";

/// Next revision letter in spreadsheet order: A, B, ..., Z, AA, AB, ...
pub fn next_version(current: &str) -> String {
    let mut chars: Vec<u8> = current.bytes().collect();
    let mut i = chars.len();
    loop {
        if i == 0 {
            chars.insert(0, b'A');
            break;
        }
        i -= 1;
        if chars[i] == b'Z' {
            chars[i] = b'A';
        } else {
            chars[i] += 1;
            break;
        }
    }
    String::from_utf8(chars).unwrap_or_else(|_| FIRST_VERSION.to_string())
}
