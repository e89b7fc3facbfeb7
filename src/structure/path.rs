//! Path addresses of nodes in a resolved assembly tree
//!
//! A path is the sequence of links walked from the root assembly. Its
//! canonical string form is `-1` for the root, followed by one `-<code><id>`
//! step per level, where the code is `u` (usage link) or `s` (substitute
//! link), e.g. `-1-u12-s40-u7`. Two paths are equal exactly when their
//! encoded forms are equal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{PlmError, PlmResult};
use crate::core::identity::{LinkCode, LinkId};
use crate::entities::link::{LinkArena, PartLink};

/// Encoded form of the synthetic root link
pub const ROOT_TOKEN: &str = "-1";

/// Id of the synthetic root link
pub const ROOT_LINK_ID: LinkId = LinkId(1);

/// One level of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub code: LinkCode,
    pub id: LinkId,
}

impl PathStep {
    pub fn of(link: &PartLink<'_>) -> Self {
        Self {
            code: link.code(),
            id: link.id(),
        }
    }
}

/// Canonical address of a node, relative to the root assembly
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// The root assembly itself
    pub const ROOT: Path = Path { steps: Vec::new() };

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn from_links(links: &[PartLink<'_>]) -> Self {
        Self {
            steps: links.iter().map(PathStep::of).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// Path one level down through `link`
    pub fn child(&self, link: &PartLink<'_>) -> Path {
        let mut steps = self.steps.clone();
        steps.push(PathStep::of(link));
        Path { steps }
    }

    /// Path one level up; `None` for the root
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Path {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.steps.starts_with(&prefix.steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT_TOKEN)?;
        for step in &self.steps {
            write!(f, "-{}{}", step.code.as_char(), step.id)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PlmError::invalid_argument(format!("malformed path '{}'", s));

        let rest = s.strip_prefix(ROOT_TOKEN).ok_or_else(malformed)?;
        if rest.is_empty() {
            return Ok(Path::ROOT);
        }
        let rest = rest.strip_prefix('-').ok_or_else(malformed)?;

        let mut steps = Vec::new();
        for token in rest.split('-') {
            let mut chars = token.chars();
            let code = chars
                .next()
                .and_then(LinkCode::from_char)
                .ok_or_else(malformed)?;
            let digits = chars.as_str();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            let id = digits.parse::<u64>().map_err(|_| malformed())?;
            steps.push(PathStep {
                code,
                id: LinkId(id),
            });
        }
        Ok(Path { steps })
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Encode a link chain into its canonical path string
pub fn encode(links: &[PartLink<'_>]) -> String {
    Path::from_links(links).to_string()
}

/// Decode a path string into the links it names
///
/// Purely structural: each id must resolve to a link of the matching code,
/// but the chain is not checked against the current tree. A path whose links
/// were deleted fails with `NotFound`.
pub fn decode<'a>(arena: &'a LinkArena, encoded: &str) -> PlmResult<Vec<PartLink<'a>>> {
    if encoded.trim().is_empty() {
        return Err(PlmError::invalid_argument("path must not be empty"));
    }
    let path: Path = encoded.parse()?;
    resolve(arena, &path)
}

/// Resolve an already-parsed path against the arena
pub fn resolve<'a>(arena: &'a LinkArena, path: &Path) -> PlmResult<Vec<PartLink<'a>>> {
    path.steps()
        .iter()
        .map(|step| {
            arena
                .resolve(step.code, step.id)
                .ok_or_else(|| PlmError::not_found("path link", format!("{}{}", step.code.as_char(), step.id)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::PartKey;
    use crate::entities::link::{NewSubstitute, NewUsage};

    fn key(s: &str) -> PartKey {
        PartKey::new(s).unwrap()
    }

    #[test]
    fn test_root_encoding() {
        assert_eq!(Path::ROOT.to_string(), "-1");
        assert_eq!("-1".parse::<Path>().unwrap(), Path::ROOT);
        assert!(Path::ROOT.parent().is_none());
    }

    #[test]
    fn test_parse_steps() {
        let path: Path = "-1-u12-s40-u7".parse().unwrap();
        assert_eq!(path.depth(), 3);
        assert_eq!(path.steps()[1].code, LinkCode::Substitute);
        assert_eq!(path.steps()[1].id, LinkId(40));
        assert_eq!(path.to_string(), "-1-u12-s40-u7");
        assert_eq!(path.parent().unwrap().to_string(), "-1-u12-s40");
    }

    #[test]
    fn test_malformed_paths() {
        for bad in ["", "1", "-10", "-1-", "-1-x3", "-1-u", "-1-u1a", "-1--u2", "-1-u-3", "u2"] {
            let err = bad.parse::<Path>().unwrap_err();
            assert!(
                matches!(err, PlmError::InvalidArgument(_)),
                "expected InvalidArgument for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_decode_round_trip() {
        let mut arena = LinkArena::new();
        let u = arena.insert(NewUsage::of(key("A")).substitute(NewSubstitute::of(key("B"))));
        let s = arena.usage(u).unwrap().substitutes[0];
        let chain = vec![
            PartLink::Usage(arena.usage(u).unwrap()),
            PartLink::Substitute(arena.substitute(s).unwrap()),
        ];
        let encoded = encode(&chain);
        assert_eq!(encoded, format!("-1-u{}-s{}", u, s));
        let decoded = decode(&arena, &encoded).unwrap();
        assert_eq!(decoded, chain);
    }

    #[test]
    fn test_decode_wrong_code_is_not_found() {
        let mut arena = LinkArena::new();
        let u = arena.insert(NewUsage::of(key("A")));
        let err = decode(&arena, &format!("-1-s{}", u)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_decode_empty_is_invalid() {
        let arena = LinkArena::new();
        assert!(matches!(
            decode(&arena, "  "),
            Err(PlmError::InvalidArgument(_))
        ));
        assert!(decode(&arena, "-1").unwrap().is_empty());
    }

    #[test]
    fn test_starts_with() {
        let parent: Path = "-1-u2".parse().unwrap();
        let child: Path = "-1-u2-u5".parse().unwrap();
        assert!(child.starts_with(&parent));
        assert!(child.starts_with(&Path::ROOT));
        assert!(!parent.starts_with(&child));
    }
}
