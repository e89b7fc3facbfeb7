//! Configuration items (products) and path-to-path cross-links

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::core::identity::PartKey;
use crate::structure::path::Path;

/// Directed, typed cross-reference between two resolved paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathToPathLink {
    pub id: Ulid,

    #[serde(rename = "type")]
    pub link_type: String,

    pub source: Path,

    pub target: Path,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created: DateTime<Utc>,
}

impl PathToPathLink {
    pub fn new(
        link_type: impl Into<String>,
        source: Path,
        target: Path,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            link_type: link_type.into(),
            source,
            target,
            description,
            created: Utc::now(),
        }
    }

    /// Same type, source and target
    pub fn same_triple(&self, other: &PathToPathLink) -> bool {
        self.link_type == other.link_type
            && self.source == other.source
            && self.target == other.target
    }
}

/// A product: the configuration item whose design item is a root assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationItem {
    pub id: String,

    pub design_item: PartKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_links: Vec<PathToPathLink>,
}

impl ConfigurationItem {
    pub fn new(id: impl Into<String>, design_item: PartKey, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            design_item,
            description,
            created: Utc::now(),
            path_links: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_path_link_yaml_uses_encoded_paths() {
        let link = PathToPathLink::new(
            "wired_to",
            Path::from_str("-1-u2").unwrap(),
            Path::from_str("-1-u5-s6").unwrap(),
            None,
        );
        let yaml = serde_yml::to_string(&link).unwrap();
        assert!(yaml.contains("type: wired_to"));
        assert!(yaml.contains("source: -1-u2"));
        assert!(yaml.contains("target: -1-u5-s6"));
    }

    #[test]
    fn test_same_triple_ignores_description() {
        let a = PathToPathLink::new("t", Path::ROOT, Path::from_str("-1-u2").unwrap(), None);
        let b = PathToPathLink::new(
            "t",
            Path::ROOT,
            Path::from_str("-1-u2").unwrap(),
            Some("again".to_string()),
        );
        assert!(a.same_triple(&b));
    }
}
