//! Baselines and product instances - frozen configurations of a product

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::identity::{IterationRef, LinkId, PartKey};
use crate::entities::product::PathToPathLink;

/// How a baseline picked its iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum BaselineKind {
    #[default]
    Latest,
    Released,
}

impl std::fmt::Display for BaselineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineKind::Latest => write!(f, "latest"),
            BaselineKind::Released => write!(f, "released"),
        }
    }
}

impl std::str::FromStr for BaselineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(BaselineKind::Latest),
            "released" => Ok(BaselineKind::Released),
            _ => Err(format!(
                "Invalid baseline type: {}. Use 'latest' or 'released'",
                s
            )),
        }
    }
}

/// The frozen map every baseline-like filter looks up
///
/// Keys of `substitute_choices` and `excluded_optional` are encoded paths of
/// usage links; a choice names the substitute link that replaces the usage
/// link at that path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrozenConfiguration {
    #[serde(default)]
    pub parts: BTreeMap<PartKey, IterationRef>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substitute_choices: BTreeMap<String, LinkId>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_optional: BTreeSet<String>,
}

impl FrozenConfiguration {
    pub fn iteration_for(&self, part: &PartKey) -> Option<&IterationRef> {
        self.parts.get(part)
    }
}

/// Choices applied when freezing a baseline
#[derive(Debug, Clone, Default)]
pub struct BaselineChoices {
    /// usage-link path -> substitute link to use instead
    pub substitutes: BTreeMap<String, LinkId>,
    /// paths of optional usage links to leave out
    pub excluded_optional: BTreeSet<String>,
}

/// Named frozen snapshot of a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductBaseline {
    pub id: u32,

    pub name: String,

    pub product: String,

    #[serde(rename = "type", default)]
    pub kind: BaselineKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created: DateTime<Utc>,

    pub author: String,

    pub configuration: FrozenConfiguration,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_links: Vec<PathToPathLink>,
}

/// One frozen state of a shipped product instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceIteration {
    pub number: u32,

    /// Baseline this iteration was frozen from
    pub based_on: u32,

    pub created: DateTime<Utc>,

    pub author: String,

    pub configuration: FrozenConfiguration,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_links: Vec<PathToPathLink>,
}

/// A shipped unit of a product, identified by its serial number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInstance {
    pub product: String,

    pub serial: String,

    #[serde(default)]
    pub iterations: Vec<InstanceIteration>,
}

impl ProductInstance {
    pub fn last_iteration(&self) -> Option<&InstanceIteration> {
        self.iterations.last()
    }

    /// File stem under `instances/`
    pub fn file_stem(product: &str, serial: &str) -> String {
        format!("{}--{}", product, serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_kind_parse() {
        assert_eq!("latest".parse::<BaselineKind>(), Ok(BaselineKind::Latest));
        assert_eq!(
            "RELEASED".parse::<BaselineKind>(),
            Ok(BaselineKind::Released)
        );
        assert!("wip".parse::<BaselineKind>().is_err());
    }

    #[test]
    fn test_frozen_configuration_lookup() {
        let mut frozen = FrozenConfiguration::default();
        let key = PartKey::new("P-1").unwrap();
        frozen.parts.insert(key.clone(), IterationRef::new("B", 2));
        assert_eq!(frozen.iteration_for(&key), Some(&IterationRef::new("B", 2)));
        assert!(frozen
            .iteration_for(&PartKey::new("P-2").unwrap())
            .is_none());
    }
}
