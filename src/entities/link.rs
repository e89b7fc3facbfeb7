//! Usage and substitute links - BOM edges between iterations and child masters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::PlmError;
use crate::core::identity::{LinkCode, LinkId, PartKey};

/// Placement of one occurrence of a component in its parent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CadInstance {
    #[serde(default)]
    pub translation: [f64; 3],
    /// Rotation angles about x, y and z, in radians
    #[serde(default)]
    pub rotation: [f64; 3],
}

impl std::str::FromStr for CadInstance {
    type Err = PlmError;

    /// `tx,ty,tz` or `tx,ty,tz,rx,ry,rz`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| PlmError::invalid_argument(format!("bad placement '{}'", s)))?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PlmError::invalid_argument(format!("bad placement '{}'", s)));
        }
        match values.as_slice() {
            [tx, ty, tz] => Ok(Self {
                translation: [*tx, *ty, *tz],
                rotation: [0.0; 3],
            }),
            [tx, ty, tz, rx, ry, rz] => Ok(Self {
                translation: [*tx, *ty, *tz],
                rotation: [*rx, *ry, *rz],
            }),
            _ => Err(PlmError::invalid_argument(format!(
                "placement '{}' needs 3 or 6 numbers",
                s
            ))),
        }
    }
}

/// Alternate component offered in place of a usage link's primary child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteLink {
    pub id: LinkId,

    pub substitute: PartKey,

    #[serde(default = "default_amount")]
    pub amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cad_instances: Vec<CadInstance>,
}

/// BOM edge from an iteration to a child master
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLink {
    pub id: LinkId,

    pub component: PartKey,

    #[serde(default = "default_amount")]
    pub amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Optional links can be left out of a baseline
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_description: Option<String>,

    /// Substitute link ids in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutes: Vec<LinkId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cad_instances: Vec<CadInstance>,
}

fn default_amount() -> f64 {
    1.0
}

/// A usage or substitute link as seen by a traversal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartLink<'a> {
    Usage(&'a UsageLink),
    Substitute(&'a SubstituteLink),
}

impl<'a> PartLink<'a> {
    pub fn id(&self) -> LinkId {
        match self {
            PartLink::Usage(link) => link.id,
            PartLink::Substitute(link) => link.id,
        }
    }

    pub fn code(&self) -> LinkCode {
        match self {
            PartLink::Usage(_) => LinkCode::Usage,
            PartLink::Substitute(_) => LinkCode::Substitute,
        }
    }

    /// The child master this link points to
    pub fn component(&self) -> &'a PartKey {
        match self {
            PartLink::Usage(link) => &link.component,
            PartLink::Substitute(link) => &link.substitute,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            PartLink::Usage(link) => link.amount,
            PartLink::Substitute(link) => link.amount,
        }
    }

    pub fn unit(&self) -> Option<&'a str> {
        match self {
            PartLink::Usage(link) => link.unit.as_deref(),
            PartLink::Substitute(link) => link.unit.as_deref(),
        }
    }
}

/// Request for a new usage link, before an id is assigned
#[derive(Debug, Clone)]
pub struct NewUsage {
    pub component: PartKey,
    pub amount: f64,
    pub unit: Option<String>,
    pub optional: bool,
    pub reference_description: Option<String>,
    pub substitutes: Vec<NewSubstitute>,
    pub cad_instances: Vec<CadInstance>,
}

impl NewUsage {
    pub fn of(component: PartKey) -> Self {
        Self {
            component,
            amount: 1.0,
            unit: None,
            optional: false,
            reference_description: None,
            substitutes: Vec::new(),
            cad_instances: Vec::new(),
        }
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn substitute(mut self, substitute: NewSubstitute) -> Self {
        self.substitutes.push(substitute);
        self
    }

    pub fn placed_at(mut self, instance: CadInstance) -> Self {
        self.cad_instances.push(instance);
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewSubstitute {
    pub substitute: PartKey,
    pub amount: f64,
    pub unit: Option<String>,
    pub reference_description: Option<String>,
    pub cad_instances: Vec<CadInstance>,
}

impl NewSubstitute {
    pub fn of(substitute: PartKey) -> Self {
        Self {
            substitute,
            amount: 1.0,
            unit: None,
            reference_description: None,
            cad_instances: Vec::new(),
        }
    }

    pub fn placed_at(mut self, instance: CadInstance) -> Self {
        self.cad_instances.push(instance);
        self
    }
}

/// Arena of immutable links indexed by id
///
/// Usage and substitute links share one id sequence, so an id resolves to
/// at most one link and the path code tells which kind was meant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkArena {
    #[serde(default = "first_link_id")]
    next_id: u64,

    #[serde(default)]
    usage: BTreeMap<LinkId, UsageLink>,

    #[serde(default)]
    substitute: BTreeMap<LinkId, SubstituteLink>,
}

fn first_link_id() -> u64 {
    1
}

impl LinkArena {
    pub fn new() -> Self {
        Self {
            next_id: first_link_id(),
            usage: BTreeMap::new(),
            substitute: BTreeMap::new(),
        }
    }

    fn allocate(&mut self) -> LinkId {
        // id 1 is reserved for the synthetic root link
        if self.next_id < 2 {
            self.next_id = 2;
        }
        let id = LinkId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn usage(&self, id: LinkId) -> Option<&UsageLink> {
        self.usage.get(&id)
    }

    pub fn substitute(&self, id: LinkId) -> Option<&SubstituteLink> {
        self.substitute.get(&id)
    }

    pub fn resolve(&self, code: LinkCode, id: LinkId) -> Option<PartLink<'_>> {
        match code {
            LinkCode::Usage => self.usage(id).map(PartLink::Usage),
            LinkCode::Substitute => self.substitute(id).map(PartLink::Substitute),
        }
    }

    pub fn len(&self) -> usize {
        self.usage.len() + self.substitute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty() && self.substitute.is_empty()
    }

    /// Insert a new usage link together with its substitutes
    pub fn insert(&mut self, request: NewUsage) -> LinkId {
        let id = self.allocate();
        let substitutes = request
            .substitutes
            .into_iter()
            .map(|s| {
                let sub_id = self.allocate();
                self.substitute.insert(
                    sub_id,
                    SubstituteLink {
                        id: sub_id,
                        substitute: s.substitute,
                        amount: s.amount,
                        unit: s.unit,
                        reference_description: s.reference_description,
                        cad_instances: s.cad_instances,
                    },
                );
                sub_id
            })
            .collect();
        self.usage.insert(
            id,
            UsageLink {
                id,
                component: request.component,
                amount: request.amount,
                unit: request.unit,
                optional: request.optional,
                reference_description: request.reference_description,
                substitutes,
                cad_instances: request.cad_instances,
            },
        );
        id
    }

    /// Copy a usage link and its substitutes under fresh ids
    pub fn clone_usage(&mut self, id: LinkId) -> Option<LinkId> {
        let original = self.usage.get(&id)?.clone();
        let new_id = self.allocate();
        let mut substitutes = Vec::with_capacity(original.substitutes.len());
        for sub_id in &original.substitutes {
            if let Some(sub) = self.substitute.get(sub_id).cloned() {
                let copy_id = self.allocate();
                self.substitute.insert(
                    copy_id,
                    SubstituteLink {
                        id: copy_id,
                        ..sub
                    },
                );
                substitutes.push(copy_id);
            }
        }
        self.usage.insert(
            new_id,
            UsageLink {
                id: new_id,
                substitutes,
                ..original
            },
        );
        Some(new_id)
    }

    /// Delete a usage link and the substitutes it owns
    pub fn remove_usage(&mut self, id: LinkId) -> Option<UsageLink> {
        let removed = self.usage.remove(&id)?;
        for sub_id in &removed.substitutes {
            self.substitute.remove(sub_id);
        }
        Some(removed)
    }

    /// Whether `candidate` is declared as a substitute of usage link `usage`
    pub fn is_substitute_of(&self, candidate: LinkId, usage: LinkId) -> bool {
        self.usage
            .get(&usage)
            .is_some_and(|u| u.substitutes.contains(&candidate))
    }

    /// Usage links (with their substitutes) pointing at `part`
    pub fn references_to<'a>(&'a self, part: &'a PartKey) -> impl Iterator<Item = LinkId> + 'a {
        self.usage.values().filter_map(move |u| {
            let via_substitute = u
                .substitutes
                .iter()
                .filter_map(|s| self.substitute.get(s))
                .any(|s| &s.substitute == part);
            (&u.component == part || via_substitute).then_some(u.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PartKey {
        PartKey::new(s).unwrap()
    }

    #[test]
    fn test_ids_skip_root_and_are_shared() {
        let mut arena = LinkArena::new();
        let u = arena.insert(NewUsage::of(key("A")).substitute(NewSubstitute::of(key("B"))));
        assert_eq!(u, LinkId(2));
        let usage = arena.usage(u).unwrap();
        assert_eq!(usage.substitutes, vec![LinkId(3)]);
        assert!(arena.substitute(LinkId(3)).is_some());
        assert!(arena.usage(LinkId(3)).is_none());
    }

    #[test]
    fn test_placements_parse() {
        let short: CadInstance = "1, 2.5, -3".parse().unwrap();
        assert_eq!(short.translation, [1.0, 2.5, -3.0]);
        assert_eq!(short.rotation, [0.0; 3]);
        let full: CadInstance = "0,0,0,0,0,1.57".parse().unwrap();
        assert_eq!(full.rotation, [0.0, 0.0, 1.57]);
        for bad in ["", "1,2", "1,2,3,4", "a,b,c", "1,2,NaN"] {
            assert!(bad.parse::<CadInstance>().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_placements_are_stored_and_cloned() {
        let at = |x: f64| CadInstance {
            translation: [x, 0.0, 0.0],
            rotation: [0.0; 3],
        };
        let mut arena = LinkArena::new();
        let u = arena.insert(
            NewUsage::of(key("A"))
                .amount(2.0)
                .placed_at(at(10.0))
                .placed_at(at(20.0))
                .substitute(NewSubstitute::of(key("B")).placed_at(at(30.0))),
        );
        let copy = arena.clone_usage(u).unwrap();
        let usage = arena.usage(copy).unwrap();
        assert_eq!(usage.cad_instances, vec![at(10.0), at(20.0)]);
        let sub = arena.substitute(usage.substitutes[0]).unwrap();
        assert_eq!(sub.cad_instances, vec![at(30.0)]);
    }

    #[test]
    fn test_clone_usage_gets_fresh_ids() {
        let mut arena = LinkArena::new();
        let u = arena.insert(
            NewUsage::of(key("A"))
                .amount(4.0)
                .substitute(NewSubstitute::of(key("B"))),
        );
        let copy = arena.clone_usage(u).unwrap();
        assert_ne!(copy, u);
        let original = arena.usage(u).unwrap().clone();
        let cloned = arena.usage(copy).unwrap();
        assert_eq!(cloned.amount, 4.0);
        assert_eq!(cloned.component, original.component);
        assert_ne!(cloned.substitutes, original.substitutes);
    }

    #[test]
    fn test_remove_usage_drops_substitutes() {
        let mut arena = LinkArena::new();
        let u = arena.insert(NewUsage::of(key("A")).substitute(NewSubstitute::of(key("B"))));
        let sub = arena.usage(u).unwrap().substitutes[0];
        arena.remove_usage(u);
        assert!(arena.is_empty());
        assert!(arena.substitute(sub).is_none());
    }

    #[test]
    fn test_references_to() {
        let mut arena = LinkArena::new();
        let u1 = arena.insert(NewUsage::of(key("A")));
        let u2 = arena.insert(NewUsage::of(key("C")).substitute(NewSubstitute::of(key("A"))));
        arena.insert(NewUsage::of(key("D")));
        let refs: Vec<_> = arena.references_to(&key("A")).collect();
        assert_eq!(refs, vec![u1, u2]);
    }
}
